//! Contains the [`TracePlugin`]

use bevy_app::{App, Plugin};
use cfg_if::cfg_if;
use tracing_panic::panic_hook;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;
use tracing_subscriber::util::SubscriberInitExt;

cfg_if! {
    if #[cfg(feature = "log-to-file")] {
        use std::fs::{File, OpenOptions};
        use std::path::Path;
        use std::time::SystemTime;
        use tracing::{Event, Subscriber};
        use tracing_log::NormalizeEvent;
        use tracing_subscriber::fmt::format::Writer;
        use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
        use tracing_subscriber::registry::LookupSpan;
    }
}

cfg_if! {
    if #[cfg(any(feature = "log-to-console", feature = "log-to-file"))] {
        use tracing::metadata::LevelFilter;
        use tracing_subscriber::{Layer, EnvFilter};
    }
}

/// Environment variable holding the log filter directives.
#[cfg(any(feature = "log-to-console", feature = "log-to-file"))]
const LOG_ENV: &str = "STRATUM_LOG";

/// Directory log files are written to.
#[cfg(feature = "log-to-file")]
const LOG_DIR: &str = "logs";

/// Directory chrome traces are written to.
#[cfg(feature = "trace")]
const TRACE_DIR: &str = "tracing";

/// The plugin that installs the global tracing subscriber.
///
/// With `log-to-console` (the default) events are printed to stdout, with `log-to-file` they are
/// appended to a timestamped file under `logs/` (older logs get gzipped), and with `trace` spans
/// are recorded in the chrome trace format under `tracing/`.
///
/// The level filter is read from `STRATUM_LOG` and defaults to `info`. Panics are logged too.
pub struct TracePlugin;

impl Plugin for TracePlugin {
    #[cfg_attr(not(feature = "trace"), allow(unused_variables))]
    fn build(&self, app: &mut App) {
        cfg_if! {
            if #[cfg(feature = "log-to-console")] {
                let stdout_log = tracing_subscriber::fmt::layer().with_filter(env_filter());
            } else {
                let stdout_log = tracing_subscriber::layer::Identity::new();
            }
        }

        cfg_if! {
            if #[cfg(feature = "log-to-file")] {
                let file = match open_log_file() {
                    Ok(file) => file,
                    Err(e) => {
                        eprintln!("Failed to open log file: {e}");
                        return;
                    }
                };

                let file_log = tracing_subscriber::fmt::layer()
                    .event_format(FileFormatter)
                    .with_writer(file)
                    .with_ansi(false)
                    .with_filter(env_filter());
            } else {
                let file_log = tracing_subscriber::layer::Identity::new();
            }
        }

        cfg_if! {
            if #[cfg(feature = "trace")] {
                if let Err(e) = std::fs::create_dir_all(TRACE_DIR) {
                    eprintln!("Failed to create the tracing directory: {e}");
                    return;
                }
                let trace_path = chrono::Utc::now()
                    .format("tracing/stratum_trace_%Y-%m-%d_%H-%M-%S-%f.json")
                    .to_string();
                let (chrome, guard) = tracing_chrome::ChromeLayerBuilder::new()
                    .file(trace_path)
                    .name_fn(Box::new(|event_or_span| match event_or_span {
                        tracing_chrome::EventOrSpan::Event(event) => event.metadata().name().into(),
                        tracing_chrome::EventOrSpan::Span(span) => {
                            if let Some(fields) = span.extensions().get::<tracing_subscriber::fmt::FormattedFields<tracing_subscriber::fmt::format::DefaultFields>>() {
                                format!("{}: {}", span.metadata().name(), fields.fields.as_str())
                            } else {
                                span.metadata().name().into()
                            }
                        }
                    }))
                    .build();
                app.insert_non_send_resource(guard);
            } else {
                let chrome = tracing_subscriber::layer::Identity::new();
            }
        }

        registry()
            .with(stdout_log)
            .with(file_log)
            .with(chrome)
            .init();

        // Feed panics through tracing
        let old_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            panic_hook(info);
            old_hook(info);
        }));
    }
}

#[cfg(any(feature = "log-to-console", feature = "log-to-file"))]
/// Log filter read from `STRATUM_LOG`, `info` when unset.
fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy()
}

/// Compresses the logs of previous runs and opens a fresh log file.
#[cfg(feature = "log-to-file")]
fn open_log_file() -> std::io::Result<File> {
    std::fs::create_dir_all(LOG_DIR)?;

    for entry in std::fs::read_dir(LOG_DIR)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            compress_log(&path)?;
        }
    }

    let log_path = chrono::Utc::now()
        .format("logs/stratum_log_%Y-%m-%d_%H-%M-%S-%f.log")
        .to_string();
    OpenOptions::new().create(true).append(true).open(log_path)
}

/// Replaces `path` with a gzipped copy next to it.
#[cfg(feature = "log-to-file")]
fn compress_log(path: &Path) -> std::io::Result<()> {
    let mut compressed_name = path.as_os_str().to_owned();
    compressed_name.push(".gz");

    let mut reader = std::io::BufReader::new(File::open(path)?);
    let mut encoder = flate2::write::GzEncoder::new(
        File::create(compressed_name)?,
        flate2::Compression::default(),
    );
    std::io::copy(&mut reader, &mut encoder)?;
    encoder.finish()?;

    std::fs::remove_file(path)
}

/// Formatting for logging to files
///
/// Events are written as `[<timestamp>] [<level>] [<target>]: <message>`, for example
/// `[2024-05-05T05:15:02.623Z] [INFO] [stratum_gui::layer]: Screen fit height / landscape`.
#[cfg(feature = "log-to-file")]
struct FileFormatter;

#[cfg(feature = "log-to-file")]
impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.normalized_metadata();
        let metadata = metadata.as_ref().unwrap_or(event.metadata());

        write!(
            writer,
            "[{}] [{}] [{}]: ",
            humantime::format_rfc3339_millis(SystemTime::now()),
            metadata.level(),
            metadata.target()
        )?;

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                let ext = span.extensions();
                if let Some(fields) = ext.get::<tracing_subscriber::fmt::FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

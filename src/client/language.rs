//! Language packs used to translate toasts and labels.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use stratum_gui::Localizer;
use toml::{Table, Value};

/// Errors raised while reading a language pack.
#[derive(Snafu, Debug)]
#[snafu(context(suffix(Ctx)))]
pub enum LanguageError {
    /// The pack file could not be read.
    #[snafu(display("Failed to read language pack {}: {source}", path.display()))]
    ReadPack {
        /// Path of the pack.
        path: PathBuf,
        /// IO error
        source: std::io::Error,
    },
    /// The pack is not valid TOML.
    #[snafu(display("Failed to parse language pack {}: {source}", path.display()))]
    ParsePack {
        /// Path of the pack.
        path: PathBuf,
        /// TOML error
        source: toml::de::Error,
    },
}

/// Translations keyed by dotted paths.
///
/// ```toml
/// [loading]
/// ready = "Ready to play"
/// ```
/// translates the key `loading.ready`. Non-string values are ignored.
#[derive(Debug, Default, Clone)]
pub struct LanguagePack {
    /// Texts by dotted key.
    entries: HashMap<String, String>,
}

impl LanguagePack {
    /// Reads `language/pack/<language>.toml` below `bundle_dir`.
    pub async fn load(bundle_dir: &Path, language: &str) -> Result<Self, LanguageError> {
        let path = bundle_dir
            .join("language/pack")
            .join(language)
            .with_extension("toml");
        let text = async_fs::read_to_string(&path)
            .await
            .context(ReadPackCtx { path: &path })?;
        Self::parse(&text).context(ParsePackCtx { path })
    }

    /// Parses a pack from TOML text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let table: Table = toml::from_str(text)?;
        let mut entries = HashMap::new();
        flatten("", table, &mut entries);
        Ok(Self { entries })
    }

    /// Number of translated keys.
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}

/// Moves every string of `table` into `entries`, nested keys joined with dots.
fn flatten(prefix: &str, table: Table, entries: &mut HashMap<String, String>) {
    for (key, value) in table {
        let key = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::String(text) => {
                entries.insert(key, text);
            }
            Value::Table(table) => flatten(&key, table, entries),
            _ => {}
        }
    }
}

impl Localizer for LanguagePack {
    fn translate(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

//! Resource loading boundary.
//!
//! Views are built from prefabs that a [`ResourceLoader`] fetches asynchronously. Retries,
//! bundles and caching of raw assets are the loader's business; the layer manager only asks
//! for a prefab and tells the loader when it no longer needs it.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use futures_lite::future::{BoxedLocal, FutureExt};
use snafu::ResultExt;
use tracing::debug;

use crate::error::{IoCtx, LoadResult, NotFoundCtx};

/// A loaded prefab that a [`SceneGraph`](crate::scene::SceneGraph) can instantiate.
#[derive(Clone)]
pub struct Prefab {
    /// Resource path it was loaded from.
    path: String,
    /// Raw prefab bytes.
    data: Arc<[u8]>,
}

impl Prefab {
    /// Creates a prefab from its resource path and raw data.
    pub fn new(path: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            data: data.into(),
        }
    }

    /// The resource path the prefab was loaded from.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last segment of the resource path.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// The raw prefab data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Debug for Prefab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefab")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Asynchronously fetches prefabs.
pub trait ResourceLoader {
    /// Starts loading the prefab at `path` inside `bundle`.
    ///
    /// The request is issued when this is called; the returned future only waits for it.
    fn load(&self, bundle: &str, path: &str) -> BoxedLocal<LoadResult<Prefab>>;

    /// Tells the loader that a prefab is no longer used by any view.
    fn release(&self, _bundle: &str, _path: &str) {}
}

/// A resource loader shared between layer containers.
pub type SharedLoader = Rc<dyn ResourceLoader>;

/// Loads prefabs from `<root>/<bundle>/<path>.prefab` on the local file system.
#[derive(Debug, Clone)]
pub struct FsResourceLoader {
    /// Directory holding the bundles.
    root: PathBuf,
}

impl FsResourceLoader {
    /// Extension appended to every resource path.
    pub const EXTENSION: &'static str = "prefab";

    /// Creates a loader rooted at an asset directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the file a resource resolves to.
    pub fn resolve(&self, bundle: &str, path: &str) -> PathBuf {
        let mut file = self.root.join(bundle).join(path);
        file.set_extension(Self::EXTENSION);
        file
    }
}

impl ResourceLoader for FsResourceLoader {
    fn load(&self, bundle: &str, path: &str) -> BoxedLocal<LoadResult<Prefab>> {
        let file = self.resolve(bundle, path);
        let path = path.to_string();

        async move {
            debug!("Loading {path} from {}", file.display());
            match async_fs::read(&file).await {
                Ok(data) => Ok(Prefab::new(path, data)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => NotFoundCtx { path }.fail(),
                Err(e) => Err(e).context(IoCtx { path }),
            }
        }
        .boxed_local()
    }
}

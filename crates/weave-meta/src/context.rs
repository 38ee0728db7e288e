//! Capabilities the host build tool provides to metadata resolution.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::cache::lock;
use crate::settings::DEFAULT_DEPENDENCY_DIR;

/// Host services used while loading package metadata.
///
/// The host is responsible for rebuilding when a watched file changes and
/// for reporting that change back through
/// [`MetadataRepository::on_file_changed`](crate::MetadataRepository::on_file_changed).
#[async_trait]
pub trait MetadataContext: Send + Sync {
    /// Register a file the current computation depends on.
    fn add_watch_file(&self, path: &Path);

    /// Resolve `module_id` as imported from the file `importer`.
    ///
    /// Returns `None` if the module cannot be found.
    async fn resolve(&self, module_id: &str, importer: &Path) -> Option<PathBuf>;

    /// Report a non-fatal problem.
    fn warn(&self, message: &str);
}

/// A reference-counted [`MetadataContext`].
pub type SharedContext = Arc<dyn MetadataContext>;

/// File extensions probed by [`FsContext`] when a module id has none.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "js", "jsx", "mjs", "cjs"];

/// A [`MetadataContext`] backed directly by the filesystem.
///
/// Relative module ids resolve against the importer's directory; bare ids
/// (`name/sub/path`, `@scope/name/sub/path`) are looked up in the
/// dependency directories of the importer and its ancestors. Watched
/// files and warnings are recorded for inspection.
#[derive(Debug)]
pub struct FsContext {
    dependency_dir: String,
    extensions: Vec<String>,
    watch_files: Mutex<BTreeSet<PathBuf>>,
    warnings: Mutex<Vec<String>>,
}

impl Default for FsContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FsContext {
    /// Create a context using the default dependency directory and extensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dependency_dir: DEFAULT_DEPENDENCY_DIR.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            watch_files: Mutex::new(BTreeSet::new()),
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Use a different dependency directory name.
    #[must_use]
    pub fn with_dependency_dir(mut self, name: impl Into<String>) -> Self {
        self.dependency_dir = name.into();
        self
    }

    /// Replace the probed file extensions (without leading dot).
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Files registered so far.
    #[must_use]
    pub fn watch_files(&self) -> BTreeSet<PathBuf> {
        lock(&self.watch_files).clone()
    }

    /// Warnings reported so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        lock(&self.warnings).clone()
    }

    async fn resolve_bare(&self, module_id: &str, importer: &Path) -> Option<PathBuf> {
        let (name, subpath) = split_bare_id(module_id)?;
        let start = importer.parent()?;
        for dir in start.ancestors() {
            if dir.file_name().is_some_and(|n| n == self.dependency_dir.as_str()) {
                continue;
            }
            let package_dir = dir.join(&self.dependency_dir).join(name);
            if !is_dir(&package_dir).await {
                continue;
            }
            return match subpath {
                Some(subpath) => self.probe(&package_dir.join(subpath)).await,
                None => self.probe_index(&package_dir).await,
            };
        }
        None
    }

    async fn probe(&self, path: &Path) -> Option<PathBuf> {
        if is_file(path).await {
            return Some(path.to_path_buf());
        }
        for ext in &self.extensions {
            let mut candidate = OsString::from(path.as_os_str());
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        if is_dir(path).await {
            return self.probe_index(path).await;
        }
        None
    }

    async fn probe_index(&self, dir: &Path) -> Option<PathBuf> {
        for ext in &self.extensions {
            let candidate = dir.join(format!("index.{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl MetadataContext for FsContext {
    fn add_watch_file(&self, path: &Path) {
        lock(&self.watch_files).insert(path.to_path_buf());
    }

    async fn resolve(&self, module_id: &str, importer: &Path) -> Option<PathBuf> {
        let resolved = if is_path_like(module_id) {
            let base = importer.parent()?;
            self.probe(&base.join(module_id)).await
        } else {
            self.resolve_bare(module_id, importer).await
        }?;
        Some(tokio::fs::canonicalize(&resolved).await.unwrap_or(resolved))
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
        lock(&self.warnings).push(message.to_string());
    }
}

fn is_path_like(module_id: &str) -> bool {
    module_id == "."
        || module_id == ".."
        || module_id.starts_with("./")
        || module_id.starts_with("../")
        || Path::new(module_id).is_absolute()
}

/// Split a bare module id into package name and optional subpath.
fn split_bare_id(module_id: &str) -> Option<(&str, Option<&str>)> {
    let name_len = if module_id.starts_with('@') {
        let scope_end = module_id.find('/')?;
        module_id[scope_end + 1..]
            .find('/')
            .map_or(module_id.len(), |i| scope_end + 1 + i)
    } else {
        module_id.find('/').unwrap_or(module_id.len())
    };
    let (name, rest) = module_id.split_at(name_len);
    if name.is_empty() {
        return None;
    }
    let subpath = rest.strip_prefix('/').filter(|s| !s.is_empty());
    Some((name, subpath))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

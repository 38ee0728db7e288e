//! Fixture package trees for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use weave_meta::{FsContext, MetadataRepository, RepositoryConfig, SharedContext};

/// An application checkout: sources under `src/`, installed packages under
/// `node_modules/`.
pub struct Workspace {
    _tmp: TempDir,
    root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = fs::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();
        Self { _tmp: tmp, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    /// Write `<dir>/package.json`.
    pub fn package_json(&self, dir: &str, content: &Value) -> PathBuf {
        self.write(
            &format!("{dir}/package.json"),
            &serde_json::to_string_pretty(content).unwrap(),
        )
    }

    /// A local package under `src/<name>` configured by `build.config.toml`.
    pub fn local(&self, name: &str, dependencies: &[&str], build_config: &str) -> PathBuf {
        let dir = format!("src/{name}");
        self.package_json(
            &dir,
            &json!({"name": name, "version": "1.0.0", "dependencies": deps(dependencies)}),
        );
        self.write(&format!("{dir}/build.config.toml"), build_config);
        self.path(&dir)
    }

    /// A published package under `node_modules/<name>` with an optional
    /// serialized descriptor.
    pub fn external(
        &self,
        name: &str,
        dependencies: &[&str],
        descriptor: Option<Value>,
    ) -> PathBuf {
        self.external_at(&format!("node_modules/{name}"), name, dependencies, descriptor)
    }

    pub fn external_at(
        &self,
        dir: &str,
        name: &str,
        dependencies: &[&str],
        descriptor: Option<Value>,
    ) -> PathBuf {
        let mut package = json!({
            "name": name,
            "version": "1.0.0",
            "dependencies": deps(dependencies),
        });
        if let Some(descriptor) = descriptor {
            package["weaveFramework"] = descriptor;
        }
        self.package_json(dir, &package);
        self.path(dir)
    }

    /// Make the local package `src/<name>` installable as a dependency.
    #[cfg(unix)]
    pub fn link_local(&self, name: &str) {
        let link = self.path(&format!("node_modules/{name}"));
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(self.path(&format!("src/{name}")), link).unwrap();
    }

    pub fn config(&self) -> RepositoryConfig {
        RepositoryConfig::new(self.path("src"))
    }

    pub async fn repository(&self) -> MetadataRepository {
        MetadataRepository::new(self.config()).await.unwrap()
    }
}

/// A serialized descriptor in the current format.
pub fn descriptor() -> Value {
    json!({"packageFormatVersion": "1.0.0"})
}

/// A serialized descriptor declaring messages for `languages`.
pub fn descriptor_with_languages(languages: &[&str]) -> Value {
    json!({"packageFormatVersion": "1.0.0", "i18n": {"languages": languages}})
}

pub fn context() -> (Arc<FsContext>, SharedContext) {
    let fs_context = Arc::new(FsContext::new());
    let shared: SharedContext = fs_context.clone();
    (fs_context, shared)
}

fn deps(names: &[&str]) -> Value {
    names
        .iter()
        .map(|name| ((*name).to_string(), json!("^1.0.0")))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

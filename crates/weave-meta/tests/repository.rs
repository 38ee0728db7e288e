//! Integration tests for application graph resolution

mod common;

use common::{context, descriptor, Workspace};
use semver::Version;
use serde_json::json;
use weave_meta::{
    ErrorKind, MetadataError, MetadataRepository, PackageMetadata, RepositoryConfig,
};

#[tokio::test]
async fn test_diamond_dependency_is_recorded_once() {
    let ws = Workspace::new();
    let app = ws.local("app", &["left", "right"], "");
    ws.external("left", &["shared"], Some(descriptor()));
    ws.external("right", &["shared"], Some(descriptor()));
    ws.external("shared", &[], Some(descriptor()));

    let repo = ws.repository().await;
    let (_, ctx) = context();
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();

    assert_eq!(metadata.name, "app");
    assert_eq!(metadata.package_names(), vec!["app", "left", "right", "shared"]);
    assert_eq!(repo.cached_packages(), 4);
}

#[tokio::test]
async fn test_shared_dependency_is_loaded_once() {
    let ws = Workspace::new();
    let app = ws.local("app", &["left", "middle", "right"], "");
    for name in ["left", "middle", "right"] {
        ws.external(name, &["shared"], Some(descriptor()));
    }
    // Loading `shared` warns once per computation.
    ws.external("shared", &[], None);
    ws.write("node_modules/shared/build.config.toml", "");

    let repo = ws.repository().await;
    let (fs_context, ctx) = context();
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();

    assert_eq!(
        metadata.package_names(),
        vec!["app", "left", "middle", "right", "shared"]
    );
    let loads = fs_context
        .warnings()
        .iter()
        .filter(|w| w.contains("'shared'"))
        .count();
    assert_eq!(loads, 1);
}

#[tokio::test]
async fn test_missing_source_root_is_rejected() {
    let ws = Workspace::new();
    let err = MetadataRepository::new(RepositoryConfig::new(ws.path("missing")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().contains("missing"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_dependency_cycle_terminates() {
    let ws = Workspace::new();
    let app = ws.local("a", &["b"], "");
    ws.link_local("a");
    ws.external("b", &["a"], Some(descriptor()));

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();
    assert_eq!(metadata.package_names(), vec!["a", "b"]);
}

#[tokio::test]
async fn test_same_name_at_two_locations_is_rejected() {
    let ws = Workspace::new();
    let app = ws.local("app", &["left", "right"], "");
    ws.external("left", &["shared"], Some(descriptor()));
    ws.external_at("node_modules/left/node_modules/shared", "shared", &[], None);
    ws.external("right", &["shared"], Some(descriptor()));
    ws.external("shared", &[], None);

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    match err {
        MetadataError::DuplicatePackageLocation {
            package,
            first,
            second,
        } => {
            assert_eq!(package, "shared");
            assert_ne!(first, second);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_optional_dependencies_may_be_missing() {
    let ws = Workspace::new();
    ws.package_json(
        "src/app",
        &json!({
            "name": "app",
            "optionalDependencies": {"ghost": "^1.0.0"},
            "peerDependencies": {"theme": "*"},
            "peerDependenciesMeta": {"theme": {"optional": true}}
        }),
    );
    ws.write("src/app/build.config.toml", "");

    let (_, ctx) = context();
    let metadata = ws
        .repository()
        .await
        .get_app_metadata(ws.path("src/app"), ctx)
        .await
        .unwrap();
    assert_eq!(metadata.package_names(), vec!["app"]);
}

#[tokio::test]
async fn test_missing_dependency_is_fatal() {
    let ws = Workspace::new();
    let app = ws.local("app", &["ghost"], "");

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingDependency);
    assert!(err.to_string().contains("'ghost'"));
    assert!(err.to_string().contains("'app'"));
}

#[tokio::test]
async fn test_app_without_configuration_is_rejected() {
    let ws = Workspace::new();
    ws.package_json("src/app", &json!({"name": "app"}));

    let (_, ctx) = context();
    let err = ws
        .repository()
        .await
        .get_app_metadata(ws.path("src/app"), ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);
}

#[tokio::test]
async fn test_local_package_with_both_descriptors_is_ambiguous() {
    let ws = Workspace::new();
    ws.package_json(
        "src/app",
        &json!({"name": "app", "weaveFramework": {"packageFormatVersion": "1.0.0"}}),
    );
    ws.write("src/app/build.config.yaml", "i18n: []\n");

    let (_, ctx) = context();
    let err = ws
        .repository()
        .await
        .get_app_metadata(ws.path("src/app"), ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AmbiguousConfiguration);
}

#[tokio::test]
async fn test_descriptor_format_version_is_checked() {
    let ws = Workspace::new();
    let app = ws.local("app", &["map"], "");
    ws.external("map", &[], Some(json!({"packageFormatVersion": "1.1.0"})));

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormatVersion);
    assert!(err.to_string().contains("'map'"));
}

#[tokio::test]
async fn test_newer_patch_format_is_accepted() {
    let ws = Workspace::new();
    let app = ws.local("app", &["map"], "");
    ws.external(
        "map",
        &[],
        Some(json!({"packageFormatVersion": "1.0.7", "futureField": {"x": 1}})),
    );

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();
    assert!(metadata.package("map").unwrap().as_declared().is_some());
}

#[tokio::test]
async fn test_runtime_version_is_checked() {
    let ws = Workspace::new();
    let app = ws.local("app", &["map"], "");
    ws.external(
        "map",
        &[],
        Some(json!({"packageFormatVersion": "1.0.0", "runtimeVersion": "3.0.0"})),
    );

    let repo = MetadataRepository::new(ws.config().with_runtime_version(Version::new(2, 4, 0)))
        .await
        .unwrap();
    let (_, ctx) = context();
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedRuntimeVersion);
}

#[tokio::test]
async fn test_external_without_descriptor_is_plain() {
    let ws = Workspace::new();
    let app = ws.local("app", &["lodash"], "");
    ws.external("lodash", &["never-followed"], None);

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();
    assert!(matches!(
        metadata.package("lodash"),
        Some(PackageMetadata::Plain(_))
    ));
    assert_eq!(metadata.package_names(), vec!["app", "lodash"]);
}

#[tokio::test]
async fn test_declared_locale_requires_file() {
    let ws = Workspace::new();
    let app = ws.local("app", &[], "i18n = [\"de\", \"en\"]\n");
    ws.write("src/app/i18n/de.yaml", "messages: {}\n");

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    match err {
        MetadataError::MissingFile { package, path, .. } => {
            assert_eq!(package, "app");
            assert!(path.ends_with("i18n/en.yaml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_services_module_must_resolve() {
    let ws = Workspace::new();
    let app = ws.local("app", &[], "[services.Logger]\nprovides = [\"app.Logger\"]\n");

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let err = repo.get_app_metadata(&app, ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingFile);
    assert!(err.to_string().contains("services module"));
}

#[tokio::test]
async fn test_app_metadata_exposes_resolved_paths() {
    let ws = Workspace::new();
    let app = ws.local(
        "app",
        &["map"],
        "i18n = [\"en\"]\nservicesModule = \"./impl/services\"\n\n[services.Logger]\nprovides = [\"app.Logger\"]\n",
    );
    ws.write("src/app/impl/services.ts", "");
    ws.write("src/app/i18n/en.yaml", "messages:\n  title: Map\n");
    ws.external(
        "map",
        &[],
        Some(json!({
            "packageFormatVersion": "1.0.0",
            "styles": "./dist/map.css",
            "ui": {"references": [{"type": "all", "interfaceName": "map.Layer"}]}
        })),
    );
    ws.write("node_modules/map/dist/map.css", "");

    let (_, ctx) = context();
    let repo = ws.repository().await;
    let metadata = repo.get_app_metadata(&app, ctx).await.unwrap();
    assert_eq!(metadata.locales, vec!["en"]);
    assert_eq!(
        metadata.app_package.services_module_path,
        Some(ws.path("src/app/impl/services.ts"))
    );

    let map = metadata.package("map").unwrap().as_declared().unwrap();
    assert_eq!(map.css_file_path, Some(ws.path("node_modules/map/dist/map.css")));
    assert_eq!(map.config.ui_references.len(), 1);
}

#[tokio::test]
async fn test_cached_packages_are_reused_and_still_watched() {
    let ws = Workspace::new();
    let app = ws.local("app", &["map"], "");
    ws.external("map", &[], Some(descriptor()));
    let repo = ws.repository().await;

    let (first, ctx) = context();
    repo.get_app_metadata(&app, ctx).await.unwrap();
    let (second, ctx) = context();
    repo.get_app_metadata(&app, ctx).await.unwrap();

    assert_eq!(repo.cached_packages(), 2);
    assert_eq!(first.watch_files(), second.watch_files());
    assert!(second
        .watch_files()
        .contains(&ws.path("node_modules/map/package.json")));
}

#[tokio::test]
async fn test_file_change_invalidates_dependents() {
    let ws = Workspace::new();
    let app = ws.local("app", &["map"], "");
    let map = ws.external("map", &[], Some(descriptor()));
    let repo = ws.repository().await;

    let (_, ctx) = context();
    let before = repo.get_app_metadata(&app, ctx.clone()).await.unwrap();
    assert!(before.package("map").unwrap().as_declared().is_some());

    ws.external("map", &[], None);
    assert!(repo.on_file_changed(&map.join("package.json")) > 0);
    assert_eq!(repo.cached_packages(), 1);

    let after = repo.get_app_metadata(&app, ctx).await.unwrap();
    assert!(matches!(after.package("map"), Some(PackageMetadata::Plain(_))));

    assert_eq!(repo.on_file_changed(&ws.path("unrelated.txt")), 0);
    repo.reset();
    assert_eq!(repo.cached_packages(), 0);
}

#[tokio::test]
async fn test_creating_build_config_invalidates_package() {
    let ws = Workspace::new();
    let app = ws.local("app", &[], "");
    let repo = ws.repository().await;
    let (_, ctx) = context();
    repo.get_app_metadata(&app, ctx).await.unwrap();

    // Every candidate is watched, not only the one that exists.
    assert!(repo.on_file_changed(&app.join("build.config.json")) > 0);
}

#[tokio::test]
async fn test_overrides_of_unknown_targets_warn() {
    let ws = Workspace::new();
    let app = ws.local(
        "app",
        &["map"],
        "[overrides.ghost.services.Tracker]\nenabled = false\n\n[overrides.map.services.Missing]\nenabled = false\n",
    );
    ws.external(
        "map",
        &[],
        Some(json!({"packageFormatVersion": "1.0.0", "services": []})),
    );

    let (fs_context, ctx) = context();
    ws.repository().await.get_app_metadata(&app, ctx).await.unwrap();
    let warnings = fs_context.warnings();
    assert_eq!(warnings.len(), 2);
    assert!(warnings.iter().any(|w| w.contains("'ghost'")));
    assert!(warnings.iter().any(|w| w.contains("'Missing'")));
}

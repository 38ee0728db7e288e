//! Integration tests for locale coverage and message merging

mod common;

use common::{context, descriptor_with_languages, Workspace};
use weave_meta::{AppMetadata, ErrorKind, I18nMerger, MetadataError};

async fn resolve(ws: &Workspace, app: &std::path::Path) -> AppMetadata {
    let (_, ctx) = context();
    ws.repository().await.get_app_metadata(app, ctx).await.unwrap()
}

/// App with locales `de` and `en` depending on `search`.
fn search_app(ws: &Workspace, app_de: &str, search_languages: &[&str]) -> std::path::PathBuf {
    let app = ws.local("app", &["search"], "i18n = [\"de\", \"en\"]\n");
    ws.write("src/app/i18n/de.yaml", app_de);
    ws.write("src/app/i18n/en.yaml", "messages:\n  title: Map\n");
    ws.external("search", &[], Some(descriptor_with_languages(search_languages)));
    for locale in search_languages {
        ws.write(
            &format!("node_modules/search/i18n/{locale}.yaml"),
            "messages:\n  placeholder: Search\n",
        );
    }
    app
}

#[tokio::test]
async fn test_app_override_replaces_single_key() {
    let ws = Workspace::new();
    let app = ws.local("app", &["greeter"], "i18n = [\"de\"]\n");
    ws.write(
        "src/app/i18n/de.yaml",
        "messages:\n  title: Karte\noverrides:\n  greeter:\n    greeting: Hallo\n",
    );
    ws.external("greeter", &[], Some(descriptor_with_languages(&["de"])));
    ws.write(
        "node_modules/greeter/i18n/de.yaml",
        "messages:\n  greeting: Hi\n  farewell: Tschüss\n",
    );

    let metadata = resolve(&ws, &app).await;
    let (fs_context, ctx) = context();
    let messages = I18nMerger::new(&metadata).merge("de", &ctx).await.unwrap();

    assert_eq!(messages.get("greeter", "greeting"), Some("Hallo"));
    assert_eq!(messages.get("greeter", "farewell"), Some("Tschüss"));
    assert_eq!(messages.get("app", "title"), Some("Karte"));
    assert!(fs_context
        .watch_files()
        .contains(&ws.path("node_modules/greeter/i18n/de.yaml")));
}

#[tokio::test]
async fn test_missing_locale_without_override_names_package() {
    let ws = Workspace::new();
    let app = search_app(&ws, "messages:\n  title: Karte\n", &["en"]);
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let err = I18nMerger::new(&metadata).merge_all(&ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LocaleCoverage);
    match &err {
        MetadataError::MissingTranslation {
            package,
            locale,
            available,
        } => {
            assert_eq!(package, "search");
            assert_eq!(locale, "de");
            assert_eq!(available, &vec!["en".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("'en'"));
}

#[tokio::test]
async fn test_override_covers_missing_locale() {
    let ws = Workspace::new();
    let app = search_app(
        &ws,
        "messages:\n  title: Karte\noverrides:\n  search:\n    placeholder: Suchen\n",
        &["en"],
    );
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let merged = I18nMerger::new(&metadata).merge_all(&ctx).await.unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].locale, "de");
    assert_eq!(merged[0].get("search", "placeholder"), Some("Suchen"));
    assert_eq!(merged[1].get("search", "placeholder"), Some("Search"));
}

#[tokio::test]
async fn test_package_without_shared_locale_is_reported() {
    let ws = Workspace::new();
    let app = search_app(&ws, "messages: {}\n", &["fr"]);
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let err = I18nMerger::new(&metadata)
        .validate_locales(&ctx)
        .await
        .unwrap_err();
    match err {
        MetadataError::NoLocaleMatch {
            app_locales,
            packages,
            remaining,
        } => {
            assert_eq!(app_locales, vec!["de", "en"]);
            assert_eq!(packages.len(), 1);
            assert_eq!(packages[0].package, "search");
            assert_eq!(packages[0].locales, vec!["fr"]);
            assert_eq!(remaining, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_locale_mismatch_report_is_bounded() {
    let ws = Workspace::new();
    let names = ["p1", "p2", "p3", "p4", "p5", "p6", "p7"];
    let app = ws.local("app", &names, "i18n = [\"de\"]\n");
    ws.write("src/app/i18n/de.yaml", "messages: {}\n");
    for name in names {
        ws.external(name, &[], Some(descriptor_with_languages(&["ja"])));
        ws.write(&format!("node_modules/{name}/i18n/ja.yaml"), "messages: {}\n");
    }
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let err = I18nMerger::new(&metadata)
        .validate_locales(&ctx)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MetadataError::NoLocaleMatch { ref packages, remaining: 2, .. } if packages.len() == 5
    ));
    assert!(err.to_string().contains("and 2 more"));
}

#[tokio::test]
async fn test_override_exempts_package_from_locale_check() {
    let ws = Workspace::new();
    let app = search_app(
        &ws,
        "messages: {}\noverrides:\n  search:\n    placeholder: Suchen\n",
        &["fr"],
    );
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let merger = I18nMerger::new(&metadata);
    merger.validate_locales(&ctx).await.unwrap();
    let de = merger.merge("de", &ctx).await.unwrap();
    assert_eq!(de.get("search", "placeholder"), Some("Suchen"));
}

#[tokio::test]
async fn test_duplicate_message_key_is_fatal() {
    let ws = Workspace::new();
    let app = ws.local("app", &[], "i18n = [\"de\"]\n");
    ws.write(
        "src/app/i18n/de.yaml",
        "messages:\n  \"search.title\": Suche\n  search:\n    title: Suchen\n",
    );
    let metadata = resolve(&ws, &app).await;

    let (_, ctx) = context();
    let err = I18nMerger::new(&metadata).merge("de", &ctx).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateDefinition);
}

//! Locale message files and their merge into per-locale message sets.
//!
//! ```yaml
//! # i18n/de.yaml
//! messages:
//!   search:
//!     placeholder: Suchen...
//! overrides:
//!   "@weave/map":
//!     zoom:
//!       in: Hineinzoomen
//! ```
//!
//! Nested keys are flattened with `.` (`search.placeholder`). Only the
//! application's own files may override messages of other packages; an
//! override replaces single keys and keeps the rest of the package's
//! messages.

use crate::context::SharedContext;
use crate::error::{
    DefinitionKind, LocaleMismatch, MetadataError, Result, MAX_REPORTED_PACKAGES,
};
use crate::metadata::{AppMetadata, DeclaredPackage};
use futures_util::future::try_join_all;
use serde::de::{Deserializer, Error, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Flattened message key to message template.
pub type Messages = BTreeMap<String, String>;

/// A parsed locale file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct I18nFile {
    pub messages: Messages,
    /// Messages replacing those of other packages, keyed by package name.
    pub overrides: BTreeMap<String, Messages>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawI18nFile {
    #[serde(default)]
    messages: MessageTree,
    #[serde(default)]
    overrides: MessageTree,
}

/// A message document as written, keeping repeated keys so they can be
/// reported by [`flatten`].
#[derive(Debug, Default)]
enum MessageTree {
    #[default]
    Empty,
    Text(String),
    Table(Vec<(String, MessageTree)>),
    /// Any other YAML value, by its description.
    Other(&'static str),
}

impl<'de> Deserialize<'de> for MessageTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TreeVisitor;

        impl<'de> Visitor<'de> for TreeVisitor {
            type Value = MessageTree;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a message or a mapping of messages")
            }

            fn visit_str<E: Error>(self, v: &str) -> Result<MessageTree, E> {
                Ok(MessageTree::Text(v.to_string()))
            }

            fn visit_string<E: Error>(self, v: String) -> Result<MessageTree, E> {
                Ok(MessageTree::Text(v))
            }

            fn visit_unit<E: Error>(self) -> Result<MessageTree, E> {
                Ok(MessageTree::Empty)
            }

            fn visit_none<E: Error>(self) -> Result<MessageTree, E> {
                Ok(MessageTree::Empty)
            }

            fn visit_bool<E: Error>(self, _: bool) -> Result<MessageTree, E> {
                Ok(MessageTree::Other("boolean"))
            }

            fn visit_i64<E: Error>(self, _: i64) -> Result<MessageTree, E> {
                Ok(MessageTree::Other("number"))
            }

            fn visit_u64<E: Error>(self, _: u64) -> Result<MessageTree, E> {
                Ok(MessageTree::Other("number"))
            }

            fn visit_f64<E: Error>(self, _: f64) -> Result<MessageTree, E> {
                Ok(MessageTree::Other("number"))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<MessageTree, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(MessageTree::Other("sequence"))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<MessageTree, A::Error> {
                let mut entries = Vec::new();
                while let Some(entry) = map.next_entry::<String, MessageTree>()? {
                    entries.push(entry);
                }
                Ok(MessageTree::Table(entries))
            }
        }

        deserializer.deserialize_any(TreeVisitor)
    }
}

impl I18nFile {
    /// Parse a locale file; `path` is used for error messages.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid YAML, unknown top-level keys, non-string
    /// keys or leaves, and keys that occur twice once flattened.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let raw: RawI18nFile =
            serde_yaml::from_str(content).map_err(|e| MetadataError::parse(path, e))?;

        let mut messages = Messages::new();
        flatten(&raw.messages, "", &mut messages, path)?;

        let mut overrides = BTreeMap::<String, Messages>::new();
        match &raw.overrides {
            MessageTree::Empty => {}
            MessageTree::Table(entries) => {
                for (package, value) in entries {
                    let package_messages = overrides.entry(package.clone()).or_default();
                    flatten(value, "", package_messages, path)?;
                }
            }
            _ => {
                return Err(MetadataError::validation(
                    path,
                    "'overrides' must map package names to messages",
                ));
            }
        }

        Ok(Self {
            messages,
            overrides,
        })
    }

    /// Read and parse a locale file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MetadataError::io(path, e))?;
        Self::parse(&content, path)
    }
}

fn flatten(tree: &MessageTree, prefix: &str, out: &mut Messages, path: &Path) -> Result<()> {
    match tree {
        MessageTree::Empty if prefix.is_empty() => Ok(()),
        MessageTree::Table(entries) => {
            for (key, value) in entries {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(value, &full, out, path)?;
            }
            Ok(())
        }
        MessageTree::Text(message) if !prefix.is_empty() => {
            if out.contains_key(prefix) {
                return Err(MetadataError::Duplicate {
                    kind: DefinitionKind::MessageKey,
                    name: prefix.to_string(),
                    owner: format!("'{}'", path.display()),
                });
            }
            out.insert(prefix.to_string(), message.clone());
            Ok(())
        }
        _ if prefix.is_empty() => Err(MetadataError::validation(
            path,
            "messages must be a mapping",
        )),
        MessageTree::Other(found) => Err(MetadataError::validation(
            path,
            format!("message '{prefix}' must be a string, found a {found}"),
        )),
        _ => Err(MetadataError::validation(
            path,
            format!("message '{prefix}' must be a string"),
        )),
    }
}

/// The merged messages of every package for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocaleMessages {
    pub locale: String,
    /// Messages per package name.
    pub packages: BTreeMap<String, Messages>,
}

impl LocaleMessages {
    /// Look up a single message.
    #[must_use]
    pub fn get(&self, package: &str, key: &str) -> Option<&str> {
        self.packages.get(package)?.get(key).map(String::as_str)
    }
}

/// Merges the locale files of a resolved application.
#[derive(Debug, Clone, Copy)]
pub struct I18nMerger<'a> {
    app: &'a AppMetadata,
}

impl<'a> I18nMerger<'a> {
    #[must_use]
    pub fn new(app: &'a AppMetadata) -> Self {
        Self { app }
    }

    /// Check that every package with messages supports at least one of the
    /// application's locales, or is covered by application overrides.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NoLocaleMatch`] listing the offending
    /// packages, and any error from reading the application's files.
    pub async fn validate_locales(&self, ctx: &SharedContext) -> Result<()> {
        let app_locales = self.app.locales.iter().map(String::as_str).collect::<BTreeSet<_>>();

        let mut overridden = BTreeSet::new();
        for locale in &self.app.locales {
            if let Some(path) = self.app.app_package.i18n_paths.get(locale) {
                let file = load(path, ctx).await?;
                overridden.extend(file.overrides.into_keys());
            }
        }

        let mismatches = self
            .dependencies()
            .filter(|p| p.has_i18n())
            .filter(|p| !p.locales().any(|l| app_locales.contains(l)))
            .filter(|p| !overridden.contains(&p.name))
            .map(|p| LocaleMismatch {
                package: p.name.clone(),
                locales: p.locales().map(str::to_string).collect(),
            })
            .collect::<Vec<_>>();

        if mismatches.is_empty() {
            return Ok(());
        }
        let remaining = mismatches.len().saturating_sub(MAX_REPORTED_PACKAGES);
        Err(MetadataError::NoLocaleMatch {
            app_locales: self.app.locales.clone(),
            packages: mismatches.into_iter().take(MAX_REPORTED_PACKAGES).collect(),
            remaining,
        })
    }

    /// Merge the messages of all packages for `locale`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::MissingTranslation`] if a package with
    /// messages lacks `locale` and the application does not override it,
    /// and any error from reading or parsing a locale file.
    pub async fn merge(&self, locale: &str, ctx: &SharedContext) -> Result<LocaleMessages> {
        let loaded = try_join_all(self.app.declared_packages().filter_map(|package| {
            let path = package.i18n_paths.get(locale)?;
            Some(async move { load(path, ctx).await.map(|file| (package, file)) })
        }))
        .await?;

        let mut packages = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        for (package, file) in loaded {
            if package.name == self.app.name {
                overrides = file.overrides;
            }
            packages.insert(package.name.clone(), file.messages);
        }

        for (target, messages) in overrides {
            if self.app.package(&target).is_none() {
                ctx.warn(&format!(
                    "messages for locale '{locale}' override package '{target}', which is not a \
                     dependency of the application"
                ));
                continue;
            }
            packages
                .entry(target)
                .or_default()
                .extend(messages);
        }

        if let Some(package) = self
            .dependencies()
            .find(|p| p.has_i18n() && !packages.contains_key(&p.name))
        {
            return Err(MetadataError::MissingTranslation {
                package: package.name.clone(),
                locale: locale.to_string(),
                available: package.locales().map(str::to_string).collect(),
            });
        }

        debug!(%locale, packages = packages.len(), "merged messages");
        Ok(LocaleMessages {
            locale: locale.to_string(),
            packages,
        })
    }

    /// Validate locale coverage once, then merge every application locale.
    ///
    /// # Errors
    ///
    /// Returns the first validation or merge error.
    pub async fn merge_all(&self, ctx: &SharedContext) -> Result<Vec<LocaleMessages>> {
        self.validate_locales(ctx).await?;
        let mut merged = Vec::with_capacity(self.app.locales.len());
        for locale in &self.app.locales {
            merged.push(self.merge(locale, ctx).await?);
        }
        Ok(merged)
    }

    /// Declared packages other than the application itself.
    fn dependencies(&self) -> impl Iterator<Item = &'a DeclaredPackage> + '_ {
        let app = self.app.name.as_str();
        self.app.declared_packages().filter(move |p| p.name != app)
    }
}

async fn load(path: &Path, ctx: &SharedContext) -> Result<I18nFile> {
    ctx.add_watch_file(path);
    I18nFile::from_path(path).await
}

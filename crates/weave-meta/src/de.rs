//! Serde helpers shared by the descriptor schemas.

use crate::error::{DefinitionKind, MetadataError};
use serde::de::{Deserialize, Deserializer, Error, MapAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

/// Definition kinds whose repeated keys are reported through [`DuplicateKey`].
const MARKED_KINDS: [DefinitionKind; 3] = [
    DefinitionKind::Service,
    DefinitionKind::Reference,
    DefinitionKind::Property,
];

pub(crate) fn unique_services<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    unique_map(deserializer, Some(DefinitionKind::Service))
}

pub(crate) fn unique_references<'de, D, V>(
    deserializer: D,
) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    unique_map(deserializer, Some(DefinitionKind::Reference))
}

pub(crate) fn unique_properties<'de, D, V>(
    deserializer: D,
) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    unique_map(deserializer, Some(DefinitionKind::Property))
}

pub(crate) fn unique_keys<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    unique_map(deserializer, None)
}

/// Deserialize a map, rejecting keys that occur more than once.
///
/// JSON and YAML deserializers hand repeated keys to the visitor; authored
/// configuration must not silently drop a definition.
fn unique_map<'de, D, V>(
    deserializer: D,
    kind: Option<DefinitionKind>,
) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct UniqueMapVisitor<V> {
        kind: Option<DefinitionKind>,
        marker: PhantomData<V>,
    }

    impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueMapVisitor<V> {
        type Value = BTreeMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map with unique keys")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, V>()? {
                if map.contains_key(&key) {
                    return Err(A::Error::custom(match self.kind {
                        Some(kind) => DuplicateKey { kind, name: key }.to_string(),
                        None => format!("duplicate key '{key}'"),
                    }));
                }
                map.insert(key, value);
            }
            Ok(map)
        }
    }

    deserializer.deserialize_map(UniqueMapVisitor {
        kind,
        marker: PhantomData,
    })
}

/// A repeated definition reported inside a format parser's error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DuplicateKey {
    pub kind: DefinitionKind,
    pub name: String,
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "duplicate {} '{}'", self.kind, self.name)
    }
}

impl DuplicateKey {
    /// Recover a repeated definition from a parser error message.
    ///
    /// Recognizes the messages of the `unique_*` helpers and TOML's own
    /// duplicate key errors for the tables holding definitions.
    pub(crate) fn find(message: &str) -> Option<Self> {
        Self::find_marked(message).or_else(|| Self::find_toml(message))
    }

    fn find_marked(message: &str) -> Option<Self> {
        MARKED_KINDS.into_iter().find_map(|kind| {
            let prefix = format!("duplicate {kind} '");
            let start = message.find(&prefix)? + prefix.len();
            let (name, _) = message[start..].split_once('\'')?;
            Some(Self {
                kind,
                name: name.to_string(),
            })
        })
    }

    fn find_toml(message: &str) -> Option<Self> {
        let (_, rest) = message.split_once("duplicate key `")?;
        let (name, rest) = rest.split_once('`')?;
        let (_, rest) = rest.split_once(" in table `")?;
        let (table, _) = rest.split_once('`')?;
        let kind = match table.rsplit('.').next()? {
            "services" => DefinitionKind::Service,
            "references" => DefinitionKind::Reference,
            "properties" | "propertiesMeta" => DefinitionKind::Property,
            _ => return None,
        };
        Some(Self {
            kind,
            name: name.trim_matches(['"', '\'']).to_string(),
        })
    }
}

/// Convert a deserialization failure of the file at `path` into an error,
/// naming repeated definitions explicitly.
pub(crate) fn parse_error(path: &Path, error: impl fmt::Display) -> MetadataError {
    let message = error.to_string();
    match DuplicateKey::find(&message) {
        Some(DuplicateKey { kind, name }) => MetadataError::Duplicate {
            kind,
            name,
            owner: format!("'{}'", path.display()),
        },
        None => MetadataError::parse(path, message),
    }
}

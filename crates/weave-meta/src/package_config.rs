//! Canonical package configuration.
//!
//! Both the build descriptor of a local package and the serialized
//! descriptor of a published package are normalized into a
//! [`PackageConfig`]. Nothing format specific survives normalization.

use crate::build_config::{
    BuildConfig, InterfaceConfig, PackageOverridesConfig, ReferenceConfig, ServiceConfig,
};
use crate::descriptor::{PackageDescriptor, ReferenceKind};
use crate::error::{DefinitionKind, MetadataError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Services module assumed when a package declares services without one.
pub const DEFAULT_SERVICES_MODULE: &str = "./services";

/// The declared capabilities of one package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageConfig {
    pub services: BTreeMap<String, Service>,
    pub ui_references: Vec<UiReference>,
    pub properties: BTreeMap<String, Property>,
    pub languages: BTreeSet<String>,
    /// Per-package service enablement, keyed by target package name.
    pub overrides: BTreeMap<String, PackageOverrides>,
    pub services_module: Option<String>,
    pub styles: Option<String>,
}

/// A service implemented by a package.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub service_name: String,
    pub provides: Vec<ProvidedInterface>,
    pub references: BTreeMap<String, Reference>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvidedInterface {
    pub interface_name: String,
    pub qualifier: Option<String>,
}

/// An interface required by a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub reference_name: String,
    pub interface_name: String,
    pub qualifier: Option<String>,
    pub cardinality: Cardinality,
}

/// An interface required by UI code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiReference {
    pub interface_name: String,
    pub qualifier: Option<String>,
    pub cardinality: Cardinality,
}

/// How many implementations satisfy a reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly one implementation.
    #[default]
    One,
    /// Every implementation.
    All,
}

impl From<ReferenceKind> for Cardinality {
    fn from(kind: ReferenceKind) -> Self {
        match kind {
            ReferenceKind::Unique => Self::One,
            ReferenceKind::All => Self::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub default_value: serde_json::Value,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOverrides {
    pub services: BTreeMap<String, ServiceOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOverride {
    pub enabled: bool,
}

impl PackageConfig {
    /// Normalize the build descriptor of a local package.
    ///
    /// `package` names the owning package in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Duplicate`] if a service provides the same
    /// interface twice.
    pub fn from_build_config(config: &BuildConfig, package: &str) -> Result<Self> {
        let services = config
            .services
            .iter()
            .map(|(name, service)| {
                let service = normalize_service(name, service, package)?;
                Ok((name.clone(), service))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let ui_references = config
            .ui
            .as_ref()
            .map(|ui| ui.references.iter().map(ui_reference).collect())
            .unwrap_or_default();

        let properties = config
            .properties
            .iter()
            .map(|(name, value)| {
                let required = config.properties_meta.get(name).is_some_and(|m| m.required);
                let property = Property {
                    default_value: value.clone(),
                    required,
                };
                (name.clone(), property)
            })
            .collect();

        let overrides = config
            .overrides
            .iter()
            .map(|(target, o)| (target.clone(), normalize_overrides(o)))
            .collect();

        let services_module = default_services_module(config.services_module.clone(), &services);

        Ok(Self {
            services,
            ui_references,
            properties,
            languages: config.i18n.iter().cloned().collect(),
            overrides,
            services_module,
            styles: config.styles.clone(),
        })
    }

    /// Normalize the serialized descriptor of a published package.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Duplicate`] for repeated service, reference,
    /// property or provided interface identifiers.
    pub fn from_descriptor(descriptor: &PackageDescriptor, package: &str) -> Result<Self> {
        let mut services = BTreeMap::new();
        for service in &descriptor.services {
            let name = &service.service_name;
            let owner = format!("service '{name}' of package '{package}'");

            let mut provides = Vec::with_capacity(service.provides.len());
            for p in &service.provides {
                push_interface(
                    &mut provides,
                    ProvidedInterface {
                        interface_name: p.interface_name.clone(),
                        qualifier: p.qualifier.clone(),
                    },
                    &owner,
                )?;
            }

            let mut references = BTreeMap::new();
            for r in &service.references {
                let reference = Reference {
                    reference_name: r.reference_name.clone(),
                    interface_name: r.interface_name.clone(),
                    qualifier: r.qualifier.clone(),
                    cardinality: r.kind.into(),
                };
                insert_unique(
                    &mut references,
                    r.reference_name.clone(),
                    reference,
                    DefinitionKind::Reference,
                    &owner,
                )?;
            }

            let service = Service {
                service_name: name.clone(),
                provides,
                references,
            };
            insert_unique(
                &mut services,
                name.clone(),
                service,
                DefinitionKind::Service,
                &format!("package '{package}'"),
            )?;
        }

        let mut properties = BTreeMap::new();
        for p in &descriptor.properties {
            let property = Property {
                default_value: p.value.clone(),
                required: p.required,
            };
            insert_unique(
                &mut properties,
                p.property_name.clone(),
                property,
                DefinitionKind::Property,
                &format!("package '{package}'"),
            )?;
        }

        let ui_references = descriptor
            .ui
            .as_ref()
            .map(|ui| {
                ui.references
                    .iter()
                    .map(|r| UiReference {
                        interface_name: r.interface_name.clone(),
                        qualifier: r.qualifier.clone(),
                        cardinality: r.kind.into(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let services_module = default_services_module(descriptor.services_module.clone(), &services);

        Ok(Self {
            services,
            ui_references,
            properties,
            languages: descriptor.languages().iter().cloned().collect(),
            overrides: BTreeMap::new(),
            services_module,
            styles: descriptor.styles.clone(),
        })
    }

    /// Returns true if the package declares any services.
    #[must_use]
    pub fn has_services(&self) -> bool {
        !self.services.is_empty()
    }
}

fn normalize_service(name: &str, service: &ServiceConfig, package: &str) -> Result<Service> {
    let owner = format!("service '{name}' of package '{package}'");
    let mut provides = Vec::with_capacity(service.provides.len());
    for p in &service.provides {
        let interface = match p {
            InterfaceConfig::Name(name) => ProvidedInterface {
                interface_name: name.clone(),
                qualifier: None,
            },
            InterfaceConfig::Detailed(d) => ProvidedInterface {
                interface_name: d.name.clone(),
                qualifier: d.qualifier.clone(),
            },
        };
        push_interface(&mut provides, interface, &owner)?;
    }

    let references = service
        .references
        .iter()
        .map(|(reference_name, r)| {
            let UiReference {
                interface_name,
                qualifier,
                cardinality,
            } = ui_reference(r);
            let reference = Reference {
                reference_name: reference_name.clone(),
                interface_name,
                qualifier,
                cardinality,
            };
            (reference_name.clone(), reference)
        })
        .collect();

    Ok(Service {
        service_name: name.to_string(),
        provides,
        references,
    })
}

fn ui_reference(config: &ReferenceConfig) -> UiReference {
    match config {
        ReferenceConfig::Name(name) => UiReference {
            interface_name: name.clone(),
            qualifier: None,
            cardinality: Cardinality::One,
        },
        ReferenceConfig::Detailed(d) => UiReference {
            interface_name: d.name.clone(),
            qualifier: d.qualifier.clone(),
            cardinality: if d.all {
                Cardinality::All
            } else {
                Cardinality::One
            },
        },
    }
}

fn normalize_overrides(config: &PackageOverridesConfig) -> PackageOverrides {
    PackageOverrides {
        services: config
            .services
            .iter()
            .map(|(name, o)| (name.clone(), ServiceOverride { enabled: o.enabled }))
            .collect(),
    }
}

fn default_services_module(
    module: Option<String>,
    services: &BTreeMap<String, Service>,
) -> Option<String> {
    match module {
        Some(module) => Some(module),
        None if !services.is_empty() => Some(DEFAULT_SERVICES_MODULE.to_string()),
        None => None,
    }
}

fn push_interface(
    provides: &mut Vec<ProvidedInterface>,
    interface: ProvidedInterface,
    owner: &str,
) -> Result<()> {
    if provides.contains(&interface) {
        let name = match &interface.qualifier {
            Some(q) => format!("{} (qualifier '{q}')", interface.interface_name),
            None => interface.interface_name,
        };
        return Err(MetadataError::Duplicate {
            kind: DefinitionKind::Interface,
            name,
            owner: owner.to_string(),
        });
    }
    provides.push(interface);
    Ok(())
}

fn insert_unique<V>(
    map: &mut BTreeMap<String, V>,
    key: String,
    value: V,
    kind: DefinitionKind,
    owner: &str,
) -> Result<()> {
    if map.contains_key(&key) {
        return Err(MetadataError::Duplicate {
            kind,
            name: key,
            owner: owner.to_string(),
        });
    }
    map.insert(key, value);
    Ok(())
}

//! Default component/section resolution for packages without an explicit
//! override.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use super::ArchiveEngine;
use crate::error::{Error, Result};
use crate::store::{BinaryFilter, SourceFilter, Store};
use crate::types::*;

/// Declared components that map somewhere other than universe when a
/// package is unknown.
const UNKNOWN_COMPONENT_MAP: &[(&str, &str)] = &[("contrib", "multiverse"), ("non-free", "multiverse")];
const UNKNOWN_DEFAULT_COMPONENT: &str = "universe";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceQuery {
    pub name: String,
    /// Component declared by the upload, if any.
    pub component: Option<String>,
}

impl SourceQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            component: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryQuery {
    pub name: String,
    /// `None` matches any architecture; `all` matches arch-independent rows.
    pub architecture_tag: Option<String>,
    /// Component of the binary's source package, if already decided.
    pub component: Option<String>,
}

impl BinaryQuery {
    pub fn new(name: impl Into<String>, architecture_tag: Option<&str>) -> Self {
        Self {
            name: name.into(),
            architecture_tag: architecture_tag.map(str::to_string),
            component: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceOverride {
    pub name: String,
    pub component: String,
    pub section: Option<String>,
    pub version: Option<String>,
    pub new: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryOverride {
    pub name: String,
    pub architecture_tag: Option<String>,
    pub component: String,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub version: Option<String>,
    pub new: bool,
    pub phased_update_percentage: Option<u8>,
}

impl BinaryOverride {
    fn constant(query: &BinaryQuery, component: String, new: bool, phased: Option<u8>) -> Self {
        Self {
            name: query.name.clone(),
            architecture_tag: query.architecture_tag.clone(),
            component,
            section: None,
            priority: None,
            version: None,
            new,
            phased_update_percentage: phased,
        }
    }
}

/// One link in an override chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverridePolicy {
    /// Copy the override of the newest publication in an archive/series.
    FromExisting {
        archive_id: i64,
        series_id: i64,
        /// Ignore the architecture of binary queries.
        any_arch: bool,
        /// Also consider superseded, deleted and obsolete publications.
        include_deleted: bool,
        phased_update_percentage: Option<u8>,
    },
    /// Binaries follow the component their source was given.
    FromSource { phased_update_percentage: Option<u8> },
    Constant {
        component: String,
        new: bool,
        phased_update_percentage: Option<u8>,
    },
    /// Last resort for packages never seen before.
    Unknown { phased_update_percentage: Option<u8> },
    /// Each member only sees the queries earlier members left unresolved.
    Fallback(Vec<OverridePolicy>),
}

fn unknown_component(declared: Option<&str>) -> String {
    declared
        .and_then(|declared| {
            UNKNOWN_COMPONENT_MAP
                .iter()
                .find(|(from, _)| *from == declared)
                .map(|(_, to)| to.to_string())
        })
        .unwrap_or_else(|| UNKNOWN_DEFAULT_COMPONENT.to_string())
}

fn existing_statuses(include_deleted: bool) -> &'static [PublishingStatus] {
    if include_deleted {
        PublishingStatus::ALL
    } else {
        PublishingStatus::ACTIVE
    }
}

fn deleted(status: PublishingStatus) -> bool {
    matches!(status, PublishingStatus::Deleted | PublishingStatus::Obsolete)
}

fn binary_key(name: &str, architecture_tag: Option<&str>) -> (String, Option<String>) {
    (name.to_string(), architecture_tag.map(str::to_string))
}

impl OverridePolicy {
    pub fn source_overrides(
        &self,
        store: &dyn Store,
        sources: &[SourceQuery],
    ) -> Result<Vec<SourceOverride>> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            OverridePolicy::FromExisting {
                archive_id,
                series_id,
                include_deleted,
                ..
            } => {
                let names: Vec<String> = sources.iter().map(|s| s.name.clone()).collect();
                let filter = SourceFilter::new()
                    .names(names)
                    .series(*series_id)
                    .statuses(existing_statuses(*include_deleted));
                // Newest first, so the first row per name wins.
                let rows = store.find_source_publications(*archive_id, &filter)?;

                Ok(sources
                    .iter()
                    .filter_map(|query| {
                        rows.iter().find(|row| row.name == query.name).map(|row| SourceOverride {
                            name: query.name.clone(),
                            component: row.component.clone(),
                            section: Some(row.section.clone()),
                            version: Some(row.version.clone()),
                            new: deleted(row.status),
                        })
                    })
                    .collect())
            }
            OverridePolicy::FromSource { .. } => Ok(Vec::new()),
            OverridePolicy::Constant { component, new, .. } => Ok(sources
                .iter()
                .map(|query| SourceOverride {
                    name: query.name.clone(),
                    component: component.clone(),
                    section: None,
                    version: None,
                    new: *new,
                })
                .collect()),
            OverridePolicy::Unknown { .. } => Ok(sources
                .iter()
                .map(|query| SourceOverride {
                    name: query.name.clone(),
                    component: unknown_component(query.component.as_deref()),
                    section: None,
                    version: None,
                    new: true,
                })
                .collect()),
            OverridePolicy::Fallback(policies) => {
                let mut resolved: Vec<SourceOverride> = Vec::new();
                let mut seen: HashSet<String> = HashSet::new();

                for policy in policies {
                    let missing: Vec<SourceQuery> = sources
                        .iter()
                        .filter(|query| !seen.contains(&query.name))
                        .cloned()
                        .collect();
                    if missing.is_empty() {
                        break;
                    }
                    for found in policy.source_overrides(store, &missing)? {
                        seen.insert(found.name.clone());
                        resolved.push(found);
                    }
                }

                Ok(sources
                    .iter()
                    .filter_map(|query| resolved.iter().find(|o| o.name == query.name).cloned())
                    .collect())
            }
        }
    }

    pub fn binary_overrides(
        &self,
        store: &dyn Store,
        binaries: &[BinaryQuery],
    ) -> Result<Vec<BinaryOverride>> {
        if binaries.is_empty() {
            return Ok(Vec::new());
        }

        match self {
            OverridePolicy::FromExisting {
                archive_id,
                series_id,
                any_arch,
                include_deleted,
                phased_update_percentage,
            } => {
                let names: Vec<String> = binaries.iter().map(|b| b.name.clone()).collect();
                let filter = BinaryFilter::new().with(|f| {
                    f.names(names)
                        .series(*series_id)
                        .statuses(existing_statuses(*include_deleted))
                });
                let rows = store.find_binary_publications(*archive_id, &filter)?;

                Ok(binaries
                    .iter()
                    .filter_map(|query| {
                        rows.iter()
                            .find(|row| {
                                row.name == query.name
                                    && (*any_arch
                                        || match query.architecture_tag.as_deref() {
                                            None => true,
                                            Some("all") => !row.architecture_specific,
                                            Some(tag) => row.architecture_tag == tag,
                                        })
                            })
                            .map(|row| BinaryOverride {
                                name: query.name.clone(),
                                architecture_tag: query.architecture_tag.clone(),
                                component: row.component.clone(),
                                section: Some(row.section.clone()),
                                priority: Some(row.priority.clone()),
                                version: Some(row.version.clone()),
                                new: deleted(row.status),
                                phased_update_percentage: *phased_update_percentage,
                            })
                    })
                    .collect())
            }
            OverridePolicy::FromSource {
                phased_update_percentage,
            } => Ok(binaries
                .iter()
                .filter_map(|query| {
                    query.component.as_ref().map(|component| {
                        BinaryOverride::constant(
                            query,
                            component.clone(),
                            true,
                            *phased_update_percentage,
                        )
                    })
                })
                .collect()),
            OverridePolicy::Constant {
                component,
                new,
                phased_update_percentage,
            } => Ok(binaries
                .iter()
                .map(|query| {
                    BinaryOverride::constant(query, component.clone(), *new, *phased_update_percentage)
                })
                .collect()),
            OverridePolicy::Unknown {
                phased_update_percentage,
            } => Ok(binaries
                .iter()
                .map(|query| {
                    BinaryOverride::constant(
                        query,
                        unknown_component(query.component.as_deref()),
                        true,
                        *phased_update_percentage,
                    )
                })
                .collect()),
            OverridePolicy::Fallback(policies) => {
                let mut resolved: Vec<BinaryOverride> = Vec::new();
                let mut seen: HashSet<(String, Option<String>)> = HashSet::new();

                for policy in policies {
                    let missing: Vec<BinaryQuery> = binaries
                        .iter()
                        .filter(|q| !seen.contains(&binary_key(&q.name, q.architecture_tag.as_deref())))
                        .cloned()
                        .collect();
                    if missing.is_empty() {
                        break;
                    }
                    for found in policy.binary_overrides(store, &missing)? {
                        seen.insert(binary_key(&found.name, found.architecture_tag.as_deref()));
                        resolved.push(found);
                    }
                }

                Ok(binaries
                    .iter()
                    .filter_map(|query| {
                        resolved
                            .iter()
                            .find(|o| o.name == query.name && o.architecture_tag == query.architecture_tag)
                            .cloned()
                    })
                    .collect())
            }
        }
    }
}

fn existing_chain(
    archive_id: i64,
    series_id: i64,
    phased_update_percentage: Option<u8>,
) -> [OverridePolicy; 4] {
    let existing = |any_arch, include_deleted| OverridePolicy::FromExisting {
        archive_id,
        series_id,
        any_arch,
        include_deleted,
        phased_update_percentage,
    };
    [
        existing(false, false),
        existing(true, false),
        existing(false, true),
        existing(true, true),
    ]
}

impl ArchiveEngine {
    /// Builds the override chain for uploads to the archive in a series.
    pub fn get_override_policy(
        &self,
        archive: &Archive,
        series_id: i64,
        pocket: Pocket,
        phased_update_percentage: Option<u8>,
    ) -> Result<OverridePolicy> {
        if let Some(percentage) = phased_update_percentage {
            if percentage > 100 {
                return Err(Error::InvalidPhasedUpdatePercentage(i64::from(percentage)));
            }
        }

        let policy = match archive.purpose {
            ArchivePurpose::Ppa => OverridePolicy::Constant {
                component: "main".to_string(),
                new: false,
                phased_update_percentage: None,
            },
            ArchivePurpose::Copy => {
                let main = self
                    .main_archive(archive.distribution_id)?
                    .ok_or(Error::NotFound)?;
                return self.get_override_policy(&main, series_id, pocket, phased_update_percentage);
            }
            ArchivePurpose::Primary | ArchivePurpose::Partner => {
                let mut chain: Vec<OverridePolicy> =
                    existing_chain(archive.id, series_id, phased_update_percentage).into();

                for parent in self.store.list_series_parents(series_id)? {
                    if !parent.inherit_overrides {
                        continue;
                    }
                    let parent_series = self.series(parent.parent_series_id)?;
                    if let Some(parent_main) = self.main_archive(parent_series.distribution_id)? {
                        chain.extend(existing_chain(
                            parent_main.id,
                            parent_series.id,
                            phased_update_percentage,
                        ));
                    }
                }

                chain.push(OverridePolicy::FromSource {
                    phased_update_percentage,
                });
                if archive.purpose == ArchivePurpose::Partner {
                    chain.push(OverridePolicy::Constant {
                        component: "partner".to_string(),
                        new: true,
                        phased_update_percentage,
                    });
                }
                chain.push(OverridePolicy::Unknown {
                    phased_update_percentage,
                });
                OverridePolicy::Fallback(chain)
            }
        };

        debug!(archive = %archive.name, series_id, pocket = %pocket, "Override policy resolved");
        Ok(policy)
    }

    pub fn source_overrides(
        &self,
        policy: &OverridePolicy,
        sources: &[SourceQuery],
    ) -> Result<Vec<SourceOverride>> {
        policy.source_overrides(self.store.as_ref(), sources)
    }

    pub fn binary_overrides(
        &self,
        policy: &OverridePolicy,
        binaries: &[BinaryQuery],
    ) -> Result<Vec<BinaryOverride>> {
        policy.binary_overrides(self.store.as_ref(), binaries)
    }
}

use chrono::Utc;
use tracing::info;

use super::ArchiveEngine;
use crate::error::{Error, Result};
use crate::store::DependencyScope;
use crate::types::*;

/// Component used when a package has never been published in the primary
/// archive.
const DEFAULT_PRIMARY_COMPONENT: &str = "universe";

/// Components a build in `component` may draw its dependencies from.
#[must_use]
pub fn component_dependencies(component: &str) -> &'static [&'static str] {
    match component {
        "main" => &["main"],
        "restricted" => &["main", "restricted"],
        "universe" => &["main", "universe"],
        "multiverse" => &["main", "restricted", "universe", "multiverse"],
        "partner" => &["partner"],
        _ => &[],
    }
}

fn expand_components(component: &str) -> Vec<String> {
    component_dependencies(component)
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn dependency_error(message: impl Into<String>) -> Error {
    Error::ArchiveDependency(message.into())
}

impl ArchiveEngine {
    pub fn add_archive_dependency(
        &self,
        archive_id: i64,
        dependency_id: i64,
        pocket: Pocket,
        component: Option<&str>,
        added_by: i64,
    ) -> Result<ArchiveDependency> {
        let archive = self.archive(archive_id)?;
        let dependency = self.archive(dependency_id)?;

        if archive.id == dependency.id {
            return Err(dependency_error("An archive should not depend on itself."));
        }
        if self
            .store
            .get_archive_dependency(archive.id, dependency.id)?
            .is_some()
        {
            return Err(dependency_error("This dependency is already registered."));
        }
        if !self.can_view(Some(added_by), &dependency)? {
            return Err(dependency_error(
                "You don't have permission to use this dependency.",
            ));
        }
        if !dependency.enabled {
            return Err(dependency_error("Dependencies must not be disabled."));
        }
        if dependency.distribution_id != archive.distribution_id {
            return Err(dependency_error(
                "Dependencies must be for the same distribution.",
            ));
        }
        if dependency.private && !archive.private {
            return Err(dependency_error("Public PPAs cannot depend on private ones."));
        }

        let component = component
            .map(|name| self.component_from_text(name))
            .transpose()?;

        if dependency.is_ppa() {
            if pocket != Pocket::Release {
                return Err(dependency_error(
                    "Non-primary archives only support the RELEASE pocket.",
                ));
            }
            let default = dependency.default_component().unwrap_or("main");
            if component.as_deref().is_some_and(|c| c != default) {
                return Err(dependency_error(format!(
                    "Non-primary archives only support the '{default}' component."
                )));
            }
        }

        let mut edge = ArchiveDependency {
            id: 0,
            archive_id: archive.id,
            dependency_id: dependency.id,
            pocket,
            component,
            created_at: Utc::now(),
        };
        edge.id = self.store.create_archive_dependency(&edge)?;

        info!(
            archive = %archive.name,
            dependency = %dependency.name,
            pocket = %pocket,
            "Archive dependency added"
        );
        Ok(edge)
    }

    pub fn remove_archive_dependency(&self, archive_id: i64, dependency_id: i64) -> Result<()> {
        let archive = self.archive(archive_id)?;
        let dependency = self.archive(dependency_id)?;

        if !self.store.delete_archive_dependency(archive.id, dependency.id)? {
            return Err(dependency_error(format!(
                "{} is not a dependency of {}.",
                dependency.display_name, archive.display_name
            )));
        }

        info!(archive = %archive.name, dependency = %dependency.name, "Archive dependency removed");
        Ok(())
    }

    /// Dependencies in declaration order.
    pub fn archive_dependencies(&self, archive_id: i64) -> Result<Vec<ArchiveDependency>> {
        self.store.list_archive_dependencies(archive_id)
    }

    pub fn get_archive_dependency(
        &self,
        archive_id: i64,
        dependency_id: i64,
    ) -> Result<Option<ArchiveDependency>> {
        self.store.get_archive_dependency(archive_id, dependency_id)
    }

    /// Component of the package's newest active publication in the
    /// distribution's primary archive.
    pub fn primary_current_component(
        &self,
        distribution_id: i64,
        series_id: i64,
        source_name: &str,
    ) -> Result<String> {
        let component = match self.main_archive(distribution_id)? {
            Some(primary) => self.latest_published_component(primary.id, series_id, source_name)?,
            None => None,
        };
        Ok(component.unwrap_or_else(|| DEFAULT_PRIMARY_COMPONENT.to_string()))
    }

    /// Ordered search space for build dependencies: the archive itself, then
    /// each declared dependency with its own pocket and components.
    pub fn expand_dependencies(
        &self,
        archive: &Archive,
        arch_series_id: i64,
        pocket: Pocket,
        component: &str,
        source_name: &str,
    ) -> Result<Vec<DependencyScope>> {
        let arch_series = self
            .store
            .get_arch_series(arch_series_id)?
            .ok_or(Error::NotFound)?;

        let own_component = archive.default_component().unwrap_or(component);
        let mut scopes = vec![DependencyScope {
            archive_id: archive.id,
            pocket,
            components: expand_components(own_component),
        }];

        let edges = self.store.list_archive_dependencies(archive.id)?;
        if edges.is_empty() {
            return Ok(scopes);
        }

        // Only looked up when some edge leaves its component unset.
        let mut primary_component: Option<String> = None;

        for edge in edges {
            let dependency = self.archive(edge.dependency_id)?;
            let components = match (&edge.component, dependency.default_component()) {
                (Some(component), _) => expand_components(component),
                (None, Some(default)) => expand_components(default),
                (None, None) => {
                    if primary_component.is_none() {
                        primary_component = Some(self.primary_current_component(
                            archive.distribution_id,
                            arch_series.series_id,
                            source_name,
                        )?);
                    }
                    expand_components(
                        primary_component
                            .as_deref()
                            .unwrap_or(DEFAULT_PRIMARY_COMPONENT),
                    )
                }
            };

            scopes.push(DependencyScope {
                archive_id: dependency.id,
                pocket: edge.pocket,
                components,
            });
        }

        Ok(scopes)
    }

    /// PUBLISHED binaries named `dependency_name` that a build of
    /// `source_name` could use, best candidate first.
    pub fn find_dep_candidates(
        &self,
        archive_id: i64,
        arch_series_id: i64,
        pocket: Pocket,
        component: &str,
        source_name: &str,
        dependency_name: &str,
    ) -> Result<Vec<BinaryPublication>> {
        let archive = self.archive(archive_id)?;
        let scopes =
            self.expand_dependencies(&archive, arch_series_id, pocket, component, source_name)?;
        self.store
            .find_dependency_candidates(arch_series_id, dependency_name, &scopes)
    }
}

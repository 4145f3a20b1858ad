use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info};

use super::ArchiveEngine;
use crate::error::{Error, Result, UploadDenial};
use crate::types::*;

impl ArchiveEngine {
    /// Grants of `kind` on the archive that apply to the person, directly or
    /// through team participation.
    fn grants_held(
        &self,
        archive_id: i64,
        person_id: i64,
        kind: PermissionKind,
    ) -> Result<Vec<PermissionGrant>> {
        let mut participation: HashMap<i64, bool> = HashMap::new();
        let mut held = Vec::new();

        for grant in self.store.list_grants(archive_id, Some(kind))? {
            let applies = match participation.get(&grant.person_id) {
                Some(applies) => *applies,
                None => {
                    let applies = self.membership.in_team(person_id, grant.person_id)?;
                    participation.insert(grant.person_id, applies);
                    applies
                }
            };
            if applies {
                held.push(grant);
            }
        }

        Ok(held)
    }

    /// Whether the archive's policy allows touching `series` in `pocket`.
    #[must_use]
    pub fn can_modify_suite(&self, archive: &Archive, series: &DistroSeries, pocket: Pocket) -> bool {
        if archive.purpose.allows_release_pocket_updates() {
            return true;
        }
        if series.status == SeriesStatus::Frozen {
            return true;
        }

        let stable = series.status.is_stable();
        if pocket == Pocket::Release && stable {
            return false;
        }
        let pre_release = matches!(pocket, Pocket::Release | Pocket::Proposed | Pocket::Backports);
        if !pre_release && !stable {
            return false;
        }
        true
    }

    /// Pocket legality for the archive's purpose and the series state.
    pub fn check_upload_to_pocket(
        &self,
        archive: &Archive,
        series: &DistroSeries,
        pocket: Pocket,
        person_id: Option<i64>,
    ) -> Result<Option<UploadDenial>> {
        match archive.purpose {
            ArchivePurpose::Partner => {
                if !matches!(pocket, Pocket::Release | Pocket::Proposed) {
                    return Ok(Some(UploadDenial::InvalidPocketForPartnerArchive));
                }
            }
            ArchivePurpose::Ppa => {
                if pocket != Pocket::Release {
                    return Ok(Some(UploadDenial::InvalidPocketForPPA));
                }
            }
            ArchivePurpose::Copy => {}
            ArchivePurpose::Primary => {
                if !self.can_modify_suite(archive, series, pocket) {
                    return Ok(Some(UploadDenial::CannotUploadToPocket {
                        pocket,
                        status: series.status.to_string(),
                    }));
                }

                if pocket == Pocket::Release {
                    let distribution = self.distribution(archive.distribution_id)?;
                    let queue_admin = match person_id {
                        Some(person_id) => self.can_administer_queue(
                            archive,
                            person_id,
                            &[],
                            Some(pocket),
                            Some(series.id),
                        )?,
                        None => false,
                    };
                    if distribution.redirect_release_uploads && !queue_admin {
                        return Ok(Some(UploadDenial::RedirectedPocket {
                            suite: series.suite(pocket),
                            redirect_suite: series.suite(Pocket::Proposed),
                            redirect: Pocket::Proposed,
                        }));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Full upload check: archive state, pocket legality, then rights.
    /// Expected denials are returned, never raised.
    #[allow(clippy::too_many_arguments)]
    pub fn check_upload(
        &self,
        archive: &Archive,
        person_id: i64,
        series: &DistroSeries,
        source_name: Option<&str>,
        component: Option<&str>,
        pocket: Pocket,
        strict_component: bool,
    ) -> Result<Option<UploadDenial>> {
        let denial = match self.check_archive_state(archive, series) {
            Some(denial) => Some(denial),
            None => match self.check_upload_to_pocket(archive, series, pocket, Some(person_id))? {
                Some(denial) => Some(denial),
                None => self.check_upload_rights(
                    archive,
                    person_id,
                    series,
                    source_name,
                    component,
                    pocket,
                    strict_component,
                )?,
            },
        };

        if let Some(denial) = &denial {
            debug!(archive = %archive.name, person_id, %denial, "Upload denied");
        }
        Ok(denial)
    }

    /// Rights check without pocket legality.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_upload(
        &self,
        archive: &Archive,
        person_id: i64,
        source_name: Option<&str>,
        component: Option<&str>,
        series: &DistroSeries,
        strict_component: bool,
        pocket: Option<Pocket>,
    ) -> Result<Option<UploadDenial>> {
        let denial = match self.check_archive_state(archive, series) {
            Some(denial) => Some(denial),
            None => self.check_upload_rights(
                archive,
                person_id,
                series,
                source_name,
                component,
                pocket.unwrap_or(Pocket::Release),
                strict_component,
            )?,
        };

        if let Some(denial) = &denial {
            debug!(archive = %archive.name, person_id, %denial, "Upload denied");
        }
        Ok(denial)
    }

    fn check_archive_state(&self, archive: &Archive, series: &DistroSeries) -> Option<UploadDenial> {
        if !archive.enabled {
            return Some(UploadDenial::ArchiveDisabled {
                archive: archive.display_name.clone(),
            });
        }
        if series.status == SeriesStatus::Obsolete && !archive.permit_obsolete_series_uploads {
            return Some(UploadDenial::CannotUploadToSeries {
                series: series.name.clone(),
            });
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    fn check_upload_rights(
        &self,
        archive: &Archive,
        person_id: i64,
        series: &DistroSeries,
        source_name: Option<&str>,
        component: Option<&str>,
        pocket: Pocket,
        strict_component: bool,
    ) -> Result<Option<UploadDenial>> {
        if archive.is_ppa() {
            return Ok(if self.can_upload_to_ppa(archive, person_id)? {
                None
            } else {
                Some(UploadDenial::CannotUploadToPPA)
            });
        }

        let held = self.grants_held(archive.id, person_id, PermissionKind::Upload)?;

        let pocket_grant = held.iter().any(|grant| {
            matches!(grant.target, PermissionTarget::Pocket { pocket: p, series_id }
                if p == pocket && series_id.is_none_or(|id| id == series.id))
        });
        if pocket_grant {
            return Ok(None);
        }

        if let Some(name) = source_name {
            let package_grant = held
                .iter()
                .any(|grant| matches!(&grant.target, PermissionTarget::Package(p) if p == name));
            if package_grant || self.packageset_upload_allowed(archive, &held, series, name)? {
                return Ok(None);
            }
        }

        let components: Vec<&str> = held.iter().filter_map(PermissionGrant::component).collect();
        if components.is_empty() {
            let has_packagesets = held
                .iter()
                .any(|grant| matches!(grant.target, PermissionTarget::Packageset { .. }));
            return Ok(Some(if has_packagesets {
                UploadDenial::InsufficientUploadRights
            } else {
                UploadDenial::NoRightsForArchive
            }));
        }

        if let Some(component) = component {
            if strict_component && !components.contains(&component) {
                return Ok(Some(UploadDenial::NoRightsForComponent {
                    component: component.to_string(),
                }));
            }
        }

        Ok(None)
    }

    /// Owner-team members may upload, as may holders of a grant on the PPA's
    /// default component.
    fn can_upload_to_ppa(&self, archive: &Archive, person_id: i64) -> Result<bool> {
        if self.membership.in_team(person_id, archive.owner_id)? {
            return Ok(true);
        }
        let default_component = archive.default_component().unwrap_or("main");
        Ok(self
            .grants_held(archive.id, person_id, PermissionKind::Upload)?
            .iter()
            .any(|grant| grant.component() == Some(default_component)))
    }

    /// Packageset grants covering `name` in the series. When any grant on a
    /// covering set is explicit, only explicit grants count.
    fn packageset_upload_allowed(
        &self,
        archive: &Archive,
        held: &[PermissionGrant],
        series: &DistroSeries,
        name: &str,
    ) -> Result<bool> {
        let covering = self.store.packagesets_covering(series.id, name)?;
        if covering.is_empty() {
            return Ok(false);
        }

        let covers = |grant: &PermissionGrant| -> Option<bool> {
            match grant.target {
                PermissionTarget::Packageset {
                    packageset_id,
                    explicit,
                } if covering.contains(&packageset_id) => Some(explicit),
                _ => None,
            }
        };

        let explicit_only = self
            .store
            .list_grants(archive.id, Some(PermissionKind::Upload))?
            .iter()
            .filter_map(covers)
            .any(|explicit| explicit);

        Ok(held
            .iter()
            .filter_map(covers)
            .any(|explicit| explicit || !explicit_only))
    }

    /// True when the person's queue-admin component grants cover every
    /// requested component, or a pocket grant matches pocket and series.
    pub fn can_administer_queue(
        &self,
        archive: &Archive,
        person_id: i64,
        components: &[&str],
        pocket: Option<Pocket>,
        series_id: Option<i64>,
    ) -> Result<bool> {
        let held = self.grants_held(archive.id, person_id, PermissionKind::QueueAdmin)?;

        let allowed: Vec<&str> = held.iter().filter_map(PermissionGrant::component).collect();
        if !allowed.is_empty() && components.iter().all(|c| allowed.contains(c)) {
            return Ok(true);
        }

        let Some(pocket) = pocket else {
            return Ok(false);
        };
        Ok(held.iter().any(|grant| {
            matches!(grant.target, PermissionTarget::Pocket { pocket: p, series_id: s }
                if p == pocket && (s.is_none() || s == series_id))
        }))
    }

    // Grant management

    fn ensure_grant(
        &self,
        archive: &Archive,
        person_id: i64,
        kind: PermissionKind,
        target: PermissionTarget,
    ) -> Result<PermissionGrant> {
        let person = self.person(person_id)?;
        if let Some(existing) = self.store.find_grant(archive.id, person_id, kind, &target)? {
            return Ok(existing);
        }

        let mut grant = PermissionGrant {
            id: 0,
            archive_id: archive.id,
            person_id,
            kind,
            target,
            created_at: Utc::now(),
        };
        grant.id = self.store.create_grant(&grant)?;

        info!(
            archive = %archive.name,
            person = %person.name,
            kind = %kind,
            target = %grant.target,
            "Permission granted"
        );
        Ok(grant)
    }

    fn component_target(&self, archive: &Archive, component: &str) -> Result<PermissionTarget> {
        let component = self.component_from_text(component)?;
        if let Some(default) = archive.default_component() {
            if archive.is_ppa() && component != default {
                return Err(Error::InvalidPermission(format!(
                    "Component for PPAs should be '{default}'"
                )));
            }
        }
        Ok(PermissionTarget::Component(component))
    }

    pub fn new_component_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
        component: &str,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        let target = self.component_target(&archive, component)?;
        self.ensure_grant(&archive, person_id, PermissionKind::Upload, target)
    }

    pub fn new_package_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
        source_name: &str,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        if source_name.trim().is_empty() {
            return Err(Error::InvalidPermission(
                "source package name cannot be empty".to_string(),
            ));
        }
        self.ensure_grant(
            &archive,
            person_id,
            PermissionKind::Upload,
            PermissionTarget::Package(source_name.to_string()),
        )
    }

    pub fn new_packageset_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
        packageset_id: i64,
        explicit: bool,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        self.store
            .get_packageset(packageset_id)?
            .ok_or(Error::NotFound)?;
        self.ensure_grant(
            &archive,
            person_id,
            PermissionKind::Upload,
            PermissionTarget::Packageset {
                packageset_id,
                explicit,
            },
        )
    }

    pub fn new_pocket_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
        pocket: Pocket,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        match archive.purpose {
            ArchivePurpose::Ppa => {
                return Err(Error::InvalidPermission(
                    UploadDenial::InvalidPocketForPPA.to_string(),
                ));
            }
            ArchivePurpose::Partner if !matches!(pocket, Pocket::Release | Pocket::Proposed) => {
                return Err(Error::InvalidPermission(
                    UploadDenial::InvalidPocketForPartnerArchive.to_string(),
                ));
            }
            _ => {}
        }
        self.ensure_grant(
            &archive,
            person_id,
            PermissionKind::Upload,
            PermissionTarget::Pocket {
                pocket,
                series_id: None,
            },
        )
    }

    pub fn new_queue_admin(
        &self,
        archive_id: i64,
        person_id: i64,
        component: &str,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        let target = self.component_target(&archive, component)?;
        self.ensure_grant(&archive, person_id, PermissionKind::QueueAdmin, target)
    }

    pub fn new_pocket_queue_admin(
        &self,
        archive_id: i64,
        person_id: i64,
        pocket: Pocket,
        series_id: Option<i64>,
    ) -> Result<PermissionGrant> {
        let archive = self.archive(archive_id)?;
        if let Some(series_id) = series_id {
            let series = self.series(series_id)?;
            if series.distribution_id != archive.distribution_id {
                return Err(Error::InvalidPermission(format!(
                    "{} does not belong to the archive's distribution",
                    series.name
                )));
            }
        }
        self.ensure_grant(
            &archive,
            person_id,
            PermissionKind::QueueAdmin,
            PermissionTarget::Pocket { pocket, series_id },
        )
    }

    pub fn delete_grant(&self, grant_id: i64) -> Result<()> {
        if !self.store.delete_grant(grant_id)? {
            return Err(Error::NotFound);
        }
        info!(grant_id, "Permission revoked");
        Ok(())
    }

    pub fn list_grants(
        &self,
        archive_id: i64,
        kind: Option<PermissionKind>,
    ) -> Result<Vec<PermissionGrant>> {
        self.store.list_grants(archive_id, kind)
    }

    // Listings

    fn grants_for_target(
        &self,
        archive_id: i64,
        kind: PermissionKind,
        target: &PermissionTarget,
    ) -> Result<Vec<PermissionGrant>> {
        Ok(self
            .store
            .list_grants(archive_id, Some(kind))?
            .into_iter()
            .filter(|grant| &grant.target == target)
            .collect())
    }

    pub fn uploaders_for_component(
        &self,
        archive_id: i64,
        component: &str,
    ) -> Result<Vec<PermissionGrant>> {
        self.grants_for_target(
            archive_id,
            PermissionKind::Upload,
            &PermissionTarget::Component(component.to_string()),
        )
    }

    pub fn uploaders_for_package(
        &self,
        archive_id: i64,
        source_name: &str,
    ) -> Result<Vec<PermissionGrant>> {
        self.grants_for_target(
            archive_id,
            PermissionKind::Upload,
            &PermissionTarget::Package(source_name.to_string()),
        )
    }

    pub fn queue_admins_for_component(
        &self,
        archive_id: i64,
        component: &str,
    ) -> Result<Vec<PermissionGrant>> {
        self.grants_for_target(
            archive_id,
            PermissionKind::QueueAdmin,
            &PermissionTarget::Component(component.to_string()),
        )
    }

    /// Component upload grants applying to the person, including team grants.
    pub fn components_for_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
    ) -> Result<Vec<PermissionGrant>> {
        let mut grants = self.grants_held(archive_id, person_id, PermissionKind::Upload)?;
        grants.retain(|grant| matches!(grant.target, PermissionTarget::Component(_)));
        Ok(grants)
    }

    pub fn packagesets_for_uploader(
        &self,
        archive_id: i64,
        person_id: i64,
    ) -> Result<Vec<PermissionGrant>> {
        let mut grants = self.grants_held(archive_id, person_id, PermissionKind::Upload)?;
        grants.retain(|grant| matches!(grant.target, PermissionTarget::Packageset { .. }));
        Ok(grants)
    }

    pub fn components_for_queue_admin(
        &self,
        archive_id: i64,
        person_id: i64,
    ) -> Result<Vec<PermissionGrant>> {
        let mut grants = self.grants_held(archive_id, person_id, PermissionKind::QueueAdmin)?;
        grants.retain(|grant| matches!(grant.target, PermissionTarget::Component(_)));
        Ok(grants)
    }

    pub fn pockets_for_queue_admin(
        &self,
        archive_id: i64,
        person_id: i64,
    ) -> Result<Vec<PermissionGrant>> {
        let mut grants = self.grants_held(archive_id, person_id, PermissionKind::QueueAdmin)?;
        grants.retain(|grant| matches!(grant.target, PermissionTarget::Pocket { .. }));
        Ok(grants)
    }

    // Packagesets

    pub fn new_packageset(
        &self,
        series_id: i64,
        name: &str,
        description: &str,
        sources: &[&str],
    ) -> Result<Packageset> {
        self.series(series_id)?;
        let mut packageset = Packageset {
            id: 0,
            series_id,
            name: name.to_string(),
            description: description.to_string(),
        };
        packageset.id = self.store.create_packageset(&packageset)?;
        for source in sources {
            self.store.add_packageset_source(packageset.id, source)?;
        }
        info!(packageset = %packageset.name, sources = sources.len(), "Packageset created");
        Ok(packageset)
    }

    /// Makes every package of `child` part of `parent` as well.
    pub fn include_packageset(&self, parent_id: i64, child_id: i64) -> Result<()> {
        let parent = self.store.get_packageset(parent_id)?.ok_or(Error::NotFound)?;
        let child = self.store.get_packageset(child_id)?.ok_or(Error::NotFound)?;
        if parent.series_id != child.series_id {
            return Err(Error::InvalidState(
                "packagesets can only include sets of the same series".to_string(),
            ));
        }
        self.store.add_packageset_inclusion(parent_id, child_id)
    }
}

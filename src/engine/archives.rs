use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use super::ArchiveEngine;
use crate::auth::generate_build_secret;
use crate::error::{Error, Result};
use crate::store::reference::{ArchiveReference, reference_of};
use crate::types::*;

const MAX_ARCHIVE_NAME_LEN: usize = 64;

/// Archive names are lowercase, start with a letter or digit and may contain
/// `+`, `.` and `-` afterwards.
pub fn validate_archive_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName("archive name cannot be empty".to_string()));
    }
    if name.len() > MAX_ARCHIVE_NAME_LEN {
        return Err(Error::InvalidName(format!(
            "archive name cannot exceed {MAX_ARCHIVE_NAME_LEN} characters"
        )));
    }
    let mut chars = name.chars();
    let leading_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !leading_ok {
        return Err(Error::InvalidName(format!(
            "'{name}': archive names must start with a lowercase letter or digit"
        )));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '-'))
    {
        return Err(Error::InvalidName(format!(
            "'{name}': archive names may only contain lowercase letters, digits, '+', '.' and '-'"
        )));
    }
    Ok(())
}

impl ArchiveEngine {
    pub fn create_archive(&self, new: NewArchive) -> Result<Archive> {
        let distribution = self.distribution(new.distribution_id)?;
        let owner = self.person(new.owner_id)?;

        let name = match (&new.name, new.purpose) {
            (Some(name), _) => name.clone(),
            (None, ArchivePurpose::Ppa) => self.config.default_ppa_name.clone(),
            (None, purpose) => purpose
                .default_name()
                .ok_or_else(|| Error::InvalidName(format!("{purpose} archives must be named")))?
                .to_string(),
        };
        validate_archive_name(&name)?;

        if name == distribution.name {
            return Err(Error::InvalidName(format!(
                "archives cannot have the same name as their distribution ('{name}')"
            )));
        }

        // The bare distribution reference names exactly one primary archive.
        if new.purpose == ArchivePurpose::Primary
            && self
                .store
                .get_archive_by_purpose(distribution.id, ArchivePurpose::Primary)?
                .is_some()
        {
            return Err(Error::AlreadyExists(format!(
                "{} already has a primary archive",
                distribution.display_name
            )));
        }

        let existing = match new.purpose {
            ArchivePurpose::Ppa => self.store.get_ppa(distribution.id, owner.id, &name)?,
            _ => self.store.get_archive_by_name(distribution.id, &name)?,
        };
        if existing.is_some() {
            return Err(Error::AlreadyExists(match new.purpose {
                ArchivePurpose::Ppa => format!(
                    "{} already has a PPA for {} named '{name}'",
                    owner.display_name, distribution.display_name
                ),
                _ => format!("{} already has an archive named '{name}'", distribution.display_name),
            }));
        }

        // Archives of private teams are never public.
        let private = new.private || owner.private;
        let require_virtualized = new
            .require_virtualized
            .unwrap_or(matches!(new.purpose, ArchivePurpose::Ppa | ArchivePurpose::Copy));

        let processor_ids = match new.processor_ids {
            Some(ids) => ids,
            None => self
                .store
                .list_processors()?
                .into_iter()
                .filter(|p| p.build_by_default && !p.restricted)
                .map(|p| p.id)
                .collect(),
        };

        let display_name = new.display_name.unwrap_or_else(|| match new.purpose {
            ArchivePurpose::Primary => format!("Primary Archive for {}", distribution.display_name),
            ArchivePurpose::Partner => format!("Partner Archive for {}", distribution.display_name),
            ArchivePurpose::Ppa => format!("PPA named {name} for {}", owner.display_name),
            ArchivePurpose::Copy => format!("Copy archive {name} for {}", owner.display_name),
        });

        let now = Utc::now();
        let mut archive = Archive {
            id: 0,
            distribution_id: distribution.id,
            owner_id: owner.id,
            name,
            display_name,
            purpose: new.purpose,
            status: ArchiveStatus::Active,
            enabled: true,
            private,
            require_virtualized,
            permit_obsolete_series_uploads: new.permit_obsolete_series_uploads,
            signing_key_fingerprint: None,
            build_secret: private.then(generate_build_secret),
            created_at: now,
            updated_at: now,
        };

        archive.id = self.store.create_archive(&archive, &processor_ids)?;

        info!(
            archive = %archive.name,
            purpose = %archive.purpose,
            owner = %owner.name,
            private,
            "Archive created"
        );

        Ok(archive)
    }

    pub fn get_archive(&self, id: i64) -> Result<Option<Archive>> {
        self.store.get_archive(id)
    }

    /// Non-PPA archive of a distribution by purpose and name.
    pub fn get_archive_by_name(
        &self,
        distribution_id: i64,
        purpose: ArchivePurpose,
        name: &str,
    ) -> Result<Option<Archive>> {
        if purpose == ArchivePurpose::Ppa {
            return Err(Error::InvalidState(
                "PPA names are only unique per owner; use get_ppa_by_name".to_string(),
            ));
        }
        Ok(self
            .store
            .get_archive_by_name(distribution_id, name)?
            .filter(|archive| archive.purpose == purpose))
    }

    pub fn get_ppa_by_name(&self, owner_id: i64, distribution_id: i64, name: &str) -> Result<Archive> {
        self.store
            .get_ppa(distribution_id, owner_id, name)?
            .ok_or_else(|| Error::NoSuchPPA(name.to_string()))
    }

    /// The distribution's PRIMARY archive.
    pub fn main_archive(&self, distribution_id: i64) -> Result<Option<Archive>> {
        self.store
            .get_archive_by_purpose(distribution_id, ArchivePurpose::Primary)
    }

    /// Resolves a reference string. Malformed references and archives the
    /// viewer may not see resolve to `None`.
    pub fn get_by_reference(&self, reference: &str, viewer: Option<i64>) -> Result<Option<Archive>> {
        match self.resolve_reference(reference)? {
            Some(archive) if self.can_view(viewer, &archive)? => Ok(Some(archive)),
            _ => Ok(None),
        }
    }

    /// Reference lookup without visibility checks, for administrative tools.
    pub fn resolve_reference(&self, reference: &str) -> Result<Option<Archive>> {
        let Some(parsed) = ArchiveReference::parse(reference) else {
            return Ok(None);
        };

        Ok(match parsed {
            ArchiveReference::Primary { distribution } => {
                match self.store.get_distribution_by_name(&distribution)? {
                    Some(distro) => self.main_archive(distro.id)?,
                    None => None,
                }
            }
            ArchiveReference::Named {
                distribution,
                archive,
            } => match self.store.get_distribution_by_name(&distribution)? {
                Some(distro) => self.store.get_archive_by_name(distro.id, &archive)?,
                None => None,
            },
            ArchiveReference::Ppa {
                owner,
                distribution,
                archive,
            } => {
                let owner = self.store.get_person_by_name(&owner)?;
                let distro = self.store.get_distribution_by_name(&distribution)?;
                match (owner, distro) {
                    (Some(owner), Some(distro)) => self.store.get_ppa(distro.id, owner.id, &archive)?,
                    _ => None,
                }
            }
        })
    }

    pub fn reference(&self, archive: &Archive) -> Result<String> {
        let distribution = self.distribution(archive.distribution_id)?;
        let owner = self.person(archive.owner_id)?;
        Ok(reference_of(archive, &distribution, &owner))
    }

    pub fn list_archives(&self, distribution_id: i64) -> Result<Vec<Archive>> {
        self.store.list_archives(distribution_id)
    }

    /// Re-enables an archive, releasing its suspended builds.
    pub fn enable(&self, archive_id: i64) -> Result<()> {
        let archive = self.archive(archive_id)?;
        if archive.enabled {
            return Err(Error::InvalidState(format!(
                "{} is already enabled",
                archive.display_name
            )));
        }
        if !archive.is_active() {
            return Err(Error::InvalidState(format!(
                "{} is being deleted and cannot be enabled",
                archive.display_name
            )));
        }

        let released = self.store.set_archive_enabled(archive_id, true)?;
        info!(archive = %archive.name, released, "Archive enabled");
        Ok(())
    }

    /// Disables an archive, suspending its pending builds.
    pub fn disable(&self, archive_id: i64) -> Result<()> {
        let archive = self.archive(archive_id)?;
        if !archive.enabled {
            return Err(Error::InvalidState(format!(
                "{} is already disabled",
                archive.display_name
            )));
        }

        let suspended = self.store.set_archive_enabled(archive_id, false)?;
        info!(archive = %archive.name, suspended, "Archive disabled");
        Ok(())
    }

    pub fn delete(&self, archive_id: i64, deleted_by: i64) -> Result<()> {
        let archive = self.archive(archive_id)?;
        if !archive.is_active() {
            return Err(Error::ArchiveAlreadyDeleted);
        }

        self.store.mark_archive_deleting(archive_id)?;
        info!(archive = %archive.name, deleted_by, "Archive marked for deletion");
        Ok(())
    }

    /// Only COPY archives and deleted PPAs may change name.
    ///
    /// The engine never sets DELETED itself: `delete` leaves the archive
    /// DELETING and the external reaper moves it to DELETED once its
    /// publications are gone.
    pub fn rename(&self, archive_id: i64, new_name: &str) -> Result<Archive> {
        let mut archive = self.archive(archive_id)?;
        let renamable = match archive.purpose {
            ArchivePurpose::Copy => true,
            ArchivePurpose::Ppa => archive.status == ArchiveStatus::Deleted,
            ArchivePurpose::Primary | ArchivePurpose::Partner => false,
        };
        if !renamable {
            return Err(Error::InvalidState(format!(
                "{} cannot be renamed",
                archive.display_name
            )));
        }
        validate_archive_name(new_name)?;

        let old_name = std::mem::replace(&mut archive.name, new_name.to_string());
        self.store.update_archive(&archive)?;
        info!(from = %old_name, to = %archive.name, "Archive renamed");
        Ok(archive)
    }

    pub fn set_private(&self, archive_id: i64, private: bool) -> Result<Archive> {
        let mut archive = self.archive(archive_id)?;
        if archive.private == private {
            return Ok(archive);
        }

        let owner = self.person(archive.owner_id)?;
        if !private && owner.private {
            return Err(Error::CannotSwitchPrivacy(
                "Private teams may not have public archives.".to_string(),
            ));
        }

        let secret = private.then(generate_build_secret);
        self.store
            .set_archive_privacy(archive_id, private, secret.as_deref())?;

        archive.private = private;
        archive.build_secret = secret;
        info!(archive = %archive.name, private, "Archive privacy switched");
        Ok(archive)
    }

    /// Persists the flag and recomputes pending builds in one transaction.
    pub fn set_require_virtualized(&self, archive_id: i64, require_virtualized: bool) -> Result<usize> {
        let archive = self.archive(archive_id)?;
        let updated = self
            .store
            .set_require_virtualized(archive_id, require_virtualized)?;
        info!(
            archive = %archive.name,
            require_virtualized,
            updated,
            "Build virtualization recomputed"
        );
        Ok(updated)
    }

    pub fn set_permit_obsolete_series_uploads(&self, archive_id: i64, permit: bool) -> Result<()> {
        let mut archive = self.archive(archive_id)?;
        archive.permit_obsolete_series_uploads = permit;
        self.store.update_archive(&archive)
    }

    pub fn processors(&self, archive_id: i64) -> Result<Vec<Processor>> {
        self.store.list_archive_processors(archive_id)
    }

    /// Replaces the enabled processor set. Restricted processors may only be
    /// added or removed by administrators.
    pub fn set_processors(&self, archive_id: i64, processor_ids: &[i64], requester: i64) -> Result<()> {
        let archive = self.archive(archive_id)?;
        let current: BTreeSet<i64> = self
            .store
            .list_archive_processors(archive_id)?
            .into_iter()
            .map(|p| p.id)
            .collect();
        let wanted: BTreeSet<i64> = processor_ids.iter().copied().collect();

        let mut is_admin = None;
        for id in current.symmetric_difference(&wanted) {
            let processor = self.store.get_processor(*id)?.ok_or(Error::NotFound)?;
            if !processor.restricted {
                continue;
            }
            let admin = match is_admin {
                Some(admin) => admin,
                None => *is_admin.insert(self.membership.is_admin(requester)?),
            };
            if !admin {
                let action = if wanted.contains(id) { "enable" } else { "disable" };
                return Err(Error::CannotModifyArchiveProcessor(format!(
                    "Only administrators may {action} the restricted processor '{}'.",
                    processor.name
                )));
            }
        }

        let ids: Vec<i64> = wanted.into_iter().collect();
        self.store.set_archive_processors(archive_id, &ids)?;
        info!(archive = %archive.name, processors = ids.len(), "Archive processors updated");
        Ok(())
    }

    pub fn mark_suite_dirty(&self, archive_id: i64, series_id: i64, pocket: Pocket) -> Result<()> {
        let series = self.series(series_id)?;
        self.store
            .add_dirty_suite(archive_id, &series.suite(pocket))
    }

    pub fn dirty_suites(&self, archive_id: i64) -> Result<Vec<String>> {
        self.store.list_dirty_suites(archive_id)
    }

    pub fn clear_dirty_suites(&self, archive_id: i64) -> Result<()> {
        self.store.clear_dirty_suites(archive_id)
    }

    /// Public archives are visible to everyone. Private ones to the owner's
    /// team, administrators, grant holders and valid subscribers.
    pub fn can_view(&self, person_id: Option<i64>, archive: &Archive) -> Result<bool> {
        if !archive.private {
            return Ok(true);
        }
        let Some(person_id) = person_id else {
            return Ok(false);
        };

        if self.membership.in_team(person_id, archive.owner_id)?
            || self.membership.is_admin(person_id)?
        {
            return Ok(true);
        }

        for grant in self.store.list_grants(archive.id, None)? {
            if self.membership.in_team(person_id, grant.person_id)? {
                return Ok(true);
            }
        }

        self.has_valid_subscription(archive.id, person_id)
    }
}

//! Permission-gated package copies. Nothing is copied here: validated
//! requests become jobs on the [`JobQueue`](crate::jobs::JobQueue).

use std::collections::HashSet;

use tracing::info;

use super::ArchiveEngine;
use crate::error::{Error, Result};
use crate::store::SourceFilter;
use crate::types::*;

/// Copy of one exact source version into the target archive.
#[derive(Debug, Clone)]
pub struct CopyPackageRequest {
    pub source_name: String,
    pub version: String,
    pub from_archive_id: i64,
    pub to_pocket: String,
    pub requester_id: Option<i64>,
    /// Defaults to the series the source is published in.
    pub to_series: Option<String>,
    pub from_series: Option<String>,
    pub from_pocket: Option<String>,
    pub include_binaries: bool,
    pub sponsored_id: Option<i64>,
    pub unembargo: bool,
    pub auto_approve: bool,
    pub silent: bool,
    pub phased_update_percentage: Option<i64>,
    pub move_package: bool,
}

impl CopyPackageRequest {
    pub fn new(
        source_name: impl Into<String>,
        version: impl Into<String>,
        from_archive_id: i64,
        to_pocket: impl Into<String>,
        requester_id: i64,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            version: version.into(),
            from_archive_id,
            to_pocket: to_pocket.into(),
            requester_id: Some(requester_id),
            to_series: None,
            from_series: None,
            from_pocket: None,
            include_binaries: false,
            sponsored_id: None,
            unembargo: false,
            auto_approve: false,
            silent: false,
            phased_update_percentage: None,
            move_package: false,
        }
    }
}

/// Copy of the latest published version of each named source.
#[derive(Debug, Clone)]
pub struct CopyPackagesRequest {
    pub source_names: Vec<String>,
    pub from_archive_id: i64,
    pub to_pocket: String,
    pub requester_id: Option<i64>,
    pub to_series: Option<String>,
    pub from_series: Option<String>,
    pub include_binaries: bool,
    pub sponsored_id: Option<i64>,
    pub unembargo: bool,
    pub auto_approve: bool,
    pub silent: bool,
}

impl CopyPackagesRequest {
    pub fn new(
        source_names: Vec<String>,
        from_archive_id: i64,
        to_pocket: impl Into<String>,
        requester_id: i64,
    ) -> Self {
        Self {
            source_names,
            from_archive_id,
            to_pocket: to_pocket.into(),
            requester_id: Some(requester_id),
            to_series: None,
            from_series: None,
            include_binaries: false,
            sponsored_id: None,
            unembargo: false,
            auto_approve: false,
            silent: false,
        }
    }
}

/// Options shared by `sync_source` and `sync_sources`.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub from_archive_id: i64,
    pub to_pocket: String,
    pub requester_id: Option<i64>,
    pub to_series: Option<String>,
    pub from_series: Option<String>,
    pub include_binaries: bool,
}

impl SyncRequest {
    pub fn new(from_archive_id: i64, to_pocket: impl Into<String>, requester_id: i64) -> Self {
        Self {
            from_archive_id,
            to_pocket: to_pocket.into(),
            requester_id: Some(requester_id),
            to_series: None,
            from_series: None,
            include_binaries: false,
        }
    }
}

/// Validates a phasing percentage; 100 means unphased.
fn normalize_phased_update_percentage(percentage: Option<i64>) -> Result<Option<u8>> {
    match percentage {
        None | Some(100) => Ok(None),
        Some(p) => u8::try_from(p)
            .ok()
            .filter(|p| *p <= 100)
            .map(Some)
            .ok_or(Error::InvalidPhasedUpdatePercentage(p)),
    }
}

/// Names in first-seen order without repeats.
fn unique_names(names: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(String::as_str)
        .filter(|name| seen.insert(*name))
        .collect()
}

impl ArchiveEngine {
    /// Enqueues a copy of one exact source version into `archive_id`.
    pub fn copy_package(&self, archive_id: i64, request: &CopyPackageRequest) -> Result<JobHandle> {
        let phased_update_percentage =
            normalize_phased_update_percentage(request.phased_update_percentage)?;

        let archive = self.archive(archive_id)?;
        let from_archive = self.archive(request.from_archive_id)?;
        let to_pocket = self.pocket_from_text(&request.to_pocket)?;
        let to_series =
            self.optional_series_from_text(archive.distribution_id, request.to_series.as_deref())?;
        let from_series = self.optional_series_from_text(
            from_archive.distribution_id,
            request.from_series.as_deref(),
        )?;
        let from_pocket = request
            .from_pocket
            .as_deref()
            .map(|text| self.pocket_from_text(text))
            .transpose()?;

        let source = self.validate_and_find_source(
            &from_archive,
            &request.source_name,
            &request.version,
            from_series.as_ref(),
            from_pocket,
        )?;
        let series = match to_series {
            Some(series) => series,
            None => self.series(source.series_id)?,
        };

        let requester_id = self.check_copy_permissions(
            request.requester_id,
            &archive,
            Some(&series),
            to_pocket,
            std::slice::from_ref(&source),
            request.unembargo,
            request.move_package,
        )?;

        let job = CopyJobRequest {
            package_name: source.name.clone(),
            package_version: source.version.clone(),
            source_archive_id: from_archive.id,
            target_archive_id: archive.id,
            target_series_id: series.id,
            target_pocket: to_pocket,
            include_binaries: request.include_binaries,
            copy_policy: CopyPolicy::Insecure,
            requester_id,
            sponsored_id: request.sponsored_id,
            unembargo: request.unembargo,
            auto_approve: request.auto_approve,
            silent: request.silent,
            source_series_id: from_series.as_ref().map(|s| s.id),
            source_pocket: from_pocket,
            phased_update_percentage,
            move_package: request.move_package,
        };

        let handle = self
            .jobs
            .enqueue(std::slice::from_ref(&job))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidState("job queue returned no handle".to_string()))?;

        info!(
            archive = %archive.name,
            package = %job.package_name,
            version = %job.package_version,
            job = %handle.id,
            "Copy job enqueued"
        );
        Ok(handle)
    }

    /// Enqueues copies of the latest published version of each name.
    pub fn copy_packages(
        &self,
        archive_id: i64,
        request: &CopyPackagesRequest,
    ) -> Result<Vec<JobHandle>> {
        let archive = self.archive(archive_id)?;
        let from_archive = self.archive(request.from_archive_id)?;
        let to_pocket = self.pocket_from_text(&request.to_pocket)?;
        let to_series =
            self.optional_series_from_text(archive.distribution_id, request.to_series.as_deref())?;
        let from_series = self.optional_series_from_text(
            from_archive.distribution_id,
            request.from_series.as_deref(),
        )?;

        let sources = self.collect_latest_published_sources(
            &from_archive,
            from_series.as_ref(),
            &request.source_names,
        )?;

        let requester_id = self.check_copy_permissions(
            request.requester_id,
            &archive,
            to_series.as_ref(),
            to_pocket,
            &sources,
            request.unembargo,
            false,
        )?;

        let jobs: Vec<CopyJobRequest> = sources
            .iter()
            .map(|source| CopyJobRequest {
                package_name: source.name.clone(),
                package_version: source.version.clone(),
                source_archive_id: from_archive.id,
                target_archive_id: archive.id,
                target_series_id: to_series.as_ref().map_or(source.series_id, |s| s.id),
                target_pocket: to_pocket,
                include_binaries: request.include_binaries,
                copy_policy: CopyPolicy::MassSync,
                requester_id,
                sponsored_id: request.sponsored_id,
                unembargo: request.unembargo,
                auto_approve: request.auto_approve,
                silent: request.silent,
                source_series_id: from_series.as_ref().map(|s| s.id),
                source_pocket: None,
                phased_update_percentage: None,
                move_package: false,
            })
            .collect();

        self.enqueue_all(&archive, &jobs)
    }

    /// Copies one exact version; the target pocket is checked first.
    pub fn sync_source(
        &self,
        archive_id: i64,
        source_name: &str,
        version: &str,
        request: &SyncRequest,
    ) -> Result<JobHandle> {
        let archive = self.archive(archive_id)?;
        let from_archive = self.archive(request.from_archive_id)?;
        let from_series = self.optional_series_from_text(
            from_archive.distribution_id,
            request.from_series.as_deref(),
        )?;
        let source = self.validate_and_find_source(
            &from_archive,
            source_name,
            version,
            from_series.as_ref(),
            None,
        )?;

        let mut handles = self.copy_sources(
            &archive,
            &from_archive,
            &[source],
            request,
            CopyPolicy::Insecure,
        )?;
        handles
            .pop()
            .ok_or_else(|| Error::InvalidState("job queue returned no handle".to_string()))
    }

    pub fn sync_sources(
        &self,
        archive_id: i64,
        source_names: &[String],
        request: &SyncRequest,
    ) -> Result<Vec<JobHandle>> {
        let archive = self.archive(archive_id)?;
        let from_archive = self.archive(request.from_archive_id)?;
        let from_series = self.optional_series_from_text(
            from_archive.distribution_id,
            request.from_series.as_deref(),
        )?;
        let sources =
            self.collect_latest_published_sources(&from_archive, from_series.as_ref(), source_names)?;

        self.copy_sources(&archive, &from_archive, &sources, request, CopyPolicy::MassSync)
    }

    /// Gate shared by every copy path. Any rejection surfaces as
    /// `CannotCopy`; on success the checked requester is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn check_copy_permissions(
        &self,
        requester_id: Option<i64>,
        archive: &Archive,
        series: Option<&DistroSeries>,
        pocket: Pocket,
        sources: &[SourcePublication],
        unembargo: bool,
        move_package: bool,
    ) -> Result<i64> {
        let Some(requester_id) = requester_id else {
            return Err(Error::CannotCopy(
                "Cannot check copy permissions (no requester).".to_string(),
            ));
        };

        let mut checked: HashSet<(String, i64)> = HashSet::new();
        for source in sources {
            let source_archive = self.archive(source.archive_id)?;
            if source_archive.private && !archive.private && !unembargo {
                return Err(Error::CannotCopy(
                    "Cannot copy private source into public archives.".to_string(),
                ));
            }

            let dest_series = match series {
                Some(series) => series.clone(),
                None => self.series(source.series_id)?,
            };
            if !checked.insert((source.name.clone(), dest_series.id)) {
                continue;
            }

            let component =
                self.latest_published_component(archive.id, dest_series.id, &source.name)?;
            let denial = self.check_upload(
                archive,
                requester_id,
                &dest_series,
                Some(&source.name),
                component.as_deref(),
                pocket,
                component.is_some(),
            )?;
            if let Some(denial) = denial {
                let components: Vec<&str> = component.as_deref().into_iter().collect();
                let queue_admin = self.can_administer_queue(
                    archive,
                    requester_id,
                    &components,
                    Some(pocket),
                    Some(dest_series.id),
                )?;
                if !queue_admin {
                    return Err(Error::CannotCopy(denial.to_string()));
                }
            }

            if move_package {
                let source_series = self.series(source.series_id)?;
                let denial = self.check_upload(
                    &source_archive,
                    requester_id,
                    &source_series,
                    Some(&source.name),
                    Some(&source.component),
                    source.pocket,
                    true,
                )?;
                if let Some(denial) = denial {
                    return Err(Error::CannotCopy(denial.to_string()));
                }
            }
        }

        Ok(requester_id)
    }

    /// Exact name and version in any status, newest first.
    fn validate_and_find_source(
        &self,
        from_archive: &Archive,
        name: &str,
        version: &str,
        from_series: Option<&DistroSeries>,
        from_pocket: Option<Pocket>,
    ) -> Result<SourcePublication> {
        let mut filter = SourceFilter::new().exact_name(name).version(version);
        if let Some(series) = from_series {
            filter = filter.series(series.id);
        }
        if let Some(pocket) = from_pocket {
            filter = filter.pocket(pocket);
        }

        self.get_published_sources(from_archive.id, &filter)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::CannotCopy(format!(
                    "{name} is not published in {}.",
                    from_archive.display_name
                ))
            })
    }

    /// Highest PUBLISHED version of each distinct name; unknown names are
    /// skipped unless none resolve.
    fn collect_latest_published_sources(
        &self,
        from_archive: &Archive,
        from_series: Option<&DistroSeries>,
        names: &[String],
    ) -> Result<Vec<SourcePublication>> {
        let mut sources = Vec::new();
        for name in unique_names(names) {
            let mut filter = SourceFilter::new()
                .exact_name(name)
                .status(PublishingStatus::Published);
            if let Some(series) = from_series {
                filter = filter.series(series.id);
            }
            if let Some(source) = self
                .get_published_sources(from_archive.id, &filter)?
                .into_iter()
                .next()
            {
                sources.push(source);
            }
        }

        if sources.is_empty() {
            return Err(Error::CannotCopy(format!(
                "None of the supplied package names are published in {}.",
                from_archive.display_name
            )));
        }
        Ok(sources)
    }

    /// Sync path: pocket legality per destination series, then the shared
    /// permission check, then one atomic enqueue.
    fn copy_sources(
        &self,
        archive: &Archive,
        from_archive: &Archive,
        sources: &[SourcePublication],
        request: &SyncRequest,
        copy_policy: CopyPolicy,
    ) -> Result<Vec<JobHandle>> {
        let to_pocket = self.pocket_from_text(&request.to_pocket)?;
        let to_series =
            self.optional_series_from_text(archive.distribution_id, request.to_series.as_deref())?;

        for source in sources {
            let dest_series = match &to_series {
                Some(series) => series.clone(),
                None => self.series(source.series_id)?,
            };
            if let Some(denial) =
                self.check_upload_to_pocket(archive, &dest_series, to_pocket, request.requester_id)?
            {
                return Err(Error::CannotCopy(denial.to_string()));
            }
        }

        let requester_id = self.check_copy_permissions(
            request.requester_id,
            archive,
            to_series.as_ref(),
            to_pocket,
            sources,
            false,
            false,
        )?;

        let jobs: Vec<CopyJobRequest> = sources
            .iter()
            .map(|source| CopyJobRequest {
                package_name: source.name.clone(),
                package_version: source.version.clone(),
                source_archive_id: from_archive.id,
                target_archive_id: archive.id,
                target_series_id: to_series.as_ref().map_or(source.series_id, |s| s.id),
                target_pocket: to_pocket,
                include_binaries: request.include_binaries,
                copy_policy,
                requester_id,
                sponsored_id: None,
                unembargo: false,
                auto_approve: false,
                silent: false,
                source_series_id: Some(source.series_id),
                source_pocket: Some(source.pocket),
                phased_update_percentage: None,
                move_package: false,
            })
            .collect();

        self.enqueue_all(archive, &jobs)
    }

    fn enqueue_all(&self, archive: &Archive, jobs: &[CopyJobRequest]) -> Result<Vec<JobHandle>> {
        let handles = self.jobs.enqueue(jobs)?;
        info!(archive = %archive.name, count = handles.len(), "Copy jobs enqueued");
        Ok(handles)
    }
}

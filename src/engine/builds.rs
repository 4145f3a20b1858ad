use tracing::info;

use super::ArchiveEngine;
use crate::error::Result;
use crate::types::*;

enum Bucket {
    Failed,
    Pending,
    Succeeded,
    Superseded,
}

/// Reporting bucket for a build status. Statuses outside every bucket
/// (cancelled builds, and NEEDSBUILD unless asked for) are not counted.
fn bucket(status: BuildStatus, include_needsbuild: bool) -> Option<Bucket> {
    match status {
        BuildStatus::ChrootWait
        | BuildStatus::FailedToBuild
        | BuildStatus::FailedToUpload
        | BuildStatus::ManualDepWait => Some(Bucket::Failed),
        BuildStatus::Building | BuildStatus::Uploading => Some(Bucket::Pending),
        BuildStatus::NeedsBuild if include_needsbuild => Some(Bucket::Pending),
        BuildStatus::FullyBuilt => Some(Bucket::Succeeded),
        BuildStatus::Superseded => Some(Bucket::Superseded),
        _ => None,
    }
}

fn tally(histogram: &[(BuildStatus, u64)], include_needsbuild: bool) -> BuildCounters {
    let mut counters = BuildCounters::default();
    for (status, count) in histogram {
        let field = match bucket(*status, include_needsbuild) {
            Some(Bucket::Failed) => &mut counters.failed,
            Some(Bucket::Pending) => &mut counters.pending,
            Some(Bucket::Succeeded) => &mut counters.succeeded,
            Some(Bucket::Superseded) => &mut counters.superseded,
            None => continue,
        };
        *field += count;
        counters.total += count;
    }
    counters
}

impl ArchiveEngine {
    pub fn get_build_counters(
        &self,
        archive_id: i64,
        include_needsbuild: bool,
    ) -> Result<BuildCounters> {
        let histogram = self.store.build_status_histogram(archive_id)?;
        Ok(tally(&histogram, include_needsbuild))
    }

    /// Distinct source packages currently building, and those with only
    /// waiting builds.
    pub fn num_pkgs_building(&self, archive_id: i64) -> Result<PackagesBuilding> {
        self.store.count_packages_building(archive_id)
    }

    /// Re-derives `virtualized` on pending builds from the archive setting
    /// and each processor's capabilities.
    pub fn recalculate_build_virtualization(&self, archive_id: i64) -> Result<usize> {
        let archive = self.archive(archive_id)?;
        let updated = self.store.recalculate_build_virtualization(archive.id)?;
        info!(archive = %archive.name, updated, "Build virtualization recalculated");
        Ok(updated)
    }
}

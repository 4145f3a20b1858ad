mod filter;
pub mod reference;
mod schema;
mod sqlite;

pub use filter::{BinaryFilter, DependencyScope, NameFilter, SourceFilter};
pub use reference::ArchiveReference;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Every method that changes more than one row runs in a single transaction.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Distribution operations
    fn create_distribution(&self, distro: &Distribution) -> Result<i64>;
    fn get_distribution(&self, id: i64) -> Result<Option<Distribution>>;
    fn get_distribution_by_name(&self, name: &str) -> Result<Option<Distribution>>;
    fn create_series(&self, series: &DistroSeries) -> Result<i64>;
    fn get_series(&self, id: i64) -> Result<Option<DistroSeries>>;
    fn get_series_by_name(&self, distribution_id: i64, name: &str)
    -> Result<Option<DistroSeries>>;
    fn set_series_status(&self, id: i64, status: SeriesStatus) -> Result<()>;
    fn add_series_parent(&self, parent: &SeriesParent) -> Result<()>;
    fn list_series_parents(&self, derived_series_id: i64) -> Result<Vec<SeriesParent>>;
    fn create_arch_series(&self, das: &DistroArchSeries) -> Result<i64>;
    fn get_arch_series(&self, id: i64) -> Result<Option<DistroArchSeries>>;
    fn set_nominated_arch_indep(&self, series_id: i64, arch_series_id: i64) -> Result<()>;

    // Processor operations
    fn create_processor(&self, processor: &Processor) -> Result<i64>;
    fn get_processor(&self, id: i64) -> Result<Option<Processor>>;
    fn get_processor_by_name(&self, name: &str) -> Result<Option<Processor>>;
    fn list_processors(&self) -> Result<Vec<Processor>>;
    fn set_processor_nonvirtualized(&self, id: i64, supported: bool) -> Result<()>;

    fn component_exists(&self, name: &str) -> Result<bool>;

    // Person operations
    fn create_person(&self, person: &Person) -> Result<i64>;
    fn get_person(&self, id: i64) -> Result<Option<Person>>;
    fn get_person_by_name(&self, name: &str) -> Result<Option<Person>>;
    fn add_team_member(&self, team_id: i64, member_id: i64) -> Result<()>;
    /// Transitive participation; a person always participates in itself.
    fn participates_in(&self, person_id: i64, team_id: i64) -> Result<bool>;

    // Archive operations
    fn create_archive(&self, archive: &Archive, processor_ids: &[i64]) -> Result<i64>;
    fn get_archive(&self, id: i64) -> Result<Option<Archive>>;
    /// Non-PPA archive by name.
    fn get_archive_by_name(&self, distribution_id: i64, name: &str) -> Result<Option<Archive>>;
    fn get_ppa(&self, distribution_id: i64, owner_id: i64, name: &str)
    -> Result<Option<Archive>>;
    fn get_archive_by_purpose(
        &self,
        distribution_id: i64,
        purpose: ArchivePurpose,
    ) -> Result<Option<Archive>>;
    fn list_archives(&self, distribution_id: i64) -> Result<Vec<Archive>>;
    fn update_archive(&self, archive: &Archive) -> Result<()>;
    /// Flips `enabled` and moves pending queue rows between WAITING and
    /// SUSPENDED. Enabling also recomputes virtualization and is refused
    /// unless the archive is ACTIVE.
    fn set_archive_enabled(&self, id: i64, enabled: bool) -> Result<usize>;
    /// Moves an active archive to DELETING, disabling it if needed.
    fn mark_archive_deleting(&self, id: i64) -> Result<()>;
    /// Fails with `CannotSwitchPrivacy` while PENDING or PUBLISHED sources
    /// exist; the check and the update share one transaction.
    fn set_archive_privacy(&self, id: i64, private: bool, build_secret: Option<&str>)
    -> Result<()>;
    fn set_require_virtualized(&self, id: i64, require_virtualized: bool) -> Result<usize>;
    /// Returns the number of pending builds touched.
    fn recalculate_build_virtualization(&self, id: i64) -> Result<usize>;
    fn list_archive_processors(&self, id: i64) -> Result<Vec<Processor>>;
    fn set_archive_processors(&self, id: i64, processor_ids: &[i64]) -> Result<()>;
    fn list_dirty_suites(&self, id: i64) -> Result<Vec<String>>;
    fn add_dirty_suite(&self, id: i64, suite: &str) -> Result<()>;
    fn clear_dirty_suites(&self, id: i64) -> Result<()>;

    // Permission operations
    fn create_grant(&self, grant: &PermissionGrant) -> Result<i64>;
    fn find_grant(
        &self,
        archive_id: i64,
        person_id: i64,
        kind: PermissionKind,
        target: &PermissionTarget,
    ) -> Result<Option<PermissionGrant>>;
    fn list_grants(&self, archive_id: i64, kind: Option<PermissionKind>)
    -> Result<Vec<PermissionGrant>>;
    fn delete_grant(&self, id: i64) -> Result<bool>;

    // Packageset operations
    fn create_packageset(&self, packageset: &Packageset) -> Result<i64>;
    fn get_packageset(&self, id: i64) -> Result<Option<Packageset>>;
    fn add_packageset_source(&self, packageset_id: i64, source_name: &str) -> Result<()>;
    fn add_packageset_inclusion(&self, parent_id: i64, child_id: i64) -> Result<()>;
    /// Packagesets in the series covering the name, directly or through
    /// inclusion by a parent set.
    fn packagesets_covering(&self, series_id: i64, source_name: &str) -> Result<Vec<i64>>;

    // Archive dependency operations
    fn create_archive_dependency(&self, dep: &ArchiveDependency) -> Result<i64>;
    fn get_archive_dependency(
        &self,
        archive_id: i64,
        dependency_id: i64,
    ) -> Result<Option<ArchiveDependency>>;
    fn list_archive_dependencies(&self, archive_id: i64) -> Result<Vec<ArchiveDependency>>;
    fn delete_archive_dependency(&self, archive_id: i64, dependency_id: i64) -> Result<bool>;

    // Publication operations
    fn create_source_publication(&self, publication: &SourcePublication) -> Result<i64>;
    fn create_binary_publication(&self, publication: &BinaryPublication) -> Result<i64>;
    fn set_source_publication_status(
        &self,
        id: i64,
        status: PublishingStatus,
        date_removed: Option<DateTime<Utc>>,
    ) -> Result<()>;
    fn set_binary_publication_status(
        &self,
        id: i64,
        status: PublishingStatus,
        date_removed: Option<DateTime<Utc>>,
    ) -> Result<()>;
    fn add_published_file(&self, file: &PublishedFile) -> Result<()>;
    /// Filtered rows in descending id order; callers apply display ordering.
    fn find_source_publications(
        &self,
        archive_id: i64,
        filter: &SourceFilter,
    ) -> Result<Vec<SourcePublication>>;
    fn find_binary_publications(
        &self,
        archive_id: i64,
        filter: &BinaryFilter,
    ) -> Result<Vec<BinaryPublication>>;
    /// Sum of distinct (filename, size) pairs over unremoved publications.
    fn published_size(&self, archive_id: i64, kind: PublicationKind) -> Result<i64>;
    /// PUBLISHED binaries named `binary_name` on one arch series, ordered by
    /// scope then newest first.
    fn find_dependency_candidates(
        &self,
        arch_series_id: i64,
        binary_name: &str,
        scopes: &[DependencyScope],
    ) -> Result<Vec<BinaryPublication>>;

    // Build operations
    fn create_build(&self, build: &Build) -> Result<i64>;
    fn get_build(&self, id: i64) -> Result<Option<Build>>;
    fn create_queue_entry(&self, entry: &BuildQueueEntry) -> Result<i64>;
    fn get_queue_entry_for_build(&self, build_id: i64) -> Result<Option<BuildQueueEntry>>;
    fn build_status_histogram(&self, archive_id: i64) -> Result<Vec<(BuildStatus, u64)>>;
    fn count_packages_building(&self, archive_id: i64) -> Result<PackagesBuilding>;

    // Copy job inspection (enqueueing goes through `JobQueue`)
    fn list_copy_jobs(&self, target_archive_id: i64) -> Result<Vec<CopyJob>>;

    // Subscription operations
    fn create_subscription(&self, subscription: &Subscription) -> Result<i64>;
    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>>;
    fn list_subscriptions(&self, archive_id: i64) -> Result<Vec<Subscription>>;
    /// Cancels the subscription and deactivates the given personal tokens in
    /// one transaction. Returns the number of tokens deactivated.
    fn cancel_subscription(
        &self,
        id: i64,
        cancelled_by_id: i64,
        when: DateTime<Utc>,
        deactivate_token_ids: &[i64],
    ) -> Result<usize>;

    // Auth token operations
    fn create_auth_token(&self, token: &AuthToken) -> Result<i64>;
    fn get_active_person_token(&self, archive_id: i64, person_id: i64)
    -> Result<Option<AuthToken>>;
    fn get_active_named_token(&self, archive_id: i64, name: &str) -> Result<Option<AuthToken>>;
    fn list_auth_tokens(&self, archive_id: i64, active_only: bool) -> Result<Vec<AuthToken>>;
    fn deactivate_auth_token(&self, id: i64, when: DateTime<Utc>) -> Result<bool>;

    fn close(&self) -> Result<()>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    ArchivePurpose, ArchiveStatus, BuildStatus, CopyPolicy, Pocket, PublishingStatus, QueueStatus,
    SeriesStatus, SubscriptionStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Distribution {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    /// Uploads to the release pocket of the primary archive go to proposed
    /// unless the uploader administers the queue.
    pub redirect_release_uploads: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroSeries {
    pub id: i64,
    pub distribution_id: i64,
    pub name: String,
    pub status: SeriesStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominated_arch_indep_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl DistroSeries {
    #[must_use]
    pub fn suite(&self, pocket: Pocket) -> String {
        format!("{}{}", self.name, pocket.suffix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesParent {
    pub derived_series_id: i64,
    pub parent_series_id: i64,
    pub ordering: i32,
    pub inherit_overrides: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistroArchSeries {
    pub id: i64,
    pub series_id: i64,
    pub architecture_tag: String,
    pub processor_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Processor {
    pub id: i64,
    pub name: String,
    pub restricted: bool,
    pub build_by_default: bool,
    pub supports_virtualized: bool,
    pub supports_nonvirtualized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub is_team: bool,
    pub private: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    pub id: i64,
    pub distribution_id: i64,
    pub owner_id: i64,
    pub name: String,
    pub display_name: String,
    pub purpose: ArchivePurpose,
    pub status: ArchiveStatus,
    pub enabled: bool,
    pub private: bool,
    pub require_virtualized: bool,
    pub permit_obsolete_series_uploads: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_fingerprint: Option<String>,
    #[serde(skip)]
    pub build_secret: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Archive {
    #[must_use]
    pub fn default_component(&self) -> Option<&'static str> {
        self.purpose.default_component()
    }

    #[must_use]
    pub fn is_ppa(&self) -> bool {
        self.purpose == ArchivePurpose::Ppa
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ArchiveStatus::Active
    }
}

/// Parameters for creating an archive. Unset fields take purpose defaults.
#[derive(Debug, Clone)]
pub struct NewArchive {
    pub distribution_id: i64,
    pub owner_id: i64,
    pub purpose: ArchivePurpose,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub private: bool,
    pub require_virtualized: Option<bool>,
    pub permit_obsolete_series_uploads: bool,
    pub processor_ids: Option<Vec<i64>>,
}

impl NewArchive {
    #[must_use]
    pub fn new(distribution_id: i64, owner_id: i64, purpose: ArchivePurpose) -> Self {
        Self {
            distribution_id,
            owner_id,
            purpose,
            name: None,
            display_name: None,
            private: false,
            require_virtualized: None,
            permit_obsolete_series_uploads: false,
            processor_ids: None,
        }
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDependency {
    pub id: i64,
    pub archive_id: i64,
    pub dependency_id: i64,
    pub pocket: Pocket,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packageset {
    pub id: i64,
    pub series_id: i64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePublication {
    pub id: i64,
    pub archive_id: i64,
    pub series_id: i64,
    pub pocket: Pocket,
    pub component: String,
    pub section: String,
    pub name: String,
    pub version: String,
    pub status: PublishingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_removed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryPublication {
    pub id: i64,
    pub archive_id: i64,
    pub arch_series_id: i64,
    /// Filled from the arch series on read; ignored on insert.
    pub architecture_tag: String,
    pub pocket: Pocket,
    pub component: String,
    pub section: String,
    pub priority: String,
    pub name: String,
    pub version: String,
    pub source_name: String,
    pub architecture_specific: bool,
    pub status: PublishingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_removed: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicationKind {
    Source,
    Binary,
}

impl PublicationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            PublicationKind::Source => "source",
            PublicationKind::Binary => "binary",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedFile {
    pub kind: PublicationKind,
    pub publication_id: i64,
    pub filename: String,
    pub size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: i64,
    pub archive_id: i64,
    pub arch_series_id: i64,
    pub processor_id: i64,
    pub source_name: String,
    pub source_version: String,
    pub status: BuildStatus,
    pub virtualized: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildQueueEntry {
    pub id: i64,
    pub build_id: i64,
    pub status: QueueStatus,
    pub virtualized: bool,
}

/// One asynchronous copy for the job queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyJobRequest {
    pub package_name: String,
    pub package_version: String,
    pub source_archive_id: i64,
    pub target_archive_id: i64,
    pub target_series_id: i64,
    pub target_pocket: Pocket,
    pub include_binaries: bool,
    pub copy_policy: CopyPolicy,
    pub requester_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsored_id: Option<i64>,
    pub unembargo: bool,
    pub auto_approve: bool,
    pub silent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_series_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_pocket: Option<Pocket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phased_update_percentage: Option<u8>,
    pub move_package: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyJob {
    pub handle: JobHandle,
    pub request: CopyJobRequest,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub archive_id: i64,
    pub subscriber_id: i64,
    pub registrant_id: i64,
    pub status: SubscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_cancelled: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by_id: Option<i64>,
}

impl Subscription {
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Current
            && self.date_expires.is_none_or(|expires| expires > now)
    }
}

/// Private-archive credential. Personal tokens carry `person_id`, named
/// tokens carry `name`; never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: i64,
    pub archive_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip)]
    pub token_lookup: String,
    #[serde(skip)]
    pub token_hash: String,
    pub date_created: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_deactivated: Option<DateTime<Utc>>,
}

impl AuthToken {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.date_deactivated.is_none()
    }
}

/// A freshly created token together with its secret, which is never stored.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: AuthToken,
    pub secret: String,
}

/// Per-archive build histogram grouped into reporting buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCounters {
    pub failed: u64,
    pub pending: u64,
    pub succeeded: u64,
    pub superseded: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagesBuilding {
    pub building: u64,
    pub waiting: u64,
}

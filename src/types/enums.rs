use std::fmt;

use serde::{Deserialize, Serialize};

/// Declares a text-backed enum with `as_str`/`parse` in the same shape for
/// every column type the store persists.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Case-insensitive lookup by stored or user-supplied name.
            pub fn parse(s: &str) -> Option<$name> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// What an archive is for. Fixed at creation.
    pub enum ArchivePurpose {
        Primary => "PRIMARY",
        Partner => "PARTNER",
        Ppa => "PPA",
        Copy => "COPY",
    }
}

impl ArchivePurpose {
    /// Component every upload to this kind of archive lands in, if fixed.
    #[must_use]
    pub const fn default_component(self) -> Option<&'static str> {
        match self {
            ArchivePurpose::Ppa => Some("main"),
            ArchivePurpose::Partner => Some("partner"),
            ArchivePurpose::Primary | ArchivePurpose::Copy => None,
        }
    }

    /// Name used when the creator does not supply one.
    #[must_use]
    pub const fn default_name(self) -> Option<&'static str> {
        match self {
            ArchivePurpose::Primary => Some("primary"),
            ArchivePurpose::Partner => Some("partner"),
            ArchivePurpose::Ppa | ArchivePurpose::Copy => None,
        }
    }

    /// Non-primary archives accept updates to the release pocket of any series.
    #[must_use]
    pub const fn allows_release_pocket_updates(self) -> bool {
        !matches!(self, ArchivePurpose::Primary)
    }
}

text_enum! {
    pub enum ArchiveStatus {
        Active => "ACTIVE",
        Deleting => "DELETING",
        Deleted => "DELETED",
    }
}

text_enum! {
    /// Publishing channel within a series.
    pub enum Pocket {
        Release => "RELEASE",
        Security => "SECURITY",
        Updates => "UPDATES",
        Proposed => "PROPOSED",
        Backports => "BACKPORTS",
    }
}

impl Pocket {
    /// Suffix appended to the series name to form the suite name.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Pocket::Release => "",
            Pocket::Security => "-security",
            Pocket::Updates => "-updates",
            Pocket::Proposed => "-proposed",
            Pocket::Backports => "-backports",
        }
    }
}

text_enum! {
    pub enum SeriesStatus {
        Experimental => "EXPERIMENTAL",
        Development => "DEVELOPMENT",
        Frozen => "FROZEN",
        Current => "CURRENT",
        Supported => "SUPPORTED",
        Obsolete => "OBSOLETE",
        Future => "FUTURE",
    }
}

impl SeriesStatus {
    /// Released series: the release pocket is closed.
    #[must_use]
    pub const fn is_stable(self) -> bool {
        matches!(
            self,
            SeriesStatus::Supported | SeriesStatus::Current | SeriesStatus::Obsolete
        )
    }
}

text_enum! {
    pub enum PublishingStatus {
        Pending => "PENDING",
        Published => "PUBLISHED",
        Superseded => "SUPERSEDED",
        Deleted => "DELETED",
        Obsolete => "OBSOLETE",
    }
}

impl PublishingStatus {
    pub const ACTIVE: &'static [PublishingStatus] =
        &[PublishingStatus::Pending, PublishingStatus::Published];

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, PublishingStatus::Pending | PublishingStatus::Published)
    }
}

text_enum! {
    pub enum BuildStatus {
        NeedsBuild => "NEEDSBUILD",
        FullyBuilt => "FULLYBUILT",
        FailedToBuild => "FAILEDTOBUILD",
        ManualDepWait => "MANUALDEPWAIT",
        ChrootWait => "CHROOTWAIT",
        Superseded => "SUPERSEDED",
        Building => "BUILDING",
        FailedToUpload => "FAILEDTOUPLOAD",
        Uploading => "UPLOADING",
        Cancelling => "CANCELLING",
        Cancelled => "CANCELLED",
    }
}

text_enum! {
    pub enum QueueStatus {
        Waiting => "WAITING",
        Running => "RUNNING",
        Suspended => "SUSPENDED",
    }
}

text_enum! {
    pub enum PermissionKind {
        Upload => "UPLOAD",
        QueueAdmin => "QUEUE_ADMIN",
    }
}

text_enum! {
    /// Validation strictness the copy worker applies to an enqueued job.
    pub enum CopyPolicy {
        Insecure => "INSECURE",
        MassSync => "MASS_SYNC",
    }
}

text_enum! {
    pub enum SubscriptionStatus {
        Current => "CURRENT",
        Expired => "EXPIRED",
        Cancelled => "CANCELLED",
    }
}

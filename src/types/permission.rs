use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PermissionKind, Pocket};

/// What a grant covers. Grants are additive; there is no deny.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PermissionTarget {
    Component(String),
    Package(String),
    Packageset { packageset_id: i64, explicit: bool },
    /// Pocket-wide grant, optionally limited to one series (queue admin only).
    Pocket { pocket: Pocket, series_id: Option<i64> },
}

/// Column layout of a target in the permissions table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetColumns {
    pub component: Option<String>,
    pub package: Option<String>,
    pub packageset_id: Option<i64>,
    pub explicit: bool,
    pub pocket: Option<String>,
    pub series_id: Option<i64>,
}

impl PermissionTarget {
    #[must_use]
    pub fn to_columns(&self) -> TargetColumns {
        match self {
            PermissionTarget::Component(name) => TargetColumns {
                component: Some(name.clone()),
                ..Default::default()
            },
            PermissionTarget::Package(name) => TargetColumns {
                package: Some(name.clone()),
                ..Default::default()
            },
            PermissionTarget::Packageset {
                packageset_id,
                explicit,
            } => TargetColumns {
                packageset_id: Some(*packageset_id),
                explicit: *explicit,
                ..Default::default()
            },
            PermissionTarget::Pocket { pocket, series_id } => TargetColumns {
                pocket: Some(pocket.as_str().to_string()),
                series_id: *series_id,
                ..Default::default()
            },
        }
    }

    /// Rebuilds a target from stored columns. Exactly one target column is
    /// expected to be set.
    pub fn from_columns(cols: TargetColumns) -> Option<PermissionTarget> {
        match cols {
            TargetColumns {
                component: Some(name),
                package: None,
                packageset_id: None,
                pocket: None,
                ..
            } => Some(PermissionTarget::Component(name)),
            TargetColumns {
                component: None,
                package: Some(name),
                packageset_id: None,
                pocket: None,
                ..
            } => Some(PermissionTarget::Package(name)),
            TargetColumns {
                component: None,
                package: None,
                packageset_id: Some(packageset_id),
                pocket: None,
                explicit,
                ..
            } => Some(PermissionTarget::Packageset {
                packageset_id,
                explicit,
            }),
            TargetColumns {
                component: None,
                package: None,
                packageset_id: None,
                pocket: Some(pocket),
                series_id,
                ..
            } => Pocket::parse(&pocket).map(|pocket| PermissionTarget::Pocket { pocket, series_id }),
            _ => None,
        }
    }
}

impl fmt::Display for PermissionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionTarget::Component(name) => write!(f, "component:{name}"),
            PermissionTarget::Package(name) => write!(f, "package:{name}"),
            PermissionTarget::Packageset {
                packageset_id,
                explicit,
            } => {
                write!(f, "packageset:{packageset_id}")?;
                if *explicit {
                    f.write_str(" (explicit)")?;
                }
                Ok(())
            }
            PermissionTarget::Pocket { pocket, series_id } => match series_id {
                Some(id) => write!(f, "pocket:{pocket}@{id}"),
                None => write!(f, "pocket:{pocket}"),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub id: i64,
    pub archive_id: i64,
    /// Person or team holding the grant.
    pub person_id: i64,
    pub kind: PermissionKind,
    pub target: PermissionTarget,
    pub created_at: DateTime<Utc>,
}

impl PermissionGrant {
    #[must_use]
    pub fn component(&self) -> Option<&str> {
        match &self.target {
            PermissionTarget::Component(name) => Some(name),
            _ => None,
        }
    }
}

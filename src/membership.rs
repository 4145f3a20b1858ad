//! Identity and team-membership seam.

use std::sync::Arc;

use crate::error::Result;
use crate::store::Store;

pub trait Membership: Send + Sync {
    /// True when `person_id` participates in `team_id`, directly or through
    /// nested teams. Every person is in its own team.
    fn in_team(&self, person_id: i64, team_id: i64) -> Result<bool>;

    /// Administrators may view every archive and manage restricted processors.
    fn is_admin(&self, person_id: i64) -> Result<bool>;
}

/// Membership backed by the store's team table, with administrators being
/// the members of one configured team.
pub struct StoreMembership {
    store: Arc<dyn Store>,
    admin_team: String,
}

impl StoreMembership {
    pub fn new(store: Arc<dyn Store>, admin_team: impl Into<String>) -> Self {
        Self {
            store,
            admin_team: admin_team.into(),
        }
    }
}

impl Membership for StoreMembership {
    fn in_team(&self, person_id: i64, team_id: i64) -> Result<bool> {
        self.store.participates_in(person_id, team_id)
    }

    fn is_admin(&self, person_id: i64) -> Result<bool> {
        match self.store.get_person_by_name(&self.admin_team)? {
            Some(team) => self.store.participates_in(person_id, team.id),
            None => Ok(false),
        }
    }
}

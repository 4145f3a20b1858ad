//! The archive engine: lifecycle, upload permissions, publication queries,
//! build dependencies, override policies, copies and build statistics.
//!
//! Every operation goes through one [`ArchiveEngine`], which owns its
//! collaborators explicitly. The engine keeps no state between calls.

mod access;
mod archives;
mod builds;
mod copy;
mod dependencies;
mod overrides;
mod permissions;
mod publishing;

use std::sync::Arc;

pub use archives::validate_archive_name;
pub use copy::{CopyPackageRequest, CopyPackagesRequest, SyncRequest};
pub use dependencies::component_dependencies;
pub use overrides::{
    BinaryOverride, BinaryQuery, OverridePolicy, SourceOverride, SourceQuery,
};
pub use publishing::compare_versions;

use crate::auth::TokenGenerator;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::jobs::JobQueue;
use crate::membership::{Membership, StoreMembership};
use crate::store::{SqliteStore, Store};
use crate::types::*;

pub struct ArchiveEngine {
    store: Arc<dyn Store>,
    membership: Arc<dyn Membership>,
    jobs: Arc<dyn JobQueue>,
    config: EngineConfig,
    tokens: TokenGenerator,
}

impl ArchiveEngine {
    pub fn new(
        store: Arc<dyn Store>,
        membership: Arc<dyn Membership>,
        jobs: Arc<dyn JobQueue>,
        config: EngineConfig,
    ) -> Result<Self> {
        let tokens = TokenGenerator::new(config.token_prefix.clone())?;
        Ok(Self {
            store,
            membership,
            jobs,
            config,
            tokens,
        })
    }

    /// Wires an engine over one SQLite database, which also serves as the
    /// copy job queue.
    pub fn open(config: EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(SqliteStore::new(config.db_path())?);
        store.initialize()?;
        Self::with_sqlite(store, config)
    }

    pub fn with_sqlite(store: Arc<SqliteStore>, config: EngineConfig) -> Result<Self> {
        let membership = Arc::new(StoreMembership::new(
            store.clone(),
            config.admin_team.clone(),
        ));
        Self::new(store.clone(), membership, store, config)
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Lookups that must succeed

    fn archive(&self, id: i64) -> Result<Archive> {
        self.store.get_archive(id)?.ok_or(Error::NotFound)
    }

    fn series(&self, id: i64) -> Result<DistroSeries> {
        self.store.get_series(id)?.ok_or(Error::NotFound)
    }

    fn person(&self, id: i64) -> Result<Person> {
        self.store.get_person(id)?.ok_or(Error::NotFound)
    }

    fn distribution(&self, id: i64) -> Result<Distribution> {
        self.store.get_distribution(id)?.ok_or(Error::NotFound)
    }

    // Text to object resolution for caller-supplied names

    pub fn pocket_from_text(&self, text: &str) -> Result<Pocket> {
        Pocket::parse(text).ok_or_else(|| Error::PocketNotFound(text.to_string()))
    }

    pub fn series_from_text(&self, distribution_id: i64, name: &str) -> Result<DistroSeries> {
        self.store
            .get_series_by_name(distribution_id, name)?
            .ok_or_else(|| Error::SeriesNotFound(name.to_string()))
    }

    pub fn component_from_text(&self, name: &str) -> Result<String> {
        if self.store.component_exists(name)? {
            Ok(name.to_string())
        } else {
            Err(Error::ComponentNotFound(name.to_string()))
        }
    }

    fn optional_series_from_text(
        &self,
        distribution_id: i64,
        name: Option<&str>,
    ) -> Result<Option<DistroSeries>> {
        name.map(|name| self.series_from_text(distribution_id, name))
            .transpose()
    }
}

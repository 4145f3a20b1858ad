mod archive;
mod commands;
mod distro;
mod grant;
mod person;
mod report;

pub use archive::{
    run_archive_create, run_archive_delete, run_archive_disable, run_archive_enable,
    run_archive_show,
};
pub use commands::{
    ArchiveCommands, DistroCommands, GrantCommands, PersonCommands, ProcessorCommands,
    SeriesCommands, TeamCommands,
};
pub use distro::{run_distro_add, run_init, run_processor_add, run_series_add};
pub use grant::{run_grant_component, run_grant_package, run_grant_pocket, run_grant_queue_admin};
pub use person::{run_person_add, run_team_add_member};
pub use report::{run_check_upload, run_counters};

use std::path::{Path, PathBuf};

use crate::config::EngineConfig;
use crate::engine::ArchiveEngine;
use crate::types::{Archive, Distribution, Person};

pub const CONFIG_FILE: &str = "archivist.toml";

/// Reads `<data_dir>/archivist.toml`; the data directory given on the
/// command line always wins over the file.
pub fn load_config(data_dir: &str) -> anyhow::Result<EngineConfig> {
    let data_path = PathBuf::from(data_dir);
    let mut config = EngineConfig::load(data_path.join(CONFIG_FILE))?;
    config.data_dir = data_path;
    Ok(config)
}

/// Open the engine over an initialized data directory
pub fn open_engine(data_dir: &str) -> anyhow::Result<ArchiveEngine> {
    let config = load_config(data_dir)?;
    let db_path = config.db_path();

    if !Path::new(&db_path).exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'archivist init' first.",
            db_path.display()
        );
    }

    ArchiveEngine::open(config).map_err(Into::into)
}

pub(crate) fn resolve_archive(engine: &ArchiveEngine, reference: &str) -> anyhow::Result<Archive> {
    engine
        .resolve_reference(reference)?
        .ok_or_else(|| anyhow::anyhow!("Archive not found: {}", reference))
}

pub(crate) fn resolve_person(engine: &ArchiveEngine, name: &str) -> anyhow::Result<Person> {
    engine
        .store()
        .get_person_by_name(name)?
        .ok_or_else(|| anyhow::anyhow!("Person not found: {}", name))
}

pub(crate) fn resolve_distribution(
    engine: &ArchiveEngine,
    name: &str,
) -> anyhow::Result<Distribution> {
    engine
        .store()
        .get_distribution_by_name(name)?
        .ok_or_else(|| anyhow::anyhow!("Distribution not found: {}", name))
}

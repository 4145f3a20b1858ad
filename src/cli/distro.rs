use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::engine::ArchiveEngine;
use crate::types::{DistroArchSeries, DistroSeries, Distribution, Person, Processor, SeriesParent, SeriesStatus};

use super::{CONFIG_FILE, load_config, open_engine, resolve_distribution};

pub fn run_init(data_dir: String) -> anyhow::Result<()> {
    let data_path = PathBuf::from(&data_dir);
    fs::create_dir_all(&data_path)?;

    let config = load_config(&data_dir)?;
    if config.db_path().exists() {
        anyhow::bail!(
            "Already initialized. Database exists at: {}",
            config.db_path().display()
        );
    }

    let config_file = data_path.join(CONFIG_FILE);
    if !config_file.exists() {
        config.save(&config_file)?;
    }

    let engine = ArchiveEngine::open(config.clone())?;
    let store = engine.store();
    if store.get_person_by_name(&config.admin_team)?.is_none() {
        store.create_person(&Person {
            id: 0,
            name: config.admin_team.clone(),
            display_name: "Archive administrators".to_string(),
            is_team: true,
            private: false,
            created_at: Utc::now(),
        })?;
    }

    println!();
    println!("Initialized archive database at {}", config.db_path().display());
    println!("Administrators are members of team '{}'", config.admin_team);
    println!();

    Ok(())
}

pub fn run_distro_add(
    data_dir: String,
    name: String,
    display_name: Option<String>,
    redirect_release_uploads: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;

    if engine.store().get_distribution_by_name(&name)?.is_some() {
        anyhow::bail!("Distribution '{}' already exists", name);
    }

    engine.store().create_distribution(&Distribution {
        id: 0,
        display_name: display_name.unwrap_or_else(|| name.clone()),
        name: name.clone(),
        redirect_release_uploads,
        created_at: Utc::now(),
    })?;

    println!("Created distribution \"{}\"", name);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn run_series_add(
    data_dir: String,
    distro: String,
    name: String,
    status: String,
    architectures: Vec<String>,
    parents: Vec<String>,
    inherit_overrides: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let store = engine.store();
    let distribution = resolve_distribution(&engine, &distro)?;
    let status = SeriesStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("Unknown series status: {}", status))?;

    // Resolve everything before writing anything.
    let mut processors = Vec::with_capacity(architectures.len());
    for tag in &architectures {
        let processor = store
            .get_processor_by_name(tag)?
            .ok_or_else(|| anyhow::anyhow!("Processor not found: {}", tag))?;
        processors.push((tag.clone(), processor));
    }

    let mut parent_series = Vec::with_capacity(parents.len());
    for parent in &parents {
        let (parent_distro, parent_name) = parent
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("Parent must be DISTRO/SERIES: {}", parent))?;
        let parent_distro = resolve_distribution(&engine, parent_distro)?;
        let series = engine.series_from_text(parent_distro.id, parent_name)?;
        parent_series.push(series);
    }

    let series_id = store.create_series(&DistroSeries {
        id: 0,
        distribution_id: distribution.id,
        name: name.clone(),
        status,
        nominated_arch_indep_id: None,
        created_at: Utc::now(),
    })?;

    for (index, (tag, processor)) in processors.iter().enumerate() {
        let das_id = store.create_arch_series(&DistroArchSeries {
            id: 0,
            series_id,
            architecture_tag: tag.clone(),
            processor_id: processor.id,
        })?;
        if index == 0 {
            store.set_nominated_arch_indep(series_id, das_id)?;
        }
    }

    for (ordering, parent) in parent_series.iter().enumerate() {
        store.add_series_parent(&SeriesParent {
            derived_series_id: series_id,
            parent_series_id: parent.id,
            ordering: i32::try_from(ordering)?,
            inherit_overrides,
        })?;
    }

    println!(
        "Created series \"{}\" in {} ({})",
        name, distribution.name, status
    );
    Ok(())
}

pub fn run_processor_add(
    data_dir: String,
    name: String,
    restricted: bool,
    no_build_by_default: bool,
    nonvirtualized: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;

    if engine.store().get_processor_by_name(&name)?.is_some() {
        anyhow::bail!("Processor '{}' already exists", name);
    }

    engine.store().create_processor(&Processor {
        id: 0,
        name: name.clone(),
        restricted,
        build_by_default: !no_build_by_default,
        supports_virtualized: true,
        supports_nonvirtualized: nonvirtualized,
    })?;

    println!("Created processor \"{}\"", name);
    Ok(())
}

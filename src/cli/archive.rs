use serde::Serialize;

use crate::engine::ArchiveEngine;
use crate::types::{Archive, ArchivePurpose, NewArchive};

use super::{open_engine, resolve_archive, resolve_distribution, resolve_person};

#[derive(Serialize)]
struct ArchiveOutput {
    id: i64,
    reference: String,
    display_name: String,
    purpose: ArchivePurpose,
    status: String,
    enabled: bool,
    private: bool,
    require_virtualized: bool,
    processors: Vec<String>,
    dependencies: Vec<String>,
    dirty_suites: Vec<String>,
    sources_size: i64,
    binaries_size: i64,
    created_at: String,
}

fn describe(engine: &ArchiveEngine, archive: &Archive) -> anyhow::Result<ArchiveOutput> {
    let processors = engine
        .processors(archive.id)?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut dependencies = Vec::new();
    for edge in engine.archive_dependencies(archive.id)? {
        if let Some(dependency) = engine.get_archive(edge.dependency_id)? {
            dependencies.push(format!("{} ({})", engine.reference(&dependency)?, edge.pocket));
        }
    }

    Ok(ArchiveOutput {
        id: archive.id,
        reference: engine.reference(archive)?,
        display_name: archive.display_name.clone(),
        purpose: archive.purpose,
        status: archive.status.to_string(),
        enabled: archive.enabled,
        private: archive.private,
        require_virtualized: archive.require_virtualized,
        processors,
        dependencies,
        dirty_suites: engine.dirty_suites(archive.id)?,
        sources_size: engine.sources_size(archive.id)?,
        binaries_size: engine.binaries_size(archive.id)?,
        created_at: archive.created_at.to_rfc3339(),
    })
}

fn print_archive(output: &ArchiveOutput) {
    let state = if output.enabled { "enabled" } else { "disabled" };
    let visibility = if output.private { "private" } else { "public" };

    println!();
    println!("{}", output.reference);
    println!("{}", "─".repeat(output.reference.chars().count()));
    println!("Name:         {}", output.display_name);
    println!("Purpose:      {}", output.purpose);
    println!("Status:       {} ({}, {})", output.status, state, visibility);
    println!("Virtualized:  {}", output.require_virtualized);
    println!("Processors:   {}", output.processors.join(", "));
    if !output.dependencies.is_empty() {
        println!("Depends on:   {}", output.dependencies.join(", "));
    }
    if !output.dirty_suites.is_empty() {
        println!("Dirty suites: {}", output.dirty_suites.join(", "));
    }
    println!(
        "Size:         {} bytes ({} sources, {} binaries)",
        output.sources_size + output.binaries_size,
        output.sources_size,
        output.binaries_size
    );
    println!();
}

#[allow(clippy::too_many_arguments)]
pub fn run_archive_create(
    data_dir: String,
    distro: String,
    owner: String,
    purpose: String,
    name: Option<String>,
    private: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let distribution = resolve_distribution(&engine, &distro)?;
    let owner = resolve_person(&engine, &owner)?;
    let purpose = ArchivePurpose::parse(&purpose)
        .ok_or_else(|| anyhow::anyhow!("Unknown archive purpose: {}", purpose))?;

    let mut new = NewArchive::new(distribution.id, owner.id, purpose).private(private);
    new.name = name;
    let archive = engine.create_archive(new)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&describe(&engine, &archive)?)?);
    } else {
        println!("Created archive {}", engine.reference(&archive)?);
    }
    Ok(())
}

pub fn run_archive_show(data_dir: String, reference: String, json: bool) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let output = describe(&engine, &archive)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_archive(&output);
    }
    Ok(())
}

pub fn run_archive_enable(data_dir: String, reference: String) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    engine.enable(archive.id)?;

    println!("Enabled {}", reference);
    Ok(())
}

pub fn run_archive_disable(data_dir: String, reference: String) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    engine.disable(archive.id)?;

    println!("Disabled {}", reference);
    Ok(())
}

pub fn run_archive_delete(data_dir: String, reference: String, by: String) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let requester = resolve_person(&engine, &by)?;
    engine.delete(archive.id, requester.id)?;

    println!("Marked {} for deletion", reference);
    Ok(())
}

use crate::types::PermissionGrant;

use super::{open_engine, resolve_archive, resolve_person};

fn print_grant(grant: &PermissionGrant, person: &str, reference: &str) {
    println!("Granted {} {} on {} to {}", grant.kind, grant.target, reference, person);
}

pub fn run_grant_component(
    data_dir: String,
    reference: String,
    person: String,
    component: String,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let grantee = resolve_person(&engine, &person)?;

    let grant = engine.new_component_uploader(archive.id, grantee.id, &component)?;
    print_grant(&grant, &grantee.name, &reference);
    Ok(())
}

pub fn run_grant_package(
    data_dir: String,
    reference: String,
    person: String,
    package: String,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let grantee = resolve_person(&engine, &person)?;

    let grant = engine.new_package_uploader(archive.id, grantee.id, &package)?;
    print_grant(&grant, &grantee.name, &reference);
    Ok(())
}

pub fn run_grant_pocket(
    data_dir: String,
    reference: String,
    person: String,
    pocket: String,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let grantee = resolve_person(&engine, &person)?;
    let pocket = engine.pocket_from_text(&pocket)?;

    let grant = engine.new_pocket_uploader(archive.id, grantee.id, pocket)?;
    print_grant(&grant, &grantee.name, &reference);
    Ok(())
}

pub fn run_grant_queue_admin(
    data_dir: String,
    reference: String,
    person: String,
    component: Option<String>,
    pocket: Option<String>,
    series: Option<String>,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let grantee = resolve_person(&engine, &person)?;

    let grant = match (component, pocket) {
        (Some(component), _) => engine.new_queue_admin(archive.id, grantee.id, &component)?,
        (None, Some(pocket)) => {
            let pocket = engine.pocket_from_text(&pocket)?;
            let series = series
                .map(|name| engine.series_from_text(archive.distribution_id, &name))
                .transpose()?;
            engine.new_pocket_queue_admin(archive.id, grantee.id, pocket, series.map(|s| s.id))?
        }
        (None, None) => anyhow::bail!("Either --component or --pocket is required"),
    };
    print_grant(&grant, &grantee.name, &reference);
    Ok(())
}

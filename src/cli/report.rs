use serde::Serialize;

use super::{open_engine, resolve_archive, resolve_person};

#[derive(Serialize)]
struct UploadCheckOutput {
    archive: String,
    person: String,
    suite: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn run_check_upload(
    data_dir: String,
    reference: String,
    person: String,
    series: String,
    pocket: String,
    source: Option<String>,
    component: Option<String>,
    strict: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let uploader = resolve_person(&engine, &person)?;
    let series = engine.series_from_text(archive.distribution_id, &series)?;
    let pocket = engine.pocket_from_text(&pocket)?;
    let component = component
        .map(|name| engine.component_from_text(&name))
        .transpose()?;

    let denial = engine.check_upload(
        &archive,
        uploader.id,
        &series,
        source.as_deref(),
        component.as_deref(),
        pocket,
        strict,
    )?;

    let output = UploadCheckOutput {
        archive: reference,
        person: uploader.name,
        suite: series.suite(pocket),
        allowed: denial.is_none(),
        reason: denial.map(|d| d.to_string()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match &output.reason {
            None => println!(
                "{} may upload to {} in {}",
                output.person, output.suite, output.archive
            ),
            Some(reason) => println!("Denied: {}", reason),
        }
    }
    Ok(())
}

pub fn run_counters(
    data_dir: String,
    reference: String,
    include_needsbuild: bool,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let archive = resolve_archive(&engine, &reference)?;
    let counters = engine.get_build_counters(archive.id, include_needsbuild)?;
    let building = engine.num_pkgs_building(archive.id)?;

    if json {
        #[derive(Serialize)]
        struct CountersOutput {
            #[serde(flatten)]
            counters: crate::types::BuildCounters,
            packages_building: u64,
            packages_waiting: u64,
        }

        let output = CountersOutput {
            counters,
            packages_building: building.building,
            packages_waiting: building.waiting,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!();
        println!("Build counters for {}", reference);
        println!("{}", "─".repeat(20));
        println!("Failed:      {}", counters.failed);
        println!("Pending:     {}", counters.pending);
        println!("Succeeded:   {}", counters.succeeded);
        println!("Superseded:  {}", counters.superseded);
        println!("Total:       {}", counters.total);
        println!(
            "Packages:    {} building, {} waiting",
            building.building, building.waiting
        );
        println!();
    }
    Ok(())
}

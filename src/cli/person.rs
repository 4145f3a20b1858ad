use chrono::Utc;

use crate::types::Person;

use super::{open_engine, resolve_person};

pub fn run_person_add(
    data_dir: String,
    name: String,
    display_name: Option<String>,
    team: bool,
    private: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;

    if private && !team {
        anyhow::bail!("Only teams can be private");
    }
    if engine.store().get_person_by_name(&name)?.is_some() {
        anyhow::bail!("'{}' already exists", name);
    }

    engine.store().create_person(&Person {
        id: 0,
        display_name: display_name.unwrap_or_else(|| name.clone()),
        name: name.clone(),
        is_team: team,
        private,
        created_at: Utc::now(),
    })?;

    let kind = if team { "team" } else { "person" };
    println!("Created {} \"{}\"", kind, name);
    Ok(())
}

pub fn run_team_add_member(data_dir: String, team: String, member: String) -> anyhow::Result<()> {
    let engine = open_engine(&data_dir)?;
    let team = resolve_person(&engine, &team)?;
    let member = resolve_person(&engine, &member)?;

    if !team.is_team {
        anyhow::bail!("'{}' is not a team", team.name);
    }
    if team.id == member.id {
        anyhow::bail!("A team cannot be a member of itself");
    }

    engine.store().add_team_member(team.id, member.id)?;

    println!("Added '{}' to team '{}'", member.name, team.name);
    Ok(())
}

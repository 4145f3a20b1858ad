use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use uuid::Uuid;

use super::Store;
use super::filter::{BinaryFilter, DependencyScope, NameFilter, SourceFilter};
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::jobs::JobQueue;
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database, mostly for tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so stored timestamps compare correctly as text.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<String>>(idx)?.map(|s| parse_datetime(&s)))
}

fn datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    Ok(parse_datetime(&row.get::<_, String>(idx)?))
}

fn text_enum<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    parse(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(Error::Corrupt(s)))
    })
}

fn not_found_on_empty(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
        other => Error::from(other),
    }
}

fn conflict_on_constraint(e: rusqlite::Error, what: &str) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists(what.to_string())
        }
        other => Error::from(other),
    }
}

const DISTRIBUTION_COLUMNS: &str = "id, name, display_name, redirect_release_uploads, created_at";

fn row_to_distribution(row: &Row<'_>) -> rusqlite::Result<Distribution> {
    Ok(Distribution {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        redirect_release_uploads: row.get(3)?,
        created_at: datetime(row, 4)?,
    })
}

const SERIES_COLUMNS: &str = "id, distribution_id, name, status, nominated_arch_indep_id, created_at";

fn row_to_series(row: &Row<'_>) -> rusqlite::Result<DistroSeries> {
    Ok(DistroSeries {
        id: row.get(0)?,
        distribution_id: row.get(1)?,
        name: row.get(2)?,
        status: text_enum(row, 3, SeriesStatus::parse)?,
        nominated_arch_indep_id: row.get(4)?,
        created_at: datetime(row, 5)?,
    })
}

const PROCESSOR_COLUMNS: &str =
    "id, name, restricted, build_by_default, supports_virtualized, supports_nonvirtualized";

fn row_to_processor(row: &Row<'_>) -> rusqlite::Result<Processor> {
    Ok(Processor {
        id: row.get(0)?,
        name: row.get(1)?,
        restricted: row.get(2)?,
        build_by_default: row.get(3)?,
        supports_virtualized: row.get(4)?,
        supports_nonvirtualized: row.get(5)?,
    })
}

const PERSON_COLUMNS: &str = "id, name, display_name, is_team, private, created_at";

fn row_to_person(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        name: row.get(1)?,
        display_name: row.get(2)?,
        is_team: row.get(3)?,
        private: row.get(4)?,
        created_at: datetime(row, 5)?,
    })
}

const ARCHIVE_COLUMNS: &str = "id, distribution_id, owner_id, name, display_name, purpose, status, enabled, private,
     require_virtualized, permit_obsolete_series_uploads, signing_key_fingerprint, build_secret,
     created_at, updated_at";

fn row_to_archive(row: &Row<'_>) -> rusqlite::Result<Archive> {
    Ok(Archive {
        id: row.get(0)?,
        distribution_id: row.get(1)?,
        owner_id: row.get(2)?,
        name: row.get(3)?,
        display_name: row.get(4)?,
        purpose: text_enum(row, 5, ArchivePurpose::parse)?,
        status: text_enum(row, 6, ArchiveStatus::parse)?,
        enabled: row.get(7)?,
        private: row.get(8)?,
        require_virtualized: row.get(9)?,
        permit_obsolete_series_uploads: row.get(10)?,
        signing_key_fingerprint: row.get(11)?,
        build_secret: row.get(12)?,
        created_at: datetime(row, 13)?,
        updated_at: datetime(row, 14)?,
    })
}

const GRANT_COLUMNS: &str = "id, archive_id, person_id, permission, component, source_name, packageset_id,
     explicit, pocket, series_id, created_at";

fn row_to_grant(row: &Row<'_>) -> rusqlite::Result<PermissionGrant> {
    let columns = TargetColumns {
        component: row.get(4)?,
        package: row.get(5)?,
        packageset_id: row.get(6)?,
        explicit: row.get(7)?,
        pocket: row.get(8)?,
        series_id: row.get(9)?,
    };
    let target = PermissionTarget::from_columns(columns).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            Box::new(Error::Corrupt("permission row without a single target".to_string())),
        )
    })?;

    Ok(PermissionGrant {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        person_id: row.get(2)?,
        kind: text_enum(row, 3, PermissionKind::parse)?,
        target,
        created_at: datetime(row, 10)?,
    })
}

const DEPENDENCY_COLUMNS: &str = "id, archive_id, dependency_id, pocket, component, created_at";

fn row_to_dependency(row: &Row<'_>) -> rusqlite::Result<ArchiveDependency> {
    Ok(ArchiveDependency {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        dependency_id: row.get(2)?,
        pocket: text_enum(row, 3, Pocket::parse)?,
        component: row.get(4)?,
        created_at: datetime(row, 5)?,
    })
}

const SOURCE_COLUMNS: &str = "p.id, p.archive_id, p.series_id, p.pocket, p.component, p.section, p.name,
     p.version, p.status, p.created_at, p.date_removed";

fn row_to_source(row: &Row<'_>) -> rusqlite::Result<SourcePublication> {
    Ok(SourcePublication {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        series_id: row.get(2)?,
        pocket: text_enum(row, 3, Pocket::parse)?,
        component: row.get(4)?,
        section: row.get(5)?,
        name: row.get(6)?,
        version: row.get(7)?,
        status: text_enum(row, 8, PublishingStatus::parse)?,
        created_at: datetime(row, 9)?,
        date_removed: opt_datetime(row, 10)?,
    })
}

const BINARY_COLUMNS: &str = "b.id, b.archive_id, b.arch_series_id, das.architecture_tag, b.pocket, b.component,
     b.section, b.priority, b.name, b.version, b.source_name, b.architecture_specific, b.status,
     b.created_at, b.date_removed";

const BINARY_FROM: &str = "FROM binary_publications b
     JOIN distro_arch_series das ON das.id = b.arch_series_id
     JOIN distro_series ds ON ds.id = das.series_id";

fn row_to_binary(row: &Row<'_>) -> rusqlite::Result<BinaryPublication> {
    Ok(BinaryPublication {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        arch_series_id: row.get(2)?,
        architecture_tag: row.get(3)?,
        pocket: text_enum(row, 4, Pocket::parse)?,
        component: row.get(5)?,
        section: row.get(6)?,
        priority: row.get(7)?,
        name: row.get(8)?,
        version: row.get(9)?,
        source_name: row.get(10)?,
        architecture_specific: row.get(11)?,
        status: text_enum(row, 12, PublishingStatus::parse)?,
        created_at: datetime(row, 13)?,
        date_removed: opt_datetime(row, 14)?,
    })
}

const BUILD_COLUMNS: &str = "id, archive_id, arch_series_id, processor_id, source_name, source_version, status,
     virtualized, created_at";

fn row_to_build(row: &Row<'_>) -> rusqlite::Result<Build> {
    Ok(Build {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        arch_series_id: row.get(2)?,
        processor_id: row.get(3)?,
        source_name: row.get(4)?,
        source_version: row.get(5)?,
        status: text_enum(row, 6, BuildStatus::parse)?,
        virtualized: row.get(7)?,
        created_at: datetime(row, 8)?,
    })
}

const SUBSCRIPTION_COLUMNS: &str = "id, archive_id, subscriber_id, registrant_id, status, description, date_created,
     date_expires, date_cancelled, cancelled_by_id";

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        subscriber_id: row.get(2)?,
        registrant_id: row.get(3)?,
        status: text_enum(row, 4, SubscriptionStatus::parse)?,
        description: row.get(5)?,
        date_created: datetime(row, 6)?,
        date_expires: opt_datetime(row, 7)?,
        date_cancelled: opt_datetime(row, 8)?,
        cancelled_by_id: row.get(9)?,
    })
}

const TOKEN_COLUMNS: &str =
    "id, archive_id, person_id, name, token_lookup, token_hash, date_created, date_deactivated";

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        id: row.get(0)?,
        archive_id: row.get(1)?,
        person_id: row.get(2)?,
        name: row.get(3)?,
        token_lookup: row.get(4)?,
        token_hash: row.get(5)?,
        date_created: datetime(row, 6)?,
        date_deactivated: opt_datetime(row, 7)?,
    })
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Appends the filter clauses shared by source and binary queries.
fn push_publication_clauses(
    filter: &SourceFilter,
    alias: &str,
    series_column: &str,
    clauses: &mut Vec<String>,
    values: &mut Vec<Value>,
) {
    match &filter.name {
        Some(NameFilter::Contains(name)) => {
            clauses.push(format!("instr({alias}.name, ?) > 0"));
            values.push(Value::Text(name.clone()));
        }
        Some(NameFilter::Exact(name)) => {
            clauses.push(format!("{alias}.name = ?"));
            values.push(Value::Text(name.clone()));
        }
        Some(NameFilter::AnyOf(names)) if names.is_empty() => clauses.push("0".to_string()),
        Some(NameFilter::AnyOf(names)) => {
            clauses.push(format!("{alias}.name IN ({})", placeholders(names.len())));
            values.extend(names.iter().cloned().map(Value::Text));
        }
        None => {}
    }
    if let Some(version) = &filter.version {
        clauses.push(format!("{alias}.version = ?"));
        values.push(Value::Text(version.clone()));
    }
    if !filter.statuses.is_empty() {
        clauses.push(format!(
            "{alias}.status IN ({})",
            placeholders(filter.statuses.len())
        ));
        values.extend(
            filter
                .statuses
                .iter()
                .map(|s| Value::Text(s.as_str().to_string())),
        );
    }
    if let Some(series_id) = filter.series_id {
        clauses.push(format!("{series_column} = ?"));
        values.push(Value::Integer(series_id));
    }
    if !filter.pockets.is_empty() {
        clauses.push(format!(
            "{alias}.pocket IN ({})",
            placeholders(filter.pockets.len())
        ));
        values.extend(
            filter
                .pockets
                .iter()
                .map(|p| Value::Text(p.as_str().to_string())),
        );
    }
    if let Some(component) = &filter.component {
        clauses.push(format!("{alias}.component = ?"));
        values.push(Value::Text(component.clone()));
    }
    if let Some(since) = &filter.created_since {
        clauses.push(format!("{alias}.created_at >= ?"));
        values.push(Value::Text(format_datetime(since)));
    }
    if filter.exclude_removed {
        clauses.push(format!("{alias}.date_removed IS NULL"));
    }
}

/// Recomputes the virtualization flag of every pending build of an archive
/// and mirrors it onto the build queue.
fn recalculate_virtualization(conn: &Connection, archive_id: i64) -> Result<usize> {
    let require_virtualized: bool = conn
        .query_row(
            "SELECT require_virtualized FROM archives WHERE id = ?1",
            params![archive_id],
            |row| row.get(0),
        )
        .map_err(not_found_on_empty)?;

    let updated = conn.execute(
        "UPDATE builds SET virtualized = CASE
            WHEN ?2 THEN 1
            ELSE COALESCE(
                (SELECT NOT p.supports_nonvirtualized FROM processors p WHERE p.id = builds.processor_id),
                1)
         END
         WHERE archive_id = ?1 AND status = 'NEEDSBUILD'",
        params![archive_id, require_virtualized],
    )?;

    conn.execute(
        "UPDATE build_queue SET virtualized =
            (SELECT b.virtualized FROM builds b WHERE b.id = build_queue.build_id)
         WHERE build_id IN (SELECT id FROM builds WHERE archive_id = ?1 AND status = 'NEEDSBUILD')",
        params![archive_id],
    )?;

    Ok(updated)
}

fn set_pending_queue_status(conn: &Connection, archive_id: i64, status: QueueStatus) -> Result<usize> {
    let rows = conn.execute(
        "UPDATE build_queue SET status = ?2
         WHERE status IN ('WAITING', 'SUSPENDED')
           AND build_id IN (SELECT id FROM builds WHERE archive_id = ?1 AND status = 'NEEDSBUILD')",
        params![archive_id, status.as_str()],
    )?;
    Ok(rows)
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Distribution operations

    fn create_distribution(&self, distro: &Distribution) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO distributions (name, display_name, redirect_release_uploads, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                distro.name,
                distro.display_name,
                distro.redirect_release_uploads,
                format_datetime(&distro.created_at),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "distribution"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_distribution(&self, id: i64) -> Result<Option<Distribution>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE id = ?1"),
            params![id],
            row_to_distribution,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_distribution_by_name(&self, name: &str) -> Result<Option<Distribution>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {DISTRIBUTION_COLUMNS} FROM distributions WHERE name = ?1"),
            params![name],
            row_to_distribution,
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_series(&self, series: &DistroSeries) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO distro_series (distribution_id, name, status, nominated_arch_indep_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                series.distribution_id,
                series.name,
                series.status.as_str(),
                series.nominated_arch_indep_id,
                format_datetime(&series.created_at),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "distro series"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_series(&self, id: i64) -> Result<Option<DistroSeries>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SERIES_COLUMNS} FROM distro_series WHERE id = ?1"),
            params![id],
            row_to_series,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_series_by_name(
        &self,
        distribution_id: i64,
        name: &str,
    ) -> Result<Option<DistroSeries>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {SERIES_COLUMNS} FROM distro_series WHERE distribution_id = ?1 AND name = ?2"
            ),
            params![distribution_id, name],
            row_to_series,
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_series_status(&self, id: i64, status: SeriesStatus) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE distro_series SET status = ?1 WHERE id = ?2",
            params![status.as_str(), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn add_series_parent(&self, parent: &SeriesParent) -> Result<()> {
        self.conn().execute(
            "INSERT INTO distro_series_parents (derived_series_id, parent_series_id, ordering, inherit_overrides)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (derived_series_id, parent_series_id) DO UPDATE SET
                ordering = excluded.ordering,
                inherit_overrides = excluded.inherit_overrides",
            params![
                parent.derived_series_id,
                parent.parent_series_id,
                parent.ordering,
                parent.inherit_overrides,
            ],
        )?;
        Ok(())
    }

    fn list_series_parents(&self, derived_series_id: i64) -> Result<Vec<SeriesParent>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT derived_series_id, parent_series_id, ordering, inherit_overrides
             FROM distro_series_parents WHERE derived_series_id = ?1
             ORDER BY ordering, parent_series_id",
        )?;

        let rows = stmt.query_map(params![derived_series_id], |row| {
            Ok(SeriesParent {
                derived_series_id: row.get(0)?,
                parent_series_id: row.get(1)?,
                ordering: row.get(2)?,
                inherit_overrides: row.get(3)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn create_arch_series(&self, das: &DistroArchSeries) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO distro_arch_series (series_id, architecture_tag, processor_id)
             VALUES (?1, ?2, ?3)",
            params![das.series_id, das.architecture_tag, das.processor_id],
        )
        .map_err(|e| conflict_on_constraint(e, "distro arch series"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_arch_series(&self, id: i64) -> Result<Option<DistroArchSeries>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, series_id, architecture_tag, processor_id FROM distro_arch_series WHERE id = ?1",
            params![id],
            |row| {
                Ok(DistroArchSeries {
                    id: row.get(0)?,
                    series_id: row.get(1)?,
                    architecture_tag: row.get(2)?,
                    processor_id: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn set_nominated_arch_indep(&self, series_id: i64, arch_series_id: i64) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE distro_series SET nominated_arch_indep_id = ?1 WHERE id = ?2",
            params![arch_series_id, series_id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    // Processor operations

    fn create_processor(&self, processor: &Processor) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO processors (name, restricted, build_by_default, supports_virtualized, supports_nonvirtualized)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                processor.name,
                processor.restricted,
                processor.build_by_default,
                processor.supports_virtualized,
                processor.supports_nonvirtualized,
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "processor"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_processor(&self, id: i64) -> Result<Option<Processor>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROCESSOR_COLUMNS} FROM processors WHERE id = ?1"),
            params![id],
            row_to_processor,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_processor_by_name(&self, name: &str) -> Result<Option<Processor>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROCESSOR_COLUMNS} FROM processors WHERE name = ?1"),
            params![name],
            row_to_processor,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_processors(&self) -> Result<Vec<Processor>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare(&format!("SELECT {PROCESSOR_COLUMNS} FROM processors ORDER BY name"))?;
        let rows = stmt.query_map([], row_to_processor)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_processor_nonvirtualized(&self, id: i64, supported: bool) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE processors SET supports_nonvirtualized = ?1 WHERE id = ?2",
            params![supported, id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn component_exists(&self, name: &str) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM components WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // Person operations

    fn create_person(&self, person: &Person) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO persons (name, display_name, is_team, private, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                person.name,
                person.display_name,
                person.is_team,
                person.private,
                format_datetime(&person.created_at),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "person"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_person(&self, id: i64) -> Result<Option<Person>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?1"),
            params![id],
            row_to_person,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_person_by_name(&self, name: &str) -> Result<Option<Person>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PERSON_COLUMNS} FROM persons WHERE name = ?1"),
            params![name],
            row_to_person,
        )
        .optional()
        .map_err(Error::from)
    }

    fn add_team_member(&self, team_id: i64, member_id: i64) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO team_members (team_id, member_id) VALUES (?1, ?2)",
            params![team_id, member_id],
        )?;
        Ok(())
    }

    fn participates_in(&self, person_id: i64, team_id: i64) -> Result<bool> {
        let conn = self.conn();
        let found: bool = conn.query_row(
            "WITH RECURSIVE teams(id) AS (
                SELECT ?1
                UNION
                SELECT tm.team_id FROM team_members tm JOIN teams t ON tm.member_id = t.id
             )
             SELECT EXISTS(SELECT 1 FROM teams WHERE id = ?2)",
            params![person_id, team_id],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    // Archive operations

    fn create_archive(&self, archive: &Archive, processor_ids: &[i64]) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO archives (distribution_id, owner_id, name, display_name, purpose, status, enabled,
                private, require_virtualized, permit_obsolete_series_uploads, signing_key_fingerprint,
                build_secret, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                archive.distribution_id,
                archive.owner_id,
                archive.name,
                archive.display_name,
                archive.purpose.as_str(),
                archive.status.as_str(),
                archive.enabled,
                archive.private,
                archive.require_virtualized,
                archive.permit_obsolete_series_uploads,
                archive.signing_key_fingerprint,
                archive.build_secret,
                format_datetime(&archive.created_at),
                format_datetime(&archive.updated_at),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "archive"))?;
        let id = tx.last_insert_rowid();

        for processor_id in processor_ids {
            tx.execute(
                "INSERT OR IGNORE INTO archive_processors (archive_id, processor_id) VALUES (?1, ?2)",
                params![id, processor_id],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    fn get_archive(&self, id: i64) -> Result<Option<Archive>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {ARCHIVE_COLUMNS} FROM archives WHERE id = ?1"),
            params![id],
            row_to_archive,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_archive_by_name(&self, distribution_id: i64, name: &str) -> Result<Option<Archive>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {ARCHIVE_COLUMNS} FROM archives
                 WHERE distribution_id = ?1 AND name = ?2 AND purpose != 'PPA'"
            ),
            params![distribution_id, name],
            row_to_archive,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_ppa(&self, distribution_id: i64, owner_id: i64, name: &str) -> Result<Option<Archive>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {ARCHIVE_COLUMNS} FROM archives
                 WHERE distribution_id = ?1 AND owner_id = ?2 AND name = ?3 AND purpose = 'PPA'"
            ),
            params![distribution_id, owner_id, name],
            row_to_archive,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_archive_by_purpose(
        &self,
        distribution_id: i64,
        purpose: ArchivePurpose,
    ) -> Result<Option<Archive>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {ARCHIVE_COLUMNS} FROM archives
                 WHERE distribution_id = ?1 AND purpose = ?2 ORDER BY id LIMIT 1"
            ),
            params![distribution_id, purpose.as_str()],
            row_to_archive,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_archives(&self, distribution_id: i64) -> Result<Vec<Archive>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM archives WHERE distribution_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![distribution_id], row_to_archive)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_archive(&self, archive: &Archive) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE archives SET name = ?1, display_name = ?2, permit_obsolete_series_uploads = ?3,
                    signing_key_fingerprint = ?4, updated_at = ?5
                 WHERE id = ?6",
                params![
                    archive.name,
                    archive.display_name,
                    archive.permit_obsolete_series_uploads,
                    archive.signing_key_fingerprint,
                    format_datetime(&Utc::now()),
                    archive.id,
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "archive"))?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_archive_enabled(&self, id: i64, enabled: bool) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Only ACTIVE archives may be enabled; disabling is always allowed.
        let rows = tx.execute(
            "UPDATE archives SET enabled = ?1, updated_at = ?2
             WHERE id = ?3 AND (?1 = 0 OR status = 'ACTIVE')",
            params![enabled, format_datetime(&Utc::now()), id],
        )?;
        if rows == 0 {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM archives WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            return Err(if exists {
                Error::InvalidState(format!("archive {id} is being deleted and cannot be enabled"))
            } else {
                Error::NotFound
            });
        }

        let queue_status = if enabled {
            QueueStatus::Waiting
        } else {
            QueueStatus::Suspended
        };
        let moved = set_pending_queue_status(&tx, id, queue_status)?;

        // Processor capabilities or require_virtualized may have changed
        // while the archive was disabled.
        if enabled {
            recalculate_virtualization(&tx, id)?;
        }

        tx.commit()?;
        Ok(moved)
    }

    fn mark_archive_deleting(&self, id: i64) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE archives SET status = 'DELETING', enabled = 0, updated_at = ?1
             WHERE id = ?2 AND status = 'ACTIVE'",
            params![format_datetime(&Utc::now()), id],
        )?;
        if rows == 0 {
            return Err(Error::ArchiveAlreadyDeleted);
        }
        set_pending_queue_status(&tx, id, QueueStatus::Suspended)?;

        tx.commit()?;
        Ok(())
    }

    fn set_archive_privacy(&self, id: i64, private: bool, build_secret: Option<&str>) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let published: i64 = tx.query_row(
            "SELECT COUNT(*) FROM source_publications
             WHERE archive_id = ?1 AND status IN ('PENDING', 'PUBLISHED')",
            params![id],
            |row| row.get(0),
        )?;
        if published > 0 {
            return Err(Error::CannotSwitchPrivacy(
                "This archive has had sources published and therefore cannot have its privacy switched."
                    .to_string(),
            ));
        }

        let rows = tx.execute(
            "UPDATE archives SET private = ?1, build_secret = ?2, updated_at = ?3 WHERE id = ?4",
            params![private, build_secret, format_datetime(&Utc::now()), id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        tx.commit()?;
        Ok(())
    }

    fn set_require_virtualized(&self, id: i64, require_virtualized: bool) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE archives SET require_virtualized = ?1, updated_at = ?2 WHERE id = ?3",
            params![require_virtualized, format_datetime(&Utc::now()), id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }
        let updated = recalculate_virtualization(&tx, id)?;

        tx.commit()?;
        Ok(updated)
    }

    fn recalculate_build_virtualization(&self, id: i64) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let updated = recalculate_virtualization(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn list_archive_processors(&self, id: i64) -> Result<Vec<Processor>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.restricted, p.build_by_default, p.supports_virtualized, p.supports_nonvirtualized
             FROM processors p
             JOIN archive_processors ap ON ap.processor_id = p.id
             WHERE ap.archive_id = ?1
             ORDER BY p.name",
        )?;
        let rows = stmt.query_map(params![id], row_to_processor)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_archive_processors(&self, id: i64, processor_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM archive_processors WHERE archive_id = ?1",
            params![id],
        )?;
        for processor_id in processor_ids {
            tx.execute(
                "INSERT OR IGNORE INTO archive_processors (archive_id, processor_id) VALUES (?1, ?2)",
                params![id, processor_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn list_dirty_suites(&self, id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT suite FROM archive_dirty_suites WHERE archive_id = ?1 ORDER BY suite",
        )?;
        let rows = stmt.query_map(params![id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn add_dirty_suite(&self, id: i64, suite: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO archive_dirty_suites (archive_id, suite) VALUES (?1, ?2)",
            params![id, suite],
        )?;
        Ok(())
    }

    fn clear_dirty_suites(&self, id: i64) -> Result<()> {
        self.conn().execute(
            "DELETE FROM archive_dirty_suites WHERE archive_id = ?1",
            params![id],
        )?;
        Ok(())
    }

    // Permission operations

    fn create_grant(&self, grant: &PermissionGrant) -> Result<i64> {
        let cols = grant.target.to_columns();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO archive_permissions (archive_id, person_id, permission, component, source_name,
                packageset_id, explicit, pocket, series_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                grant.archive_id,
                grant.person_id,
                grant.kind.as_str(),
                cols.component,
                cols.package,
                cols.packageset_id,
                cols.explicit,
                cols.pocket,
                cols.series_id,
                format_datetime(&grant.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_grant(
        &self,
        archive_id: i64,
        person_id: i64,
        kind: PermissionKind,
        target: &PermissionTarget,
    ) -> Result<Option<PermissionGrant>> {
        let cols = target.to_columns();
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {GRANT_COLUMNS} FROM archive_permissions
                 WHERE archive_id = ?1 AND person_id = ?2 AND permission = ?3
                   AND component IS ?4 AND source_name IS ?5 AND packageset_id IS ?6
                   AND pocket IS ?7 AND series_id IS ?8
                 ORDER BY id LIMIT 1"
            ),
            params![
                archive_id,
                person_id,
                kind.as_str(),
                cols.component,
                cols.package,
                cols.packageset_id,
                cols.pocket,
                cols.series_id,
            ],
            row_to_grant,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_grants(
        &self,
        archive_id: i64,
        kind: Option<PermissionKind>,
    ) -> Result<Vec<PermissionGrant>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {GRANT_COLUMNS} FROM archive_permissions
             WHERE archive_id = ?1 AND (?2 IS NULL OR permission = ?2)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![archive_id, kind.map(|k| k.as_str())], row_to_grant)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_grant(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM archive_permissions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Packageset operations

    fn create_packageset(&self, packageset: &Packageset) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO packagesets (series_id, name, description) VALUES (?1, ?2, ?3)",
            params![packageset.series_id, packageset.name, packageset.description],
        )
        .map_err(|e| conflict_on_constraint(e, "packageset"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_packageset(&self, id: i64) -> Result<Option<Packageset>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, series_id, name, description FROM packagesets WHERE id = ?1",
            params![id],
            |row| {
                Ok(Packageset {
                    id: row.get(0)?,
                    series_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn add_packageset_source(&self, packageset_id: i64, source_name: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO packageset_sources (packageset_id, source_name) VALUES (?1, ?2)",
            params![packageset_id, source_name],
        )?;
        Ok(())
    }

    fn add_packageset_inclusion(&self, parent_id: i64, child_id: i64) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO packageset_inclusions (parent_id, child_id) VALUES (?1, ?2)",
            params![parent_id, child_id],
        )?;
        Ok(())
    }

    fn packagesets_covering(&self, series_id: i64, source_name: &str) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "WITH RECURSIVE sets(id) AS (
                SELECT ps.id FROM packagesets ps
                JOIN packageset_sources s ON s.packageset_id = ps.id
                WHERE ps.series_id = ?1 AND s.source_name = ?2
                UNION
                SELECT i.parent_id FROM packageset_inclusions i JOIN sets ON i.child_id = sets.id
             )
             SELECT id FROM sets ORDER BY id",
        )?;
        let rows = stmt.query_map(params![series_id, source_name], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Archive dependency operations

    fn create_archive_dependency(&self, dep: &ArchiveDependency) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO archive_dependencies (archive_id, dependency_id, pocket, component, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                dep.archive_id,
                dep.dependency_id,
                dep.pocket.as_str(),
                dep.component,
                format_datetime(&dep.created_at),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "archive dependency"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_archive_dependency(
        &self,
        archive_id: i64,
        dependency_id: i64,
    ) -> Result<Option<ArchiveDependency>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM archive_dependencies
                 WHERE archive_id = ?1 AND dependency_id = ?2"
            ),
            params![archive_id, dependency_id],
            row_to_dependency,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_archive_dependencies(&self, archive_id: i64) -> Result<Vec<ArchiveDependency>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {DEPENDENCY_COLUMNS} FROM archive_dependencies WHERE archive_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![archive_id], row_to_dependency)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_archive_dependency(&self, archive_id: i64, dependency_id: i64) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM archive_dependencies WHERE archive_id = ?1 AND dependency_id = ?2",
            params![archive_id, dependency_id],
        )?;
        Ok(rows > 0)
    }

    // Publication operations

    fn create_source_publication(&self, publication: &SourcePublication) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO source_publications (archive_id, series_id, pocket, component, section, name, version,
                status, created_at, date_removed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                publication.archive_id,
                publication.series_id,
                publication.pocket.as_str(),
                publication.component,
                publication.section,
                publication.name,
                publication.version,
                publication.status.as_str(),
                format_datetime(&publication.created_at),
                publication.date_removed.as_ref().map(format_datetime),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn create_binary_publication(&self, publication: &BinaryPublication) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO binary_publications (archive_id, arch_series_id, pocket, component, section, priority,
                name, version, source_name, architecture_specific, status, created_at, date_removed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                publication.archive_id,
                publication.arch_series_id,
                publication.pocket.as_str(),
                publication.component,
                publication.section,
                publication.priority,
                publication.name,
                publication.version,
                publication.source_name,
                publication.architecture_specific,
                publication.status.as_str(),
                format_datetime(&publication.created_at),
                publication.date_removed.as_ref().map(format_datetime),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn set_source_publication_status(
        &self,
        id: i64,
        status: PublishingStatus,
        date_removed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE source_publications SET status = ?1, date_removed = ?2 WHERE id = ?3",
            params![
                status.as_str(),
                date_removed.as_ref().map(format_datetime),
                id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_binary_publication_status(
        &self,
        id: i64,
        status: PublishingStatus,
        date_removed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE binary_publications SET status = ?1, date_removed = ?2 WHERE id = ?3",
            params![
                status.as_str(),
                date_removed.as_ref().map(format_datetime),
                id
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn add_published_file(&self, file: &PublishedFile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO published_files (kind, publication_id, filename, size) VALUES (?1, ?2, ?3, ?4)",
            params![file.kind.as_str(), file.publication_id, file.filename, file.size],
        )?;
        Ok(())
    }

    fn find_source_publications(
        &self,
        archive_id: i64,
        filter: &SourceFilter,
    ) -> Result<Vec<SourcePublication>> {
        let mut clauses = vec!["p.archive_id = ?".to_string()];
        let mut values = vec![Value::Integer(archive_id)];
        push_publication_clauses(filter, "p", "p.series_id", &mut clauses, &mut values);

        let sql = format!(
            "SELECT {SOURCE_COLUMNS} FROM source_publications p WHERE {} ORDER BY p.id DESC",
            clauses.join(" AND ")
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_source)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn find_binary_publications(
        &self,
        archive_id: i64,
        filter: &BinaryFilter,
    ) -> Result<Vec<BinaryPublication>> {
        let mut clauses = vec!["b.archive_id = ?".to_string()];
        let mut values = vec![Value::Integer(archive_id)];
        push_publication_clauses(&filter.source, "b", "das.series_id", &mut clauses, &mut values);

        if let Some(arch_series_id) = filter.arch_series_id {
            clauses.push("b.arch_series_id = ?".to_string());
            values.push(Value::Integer(arch_series_id));
        }
        if filter.on_disk {
            clauses.push(
                "(b.architecture_specific = 1 OR ds.nominated_arch_indep_id = b.arch_series_id)"
                    .to_string(),
            );
        }

        let sql = format!(
            "SELECT {BINARY_COLUMNS} {BINARY_FROM} WHERE {} ORDER BY b.id DESC",
            clauses.join(" AND ")
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_binary)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn published_size(&self, archive_id: i64, kind: PublicationKind) -> Result<i64> {
        let table = match kind {
            PublicationKind::Source => "source_publications",
            PublicationKind::Binary => "binary_publications",
        };
        let conn = self.conn();
        let size: i64 = conn.query_row(
            &format!(
                "SELECT COALESCE(SUM(size), 0) FROM (
                    SELECT DISTINCT f.filename, f.size
                    FROM published_files f
                    JOIN {table} p ON p.id = f.publication_id
                    WHERE f.kind = ?1 AND p.archive_id = ?2 AND p.date_removed IS NULL
                 )"
            ),
            params![kind.as_str(), archive_id],
            |row| row.get(0),
        )?;
        Ok(size)
    }

    fn find_dependency_candidates(
        &self,
        arch_series_id: i64,
        binary_name: &str,
        scopes: &[DependencyScope],
    ) -> Result<Vec<BinaryPublication>> {
        let mut parts = Vec::new();
        let mut values = Vec::new();

        for (rank, scope) in scopes.iter().enumerate() {
            if scope.components.is_empty() {
                tracing::warn!(
                    archive_id = scope.archive_id,
                    pocket = %scope.pocket,
                    binary = binary_name,
                    "Dependency scope has no components; skipping"
                );
                continue;
            }
            parts.push(format!(
                "SELECT {BINARY_COLUMNS}, {rank} AS scope_rank {BINARY_FROM}
                 WHERE b.archive_id = ? AND b.arch_series_id = ? AND b.pocket = ? AND b.name = ?
                   AND b.status = 'PUBLISHED' AND b.component IN ({})",
                placeholders(scope.components.len())
            ));
            values.push(Value::Integer(scope.archive_id));
            values.push(Value::Integer(arch_series_id));
            values.push(Value::Text(scope.pocket.as_str().to_string()));
            values.push(Value::Text(binary_name.to_string()));
            values.extend(scope.components.iter().cloned().map(Value::Text));
        }

        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM ({}) ORDER BY scope_rank, id DESC",
            parts.join(" UNION ALL ")
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_binary)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Build operations

    fn create_build(&self, build: &Build) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO builds (archive_id, arch_series_id, processor_id, source_name, source_version, status,
                virtualized, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                build.archive_id,
                build.arch_series_id,
                build.processor_id,
                build.source_name,
                build.source_version,
                build.status.as_str(),
                build.virtualized,
                format_datetime(&build.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_build(&self, id: i64) -> Result<Option<Build>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {BUILD_COLUMNS} FROM builds WHERE id = ?1"),
            params![id],
            row_to_build,
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_queue_entry(&self, entry: &BuildQueueEntry) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO build_queue (build_id, status, virtualized) VALUES (?1, ?2, ?3)",
            params![entry.build_id, entry.status.as_str(), entry.virtualized],
        )
        .map_err(|e| conflict_on_constraint(e, "build queue entry"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_queue_entry_for_build(&self, build_id: i64) -> Result<Option<BuildQueueEntry>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, build_id, status, virtualized FROM build_queue WHERE build_id = ?1",
            params![build_id],
            |row| {
                Ok(BuildQueueEntry {
                    id: row.get(0)?,
                    build_id: row.get(1)?,
                    status: text_enum(row, 2, QueueStatus::parse)?,
                    virtualized: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn build_status_histogram(&self, archive_id: i64) -> Result<Vec<(BuildStatus, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM builds WHERE archive_id = ?1 GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map(params![archive_id], |row| {
            Ok((
                text_enum(row, 0, BuildStatus::parse)?,
                row.get::<_, i64>(1)? as u64,
            ))
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_packages_building(&self, archive_id: i64) -> Result<PackagesBuilding> {
        let conn = self.conn();
        let building: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT DISTINCT source_name, source_version FROM builds
                WHERE archive_id = ?1 AND status = 'BUILDING'
             )",
            params![archive_id],
            |row| row.get(0),
        )?;
        // A source with any build in progress is never also reported as waiting.
        let waiting: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (
                SELECT source_name, source_version FROM builds
                WHERE archive_id = ?1 AND status = 'NEEDSBUILD'
                EXCEPT
                SELECT source_name, source_version FROM builds
                WHERE archive_id = ?1 AND status = 'BUILDING'
             )",
            params![archive_id],
            |row| row.get(0),
        )?;

        Ok(PackagesBuilding {
            building: building as u64,
            waiting: waiting as u64,
        })
    }

    fn list_copy_jobs(&self, target_archive_id: i64) -> Result<Vec<CopyJob>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT job_id, metadata, created_at FROM copy_jobs WHERE target_archive_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![target_archive_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                datetime(row, 2)?,
            ))
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            let (job_id, metadata, created_at) = row?;
            jobs.push(CopyJob {
                handle: JobHandle { id: job_id },
                request: serde_json::from_str(&metadata)?,
                created_at,
            });
        }
        Ok(jobs)
    }

    // Subscription operations

    fn create_subscription(&self, subscription: &Subscription) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO archive_subscribers (archive_id, subscriber_id, registrant_id, status, description,
                date_created, date_expires, date_cancelled, cancelled_by_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                subscription.archive_id,
                subscription.subscriber_id,
                subscription.registrant_id,
                subscription.status.as_str(),
                subscription.description,
                format_datetime(&subscription.date_created),
                subscription.date_expires.as_ref().map(format_datetime),
                subscription.date_cancelled.as_ref().map(format_datetime),
                subscription.cancelled_by_id,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_subscription(&self, id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM archive_subscribers WHERE id = ?1"),
            params![id],
            row_to_subscription,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_subscriptions(&self, archive_id: i64) -> Result<Vec<Subscription>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM archive_subscribers WHERE archive_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![archive_id], row_to_subscription)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn cancel_subscription(
        &self,
        id: i64,
        cancelled_by_id: i64,
        when: DateTime<Utc>,
        deactivate_token_ids: &[i64],
    ) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let when = format_datetime(&when);

        let rows = tx.execute(
            "UPDATE archive_subscribers SET status = 'CANCELLED', date_cancelled = ?1, cancelled_by_id = ?2
             WHERE id = ?3",
            params![when, cancelled_by_id, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound);
        }

        let mut deactivated = 0;
        for token_id in deactivate_token_ids {
            deactivated += tx.execute(
                "UPDATE archive_auth_tokens SET date_deactivated = ?1
                 WHERE id = ?2 AND date_deactivated IS NULL",
                params![when, token_id],
            )?;
        }

        tx.commit()?;
        Ok(deactivated)
    }

    // Auth token operations

    fn create_auth_token(&self, token: &AuthToken) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO archive_auth_tokens (archive_id, person_id, name, token_lookup, token_hash, date_created,
                date_deactivated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.archive_id,
                token.person_id,
                token.name,
                token.token_lookup,
                token.token_hash,
                format_datetime(&token.date_created),
                token.date_deactivated.as_ref().map(format_datetime),
            ],
        )
        .map_err(|e| conflict_on_constraint(e, "auth token"))?;
        Ok(conn.last_insert_rowid())
    }

    fn get_active_person_token(
        &self,
        archive_id: i64,
        person_id: i64,
    ) -> Result<Option<AuthToken>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {TOKEN_COLUMNS} FROM archive_auth_tokens
                 WHERE archive_id = ?1 AND person_id = ?2 AND date_deactivated IS NULL"
            ),
            params![archive_id, person_id],
            row_to_token,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_active_named_token(&self, archive_id: i64, name: &str) -> Result<Option<AuthToken>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {TOKEN_COLUMNS} FROM archive_auth_tokens
                 WHERE archive_id = ?1 AND name = ?2 AND date_deactivated IS NULL"
            ),
            params![archive_id, name],
            row_to_token,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_auth_tokens(&self, archive_id: i64, active_only: bool) -> Result<Vec<AuthToken>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TOKEN_COLUMNS} FROM archive_auth_tokens
             WHERE archive_id = ?1 AND (?2 = 0 OR date_deactivated IS NULL)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![archive_id, active_only], row_to_token)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn deactivate_auth_token(&self, id: i64, when: DateTime<Utc>) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE archive_auth_tokens SET date_deactivated = ?1
             WHERE id = ?2 AND date_deactivated IS NULL",
            params![format_datetime(&when), id],
        )?;
        Ok(rows > 0)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl JobQueue for SqliteStore {
    fn enqueue(&self, requests: &[CopyJobRequest]) -> Result<Vec<JobHandle>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let now = format_datetime(&Utc::now());
        let mut handles = Vec::with_capacity(requests.len());
        for request in requests {
            let job_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO copy_jobs (job_id, package_name, source_archive_id, target_archive_id, copy_policy,
                    requester_id, status, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'WAITING', ?7, ?8)",
                params![
                    job_id,
                    request.package_name,
                    request.source_archive_id,
                    request.target_archive_id,
                    request.copy_policy.as_str(),
                    request.requester_id,
                    serde_json::to_string(request)?,
                    now,
                ],
            )?;
            handles.push(JobHandle { id: job_id });
        }

        tx.commit()?;
        Ok(handles)
    }
}

pub const SCHEMA: &str = r#"
-- Distributions and their series
CREATE TABLE IF NOT EXISTS distributions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    redirect_release_uploads INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS processors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    restricted INTEGER NOT NULL DEFAULT 0,
    build_by_default INTEGER NOT NULL DEFAULT 1,
    supports_virtualized INTEGER NOT NULL DEFAULT 1,
    supports_nonvirtualized INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS distro_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    distribution_id INTEGER NOT NULL REFERENCES distributions(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    -- Architecture whose arch-indep binaries are the canonical on-disk copy
    nominated_arch_indep_id INTEGER REFERENCES distro_arch_series(id) ON DELETE SET NULL,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(distribution_id, name)
);

CREATE TABLE IF NOT EXISTS distro_series_parents (
    derived_series_id INTEGER NOT NULL REFERENCES distro_series(id) ON DELETE CASCADE,
    parent_series_id INTEGER NOT NULL REFERENCES distro_series(id) ON DELETE CASCADE,
    ordering INTEGER NOT NULL DEFAULT 1,
    inherit_overrides INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (derived_series_id, parent_series_id)
);

CREATE TABLE IF NOT EXISTS distro_arch_series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    series_id INTEGER NOT NULL REFERENCES distro_series(id) ON DELETE CASCADE,
    architecture_tag TEXT NOT NULL,
    processor_id INTEGER NOT NULL REFERENCES processors(id),

    UNIQUE(series_id, architecture_tag)
);

CREATE TABLE IF NOT EXISTS components (
    name TEXT PRIMARY KEY
);

INSERT OR IGNORE INTO components (name) VALUES
    ('main'), ('restricted'), ('universe'), ('multiverse'), ('partner');

-- People and teams
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    is_team INTEGER NOT NULL DEFAULT 0,
    private INTEGER NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Direct memberships; participation is resolved transitively
CREATE TABLE IF NOT EXISTS team_members (
    team_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    member_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    PRIMARY KEY (team_id, member_id)
);

-- Archives
CREATE TABLE IF NOT EXISTS archives (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    distribution_id INTEGER NOT NULL REFERENCES distributions(id),
    owner_id INTEGER NOT NULL REFERENCES persons(id),
    name TEXT NOT NULL,
    display_name TEXT NOT NULL,
    purpose TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    enabled INTEGER NOT NULL DEFAULT 1,
    private INTEGER NOT NULL DEFAULT 0,
    require_virtualized INTEGER NOT NULL DEFAULT 1,
    permit_obsolete_series_uploads INTEGER NOT NULL DEFAULT 0,
    signing_key_fingerprint TEXT,
    build_secret TEXT,             -- NULL unless private
    created_at TEXT DEFAULT (datetime('now')),
    updated_at TEXT DEFAULT (datetime('now'))
);

-- Non-PPA names are unique per distribution, PPA names per owner
CREATE UNIQUE INDEX IF NOT EXISTS idx_archives_distro_name
    ON archives(distribution_id, name) WHERE purpose != 'PPA';
CREATE UNIQUE INDEX IF NOT EXISTS idx_archives_ppa_name
    ON archives(distribution_id, owner_id, name) WHERE purpose = 'PPA';
CREATE UNIQUE INDEX IF NOT EXISTS idx_archives_one_primary
    ON archives(distribution_id) WHERE purpose = 'PRIMARY';

CREATE TABLE IF NOT EXISTS archive_processors (
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    processor_id INTEGER NOT NULL REFERENCES processors(id) ON DELETE CASCADE,
    PRIMARY KEY (archive_id, processor_id)
);

CREATE TABLE IF NOT EXISTS archive_dirty_suites (
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    suite TEXT NOT NULL,
    PRIMARY KEY (archive_id, suite)
);

CREATE TABLE IF NOT EXISTS archive_dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    dependency_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    pocket TEXT NOT NULL,
    component TEXT REFERENCES components(name),
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(archive_id, dependency_id)
);

-- Packagesets (hierarchical groups of source names, per series)
CREATE TABLE IF NOT EXISTS packagesets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    series_id INTEGER NOT NULL REFERENCES distro_series(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',

    UNIQUE(series_id, name)
);

CREATE TABLE IF NOT EXISTS packageset_sources (
    packageset_id INTEGER NOT NULL REFERENCES packagesets(id) ON DELETE CASCADE,
    source_name TEXT NOT NULL,
    PRIMARY KEY (packageset_id, source_name)
);

CREATE TABLE IF NOT EXISTS packageset_inclusions (
    parent_id INTEGER NOT NULL REFERENCES packagesets(id) ON DELETE CASCADE,
    child_id INTEGER NOT NULL REFERENCES packagesets(id) ON DELETE CASCADE,
    PRIMARY KEY (parent_id, child_id)
);

-- Upload and queue-admin grants; exactly one target column is set
CREATE TABLE IF NOT EXISTS archive_permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    permission TEXT NOT NULL,
    component TEXT REFERENCES components(name),
    source_name TEXT,
    packageset_id INTEGER REFERENCES packagesets(id) ON DELETE CASCADE,
    explicit INTEGER NOT NULL DEFAULT 0,
    pocket TEXT,
    series_id INTEGER REFERENCES distro_series(id) ON DELETE CASCADE,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Publications
CREATE TABLE IF NOT EXISTS source_publications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    series_id INTEGER NOT NULL REFERENCES distro_series(id),
    pocket TEXT NOT NULL,
    component TEXT NOT NULL REFERENCES components(name),
    section TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    date_removed TEXT
);

CREATE TABLE IF NOT EXISTS binary_publications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    arch_series_id INTEGER NOT NULL REFERENCES distro_arch_series(id),
    pocket TEXT NOT NULL,
    component TEXT NOT NULL REFERENCES components(name),
    section TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'optional',
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    source_name TEXT NOT NULL,
    architecture_specific INTEGER NOT NULL DEFAULT 1,
    status TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    date_removed TEXT
);

CREATE TABLE IF NOT EXISTS published_files (
    kind TEXT NOT NULL,            -- 'source' or 'binary'
    publication_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    size INTEGER NOT NULL
);

-- Builds and the build farm queue
CREATE TABLE IF NOT EXISTS builds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    arch_series_id INTEGER NOT NULL REFERENCES distro_arch_series(id),
    processor_id INTEGER NOT NULL REFERENCES processors(id),
    source_name TEXT NOT NULL,
    source_version TEXT NOT NULL,
    status TEXT NOT NULL,
    virtualized INTEGER NOT NULL DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS build_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_id INTEGER NOT NULL UNIQUE REFERENCES builds(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'WAITING',
    virtualized INTEGER NOT NULL DEFAULT 1
);

-- Asynchronous copy jobs; the worker consuming them lives elsewhere
CREATE TABLE IF NOT EXISTS copy_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL UNIQUE,
    package_name TEXT NOT NULL,
    source_archive_id INTEGER NOT NULL REFERENCES archives(id),
    target_archive_id INTEGER NOT NULL REFERENCES archives(id),
    copy_policy TEXT NOT NULL,
    requester_id INTEGER NOT NULL REFERENCES persons(id),
    status TEXT NOT NULL DEFAULT 'WAITING',
    metadata TEXT NOT NULL,        -- full request as JSON
    created_at TEXT DEFAULT (datetime('now'))
);

-- Private archive access
CREATE TABLE IF NOT EXISTS archive_subscribers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    subscriber_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
    registrant_id INTEGER NOT NULL REFERENCES persons(id),
    status TEXT NOT NULL,
    description TEXT,
    date_created TEXT DEFAULT (datetime('now')),
    date_expires TEXT,
    date_cancelled TEXT,
    cancelled_by_id INTEGER REFERENCES persons(id)
);

CREATE TABLE IF NOT EXISTS archive_auth_tokens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    archive_id INTEGER NOT NULL REFERENCES archives(id) ON DELETE CASCADE,
    person_id INTEGER REFERENCES persons(id) ON DELETE CASCADE,
    name TEXT,
    token_lookup TEXT NOT NULL,    -- first 8 chars of a UUID for fast lookup
    token_hash TEXT NOT NULL,      -- argon2id hash with embedded salt
    date_created TEXT DEFAULT (datetime('now')),
    date_deactivated TEXT
);

-- One active personal token per person, one active named token per name
CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_tokens_person
    ON archive_auth_tokens(archive_id, person_id)
    WHERE person_id IS NOT NULL AND date_deactivated IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_tokens_name
    ON archive_auth_tokens(archive_id, name)
    WHERE name IS NOT NULL AND date_deactivated IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_auth_tokens_lookup ON archive_auth_tokens(token_lookup);

-- Create indexes
CREATE INDEX IF NOT EXISTS idx_archives_owner ON archives(owner_id);
CREATE INDEX IF NOT EXISTS idx_team_members_member ON team_members(member_id);
CREATE INDEX IF NOT EXISTS idx_permissions_archive ON archive_permissions(archive_id, permission);
CREATE INDEX IF NOT EXISTS idx_permissions_person ON archive_permissions(person_id);
CREATE INDEX IF NOT EXISTS idx_spph_archive_name ON source_publications(archive_id, name);
CREATE INDEX IF NOT EXISTS idx_bpph_archive_name ON binary_publications(archive_id, name);
CREATE INDEX IF NOT EXISTS idx_bpph_arch_series ON binary_publications(arch_series_id);
CREATE INDEX IF NOT EXISTS idx_published_files_pub ON published_files(kind, publication_id);
CREATE INDEX IF NOT EXISTS idx_builds_archive_status ON builds(archive_id, status);
CREATE INDEX IF NOT EXISTS idx_copy_jobs_target ON copy_jobs(target_archive_id);
CREATE INDEX IF NOT EXISTS idx_subscribers_archive ON archive_subscribers(archive_id, subscriber_id);
"#;

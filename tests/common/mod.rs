//! Shared fixture: one distribution with a development and a stable series,
//! two architectures, a primary archive and a handful of people.

#![allow(dead_code)]

use std::sync::Arc;

use archivist::ArchiveEngine;
use archivist::config::EngineConfig;
use archivist::store::{SqliteStore, Store};
use archivist::types::*;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

pub struct Fixture {
    _temp_dir: TempDir,
    pub store: Arc<SqliteStore>,
    pub engine: ArchiveEngine,
    pub distro: Distribution,
    /// DEVELOPMENT
    pub noble: DistroSeries,
    /// CURRENT
    pub jammy: DistroSeries,
    pub amd64: Processor,
    pub riscv64: Processor,
    pub noble_amd64: DistroArchSeries,
    pub noble_riscv64: DistroArchSeries,
    pub primary: Archive,
    pub admins: Person,
    pub archive_team: Person,
    pub alice: Person,
    pub bob: Person,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_redirect(false)
    }

    pub fn with_redirect(redirect_release_uploads: bool) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let config = EngineConfig {
            data_dir: temp_dir.path().to_path_buf(),
            ..EngineConfig::default()
        };

        let store = Arc::new(SqliteStore::new(config.db_path()).expect("open store"));
        store.initialize().expect("initialize store");
        let engine = ArchiveEngine::with_sqlite(store.clone(), config).expect("build engine");

        let mut distro = Distribution {
            id: 0,
            name: "ubuntu".to_string(),
            display_name: "Ubuntu".to_string(),
            redirect_release_uploads,
            created_at: Utc::now(),
        };
        distro.id = store.create_distribution(&distro).unwrap();

        let noble = create_series(&store, distro.id, "noble", SeriesStatus::Development);
        let jammy = create_series(&store, distro.id, "jammy", SeriesStatus::Current);

        let amd64 = create_processor(&store, "amd64", false, true);
        let riscv64 = create_processor(&store, "riscv64", true, false);

        let noble_amd64 = create_arch_series(&store, noble.id, "amd64", amd64.id);
        let noble_riscv64 = create_arch_series(&store, noble.id, "riscv64", riscv64.id);
        store
            .set_nominated_arch_indep(noble.id, noble_amd64.id)
            .unwrap();
        create_arch_series(&store, jammy.id, "amd64", amd64.id);

        let admins = create_person(&store, "admins", true);
        let archive_team = create_person(&store, "ubuntu-archive", true);
        let alice = create_person(&store, "alice", false);
        let bob = create_person(&store, "bob", false);

        let primary = engine
            .create_archive(NewArchive::new(
                distro.id,
                archive_team.id,
                ArchivePurpose::Primary,
            ))
            .unwrap();

        Self {
            _temp_dir: temp_dir,
            store,
            engine,
            distro,
            noble,
            jammy,
            amd64,
            riscv64,
            noble_amd64,
            noble_riscv64,
            primary,
            admins,
            archive_team,
            alice,
            bob,
        }
    }

    pub fn person(&self, name: &str) -> Person {
        create_person(&self.store, name, false)
    }

    pub fn team(&self, name: &str, members: &[&Person]) -> Person {
        let team = create_person(&self.store, name, true);
        for member in members {
            self.store.add_team_member(team.id, member.id).unwrap();
        }
        team
    }

    pub fn ppa(&self, owner: &Person, name: &str) -> Archive {
        self.engine
            .create_archive(
                NewArchive::new(self.distro.id, owner.id, ArchivePurpose::Ppa).named(name),
            )
            .unwrap()
    }

    pub fn private_ppa(&self, owner: &Person, name: &str) -> Archive {
        self.engine
            .create_archive(
                NewArchive::new(self.distro.id, owner.id, ArchivePurpose::Ppa)
                    .named(name)
                    .private(true),
            )
            .unwrap()
    }

    pub fn archive(&self, id: i64) -> Archive {
        self.store.get_archive(id).unwrap().unwrap()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn publish_source(
        &self,
        archive: &Archive,
        series: &DistroSeries,
        pocket: Pocket,
        component: &str,
        name: &str,
        version: &str,
        status: PublishingStatus,
    ) -> SourcePublication {
        let mut publication = SourcePublication {
            id: 0,
            archive_id: archive.id,
            series_id: series.id,
            pocket,
            component: component.to_string(),
            section: "devel".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            status,
            created_at: Utc::now(),
            date_removed: None,
        };
        publication.id = self.store.create_source_publication(&publication).unwrap();
        publication
    }

    #[allow(clippy::too_many_arguments)]
    pub fn publish_binary(
        &self,
        archive: &Archive,
        das: &DistroArchSeries,
        pocket: Pocket,
        component: &str,
        name: &str,
        version: &str,
        status: PublishingStatus,
    ) -> BinaryPublication {
        let mut publication = BinaryPublication {
            id: 0,
            archive_id: archive.id,
            arch_series_id: das.id,
            architecture_tag: das.architecture_tag.clone(),
            pocket,
            component: component.to_string(),
            section: "libs".to_string(),
            priority: "optional".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            source_name: name.to_string(),
            architecture_specific: true,
            status,
            created_at: Utc::now(),
            date_removed: None,
        };
        publication.id = self.store.create_binary_publication(&publication).unwrap();
        publication
    }

    /// A published architecture-independent binary in the RELEASE pocket.
    pub fn publish_arch_indep(
        &self,
        archive: &Archive,
        das: &DistroArchSeries,
        name: &str,
        version: &str,
    ) -> BinaryPublication {
        let mut publication = BinaryPublication {
            id: 0,
            archive_id: archive.id,
            arch_series_id: das.id,
            architecture_tag: das.architecture_tag.clone(),
            pocket: Pocket::Release,
            component: "main".to_string(),
            section: "doc".to_string(),
            priority: "optional".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            source_name: name.to_string(),
            architecture_specific: false,
            status: PublishingStatus::Published,
            created_at: Utc::now(),
            date_removed: None,
        };
        publication.id = self.store.create_binary_publication(&publication).unwrap();
        publication
    }

    /// A published noble source with an explicit creation time.
    pub fn publish_source_at(
        &self,
        archive: &Archive,
        name: &str,
        version: &str,
        created_at: DateTime<Utc>,
    ) -> SourcePublication {
        let mut publication = SourcePublication {
            id: 0,
            archive_id: archive.id,
            series_id: self.noble.id,
            pocket: Pocket::Release,
            component: "main".to_string(),
            section: "devel".to_string(),
            name: name.to_string(),
            version: version.to_string(),
            status: PublishingStatus::Published,
            created_at,
            date_removed: None,
        };
        publication.id = self.store.create_source_publication(&publication).unwrap();
        publication
    }

    pub fn add_file(&self, kind: PublicationKind, publication_id: i64, filename: &str, size: i64) {
        self.store
            .add_published_file(&PublishedFile {
                kind,
                publication_id,
                filename: filename.to_string(),
                size,
            })
            .unwrap();
    }

    /// A build plus its queue entry when the build is still pending.
    pub fn build(
        &self,
        archive: &Archive,
        das: &DistroArchSeries,
        source_name: &str,
        version: &str,
        status: BuildStatus,
    ) -> Build {
        let mut build = Build {
            id: 0,
            archive_id: archive.id,
            arch_series_id: das.id,
            processor_id: das.processor_id,
            source_name: source_name.to_string(),
            source_version: version.to_string(),
            status,
            virtualized: archive.require_virtualized,
            created_at: Utc::now(),
        };
        build.id = self.store.create_build(&build).unwrap();

        if status == BuildStatus::NeedsBuild {
            self.store
                .create_queue_entry(&BuildQueueEntry {
                    id: 0,
                    build_id: build.id,
                    status: QueueStatus::Waiting,
                    virtualized: build.virtualized,
                })
                .unwrap();
        }
        build
    }
}

pub fn create_series(
    store: &SqliteStore,
    distribution_id: i64,
    name: &str,
    status: SeriesStatus,
) -> DistroSeries {
    let mut series = DistroSeries {
        id: 0,
        distribution_id,
        name: name.to_string(),
        status,
        nominated_arch_indep_id: None,
        created_at: Utc::now(),
    };
    series.id = store.create_series(&series).unwrap();
    series
}

pub fn create_processor(
    store: &SqliteStore,
    name: &str,
    restricted: bool,
    supports_nonvirtualized: bool,
) -> Processor {
    let mut processor = Processor {
        id: 0,
        name: name.to_string(),
        restricted,
        build_by_default: true,
        supports_virtualized: true,
        supports_nonvirtualized,
    };
    processor.id = store.create_processor(&processor).unwrap();
    processor
}

pub fn create_arch_series(
    store: &SqliteStore,
    series_id: i64,
    tag: &str,
    processor_id: i64,
) -> DistroArchSeries {
    let mut das = DistroArchSeries {
        id: 0,
        series_id,
        architecture_tag: tag.to_string(),
        processor_id,
    };
    das.id = store.create_arch_series(&das).unwrap();
    das
}

pub fn create_person(store: &SqliteStore, name: &str, is_team: bool) -> Person {
    let mut person = Person {
        id: 0,
        name: name.to_string(),
        display_name: name.to_string(),
        is_team,
        private: false,
        created_at: Utc::now(),
    };
    person.id = store.create_person(&person).unwrap();
    person
}

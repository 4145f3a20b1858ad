//! Engine integration tests over a real SQLite database.

mod common;

use archivist::auth::basic_auth_header;
use archivist::engine::{
    BinaryQuery, CopyPackageRequest, CopyPackagesRequest, OverridePolicy, SourceQuery, SyncRequest,
};
use archivist::error::{Error, UploadDenial};
use archivist::store::{BinaryFilter, DependencyScope, SourceFilter, Store};
use archivist::types::*;
use chrono::{Duration, Utc};
use common::Fixture;

// Archive lifecycle and references

#[test]
fn test_ppa_defaults() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    assert_eq!(ppa.default_component(), Some("main"));
    assert!(ppa.require_virtualized);
    assert!(ppa.enabled);
    assert_eq!(ppa.status, ArchiveStatus::Active);

    // Restricted processors are never enabled implicitly.
    let processors: Vec<String> = fx
        .engine
        .processors(ppa.id)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(processors, vec!["amd64"]);
}

#[test]
fn test_duplicate_ppa_name_rejected() {
    let fx = Fixture::new();
    fx.ppa(&fx.alice, "tools");

    let result = fx.engine.create_archive(
        NewArchive::new(fx.distro.id, fx.alice.id, ArchivePurpose::Ppa).named("tools"),
    );
    assert!(matches!(result, Err(Error::AlreadyExists(_))));

    // Same name under another owner is fine.
    fx.ppa(&fx.bob, "tools");
}

#[test]
fn test_archive_named_after_distribution_rejected() {
    let fx = Fixture::new();
    let result = fx.engine.create_archive(
        NewArchive::new(fx.distro.id, fx.alice.id, ArchivePurpose::Ppa).named("ubuntu"),
    );
    assert!(matches!(result, Err(Error::InvalidName(_))));
}

#[test]
fn test_private_team_archives_are_private() {
    let fx = Fixture::new();
    let mut hidden = Person {
        id: 0,
        name: "hidden".to_string(),
        display_name: "Hidden".to_string(),
        is_team: true,
        private: true,
        created_at: Utc::now(),
    };
    hidden.id = fx.store.create_person(&hidden).unwrap();

    let archive = fx.ppa(&hidden, "ppa");
    assert!(archive.private);
    assert!(archive.build_secret.is_some());
    assert!(matches!(
        fx.engine.set_private(archive.id, false),
        Err(Error::CannotSwitchPrivacy(_))
    ));
}

#[test]
fn test_reference_round_trip() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let reference = fx.engine.reference(&ppa).unwrap();
    assert_eq!(reference, "~alice/ubuntu/ppa");

    let found = fx.engine.get_by_reference(&reference, None).unwrap().unwrap();
    assert_eq!(found.id, ppa.id);

    let found = fx
        .engine
        .get_by_reference("ppa:alice/ubuntu/ppa", None)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, ppa.id);

    assert_eq!(fx.engine.reference(&fx.primary).unwrap(), "ubuntu");
    let primary = fx.engine.get_by_reference("ubuntu", None).unwrap().unwrap();
    assert_eq!(primary.id, fx.primary.id);
}

#[test]
fn test_bad_references_resolve_to_none() {
    let fx = Fixture::new();
    fx.ppa(&fx.alice, "ppa");

    for reference in [
        "~alice/ubuntu",
        "~bob/ubuntu/ppa",
        "~nobody/ubuntu/ppa",
        "~alice/debian/ppa",
        "ubuntu/does-not-exist",
        "a/b/c/d",
        "",
        "~/ubuntu/ppa",
    ] {
        assert!(
            fx.engine.get_by_reference(reference, None).unwrap().is_none(),
            "{reference} should not resolve"
        );
    }
}

#[test]
fn test_private_archive_visibility() {
    let fx = Fixture::new();
    let ppa = fx.private_ppa(&fx.alice, "secret");
    let admin = fx.person("root");
    fx.store.add_team_member(fx.admins.id, admin.id).unwrap();

    assert!(fx.engine.get_by_reference("~alice/ubuntu/secret", None).unwrap().is_none());
    assert!(
        fx.engine
            .get_by_reference("~alice/ubuntu/secret", Some(fx.bob.id))
            .unwrap()
            .is_none()
    );
    assert!(fx.engine.can_view(Some(fx.alice.id), &ppa).unwrap());
    assert!(fx.engine.can_view(Some(admin.id), &ppa).unwrap());

    // Subscribers see it too.
    fx.engine
        .new_subscription(ppa.id, fx.bob.id, fx.alice.id, None, None)
        .unwrap();
    assert!(
        fx.engine
            .get_by_reference("~alice/ubuntu/secret", Some(fx.bob.id))
            .unwrap()
            .is_some()
    );

    // Administrative lookups ignore visibility.
    assert!(fx.engine.resolve_reference("~alice/ubuntu/secret").unwrap().is_some());
}

#[test]
fn test_get_archive_by_name_rejects_ppa_purpose() {
    let fx = Fixture::new();
    let result = fx
        .engine
        .get_archive_by_name(fx.distro.id, ArchivePurpose::Ppa, "ppa");
    assert!(matches!(result, Err(Error::InvalidState(_))));

    let primary = fx
        .engine
        .get_archive_by_name(fx.distro.id, ArchivePurpose::Primary, "primary")
        .unwrap();
    assert_eq!(primary.map(|a| a.id), Some(fx.primary.id));
    assert!(
        fx.engine
            .get_archive_by_name(fx.distro.id, ArchivePurpose::Partner, "primary")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_get_ppa_by_name_missing() {
    let fx = Fixture::new();
    let result = fx.engine.get_ppa_by_name(fx.alice.id, fx.distro.id, "nope");
    assert!(matches!(result, Err(Error::NoSuchPPA(name)) if name == "nope"));
}

#[test]
fn test_delete_marks_deleting_and_disables() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    fx.engine.delete(ppa.id, fx.alice.id).unwrap();
    let ppa = fx.archive(ppa.id);
    assert_eq!(ppa.status, ArchiveStatus::Deleting);
    assert!(!ppa.enabled);

    assert!(matches!(
        fx.engine.delete(ppa.id, fx.alice.id),
        Err(Error::ArchiveAlreadyDeleted)
    ));
    assert!(matches!(fx.engine.enable(ppa.id), Err(Error::InvalidState(_))));
}

#[test]
fn test_rename_only_copy_archives() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    assert!(matches!(
        fx.engine.rename(ppa.id, "other"),
        Err(Error::InvalidState(_))
    ));

    let copy = fx
        .engine
        .create_archive(
            NewArchive::new(fx.distro.id, fx.alice.id, ArchivePurpose::Copy).named("rebuild"),
        )
        .unwrap();
    let renamed = fx.engine.rename(copy.id, "rebuild-2").unwrap();
    assert_eq!(renamed.name, "rebuild-2");
    assert_eq!(fx.archive(copy.id).name, "rebuild-2");
}

#[test]
fn test_privacy_switch_blocked_after_publishing() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let switched = fx.engine.set_private(ppa.id, true).unwrap();
    assert!(switched.private);
    assert!(switched.build_secret.is_some());

    fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);
    assert!(matches!(
        fx.engine.set_private(ppa.id, false),
        Err(Error::CannotSwitchPrivacy(_))
    ));
}

#[test]
fn test_store_refuses_privacy_switch_with_published_sources() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Pending);

    assert!(matches!(
        fx.store.set_archive_privacy(ppa.id, true, Some("secret")),
        Err(Error::CannotSwitchPrivacy(_))
    ));
    let ppa = fx.archive(ppa.id);
    assert!(!ppa.private);
    assert!(ppa.build_secret.is_none());
}

#[test]
fn test_store_refuses_enabling_deleting_archive() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.engine.delete(ppa.id, fx.alice.id).unwrap();

    assert!(matches!(
        fx.store.set_archive_enabled(ppa.id, true),
        Err(Error::InvalidState(_))
    ));
    assert!(!fx.archive(ppa.id).enabled);

    // Disabling stays allowed whatever the status.
    fx.store.set_archive_enabled(ppa.id, false).unwrap();
    assert!(matches!(
        fx.store.set_archive_enabled(9999, true),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_deleted_ppa_may_be_renamed() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.engine.delete(ppa.id, fx.alice.id).unwrap();
    assert!(matches!(
        fx.engine.rename(ppa.id, "ppa-old"),
        Err(Error::InvalidState(_))
    ));

    // The reaper finishes the deletion outside the engine.
    fx.store
        .connection()
        .execute("UPDATE archives SET status = 'DELETED' WHERE id = ?1", [ppa.id])
        .unwrap();

    let renamed = fx.engine.rename(ppa.id, "ppa-old").unwrap();
    assert_eq!(renamed.name, "ppa-old");
    assert_eq!(fx.archive(ppa.id).status, ArchiveStatus::Deleted);

    // The old name is free for a new archive.
    fx.ppa(&fx.alice, "ppa");
}

#[test]
fn test_second_primary_archive_rejected() {
    let fx = Fixture::new();
    let result = fx.engine.create_archive(
        NewArchive::new(fx.distro.id, fx.archive_team.id, ArchivePurpose::Primary).named("other"),
    );
    assert!(matches!(result, Err(Error::AlreadyExists(_))));

    // The database refuses it even when the engine is bypassed.
    let mut second = fx.primary.clone();
    second.id = 0;
    second.name = "other".to_string();
    assert!(matches!(
        fx.store.create_archive(&second, &[]),
        Err(Error::AlreadyExists(_))
    ));

    let primary = fx.engine.get_by_reference("ubuntu", None).unwrap().unwrap();
    assert_eq!(primary.id, fx.primary.id);
}

#[test]
fn test_restricted_processor_needs_admin() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let result = fx
        .engine
        .set_processors(ppa.id, &[fx.amd64.id, fx.riscv64.id], fx.alice.id);
    assert!(matches!(result, Err(Error::CannotModifyArchiveProcessor(_))));

    let admin = fx.person("root");
    fx.store.add_team_member(fx.admins.id, admin.id).unwrap();
    fx.engine
        .set_processors(ppa.id, &[fx.amd64.id, fx.riscv64.id], admin.id)
        .unwrap();
    assert_eq!(fx.engine.processors(ppa.id).unwrap().len(), 2);

    // Dropping an unrestricted processor needs no special rights.
    fx.engine
        .set_processors(ppa.id, &[fx.riscv64.id], fx.alice.id)
        .unwrap();
    assert_eq!(fx.engine.processors(ppa.id).unwrap().len(), 1);
}

#[test]
fn test_dirty_suites() {
    let fx = Fixture::new();
    fx.engine
        .mark_suite_dirty(fx.primary.id, fx.noble.id, Pocket::Proposed)
        .unwrap();
    fx.engine
        .mark_suite_dirty(fx.primary.id, fx.jammy.id, Pocket::Release)
        .unwrap();
    fx.engine
        .mark_suite_dirty(fx.primary.id, fx.noble.id, Pocket::Proposed)
        .unwrap();

    let mut suites = fx.engine.dirty_suites(fx.primary.id).unwrap();
    suites.sort();
    assert_eq!(suites, vec!["jammy", "noble-proposed"]);

    fx.engine.clear_dirty_suites(fx.primary.id).unwrap();
    assert!(fx.engine.dirty_suites(fx.primary.id).unwrap().is_empty());
}

// Upload checks

#[test]
fn test_disabled_archive_rejects_uploads() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.engine.disable(ppa.id).unwrap();
    let ppa = fx.archive(ppa.id);

    let denial = fx
        .engine
        .check_upload(&ppa, fx.alice.id, &fx.noble, Some("hello"), None, Pocket::Release, false)
        .unwrap();
    assert_eq!(
        denial,
        Some(UploadDenial::ArchiveDisabled {
            archive: ppa.display_name.clone()
        })
    );
}

#[test]
fn test_ppa_rejects_non_release_pocket() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let denial = fx
        .engine
        .check_upload(&ppa, fx.alice.id, &fx.noble, Some("hello"), None, Pocket::Updates, false)
        .unwrap();
    assert_eq!(denial, Some(UploadDenial::InvalidPocketForPPA));
    assert_eq!(
        denial.unwrap().to_string(),
        "PPA uploads must be for the RELEASE pocket."
    );
}

#[test]
fn test_ppa_upload_rights() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let check = |person: &Person| {
        fx.engine
            .check_upload(&ppa, person.id, &fx.noble, Some("hello"), None, Pocket::Release, false)
            .unwrap()
    };

    assert_eq!(check(&fx.alice), None);
    assert_eq!(check(&fx.bob), Some(UploadDenial::CannotUploadToPPA));

    fx.engine
        .new_component_uploader(ppa.id, fx.bob.id, "main")
        .unwrap();
    assert_eq!(check(&fx.bob), None);

    let result = fx.engine.new_component_uploader(ppa.id, fx.bob.id, "universe");
    assert!(matches!(result, Err(Error::InvalidPermission(_))));
}

#[test]
fn test_team_ppa_members_may_upload() {
    let fx = Fixture::new();
    let team = fx.team("builders", &[&fx.bob]);
    let ppa = fx.ppa(&team, "ppa");

    let denial = fx
        .engine
        .check_upload(&ppa, fx.bob.id, &fx.noble, None, None, Pocket::Release, false)
        .unwrap();
    assert_eq!(denial, None);
}

#[test]
fn test_obsolete_series_needs_permit() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.store
        .set_series_status(fx.jammy.id, SeriesStatus::Obsolete)
        .unwrap();
    let jammy = fx.store.get_series(fx.jammy.id).unwrap().unwrap();

    let denial = fx
        .engine
        .check_upload(&ppa, fx.alice.id, &jammy, None, None, Pocket::Release, false)
        .unwrap();
    assert_eq!(
        denial,
        Some(UploadDenial::CannotUploadToSeries {
            series: "jammy".to_string()
        })
    );

    fx.engine
        .set_permit_obsolete_series_uploads(ppa.id, true)
        .unwrap();
    let ppa = fx.archive(ppa.id);
    let denial = fx
        .engine
        .check_upload(&ppa, fx.alice.id, &jammy, None, None, Pocket::Release, false)
        .unwrap();
    assert_eq!(denial, None);
}

#[test]
fn test_primary_component_rights() {
    let fx = Fixture::new();
    let check = |person: &Person, component: Option<&str>, strict: bool| {
        fx.engine
            .check_upload(
                &fx.primary,
                person.id,
                &fx.noble,
                Some("hello"),
                component,
                Pocket::Release,
                strict,
            )
            .unwrap()
    };

    assert_eq!(
        check(&fx.alice, Some("universe"), false),
        Some(UploadDenial::NoRightsForArchive)
    );

    fx.engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "universe")
        .unwrap();
    assert_eq!(check(&fx.alice, Some("universe"), true), None);
    assert_eq!(check(&fx.alice, Some("main"), false), None);
    assert_eq!(
        check(&fx.alice, Some("main"), true),
        Some(UploadDenial::NoRightsForComponent {
            component: "main".to_string()
        })
    );
}

#[test]
fn test_team_component_grant_applies_to_members() {
    let fx = Fixture::new();
    let team = fx.team("core-devs", &[&fx.bob]);
    fx.engine
        .new_component_uploader(fx.primary.id, team.id, "main")
        .unwrap();

    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.bob.id, &fx.noble, Some("hello"), Some("main"), Pocket::Release, true)
        .unwrap();
    assert_eq!(denial, None);

    let components = fx
        .engine
        .components_for_uploader(fx.primary.id, fx.bob.id)
        .unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].component(), Some("main"));
}

#[test]
fn test_package_grant_covers_only_that_package() {
    let fx = Fixture::new();
    fx.engine
        .new_package_uploader(fx.primary.id, fx.bob.id, "hello")
        .unwrap();

    let check = |name: &str| {
        fx.engine
            .check_upload(&fx.primary, fx.bob.id, &fx.noble, Some(name), Some("main"), Pocket::Release, true)
            .unwrap()
    };
    assert_eq!(check("hello"), None);
    assert_eq!(check("bash"), Some(UploadDenial::NoRightsForArchive));

    let uploaders = fx.engine.uploaders_for_package(fx.primary.id, "hello").unwrap();
    assert_eq!(uploaders.len(), 1);
    assert_eq!(uploaders[0].person_id, fx.bob.id);
}

#[test]
fn test_grants_are_idempotent() {
    let fx = Fixture::new();
    let first = fx
        .engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "main")
        .unwrap();
    let second = fx
        .engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "main")
        .unwrap();
    assert_eq!(first.id, second.id);

    fx.engine.delete_grant(first.id).unwrap();
    assert!(matches!(fx.engine.delete_grant(first.id), Err(Error::NotFound)));
}

#[test]
fn test_pocket_grant() {
    let fx = Fixture::new();
    fx.engine
        .new_pocket_uploader(fx.primary.id, fx.alice.id, Pocket::Proposed)
        .unwrap();

    let check = |pocket: Pocket| {
        fx.engine
            .check_upload(&fx.primary, fx.alice.id, &fx.noble, Some("hello"), None, pocket, false)
            .unwrap()
    };
    assert_eq!(check(Pocket::Proposed), None);
    assert_eq!(check(Pocket::Release), Some(UploadDenial::NoRightsForArchive));

    let ppa = fx.ppa(&fx.alice, "ppa");
    let result = fx
        .engine
        .new_pocket_uploader(ppa.id, fx.bob.id, Pocket::Release);
    assert!(matches!(result, Err(Error::InvalidPermission(_))));
}

#[test]
fn test_packageset_grants() {
    let fx = Fixture::new();
    let carol = fx.person("carol");
    let core = fx
        .engine
        .new_packageset(fx.noble.id, "core", "Core packages", &["hello"])
        .unwrap();

    fx.engine
        .new_packageset_uploader(fx.primary.id, fx.bob.id, core.id, false)
        .unwrap();

    let check = |person: &Person, name: &str| {
        fx.engine
            .check_upload(&fx.primary, person.id, &fx.noble, Some(name), Some("main"), Pocket::Release, true)
            .unwrap()
    };
    assert_eq!(check(&fx.bob, "hello"), None);
    assert_eq!(
        check(&fx.bob, "bash"),
        Some(UploadDenial::InsufficientUploadRights)
    );

    // Once an explicit grant exists for a covering set, only explicit
    // grants count.
    fx.engine
        .new_packageset_uploader(fx.primary.id, carol.id, core.id, true)
        .unwrap();
    assert_eq!(check(&carol, "hello"), None);
    assert_eq!(
        check(&fx.bob, "hello"),
        Some(UploadDenial::InsufficientUploadRights)
    );
}

#[test]
fn test_included_packagesets_cover_child_sources() {
    let fx = Fixture::new();
    let desktop = fx
        .engine
        .new_packageset(fx.noble.id, "desktop", "Desktop", &[])
        .unwrap();
    let gnome = fx
        .engine
        .new_packageset(fx.noble.id, "gnome", "GNOME", &["gnome-shell"])
        .unwrap();
    fx.engine.include_packageset(desktop.id, gnome.id).unwrap();
    fx.engine
        .new_packageset_uploader(fx.primary.id, fx.bob.id, desktop.id, false)
        .unwrap();

    let denial = fx
        .engine
        .check_upload(
            &fx.primary,
            fx.bob.id,
            &fx.noble,
            Some("gnome-shell"),
            Some("main"),
            Pocket::Release,
            true,
        )
        .unwrap();
    assert_eq!(denial, None);

    let other_series = fx
        .engine
        .new_packageset(fx.jammy.id, "jammy-set", "", &[])
        .unwrap();
    assert!(matches!(
        fx.engine.include_packageset(desktop.id, other_series.id),
        Err(Error::InvalidState(_))
    ));
}

#[test]
fn test_stable_series_release_pocket_closed() {
    let fx = Fixture::new();
    fx.engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "main")
        .unwrap();

    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.alice.id, &fx.jammy, Some("hello"), None, Pocket::Release, false)
        .unwrap();
    assert_eq!(
        denial,
        Some(UploadDenial::CannotUploadToPocket {
            pocket: Pocket::Release,
            status: "CURRENT".to_string()
        })
    );

    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.alice.id, &fx.jammy, Some("hello"), None, Pocket::Updates, false)
        .unwrap();
    assert_eq!(denial, None);

    // Development series only take pre-release pockets.
    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.alice.id, &fx.noble, Some("hello"), None, Pocket::Updates, false)
        .unwrap();
    assert!(matches!(denial, Some(UploadDenial::CannotUploadToPocket { .. })));
}

#[test]
fn test_partner_pockets() {
    let fx = Fixture::new();
    let partner = fx
        .engine
        .create_archive(NewArchive::new(
            fx.distro.id,
            fx.archive_team.id,
            ArchivePurpose::Partner,
        ))
        .unwrap();
    assert_eq!(partner.name, "partner");

    let denial = fx
        .engine
        .check_upload(&partner, fx.alice.id, &fx.noble, None, None, Pocket::Updates, false)
        .unwrap();
    assert_eq!(denial, Some(UploadDenial::InvalidPocketForPartnerArchive));
}

#[test]
fn test_release_uploads_redirected() {
    let fx = Fixture::with_redirect(true);
    fx.engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "main")
        .unwrap();

    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.alice.id, &fx.noble, Some("hello"), None, Pocket::Release, false)
        .unwrap()
        .unwrap();
    assert_eq!(
        denial.to_string(),
        "Not permitted to upload directly to noble; try noble-proposed instead."
    );
    assert!(matches!(
        denial,
        UploadDenial::RedirectedPocket {
            redirect: Pocket::Proposed,
            ..
        }
    ));

    // Queue admins for the pocket may upload directly.
    fx.engine
        .new_pocket_queue_admin(fx.primary.id, fx.alice.id, Pocket::Release, Some(fx.noble.id))
        .unwrap();
    let denial = fx
        .engine
        .check_upload(&fx.primary, fx.alice.id, &fx.noble, Some("hello"), None, Pocket::Release, false)
        .unwrap();
    assert_eq!(denial, None);
}

#[test]
fn test_verify_upload_skips_pocket_rules() {
    let fx = Fixture::with_redirect(true);
    fx.engine
        .new_component_uploader(fx.primary.id, fx.alice.id, "main")
        .unwrap();

    let denial = fx
        .engine
        .verify_upload(&fx.primary, fx.alice.id, Some("hello"), Some("main"), &fx.noble, true, None)
        .unwrap();
    assert_eq!(denial, None);
}

#[test]
fn test_can_administer_queue() {
    let fx = Fixture::new();
    fx.engine
        .new_queue_admin(fx.primary.id, fx.alice.id, "main")
        .unwrap();
    fx.engine
        .new_pocket_queue_admin(fx.primary.id, fx.bob.id, Pocket::Updates, Some(fx.jammy.id))
        .unwrap();

    let can = |person: &Person, components: &[&str], pocket, series| {
        fx.engine
            .can_administer_queue(&fx.primary, person.id, components, pocket, series)
            .unwrap()
    };

    assert!(can(&fx.alice, &["main"], None, None));
    assert!(!can(&fx.alice, &["main", "universe"], None, None));
    assert!(can(&fx.bob, &[], Some(Pocket::Updates), Some(fx.jammy.id)));
    assert!(!can(&fx.bob, &[], Some(Pocket::Updates), Some(fx.noble.id)));
    assert!(!can(&fx.bob, &[], Some(Pocket::Security), Some(fx.jammy.id)));
    assert!(!can(&fx.bob, &["main"], None, None));

    let pockets = fx
        .engine
        .pockets_for_queue_admin(fx.primary.id, fx.bob.id)
        .unwrap();
    assert_eq!(pockets.len(), 1);
    let admins = fx
        .engine
        .queue_admins_for_component(fx.primary.id, "main")
        .unwrap();
    assert_eq!(admins.len(), 1);
}

// Publication queries

#[test]
fn test_published_sources_filters_and_order() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let published = PublishingStatus::Published;
    fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0-1", published);
    fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0-10", published);
    fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello-extra", "2.0", published);
    fx.publish_source(&ppa, &fx.jammy, Pocket::Release, "main", "bash", "5.1", PublishingStatus::Superseded);

    let all = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new())
        .unwrap();
    let listed: Vec<(&str, &str)> = all
        .iter()
        .map(|s| (s.name.as_str(), s.version.as_str()))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("bash", "5.1"),
            ("hello", "1.0-10"),
            ("hello", "1.0-1"),
            ("hello-extra", "2.0"),
        ]
    );

    let exact = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().exact_name("hello"))
        .unwrap();
    assert_eq!(exact.len(), 2);

    let prefix = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().name("hello"))
        .unwrap();
    assert_eq!(prefix.len(), 3);

    let active = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().statuses(PublishingStatus::ACTIVE))
        .unwrap();
    assert!(active.iter().all(|s| s.name != "bash"));

    let jammy = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().series(fx.jammy.id))
        .unwrap();
    assert_eq!(jammy.len(), 1);
}

#[test]
fn test_sources_ordered_by_creation_date() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let now = Utc::now();
    let oldest = fx.publish_source_at(&ppa, "alpha", "1.0", now - Duration::hours(2));
    let middle = fx.publish_source_at(&ppa, "gamma", "1.0", now - Duration::hours(1));
    let newest = fx.publish_source_at(&ppa, "beta", "1.0", now);

    let by_date = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().order_by_date())
        .unwrap();
    let ids: Vec<i64> = by_date.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id, oldest.id]);

    let by_name = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new())
        .unwrap();
    let ids: Vec<i64> = by_name.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![oldest.id, newest.id, middle.id]);
}

#[test]
fn test_created_since_is_inclusive() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let now = Utc::now();
    fx.publish_source_at(&ppa, "alpha", "1.0", now - Duration::hours(2));
    let middle = fx.publish_source_at(&ppa, "beta", "1.0", now - Duration::hours(1));
    let newest = fx.publish_source_at(&ppa, "gamma", "1.0", now);

    let since = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().created_since(middle.created_at))
        .unwrap();
    let ids: Vec<i64> = since.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![middle.id, newest.id]);
}

#[test]
fn test_removed_rows_can_be_excluded() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let published = PublishingStatus::Published;
    let live = fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", published);
    let removed = fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "0.9", published);
    fx.store
        .set_source_publication_status(removed.id, PublishingStatus::Deleted, Some(Utc::now()))
        .unwrap();

    let all = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new())
        .unwrap();
    assert_eq!(all.len(), 2);

    let current = fx
        .engine
        .get_published_sources(ppa.id, &SourceFilter::new().include_removed(false))
        .unwrap();
    let ids: Vec<i64> = current.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![live.id]);
}

#[test]
fn test_on_disk_collapses_arch_indep_copies() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.publish_arch_indep(&ppa, &fx.noble_amd64, "hello-doc", "1.0");
    fx.publish_arch_indep(&ppa, &fx.noble_riscv64, "hello-doc", "1.0");
    fx.publish_binary(&ppa, &fx.noble_riscv64, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);

    let every_copy = fx
        .engine
        .get_published_binaries(ppa.id, &BinaryFilter::new().with(|f| f.exact_name("hello-doc")))
        .unwrap();
    assert_eq!(every_copy.len(), 2);

    let on_disk = fx
        .engine
        .get_published_binaries(
            ppa.id,
            &BinaryFilter::new().with(|f| f.exact_name("hello-doc")).on_disk(),
        )
        .unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].arch_series_id, fx.noble_amd64.id);

    // Architecture-specific binaries are kept wherever they live.
    let all_on_disk = fx
        .engine
        .get_published_binaries(ppa.id, &BinaryFilter::new().on_disk())
        .unwrap();
    assert_eq!(all_on_disk.len(), 2);
    assert!(all_on_disk.iter().any(|b| b.name == "hello" && b.arch_series_id == fx.noble_riscv64.id));
}

#[test]
fn test_version_filter_requires_name() {
    let fx = Fixture::new();
    let result = fx
        .engine
        .get_published_sources(fx.primary.id, &SourceFilter::new().version("1.0"));
    assert!(matches!(result, Err(Error::VersionRequiresName)));
}

#[test]
fn test_latest_published_component() {
    let fx = Fixture::new();
    let published = PublishingStatus::Published;
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "universe", "hello", "1.0", published);
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "main", "hello", "2.0", published);

    let component = fx
        .engine
        .latest_published_component(fx.primary.id, fx.noble.id, "hello")
        .unwrap();
    assert_eq!(component.as_deref(), Some("main"));
    assert!(
        fx.engine
            .latest_published_component(fx.primary.id, fx.jammy.id, "hello")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_sizes_count_shared_files_once() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let published = PublishingStatus::Published;

    let noble = fx.publish_source(&ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", published);
    let jammy = fx.publish_source(&ppa, &fx.jammy, Pocket::Release, "main", "hello", "1.0", published);
    fx.add_file(PublicationKind::Source, noble.id, "hello_1.0.orig.tar.gz", 1000);
    fx.add_file(PublicationKind::Source, noble.id, "hello_1.0.dsc", 10);
    fx.add_file(PublicationKind::Source, jammy.id, "hello_1.0.orig.tar.gz", 1000);

    let binary = fx.publish_binary(&ppa, &fx.noble_amd64, Pocket::Release, "main", "hello", "1.0", published);
    fx.add_file(PublicationKind::Binary, binary.id, "hello_1.0_amd64.deb", 200);

    assert_eq!(fx.engine.sources_size(ppa.id).unwrap(), 1010);
    assert_eq!(fx.engine.binaries_size(ppa.id).unwrap(), 200);
    assert_eq!(fx.engine.estimated_size(ppa.id).unwrap(), 1210);

    // Removed publications no longer count.
    fx.store
        .set_source_publication_status(noble.id, PublishingStatus::Deleted, Some(Utc::now()))
        .unwrap();
    assert_eq!(fx.engine.sources_size(ppa.id).unwrap(), 1000);
}

// Build statistics

#[test]
fn test_build_counters() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let das = &fx.noble_amd64;
    for (name, status) in [
        ("a", BuildStatus::FullyBuilt),
        ("b", BuildStatus::FullyBuilt),
        ("c", BuildStatus::FailedToBuild),
        ("d", BuildStatus::ChrootWait),
        ("e", BuildStatus::Building),
        ("f", BuildStatus::NeedsBuild),
        ("g", BuildStatus::Superseded),
        ("h", BuildStatus::Cancelled),
    ] {
        fx.build(&ppa, das, name, "1.0", status);
    }

    let counters = fx.engine.get_build_counters(ppa.id, false).unwrap();
    assert_eq!(
        counters,
        BuildCounters {
            failed: 2,
            pending: 1,
            succeeded: 2,
            superseded: 1,
            total: 6,
        }
    );

    let counters = fx.engine.get_build_counters(ppa.id, true).unwrap();
    assert_eq!(counters.pending, 2);
    assert_eq!(
        counters.total,
        counters.failed + counters.pending + counters.succeeded + counters.superseded
    );
}

#[test]
fn test_num_pkgs_building() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    fx.build(&ppa, &fx.noble_amd64, "hello", "1.0", BuildStatus::Building);
    fx.build(&ppa, &fx.noble_riscv64, "hello", "1.0", BuildStatus::NeedsBuild);
    fx.build(&ppa, &fx.noble_amd64, "bash", "5.1", BuildStatus::NeedsBuild);
    fx.build(&ppa, &fx.noble_riscv64, "bash", "5.1", BuildStatus::NeedsBuild);
    fx.build(&ppa, &fx.noble_amd64, "zsh", "5.9", BuildStatus::FullyBuilt);

    let building = fx.engine.num_pkgs_building(ppa.id).unwrap();
    assert_eq!(
        building,
        PackagesBuilding {
            building: 1,
            waiting: 1
        }
    );
}

#[test]
fn test_require_virtualized_recomputes_pending_builds() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let amd64 = fx.build(&ppa, &fx.noble_amd64, "hello", "1.0", BuildStatus::NeedsBuild);
    let riscv64 = fx.build(&ppa, &fx.noble_riscv64, "hello", "1.0", BuildStatus::NeedsBuild);
    let done = fx.build(&ppa, &fx.noble_amd64, "bash", "5.1", BuildStatus::FullyBuilt);
    assert!(amd64.virtualized);

    let updated = fx.engine.set_require_virtualized(ppa.id, false).unwrap();
    assert_eq!(updated, 2);

    let build = |id| fx.store.get_build(id).unwrap().unwrap();
    assert!(!build(amd64.id).virtualized);
    assert!(build(riscv64.id).virtualized);
    assert!(build(done.id).virtualized);

    let entry = fx
        .store
        .get_queue_entry_for_build(amd64.id)
        .unwrap()
        .unwrap();
    assert!(!entry.virtualized);

    fx.engine.set_require_virtualized(ppa.id, true).unwrap();
    assert!(build(amd64.id).virtualized);
}

#[test]
fn test_disable_suspends_and_enable_recomputes() {
    let fx = Fixture::new();
    let mut new = NewArchive::new(fx.distro.id, fx.alice.id, ArchivePurpose::Copy).named("rebuild");
    new.require_virtualized = Some(false);
    let archive = fx.engine.create_archive(new).unwrap();

    // riscv64 cannot build outside a virtual machine.
    let build = fx.build(&archive, &fx.noble_riscv64, "hello", "1.0", BuildStatus::NeedsBuild);
    assert!(!build.virtualized);

    fx.engine.disable(archive.id).unwrap();
    let entry = fx.store.get_queue_entry_for_build(build.id).unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Suspended);
    assert!(matches!(fx.engine.disable(archive.id), Err(Error::InvalidState(_))));

    fx.engine.enable(archive.id).unwrap();
    let entry = fx.store.get_queue_entry_for_build(build.id).unwrap().unwrap();
    assert_eq!(entry.status, QueueStatus::Waiting);
    assert!(entry.virtualized);
    assert!(fx.store.get_build(build.id).unwrap().unwrap().virtualized);
}

#[test]
fn test_recalculate_after_processor_change() {
    let fx = Fixture::new();
    assert!(!fx.primary.require_virtualized);

    let build = fx.build(&fx.primary, &fx.noble_riscv64, "hello", "1.0", BuildStatus::NeedsBuild);
    fx.engine.recalculate_build_virtualization(fx.primary.id).unwrap();
    assert!(fx.store.get_build(build.id).unwrap().unwrap().virtualized);

    fx.store
        .set_processor_nonvirtualized(fx.riscv64.id, true)
        .unwrap();
    fx.engine.recalculate_build_virtualization(fx.primary.id).unwrap();
    assert!(!fx.store.get_build(build.id).unwrap().unwrap().virtualized);
}

// Archive dependencies

#[test]
fn test_dependency_validation() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let other = fx.ppa(&fx.alice, "other");

    let message = |result: archivist::error::Result<ArchiveDependency>| match result {
        Err(Error::ArchiveDependency(message)) => message,
        other => panic!("expected dependency error, got {other:?}"),
    };

    assert_eq!(
        message(fx.engine.add_archive_dependency(ppa.id, ppa.id, Pocket::Release, None, fx.alice.id)),
        "An archive should not depend on itself."
    );
    assert_eq!(
        message(fx.engine.add_archive_dependency(ppa.id, other.id, Pocket::Updates, None, fx.alice.id)),
        "Non-primary archives only support the RELEASE pocket."
    );
    assert_eq!(
        message(fx.engine.add_archive_dependency(
            ppa.id,
            other.id,
            Pocket::Release,
            Some("universe"),
            fx.alice.id
        )),
        "Non-primary archives only support the 'main' component."
    );

    fx.engine
        .add_archive_dependency(ppa.id, other.id, Pocket::Release, None, fx.alice.id)
        .unwrap();
    assert_eq!(
        message(fx.engine.add_archive_dependency(ppa.id, other.id, Pocket::Release, None, fx.alice.id)),
        "This dependency is already registered."
    );

    let hidden = fx.private_ppa(&fx.bob, "hidden");
    assert_eq!(
        message(fx.engine.add_archive_dependency(ppa.id, hidden.id, Pocket::Release, None, fx.alice.id)),
        "You don't have permission to use this dependency."
    );

    let bob_public = fx.ppa(&fx.bob, "public");
    assert_eq!(
        message(fx.engine.add_archive_dependency(
            bob_public.id,
            hidden.id,
            Pocket::Release,
            None,
            fx.bob.id
        )),
        "Public PPAs cannot depend on private ones."
    );

    fx.engine.disable(bob_public.id).unwrap();
    assert_eq!(
        message(fx.engine.add_archive_dependency(ppa.id, bob_public.id, Pocket::Release, None, fx.alice.id)),
        "Dependencies must not be disabled."
    );
}

#[test]
fn test_remove_dependency() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    fx.engine
        .add_archive_dependency(ppa.id, fx.primary.id, Pocket::Updates, Some("main"), fx.alice.id)
        .unwrap();
    assert_eq!(fx.engine.archive_dependencies(ppa.id).unwrap().len(), 1);

    fx.engine
        .remove_archive_dependency(ppa.id, fx.primary.id)
        .unwrap();
    assert!(
        fx.engine
            .get_archive_dependency(ppa.id, fx.primary.id)
            .unwrap()
            .is_none()
    );
    assert!(matches!(
        fx.engine.remove_archive_dependency(ppa.id, fx.primary.id),
        Err(Error::ArchiveDependency(_))
    ));
}

#[test]
fn test_expand_dependencies_uses_primary_component() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.engine
        .add_archive_dependency(ppa.id, fx.primary.id, Pocket::Updates, None, fx.alice.id)
        .unwrap();
    fx.publish_source(
        &fx.primary,
        &fx.noble,
        Pocket::Release,
        "multiverse",
        "hello",
        "1.0",
        PublishingStatus::Published,
    );

    let scopes = fx
        .engine
        .expand_dependencies(&ppa, fx.noble_amd64.id, Pocket::Release, "main", "hello")
        .unwrap();
    assert_eq!(scopes.len(), 2);
    assert_eq!(scopes[0].archive_id, ppa.id);
    assert_eq!(scopes[0].components, vec!["main"]);
    assert_eq!(scopes[1].archive_id, fx.primary.id);
    assert_eq!(scopes[1].pocket, Pocket::Updates);
    assert_eq!(
        scopes[1].components,
        vec!["main", "restricted", "universe", "multiverse"]
    );

    // Packages never published in the primary archive fall back to universe.
    let scopes = fx
        .engine
        .expand_dependencies(&ppa, fx.noble_amd64.id, Pocket::Release, "main", "unknown")
        .unwrap();
    assert_eq!(scopes[1].components, vec!["main", "universe"]);
}

#[test]
fn test_find_dep_candidates_in_scope_order() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    fx.engine
        .add_archive_dependency(ppa.id, fx.primary.id, Pocket::Updates, Some("main"), fx.alice.id)
        .unwrap();

    let published = PublishingStatus::Published;
    let in_primary = fx.publish_binary(&fx.primary, &fx.noble_amd64, Pocket::Updates, "main", "libfoo", "1.0", published);
    let in_ppa = fx.publish_binary(&ppa, &fx.noble_amd64, Pocket::Release, "main", "libfoo", "1.1", published);
    // Outside every scope: wrong pocket, wrong component, not published.
    fx.publish_binary(&fx.primary, &fx.noble_amd64, Pocket::Release, "main", "libfoo", "0.9", published);
    fx.publish_binary(&fx.primary, &fx.noble_amd64, Pocket::Updates, "universe", "libfoo", "1.0", published);
    fx.publish_binary(&ppa, &fx.noble_amd64, Pocket::Release, "main", "libfoo", "1.2", PublishingStatus::Pending);

    let candidates = fx
        .engine
        .find_dep_candidates(ppa.id, fx.noble_amd64.id, Pocket::Release, "main", "hello", "libfoo")
        .unwrap();
    let ids: Vec<i64> = candidates.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![in_ppa.id, in_primary.id]);
}

#[test]
fn test_scope_without_components_is_skipped() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");
    let published = PublishingStatus::Published;
    fx.publish_binary(&ppa, &fx.noble_amd64, Pocket::Release, "main", "libfoo", "1.1", published);
    let in_primary = fx.publish_binary(&fx.primary, &fx.noble_amd64, Pocket::Release, "main", "libfoo", "1.0", published);

    let scopes = [
        DependencyScope {
            archive_id: ppa.id,
            pocket: Pocket::Release,
            components: vec![],
        },
        DependencyScope {
            archive_id: fx.primary.id,
            pocket: Pocket::Release,
            components: vec!["main".to_string()],
        },
    ];
    let candidates = fx
        .store
        .find_dependency_candidates(fx.noble_amd64.id, "libfoo", &scopes)
        .unwrap();
    let ids: Vec<i64> = candidates.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![in_primary.id]);
}

// Override policies

#[test]
fn test_ppa_override_policy_is_constant_main() {
    let fx = Fixture::new();
    let ppa = fx.ppa(&fx.alice, "ppa");

    let policy = fx
        .engine
        .get_override_policy(&ppa, fx.noble.id, Pocket::Release, None)
        .unwrap();
    assert_eq!(
        policy,
        OverridePolicy::Constant {
            component: "main".to_string(),
            new: false,
            phased_update_percentage: None,
        }
    );

    let overrides = fx
        .engine
        .source_overrides(&policy, &[SourceQuery::new("hello")])
        .unwrap();
    assert_eq!(overrides[0].component, "main");
    assert!(!overrides[0].new);
}

#[test]
fn test_primary_overrides_fall_back() {
    let fx = Fixture::new();
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "universe", "gone", "1.0", PublishingStatus::Deleted);

    let policy = fx
        .engine
        .get_override_policy(&fx.primary, fx.noble.id, Pocket::Proposed, None)
        .unwrap();

    let mut contrib = SourceQuery::new("newcomer");
    contrib.component = Some("contrib".to_string());
    let queries = [
        SourceQuery::new("unseen"),
        SourceQuery::new("hello"),
        contrib,
        SourceQuery::new("gone"),
    ];
    let overrides = fx.engine.source_overrides(&policy, &queries).unwrap();

    let summary: Vec<(&str, &str, bool)> = overrides
        .iter()
        .map(|o| (o.name.as_str(), o.component.as_str(), o.new))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("unseen", "universe", true),
            ("hello", "main", false),
            ("newcomer", "multiverse", true),
            ("gone", "universe", true),
        ]
    );
    assert_eq!(overrides[1].version.as_deref(), Some("1.0"));
}

#[test]
fn test_binary_overrides_match_architecture() {
    let fx = Fixture::new();
    let published = PublishingStatus::Published;
    fx.publish_binary(&fx.primary, &fx.noble_amd64, Pocket::Release, "restricted", "libfoo", "1.0", published);

    let policy = fx
        .engine
        .get_override_policy(&fx.primary, fx.noble.id, Pocket::Release, Some(10))
        .unwrap();

    let mut from_source = BinaryQuery::new("libbar", Some("amd64"));
    from_source.component = Some("main".to_string());
    let queries = [
        BinaryQuery::new("libfoo", Some("amd64")),
        // Found through the any-architecture pass.
        BinaryQuery::new("libfoo", Some("riscv64")),
        from_source,
        BinaryQuery::new("libbaz", None),
    ];
    let overrides = fx.engine.binary_overrides(&policy, &queries).unwrap();
    assert_eq!(overrides.len(), 4);

    assert_eq!(overrides[0].component, "restricted");
    assert!(!overrides[0].new);
    assert_eq!(overrides[0].priority.as_deref(), Some("optional"));
    assert_eq!(overrides[0].phased_update_percentage, Some(10));

    assert_eq!(overrides[1].architecture_tag.as_deref(), Some("riscv64"));
    assert_eq!(overrides[1].component, "restricted");

    assert_eq!(overrides[2].component, "main");
    assert!(overrides[2].new);

    assert_eq!(overrides[3].component, "universe");
    assert!(overrides[3].new);
}

#[test]
fn test_override_policy_inherits_from_parent_series() {
    let fx = Fixture::new();
    let debian = {
        let mut distro = Distribution {
            id: 0,
            name: "debian".to_string(),
            display_name: "Debian".to_string(),
            redirect_release_uploads: false,
            created_at: Utc::now(),
        };
        distro.id = fx.store.create_distribution(&distro).unwrap();
        distro
    };
    let sid = common::create_series(&fx.store, debian.id, "sid", SeriesStatus::Development);
    let debian_primary = fx
        .engine
        .create_archive(NewArchive::new(debian.id, fx.archive_team.id, ArchivePurpose::Primary))
        .unwrap();
    fx.publish_source(&debian_primary, &sid, Pocket::Release, "restricted", "firmware", "1.0", PublishingStatus::Published);

    fx.store
        .add_series_parent(&SeriesParent {
            derived_series_id: fx.noble.id,
            parent_series_id: sid.id,
            ordering: 0,
            inherit_overrides: true,
        })
        .unwrap();

    let policy = fx
        .engine
        .get_override_policy(&fx.primary, fx.noble.id, Pocket::Release, None)
        .unwrap();
    let overrides = fx
        .engine
        .source_overrides(&policy, &[SourceQuery::new("firmware")])
        .unwrap();
    assert_eq!(overrides[0].component, "restricted");
    assert!(!overrides[0].new);
}

#[test]
fn test_copy_archive_uses_primary_policy() {
    let fx = Fixture::new();
    let copy = fx
        .engine
        .create_archive(
            NewArchive::new(fx.distro.id, fx.alice.id, ArchivePurpose::Copy).named("rebuild"),
        )
        .unwrap();

    let from_copy = fx
        .engine
        .get_override_policy(&copy, fx.noble.id, Pocket::Release, None)
        .unwrap();
    let from_primary = fx
        .engine
        .get_override_policy(&fx.primary, fx.noble.id, Pocket::Release, None)
        .unwrap();
    assert_eq!(from_copy, from_primary);
}

// Copies

#[test]
fn test_copy_package_enqueues_job() {
    let fx = Fixture::new();
    let source_ppa = fx.ppa(&fx.bob, "staging");
    let target = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&source_ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);

    let mut request = CopyPackageRequest::new("hello", "1.0", source_ppa.id, "release", fx.alice.id);
    request.include_binaries = true;
    request.phased_update_percentage = Some(100);
    let handle = fx.engine.copy_package(target.id, &request).unwrap();

    let jobs = fx.store.list_copy_jobs(target.id).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].handle, handle);
    let job = &jobs[0].request;
    assert_eq!(job.package_name, "hello");
    assert_eq!(job.package_version, "1.0");
    assert_eq!(job.target_series_id, fx.noble.id);
    assert_eq!(job.target_pocket, Pocket::Release);
    assert_eq!(job.copy_policy, CopyPolicy::Insecure);
    assert!(job.include_binaries);
    assert_eq!(job.phased_update_percentage, None);
    assert_eq!(job.requester_id, fx.alice.id);
}

#[test]
fn test_copy_permission_check_returns_requester() {
    let fx = Fixture::new();
    let source_ppa = fx.ppa(&fx.bob, "staging");
    let target = fx.ppa(&fx.alice, "ppa");
    let source = fx.publish_source(&source_ppa, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);
    let sources = std::slice::from_ref(&source);

    let requester = fx
        .engine
        .check_copy_permissions(Some(fx.alice.id), &target, Some(&fx.noble), Pocket::Release, sources, false, false)
        .unwrap();
    assert_eq!(requester, fx.alice.id);

    let anonymous = fx.engine.check_copy_permissions(None, &target, Some(&fx.noble), Pocket::Release, sources, false, false);
    assert!(matches!(anonymous, Err(Error::CannotCopy(_))));
}

#[test]
fn test_copy_rejects_bad_phased_percentage_before_anything_else() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");

    let mut request = CopyPackageRequest::new("hello", "1.0", fx.primary.id, "release", fx.alice.id);
    request.phased_update_percentage = Some(150);
    let result = fx.engine.copy_package(target.id, &request);
    assert!(matches!(result, Err(Error::InvalidPhasedUpdatePercentage(150))));
    assert!(fx.store.list_copy_jobs(target.id).unwrap().is_empty());
}

#[test]
fn test_copy_package_missing_source() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");

    let request = CopyPackageRequest::new("hello", "9.9", fx.primary.id, "release", fx.alice.id);
    match fx.engine.copy_package(target.id, &request) {
        Err(Error::CannotCopy(message)) => assert_eq!(
            message,
            "hello is not published in Primary Archive for Ubuntu."
        ),
        other => panic!("expected CannotCopy, got {other:?}"),
    }
}

#[test]
fn test_copy_requires_upload_rights() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);

    let request = CopyPackageRequest::new("hello", "1.0", fx.primary.id, "release", fx.bob.id);
    match fx.engine.copy_package(target.id, &request) {
        Err(Error::CannotCopy(message)) => {
            assert_eq!(message, UploadDenial::CannotUploadToPPA.to_string());
        }
        other => panic!("expected CannotCopy, got {other:?}"),
    }

    let mut anonymous = request.clone();
    anonymous.requester_id = None;
    match fx.engine.copy_package(target.id, &anonymous) {
        Err(Error::CannotCopy(message)) => {
            assert_eq!(message, "Cannot check copy permissions (no requester).");
        }
        other => panic!("expected CannotCopy, got {other:?}"),
    }
    assert!(fx.store.list_copy_jobs(target.id).unwrap().is_empty());
}

#[test]
fn test_copy_private_source_into_public_archive() {
    let fx = Fixture::new();
    let hidden = fx.private_ppa(&fx.alice, "hidden");
    let public = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&hidden, &fx.noble, Pocket::Release, "main", "secret", "1.0", PublishingStatus::Published);

    let mut request = CopyPackageRequest::new("secret", "1.0", hidden.id, "release", fx.alice.id);
    match fx.engine.copy_package(public.id, &request) {
        Err(Error::CannotCopy(message)) => {
            assert_eq!(message, "Cannot copy private source into public archives.");
        }
        other => panic!("expected CannotCopy, got {other:?}"),
    }

    request.unembargo = true;
    fx.engine.copy_package(public.id, &request).unwrap();
}

#[test]
fn test_queue_admin_may_copy_without_upload_rights() {
    let fx = Fixture::new();
    let staging = fx.ppa(&fx.bob, "staging");
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "main", "hello", "0.9", PublishingStatus::Published);

    let mut request = CopyPackageRequest::new("hello", "1.0", staging.id, "proposed", fx.bob.id);
    assert!(matches!(
        fx.engine.copy_package(fx.primary.id, &request),
        Err(Error::CannotCopy(_))
    ));

    fx.engine
        .new_queue_admin(fx.primary.id, fx.bob.id, "main")
        .unwrap();
    request.auto_approve = true;
    fx.engine.copy_package(fx.primary.id, &request).unwrap();
    assert_eq!(fx.store.list_copy_jobs(fx.primary.id).unwrap().len(), 1);
}

#[test]
fn test_move_needs_rights_on_source_archive() {
    let fx = Fixture::new();
    let staging = fx.ppa(&fx.bob, "staging");
    let target = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);

    let mut request = CopyPackageRequest::new("hello", "1.0", staging.id, "release", fx.alice.id);
    request.move_package = true;
    assert!(matches!(
        fx.engine.copy_package(target.id, &request),
        Err(Error::CannotCopy(_))
    ));

    fx.engine
        .new_component_uploader(staging.id, fx.alice.id, "main")
        .unwrap();
    fx.engine.copy_package(target.id, &request).unwrap();
    let jobs = fx.store.list_copy_jobs(target.id).unwrap();
    assert!(jobs[0].request.move_package);
}

#[test]
fn test_copy_packages_takes_latest_published() {
    let fx = Fixture::new();
    let staging = fx.ppa(&fx.bob, "staging");
    let target = fx.ppa(&fx.alice, "ppa");
    let published = PublishingStatus::Published;
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "hello", "1.0-2", published);
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "hello", "1.0-10", published);
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "hello", "2.0", PublishingStatus::Pending);
    fx.publish_source(&staging, &fx.noble, Pocket::Release, "main", "bash", "5.1", published);

    let request = CopyPackagesRequest::new(
        vec![
            "hello".to_string(),
            "bash".to_string(),
            "hello".to_string(),
            "missing".to_string(),
        ],
        staging.id,
        "release",
        fx.alice.id,
    );
    let handles = fx.engine.copy_packages(target.id, &request).unwrap();
    assert_eq!(handles.len(), 2);

    let jobs = fx.store.list_copy_jobs(target.id).unwrap();
    let copied: Vec<(&str, &str)> = jobs
        .iter()
        .map(|j| (j.request.package_name.as_str(), j.request.package_version.as_str()))
        .collect();
    assert_eq!(copied, vec![("hello", "1.0-10"), ("bash", "5.1")]);
    assert!(jobs.iter().all(|j| j.request.copy_policy == CopyPolicy::MassSync));
}

#[test]
fn test_copy_packages_nothing_published() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");
    let request = CopyPackagesRequest::new(vec!["missing".to_string()], fx.primary.id, "release", fx.alice.id);

    match fx.engine.copy_packages(target.id, &request) {
        Err(Error::CannotCopy(message)) => assert_eq!(
            message,
            "None of the supplied package names are published in Primary Archive for Ubuntu."
        ),
        other => panic!("expected CannotCopy, got {other:?}"),
    }
}

#[test]
fn test_sync_checks_target_pocket_first() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");
    fx.publish_source(&fx.primary, &fx.noble, Pocket::Release, "main", "hello", "1.0", PublishingStatus::Published);

    let request = SyncRequest::new(fx.primary.id, "updates", fx.alice.id);
    match fx.engine.sync_source(target.id, "hello", "1.0", &request) {
        Err(Error::CannotCopy(message)) => {
            assert_eq!(message, UploadDenial::InvalidPocketForPPA.to_string());
        }
        other => panic!("expected CannotCopy, got {other:?}"),
    }

    let request = SyncRequest::new(fx.primary.id, "release", fx.alice.id);
    fx.engine.sync_source(target.id, "hello", "1.0", &request).unwrap();
    let handles = fx
        .engine
        .sync_sources(target.id, &["hello".to_string()], &request)
        .unwrap();
    assert_eq!(handles.len(), 1);

    let policies: Vec<CopyPolicy> = fx
        .store
        .list_copy_jobs(target.id)
        .unwrap()
        .into_iter()
        .map(|j| j.request.copy_policy)
        .collect();
    assert_eq!(policies, vec![CopyPolicy::Insecure, CopyPolicy::MassSync]);
}

#[test]
fn test_unknown_pocket_and_series_names() {
    let fx = Fixture::new();
    let target = fx.ppa(&fx.alice, "ppa");

    let request = CopyPackageRequest::new("hello", "1.0", fx.primary.id, "sideways", fx.alice.id);
    assert!(matches!(
        fx.engine.copy_package(target.id, &request),
        Err(Error::PocketNotFound(_))
    ));

    let mut request = CopyPackageRequest::new("hello", "1.0", fx.primary.id, "release", fx.alice.id);
    request.to_series = Some("warty".to_string());
    assert!(matches!(
        fx.engine.copy_package(target.id, &request),
        Err(Error::SeriesNotFound(name)) if name == "warty"
    ));
}

// Subscriptions and tokens

#[test]
fn test_subscriptions_need_private_archive() {
    let fx = Fixture::new();
    let public = fx.ppa(&fx.alice, "ppa");
    assert!(matches!(
        fx.engine.new_subscription(public.id, fx.bob.id, fx.alice.id, None, None),
        Err(Error::ArchiveNotPrivate(_))
    ));

    let private = fx.private_ppa(&fx.alice, "secret");
    fx.engine
        .new_subscription(private.id, fx.bob.id, fx.alice.id, None, Some("beta tester"))
        .unwrap();
    assert!(matches!(
        fx.engine.new_subscription(private.id, fx.bob.id, fx.alice.id, None, None),
        Err(Error::AlreadySubscribed(_))
    ));
}

#[test]
fn test_expired_subscription_is_not_valid() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");
    let expired = Utc::now() - Duration::days(1);
    fx.engine
        .new_subscription(private.id, fx.bob.id, fx.alice.id, Some(expired), None)
        .unwrap();

    assert!(!fx.engine.has_valid_subscription(private.id, fx.bob.id).unwrap());
    assert!(matches!(
        fx.engine.new_auth_token(private.id, fx.bob.id),
        Err(Error::Unauthorized(_))
    ));
}

#[test]
fn test_team_subscription_covers_members() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");
    let testers = fx.team("testers", &[&fx.bob]);
    fx.engine
        .new_subscription(private.id, testers.id, fx.alice.id, None, None)
        .unwrap();

    assert!(fx.engine.has_valid_subscription(private.id, fx.bob.id).unwrap());
    assert!(matches!(
        fx.engine.new_auth_token(private.id, testers.id),
        Err(Error::NoTokensForTeams)
    ));
    fx.engine.new_auth_token(private.id, fx.bob.id).unwrap();
}

#[test]
fn test_personal_token_lifecycle() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");
    let subscription = fx
        .engine
        .new_subscription(private.id, fx.bob.id, fx.alice.id, None, None)
        .unwrap();

    let issued = fx.engine.new_auth_token(private.id, fx.bob.id).unwrap();
    assert!(issued.secret.starts_with("archivist_"));
    assert!(matches!(
        fx.engine.new_auth_token(private.id, fx.bob.id),
        Err(Error::AlreadyExists(_))
    ));

    let header = basic_auth_header("bob", &issued.secret);
    let verified = fx.engine.verify_basic_auth(private.id, &header).unwrap();
    assert_eq!(verified.map(|t| t.id), Some(issued.token.id));

    // Wrong user, wrong secret and garbage all fail quietly.
    let as_alice = basic_auth_header("alice", &issued.secret);
    assert!(fx.engine.verify_basic_auth(private.id, &as_alice).unwrap().is_none());
    let wrong = basic_auth_header("bob", "archivist_00000000_00000000000000000000000000000000");
    assert!(fx.engine.verify_basic_auth(private.id, &wrong).unwrap().is_none());
    assert!(fx.engine.verify_basic_auth(private.id, "Bearer xyz").unwrap().is_none());

    // Cancelling the subscription deactivates the token.
    fx.engine
        .cancel_subscription(subscription.id, fx.alice.id)
        .unwrap();
    assert!(fx.engine.auth_token(private.id, fx.bob.id).unwrap().is_none());
    assert!(fx.engine.verify_basic_auth(private.id, &header).unwrap().is_none());
    assert!(matches!(
        fx.engine.deactivate_auth_token(private.id, fx.bob.id),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_cancel_keeps_tokens_covered_by_another_subscription() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");
    let testers = fx.team("testers", &[&fx.bob]);
    let personal = fx
        .engine
        .new_subscription(private.id, fx.bob.id, fx.alice.id, None, None)
        .unwrap();
    fx.engine
        .new_subscription(private.id, testers.id, fx.alice.id, None, None)
        .unwrap();
    fx.engine.new_auth_token(private.id, fx.bob.id).unwrap();

    fx.engine.cancel_subscription(personal.id, fx.alice.id).unwrap();
    assert!(fx.engine.auth_token(private.id, fx.bob.id).unwrap().is_some());

    let subscriptions = fx.engine.subscriptions(private.id).unwrap();
    let cancelled = subscriptions.iter().find(|s| s.id == personal.id).unwrap();
    assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by_id, Some(fx.alice.id));
}

#[test]
fn test_store_cancel_is_all_or_nothing() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");
    let subscription = fx
        .engine
        .new_subscription(private.id, fx.bob.id, fx.alice.id, None, None)
        .unwrap();
    let issued = fx.engine.new_auth_token(private.id, fx.bob.id).unwrap();

    // An unknown subscription rolls back the token deactivation too.
    let result = fx
        .store
        .cancel_subscription(9999, fx.alice.id, Utc::now(), &[issued.token.id]);
    assert!(matches!(result, Err(Error::NotFound)));
    assert!(fx.engine.auth_token(private.id, fx.bob.id).unwrap().is_some());

    let deactivated = fx
        .store
        .cancel_subscription(subscription.id, fx.alice.id, Utc::now(), &[issued.token.id])
        .unwrap();
    assert_eq!(deactivated, 1);
    assert!(fx.engine.auth_token(private.id, fx.bob.id).unwrap().is_none());
}

#[test]
fn test_tokens_need_private_archive() {
    let fx = Fixture::new();
    let public = fx.ppa(&fx.alice, "ppa");
    match fx.engine.new_auth_token(public.id, fx.bob.id) {
        Err(Error::ArchiveNotPrivate(message)) => assert_eq!(message, "Archive must be private."),
        other => panic!("expected ArchiveNotPrivate, got {other:?}"),
    }
    assert!(matches!(
        fx.engine.new_named_auth_token(public.id, "mirror"),
        Err(Error::ArchiveNotPrivate(_))
    ));
}

#[test]
fn test_named_tokens() {
    let fx = Fixture::new();
    let private = fx.private_ppa(&fx.alice, "secret");

    let issued = fx.engine.new_named_auth_token(private.id, "mirror").unwrap();
    assert_eq!(issued.token.name.as_deref(), Some("mirror"));
    assert!(matches!(
        fx.engine.new_named_auth_token(private.id, "mirror"),
        Err(Error::DuplicateTokenName(_))
    ));
    assert!(matches!(
        fx.engine.new_named_auth_token(private.id, "  "),
        Err(Error::InvalidName(_))
    ));

    let header = basic_auth_header("+mirror", &issued.secret);
    assert!(fx.engine.verify_basic_auth(private.id, &header).unwrap().is_some());
    assert_eq!(fx.engine.named_auth_tokens(private.id).unwrap().len(), 1);

    fx.engine.revoke_named_auth_token(private.id, "mirror").unwrap();
    assert!(fx.engine.verify_basic_auth(private.id, &header).unwrap().is_none());
    assert!(fx.engine.named_auth_tokens(private.id).unwrap().is_empty());

    // The name is free again once revoked.
    fx.engine.new_named_auth_token(private.id, "mirror").unwrap();
}

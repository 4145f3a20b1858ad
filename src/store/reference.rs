//! Canonical archive reference strings.
//!
//! - `DISTRO` names a distribution's primary archive.
//! - `DISTRO/ARCHIVE` names a non-PPA archive of that distribution.
//! - `~OWNER/DISTRO/ARCHIVE` or `ppa:OWNER/DISTRO/ARCHIVE` names a PPA.

use crate::types::{Archive, ArchivePurpose, Distribution, Person};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveReference {
    Primary {
        distribution: String,
    },
    Named {
        distribution: String,
        archive: String,
    },
    Ppa {
        owner: String,
        distribution: String,
        archive: String,
    },
}

impl ArchiveReference {
    /// Parses a reference. Anything that is not one of the accepted shapes
    /// yields `None` so callers report "not found" rather than an error.
    pub fn parse(reference: &str) -> Option<ArchiveReference> {
        let reference = reference.trim();
        let segments: Vec<&str> = reference.split('/').collect();
        if segments.iter().any(|s| !valid_segment(s)) {
            return None;
        }

        let first = segments[0];
        let owner = first
            .strip_prefix('~')
            .or_else(|| first.strip_prefix("ppa:"));

        match (owner, segments.as_slice()) {
            (Some(owner), [_, distribution, archive]) if valid_segment(owner) => {
                Some(ArchiveReference::Ppa {
                    owner: owner.to_string(),
                    distribution: distribution.to_string(),
                    archive: archive.to_string(),
                })
            }
            (Some(_), _) => None,
            (None, [distribution]) => Some(ArchiveReference::Primary {
                distribution: distribution.to_string(),
            }),
            (None, [distribution, archive]) => Some(ArchiveReference::Named {
                distribution: distribution.to_string(),
                archive: archive.to_string(),
            }),
            (None, _) => None,
        }
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.len() <= 255 && !segment.chars().any(char::is_whitespace)
}

/// Renders the canonical reference of an archive.
#[must_use]
pub fn reference_of(archive: &Archive, distribution: &Distribution, owner: &Person) -> String {
    match archive.purpose {
        ArchivePurpose::Ppa => format!("~{}/{}/{}", owner.name, distribution.name, archive.name),
        ArchivePurpose::Primary => distribution.name.clone(),
        ArchivePurpose::Partner | ArchivePurpose::Copy => {
            format!("{}/{}", distribution.name, archive.name)
        }
    }
}

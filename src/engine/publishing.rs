use std::cmp::Ordering;

use tracing::warn;

use super::ArchiveEngine;
use crate::error::{Error, Result};
use crate::store::{BinaryFilter, SourceFilter};
use crate::types::*;

/// Debian version ordering. Versions that do not parse fall back to byte
/// ordering so a single bad row cannot break a listing.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (a.parse::<debversion::Version>(), b.parse::<debversion::Version>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Err(_), _) | (_, Err(_)) => {
            warn!("Unparseable version in comparison: '{}' vs '{}'", a, b);
            a.cmp(b)
        }
    }
}

/// Name ascending, version descending, id descending.
fn default_order(a_name: &str, a_version: &str, a_id: i64, b_name: &str, b_version: &str, b_id: i64) -> Ordering {
    a_name
        .cmp(b_name)
        .then_with(|| compare_versions(b_version, a_version))
        .then_with(|| b_id.cmp(&a_id))
}

fn check_filter(filter: &SourceFilter) -> Result<()> {
    if filter.version.is_some() && filter.name.is_none() {
        return Err(Error::VersionRequiresName);
    }
    Ok(())
}

impl ArchiveEngine {
    pub fn get_published_sources(
        &self,
        archive_id: i64,
        filter: &SourceFilter,
    ) -> Result<Vec<SourcePublication>> {
        check_filter(filter)?;
        let mut sources = self.store.find_source_publications(archive_id, filter)?;

        if filter.order_by_date {
            sources.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        } else {
            sources.sort_by(|a, b| default_order(&a.name, &a.version, a.id, &b.name, &b.version, b.id));
        }
        Ok(sources)
    }

    pub fn get_published_binaries(
        &self,
        archive_id: i64,
        filter: &BinaryFilter,
    ) -> Result<Vec<BinaryPublication>> {
        check_filter(&filter.source)?;
        let mut binaries = self.store.find_binary_publications(archive_id, filter)?;

        if filter.source.order_by_date {
            binaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        } else {
            binaries.sort_by(|a, b| default_order(&a.name, &a.version, a.id, &b.name, &b.version, b.id));
        }
        Ok(binaries)
    }

    /// Total size of distinct source files still published.
    pub fn sources_size(&self, archive_id: i64) -> Result<i64> {
        self.store.published_size(archive_id, PublicationKind::Source)
    }

    pub fn binaries_size(&self, archive_id: i64) -> Result<i64> {
        self.store.published_size(archive_id, PublicationKind::Binary)
    }

    pub fn estimated_size(&self, archive_id: i64) -> Result<i64> {
        Ok(self.sources_size(archive_id)? + self.binaries_size(archive_id)?)
    }

    /// Newest active publication of exactly `name` in the series.
    pub fn latest_published_source(
        &self,
        archive_id: i64,
        series_id: i64,
        name: &str,
    ) -> Result<Option<SourcePublication>> {
        let filter = SourceFilter::new()
            .exact_name(name)
            .series(series_id)
            .statuses(PublishingStatus::ACTIVE);
        Ok(self
            .get_published_sources(archive_id, &filter)?
            .into_iter()
            .next())
    }

    pub fn latest_published_component(
        &self,
        archive_id: i64,
        series_id: i64,
        name: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .latest_published_source(archive_id, series_id, name)?
            .map(|source| source.component))
    }
}

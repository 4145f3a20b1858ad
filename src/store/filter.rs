use chrono::{DateTime, Utc};

use crate::types::{Pocket, PublishingStatus};

/// How a publication's package name is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Case-sensitive substring match.
    Contains(String),
    Exact(String),
    /// Exact match against any of the names. An empty list matches nothing.
    AnyOf(Vec<String>),
}

/// Filters for source publication retrieval. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub name: Option<NameFilter>,
    pub version: Option<String>,
    pub statuses: Vec<PublishingStatus>,
    pub series_id: Option<i64>,
    pub pockets: Vec<Pocket>,
    pub component: Option<String>,
    pub created_since: Option<DateTime<Utc>>,
    /// Skip publications that have a removal date.
    pub exclude_removed: bool,
    pub order_by_date: bool,
}

impl SourceFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameFilter::Contains(name.into()));
        self
    }

    #[must_use]
    pub fn exact_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(NameFilter::Exact(name.into()));
        self
    }

    #[must_use]
    pub fn names(mut self, names: Vec<String>) -> Self {
        self.name = Some(NameFilter::AnyOf(names));
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: PublishingStatus) -> Self {
        self.statuses.push(status);
        self
    }

    #[must_use]
    pub fn statuses(mut self, statuses: &[PublishingStatus]) -> Self {
        self.statuses.extend_from_slice(statuses);
        self
    }

    #[must_use]
    pub fn series(mut self, series_id: i64) -> Self {
        self.series_id = Some(series_id);
        self
    }

    #[must_use]
    pub fn pocket(mut self, pocket: Pocket) -> Self {
        self.pockets.push(pocket);
        self
    }

    #[must_use]
    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    #[must_use]
    pub fn include_removed(mut self, include: bool) -> Self {
        self.exclude_removed = !include;
        self
    }

    #[must_use]
    pub fn order_by_date(mut self) -> Self {
        self.order_by_date = true;
        self
    }
}

/// Filters for binary publication retrieval.
#[derive(Debug, Clone, Default)]
pub struct BinaryFilter {
    pub source: SourceFilter,
    pub arch_series_id: Option<i64>,
    /// Collapse arch-indep duplicates to the nominated arch-indep copy.
    pub on_disk: bool,
}

impl BinaryFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, f: impl FnOnce(SourceFilter) -> SourceFilter) -> Self {
        self.source = f(self.source);
        self
    }

    #[must_use]
    pub fn arch_series(mut self, arch_series_id: i64) -> Self {
        self.arch_series_id = Some(arch_series_id);
        self
    }

    #[must_use]
    pub fn on_disk(mut self) -> Self {
        self.on_disk = true;
        self
    }
}

/// One archive/pocket/component-set combination searched for build
/// dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyScope {
    pub archive_id: i64,
    pub pocket: Pocket,
    pub components: Vec<String>,
}

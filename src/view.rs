//! Immutable dashboard view state.
//!
//! A `ViewState` is passed into each render and replaced, never mutated, by
//! `ViewState::apply` when the user interacts with the page.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::config::BucketWidth;
use crate::errors::ExplorerError;
use crate::filter::{FilterSpec, Predicate};
use crate::source::utilities::date_helpers::{end_of_day, start_of_day};
use crate::types::{CategoryValue, FieldName, MetricName};

/// Dashboard page.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Page {
    /// Landing page without a data source.
    #[default]
    Home,
    /// Hub model catalogue.
    Models,
    /// Hub dataset catalogue.
    Datasets,
    /// Leaderboard benchmarks.
    Benchmarks,
    /// News articles.
    News,
}

impl Page {
    /// Every page in navigation order.
    pub const ALL: [Page; 5] = [
        Page::Home,
        Page::Models,
        Page::Datasets,
        Page::Benchmarks,
        Page::News,
    ];

    /// Lowercase slug, as accepted by `--page` and [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Models => "models",
            Page::Datasets => "datasets",
            Page::Benchmarks => "benchmarks",
            Page::News => "news",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Page {
    type Err = ExplorerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|page| page.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| {
                ExplorerError::Configuration(format!(
                    "unknown page '{value}' (expected home, models, datasets, benchmarks or news)"
                ))
            })
    }
}

/// One user interaction.
#[derive(Clone, Debug, PartialEq)]
pub enum UiEvent {
    /// Switch page. Filters belong to a page and are reset.
    Navigate(Page),
    /// Replace the selection of a categorical field. An empty list is an
    /// explicit "nothing selected" and hides every record.
    Select {
        /// Categorical field.
        field: FieldName,
        /// Values to keep.
        values: Vec<CategoryValue>,
    },
    /// Drop the categorical predicate on `field` (show all).
    ClearSelection(FieldName),
    /// Restrict a numeric field to `[lo, hi]`; reversed bounds are swapped.
    SetRange {
        /// Numeric field.
        field: FieldName,
        /// Lower bound.
        lo: f64,
        /// Upper bound.
        hi: f64,
    },
    /// Drop the range on a numeric field.
    ClearRange(FieldName),
    /// Restrict the page's time field to whole days `start..=end`.
    SetPeriod {
        /// First day, inclusive.
        start: NaiveDate,
        /// Last day, inclusive.
        end: NaiveDate,
    },
    /// Drop the period restriction.
    ClearPeriod,
    /// Free-text search; blank text clears it.
    Search(String),
    /// Calendar bucket for time-series views.
    SetBucket(BucketWidth),
    /// Metrics plotted by the top-per-bucket view; empty means page default.
    SelectMetrics(Vec<MetricName>),
    /// Clear every filter but stay on the current page.
    Reset,
}

/// Snapshot of the active page and its filter widgets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewState {
    page: Page,
    selections: BTreeMap<FieldName, BTreeSet<CategoryValue>>,
    ranges: BTreeMap<FieldName, (f64, f64)>,
    period: Option<(NaiveDate, NaiveDate)>,
    search: Option<String>,
    bucket: BucketWidth,
    metrics: Vec<MetricName>,
}

impl ViewState {
    /// Fresh state on `page` with no filters.
    pub fn new(page: Page) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Active page.
    pub fn page(&self) -> Page {
        self.page
    }

    /// Selected values for `field`; `None` means no selection (show all).
    pub fn selection(&self, field: &str) -> Option<&BTreeSet<CategoryValue>> {
        self.selections.get(field)
    }

    /// Active `(lo, hi)` range for `field`, with `lo <= hi`.
    pub fn range(&self, field: &str) -> Option<(f64, f64)> {
        self.ranges.get(field).copied()
    }

    /// Active day range.
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.period
    }

    /// Active search text, never blank.
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Bucket width for time-series views.
    pub fn bucket(&self) -> BucketWidth {
        self.bucket
    }

    /// Metrics chosen for the top-per-bucket view.
    pub fn metrics(&self) -> &[MetricName] {
        &self.metrics
    }

    /// Return the state that results from `event`.
    pub fn apply(self, event: UiEvent) -> ViewState {
        let mut next = self;
        match event {
            UiEvent::Navigate(page) => {
                if page != next.page {
                    next = ViewState {
                        bucket: next.bucket,
                        ..ViewState::new(page)
                    };
                }
            }
            UiEvent::Select { field, values } => {
                next.selections.insert(field, values.into_iter().collect());
            }
            UiEvent::ClearSelection(field) => {
                next.selections.remove(&field);
            }
            UiEvent::SetRange { field, lo, hi } => {
                let bounds = if lo <= hi { (lo, hi) } else { (hi, lo) };
                next.ranges.insert(field, bounds);
            }
            UiEvent::ClearRange(field) => {
                next.ranges.remove(&field);
            }
            UiEvent::SetPeriod { start, end } => {
                next.period = Some(if start <= end { (start, end) } else { (end, start) });
            }
            UiEvent::ClearPeriod => next.period = None,
            UiEvent::Search(text) => {
                let text = text.trim();
                next.search = (!text.is_empty()).then(|| text.to_string());
            }
            UiEvent::SetBucket(width) => next.bucket = width,
            UiEvent::SelectMetrics(metrics) => {
                let mut unique: Vec<MetricName> = Vec::with_capacity(metrics.len());
                for metric in metrics {
                    if !unique.contains(&metric) {
                        unique.push(metric);
                    }
                }
                next.metrics = unique;
            }
            UiEvent::Reset => {
                next = ViewState {
                    bucket: next.bucket,
                    ..ViewState::new(next.page)
                };
            }
        }
        next
    }

    /// Apply several events in order.
    pub fn apply_all<I>(self, events: I) -> ViewState
    where
        I: IntoIterator<Item = UiEvent>,
    {
        events.into_iter().fold(self, ViewState::apply)
    }

    /// Filter predicates for this state.
    ///
    /// The period applies to `time_field`; the search text applies to
    /// `search_field` and is ignored when the page has none.
    pub fn filter_spec(&self, time_field: &str, search_field: Option<&str>) -> FilterSpec {
        let mut spec = FilterSpec::new();
        for (field, values) in &self.selections {
            spec.push(Predicate::one_of(field.clone(), values.iter().cloned()));
        }
        for (field, (lo, hi)) in &self.ranges {
            spec.push(Predicate::range(field.clone(), *lo, *hi));
        }
        if let Some((start, end)) = self.period {
            spec.push(Predicate::between(
                time_field,
                start_of_day(start),
                end_of_day(end),
            ));
        }
        if let (Some(needle), Some(field)) = (&self.search, search_field) {
            spec.push(Predicate::contains(field, needle.clone()));
        }
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn apply_returns_new_state_and_leaves_old_untouched() {
        let before = ViewState::new(Page::News);
        let after = before.clone().apply(UiEvent::Select {
            field: "country".into(),
            values: vec!["FR".into()],
        });
        assert!(before.selection("country").is_none());
        assert_eq!(after.selection("country").unwrap().len(), 1);
    }

    #[test]
    fn empty_selection_differs_from_cleared_selection() {
        let state = ViewState::new(Page::News).apply(UiEvent::Select {
            field: "country".into(),
            values: vec![],
        });
        let spec = state.filter_spec("date", Some("title"));
        assert_eq!(spec.predicates().len(), 1);

        let cleared = state.apply(UiEvent::ClearSelection("country".into()));
        assert!(cleared.filter_spec("date", Some("title")).is_empty());
    }

    #[test]
    fn navigation_resets_filters_but_keeps_bucket() {
        let state = ViewState::new(Page::Models).apply_all([
            UiEvent::SetBucket(BucketWidth::Day),
            UiEvent::Search("llama".into()),
            UiEvent::SetRange {
                field: "likes".into(),
                lo: 10.0,
                hi: 1.0,
            },
        ]);
        assert_eq!(state.range("likes"), Some((1.0, 10.0)));

        let same_page = state.clone().apply(UiEvent::Navigate(Page::Models));
        assert_eq!(same_page, state);

        let moved = state.apply(UiEvent::Navigate(Page::News));
        assert_eq!(moved.page(), Page::News);
        assert_eq!(moved.search(), None);
        assert_eq!(moved.range("likes"), None);
        assert_eq!(moved.bucket(), BucketWidth::Day);
    }

    #[test]
    fn period_and_search_become_predicates() {
        let state = ViewState::new(Page::News).apply_all([
            UiEvent::SetPeriod {
                start: date(2024, 1, 31),
                end: date(2024, 1, 1),
            },
            UiEvent::Search("  ".into()),
        ]);
        assert_eq!(state.period(), Some((date(2024, 1, 1), date(2024, 1, 31))));
        assert_eq!(state.search(), None);
        let spec = state.filter_spec("date", Some("title"));
        assert!(matches!(
            &spec.predicates()[0],
            Predicate::Between { start, end, .. }
                if *start == start_of_day(date(2024, 1, 1)) && *end == end_of_day(date(2024, 1, 31))
        ));

        let searching = state.apply(UiEvent::Search("GPT".into()));
        assert_eq!(searching.filter_spec("date", Some("title")).predicates().len(), 2);
        assert_eq!(searching.filter_spec("date", None).predicates().len(), 1);
    }

    #[test]
    fn metric_selection_is_deduplicated() {
        let state = ViewState::default().apply(UiEvent::SelectMetrics(vec![
            "BBH".into(),
            "IFEval".into(),
            "BBH".into(),
        ]));
        assert_eq!(state.metrics(), ["BBH".to_string(), "IFEval".to_string()]);
    }

    #[test]
    fn pages_parse_case_insensitively() {
        assert_eq!("Benchmarks".parse::<Page>().unwrap(), Page::Benchmarks);
        assert!(matches!("charts".parse::<Page>(), Err(ExplorerError::Configuration(_))));
    }
}

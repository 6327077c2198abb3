use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use tracing::debug;

use crate::models::{
    Hotspot, InsightsSummary, IssueRecord, ResolutionStats, SkippedCounts, Trend,
};

pub const UNKNOWN_TYPE: &str = "unknown";

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy)]
pub struct InsightsOptions {
    /// Calendar days the trend looks at, ending on the day of `now`.
    pub window_days: i64,
    /// Trailing calendar days compared against the window average.
    pub recent_days: i64,
    pub hotspot_limit: usize,
    /// Offset used to assign an issue to a calendar day.
    pub utc_offset: FixedOffset,
}

impl Default for InsightsOptions {
    fn default() -> Self {
        Self {
            window_days: 30,
            recent_days: 7,
            hotspot_limit: 5,
            utc_offset: Utc.fix(),
        }
    }
}

/// Summarizes a snapshot of issue reports. Holds only its options, so one
/// value can be shared freely between callers.
#[derive(Debug, Clone, Default)]
pub struct InsightsAggregator {
    options: InsightsOptions,
}

impl InsightsAggregator {
    pub fn new(options: InsightsOptions) -> Self {
        Self { options }
    }

    pub fn summarize(&self, issues: &[IssueRecord], now: DateTime<Utc>) -> InsightsSummary {
        let daily_counts = self.daily_counts(issues, now);
        let trend = self.classify_trend(&daily_counts, now);
        let skipped = skipped_counts(issues);

        if skipped != SkippedCounts::default() {
            debug!(
                skipped_resolution = skipped.resolution,
                skipped_trend = skipped.trend,
                "excluded issues with unusable timestamps"
            );
        }

        InsightsSummary {
            total_issues: issues.len(),
            by_type: group_by_type(issues),
            resolution_stats: resolution_stats(issues),
            hotspots: hotspots(issues, self.options.hotspot_limit),
            trend,
            daily_counts,
            skipped,
        }
    }

    /// Issues per calendar day over the trend window. Days without issues
    /// have no entry.
    pub fn daily_counts(
        &self,
        issues: &[IssueRecord],
        now: DateTime<Utc>,
    ) -> BTreeMap<NaiveDate, usize> {
        let today = self.local_date(now);
        let first_day = first_day_of_span(today, self.options.window_days);
        let mut counts = BTreeMap::new();

        for issue in issues {
            let Some(created) = issue.created_at.as_deref().and_then(parse_timestamp) else {
                continue;
            };

            if created > now {
                continue;
            }

            let day = self.local_date(created);
            if day < first_day {
                continue;
            }

            *counts.entry(day).or_default() += 1;
        }

        counts
    }

    /// Compares the average of the trailing `recent_days` calendar days
    /// (empty days count as zero) against the average over days that had
    /// at least one issue.
    pub fn classify_trend(
        &self,
        daily_counts: &BTreeMap<NaiveDate, usize>,
        now: DateTime<Utc>,
    ) -> Trend {
        if daily_counts.len() < 2 {
            return Trend::Stable;
        }

        let overall_average =
            daily_counts.values().sum::<usize>() as f64 / daily_counts.len() as f64;

        let recent_days = self.options.recent_days.max(1);
        let today = self.local_date(now);
        let recent_start = first_day_of_span(today, recent_days);
        let recent_total: usize = daily_counts
            .range(recent_start..=today)
            .map(|(_, count)| *count)
            .sum();
        let recent_average = recent_total as f64 / recent_days as f64;

        if recent_average > overall_average * 1.1 {
            Trend::Increasing
        } else if recent_average < overall_average * 0.9 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.options.utc_offset).date_naive()
    }
}

/// First calendar day of a span of `days` days ending on `today`. Spans
/// reaching past the representable calendar start at its first day.
fn first_day_of_span(today: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days.max(1) - 1)
        .and_then(|span| today.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Parses a stored timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`
/// and `YYYY-MM-DD` (both read as UTC), or integer epoch milliseconds.
/// Anything else is treated as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Counts issues per type. Missing or blank types are counted under
/// [`UNKNOWN_TYPE`] so the counts always add up to the number of issues.
pub fn group_by_type(issues: &[IssueRecord]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for issue in issues {
        let kind = issue
            .kind
            .as_deref()
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or(UNKNOWN_TYPE);
        *counts.entry(kind.to_string()).or_default() += 1;
    }

    counts
}

/// Creation-to-resolution time in fractional days over resolved issues.
/// `None` when no resolved issue has two usable timestamps.
pub fn resolution_stats(issues: &[IssueRecord]) -> Option<ResolutionStats> {
    let durations: Vec<f64> = issues
        .iter()
        .filter_map(resolution_window)
        .map(|(created, resolved)| {
            (resolved - created).num_milliseconds() as f64 / MILLIS_PER_DAY
        })
        .collect();

    stats_from_durations(&durations)
}

fn resolution_window(issue: &IssueRecord) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    if !issue.is_resolved() {
        return None;
    }

    let created = issue.created_at.as_deref().and_then(parse_timestamp)?;
    let resolved = issue.resolved_at.as_deref().and_then(parse_timestamp)?;
    Some((created, resolved))
}

/// Counts issues each timed computation has to leave out: resolved issues
/// without two usable timestamps, and any issue without a usable `created_at`.
pub fn skipped_counts(issues: &[IssueRecord]) -> SkippedCounts {
    let mut skipped = SkippedCounts::default();

    for issue in issues {
        if issue.is_resolved() && resolution_window(issue).is_none() {
            skipped.resolution += 1;
        }
        if issue.created_at.as_deref().and_then(parse_timestamp).is_none() {
            skipped.trend += 1;
        }
    }

    skipped
}

fn stats_from_durations(durations: &[f64]) -> Option<ResolutionStats> {
    if durations.is_empty() {
        return None;
    }

    let average = durations.iter().sum::<f64>() / durations.len() as f64;
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = durations.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(ResolutionStats { average, min, max })
}

/// Most reported locations, highest count first. Equal counts keep the order
/// in which the locations first appear in `issues`.
pub fn hotspots(issues: &[IssueRecord], limit: usize) -> Vec<Hotspot> {
    let mut ranked: Vec<Hotspot> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for issue in issues {
        let Some(location) = issue
            .location
            .as_deref()
            .filter(|location| !location.trim().is_empty())
        else {
            continue;
        };

        match index.get(location) {
            Some(&position) => ranked[position].count += 1,
            None => {
                index.insert(location, ranked.len());
                ranked.push(Hotspot {
                    location: location.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by_key is stable, which keeps first-seen order on ties.
    ranked.sort_by_key(|hotspot| Reverse(hotspot.count));
    ranked.truncate(limit);
    ranked
}

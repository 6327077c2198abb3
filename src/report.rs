use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{InsightsSummary, SentimentBreakdown};

/// Type counts ordered by count, largest first. Equal counts stay in name order.
pub fn ranked_types(summary: &InsightsSummary) -> Vec<(&str, usize)> {
    let mut types: Vec<(&str, usize)> = summary
        .by_type
        .iter()
        .map(|(kind, count)| (kind.as_str(), *count))
        .collect();
    types.sort_by(|a, b| b.1.cmp(&a.1));
    types
}

pub fn build_report(
    label: Option<&str>,
    now: DateTime<Utc>,
    summary: &InsightsSummary,
    sentiment: &SentimentBreakdown,
) -> String {
    let mut output = String::new();
    let scope_label = label.unwrap_or("all issue types");

    let _ = writeln!(output, "# Civic Issue Insights");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        scope_label,
        now.format("%Y-%m-%d %H:%M UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "Total issues: {}", summary.total_issues);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Mix");

    if summary.by_type.is_empty() {
        let _ = writeln!(output, "No issues reported.");
    } else {
        for (kind, count) in ranked_types(summary) {
            let _ = writeln!(output, "- {}: {} issues", kind, count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Resolution Time");

    match summary.resolution_stats {
        Some(stats) => {
            let _ = writeln!(
                output,
                "Average {:.1} days (fastest {:.1}, slowest {:.1})",
                stats.average, stats.min, stats.max
            );
        }
        None => {
            let _ = writeln!(output, "No resolved issues yet.");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Hotspots");

    if summary.hotspots.is_empty() {
        let _ = writeln!(output, "No locations reported.");
    } else {
        for (rank, hotspot) in summary.hotspots.iter().enumerate() {
            let _ = writeln!(
                output,
                "{}. {} ({} issues)",
                rank + 1,
                hotspot.location,
                hotspot.count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Issue Trend");
    let _ = writeln!(output, "Trend: {}", summary.trend.as_str());

    for (day, count) in summary.daily_counts.iter().rev() {
        let _ = writeln!(output, "- {}: {}", day, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sentiment");
    let _ = writeln!(
        output,
        "{} positive, {} negative, {} neutral",
        sentiment.positive, sentiment.negative, sentiment.neutral
    );

    let skipped = summary.skipped;
    if skipped.resolution > 0 || skipped.trend > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "_{} resolved issues and {} issues overall had unusable dates and were left out of the timing figures._",
            skipped.resolution, skipped.trend
        );
    }

    output
}

pub fn render_json(summary: &InsightsSummary) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::InsightsAggregator;
    use crate::models::IssueRecord;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 12, 0, 0).unwrap()
    }

    fn record(id: &str, kind: &str, location: &str, created_at: &str) -> IssueRecord {
        IssueRecord {
            id: id.to_string(),
            kind: Some(kind.to_string()),
            location: Some(location.to_string()),
            status: Some("pending".to_string()),
            created_at: Some(created_at.to_string()),
            ..IssueRecord::default()
        }
    }

    #[test]
    fn renders_sections_for_populated_summary() {
        let mut fixed = record("3", "infrastructure", "Ward 2", "2025-05-10T00:00:00Z");
        fixed.status = Some("resolved".to_string());
        fixed.resolved_at = Some("2025-05-13T12:00:00Z".to_string());
        let issues = vec![
            record("1", "infrastructure", "Ward 2", "2025-05-18T09:00:00Z"),
            record("2", "scheme", "Ward 5", "2025-05-19T09:00:00Z"),
            fixed,
        ];
        let summary = InsightsAggregator::default().summarize(&issues, now());

        let report = build_report(
            Some("Ward survey"),
            now(),
            &summary,
            &SentimentBreakdown::default(),
        );

        assert!(report.contains("Generated for Ward survey at 2025-05-20 12:00 UTC"));
        assert!(report.contains("- infrastructure: 2 issues"));
        assert!(report.contains("Average 3.5 days"));
        assert!(report.contains("1. Ward 2 (2 issues)"));
        assert!(report.contains("- 2025-05-19: 1"));
        assert!(!report.contains("unusable dates"));
    }

    #[test]
    fn renders_placeholders_for_empty_summary() {
        let summary = InsightsAggregator::default().summarize(&[], now());

        let report = build_report(None, now(), &summary, &SentimentBreakdown::default());

        assert!(report.contains("all issue types"));
        assert!(report.contains("No issues reported."));
        assert!(report.contains("No resolved issues yet."));
        assert!(report.contains("No locations reported."));
        assert!(report.contains("Trend: stable"));
    }

    #[test]
    fn json_marks_missing_resolution_stats_as_null() {
        let summary = InsightsAggregator::default().summarize(&[], now());

        let rendered = render_json(&summary).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(json["total_issues"], 0);
        assert!(json["resolution_stats"].is_null());
        assert_eq!(json["trend"], "stable");
    }
}

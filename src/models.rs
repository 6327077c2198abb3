use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One citizen issue report as the data store hands it over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "raw_timestamp")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "raw_timestamp")]
    pub resolved_at: Option<String>,
}

impl IssueRecord {
    pub fn is_resolved(&self) -> bool {
        self.status.as_deref() == Some("resolved")
    }
}

/// Accepts a timestamp given either as text or as integer epoch milliseconds.
fn raw_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Millis(millis) => millis.to_string(),
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hotspot {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

/// Records left out of a sub-computation because a timestamp it needed was
/// missing or unparseable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SkippedCounts {
    pub resolution: usize,
    pub trend: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsSummary {
    pub total_issues: usize,
    pub by_type: BTreeMap<String, usize>,
    /// `None` when no resolved issue carries usable timestamps.
    pub resolution_stats: Option<ResolutionStats>,
    pub hotspots: Vec<Hotspot>,
    pub trend: Trend,
    pub daily_counts: BTreeMap<NaiveDate, usize>,
    pub skipped: SkippedCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueSentiment {
    pub id: String,
    pub sentiment: Sentiment,
    pub score: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone)]
pub struct NewIssue {
    pub kind: String,
    pub description: String,
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_documents_with_missing_fields() {
        let record: IssueRecord = serde_json::from_str(r#"{"id": "a1"}"#).unwrap();
        assert_eq!(record.id, "a1");
        assert_eq!(record.kind, None);
        assert_eq!(record.created_at, None);
        assert!(!record.is_resolved());
    }

    #[test]
    fn keeps_numeric_timestamps_as_text() {
        let record: IssueRecord = serde_json::from_str(
            r#"{"id": "a2", "type": "scheme", "status": "resolved",
                "created_at": 1714000000000, "resolved_at": "2024-04-26T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(record.kind.as_deref(), Some("scheme"));
        assert_eq!(record.created_at.as_deref(), Some("1714000000000"));
        assert_eq!(record.resolved_at.as_deref(), Some("2024-04-26T00:00:00Z"));
        assert!(record.is_resolved());
    }

    #[test]
    fn trend_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Trend::Increasing).unwrap(),
            "\"increasing\""
        );
        assert_eq!(Trend::Stable.as_str(), "stable");
    }

    #[test]
    fn sentiment_text_matches_serialized_form() {
        for sentiment in [Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral] {
            assert_eq!(
                serde_json::to_string(&sentiment).unwrap(),
                format!("\"{}\"", sentiment.as_str())
            );
        }
    }
}

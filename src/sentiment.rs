use crate::models::{IssueRecord, IssueSentiment, Sentiment, SentimentBreakdown};

const POSITIVE_WORDS: &[&str] = &["good", "great", "excellent", "positive", "resolved", "success"];
const NEGATIVE_WORDS: &[&str] = &["bad", "poor", "negative", "failure", "problem", "issue"];

/// Keyword score of a description: +1 per positive word, -1 per negative word.
pub fn score_description(description: &str) -> i32 {
    description
        .to_lowercase()
        .split_whitespace()
        .map(|word| {
            if POSITIVE_WORDS.contains(&word) {
                1
            } else if NEGATIVE_WORDS.contains(&word) {
                -1
            } else {
                0
            }
        })
        .sum()
}

pub fn classify(score: i32) -> Sentiment {
    match score {
        s if s > 0 => Sentiment::Positive,
        s if s < 0 => Sentiment::Negative,
        _ => Sentiment::Neutral,
    }
}

pub fn analyze_sentiment(issues: &[IssueRecord]) -> Vec<IssueSentiment> {
    issues
        .iter()
        .map(|issue| {
            let score = issue.description.as_deref().map(score_description).unwrap_or(0);
            IssueSentiment {
                id: issue.id.clone(),
                sentiment: classify(score),
                score,
            }
        })
        .collect()
}

pub fn sentiment_breakdown(sentiments: &[IssueSentiment]) -> SentimentBreakdown {
    let mut breakdown = SentimentBreakdown::default();

    for entry in sentiments {
        match entry.sentiment {
            Sentiment::Positive => breakdown.positive += 1,
            Sentiment::Negative => breakdown.negative += 1,
            Sentiment::Neutral => breakdown.neutral += 1,
        }
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_description(id: &str, description: Option<&str>) -> IssueRecord {
        IssueRecord {
            id: id.to_string(),
            description: description.map(str::to_string),
            ..IssueRecord::default()
        }
    }

    #[test]
    fn scores_keywords_case_insensitively() {
        assert_eq!(score_description("Great work, problem RESOLVED"), 1);
        assert_eq!(score_description("Bad roads and a poor drainage problem"), -3);
        assert_eq!(score_description("Streetlight out on 5th avenue"), 0);
    }

    #[test]
    fn punctuation_blocks_a_match() {
        assert_eq!(score_description("this is bad."), 0);
    }

    #[test]
    fn classifies_each_issue() {
        let issues = vec![
            with_description("1", Some("excellent response, success")),
            with_description("2", Some("failure to repair the bridge")),
            with_description("3", Some("good service but bad follow up")),
            with_description("4", None),
        ];

        let sentiments = analyze_sentiment(&issues);

        assert_eq!(sentiments[0].sentiment, Sentiment::Positive);
        assert_eq!(sentiments[0].score, 2);
        assert_eq!(sentiments[1].sentiment, Sentiment::Negative);
        assert_eq!(sentiments[2].sentiment, Sentiment::Neutral);
        assert_eq!(sentiments[3].sentiment, Sentiment::Neutral);
        assert_eq!(sentiments[3].id, "4");

        let breakdown = sentiment_breakdown(&sentiments);
        assert_eq!(breakdown.positive, 1);
        assert_eq!(breakdown.negative, 1);
        assert_eq!(breakdown.neutral, 2);
    }
}

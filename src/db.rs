use std::cmp::Reverse;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::insights::parse_timestamp;
use crate::models::{IssueRecord, NewIssue};
use crate::snapshot::CsvRow;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn seed(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let issues = vec![
        (
            "seed-001",
            "corruption",
            "Bribe demanded for land record copy",
            Some("Tehsil Office, Ward 4"),
            "resolved",
            26,
            Some(19),
        ),
        (
            "seed-002",
            "infrastructure",
            "Bad road surface, poor drainage problem near bus stand",
            Some("Ward 9"),
            "pending",
            12,
            None,
        ),
        (
            "seed-003",
            "infrastructure",
            "Streetlights out along the market lane",
            Some("Ward 4"),
            "resolved",
            9,
            Some(7),
        ),
        (
            "seed-004",
            "scheme",
            "Pension transfer delayed for three months",
            None,
            "pending",
            4,
            None,
        ),
        (
            "seed-005",
            "officer",
            "Great response from the block officer, issue resolved quickly",
            Some("Block Office"),
            "resolved",
            3,
            Some(2),
        ),
        (
            "seed-006",
            "infrastructure",
            "Water supply failure for two days",
            Some("Ward 9"),
            "pending",
            1,
            None,
        ),
    ];

    for (id, kind, description, location, status, created_days_ago, resolved_days_ago) in issues {
        let created_at = format_timestamp(now - Duration::days(created_days_ago));
        let resolved_at =
            resolved_days_ago.map(|days: i64| format_timestamp(now - Duration::days(days)));

        sqlx::query(
            r#"
            INSERT INTO civic_insights.issues
            (id, issue_type, description, location, status, created_at, resolved_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(description)
        .bind(location)
        .bind(status)
        .bind(created_at)
        .bind(resolved_at)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_issues(pool: &PgPool, kind: Option<&str>) -> anyhow::Result<Vec<IssueRecord>> {
    let mut query = String::from(
        "SELECT id, issue_type, description, location, status, created_at, resolved_at \
         FROM civic_insights.issues",
    );

    if kind.is_some() {
        query.push_str(" WHERE issue_type = $1");
    }

    let mut rows = sqlx::query(&query);
    if let Some(value) = kind {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut issues = Vec::with_capacity(records.len());

    for row in records {
        issues.push(IssueRecord {
            id: row.get("id"),
            kind: row.get("issue_type"),
            description: row.get("description"),
            location: row.get("location"),
            status: row.get("status"),
            created_at: row.get("created_at"),
            resolved_at: row.get("resolved_at"),
        });
    }

    sort_newest_first(&mut issues);
    Ok(issues)
}

/// Orders issues by parsed `created_at`, newest first. Stored values mix
/// formats, so text order is not time order. Unusable timestamps go last.
fn sort_newest_first(issues: &mut [IssueRecord]) {
    issues.sort_by_cached_key(|issue| {
        Reverse(issue.created_at.as_deref().and_then(parse_timestamp))
    });
}

/// Stores a new report as `pending` and returns its id.
pub async fn insert_issue(
    pool: &PgPool,
    issue: &NewIssue,
    now: DateTime<Utc>,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let timestamp = format_timestamp(now);

    sqlx::query(
        r#"
        INSERT INTO civic_insights.issues
        (id, issue_type, description, location, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, 'pending', $5, $5)
        "#,
    )
    .bind(&id)
    .bind(&issue.kind)
    .bind(&issue.description)
    .bind(issue.location.as_deref())
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Moves an issue to `status`, stamping `resolved_at` when it becomes
/// resolved. Returns false when no issue has that id.
pub async fn update_status(
    pool: &PgPool,
    id: &str,
    status: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE civic_insights.issues
        SET status = $2,
            updated_at = $3,
            resolved_at = CASE WHEN $2 = 'resolved' THEN $3 ELSE resolved_at END
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(format_timestamp(now))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let status = row.status.unwrap_or_else(|| "pending".to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO civic_insights.issues
            (id, issue_type, description, location, status, created_at, resolved_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&row.id)
        .bind(&row.kind)
        .bind(&row.description)
        .bind(&row.location)
        .bind(status)
        .bind(&row.created_at)
        .bind(&row.resolved_at)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{FixedOffset, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod db;
mod insights;
mod models;
mod report;
mod sentiment;
mod snapshot;

use insights::{InsightsAggregator, InsightsOptions};
use models::{InsightsSummary, IssueRecord, NewIssue};

#[derive(Parser)]
#[command(name = "civic-insights")]
#[command(about = "Issue insights for the civic transparency dashboard", long_about = None)]
struct Cli {
    /// Postgres connection string for the issue store
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,
    #[arg(long, default_value_t = 5, global = true)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed issues
    Seed,
    /// Import issues from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Report a new issue
    AddIssue {
        #[arg(long = "type")]
        kind: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        location: Option<String>,
    },
    /// Change the workflow status of an issue
    SetStatus {
        #[arg(long)]
        id: String,
        #[arg(long)]
        status: String,
    },
    /// Summarize issues by type, resolution time, hotspots and trend
    Insights {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        aggregation: AggregationArgs,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        aggregation: AggregationArgs,
        #[arg(long, default_value = "insights.md")]
        out: PathBuf,
    },
    /// Classify issue descriptions by keyword sentiment
    Sentiment {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Recompute insights on a fixed interval until interrupted
    Watch {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        aggregation: AggregationArgs,
        #[arg(long, default_value_t = 60)]
        every_secs: u64,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Read issues from a JSON or CSV file instead of the store
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Only include issues of this type
    #[arg(long = "type")]
    kind: Option<String>,
}

#[derive(Args)]
struct AggregationArgs {
    #[arg(
        long,
        default_value_t = 30,
        value_parser = clap::value_parser!(i64).range(1..=3650)
    )]
    window_days: i64,
    #[arg(
        long,
        default_value_t = 7,
        value_parser = clap::value_parser!(i64).range(1..=3650)
    )]
    recent_days: i64,
    #[arg(long, default_value_t = 5)]
    hotspots: usize,
    /// Offset from UTC, in minutes, used to assign issues to calendar days
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    utc_offset_minutes: i32,
}

impl AggregationArgs {
    fn aggregator(&self) -> anyhow::Result<InsightsAggregator> {
        let utc_offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .context("utc offset must be within +/-24 hours")?;

        Ok(InsightsAggregator::new(InsightsOptions {
            window_days: self.window_days,
            recent_days: self.recent_days,
            hotspot_limit: self.hotspots,
            utc_offset,
        }))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Where issue records come from for one command.
enum IssueSource {
    Snapshot(PathBuf),
    Store(PgPool),
}

impl IssueSource {
    async fn open(cli: &Cli, args: &SourceArgs) -> anyhow::Result<Self> {
        match &args.snapshot {
            Some(path) => Ok(IssueSource::Snapshot(path.clone())),
            None => Ok(IssueSource::Store(connect(cli).await?)),
        }
    }

    async fn load(&self, kind: Option<&str>) -> anyhow::Result<Vec<IssueRecord>> {
        match self {
            IssueSource::Snapshot(path) => {
                let mut issues = snapshot::load(path)?;
                if let Some(kind) = kind {
                    issues.retain(|issue| issue.kind.as_deref() == Some(kind));
                }
                Ok(issues)
            }
            IssueSource::Store(pool) => db::fetch_issues(pool, kind).await,
        }
    }
}

async fn connect(cli: &Cli) -> anyhow::Result<PgPool> {
    let database_url = cli
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to reach the issue store")?;

    PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_summary(summary: &InsightsSummary, format: OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", report::render_json(summary)?);
        return Ok(());
    }

    println!("Total issues: {}", summary.total_issues);
    for (kind, count) in report::ranked_types(summary) {
        println!("- {kind}: {count}");
    }

    match summary.resolution_stats {
        Some(stats) => println!(
            "Resolution time: avg {:.1} days (min {:.1}, max {:.1})",
            stats.average, stats.min, stats.max
        ),
        None => println!("Resolution time: unavailable"),
    }

    if summary.hotspots.is_empty() {
        println!("No hotspots.");
    } else {
        println!("Hotspots:");
        for hotspot in &summary.hotspots {
            println!("- {} ({} issues)", hotspot.location, hotspot.count);
        }
    }

    println!(
        "Trend: {} across {} active days",
        summary.trend.as_str(),
        summary.daily_counts.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_window_beyond_range() {
        let parsed = Cli::try_parse_from([
            "civic-insights",
            "insights",
            "--window-days",
            "1000000000000",
        ]);

        assert!(parsed.is_err());
    }

    #[test]
    fn accepts_default_aggregation_settings() {
        let cli = Cli::try_parse_from(["civic-insights", "insights", "--snapshot", "issues.json"])
            .unwrap();

        let Commands::Insights { aggregation, .. } = cli.command else {
            panic!("expected insights command");
        };
        assert_eq!(aggregation.window_days, 30);
        assert_eq!(aggregation.recent_days, 7);
        assert!(aggregation.aggregator().is_ok());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match &cli.command {
        Commands::InitDb => {
            let pool = connect(&cli).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&cli).await?;
            db::seed(&pool, Utc::now()).await?;
            println!("Seed issues inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&cli).await?;
            let inserted = db::import_csv(&pool, csv).await?;
            println!("Inserted {inserted} issues from {}.", csv.display());
        }
        Commands::AddIssue {
            kind,
            description,
            location,
        } => {
            let pool = connect(&cli).await?;
            let issue = NewIssue {
                kind: kind.clone(),
                description: description.clone(),
                location: location.clone(),
            };
            let id = db::insert_issue(&pool, &issue, Utc::now()).await?;
            info!(%id, kind = %issue.kind, "issue reported");
            println!("Issue {id} recorded as pending.");
        }
        Commands::SetStatus { id, status } => {
            let pool = connect(&cli).await?;
            if db::update_status(&pool, id, status, Utc::now()).await? {
                println!("Issue {id} is now {status}.");
            } else {
                anyhow::bail!("no issue with id {id}");
            }
        }
        Commands::Insights {
            source,
            aggregation,
            format,
        } => {
            let aggregator = aggregation.aggregator()?;
            let issues = IssueSource::open(&cli, source)
                .await?
                .load(source.kind.as_deref())
                .await?;
            let summary = aggregator.summarize(&issues, Utc::now());
            debug!(total = summary.total_issues, "insights computed");
            print_summary(&summary, *format)?;
        }
        Commands::Report {
            source,
            aggregation,
            out,
        } => {
            let aggregator = aggregation.aggregator()?;
            let issues = IssueSource::open(&cli, source)
                .await?
                .load(source.kind.as_deref())
                .await?;
            let now = Utc::now();
            let summary = aggregator.summarize(&issues, now);
            let sentiments = sentiment::analyze_sentiment(&issues);
            let report = report::build_report(
                source.kind.as_deref(),
                now,
                &summary,
                &sentiment::sentiment_breakdown(&sentiments),
            );
            write_report(out, &report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Sentiment { source } => {
            let issues = IssueSource::open(&cli, source)
                .await?
                .load(source.kind.as_deref())
                .await?;
            let sentiments = sentiment::analyze_sentiment(&issues);
            let breakdown = sentiment::sentiment_breakdown(&sentiments);

            for entry in &sentiments {
                println!(
                    "- {} {} ({:+})",
                    entry.id,
                    entry.sentiment.as_str(),
                    entry.score
                );
            }
            println!(
                "{} positive, {} negative, {} neutral",
                breakdown.positive, breakdown.negative, breakdown.neutral
            );
        }
        Commands::Watch {
            source,
            aggregation,
            every_secs,
        } => {
            let aggregator = aggregation.aggregator()?;
            let issue_source = IssueSource::open(&cli, source).await?;
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs((*every_secs).max(1)));
            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            info!(every_secs, "watching issue insights");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match issue_source.load(source.kind.as_deref()).await {
                            Ok(issues) => {
                                let summary = aggregator.summarize(&issues, Utc::now());
                                print_summary(&summary, OutputFormat::Text)?;
                                println!();
                            }
                            Err(err) => {
                                warn!(error = %err, "failed to load issues, retrying next tick");
                            }
                        }
                    }
                    _ = &mut shutdown => {
                        info!("stopping watch");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn write_report(out: &Path, report: &str) -> anyhow::Result<()> {
    std::fs::write(out, report).with_context(|| format!("failed to write {}", out.display()))
}

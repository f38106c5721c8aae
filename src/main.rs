use anyhow::{Context, Result};
use tracing::{info, warn};

use trinkets::riot::{RiotClient, RiotConfig};
use trinkets::store::{self, Db};
use trinkets::util::env as env_util;

#[tokio::main]
async fn main() -> Result<()> {
    env_util::init_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    // Startup is the only place allowed to fail the whole run.
    env_util::preflight_check(
        "trinkets ingest",
        &["RIOT_API_KEY"],
        &[
            "RIOT_REGION",
            "RIOT_CONCURRENCY",
            "RIOT_MATCH_COUNT",
            "SUPABASE_DB_URL",
            "DATABASE_URL",
            "ROSTER",
        ],
    )?;
    let db_url = env_util::db_url()?;
    let db = Db::connect(&db_url, env_util::env_parse("DB_MAX_CONNECTIONS", 5))
        .await
        .context("connecting to store")?;
    let client = RiotClient::new(RiotConfig::from_env()?)?;

    // ROSTER env overrides the players table for one-off runs.
    let roster: Vec<String> = match env_util::env_opt("ROSTER") {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => store::roster_nicknames(&db)
            .await
            .context("loading roster from players table")?,
    };
    if roster.is_empty() {
        warn!("roster is empty; nothing to do");
        return Ok(());
    }
    info!(players = roster.len(), "starting ingest");

    let summary = trinkets::run_ingest(&db, &client, &roster).await?;
    info!(
        players_resolved = summary.players_resolved,
        players_skipped = summary.players_skipped,
        ids_total = summary.ids_total,
        ids_unique = summary.ids_unique,
        ids_new = summary.ids_new,
        matches_flattened = summary.matches_flattened,
        matches_skipped = summary.matches_skipped,
        rows_inserted = summary.rows_inserted,
        rows_failed = summary.rows_failed,
        "done"
    );
    Ok(())
}

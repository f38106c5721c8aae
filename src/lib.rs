#![recursion_limit = "256"]

pub mod orchestrator;
pub mod report;
pub mod riot;
pub mod store;

pub mod util {
    pub mod env;
}

use anyhow::Result;
use tracing::{info, warn};

use riot::{PlayerHandle, RiotClient};
use store::Db;

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub players_resolved: usize,
    pub players_skipped: usize,
    pub ids_total: usize,
    pub ids_unique: usize,
    pub ids_new: usize,
    pub matches_flattened: usize,
    pub matches_skipped: usize,
    pub rows_inserted: usize,
    pub rows_failed: usize,
}

/// End-to-end ingest for a roster of account entries: resolve each entry to a
/// puuid (`name#tag` handles via the account endpoint, anything else via the
/// legacy summoner-id endpoint), fetch and flatten every new match, and insert
/// the rows. Unresolvable entries are skipped; only store/reservation failures
/// abort the run.
pub async fn run_ingest(db: &Db, client: &RiotClient, roster: &[String]) -> Result<IngestSummary> {
    let mut summary = IngestSummary::default();

    let mut puuids: Vec<String> = Vec::new();
    for entry in roster {
        let resolved = match PlayerHandle::parse(entry) {
            Some(handle) => client.resolve_puuid(&handle).await,
            None => client
                .resolve_puuid_by_summoner_id(entry.trim())
                .await
                .map(Some),
        };
        match resolved {
            Ok(Some(puuid)) => {
                summary.players_resolved += 1;
                puuids.push(puuid);
            }
            Ok(None) => {
                summary.players_skipped += 1;
                warn!(entry = %entry, "no puuid for roster entry; skipping player");
            }
            Err(err) => {
                summary.players_skipped += 1;
                warn!(entry = %entry, error = %err, "puuid resolution failed; skipping player");
            }
        }
    }

    if puuids.is_empty() {
        warn!("no roster entries resolved; nothing to ingest");
        return Ok(summary);
    }

    let report = orchestrator::fetch_all(client, db, &puuids).await?;
    summary.ids_total = report.ids_total;
    summary.ids_unique = report.ids_unique;
    summary.ids_new = report.ids_new;
    summary.matches_flattened = report.matches_flattened;
    summary.matches_skipped = report.matches_skipped;

    let outcome = store::upsert::upsert_rows(db, store::GAME_TABLE, &report.rows).await?;
    summary.rows_inserted = outcome.inserted;
    summary.rows_failed = outcome.failed;

    info!(
        players_resolved = summary.players_resolved,
        players_skipped = summary.players_skipped,
        matches = summary.matches_flattened,
        rows_inserted = summary.rows_inserted,
        rows_failed = summary.rows_failed,
        "ingest pipeline finished"
    );
    Ok(summary)
}

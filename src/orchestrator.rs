//! Concurrent match-detail fetch: one discovery pass per player, union +
//! dedupe, then a bounded worker pool pulling match payloads and flattening
//! them as they complete. Individual failures never abort the batch.

use std::time::Instant;

use anyhow::Result;
use futures::{stream, StreamExt};
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::riot::flatten::flatten;
use crate::riot::{MatchPayload, ParticipantRow, RiotClient};
use crate::store::{self, Db};

fn truncate_for_log(mut s: String, max_len: usize) -> String {
    if s.len() > max_len {
        s.truncate(max_len);
        s.push('…');
    }
    s
}

#[derive(Debug, Default)]
pub struct FetchReport {
    pub ids_total: usize,
    pub ids_unique: usize,
    pub ids_new: usize,
    pub matches_flattened: usize,
    pub matches_skipped: usize,
    /// Rows whose perk block was absent/malformed (sentinel columns written).
    pub defaulted_perks: usize,
    /// Rows whose riot tag was missing from the payload.
    pub defaulted_tags: usize,
    /// Rows with no lane opponent in the payload.
    pub missing_opponents: usize,
    pub rows: Vec<ParticipantRow>,
}

/// Set-semantics dedupe preserving first-seen order.
pub fn dedupe_ids(ids: Vec<String>) -> Vec<String> {
    ids.into_iter().unique().collect()
}

/// Convert `time_played` from the milliseconds produced by the flattener to
/// the minutes the store carries. No-op on an empty batch.
pub fn finalize_rows(rows: &mut [ParticipantRow]) {
    for row in rows {
        row.time_played /= 60_000.0;
    }
}

/// Fetch and flatten every new match played by the given puuids.
pub async fn fetch_all(client: &RiotClient, db: &Db, puuids: &[String]) -> Result<FetchReport> {
    let cfg = client.config();

    let mut ids: Vec<String> = Vec::new();
    for puuid in puuids {
        match client
            .list_match_ids(puuid, cfg.match_start, cfg.match_count)
            .await
        {
            Ok(page) => ids.extend(page),
            // One player's listing failure must not sink the batch.
            Err(err) => {
                warn!(puuid = %puuid, error = %err, "match listing failed; treating as no matches")
            }
        }
    }

    let mut report = FetchReport {
        ids_total: ids.len(),
        ..FetchReport::default()
    };
    let unique = dedupe_ids(ids);
    report.ids_unique = unique.len();
    info!(
        total = report.ids_total,
        unique = report.ids_unique,
        "collected match ids"
    );

    let known = match store::known_match_ids(db, store::GAME_TABLE, &unique).await {
        Ok(known) => known,
        Err(err) => {
            warn!(error = format!("{err:#}"), "known-match lookup failed; refetching all");
            Default::default()
        }
    };
    let fresh: Vec<String> = unique
        .into_iter()
        .filter(|id| !known.contains(id))
        .collect();
    report.ids_new = fresh.len();
    if fresh.is_empty() {
        info!("no new matches");
        return Ok(report);
    }
    info!(new = report.ids_new, already_stored = known.len(), "fetching match details");

    let mut results = stream::iter(fresh.iter().map(|id| async move {
        let started = Instant::now();
        let res = client.fetch_match(id).await;
        (id.as_str(), started.elapsed(), res)
    }))
    .buffer_unordered(cfg.concurrency);

    // Completion order, not submission order: row output order is
    // non-deterministic and downstream must only rely on index assignment.
    while let Some((match_id, elapsed, res)) = results.next().await {
        let value = match res {
            Ok(value) => value,
            Err(err) => {
                report.matches_skipped += 1;
                warn!(match_id, error = %err, "match fetch failed; skipping");
                continue;
            }
        };
        let payload = match serde_json::from_value::<MatchPayload>(value.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                report.matches_skipped += 1;
                warn!(
                    match_id,
                    error = %err,
                    body = truncate_for_log(value.to_string(), 2000),
                    "malformed match payload; skipping"
                );
                continue;
            }
        };
        match flatten(&payload) {
            Ok(pairs) => {
                report.matches_flattened += 1;
                debug!(
                    match_id,
                    rows = pairs.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "match flattened"
                );
                for (row, presence) in pairs {
                    if !presence.perks {
                        report.defaulted_perks += 1;
                    }
                    if !presence.riot_tag {
                        report.defaulted_tags += 1;
                    }
                    if !presence.opponent {
                        report.missing_opponents += 1;
                    }
                    report.rows.push(row);
                }
            }
            Err(err) => {
                report.matches_skipped += 1;
                warn!(match_id, error = %err, "payload failed invariants; skipping match");
            }
        }
    }

    finalize_rows(&mut report.rows);
    info!(
        matches = report.matches_flattened,
        skipped = report.matches_skipped,
        rows = report.rows.len(),
        defaulted_perks = report.defaulted_perks,
        defaulted_tags = report.defaulted_tags,
        missing_opponents = report.missing_opponents,
        "fetch stage complete"
    );
    Ok(report)
}

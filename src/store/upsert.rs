//! Insert-only persistence of flattened rows. "Upsert" by project convention:
//! there is no conflict handling, dedupe happens before the fetch stage.

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use sqlx::QueryBuilder;
use tracing::{error, info};

use super::{reserve_indices, Db};
use crate::riot::ParticipantRow;

#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub attempted: usize,
    pub inserted: usize,
    pub failed: usize,
    pub first_index: i64,
    pub last_index: i64,
}

/// Epoch milliseconds to ISO-8601 text with a trailing `Z`, millisecond
/// precision (the store's timestamp format).
pub fn epoch_ms_to_iso(ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Inverse of `epoch_ms_to_iso`.
pub fn iso_to_epoch_ms(iso: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Indices for a batch of `n` rows continuing after `start`: contiguous,
/// strictly increasing, in insertion order.
pub fn assigned_indices(start: i64, n: usize) -> Vec<i64> {
    (1..=n as i64).map(|i| start + i).collect()
}

const COLUMNS: &str = "match_id, participants, game_creation, game_start_timestamp, \
    game_end_timestamp, game_version, queue_id, game_mode, platform_id, puuid, riot_id, \
    riot_tag, time_played, side, win, team_position, lane, champion, kills, deaths, assists, \
    summoner1_id, summoner2_id, gold_earned, total_minions_killed, \
    total_neutral_minions_killed, total_ally_jungle_minions_killed, \
    total_enemy_jungle_minions_killed, early_surrender, surrender, first_blood, \
    first_blood_assist, first_tower, first_tower_assist, damage_dealt_to_buildings, \
    turret_kills, turrets_lost, damage_dealt_to_objectives, \"dragonKills\", \
    objectives_stolen, longest_time_spent_living, largest_killing_spree, \
    total_damage_dealt_champions, total_damage_taken, total_damage_self_mitigated, \
    total_damage_shielded_teammates, total_heals_teammates, total_time_crowd_controlled, \
    total_time_spent_dead, vision_score, wards_killed, wards_placed, control_wards_placed, \
    item0, item1, item2, item3, item4, item5, item6, perk_keystone, perk_primary_row_1, \
    perk_primary_row_2, perk_primary_row_3, perk_secondary_row_1, perk_secondary_row_2, \
    perk_primary_style, perk_secondary_style, perk_shard_defense, perk_shard_flex, \
    perk_shard_offense, opp_champion, \"index\"";

async fn insert_row(db: &Db, table: &str, index: i64, row: &ParticipantRow) -> Result<()> {
    let game_creation = epoch_ms_to_iso(row.game_creation)
        .ok_or_else(|| anyhow!("game_creation {} out of range", row.game_creation))?;
    let game_start = epoch_ms_to_iso(row.game_start_timestamp)
        .ok_or_else(|| anyhow!("game_start_timestamp {} out of range", row.game_start_timestamp))?;
    let game_end = epoch_ms_to_iso(row.game_end_timestamp)
        .ok_or_else(|| anyhow!("game_end_timestamp {} out of range", row.game_end_timestamp))?;

    let mut qb = QueryBuilder::new(format!("INSERT INTO {table} ({COLUMNS}) VALUES ("));
    {
        let mut vals = qb.separated(", ");
        vals.push_bind(&row.match_id);
        vals.push_bind(sqlx::types::Json(&row.participants));
        vals.push_bind(game_creation);
        vals.push_bind(game_start);
        vals.push_bind(game_end);
        vals.push_bind(&row.game_version);
        vals.push_bind(row.queue_id);
        vals.push_bind(&row.game_mode);
        vals.push_bind(&row.platform_id);
        vals.push_bind(&row.puuid);
        vals.push_bind(&row.riot_id);
        vals.push_bind(&row.riot_tag);
        vals.push_bind(row.time_played);
        vals.push_bind(&row.side);
        vals.push_bind(row.win);
        vals.push_bind(&row.team_position);
        vals.push_bind(&row.lane);
        vals.push_bind(&row.champion);
        vals.push_bind(row.kills);
        vals.push_bind(row.deaths);
        vals.push_bind(row.assists);
        vals.push_bind(row.summoner1_id);
        vals.push_bind(row.summoner2_id);
        vals.push_bind(row.gold_earned);
        vals.push_bind(row.total_minions_killed);
        vals.push_bind(row.total_neutral_minions_killed);
        vals.push_bind(row.total_ally_jungle_minions_killed);
        vals.push_bind(row.total_enemy_jungle_minions_killed);
        vals.push_bind(row.early_surrender);
        vals.push_bind(row.surrender);
        vals.push_bind(row.first_blood);
        vals.push_bind(row.first_blood_assist);
        vals.push_bind(row.first_tower);
        vals.push_bind(row.first_tower_assist);
        vals.push_bind(row.damage_dealt_to_buildings);
        vals.push_bind(row.turret_kills);
        vals.push_bind(row.turrets_lost);
        vals.push_bind(row.damage_dealt_to_objectives);
        vals.push_bind(row.dragon_kills);
        vals.push_bind(row.objectives_stolen);
        vals.push_bind(row.longest_time_spent_living);
        vals.push_bind(row.largest_killing_spree);
        vals.push_bind(row.total_damage_dealt_champions);
        vals.push_bind(row.total_damage_taken);
        vals.push_bind(row.total_damage_self_mitigated);
        vals.push_bind(row.total_damage_shielded_teammates);
        vals.push_bind(row.total_heals_teammates);
        vals.push_bind(row.total_time_crowd_controlled);
        vals.push_bind(row.total_time_spent_dead);
        vals.push_bind(row.vision_score);
        vals.push_bind(row.wards_killed);
        vals.push_bind(row.wards_placed);
        vals.push_bind(row.control_wards_placed);
        vals.push_bind(row.item0);
        vals.push_bind(row.item1);
        vals.push_bind(row.item2);
        vals.push_bind(row.item3);
        vals.push_bind(row.item4);
        vals.push_bind(row.item5);
        vals.push_bind(row.item6);
        vals.push_bind(&row.perk_keystone);
        vals.push_bind(&row.perk_primary_row_1);
        vals.push_bind(&row.perk_primary_row_2);
        vals.push_bind(&row.perk_primary_row_3);
        vals.push_bind(&row.perk_secondary_row_1);
        vals.push_bind(&row.perk_secondary_row_2);
        vals.push_bind(&row.perk_primary_style);
        vals.push_bind(&row.perk_secondary_style);
        vals.push_bind(&row.perk_shard_defense);
        vals.push_bind(&row.perk_shard_flex);
        vals.push_bind(&row.perk_shard_offense);
        vals.push_bind(&row.opp_champion);
        vals.push_bind(index);
    }
    qb.push(")");
    qb.build().persistent(false).execute(&db.pool).await?;
    Ok(())
}

/// Reserve an index block and insert the rows one at a time. A failed insert
/// is logged and skipped; the rest of the batch still goes through. No
/// transaction spans the batch (at-least-once semantics).
pub async fn upsert_rows(db: &Db, table: &str, rows: &[ParticipantRow]) -> Result<UpsertOutcome> {
    if rows.is_empty() {
        info!(table, "no rows to insert");
        return Ok(UpsertOutcome::default());
    }

    let start = reserve_indices(db, table, rows.len() as i64).await?;
    let indices = assigned_indices(start, rows.len());

    let mut outcome = UpsertOutcome {
        attempted: rows.len(),
        first_index: indices[0],
        last_index: *indices.last().expect("non-empty batch"),
        ..UpsertOutcome::default()
    };
    for (row, index) in rows.iter().zip(&indices) {
        match insert_row(db, table, *index, row).await {
            Ok(()) => outcome.inserted += 1,
            Err(err) => {
                outcome.failed += 1;
                error!(
                    table,
                    index,
                    match_id = %row.match_id,
                    error = format!("{err:#}"),
                    "row insert failed; continuing"
                );
            }
        }
    }
    info!(
        table,
        inserted = outcome.inserted,
        failed = outcome.failed,
        first_index = outcome.first_index,
        last_index = outcome.last_index,
        "upsert complete"
    );
    Ok(outcome)
}

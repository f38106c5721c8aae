//! Supabase Postgres access: connection handling, roster/read queries, and
//! the index-reservation counter used by the upsert path.

pub mod upsert;

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::report::GameRecord;

/// Flattened match-participant rows.
pub const GAME_TABLE: &str = "game_player";
/// Roster of tracked accounts.
pub const PLAYERS_TABLE: &str = "players";

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;
        if database_url.contains("sslmode=require") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }
        // PgBouncer txn mode safe
        connect_options = connect_options.statement_cache_capacity(0);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await?;
        info!("connected to db");
        Ok(Self { pool })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RosterPlayer {
    pub player_nickname: String,
    pub main_puuid: Option<String>,
    pub current_team: Option<String>,
}

/// Every tracked nickname, for the ingest roster.
pub async fn roster_nicknames(db: &Db) -> Result<Vec<String>> {
    let names: Vec<String> =
        sqlx::query_scalar(&format!("SELECT player_nickname FROM {PLAYERS_TABLE}"))
            .persistent(false)
            .fetch_all(&db.pool)
            .await?;
    Ok(names)
}

/// Active roster of one team (dashboard read path).
pub async fn players_for_team(db: &Db, team: &str) -> Result<Vec<RosterPlayer>> {
    let players: Vec<RosterPlayer> = sqlx::query_as(&format!(
        "SELECT player_nickname, main_puuid, current_team FROM {PLAYERS_TABLE} \
         WHERE current_team = $1"
    ))
    .persistent(false)
    .bind(team)
    .fetch_all(&db.pool)
    .await?;
    Ok(players)
}

/// Stored games for a set of puuids, projected down to what the win-rate
/// tables need (dashboard read path).
pub async fn game_records_for_puuids(db: &Db, puuids: &[String]) -> Result<Vec<GameRecord>> {
    let records: Vec<GameRecord> = sqlx::query_as(&format!(
        "SELECT puuid, team_position, champion, win FROM {GAME_TABLE} WHERE puuid = ANY($1)"
    ))
    .persistent(false)
    .bind(puuids)
    .fetch_all(&db.pool)
    .await?;
    Ok(records)
}

/// Match ids from `ids` that the store already holds; used to skip refetching
/// matches ingested by a previous run.
pub async fn known_match_ids(db: &Db, table: &str, ids: &[String]) -> Result<HashSet<String>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let known: Vec<String> = sqlx::query_scalar(&format!(
        "SELECT DISTINCT match_id FROM {table} WHERE match_id = ANY($1)"
    ))
    .persistent(false)
    .bind(ids)
    .fetch_all(&db.pool)
    .await?;
    Ok(known.into_iter().collect())
}

/// Current maximum assigned row index (0 when the table is empty).
pub async fn max_row_index(db: &Db, table: &str) -> Result<i64> {
    let max: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(MAX(\"index\"), 0) FROM {table}"
    ))
    .persistent(false)
    .fetch_one(&db.pool)
    .await?;
    Ok(max)
}

/// Atomically reserve a block of `n` row indices for `table`, returning the
/// value the block starts after (rows get `start+1 ..= start+n`).
///
/// The counter row is seeded from the table's current max index on first use;
/// afterwards a single `UPDATE … RETURNING` hands out blocks, so two
/// concurrent ingest runs can never assign colliding indices.
pub async fn reserve_indices(db: &Db, table: &str, n: i64) -> Result<i64> {
    sqlx::query(&format!(
        "INSERT INTO ingest_counters (table_name, next_index) \
         SELECT $1, COALESCE(MAX(\"index\"), 0) FROM {table} \
         ON CONFLICT (table_name) DO NOTHING"
    ))
    .persistent(false)
    .bind(table)
    .execute(&db.pool)
    .await?;

    let start: i64 = sqlx::query_scalar(
        "UPDATE ingest_counters SET next_index = next_index + $2 \
         WHERE table_name = $1 RETURNING next_index - $2",
    )
    .persistent(false)
    .bind(table)
    .bind(n)
    .fetch_one(&db.pool)
    .await?;
    Ok(start)
}

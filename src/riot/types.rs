use serde::Deserialize;
use serde_json::Value;

/// Match-v5 payload as returned by `GET /lol/match/v5/matches/{matchId}`.
///
/// `metadata.participants[i]` is the puuid of `info.participants[i]` (the API
/// keeps the two arrays parallel). Only the fields the flattener consumes are
/// modeled; everything else is ignored at decode time.
#[derive(Debug, Clone, Deserialize)]
pub struct MatchPayload {
    pub metadata: MatchMetadata,
    pub info: MatchInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchMetadata {
    pub match_id: String,
    pub participants: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchInfo {
    pub game_creation: i64,
    pub game_start_timestamp: i64,
    pub game_end_timestamp: i64,
    pub game_mode: String,
    pub game_version: String,
    pub platform_id: String,
    pub queue_id: i64,
    pub participants: Vec<ParticipantPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPayload {
    pub puuid: String,
    pub summoner_name: String,
    /// Missing on older payloads (schema drift); defaults to empty downstream.
    #[serde(default)]
    pub riot_id_tagline: Option<String>,
    pub team_id: i64,
    pub win: bool,
    pub team_position: String,
    pub lane: String,
    pub champion_name: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub summoner1_id: i64,
    pub summoner2_id: i64,
    pub game_ended_in_early_surrender: bool,
    pub game_ended_in_surrender: bool,
    pub first_blood_kill: bool,
    pub first_blood_assist: bool,
    pub first_tower_kill: bool,
    pub first_tower_assist: bool,
    pub dragon_kills: i64,
    pub damage_dealt_to_buildings: i64,
    pub damage_dealt_to_objectives: i64,
    pub damage_self_mitigated: i64,
    pub gold_earned: i64,
    pub largest_killing_spree: i64,
    pub longest_time_spent_living: i64,
    pub objectives_stolen: i64,
    pub total_minions_killed: i64,
    pub total_ally_jungle_minions_killed: i64,
    pub total_enemy_jungle_minions_killed: i64,
    pub total_damage_dealt_to_champions: i64,
    pub total_damage_shielded_on_teammates: i64,
    pub total_heals_on_teammates: i64,
    pub total_damage_taken: i64,
    #[serde(rename = "totalTimeCCDealt")]
    pub total_time_cc_dealt: i64,
    pub total_time_spent_dead: i64,
    pub turret_kills: i64,
    pub turrets_lost: i64,
    pub vision_score: i64,
    pub detector_wards_placed: i64,
    pub wards_killed: i64,
    pub wards_placed: i64,
    pub item0: i64,
    pub item1: i64,
    pub item2: i64,
    pub item3: i64,
    pub item4: i64,
    pub item5: i64,
    pub item6: i64,
    /// Kept loose: the perk block comes in several historical shapes and a
    /// malformed one must not reject the row. Decoded in `flatten::extract_perks`.
    #[serde(default)]
    pub perks: Option<Value>,
}

/// The modern shape of the perk block, decoded leniently out of the raw value.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perks {
    #[serde(default)]
    pub styles: Vec<PerkStyle>,
    pub stat_perks: StatPerks,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerkStyle {
    pub style: i64,
    #[serde(default)]
    pub selections: Vec<PerkSelection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerkSelection {
    pub perk: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatPerks {
    pub defense: i64,
    pub flex: i64,
    pub offense: i64,
}

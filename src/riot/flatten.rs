//! Flattens one nested match payload into one row per participant.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::types::{MatchPayload, ParticipantPayload, Perks};

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("metadata lists {metadata} participants but info carries {info}")]
    ParticipantMismatch { metadata: usize, info: usize },
    #[error("unmapped team id {0} (expected 100 or 200)")]
    UnknownTeamId(i64),
}

/// One flattened record per (match, participant) pair. Field names double as
/// the store's column names. `time_played` is in milliseconds when produced
/// here; the orchestrator converts it to minutes before the rows leave the
/// fetch stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantRow {
    pub match_id: String,
    pub participants: Vec<String>,
    pub game_creation: i64,
    pub game_start_timestamp: i64,
    pub game_end_timestamp: i64,
    pub game_version: String,
    pub queue_id: i64,
    pub game_mode: String,
    pub platform_id: String,
    pub puuid: String,
    pub riot_id: String,
    pub riot_tag: String,
    pub time_played: f64,
    pub side: String,
    pub win: bool,
    pub team_position: String,
    pub lane: String,
    pub champion: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub summoner1_id: i64,
    pub summoner2_id: i64,
    pub gold_earned: i64,
    pub total_minions_killed: i64,
    pub total_neutral_minions_killed: i64,
    pub total_ally_jungle_minions_killed: i64,
    pub total_enemy_jungle_minions_killed: i64,
    pub early_surrender: bool,
    pub surrender: bool,
    pub first_blood: bool,
    pub first_blood_assist: bool,
    pub first_tower: bool,
    pub first_tower_assist: bool,
    pub damage_dealt_to_buildings: i64,
    pub turret_kills: i64,
    pub turrets_lost: i64,
    pub damage_dealt_to_objectives: i64,
    pub dragon_kills: i64,
    pub objectives_stolen: i64,
    pub longest_time_spent_living: i64,
    pub largest_killing_spree: i64,
    pub total_damage_dealt_champions: i64,
    pub total_damage_taken: i64,
    pub total_damage_self_mitigated: i64,
    pub total_damage_shielded_teammates: i64,
    pub total_heals_teammates: i64,
    pub total_time_crowd_controlled: i64,
    pub total_time_spent_dead: i64,
    pub vision_score: i64,
    pub wards_killed: i64,
    pub wards_placed: i64,
    pub control_wards_placed: i64,
    pub item0: i64,
    pub item1: i64,
    pub item2: i64,
    pub item3: i64,
    pub item4: i64,
    pub item5: i64,
    pub item6: i64,
    pub perk_keystone: String,
    pub perk_primary_row_1: String,
    pub perk_primary_row_2: String,
    pub perk_primary_row_3: String,
    pub perk_secondary_row_1: String,
    pub perk_secondary_row_2: String,
    pub perk_primary_style: String,
    pub perk_secondary_style: String,
    pub perk_shard_defense: String,
    pub perk_shard_flex: String,
    pub perk_shard_offense: String,
    pub opp_champion: Option<String>,
}

/// Which tolerant fields of a row were actually present in the payload, so a
/// sentinel written to the store can be told apart from a real API value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPresence {
    pub perks: bool,
    pub riot_tag: bool,
    pub opponent: bool,
}

/// All eleven perk columns, already rendered to their text form.
struct PerkFields {
    keystone: String,
    primary_row_1: String,
    primary_row_2: String,
    primary_row_3: String,
    secondary_row_1: String,
    secondary_row_2: String,
    primary_style: String,
    secondary_style: String,
    shard_defense: String,
    shard_flex: String,
    shard_offense: String,
}

impl PerkFields {
    fn sentinel() -> Self {
        Self {
            keystone: String::new(),
            primary_row_1: String::new(),
            primary_row_2: String::new(),
            primary_row_3: String::new(),
            secondary_row_1: String::new(),
            secondary_row_2: String::new(),
            primary_style: String::new(),
            secondary_style: String::new(),
            shard_defense: String::new(),
            shard_flex: String::new(),
            shard_offense: String::new(),
        }
    }
}

/// Decode the perk block. Returns None (all columns fall back to the
/// empty-string sentinel) when the block is absent, malformed, or lacks the
/// expected style/selection arity.
fn extract_perks(raw: Option<&Value>) -> Option<PerkFields> {
    let perks: Perks = serde_json::from_value(raw?.clone()).ok()?;
    let primary = perks.styles.first()?;
    let secondary = perks.styles.get(1)?;
    if primary.selections.len() < 4 || secondary.selections.len() < 2 {
        return None;
    }
    Some(PerkFields {
        keystone: primary.selections[0].perk.to_string(),
        primary_row_1: primary.selections[1].perk.to_string(),
        primary_row_2: primary.selections[2].perk.to_string(),
        primary_row_3: primary.selections[3].perk.to_string(),
        secondary_row_1: secondary.selections[0].perk.to_string(),
        secondary_row_2: secondary.selections[1].perk.to_string(),
        primary_style: primary.style.to_string(),
        secondary_style: secondary.style.to_string(),
        shard_defense: perks.stat_perks.defense.to_string(),
        shard_flex: perks.stat_perks.flex.to_string(),
        shard_offense: perks.stat_perks.offense.to_string(),
    })
}

fn side_for_team(team_id: i64) -> Result<&'static str, FlattenError> {
    match team_id {
        100 => Ok("blue"),
        200 => Ok("red"),
        other => Err(FlattenError::UnknownTeamId(other)),
    }
}

/// The lane opponent: first participant on the same role, opposite team, with
/// a different champion. None when the payload has no such participant
/// (remakes, odd role assignments).
fn opponent_champion<'a>(
    all: &'a [ParticipantPayload],
    player: &ParticipantPayload,
) -> Option<&'a str> {
    all.iter()
        .find(|other| {
            other.team_id != player.team_id
                && other.team_position == player.team_position
                && other.champion_name != player.champion_name
        })
        .map(|other| other.champion_name.as_str())
}

/// One row per `metadata.participants` entry, in that array's order.
pub fn flatten(payload: &MatchPayload) -> Result<Vec<(ParticipantRow, FieldPresence)>, FlattenError> {
    let metadata = &payload.metadata;
    let info = &payload.info;
    if metadata.participants.len() != info.participants.len() {
        return Err(FlattenError::ParticipantMismatch {
            metadata: metadata.participants.len(),
            info: info.participants.len(),
        });
    }

    let time_played = (info.game_end_timestamp - info.game_start_timestamp) as f64;

    let mut rows = Vec::with_capacity(info.participants.len());
    for player in &info.participants {
        let side = side_for_team(player.team_id)?;
        let opp_champion = opponent_champion(&info.participants, player).map(str::to_string);
        let riot_tag = player.riot_id_tagline.clone();
        let perks = extract_perks(player.perks.as_ref());

        let presence = FieldPresence {
            perks: perks.is_some(),
            riot_tag: riot_tag.is_some(),
            opponent: opp_champion.is_some(),
        };
        let perks = perks.unwrap_or_else(PerkFields::sentinel);

        rows.push((
            ParticipantRow {
                match_id: metadata.match_id.clone(),
                participants: metadata.participants.clone(),
                game_creation: info.game_creation,
                game_start_timestamp: info.game_start_timestamp,
                game_end_timestamp: info.game_end_timestamp,
                game_version: info.game_version.clone(),
                queue_id: info.queue_id,
                game_mode: info.game_mode.clone(),
                platform_id: info.platform_id.clone(),
                puuid: player.puuid.clone(),
                riot_id: player.summoner_name.clone(),
                riot_tag: riot_tag.unwrap_or_default(),
                time_played,
                side: side.to_string(),
                win: player.win,
                team_position: player.team_position.clone(),
                lane: player.lane.clone(),
                champion: player.champion_name.clone(),
                kills: player.kills,
                deaths: player.deaths,
                assists: player.assists,
                summoner1_id: player.summoner1_id,
                summoner2_id: player.summoner2_id,
                gold_earned: player.gold_earned,
                total_minions_killed: player.total_minions_killed,
                total_neutral_minions_killed: player.total_ally_jungle_minions_killed
                    + player.total_enemy_jungle_minions_killed,
                total_ally_jungle_minions_killed: player.total_ally_jungle_minions_killed,
                total_enemy_jungle_minions_killed: player.total_enemy_jungle_minions_killed,
                early_surrender: player.game_ended_in_early_surrender,
                surrender: player.game_ended_in_surrender,
                first_blood: player.first_blood_kill,
                first_blood_assist: player.first_blood_assist,
                first_tower: player.first_tower_kill,
                first_tower_assist: player.first_tower_assist,
                damage_dealt_to_buildings: player.damage_dealt_to_buildings,
                turret_kills: player.turret_kills,
                turrets_lost: player.turrets_lost,
                damage_dealt_to_objectives: player.damage_dealt_to_objectives,
                dragon_kills: player.dragon_kills,
                objectives_stolen: player.objectives_stolen,
                longest_time_spent_living: player.longest_time_spent_living,
                largest_killing_spree: player.largest_killing_spree,
                total_damage_dealt_champions: player.total_damage_dealt_to_champions,
                total_damage_taken: player.total_damage_taken,
                total_damage_self_mitigated: player.damage_self_mitigated,
                total_damage_shielded_teammates: player.total_damage_shielded_on_teammates,
                total_heals_teammates: player.total_heals_on_teammates,
                total_time_crowd_controlled: player.total_time_cc_dealt,
                total_time_spent_dead: player.total_time_spent_dead,
                vision_score: player.vision_score,
                wards_killed: player.wards_killed,
                wards_placed: player.wards_placed,
                control_wards_placed: player.detector_wards_placed,
                item0: player.item0,
                item1: player.item1,
                item2: player.item2,
                item3: player.item3,
                item4: player.item4,
                item5: player.item5,
                item6: player.item6,
                perk_keystone: perks.keystone,
                perk_primary_row_1: perks.primary_row_1,
                perk_primary_row_2: perks.primary_row_2,
                perk_primary_row_3: perks.primary_row_3,
                perk_secondary_row_1: perks.secondary_row_1,
                perk_secondary_row_2: perks.secondary_row_2,
                perk_primary_style: perks.primary_style,
                perk_secondary_style: perks.secondary_style,
                perk_shard_defense: perks.shard_defense,
                perk_shard_flex: perks.shard_flex,
                perk_shard_offense: perks.shard_offense,
                opp_champion,
            },
            presence,
        ));
    }
    Ok(rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    const ROLES: [&str; 5] = ["TOP", "JUNGLE", "MIDDLE", "BOTTOM", "UTILITY"];

    pub(crate) fn participant(puuid: &str, team_id: i64, role: &str, champion: &str) -> Value {
        json!({
            "puuid": puuid,
            "summonerName": format!("name-{puuid}"),
            "riotIdTagline": "EUW",
            "teamId": team_id,
            "win": team_id == 100,
            "teamPosition": role,
            "lane": role,
            "championName": champion,
            "kills": 3, "deaths": 1, "assists": 7,
            "summoner1Id": 4, "summoner2Id": 14,
            "gameEndedInEarlySurrender": false,
            "gameEndedInSurrender": false,
            "firstBloodKill": false, "firstBloodAssist": false,
            "firstTowerKill": false, "firstTowerAssist": false,
            "dragonKills": 0,
            "damageDealtToBuildings": 2500,
            "damageDealtToObjectives": 4000,
            "damageSelfMitigated": 12000,
            "goldEarned": 11000,
            "largestKillingSpree": 3,
            "longestTimeSpentLiving": 600,
            "objectivesStolen": 0,
            "totalMinionsKilled": 180,
            "totalAllyJungleMinionsKilled": 8,
            "totalEnemyJungleMinionsKilled": 4,
            "totalDamageDealtToChampions": 18000,
            "totalDamageShieldedOnTeammates": 0,
            "totalHealsOnTeammates": 300,
            "totalDamageTaken": 21000,
            "totalTimeCCDealt": 240,
            "totalTimeSpentDead": 45,
            "turretKills": 1, "turretsLost": 4,
            "visionScore": 22,
            "detectorWardsPlaced": 5,
            "wardsKilled": 6, "wardsPlaced": 11,
            "item0": 3078, "item1": 3047, "item2": 6333,
            "item3": 3071, "item4": 0, "item5": 0, "item6": 3364,
            "perks": {
                "statPerks": {"defense": 5002, "flex": 5008, "offense": 5005},
                "styles": [
                    {"style": 8000, "selections": [
                        {"perk": 8005}, {"perk": 9111}, {"perk": 9104}, {"perk": 8014}
                    ]},
                    {"style": 8400, "selections": [{"perk": 8444}, {"perk": 8451}]}
                ]
            }
        })
    }

    pub(crate) fn sample_payload(match_id: &str) -> MatchPayload {
        let mut participants = Vec::new();
        let mut puuids = Vec::new();
        for (i, role) in ROLES.iter().enumerate() {
            let puuid = format!("{match_id}-blue-{i}");
            participants.push(participant(&puuid, 100, role, &format!("BlueChamp{i}")));
            puuids.push(puuid);
        }
        for (i, role) in ROLES.iter().enumerate() {
            let puuid = format!("{match_id}-red-{i}");
            participants.push(participant(&puuid, 200, role, &format!("RedChamp{i}")));
            puuids.push(puuid);
        }
        let value = json!({
            "metadata": {"matchId": match_id, "participants": puuids},
            "info": {
                "gameCreation": 1700000000000i64,
                "gameStartTimestamp": 1700000060000i64,
                "gameEndTimestamp": 1700001860000i64,
                "gameMode": "CLASSIC",
                "gameVersion": "14.1.556",
                "platformId": "EUW1",
                "queueId": 420,
                "participants": participants
            }
        });
        serde_json::from_value(value).expect("fixture payload decodes")
    }

    #[test]
    fn one_row_per_metadata_participant_in_order() {
        let payload = sample_payload("EUW1_100");
        let rows = flatten(&payload).unwrap();
        assert_eq!(rows.len(), payload.metadata.participants.len());
        for (i, (row, _)) in rows.iter().enumerate() {
            assert_eq!(row.puuid, payload.metadata.participants[i]);
            assert_eq!(row.match_id, "EUW1_100");
        }
    }

    #[test]
    fn two_matches_yield_twenty_rows() {
        let mut rows = Vec::new();
        for id in ["M1", "M2"] {
            rows.extend(flatten(&sample_payload(id)).unwrap());
        }
        assert_eq!(rows.len(), 20);
        assert!(rows
            .iter()
            .all(|(r, _)| r.match_id == "M1" || r.match_id == "M2"));
    }

    #[test]
    fn flatten_is_deterministic() {
        let payload = sample_payload("EUW1_101");
        let a = flatten(&payload).unwrap();
        let b = flatten(&payload).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn opponent_is_first_same_role_on_other_team() {
        let payload = sample_payload("EUW1_102");
        let rows = flatten(&payload).unwrap();
        // Blue TOP faces red TOP even though eight later participants fail the
        // role test (the scan must not reset an already-found opponent).
        let (top, presence) = &rows[0];
        assert_eq!(top.team_position, "TOP");
        assert_eq!(top.opp_champion.as_deref(), Some("RedChamp0"));
        assert!(presence.opponent);
    }

    #[test]
    fn missing_opponent_leaves_field_null() {
        let value = json!({
            "metadata": {"matchId": "EUW1_103", "participants": ["p1"]},
            "info": {
                "gameCreation": 0i64, "gameStartTimestamp": 0i64, "gameEndTimestamp": 60000i64,
                "gameMode": "CLASSIC", "gameVersion": "14.1", "platformId": "EUW1",
                "queueId": 420,
                "participants": [participant("p1", 100, "TOP", "Aatrox")]
            }
        });
        let payload: MatchPayload = serde_json::from_value(value).unwrap();
        let rows = flatten(&payload).unwrap();
        assert_eq!(rows[0].0.opp_champion, None);
        assert!(!rows[0].1.opponent);
    }

    #[test]
    fn missing_perks_produce_empty_sentinels() {
        let mut p = participant("p1", 100, "TOP", "Aatrox");
        p.as_object_mut().unwrap().remove("perks");
        let value = json!({
            "metadata": {"matchId": "EUW1_104", "participants": ["p1"]},
            "info": {
                "gameCreation": 0i64, "gameStartTimestamp": 0i64, "gameEndTimestamp": 60000i64,
                "gameMode": "CLASSIC", "gameVersion": "14.1", "platformId": "EUW1",
                "queueId": 420,
                "participants": [p]
            }
        });
        let payload: MatchPayload = serde_json::from_value(value).unwrap();
        let (row, presence) = flatten(&payload).unwrap().remove(0);
        let sentinels = [
            &row.perk_keystone,
            &row.perk_primary_row_1,
            &row.perk_primary_row_2,
            &row.perk_primary_row_3,
            &row.perk_secondary_row_1,
            &row.perk_secondary_row_2,
            &row.perk_primary_style,
            &row.perk_secondary_style,
            &row.perk_shard_defense,
            &row.perk_shard_flex,
            &row.perk_shard_offense,
        ];
        assert!(sentinels.iter().all(|s| s.is_empty()));
        assert!(!presence.perks);
    }

    #[test]
    fn malformed_perks_fall_back_to_sentinels() {
        let mut p = participant("p1", 100, "TOP", "Aatrox");
        p["perks"] = json!("not an object");
        let value = json!({
            "metadata": {"matchId": "EUW1_105", "participants": ["p1"]},
            "info": {
                "gameCreation": 0i64, "gameStartTimestamp": 0i64, "gameEndTimestamp": 60000i64,
                "gameMode": "CLASSIC", "gameVersion": "14.1", "platformId": "EUW1",
                "queueId": 420,
                "participants": [p]
            }
        });
        let payload: MatchPayload = serde_json::from_value(value).unwrap();
        let (row, presence) = flatten(&payload).unwrap().remove(0);
        assert!(row.perk_keystone.is_empty());
        assert!(!presence.perks);
    }

    #[test]
    fn missing_riot_tag_defaults_to_empty() {
        let mut p = participant("p1", 100, "TOP", "Aatrox");
        p.as_object_mut().unwrap().remove("riotIdTagline");
        let value = json!({
            "metadata": {"matchId": "EUW1_106", "participants": ["p1"]},
            "info": {
                "gameCreation": 0i64, "gameStartTimestamp": 0i64, "gameEndTimestamp": 60000i64,
                "gameMode": "CLASSIC", "gameVersion": "14.1", "platformId": "EUW1",
                "queueId": 420,
                "participants": [p]
            }
        });
        let payload: MatchPayload = serde_json::from_value(value).unwrap();
        let (row, presence) = flatten(&payload).unwrap().remove(0);
        assert_eq!(row.riot_tag, "");
        assert!(!presence.riot_tag);
    }

    #[test]
    fn unknown_team_id_is_rejected() {
        let p = participant("p1", 300, "TOP", "Aatrox");
        let value = json!({
            "metadata": {"matchId": "EUW1_107", "participants": ["p1"]},
            "info": {
                "gameCreation": 0i64, "gameStartTimestamp": 0i64, "gameEndTimestamp": 60000i64,
                "gameMode": "CLASSIC", "gameVersion": "14.1", "platformId": "EUW1",
                "queueId": 420,
                "participants": [p]
            }
        });
        let payload: MatchPayload = serde_json::from_value(value).unwrap();
        assert!(matches!(
            flatten(&payload),
            Err(FlattenError::UnknownTeamId(300))
        ));
    }

    #[test]
    fn neutral_minions_are_derived_from_jungle_counts() {
        let payload = sample_payload("EUW1_108");
        let rows = flatten(&payload).unwrap();
        assert_eq!(rows[0].0.total_neutral_minions_killed, 12);
    }
}

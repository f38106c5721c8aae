//! Win-rate aggregation behind the dashboard's per-player tables. Rendering
//! lives elsewhere; this is only the computation over stored rows.

use std::collections::BTreeMap;

use serde::Serialize;

/// Minimal projection of a stored row, as read back for reporting.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameRecord {
    pub puuid: String,
    pub team_position: String,
    pub champion: String,
    pub win: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChampionWinRate {
    pub champion: String,
    pub games: i64,
    /// Percentage, rounded to two decimals.
    pub win_rate: f64,
}

/// Per-champion win rate for one player on one role, most-played first
/// (champion name breaks ties so output is stable).
pub fn champion_win_rates(records: &[GameRecord], puuid: &str, role: &str) -> Vec<ChampionWinRate> {
    let mut by_champion: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for record in records {
        if record.puuid != puuid || record.team_position != role {
            continue;
        }
        let (wins, games) = by_champion.entry(record.champion.as_str()).or_default();
        if record.win {
            *wins += 1;
        }
        *games += 1;
    }

    let mut table: Vec<ChampionWinRate> = by_champion
        .into_iter()
        .map(|(champion, (wins, games))| ChampionWinRate {
            champion: champion.to_string(),
            games,
            win_rate: (wins as f64 / games as f64 * 10_000.0).round() / 100.0,
        })
        .collect();
    table.sort_by(|a, b| b.games.cmp(&a.games).then_with(|| a.champion.cmp(&b.champion)));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(puuid: &str, role: &str, champion: &str, win: bool) -> GameRecord {
        GameRecord {
            puuid: puuid.to_string(),
            team_position: role.to_string(),
            champion: champion.to_string(),
            win,
        }
    }

    #[test]
    fn aggregates_one_player_one_role() {
        let records = vec![
            record("P1", "TOP", "Aatrox", true),
            record("P1", "TOP", "Aatrox", false),
            record("P1", "TOP", "Gnar", true),
            // Other role and other player must not count.
            record("P1", "JUNGLE", "Vi", true),
            record("P2", "TOP", "Aatrox", true),
        ];
        let table = champion_win_rates(&records, "P1", "TOP");
        assert_eq!(
            table,
            vec![
                ChampionWinRate {
                    champion: "Aatrox".into(),
                    games: 2,
                    win_rate: 50.0
                },
                ChampionWinRate {
                    champion: "Gnar".into(),
                    games: 1,
                    win_rate: 100.0
                },
            ]
        );
    }

    #[test]
    fn win_rate_rounds_to_two_decimals() {
        let records = vec![
            record("P1", "MIDDLE", "Ahri", true),
            record("P1", "MIDDLE", "Ahri", false),
            record("P1", "MIDDLE", "Ahri", false),
        ];
        let table = champion_win_rates(&records, "P1", "MIDDLE");
        assert_eq!(table[0].win_rate, 33.33);
    }

    #[test]
    fn most_played_sorts_first() {
        let records = vec![
            record("P1", "BOTTOM", "Jinx", true),
            record("P1", "BOTTOM", "Ashe", false),
            record("P1", "BOTTOM", "Ashe", true),
        ];
        let table = champion_win_rates(&records, "P1", "BOTTOM");
        assert_eq!(table[0].champion, "Ashe");
        assert_eq!(table[1].champion, "Jinx");
    }

    #[test]
    fn empty_for_unknown_player() {
        assert!(champion_win_rates(&[], "P1", "TOP").is_empty());
    }
}

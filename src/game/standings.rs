//! Round result and final standing rankings

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::game::scoring::Guess;
use crate::game::PlayerId;

/// One player's outcome in a finalized round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultEntry {
    pub player_id: PlayerId,
    pub player_name: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[serde(rename = "distance")]
    pub distance_km: Option<f64>,
    pub score: u32,
    pub timed_out: bool,
}

impl RoundResultEntry {
    pub fn from_guess(player_id: PlayerId, player_name: String, guess: &Guess) -> Self {
        Self {
            player_id,
            player_name,
            lat: guess.lat,
            lng: guess.lng,
            distance_km: guess.distance_km,
            score: guess.score,
            timed_out: guess.timed_out,
        }
    }
}

/// A player's total at the end of a game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub total_score: u32,
}

/// Order round results by ascending distance, entries without one last
pub fn rank_round(mut entries: Vec<RoundResultEntry>) -> Vec<RoundResultEntry> {
    entries.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    entries
}

/// Order final scores by descending total
///
/// The sort is stable, so tied players keep their input (join) order.
pub fn final_standings(mut scores: Vec<FinalScore>) -> Vec<FinalScore> {
    scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(name: &str, distance: Option<f64>) -> RoundResultEntry {
        let guess = match distance {
            Some(d) => Guess {
                lat: Some(0.0),
                lng: Some(0.0),
                distance_km: Some(d),
                score: crate::game::scoring::score(d),
                timed_out: false,
            },
            None => Guess::timed_out(),
        };
        RoundResultEntry::from_guess(Uuid::new_v4(), name.to_string(), &guess)
    }

    fn total(name: &str, total_score: u32) -> FinalScore {
        FinalScore {
            player_id: Uuid::new_v4(),
            player_name: name.to_string(),
            total_score,
        }
    }

    #[test]
    fn test_rank_round_by_distance() {
        let ranked = rank_round(vec![
            entry("far", Some(900.0)),
            entry("near", Some(10.0)),
            entry("mid", Some(250.0)),
        ]);

        let names: Vec<_> = ranked.iter().map(|e| e.player_name.as_str()).collect();
        assert_eq!(names, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_timed_out_ranked_last() {
        let ranked = rank_round(vec![
            entry("late", None),
            entry("far", Some(5000.0)),
            entry("late2", None),
            entry("near", Some(1.0)),
        ]);

        assert_eq!(ranked[0].player_name, "near");
        assert_eq!(ranked[1].player_name, "far");
        assert!(ranked[2].timed_out);
        assert!(ranked[3].timed_out);
    }

    #[test]
    fn test_final_standings_descending() {
        let standings = final_standings(vec![total("a", 100), total("b", 9000), total("c", 4000)]);
        let names: Vec<_> = standings.iter().map(|s| s.player_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_final_standings_ties_are_stable() {
        let standings = final_standings(vec![total("first", 10), total("second", 10), total("top", 20)]);
        let names: Vec<_> = standings.iter().map(|s| s.player_name.as_str()).collect();
        assert_eq!(names, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_entry_wire_format() {
        let json = serde_json::to_value(entry("p", None)).unwrap();
        assert_eq!(json["timedOut"], true);
        assert!(json["distance"].is_null());
        assert!(json["lat"].is_null());
        assert_eq!(json["score"], 0);
        assert!(json.get("playerId").is_some());
    }
}

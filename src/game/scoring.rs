//! Distance and score calculation
//!
//! Every score in the game goes through [`score`], so a guess evaluated on
//! the server and one evaluated anywhere else with the same inputs agree.

use crate::game::constants::scoring::{DECAY_KM, EARTH_RADIUS_KM, MAX_SCORE};
use crate::game::location::Location;

/// Great-circle distance in kilometers between two points (haversine)
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    EARTH_RADIUS_KM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Score for a guess `distance_km` away from the answer
///
/// `round(5000 * e^(-d / 2000))`: 5000 at zero distance, decaying toward 0.
pub fn score(distance_km: f64) -> u32 {
    let distance = distance_km.max(0.0);
    let raw = f64::from(MAX_SCORE) * (-distance / DECAY_KM).exp();
    (raw.round() as u32).min(MAX_SCORE)
}

/// Whether a coordinate pair is a point on the map
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && lat.abs() <= 90.0 && lng.abs() <= 180.0
}

/// One player's evaluated submission for one round
#[derive(Debug, Clone, PartialEq)]
pub struct Guess {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// `None` when the player ran out of time
    pub distance_km: Option<f64>,
    pub score: u32,
    pub timed_out: bool,
}

impl Guess {
    /// Score a submitted point against the round's location
    pub fn evaluate(lat: f64, lng: f64, answer: &Location) -> Self {
        let distance = distance_km(lat, lng, answer.lat, answer.lng);
        Self {
            lat: Some(lat),
            lng: Some(lng),
            distance_km: Some(distance),
            score: score(distance),
            timed_out: false,
        }
    }

    /// Zero-score placeholder for a player who never submitted
    pub fn timed_out() -> Self {
        Self {
            lat: None,
            lng: None,
            distance_km: None,
            score: 0,
            timed_out: true,
        }
    }
}

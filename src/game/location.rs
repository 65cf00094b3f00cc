//! Location reference data
//!
//! Loaded once at startup from a JSON array and shared read-only by every
//! room. A game draws its locations from here without replacement.

use std::collections::HashSet;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::scoring::is_valid_coordinate;

/// How the location's image is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// 360° street-level imagery
    #[default]
    Panorama,
    /// Single flat photograph
    Static,
}

/// A guessable place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub image_id: String,
    #[serde(rename = "type", default)]
    pub kind: LocationKind,
    #[serde(default)]
    pub image_url: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(alias = "prefecture")]
    pub region: String,
    #[serde(default)]
    pub hint: String,
}

/// What players see while a round is open (no answer)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLocation {
    pub image_id: String,
    #[serde(rename = "type")]
    pub kind: LocationKind,
    pub image_url: Option<String>,
}

/// The answer, revealed with the round result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealedLocation {
    pub lat: f64,
    pub lng: f64,
    pub region: String,
    pub hint: String,
}

impl Location {
    pub fn public_view(&self) -> PublicLocation {
        PublicLocation {
            image_id: self.image_id.clone(),
            kind: self.kind,
            image_url: self.image_url.clone(),
        }
    }

    pub fn reveal(&self) -> RevealedLocation {
        RevealedLocation {
            lat: self.lat,
            lng: self.lng,
            region: self.region.clone(),
            hint: self.hint.clone(),
        }
    }
}

/// Immutable set of locations games are drawn from
#[derive(Debug, Clone)]
pub struct LocationCatalog {
    locations: Vec<Location>,
}

impl LocationCatalog {
    /// Build a catalog, rejecting unusable entries
    pub fn new(locations: Vec<Location>) -> Result<Self, LocationError> {
        if locations.is_empty() {
            return Err(LocationError::Empty);
        }

        let mut seen = HashSet::with_capacity(locations.len());
        for location in &locations {
            if !is_valid_coordinate(location.lat, location.lng) {
                return Err(LocationError::InvalidCoordinates(location.image_id.clone()));
            }
            if !seen.insert(location.image_id.as_str()) {
                return Err(LocationError::DuplicateImageId(location.image_id.clone()));
            }
        }

        Ok(Self { locations })
    }

    /// Parse a JSON array of locations
    pub fn from_json(json: &str) -> Result<Self, LocationError> {
        let locations: Vec<Location> = serde_json::from_str(json)?;
        Self::new(locations)
    }

    /// Load the catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LocationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!("Loaded {} locations from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Fail unless every game can draw `rounds` distinct locations
    pub fn ensure_rounds(&self, rounds: usize) -> Result<(), LocationError> {
        if self.locations.len() < rounds {
            return Err(LocationError::TooFew {
                have: self.locations.len(),
                need: rounds,
            });
        }
        Ok(())
    }

    pub fn get(&self, image_id: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.image_id == image_id)
    }

    /// Draw `count` distinct locations in random order
    ///
    /// Returns fewer than `count` only if the catalog is smaller.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<Location> {
        self.locations
            .choose_multiple(rng, count)
            .cloned()
            .collect()
    }
}

/// Location loading errors
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("Failed to read locations from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid locations JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Location catalog is empty")]
    Empty,
    #[error("Location {0} has invalid coordinates")]
    InvalidCoordinates(String),
    #[error("Duplicate location image id {0}")]
    DuplicateImageId(String),
    #[error("Catalog has {have} locations but a game needs {need}")]
    TooFew { have: usize, need: usize },
}

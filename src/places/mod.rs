pub mod repository;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Display name used when an account has no display name set.
pub const ANONYMOUS: &str = "匿名";

/// The two place classifications: somewhere we want to go, somewhere we went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceType {
    Heart,
    Paw,
}

impl PlaceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaceType::Heart => "heart",
            PlaceType::Paw => "paw",
        }
    }
}

impl FromStr for PlaceType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "heart" => Ok(PlaceType::Heart),
            "paw" => Ok(PlaceType::Paw),
            _ => Err(AppError::Validation("Invalid type".into())),
        }
    }
}

impl fmt::Display for PlaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields accepted by a place update. Everything else (id, user_id,
/// created_at, created_by) is immutable after creation.
pub const UPDATABLE_FIELDS: &[&str] = &["name", "note", "rating", "visited_at", "type", "category"];

/// Counts derived from a user's places.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaceStats {
    pub want_to_go: i64,
    pub visited: i64,
    pub completion_rate: f64,
}

impl PlaceStats {
    pub fn new(want_to_go: i64, visited: i64) -> Self {
        let total = want_to_go + visited;
        let completion_rate = if total > 0 {
            let rate = visited as f64 / total as f64 * 100.0;
            (rate * 10.0).round() / 10.0
        } else {
            0.0
        };
        Self {
            want_to_go,
            visited,
            completion_rate,
        }
    }
}

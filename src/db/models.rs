use serde::{Deserialize, Serialize};

use crate::places::PlaceType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Place {
    pub id: i64,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: PlaceType,
    pub name: Option<String>,
    pub note: Option<String>,
    pub rating: Option<f64>,
    pub category: String,
    pub photo_url: Option<String>,
    pub created_by: String,
    pub user_id: i64,
    pub created_at: String,
    pub visited_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: String,
}

//! JSON export/import of a user's places.
//!
//! The document format deliberately carries no ids and no owner fields, so a
//! backup can be re-imported into any account. Import deduplicates on the
//! (lat, lng, name) natural key scoped to the importing user.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::places::repository::find_by_natural_key;
use crate::places::PlaceType;
use crate::state::DbPool;

pub const BACKUP_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub exported_at: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub places: Vec<BackupPlace>,
}

/// One exported place. lat/lng/type/name are required on import; an entry
/// missing any of them fails the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupPlace {
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: PlaceType,
    pub name: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub visited_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ImportOutcome {
    pub imported: usize,
    pub total: usize,
}

/// Parse raw upload bytes into a backup document. Any malformed or
/// missing-field entry rejects the whole document.
pub fn parse_document(bytes: &[u8]) -> AppResult<BackupDocument> {
    serde_json::from_slice(bytes).map_err(|e| AppError::Import(e.to_string()))
}

/// Snapshot all of `owner_id`'s places into a backup document.
pub fn export(pool: &DbPool, owner_id: i64, user: Option<&str>) -> AppResult<BackupDocument> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT lat, lng, type, name, note, rating, created_at, visited_at
         FROM places WHERE user_id = ?1
         ORDER BY created_at DESC",
    )?;

    let places = stmt
        .query_map(params![owner_id], |row| {
            let kind: String = row.get(2)?;
            let kind = kind.parse::<PlaceType>().map_err(|_| {
                rusqlite::Error::FromSqlConversionFailure(
                    2,
                    rusqlite::types::Type::Text,
                    format!("invalid place type: {}", kind).into(),
                )
            })?;
            let name: Option<String> = row.get(3)?;
            Ok(BackupPlace {
                lat: row.get(0)?,
                lng: row.get(1)?,
                kind,
                name: name.unwrap_or_default(),
                note: row.get(4)?,
                rating: row.get(5)?,
                created_at: row.get(6)?,
                visited_at: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BackupDocument {
        version: Some(BACKUP_VERSION.to_string()),
        exported_at: Some(Utc::now().to_rfc3339()),
        user: user.map(str::to_string),
        places,
    })
}

/// Merge a backup document into `owner_id`'s places. Entries whose
/// (lat, lng, name) already exists for the owner are skipped; the rest are
/// inserted attributed to the importer. The whole merge runs in one
/// transaction, so a failed import applies nothing.
pub fn import(
    pool: &DbPool,
    owner_id: i64,
    created_by: &str,
    doc: &BackupDocument,
) -> AppResult<ImportOutcome> {
    let conn = pool.get()?;

    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: AppResult<usize> = (|| {
        let mut imported = 0;
        for place in &doc.places {
            if find_by_natural_key(&conn, owner_id, place.lat, place.lng, &place.name)?.is_some() {
                continue;
            }

            let created_at = place
                .created_at
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339());
            conn.execute(
                "INSERT INTO places (lat, lng, type, name, note, rating, created_by, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    place.lat,
                    place.lng,
                    place.kind.as_str(),
                    place.name,
                    place.note.clone().unwrap_or_default(),
                    place.rating.unwrap_or(0.0),
                    created_by,
                    owner_id,
                    created_at
                ],
            )?;
            imported += 1;
        }
        Ok(imported)
    })();

    match result {
        Ok(imported) => {
            conn.execute("COMMIT", [])?;
            Ok(ImportOutcome {
                imported,
                total: doc.places.len(),
            })
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

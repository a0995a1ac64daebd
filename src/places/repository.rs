//! SQLite-backed place storage. Every operation is scoped to the owning user;
//! ownership failures surface as `AppError::Forbidden` regardless of whether
//! the row exists, so callers cannot probe for foreign place ids.

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;

use crate::db::models::Place;
use crate::error::{AppError, AppResult};
use crate::places::{PlaceStats, PlaceType, UPDATABLE_FIELDS};
use crate::state::DbPool;

/// A validated new place. Construction is the only validation point for
/// coordinates and type.
#[derive(Debug, Clone)]
pub struct NewPlace {
    pub lat: f64,
    pub lng: f64,
    pub kind: PlaceType,
    pub name: String,
    pub note: String,
    pub rating: f64,
}

impl NewPlace {
    /// Coordinates must be present and non-zero (zero is treated as missing,
    /// matching the lenient clients this backend serves).
    pub fn validate(
        lat: Option<f64>,
        lng: Option<f64>,
        kind: Option<&str>,
        name: Option<String>,
        note: Option<String>,
        rating: Option<f64>,
    ) -> AppResult<Self> {
        let lat = lat.filter(|v| *v != 0.0);
        let lng = lng.filter(|v| *v != 0.0);
        let (lat, lng) = match (lat, lng) {
            (Some(lat), Some(lng)) => (lat, lng),
            _ => return Err(AppError::Validation("Missing coordinates".into())),
        };

        let kind = kind
            .ok_or_else(|| AppError::Validation("Invalid type".into()))?
            .parse::<PlaceType>()?;

        Ok(Self {
            lat,
            lng,
            kind,
            name: name.unwrap_or_default(),
            note: note.unwrap_or_default(),
            rating: rating.unwrap_or(0.0),
        })
    }
}

/// All places owned by `owner_id`, newest first. `fallback_author` fills a
/// missing created_by at presentation time only; nothing is written back.
pub fn list(pool: &DbPool, owner_id: i64, fallback_author: &str) -> AppResult<Vec<Place>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, lat, lng, type, name, note, rating, photo_url,
                created_by, user_id, created_at, visited_at,
                COALESCE(category, 'other')
         FROM places
         WHERE user_id = ?1
         ORDER BY created_at DESC",
    )?;

    let places = stmt
        .query_map(params![owner_id], |row| {
            let kind = parse_kind(row.get::<_, String>(3)?)?;
            let created_by: Option<String> = row.get(8)?;
            let created_at: Option<String> = row.get(10)?;
            Ok(Place {
                id: row.get(0)?,
                lat: row.get(1)?,
                lng: row.get(2)?,
                kind,
                name: row.get(4)?,
                note: row.get(5)?,
                rating: row.get(6)?,
                photo_url: row.get(7)?,
                created_by: created_by.unwrap_or_else(|| fallback_author.to_string()),
                user_id: row.get(9)?,
                created_at: created_at.unwrap_or_else(|| Utc::now().to_rfc3339()),
                visited_at: row.get(11)?,
                category: row.get(12)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(places)
}

/// Insert a place for `owner_id` and return its id. `created_by` is a
/// display-name snapshot taken at creation time.
pub fn create(pool: &DbPool, owner_id: i64, created_by: &str, place: &NewPlace) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO places (lat, lng, type, name, note, rating, created_by, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            place.lat,
            place.lng,
            place.kind.as_str(),
            place.name,
            place.note,
            place.rating,
            created_by,
            owner_id
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// The single ownership policy: Forbidden unless the place exists and belongs
/// to `owner_id`.
pub fn require_owner(conn: &Connection, place_id: i64, owner_id: i64) -> AppResult<()> {
    let owner: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM places WHERE id = ?1",
            params![place_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match owner {
        Some(id) if id == owner_id => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

pub fn exists(conn: &Connection, place_id: i64) -> AppResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM places WHERE id = ?1",
        params![place_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Partial update restricted to the allow-list. Keys absent from `fields` are
/// untouched; keys present with null clear the column.
pub fn update(
    pool: &DbPool,
    owner_id: i64,
    place_id: i64,
    fields: &serde_json::Map<String, JsonValue>,
) -> AppResult<()> {
    let conn = pool.get()?;
    require_owner(&conn, place_id, owner_id)?;

    let mut assignments = Vec::new();
    let mut values: Vec<rusqlite::types::Value> = Vec::new();

    for key in UPDATABLE_FIELDS {
        if let Some(value) = fields.get(*key) {
            validate_field(key, value)?;
            assignments.push(format!("{} = ?{}", key, values.len() + 1));
            values.push(json_to_sql(value)?);
        }
    }

    if assignments.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE places SET {} WHERE id = ?{}",
        assignments.join(", "),
        values.len() + 1
    );
    values.push(rusqlite::types::Value::Integer(place_id));
    conn.execute(&sql, rusqlite::params_from_iter(values))?;

    Ok(())
}

/// Delete a place and every message attached to it in one transaction, so a
/// crash cannot leave orphaned messages behind.
pub fn delete(pool: &DbPool, owner_id: i64, place_id: i64) -> AppResult<()> {
    let conn = pool.get()?;

    conn.execute("BEGIN IMMEDIATE", [])?;

    let result: AppResult<()> = (|| {
        require_owner(&conn, place_id, owner_id)?;
        conn.execute(
            "DELETE FROM messages WHERE place_id = ?1",
            params![place_id],
        )?;
        conn.execute("DELETE FROM places WHERE id = ?1", params![place_id])?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])?;
            Ok(())
        }
        Err(e) => {
            conn.execute("ROLLBACK", [])?;
            Err(e)
        }
    }
}

/// Heart/paw counts and completion rate for `owner_id`.
pub fn stats(pool: &DbPool, owner_id: i64) -> AppResult<PlaceStats> {
    let conn = pool.get()?;

    let want_to_go: i64 = conn.query_row(
        "SELECT COUNT(*) FROM places WHERE type = 'heart' AND user_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )?;
    let visited: i64 = conn.query_row(
        "SELECT COUNT(*) FROM places WHERE type = 'paw' AND user_id = ?1",
        params![owner_id],
        |row| row.get(0),
    )?;

    Ok(PlaceStats::new(want_to_go, visited))
}

/// Lookup by the (lat, lng, name) natural key used for import deduplication.
pub fn find_by_natural_key(
    conn: &Connection,
    owner_id: i64,
    lat: f64,
    lng: f64,
    name: &str,
) -> AppResult<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM places WHERE lat = ?1 AND lng = ?2 AND name = ?3 AND user_id = ?4",
            params![lat, lng, name, owner_id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(id)
}

/// Shape-check an allow-listed update value before it reaches the column.
/// Anything that would store a value `list`/`export` cannot read back is
/// rejected here with a 400 instead of poisoning the row.
fn validate_field(key: &str, value: &JsonValue) -> AppResult<()> {
    match key {
        "type" => {
            // Keep the two-value constraint on updates as well
            let s = value
                .as_str()
                .ok_or_else(|| AppError::Validation("Invalid type".into()))?;
            s.parse::<PlaceType>()?;
            Ok(())
        }
        "rating" => {
            if value.is_number() || value.is_null() {
                Ok(())
            } else {
                Err(AppError::Validation("Rating must be a number".into()))
            }
        }
        _ => {
            // name, note, visited_at, category
            if value.is_string() || value.is_null() {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "Field '{}' must be a string",
                    key
                )))
            }
        }
    }
}

fn parse_kind(raw: String) -> Result<PlaceType, rusqlite::Error> {
    raw.parse::<PlaceType>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("invalid place type: {}", raw).into(),
        )
    })
}

fn json_to_sql(value: &JsonValue) -> AppResult<rusqlite::types::Value> {
    use rusqlite::types::Value;

    match value {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(b) => Ok(Value::Integer(*b as i64)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Real(f))
            } else {
                Err(AppError::Validation("Invalid number".into()))
            }
        }
        JsonValue::String(s) => Ok(Value::Text(s.clone())),
        _ => Err(AppError::Validation("Invalid field value".into())),
    }
}

//! Message storage. Reads and deletes are gated by ownership of the parent
//! place; creation only requires the place to exist (any authenticated user
//! may comment on a place id they know; kept as-is, pinned by tests).

use rusqlite::params;

use crate::db::models::Message;
use crate::error::{AppError, AppResult};
use crate::messages::validate_content;
use crate::places::repository::{exists, require_owner};
use crate::state::DbPool;

const LIST_LIMIT: i64 = 50;

/// Up to 50 most recent messages for a place, newest first. Forbidden unless
/// `owner_id` owns the place.
pub fn list(pool: &DbPool, owner_id: i64, place_id: i64) -> AppResult<Vec<Message>> {
    let conn = pool.get()?;
    require_owner(&conn, place_id, owner_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, author, content, created_at
         FROM messages
         WHERE place_id = ?1
         ORDER BY created_at DESC
         LIMIT ?2",
    )?;
    let messages = stmt
        .query_map(params![place_id, LIST_LIMIT], |row| {
            Ok(Message {
                id: row.get(0)?,
                author: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(messages)
}

/// Validate content, check the place exists (404 otherwise) and insert.
/// Returns the stored message with its author snapshot.
pub fn create(pool: &DbPool, place_id: i64, author: &str, raw_content: &str) -> AppResult<Message> {
    let content = validate_content(raw_content)?;

    let conn = pool.get()?;
    if !exists(&conn, place_id)? {
        return Err(AppError::NotFound("Place does not exist".into()));
    }

    let created_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO messages (place_id, author, content, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![place_id, author, content, created_at],
    )?;

    Ok(Message {
        id: conn.last_insert_rowid(),
        author: author.to_string(),
        content: content.to_string(),
        created_at,
    })
}

/// Delete a message. Forbidden unless the parent place belongs to
/// `requester_id`; a missing message looks the same as a foreign one.
pub fn delete(pool: &DbPool, requester_id: i64, message_id: i64) -> AppResult<()> {
    let conn = pool.get()?;

    let authorized: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages m
         JOIN places p ON m.place_id = p.id
         WHERE m.id = ?1 AND p.user_id = ?2",
        params![message_id, requester_id],
        |row| row.get(0),
    )?;
    if authorized == 0 {
        return Err(AppError::Forbidden);
    }

    conn.execute("DELETE FROM messages WHERE id = ?1", params![message_id])?;
    Ok(())
}

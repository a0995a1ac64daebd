pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::config::Config;
use crate::state::DbPool;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // foreign_keys and busy_timeout are per-connection, so run the pragmas
    // on every connection the pool opens
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Seed an initial account when the users table is empty. The password comes
/// from LOVEMAP_DEFAULT_PASSWORD, or is generated and logged once so the
/// operator can record it.
pub fn ensure_default_user(pool: &DbPool, config: &Config) -> anyhow::Result<()> {
    let conn = pool.get()?;

    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count > 0 {
        return Ok(());
    }

    let (password, generated) = match std::env::var("LOVEMAP_DEFAULT_PASSWORD") {
        Ok(p) if !p.is_empty() => (p, false),
        _ => (crate::auth::session::generate_token(), true),
    };
    let password_hash = bcrypt::hash(&password, bcrypt::DEFAULT_COST)?;

    conn.execute(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)",
        params![config.auth.default_username, password_hash],
    )?;

    if generated {
        tracing::warn!(
            "Created default user '{}' with generated password: {}",
            config.auth.default_username,
            password
        );
        tracing::warn!("Set LOVEMAP_DEFAULT_PASSWORD to choose your own");
    } else {
        tracing::info!("Created default user '{}'", config.auth.default_username);
    }

    Ok(())
}

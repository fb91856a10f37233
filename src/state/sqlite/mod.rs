mod gift_ideas;
mod people;
mod preferences;


use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::traits::{GiftIdea, NotificationPreferences, Person, Priority};

/// Set restrictive file permissions (0600) on the database and WAL files.
#[cfg(unix)]
fn set_db_file_permissions(db_path: &str) {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::Permissions::from_mode(0o600);
    if let Err(e) = std::fs::set_permissions(db_path, mode.clone()) {
        tracing::warn!("Failed to set permissions on {}: {}", db_path, e);
    }
    for suffix in &["-wal", "-shm"] {
        let path = format!("{}{}", db_path, suffix);
        if std::path::Path::new(&path).exists() {
            if let Err(e) = std::fs::set_permissions(&path, mode.clone()) {
                tracing::warn!("Failed to set permissions on {}: {}", path, e);
            }
        }
    }
}

#[cfg(not(unix))]
fn set_db_file_permissions(_db_path: &str) {}

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn new(db_path: &str) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        set_db_file_permissions(db_path);

        // One preferences row per principal; absence is repaired on read.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT PRIMARY KEY,
                email_reminders INTEGER NOT NULL DEFAULT 1,
                push_notifications INTEGER NOT NULL DEFAULT 0,
                birthday_reminders INTEGER NOT NULL DEFAULT 1,
                anniversary_reminders INTEGER NOT NULL DEFAULT 1,
                nudge_reminders INTEGER NOT NULL DEFAULT 1,
                date_ideas INTEGER NOT NULL DEFAULT 1,
                reminder_time TEXT NOT NULL DEFAULT '09:00:00',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gift_ideas (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                price TEXT,
                priority TEXT NOT NULL DEFAULT 'medium',
                category TEXT,
                relationship_id TEXT,
                date_added TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_gift_ideas_user
                ON gift_ideas(user_id, date_added)",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS people (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                relationship TEXT NOT NULL DEFAULT 'friend',
                email TEXT,
                birthday TEXT,
                notes TEXT,
                tags_json TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_people_user ON people(user_id, name)")
            .execute(&pool)
            .await?;

        // Migration: anniversary came after the first release.
        let _ = sqlx::query("ALTER TABLE people ADD COLUMN anniversary TEXT")
            .execute(&pool)
            .await;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    fn row_to_preferences(row: &sqlx::sqlite::SqliteRow) -> NotificationPreferences {
        let stored_time: String = row.get("reminder_time");
        NotificationPreferences {
            user_id: row.get("user_id"),
            email_reminders: row.get::<i64, _>("email_reminders") != 0,
            push_notifications: row.get::<i64, _>("push_notifications") != 0,
            birthday_reminders: row.get::<i64, _>("birthday_reminders") != 0,
            anniversary_reminders: row.get::<i64, _>("anniversary_reminders") != 0,
            nudge_reminders: row.get::<i64, _>("nudge_reminders") != 0,
            date_ideas: row.get::<i64, _>("date_ideas") != 0,
            // Seconds precision in the DB, minute precision for callers.
            reminder_time: stored_time.chars().take(5).collect(),
        }
    }

    fn row_to_gift_idea(row: &sqlx::sqlite::SqliteRow) -> GiftIdea {
        let priority: String = row.get("priority");
        GiftIdea {
            id: row.get("id"),
            user_id: row.get("user_id"),
            title: row.get("title"),
            description: row.get("description"),
            price: row.get("price"),
            priority: Priority::from_str_lossy(&priority),
            category: row.get("category"),
            relationship_id: row.get("relationship_id"),
            date_added: parse_dt(row.get("date_added")),
        }
    }

    fn row_to_person(row: &sqlx::sqlite::SqliteRow) -> Person {
        let tags_json: String = row.get("tags_json");
        Person {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            relationship: row.get("relationship"),
            email: row.get("email"),
            birthday: row.get("birthday"),
            anniversary: row.try_get("anniversary").unwrap_or(None),
            notes: row.get("notes"),
            tags: serde_json::from_str(&tags_json).unwrap_or_default(),
            created_at: parse_dt(row.get("created_at")),
        }
    }
}

fn parse_dt(raw: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

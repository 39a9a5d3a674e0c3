use mcp_router_common::AppSettings;
use rusqlite::{params, Connection, OptionalExtension};

use crate::database::Database;
use crate::error::StoreError;

const APP_SETTINGS_KEY: &str = "app_settings";

pub(crate) fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn read(conn: &Connection) -> Result<AppSettings, StoreError> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![APP_SETTINGS_KEY],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(AppSettings::default()),
    }
}

fn write(conn: &Connection, settings: &AppSettings) -> Result<(), StoreError> {
    let json = serde_json::to_string(settings)?;
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![APP_SETTINGS_KEY, json],
    )?;
    Ok(())
}

/// Application settings kept as one JSON document.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    db: Database,
}

impl SettingsRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stored settings, or defaults when nothing was saved yet.
    pub fn get(&self) -> Result<AppSettings, StoreError> {
        self.db.with_conn(|conn| read(conn))
    }

    pub fn save(&self, settings: &AppSettings) -> Result<(), StoreError> {
        self.db.with_conn(|conn| write(conn, settings))
    }

    pub fn increment_overlay_count(&self) -> Result<u32, StoreError> {
        self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut settings = read(&tx)?;
            settings.package_manager_overlay_display_count += 1;
            write(&tx, &settings)?;
            tx.commit()?;
            Ok(settings.package_manager_overlay_display_count)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SettingsRepository {
        SettingsRepository::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn defaults_when_empty() {
        let settings = repo().get().unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn save_and_reload() {
        let repo = repo();
        let settings = AppSettings {
            user_id: Some("user-1".into()),
            auth_token: Some("tok".into()),
            ..Default::default()
        };
        repo.save(&settings).unwrap();
        assert_eq!(repo.get().unwrap(), settings);

        let cleared = AppSettings {
            auth_token: None,
            ..settings
        };
        repo.save(&cleared).unwrap();
        assert!(repo.get().unwrap().auth_token.is_none());
    }

    #[test]
    fn overlay_count_increments() {
        let repo = repo();
        assert_eq!(repo.increment_overlay_count().unwrap(), 1);
        assert_eq!(repo.increment_overlay_count().unwrap(), 2);
        assert_eq!(repo.get().unwrap().package_manager_overlay_display_count, 2);
    }
}

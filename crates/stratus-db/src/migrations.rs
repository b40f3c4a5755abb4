use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                role        TEXT NOT NULL DEFAULT 'user',
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                last_active TEXT
            );

            CREATE TABLE user_profiles (
                user_id                TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                phone                  TEXT,
                home_location          TEXT,
                alerts_enabled         INTEGER NOT NULL DEFAULT 1,
                safety_tips_enabled    INTEGER NOT NULL DEFAULT 1,
                notification_frequency TEXT NOT NULL DEFAULT 'daily',
                updated_at             TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now')),
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_expires ON sessions(expires_at);

            CREATE TABLE session_state (
                session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                key         TEXT NOT NULL,
                value       TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (session_id, key)
            );

            CREATE TABLE chat_sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                started_at  TEXT NOT NULL DEFAULT (datetime('now')),
                ended_at    TEXT,
                is_active   INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE chat_messages (
                id               TEXT PRIMARY KEY,
                session_id       TEXT NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
                sender           TEXT NOT NULL,
                content          TEXT NOT NULL,
                weather_json     TEXT,
                location_queried TEXT,
                created_at       TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_chat_messages_session
                ON chat_messages(session_id, created_at);

            CREATE TABLE weather_alerts (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                description TEXT NOT NULL,
                alert_type  TEXT NOT NULL,
                severity    TEXT NOT NULL,
                location    TEXT NOT NULL,
                issued_at   TEXT NOT NULL DEFAULT (datetime('now')),
                expires_at  TEXT NOT NULL,
                is_active   INTEGER NOT NULL DEFAULT 1,
                created_by  TEXT REFERENCES users(id) ON DELETE SET NULL
            );

            CREATE TABLE alert_deliveries (
                alert_id     TEXT NOT NULL REFERENCES weather_alerts(id) ON DELETE CASCADE,
                user_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                status       TEXT NOT NULL DEFAULT 'pending',
                delivered_at TEXT,
                read_at      TEXT,
                PRIMARY KEY (alert_id, user_id)
            );

            CREATE TABLE system_logs (
                id          TEXT PRIMARY KEY,
                level       TEXT NOT NULL,
                message     TEXT NOT NULL,
                module      TEXT NOT NULL,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                extra       TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_system_logs_created ON system_logs(created_at);

            CREATE TABLE activity_logs (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                activity    TEXT NOT NULL,
                description TEXT NOT NULL,
                ip_address  TEXT,
                user_agent  TEXT,
                metadata    TEXT,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_activity_created ON activity_logs(created_at);
            CREATE INDEX idx_activity_user ON activity_logs(user_id, created_at);
            CREATE INDEX idx_activity_kind ON activity_logs(activity, created_at);

            CREATE TABLE user_locations (
                user_id    TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                latitude   REAL NOT NULL,
                longitude  REAL NOT NULL,
                label      TEXT,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    Ok(())
}

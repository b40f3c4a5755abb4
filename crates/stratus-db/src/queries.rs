use crate::Database;
use crate::models::{
    ActivityRow, AlertCountsRow, AlertRow, ChatMessageRow, ChatSessionRow, LocationRow,
    ProfileRow, SessionRow, SystemLogRow, UserAlertRow, UserLocationRow, UserRow, UserStatsRow,
};
use anyhow::Result;
use rusqlite::Row;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, role) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, username, email, password_hash, role],
            )?;
            // Every user gets a profile with default preferences
            conn.execute(
                "INSERT INTO user_profiles (user_id) VALUES (?1)",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{USER_SELECT} WHERE email = ?1"))?
                .query_row([email], user_from_row)
                .optional()
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.prepare(&format!("{USER_SELECT} WHERE username = ?1"))?
                .query_row([username], user_from_row)
                .optional()
        })
    }

    pub fn touch_last_active(&self, id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute("UPDATE users SET last_active = datetime('now') WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Non-admin users, newest first, for the admin dashboard.
    pub fn list_plain_users(&self, limit: u32) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{USER_SELECT} WHERE role = 'user' ORDER BY created_at DESC, rowid DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Counts for the admin dashboard. "Active" means seen in the last
    /// 30 days; "inactive" is the remainder.
    pub fn user_stats(&self) -> Result<UserStatsRow> {
        self.with_conn(|conn| {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM users WHERE role = 'user'", [], |r| r.get(0))?;
            let active: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users
                 WHERE role = 'user' AND last_active >= datetime('now', '-30 days')",
                [],
                |r| r.get(0),
            )?;
            let new_today: i64 = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'user' AND created_at >= date('now')",
                [],
                |r| r.get(0),
            )?;
            Ok(UserStatsRow {
                total,
                active,
                new_today,
                inactive: total - active,
            })
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, user_id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT user_id, phone, home_location, alerts_enabled, safety_tips_enabled,
                        notification_frequency, updated_at
                 FROM user_profiles WHERE user_id = ?1",
            )?
            .query_row([user_id], |row| {
                Ok(ProfileRow {
                    user_id: row.get(0)?,
                    phone: row.get(1)?,
                    home_location: row.get(2)?,
                    alerts_enabled: row.get(3)?,
                    safety_tips_enabled: row.get(4)?,
                    notification_frequency: row.get(5)?,
                    updated_at: row.get(6)?,
                })
            })
            .optional()
        })
    }

    /// Partial update: None leaves the column unchanged.
    pub fn update_profile(
        &self,
        user_id: &str,
        phone: Option<&str>,
        home_location: Option<&str>,
        alerts_enabled: Option<bool>,
        safety_tips_enabled: Option<bool>,
        notification_frequency: Option<&str>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE user_profiles SET
                     phone = COALESCE(?2, phone),
                     home_location = COALESCE(?3, home_location),
                     alerts_enabled = COALESCE(?4, alerts_enabled),
                     safety_tips_enabled = COALESCE(?5, safety_tips_enabled),
                     notification_frequency = COALESCE(?6, notification_frequency),
                     updated_at = datetime('now')
                 WHERE user_id = ?1",
                rusqlite::params![
                    user_id,
                    phone,
                    home_location,
                    alerts_enabled,
                    safety_tips_enabled,
                    notification_frequency
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: &str, user_id: &str, ttl_hours: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at)
                 VALUES (?1, ?2, datetime('now', '+' || ?3 || ' hours'))",
                rusqlite::params![id, user_id, ttl_hours],
            )?;
            Ok(())
        })
    }

    /// Fetch a session only if it has not expired.
    pub fn get_valid_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, user_id, created_at, expires_at FROM sessions
                 WHERE id = ?1 AND expires_at > datetime('now')",
            )?
            .query_row([id], |row| {
                Ok(SessionRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    created_at: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            })
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Drop expired sessions; their cached state goes with them (CASCADE).
    pub fn prune_expired_sessions(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])?;
            Ok(n)
        })
    }

    pub fn session_state_get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT value FROM session_state WHERE session_id = ?1 AND key = ?2")?
                .query_row([session_id, key], |row| row.get(0))
                .optional()
        })
    }

    pub fn session_state_put(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO session_state (session_id, key, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(session_id, key)
                 DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
                rusqlite::params![session_id, key, value],
            )?;
            Ok(())
        })
    }

    // -- Chat --

    pub fn create_chat_session(&self, id: &str, user_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, user_id) VALUES (?1, ?2)",
                [id, user_id],
            )?;
            Ok(())
        })
    }

    pub fn get_chat_session(&self, id: &str) -> Result<Option<ChatSessionRow>> {
        self.with_conn(|conn| {
            conn.prepare("SELECT id, user_id, started_at, is_active FROM chat_sessions WHERE id = ?1")?
                .query_row([id], |row| {
                    Ok(ChatSessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        started_at: row.get(2)?,
                        is_active: row.get(3)?,
                    })
                })
                .optional()
        })
    }

    pub fn insert_chat_message(
        &self,
        id: &str,
        session_id: &str,
        sender: &str,
        content: &str,
        weather_json: Option<&str>,
        location_queried: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, session_id, sender, content, weather_json, location_queried)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, session_id, sender, content, weather_json, location_queried],
            )?;
            Ok(())
        })
    }

    /// Oldest first. rowid breaks ties when two messages land in the same
    /// second (a user turn and its bot reply usually do).
    pub fn get_chat_messages(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender, content, weather_json, location_queried, created_at
                 FROM chat_messages WHERE session_id = ?1
                 ORDER BY created_at ASC, rowid ASC LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![session_id, limit], chat_message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The last `limit` messages, returned oldest first for prompt assembly.
    pub fn recent_chat_messages(&self, session_id: &str, limit: u32) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender, content, weather_json, location_queried, created_at
                 FROM (SELECT * FROM chat_messages WHERE session_id = ?1
                       ORDER BY created_at DESC, rowid DESC LIMIT ?2)
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![session_id, limit], chat_message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Weather alerts --

    pub fn insert_alert(
        &self,
        id: &str,
        title: &str,
        description: &str,
        alert_type: &str,
        severity: &str,
        location: &str,
        expires_at: &str,
        created_by: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO weather_alerts
                     (id, title, description, alert_type, severity, location, expires_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![id, title, description, alert_type, severity, location, expires_at, created_by],
            )?;
            // One pending delivery per non-admin user
            conn.execute(
                "INSERT INTO alert_deliveries (alert_id, user_id)
                 SELECT ?1, id FROM users WHERE role = 'user'",
                [id],
            )?;
            Ok(())
        })
    }

    /// Active, unexpired alerts addressed to this user, newest first.
    pub fn active_alerts_for_user(&self, user_id: &str) -> Result<Vec<UserAlertRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.title, a.description, a.alert_type, a.severity, a.location,
                        a.issued_at, a.expires_at, a.is_active, d.status
                 FROM weather_alerts a
                 JOIN alert_deliveries d ON d.alert_id = a.id
                 WHERE d.user_id = ?1
                   AND a.is_active = 1
                   AND a.expires_at > datetime('now')
                 ORDER BY a.issued_at DESC, a.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(UserAlertRow {
                        alert: alert_from_row(row)?,
                        status: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip this user's pending deliveries on active alerts to delivered.
    pub fn mark_deliveries_delivered(&self, user_id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE alert_deliveries
                 SET status = 'delivered', delivered_at = datetime('now')
                 WHERE user_id = ?1 AND status = 'pending'
                   AND alert_id IN (SELECT id FROM weather_alerts
                                    WHERE is_active = 1 AND expires_at > datetime('now'))",
                [user_id],
            )?;
            Ok(n)
        })
    }

    pub fn mark_delivery_read(&self, alert_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE alert_deliveries
                 SET status = 'read', read_at = datetime('now')
                 WHERE alert_id = ?1 AND user_id = ?2 AND status != 'read'",
                [alert_id, user_id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn list_alerts_with_counts(&self, limit: u32) -> Result<Vec<AlertCountsRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.title, a.description, a.alert_type, a.severity, a.location,
                        a.issued_at, a.expires_at, a.is_active,
                        COUNT(CASE WHEN d.status = 'pending' THEN 1 END),
                        COUNT(CASE WHEN d.status = 'delivered' THEN 1 END),
                        COUNT(CASE WHEN d.status = 'read' THEN 1 END)
                 FROM weather_alerts a
                 LEFT JOIN alert_deliveries d ON d.alert_id = a.id
                 GROUP BY a.id
                 ORDER BY a.issued_at DESC, a.rowid DESC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(AlertCountsRow {
                        alert: alert_from_row(row)?,
                        pending: row.get(9)?,
                        delivered: row.get(10)?,
                        read: row.get(11)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- System / activity logs --

    pub fn insert_system_log(
        &self,
        id: &str,
        level: &str,
        message: &str,
        module: &str,
        user_id: Option<&str>,
        extra: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO system_logs (id, level, message, module, user_id, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, level, message, module, user_id, extra],
            )?;
            Ok(())
        })
    }

    pub fn list_system_logs(
        &self,
        level: Option<&str>,
        module: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SystemLogRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, level, message, module, user_id, extra, created_at
                 FROM system_logs
                 WHERE (?1 IS NULL OR level = ?1)
                   AND (?2 IS NULL OR module = ?2)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![level, module, limit], |row| {
                    Ok(SystemLogRow {
                        id: row.get(0)?,
                        level: row.get(1)?,
                        message: row.get(2)?,
                        module: row.get(3)?,
                        user_id: row.get(4)?,
                        extra: row.get(5)?,
                        created_at: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn insert_activity(
        &self,
        id: &str,
        user_id: &str,
        activity: &str,
        description: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO activity_logs (id, user_id, activity, description, ip_address, user_agent, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![id, user_id, activity, description, ip_address, user_agent, metadata],
            )?;
            Ok(())
        })
    }

    pub fn list_activity(
        &self,
        user_id: Option<&str>,
        activity: Option<&str>,
        limit: u32,
    ) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch the username in a single query
            let mut stmt = conn.prepare(
                "SELECT l.id, l.user_id, u.username, l.activity, l.description,
                        l.ip_address, l.user_agent, l.created_at
                 FROM activity_logs l
                 LEFT JOIN users u ON l.user_id = u.id
                 WHERE (?1 IS NULL OR l.user_id = ?1)
                   AND (?2 IS NULL OR l.activity = ?2)
                 ORDER BY l.created_at DESC, l.rowid DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, activity, limit], |row| {
                    Ok(ActivityRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        activity: row.get(3)?,
                        description: row.get(4)?,
                        ip_address: row.get(5)?,
                        user_agent: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- User locations --

    pub fn upsert_location(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        label: Option<&str>,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO user_locations (user_id, latitude, longitude, label)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     latitude = excluded.latitude,
                     longitude = excluded.longitude,
                     label = excluded.label,
                     updated_at = datetime('now')",
                rusqlite::params![user_id, latitude, longitude, label],
            )?;
            Ok(())
        })
    }

    pub fn get_location(&self, user_id: &str) -> Result<Option<LocationRow>> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT user_id, latitude, longitude, label, updated_at
                 FROM user_locations WHERE user_id = ?1",
            )?
            .query_row([user_id], location_from_row)
            .optional()
        })
    }

    /// Latest location per non-admin user, for the admin map.
    pub fn list_user_locations(&self) -> Result<Vec<UserLocationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT l.user_id, l.latitude, l.longitude, l.label, l.updated_at, u.username
                 FROM user_locations l
                 JOIN users u ON l.user_id = u.id
                 WHERE u.role = 'user'
                 ORDER BY l.updated_at DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(UserLocationRow {
                        location: location_from_row(row)?,
                        username: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

const USER_SELECT: &str =
    "SELECT id, username, email, password, role, created_at, last_active FROM users";

fn user_from_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        created_at: row.get(5)?,
        last_active: row.get(6)?,
    })
}

fn chat_message_from_row(row: &Row) -> rusqlite::Result<ChatMessageRow> {
    Ok(ChatMessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sender: row.get(2)?,
        content: row.get(3)?,
        weather_json: row.get(4)?,
        location_queried: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn alert_from_row(row: &Row) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        alert_type: row.get(3)?,
        severity: row.get(4)?,
        location: row.get(5)?,
        issued_at: row.get(6)?,
        expires_at: row.get(7)?,
        is_active: row.get(8)?,
    })
}

fn location_from_row(row: &Row) -> rusqlite::Result<LocationRow> {
    Ok(LocationRow {
        user_id: row.get(0)?,
        latitude: row.get(1)?,
        longitude: row.get(2)?,
        label: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn open_temp() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn add_user(db: &Database, id: &str, name: &str, role: &str) {
        db.create_user(id, name, &format!("{name}@example.com"), "hash", role)
            .unwrap();
    }

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        drop(Database::open(&path).unwrap());
        // Second open must not re-run the v1 batch
        let db = Database::open(&path).unwrap();
        add_user(&db, "u1", "ana", "user");
        assert!(db.get_user_by_username("ana").unwrap().is_some());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        let dup = db.create_user("u2", "ana", "other@example.com", "hash", "user");
        assert!(dup.is_err());
        // The failed insert must not leave a dangling profile
        assert!(db.get_profile("u2").unwrap().is_none());
    }

    #[test]
    fn create_user_also_creates_default_profile() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        let profile = db.get_profile("u1").unwrap().unwrap();
        assert!(profile.alerts_enabled);
        assert!(profile.safety_tips_enabled);
        assert_eq!(profile.notification_frequency, "daily");
    }

    #[test]
    fn profile_update_leaves_unset_fields_alone() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        db.update_profile("u1", Some("+63 2 555 0100"), None, Some(false), None, None)
            .unwrap();
        let p = db.get_profile("u1").unwrap().unwrap();
        assert_eq!(p.phone.as_deref(), Some("+63 2 555 0100"));
        assert!(!p.alerts_enabled);
        assert!(p.safety_tips_enabled);
        assert_eq!(p.notification_frequency, "daily");
    }

    #[test]
    fn session_expiry_and_prune() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        db.create_session("s1", "u1", 24).unwrap();
        db.create_session("s2", "u1", 24).unwrap();
        assert!(db.get_valid_session("s1").unwrap().is_some());

        // Force s2 into the past
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE sessions SET expires_at = datetime('now', '-1 hour') WHERE id = 's2'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.get_valid_session("s2").unwrap().is_none());
        assert_eq!(db.prune_expired_sessions().unwrap(), 1);
        assert!(db.get_valid_session("s1").unwrap().is_some());
    }

    #[test]
    fn session_state_upserts_and_cascades() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        db.create_session("s1", "u1", 24).unwrap();

        db.session_state_put("s1", "weather:manila", "{\"t\":31}").unwrap();
        db.session_state_put("s1", "weather:manila", "{\"t\":29}").unwrap();
        assert_eq!(
            db.session_state_get("s1", "weather:manila").unwrap().as_deref(),
            Some("{\"t\":29}")
        );

        db.delete_session("s1").unwrap();
        assert!(db.session_state_get("s1", "weather:manila").unwrap().is_none());
    }

    #[test]
    fn chat_history_keeps_order_within_one_second() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        db.create_chat_session("c1", "u1").unwrap();
        for (i, sender) in ["user", "bot", "user", "bot"].iter().enumerate() {
            db.insert_chat_message(&format!("m{i}"), "c1", sender, &format!("turn {i}"), None, None)
                .unwrap();
        }

        let all = db.get_chat_messages("c1", 50).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].content, "turn 0");
        assert_eq!(all[3].content, "turn 3");

        let recent = db.recent_chat_messages("c1", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].content, "turn 2");
        assert_eq!(recent[1].content, "turn 3");
    }

    #[test]
    fn alert_delivery_lifecycle() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        add_user(&db, "u2", "ben", "user");
        add_user(&db, "a1", "root", "admin");

        db.insert_alert(
            "w1",
            "Typhoon signal 2",
            "Strong winds expected this evening.",
            "warning",
            "high",
            "Manila",
            "2999-01-01T00:00:00Z",
            "a1",
        )
        .unwrap();

        // Admins get no delivery
        assert!(db.active_alerts_for_user("a1").unwrap().is_empty());

        let for_ana = db.active_alerts_for_user("u1").unwrap();
        assert_eq!(for_ana.len(), 1);
        assert_eq!(for_ana[0].status, "pending");

        assert_eq!(db.mark_deliveries_delivered("u1").unwrap(), 1);
        assert!(db.mark_delivery_read("w1", "u1").unwrap());
        // Second read is a no-op
        assert!(!db.mark_delivery_read("w1", "u1").unwrap());

        let counts = db.list_alerts_with_counts(25).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].pending, 1); // ben never saw it
        assert_eq!(counts[0].read, 1);
    }

    #[test]
    fn expired_alerts_drop_out_of_user_listing() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        add_user(&db, "a1", "root", "admin");
        db.insert_alert(
            "w1", "Heat advisory", "Stay indoors at noon.", "advisory", "moderate",
            "Quezon City", "2999-01-01T00:00:00Z", "a1",
        )
        .unwrap();
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE weather_alerts SET expires_at = datetime('now', '-1 day') WHERE id = 'w1'",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        assert!(db.active_alerts_for_user("u1").unwrap().is_empty());
        // Admin listing still shows it
        assert_eq!(db.list_alerts_with_counts(25).unwrap().len(), 1);
    }

    #[test]
    fn activity_listing_filters_by_user_and_kind() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        add_user(&db, "u2", "ben", "user");

        db.insert_activity("l1", "u1", "login", "POST /auth/login", Some("10.0.0.1"), None, None)
            .unwrap();
        db.insert_activity("l2", "u1", "weather_query", "GET /api/weather/current", None, None, None)
            .unwrap();
        db.insert_activity("l3", "u2", "login", "POST /auth/login", None, None, None)
            .unwrap();

        assert_eq!(db.list_activity(None, None, 50).unwrap().len(), 3);
        assert_eq!(db.list_activity(Some("u1"), None, 50).unwrap().len(), 2);
        let logins = db.list_activity(None, Some("login"), 50).unwrap();
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].username, "ben"); // newest first
    }

    #[test]
    fn location_upsert_keeps_one_row_per_user() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        db.upsert_location("u1", 14.5995, 120.9842, Some("Manila")).unwrap();
        db.upsert_location("u1", 35.6762, 139.6503, Some("Tokyo")).unwrap();

        let loc = db.get_location("u1").unwrap().unwrap();
        assert!((loc.latitude - 35.6762).abs() < 1e-9);
        assert_eq!(loc.label.as_deref(), Some("Tokyo"));
        assert_eq!(db.list_user_locations().unwrap().len(), 1);
    }

    #[test]
    fn user_stats_count_roles_and_activity() {
        let (_dir, db) = open_temp();
        add_user(&db, "u1", "ana", "user");
        add_user(&db, "u2", "ben", "user");
        add_user(&db, "a1", "root", "admin");
        db.touch_last_active("u1").unwrap();

        let stats = db.user_stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.new_today, 2);
        assert_eq!(stats.inactive, 1);
    }
}

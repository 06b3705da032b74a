//! SQLite persistence for the study engine
//!
//! Tables:
//! ```text
//! entries          dictionary entries owned by a user
//! senses           senses of an entry (a card needs at least one)
//! user_settings    per-user study preferences
//! cards            one row per (user, entry)
//! review_logs      append-only, previous schedule kept as JSON for undo
//! study_sessions   at most one 'active' row per user (partial unique index)
//! ```

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::error::{StudyError, StudyResult};
use super::models::*;
use super::store::*;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        text TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS senses (
        id TEXT PRIMARY KEY,
        entry_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        FOREIGN KEY (entry_id) REFERENCES entries(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS user_settings (
        user_id TEXT PRIMARY KEY,
        new_cards_per_day INTEGER NOT NULL,
        reviews_per_day INTEGER NOT NULL,
        max_interval_days INTEGER NOT NULL,
        desired_retention REAL NOT NULL,
        timezone TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS cards (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        entry_id TEXT NOT NULL,
        state TEXT NOT NULL,
        step INTEGER NOT NULL DEFAULT 0,
        stability REAL,
        difficulty REAL,
        due TEXT NOT NULL,
        last_review TEXT,
        reps INTEGER NOT NULL DEFAULT 0,
        lapses INTEGER NOT NULL DEFAULT 0,
        scheduled_days INTEGER NOT NULL DEFAULT 0,
        elapsed_days INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (user_id, entry_id)
    );

    CREATE TABLE IF NOT EXISTS review_logs (
        id TEXT PRIMARY KEY,
        card_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        grade TEXT NOT NULL,
        prev_state TEXT NOT NULL,
        previous TEXT NOT NULL,
        stability_after REAL NOT NULL,
        difficulty_after REAL NOT NULL,
        elapsed_days INTEGER NOT NULL,
        scheduled_days INTEGER NOT NULL,
        duration_ms INTEGER,
        reviewed_at TEXT NOT NULL,
        FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS study_sessions (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        finished_at TEXT,
        total_reviewed INTEGER NOT NULL DEFAULT 0,
        result TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_cards_user_due ON cards(user_id, state, due);
    CREATE INDEX IF NOT EXISTS idx_senses_entry ON senses(entry_id);
    CREATE INDEX IF NOT EXISTS idx_logs_card ON review_logs(card_id, reviewed_at);
    CREATE INDEX IF NOT EXISTS idx_logs_user ON review_logs(user_id, reviewed_at);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_one_active
        ON study_sessions(user_id) WHERE status = 'active';
"#;

const CARD_COLUMNS: &str = "id, user_id, entry_id, state, step, stability, difficulty, due, \
     last_review, reps, lapses, scheduled_days, elapsed_days, created_at, updated_at";

const LOG_COLUMNS: &str = "id, card_id, user_id, grade, previous, stability_after, \
     difficulty_after, elapsed_days, scheduled_days, duration_ms, reviewed_at";

const SESSION_COLUMNS: &str = "id, user_id, status, started_at, finished_at, total_reviewed, result";

/// Study data in a single SQLite database
pub struct SqliteStudyStore {
    conn: Mutex<Connection>,
}

impl SqliteStudyStore {
    /// Open (or create) the database at the given path
    pub fn open(path: &Path) -> StudyResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StudyError::Storage(format!("create {:?}: {}", parent, e)))?;
        }
        let conn = Connection::open(path)?;
        log::info!("Opened study database at {:?}", path);
        Self::init(conn)
    }

    pub fn open_in_memory() -> StudyResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StudyResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StudyResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StudyError::Storage("connection lock poisoned".to_string()))
    }

    /// Add a dictionary entry with `sense_count` empty senses, created at `now`
    pub fn add_entry(
        &self,
        user_id: Uuid,
        text: &str,
        sense_count: u32,
        now: DateTime<Utc>,
    ) -> StudyResult<Uuid> {
        let entry_id = Uuid::new_v4();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO entries (id, user_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![entry_id.to_string(), user_id.to_string(), text, ts(&now)],
        )?;
        for position in 0..sense_count {
            tx.execute(
                "INSERT INTO senses (id, entry_id, position) VALUES (?1, ?2, ?3)",
                params![Uuid::new_v4().to_string(), entry_id.to_string(), position],
            )?;
        }
        tx.commit()?;
        Ok(entry_id)
    }

    /// Save a user's study preferences, replacing any previous ones
    pub fn put_settings(&self, user_id: Uuid, settings: &UserSettings) -> StudyResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO user_settings
             (user_id, new_cards_per_day, reviews_per_day, max_interval_days, desired_retention, timezone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id.to_string(),
                settings.new_cards_per_day,
                settings.reviews_per_day,
                settings.max_interval_days,
                settings.desired_retention,
                settings.timezone,
            ],
        )?;
        Ok(())
    }
}

impl StudyRepository for SqliteStudyStore {
    fn read<T>(&self, f: impl FnOnce(&dyn StudyStores) -> StudyResult<T>) -> StudyResult<T> {
        let conn = self.lock()?;
        f(&SqliteHandle { conn: &conn })
    }

    fn transaction<T>(&self, f: impl FnOnce(&dyn StudyStores) -> StudyResult<T>) -> StudyResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        // Dropping `tx` on the error path rolls back
        let out = f(&SqliteHandle { conn: &tx })?;
        tx.commit()?;
        Ok(out)
    }
}

/// Store implementation over a borrowed connection or transaction
struct SqliteHandle<'c> {
    conn: &'c Connection,
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp {:?}: {}", raw, e)))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(_) => get_ts(row, idx).map(Some),
        None => Ok(None),
    }
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, format!("bad uuid {:?}: {}", raw, e)))
}

fn get_parsed<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn row_to_card(row: &Row<'_>) -> rusqlite::Result<Card> {
    let stability: Option<f64> = row.get(5)?;
    let difficulty: Option<f64> = row.get(6)?;
    let memory = match (stability, difficulty) {
        (Some(stability), Some(difficulty)) => Some(MemoryState { stability, difficulty }),
        _ => None,
    };
    Ok(Card {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        entry_id: get_uuid(row, 2)?,
        schedule: CardSchedule {
            state: get_parsed(row, 3)?,
            step: row.get(4)?,
            memory,
            due: get_ts(row, 7)?,
            last_review: get_opt_ts(row, 8)?,
            reps: row.get(9)?,
            lapses: row.get(10)?,
            scheduled_days: row.get(11)?,
            elapsed_days: row.get(12)?,
        },
        created_at: get_ts(row, 13)?,
        updated_at: get_ts(row, 14)?,
    })
}

fn row_to_log(row: &Row<'_>) -> rusqlite::Result<ReviewLog> {
    Ok(ReviewLog {
        id: get_uuid(row, 0)?,
        card_id: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        grade: get_parsed(row, 3)?,
        previous: get_json(row, 4)?,
        stability_after: row.get(5)?,
        difficulty_after: row.get(6)?,
        elapsed_days: row.get(7)?,
        scheduled_days: row.get(8)?,
        duration_ms: row.get(9)?,
        reviewed_at: get_ts(row, 10)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<StudySession> {
    let result = match row.get::<_, Option<String>>(6)? {
        Some(_) => Some(get_json(row, 6)?),
        None => None,
    };
    Ok(StudySession {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        status: get_parsed(row, 2)?,
        started_at: get_ts(row, 3)?,
        finished_at: get_opt_ts(row, 4)?,
        total_reviewed: row.get(5)?,
        result,
    })
}

impl SqliteHandle<'_> {
    fn count(&self, sql: &str, params: impl rusqlite::Params) -> StudyResult<usize> {
        let n: i64 = self.conn.query_row(sql, params, |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }
}

impl CardStore for SqliteHandle<'_> {
    fn get_due_cards(&self, user_id: Uuid, now: DateTime<Utc>, limit: usize) -> StudyResult<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM cards
             WHERE user_id = ?1 AND state != 'new' AND due <= ?2
             ORDER BY due ASC, id ASC LIMIT ?3",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![user_id.to_string(), ts(&now), limit as i64], row_to_card)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn get_new_cards(&self, user_id: Uuid, limit: usize) -> StudyResult<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM cards
             WHERE user_id = ?1 AND state = 'new'
             ORDER BY created_at ASC, rowid ASC LIMIT ?2",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![user_id.to_string(), limit as i64], row_to_card)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cards)
    }

    fn get_card(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<Option<Card>> {
        let card = self
            .conn
            .query_row(
                &format!("SELECT {} FROM cards WHERE id = ?1 AND user_id = ?2", CARD_COLUMNS),
                params![card_id.to_string(), user_id.to_string()],
                row_to_card,
            )
            .optional()?;
        Ok(card)
    }

    fn card_exists_for_entry(&self, user_id: Uuid, entry_id: Uuid) -> StudyResult<bool> {
        let n = self.count(
            "SELECT COUNT(*) FROM cards WHERE user_id = ?1 AND entry_id = ?2",
            params![user_id.to_string(), entry_id.to_string()],
        )?;
        Ok(n > 0)
    }

    fn create_card(&self, card: &Card) -> StudyResult<()> {
        let s = &card.schedule;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO cards ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    CARD_COLUMNS
                ),
                params![
                    card.id.to_string(),
                    card.user_id.to_string(),
                    card.entry_id.to_string(),
                    s.state.as_str(),
                    s.step,
                    s.stability(),
                    s.difficulty(),
                    ts(&s.due),
                    s.last_review.as_ref().map(ts),
                    s.reps,
                    s.lapses,
                    s.scheduled_days,
                    s.elapsed_days,
                    ts(&card.created_at),
                    ts(&card.updated_at),
                ],
            )
            .map_err(|e| match StudyError::from(e) {
                StudyError::AlreadyExists(_) => {
                    StudyError::AlreadyExists(format!("card for entry {}", card.entry_id))
                }
                other => other,
            })?;
        Ok(())
    }

    fn update_card(&self, card: &Card) -> StudyResult<()> {
        let s = &card.schedule;
        let changed = self.conn.execute(
            "UPDATE cards SET state = ?1, step = ?2, stability = ?3, difficulty = ?4, due = ?5,
                 last_review = ?6, reps = ?7, lapses = ?8, scheduled_days = ?9,
                 elapsed_days = ?10, updated_at = ?11
             WHERE id = ?12 AND user_id = ?13",
            params![
                s.state.as_str(),
                s.step,
                s.stability(),
                s.difficulty(),
                ts(&s.due),
                s.last_review.as_ref().map(ts),
                s.reps,
                s.lapses,
                s.scheduled_days,
                s.elapsed_days,
                ts(&card.updated_at),
                card.id.to_string(),
                card.user_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StudyError::NotFound(format!("card {}", card.id)));
        }
        Ok(())
    }

    fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM cards WHERE id = ?1 AND user_id = ?2",
            params![card_id.to_string(), user_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn count_due(&self, user_id: Uuid, now: DateTime<Utc>) -> StudyResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM cards WHERE user_id = ?1 AND state != 'new' AND due <= ?2",
            params![user_id.to_string(), ts(&now)],
        )
    }

    fn count_by_state(&self, user_id: Uuid) -> StudyResult<CardStateCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM cards WHERE user_id = ?1 GROUP BY state")?;
        let rows = stmt.query_map(params![user_id.to_string()], |row| {
            Ok((get_parsed::<CardState>(row, 0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = CardStateCounts::default();
        for row in rows {
            let (state, n) = row?;
            let n = n.max(0) as usize;
            match state {
                CardState::New => counts.new = n,
                CardState::Learning => counts.learning = n,
                CardState::Review => counts.review = n,
                CardState::Relearning => counts.relearning = n,
            }
        }
        Ok(counts)
    }
}

impl ReviewLogStore for SqliteHandle<'_> {
    fn insert_log(&self, log: &ReviewLog) -> StudyResult<()> {
        let previous = serde_json::to_string(&log.previous)?;
        self.conn.execute(
            "INSERT INTO review_logs
             (id, card_id, user_id, grade, prev_state, previous, stability_after, difficulty_after,
              elapsed_days, scheduled_days, duration_ms, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                log.id.to_string(),
                log.card_id.to_string(),
                log.user_id.to_string(),
                log.grade.as_str(),
                log.previous_state().as_str(),
                previous,
                log.stability_after,
                log.difficulty_after,
                log.elapsed_days,
                log.scheduled_days,
                log.duration_ms,
                ts(&log.reviewed_at),
            ],
        )?;
        Ok(())
    }

    fn most_recent_log(&self, card_id: Uuid) -> StudyResult<Option<ReviewLog>> {
        let log = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM review_logs WHERE card_id = ?1
                     ORDER BY reviewed_at DESC, rowid DESC LIMIT 1",
                    LOG_COLUMNS
                ),
                params![card_id.to_string()],
                row_to_log,
            )
            .optional()?;
        Ok(log)
    }

    fn delete_log(&self, log_id: Uuid) -> StudyResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM review_logs WHERE id = ?1", params![log_id.to_string()])?;
        Ok(changed > 0)
    }

    fn count_reviewed_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM review_logs WHERE user_id = ?1 AND reviewed_at >= ?2",
            params![user_id.to_string(), ts(&since)],
        )
    }

    fn count_new_reviewed_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM review_logs
             WHERE user_id = ?1 AND reviewed_at >= ?2 AND prev_state = 'new'",
            params![user_id.to_string(), ts(&since)],
        )
    }

    fn logs_in_period(&self, user_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> StudyResult<Vec<ReviewLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM review_logs
             WHERE user_id = ?1 AND reviewed_at >= ?2 AND reviewed_at <= ?3
             ORDER BY reviewed_at ASC, rowid ASC",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(params![user_id.to_string(), ts(&from), ts(&to)], row_to_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn logs_for_card(&self, card_id: Uuid, limit: usize, offset: usize) -> StudyResult<Vec<ReviewLog>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM review_logs WHERE card_id = ?1
             ORDER BY reviewed_at DESC, rowid DESC LIMIT ?2 OFFSET ?3",
            LOG_COLUMNS
        ))?;
        let logs = stmt
            .query_map(
                params![card_id.to_string(), limit.min(i64::MAX as usize) as i64, offset as i64],
                row_to_log,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn count_logs_for_card(&self, card_id: Uuid) -> StudyResult<usize> {
        self.count(
            "SELECT COUNT(*) FROM review_logs WHERE card_id = ?1",
            params![card_id.to_string()],
        )
    }

    fn review_times_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<Vec<DateTime<Utc>>> {
        let mut stmt = self.conn.prepare(
            "SELECT reviewed_at FROM review_logs
             WHERE user_id = ?1 AND reviewed_at >= ?2
             ORDER BY reviewed_at DESC",
        )?;
        let times = stmt
            .query_map(params![user_id.to_string(), ts(&since)], |row| get_ts(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(times)
    }
}

impl SessionStore for SqliteHandle<'_> {
    fn get_active_session(&self, user_id: Uuid) -> StudyResult<Option<StudySession>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM study_sessions WHERE user_id = ?1 AND status = 'active'",
                    SESSION_COLUMNS
                ),
                params![user_id.to_string()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn get_session(&self, user_id: Uuid, session_id: Uuid) -> StudyResult<Option<StudySession>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM study_sessions WHERE id = ?1 AND user_id = ?2",
                    SESSION_COLUMNS
                ),
                params![session_id.to_string(), user_id.to_string()],
                row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn create_session(&self, session: &StudySession) -> StudyResult<()> {
        let result = session.result.as_ref().map(serde_json::to_string).transpose()?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO study_sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    SESSION_COLUMNS
                ),
                params![
                    session.id.to_string(),
                    session.user_id.to_string(),
                    session.status.as_str(),
                    ts(&session.started_at),
                    session.finished_at.as_ref().map(ts),
                    session.total_reviewed,
                    result,
                ],
            )
            .map_err(|e| match StudyError::from(e) {
                StudyError::AlreadyExists(_) => StudyError::AlreadyExists("active session".to_string()),
                other => other,
            })?;
        Ok(())
    }

    fn update_session(&self, session: &StudySession) -> StudyResult<()> {
        let result = session.result.as_ref().map(serde_json::to_string).transpose()?;
        let changed = self.conn.execute(
            "UPDATE study_sessions SET status = ?1, finished_at = ?2, total_reviewed = ?3, result = ?4
             WHERE id = ?5 AND user_id = ?6",
            params![
                session.status.as_str(),
                session.finished_at.as_ref().map(ts),
                session.total_reviewed,
                result,
                session.id.to_string(),
                session.user_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StudyError::NotFound(format!("session {}", session.id)));
        }
        Ok(())
    }
}

impl SettingsProvider for SqliteHandle<'_> {
    fn get_settings(&self, user_id: Uuid) -> StudyResult<Option<UserSettings>> {
        let settings = self
            .conn
            .query_row(
                "SELECT new_cards_per_day, reviews_per_day, max_interval_days, desired_retention, timezone
                 FROM user_settings WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok(UserSettings {
                        new_cards_per_day: row.get(0)?,
                        reviews_per_day: row.get(1)?,
                        max_interval_days: row.get(2)?,
                        desired_retention: row.get(3)?,
                        timezone: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }
}

impl EntryCatalog for SqliteHandle<'_> {
    fn entry_sense_count(&self, user_id: Uuid, entry_id: Uuid) -> StudyResult<Option<u32>> {
        let count = self
            .conn
            .query_row(
                "SELECT COUNT(s.id) FROM entries e
                 LEFT JOIN senses s ON s.entry_id = e.id
                 WHERE e.id = ?1 AND e.user_id = ?2
                 GROUP BY e.id",
                params![entry_id.to_string(), user_id.to_string()],
                |row| row.get::<_, u32>(0),
            )
            .optional()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn due_card(user: Uuid, due: DateTime<Utc>) -> Card {
        let mut card = Card::new(user, Uuid::new_v4(), t0());
        card.schedule.state = CardState::Review;
        card.schedule.memory = Some(MemoryState {
            stability: 5.0,
            difficulty: 5.0,
        });
        card.schedule.due = due;
        card.schedule.reps = 3;
        card
    }

    #[test]
    fn test_open_creates_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("study.db");
        let store = SqliteStudyStore::open(&path).unwrap();
        assert!(path.exists());

        let user = Uuid::new_v4();
        store.add_entry(user, "apple", 1, t0()).unwrap();
        drop(store);

        // Schema creation is idempotent
        SqliteStudyStore::open(&path).unwrap();
    }

    #[test]
    fn test_card_roundtrip_and_uniqueness() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let card = Card::new(user, Uuid::new_v4(), t0());

        store.transaction(|s| s.create_card(&card)).unwrap();
        let loaded = store.read(|s| s.get_card(user, card.id)).unwrap().unwrap();
        assert_eq!(loaded, card);
        assert!(loaded.schedule.memory.is_none());

        let dup = Card::new(user, card.entry_id, t0());
        let err = store.transaction(|s| s.create_card(&dup)).unwrap_err();
        assert!(err.is_already_exists());

        // Another user cannot see it
        assert!(store.read(|s| s.get_card(Uuid::new_v4(), card.id)).unwrap().is_none());
    }

    #[test]
    fn test_due_cards_ordered_and_exclude_new() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let later = due_card(user, t0() - Duration::hours(1));
        let earlier = due_card(user, t0() - Duration::days(2));
        let future = due_card(user, t0() + Duration::days(1));
        let fresh = Card::new(user, Uuid::new_v4(), t0() - Duration::days(5));

        store
            .transaction(|s| {
                for card in [&later, &earlier, &future, &fresh] {
                    s.create_card(card)?;
                }
                Ok(())
            })
            .unwrap();

        let due = store.read(|s| s.get_due_cards(user, t0(), 10)).unwrap();
        let ids: Vec<Uuid> = due.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![earlier.id, later.id]);

        assert_eq!(store.read(|s| s.get_due_cards(user, t0(), 1)).unwrap().len(), 1);
        assert_eq!(store.read(|s| s.count_due(user, t0())).unwrap(), 2);

        let new_cards = store.read(|s| s.get_new_cards(user, 10)).unwrap();
        assert_eq!(new_cards.len(), 1);
        assert_eq!(new_cards[0].id, fresh.id);

        let counts = store.read(|s| s.count_by_state(user)).unwrap();
        assert_eq!(counts.review, 3);
        assert_eq!(counts.new, 1);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let card = Card::new(user, Uuid::new_v4(), t0());

        let result: StudyResult<()> = store.transaction(|s| {
            s.create_card(&card)?;
            Err(StudyError::Storage("boom".to_string()))
        });
        assert!(result.is_err());
        assert!(store.read(|s| s.get_card(user, card.id)).unwrap().is_none());
    }

    #[test]
    fn test_logs_snapshot_and_counts() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let card = Card::new(user, Uuid::new_v4(), t0());
        let log = ReviewLog {
            id: Uuid::new_v4(),
            card_id: card.id,
            user_id: user,
            grade: Grade::Good,
            previous: card.schedule.clone(),
            stability_after: 3.1,
            difficulty_after: 5.2,
            elapsed_days: 0,
            scheduled_days: 0,
            duration_ms: Some(4200),
            reviewed_at: t0(),
        };

        store
            .transaction(|s| {
                s.create_card(&card)?;
                s.insert_log(&log)
            })
            .unwrap();

        let recent = store.read(|s| s.most_recent_log(card.id)).unwrap().unwrap();
        assert_eq!(recent, log);
        assert_eq!(recent.previous_state(), CardState::New);

        let since = t0() - Duration::hours(1);
        assert_eq!(store.read(|s| s.count_reviewed_since(user, since)).unwrap(), 1);
        assert_eq!(store.read(|s| s.count_new_reviewed_since(user, since)).unwrap(), 1);
        assert_eq!(
            store.read(|s| s.count_new_reviewed_since(user, t0() + Duration::seconds(1))).unwrap(),
            0
        );

        // Deleting the card cascades to its logs
        store.transaction(|s| s.delete_card(user, card.id)).unwrap();
        assert_eq!(store.read(|s| s.count_logs_for_card(card.id)).unwrap(), 0);
    }

    #[test]
    fn test_single_active_session_constraint() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let first = StudySession::start(user, t0());
        store.transaction(|s| s.create_session(&first)).unwrap();

        let second = StudySession::start(user, t0());
        let err = store.transaction(|s| s.create_session(&second)).unwrap_err();
        assert!(err.is_already_exists());

        let mut finished = first.clone();
        finished.status = SessionStatus::Finished;
        finished.finished_at = Some(t0() + Duration::minutes(5));
        store.transaction(|s| s.update_session(&finished)).unwrap();

        store.transaction(|s| s.create_session(&second)).unwrap();
        let active = store.read(|s| s.get_active_session(user)).unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[test]
    fn test_entry_stamped_with_given_time() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let created = t0() - Duration::days(3);
        let entry = store.add_entry(Uuid::new_v4(), "kettle", 1, created).unwrap();

        let conn = store.lock().unwrap();
        let stored: String = conn
            .query_row(
                "SELECT created_at FROM entries WHERE id = ?1",
                params![entry.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, ts(&created));
    }

    #[test]
    fn test_entries_and_settings() {
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let with_senses = store.add_entry(user, "run", 3, t0()).unwrap();
        let bare = store.add_entry(user, "xyzzy", 0, t0()).unwrap();

        assert_eq!(store.read(|s| s.entry_sense_count(user, with_senses)).unwrap(), Some(3));
        assert_eq!(store.read(|s| s.entry_sense_count(user, bare)).unwrap(), Some(0));
        assert_eq!(store.read(|s| s.entry_sense_count(Uuid::new_v4(), bare)).unwrap(), None);

        assert!(store.read(|s| s.get_settings(user)).unwrap().is_none());
        let settings = UserSettings {
            new_cards_per_day: 5,
            timezone: "Asia/Tokyo".to_string(),
            ..UserSettings::default()
        };
        store.put_settings(user, &settings).unwrap();
        assert_eq!(store.read(|s| s.get_settings(user)).unwrap(), Some(settings));
    }
}

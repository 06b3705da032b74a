//! Collaborator contracts the study engine is built against
//!
//! Each store is a narrow capability. Lookups that take a `user_id` only see
//! that user's rows, so a missing row and someone else's row look the same to
//! the caller.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StudyResult;
use super::models::{Card, CardStateCounts, ReviewLog, StudySession, UserSettings};

pub trait CardStore {
    /// Non-New cards with `due <= now`, oldest due first
    fn get_due_cards(&self, user_id: Uuid, now: DateTime<Utc>, limit: usize) -> StudyResult<Vec<Card>>;

    /// New cards in creation order
    fn get_new_cards(&self, user_id: Uuid, limit: usize) -> StudyResult<Vec<Card>>;

    fn get_card(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<Option<Card>>;

    fn card_exists_for_entry(&self, user_id: Uuid, entry_id: Uuid) -> StudyResult<bool>;

    /// Fails with `AlreadyExists` when the user already has a card for the entry
    fn create_card(&self, card: &Card) -> StudyResult<()>;

    fn update_card(&self, card: &Card) -> StudyResult<()>;

    /// Returns false when no such card belongs to the user
    fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> StudyResult<bool>;

    fn count_due(&self, user_id: Uuid, now: DateTime<Utc>) -> StudyResult<usize>;

    fn count_by_state(&self, user_id: Uuid) -> StudyResult<CardStateCounts>;
}

pub trait ReviewLogStore {
    fn insert_log(&self, log: &ReviewLog) -> StudyResult<()>;

    fn most_recent_log(&self, card_id: Uuid) -> StudyResult<Option<ReviewLog>>;

    fn delete_log(&self, log_id: Uuid) -> StudyResult<bool>;

    /// Reviews at or after `since`
    fn count_reviewed_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<usize>;

    /// Reviews at or after `since` whose card was New at review time
    fn count_new_reviewed_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<usize>;

    /// Logs reviewed in `[from, to]`, oldest first
    fn logs_in_period(&self, user_id: Uuid, from: DateTime<Utc>, to: DateTime<Utc>) -> StudyResult<Vec<ReviewLog>>;

    /// A page of a card's logs, newest first
    fn logs_for_card(&self, card_id: Uuid, limit: usize, offset: usize) -> StudyResult<Vec<ReviewLog>>;

    fn count_logs_for_card(&self, card_id: Uuid) -> StudyResult<usize>;

    /// Review timestamps at or after `since`, newest first
    fn review_times_since(&self, user_id: Uuid, since: DateTime<Utc>) -> StudyResult<Vec<DateTime<Utc>>>;
}

pub trait SessionStore {
    fn get_active_session(&self, user_id: Uuid) -> StudyResult<Option<StudySession>>;

    fn get_session(&self, user_id: Uuid, session_id: Uuid) -> StudyResult<Option<StudySession>>;

    /// Fails with `AlreadyExists` while the user has another active session
    fn create_session(&self, session: &StudySession) -> StudyResult<()>;

    fn update_session(&self, session: &StudySession) -> StudyResult<()>;
}

pub trait SettingsProvider {
    /// `None` when the user has never saved settings
    fn get_settings(&self, user_id: Uuid) -> StudyResult<Option<UserSettings>>;
}

/// Read access to the user's dictionary
pub trait EntryCatalog {
    /// Number of senses on the entry, or `None` if the user has no such entry
    fn entry_sense_count(&self, user_id: Uuid, entry_id: Uuid) -> StudyResult<Option<u32>>;
}

/// Every store the engine needs, reachable through one handle
pub trait StudyStores: CardStore + ReviewLogStore + SessionStore + SettingsProvider + EntryCatalog {}

impl<T> StudyStores for T where T: CardStore + ReviewLogStore + SessionStore + SettingsProvider + EntryCatalog {}

/// Hands out store handles, either for plain reads or inside a transaction.
///
/// Work done inside `transaction` is applied as a whole when the closure
/// returns `Ok`, and discarded when it returns `Err`.
pub trait StudyRepository: Send + Sync {
    fn read<T>(&self, f: impl FnOnce(&dyn StudyStores) -> StudyResult<T>) -> StudyResult<T>;

    fn transaction<T>(&self, f: impl FnOnce(&dyn StudyStores) -> StudyResult<T>) -> StudyResult<T>;
}

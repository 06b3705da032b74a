//! Data models for the study engine

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a card in the spaced repetition system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardState {
    /// Never reviewed
    New,
    /// In initial learning phase (sub-day steps)
    Learning,
    /// Regular spaced review (day intervals)
    Review,
    /// Lapsed from Review and re-learning
    Relearning,
}

impl Default for CardState {
    fn default() -> Self {
        Self::New
    }
}

impl CardState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Review => "review",
            Self::Relearning => "relearning",
        }
    }
}

impl fmt::Display for CardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CardState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "learning" => Ok(Self::Learning),
            "review" => Ok(Self::Review),
            "relearning" => Ok(Self::Relearning),
            other => Err(format!("unknown card state: {}", other)),
        }
    }
}

/// User-submitted review outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    /// Numeric rating used by the memory model (Again = 1 .. Easy = 4)
    pub fn value(&self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Map a UI rating (1-4) to a grade
    pub fn from_rating(rating: i64) -> Option<Self> {
        match rating {
            1 => Some(Self::Again),
            2 => Some(Self::Hard),
            3 => Some(Self::Good),
            4 => Some(Self::Easy),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Again => "again",
            Self::Hard => "hard",
            Self::Good => "good",
            Self::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(rating) = s.parse::<i64>() {
            return Self::from_rating(rating).ok_or_else(|| format!("grade out of range: {}", s));
        }
        match s.to_ascii_lowercase().as_str() {
            "again" => Ok(Self::Again),
            "hard" => Ok(Self::Hard),
            "good" => Ok(Self::Good),
            "easy" => Ok(Self::Easy),
            other => Err(format!("unknown grade: {}", other)),
        }
    }
}

/// Stability/difficulty pair tracked once a card has been reviewed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    /// Days until retrievability decays to the reference threshold
    pub stability: f64,
    /// Clamped to [1, 10]
    pub difficulty: f64,
}

/// Scheduling fields of a card.
///
/// This is the part of a card the scheduler reads and writes, and the part a
/// review log snapshots so the review can be undone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSchedule {
    pub state: CardState,
    /// Position within the learning/relearning step sequence
    #[serde(default)]
    pub step: u32,
    /// Unset while the card is New
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryState>,
    pub due: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub lapses: u32,
    #[serde(default)]
    pub scheduled_days: u32,
    #[serde(default)]
    pub elapsed_days: u32,
}

impl CardSchedule {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: CardState::New,
            step: 0,
            memory: None,
            due: now,
            last_review: None,
            reps: 0,
            lapses: 0,
            scheduled_days: 0,
            elapsed_days: 0,
        }
    }

    pub fn stability(&self) -> Option<f64> {
        self.memory.map(|m| m.stability)
    }

    pub fn difficulty(&self) -> Option<f64> {
        self.memory.map(|m| m.difficulty)
    }
}

/// A study card, one per (user, entry) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_id: Uuid,
    #[serde(flatten)]
    pub schedule: CardSchedule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    pub fn new(user_id: Uuid, entry_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            entry_id,
            schedule: CardSchedule::new(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> CardState {
        self.schedule.state
    }
}

/// Immutable record of a single review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub id: Uuid,
    pub card_id: Uuid,
    pub user_id: Uuid,
    pub grade: Grade,
    /// Card schedule before the review, restored on undo
    pub previous: CardSchedule,
    pub stability_after: f64,
    pub difficulty_after: f64,
    /// Days since the previous review
    pub elapsed_days: u32,
    /// Interval chosen by the review (0 while in learning steps)
    pub scheduled_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u32>,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewLog {
    pub fn previous_state(&self) -> CardState {
        self.previous.state
    }
}

/// Status of a study session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Finished,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finished => "finished",
            Self::Abandoned => "abandoned",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "finished" => Ok(Self::Finished),
            "abandoned" => Ok(Self::Abandoned),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

/// Per-grade counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCounts {
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl GradeCounts {
    pub fn record(&mut self, grade: Grade) {
        match grade {
            Grade::Again => self.again += 1,
            Grade::Hard => self.hard += 1,
            Grade::Good => self.good += 1,
            Grade::Easy => self.easy += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.again + self.hard + self.good + self.easy
    }

    /// Share of Good and Easy answers, in percent
    pub fn accuracy_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.good + self.easy) / f64::from(total) * 100.0
    }
}

/// Aggregated outcome of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub total_reviewed: u32,
    pub new_reviewed: u32,
    pub due_reviewed: u32,
    pub grade_counts: GradeCounts,
    pub duration_ms: i64,
    pub accuracy_rate: f64,
}

/// A user's study session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_reviewed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
}

impl StudySession {
    pub fn start(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            status: SessionStatus::Active,
            started_at: now,
            finished_at: None,
            total_reviewed: 0,
            result: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Per-user study preferences, owned by the profile subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Hard cap on new cards introduced per local day
    #[serde(default = "default_new_cards_per_day")]
    pub new_cards_per_day: u32,
    /// Informational goal only; never caps the queue
    #[serde(default = "default_reviews_per_day")]
    pub reviews_per_day: u32,
    #[serde(default = "default_max_interval_days")]
    pub max_interval_days: u32,
    #[serde(default = "default_desired_retention")]
    pub desired_retention: f64,
    /// IANA zone name, e.g. "Europe/Berlin"
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_new_cards_per_day() -> u32 {
    20
}

fn default_reviews_per_day() -> u32 {
    200
}

fn default_max_interval_days() -> u32 {
    365
}

fn default_desired_retention() -> f64 {
    0.9
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            new_cards_per_day: default_new_cards_per_day(),
            reviews_per_day: default_reviews_per_day(),
            max_interval_days: default_max_interval_days(),
            desired_retention: default_desired_retention(),
            timezone: default_timezone(),
        }
    }
}

/// Card counts per lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStateCounts {
    pub new: usize,
    pub learning: usize,
    pub review: usize,
    pub relearning: usize,
}

impl CardStateCounts {
    pub fn total(&self) -> usize {
        self.new + self.learning + self.review + self.relearning
    }
}

/// Aggregated study statistics for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub due_count: usize,
    pub new_count: usize,
    pub reviewed_today: usize,
    pub new_today: usize,
    pub streak_days: u32,
    pub state_counts: CardStateCounts,
    pub overdue_count: usize,
    pub reviews_per_day_goal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_session: Option<Uuid>,
}

/// Statistics for a single card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardStats {
    pub total_reviews: usize,
    pub accuracy_rate: f64,
    pub grade_counts: GradeCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_duration_ms: Option<u32>,
    pub schedule: CardSchedule,
}

/// A page of review history for one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardHistory {
    pub logs: Vec<ReviewLog>,
    pub total: usize,
}

/// What each grade would do to a card, without persisting anything
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPreview {
    pub card_id: Uuid,
    pub again: CardSchedule,
    pub hard: CardSchedule,
    pub good: CardSchedule,
    pub easy: CardSchedule,
}

impl ReviewPreview {
    pub fn for_grade(&self, grade: Grade) -> &CardSchedule {
        match grade {
            Grade::Again => &self.again,
            Grade::Hard => &self.hard,
            Grade::Good => &self.good,
            Grade::Easy => &self.easy,
        }
    }
}

/// Why a batch entry failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateError {
    pub entry_id: Uuid,
    pub reason: String,
}

/// Outcome of a batch card creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCreateResult {
    pub created: Vec<Uuid>,
    pub skipped_existing: Vec<Uuid>,
    pub skipped_no_senses: Vec<Uuid>,
    pub errors: Vec<BatchCreateError>,
}

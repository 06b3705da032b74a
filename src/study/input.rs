//! Request inputs and their validation

use uuid::Uuid;

use super::config::SrsConfig;
use super::error::{FieldErrors, StudyError, StudyResult};
use super::models::Grade;

/// Longest review duration accepted on a log (10 minutes)
pub const MAX_REVIEW_DURATION_MS: u32 = 600_000;

fn require_id(errs: &mut FieldErrors, field: &str, id: Uuid) {
    if id.is_nil() {
        errs.add(field, "required");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetQueueInput {
    /// Defaults to the configured queue limit
    pub limit: Option<u32>,
}

impl GetQueueInput {
    pub fn with_limit(limit: u32) -> Self {
        Self { limit: Some(limit) }
    }

    pub(crate) fn resolve_limit(&self, config: &SrsConfig) -> StudyResult<usize> {
        let mut errs = FieldErrors::default();
        match self.limit {
            Some(0) => errs.add("limit", "must be at least 1"),
            Some(limit) if limit > config.max_queue_limit => {
                errs.add("limit", format!("must be at most {}", config.max_queue_limit))
            }
            _ => {}
        }
        errs.into_result()?;
        Ok(self.limit.unwrap_or(config.default_queue_limit) as usize)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReviewCardInput {
    pub card_id: Uuid,
    pub grade: Grade,
    pub duration_ms: Option<u32>,
}

impl ReviewCardInput {
    pub fn new(card_id: Uuid, grade: Grade) -> Self {
        Self {
            card_id,
            grade,
            duration_ms: None,
        }
    }

    /// Build from a raw grade string such as `"good"` or `"3"`
    pub fn parse(card_id: Uuid, grade: &str) -> StudyResult<Self> {
        let grade = grade
            .parse::<Grade>()
            .map_err(|_| StudyError::validation("grade", "must be again, hard, good or easy"))?;
        Ok(Self::new(card_id, grade))
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub(crate) fn validate(&self) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        require_id(&mut errs, "card_id", self.card_id);
        if let Some(ms) = self.duration_ms {
            if ms > MAX_REVIEW_DURATION_MS {
                errs.add("duration_ms", "max 10 minutes");
            }
        }
        errs.into_result()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CardInput {
    pub card_id: Uuid,
}

impl CardInput {
    pub fn new(card_id: Uuid) -> Self {
        Self { card_id }
    }

    pub(crate) fn validate(&self) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        require_id(&mut errs, "card_id", self.card_id);
        errs.into_result()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CreateCardInput {
    pub entry_id: Uuid,
}

impl CreateCardInput {
    pub fn new(entry_id: Uuid) -> Self {
        Self { entry_id }
    }

    pub(crate) fn validate(&self) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        require_id(&mut errs, "entry_id", self.entry_id);
        errs.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchCreateCardsInput {
    pub entry_ids: Vec<Uuid>,
}

impl BatchCreateCardsInput {
    pub(crate) fn validate(&self, config: &SrsConfig) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        if self.entry_ids.is_empty() {
            errs.add("entry_ids", "required (at least 1)");
        } else if self.entry_ids.len() > config.max_batch_size {
            errs.add("entry_ids", format!("too many (max {})", config.max_batch_size));
        }
        errs.into_result()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FinishSessionInput {
    pub session_id: Uuid,
}

impl FinishSessionInput {
    pub fn new(session_id: Uuid) -> Self {
        Self { session_id }
    }

    pub(crate) fn validate(&self) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        require_id(&mut errs, "session_id", self.session_id);
        errs.into_result()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CardHistoryInput {
    pub card_id: Uuid,
    /// 0 means the default page size of 50
    pub limit: u32,
    pub offset: u32,
}

impl CardHistoryInput {
    pub fn new(card_id: Uuid) -> Self {
        Self {
            card_id,
            limit: 0,
            offset: 0,
        }
    }

    pub(crate) fn validate(&self, config: &SrsConfig) -> StudyResult<()> {
        let mut errs = FieldErrors::default();
        require_id(&mut errs, "card_id", self.card_id);
        if self.limit > config.max_queue_limit {
            errs.add("limit", format!("must be at most {}", config.max_queue_limit));
        }
        errs.into_result()
    }

    pub(crate) fn page_size(&self) -> usize {
        if self.limit == 0 {
            50
        } else {
            self.limit as usize
        }
    }
}

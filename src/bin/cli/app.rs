use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lexis_lib::study::{
    Clock, ManualClock, RequestContext, SqliteStudyStore, SrsConfig, StudyService, SystemClock,
};

/// Shared application state for CLI commands
pub struct App {
    pub service: StudyService<SqliteStudyStore>,
    pub ctx: RequestContext,
    pub clock: Arc<dyn Clock>,
}

impl App {
    /// Open the study database and load the scheduler config
    pub fn new(
        db: Option<PathBuf>,
        config: Option<&Path>,
        user: Option<Uuid>,
        at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let db_path = match db {
            Some(path) => path,
            None => Self::default_db_path()?,
        };
        let store = SqliteStudyStore::open(&db_path)
            .with_context(|| format!("Failed to open study database {}", db_path.display()))?;

        let config = match config {
            Some(path) => SrsConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => SrsConfig::default(),
        };

        let clock: Arc<dyn Clock> = match at {
            Some(at) => Arc::new(ManualClock::new(at)),
            None => Arc::new(SystemClock),
        };

        let user_id = user.unwrap_or_else(Self::local_user);
        Ok(Self {
            service: StudyService::new(store, clock.clone(), config),
            ctx: RequestContext::for_user(user_id),
            clock,
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Failed to get data directory")?;
        Ok(data_dir.join("lexis").join("study.db"))
    }

    /// Stable id for the single local user
    fn local_user() -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, b"lexis-local-user")
    }

    pub fn user_id(&self) -> Uuid {
        self.ctx.user_id.unwrap_or_else(Self::local_user)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> &SqliteStudyStore {
        self.service.repository()
    }
}

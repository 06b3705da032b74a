//! Study service: the engine's in-process API
//!
//! Operations live in sibling modules (`queue`, `review`, `undo`, `session`,
//! `cards`, `dashboard`) as `impl` blocks on [`StudyService`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

use super::clock::Clock;
use super::config::SrsConfig;
use super::context::RequestContext;
use super::error::{StudyError, StudyResult};
use super::fsrs::SchedulerParams;
use super::models::{Card, UserSettings};
use super::store::{CardStore, SettingsProvider, StudyRepository, StudyStores};
use super::timezone::parse_timezone;

pub struct StudyService<R: StudyRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    config: SrsConfig,
}

impl<R: StudyRepository> StudyService<R> {
    pub fn new(repo: R, clock: Arc<dyn Clock>, config: SrsConfig) -> Self {
        Self { repo, clock, config }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &SrsConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resolve the caller and check the request deadline
    pub(crate) fn begin(&self, ctx: &RequestContext) -> StudyResult<Uuid> {
        ctx.begin(self.clock.as_ref())
    }

    /// The user's settings, or defaults from config for users who never saved any
    pub(crate) fn settings_for(&self, stores: &dyn StudyStores, user_id: Uuid) -> StudyResult<UserSettings> {
        Ok(stores.get_settings(user_id)?.unwrap_or_else(|| UserSettings {
            new_cards_per_day: self.config.new_cards_per_day,
            reviews_per_day: self.config.reviews_per_day,
            max_interval_days: self.config.max_interval_days,
            desired_retention: self.config.default_retention,
            ..UserSettings::default()
        }))
    }

    pub(crate) fn scheduler_params(&self, settings: &UserSettings) -> SchedulerParams {
        SchedulerParams::new(&self.config, settings.desired_retention, settings.max_interval_days)
    }

    pub(crate) fn timezone(&self, settings: &UserSettings) -> Tz {
        parse_timezone(&settings.timezone)
    }

    /// Load a card owned by `user_id`; other users' cards are reported missing
    pub(crate) fn owned_card(&self, stores: &dyn StudyStores, user_id: Uuid, card_id: Uuid) -> StudyResult<Card> {
        stores
            .get_card(user_id, card_id)?
            .ok_or_else(|| StudyError::NotFound(format!("card {}", card_id)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the service tests

    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use crate::study::clock::{Clock, ManualClock};
    use crate::study::config::SrsConfig;
    use crate::study::context::RequestContext;
    use crate::study::storage::SqliteStudyStore;

    use super::StudyService;

    pub struct Harness {
        pub service: StudyService<SqliteStudyStore>,
        pub clock: Arc<ManualClock>,
        pub user: Uuid,
        pub ctx: RequestContext,
    }

    pub fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    pub fn harness() -> Harness {
        harness_with(SrsConfig {
            enable_fuzz: false,
            ..SrsConfig::default()
        })
    }

    pub fn harness_with(config: SrsConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(start_time()));
        let store = SqliteStudyStore::open_in_memory().unwrap();
        let service = StudyService::new(store, clock.clone(), config);
        let user = Uuid::new_v4();
        Harness {
            service,
            clock,
            user,
            ctx: RequestContext::for_user(user),
        }
    }

    impl Harness {
        pub fn store(&self) -> &SqliteStudyStore {
            self.service.repository()
        }

        /// Add an entry for the harness user, stamped with the manual clock
        pub fn add_entry(&self, text: &str, senses: u32) -> Uuid {
            self.store()
                .add_entry(self.user, text, senses, self.clock.now())
                .unwrap()
        }

        /// Add an entry with one sense and a card for it
        pub fn new_card(&self, text: &str) -> Uuid {
            let entry_id = self.add_entry(text, 1);
            self.service
                .create_card(&self.ctx, crate::study::input::CreateCardInput { entry_id })
                .unwrap()
                .id
        }
    }
}

//! Study sessions

use chrono::{DateTime, Utc};

use super::context::RequestContext;
use super::error::{StudyError, StudyResult};
use super::input::FinishSessionInput;
use super::models::{CardState, GradeCounts, ReviewLog, SessionResult, SessionStatus, StudySession};
use super::service::StudyService;
use super::store::{ReviewLogStore, SessionStore, StudyRepository, StudyStores};

/// Summarize the reviews made between `started_at` and `now`
fn aggregate_session_result(logs: &[ReviewLog], started_at: DateTime<Utc>, now: DateTime<Utc>) -> SessionResult {
    let mut grade_counts = GradeCounts::default();
    let mut new_reviewed = 0;
    for log in logs {
        grade_counts.record(log.grade);
        if log.previous_state() == CardState::New {
            new_reviewed += 1;
        }
    }
    let total_reviewed = grade_counts.total();
    SessionResult {
        total_reviewed,
        new_reviewed,
        due_reviewed: total_reviewed - new_reviewed,
        grade_counts,
        duration_ms: (now - started_at).num_milliseconds(),
        accuracy_rate: grade_counts.accuracy_rate(),
    }
}

impl<R: StudyRepository> StudyService<R> {
    /// The user's active session, if any
    pub fn get_active_session(&self, ctx: &RequestContext) -> StudyResult<Option<StudySession>> {
        let user_id = self.begin(ctx)?;
        self.repository().read(|stores| stores.get_active_session(user_id))
    }

    /// Start a session; fails with `AlreadyExists` while another one is active
    pub fn start_session(&self, ctx: &RequestContext) -> StudyResult<StudySession> {
        let user_id = self.begin(ctx)?;
        let session = StudySession::start(user_id, self.now());

        self.repository().transaction(|stores| {
            if stores.get_active_session(user_id)?.is_some() {
                return Err(StudyError::AlreadyExists("active session".to_string()));
            }
            // The store's uniqueness constraint catches a concurrent start
            stores.create_session(&session)
        })?;

        log::info!("Started session {} for {}", session.id, user_id);
        Ok(session)
    }

    /// Finish an active session by id, storing its aggregated result
    pub fn finish_session(&self, ctx: &RequestContext, input: FinishSessionInput) -> StudyResult<StudySession> {
        let user_id = self.begin(ctx)?;
        input.validate()?;
        let now = self.now();

        let session = self.repository().transaction(|stores| {
            let session = stores
                .get_session(user_id, input.session_id)?
                .filter(StudySession::is_active)
                .ok_or_else(|| StudyError::NotFound(format!("active session {}", input.session_id)))?;
            Self::close_finished(stores, session, now)
        })?;

        log::info!("Finished session {} ({} reviews)", session.id, session.total_reviewed);
        Ok(session)
    }

    /// Finish whichever session is active
    pub fn finish_active_session(&self, ctx: &RequestContext) -> StudyResult<StudySession> {
        let user_id = self.begin(ctx)?;
        let now = self.now();

        let session = self.repository().transaction(|stores| {
            let session = stores
                .get_active_session(user_id)?
                .ok_or_else(|| StudyError::NotFound("active session".to_string()))?;
            Self::close_finished(stores, session, now)
        })?;

        log::info!("Finished session {} ({} reviews)", session.id, session.total_reviewed);
        Ok(session)
    }

    /// Abandon the active session without computing a result
    pub fn abandon_session(&self, ctx: &RequestContext) -> StudyResult<StudySession> {
        let user_id = self.begin(ctx)?;
        let now = self.now();

        let session = self.repository().transaction(|stores| {
            let mut session = stores
                .get_active_session(user_id)?
                .ok_or_else(|| StudyError::NotFound("active session".to_string()))?;
            session.status = SessionStatus::Abandoned;
            session.finished_at = Some(now);
            stores.update_session(&session)?;
            Ok(session)
        })?;

        log::info!("Abandoned session {} for {}", session.id, user_id);
        Ok(session)
    }

    fn close_finished(stores: &dyn StudyStores, mut session: StudySession, now: DateTime<Utc>) -> StudyResult<StudySession> {
        let logs = stores.logs_in_period(session.user_id, session.started_at, now)?;
        let result = aggregate_session_result(&logs, session.started_at, now);
        session.status = SessionStatus::Finished;
        session.finished_at = Some(now);
        session.total_reviewed = result.total_reviewed;
        session.result = Some(result);
        stores.update_session(&session)?;
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::study::input::ReviewCardInput;
    use crate::study::models::Grade;
    use crate::study::service::testing::{harness, start_time};

    #[test]
    fn test_start_session_twice_fails() {
        let h = harness();
        let first = h.service.start_session(&h.ctx).unwrap();
        assert!(first.is_active());

        let err = h.service.start_session(&h.ctx).unwrap_err();
        assert!(err.is_already_exists());

        let active = h.service.get_active_session(&h.ctx).unwrap().unwrap();
        assert_eq!(active.id, first.id);
    }

    #[test]
    fn test_sessions_are_per_user() {
        let h = harness();
        h.service.start_session(&h.ctx).unwrap();
        let other = RequestContext::for_user(Uuid::new_v4());
        h.service.start_session(&other).unwrap();
        assert!(h.service.get_active_session(&other).unwrap().is_some());
    }

    #[test]
    fn test_finish_aggregates_reviews() {
        let h = harness();
        let a = h.new_card("dog");
        let b = h.new_card("cat");
        let session = h.service.start_session(&h.ctx).unwrap();

        h.clock.advance(Duration::seconds(30));
        h.service.review_card(&h.ctx, ReviewCardInput::new(a, Grade::Good)).unwrap();
        h.service.review_card(&h.ctx, ReviewCardInput::new(b, Grade::Again)).unwrap();
        h.clock.advance(Duration::minutes(10));
        h.service.review_card(&h.ctx, ReviewCardInput::new(a, Grade::Good)).unwrap();

        let finished = h
            .service
            .finish_session(&h.ctx, FinishSessionInput::new(session.id))
            .unwrap();
        assert_eq!(finished.status, SessionStatus::Finished);
        assert_eq!(finished.finished_at, Some(start_time() + Duration::seconds(630)));

        let result = finished.result.unwrap();
        assert_eq!(result.total_reviewed, 3);
        assert_eq!(result.new_reviewed, 2);
        assert_eq!(result.due_reviewed, 1);
        assert_eq!(result.grade_counts.good, 2);
        assert_eq!(result.grade_counts.again, 1);
        assert_eq!(result.duration_ms, 630_000);
        assert!((result.accuracy_rate - 200.0 / 3.0).abs() < 1e-9);

        assert!(h.service.get_active_session(&h.ctx).unwrap().is_none());
    }

    #[test]
    fn test_reviews_before_session_are_not_counted() {
        let h = harness();
        let card = h.new_card("fox");
        h.service.review_card(&h.ctx, ReviewCardInput::new(card, Grade::Good)).unwrap();
        h.clock.advance(Duration::minutes(1));
        h.service.start_session(&h.ctx).unwrap();

        let finished = h.service.finish_active_session(&h.ctx).unwrap();
        assert_eq!(finished.result.unwrap().total_reviewed, 0);
    }

    #[test]
    fn test_finish_twice_is_not_found() {
        let h = harness();
        let session = h.service.start_session(&h.ctx).unwrap();
        h.service
            .finish_session(&h.ctx, FinishSessionInput::new(session.id))
            .unwrap();

        let err = h
            .service
            .finish_session(&h.ctx, FinishSessionInput::new(session.id))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(h.service.finish_active_session(&h.ctx).unwrap_err().is_not_found());
    }

    #[test]
    fn test_finish_foreign_session_is_not_found() {
        let h = harness();
        let session = h.service.start_session(&h.ctx).unwrap();
        let other = RequestContext::for_user(Uuid::new_v4());
        let err = h
            .service
            .finish_session(&other, FinishSessionInput::new(session.id))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_abandon_session() {
        let h = harness();
        assert!(h.service.abandon_session(&h.ctx).unwrap_err().is_not_found());

        let started = h.service.start_session(&h.ctx).unwrap();
        let abandoned = h.service.abandon_session(&h.ctx).unwrap();
        assert_eq!(abandoned.id, started.id);
        assert_eq!(abandoned.status, SessionStatus::Abandoned);
        assert!(abandoned.result.is_none());

        assert!(h.service.abandon_session(&h.ctx).unwrap_err().is_not_found());
        let err = h
            .service
            .finish_session(&h.ctx, FinishSessionInput::new(started.id))
            .unwrap_err();
        assert!(err.is_not_found());

        // A new session can start once the old one is closed
        h.service.start_session(&h.ctx).unwrap();
    }

    #[test]
    fn test_aggregate_empty_period() {
        let result = aggregate_session_result(&[], start_time(), start_time() + Duration::minutes(1));
        assert_eq!(result.total_reviewed, 0);
        assert_eq!(result.accuracy_rate, 0.0);
        assert_eq!(result.duration_ms, 60_000);
    }
}

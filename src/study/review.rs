//! Reviewing a card

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::context::RequestContext;
use super::error::StudyResult;
use super::fsrs;
use super::input::{CardInput, ReviewCardInput};
use super::models::{Card, ReviewLog, ReviewPreview};
use super::service::StudyService;
use super::store::{CardStore, ReviewLogStore, SessionStore, StudyRepository};

/// Whole days between the last review and `now`
fn elapsed_days(last_review: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
    match last_review {
        Some(last) => (now - last).num_days().clamp(0, i64::from(u32::MAX)) as u32,
        None => 0,
    }
}

impl<R: StudyRepository> StudyService<R> {
    /// Grade a card, persisting the new schedule together with its review log.
    ///
    /// The active session, if any, has its review counter bumped afterwards;
    /// a failure there is logged and does not fail the review.
    pub fn review_card(&self, ctx: &RequestContext, input: ReviewCardInput) -> StudyResult<Card> {
        let user_id = self.begin(ctx)?;
        input.validate()?;
        let now = self.now();

        let (card, log) = self.repository().transaction(|stores| {
            let mut card = self.owned_card(stores, user_id, input.card_id)?;
            let settings = self.settings_for(stores, user_id)?;
            let params = self.scheduler_params(&settings);

            let mut current = card.schedule.clone();
            current.elapsed_days = elapsed_days(current.last_review, now);
            let next = fsrs::review(&params, &current, input.grade, now);
            let (stability_after, difficulty_after) = next
                .memory
                .map(|m| (m.stability, m.difficulty))
                .unwrap_or_default();

            let log = ReviewLog {
                id: Uuid::new_v4(),
                card_id: card.id,
                user_id,
                grade: input.grade,
                previous: card.schedule.clone(),
                stability_after,
                difficulty_after,
                elapsed_days: current.elapsed_days,
                scheduled_days: next.scheduled_days,
                duration_ms: input.duration_ms,
                reviewed_at: now,
            };

            card.schedule = next;
            card.updated_at = now;
            stores.update_card(&card)?;
            stores.insert_log(&log)?;
            Ok((card, log))
        })?;

        log::info!(
            "Reviewed card {} ({}): {} -> {}, stability {:.2}, interval {}d",
            card.id,
            log.grade,
            log.previous_state(),
            card.state(),
            log.stability_after,
            card.schedule.scheduled_days
        );

        let bumped = self.repository().transaction(|stores| {
            if let Some(mut session) = stores.get_active_session(user_id)? {
                session.total_reviewed += 1;
                stores.update_session(&session)?;
            }
            Ok(())
        });
        if let Err(e) = bumped {
            log::warn!("Failed to update session counter for {}: {}", user_id, e);
        }

        Ok(card)
    }

    /// What each grade would do to the card right now, without saving anything
    pub fn preview_review(&self, ctx: &RequestContext, input: CardInput) -> StudyResult<ReviewPreview> {
        let user_id = self.begin(ctx)?;
        input.validate()?;
        let now = self.now();

        self.repository().read(|stores| {
            let card = self.owned_card(stores, user_id, input.card_id)?;
            let settings = self.settings_for(stores, user_id)?;
            let params = self.scheduler_params(&settings);

            let mut current = card.schedule.clone();
            current.elapsed_days = elapsed_days(current.last_review, now);
            let [again, hard, good, easy] = fsrs::preview(&params, &current, now);
            Ok(ReviewPreview {
                card_id: card.id,
                again,
                hard,
                good,
                easy,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use super::*;
    use crate::study::error::StudyError;
    use crate::study::input::GetQueueInput;
    use crate::study::models::{CardState, Grade};
    use crate::study::service::testing::{harness, start_time};

    #[test]
    fn test_elapsed_days() {
        let now = start_time();
        assert_eq!(elapsed_days(None, now), 0);
        assert_eq!(elapsed_days(Some(now - Duration::hours(47)), now), 1);
        assert_eq!(elapsed_days(Some(now - Duration::days(10)), now), 10);
        assert_eq!(elapsed_days(Some(now + Duration::days(1)), now), 0);
    }

    #[test]
    fn test_review_persists_card_and_log_together() {
        let h = harness();
        let card_id = h.new_card("house");

        let card = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good).with_duration(3500))
            .unwrap();
        assert_eq!(card.state(), CardState::Learning);
        assert_eq!(card.schedule.reps, 1);

        let stored = h.store().read(|s| s.get_card(h.user, card_id)).unwrap().unwrap();
        assert_eq!(stored, card);

        let log = h.store().read(|s| s.most_recent_log(card_id)).unwrap().unwrap();
        assert_eq!(log.grade, Grade::Good);
        assert_eq!(log.previous_state(), CardState::New);
        assert_eq!(log.duration_ms, Some(3500));
        assert_eq!(log.reviewed_at, start_time());
        assert_eq!(Some(log.stability_after), card.schedule.stability());
    }

    #[test]
    fn test_two_good_reviews_graduate_new_card() {
        let h = harness();
        let card_id = h.new_card("tree");

        h.service.review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good)).unwrap();
        h.clock.advance(Duration::minutes(10));
        let card = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good))
            .unwrap();

        assert_eq!(card.state(), CardState::Review);
        assert!(card.schedule.scheduled_days >= 1);
        assert!(card.schedule.stability().unwrap() > 0.0);
    }

    #[test]
    fn test_reviewed_card_leaves_queue() {
        let h = harness();
        let card_id = h.new_card("sky");
        h.service.review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Easy)).unwrap();

        let queue = h.service.get_study_queue(&h.ctx, GetQueueInput::default()).unwrap();
        assert!(queue.iter().all(|c| c.id != card_id));
    }

    #[test]
    fn test_repeated_good_pushes_due_later() {
        let h = harness();
        let card_id = h.new_card("river");
        let mut card = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Easy))
            .unwrap();
        assert_eq!(card.state(), CardState::Review);

        for _ in 0..3 {
            let previous_due = card.schedule.due;
            let previous_interval = card.schedule.scheduled_days;
            h.clock.set(previous_due);
            card = h
                .service
                .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good))
                .unwrap();
            assert!(card.schedule.due > previous_due);
            assert!(card.schedule.scheduled_days > previous_interval);
        }
    }

    #[test]
    fn test_again_on_review_card_relearns() {
        let h = harness();
        let card_id = h.new_card("cloud");
        let graduated = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Easy))
            .unwrap();
        let stability_before = graduated.schedule.stability().unwrap();

        h.clock.set(graduated.schedule.due);
        let lapsed = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Again))
            .unwrap();
        assert_eq!(lapsed.state(), CardState::Relearning);
        assert_eq!(lapsed.schedule.lapses, 1);
        assert!(lapsed.schedule.stability().unwrap() < stability_before);
    }

    #[test]
    fn test_review_of_foreign_or_missing_card_is_not_found() {
        let h = harness();
        let card_id = h.new_card("stone");

        let stranger = RequestContext::for_user(Uuid::new_v4());
        let err = h
            .service
            .review_card(&stranger, ReviewCardInput::new(card_id, Grade::Good))
            .unwrap_err();
        assert!(err.is_not_found());

        let err = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(Uuid::new_v4(), Grade::Good))
            .unwrap_err();
        assert!(err.is_not_found());

        // The owner's card is untouched
        let card = h.store().read(|s| s.get_card(h.user, card_id)).unwrap().unwrap();
        assert_eq!(card.state(), CardState::New);
    }

    #[test]
    fn test_review_requires_user() {
        let h = harness();
        let card_id = h.new_card("wind");
        let err = h
            .service
            .review_card(&RequestContext::anonymous(), ReviewCardInput::new(card_id, Grade::Good))
            .unwrap_err();
        assert!(matches!(err, StudyError::Unauthorized));
    }

    #[test]
    fn test_review_rejects_long_duration() {
        let h = harness();
        let card_id = h.new_card("rain");
        let err = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good).with_duration(600_001))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_review_without_session_still_succeeds() {
        let h = harness();
        let card_id = h.new_card("snow");
        assert!(h.service.get_active_session(&h.ctx).unwrap().is_none());
        h.service.review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Hard)).unwrap();
    }

    #[test]
    fn test_review_bumps_active_session() {
        let h = harness();
        let card_id = h.new_card("moon");
        h.service.start_session(&h.ctx).unwrap();
        h.service.review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good)).unwrap();
        h.service.review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good)).unwrap();

        let session = h.service.get_active_session(&h.ctx).unwrap().unwrap();
        assert_eq!(session.total_reviewed, 2);
    }

    #[test]
    fn test_preview_matches_review_and_saves_nothing() {
        let h = harness();
        let card_id = h.new_card("star");

        let preview = h.service.preview_review(&h.ctx, CardInput::new(card_id)).unwrap();
        assert_eq!(preview.again.state, CardState::Learning);
        assert_eq!(preview.easy.state, CardState::Review);
        assert!(preview.easy.due > preview.good.due);

        let card = h.store().read(|s| s.get_card(h.user, card_id)).unwrap().unwrap();
        assert_eq!(card.state(), CardState::New);
        assert!(h.store().read(|s| s.most_recent_log(card_id)).unwrap().is_none());

        let reviewed = h
            .service
            .review_card(&h.ctx, ReviewCardInput::new(card_id, Grade::Good))
            .unwrap();
        assert_eq!(&reviewed.schedule, preview.for_grade(Grade::Good));
    }
}

//! Undoing the latest review of a card

use super::context::RequestContext;
use super::error::{StudyError, StudyResult};
use super::input::CardInput;
use super::models::Card;
use super::service::StudyService;
use super::store::{CardStore, ReviewLogStore, SessionStore, StudyRepository};

impl<R: StudyRepository> StudyService<R> {
    /// Restore the card to its state before its most recent review and drop
    /// that review's log.
    ///
    /// Fails with a validation error when the card has nothing to undo, when
    /// the latest review was already undone, or once the undo window has passed.
    pub fn undo_review(&self, ctx: &RequestContext, input: CardInput) -> StudyResult<Card> {
        let user_id = self.begin(ctx)?;
        input.validate()?;
        let now = self.now();
        let window = self.config().undo_window();

        let (card, log) = self.repository().transaction(|stores| {
            let mut card = self.owned_card(stores, user_id, input.card_id)?;
            let log = stores
                .most_recent_log(card.id)?
                .ok_or_else(|| StudyError::validation("card_id", "card has no reviews to undo"))?;

            // The card must not have changed since this review
            if card.updated_at != log.reviewed_at {
                return Err(StudyError::validation("review", "review cannot be undone"));
            }
            if now - log.reviewed_at > window {
                return Err(StudyError::validation("review", "undo window expired"));
            }

            card.schedule = log.previous.clone();
            card.updated_at = now;
            stores.update_card(&card)?;
            stores.delete_log(log.id)?;
            Ok((card, log))
        })?;

        log::info!(
            "Undid {} review of card {}, restored state {}",
            log.grade,
            card.id,
            card.state()
        );

        let adjusted = self.repository().transaction(|stores| {
            if let Some(mut session) = stores.get_active_session(user_id)? {
                if log.reviewed_at >= session.started_at {
                    session.total_reviewed = session.total_reviewed.saturating_sub(1);
                    stores.update_session(&session)?;
                }
            }
            Ok(())
        });
        if let Err(e) = adjusted {
            log::warn!("Failed to update session counter for {}: {}", user_id, e);
        }

        Ok(card)
    }
}

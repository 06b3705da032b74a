//! Daily study queue

use super::context::RequestContext;
use super::error::StudyResult;
use super::input::GetQueueInput;
use super::models::Card;
use super::service::StudyService;
use super::store::{CardStore, ReviewLogStore, StudyRepository};
use super::timezone::day_start;

impl<R: StudyRepository> StudyService<R> {
    /// Due cards (oldest first), then new cards up to the remaining daily budget.
    ///
    /// Due cards are never held back by `reviews_per_day`.
    pub fn get_study_queue(&self, ctx: &RequestContext, input: GetQueueInput) -> StudyResult<Vec<Card>> {
        let user_id = self.begin(ctx)?;
        let limit = input.resolve_limit(self.config())?;
        let now = self.now();

        self.repository().read(|stores| {
            let settings = self.settings_for(stores, user_id)?;
            let today = day_start(now, self.timezone(&settings));
            let new_today = stores.count_new_reviewed_since(user_id, today)?;

            let mut queue = stores.get_due_cards(user_id, now, limit)?;
            let due_count = queue.len();

            let slots = limit.saturating_sub(due_count);
            let budget = (settings.new_cards_per_day as usize).saturating_sub(new_today);
            let new_limit = slots.min(budget);
            if new_limit > 0 {
                queue.extend(stores.get_new_cards(user_id, new_limit)?);
            }

            log::info!(
                "Study queue for {}: {} due, {} new ({} new reviewed today)",
                user_id,
                due_count,
                queue.len() - due_count,
                new_today
            );
            Ok(queue)
        })
    }
}

//! Read-only statistics: dashboard, card history and card stats

use chrono::{Duration, NaiveDate};

use super::context::RequestContext;
use super::error::StudyResult;
use super::input::{CardHistoryInput, CardInput};
use super::models::{CardHistory, CardStats, Dashboard, GradeCounts};
use super::service::StudyService;
use super::store::{CardStore, ReviewLogStore, SessionStore, StudyRepository};
use super::timezone::{day_start, local_date};

/// How far back the streak looks
const STREAK_LOOKBACK_DAYS: i64 = 366;

/// Consecutive days with reviews, counting back from today, or from
/// yesterday if nothing has been reviewed yet today.
///
/// `days` must be distinct and sorted newest first.
fn calculate_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut expected = match days.first() {
        Some(first) if *first == today => today,
        Some(_) => today - Duration::days(1),
        None => return 0,
    };

    let mut streak = 0;
    for day in days {
        if *day != expected {
            break;
        }
        streak += 1;
        expected = expected - Duration::days(1);
    }
    streak
}

impl<R: StudyRepository> StudyService<R> {
    pub fn get_dashboard(&self, ctx: &RequestContext) -> StudyResult<Dashboard> {
        let user_id = self.begin(ctx)?;
        let now = self.now();

        let dashboard = self.repository().read(|stores| {
            let settings = self.settings_for(stores, user_id)?;
            let tz = self.timezone(&settings);
            let today_start = day_start(now, tz);

            let mut days: Vec<NaiveDate> = stores
                .review_times_since(user_id, now - Duration::days(STREAK_LOOKBACK_DAYS))?
                .into_iter()
                .map(|t| local_date(t, tz))
                .collect();
            days.dedup();

            let state_counts = stores.count_by_state(user_id)?;
            Ok(Dashboard {
                due_count: stores.count_due(user_id, now)?,
                new_count: state_counts.new,
                reviewed_today: stores.count_reviewed_since(user_id, today_start)?,
                new_today: stores.count_new_reviewed_since(user_id, today_start)?,
                streak_days: calculate_streak(&days, local_date(now, tz)),
                state_counts,
                overdue_count: stores.count_due(user_id, today_start)?,
                reviews_per_day_goal: settings.reviews_per_day,
                active_session: stores.get_active_session(user_id)?.map(|s| s.id),
            })
        })?;

        log::debug!(
            "Dashboard for {}: {} due, {} new, streak {}",
            user_id,
            dashboard.due_count,
            dashboard.new_count,
            dashboard.streak_days
        );
        Ok(dashboard)
    }

    /// A page of the card's reviews, newest first
    pub fn get_card_history(&self, ctx: &RequestContext, input: CardHistoryInput) -> StudyResult<CardHistory> {
        let user_id = self.begin(ctx)?;
        input.validate(self.config())?;

        self.repository().read(|stores| {
            let card = self.owned_card(stores, user_id, input.card_id)?;
            let logs = stores.logs_for_card(card.id, input.page_size(), input.offset as usize)?;
            let total = stores.count_logs_for_card(card.id)?;
            Ok(CardHistory { logs, total })
        })
    }

    pub fn get_card_stats(&self, ctx: &RequestContext, input: CardInput) -> StudyResult<CardStats> {
        let user_id = self.begin(ctx)?;
        input.validate()?;

        self.repository().read(|stores| {
            let card = self.owned_card(stores, user_id, input.card_id)?;
            let logs = stores.logs_for_card(card.id, usize::MAX, 0)?;

            let mut grade_counts = GradeCounts::default();
            let mut durations = Vec::new();
            for log in &logs {
                grade_counts.record(log.grade);
                durations.extend(log.duration_ms.map(u64::from));
            }
            let average_duration_ms = if durations.is_empty() {
                None
            } else {
                let total: u64 = durations.iter().sum();
                Some((total / durations.len() as u64) as u32)
            };

            Ok(CardStats {
                total_reviews: logs.len(),
                accuracy_rate: grade_counts.accuracy_rate(),
                grade_counts,
                average_duration_ms,
                schedule: card.schedule,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::study::input::ReviewCardInput;
    use crate::study::models::{CardState, Grade, UserSettings};
    use crate::study::service::testing::harness;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_streak_counts_from_today_or_yesterday() {
        let today = date(2026, 3, 10);
        assert_eq!(calculate_streak(&[], today), 0);
        assert_eq!(
            calculate_streak(&[date(2026, 3, 10), date(2026, 3, 9), date(2026, 3, 8)], today),
            3
        );
        assert_eq!(calculate_streak(&[date(2026, 3, 9), date(2026, 3, 8)], today), 2);
        assert_eq!(
            calculate_streak(&[date(2026, 3, 10), date(2026, 3, 8), date(2026, 3, 7)], today),
            1
        );
        assert_eq!(calculate_streak(&[date(2026, 3, 7)], today), 0);
    }

    #[test]
    fn test_dashboard_counts() {
        let h = harness();
        let a = h.new_card("north");
        let b = h.new_card("south");
        h.new_card("east");
        h.service.start_session(&h.ctx).unwrap();

        h.service.review_card(&h.ctx, ReviewCardInput::new(a, Grade::Again)).unwrap();
        h.service.review_card(&h.ctx, ReviewCardInput::new(b, Grade::Easy)).unwrap();
        h.clock.advance(Duration::minutes(5));
        h.service.review_card(&h.ctx, ReviewCardInput::new(a, Grade::Again)).unwrap();
        h.clock.advance(Duration::minutes(5));

        let dashboard = h.service.get_dashboard(&h.ctx).unwrap();
        assert_eq!(dashboard.due_count, 1);
        assert_eq!(dashboard.new_count, 1);
        assert_eq!(dashboard.reviewed_today, 3);
        assert_eq!(dashboard.new_today, 2);
        assert_eq!(dashboard.streak_days, 1);
        assert_eq!(dashboard.state_counts.learning, 1);
        assert_eq!(dashboard.state_counts.review, 1);
        assert_eq!(dashboard.overdue_count, 0);
        assert_eq!(dashboard.reviews_per_day_goal, 200);
        assert!(dashboard.active_session.is_some());
    }

    #[test]
    fn test_dashboard_streak_and_overdue_across_days() {
        let h = harness();
        h.store()
            .put_settings(
                h.user,
                &UserSettings {
                    timezone: "Europe/Berlin".to_string(),
                    ..UserSettings::default()
                },
            )
            .unwrap();
        let card = h.new_card("valley");
        h.service.review_card(&h.ctx, ReviewCardInput::new(card, Grade::Again)).unwrap();

        h.clock.advance(Duration::days(1));
        let other = h.new_card("hill");
        h.service.review_card(&h.ctx, ReviewCardInput::new(other, Grade::Easy)).unwrap();

        // Two days in a row, the learning card from yesterday is overdue
        let dashboard = h.service.get_dashboard(&h.ctx).unwrap();
        assert_eq!(dashboard.streak_days, 2);
        assert_eq!(dashboard.overdue_count, 1);
        assert_eq!(dashboard.reviewed_today, 1);

        // Skipping today keeps yesterday's streak alive
        h.clock.advance(Duration::days(1));
        assert_eq!(h.service.get_dashboard(&h.ctx).unwrap().streak_days, 2);

        h.clock.advance(Duration::days(1));
        assert_eq!(h.service.get_dashboard(&h.ctx).unwrap().streak_days, 0);
    }

    #[test]
    fn test_card_history_pages_newest_first() {
        let h = harness();
        let card = h.new_card("bridge");
        for grade in [Grade::Again, Grade::Good, Grade::Good] {
            h.service.review_card(&h.ctx, ReviewCardInput::new(card, grade)).unwrap();
            h.clock.advance(Duration::minutes(10));
        }

        let history = h.service.get_card_history(&h.ctx, CardHistoryInput::new(card)).unwrap();
        assert_eq!(history.total, 3);
        assert_eq!(history.logs.len(), 3);
        assert_eq!(history.logs[2].grade, Grade::Again);
        assert!(history.logs[0].reviewed_at > history.logs[1].reviewed_at);

        let page = h
            .service
            .get_card_history(
                &h.ctx,
                CardHistoryInput {
                    card_id: card,
                    limit: 1,
                    offset: 2,
                },
            )
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.logs.len(), 1);
        assert_eq!(page.logs[0].grade, Grade::Again);
    }

    #[test]
    fn test_card_stats() {
        let h = harness();
        let card = h.new_card("tower");
        h.service
            .review_card(&h.ctx, ReviewCardInput::new(card, Grade::Again).with_duration(3000))
            .unwrap();
        h.clock.advance(Duration::minutes(1));
        h.service
            .review_card(&h.ctx, ReviewCardInput::new(card, Grade::Good).with_duration(5000))
            .unwrap();
        h.clock.advance(Duration::minutes(10));
        h.service.review_card(&h.ctx, ReviewCardInput::new(card, Grade::Good)).unwrap();

        let stats = h.service.get_card_stats(&h.ctx, CardInput::new(card)).unwrap();
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.grade_counts.again, 1);
        assert_eq!(stats.grade_counts.good, 2);
        assert!((stats.accuracy_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.average_duration_ms, Some(4000));
        assert_eq!(stats.schedule.state, CardState::Review);
    }

    #[test]
    fn test_card_stats_without_reviews() {
        let h = harness();
        let card = h.new_card("gate");
        let stats = h.service.get_card_stats(&h.ctx, CardInput::new(card)).unwrap();
        assert_eq!(stats.total_reviews, 0);
        assert_eq!(stats.accuracy_rate, 0.0);
        assert!(stats.average_duration_ms.is_none());
    }

    #[test]
    fn test_foreign_card_history_is_not_found() {
        let h = harness();
        let card = h.new_card("wall");
        let other = RequestContext::for_user(Uuid::new_v4());
        assert!(h
            .service
            .get_card_history(&other, CardHistoryInput::new(card))
            .unwrap_err()
            .is_not_found());
        assert!(h
            .service
            .get_card_stats(&other, CardInput::new(card))
            .unwrap_err()
            .is_not_found());
    }
}

//! Card state machine driven by the FSRS memory model
//!
//! New → Learning → Review ⇄ Relearning. New and stepping cards move through
//! the configured sub-day steps; Review cards get day intervals from the
//! memory model.

use chrono::{DateTime, Duration, Utc};

use super::algorithm::*;
use super::fuzz::{apply_fuzz, fuzz_seed};
use crate::study::config::{SrsConfig, StepSequence};
use crate::study::models::{CardSchedule, CardState, Grade, MemoryState};

/// Parameters for a single scheduling decision
#[derive(Debug, Clone)]
pub struct SchedulerParams {
    pub weights: Weights,
    pub desired_retention: f64,
    pub max_interval_days: u32,
    pub enable_fuzz: bool,
    pub learning_steps: Vec<Duration>,
    pub relearning_steps: Vec<Duration>,
}

impl SchedulerParams {
    /// Combine global config with a user's retention and interval ceiling
    pub fn new(config: &SrsConfig, desired_retention: f64, user_max_interval: u32) -> Self {
        let desired_retention = if desired_retention > 0.0 && desired_retention < 1.0 {
            desired_retention
        } else {
            config.default_retention
        };
        Self {
            weights: config.weights,
            desired_retention,
            max_interval_days: config
                .max_interval_days
                .min(user_max_interval)
                .clamp(1, MAX_INTERVAL_DAYS),
            enable_fuzz: config.enable_fuzz,
            learning_steps: steps_or(&config.learning_steps, Duration::minutes(1)),
            relearning_steps: steps_or(&config.relearning_steps, Duration::minutes(10)),
        }
    }
}

impl Default for SchedulerParams {
    fn default() -> Self {
        let config = SrsConfig::default();
        Self::new(&config, config.default_retention, config.max_interval_days)
    }
}

fn steps_or(steps: &StepSequence, fallback: Duration) -> Vec<Duration> {
    if steps.is_empty() {
        vec![fallback]
    } else {
        steps.steps().to_vec()
    }
}

/// Compute the schedule that results from reviewing `card` with `grade` at `now`.
///
/// `card.elapsed_days` must hold the whole days since the last review.
pub fn review(params: &SchedulerParams, card: &CardSchedule, grade: Grade, now: DateTime<Utc>) -> CardSchedule {
    let mut next = card.clone();
    next.reps += 1;
    next.last_review = Some(now);

    match card.state {
        CardState::New => review_new(params, next, grade, now),
        CardState::Learning => review_stepping(params, next, grade, now, &params.learning_steps),
        CardState::Relearning => review_stepping(params, next, grade, now, &params.relearning_steps),
        CardState::Review => review_review(params, next, grade, now),
    }
}

/// Schedules for all four grades, in Again/Hard/Good/Easy order
pub fn preview(params: &SchedulerParams, card: &CardSchedule, now: DateTime<Utc>) -> [CardSchedule; 4] {
    Grade::ALL.map(|grade| review(params, card, grade, now))
}

fn review_new(params: &SchedulerParams, mut card: CardSchedule, grade: Grade, now: DateTime<Utc>) -> CardSchedule {
    let w = &params.weights;
    let memory = MemoryState {
        stability: initial_stability(w, grade),
        difficulty: initial_difficulty(w, grade),
    };
    card.memory = Some(memory);
    let steps = &params.learning_steps;

    match grade {
        Grade::Again => step_to(card, CardState::Learning, 0, now + steps[0]),
        Grade::Hard => {
            let delay = match steps.get(1) {
                Some(second) => (steps[0] + *second) / 2,
                None => steps[0],
            };
            step_to(card, CardState::Learning, 0, now + delay)
        }
        Grade::Good => match steps.get(1) {
            Some(second) => step_to(card, CardState::Learning, 1, now + *second),
            None => graduate(params, card, memory, now),
        },
        Grade::Easy => {
            let card = graduate(params, card, memory, now);
            let good_interval = clamp_interval(
                next_interval(initial_stability(w, Grade::Good), params.desired_retention),
                params.max_interval_days,
            );
            ensure_longer_than(params, card, good_interval, now)
        }
    }
}

fn review_stepping(
    params: &SchedulerParams,
    mut card: CardSchedule,
    grade: Grade,
    now: DateTime<Utc>,
    steps: &[Duration],
) -> CardSchedule {
    let w = &params.weights;
    let prior = card.memory.unwrap_or(MemoryState {
        stability: initial_stability(w, Grade::Good),
        difficulty: initial_difficulty(w, Grade::Good),
    });
    let memory = MemoryState {
        stability: short_term_stability(w, prior.stability, grade),
        difficulty: next_difficulty(w, prior.difficulty, grade),
    };
    card.memory = Some(memory);
    let state = card.state;

    match grade {
        Grade::Again => step_to(card, state, 0, now + steps[0]),
        Grade::Hard => {
            let idx = (card.step as usize).min(steps.len() - 1);
            let step = card.step;
            step_to(card, state, step, now + steps[idx])
        }
        Grade::Good => {
            let next_step = card.step as usize + 1;
            if next_step >= steps.len() {
                graduate(params, card, memory, now)
            } else {
                step_to(card, state, next_step as u32, now + steps[next_step])
            }
        }
        Grade::Easy => {
            let card = graduate(params, card, memory, now);
            let good_stability = short_term_stability(w, prior.stability, Grade::Good);
            let good_interval = clamp_interval(
                next_interval(good_stability, params.desired_retention),
                params.max_interval_days,
            );
            ensure_longer_than(params, card, good_interval, now)
        }
    }
}

fn review_review(params: &SchedulerParams, mut card: CardSchedule, grade: Grade, now: DateTime<Utc>) -> CardSchedule {
    let w = &params.weights;
    let prior = card.memory.unwrap_or(MemoryState {
        stability: MIN_STABILITY,
        difficulty: initial_difficulty(w, Grade::Good),
    });
    let elapsed = card.elapsed_days.max(1);
    let r = retrievability(f64::from(elapsed), prior.stability);
    let difficulty = next_difficulty(w, prior.difficulty, grade);

    if grade == Grade::Again {
        card.lapses += 1;
        card.memory = Some(MemoryState {
            stability: capped_forget_stability(w, prior.stability, prior.difficulty, r),
            difficulty,
        });
        return step_to(card, CardState::Relearning, 0, now + params.relearning_steps[0]);
    }

    // Stability uses the pre-review difficulty for every grade
    let stability_for = |g: Grade| stability_after_recall(w, prior.stability, prior.difficulty, r, g);
    let (hard_s, good_s, easy_s) = (
        stability_for(Grade::Hard),
        stability_for(Grade::Good),
        stability_for(Grade::Easy),
    );

    let max = params.max_interval_days;
    let interval_for = |s: f64| clamp_interval(next_interval(s, params.desired_retention), max);
    let mut intervals = order_intervals(interval_for(hard_s), interval_for(good_s), interval_for(easy_s), max);

    if params.enable_fuzz {
        let seed = fuzz_seed(now, card.reps, prior.difficulty, prior.stability);
        let (h, g, e) = intervals;
        intervals = order_intervals(
            apply_fuzz(h, elapsed, max, seed),
            apply_fuzz(g, elapsed, max, seed.wrapping_add(1)),
            apply_fuzz(e, elapsed, max, seed.wrapping_add(2)),
            max,
        );
    }

    let (interval, stability) = match grade {
        Grade::Hard => (intervals.0, hard_s),
        Grade::Good => (intervals.1, good_s),
        _ => (intervals.2, easy_s),
    };
    let interval = clamp_interval(interval, max);

    card.memory = Some(MemoryState { stability, difficulty });
    card.state = CardState::Review;
    card.step = 0;
    card.scheduled_days = interval;
    card.elapsed_days = 0;
    card.due = due_after(now, interval);
    card
}

/// Enforce Hard <= Good < Easy, then clamp each into [1, max]
fn order_intervals(hard: u32, good: u32, easy: u32, max: u32) -> (u32, u32, u32) {
    let hard = hard.min(good);
    let good = good.max(hard.saturating_add(1));
    let easy = easy.max(good.saturating_add(1));
    (
        clamp_interval(hard, max),
        clamp_interval(good, max),
        clamp_interval(easy, max),
    )
}

fn step_to(mut card: CardSchedule, state: CardState, step: u32, due: DateTime<Utc>) -> CardSchedule {
    card.state = state;
    card.step = step;
    card.scheduled_days = 0;
    card.elapsed_days = 0;
    card.due = due;
    card
}

fn graduate(params: &SchedulerParams, mut card: CardSchedule, memory: MemoryState, now: DateTime<Utc>) -> CardSchedule {
    let interval = clamp_interval(
        next_interval(memory.stability, params.desired_retention),
        params.max_interval_days,
    );
    card.state = CardState::Review;
    card.step = 0;
    card.memory = Some(memory);
    card.scheduled_days = interval;
    card.elapsed_days = 0;
    card.due = due_after(now, interval);
    card
}

/// Easy must land at least a day past what Good would have given
fn ensure_longer_than(params: &SchedulerParams, mut card: CardSchedule, good_interval: u32, now: DateTime<Utc>) -> CardSchedule {
    if card.scheduled_days <= good_interval {
        let interval = clamp_interval(good_interval.saturating_add(1), params.max_interval_days);
        card.scheduled_days = interval;
        card.due = due_after(now, interval);
    }
    card
}

/// `now` plus whole days, saturating at the latest representable instant
fn due_after(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_add_signed(Duration::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn clamp_interval(interval: u32, max_days: u32) -> u32 {
    interval.clamp(1, max_days.max(1))
}

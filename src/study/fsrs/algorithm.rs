//! FSRS-5 memory model formulas
//!
//! Pure functions over a 19-element weight vector. Ratings are the numeric
//! grades Again = 1, Hard = 2, Good = 3, Easy = 4.

use crate::study::models::Grade;

/// Number of model weights
pub const WEIGHT_COUNT: usize = 19;

pub type Weights = [f64; WEIGHT_COUNT];

/// Floor for every stability value
pub const MIN_STABILITY: f64 = 0.1;

/// Longest interval any configuration may ask for (about a century)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Difficulty bounds
pub const MIN_DIFFICULTY: f64 = 1.0;
pub const MAX_DIFFICULTY: f64 = 10.0;

/// Default FSRS-5 weights (w0..w18)
pub const DEFAULT_WEIGHTS: Weights = [
    0.4072,  // w0  initial stability, Again
    1.1829,  // w1  initial stability, Hard
    3.1262,  // w2  initial stability, Good
    15.4722, // w3  initial stability, Easy
    7.2102,  // w4  initial difficulty
    0.5316,  // w5  initial difficulty slope
    1.0651,  // w6  difficulty step per grade
    0.0046,  // w7  difficulty mean reversion
    1.5418,  // w8  recall stability scale
    0.1594,  // w9  recall stability decay
    1.01,    // w10 recall stability, retrievability factor
    2.1791,  // w11 forget stability scale
    0.0292,  // w12 forget stability, difficulty exponent
    0.2788,  // w13 forget stability, stability exponent
    0.2229,  // w14 forget stability, retrievability factor
    0.2604,  // w15 hard penalty
    3.3928,  // w16 easy bonus
    0.2223,  // w17 short-term stability
    0.6744,  // w18 short-term stability
];

/// Probability of recall after `elapsed_days` at the given stability.
///
/// `R(t, S) = (1 + t / (9 S))^-1`
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + elapsed_days.max(0.0) / (9.0 * stability))
}

/// Interval in whole days at which retrievability falls to `desired_retention`.
///
/// `I(S, r) = 9 S (1/r - 1)`, rounded, at least 1.
pub fn next_interval(stability: f64, desired_retention: f64) -> u32 {
    if desired_retention <= 0.0 || desired_retention >= 1.0 {
        return 1;
    }
    let interval = 9.0 * stability * (1.0 / desired_retention - 1.0);
    let rounded = interval.round();
    if rounded < 1.0 {
        1
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

/// `S0(G) = w[G-1]`
pub fn initial_stability(w: &Weights, grade: Grade) -> f64 {
    let idx = usize::from(grade.value()) - 1;
    w[idx].max(MIN_STABILITY)
}

/// `D0(G) = w4 - e^(w5 (G - 1)) + 1`
pub fn initial_difficulty(w: &Weights, grade: Grade) -> f64 {
    let g = f64::from(grade.value());
    clamp_difficulty(w[4] - (w[5] * (g - 1.0)).exp() + 1.0)
}

/// Difficulty after a review, with mean reversion toward `D0(Easy)`.
///
/// `D' = w7 D0(4) + (1 - w7) (D - w6 (G - 3))`
pub fn next_difficulty(w: &Weights, difficulty: f64, grade: Grade) -> f64 {
    let g = f64::from(grade.value());
    let target = initial_difficulty(w, Grade::Easy);
    clamp_difficulty(w[7] * target + (1.0 - w[7]) * (difficulty - w[6] * (g - 3.0)))
}

/// Stability after a successful recall (Hard, Good or Easy).
///
/// `S' = S (e^w8 (11 - D) S^-w9 (e^(w10 (1 - R)) - 1) hard easy + 1)`
pub fn stability_after_recall(w: &Weights, stability: f64, difficulty: f64, r: f64, grade: Grade) -> f64 {
    let hard_penalty = if grade == Grade::Hard { w[15] } else { 1.0 };
    let easy_bonus = if grade == Grade::Easy { w[16] } else { 1.0 };

    let growth = w[8].exp()
        * (11.0 - difficulty)
        * stability.powf(-w[9])
        * ((w[10] * (1.0 - r)).exp() - 1.0)
        * hard_penalty
        * easy_bonus;

    (stability * (growth + 1.0)).max(MIN_STABILITY)
}

/// Stability after a lapse.
///
/// `S' = w11 D^-w12 ((S + 1)^w13 - 1) e^(w14 (1 - R))`
pub fn stability_after_forgetting(w: &Weights, stability: f64, difficulty: f64, r: f64) -> f64 {
    let s = w[11]
        * difficulty.powf(-w[12])
        * ((stability + 1.0).powf(w[13]) - 1.0)
        * (w[14] * (1.0 - r)).exp();
    s.max(MIN_STABILITY)
}

/// Upper bound for post-lapse stability: `S / e^(w17 w18)`
pub fn post_lapse_ceiling(w: &Weights, stability: f64) -> f64 {
    stability / (w[17] * w[18]).exp()
}

/// Lapse stability, never above the pre-lapse ceiling
pub fn capped_forget_stability(w: &Weights, stability: f64, difficulty: f64, r: f64) -> f64 {
    let ceiling = post_lapse_ceiling(w, stability);
    let forget = stability_after_forgetting(w, stability, difficulty, r);
    ceiling.min(forget).max(MIN_STABILITY)
}

/// Same-day stability update used inside learning/relearning steps.
///
/// `S' = S e^(w17 (G - 3 + w18))`
pub fn short_term_stability(w: &Weights, stability: f64, grade: Grade) -> f64 {
    let g = f64::from(grade.value());
    (stability * (w[17] * (g - 3.0 + w[18])).exp()).max(MIN_STABILITY)
}

/// Reject weight vectors that would produce NaN or non-positive stability
pub fn validate_weights(w: &Weights) -> Result<(), String> {
    for (i, v) in w.iter().enumerate() {
        if !v.is_finite() {
            return Err(format!("weight w[{}] is invalid: {}", i, v));
        }
    }
    if w[..4].iter().any(|v| *v <= 0.0) {
        return Err("initial stability weights w[0]-w[3] must be positive".to_string());
    }
    Ok(())
}

fn clamp_difficulty(d: f64) -> f64 {
    d.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

//! Connectivity score model
//!
//! Pure bookkeeping: folds one probe outcome into a host's rolling statistics and
//! recomputes the 0-100 scores. No I/O, no locking.

use crate::models::{HostScoreState, ProbeOutcome};

/// Streak length at which the stability score and failure penalty kick in.
const STREAK_THRESHOLD: u32 = 3;
/// Successes in a row before the bonus is granted.
const BONUS_STREAK: u32 = 5;
const MAX_FAILURE_PENALTY: i32 = 20;
const MAX_SUCCESS_BONUS: i32 = 10;

/// Average RTT upper bounds (ms, inclusive) and their base score.
const RTT_TABLE: &[(f64, i32)] = &[
    (5.0, 100),
    (10.0, 95),
    (20.0, 85),
    (35.0, 75),
    (50.0, 65),
    (75.0, 50),
    (100.0, 35),
    (150.0, 20),
    (200.0, 10),
];
const RTT_FLOOR_SCORE: i32 = 5;

/// Packet loss upper bounds (percent, inclusive) and their penalty.
const LOSS_TABLE: &[(f64, i32)] = &[(10.0, 5), (25.0, 10), (50.0, 15), (75.0, 25)];
const LOSS_CEILING_PENALTY: i32 = 30;

/// Returns the state after applying `outcome`.
pub fn update(mut state: HostScoreState, outcome: &ProbeOutcome) -> HostScoreState {
    apply(&mut state, outcome);
    state
}

/// In-place form of [`update`], used under the registry lock.
pub fn apply(state: &mut HostScoreState, outcome: &ProbeOutcome) {
    if state.first_seen.is_none() {
        state.first_seen = Some(outcome.timestamp);
    }
    state.last_seen = Some(outcome.timestamp);

    state.reachable = outcome.success;
    state.current_rtt_ms = outcome.rtt_ms;
    state.rtt_source = outcome.rtt_source;
    state.last_error = outcome.error.clone();

    state.total_probes += 1;

    if outcome.success {
        state.successful_probes += 1;
        state.consecutive_successes = state.consecutive_successes.saturating_add(1);
        state.consecutive_failures = 0;

        if let Some(rtt) = outcome.rtt_ms {
            state.rtt_samples += 1;
            state.min_rtt_ms = Some(state.min_rtt_ms.map_or(rtt, |min| min.min(rtt)));
            state.max_rtt_ms = Some(state.max_rtt_ms.map_or(rtt, |max| max.max(rtt)));
            state.average_rtt_ms += (rtt - state.average_rtt_ms) / state.rtt_samples as f64;
        }
    } else {
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.consecutive_successes = 0;
    }

    recompute(state);
}

fn recompute(state: &mut HostScoreState) {
    if state.total_probes == 0 || state.successful_probes == 0 {
        state.reliability_score = 0;
        state.performance_score = 0;
        state.stability_score = 0;
        state.overall_score = 0;
        return;
    }

    let overall = rtt_base_score(state.average_rtt_ms)
        - loss_penalty(state.packet_loss_percent())
        - failure_penalty(state.consecutive_failures)
        + success_bonus(state.consecutive_successes);

    state.overall_score = overall.clamp(0, 100) as u8;
    state.reliability_score = (state.successful_probes * 100 / state.total_probes) as u8;
    state.performance_score = state.overall_score;
    state.stability_score = if state.consecutive_successes >= STREAK_THRESHOLD {
        100
    } else if state.consecutive_failures >= STREAK_THRESHOLD {
        0
    } else {
        50
    };
}

pub fn rtt_base_score(average_rtt_ms: f64) -> i32 {
    RTT_TABLE
        .iter()
        .find(|(bound, _)| average_rtt_ms <= *bound)
        .map_or(RTT_FLOOR_SCORE, |(_, score)| *score)
}

pub fn loss_penalty(loss_percent: f64) -> i32 {
    if loss_percent <= 0.0 {
        return 0;
    }
    LOSS_TABLE
        .iter()
        .find(|(bound, _)| loss_percent <= *bound)
        .map_or(LOSS_CEILING_PENALTY, |(_, penalty)| *penalty)
}

fn failure_penalty(consecutive_failures: u32) -> i32 {
    if consecutive_failures < STREAK_THRESHOLD {
        return 0;
    }
    consecutive_failures.saturating_mul(5).min(MAX_FAILURE_PENALTY as u32) as i32
}

fn success_bonus(consecutive_successes: u32) -> i32 {
    if consecutive_successes < BONUS_STREAK {
        return 0;
    }
    ((consecutive_successes / 2).min(MAX_SUCCESS_BONUS as u32)) as i32
}

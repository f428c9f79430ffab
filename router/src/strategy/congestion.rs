//! Cost schedule and convergence checks for negotiated congestion routing.

/// Price of sharing a cell in the current iteration.
///
/// Grows linearly from `base` to 4x `base` over the run, and with local
/// congestion by `1 + 2 * overflow_ratio` capped at 3x.
pub fn calculate_present_cost(
    iteration: usize,
    total_iterations: usize,
    overflow_ratio: f64,
    base_cost: f64,
) -> f64 {
    let progress = if total_iterations == 0 {
        1.0
    } else {
        (iteration as f64 / total_iterations as f64).clamp(0.0, 1.0)
    };
    let progress_factor = 1.0 + 3.0 * progress;
    let congestion_factor = (1.0 + 2.0 * overflow_ratio.max(0.0)).min(3.0);
    base_cost * progress_factor * congestion_factor
}

/// How much history cost contested cells gain this iteration.
pub fn calculate_history_increment(
    _iteration: usize,
    overflow_history: &[usize],
    base_increment: f64,
) -> f64 {
    let n = overflow_history.len();
    if n < 2 {
        return base_increment;
    }
    let last = overflow_history[n - 1];
    let prev = overflow_history[n - 2];

    if last > prev {
        return base_increment * 1.5;
    }

    let run = overflow_history
        .iter()
        .rev()
        .take_while(|&&v| v == last)
        .count();
    if run >= 2 {
        return base_increment * (1.0 + 0.5 * (run - 1) as f64);
    }

    if last <= 2 {
        return base_increment * 0.5;
    }
    base_increment
}

/// Whether the recent overflow sequence is going around in circles.
///
/// Fires on an A-B-A-B alternation, on a window of identical values (which
/// includes a converged run of zeros, see [`assess_convergence`]), or when the
/// window holds exactly two distinct non-zero values. A window shorter than
/// two samples shows no pattern and never fires.
pub fn detect_oscillation(overflow_history: &[usize], window: usize) -> bool {
    if window < 2 || overflow_history.len() < window {
        return false;
    }
    let recent = &overflow_history[overflow_history.len() - window..];

    let alternating = recent[0] != recent[1]
        && recent
            .iter()
            .enumerate()
            .all(|(i, &v)| v == recent[i % 2]);
    if alternating {
        return true;
    }

    if recent.iter().all(|&v| v == recent[0]) {
        return true;
    }

    let mut distinct: Vec<usize> = recent.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    distinct.len() == 2 && distinct.iter().all(|&v| v > 0)
}

/// Where a negotiated run stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceState {
    /// Overflow reached zero.
    Converged,
    /// Overflow is stuck at the same non-zero value.
    Stagnant,
    /// Overflow bounces between a few non-zero values.
    Oscillating,
    Progressing,
}

/// Resolve what [`detect_oscillation`] alone cannot: a flat run at zero is
/// success, a flat run above zero is a stall.
pub fn assess_convergence(overflow_history: &[usize], window: usize) -> ConvergenceState {
    let Some(&last) = overflow_history.last() else {
        return ConvergenceState::Progressing;
    };
    if last == 0 {
        return ConvergenceState::Converged;
    }
    if !detect_oscillation(overflow_history, window) {
        return ConvergenceState::Progressing;
    }
    let recent = &overflow_history[overflow_history.len() - window..];
    if recent.iter().all(|&v| v == last) {
        ConvergenceState::Stagnant
    } else {
        ConvergenceState::Oscillating
    }
}

/// Give up on a run that is flat or getting worse. Never fires before
/// `min_iterations` or with fewer than five samples.
pub fn should_terminate_early(overflow_history: &[usize], iteration: usize, min_iterations: usize) -> bool {
    if iteration < min_iterations || overflow_history.len() < 5 {
        return false;
    }
    let half = overflow_history.len() / 2;
    let (head, tail) = overflow_history.split_at(half);

    let best_head = head.iter().copied().min().unwrap_or(0);
    let best_tail = tail.iter().copied().min().unwrap_or(0);
    if best_tail >= best_head {
        log::debug!("No improvement over the last {} iterations", tail.len());
        return true;
    }

    let avg = |s: &[usize]| s.iter().sum::<usize>() as f64 / s.len() as f64;
    let diverging = avg(tail) > 1.2 * avg(head);
    if diverging {
        log::debug!("Overflow is diverging");
    }
    diverging
}

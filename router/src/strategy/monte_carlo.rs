//! Multi-start routing over shuffled net orders, keeping the best trial.

use super::{NetTask, RoutingContext, RoutingResult, TrialSummary, basic, negotiated};
use crate::algo::AStar;
use crate::grid::DenseGrid;
use pcb_common::util::config::{MonteCarloConfig, NegotiatedConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::cmp::Ordering;

struct Trial {
    summary: TrialSummary,
    result: RoutingResult,
    grid: DenseGrid,
}

/// Net order for trial `t`: the priority order first, then seeded shuffles.
pub fn trial_order(base: &[usize], seed: u64, trial: usize) -> Vec<usize> {
    let mut order = base.to_vec();
    if trial > 0 {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(trial as u64));
        order.shuffle(&mut rng);
    }
    order
}

/// More nets, then fewer vias, then less copper, then the earlier trial.
fn compare(a: &TrialSummary, b: &TrialSummary) -> Ordering {
    b.nets_routed
        .cmp(&a.nets_routed)
        .then(a.vias.cmp(&b.vias))
        .then(a.length_mm.total_cmp(&b.length_mm))
        .then(a.trial.cmp(&b.trial))
}

fn run_trial(
    pristine: &DenseGrid,
    tasks: &[NetTask],
    base_order: &[usize],
    cfg: &MonteCarloConfig,
    negotiated_cfg: &NegotiatedConfig,
    ctx: &RoutingContext,
    trial: usize,
) -> Option<Trial> {
    if trial > 0 && ctx.deadline.expired() {
        return None;
    }
    let order = trial_order(base_order, cfg.seed, trial);
    let mut grid = pristine.clone();
    let mut backend = AStar::new();
    let result = if cfg.negotiated_trials {
        negotiated::route(&mut grid, tasks, &order, &mut backend, negotiated_cfg, ctx)
    } else {
        basic::route(&mut grid, tasks, &order, &mut backend, ctx)
    };
    let summary = TrialSummary {
        trial,
        nets_routed: result.nets_routed(),
        vias: result.via_count(),
        length_mm: result.total_length(),
    };
    log::info!(
        "Trial {}: {}/{} nets, {} vias, {:.2}mm",
        trial,
        summary.nets_routed,
        tasks.len(),
        summary.vias,
        summary.length_mm
    );
    Some(Trial { summary, result, grid })
}

pub fn route(
    grid: &mut DenseGrid,
    tasks: &[NetTask],
    base_order: &[usize],
    cfg: &MonteCarloConfig,
    negotiated_cfg: &NegotiatedConfig,
    ctx: &RoutingContext,
) -> RoutingResult {
    let trials = cfg.num_trials.max(1);
    let pristine: &DenseGrid = grid;
    let run = |t: usize| run_trial(pristine, tasks, base_order, cfg, negotiated_cfg, ctx, t);

    let outcomes: Vec<Trial> = if cfg.parallel || ctx.high_performance {
        (0..trials).into_par_iter().filter_map(run).collect()
    } else {
        (0..trials).filter_map(run).collect()
    };
    if outcomes.len() < trials {
        log::warn!("Timed out after {} of {} trials", outcomes.len(), trials);
    }

    let summaries: Vec<TrialSummary> = outcomes.iter().map(|t| t.summary.clone()).collect();
    let Some(best) = outcomes.into_iter().min_by(|a, b| compare(&a.summary, &b.summary)) else {
        return RoutingResult::default();
    };
    log::info!(
        "Best trial {}: {}/{} nets",
        best.summary.trial,
        best.summary.nets_routed,
        tasks.len()
    );

    *grid = best.grid;
    let mut result = best.result;
    result.trials = summaries;
    result
}

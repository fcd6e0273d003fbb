//! Connected-closeness: how much closer connected nodes sit on the map than
//! random pairs do.
//!
//! For a distance threshold `delta`, `E%` is the share of connected pairs no
//! further apart than `delta`, `p%` the same share over random non-adjacent
//! pairs, and `C = E% - p%`. The statistic is the `delta` maximising `C`,
//! found by an iterated grid search that narrows around the best sample.

use crate::config::Settings;
use crate::ir::{MapEdge, MapNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;

/// Random pair draws allowed per connected pair before giving up.
const MAX_ATTEMPTS_PER_EDGE: usize = 50;

#[derive(Debug, Clone, Copy)]
pub struct ClosenessParams {
    pub seed: u64,
    pub grid_steps: usize,
    pub epsilon: f32,
    pub max_rounds: usize,
    pub materiality: f32,
}

impl ClosenessParams {
    pub fn from_settings(settings: &Settings) -> Self {
        let c = &settings.closeness;
        Self {
            seed: c.closeness_seed,
            grid_steps: c.closeness_grid_steps,
            epsilon: c.closeness_epsilon,
            max_rounds: c.closeness_max_rounds,
            materiality: c.closeness_materiality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Closeness {
    /// Canvas pixels.
    pub delta_max: f32,
    pub e_percent: f32,
    pub p_percent: f32,
    /// Probability that a pair closer than `delta_max` is connected.
    pub p_edge: f32,
    pub c_max: f32,
    /// `(delta, C)` of the last grid-search round.
    #[serde(skip)]
    pub final_samples: Vec<(f32, f32)>,
}

fn distance(a: &MapNode, b: &MapNode) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Share of sorted `values` that are `<= delta`.
fn share_within(values: &[f32], delta: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.partition_point(|v| *v <= delta) as f32 / values.len() as f32
}

/// Estimates the statistic; `None` when it does not apply (too few nodes,
/// no edges, or a maximum below the materiality threshold).
pub fn connected_closeness(nodes: &[MapNode], edges: &[MapEdge], params: &ClosenessParams) -> Option<Closeness> {
    let n = nodes.len();
    let connected_edges: Vec<&MapEdge> = edges.iter().filter(|e| e.source != e.target).collect();
    if n < 2 || connected_edges.is_empty() {
        log::warn!("connected closeness needs at least 2 nodes and 1 edge, skipped");
        return None;
    }

    let mut adjacent = HashSet::with_capacity(connected_edges.len());
    let mut connected: Vec<f32> = Vec::with_capacity(connected_edges.len());
    for e in &connected_edges {
        let (a, b) = (e.source.min(e.target), e.source.max(e.target));
        adjacent.insert((a, b));
        connected.push(distance(&nodes[a as usize], &nodes[b as usize]));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let wanted = connected.len();
    let mut random: Vec<f32> = Vec::with_capacity(wanted);
    for _ in 0..wanted * MAX_ATTEMPTS_PER_EDGE {
        if random.len() == wanted {
            break;
        }
        let i = rng.gen_range(0..n) as u32;
        let j = rng.gen_range(0..n) as u32;
        if i == j || adjacent.contains(&(i.min(j), i.max(j))) {
            continue;
        }
        random.push(distance(&nodes[i as usize], &nodes[j as usize]));
    }
    if random.is_empty() {
        log::warn!("connected closeness: no non-adjacent pair found, skipped");
        return None;
    }

    connected.sort_by(f32::total_cmp);
    random.sort_by(f32::total_cmp);
    let c_at = |delta: f32| share_within(&connected, delta) - share_within(&random, delta);

    let steps = params.grid_steps.max(3);
    let mut lo = 0.0f32;
    let mut hi = connected
        .last()
        .copied()
        .unwrap_or(0.0)
        .max(random.last().copied().unwrap_or(0.0));
    let mut best = (0.0f32, f32::NEG_INFINITY);
    let mut previous: Option<f32> = None;
    let mut samples: Vec<(f32, f32)> = Vec::new();
    for _ in 0..params.max_rounds.max(1) {
        let step = (hi - lo) / (steps - 1) as f32;
        samples = (0..steps)
            .map(|k| {
                let delta = lo + step * k as f32;
                (delta, c_at(delta))
            })
            .collect();
        let round_best = samples
            .iter()
            .copied()
            .fold((0.0f32, f32::NEG_INFINITY), |acc, s| if s.1 > acc.1 { s } else { acc });
        if round_best.1 > best.1 {
            best = round_best;
        }
        let converged = previous.is_some_and(|p| (best.1 - p).abs() <= params.epsilon * p.abs());
        previous = Some(best.1);
        if converged || step <= f32::EPSILON {
            break;
        }
        lo = (best.0 - step).max(0.0);
        hi = best.0 + step;
    }

    let (delta_max, c_max) = best;
    if c_max < params.materiality {
        log::info!("connected closeness {c_max:.3} is below materiality, not reported");
        return None;
    }
    let e_percent = share_within(&connected, delta_max);
    let p_percent = share_within(&random, delta_max);
    let pairs = n as f32 * (n as f32 - 1.0) / 2.0;
    let close_edges = e_percent * connected.len() as f32;
    let close_others = p_percent * (pairs - connected.len() as f32).max(0.0);
    let p_edge = if close_edges + close_others > 0.0 {
        close_edges / (close_edges + close_others)
    } else {
        0.0
    };
    Some(Closeness {
        delta_max,
        e_percent,
        p_percent,
        p_edge,
        c_max,
        final_samples: samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Color;

    fn line(count: usize, spacing: f32) -> (Vec<MapNode>, Vec<MapEdge>) {
        let nodes = (0..count)
            .map(|i| MapNode {
                id: i.to_string(),
                x: i as f32 * spacing,
                y: 0.0,
                size: 1.0,
                color: Color::BLACK,
                label: String::new(),
                important: false,
                attributes: Default::default(),
            })
            .collect();
        let edges = (1..count as u32)
            .map(|i| MapEdge {
                source: i - 1,
                target: i,
                opacity: 1.0,
            })
            .collect();
        (nodes, edges)
    }

    fn params() -> ClosenessParams {
        ClosenessParams {
            seed: 7,
            grid_steps: 64,
            epsilon: 1e-3,
            max_rounds: 20,
            materiality: 0.1,
        }
    }

    #[test]
    fn neighbours_on_a_line_peak_between_one_and_two_spacings() {
        let (nodes, edges) = line(20, 10.0);
        let result = connected_closeness(&nodes, &edges, &params()).unwrap();
        assert!((10.0..20.0).contains(&result.delta_max), "delta {}", result.delta_max);
        assert!((result.c_max - 1.0).abs() < 1e-6);
        assert_eq!(result.e_percent, 1.0);
        assert_eq!(result.p_percent, 0.0);
        assert_eq!(result.p_edge, 1.0);
        assert!(!result.final_samples.is_empty());
        for (delta, c) in &result.final_samples {
            assert!(result.c_max >= *c, "C({delta}) = {c} beats the maximum");
        }
    }

    #[test]
    fn sampling_is_seeded() {
        let (nodes, edges) = line(20, 10.0);
        let a = connected_closeness(&nodes, &edges, &params());
        let b = connected_closeness(&nodes, &edges, &params());
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_graphs_are_not_applicable() {
        let (nodes, edges) = line(1, 10.0);
        assert!(connected_closeness(&nodes, &edges, &params()).is_none());
        let (nodes, _) = line(5, 10.0);
        assert!(connected_closeness(&nodes, &[], &params()).is_none());
        // complete graph: no non-adjacent pair to compare with
        let (nodes, _) = line(3, 10.0);
        let full: Vec<MapEdge> = [(0, 1), (1, 2), (0, 2)]
            .iter()
            .map(|&(source, target)| MapEdge { source, target, opacity: 1.0 })
            .collect();
        assert!(connected_closeness(&nodes, &full, &params()).is_none());
    }

    #[test]
    fn weak_signal_is_below_materiality() {
        let (nodes, edges) = line(20, 10.0);
        let mut p = params();
        p.materiality = 1.5;
        assert!(connected_closeness(&nodes, &edges, &p).is_none());
    }
}

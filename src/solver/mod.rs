//! Layered path solver
//!
//! Finds the shortest or longest polyline that visits one candidate point
//! per stage, in stage order. Stages are the task points (plus the aircraft
//! for the remaining-distance variant) and candidates are boundary polygon
//! vertices, so the graph is a layered DAG and one forward relaxation per
//! stage solves it in O(stages * width^2).
//!
//! Distances are ranked on the projected integer grid; the caller converts
//! the chosen points back to great-circle sums. A solver instance is heavy
//! (it keeps per-stage candidate copies) and is meant to be created lazily
//! and retained between solves.

use crate::geo::search::SearchPoint;
use crate::geo::GeoPoint;
use crate::task::MAX_TASK_POINTS;

/// Task points plus one aircraft stage.
pub const MAX_STAGES: usize = MAX_TASK_POINTS + 1;

/// Per-stage candidate bound; covers boundary polygons and sample hulls.
pub const MAX_STAGE_POINTS: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathMode {
    Shortest,
    Longest,
}

const NULL_POINT: SearchPoint = SearchPoint::unprojected(GeoPoint::new(0.0, 0.0));

pub struct StagePathSolver {
    stage_count: usize,
    counts: [usize; MAX_STAGES],
    points: [[SearchPoint; MAX_STAGE_POINTS]; MAX_STAGES],
    dist: [[u64; MAX_STAGE_POINTS]; MAX_STAGES],
    pred: [[u8; MAX_STAGE_POINTS]; MAX_STAGES],
    solution: [u8; MAX_STAGES],
}

impl StagePathSolver {
    pub fn new() -> Self {
        Self {
            stage_count: 0,
            counts: [0; MAX_STAGES],
            points: [[NULL_POINT; MAX_STAGE_POINTS]; MAX_STAGES],
            dist: [[0; MAX_STAGE_POINTS]; MAX_STAGES],
            pred: [[0; MAX_STAGE_POINTS]; MAX_STAGES],
            solution: [0; MAX_STAGES],
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stage_count
    }

    /// Set the number of stages and clear all candidates.
    pub fn set_stage_count(&mut self, count: usize) {
        self.stage_count = count.min(MAX_STAGES);
        self.counts = [0; MAX_STAGES];
    }

    /// Load the candidate points of one stage. Excess candidates beyond
    /// the width bound are dropped.
    pub fn set_boundary(&mut self, stage: usize, boundary: &[SearchPoint]) {
        if stage >= self.stage_count {
            return;
        }
        let n = boundary.len().min(MAX_STAGE_POINTS);
        self.points[stage][..n].copy_from_slice(&boundary[..n]);
        self.counts[stage] = n;
    }

    /// Run the relaxation. Returns false when any stage has no candidates.
    pub fn solve(&mut self, mode: PathMode) -> bool {
        let n = self.stage_count;
        if n == 0 {
            return false;
        }
        if self.counts[..n].iter().any(|&c| c == 0) {
            return false;
        }

        for j in 0..self.counts[0] {
            self.dist[0][j] = 0;
        }

        for stage in 1..n {
            for j in 0..self.counts[stage] {
                let mut best = match mode {
                    PathMode::Shortest => u64::MAX,
                    PathMode::Longest => 0,
                };
                let mut best_pred = 0u8;
                let mut found = false;
                for i in 0..self.counts[stage - 1] {
                    let edge =
                        self.points[stage - 1][i].flat_distance(&self.points[stage][j]) as u64;
                    let candidate = self.dist[stage - 1][i].saturating_add(edge);
                    let better = match mode {
                        PathMode::Shortest => candidate < best,
                        PathMode::Longest => candidate > best,
                    };
                    if better || !found {
                        best = candidate;
                        best_pred = i as u8;
                        found = true;
                    }
                }
                self.dist[stage][j] = best;
                self.pred[stage][j] = best_pred;
            }
        }

        let last = n - 1;
        let mut best_index = 0;
        for j in 1..self.counts[last] {
            let better = match mode {
                PathMode::Shortest => self.dist[last][j] < self.dist[last][best_index],
                PathMode::Longest => self.dist[last][j] > self.dist[last][best_index],
            };
            if better {
                best_index = j;
            }
        }

        self.solution[last] = best_index as u8;
        for stage in (1..n).rev() {
            self.solution[stage - 1] = self.pred[stage][self.solution[stage] as usize];
        }

        true
    }

    /// The chosen candidate of a stage, valid after a successful solve.
    pub fn solution(&self, stage: usize) -> SearchPoint {
        self.points[stage][self.solution[stage] as usize]
    }
}

impl Default for StagePathSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::flat::FlatProjection;

    fn sp(proj: &FlatProjection, lat: f64, lon: f64) -> SearchPoint {
        SearchPoint::new(GeoPoint::from_degrees(lat, lon), proj)
    }

    #[test]
    fn test_empty_stage_fails() {
        let mut solver = StagePathSolver::new();
        solver.set_stage_count(2);
        let proj = FlatProjection::default();
        solver.set_boundary(0, &[sp(&proj, 0.0, 0.0)]);
        assert!(!solver.solve(PathMode::Shortest));

        solver.set_stage_count(0);
        assert!(!solver.solve(PathMode::Shortest));
    }

    #[test]
    fn test_shortest_picks_near_vertices() {
        let proj = FlatProjection::default();
        let mut solver = StagePathSolver::new();
        solver.set_stage_count(3);

        solver.set_boundary(0, &[sp(&proj, 0.0, 0.0)]);
        // middle stage: one candidate on the straight line, one far off
        solver.set_boundary(1, &[sp(&proj, 0.5, 0.0), sp(&proj, 0.5, 0.5)]);
        solver.set_boundary(2, &[sp(&proj, 1.0, 0.0)]);

        assert!(solver.solve(PathMode::Shortest));
        let mid = solver.solution(1);
        assert!((mid.location().longitude).abs() < 1e-9);
    }

    #[test]
    fn test_longest_picks_far_vertices() {
        let proj = FlatProjection::default();
        let mut solver = StagePathSolver::new();
        solver.set_stage_count(3);

        solver.set_boundary(0, &[sp(&proj, 0.0, 0.0)]);
        solver.set_boundary(1, &[sp(&proj, 0.5, 0.0), sp(&proj, 0.5, 0.5)]);
        solver.set_boundary(2, &[sp(&proj, 1.0, 0.0)]);

        assert!(solver.solve(PathMode::Longest));
        let mid = solver.solution(1);
        assert!(mid.location().longitude > 0.0);
    }

    #[test]
    fn test_shortest_not_longer_than_longest() {
        let proj = FlatProjection::default();

        let stages: [&[SearchPoint]; 3] = [
            &[sp(&proj, 0.0, 0.0), sp(&proj, 0.0, 0.1)],
            &[sp(&proj, 0.4, -0.1), sp(&proj, 0.5, 0.2)],
            &[sp(&proj, 1.0, 0.0), sp(&proj, 0.9, 0.3)],
        ];

        let total = |solver: &StagePathSolver| {
            let mut d = 0.0;
            for stage in 1..solver.stage_count() {
                d += solver
                    .solution(stage - 1)
                    .location()
                    .distance(&solver.solution(stage).location());
            }
            d
        };

        let mut solver = StagePathSolver::new();
        solver.set_stage_count(3);
        for (i, s) in stages.iter().enumerate() {
            solver.set_boundary(i, s);
        }
        assert!(solver.solve(PathMode::Shortest));
        let shortest = total(&solver);

        assert!(solver.solve(PathMode::Longest));
        let longest = total(&solver);

        assert!(shortest <= longest);
    }

    #[test]
    fn test_single_stage_solves_trivially() {
        let proj = FlatProjection::default();
        let mut solver = StagePathSolver::new();
        solver.set_stage_count(1);
        solver.set_boundary(0, &[sp(&proj, 0.0, 0.0)]);
        assert!(solver.solve(PathMode::Shortest));
    }
}

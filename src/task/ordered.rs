//! Ordered task facade
//!
//! Owns the task point sequence and drives everything that happens to it:
//! structural mutations with validity checks, the per-fix transition state
//! machine, pilot-event start gate handling, and the distance scans feeding
//! the published statistics. Single-writer: all operations run to
//! completion on the caller's thread.

use heapless::Vec;

use crate::geo::flat::{FlatBoundingBox, FlatProjection};
use crate::geo::search::SearchPoint;
use crate::geo::{GeoBounds, GeoPoint};
use crate::glide::GlidePolar;
use crate::solver::{PathMode, StagePathSolver};
use crate::time::RoughTime;
use crate::waypoints::Waypoints;
use crate::{log_debug, log_info};

use super::factory::{self, FactoryConstraints, TaskFactoryType, TaskValidationErrors};
use super::point::TaskPoint;
use super::settings::{OrderedTaskSettings, TaskBehaviour};
use super::stats::{TaskStats, TaskSummary, TaskSummaryPoint};
use super::{
    ActiveState, AircraftState, TaskAdvance, TaskEvents, Waypoint, MAX_OPTIONAL_STARTS,
    MAX_TASK_POINTS,
};

pub struct OrderedTask {
    task_points: Vec<TaskPoint, MAX_TASK_POINTS>,
    optional_start_points: Vec<TaskPoint, MAX_OPTIONAL_STARTS>,
    active_task_point: usize,

    task_behaviour: TaskBehaviour,
    ordered_settings: OrderedTaskSettings,
    factory_mode: TaskFactoryType,
    task_advance: TaskAdvance,

    projection: FlatProjection,
    stats: TaskStats,

    solver_min: Option<StagePathSolver>,
    solver_max: Option<StagePathSolver>,

    force_full_update: bool,
    last_min_location: GeoPoint,
    last_distance_min: f64,
    full_solve_count: u32,

    pev_received: bool,
    last_state_time: f64,
}

impl OrderedTask {
    pub fn new(task_behaviour: TaskBehaviour) -> Self {
        Self {
            task_points: Vec::new(),
            optional_start_points: Vec::new(),
            active_task_point: 0,
            ordered_settings: task_behaviour.ordered_defaults,
            factory_mode: task_behaviour.task_type_default,
            task_behaviour,
            task_advance: TaskAdvance::default(),
            projection: FlatProjection::default(),
            stats: TaskStats::default(),
            solver_min: None,
            solver_max: None,
            force_full_update: true,
            last_min_location: GeoPoint::INVALID,
            last_distance_min: 0.0,
            full_solve_count: 0,
            pev_received: false,
            last_state_time: -1.0,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.task_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.task_points.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.task_points.len() >= self.factory_constraints().max_points
    }

    pub fn point(&self, index: usize) -> Option<&TaskPoint> {
        self.task_points.get(index)
    }

    pub fn optional_start(&self, index: usize) -> Option<&TaskPoint> {
        self.optional_start_points.get(index)
    }

    pub fn optional_start_count(&self) -> usize {
        self.optional_start_points.len()
    }

    pub fn active_index(&self) -> usize {
        self.active_task_point
    }

    pub fn active_point(&self) -> Option<&TaskPoint> {
        self.task_points.get(self.active_task_point)
    }

    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }

    pub fn advance(&self) -> &TaskAdvance {
        &self.task_advance
    }

    pub fn advance_mut(&mut self) -> &mut TaskAdvance {
        &mut self.task_advance
    }

    pub fn behaviour(&self) -> &TaskBehaviour {
        &self.task_behaviour
    }

    pub fn ordered_settings(&self) -> &OrderedTaskSettings {
        &self.ordered_settings
    }

    pub fn factory_type(&self) -> TaskFactoryType {
        self.factory_mode
    }

    pub fn factory_constraints(&self) -> FactoryConstraints {
        factory::constraints(self.factory_mode)
    }

    pub fn is_scored(&self) -> bool {
        self.factory_constraints().task_scored
    }

    /// Number of full minimum-distance solves performed, for diagnostics.
    pub fn full_solve_count(&self) -> u32 {
        self.full_solve_count
    }

    pub fn has_start(&self) -> bool {
        matches!(
            self.task_points.first().map(TaskPoint::kind),
            Some(super::TaskPointKind::Start)
        )
    }

    pub fn has_finish(&self) -> bool {
        self.task_points.len() > 1
            && matches!(
                self.task_points.last().map(TaskPoint::kind),
                Some(super::TaskPointKind::Finish)
            )
    }

    pub fn has_optional_starts(&self) -> bool {
        !self.optional_start_points.is_empty()
    }

    pub fn has_targets(&self) -> bool {
        self.task_points.iter().any(TaskPoint::is_area)
    }

    /// Structural validation of the current point sequence.
    pub fn check_task(&self) -> TaskValidationErrors {
        factory::validate(&self.task_points, self.factory_mode)
    }

    /// The task counts as started once the start has been exited. With
    /// `soft`, having progressed past the start is enough.
    pub fn task_started(&self, soft: bool) -> bool {
        if !self.has_start() {
            return false;
        }
        if self.task_points[0].has_exited() {
            return true;
        }
        soft && self.active_task_point > 0
    }

    /// Index offset relative to the active point still inside the task?
    pub fn is_valid_task_point(&self, index_offset: i32) -> bool {
        let index = self.active_task_point as i64 + index_offset as i64;
        index >= 0 && (index as usize) < self.task_points.len()
    }

    pub fn set_active_task_point(&mut self, index: usize) {
        if index >= self.task_points.len() || index == self.active_task_point {
            return;
        }
        self.task_advance.set_armed(false);
        self.active_task_point = index;
        self.force_full_update = true;
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub fn set_task_behaviour(&mut self, tb: TaskBehaviour) {
        self.task_behaviour = tb;
    }

    pub fn set_ordered_settings(&mut self, settings: OrderedTaskSettings) {
        self.ordered_settings = settings;
        self.propagate_ordered_task_settings();
    }

    pub fn set_factory(&mut self, factory: TaskFactoryType) {
        if self.factory_mode == factory {
            return;
        }
        // changing the scoring family invalidates flight state
        self.reset();
        self.factory_mode = factory;
        self.propagate_ordered_task_settings();
    }

    fn propagate_ordered_task_settings(&mut self) {
        // the finish height depends on the start altitude, which only
        // exists once the start lies behind the active point
        if self.has_start()
            && self.has_finish()
            && self.task_points[0].active_state() == ActiveState::BeforeActive
        {
            let last = self.task_points.len() - 1;
            let height = self.task_points[last].calculate_finish_height_from_start(
                self.stats.start.altitude,
                &self.ordered_settings.finish_constraints,
            );
            self.task_points[last].set_fai_finish_height(height);
        }
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    fn update_stats_geometry(&mut self) {
        if self.task_points.is_empty() {
            self.stats.bounds = GeoBounds::INVALID;
        } else {
            let mut bounds = GeoBounds::INVALID;
            for tp in &self.task_points {
                tp.scan_bounds(&mut bounds);
            }
            for tp in &self.optional_start_points {
                tp.scan_bounds(&mut bounds);
            }
            self.stats.bounds = bounds;
        }

        self.stats.task_valid = self.check_task().is_empty();
        self.stats.has_targets = self.stats.task_valid && self.has_targets();
        self.stats.is_mat = self.factory_mode == TaskFactoryType::Mat;
    }

    /// Rebuild the projection and all derived zone geometry. Called after
    /// every structural change.
    pub fn update_geometry(&mut self) {
        self.update_stats_geometry();

        if self.task_points.is_empty() {
            return;
        }

        self.scan_active();
        self.projection = FlatProjection::new(&self.stats.bounds);

        let mut locations: Vec<GeoPoint, MAX_TASK_POINTS> = Vec::new();
        for tp in &self.task_points {
            let _ = locations.push(tp.location());
        }

        for i in 0..self.task_points.len() {
            let previous = (i > 0).then(|| locations[i - 1]);
            let next = locations.get(i + 1).copied();
            self.task_points[i].update_oz(&self.projection, previous, next);
        }
        let optional_next = locations.get(1).copied();
        for tp in self.optional_start_points.iter_mut() {
            tp.update_oz(&self.projection, None, optional_next);
        }

        // seed the stats while not yet flying
        if !self.task_points[0].has_entered() {
            self.update_stats_distances(GeoPoint::INVALID, true);
        }

        self.force_full_update = true;
    }

    fn scan_active(&mut self) {
        let active = self.active_task_point;
        for (i, tp) in self.task_points.iter_mut().enumerate() {
            tp.set_active_state(if i < active {
                ActiveState::BeforeActive
            } else if i == active {
                ActiveState::CurrentActive
            } else {
                ActiveState::AfterActive
            });
        }
    }

    /// Rewire the non-owning neighbour indices around one slot.
    fn set_neighbours(&mut self, position: usize) {
        if position >= self.task_points.len() {
            return;
        }

        let previous = (position > 0).then(|| position - 1);
        let next = (position + 1 < self.task_points.len()).then(|| position + 1);

        self.task_points[position].set_neighbours(previous, next);

        if position == 0 {
            for tp in self.optional_start_points.iter_mut() {
                tp.set_neighbours(previous, next);
            }
        }
    }

    /// Neighbour indices shift with the vector, so mutations that insert
    /// or remove slots recompute every link.
    fn rewire_neighbours(&mut self) {
        for position in 0..self.task_points.len() {
            self.set_neighbours(position);
        }
    }

    // ------------------------------------------------------------------
    // Times
    // ------------------------------------------------------------------

    /// Seconds of day the task was started, negative when not started.
    pub fn scan_total_start_time(&self) -> f64 {
        self.task_points
            .first()
            .and_then(TaskPoint::scored_state)
            .map(|s| s.time)
            .unwrap_or(-1.0)
    }

    /// Seconds of day the current leg was started, negative when unknown.
    pub fn scan_leg_start_time(&self) -> f64 {
        if self.active_task_point > 0 {
            self.task_points[self.active_task_point - 1]
                .scored_state()
                .map(|s| s.time)
                .unwrap_or(-1.0)
        } else {
            -1.0
        }
    }

    // ------------------------------------------------------------------
    // Distances
    // ------------------------------------------------------------------

    fn distance_chain(&self, select: impl Fn(&TaskPoint) -> SearchPoint) -> f64 {
        let mut distance = 0.0;
        for pair in self.task_points.windows(2) {
            distance += select(&pair[0])
                .location()
                .distance(&select(&pair[1]).location());
        }
        distance
    }

    fn distance_min_chain(&self, location: GeoPoint) -> f64 {
        let n = self.task_points.len();
        if n == 0 {
            return 0.0;
        }
        let active = self.active_task_point.min(n - 1);

        let mut distance = 0.0;
        let mut previous = self.task_points[active].search_min().location();
        if location.is_valid() {
            distance += location.distance(&previous);
        }
        for tp in &self.task_points[active + 1..] {
            let next = tp.search_min().location();
            distance += previous.distance(&next);
            previous = next;
        }
        distance
    }

    fn run_solver_min(&mut self, location: Option<GeoPoint>) -> bool {
        let n = self.task_points.len();
        if n < 2 {
            return false;
        }

        let active = self.active_task_point;
        let aircraft_stage = location.is_some() as usize;

        let solver = self.solver_min.get_or_insert_with(StagePathSolver::new);
        solver.set_stage_count(n - active + aircraft_stage);

        if let Some(location) = location {
            let aircraft = SearchPoint::new(location, &self.projection);
            solver.set_boundary(0, core::slice::from_ref(&aircraft));
        }
        for i in active..n {
            solver.set_boundary(
                i - active + aircraft_stage,
                self.task_points[i].search_points(),
            );
        }

        if !solver.solve(PathMode::Shortest) {
            return false;
        }

        for i in active..n {
            let solution = solver.solution(i - active + aircraft_stage);
            self.task_points[i].set_search_min(solution);
        }

        self.full_solve_count += 1;
        true
    }

    /// Minimum distance from `location` through the remaining boundaries.
    ///
    /// Without `full`, the previous solution is reused while the aircraft
    /// has not moved significantly: micro-motion below one grid unit is
    /// ignored outright, and beyond that a full rescan only happens when
    /// the distance to the active point changed by more than 5% (always
    /// below 2 km of it).
    pub fn scan_distance_min(&mut self, location: GeoPoint, mut full: bool) -> f64 {
        if !full && !self.last_min_location.is_valid() {
            full = true;
        }

        if !full
            && location.is_valid()
            && self.distance_is_significant(location, self.last_min_location)
        {
            if let Some(active) = self.active_point() {
                let target = active.location();
                let last_distance = self.last_min_location.distance(&target) as u64;
                let cur_distance = location.distance(&target) as u64;

                if last_distance < 2000
                    || cur_distance < 2000
                    || last_distance * 20 >= cur_distance * 21
                    || cur_distance * 20 >= last_distance * 21
                {
                    full = true;
                }
            }
        }

        if full {
            self.run_solver_min(if location.is_valid() {
                Some(location)
            } else {
                None
            });
            self.last_min_location = location;
            self.last_distance_min = self.distance_min_chain(location);
        }

        self.last_distance_min
    }

    fn run_solver_max(
        &mut self,
        ignore_sampled: bool,
        results: &mut Vec<SearchPoint, MAX_TASK_POINTS>,
    ) -> bool {
        results.clear();

        let n = self.task_points.len();
        if n < 2 {
            return false;
        }

        let active = self.active_task_point;
        let solver = self.solver_max.get_or_insert_with(StagePathSolver::new);
        solver.set_stage_count(n);

        for i in 0..n {
            let point = &self.task_points[i];
            let boundary = if i == active || ignore_sampled {
                // one can still travel further inside the current sector
                point.boundary_points()
            } else {
                point.search_points()
            };
            solver.set_boundary(i, boundary);
        }

        let mut start_radius = None;
        let mut finish_radius = None;
        if self.ordered_settings.subtract_start_finish_cylinder_radius {
            // solve against the ring centers only; the solutions are
            // shifted back onto the ring toward their neighbours below
            start_radius = self.task_points[0].cylinder_radius().filter(|r| *r > 0.0);
            if start_radius.is_some() {
                solver.set_boundary(0, self.task_points[0].nominal_points());
            }

            finish_radius = self.task_points[n - 1]
                .cylinder_radius()
                .filter(|r| *r > 0.0);
            if finish_radius.is_some() {
                solver.set_boundary(n - 1, self.task_points[n - 1].nominal_points());
            }
        }

        if !solver.solve(PathMode::Longest) {
            return false;
        }

        for stage in 0..n {
            let _ = results.push(solver.solution(stage));
        }

        if let Some(radius) = start_radius {
            let center = self.task_points[0].location();
            let neighbour = results[1].location();
            let on_ring = center.intermediate_point(&neighbour, radius);
            results[0] = SearchPoint::new(on_ring, &self.projection);
        }
        if let Some(radius) = finish_radius {
            let center = self.task_points[n - 1].location();
            let neighbour = results[n - 2].location();
            let on_ring = center.intermediate_point(&neighbour, radius);
            results[n - 1] = SearchPoint::new(on_ring, &self.projection);
        }

        true
    }

    /// Maximum achievable distance given the flown history: visited zones
    /// contribute their achieved polygon, the rest their full boundary.
    pub fn scan_distance_max(&mut self) -> f64 {
        if self.task_points.is_empty() {
            return 0.0;
        }
        debug_assert!(self.active_task_point < self.task_points.len());

        let mut results: Vec<SearchPoint, MAX_TASK_POINTS> = Vec::new();
        if self.run_solver_max(false, &mut results) {
            for (i, solution) in results.iter().enumerate() {
                self.task_points[i].set_search_max(*solution);
                if i <= self.active_task_point && self.task_points[i].has_sampled() {
                    self.task_points[i].set_search_min(*solution);
                }
            }
        }

        self.distance_chain(|tp| tp.search_max())
    }

    /// Maximum achievable distance of the task as planned, ignoring the
    /// flown history.
    pub fn scan_distance_max_total(&mut self) -> f64 {
        if self.task_points.is_empty() {
            return 0.0;
        }
        debug_assert!(self.active_task_point < self.task_points.len());

        let mut results: Vec<SearchPoint, MAX_TASK_POINTS> = Vec::new();
        if self.run_solver_max(true, &mut results) {
            for (i, solution) in results.iter().enumerate() {
                self.task_points[i].set_search_max_total(*solution);
            }
        }

        self.distance_chain(|tp| tp.search_max_total())
    }

    /// Center-to-center task distance with the start/finish ring radii
    /// subtracted per the FAI rule.
    pub fn scan_distance_nominal(&self) -> f64 {
        if self.task_points.is_empty() {
            return 0.0;
        }

        let mut distance = self.distance_chain(|tp| {
            SearchPoint::unprojected(tp.location())
        });

        if self.ordered_settings.subtract_start_finish_cylinder_radius {
            if let Some(radius) = self.task_points[0].cylinder_radius() {
                if radius > 0.0 && radius < distance {
                    distance -= radius;
                }
            }
            if self.task_points.len() > 1 {
                if let Some(radius) =
                    self.task_points[self.task_points.len() - 1].cylinder_radius()
                {
                    if radius > 0.0 && radius < distance {
                        distance -= radius;
                    }
                }
            }
        }

        distance
    }

    /// Center-to-center task distance without ring subtraction.
    pub fn scan_distance_planned(&self) -> f64 {
        self.distance_chain(|tp| SearchPoint::unprojected(tp.location()))
    }

    /// Distance achieved along the scored points up to `location`.
    pub fn scan_distance_travelled(&self, location: GeoPoint) -> f64 {
        if !self.task_started(false) {
            return 0.0;
        }

        let mut distance = 0.0;
        let mut previous = match self.task_points[0].scored_state() {
            Some(state) => state.location,
            None => return 0.0,
        };

        for tp in &self.task_points[1..] {
            if let Some(state) = tp.scored_state() {
                distance += previous.distance(&state.location);
                previous = state.location;
            }
        }

        if !self.stats.task_finished && location.is_valid() {
            distance += previous.distance(&location);
        }

        distance
    }

    /// Remaining distance over the current minimum-path solution, without
    /// re-solving.
    pub fn scan_distance_remaining(&self, location: GeoPoint) -> f64 {
        self.distance_min_chain(location)
    }

    fn distance_is_significant(&self, location: GeoPoint, location_last: GeoPoint) -> bool {
        let a = SearchPoint::new(location, &self.projection);
        let b = SearchPoint::new(location_last, &self.projection);
        a.flat_square_distance(&b) > 1
    }

    fn update_stats_distances(&mut self, location: GeoPoint, full: bool) {
        if full {
            self.stats.distance_max = self.scan_distance_max();
            self.stats.distance_max_total = self.scan_distance_max_total();
        }

        self.stats.total.remaining = self.scan_distance_min(location, full);
        self.stats.distance_nominal = self.scan_distance_nominal();
        self.stats.total.planned = self.scan_distance_planned();
        self.stats.total.travelled = self.scan_distance_travelled(location);

        self.update_leg_stats(location);
    }

    fn update_leg_stats(&mut self, location: GeoPoint) {
        let n = self.task_points.len();
        if n == 0 || self.active_task_point >= n {
            self.stats.current_leg.reset();
            return;
        }

        let active = self.active_task_point;
        let active_location = self.task_points[active].location();

        self.stats.current_leg.planned = if active > 0 {
            self.task_points[active - 1]
                .location()
                .distance(&active_location)
        } else {
            0.0
        };

        self.stats.current_leg.remaining = if location.is_valid() {
            location.distance(&self.task_points[active].search_min().location())
        } else {
            0.0
        };

        self.stats.current_leg.travelled = if active > 0 && location.is_valid() {
            self.task_points[active - 1]
                .scored_state()
                .map(|s| s.location.distance(&location))
                .unwrap_or(0.0)
        } else {
            0.0
        };
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Process one fix pair: detect zone transitions around the active
    /// index, select optional starts, advance the active point and latch
    /// start/finish statistics. Events fire synchronously in ascending
    /// point order. Returns whether a full distance rescan is required.
    pub fn check_transitions(
        &mut self,
        state: &AircraftState,
        state_last: &AircraftState,
        events: &mut dyn TaskEvents,
    ) -> bool {
        if !self.has_start() {
            return false;
        }

        self.scan_active();

        if !state.flying {
            return false;
        }

        let n_task = self.task_points.len();

        let bb_now = FlatBoundingBox::from_point(self.projection.project(state.location), 1);
        let bb_last =
            FlatBoundingBox::from_point(self.projection.project(state_last.location), 1);

        let last_started_time = self.stats.start.started_time();
        let last_finished = self.stats.task_finished;

        let t_min = self.active_task_point.saturating_sub(1);
        let t_max = self.active_task_point.min(n_task - 1);
        let mut full_update = false;

        let mut i = t_min;
        while i <= t_max {
            let mut transition_enter = false;
            let mut transition_exit = false;

            if i == 0 {
                full_update |= self.check_transition_optional_start(
                    state,
                    state_last,
                    &bb_now,
                    &bb_last,
                    &mut transition_enter,
                    &mut transition_exit,
                    events,
                );
            }

            full_update |= self.check_transition_point(
                i,
                state,
                state_last,
                &bb_now,
                &bb_last,
                &mut transition_enter,
                &mut transition_exit,
                i == 0,
                events,
            );

            if i == self.active_task_point {
                let last_request_armed = self.task_advance.need_to_arm();
                let kind = self.task_points[i].kind();
                let gate_open = self.start_gate_open(state);

                if self.task_advance.check_ready_to_advance(
                    kind,
                    transition_enter,
                    transition_exit,
                    gate_open,
                ) {
                    self.task_advance.set_armed(false);

                    if i + 1 < n_task {
                        i += 1;
                        self.set_active_task_point(i);
                        self.scan_active();
                        events.active_advanced(i);
                        log_debug!("active task point advanced to {}", i);

                        // the start exit cleared its samples, so the next
                        // distance scan must re-solve
                        full_update = true;
                    }
                } else if !last_request_armed && self.task_advance.need_to_arm() {
                    events.request_arm(i);
                }
            }

            i += 1;
        }

        self.stats.need_to_arm = self.task_advance.need_to_arm();

        self.scan_active();

        self.stats.task_finished =
            self.has_finish() && self.task_points[self.task_points.len() - 1].has_entered();

        if self.task_started(false) {
            let start_state = *self.task_points[0].exited_state();
            debug_assert!(start_state.has_time());
            let advanced_by_pev = self.stats.pev_based_advance_ready;
            self.stats.start.set_started(&start_state, advanced_by_pev);
            self.stats.pev_based_advance_ready = false;

            if self.has_finish() {
                let last = self.task_points.len() - 1;
                let height = self.task_points[last].calculate_finish_height_from_start(
                    self.stats.start.altitude,
                    &self.ordered_settings.finish_constraints,
                );
                self.task_points[last].set_fai_finish_height(height);
            }
        }

        let started_time = self.stats.start.started_time();
        if started_time >= 0.0 && started_time > last_started_time {
            log_info!("task started at {}", started_time);
            events.task_start();
        }
        if self.stats.task_finished && !last_finished {
            log_info!("task finished");
            events.task_finish();
        }

        full_update
    }

    #[allow(clippy::too_many_arguments)]
    fn check_transition_optional_start(
        &mut self,
        state: &AircraftState,
        state_last: &AircraftState,
        bb_now: &FlatBoundingBox,
        bb_last: &FlatBoundingBox,
        transition_enter: &mut bool,
        transition_exit: &mut bool,
        events: &mut dyn TaskEvents,
    ) -> bool {
        let mut full_update = false;

        for index in 0..self.optional_start_points.len() {
            full_update |= self.check_optional_point(
                index,
                state,
                state_last,
                bb_now,
                bb_last,
                transition_enter,
                transition_exit,
                events,
            );

            if *transition_enter || *transition_exit {
                // the last start zone flown through is the one scored; the
                // pilot has no say in this
                self.select_optional_start(index);
                return full_update;
            }
        }

        full_update
    }

    #[allow(clippy::too_many_arguments)]
    fn check_transition_point(
        &mut self,
        index: usize,
        state: &AircraftState,
        state_last: &AircraftState,
        bb_now: &FlatBoundingBox,
        bb_last: &FlatBoundingBox,
        transition_enter: &mut bool,
        transition_exit: &mut bool,
        is_start: bool,
        events: &mut dyn TaskEvents,
    ) -> bool {
        let pev_ready = self.stats.pev_based_advance_ready;
        let score_pev = self.ordered_settings.start_constraints.score_pev;
        let gate_open = self.start_gate_open(state);

        let point = &mut self.task_points[index];
        let nearby = point.bounding_box_overlaps(bb_now) || point.bounding_box_overlaps(bb_last);

        if nearby && point.transition_enter(state, state_last) {
            *transition_enter = true;
            events.enter_transition(index);
        }

        let point = &mut self.task_points[index];
        if nearby && point.transition_exit(state, state_last, pev_ready, score_pev, gate_open) {
            *transition_exit = true;
            events.exit_transition(index);
        }

        if is_start {
            self.update_start_transition(state);
        }

        if nearby {
            self.task_points[index].update_sample_near(state, &self.projection)
        } else {
            self.task_points[index].update_sample_far(state, &self.projection)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn check_optional_point(
        &mut self,
        index: usize,
        state: &AircraftState,
        state_last: &AircraftState,
        bb_now: &FlatBoundingBox,
        bb_last: &FlatBoundingBox,
        transition_enter: &mut bool,
        transition_exit: &mut bool,
        events: &mut dyn TaskEvents,
    ) -> bool {
        let pev_ready = self.stats.pev_based_advance_ready;
        let score_pev = self.ordered_settings.start_constraints.score_pev;
        let gate_open = self.start_gate_open(state);

        let point = &mut self.optional_start_points[index];
        let nearby = point.bounding_box_overlaps(bb_now) || point.bounding_box_overlaps(bb_last);

        if nearby && point.transition_enter(state, state_last) {
            *transition_enter = true;
            events.enter_transition(0);
        }

        let point = &mut self.optional_start_points[index];
        if nearby && point.transition_exit(state, state_last, pev_ready, score_pev, gate_open) {
            *transition_exit = true;
            events.exit_transition(0);
        }

        if nearby {
            self.optional_start_points[index].update_sample_near(state, &self.projection)
        } else {
            self.optional_start_points[index].update_sample_far(state, &self.projection)
        }
    }

    /// While the start is active, keep its boundary point optimal for the
    /// current aircraft position; an entered-but-not-exited start that the
    /// aircraft abandoned resets to nominal.
    fn update_start_transition(&mut self, state: &AircraftState) {
        if self.active_task_point == 0 {
            if self.task_points.len() > 1 {
                let next_location = self.task_points[1].location();
                self.task_points[0].find_best_start(state, next_location, &self.projection);
            }
        } else {
            let start = &mut self.task_points[0];
            if !start.has_exited() && !start.is_in_sector(state) {
                start.reset();
            }
        }
    }

    fn start_gate_open(&self, state: &AircraftState) -> bool {
        let span = self.ordered_settings.start_constraints.open_time_span;
        let now = if state.has_time() {
            RoughTime::from_second_of_day(state.time as u32)
        } else {
            RoughTime::INVALID
        };
        span.has_begun(now) && !span.has_ended(now)
    }

    // ------------------------------------------------------------------
    // Pilot events
    // ------------------------------------------------------------------

    /// Latch a pilot event. Refused while a PEV-scored gate has not begun
    /// at the last observed state time.
    pub fn set_pev(&mut self) -> bool {
        if self.last_state_time < 0.0 {
            return false;
        }

        if self.has_start() && self.ordered_settings.start_constraints.score_pev {
            let now = RoughTime::from_second_of_day(self.last_state_time as u32);
            if !self
                .ordered_settings
                .start_constraints
                .open_time_span
                .has_begun(now)
            {
                // the gate is not yet open
                log_debug!("pilot event ignored, gate not open");
                return false;
            }
        }

        self.pev_received = true;
        true
    }

    /// Program the start gate from a latched pilot event. The gate opens
    /// on the first whole minute after the configured wait time; with
    /// PEV-scored starts the window end stays open and the advance flag is
    /// raised instead.
    pub fn update_after_pev(&mut self, state: &AircraftState) {
        self.pev_received = false;

        if !state.has_time() {
            return;
        }

        let seconds = state.time as u32;
        let mut new_start = RoughTime::from_second_of_day(seconds);
        let mut new_end = RoughTime::INVALID;

        let constraints = self.ordered_settings.start_constraints;

        if constraints.pev_start_wait_time > 0 {
            let mut minutes = (constraints.pev_start_wait_time / 60) as u16;
            // open on the next full minute so the wait time has fully passed
            if seconds % 60 > 0 {
                minutes += 1;
            }
            new_start = new_start.offset_minutes(minutes);
        }

        if constraints.score_pev {
            // the start should occur on reaching the start zone after the
            // event, so the window end is not limited
            self.stats.pev_based_advance_ready = true;
        } else if constraints.pev_start_window > 0 {
            new_end = new_start.offset_minutes((constraints.pev_start_window / 60) as u16);
        }

        self.ordered_settings.start_constraints.open_time_span =
            crate::time::RoughTimeSpan::new(new_start, new_end);
        log_info!(
            "pilot event: start gate opens at minute {}",
            new_start.minute_of_day()
        );
    }

    // ------------------------------------------------------------------
    // Update pipeline
    // ------------------------------------------------------------------

    /// Per-fix update: transitions, distance scans, stats publication.
    /// `state.time` must be monotonic between resets.
    pub fn update(
        &mut self,
        state: &AircraftState,
        state_last: &AircraftState,
        events: &mut dyn TaskEvents,
    ) -> bool {
        debug_assert!(state.location.is_valid());
        if !state.location.is_valid() {
            return false;
        }
        self.last_state_time = state.time;

        if self.pev_received {
            self.update_after_pev(state);
        }

        let full = self.check_transitions(state, state_last, events) || self.force_full_update;
        self.force_full_update = false;

        self.update_stats_distances(state.location, full);
        self.update_sample(state);

        full
    }

    fn update_sample(&mut self, state: &AircraftState) {
        debug_assert!(state.location.is_valid());
        self.stats.inside_oz = self
            .active_point()
            .map(|tp| tp.is_in_sector(state))
            .unwrap_or(false);
    }

    /// Idle-time recalculation: refresh time estimates from the polar.
    /// The polar is borrowed for this call only.
    pub fn update_idle(&mut self, state: &AircraftState, polar: &dyn GlidePolar) -> bool {
        let speed = self.task_behaviour.glide.degraded_speed(polar);
        if speed <= 0.0 {
            return false;
        }

        self.update_leg_stats(state.location);
        self.stats.total.time_remaining = self.stats.total.remaining / speed;
        self.stats.current_leg.time_remaining = self.stats.current_leg.remaining / speed;

        true
    }

    /// Altitude margin over the remaining task per meter of distance.
    pub fn calc_gradient(&self, state: &AircraftState) -> f64 {
        if self.task_points.is_empty() {
            return 0.0;
        }

        let distance = self.distance_min_chain(state.location);
        if distance <= 0.0 {
            return 0.0;
        }

        let last = &self.task_points[self.task_points.len() - 1];
        (state.altitude - last.waypoint().elevation) / distance
    }

    /// Incremental boundary statistics only make sense away from the
    /// sectors (or inside a boundary-scored area).
    pub fn allow_incremental_boundary_stats(&self, state: &AircraftState) -> bool {
        if self.active_task_point == 0 {
            // disabled for the start point
            return false;
        }
        let Some(active) = self.active_point() else {
            return false;
        };

        if active.is_area() {
            return true;
        }

        let in_sector = active.is_in_sector(state)
            || self.task_points[self.active_task_point - 1].is_in_sector(state);
        !in_sector
    }

    /// Index of the last intermediate point already achieved.
    pub fn get_last_intermediate_achieved(&self) -> usize {
        if self.task_points.len() < 2 {
            return 0;
        }
        for i in 1..self.task_points.len() - 1 {
            if !self.task_points[i].has_entered() {
                return i - 1;
            }
        }
        self.task_points.len() - 2
    }

    /// Fill the compact per-point summary for external display.
    pub fn task_summary(&self, summary: &mut TaskSummary) {
        summary.clear();
        summary.active = self.active_task_point;

        for (i, tp) in self.task_points.iter().enumerate() {
            let planned_distance = if i > 0 {
                self.task_points[i - 1].location().distance(&tp.location())
            } else {
                0.0
            };
            let achieved = if i == 0 {
                tp.has_exited()
            } else {
                tp.has_sampled()
            };
            let _ = summary.points.push(TaskSummaryPoint {
                planned_distance,
                achieved,
            });
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn append(&mut self, mut point: TaskPoint) -> bool {
        if !self.task_points.is_empty()
            && (!point.kind().is_predecessor_allowed()
                || !self.task_points[self.task_points.len() - 1]
                    .kind()
                    .is_successor_allowed())
        {
            return false;
        }
        if self.is_full() {
            return false;
        }

        point.reset();
        let index = self.task_points.len();
        if index == 0 {
            // seed so the incremental scan has a reference
            self.last_min_location = point.location();
        }
        if self.task_points.push(point).is_err() {
            return false;
        }

        self.rewire_neighbours();
        self.force_full_update = true;
        true
    }

    pub fn insert(&mut self, point: TaskPoint, position: usize) -> bool {
        if position >= self.task_points.len() {
            return self.append(point);
        }

        if (position > 0 && !point.kind().is_predecessor_allowed())
            || !point.kind().is_successor_allowed()
            || (position > 0 && !self.task_points[position - 1].kind().is_successor_allowed())
            || !self.task_points[position].kind().is_predecessor_allowed()
        {
            return false;
        }
        if self.is_full() {
            return false;
        }

        if self.active_task_point >= position {
            self.active_task_point += 1;
        }

        let mut point = point;
        point.reset();
        if self.task_points.insert(position, point).is_err() {
            return false;
        }

        self.rewire_neighbours();
        self.force_full_update = true;
        true
    }

    pub fn remove(&mut self, position: usize) -> bool {
        if position >= self.task_points.len() {
            return false;
        }

        if self.ordered_settings.emulate_legacy_remove {
            if self.active_task_point > position
                || (self.active_task_point > 0
                    && self.active_task_point == self.task_points.len() - 1)
            {
                self.active_task_point -= 1;
            }
        } else if self.active_task_point > position {
            self.active_task_point -= 1;
        }

        self.task_points.remove(position);

        if !self.ordered_settings.emulate_legacy_remove
            && !self.task_points.is_empty()
            && self.active_task_point >= self.task_points.len()
        {
            self.active_task_point = self.task_points.len() - 1;
        }

        self.rewire_neighbours();
        self.force_full_update = true;
        true
    }

    pub fn replace(&mut self, point: TaskPoint, position: usize) -> bool {
        if position >= self.task_points.len() {
            return false;
        }

        if self.task_points[position].equals(&point) {
            // nothing to do
            return true;
        }

        if (position > 0 && !point.kind().is_predecessor_allowed())
            || (position + 1 < self.task_points.len() && !point.kind().is_successor_allowed())
        {
            return false;
        }

        let mut point = point;
        point.reset();
        self.task_points[position] = point;

        if position > 0 {
            self.set_neighbours(position - 1);
        }
        self.set_neighbours(position);
        if position + 1 < self.task_points.len() {
            self.set_neighbours(position + 1);
        }
        self.force_full_update = true;
        true
    }

    /// Same point, different waypoint.
    pub fn relocate(&mut self, position: usize, waypoint: Waypoint) -> bool {
        if position >= self.task_points.len() {
            return false;
        }
        let replacement = self.task_points[position].with_waypoint(waypoint);
        self.replace(replacement, position)
    }

    pub fn append_optional_start(&mut self, mut point: TaskPoint) -> bool {
        point.reset();
        if self.optional_start_points.push(point).is_err() {
            return false;
        }
        if self.task_points.len() > 1 {
            self.set_neighbours(0);
        }
        true
    }

    pub fn remove_optional_start(&mut self, position: usize) -> bool {
        if position >= self.optional_start_points.len() {
            return false;
        }

        self.optional_start_points.remove(position);

        if self.task_points.len() > 1 {
            self.set_neighbours(0);
        }
        true
    }

    pub fn replace_optional_start(&mut self, point: TaskPoint, position: usize) -> bool {
        if position >= self.optional_start_points.len() {
            return false;
        }

        if self.optional_start_points[position].equals(&point) {
            // nothing to do
            return true;
        }

        let mut point = point;
        point.reset();
        self.optional_start_points[position] = point;

        self.set_neighbours(0);
        true
    }

    pub fn relocate_optional_start(&mut self, position: usize, waypoint: Waypoint) -> bool {
        if position >= self.optional_start_points.len() {
            return false;
        }
        let replacement = self.optional_start_points[position].with_waypoint(waypoint);
        self.replace_optional_start(replacement, position)
    }

    /// Swap the optional start at `position` into slot 0; the former
    /// primary start joins the optional list. Flight state moves with the
    /// points.
    pub fn select_optional_start(&mut self, position: usize) {
        debug_assert!(position < self.optional_start_points.len());
        if position >= self.optional_start_points.len() || self.task_points.is_empty() {
            return;
        }

        let selected = self.optional_start_points.remove(position);
        let former = core::mem::replace(&mut self.task_points[0], selected);
        let _ = self.optional_start_points.push(former);
        log_info!("optional start {} selected", position);

        self.set_neighbours(0);
        if self.task_points.len() > 1 {
            self.set_neighbours(1);
        }

        self.update_geometry();
    }

    /// Cycle through the start alternatives.
    pub fn rotate_optional_starts(&mut self) {
        if self.is_empty() || self.optional_start_points.is_empty() {
            return;
        }
        self.select_optional_start(0);
    }

    pub fn remove_all_points(&mut self) {
        self.task_points.clear();
        self.optional_start_points.clear();
        self.active_task_point = 0;
        self.force_full_update = true;
    }

    pub fn clear(&mut self) {
        self.remove_all_points();
        self.reset();
        self.ordered_settings = self.task_behaviour.ordered_defaults;
    }

    // ------------------------------------------------------------------
    // Commit / clone
    // ------------------------------------------------------------------

    /// Structural diff-and-patch against another task: shrink or grow to
    /// match, replace unequal slots. Returns whether anything changed.
    pub fn commit(&mut self, that: &OrderedTask) -> bool {
        let mut modified = false;

        self.set_factory(that.factory_mode);
        self.ordered_settings = that.ordered_settings;

        while self.task_points.len() > that.task_points.len() {
            self.remove(self.task_points.len() - 1);
            modified = true;
        }

        for i in 0..that.task_points.len() {
            if i >= self.task_points.len() {
                self.append(that.task_points[i].clone());
                modified = true;
            } else if !self.task_points[i].equals(&that.task_points[i]) {
                self.replace(that.task_points[i].clone(), i);
                modified = true;
            }
        }

        while self.optional_start_points.len() > that.optional_start_points.len() {
            self.remove_optional_start(self.optional_start_points.len() - 1);
            modified = true;
        }

        for i in 0..that.optional_start_points.len() {
            if i >= self.optional_start_points.len() {
                self.append_optional_start(that.optional_start_points[i].clone());
                modified = true;
            } else if !self.optional_start_points[i].equals(&that.optional_start_points[i]) {
                self.replace_optional_start(that.optional_start_points[i].clone(), i);
                modified = true;
            }
        }

        if modified {
            log_debug!("task commit changed the task");
            self.update_geometry();
        }

        modified
    }

    /// Deep copy under new behaviour; solver state starts fresh.
    pub fn clone_task(&self, task_behaviour: TaskBehaviour) -> OrderedTask {
        let mut new_task = OrderedTask::new(task_behaviour);

        new_task.set_factory(self.factory_mode);
        new_task.ordered_settings = self.ordered_settings;

        for tp in &self.task_points {
            new_task.append(tp.clone());
        }
        for tp in &self.optional_start_points {
            new_task.append_optional_start(tp.clone());
        }

        new_task.active_task_point = self.active_task_point;
        new_task.update_geometry();
        new_task
    }

    /// Deduplicate waypoints against the shared store.
    pub fn check_duplicate_waypoints(&mut self, waypoints: &mut dyn Waypoints) {
        for i in 0..self.task_points.len() {
            let canonical = waypoints.check_exists_or_append(self.task_points[i].waypoint());
            let replacement = self.task_points[i].with_waypoint(canonical);
            let _ = self.replace(replacement, i);
        }
        for i in 0..self.optional_start_points.len() {
            let canonical =
                waypoints.check_exists_or_append(self.optional_start_points[i].waypoint());
            let replacement = self.optional_start_points[i].with_waypoint(canonical);
            let _ = self.replace_optional_start(replacement, i);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Forget all flight state and return to the first point.
    pub fn reset(&mut self) {
        for tp in self.task_points.iter_mut() {
            tp.reset();
        }
        for tp in self.optional_start_points.iter_mut() {
            tp.reset();
        }

        self.stats.task_finished = false;
        self.stats.start.reset();
        self.stats.pev_based_advance_ready = false;
        self.task_advance.reset();
        self.active_task_point = 0;
        self.force_full_update = true;
        self.last_min_location = GeoPoint::INVALID;
        self.last_distance_min = 0.0;
        self.pev_received = false;

        self.update_stats_geometry();
    }
}

//! Task point
//!
//! One node of the ordered task: a waypoint, its observation zone, and the
//! per-flight state accumulated while rounding it. Entry and exit latch
//! once true and only an explicit reset clears them; the aircraft snapshot
//! taken at the scoring transition (exit for a start, entry otherwise)
//! is what the scoring layer reads back.

use heapless::Vec;

use crate::geo::flat::{FlatBoundingBox, FlatProjection};
use crate::geo::search::{prune_interior, SearchPoint};
use crate::geo::{GeoBounds, GeoPoint};
use crate::zone::{ObservationZone, ZoneShape, MAX_BOUNDARY_POINTS};

use super::{ActiveState, AircraftState, TaskPointKind, Waypoint};

/// Achieved-polygon capacity; kept bounded by convex hull pruning.
pub const MAX_SAMPLE_POINTS: usize = 32;

/// Height loss allowed between start and finish under the FAI rule, meters.
pub const FAI_MAX_HEIGHT_LOSS: f64 = 1000.0;

#[derive(Clone, Debug)]
pub struct TaskPoint {
    waypoint: Waypoint,
    kind: TaskPointKind,
    zone: ObservationZone,
    active_state: ActiveState,

    has_entered: bool,
    has_exited: bool,
    entered_state: AircraftState,
    exited_state: AircraftState,

    /// Zone reference under the current projection
    nominal: SearchPoint,
    /// Full zone boundary polygon under the current projection
    boundary_points: Vec<SearchPoint, MAX_BOUNDARY_POINTS>,
    /// Convex hull of fixes collected inside the zone
    sample_points: Vec<SearchPoint, MAX_SAMPLE_POINTS>,

    search_min: SearchPoint,
    search_max: SearchPoint,
    search_max_total: SearchPoint,

    bounding_box: FlatBoundingBox,

    previous: Option<usize>,
    next: Option<usize>,

    /// Minimum arrival height for a finish point, m MSL
    fai_finish_height: f64,
}

impl TaskPoint {
    pub fn new(waypoint: Waypoint, kind: TaskPointKind, shape: ZoneShape) -> Self {
        let location = waypoint.location;
        let nominal = SearchPoint::unprojected(location);
        Self {
            waypoint,
            kind,
            zone: ObservationZone::new(shape, location),
            active_state: ActiveState::AfterActive,
            has_entered: false,
            has_exited: false,
            entered_state: AircraftState::default(),
            exited_state: AircraftState::default(),
            nominal,
            boundary_points: Vec::new(),
            sample_points: Vec::new(),
            search_min: nominal,
            search_max: nominal,
            search_max_total: nominal,
            bounding_box: FlatBoundingBox::empty(),
            previous: None,
            next: None,
            fai_finish_height: 0.0,
        }
    }

    pub fn kind(&self) -> TaskPointKind {
        self.kind
    }

    pub fn waypoint(&self) -> &Waypoint {
        &self.waypoint
    }

    pub fn location(&self) -> GeoPoint {
        self.waypoint.location
    }

    pub fn zone(&self) -> &ObservationZone {
        &self.zone
    }

    pub fn active_state(&self) -> ActiveState {
        self.active_state
    }

    pub(crate) fn set_active_state(&mut self, state: ActiveState) {
        self.active_state = state;
    }

    pub fn has_entered(&self) -> bool {
        self.has_entered
    }

    pub fn has_exited(&self) -> bool {
        self.has_exited
    }

    pub fn has_sampled(&self) -> bool {
        !self.sample_points.is_empty()
    }

    pub fn entered_state(&self) -> &AircraftState {
        &self.entered_state
    }

    pub fn exited_state(&self) -> &AircraftState {
        &self.exited_state
    }

    /// The snapshot that scores this point: exit for a start, entry for
    /// intermediates and the finish.
    pub fn scored_state(&self) -> Option<&AircraftState> {
        match self.kind {
            TaskPointKind::Start => self.has_exited.then(|| &self.exited_state),
            _ => self.has_entered.then(|| &self.entered_state),
        }
    }

    pub fn is_in_sector(&self, state: &AircraftState) -> bool {
        self.zone.contains(&state.location)
    }

    /// The start and finish rings are plain cylinders; the subtraction
    /// rule does not apply to other shapes.
    pub fn cylinder_radius(&self) -> Option<f64> {
        self.zone.shape().cylinder_radius()
    }

    pub fn is_area(&self) -> bool {
        self.kind.is_area()
    }

    // ------------------------------------------------------------------
    // Neighbours (indices into the owning task vector, never references)
    // ------------------------------------------------------------------

    pub fn set_neighbours(&mut self, previous: Option<usize>, next: Option<usize>) {
        self.previous = previous;
        self.next = next;
    }

    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    pub fn next(&self) -> Option<usize> {
        self.next
    }

    // ------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------

    /// Recompute zone orientation, boundary polygon, projections and the
    /// bounding box. Called after every structural change or projection
    /// refresh.
    pub fn update_oz(
        &mut self,
        projection: &FlatProjection,
        previous: Option<GeoPoint>,
        next: Option<GeoPoint>,
    ) {
        self.zone.set_legs(previous, next);

        self.boundary_points.clear();
        for p in self.zone.boundary() {
            let _ = self.boundary_points.push(SearchPoint::new(p, projection));
        }

        self.nominal = SearchPoint::new(self.location(), projection);
        for sp in self.sample_points.iter_mut() {
            sp.reproject(projection);
        }
        self.search_min.reproject(projection);
        self.search_max.reproject(projection);
        self.search_max_total.reproject(projection);

        let mut bb = FlatBoundingBox::empty();
        bb.extend(self.nominal.flat());
        for sp in &self.boundary_points {
            bb.extend(sp.flat());
        }
        for sp in &self.sample_points {
            bb.extend(sp.flat());
        }
        bb.inflate();
        self.bounding_box = bb;
    }

    /// Extend `bounds` with the zone extent. Independent of the projection
    /// so it can feed the projection itself.
    pub fn scan_bounds(&self, bounds: &mut GeoBounds) {
        bounds.extend(self.location());
        for p in self.zone.boundary() {
            bounds.extend(p);
        }
    }

    pub fn bounding_box_overlaps(&self, bb: &FlatBoundingBox) -> bool {
        self.bounding_box.overlaps(bb)
    }

    // ------------------------------------------------------------------
    // Transitions and sampling
    // ------------------------------------------------------------------

    /// Latch an entry on the crossing fix pair.
    pub fn transition_enter(&mut self, state: &AircraftState, state_last: &AircraftState) -> bool {
        if !self.zone.transition_enter(&state.location, &state_last.location) {
            return false;
        }
        self.has_entered = true;
        self.entered_state = *state;
        true
    }

    /// Latch an exit on the crossing fix pair.
    ///
    /// A start only scores its exit inside an open gate, and a PEV-scored
    /// start additionally needs a pilot event first. Exiting implies having
    /// been inside, so the entry latch is backfilled when the engine never
    /// saw the entry crossing.
    pub fn transition_exit(
        &mut self,
        state: &AircraftState,
        state_last: &AircraftState,
        pev_ready: bool,
        score_pev: bool,
        gate_open: bool,
    ) -> bool {
        if !self.zone.transition_exit(&state.location, &state_last.location) {
            return false;
        }
        if self.kind == TaskPointKind::Start {
            if !gate_open {
                return false;
            }
            if score_pev && !pev_ready {
                return false;
            }
        }

        if !self.has_entered {
            self.has_entered = true;
            self.entered_state = *state_last;
        }
        self.has_exited = true;
        self.exited_state = *state;

        if self.kind == TaskPointKind::Start {
            // the start scores from the exit crossing, not the loiter before it
            let last = self.sample_points.last().copied();
            self.sample_points.clear();
            if let Some(last) = last {
                let _ = self.sample_points.push(last);
            }
        }

        true
    }

    /// Add the fix to the achieved polygon when inside the zone. Returns
    /// true when the scored shape changed.
    pub fn update_sample_near(
        &mut self,
        state: &AircraftState,
        projection: &FlatProjection,
    ) -> bool {
        debug_assert!(state.location.is_valid());
        if !self.zone.contains(&state.location) {
            return false;
        }

        let sample = SearchPoint::new(state.location, projection);
        if self.sample_points.last() == Some(&sample) {
            return false;
        }

        if self.sample_points.push(sample).is_err() {
            prune_interior(&mut self.sample_points);
            if self.sample_points.push(sample).is_err() {
                return false;
            }
        }
        prune_interior(&mut self.sample_points);

        // the fix only changed the scored shape if it survived pruning
        self.sample_points.iter().any(|p| *p == sample)
    }

    /// Counterpart of `update_sample_near` for fixes away from the zone;
    /// the achieved polygon cannot change there.
    pub fn update_sample_far(
        &mut self,
        state: &AircraftState,
        _projection: &FlatProjection,
    ) -> bool {
        debug_assert!(state.location.is_valid());
        false
    }

    /// Candidate polygon for the path solver: the achieved hull once the
    /// aircraft has sampled the zone, the full boundary before that.
    pub fn search_points(&self) -> &[SearchPoint] {
        if self.has_sampled() {
            &self.sample_points
        } else {
            &self.boundary_points
        }
    }

    pub fn boundary_points(&self) -> &[SearchPoint] {
        &self.boundary_points
    }

    /// The zone reference alone, used for the ring subtraction solve.
    pub fn nominal_points(&self) -> &[SearchPoint] {
        core::slice::from_ref(&self.nominal)
    }

    // ------------------------------------------------------------------
    // Solver write-backs
    // ------------------------------------------------------------------

    pub fn set_search_min(&mut self, sp: SearchPoint) {
        self.search_min = sp;
    }

    pub fn set_search_max(&mut self, sp: SearchPoint) {
        self.search_max = sp;
    }

    pub fn set_search_max_total(&mut self, sp: SearchPoint) {
        self.search_max_total = sp;
    }

    pub fn search_min(&self) -> SearchPoint {
        self.search_min
    }

    pub fn search_max(&self) -> SearchPoint {
        self.search_max
    }

    pub fn search_max_total(&self) -> SearchPoint {
        self.search_max_total
    }

    /// Pick the boundary point minimising aircraft-boundary-next distance
    /// while the start is still the active point.
    pub fn find_best_start(
        &mut self,
        state: &AircraftState,
        next_location: GeoPoint,
        _projection: &FlatProjection,
    ) {
        let mut best: Option<(f64, SearchPoint)> = None;
        for sp in &self.boundary_points {
            let d = state.location.distance(&sp.location())
                + sp.location().distance(&next_location);
            match best {
                Some((best_d, _)) if best_d <= d => {}
                _ => best = Some((d, *sp)),
            }
        }
        if let Some((_, sp)) = best {
            self.search_min = sp;
        }
    }

    // ------------------------------------------------------------------
    // Finish height
    // ------------------------------------------------------------------

    pub fn fai_finish_height(&self) -> f64 {
        self.fai_finish_height
    }

    pub fn set_fai_finish_height(&mut self, height: f64) {
        self.fai_finish_height = height;
    }

    /// Minimum arrival height derived from the start altitude.
    pub fn calculate_finish_height_from_start(
        &self,
        start_altitude: f64,
        constraints: &super::FinishConstraints,
    ) -> f64 {
        let floor = self.waypoint.elevation + constraints.min_height;
        if constraints.fai_finish {
            floor.max(start_altitude - FAI_MAX_HEIGHT_LOSS)
        } else {
            floor
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Forget all flight state; geometry is untouched.
    pub fn reset(&mut self) {
        self.has_entered = false;
        self.has_exited = false;
        self.entered_state = AircraftState::default();
        self.exited_state = AircraftState::default();
        self.sample_points.clear();
        self.search_min = self.nominal;
        self.search_max = self.nominal;
        self.search_max_total = self.nominal;
    }

    /// Same point at a different waypoint; flight state starts over.
    pub fn with_waypoint(&self, waypoint: Waypoint) -> Self {
        Self::new(waypoint, self.kind, self.zone.shape())
    }

    /// Structural equality: same waypoint, kind and zone. Flight state is
    /// ignored, which is what the commit diff wants.
    pub fn equals(&self, other: &TaskPoint) -> bool {
        self.waypoint == other.waypoint && self.kind == other.kind && self.zone == other.zone
    }
}

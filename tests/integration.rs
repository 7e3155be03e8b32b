//! End-to-end scenarios: complete tasks flown fix by fix through the
//! ordered task engine, checking transitions, scoring and distances
//! against known geometry.

use xcpilot_core::geo::GeoPoint;
use xcpilot_core::glide::{GlidePolar, GlideSettings};
use xcpilot_core::task::{
    AircraftState, IntermediateKind, OrderedTask, TaskBehaviour, TaskEvents, TaskFactoryType,
    TaskPoint, TaskPointKind, Waypoint,
};
use xcpilot_core::zone::ZoneShape;

const NORTH: f64 = 0.0;
const EAST: f64 = core::f64::consts::FRAC_PI_2;
const SOUTH: f64 = core::f64::consts::PI;
const WEST: f64 = 1.5 * core::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Enter(usize),
    Exit(usize),
    Advanced(usize),
    RequestArm(usize),
    TaskStart,
    TaskFinish,
}

#[derive(Default)]
struct RecordingEvents {
    events: Vec<Event>,
}

impl RecordingEvents {
    fn count(&self, event: Event) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }
}

impl TaskEvents for RecordingEvents {
    fn enter_transition(&mut self, index: usize) {
        self.events.push(Event::Enter(index));
    }

    fn exit_transition(&mut self, index: usize) {
        self.events.push(Event::Exit(index));
    }

    fn active_advanced(&mut self, index: usize) {
        self.events.push(Event::Advanced(index));
    }

    fn request_arm(&mut self, index: usize) {
        self.events.push(Event::RequestArm(index));
    }

    fn task_start(&mut self) {
        self.events.push(Event::TaskStart);
    }

    fn task_finish(&mut self) {
        self.events.push(Event::TaskFinish);
    }
}

fn cylinder_point(name: &str, location: GeoPoint, kind: TaskPointKind, radius: f64) -> TaskPoint {
    TaskPoint::new(
        Waypoint::new(name, location, 0.0),
        kind,
        ZoneShape::Cylinder { radius },
    )
}

fn fix(location: GeoPoint, time: f64) -> AircraftState {
    AircraftState {
        location,
        altitude: 1000.0,
        ground_speed: 30.0,
        time,
        flying: true,
    }
}

/// Feed a fix sequence through the task, asserting that the active index
/// never moves backwards.
fn fly(task: &mut OrderedTask, fixes: &[AircraftState], events: &mut RecordingEvents) {
    let mut last = fixes[0];
    let mut last_active = task.active_index();
    for state in fixes {
        task.update(state, &last, events);
        assert!(
            task.active_index() >= last_active,
            "active index moved backwards"
        );
        last_active = task.active_index();
        last = *state;
    }
}

// ====================================================================
// Simple racing task: start, finish, scored distances
// ====================================================================

#[test]
fn test_racing_task_start_to_finish() {
    let start_center = GeoPoint::from_degrees(0.0, 0.0);
    let finish_center = GeoPoint::from_degrees(1.0, 0.0);

    let mut task = OrderedTask::new(TaskBehaviour::default());
    assert!(task.append(cylinder_point("start", start_center, TaskPointKind::Start, 1000.0)));
    assert!(task.append(cylinder_point(
        "finish",
        finish_center,
        TaskPointKind::Finish,
        1000.0
    )));
    task.update_geometry();
    assert!(task.stats().task_valid);

    // one degree of latitude minus both rings
    let nominal = task.scan_distance_nominal();
    assert!(
        (nominal - (111_195.0 - 2000.0)).abs() < 30.0,
        "nominal {}",
        nominal
    );

    let mut events = RecordingEvents::default();
    let fixes = [
        fix(start_center.offset(2500.0, SOUTH), 40.0),
        fix(start_center, 70.0),
        // exits the start cylinder northbound at t=100
        fix(start_center.offset(2000.0, NORTH), 100.0),
        fix(finish_center.offset(3000.0, SOUTH), 3900.0),
        fix(finish_center, 4000.0),
    ];
    fly(&mut task, &fixes, &mut events);

    // the start scored exactly once, from the exit snapshot
    assert_eq!(events.count(Event::TaskStart), 1);
    let start_stats = task.stats().start;
    assert!(start_stats.has_started());
    assert_eq!(start_stats.time, 100.0);
    assert_eq!(start_stats.altitude, 1000.0);
    assert_eq!(start_stats.ground_speed, 30.0);

    assert_eq!(events.count(Event::Advanced(1)), 1);
    assert_eq!(events.count(Event::TaskFinish), 1);
    assert!(task.stats().task_finished);
    assert_eq!(task.active_index(), 1);

    // scored state chain is consistent
    assert!(task.point(0).unwrap().has_exited());
    assert!(task.point(1).unwrap().has_entered());
    assert!(task.scan_total_start_time() == 100.0);
    assert!(task.scan_leg_start_time() == 100.0);
}

#[test]
fn test_enter_exit_latch_invariant() {
    // has_exited implies has_entered at every step, even when the engine
    // first sees the aircraft inside the zone
    let start_center = GeoPoint::from_degrees(0.0, 0.0);
    let finish_center = GeoPoint::from_degrees(0.5, 0.0);

    let mut task = OrderedTask::new(TaskBehaviour::default());
    task.append(cylinder_point("start", start_center, TaskPointKind::Start, 1000.0));
    task.append(cylinder_point("finish", finish_center, TaskPointKind::Finish, 1000.0));
    task.update_geometry();

    let mut events = RecordingEvents::default();
    let fixes = [
        fix(start_center, 10.0), // first fix already inside
        fix(start_center.offset(1500.0, NORTH), 20.0),
    ];
    fly(&mut task, &fixes, &mut events);

    for i in 0..task.len() {
        let tp = task.point(i).unwrap();
        assert!(!tp.has_exited() || tp.has_entered());
    }
}

// ====================================================================
// Area task: sampling prunes the achievable distance
// ====================================================================

#[test]
fn test_area_task_pruning() {
    let start_center = GeoPoint::from_degrees(0.0, 0.0);
    let area_center = GeoPoint::from_degrees(0.3, 0.0);
    let finish_center = GeoPoint::from_degrees(0.6, 0.0);

    let behaviour = TaskBehaviour {
        task_type_default: TaskFactoryType::Aat,
        ..TaskBehaviour::default()
    };
    let mut task = OrderedTask::new(behaviour);
    task.append(cylinder_point("start", start_center, TaskPointKind::Start, 500.0));
    task.append(cylinder_point(
        "area",
        area_center,
        TaskPointKind::Intermediate(IntermediateKind::Aat),
        5000.0,
    ));
    task.append(cylinder_point("finish", finish_center, TaskPointKind::Finish, 500.0));
    task.update_geometry();
    assert!(task.stats().task_valid);
    assert!(task.stats().has_targets);

    let mut events = RecordingEvents::default();

    // start the task
    fly(
        &mut task,
        &[
            fix(start_center.offset(1500.0, SOUTH), 10.0),
            fix(start_center, 50.0),
            fix(start_center.offset(1500.0, NORTH), 100.0),
        ],
        &mut events,
    );
    assert_eq!(task.active_index(), 1);
    let max_before = task.stats().distance_max;
    assert!(max_before > 0.0);

    // enter the area near its east edge, drift west for a minute, leave west
    fly(
        &mut task,
        &[
            fix(area_center.offset(6000.0, EAST), 600.0),
            fix(area_center.offset(4000.0, EAST), 660.0),
            fix(area_center.offset(2000.0, EAST), 690.0),
            fix(area_center.offset(2000.0, WEST), 720.0),
            fix(area_center.offset(6000.0, WEST), 780.0),
        ],
        &mut events,
    );

    // entering the area advanced the task
    assert_eq!(task.active_index(), 2);
    assert!(task.point(1).unwrap().has_entered());
    assert!(task.point(1).unwrap().has_sampled());

    // the achievable maximum shrank to what the samples allow
    let max_after = task.stats().distance_max;
    assert!(
        max_after <= max_before + 1.0,
        "max grew: before {} after {}",
        max_before,
        max_after
    );

    // the chosen area point lies inside the cylinder
    let chosen = task.point(1).unwrap().search_max().location();
    assert!(
        area_center.distance(&chosen) <= 5010.0,
        "chosen point {} m from center",
        area_center.distance(&chosen)
    );
}

// ====================================================================
// Optional starts
// ====================================================================

#[test]
fn test_optional_start_selection() {
    let primary = GeoPoint::from_degrees(0.0, 0.0);
    let alt0 = GeoPoint::from_degrees(0.08, 0.0);
    let alt1 = GeoPoint::from_degrees(0.0, 0.08);
    let finish = GeoPoint::from_degrees(1.0, 0.0);

    let mut task = OrderedTask::new(TaskBehaviour::default());
    task.append(cylinder_point("primary", primary, TaskPointKind::Start, 1000.0));
    task.append(cylinder_point("finish", finish, TaskPointKind::Finish, 1000.0));
    task.append_optional_start(cylinder_point("alt0", alt0, TaskPointKind::Start, 1000.0));
    task.append_optional_start(cylinder_point("alt1", alt1, TaskPointKind::Start, 1000.0));
    task.update_geometry();

    let mut events = RecordingEvents::default();
    // cross the second alternative, far away from the primary
    fly(
        &mut task,
        &[
            fix(alt1.offset(2000.0, EAST), 10.0),
            fix(alt1, 20.0),
        ],
        &mut events,
    );

    // the crossed alternative was swapped into slot 0, the former primary
    // moved onto the optional list
    assert_eq!(task.point(0).unwrap().waypoint().name.as_str(), "alt1");
    assert_eq!(
        task.optional_start(0).unwrap().waypoint().name.as_str(),
        "alt0"
    );
    assert_eq!(
        task.optional_start(1).unwrap().waypoint().name.as_str(),
        "primary"
    );
    assert_eq!(task.optional_start_count(), 2);

    // its flight state moved with it
    assert!(task.point(0).unwrap().has_entered());

    // exiting now scores the selected start
    fly(
        &mut task,
        &[fix(alt1.offset(1500.0, NORTH), 40.0)],
        &mut events,
    );
    assert!(task.stats().start.has_started());
    assert_eq!(events.count(Event::TaskStart), 1);
}

// ====================================================================
// Distance invariants
// ====================================================================

#[test]
fn test_min_does_not_exceed_max() {
    // the comparison needs both solvers on the same boundaries, so the
    // start/finish ring subtraction is turned off here
    let behaviour = TaskBehaviour::default();
    let mut task = OrderedTask::new(behaviour);
    let mut settings = *task.ordered_settings();
    settings.subtract_start_finish_cylinder_radius = false;
    task.set_ordered_settings(settings);
    task.append(cylinder_point(
        "start",
        GeoPoint::from_degrees(0.0, 0.0),
        TaskPointKind::Start,
        1000.0,
    ));
    task.append(cylinder_point(
        "turn",
        GeoPoint::from_degrees(0.4, 0.2),
        TaskPointKind::Intermediate(IntermediateKind::Racing),
        2000.0,
    ));
    task.append(cylinder_point(
        "finish",
        GeoPoint::from_degrees(0.0, 0.4),
        TaskPointKind::Finish,
        1000.0,
    ));
    task.update_geometry();

    let aircraft = GeoPoint::from_degrees(0.0, 0.0);
    let max = task.scan_distance_max();
    let min = task.scan_distance_min(aircraft, true);
    assert!(min <= max, "min {} max {}", min, max);

    let max_total = task.scan_distance_max_total();
    assert!(max <= max_total + 1.0, "max {} total {}", max, max_total);
}

#[test]
fn test_ring_subtraction_moves_endpoints_onto_rings() {
    let start_center = GeoPoint::from_degrees(0.0, 0.0);
    let finish_center = GeoPoint::from_degrees(1.0, 0.0);

    let mut task = OrderedTask::new(TaskBehaviour::default());
    task.append(cylinder_point("start", start_center, TaskPointKind::Start, 1000.0));
    task.append(cylinder_point("finish", finish_center, TaskPointKind::Finish, 1000.0));
    task.update_geometry();

    let _ = task.scan_distance_max();
    let chosen_start = task.point(0).unwrap().search_max().location();
    let chosen_finish = task.point(1).unwrap().search_max().location();

    // the scored endpoints sit on the rings, toward the other end
    assert!((start_center.distance(&chosen_start) - 1000.0).abs() < 10.0);
    assert!((finish_center.distance(&chosen_finish) - 1000.0).abs() < 10.0);
    assert!(chosen_start.latitude > start_center.latitude);
    assert!(chosen_finish.latitude < finish_center.latitude);

    // and the max distance shows both rings subtracted
    let max = task.stats().distance_max;
    let max = if max > 0.0 { max } else { task.scan_distance_max() };
    assert!((max - (111_195.0 - 2000.0)).abs() < 50.0, "max {}", max);
}

// ====================================================================
// Glide polar consumption
// ====================================================================

struct FixedPolar {
    mc: f64,
    speed: f64,
}

impl GlidePolar for FixedPolar {
    fn mc(&self) -> f64 {
        self.mc
    }

    fn best_speed(&self) -> f64 {
        self.speed
    }
}

#[test]
fn test_update_idle_estimates_time() {
    let mut task = OrderedTask::new(TaskBehaviour::default());
    task.append(cylinder_point(
        "start",
        GeoPoint::from_degrees(0.0, 0.0),
        TaskPointKind::Start,
        1000.0,
    ));
    task.append(cylinder_point(
        "finish",
        GeoPoint::from_degrees(1.0, 0.0),
        TaskPointKind::Finish,
        1000.0,
    ));
    task.update_geometry();

    let state = fix(GeoPoint::from_degrees(0.0, 0.0), 100.0);
    let mut events = RecordingEvents::default();
    task.update(&state, &state, &mut events);

    let polar = FixedPolar {
        mc: 1.5,
        speed: 30.0,
    };
    assert!(task.update_idle(&state, &polar));

    let stats = task.stats();
    assert!(stats.total.remaining > 0.0);
    assert!(
        (stats.total.time_remaining - stats.total.remaining / 30.0).abs() < 1e-6
    );

    let stalled = FixedPolar { mc: 0.0, speed: 0.0 };
    assert!(!task.update_idle(&state, &stalled));
}

#[test]
fn test_update_idle_honours_polar_degradation() {
    let behaviour = TaskBehaviour {
        glide: GlideSettings {
            polar_degradation: 0.5,
        },
        ..TaskBehaviour::default()
    };
    let mut task = OrderedTask::new(behaviour);
    task.append(cylinder_point(
        "start",
        GeoPoint::from_degrees(0.0, 0.0),
        TaskPointKind::Start,
        1000.0,
    ));
    task.append(cylinder_point(
        "finish",
        GeoPoint::from_degrees(1.0, 0.0),
        TaskPointKind::Finish,
        1000.0,
    ));
    task.update_geometry();

    let state = fix(GeoPoint::from_degrees(0.0, 0.0), 100.0);
    let mut events = RecordingEvents::default();
    task.update(&state, &state, &mut events);

    let polar = FixedPolar {
        mc: 1.5,
        speed: 30.0,
    };
    assert!(task.update_idle(&state, &polar));

    // a degraded wing flies the same distance at half the speed
    let stats = task.stats();
    assert!(
        (stats.total.time_remaining - stats.total.remaining / 15.0).abs() < 1e-6
    );
}

// ====================================================================
// Commit round trip
// ====================================================================

#[test]
fn test_commit_planned_task_onto_live() {
    let mut planned = OrderedTask::new(TaskBehaviour::default());
    planned.append(cylinder_point(
        "start",
        GeoPoint::from_degrees(0.0, 0.0),
        TaskPointKind::Start,
        1000.0,
    ));
    planned.append(cylinder_point(
        "turn",
        GeoPoint::from_degrees(0.5, 0.2),
        TaskPointKind::Intermediate(IntermediateKind::Racing),
        2000.0,
    ));
    planned.append(cylinder_point(
        "finish",
        GeoPoint::from_degrees(1.0, 0.0),
        TaskPointKind::Finish,
        1000.0,
    ));
    planned.update_geometry();

    let snapshot = planned.clone_task(TaskBehaviour::default());

    let mut live = OrderedTask::new(TaskBehaviour::default());
    assert!(live.commit(&snapshot));
    assert_eq!(live.len(), 3);
    assert!(live.stats().task_valid);
    assert!(!live.commit(&snapshot));

    // neighbours are consistent after the patch
    for i in 0..live.len() {
        let tp = live.point(i).unwrap();
        assert_eq!(tp.previous(), (i > 0).then(|| i - 1));
        assert_eq!(tp.next(), (i + 1 < live.len()).then(|| i + 1));
    }

    // the nominal distances agree between planned and live
    assert!(
        (live.scan_distance_nominal() - snapshot.scan_distance_nominal()).abs() < 1.0
    );
}

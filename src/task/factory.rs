//! Task validation
//!
//! Structural rules per task type: which point kinds are allowed where.
//! Violations accumulate in a bitset; rendering messages is left to the
//! caller.

use bitflags::bitflags;

use super::{IntermediateKind, TaskPoint, TaskPointKind, MAX_TASK_POINTS};

/// Task scoring family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TaskFactoryType {
    #[default]
    Racing,
    Aat,
    Mat,
    FaiGeneral,
}

/// Structural limits of a task type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FactoryConstraints {
    pub max_points: usize,
    pub task_scored: bool,
}

pub fn constraints(factory: TaskFactoryType) -> FactoryConstraints {
    match factory {
        TaskFactoryType::Racing | TaskFactoryType::FaiGeneral => FactoryConstraints {
            max_points: MAX_TASK_POINTS,
            task_scored: true,
        },
        TaskFactoryType::Aat | TaskFactoryType::Mat => FactoryConstraints {
            max_points: MAX_TASK_POINTS,
            task_scored: true,
        },
    }
}

bitflags! {
    /// Structural validation failures of a task.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TaskValidationErrors: u16 {
        const EMPTY_TASK = 1 << 0;
        const NO_VALID_START = 1 << 1;
        const NO_VALID_FINISH = 1 << 2;
        const MISPLACED_START = 1 << 3;
        const MISPLACED_FINISH = 1 << 4;
        const NON_AREA_INTERMEDIATE = 1 << 5;
        const NON_RACING_INTERMEDIATE = 1 << 6;
        const TOO_MANY_POINTS = 1 << 7;
    }
}

/// Check the point sequence against the rules of the task type.
pub fn validate(points: &[TaskPoint], factory: TaskFactoryType) -> TaskValidationErrors {
    let mut errors = TaskValidationErrors::empty();

    if points.is_empty() {
        return TaskValidationErrors::EMPTY_TASK
            | TaskValidationErrors::NO_VALID_START
            | TaskValidationErrors::NO_VALID_FINISH;
    }

    if points[0].kind() != TaskPointKind::Start {
        errors |= TaskValidationErrors::NO_VALID_START;
    }

    if points.len() < 2 || points[points.len() - 1].kind() != TaskPointKind::Finish {
        errors |= TaskValidationErrors::NO_VALID_FINISH;
    }

    if points.len() > constraints(factory).max_points {
        errors |= TaskValidationErrors::TOO_MANY_POINTS;
    }

    for (i, point) in points.iter().enumerate() {
        match point.kind() {
            TaskPointKind::Start => {
                if i > 0 {
                    errors |= TaskValidationErrors::MISPLACED_START;
                }
            }
            TaskPointKind::Finish => {
                if i + 1 < points.len() {
                    errors |= TaskValidationErrors::MISPLACED_FINISH;
                }
            }
            TaskPointKind::Intermediate(kind) => match factory {
                TaskFactoryType::Aat => {
                    if kind != IntermediateKind::Aat {
                        errors |= TaskValidationErrors::NON_AREA_INTERMEDIATE;
                    }
                }
                TaskFactoryType::Racing | TaskFactoryType::FaiGeneral => {
                    if kind != IntermediateKind::Racing {
                        errors |= TaskValidationErrors::NON_RACING_INTERMEDIATE;
                    }
                }
                // a MAT mixes fixed and area turnpoints freely
                TaskFactoryType::Mat => {}
            },
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::task::Waypoint;
    use crate::zone::ZoneShape;

    fn point(kind: TaskPointKind, lat: f64) -> TaskPoint {
        TaskPoint::new(
            Waypoint::new("tp", GeoPoint::from_degrees(lat, 7.0), 400.0),
            kind,
            ZoneShape::Cylinder { radius: 1000.0 },
        )
    }

    fn racing_task() -> [TaskPoint; 3] {
        [
            point(TaskPointKind::Start, 45.0),
            point(TaskPointKind::Intermediate(IntermediateKind::Racing), 45.5),
            point(TaskPointKind::Finish, 46.0),
        ]
    }

    #[test]
    fn test_valid_racing_task() {
        let task = racing_task();
        assert!(validate(&task, TaskFactoryType::Racing).is_empty());
    }

    #[test]
    fn test_empty_task() {
        let errors = validate(&[], TaskFactoryType::Racing);
        assert!(errors.contains(TaskValidationErrors::EMPTY_TASK));
        assert!(errors.contains(TaskValidationErrors::NO_VALID_START));
    }

    #[test]
    fn test_missing_start() {
        let task = [
            point(TaskPointKind::Intermediate(IntermediateKind::Racing), 45.0),
            point(TaskPointKind::Finish, 46.0),
        ];
        let errors = validate(&task, TaskFactoryType::Racing);
        assert!(errors.contains(TaskValidationErrors::NO_VALID_START));
        assert!(!errors.contains(TaskValidationErrors::NO_VALID_FINISH));
    }

    #[test]
    fn test_single_point_has_no_finish() {
        let task = [point(TaskPointKind::Start, 45.0)];
        let errors = validate(&task, TaskFactoryType::Racing);
        assert!(errors.contains(TaskValidationErrors::NO_VALID_FINISH));
        assert!(!errors.contains(TaskValidationErrors::EMPTY_TASK));
    }

    #[test]
    fn test_wrong_intermediate_for_aat() {
        let task = racing_task();
        let errors = validate(&task, TaskFactoryType::Aat);
        assert!(errors.contains(TaskValidationErrors::NON_AREA_INTERMEDIATE));
    }

    #[test]
    fn test_mat_accepts_mixed_intermediates() {
        let task = [
            point(TaskPointKind::Start, 45.0),
            point(TaskPointKind::Intermediate(IntermediateKind::Racing), 45.3),
            point(TaskPointKind::Intermediate(IntermediateKind::Aat), 45.6),
            point(TaskPointKind::Finish, 46.0),
        ];
        assert!(validate(&task, TaskFactoryType::Mat).is_empty());
    }

    #[test]
    fn test_misplaced_finish() {
        let task = [
            point(TaskPointKind::Start, 45.0),
            point(TaskPointKind::Finish, 45.5),
            point(TaskPointKind::Finish, 46.0),
        ];
        let errors = validate(&task, TaskFactoryType::Racing);
        assert!(errors.contains(TaskValidationErrors::MISPLACED_FINISH));
    }
}

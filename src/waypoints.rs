//! Waypoint store interface
//!
//! The waypoint database is owned by a collaborator. The engine only needs
//! the deduplication hook used when a planned task is committed onto the
//! live one.

use crate::task::Waypoint;

/// Deduplicating waypoint store.
pub trait Waypoints {
    /// Return the canonical waypoint equal to `waypoint`, appending it to
    /// the store first if no equal entry exists.
    fn check_exists_or_append(&mut self, waypoint: &Waypoint) -> Waypoint;
}

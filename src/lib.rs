//! xcpilot-core - Ordered task engine for the xcpilot glider flight computer
//!
//! This crate contains the platform-agnostic task logic of the flight
//! computer: the ordered sequence of observation zones, the per-fix
//! transition state machine, start gate rules, and the path solvers that
//! produce the scored distances. It is tested on host and consumed by the
//! device firmware and the desktop frontend alike.
//!
//! # Design Principles
//!
//! - **Pure no_std**: bounded `heapless` collections, `libm` float math,
//!   no allocator
//! - **Single writer**: every operation runs to completion on the calling
//!   thread; collaborators read published [`task::TaskStats`] snapshots
//! - **Trait abstractions**: the glide polar, the waypoint store and the
//!   event sink are injected via traits
//!
//! # Modules
//!
//! - [`geo`]: spherical geometry, flat integer projection, search points
//! - [`zone`]: observation zone shapes, membership and boundary sampling
//! - [`time`]: coarse start-gate clock types
//! - [`task`]: task points, the ordered task facade, advance policy,
//!   validation, statistics
//! - [`solver`]: layered shortest/longest path solver
//! - [`glide`]: consumed glide polar interface
//! - [`waypoints`]: consumed waypoint store interface

#![no_std]

pub mod geo;
pub mod glide;
pub mod logging;
pub mod solver;
pub mod task;
pub mod time;
pub mod waypoints;
pub mod zone;

//! Core procedural tree growth and skeletal mesh library.
//!
//! Main components:
//! - [`config`] - growth presets: general settings and the stage schedule.
//! - [`tree`] - the skeleton node graph and pipe-model radii.
//! - [`leaf`] - leaves and their two-phase removal.
//! - [`sampling`] - seeded direction sampling used by growth.
//! - [`phases`] - the per-tick simulation phases.
//! - [`engine`] - [`engine::GrowthEngine`], which owns one tree and runs
//!   the phases.
//! - [`mesh`] - tube, bark, line and leaf mesh synthesis.
//! - [`scheduler`] - fixed-step tick dispatch over many engines.
//! - [`types`] - shared ids and handles.

pub mod config;
pub mod engine;
pub mod leaf;
pub mod mesh;
pub mod phases;
pub mod sampling;
pub mod scheduler;
pub mod tree;
pub mod types;

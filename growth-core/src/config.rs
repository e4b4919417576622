//! Growth presets: global settings plus an ordered schedule of stages.
//!
//! A [`GrowthPreset`] is plain data. It can be authored in code, loaded
//! from a RON file, and shared read-only between any number of
//! [`crate::engine::GrowthEngine`] instances through an `Arc`.

use std::{fs, path::Path};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or writing a preset file.
///
/// The simulation itself never fails on configuration: an empty stage
/// list is replaced by [`GrowthPreset::default_schedule`] at
/// initialization time. Only the file boundary reports errors.
#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid preset: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("failed to serialize preset: {0}")]
    Serialize(#[from] ron::Error),
}

/// Global constants shared by every stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Seed for the per-instance generator. `0` picks a random seed.
    pub seed: u64,
    /// Step length used when a stage does not set its own.
    pub base_step_length: f32,
    pub base_radius: f32,
    pub min_radius: f32,
    /// Multiplier applied to every child radius at creation.
    pub radius_falloff: f32,
    /// Exponent `p` of the pipe model `r^p = Σ r_child^p`.
    pub pipe_exponent: f32,
    pub max_nodes: usize,
    /// Vertices per ring in the tube mesh.
    pub radial_segments: usize,
    /// Light attenuation per unit of depth below the crown top.
    pub light_falloff: f32,
    /// Seconds a leaf stays in the dropping state before removal.
    pub leaf_drop_duration: f32,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            base_step_length: 0.2,
            base_radius: 0.08,
            min_radius: 0.01,
            radius_falloff: 0.85,
            pipe_exponent: 2.0,
            max_nodes: 2000,
            radial_segments: 6,
            light_falloff: 0.15,
            leaf_drop_duration: 2.0,
        }
    }
}

/// One row of the growth schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub name: String,
    /// Seconds of (speed-scaled) time spent in this stage.
    pub duration: f32,
    /// Distance between a bud and its new child. Non-positive falls back
    /// to [`GeneralSettings::base_step_length`].
    pub step_length: f32,
    pub branch_probability: f32,
    /// Minimum and maximum branch tilt in degrees.
    pub branch_angle_range: Vec2,
    pub main_axis_radius_scale: f32,
    pub branch_radius_scale: f32,
    pub branch_length_scale: f32,
    /// Replaces [`GeneralSettings::radius_falloff`] when positive.
    pub radius_falloff_override: f32,
    pub branch_gravity: f32,
    pub lateral_bias: f32,
    /// Vertical window below the crown top where leaves may live.
    /// Non-positive disables the window.
    pub crown_depth: f32,
    pub inner_leaf_density: f32,
    pub apical_dominance: f32,
    pub pruning_light_threshold: f32,
    pub leaf_density: f32,
    pub leaf_size: f32,
    pub leaf_count_per_node: i32,
    pub leaf_cycle: bool,
    pub leaf_cycle_period: f32,
    pub leaf_visible_fraction: f32,
    pub allow_cotyledons: bool,
    pub remove_cotyledons_on_enter: bool,
    pub prune_inner_leaves_on_enter: bool,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            name: "Seedling".to_string(),
            duration: 10.0,
            step_length: 0.2,
            branch_probability: 0.1,
            branch_angle_range: Vec2::new(15.0, 45.0),
            main_axis_radius_scale: 0.98,
            branch_radius_scale: 0.8,
            branch_length_scale: 0.9,
            radius_falloff_override: 0.0,
            branch_gravity: 0.0,
            lateral_bias: 0.0,
            crown_depth: 1.5,
            inner_leaf_density: 0.5,
            apical_dominance: 0.8,
            pruning_light_threshold: 0.2,
            leaf_density: 1.0,
            leaf_size: 0.2,
            leaf_count_per_node: 3,
            leaf_cycle: true,
            leaf_cycle_period: 3.0,
            leaf_visible_fraction: 0.6,
            allow_cotyledons: false,
            remove_cotyledons_on_enter: false,
            prune_inner_leaves_on_enter: false,
        }
    }
}

/// General settings plus the ordered stage schedule.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthPreset {
    pub general: GeneralSettings,
    pub stages: Vec<StageSettings>,
}

impl GrowthPreset {
    /// Creates a preset from explicit parts.
    pub fn new(general: GeneralSettings, stages: Vec<StageSettings>) -> Self {
        Self { general, stages }
    }

    /// Parses a preset from RON text.
    ///
    /// Missing fields take their [`Default`] values, so a file only needs
    /// to mention what it overrides.
    pub fn from_ron_str(text: &str) -> Result<Self, PresetError> {
        Ok(ron::from_str(text)?)
    }

    /// Reads and parses a RON preset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PresetError> {
        let text = fs::read_to_string(path.as_ref())?;
        let preset = Self::from_ron_str(&text)?;
        log::debug!(
            "loaded preset {} with {} stage(s)",
            path.as_ref().display(),
            preset.stages.len()
        );
        Ok(preset)
    }

    /// Serializes the preset as pretty-printed RON.
    pub fn to_ron_string(&self) -> Result<String, PresetError> {
        let pretty = ron::ser::PrettyConfig::default().indentor("  ".to_string());
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Default general settings with the built-in four-stage schedule.
    pub fn default_schedule() -> Self {
        Self {
            general: GeneralSettings::default(),
            stages: default_stages(),
        }
    }

    /// The stage list an engine should run.
    ///
    /// Returns the authored stages, or [`default_stages`] when the list
    /// is empty.
    pub fn resolved_stages(&self) -> Vec<StageSettings> {
        if self.stages.is_empty() {
            log::warn!("preset has no growth stages, using the default schedule");
            default_stages()
        } else {
            self.stages.clone()
        }
    }
}

/// Seedling → Sapling → Juvenile → Mature.
///
/// The last stage is the steady state and carries a long duration.
pub fn default_stages() -> Vec<StageSettings> {
    vec![
        StageSettings {
            name: "Seedling".to_string(),
            duration: 10.0,
            step_length: 0.2,
            branch_probability: 0.05,
            apical_dominance: 0.9,
            main_axis_radius_scale: 0.995,
            branch_radius_scale: 0.7,
            branch_length_scale: 0.6,
            lateral_bias: 0.1,
            crown_depth: 0.6,
            inner_leaf_density: 0.4,
            allow_cotyledons: true,
            leaf_count_per_node: 2,
            leaf_cycle: true,
            leaf_cycle_period: 2.2,
            leaf_visible_fraction: 0.55,
            remove_cotyledons_on_enter: false,
            ..StageSettings::default()
        },
        StageSettings {
            name: "Sapling".to_string(),
            duration: 20.0,
            step_length: 0.25,
            branch_probability: 0.2,
            apical_dominance: 0.7,
            main_axis_radius_scale: 0.99,
            branch_radius_scale: 0.8,
            branch_length_scale: 0.85,
            lateral_bias: 0.2,
            crown_depth: 1.2,
            inner_leaf_density: 0.5,
            remove_cotyledons_on_enter: true,
            leaf_count_per_node: 3,
            leaf_cycle: true,
            leaf_cycle_period: 2.6,
            leaf_visible_fraction: 0.6,
            prune_inner_leaves_on_enter: false,
            ..StageSettings::default()
        },
        StageSettings {
            name: "Juvenile".to_string(),
            duration: 40.0,
            step_length: 0.3,
            branch_probability: 0.35,
            apical_dominance: 0.5,
            main_axis_radius_scale: 0.985,
            branch_radius_scale: 0.8,
            branch_length_scale: 1.0,
            lateral_bias: 0.25,
            crown_depth: 2.2,
            inner_leaf_density: 0.6,
            leaf_count_per_node: 4,
            leaf_cycle: true,
            leaf_cycle_period: 3.0,
            leaf_visible_fraction: 0.6,
            prune_inner_leaves_on_enter: true,
            ..StageSettings::default()
        },
        StageSettings {
            name: "Mature".to_string(),
            duration: 999.0,
            step_length: 0.2,
            branch_probability: 0.15,
            apical_dominance: 0.4,
            main_axis_radius_scale: 0.98,
            branch_radius_scale: 0.75,
            branch_length_scale: 0.7,
            lateral_bias: 0.25,
            crown_depth: 2.5,
            inner_leaf_density: 0.5,
            leaf_count_per_node: 4,
            leaf_cycle: true,
            leaf_cycle_period: 3.2,
            leaf_visible_fraction: 0.6,
            prune_inner_leaves_on_enter: true,
            ..StageSettings::default()
        },
    ]
}

//! Simulation phases run by [`crate::engine::GrowthEngine`] on every tick.
//!
//! The per-tick pipeline is:
//! 1. [`stage_phase`] - advance the stage clock and apply stage-enter
//!    effects to the leaf population.
//! 2. [`growth_phase`] - extend every bud by a main-axis child and, with
//!    some probability, a lateral branch.
//! 3. [`radius_phase`] - propagate radii bottom-up with the pipe model.
//! 4. [`leaf_phase`] - score leaves by light, expire dropping leaves and
//!    top up nodes inside the crown window.

use rand::Rng;

use crate::{
    config::{GeneralSettings, StageSettings},
    leaf::{Leaf, LeafSet},
    sampling::{random_branch_direction, random_unit_vector, slerp_dir, unit_f32},
    tree::Tree,
    types::NodeId,
};
use glam::Vec3;

/// Position of a tree within its stage schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageClock {
    /// Index into the stage list. Never decreases.
    pub index: usize,
    /// Time spent in the current stage.
    pub stage_time: f32,
    /// Total time since initialization.
    pub age: f32,
}

/// Advances the stage clock by `dt` and enters every stage whose
/// predecessor's duration has fully elapsed.
///
/// The last stage never advances. For each stage entered,
/// [`enter_stage`] runs its one-shot effects against `leaves`.
///
/// ### Returns
/// The number of stage transitions that happened during this call.
pub fn stage_phase(
    clock: &mut StageClock,
    stages: &[StageSettings],
    dt: f32,
    tree: &Tree,
    leaves: &mut LeafSet,
) -> usize {
    if stages.is_empty() {
        return 0;
    }
    clock.index = clock.index.min(stages.len() - 1);
    clock.age += dt;
    clock.stage_time += dt;

    let mut transitions = 0;
    while clock.index + 1 < stages.len() && clock.stage_time >= stages[clock.index].duration {
        clock.stage_time -= stages[clock.index].duration;
        clock.index += 1;
        transitions += 1;

        let stage = &stages[clock.index];
        log::info!(
            "entering growth stage {} ({}) at age {:.2}",
            clock.index,
            stage.name,
            clock.age
        );
        enter_stage(stage, tree, leaves);
    }
    transitions
}

/// One-shot effects of entering `stage`.
///
/// - `remove_cotyledons_on_enter` flags every cotyledon as dropping.
/// - `prune_inner_leaves_on_enter` flags every leaf whose node is no
///   longer terminal (or no longer exists) as dropping.
pub fn enter_stage(stage: &StageSettings, tree: &Tree, leaves: &mut LeafSet) {
    if stage.remove_cotyledons_on_enter {
        leaves.drop_where(|l| l.is_cotyledon);
    }
    if stage.prune_inner_leaves_on_enter {
        leaves.drop_where(|l| !tree.is_terminal(l.node));
    }
}

/// Step length of `stage`, falling back to the general base length.
pub fn effective_step(stage: &StageSettings, general: &GeneralSettings) -> f32 {
    let step = if stage.step_length > 0.0 {
        stage.step_length
    } else {
        general.base_step_length
    };
    step.max(0.01)
}

/// Radius falloff of `stage`, falling back to the general falloff.
pub fn effective_falloff(stage: &StageSettings, general: &GeneralSettings) -> f32 {
    if stage.radius_falloff_override > 0.0 {
        stage.radius_falloff_override
    } else {
        general.radius_falloff
    }
}

/// Child radius for a new node, clamped to the configured minimum.
fn child_radius(parent_radius: f32, scale: f32, falloff: f32, general: &GeneralSettings) -> f32 {
    (parent_radius * scale.max(0.01) * falloff.max(1e-4)).max(general.min_radius)
}

/// Extends every bud and returns the next bud set.
///
/// For each bud that still names a node:
///
/// 1. Slerp the bud's direction toward world-up by
///    `clamp01(1 - apical_dominance) * 0.15`.
/// 2. Add a main-axis child at the stage step length.
/// 3. Draw one float; if it is below `branch_probability`, add a lateral
///    child tilted within `branch_angle_range`, optionally biased toward
///    a horizontal random direction (`lateral_bias`) and pulled down
///    (`branch_gravity`).
///
/// Children that would exceed `general.max_nodes` are not created.
///
/// ### Returns
/// The ids of all children created, in creation order.
pub fn growth_phase(
    tree: &mut Tree,
    buds: &[NodeId],
    stage: &StageSettings,
    general: &GeneralSettings,
    rng: &mut impl Rng,
) -> Vec<NodeId> {
    let mut new_buds = Vec::with_capacity(buds.len() * 2);
    let step = effective_step(stage, general);
    let falloff = effective_falloff(stage, general);
    let up_bias = (1.0 - stage.apical_dominance).clamp(0.0, 1.0) * 0.15;

    for &bud in buds {
        let Some(node) = tree.get(bud) else {
            continue;
        };
        let parent_radius = node.radius;

        let mut base_dir = node.dir;
        if up_bias > 0.0 {
            base_dir = slerp_dir(base_dir, Vec3::Y, up_bias);
        }

        let main_radius = child_radius(parent_radius, stage.main_axis_radius_scale, falloff, general);
        if let Some(id) = tree.add_child(bud, base_dir, step, main_radius, general.max_nodes) {
            new_buds.push(id);
        }

        if unit_f32(rng) < stage.branch_probability {
            let mut branch_dir = random_branch_direction(base_dir, stage.branch_angle_range, rng);

            if stage.lateral_bias > 0.0 {
                let lateral = random_unit_vector(rng).reject_from_normalized(Vec3::Y);
                if lateral.length_squared() > 1e-4 {
                    branch_dir = slerp_dir(branch_dir, lateral, stage.lateral_bias.clamp(0.0, 1.0));
                }
            }
            if stage.branch_gravity > 0.0 {
                branch_dir = (branch_dir + Vec3::NEG_Y * stage.branch_gravity).normalize_or(Vec3::Y);
            }

            let branch_step = step * stage.branch_length_scale.max(0.1);
            let branch_radius = child_radius(parent_radius, stage.branch_radius_scale, falloff, general);
            if let Some(id) =
                tree.add_child(bud, branch_dir, branch_step, branch_radius, general.max_nodes)
            {
                new_buds.push(id);
            }
        }
    }

    new_buds
}

/// Pipe-model radius propagation over the whole tree.
pub fn radius_phase(tree: &mut Tree, general: &GeneralSettings) {
    tree.recompute_radii(general.pipe_exponent);
}

/// Counters reported by [`leaf_phase`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeafPhaseReport {
    pub flagged: usize,
    pub removed: usize,
    pub added: usize,
}

/// Light received by a node at height `y` below a crown top at `max_height`.
#[inline]
pub fn light_score(max_height: f32, y: f32, light_falloff: f32) -> f32 {
    (-light_falloff * (max_height - y).max(0.0)).exp()
}

/// Updates the leaf population for one tick.
///
/// 1. Non-cotyledon leaves on non-terminal (or missing) nodes start
///    dropping.
/// 2. Attached leaves get a fresh light score and start dropping when it
///    falls below `pruning_light_threshold` or when their node is deeper
///    than `crown_depth` below the crown top.
/// 3. Dropping leaves advance their timers by `dt`; those reaching
///    `leaf_drop_duration` are removed.
/// 4. Each node inside the crown window is topped up to its target leaf
///    count. Leaves are never removed to shrink toward the target.
pub fn leaf_phase(
    tree: &Tree,
    leaves: &mut LeafSet,
    stage: &StageSettings,
    general: &GeneralSettings,
    dt: f32,
) -> LeafPhaseReport {
    let mut report = LeafPhaseReport::default();
    let max_y = tree.max_height();

    for leaf in leaves.leaves.iter_mut() {
        if leaf.is_dropping() {
            continue;
        }
        let Some(node) = tree.get(leaf.node) else {
            // Orphaned leaf: skip scoring and retire it through the normal
            // drop timer instead of keeping it forever.
            leaf.begin_drop();
            report.flagged += 1;
            continue;
        };
        if !node.is_terminal && !leaf.is_cotyledon {
            leaf.begin_drop();
            report.flagged += 1;
            continue;
        }

        leaf.light = light_score(max_y, node.pos.y, general.light_falloff);
        let too_dark = leaf.light < stage.pruning_light_threshold;
        let too_deep = stage.crown_depth > 0.0 && max_y - node.pos.y > stage.crown_depth;
        if too_dark || too_deep {
            leaf.begin_drop();
            report.flagged += 1;
        }
    }

    report.removed = leaves.advance_drops(dt, general.leaf_drop_duration);

    let per_node = stage.leaf_count_per_node.max(0) as f32;
    for node in &tree.nodes {
        let in_crown = stage.crown_depth <= 0.0 || max_y - node.pos.y <= stage.crown_depth;
        if !in_crown {
            continue;
        }

        let mut density = stage.leaf_density;
        if !node.is_terminal {
            density *= stage.inner_leaf_density.clamp(0.0, 1.0);
            if density <= 0.0 {
                continue;
            }
        }

        let target = (per_node * density.clamp(0.0, 1.0)).round() as usize;
        if target == 0 {
            continue;
        }
        let existing = leaves.attached_count(node.id);
        for k in existing..target {
            let offset = stage.leaf_cycle_period * (k as f32 / target.max(1) as f32);
            leaves.push(Leaf::new(node.id, stage.leaf_size, offset));
            report.added += 1;
        }
    }

    report
}

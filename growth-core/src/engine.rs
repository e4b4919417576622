//! The per-tree growth simulation.
//!
//! A [`GrowthEngine`] owns one skeleton, its bud frontier, its leaf
//! population and a seeded generator. Each call to
//! [`GrowthEngine::on_growth_tick`] runs the phases in
//! [`crate::phases`] and rebuilds the [`TreeRender`] output.

use std::sync::Arc;

use glam::Vec3;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::{GrowthPreset, StageSettings},
    leaf::LeafSet,
    mesh::{self, LeafInstance, Mesh, Segment},
    phases::{self, StageClock},
    scheduler::GrowthTick,
    tree::Tree,
    types::{MaterialHandle, NodeId},
};

/// Which outputs [`GrowthEngine`] rebuilds after each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RenderMode {
    #[default]
    MeshAndLines,
    LinesOnly,
    MeshOnly,
}

impl RenderMode {
    pub fn mesh_enabled(self) -> bool {
        matches!(self, RenderMode::MeshAndLines | RenderMode::MeshOnly)
    }

    pub fn lines_enabled(self) -> bool {
        matches!(self, RenderMode::MeshAndLines | RenderMode::LinesOnly)
    }
}

/// How the bark submesh is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BarkStyle {
    /// One continuous tube sharing a ring per node.
    #[default]
    Tube,
    /// One independent cylinder per parent-child segment.
    Segments,
}

/// Host-side knobs that are not part of a growth preset.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    /// Multiplier on every tick's `dt`. Negative values count as zero.
    pub growth_speed: f32,
    /// Initialize on the first tick if [`GrowthEngine::initialize`] has
    /// not been called yet.
    pub auto_initialize: bool,
    pub render_mode: RenderMode,
    pub bark_style: BarkStyle,
    pub bark_material: Option<MaterialHandle>,
    pub leaf_material: Option<MaterialHandle>,
    pub line_material: Option<MaterialHandle>,
    /// Geometry of a single leaf, instanced once per visible leaf.
    pub leaf_template: Option<Arc<Mesh>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            growth_speed: 1.0,
            auto_initialize: true,
            render_mode: RenderMode::default(),
            bark_style: BarkStyle::default(),
            bark_material: None,
            leaf_material: None,
            line_material: None,
            leaf_template: None,
        }
    }
}

/// A mesh paired with the material it should be drawn with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubMesh {
    pub mesh: Mesh,
    pub material: Option<MaterialHandle>,
}

/// Everything an external renderer needs to draw one tree.
///
/// `submeshes[0]` is the bark tube. `submeshes[1]`, when present, holds
/// the batched leaves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeRender {
    pub submeshes: Vec<SubMesh>,
    pub lines: Option<SubMesh>,
}

impl TreeRender {
    pub fn bark(&self) -> Option<&SubMesh> {
        self.submeshes.first()
    }

    pub fn leaves(&self) -> Option<&SubMesh> {
        self.submeshes.get(1)
    }

    /// All triangle submeshes folded into one mesh, for hosts that draw a
    /// single buffer.
    pub fn merged(&self) -> Mesh {
        let mut out = Mesh::new();
        for sub in &self.submeshes {
            out.merge(&sub.mesh);
        }
        out
    }

    /// Axis-aligned bounds over every submesh and the line mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.submeshes
            .iter()
            .chain(self.lines.iter())
            .filter_map(|sub| sub.mesh.bounds())
            .reduce(|(lo, hi), (l, h)| (lo.min(l), hi.max(h)))
    }
}

/// Incremental growth simulation for one tree.
pub struct GrowthEngine {
    preset: Arc<GrowthPreset>,
    stages: Vec<StageSettings>,
    options: EngineOptions,

    tree: Tree,
    buds: Vec<NodeId>,
    leaves: LeafSet,

    rng: StdRng,
    seed: u64,
    clock: StageClock,
    initialized: bool,
    cap_reported: bool,

    render: TreeRender,
}

impl GrowthEngine {
    pub fn new(preset: Arc<GrowthPreset>) -> Self {
        Self::with_options(preset, EngineOptions::default())
    }

    pub fn with_options(preset: Arc<GrowthPreset>, options: EngineOptions) -> Self {
        Self {
            preset,
            stages: Vec::new(),
            options,
            tree: Tree::default(),
            buds: Vec::new(),
            leaves: LeafSet::default(),
            rng: StdRng::seed_from_u64(0),
            seed: 0,
            clock: StageClock::default(),
            initialized: false,
            cap_reported: false,
            render: TreeRender::default(),
        }
    }

    /// Resets the tree using the preset's own seed.
    pub fn initialize(&mut self) {
        let seed = self.preset.general.seed;
        self.reset(seed);
    }

    /// Swaps in `preset` and resets the tree with `seed`.
    ///
    /// A seed of `0` picks a random seed; [`GrowthEngine::seed`] reports
    /// the one actually used.
    pub fn initialize_with(&mut self, preset: Arc<GrowthPreset>, seed: u64) {
        self.preset = preset;
        self.reset(seed);
    }

    fn reset(&mut self, seed: u64) {
        self.stages = self.preset.resolved_stages();
        self.seed = if seed == 0 {
            rand::rng().random_range(1..u64::MAX)
        } else {
            seed
        };
        self.rng = StdRng::seed_from_u64(self.seed);

        let general = &self.preset.general;
        self.tree = Tree::new(Vec3::ZERO, general.base_radius);
        self.buds.clear();
        self.buds.push(0);
        self.leaves.clear();
        self.clock = StageClock::default();
        self.cap_reported = false;

        let first = &self.stages[0];
        if first.allow_cotyledons {
            self.leaves.add_cotyledons(0, first.leaf_size);
        }

        self.initialized = true;
        log::info!(
            "growth engine initialized: seed {}, {} stage(s), node cap {}",
            self.seed,
            self.stages.len(),
            general.max_nodes
        );
        self.rebuild_render();
    }

    /// Releases the tree, leaves and render output.
    ///
    /// The engine can be initialized again afterwards.
    pub fn dispose(&mut self) {
        self.tree = Tree::default();
        self.buds.clear();
        self.leaves.clear();
        self.render = TreeRender::default();
        self.clock = StageClock::default();
        self.initialized = false;
        log::debug!("growth engine disposed");
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Does nothing for `dt <= 0`, or before initialization unless
    /// [`EngineOptions::auto_initialize`] is set.
    pub fn on_growth_tick(&mut self, dt: f32) {
        if !self.initialized {
            if !self.options.auto_initialize {
                return;
            }
            self.initialize();
        }
        if dt <= 0.0 {
            return;
        }
        let dt = dt * self.options.growth_speed.max(0.0);

        phases::stage_phase(
            &mut self.clock,
            &self.stages,
            dt,
            &self.tree,
            &mut self.leaves,
        );

        let general = &self.preset.general;
        let stage = &self.stages[self.clock.index];

        if self.tree.len() < general.max_nodes {
            self.buds = phases::growth_phase(&mut self.tree, &self.buds, stage, general, &mut self.rng);
        } else if !self.cap_reported {
            self.cap_reported = true;
            log::debug!("node cap {} reached, growth stopped", general.max_nodes);
        }
        phases::radius_phase(&mut self.tree, general);

        let report = phases::leaf_phase(&self.tree, &mut self.leaves, stage, general, dt);
        log::trace!(
            "tick dt={dt:.3}: {} nodes, {} buds, {} leaves ({report:?})",
            self.tree.len(),
            self.buds.len(),
            self.leaves.len()
        );

        self.rebuild_render();
    }

    /// Transforms for every leaf that should be drawn right now.
    ///
    /// Skips dropping leaves, leaves on missing nodes, and leaves in the
    /// hidden part of the current stage's visibility cycle.
    pub fn visible_leaf_instances(&self) -> Vec<LeafInstance> {
        let Some(stage) = self.current_stage() else {
            return Vec::new();
        };
        let cycle = stage.leaf_cycle && stage.leaf_cycle_period > 0.0;

        self.leaves
            .iter()
            .filter(|l| !l.is_dropping())
            .filter(|l| {
                !cycle
                    || l.is_visible_at(
                        self.clock.age,
                        stage.leaf_cycle_period,
                        stage.leaf_visible_fraction,
                    )
            })
            .filter_map(|l| {
                let node = self.tree.get(l.node)?;
                Some(LeafInstance {
                    translation: node.pos + node.dir * 0.05,
                    rotation: mesh::look_rotation(node.dir, Vec3::Y),
                    scale: l.size,
                })
            })
            .collect()
    }

    /// One segment per parent→child edge.
    pub fn segments(&self) -> Vec<Segment> {
        let nodes = &self.tree.nodes;
        nodes
            .iter()
            .filter_map(|n| {
                let p = nodes.get(n.parent?)?;
                Some(Segment {
                    start: p.pos,
                    end: n.pos,
                    start_radius: p.radius.max(1e-3),
                    end_radius: n.radius.max(1e-3),
                })
            })
            .collect()
    }

    fn rebuild_render(&mut self) {
        let mode = self.options.render_mode;
        let mut render = TreeRender::default();

        if mode.mesh_enabled() {
            let radial_segments = self.preset.general.radial_segments;
            let bark = match self.options.bark_style {
                BarkStyle::Tube => {
                    let nodes = &self.tree.nodes;
                    let positions: Vec<Vec3> = nodes.iter().map(|n| n.pos).collect();
                    let radii: Vec<f32> = nodes.iter().map(|n| n.radius.max(1e-3)).collect();
                    mesh::build_tube_mesh(
                        &positions,
                        &radii,
                        &self.tree.parent_indices(),
                        radial_segments,
                    )
                }
                BarkStyle::Segments => mesh::build_bark_mesh(&self.segments(), radial_segments),
            };
            render.submeshes.push(SubMesh {
                mesh: bark,
                material: self.options.bark_material,
            });

            if let (Some(template), Some(material)) =
                (&self.options.leaf_template, self.options.leaf_material)
            {
                let leaves = mesh::build_leaf_mesh(template, &self.visible_leaf_instances());
                if !leaves.is_empty() {
                    render.submeshes.push(SubMesh {
                        mesh: leaves,
                        material: Some(material),
                    });
                }
            }
        }

        if mode.lines_enabled() {
            render.lines = Some(SubMesh {
                mesh: mesh::build_line_mesh(&self.segments()),
                material: self.options.line_material,
            });
        }

        self.render = render;
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn buds(&self) -> &[NodeId] {
        &self.buds
    }

    pub fn leaves(&self) -> &LeafSet {
        &self.leaves
    }

    pub fn render(&self) -> &TreeRender {
        &self.render
    }

    pub fn preset(&self) -> &Arc<GrowthPreset> {
        &self.preset
    }

    pub fn stages(&self) -> &[StageSettings] {
        &self.stages
    }

    pub fn stage_index(&self) -> usize {
        self.clock.index
    }

    pub fn current_stage(&self) -> Option<&StageSettings> {
        self.stages.get(self.clock.index)
    }

    pub fn stage_time(&self) -> f32 {
        self.clock.stage_time
    }

    pub fn age(&self) -> f32 {
        self.clock.age
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn set_growth_speed(&mut self, speed: f32) {
        self.options.growth_speed = speed;
    }

    /// Changes which outputs are built and rebuilds them immediately.
    pub fn set_render_mode(&mut self, mode: RenderMode) {
        self.options.render_mode = mode;
        if self.initialized {
            self.rebuild_render();
        }
    }

    pub fn set_bark_style(&mut self, style: BarkStyle) {
        self.options.bark_style = style;
        if self.initialized {
            self.rebuild_render();
        }
    }
}

impl GrowthTick for GrowthEngine {
    fn on_growth_tick(&mut self, dt: f32) {
        GrowthEngine::on_growth_tick(self, dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GeneralSettings, default_stages};
    use approx::assert_relative_eq;

    fn preset_with(general: GeneralSettings, stages: Vec<StageSettings>) -> Arc<GrowthPreset> {
        Arc::new(GrowthPreset::new(general, stages))
    }

    fn seeded(seed: u64) -> GrowthEngine {
        let general = GeneralSettings {
            seed,
            ..GeneralSettings::default()
        };
        let mut engine = GrowthEngine::new(preset_with(general, default_stages()));
        engine.initialize();
        engine
    }

    #[test]
    fn initialize_creates_root_bud_and_cotyledons() {
        let engine = seeded(42);
        let tree = engine.tree();

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nodes[0].pos, Vec3::ZERO);
        assert_eq!(tree.nodes[0].dir, Vec3::Y);
        assert_relative_eq!(tree.nodes[0].radius, 0.08);
        assert!(tree.nodes[0].is_terminal);
        assert_eq!(engine.buds(), &[0]);
        assert_eq!(engine.leaves().len(), 2);
        assert!(engine.leaves().iter().all(|l| l.is_cotyledon));
        assert_eq!(engine.stage_index(), 0);
        assert_eq!(engine.seed(), 42);
    }

    #[test]
    fn zero_seed_picks_a_random_nonzero_seed() {
        let engine = seeded(0);
        assert_ne!(engine.seed(), 0);
    }

    #[test]
    fn root_only_tree_renders_one_ring() {
        let engine = seeded(42);
        let bark = engine.render().bark().unwrap();
        assert_eq!(bark.mesh.vertex_count(), 6);
        assert_eq!(bark.mesh.triangle_count(), 0);
        assert_eq!(engine.render().lines.as_ref().unwrap().mesh.line_count(), 0);
    }

    #[test]
    fn non_positive_dt_is_ignored() {
        let mut engine = seeded(42);
        engine.on_growth_tick(0.0);
        engine.on_growth_tick(-1.0);
        assert_eq!(engine.tree().len(), 1);
        assert_eq!(engine.age(), 0.0);
    }

    #[test]
    fn tick_before_initialize_honors_auto_initialize() {
        let preset = Arc::new(GrowthPreset::default_schedule());
        let mut manual = GrowthEngine::with_options(
            preset.clone(),
            EngineOptions {
                auto_initialize: false,
                ..EngineOptions::default()
            },
        );
        manual.on_growth_tick(0.5);
        assert!(!manual.is_initialized());
        assert!(manual.tree().is_empty());

        let mut auto = GrowthEngine::new(preset);
        auto.on_growth_tick(0.5);
        assert!(auto.is_initialized());
        assert!(auto.tree().len() >= 2);
    }

    #[test]
    fn empty_stage_list_falls_back_to_default_schedule() {
        let mut engine = GrowthEngine::new(preset_with(GeneralSettings::default(), Vec::new()));
        engine.initialize_with(Arc::new(GrowthPreset::default()), 5);
        assert_eq!(engine.stages().len(), 4);
        assert_eq!(engine.current_stage().unwrap().name, "Seedling");
    }

    #[test]
    fn growth_speed_scales_stage_clock() {
        let mut engine = seeded(42);
        engine.set_growth_speed(2.0);
        engine.on_growth_tick(0.5);
        assert_relative_eq!(engine.age(), 1.0);

        engine.set_growth_speed(-3.0);
        engine.on_growth_tick(0.5);
        assert_relative_eq!(engine.age(), 1.0);
    }

    #[test]
    fn node_count_is_monotonic_and_capped() {
        let general = GeneralSettings {
            seed: 11,
            max_nodes: 60,
            ..GeneralSettings::default()
        };
        let stages = vec![StageSettings {
            branch_probability: 0.9,
            ..StageSettings::default()
        }];
        let mut engine = GrowthEngine::new(preset_with(general, stages));
        engine.initialize();

        let mut last = engine.tree().len();
        for _ in 0..200 {
            engine.on_growth_tick(0.5);
            let len = engine.tree().len();
            assert!(len >= last);
            assert!(len <= 60);
            last = len;
        }
        assert_eq!(last, 60);
    }

    #[test]
    fn parents_always_precede_children() {
        let mut engine = seeded(7);
        for _ in 0..120 {
            engine.on_growth_tick(0.5);
        }
        for node in &engine.tree().nodes {
            assert_eq!(engine.tree().nodes[node.id].id, node.id);
            if let Some(p) = node.parent {
                assert!(p < node.id);
                assert!(engine.tree().nodes[p].children.contains(&node.id));
            }
        }
    }

    #[test]
    fn radii_follow_pipe_model_after_each_tick() {
        let mut engine = seeded(3);
        let p = engine.preset().general.pipe_exponent;
        for _ in 0..80 {
            engine.on_growth_tick(0.5);
        }
        let nodes = &engine.tree().nodes;
        for node in nodes.iter().filter(|n| !n.children.is_empty()) {
            let sum: f32 = node.children.iter().map(|&c| nodes[c].radius.powf(p)).sum();
            assert_relative_eq!(node.radius.powf(p), sum, max_relative = 1e-4);
        }
    }

    #[test]
    fn tube_mesh_tracks_tree_size() {
        let mut engine = seeded(19);
        for _ in 0..30 {
            engine.on_growth_tick(0.5);
        }
        let n = engine.tree().len();
        let r = engine.preset().general.radial_segments;
        let bark = &engine.render().bark().unwrap().mesh;
        assert_eq!(bark.vertex_count(), n * r);
        assert_eq!(bark.triangle_count(), (n - 1) * 2 * r);
        assert_eq!(engine.render().lines.as_ref().unwrap().mesh.line_count(), n - 1);
    }

    #[test]
    fn identical_inputs_produce_identical_trees() {
        let mut a = seeded(1234);
        let mut b = seeded(1234);
        let dts = [0.5, 0.25, 1.0, 0.5, 0.75];
        for _ in 0..20 {
            for &dt in &dts {
                a.on_growth_tick(dt);
                b.on_growth_tick(dt);
            }
        }
        assert_eq!(a.tree().len(), b.tree().len());
        for (x, y) in a.tree().nodes.iter().zip(&b.tree().nodes) {
            assert_eq!(x.pos, y.pos);
            assert_eq!(x.parent, y.parent);
            assert_eq!(x.radius, y.radius);
            assert_eq!(x.children, y.children);
        }
        assert_eq!(a.leaves().leaves, b.leaves().leaves);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn default_schedule_enters_second_stage_once_at_ten_seconds() {
        let general = GeneralSettings {
            seed: 42,
            max_nodes: 2000,
            ..GeneralSettings::default()
        };
        let mut engine = GrowthEngine::new(preset_with(general, default_stages()));
        engine.initialize();

        let mut transitions = 0;
        let mut prev = engine.stage_index();
        for tick in 1..=30 {
            engine.on_growth_tick(0.5);
            let idx = engine.stage_index();
            if idx != prev {
                transitions += 1;
                assert_eq!((prev, idx), (0, 1));
                assert_eq!(tick, 20);
                assert!(
                    engine
                        .leaves()
                        .iter()
                        .filter(|l| l.is_cotyledon)
                        .all(|l| l.is_dropping())
                );
            }
            prev = idx;
        }
        assert_eq!(transitions, 1);
        assert_eq!(engine.stage_index(), 1);
    }

    fn cotyledon_schedule() -> Vec<StageSettings> {
        let quiet = StageSettings {
            branch_probability: 0.0,
            crown_depth: 0.0,
            pruning_light_threshold: 0.0,
            leaf_count_per_node: 0,
            ..StageSettings::default()
        };
        vec![
            StageSettings {
                duration: 1.0,
                allow_cotyledons: true,
                ..quiet.clone()
            },
            StageSettings {
                remove_cotyledons_on_enter: true,
                ..quiet
            },
        ]
    }

    #[test]
    fn cotyledons_drop_on_stage_entry_and_expire_after_duration() {
        let general = GeneralSettings {
            seed: 5,
            leaf_drop_duration: 2.0,
            ..GeneralSettings::default()
        };
        let mut engine = GrowthEngine::new(preset_with(general, cotyledon_schedule()));
        engine.initialize();

        engine.on_growth_tick(0.5);
        assert_eq!(engine.stage_index(), 0);
        assert!(engine.leaves().iter().all(|l| !l.is_dropping()));

        // Entering stage 1 flags them and starts the timer on the same tick.
        engine.on_growth_tick(0.5);
        assert_eq!(engine.stage_index(), 1);
        assert_eq!(engine.leaves().len(), 2);
        assert!(engine.leaves().iter().all(|l| l.is_dropping()));

        engine.on_growth_tick(0.5);
        engine.on_growth_tick(0.5);
        assert_eq!(engine.leaves().len(), 2);
        assert_relative_eq!(engine.leaves().leaves[0].drop_elapsed(), 1.5);

        engine.on_growth_tick(0.5);
        assert!(engine.leaves().is_empty());
    }

    #[test]
    fn zero_branch_probability_grows_a_single_axis() {
        let stages: Vec<StageSettings> = default_stages()
            .into_iter()
            .map(|s| StageSettings {
                branch_probability: 0.0,
                ..s
            })
            .collect();
        let general = GeneralSettings {
            seed: 99,
            ..GeneralSettings::default()
        };
        let mut engine = GrowthEngine::new(preset_with(general, stages));
        engine.initialize();
        for _ in 0..150 {
            engine.on_growth_tick(0.5);
            assert!(engine.tree().nodes.iter().all(|n| n.children.len() <= 1));
        }
        assert_eq!(engine.tree().len(), 151);
        assert_eq!(engine.buds().len(), 1);
    }

    #[test]
    fn render_mode_and_materials_shape_output() {
        let preset = Arc::new(GrowthPreset::default_schedule());
        let options = EngineOptions {
            render_mode: RenderMode::MeshOnly,
            bark_material: Some(MaterialHandle(1)),
            leaf_material: Some(MaterialHandle(2)),
            leaf_template: Some(Arc::new(mesh::unit_quad())),
            ..EngineOptions::default()
        };
        let mut engine = GrowthEngine::with_options(preset, options);
        engine.initialize_with(Arc::new(GrowthPreset::default_schedule()), 8);

        let render = engine.render();
        assert!(render.lines.is_none());
        assert_eq!(render.bark().unwrap().material, Some(MaterialHandle(1)));

        // Cotyledons at age zero are visible (cycle offset zero).
        let leaves = render.leaves().unwrap();
        assert_eq!(leaves.material, Some(MaterialHandle(2)));
        assert_eq!(leaves.mesh.vertex_count(), 2 * 4);

        engine.set_render_mode(RenderMode::LinesOnly);
        assert!(engine.render().submeshes.is_empty());
        assert!(engine.render().lines.is_some());
    }

    #[test]
    fn segment_bark_builds_one_cylinder_per_edge() {
        let mut engine = seeded(42);
        for _ in 0..6 {
            engine.on_growth_tick(0.5);
        }
        let radial = engine.preset().general.radial_segments;
        let edges = engine.segments().len();
        assert_eq!(edges, engine.tree().len() - 1);

        engine.set_bark_style(BarkStyle::Segments);
        let bark = &engine.render().bark().unwrap().mesh;
        assert_eq!(bark.vertex_count(), edges * radial * 2);
        assert_eq!(bark.triangle_count(), edges * radial * 2);

        engine.set_bark_style(BarkStyle::Tube);
        let tube = &engine.render().bark().unwrap().mesh;
        assert_eq!(tube.vertex_count(), engine.tree().len() * radial);
    }

    #[test]
    fn render_bounds_cover_every_node_and_merge_keeps_all_triangles() {
        let options = EngineOptions {
            leaf_material: Some(MaterialHandle(2)),
            leaf_template: Some(Arc::new(mesh::unit_quad())),
            ..EngineOptions::default()
        };
        let mut engine = GrowthEngine::with_options(Arc::new(GrowthPreset::default_schedule()), options);
        engine.initialize_with(Arc::new(GrowthPreset::default_schedule()), 9);
        for _ in 0..8 {
            engine.on_growth_tick(0.5);
        }

        let render = engine.render();
        let (lo, hi) = render.bounds().unwrap();
        for node in &engine.tree().nodes {
            assert!(node.pos.cmpge(lo - Vec3::splat(1e-4)).all());
            assert!(node.pos.cmple(hi + Vec3::splat(1e-4)).all());
        }

        let merged = render.merged();
        let triangles: usize = render.submeshes.iter().map(|s| s.mesh.triangle_count()).sum();
        assert_eq!(merged.triangle_count(), triangles);
        assert!(merged.indices.iter().all(|&i| (i as usize) < merged.vertex_count()));
    }

    #[test]
    fn empty_render_has_no_bounds() {
        assert!(TreeRender::default().bounds().is_none());
        assert!(TreeRender::default().merged().is_empty());
    }

    #[test]
    fn leaf_submesh_requires_material() {
        let options = EngineOptions {
            leaf_template: Some(Arc::new(mesh::unit_quad())),
            ..EngineOptions::default()
        };
        let mut engine = GrowthEngine::with_options(Arc::new(GrowthPreset::default_schedule()), options);
        engine.initialize_with(Arc::new(GrowthPreset::default_schedule()), 8);
        assert_eq!(engine.render().submeshes.len(), 1);
        assert_eq!(engine.visible_leaf_instances().len(), 2);
    }

    #[test]
    fn dispose_clears_state_and_allows_reinitialize() {
        let mut engine = seeded(42);
        for _ in 0..10 {
            engine.on_growth_tick(0.5);
        }
        engine.dispose();
        assert!(!engine.is_initialized());
        assert!(engine.tree().is_empty());
        assert!(engine.leaves().is_empty());
        assert!(engine.render().submeshes.is_empty());

        engine.initialize();
        assert_eq!(engine.tree().len(), 1);
    }
}

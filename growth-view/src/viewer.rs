//! Interactive tree growth viewer built with eframe/egui.
//!
//! This module defines [`Viewer`], which owns a [`TickScheduler`], one
//! [`GrowthEngine`] and the active [`GrowthPreset`], and implements
//! [`eframe::App`] to draw an orthographic side view of the synthesized
//! meshes and expose the simulation controls.

use std::{cell::RefCell, rc::Rc, sync::Arc};

use eframe::App;
use glam::{Vec2, Vec3};
use growth_core::{
    config::GrowthPreset,
    engine::{BarkStyle, EngineOptions, GrowthEngine, RenderMode},
    mesh::{self, Topology},
    scheduler::TickScheduler,
    types::MaterialHandle,
};
use rand::{Rng, rng};

const BARK_MATERIAL: MaterialHandle = MaterialHandle(1);
const LEAF_MATERIAL: MaterialHandle = MaterialHandle(2);
const LINE_MATERIAL: MaterialHandle = MaterialHandle(3);

/// Main application state for the interactive viewer.
///
/// The typical per-frame update is:
/// 1. Handle UI interactions / input.
/// 2. If `running` is `true`, feed the frame time into the scheduler,
///    which ticks the engine as often as the tick interval allows.
/// 3. Paint the bark tube, skeleton lines and leaves from the engine's
///    render output.
///
/// ### Fields
/// - `preset` - Preset the engine is (re)initialized with.
/// - `engine` - The simulated tree, shared with the scheduler.
/// - `scheduler` - Converts frame time into fixed growth ticks.
/// - `seed` - Seed used on reset; `0` picks a random one.
/// - `rng` - Source for the "random seed" button.
/// - `running` - Whether the simulation is currently auto-advancing.
/// - `zoom` - Pixels per world unit.
/// - `pan` - Screen-space pan offset in pixels.
/// - `yaw` - Rotation of the view around the world up axis (radians).
/// - `preset_path` - Path typed into the preset loader.
/// - `status` - Last load result shown in the side panel.
/// - `last_ticks` - Ticks fired during the last frame (for display only).
/// - `fit_requested` - Refit zoom and pan to the tree on the next paint.
pub struct Viewer {
    preset: Arc<GrowthPreset>,
    engine: Rc<RefCell<GrowthEngine>>,
    scheduler: TickScheduler,
    seed: u64,

    rng: rand::rngs::ThreadRng,

    running: bool,
    zoom: f32,
    pan: egui::Vec2,
    yaw: f32,
    show_leaves: bool,

    preset_path: String,
    status: String,
    last_ticks: usize,
    fit_requested: bool,
}

impl Viewer {
    /// Creates a viewer with the default schedule, seed `42`, and a
    /// scheduler ticking every half second.
    ///
    /// The engine is initialized immediately so the root ring is visible
    /// before the first tick.
    ///
    /// ### Returns
    /// A fully-initialized [`Viewer`] ready to be passed to `eframe::run_native`.
    pub fn new() -> Self {
        let preset = Arc::new(GrowthPreset::default_schedule());
        let seed = 42;

        let options = EngineOptions {
            bark_material: Some(BARK_MATERIAL),
            leaf_material: Some(LEAF_MATERIAL),
            line_material: Some(LINE_MATERIAL),
            leaf_template: Some(Arc::new(mesh::unit_quad())),
            ..EngineOptions::default()
        };
        let engine = Rc::new(RefCell::new(GrowthEngine::with_options(
            preset.clone(),
            options,
        )));
        engine.borrow_mut().initialize_with(preset.clone(), seed);

        let mut scheduler = TickScheduler::new(0.5).with_max_ticks_per_update(8);
        scheduler.register(&engine);

        Self {
            preset,
            engine,
            scheduler,
            seed,
            rng: rng(),
            running: false,
            zoom: 60.0,
            pan: egui::vec2(0.0, 200.0),
            yaw: 0.0,
            show_leaves: true,
            preset_path: "preset.ron".to_string(),
            status: String::new(),
            last_ticks: 0,
            fit_requested: false,
        }
    }

    /// Re-initializes the engine with the current preset and seed and
    /// stops auto-running.
    fn reset(&mut self) {
        self.engine
            .borrow_mut()
            .initialize_with(self.preset.clone(), self.seed);
        self.running = false;
        self.last_ticks = 0;
    }

    /// Advances the simulation by exactly one growth tick.
    fn step_once(&mut self) {
        let dt = if self.scheduler.tick_interval() > 0.0 {
            self.scheduler.tick_interval()
        } else {
            0.5
        };
        self.engine.borrow_mut().on_growth_tick(dt);
    }

    /// Loads a RON preset from `preset_path` and resets the tree with it.
    ///
    /// On failure the current preset is kept and the error is shown in
    /// the side panel.
    fn load_preset(&mut self) {
        match GrowthPreset::load(&self.preset_path) {
            Ok(preset) => {
                self.preset = Arc::new(preset);
                self.status = format!("loaded {}", self.preset_path);
                self.reset();
            }
            Err(err) => {
                log::warn!("could not load preset {}: {err}", self.preset_path);
                self.status = err.to_string();
            }
        }
    }

    /// Rotates a world position around the up axis by `yaw` and drops
    /// the depth component.
    ///
    /// ### Returns
    /// `(plane position, depth)`; larger depth is further from the viewer.
    fn project(&self, p: Vec3) -> (Vec2, f32) {
        let (s, c) = self.yaw.sin_cos();
        let x = p.x * c - p.z * s;
        let z = p.x * s + p.z * c;
        (Vec2::new(x, p.y), z)
    }

    /// Converts a view-plane position to screen-space.
    ///
    /// Plane coordinates are scaled by `zoom`, offset by `pan`, and then
    /// centered inside the given `rect`. The y-axis is flipped so that
    /// positive y goes up in world space.
    fn world_to_screen(&self, p: Vec2, rect: egui::Rect) -> egui::Pos2 {
        let center = rect.center();
        egui::pos2(
            center.x + p.x * self.zoom + self.pan.x,
            center.y - p.y * self.zoom + self.pan.y,
        )
    }

    /// Converts a screen-space position back to the view plane.
    ///
    /// This is the inverse of [`Viewer::world_to_screen`] (up to floating
    /// point rounding).
    fn screen_to_world(&self, p: egui::Pos2, rect: egui::Rect) -> Vec2 {
        let center = rect.center();
        let x = (p.x - center.x - self.pan.x) / self.zoom;
        let y = (center.y - p.y + self.pan.y) / self.zoom;
        Vec2::new(x, y)
    }

    /// Centers the view on the current render bounds and picks a zoom that
    /// fits them inside `rect` with a small margin.
    ///
    /// Leaves the view untouched when nothing has been rendered.
    fn fit_view(&mut self, rect: egui::Rect) {
        let Some((lo, hi)) = self.engine.borrow().render().bounds() else {
            return;
        };
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        let (min, max) = corners
            .iter()
            .map(|&c| self.project(c).0)
            .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(a, b), p| {
                (a.min(p), b.max(p))
            });

        let size = (max - min).max(Vec2::splat(0.1));
        let zoom = (rect.width() / size.x).min(rect.height() / size.y) * 0.9;
        self.zoom = zoom.clamp(5.0, 400.0);

        let center = (min + max) * 0.5;
        self.pan = egui::vec2(-center.x * self.zoom, center.y * self.zoom);
    }

    fn screen_pos(&self, p: Vec3, rect: egui::Rect) -> egui::Pos2 {
        self.world_to_screen(self.project(p).0, rect)
    }

    /// Builds the top panel UI (run controls, stepping, zoom).
    fn ui_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui
                    .button(if self.running { "⏸ Pause" } else { "▶ Run" })
                    .clicked()
                {
                    self.running = !self.running;
                }

                let mut interval = self.scheduler.tick_interval();
                if ui
                    .add(
                        egui::DragValue::new(&mut interval)
                            .prefix("tick = ")
                            .range(0.0..=2.0)
                            .speed(0.01),
                    )
                    .changed()
                {
                    self.scheduler.set_tick_interval(interval);
                }

                if ui.button("Step").clicked() {
                    self.step_once();
                }

                if ui.button("Reset").clicked() {
                    self.reset();
                }

                if ui.button("Fit").clicked() {
                    self.fit_requested = true;
                }

                ui.separator();
                ui.add(egui::Slider::new(&mut self.zoom, 5.0..=400.0).text("Zoom"));
                ui.add(
                    egui::Slider::new(&mut self.yaw, -std::f32::consts::PI..=std::f32::consts::PI)
                        .text("Yaw"),
                );
            });
        });
    }

    /// Builds the bottom status bar (stage, age, population counts).
    fn ui_status_bar(&self, ctx: &egui::Context) {
        let engine = self.engine.borrow();
        let stage_name = engine
            .current_stage()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        let triangles = engine
            .render()
            .bark()
            .map(|b| b.mesh.triangle_count())
            .unwrap_or(0);

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("ticks last frame = {}", self.last_ticks));
                ui.separator();
                ui.label(format!("triangles = {triangles}"));
                ui.label(format!("leaves = {}", engine.leaves().len()));
                ui.label(format!("buds = {}", engine.buds().len()));
                ui.label(format!("nodes = {}", engine.tree().len()));
                ui.separator();
                ui.label(format!("age = {:.1} s", engine.age()));
                ui.label(format!(
                    "stage {} ({stage_name}) t = {:.1} s",
                    engine.stage_index(),
                    engine.stage_time()
                ));
            });
        });
    }

    /// Builds the right-hand panel for seed, speed, render mode and presets.
    fn ui_config_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("config_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                ui.heading("Growth");

                ui.separator();
                ui.horizontal(|ui| {
                    ui.label("seed:");
                    ui.add(egui::DragValue::new(&mut self.seed).speed(1.0));
                    if ui.button("🎲").clicked() {
                        self.seed = self.rng.random_range(1..=u32::MAX as u64);
                    }
                });

                let mut speed = self.engine.borrow().options().growth_speed;
                ui.horizontal(|ui| {
                    ui.label("growth_speed:");
                    if ui
                        .add(egui::DragValue::new(&mut speed).range(0.0..=10.0).speed(0.05))
                        .changed()
                    {
                        self.engine.borrow_mut().set_growth_speed(speed);
                    }
                });

                ui.separator();
                ui.label("Render mode");
                let mut mode = self.engine.borrow().options().render_mode;
                let before = mode;
                ui.selectable_value(&mut mode, RenderMode::MeshAndLines, "Mesh + lines");
                ui.selectable_value(&mut mode, RenderMode::MeshOnly, "Mesh only");
                ui.selectable_value(&mut mode, RenderMode::LinesOnly, "Lines only");
                if mode != before {
                    self.engine.borrow_mut().set_render_mode(mode);
                }
                let mut segmented = self.engine.borrow().options().bark_style == BarkStyle::Segments;
                if ui.checkbox(&mut segmented, "Segmented bark").changed() {
                    let style = if segmented {
                        BarkStyle::Segments
                    } else {
                        BarkStyle::Tube
                    };
                    self.engine.borrow_mut().set_bark_style(style);
                }
                ui.checkbox(&mut self.show_leaves, "Show leaves");

                ui.separator();
                ui.label("Preset (RON)");
                ui.text_edit_singleline(&mut self.preset_path);
                ui.horizontal(|ui| {
                    if ui.button("Load").clicked() {
                        self.load_preset();
                    }
                    if ui.button("Default").clicked() {
                        self.preset = Arc::new(GrowthPreset::default_schedule());
                        self.status = "default schedule".to_string();
                        self.reset();
                    }
                });
                if !self.status.is_empty() {
                    ui.label(&self.status);
                }

                ui.separator();
                ui.label("Stages");
                let engine = self.engine.borrow();
                for (i, stage) in engine.stages().iter().enumerate() {
                    let marker = if i == engine.stage_index() { "▶" } else { " " };
                    ui.label(format!("{marker} {} ({:.0} s)", stage.name, stage.duration));
                }
            });
    }

    /// Paints the bark tube as a flat-shaded egui mesh, back to front.
    fn paint_bark(&self, painter: &egui::Painter, rect: egui::Rect) {
        let engine = self.engine.borrow();
        let Some(bark) = engine.render().bark() else {
            return;
        };
        let m = &bark.mesh;
        if m.topology != Topology::Triangles || m.is_empty() {
            return;
        }

        let light = Vec3::new(0.4, 0.8, -0.4).normalize();
        let mut tris: Vec<(f32, [u32; 3])> = m
            .indices
            .chunks_exact(3)
            .map(|t| {
                let depth: f32 = t
                    .iter()
                    .map(|&i| self.project(m.positions[i as usize]).1)
                    .sum();
                (depth, [t[0], t[1], t[2]])
            })
            .collect();
        tris.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut shape = egui::Mesh::default();
        for (_, tri) in tris {
            let base = shape.vertices.len() as u32;
            for &i in &tri {
                let i = i as usize;
                let shade = 0.35 + 0.65 * m.normals[i].dot(light).max(0.0);
                let c = (110.0 * shade) as u8;
                let color = egui::Color32::from_rgb(c, (c as f32 * 0.7) as u8, (c as f32 * 0.45) as u8);
                shape.colored_vertex(self.screen_pos(m.positions[i], rect), color);
            }
            shape.add_triangle(base, base + 1, base + 2);
        }
        painter.add(egui::Shape::mesh(shape));
    }

    /// Paints the skeleton line mesh.
    fn paint_lines(&self, painter: &egui::Painter, rect: egui::Rect) {
        let engine = self.engine.borrow();
        let Some(lines) = &engine.render().lines else {
            return;
        };
        let stroke = egui::Stroke::new(1.0, egui::Color32::LIGHT_GREEN);
        for pair in lines.mesh.indices.chunks_exact(2) {
            let a = self.screen_pos(lines.mesh.positions[pair[0] as usize], rect);
            let b = self.screen_pos(lines.mesh.positions[pair[1] as usize], rect);
            painter.line_segment([a, b], stroke);
        }
    }

    /// Paints every visible leaf as a small disc.
    fn paint_leaves(&self, painter: &egui::Painter, rect: egui::Rect) {
        let engine = self.engine.borrow();
        for leaf in engine.visible_leaf_instances() {
            let p = self.screen_pos(leaf.translation, rect);
            let r = (leaf.scale * self.zoom * 0.3).max(1.5);
            painter.circle_filled(p, r, egui::Color32::from_rgba_unmultiplied(60, 170, 70, 200));
        }
    }

    /// Builds the central panel where the tree is drawn.
    fn ui_central_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let response = ui.allocate_response(ui.available_size(), egui::Sense::click_and_drag());
            let rect = response.rect;
            let painter = ui.painter_at(rect);

            // Drag pans; drag with the secondary button orbits.
            if response.dragged_by(egui::PointerButton::Secondary) {
                self.yaw += response.drag_delta().x * 0.01;
            } else if response.dragged() {
                self.pan += response.drag_delta();
            }

            // Zoom around the mouse cursor.
            let scroll = ui.ctx().input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                let pointer_screen = response.hover_pos().unwrap_or(rect.center());
                let world_before = self.screen_to_world(pointer_screen, rect);

                let factor = (1.0 + scroll * 0.001).clamp(0.5, 2.0);
                self.zoom = (self.zoom * factor).clamp(5.0, 400.0);

                let screen_after = self.world_to_screen(world_before, rect);
                self.pan += pointer_screen - screen_after;
            }

            if std::mem::take(&mut self.fit_requested) {
                self.fit_view(rect);
            }

            // Ground line.
            let ground_a = self.world_to_screen(Vec2::new(-10.0, 0.0), rect);
            let ground_b = self.world_to_screen(Vec2::new(10.0, 0.0), rect);
            painter.line_segment([ground_a, ground_b], egui::Stroke::new(1.0, egui::Color32::GRAY));

            self.paint_bark(&painter, rect);
            self.paint_lines(&painter, rect);
            if self.show_leaves {
                self.paint_leaves(&painter, rect);
            }

            if self.running {
                let dt = ctx.input(|i| i.stable_dt).min(0.25);
                self.last_ticks = self.scheduler.update(dt);
                ctx.request_repaint();
            }
        });
    }
}

impl App for Viewer {
    /// eframe callback that builds all UI panels for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui_top_panel(ctx);
        self.ui_status_bar(ctx);
        self.ui_config_panel(ctx);
        self.ui_central_panel(ctx);
    }
}

//! Fixed-step tick dispatch for growth simulations.
//!
//! The host calls [`TickScheduler::update`] once per frame with the
//! elapsed time. The scheduler turns that into zero or more fixed-size
//! growth ticks and forwards them to every registered target, in
//! registration order.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

/// Anything that advances on growth ticks.
pub trait GrowthTick {
    fn on_growth_tick(&mut self, dt: f32);
}

/// Registry of growth targets plus a time accumulator.
///
/// Targets are held weakly: dropping the last `Rc` to a target is enough
/// to retire it, and the dead entry is pruned on the next tick pass.
pub struct TickScheduler {
    tick_interval: f32,
    max_ticks_per_update: Option<usize>,
    accumulator: f32,
    targets: Vec<Weak<RefCell<dyn GrowthTick>>>,
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl TickScheduler {
    /// Creates a scheduler firing ticks of `tick_interval` seconds.
    ///
    /// A non-positive interval ticks once per update with the raw
    /// elapsed time.
    pub fn new(tick_interval: f32) -> Self {
        Self {
            tick_interval,
            max_ticks_per_update: None,
            accumulator: 0.0,
            targets: Vec::new(),
        }
    }

    /// Caps how many catch-up ticks a single update may fire. Leftover
    /// time stays in the accumulator.
    pub fn with_max_ticks_per_update(mut self, max: usize) -> Self {
        self.max_ticks_per_update = Some(max);
        self
    }

    pub fn tick_interval(&self) -> f32 {
        self.tick_interval
    }

    pub fn set_tick_interval(&mut self, interval: f32) {
        self.tick_interval = interval;
    }

    pub fn accumulator(&self) -> f32 {
        self.accumulator
    }

    /// Number of registered targets that are still alive.
    pub fn live_targets(&self) -> usize {
        self.targets.iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Adds `target` to the end of the tick order. Registering the same
    /// target twice has no effect.
    pub fn register<T: GrowthTick + 'static>(&mut self, target: &Rc<RefCell<T>>) {
        let weak = Rc::downgrade(target);
        let weak: Weak<RefCell<dyn GrowthTick>> = weak;
        if self.targets.iter().any(|w| Weak::ptr_eq(w, &weak)) {
            return;
        }
        self.targets.push(weak);
    }

    pub fn unregister<T: GrowthTick + 'static>(&mut self, target: &Rc<RefCell<T>>) {
        let weak = Rc::downgrade(target);
        let weak: Weak<RefCell<dyn GrowthTick>> = weak;
        self.targets.retain(|w| !Weak::ptr_eq(w, &weak));
    }

    /// Feeds `elapsed` seconds of host time into the scheduler.
    ///
    /// ### Returns
    /// The number of tick passes fired.
    pub fn update(&mut self, elapsed: f32) -> usize {
        self.accumulator += elapsed;

        if self.tick_interval <= 0.0 {
            self.tick_all(elapsed);
            self.accumulator = 0.0;
            return 1;
        }

        // Count due ticks once rather than subtracting per tick.
        let mut fired = (self.accumulator / self.tick_interval).floor() as usize;
        if let Some(max) = self.max_ticks_per_update {
            fired = fired.min(max);
        }

        for _ in 0..fired {
            self.tick_all(self.tick_interval);
        }
        self.accumulator = (self.accumulator - fired as f32 * self.tick_interval).max(0.0);
        fired
    }

    /// One tick pass over every live target.
    fn tick_all(&mut self, dt: f32) {
        self.targets.retain(|w| w.strong_count() > 0);
        for weak in &self.targets {
            let Some(target) = weak.upgrade() else {
                continue;
            };
            match target.try_borrow_mut() {
                Ok(mut t) => t.on_growth_tick(dt),
                Err(_) => log::warn!("skipping growth tick for a target that is already borrowed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::GrowthPreset, engine::GrowthEngine};
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        ticks: Vec<f32>,
    }

    impl GrowthTick for Recorder {
        fn on_growth_tick(&mut self, dt: f32) {
            self.ticks.push(dt);
        }
    }

    #[test]
    fn fixed_interval_drains_accumulator_in_steps() {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let mut sched = TickScheduler::new(0.5);
        sched.register(&rec);

        assert_eq!(sched.update(0.25), 0);
        assert_eq!(sched.update(1.5), 3);
        assert_eq!(rec.borrow().ticks, vec![0.5, 0.5, 0.5]);
        assert_eq!(sched.accumulator(), 0.25);
    }

    #[test]
    fn non_positive_interval_ticks_with_raw_elapsed() {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let mut sched = TickScheduler::new(0.0);
        sched.register(&rec);

        assert_eq!(sched.update(0.125), 1);
        assert_eq!(sched.update(0.75), 1);
        assert_eq!(rec.borrow().ticks, vec![0.125, 0.75]);
        assert_eq!(sched.accumulator(), 0.0);
    }

    #[test]
    fn budget_limits_catch_up_and_keeps_remainder() {
        let rec = Rc::new(RefCell::new(Recorder::default()));
        let mut sched = TickScheduler::new(0.5).with_max_ticks_per_update(2);
        sched.register(&rec);

        assert_eq!(sched.update(2.5), 2);
        assert_eq!(sched.accumulator(), 1.5);
        assert_eq!(sched.update(0.0), 2);
        assert_eq!(rec.borrow().ticks.len(), 4);
    }

    #[test]
    fn large_elapsed_fires_every_due_tick_and_terminates() {
        #[derive(Default)]
        struct Counter {
            ticks: u64,
        }
        impl GrowthTick for Counter {
            fn on_growth_tick(&mut self, _dt: f32) {
                self.ticks += 1;
            }
        }

        let counter = Rc::new(RefCell::new(Counter::default()));
        let mut sched = TickScheduler::new(0.5);
        sched.register(&counter);

        assert_eq!(sched.update(1.0e7), 20_000_000);
        assert_eq!(counter.borrow().ticks, 20_000_000);
        assert_eq!(sched.accumulator(), 0.0);
    }

    #[test]
    fn register_accepts_concrete_engine_handles() {
        let engine = Rc::new(RefCell::new(GrowthEngine::new(Arc::new(
            GrowthPreset::default_schedule(),
        ))));
        let mut sched = TickScheduler::default();
        sched.register(&engine);
        sched.register(&engine);
        assert_eq!(sched.live_targets(), 1);

        sched.unregister(&engine);
        assert_eq!(sched.live_targets(), 0);
    }

    #[test]
    fn targets_tick_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));

        struct Named {
            name: &'static str,
            log: Rc<RefCell<Vec<&'static str>>>,
        }
        impl GrowthTick for Named {
            fn on_growth_tick(&mut self, _dt: f32) {
                self.log.borrow_mut().push(self.name);
            }
        }

        let a = Rc::new(RefCell::new(Named { name: "a", log: order.clone() }));
        let b = Rc::new(RefCell::new(Named { name: "b", log: order.clone() }));
        let mut sched = TickScheduler::new(1.0);
        sched.register(&a);
        sched.register(&b);
        sched.register(&a);

        sched.update(2.0);
        assert_eq!(*order.borrow(), vec!["a", "b", "a", "b"]);
    }

    #[test]
    fn unregister_and_dropped_targets_stop_ticking() {
        let a = Rc::new(RefCell::new(Recorder::default()));
        let b = Rc::new(RefCell::new(Recorder::default()));
        let c = Rc::new(RefCell::new(Recorder::default()));
        let mut sched = TickScheduler::new(1.0);
        sched.register(&a);
        sched.register(&b);
        sched.register(&c);

        sched.unregister(&a);
        drop(b);
        assert_eq!(sched.live_targets(), 1);

        sched.update(1.0);
        assert!(a.borrow().ticks.is_empty());
        assert_eq!(c.borrow().ticks, vec![1.0]);
        assert_eq!(sched.targets.len(), 1);
    }

    #[test]
    fn drives_growth_engines() {
        let preset = Arc::new(GrowthPreset::default_schedule());
        let engine = Rc::new(RefCell::new(GrowthEngine::new(preset)));
        engine.borrow_mut().initialize_with(Arc::new(GrowthPreset::default_schedule()), 42);

        let mut sched = TickScheduler::new(0.5);
        sched.register(&engine);
        sched.update(2.0);

        let e = engine.borrow();
        assert_eq!(e.age(), 2.0);
        assert!(e.tree().len() >= 5);
    }
}

//! Registers named systems and runs them, once per tick, in the order
//! [`relaytick_schedule::Scheduler`] computes from their declared queries.

use relaytick_component::Query;
use relaytick_schedule::{ScheduleError, Scheduler};
use relaytick_world::World;

use crate::context::SystemContext;

/// A system function: given the current tick's context, reads and writes
/// the world through `ctx.world`.
pub type SystemFn = Box<dyn FnMut(&mut SystemContext) + Send>;

struct RegisteredSystem {
    name: String,
    query: Query,
    func: SystemFn,
}

/// Owns the scheduler and the bound system functions, and drives one tick
/// at a time.
pub struct SystemRunner {
    scheduler: Scheduler,
    systems: Vec<RegisteredSystem>,
    dt: f64,
}

impl SystemRunner {
    /// Create an empty runner. `dt` is the fixed timestep handed to every
    /// system's context each tick.
    #[must_use]
    pub fn new(dt: f64) -> Self {
        Self {
            scheduler: Scheduler::new(),
            systems: Vec::new(),
            dt,
        }
    }

    /// Register a system under `name` with its declared data access.
    /// Returns its registration index.
    pub fn register(&mut self, name: impl Into<String>, query: Query, func: SystemFn) -> usize {
        let name = name.into();
        self.scheduler.register(name.clone(), query.clone());
        self.systems.push(RegisteredSystem { name, query, func });
        self.systems.len() - 1
    }

    /// Run every registered system once, in scheduler order, against
    /// `world`. Returns the names of the systems that ran, in execution
    /// order — useful for asserting on ordering in tests.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::CycleDetected`] if the declared accesses
    /// form a cycle; no system runs in that case.
    pub fn run_tick(&mut self, world: &mut World) -> Result<Vec<String>, ScheduleError> {
        let order = self.scheduler.order()?.to_vec();
        let tick = world.tick();
        let mut executed = Vec::with_capacity(order.len());
        for index in order {
            let system = &mut self.systems[index];
            tracing::debug!(system = system.name.as_str(), tick, "running system");
            let mut ctx = SystemContext {
                world,
                tick,
                dt: self.dt,
                query: &system.query,
            };
            (system.func)(&mut ctx);
            executed.push(system.name.clone());
        }
        Ok(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaytick_component::{Component, ComponentId, Domain};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
    struct Counter(u32);
    impl Component for Counter {
        fn type_name() -> &'static str {
            "Counter"
        }
    }

    #[test]
    fn test_systems_run_in_scheduler_order() {
        let mut world = World::new(Domain::PRODUCER);
        let counter_id = world.register::<Counter>();
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut runner = SystemRunner::new(1.0 / 60.0);

        let log_b = Arc::clone(&log);
        runner.register(
            "b_reads",
            Query::new().read(ComponentId(counter_id.0)),
            Box::new(move |_ctx| log_b.lock().unwrap().push("b_reads")),
        );
        let log_a = Arc::clone(&log);
        runner.register(
            "a_writes",
            Query::new().write(ComponentId(counter_id.0)),
            Box::new(move |_ctx| log_a.lock().unwrap().push("a_writes")),
        );

        let executed = runner.run_tick(&mut world).unwrap();
        assert_eq!(executed, vec!["a_writes".to_string(), "b_reads".to_string()]);
        assert_eq!(*log.lock().unwrap(), vec!["a_writes", "b_reads"]);
    }

    #[test]
    fn test_system_can_mutate_world_through_context() {
        let mut world = World::new(Domain::PRODUCER);
        world.register::<Counter>();
        let entity = world.spawn();
        world.add(entity, Counter(0)).unwrap();

        let mut runner = SystemRunner::new(1.0 / 60.0);
        let counter_id = world.components().id_of::<Counter>().unwrap();
        runner.register(
            "incrementer",
            Query::new().write(ComponentId(counter_id.0)),
            Box::new(move |ctx| {
                let matches = ctx.world.query(ctx.query).unwrap();
                for e in matches.entities() {
                    let current = ctx.world.get::<Counter>(e).copied().unwrap();
                    ctx.world.set(e, Counter(current.0 + 1)).unwrap();
                }
            }),
        );

        runner.run_tick(&mut world).unwrap();
        assert_eq!(world.get::<Counter>(entity).unwrap().0, 1);
    }

    #[test]
    fn test_cycle_prevents_any_system_running() {
        let mut world = World::new(Domain::PRODUCER);
        let mut runner = SystemRunner::new(1.0 / 60.0);
        runner.register(
            "s1",
            Query::new().read(ComponentId(1)).write(ComponentId(2)),
            Box::new(|_| {}),
        );
        runner.register(
            "s2",
            Query::new().read(ComponentId(2)).write(ComponentId(1)),
            Box::new(|_| {}),
        );
        let err = runner.run_tick(&mut world).unwrap_err();
        assert!(matches!(err, ScheduleError::CycleDetected(_)));
    }
}

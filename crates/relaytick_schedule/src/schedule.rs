//! The scheduler: turns a set of registered systems' declared queries into
//! a single topological execution order.
//!
//! Every system declares what it reads and writes through its [`Query`].
//! Two edges are derived from that: **writer order** — systems writing the
//! same component run in the order they were registered — and **writers
//! before readers** — a system reading a component runs after every system
//! that writes it. [`Kahn's algorithm`](build_order) turns those edges into
//! one linear order, breaking ties by registration index so the result is
//! deterministic across runs. A cycle in the resulting graph (two systems
//! each depending on the other's output) is a fatal configuration error,
//! not something a scheduler can route around by falling back to
//! parallel stages.

use std::collections::{BTreeSet, HashMap, HashSet};

use relaytick_component::{ComponentId, Query};
use thiserror::Error;

/// Errors raised while registering systems or computing an execution order.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// The read/write dependency graph contains a cycle; the named systems
    /// could not be placed in any order.
    #[error("dependency cycle among systems: {0:?}")]
    CycleDetected(Vec<String>),
}

/// One registered system: a name (for logs and error messages) and its
/// declared data access.
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    pub name: String,
    pub query: Query,
}

/// Computes a single topological execution order via Kahn's algorithm.
///
/// Ready nodes (in-degree zero) are drawn in ascending index order, which —
/// since `systems` is in registration order — makes the result depend only
/// on registration order and declared access, never on iteration order of
/// a hash map.
///
/// # Errors
///
/// Returns [`ScheduleError::CycleDetected`] naming every system left
/// unordered when no more ready nodes remain.
pub fn build_order(systems: &[SystemDescriptor]) -> Result<Vec<usize>, ScheduleError> {
    let n = systems.len();
    let mut writers: HashMap<ComponentId, Vec<usize>> = HashMap::new();
    let mut readers: HashMap<ComponentId, Vec<usize>> = HashMap::new();

    for (idx, system) in systems.iter().enumerate() {
        for id in system.query.writes() {
            writers.entry(id).or_default().push(idx);
        }
        for id in system.query.reads() {
            readers.entry(id).or_default().push(idx);
        }
    }

    let mut edges: HashSet<(usize, usize)> = HashSet::new();

    // Writer order: writers of the same component run in registration order.
    for same_component_writers in writers.values() {
        for pair in same_component_writers.windows(2) {
            edges.insert((pair[0], pair[1]));
        }
    }

    // Writers before readers of the same component.
    for (component, component_readers) in &readers {
        let Some(component_writers) = writers.get(component) else {
            continue;
        };
        for &writer in component_writers {
            for &reader in component_readers {
                if writer != reader {
                    edges.insert((writer, reader));
                }
            }
        }
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    for &(from, to) in &edges {
        adjacency[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(&next) = ready.iter().next() {
        ready.remove(&next);
        order.push(next);
        for &successor in &adjacency[next] {
            in_degree[successor] -= 1;
            if in_degree[successor] == 0 {
                ready.insert(successor);
            }
        }
    }

    if order.len() != n {
        let placed: HashSet<usize> = order.iter().copied().collect();
        let stuck: Vec<String> = (0..n)
            .filter(|i| !placed.contains(i))
            .map(|i| systems[i].name.clone())
            .collect();
        return Err(ScheduleError::CycleDetected(stuck));
    }

    Ok(order)
}

/// Registers systems and caches the execution order computed from them,
/// invalidating the cache whenever the system set changes.
#[derive(Debug, Default)]
pub struct Scheduler {
    systems: Vec<SystemDescriptor>,
    order: Option<Vec<usize>>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system under `name` with the given data access. Returns
    /// its registration index.
    pub fn register(&mut self, name: impl Into<String>, query: Query) -> usize {
        self.systems.push(SystemDescriptor {
            name: name.into(),
            query,
        });
        self.order = None;
        self.systems.len() - 1
    }

    /// Every registered system, in registration order.
    #[must_use]
    pub fn systems(&self) -> &[SystemDescriptor] {
        &self.systems
    }

    /// The execution order (registration indices), computing and caching it
    /// if the system set has changed since the last call.
    pub fn order(&mut self) -> Result<&[usize], ScheduleError> {
        if self.order.is_none() {
            let computed = build_order(&self.systems)?;
            tracing::debug!(system_count = self.systems.len(), "recomputed execution order");
            self.order = Some(computed);
        }
        Ok(self.order.as_deref().unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(name: &str, reads: &[u32], writes: &[u32]) -> SystemDescriptor {
        let mut query = Query::new();
        for &r in reads {
            query = query.read(ComponentId(r));
        }
        for &w in writes {
            query = query.write(ComponentId(w));
        }
        SystemDescriptor {
            name: name.to_string(),
            query,
        }
    }

    #[test]
    fn test_writer_before_reader() {
        // physics writes Velocity(2); movement reads Velocity(2), writes Transform(1)
        let systems = vec![system("physics", &[], &[2]), system("movement", &[2], &[1])];
        let order = build_order(&systems).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_independent_systems_keep_registration_order() {
        let systems = vec![system("ai", &[1], &[3]), system("physics", &[1], &[2])];
        let order = build_order(&systems).unwrap();
        assert_eq!(order, vec![0, 1]);
    }

    #[test]
    fn test_writer_order_preserved_for_shared_component() {
        let systems = vec![
            system("first_writer", &[], &[5]),
            system("second_writer", &[], &[5]),
            system("reader", &[5], &[]),
        ];
        let order = build_order(&systems).unwrap();
        let pos = |name: &str| order.iter().position(|&i| systems[i].name == name).unwrap();
        assert!(pos("first_writer") < pos("second_writer"));
        assert!(pos("second_writer") < pos("reader"));
    }

    #[test]
    fn test_cycle_is_detected() {
        // physics: reads Transform(1), writes Velocity(2)
        // movement: reads Velocity(2), writes Transform(1)
        let systems = vec![system("physics", &[1], &[2]), system("movement", &[2], &[1])];
        let err = build_order(&systems).unwrap_err();
        match err {
            ScheduleError::CycleDetected(names) => {
                assert_eq!(names.len(), 2);
                assert!(names.contains(&"physics".to_string()));
                assert!(names.contains(&"movement".to_string()));
            }
        }
    }

    #[test]
    fn test_scheduler_caches_until_next_registration() {
        let mut scheduler = Scheduler::new();
        scheduler.register("a", Query::new().write(ComponentId(1)));
        let first = scheduler.order().unwrap().to_vec();
        let second = scheduler.order().unwrap().to_vec();
        assert_eq!(first, second);

        scheduler.register("b", Query::new().read(ComponentId(1)));
        let third = scheduler.order().unwrap().to_vec();
        assert_eq!(third, vec![0, 1]);
    }

    #[test]
    fn test_has_term_is_ordered_after_writer_like_a_read() {
        // A `Has` term still observes whether the component is present, so
        // a system declaring it must run after whatever writes that id.
        let mut q_has = Query::new();
        q_has = q_has.has(ComponentId(1));
        let systems = vec![
            system("writer", &[], &[1]),
            SystemDescriptor {
                name: "has_only".to_string(),
                query: q_has,
            },
        ];
        let order = build_order(&systems).unwrap();
        let pos = |name: &str| order.iter().position(|&i| systems[i].name == name).unwrap();
        assert!(pos("writer") < pos("has_only"));
    }
}

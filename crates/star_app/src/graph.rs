//! Execution plan: conflict detection and wave selection.
//!
//! The plan is an undirected conflict graph over the registered systems.
//! Two systems are adjacent when they touch a common resource and at least
//! one of them writes it. The scheduler never lets adjacent systems run at
//! the same time; everything else is free to run in parallel.
//!
//! Systems are dispatched in **waves**. A wave is a maximal set of pending
//! systems with no edge between any two of them, picked greedily in
//! registration order:
//! 1. Walk the pending systems in registration order.
//! 2. Add a system to the wave unless it conflicts with one already in it.
//! 3. Everything skipped waits for a later wave.
//!
//! The result is valid (though not necessarily minimal in wave count) and
//! stable: the same registration always yields the same waves.

use std::collections::BTreeSet;

use star_component::{AccessSet, World};
use tracing::debug;

use crate::registry::RegisteredSystem;

/// The conflict graph over a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// System names, in registration order.
    names: Vec<String>,
    /// Each system's access set, parallel with `names`.
    access: Vec<AccessSet>,
    /// Adjacency sets, parallel with `names`.
    adjacency: Vec<BTreeSet<usize>>,
}

impl ExecutionPlan {
    /// Build the plan for a registration.
    #[must_use]
    pub fn build(systems: &[RegisteredSystem]) -> Self {
        Self::from_access(systems.iter().map(|s| (s.name.clone(), s.access.clone())))
    }

    /// Build a plan from `(name, access set)` pairs in registration order.
    ///
    /// Every unordered pair is compared once, so the cost is
    /// `O(n² · a)` for `n` systems with `a` accesses each.
    #[must_use]
    pub fn from_access(systems: impl IntoIterator<Item = (String, AccessSet)>) -> Self {
        let (names, access): (Vec<String>, Vec<AccessSet>) = systems.into_iter().unzip();
        let mut adjacency = vec![BTreeSet::new(); names.len()];

        for a in 0..names.len() {
            for b in (a + 1)..names.len() {
                let shared: Vec<&str> = access[a].conflicting_resources(&access[b]).collect();
                if shared.is_empty() {
                    continue;
                }
                debug!(
                    a = %names[a],
                    b = %names[b],
                    resources = ?shared,
                    "systems conflict"
                );
                adjacency[a].insert(b);
                adjacency[b].insert(a);
            }
        }

        Self {
            names,
            access,
            adjacency,
        }
    }

    /// Number of systems in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if the plan has no systems.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the system at `index`.
    #[must_use]
    pub fn system_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Index of the named system.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Whether systems `a` and `b` conflict. A system never conflicts with
    /// itself.
    #[must_use]
    pub fn conflicts(&self, a: usize, b: usize) -> bool {
        self.adjacency.get(a).is_some_and(|adj| adj.contains(&b))
    }

    /// Whether the two named systems conflict.
    #[must_use]
    pub fn conflicts_by_name(&self, a: &str, b: &str) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(a), Some(b)) => self.conflicts(a, b),
            _ => false,
        }
    }

    /// Systems that conflict with `index`.
    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency.get(index).into_iter().flatten().copied()
    }

    /// All edges as `(low, high)` index pairs.
    #[must_use]
    pub fn edges(&self) -> BTreeSet<(usize, usize)> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, adj)| adj.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
            .collect()
    }

    /// All edges as name pairs, each pair ordered lexicographically.
    #[must_use]
    pub fn edge_names(&self) -> BTreeSet<(String, String)> {
        self.edges()
            .into_iter()
            .map(|(a, b)| {
                let (a, b) = (&self.names[a], &self.names[b]);
                if a <= b {
                    (a.clone(), b.clone())
                } else {
                    (b.clone(), a.clone())
                }
            })
            .collect()
    }

    /// Pick the next wave from `pending` (indices in registration order).
    ///
    /// The returned wave is a maximal conflict-free subset of `pending`.
    #[must_use]
    pub fn next_wave(&self, pending: &[usize]) -> Vec<usize> {
        let mut wave: Vec<usize> = Vec::new();
        for &candidate in pending {
            if wave.iter().all(|&chosen| !self.conflicts(candidate, chosen)) {
                wave.push(candidate);
            }
        }
        wave
    }

    /// The waves a tick runs through when every system is due.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<usize>> {
        let mut pending: Vec<usize> = (0..self.len()).collect();
        let mut waves = Vec::new();
        while !pending.is_empty() {
            let wave = self.next_wave(&pending);
            pending.retain(|i| !wave.contains(i));
            waves.push(wave);
        }
        waves
    }

    /// Declared resources the World does not hold, as
    /// `(system index, resource name)` pairs.
    #[must_use]
    pub fn missing_resources(&self, world: &World) -> Vec<(usize, String)> {
        self.access
            .iter()
            .enumerate()
            .flat_map(|(index, access)| {
                access
                    .names()
                    .filter(move |name| !world.contains(name))
                    .map(move |name| (index, name.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use star_component::Accessor;

    use super::*;

    fn make_plan(systems: &[(&str, Vec<Accessor>)]) -> ExecutionPlan {
        ExecutionPlan::from_access(
            systems
                .iter()
                .map(|(name, accessors)| (name.to_string(), AccessSet::from_accessors(accessors))),
        )
    }

    #[test]
    fn test_no_systems_no_waves() {
        let plan = make_plan(&[]);
        assert!(plan.is_empty());
        assert!(plan.edges().is_empty());
        assert!(plan.waves().is_empty());
    }

    #[test]
    fn test_single_system_one_wave() {
        let plan = make_plan(&[("physics", vec![Accessor::read("transform")])]);
        assert_eq!(plan.waves(), vec![vec![0]]);
    }

    #[test]
    fn test_write_write_conflict() {
        let plan = make_plan(&[
            ("a", vec![Accessor::write("x")]),
            ("b", vec![Accessor::write("x")]),
        ]);
        assert!(plan.conflicts(0, 1));
        assert!(plan.conflicts_by_name("b", "a"));
        assert_eq!(plan.waves(), vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_read_read_no_conflict() {
        let plan = make_plan(&[
            ("a", vec![Accessor::read("x")]),
            ("b", vec![Accessor::read("x")]),
        ]);
        assert!(!plan.conflicts(0, 1));
        assert_eq!(plan.waves(), vec![vec![0, 1]]);
    }

    #[test]
    fn test_physics_ai_movement_waves() {
        // physics:  reads transform, writes velocity
        // ai:       reads transform, writes ai_state
        // movement: reads velocity, writes transform
        //
        // Expected: wave 1 = [physics, ai], wave 2 = [movement]
        let plan = make_plan(&[
            ("physics", vec![Accessor::read("transform"), Accessor::write("velocity")]),
            ("ai", vec![Accessor::read("transform"), Accessor::write("ai_state")]),
            ("movement", vec![Accessor::read("velocity"), Accessor::write("transform")]),
        ]);
        assert_eq!(plan.waves(), vec![vec![0, 1], vec![2]]);
        assert_eq!(plan.neighbours(2).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_self_read_write_has_no_self_edge() {
        let plan = make_plan(&[
            ("healer", vec![Accessor::read("health"), Accessor::write("health")]),
            ("mover", vec![Accessor::write("position")]),
        ]);
        assert!(!plan.conflicts(0, 0));
        assert!(plan.edges().is_empty());

        let plan = make_plan(&[
            ("healer", vec![Accessor::read("health"), Accessor::write("health")]),
            ("viewer", vec![Accessor::read("health")]),
        ]);
        assert_eq!(plan.edges(), BTreeSet::from([(0, 1)]));
    }

    #[test]
    fn test_rebuild_yields_identical_edges() {
        let systems = [
            ("a", vec![Accessor::write("x"), Accessor::read("y")]),
            ("b", vec![Accessor::read("x")]),
            ("c", vec![Accessor::write("y")]),
            ("d", vec![Accessor::read("z")]),
        ];
        let first = make_plan(&systems);
        let second = make_plan(&systems);
        assert_eq!(first.edges(), second.edges());
        assert_eq!(first.edge_names(), second.edge_names());
        assert_eq!(
            first.edge_names(),
            BTreeSet::from([
                ("a".to_string(), "b".to_string()),
                ("a".to_string(), "c".to_string()),
            ])
        );
    }

    #[test]
    fn test_next_wave_respects_pending_subset() {
        let plan = make_plan(&[
            ("a", vec![Accessor::write("x")]),
            ("b", vec![Accessor::write("x")]),
            ("c", vec![Accessor::write("x")]),
        ]);
        assert_eq!(plan.next_wave(&[1, 2]), vec![1]);
        assert_eq!(plan.next_wave(&[2]), vec![2]);
        assert!(plan.next_wave(&[]).is_empty());
    }

    #[test]
    fn test_waves_never_contain_conflicting_pairs() {
        let plan = make_plan(&[
            ("a", vec![Accessor::write("x")]),
            ("b", vec![Accessor::read("x"), Accessor::write("y")]),
            ("c", vec![Accessor::read("y")]),
            ("d", vec![Accessor::read("x")]),
            ("e", vec![Accessor::write("z")]),
        ]);
        let waves = plan.waves();
        let total: usize = waves.iter().map(Vec::len).sum();
        assert_eq!(total, plan.len());
        for wave in &waves {
            for &a in wave {
                for &b in wave {
                    assert!(!plan.conflicts(a, b), "{a} and {b} share a wave");
                }
            }
        }
    }

    #[test]
    fn test_missing_resources() {
        let plan = make_plan(&[
            ("a", vec![Accessor::read("x")]),
            ("c", vec![Accessor::read("y"), Accessor::read("x")]),
        ]);
        let world = World::new();
        world.insert("x", 1_u8);
        assert_eq!(plan.missing_resources(&world), vec![(1, "y".to_string())]);
    }
}

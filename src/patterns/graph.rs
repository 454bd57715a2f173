//! Dependency graph over packages or services.
//!
//! Nodes live in an arena and are addressed by index; an edge `a -> b` means
//! `b` depends on `a`. Sorting is Kahn's algorithm with a min-heap of ready
//! indices, so the order only depends on insertion order and the edges.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::error::{GenerationError, GenerationResult};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    names: Vec<String>,
    index: HashMap<String, usize>,
    /// dependency -> dependents
    downstream: Vec<Vec<usize>>,
    /// dependent -> dependencies
    upstream: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, returning its index. Adding an existing name is a no-op.
    pub fn add_node(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        let idx = self.names.len();
        self.index.insert(name.clone(), idx);
        self.names.push(name);
        self.downstream.push(Vec::new());
        self.upstream.push(Vec::new());
        idx
    }

    /// Record that `dependent` depends on `dependency`. Both must exist.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) -> GenerationResult<()> {
        let to = self.require(dependent)?;
        let from = self.index.get(dependency).copied().ok_or_else(|| {
            GenerationError::InvalidInput(format!(
                "'{dependent}' depends on unknown '{dependency}'"
            ))
        })?;
        if !self.downstream[from].contains(&to) {
            self.downstream[from].push(to);
            self.upstream[to].push(from);
        }
        Ok(())
    }

    fn require(&self, name: &str) -> GenerationResult<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GenerationError::InvalidInput(format!("unknown node '{name}'")))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, idx: usize) -> &str {
        &self.names[idx]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Direct dependencies of a node, in insertion order of the edges.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.index
            .get(name)
            .map(|&idx| self.upstream[idx].iter().map(|&d| self.names[d].as_str()).collect())
            .unwrap_or_default()
    }

    /// Node indices with dependencies first. Ties go to the lower index.
    pub fn topological_order(&self) -> GenerationResult<Vec<usize>> {
        let mut in_degree: Vec<usize> = self.upstream.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.names.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &next in &self.downstream[idx] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() != self.names.len() {
            let mut done = vec![false; self.names.len()];
            for &idx in &order {
                done[idx] = true;
            }
            return Err(GenerationError::CyclicDependency { nodes: self.find_cycle(&done) });
        }
        Ok(order)
    }

    /// Names in topological order.
    pub fn sorted_names(&self) -> GenerationResult<Vec<&str>> {
        Ok(self.topological_order()?.into_iter().map(|idx| self.name(idx)).collect())
    }

    /// Nodes grouped by depth: level 0 has no dependencies, level `n` depends
    /// on something at level `n - 1`.
    pub fn levels(&self) -> GenerationResult<Vec<Vec<usize>>> {
        let order = self.topological_order()?;
        let mut depth = vec![0usize; self.names.len()];
        for &idx in &order {
            for &dep in &self.upstream[idx] {
                depth[idx] = depth[idx].max(depth[dep] + 1);
            }
        }

        let mut levels: Vec<Vec<usize>> = Vec::new();
        for &idx in &order {
            let level = depth[idx];
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(idx);
        }
        Ok(levels)
    }

    /// Walk dependencies from the lowest unsorted node until a node repeats.
    /// Every unsorted node is on a cycle or depends on one, so the walk
    /// always closes a loop. Returns the loop with its first node repeated.
    fn find_cycle(&self, done: &[bool]) -> Vec<String> {
        let Some(start) = done.iter().position(|d| !d) else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut current = start;
        loop {
            let Some(&next) = self.upstream[current].iter().find(|&&d| !done[d]) else {
                return path.iter().map(|&i| self.names[i].clone()).collect();
            };
            if let Some(pos) = path.iter().position(|&p| p == next) {
                let mut cycle: Vec<String> =
                    path[pos..].iter().rev().map(|&i| self.names[i].clone()).collect();
                cycle.push(self.names[next].clone());
                // Present the loop starting from its lowest-index node.
                return rotate_to_lowest(cycle, &self.index);
            }
            path.push(next);
            current = next;
        }
    }
}

fn rotate_to_lowest(mut cycle: Vec<String>, index: &HashMap<String, usize>) -> Vec<String> {
    cycle.pop();
    let lowest = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, name)| index.get(name.as_str()).copied().unwrap_or(usize::MAX))
        .map_or(0, |(pos, _)| pos);
    cycle.rotate_left(lowest);
    if let Some(first) = cycle.first().cloned() {
        cycle.push(first);
    }
    cycle
}

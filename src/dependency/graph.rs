use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dependency graph for ordering service startup and shutdown.
///
/// Backed by ordered collections so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeSet<String>,
    /// `edges[A] = [B, C]` means A depends on B and C
    edges: BTreeMap<String, Vec<String>>,
    /// `reverse[A] = [B, C]` means B and C depend on A
    reverse: BTreeMap<String, Vec<String>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph
    pub fn add_node(&mut self, name: String) {
        self.nodes.insert(name.clone());
        self.edges.entry(name.clone()).or_default();
        self.reverse.entry(name).or_default();
    }

    /// Add a dependency edge (`from` depends on `to`)
    pub fn add_edge(&mut self, from: String, to: String) {
        self.add_node(from.clone());
        self.add_node(to.clone());

        let deps = self.edges.entry(from.clone()).or_default();
        if !deps.contains(&to) {
            deps.push(to.clone());
            self.reverse.entry(to).or_default().push(from);
        }
    }

    /// Direct dependencies of a node
    pub fn get_direct_dependencies(&self, node: &str) -> Vec<String> {
        self.edges.get(node).cloned().unwrap_or_default()
    }

    /// Topological sort, dependencies first. Fails on a cycle.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let (order, _) = self.kahn();
        if order.len() != self.nodes.len() {
            return Err(Error::CircularDependency(self.find_cycle()));
        }
        Ok(order)
    }

    /// Dependencies-first order that tolerates cycles.
    ///
    /// Acyclic nodes come out in topological order. Nodes on or behind a cycle
    /// are appended afterwards in name order.
    pub fn startup_order(&self) -> Vec<String> {
        let (mut order, leftover) = self.kahn();
        order.extend(leftover);
        order
    }

    /// Dependents-first order: the reverse of [`startup_order`](Self::startup_order).
    pub fn shutdown_order(&self) -> Vec<String> {
        let mut order = self.startup_order();
        order.reverse();
        order
    }

    /// Kahn's algorithm. Returns the sorted prefix and the nodes it could not place.
    fn kahn(&self) -> (Vec<String>, Vec<String>) {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.edges.get(n).map_or(0, Vec::len)))
            .collect();

        let mut queue: VecDeque<String> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| node.to_string())
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            if let Some(dependents) = self.reverse.get(&node) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(dependent.clone());
                        }
                    }
                }
            }
            result.push(node);
        }

        let placed: BTreeSet<&str> = result.iter().map(String::as_str).collect();
        let leftover = self
            .nodes
            .iter()
            .filter(|n| !placed.contains(n.as_str()))
            .cloned()
            .collect();

        (result, leftover)
    }

    /// Find a cycle in the graph and return it as a path
    fn find_cycle(&self) -> Vec<String> {
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for node in &self.nodes {
            if !visited.contains(node) {
                if let Some(cycle) =
                    self.find_cycle_dfs(node, &mut visited, &mut rec_stack, &mut path)
                {
                    return cycle;
                }
            }
        }

        self.nodes.iter().take(3).cloned().collect()
    }

    fn find_cycle_dfs(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        rec_stack: &mut BTreeSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        rec_stack.insert(node.to_string());
        path.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.find_cycle_dfs(dep, visited, rec_stack, path) {
                        return Some(cycle);
                    }
                } else if rec_stack.contains(dep) {
                    let cycle_start = path.iter().position(|n| n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(node);
        path.pop();
        None
    }

    pub fn nodes(&self) -> &BTreeSet<String> {
        &self.nodes
    }
}

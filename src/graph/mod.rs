//! # ReferenceGraph
//!
//! Builds a dependency graph over every `$ref` string appearing in a
//! document, detects strongly-connected components (cycles), and produces a
//! deterministic topological order over the acyclic portion using Kahn's
//! algorithm with insertion-order tie-breaking.

use crate::reference;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    /// Distinct ref strings, in first-encountered (insertion) order.
    nodes: Vec<String>,
    index_of: HashMap<String, usize>,
    /// ref -> the refs it directly depends on (found in its resolved target).
    edges: HashMap<String, Vec<String>>,
}

impl ReferenceGraph {
    /// Scan `doc` for every `$ref` reachable from it and build the
    /// dependency graph between them.
    pub fn build(doc: &Value) -> Self {
        let all_refs = reference::get_all_references(doc);
        let mut index_of = HashMap::new();
        for (i, r) in all_refs.iter().enumerate() {
            index_of.insert(r.clone(), i);
        }

        let mut edges = HashMap::new();
        let mut frontier = all_refs.clone();
        let mut seen: HashSet<String> = all_refs.iter().cloned().collect();
        let mut nodes = all_refs.clone();

        // Resolve each ref's target and discover any further refs it
        // depends on, growing the node set until it stabilizes (the target
        // of one ref may introduce refs never seen as a top-level scan hit,
        // e.g. a schema only reachable through another ref).
        while let Some(r) = frontier.pop() {
            let deps = resolve_direct_refs(doc, &r);
            for dep in &deps {
                if seen.insert(dep.clone()) {
                    index_of.insert(dep.clone(), nodes.len());
                    nodes.push(dep.clone());
                    frontier.push(dep.clone());
                }
            }
            edges.insert(r, deps);
        }
        for n in &nodes {
            edges.entry(n.clone()).or_default();
        }

        ReferenceGraph { nodes, index_of, edges }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn dependencies_of(&self, r: &str) -> &[String] {
        self.edges.get(r).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Strongly-connected components of size >= 2, plus self-loops, each
    /// returned in Tarjan discovery order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let sccs = self.tarjan_sccs();
        sccs.into_iter()
            .filter(|scc| scc.len() >= 2 || self.has_self_loop(&scc[0]))
            .collect()
    }

    fn has_self_loop(&self, node: &str) -> bool {
        self.edges.get(node).map(|deps| deps.iter().any(|d| d == node)).unwrap_or(false)
    }

    /// Iterative Tarjan's algorithm (explicit call-frame stack, not host
    /// recursion) so a reference chain tens of thousands deep cannot
    /// overflow the stack while computing SCCs.
    fn tarjan_sccs(&self) -> Vec<Vec<String>> {
        let n = self.nodes.len();
        let adj: Vec<Vec<usize>> = self
            .nodes
            .iter()
            .map(|name| {
                self.edges
                    .get(name.as_str())
                    .map(|deps| deps.iter().filter_map(|d| self.index_of.get(d).copied()).collect())
                    .unwrap_or_default()
            })
            .collect();

        let mut index: Vec<Option<usize>> = vec![None; n];
        let mut lowlink: Vec<usize> = vec![0; n];
        let mut on_stack: Vec<bool> = vec![false; n];
        let mut tarjan_stack: Vec<usize> = Vec::new();
        let mut counter = 0;
        let mut sccs: Vec<Vec<usize>> = Vec::new();

        for start in 0..n {
            if index[start].is_some() {
                continue;
            }
            // Each call-stack entry is (node, next child index to visit).
            let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];
            index[start] = Some(counter);
            lowlink[start] = counter;
            counter += 1;
            tarjan_stack.push(start);
            on_stack[start] = true;

            while let Some(&mut (v, ref mut pi)) = call_stack.last_mut() {
                if *pi < adj[v].len() {
                    let w = adj[v][*pi];
                    *pi += 1;
                    if index[w].is_none() {
                        index[w] = Some(counter);
                        lowlink[w] = counter;
                        counter += 1;
                        tarjan_stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(index[w].unwrap());
                    }
                } else {
                    call_stack.pop();
                    if let Some(&(parent, _)) = call_stack.last() {
                        lowlink[parent] = lowlink[parent].min(lowlink[v]);
                    }
                    if lowlink[v] == index[v].unwrap() {
                        let mut scc = Vec::new();
                        loop {
                            let w = tarjan_stack.pop().unwrap();
                            on_stack[w] = false;
                            scc.push(w);
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(scc);
                    }
                }
            }
        }

        sccs.into_iter().map(|scc| scc.into_iter().map(|i| self.nodes[i].clone()).collect()).collect()
    }

    /// Kahn's algorithm over the acyclic condensation (nodes not part of
    /// any cycle). Ties are broken by original insertion order so results
    /// are deterministic run to run.
    pub fn topological_order(&self) -> Vec<String> {
        let cyclic: HashSet<String> = self.cycles().into_iter().flatten().collect();
        let acyclic: Vec<&String> = self.nodes.iter().filter(|n| !cyclic.contains(*n)).collect();
        let acyclic_set: HashSet<&String> = acyclic.iter().copied().collect();

        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for n in &acyclic {
            let deps: Vec<&str> = self
                .edges
                .get(n.as_str())
                .map(|v| v.iter().filter(|d| acyclic_set.contains(d)).map(|s| s.as_str()).collect())
                .unwrap_or_default();
            in_degree.insert(n.as_str(), deps.len());
            for d in deps {
                dependents.entry(d).or_default().push(n.as_str());
            }
        }

        let mut ready: BTreeSet<usize> = BTreeSet::new();
        for n in &acyclic {
            if in_degree[n.as_str()] == 0 {
                ready.insert(self.index_of[n.as_str()]);
            }
        }

        let mut order = Vec::new();
        while let Some(&idx) = ready.iter().next() {
            ready.remove(&idx);
            let name = self.nodes[idx].clone();
            order.push(name.clone());
            if let Some(deps) = dependents.get(name.as_str()) {
                for &dependent in deps {
                    let entry = in_degree.get_mut(dependent).unwrap();
                    *entry -= 1;
                    if *entry == 0 {
                        ready.insert(self.index_of[dependent]);
                    }
                }
            }
        }
        order
    }
}

fn resolve_direct_refs(doc: &Value, r: &str) -> Vec<String> {
    let mut visited = Vec::new();
    match reference::resolve_ref(doc, r, &mut visited) {
        Ok(target) => reference::get_all_references(target),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn acyclic_chain_topo_orders_dependencies_first() {
        let doc = json!({
            "$defs": {
                "A": {"type": "string"},
                "B": {"$ref": "#/$defs/A"},
                "C": {"$ref": "#/$defs/B"}
            }
        });
        let graph = ReferenceGraph::build(&doc);
        assert!(graph.cycles().is_empty());
        let order = graph.topological_order();
        let pos = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(pos("#/$defs/B") < pos("#/$defs/C"));
    }

    #[test]
    fn self_loop_is_reported_as_a_cycle() {
        let doc = json!({"$defs": {"Self": {"$ref": "#/$defs/Self"}}});
        let graph = ReferenceGraph::build(&doc);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].contains(&"#/$defs/Self".to_string()));
    }

    #[test]
    fn mutual_cycle_is_a_single_scc() {
        let doc = json!({
            "$defs": {
                "A": {"$ref": "#/$defs/B"},
                "B": {"$ref": "#/$defs/A"}
            }
        });
        let graph = ReferenceGraph::build(&doc);
        let cycles = graph.cycles();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn topological_order_excludes_cyclic_nodes() {
        let doc = json!({
            "$defs": {
                "Tree": {
                    "type": "object",
                    "properties": {"children": {"type": "array", "items": {"$ref": "#/$defs/Tree"}}}
                },
                "Leaf": {"type": "string"}
            },
            "useLeaf": {"$ref": "#/$defs/Leaf"}
        });
        let graph = ReferenceGraph::build(&doc);
        let order = graph.topological_order();
        assert!(!order.contains(&"#/$defs/Tree".to_string()));
        assert!(order.contains(&"#/$defs/Leaf".to_string()));
    }
}

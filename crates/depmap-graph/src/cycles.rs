//! Strongly-connected components over the relationship graph.
//!
//! Kosaraju's two-pass depth-first search, run independently over the
//! module-import relation and the method-call relation. Adjacency lists are
//! sorted by destination id and the outer loops visit nodes in sorted-id
//! order, so the same graph always yields the same components in the same
//! order. Both DFS passes are iterative; module chains in real trees get
//! deep enough that recursion is not an option.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use depmap_core::{
    CycleEdge, CycleKind, CycleMetrics, CyclicDependency, DependencyKind, Relationship, Severity,
};

/// Average refined strength at or above which a `medium` import cycle is
/// upgraded to `high`.
const STRENGTH_UPGRADE_THRESHOLD: f64 = 3.0;

pub fn detect_cycles(relationships: &[Relationship], kind: CycleKind) -> Vec<CyclicDependency> {
    let relation = match kind {
        CycleKind::Import => DependencyKind::Import,
        CycleKind::Call => DependencyKind::Call,
    };
    let wanted_prefixes: &[&str] = match kind {
        CycleKind::Import => &["mod:"],
        CycleKind::Call => &["meth:", "func:"],
    };
    let is_node = |id: &str| wanted_prefixes.iter().any(|p| id.starts_with(p));

    // Only edges whose both endpoints are bound entities can participate;
    // unresolved textual targets have no outgoing edges and cannot close a
    // cycle.
    let edges: Vec<&Relationship> = relationships
        .iter()
        .filter(|r| r.kind == relation && is_node(&r.from_entity) && is_node(&r.to_entity))
        .collect();
    if edges.is_empty() {
        return Vec::new();
    }

    // Deterministic node numbering: sorted ids.
    let node_ids: Vec<&str> = {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for edge in &edges {
            seen.insert(edge.from_entity.as_str());
            seen.insert(edge.to_entity.as_str());
        }
        seen.into_iter().collect()
    };
    let index_of: BTreeMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    let n = node_ids.len();
    let mut forward: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
    for edge in &edges {
        let from = index_of[edge.from_entity.as_str()];
        let to = index_of[edge.to_entity.as_str()];
        if !forward[from].contains(&to) {
            forward[from].push(to);
            reverse[to].push(from);
        }
    }
    // Node indices follow sorted ids, so sorting the adjacency by index is
    // sorting by destination id.
    for bucket in forward.iter_mut().chain(reverse.iter_mut()) {
        bucket.sort_unstable();
    }

    let finish_order = finish_order(&forward);

    // Second pass over the reversed graph, in reverse finish order.
    let mut component_of: Vec<Option<usize>> = vec![None; n];
    let mut components: Vec<Vec<usize>> = Vec::new();
    for &root in finish_order.iter().rev() {
        if component_of[root].is_some() {
            continue;
        }
        let component_idx = components.len();
        let mut members = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if component_of[node].is_some() {
                continue;
            }
            component_of[node] = Some(component_idx);
            members.push(node);
            for &next in &reverse[node] {
                if component_of[next].is_none() {
                    stack.push(next);
                }
            }
        }
        components.push(members);
    }

    let mut cycles = Vec::new();
    for members in &components {
        let has_self_loop = members.len() == 1 && forward[members[0]].contains(&members[0]);
        if members.len() < 2 && !has_self_loop {
            continue;
        }

        let entities: Vec<String> = members.iter().map(|&i| node_ids[i].to_string()).collect();
        let component_idx = component_of[members[0]].unwrap_or_default();

        // Every intra-component edge closes the cycle; one path entry per
        // distinct (from, to) pair, first sighting carries file and line.
        let mut paths: Vec<CycleEdge> = Vec::new();
        let mut seen_pairs: BTreeMap<(&str, &str), ()> = BTreeMap::new();
        for edge in &edges {
            let from = index_of[edge.from_entity.as_str()];
            let to = index_of[edge.to_entity.as_str()];
            if component_of[from] != Some(component_idx) || component_of[to] != Some(component_idx)
            {
                continue;
            }
            if seen_pairs
                .insert((edge.from_entity.as_str(), edge.to_entity.as_str()), ())
                .is_some()
            {
                continue;
            }
            paths.push(CycleEdge {
                from: edge.from_entity.clone(),
                to: edge.to_entity.clone(),
                kind: edge.kind,
                strength: edge.strength,
                file_path: (!edge.file_path.is_empty()).then(|| edge.file_path.clone()),
                line_number: (edge.line_number > 0).then_some(edge.line_number),
            });
        }
        paths.sort_by(|a, b| (a.from.as_str(), a.to.as_str()).cmp(&(b.from.as_str(), b.to.as_str())));

        let total: f64 = paths.iter().map(|p| p.strength).sum();
        let average = if paths.is_empty() { 1.0 } else { total / paths.len() as f64 };
        let severity = severity_for(kind, entities.len(), average);

        let description = match kind {
            CycleKind::Import => format!(
                "Import cycle involving {} modules with {:.1} average strength",
                entities.len(),
                average
            ),
            CycleKind::Call => {
                format!("Call cycle involving {} entities", entities.len())
            }
        };

        cycles.push(CyclicDependency {
            id: format!("{kind}_cycle_{}", cycles.len()),
            entities,
            metrics: CycleMetrics {
                length: members.len(),
                edge_count: paths.len(),
                average_strength: average,
                total_coupling: total,
            },
            paths,
            kind,
            severity,
            description,
        });
    }

    debug!(kind = %kind, count = cycles.len(), "cycle detection finished");
    cycles
}

/// First DFS pass: post-order finish times over the forward graph.
fn finish_order(forward: &[Vec<usize>]) -> Vec<usize> {
    let n = forward.len();
    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);

    for start in 0..n {
        if visited[start] {
            continue;
        }
        // (node, next neighbour offset) emulates the recursion frame.
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visited[start] = true;
        while let Some(&(node, offset)) = stack.last() {
            if let Some(&next) = forward[node].get(offset) {
                let top = stack.len() - 1;
                stack[top].1 += 1;
                if !visited[next] {
                    visited[next] = true;
                    stack.push((next, 0));
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
    }
    order
}

fn severity_for(kind: CycleKind, length: usize, average_strength: f64) -> Severity {
    let base = match kind {
        CycleKind::Import => {
            if length > 3 {
                Severity::High
            } else {
                Severity::Medium
            }
        }
        CycleKind::Call => {
            if length <= 2 {
                Severity::Low
            } else {
                Severity::Medium
            }
        }
    };
    // Strength-aware upgrade only; never a downgrade, never a new cycle.
    if kind == CycleKind::Import
        && base == Severity::Medium
        && average_strength >= STRENGTH_UPGRADE_THRESHOLD
    {
        Severity::High
    } else {
        base
    }
}

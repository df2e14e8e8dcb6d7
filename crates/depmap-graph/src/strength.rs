//! Import-edge strength refinement.
//!
//! Advisory weighting of module import edges from structural features:
//! degree of the endpoints, shared dotted prefix (same package couples more
//! tightly), and depth difference. The refinement rewrites `strength` on
//! existing edges only — it cannot add or remove an edge, so the cycle set
//! is unaffected; severity may be upgraded downstream when the average
//! strength of a cycle is high.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use depmap_core::{DependencyKind, ModuleInfo, Relationship};

/// Upper bound on refined strength.
const MAX_STRENGTH: f64 = 5.0;

pub(crate) fn refine_import_strengths(
    relationships: &mut [Relationship],
    modules: &[ModuleInfo],
) {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for module in modules {
        let idx = graph.add_node(module.id.as_str());
        nodes.insert(module.id.as_str(), idx);
    }
    for rel in relationships.iter() {
        if rel.kind != DependencyKind::Import {
            continue;
        }
        if let (Some(&from), Some(&to)) = (
            nodes.get(rel.from_entity.as_str()),
            nodes.get(rel.to_entity.as_str()),
        ) {
            graph.add_edge(from, to, ());
        }
    }

    let names: HashMap<&str, &str> = modules
        .iter()
        .map(|m| (m.id.as_str(), m.name.as_str()))
        .collect();

    for rel in relationships.iter_mut() {
        if rel.kind != DependencyKind::Import {
            continue;
        }
        let (Some(&from), Some(&to)) = (
            nodes.get(rel.from_entity.as_str()),
            nodes.get(rel.to_entity.as_str()),
        ) else {
            continue;
        };
        let (Some(from_name), Some(to_name)) = (
            names.get(rel.from_entity.as_str()),
            names.get(rel.to_entity.as_str()),
        ) else {
            continue;
        };

        let in_degree = graph.neighbors_directed(from, Direction::Incoming).count();
        let out_degree = graph.neighbors_directed(to, Direction::Outgoing).count();

        let mut strength = 1.0_f64;
        if in_degree > 0 {
            strength *= 1.0 + 1.0 / in_degree as f64;
        }
        if out_degree > 0 {
            strength *= 1.0 + 0.1 * out_degree as f64;
        }

        let shared = shared_prefix_len(from_name, to_name);
        if shared > 0 {
            strength *= 1.0 + 0.5 * shared as f64;
        }

        let from_depth = from_name.split('.').count();
        let to_depth = to_name.split('.').count();
        match from_depth.abs_diff(to_depth) {
            0 => strength *= 1.2,
            1 => strength *= 1.1,
            _ => {}
        }

        rel.strength = strength.min(MAX_STRENGTH);
    }
}

fn shared_prefix_len(a: &str, b: &str) -> usize {
    a.split('.')
        .zip(b.split('.'))
        .take_while(|(x, y)| x == y)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use depmap_core::ids;

    fn module(name: &str) -> ModuleInfo {
        ModuleInfo::descriptor(ids::module_id(name), name.to_string(), format!("{name}.py"))
    }

    fn import_edge(from: &str, to: &str) -> Relationship {
        Relationship {
            id: ids::relationship_id(from, to, DependencyKind::Import),
            from_entity: from.to_string(),
            to_entity: to.to_string(),
            kind: DependencyKind::Import,
            line_number: 1,
            file_path: String::new(),
            strength: 1.0,
        }
    }

    #[test]
    fn test_unresolved_edges_keep_base_strength() {
        let modules = vec![module("a")];
        let mut rels = vec![import_edge("mod:a", "os")];
        refine_import_strengths(&mut rels, &modules);
        assert_eq!(rels[0].strength, 1.0);
    }

    #[test]
    fn test_two_node_cycle_strength() {
        let modules = vec![module("a"), module("b")];
        let mut rels = vec![import_edge("mod:a", "mod:b"), import_edge("mod:b", "mod:a")];
        refine_import_strengths(&mut rels, &modules);
        // in-degree 1 doubles, out-degree 1 adds 10 %, equal depth adds 20 %.
        for rel in &rels {
            assert!((rel.strength - 2.64).abs() < 1e-9, "strength {}", rel.strength);
        }
    }

    #[test]
    fn test_shared_package_prefix_raises_strength_to_cap() {
        let modules = vec![module("pkg.deep.a"), module("pkg.deep.b")];
        let mut rels = vec![
            import_edge("mod:pkg.deep.a", "mod:pkg.deep.b"),
            import_edge("mod:pkg.deep.b", "mod:pkg.deep.a"),
        ];
        refine_import_strengths(&mut rels, &modules);
        // 2.0 × 1.1 × (1 + 0.5·2) × 1.2 = 5.28, capped.
        for rel in &rels {
            assert_eq!(rel.strength, MAX_STRENGTH);
        }
    }

    #[test]
    fn test_non_import_edges_untouched() {
        let modules = vec![module("a"), module("b")];
        let mut rels = vec![Relationship {
            kind: DependencyKind::Call,
            ..import_edge("mod:a", "mod:b")
        }];
        refine_import_strengths(&mut rels, &modules);
        assert_eq!(rels[0].strength, 1.0);
    }
}

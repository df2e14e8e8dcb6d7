//! Aggregate metrics over the integrated graph.

use std::collections::BTreeMap;

use depmap_core::{
    AnalysisMetrics, CouplingMetrics, CyclicDependency, DependencyGraph, EntityCounts,
    Relationship,
};

/// Entity counts are always reported; the complexity and coupling maps are
/// filled only when quality metrics are enabled.
pub fn compute_metrics(
    graph: &DependencyGraph,
    relationships: &[Relationship],
    cycles: &[CyclicDependency],
    quality_metrics: bool,
) -> AnalysisMetrics {
    let entity_counts = EntityCounts {
        packages: graph.packages.len(),
        modules: graph.modules.len(),
        classes: graph.classes.len(),
        methods: graph.methods.len(),
        fields: graph.fields.len(),
        relationships: relationships.len(),
        cycles: cycles.len(),
    };

    let mut metrics = AnalysisMetrics {
        entity_counts,
        complexity: BTreeMap::new(),
        coupling: BTreeMap::new(),
    };
    if !quality_metrics {
        return metrics;
    }

    for method in &graph.methods {
        metrics.complexity.insert(method.id.clone(), method.complexity);
    }

    let (afferent, efferent) = coupling_counts(graph, relationships);

    let entities: std::collections::BTreeSet<&str> = afferent
        .keys()
        .chain(efferent.keys())
        .copied()
        .collect();
    for entity in entities {
        let ca = afferent.get(entity).copied().unwrap_or(0);
        let ce = efferent.get(entity).copied().unwrap_or(0);
        let instability = if ca + ce > 0 {
            ce as f64 / (ca + ce) as f64
        } else {
            0.0
        };
        metrics.coupling.insert(
            entity.to_string(),
            CouplingMetrics {
                afferent_coupling: ca,
                efferent_coupling: ce,
                instability,
            },
        );
    }

    metrics
}

/// Per-entity incoming/outgoing edge counts. Coupling is counted over bound
/// endpoints only; unresolved textual targets are not entities.
pub(crate) fn coupling_counts<'a>(
    graph: &DependencyGraph,
    relationships: &'a [Relationship],
) -> (BTreeMap<&'a str, usize>, BTreeMap<&'a str, usize>) {
    let mut afferent: BTreeMap<&str, usize> = BTreeMap::new();
    let mut efferent: BTreeMap<&str, usize> = BTreeMap::new();
    for rel in relationships {
        if graph.contains_entity(&rel.from_entity) {
            *efferent.entry(rel.from_entity.as_str()).or_default() += 1;
        }
        if graph.contains_entity(&rel.to_entity) {
            *afferent.entry(rel.to_entity.as_str()).or_default() += 1;
        }
    }
    (afferent, efferent)
}

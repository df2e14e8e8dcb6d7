//! Per-entity quality records: complexity, coupling, cohesion,
//! maintainability and a letter grade, reported for every module and class
//! when quality metrics are enabled.
//!
//! The maintainability index is the simplified form
//! `max(0, 171 − 0.23·CC − 16.2·ln(LOC))`; technical debt is
//! `min(1, CC/10 + Ce/20)`. Cohesion is derived from which fields each
//! method actually reads (the resolved `self.attr` access edges), not from
//! a textual scan of the body.

use std::collections::{BTreeMap, BTreeSet};

use depmap_core::{
    ClassInfo, CohesionMetrics, DependencyGraph, DependencyKind, EntityKind, MethodInfo,
    QualityGrade, QualityMetrics, Relationship,
};

use crate::metrics::coupling_counts;

pub fn compute_quality_metrics(
    graph: &DependencyGraph,
    relationships: &[Relationship],
) -> Vec<QualityMetrics> {
    let (afferent, efferent) = coupling_counts(graph, relationships);
    let coupling = |id: &str| {
        let ca = afferent.get(id).copied().unwrap_or(0);
        let ce = efferent.get(id).copied().unwrap_or(0);
        let instability = if ca + ce > 0 {
            ce as f64 / (ca + ce) as f64
        } else {
            0.0
        };
        (ca, ce, instability)
    };

    // Field ids read per method, from the resolved attribute-access edges.
    let mut reads: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for rel in relationships {
        if rel.kind == DependencyKind::AttributeAccess && rel.to_entity.starts_with("field:") {
            reads
                .entry(rel.from_entity.as_str())
                .or_default()
                .insert(rel.to_entity.as_str());
        }
    }

    let mut records = Vec::new();

    for module in &graph.modules {
        let methods: Vec<&MethodInfo> = graph
            .methods
            .iter()
            .filter(|m| m.file_path == module.file_path && !module.file_path.is_empty())
            .collect();
        let (cyclomatic, cognitive, nesting) = method_averages(&methods);
        let (ca, ce, instability) = coupling(&module.id);

        let module_classes: Vec<&ClassInfo> = graph
            .classes
            .iter()
            .filter(|c| c.module_id == module.id)
            .collect();
        let abstractness = if module_classes.is_empty() {
            0.0
        } else {
            module_classes.iter().filter(|c| c.is_abstract).count() as f64
                / module_classes.len() as f64
        };

        let maintainability_index = maintainability(cyclomatic, module.loc);
        let technical_debt_ratio = technical_debt(cyclomatic, ce);
        records.push(QualityMetrics {
            entity_id: module.id.clone(),
            entity_type: EntityKind::Module,
            cyclomatic_complexity: cyclomatic.round() as u32,
            cognitive_complexity: cognitive.round() as u32,
            nesting_depth: nesting,
            lines_of_code: module.loc,
            afferent_coupling: ca,
            efferent_coupling: ce,
            instability,
            abstractness,
            distance: (abstractness + instability - 1.0).abs(),
            cohesion: None,
            maintainability_index,
            technical_debt_ratio,
            quality_grade: grade(
                cyclomatic,
                maintainability_index,
                instability,
                technical_debt_ratio,
            ),
        });
    }

    for class in &graph.classes {
        let methods: Vec<&MethodInfo> = graph
            .methods
            .iter()
            .filter(|m| m.class_id.as_deref() == Some(class.id.as_str()))
            .collect();
        let (cyclomatic, cognitive, nesting) = method_averages(&methods);
        let (ca, ce, instability) = coupling(&class.id);
        let lines_of_code: usize = methods.iter().map(|m| m.lines_of_code).sum();
        let abstractness = if class.is_abstract { 1.0 } else { 0.0 };

        let maintainability_index = maintainability(cyclomatic, lines_of_code);
        let technical_debt_ratio = technical_debt(cyclomatic, ce);
        records.push(QualityMetrics {
            entity_id: class.id.clone(),
            entity_type: EntityKind::Class,
            cyclomatic_complexity: cyclomatic.round() as u32,
            cognitive_complexity: cognitive.round() as u32,
            nesting_depth: nesting,
            lines_of_code,
            afferent_coupling: ca,
            efferent_coupling: ce,
            instability,
            abstractness,
            distance: (abstractness + instability - 1.0).abs(),
            cohesion: Some(cohesion_of(class, &methods, &reads)),
            maintainability_index,
            technical_debt_ratio,
            quality_grade: grade(
                cyclomatic,
                maintainability_index,
                instability,
                technical_debt_ratio,
            ),
        });
    }

    records
}

/// Average cyclomatic/cognitive complexity and deepest nesting over a
/// method set; an entity with no methods scores the base complexity of 1.
fn method_averages(methods: &[&MethodInfo]) -> (f64, f64, usize) {
    if methods.is_empty() {
        return (1.0, 0.0, 0);
    }
    let count = methods.len() as f64;
    let cyclomatic = methods.iter().map(|m| m.complexity as f64).sum::<f64>() / count;
    let cognitive = methods
        .iter()
        .map(|m| m.cognitive_complexity as f64)
        .sum::<f64>()
        / count;
    let nesting = methods.iter().map(|m| m.nesting_depth).max().unwrap_or(0);
    (cyclomatic, cognitive, nesting)
}

fn maintainability(cyclomatic: f64, lines_of_code: usize) -> f64 {
    (171.0 - 0.23 * cyclomatic - 16.2 * (lines_of_code.max(1) as f64).ln()).max(0.0)
}

fn technical_debt(cyclomatic: f64, efferent_coupling: usize) -> f64 {
    (cyclomatic / 10.0 + efferent_coupling as f64 / 20.0).min(1.0)
}

fn cohesion_of(
    class: &ClassInfo,
    methods: &[&MethodInfo],
    reads: &BTreeMap<&str, BTreeSet<&str>>,
) -> CohesionMetrics {
    let field_count = class.fields.len();
    let method_count = methods.len();
    if method_count < 2 || field_count == 0 {
        return CohesionMetrics::default();
    }

    let no_reads = BTreeSet::new();
    let usage: Vec<&BTreeSet<&str>> = methods
        .iter()
        .map(|m| reads.get(m.id.as_str()).unwrap_or(&no_reads))
        .collect();

    let mut sharing_pairs = 0usize;
    let mut non_sharing_pairs = 0usize;
    for i in 0..usage.len() {
        for j in (i + 1)..usage.len() {
            if usage[i].intersection(usage[j]).next().is_some() {
                sharing_pairs += 1;
            } else {
                non_sharing_pairs += 1;
            }
        }
    }

    let lcom1 = non_sharing_pairs;
    let lcom2 = non_sharing_pairs.saturating_sub(sharing_pairs);

    // Henderson-Sellers: (m − Σ|methods(f)|/f) / (m − 1).
    let per_field_readers: f64 = class
        .fields
        .iter()
        .map(|field_id| {
            usage
                .iter()
                .filter(|fields| fields.contains(field_id.as_str()))
                .count() as f64
        })
        .sum();
    let m = method_count as f64;
    let lcom3 = (m - per_field_readers / field_count as f64) / (m - 1.0);

    let total_pairs = method_count * (method_count - 1) / 2;
    let tcc = total_pairs.saturating_sub(lcom2) as f64 / total_pairs as f64;

    CohesionMetrics {
        lcom1,
        lcom2,
        lcom3,
        tcc,
    }
}

/// Scoring table: complexity, maintainability, instability and debt each
/// contribute a band of points; the sum maps onto a letter.
fn grade(cyclomatic: f64, maintainability: f64, instability: f64, debt: f64) -> QualityGrade {
    let mut score = 0u32;

    if cyclomatic <= 10.0 {
        score += 30;
    } else if cyclomatic <= 20.0 {
        score += 20;
    } else if cyclomatic <= 50.0 {
        score += 10;
    }

    if maintainability >= 85.0 {
        score += 30;
    } else if maintainability >= 65.0 {
        score += 20;
    } else if maintainability >= 40.0 {
        score += 10;
    }

    if instability <= 0.3 {
        score += 20;
    } else if instability <= 0.7 {
        score += 15;
    } else {
        score += 10;
    }

    if debt <= 0.1 {
        score += 20;
    } else if debt <= 0.3 {
        score += 10;
    } else if debt <= 0.5 {
        score += 5;
    }

    match score {
        85.. => QualityGrade::A,
        70.. => QualityGrade::B,
        55.. => QualityGrade::C,
        40.. => QualityGrade::D,
        _ => QualityGrade::F,
    }
}

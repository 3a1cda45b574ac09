//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Topological risk scoring of distribution equipment."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
//! Risk is the mean of two normalised criticality measures: the share of total system
//! load flowing through a node, and the share of the graph's largest downstream
//! distribution fan-out that sits below it. Terminal loads never count toward fan-out.

use crate::model::EquipmentGraph;

/// Score a single node. `None` when the node is unknown.
pub fn score_node(graph: &EquipmentGraph, id: &str) -> Option<f64> {
    let node = graph.node(id)?;
    let descendants = graph.distribution_descendant_count(id)?;
    Some(combine(
        node.propagated_power,
        graph.total_system_load(),
        descendants,
        graph.max_distribution_descendants(),
    ))
}

/// Scores for every node, aligned with [`EquipmentGraph::nodes`].
pub fn score_all(graph: &EquipmentGraph) -> Vec<f64> {
    let total_load = graph.total_system_load();
    let max_descendants = graph.max_distribution_descendants();
    graph
        .nodes()
        .zip(graph.distribution_descendant_counts())
        .map(|(node, &descendants)| {
            combine(node.propagated_power, total_load, descendants, max_descendants)
        })
        .collect()
}

/// Write fresh scores into every node.
pub fn apply_risk_scores(graph: &mut EquipmentGraph) {
    let scores = score_all(graph);
    for (node, score) in graph.nodes_mut().zip(scores) {
        node.risk_score = score;
    }
}

fn combine(power: f64, total_load: f64, descendants: usize, max_descendants: usize) -> f64 {
    let norm_power = if total_load > 0.0 {
        power / total_load
    } else {
        0.0
    };
    let norm_descendants = if max_descendants == 0 {
        0.0
    } else {
        descendants as f64 / max_descendants as f64
    };
    ((norm_power + norm_descendants) / 2.0).clamp(0.0, 1.0)
}

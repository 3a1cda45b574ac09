//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "module"
//! twin_type: "source"
//! twin_scope: "code"
//! twin_description: "Equipment graph and per-node maintenance state."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDate;
use indexmap::IndexMap;
use mep_twin_common::{EquipmentType, ModelConfig};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// Risk level derived from remaining useful life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node as delivered by the graph generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    #[serde(default)]
    pub installation_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_lifespan: Option<f64>,
    #[serde(default)]
    pub replacement_cost: Option<f64>,
    #[serde(default)]
    pub current_condition: Option<f64>,
    #[serde(default)]
    pub propagated_power: Option<f64>,
    /// Cumulative runtime hours at the start of the simulation.
    #[serde(default)]
    pub operating_hours: Option<f64>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, equipment_type: EquipmentType, installed: NaiveDate) -> Self {
        Self {
            id: id.into(),
            equipment_type,
            installation_date: Some(installed),
            expected_lifespan: None,
            replacement_cost: None,
            current_condition: None,
            propagated_power: None,
            operating_hours: None,
        }
    }
}

/// Directed feeder relationship, upstream to downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    pub to: String,
}

impl EdgeSpec {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Serialized form of the distribution graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// Equipment node with the derived state the engine maintains month by month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub installation_date: NaiveDate,
    /// Years; zero for ignored types that have no lifespan.
    pub expected_lifespan: f64,
    pub replacement_cost: f64,
    pub current_condition: f64,
    pub propagated_power: f64,
    pub operating_hours: f64,
    /// Date at which `operating_hours` was last observed. Hours accrue continuously after it.
    pub operating_hours_as_of: Option<NaiveDate>,
    pub risk_score: f64,
    pub risk_level: Option<RiskLevel>,
    pub rul_days: Option<f64>,
    pub rul_years: Option<f64>,
    pub failure_probability: Option<f64>,
    /// Tasks on this node left deferred by the latest scheduling pass.
    pub deferred_task_count: u32,
    /// Subset of the deferred tasks overdue by more than one frequency window.
    pub overdue_task_count: u32,
    pub flagged_for_replacement: bool,
    pub last_maintenance_date: Option<NaiveDate>,
}

impl EquipmentNode {
    fn from_spec(spec: NodeSpec, config: &ModelConfig) -> Result<Self> {
        let NodeSpec {
            id,
            equipment_type,
            installation_date,
            expected_lifespan,
            replacement_cost,
            current_condition,
            propagated_power,
            operating_hours,
        } = spec;

        let installation_date = installation_date.ok_or_else(|| EngineError::InvalidAttribute {
            node: id.clone(),
            attribute: "installation_date",
            reason: "missing".into(),
        })?;

        let expected_lifespan = expected_lifespan.or_else(|| config.lifespan_for(&equipment_type));
        let expected_lifespan = match expected_lifespan {
            Some(years) => {
                ensure_positive(&id, "expected_lifespan", years)?;
                years
            }
            None if config.is_ignored(&equipment_type) => 0.0,
            None => {
                return Err(EngineError::UnknownEquipmentType {
                    node: id,
                    equipment_type,
                })
            }
        };

        let current_condition = current_condition.unwrap_or(config.default_initial_condition);
        if !(0.0..=1.0).contains(&current_condition) {
            return Err(EngineError::InvalidAttribute {
                node: id,
                attribute: "current_condition",
                reason: format!("{current_condition} is outside [0, 1]"),
            });
        }

        let propagated_power = propagated_power.unwrap_or(0.0);
        ensure_non_negative(&id, "propagated_power", propagated_power)?;
        let replacement_cost = replacement_cost.unwrap_or(0.0);
        ensure_non_negative(&id, "replacement_cost", replacement_cost)?;
        let operating_hours = operating_hours.unwrap_or(0.0);
        ensure_non_negative(&id, "operating_hours", operating_hours)?;

        Ok(Self {
            id,
            equipment_type,
            installation_date,
            expected_lifespan,
            replacement_cost,
            current_condition,
            propagated_power,
            operating_hours,
            operating_hours_as_of: None,
            risk_score: 0.0,
            risk_level: None,
            rul_days: None,
            rul_years: None,
            failure_probability: None,
            deferred_task_count: 0,
            overdue_task_count: 0,
            flagged_for_replacement: false,
            last_maintenance_date: None,
        })
    }
}

fn ensure_non_negative(node: &str, attribute: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidAttribute {
            node: node.to_owned(),
            attribute,
            reason: format!("{value} must be a finite value >= 0"),
        })
    }
}

fn ensure_positive(node: &str, attribute: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidAttribute {
            node: node.to_owned(),
            attribute,
            reason: format!("{value} must be a finite value > 0"),
        })
    }
}

/// Point-in-time copy of the graph stored in monthly records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<EquipmentNode>,
    pub edges: Vec<EdgeSpec>,
}

impl GraphSnapshot {
    pub fn node(&self, id: &str) -> Option<&EquipmentNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Index-based distribution hierarchy.
///
/// Topology is fixed at construction. Filtered descendant counts are computed once, in
/// reverse topological order, and reused by every risk pass. Cloning produces an
/// independent deep copy.
#[derive(Debug, Clone)]
pub struct EquipmentGraph {
    graph: DiGraph<EquipmentNode, ()>,
    index: IndexMap<String, NodeIndex>,
    distribution_descendants: Vec<usize>,
}

impl EquipmentGraph {
    pub fn from_spec(spec: GraphSpec, config: &ModelConfig) -> Result<Self> {
        let mut graph = DiGraph::with_capacity(spec.nodes.len(), spec.edges.len());
        let mut index = IndexMap::with_capacity(spec.nodes.len());

        for node_spec in spec.nodes {
            if index.contains_key(&node_spec.id) {
                return Err(EngineError::DuplicateNode(node_spec.id));
            }
            let node = EquipmentNode::from_spec(node_spec, config)?;
            let id = node.id.clone();
            let idx = graph.add_node(node);
            index.insert(id, idx);
        }

        for edge in spec.edges {
            let from = lookup(&index, &edge, &edge.from)?;
            let to = lookup(&index, &edge, &edge.to)?;
            graph.add_edge(from, to, ());
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| EngineError::CyclicTopology(graph[cycle.node_id()].id.clone()))?;
        let distribution_descendants = count_distribution_descendants(&graph, &order);

        Ok(Self {
            graph,
            index,
            distribution_descendants,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&EquipmentNode> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut EquipmentNode> {
        let idx = *self.index.get(id)?;
        Some(&mut self.graph[idx])
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &EquipmentNode> {
        self.graph.node_weights()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut EquipmentNode> {
        self.graph.node_weights_mut()
    }

    pub fn children(&self, id: &str) -> Vec<&EquipmentNode> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut children: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .collect();
        children.sort();
        children.into_iter().map(|child| &self.graph[child]).collect()
    }

    /// Downstream distribution equipment (end loads excluded) of a node.
    pub fn distribution_descendant_count(&self, id: &str) -> Option<usize> {
        self.index
            .get(id)
            .map(|idx| self.distribution_descendants[idx.index()])
    }

    /// Filtered descendant counts aligned with [`EquipmentGraph::nodes`].
    pub fn distribution_descendant_counts(&self) -> &[usize] {
        &self.distribution_descendants
    }

    pub fn max_distribution_descendants(&self) -> usize {
        self.distribution_descendants.iter().copied().max().unwrap_or(0)
    }

    pub fn total_system_load(&self) -> f64 {
        self.graph.node_weights().map(|node| node.propagated_power).sum()
    }

    pub fn edges(&self) -> Vec<EdgeSpec> {
        self.graph
            .edge_references()
            .map(|edge| {
                EdgeSpec::new(
                    self.graph[edge.source()].id.clone(),
                    self.graph[edge.target()].id.clone(),
                )
            })
            .collect()
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.graph.node_weights().cloned().collect(),
            edges: self.edges(),
        }
    }
}

fn lookup(index: &IndexMap<String, NodeIndex>, edge: &EdgeSpec, id: &str) -> Result<NodeIndex> {
    index
        .get(id)
        .copied()
        .ok_or_else(|| EngineError::DanglingEdge {
            from: edge.from.clone(),
            to: edge.to.clone(),
            missing: id.to_owned(),
        })
}

fn count_distribution_descendants(
    graph: &DiGraph<EquipmentNode, ()>,
    order: &[NodeIndex],
) -> Vec<usize> {
    // Sets rather than sums so that shared downstream nodes in a DAG are counted once.
    let mut reach: Vec<HashSet<NodeIndex>> = vec![HashSet::new(); graph.node_count()];
    for &node in order.iter().rev() {
        let mut below = HashSet::new();
        for child in graph.neighbors_directed(node, Direction::Outgoing) {
            if !graph[child].equipment_type.is_end_load() {
                below.insert(child);
            }
            below.extend(reach[child.index()].iter().copied());
        }
        reach[node.index()] = below;
    }
    reach.iter().map(HashSet::len).collect()
}

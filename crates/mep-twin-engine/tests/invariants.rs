//! ---
//! twin_section: "08-maintenance-models"
//! twin_subsection: "tests"
//! twin_type: "source"
//! twin_scope: "test"
//! twin_description: "Budget, condition and determinism properties over long runs."
//! twin_version: "v0.0.0-prealpha"
//! twin_owner: "tbd"
//! ---
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use mep_twin_common::{AppConfig, EquipmentType};
use mep_twin_engine::{
    EdgeSpec, EquipmentGraph, GraphSpec, InterventionKind, MaintenanceTemplate, NodeSpec,
    RepairTemplate, SimulationOutcome, SimulationRun, TaskStatus,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Switchboard feeding two panels, each feeding two panelboards with one load apiece.
fn building() -> GraphSpec {
    let mut nodes = vec![
        NodeSpec::new("SWB-1", EquipmentType::Switchboard, date(1998, 4, 1)),
        NodeSpec::new("PNL-A", EquipmentType::Panel, date(2004, 9, 1)),
        NodeSpec::new("PNL-B", EquipmentType::Panel, date(2012, 2, 1)),
    ];
    let mut edges = vec![EdgeSpec::new("SWB-1", "PNL-A"), EdgeSpec::new("SWB-1", "PNL-B")];
    for (panel, suffix, installed) in [
        ("PNL-A", "A1", date(2006, 1, 1)),
        ("PNL-A", "A2", date(2009, 5, 1)),
        ("PNL-B", "B1", date(2014, 8, 1)),
        ("PNL-B", "B2", date(2019, 3, 1)),
    ] {
        let board = format!("PB-{suffix}");
        let load = format!("L-{suffix}");
        nodes.push(NodeSpec::new(&board, EquipmentType::Panelboard, installed));
        nodes.push(NodeSpec::new(&load, EquipmentType::EndLoad, installed));
        edges.push(EdgeSpec::new(panel, &board));
        edges.push(EdgeSpec::new(&board, &load));
    }
    for (idx, node) in nodes.iter_mut().enumerate() {
        node.propagated_power = Some(50.0 + 25.0 * idx as f64);
        node.operating_hours = Some(8_766.0 * (idx % 4) as f64 * 3.0);
    }
    nodes[3].current_condition = Some(0.35);
    nodes[5].current_condition = Some(0.15);
    GraphSpec { nodes, edges }
}

fn maintenance() -> Vec<MaintenanceTemplate> {
    let template = |task_id: &str, equipment_type, frequency, priority, hours, money| {
        MaintenanceTemplate {
            task_id: task_id.to_owned(),
            equipment_type,
            task_type: "Preventive".to_owned(),
            recommended_frequency_months: frequency,
            default_priority: priority,
            time_cost: hours,
            money_cost: money,
            description: None,
            notes: None,
        }
    };
    vec![
        template("SWB-IR-", EquipmentType::Switchboard, 6, 1, 4.0, 800.0),
        template("SWB-TQ-", EquipmentType::Switchboard, 12, 2, 6.0, 1_200.0),
        template("PNL-IR-", EquipmentType::Panel, 12, 2, 2.0, 350.0),
        template("PB-VIS-", EquipmentType::Panelboard, 3, 3, 1.0, 120.0),
        template("PB-TQ-", EquipmentType::Panelboard, 24, 2, 3.0, 450.0),
    ]
}

fn repairs() -> Vec<RepairTemplate> {
    let template = |task_id: &str, name: &str, level, amount, kind| RepairTemplate {
        task_id: task_id.to_owned(),
        equipment_type: EquipmentType::Panelboard,
        task_name: name.to_owned(),
        time_cost: 10.0,
        money_cost: 2_500.0,
        condition_level: level,
        condition_improvement_amount: amount,
        base_expected_lifespan_improvement_percentage: 10.0,
        priority: Some(1),
        kind,
        description: None,
        notes: None,
    };
    vec![
        template("PB-FIX-", "Breaker rework", 0.5, 0.3, Some(InterventionKind::Repair)),
        template("PB-RPL-", "Swap panelboard", 0.2, 1.0, Some(InterventionKind::Replacement)),
    ]
}

fn config(seed: u64) -> Arc<AppConfig> {
    let mut config = AppConfig::default();
    config.simulation.start_date = date(2025, 1, 1);
    config.simulation.months_to_schedule = 36;
    config.simulation.random_seed = seed;
    config.budget.time_budget = 12.0;
    config.budget.money_budget = 3_000.0;
    config.budget.max_rollover_money = Some(4_000.0);
    Arc::new(config)
}

fn run(seed: u64) -> SimulationOutcome {
    SimulationRun::from_spec(building(), maintenance(), repairs(), config(seed))
        .unwrap()
        .run()
}

#[test]
fn monthly_spend_stays_within_budget() {
    let outcome = run(1);
    assert_eq!(outcome.len(), 36);
    for record in outcome.records() {
        let hours: f64 = record.all_executed().map(|task| task.time_cost).sum();
        let money: f64 = record.all_executed().map(|task| task.money_cost).sum();
        assert!(hours <= record.time_budget + 1e-9, "{} hours {hours}", record.month);
        assert!(money <= record.money_budget + 1e-9, "{} money {money}", record.month);
        assert!(record.rollover_money_budget <= 4_000.0);
    }
}

#[test]
fn node_state_stays_in_bounds() {
    let config = config(2);
    let outcome = run(2);
    for record in outcome.records() {
        for node in &record.graph.nodes {
            assert!((0.0..=1.0).contains(&node.current_condition), "{} {}", record.month, node.id);
            if let Some(rul) = node.rul_years {
                let floor = config.model.min_rul_ratio * node.expected_lifespan;
                assert!(rul >= floor - 1e-12, "{} {} rul {rul} < {floor}", record.month, node.id);
            }
            assert!(node.overdue_task_count <= node.deferred_task_count);
        }
    }
}

#[test]
fn every_candidate_is_executed_or_deferred() {
    let outcome = run(3);
    for record in outcome.records() {
        let partitioned = record.executed_tasks.len()
            + record.deferred_tasks.len()
            + record.replacement_tasks_executed.len()
            + record.replacement_tasks_not_executed.len();
        assert_eq!(partitioned, record.tasks_scheduled.len());
        for task in &record.tasks_scheduled {
            assert!(matches!(task.status, TaskStatus::Executed | TaskStatus::Deferred));
        }
        let mut ids: Vec<&str> = record
            .tasks_scheduled
            .iter()
            .map(|task| task.id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), record.tasks_scheduled.len(), "{} has duplicates", record.month);
    }
}

#[test]
fn failing_panelboard_is_replaced_not_repaired() {
    let outcome = run(4);
    let january = outcome.month("2025-01").unwrap();
    let for_a2: Vec<&str> = january
        .tasks_scheduled
        .iter()
        .filter(|task| task.equipment_id == "PB-A2" && task.is_replacement)
        .map(|task| task.id.as_str())
        .collect();
    assert_eq!(for_a2, ["PB-RPL-PB-A2"]);
    let for_a1: Vec<&str> = january
        .tasks_scheduled
        .iter()
        .filter(|task| task.equipment_id == "PB-A1" && task.is_replacement)
        .map(|task| task.id.as_str())
        .collect();
    assert_eq!(for_a1, ["PB-FIX-PB-A1"]);
}

#[test]
fn identical_inputs_produce_identical_records() {
    assert_eq!(run(0xA11CE), run(0xA11CE));
}

#[test]
fn parallel_runs_on_copies_match_sequential_runs() {
    let config = config(9);
    let graph = EquipmentGraph::from_spec(building(), &config.model).unwrap();
    let sequential =
        SimulationRun::new(graph.clone(), maintenance(), repairs(), Arc::clone(&config))
            .unwrap()
            .run();

    let outcomes: Vec<SimulationOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let graph = graph.clone();
                let config = Arc::clone(&config);
                scope.spawn(move || {
                    SimulationRun::new(graph, maintenance(), repairs(), config)
                        .unwrap()
                        .run()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });
    for outcome in outcomes {
        assert_eq!(outcome, sequential);
    }
    // The source graph is never touched by a run.
    assert_eq!(graph.node("PB-A2").unwrap().current_condition, 0.15);
}

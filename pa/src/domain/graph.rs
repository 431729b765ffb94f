//! Step dependency graph checks
//!
//! Dependencies point from a step to the steps that must precede it.

use std::collections::{HashMap, HashSet};

use super::plan::{PlanStep, StepId};

/// Validate that the step dependency graph is a DAG
///
/// On failure returns the cycle as a path of step ids whose first and last
/// elements are the same step (a self-dependency yields `[id, id]`).
pub fn validate_dependency_graph(steps: &[PlanStep]) -> Result<(), Vec<StepId>> {
    let graph: HashMap<StepId, &PlanStep> = steps.iter().map(|s| (s.id, s)).collect();

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut cycle_path = Vec::new();

    for step in steps {
        if !visited.contains(&step.id) && has_cycle_dfs(step.id, &graph, &mut visited, &mut rec_stack, &mut cycle_path)
        {
            // Drop the walk that led into the cycle
            if let Some(&closing) = cycle_path.last()
                && let Some(start) = cycle_path.iter().position(|&id| id == closing)
            {
                cycle_path.drain(..start);
            }
            return Err(cycle_path);
        }
    }

    Ok(())
}

/// DFS helper for cycle detection
fn has_cycle_dfs(
    node: StepId,
    graph: &HashMap<StepId, &PlanStep>,
    visited: &mut HashSet<StepId>,
    rec_stack: &mut HashSet<StepId>,
    cycle_path: &mut Vec<StepId>,
) -> bool {
    visited.insert(node);
    rec_stack.insert(node);
    cycle_path.push(node);

    if let Some(step) = graph.get(&node) {
        for &dep in &step.depends_on {
            if !visited.contains(&dep) {
                if graph.contains_key(&dep) && has_cycle_dfs(dep, graph, visited, rec_stack, cycle_path) {
                    return true;
                }
            } else if rec_stack.contains(&dep) {
                cycle_path.push(dep);
                return true;
            }
        }
    }

    rec_stack.remove(&node);
    cycle_path.pop();
    false
}

/// Order steps so every step comes after its dependencies
///
/// Ties keep plan order. Fails with the cycle path if the graph is cyclic.
pub fn topological_order(steps: &[PlanStep]) -> Result<Vec<StepId>, Vec<StepId>> {
    validate_dependency_graph(steps)?;

    let graph: HashMap<StepId, &PlanStep> = steps.iter().map(|s| (s.id, s)).collect();
    let mut visited = HashSet::new();
    let mut result = Vec::with_capacity(steps.len());

    for step in steps {
        topo_dfs(step.id, &graph, &mut visited, &mut result);
    }

    Ok(result)
}

fn topo_dfs(node: StepId, graph: &HashMap<StepId, &PlanStep>, visited: &mut HashSet<StepId>, result: &mut Vec<StepId>) {
    if !visited.insert(node) {
        return;
    }

    if let Some(step) = graph.get(&node) {
        for &dep in &step.depends_on {
            if graph.contains_key(&dep) {
                topo_dfs(dep, graph, visited, result);
            }
        }
    }
    result.push(node);
}

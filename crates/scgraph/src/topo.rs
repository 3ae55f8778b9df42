//! Turns a finished [`GraphBuilderInner`] into a [`CompiledGraph`]: dead
//! code eliminated, topologically ordered with width-first UGens
//! hoisted as early as their dependencies allow, and its constant pool
//! re-packed to only what survived.
//!
//! The teacher's `GraphIR::validate()` only *checks* that its nodes are
//! already in a legal order (construction is append-only, so in
//! practice the teacher never needs to reorder anything). spec.md asks
//! for an actual compiler pass — insertion-index tie-break plus
//! width-first hoisting (§9 Open Question 1) — and for dead-code
//! elimination keyed on [`UGenNode::has_side_effects`], neither of
//! which the teacher implements; the Kahn's-algorithm shape below is
//! the standard one, adapted to rank ready nodes by
//! `(is_width_first, original_index)` instead of plain FIFO order.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::{GraphError, Result};
use crate::graph::{GraphBuilderInner, Input, ParamSpec, UGenNode};

const CONTROL_UGEN_NAMES: [&str; 4] = ["Control", "LagControl", "TrigControl", "AudioControl"];

/// A graph ready for SCgf encoding: dead code removed, nodes
/// topologically ordered, constant pool re-packed.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledGraph {
    pub nodes: Vec<UGenNode>,
    pub constants: Vec<f32>,
    pub params: Vec<ParamSpec>,
}

pub fn compile(builder: &GraphBuilderInner) -> Result<CompiledGraph> {
    let reachable = mark_reachable(&builder.nodes);
    let order = topo_order(&builder.nodes, &reachable)?;

    let mut new_index: HashMap<usize, u32> = HashMap::new();
    for (new_i, &old_i) in order.iter().enumerate() {
        new_index.insert(old_i, new_i as u32);
    }

    let mut const_map: HashMap<u32, u32> = HashMap::new();
    let mut constants = Vec::new();
    let mut nodes = Vec::with_capacity(order.len());
    for &old_i in &order {
        let node = &builder.nodes[old_i];
        let inputs = node
            .inputs
            .iter()
            .map(|input| match input {
                Input::Node { node_id, output_index } => {
                    let mapped = *new_index.get(&(*node_id as usize)).expect(
                        "dependency of a reachable node must itself be reachable",
                    );
                    Input::Node { node_id: mapped, output_index: *output_index }
                }
                Input::Constant(idx) => {
                    let mapped = *const_map.entry(*idx).or_insert_with(|| {
                        constants.push(builder.constants[*idx as usize]);
                        (constants.len() - 1) as u32
                    });
                    Input::Constant(mapped)
                }
            })
            .collect();
        nodes.push(UGenNode { inputs, ..node.clone() });
    }

    insert_max_local_bufs(&mut nodes, &mut constants);

    Ok(CompiledGraph { nodes, constants, params: builder.params.clone() })
}

fn mark_reachable(nodes: &[UGenNode]) -> HashSet<usize> {
    let roots: Vec<usize> = nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.has_side_effects() || CONTROL_UGEN_NAMES.contains(&n.name.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut visited: HashSet<usize> = HashSet::new();
    let mut queue: VecDeque<usize> = roots.into_iter().collect();
    while let Some(i) = queue.pop_front() {
        if !visited.insert(i) {
            continue;
        }
        for input in &nodes[i].inputs {
            if let Input::Node { node_id, .. } = input {
                queue.push_back(*node_id as usize);
            }
        }
    }
    visited
}

fn topo_order(nodes: &[UGenNode], reachable: &HashSet<usize>) -> Result<Vec<usize>> {
    let mut indegree: HashMap<usize, usize> = HashMap::new();
    let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
    for &i in reachable {
        indegree.entry(i).or_insert(0);
        for input in &nodes[i].inputs {
            if let Input::Node { node_id, .. } = input {
                let dep = *node_id as usize;
                if reachable.contains(&dep) {
                    *indegree.entry(i).or_insert(0) += 1;
                    dependents.entry(dep).or_default().push(i);
                }
            }
        }
    }

    let mut ready: Vec<usize> = reachable
        .iter()
        .copied()
        .filter(|i| indegree.get(i).copied().unwrap_or(0) == 0)
        .collect();

    let mut order = Vec::with_capacity(reachable.len());
    while !ready.is_empty() {
        ready.sort_by_key(|&i| (!nodes[i].is_width_first, i));
        let next = ready.remove(0);
        order.push(next);
        if let Some(deps) = dependents.get(&next) {
            for &d in deps {
                let e = indegree.get_mut(&d).expect("dependent has an indegree entry");
                *e -= 1;
                if *e == 0 {
                    ready.push(d);
                }
            }
        }
    }

    if order.len() != reachable.len() {
        let stuck = reachable.iter().find(|i| !order.contains(i)).copied().unwrap_or(0);
        return Err(GraphError::Cycle(stuck as u32));
    }
    Ok(order)
}

/// scsynth requires a `MaxLocalBufs` control UGen ahead of any
/// `LocalBuf` it sizes. The teacher never uses `LocalBuf`, so this has
/// no teacher grounding beyond the general "insert a synthetic control
/// node" shape of `create_control_ugen`.
fn insert_max_local_bufs(nodes: &mut Vec<UGenNode>, constants: &mut Vec<f32>) {
    let count = nodes.iter().filter(|n| n.name == "LocalBuf").count();
    if count == 0 {
        return;
    }
    let const_idx = constants.len() as u32;
    constants.push(count as f32);

    let insert_at = if nodes.first().map(|n| CONTROL_UGEN_NAMES.contains(&n.name.as_str())).unwrap_or(false) {
        1
    } else {
        0
    };

    let max_local_bufs = UGenNode {
        name: "MaxLocalBufs".to_string(),
        rate: crate::rate::CalculationRate::Scalar,
        inputs: vec![Input::Constant(const_idx)],
        num_outputs: 0,
        special_index: 0,
        is_width_first: true,
        unexpanded_positions: Vec::new(),
        output_rates: Vec::new(),
    };

    for node in nodes.iter_mut() {
        for input in node.inputs.iter_mut() {
            if let Input::Node { node_id, .. } = input {
                if *node_id as usize >= insert_at {
                    *node_id += 1;
                }
            }
        }
    }
    nodes.insert(insert_at, max_local_bufs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::CalculationRate;

    fn leaf(name: &str, inputs: Vec<Input>) -> UGenNode {
        UGenNode {
            name: name.to_string(),
            rate: CalculationRate::Audio,
            inputs,
            num_outputs: 1,
            special_index: 0,
            is_width_first: false,
            unexpanded_positions: Vec::new(),
            output_rates: vec![CalculationRate::Audio],
        }
    }

    #[test]
    fn dead_code_without_side_effects_is_dropped() {
        let mut builder = GraphBuilderInner::default();
        builder.nodes.push(leaf("SinOsc", vec![]));
        builder.nodes.push(leaf("SinOsc", vec![])); // unused sibling
        let compiled = compile(&builder).unwrap();
        assert!(compiled.nodes.is_empty());
    }

    #[test]
    fn out_ugen_keeps_its_dependency_chain() {
        let mut builder = GraphBuilderInner::default();
        builder.nodes.push(leaf("SinOsc", vec![]));
        builder.nodes.push(UGenNode {
            inputs: vec![Input::Node { node_id: 0, output_index: 0 }],
            ..leaf("Out", vec![])
        });
        let compiled = compile(&builder).unwrap();
        assert_eq!(compiled.nodes.len(), 2);
        assert_eq!(compiled.nodes[0].name, "SinOsc");
        assert_eq!(compiled.nodes[1].name, "Out");
    }

    #[test]
    fn unreferenced_constants_are_pruned() {
        let mut builder = GraphBuilderInner::default();
        builder.constants = vec![1.0, 2.0, 3.0];
        builder.nodes.push(UGenNode {
            inputs: vec![Input::Constant(1)],
            ..leaf("Out", vec![])
        });
        let compiled = compile(&builder).unwrap();
        assert_eq!(compiled.constants, vec![2.0]);
        assert_eq!(compiled.nodes[0].inputs[0], Input::Constant(0));
    }

    #[test]
    fn control_ugen_survives_even_when_unused() {
        let mut builder = GraphBuilderInner::default();
        builder.nodes.push(UGenNode {
            num_outputs: 1,
            ..leaf("Control", vec![])
        });
        let compiled = compile(&builder).unwrap();
        assert_eq!(compiled.nodes.len(), 1);
        assert_eq!(compiled.nodes[0].name, "Control");
    }

    #[test]
    fn local_buf_gets_a_max_local_bufs_header() {
        let mut builder = GraphBuilderInner::default();
        builder.nodes.push(leaf("LocalBuf", vec![]));
        builder.nodes.push(UGenNode {
            inputs: vec![Input::Node { node_id: 0, output_index: 0 }],
            ..leaf("Out", vec![])
        });
        let compiled = compile(&builder).unwrap();
        assert_eq!(compiled.nodes[0].name, "MaxLocalBufs");
        assert_eq!(compiled.nodes[1].name, "LocalBuf");
    }
}

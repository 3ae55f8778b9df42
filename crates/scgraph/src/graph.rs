//! The mutable graph-under-construction and its frozen IR snapshot.
//!
//! Mirrors the teacher's `GraphBuilderInner`/thread-local-scope-stack
//! shape, generalized to support nested builder scopes (spec.md §4.2
//! requires a scope *stack*, not a single slot, so that a pseudo-UGen
//! can open its own sub-scope without clobbering the caller's).

use std::cell::RefCell;

use crate::errors::{GraphError, Result};
use crate::rate::CalculationRate;

/// One input slot of a UGen: either a reference to another node's
/// output, or an index into the constant pool.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Input {
    Node { node_id: u32, output_index: u32 },
    Constant(u32),
}

/// A parameter declared on the SynthDef being built.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Vec<f32>,
    pub index: u32,
    pub lag_ms: Option<f32>,
}

/// One node of the UGen graph, in builder-insertion order.
#[derive(Clone, Debug, PartialEq)]
pub struct UGenNode {
    pub name: String,
    pub rate: CalculationRate,
    pub inputs: Vec<Input>,
    pub num_outputs: u32,
    pub special_index: i16,
    /// `true` for UGens whose output width must not be collapsed by
    /// dead-code elimination or reordered ahead of their declared
    /// position (e.g. multi-out UGens consumed through `channels()`).
    pub is_width_first: bool,
    /// Output-array positions introduced by multichannel expansion, kept
    /// so the encoder can recover per-output rates independent of the
    /// node's own (possibly-promoted) `rate`.
    pub unexpanded_positions: Vec<usize>,
    pub output_rates: Vec<CalculationRate>,
}

impl UGenNode {
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self.name.as_str(),
            "Out" | "ReplaceOut" | "OffsetOut" | "XOut" | "LocalOut"
                | "Done" | "FreeSelf" | "FreeSelfWhenDone" | "Pause" | "PauseSelf" | "PauseSelfWhenDone"
                | "SendTrig" | "SendReply" | "Poll"
                | "RecordBuf" | "DiskOut" | "DiskIn" | "ScopeOut" | "ScopeOut2"
                | "SetBuf" | "Free"
        )
    }
}

/// A builder scope: one `GraphBuilderInner` per SynthDef under construction.
#[derive(Debug, Default)]
pub struct GraphBuilderInner {
    pub nodes: Vec<UGenNode>,
    pub constants: Vec<f32>,
    pub params: Vec<ParamSpec>,
    pub param_map: std::collections::HashMap<String, usize>,
    pub out_bus_tag: Option<u32>,
}

impl GraphBuilderInner {
    /// Unique id identifying this particular scope instance, used to
    /// detect a `Signal` leaking across scopes (spec.md's cross-scope
    /// wiring invariant — the teacher never needed this because it only
    /// ever has one scope active at a time).
    fn scope_tag(&self) -> u32 {
        self as *const _ as u32
    }

    /// Insert a constant, deduplicating by exact bit pattern (spec.md §8
    /// testable property). The teacher instead dedups by `< 1e-9`
    /// proximity; bit-exact dedup is what the constant-pool invariant
    /// actually requires, since two distinct-but-close constants
    /// (e.g. two independently-computed frequencies) must not collapse.
    pub fn add_constant(&mut self, value: f32) -> Result<u32> {
        if !value.is_finite() {
            return Err(GraphError::NonFinite {
                context: "constant pool".into(),
                value,
            });
        }
        let bits = value.to_bits();
        if let Some(idx) = self.constants.iter().position(|c| c.to_bits() == bits) {
            return Ok(idx as u32);
        }
        self.constants.push(value);
        Ok((self.constants.len() - 1) as u32)
    }

    pub fn add_node(&mut self, node: UGenNode) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    pub fn add_param(&mut self, name: &str, default: Vec<f32>, lag_ms: Option<f32>) -> Result<u32> {
        if self.param_map.contains_key(name) {
            return Err(GraphError::DuplicateParameter(name.to_string()));
        }
        let index = self.total_param_slots();
        self.param_map.insert(name.to_string(), self.params.len());
        self.params.push(ParamSpec {
            name: name.to_string(),
            default,
            index,
            lag_ms,
        });
        Ok(index)
    }

    pub fn total_param_slots(&self) -> u32 {
        self.params.iter().map(|p| p.default.len() as u32).sum()
    }

    pub fn max_rate_from_inputs(&self, inputs: &[Input]) -> CalculationRate {
        CalculationRate::max_of(inputs.iter().map(|i| match i {
            Input::Constant(_) => CalculationRate::Scalar,
            Input::Node { node_id, output_index } => self
                .nodes
                .get(*node_id as usize)
                .and_then(|n| n.output_rates.get(*output_index as usize).copied())
                .unwrap_or(n_rate_fallback(self, *node_id)),
        }))
    }

    /// Insert the synthetic Control-family UGen at index 0, shifting
    /// every existing node reference by one (teacher's
    /// `create_control_ugen`). Must be called exactly once, after all
    /// parameters are registered and before any other node references
    /// parameter slots directly (parameter reads go through
    /// `Signal::Param`, resolved at freeze time instead, so in practice
    /// this crate never needs to renumber — see `builder.rs::freeze`).
    pub fn control_ugen_name(&self) -> &'static str {
        "Control"
    }
}

fn n_rate_fallback(builder: &GraphBuilderInner, node_id: u32) -> CalculationRate {
    builder
        .nodes
        .get(node_id as usize)
        .map(|n| n.rate)
        .unwrap_or(CalculationRate::Scalar)
}

thread_local! {
    static BUILDER_STACK: RefCell<Vec<GraphBuilderInner>> = RefCell::new(Vec::new());
}

/// Push a fresh builder scope and run `f` with it active, then pop and
/// return the finished scope. Nested calls are allowed; each gets its
/// own isolated scope, and a `Signal` produced inside an inner scope
/// cannot be wired into the outer one (enforced by [`current_scope_tag`]).
pub fn with_new_scope<T>(f: impl FnOnce() -> Result<T>) -> Result<(T, GraphBuilderInner)> {
    BUILDER_STACK.with(|stack| stack.borrow_mut().push(GraphBuilderInner::default()));
    let result = f();
    let scope = BUILDER_STACK.with(|stack| stack.borrow_mut().pop().expect("scope pushed above"));
    result.map(|v| (v, scope))
}

/// Run `f` with mutable access to the currently active builder scope.
/// Returns [`GraphError::NoActiveBuilder`] if no scope is open.
pub fn with_builder<T>(f: impl FnOnce(&mut GraphBuilderInner) -> Result<T>) -> Result<T> {
    BUILDER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let builder = stack.last_mut().ok_or(GraphError::NoActiveBuilder)?;
        f(builder)
    })
}

/// Tag identifying the currently active scope, used by `Signal` to
/// detect cross-scope wiring. `None` if no scope is open.
pub fn current_scope_tag() -> Option<u32> {
    BUILDER_STACK.with(|stack| stack.borrow().last().map(|b| b.scope_tag()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_constant_dedups_by_bit_pattern() {
        let mut b = GraphBuilderInner::default();
        let i1 = b.add_constant(1.0).unwrap();
        let i2 = b.add_constant(1.0).unwrap();
        let i3 = b.add_constant(1.0 + f32::EPSILON).unwrap();
        assert_eq!(i1, i2);
        assert_ne!(i1, i3);
    }

    #[test]
    fn add_constant_rejects_non_finite() {
        let mut b = GraphBuilderInner::default();
        assert!(b.add_constant(f32::NAN).is_err());
        assert!(b.add_constant(f32::INFINITY).is_err());
    }

    #[test]
    fn add_param_rejects_duplicates() {
        let mut b = GraphBuilderInner::default();
        b.add_param("freq", vec![440.0], None).unwrap();
        assert!(b.add_param("freq", vec![220.0], None).is_err());
    }

    #[test]
    fn param_indices_accumulate_over_vector_width() {
        let mut b = GraphBuilderInner::default();
        let i1 = b.add_param("pan", vec![0.0, 0.0], None).unwrap();
        let i2 = b.add_param("freq", vec![440.0], None).unwrap();
        assert_eq!(i1, 0);
        assert_eq!(i2, 2);
    }

    #[test]
    fn no_active_builder_without_scope() {
        let result = with_builder(|_| Ok(()));
        assert!(matches!(result, Err(GraphError::NoActiveBuilder)));
    }

    #[test]
    fn nested_scopes_isolate_constants() {
        let (inner_len, outer) = with_new_scope(|| {
            with_builder(|b| {
                b.add_constant(1.0)?;
                Ok(())
            })?;
            let (_, inner) = with_new_scope(|| {
                with_builder(|b| {
                    b.add_constant(2.0)?;
                    b.add_constant(3.0)?;
                    Ok(())
                })
            })?;
            Ok(inner.constants.len())
        })
        .unwrap();
        assert_eq!(inner_len, 2);
        assert_eq!(outer.constants.len(), 1);
    }
}

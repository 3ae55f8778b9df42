//! [`Signal`]: the host-side handle for a value flowing through a graph
//! under construction, and its `std::ops` arithmetic.
//!
//! Grounded on the teacher's `rhainodes.rs::NodeRef`, generalized from a
//! single `u32`-encoded handle driven through a Rhai engine into a plain
//! Rust enum driven through native operator overloading. The encoding
//! trick the teacher uses to thread parameter references through Rhai
//! (`0xFFFFFFFF - slot_index`) has no reason to exist once parameters
//! are just another `Signal` variant, so `Signal::Param` replaces it.

use crate::errors::{GraphError, Result};
use crate::graph::{current_scope_tag, with_builder, Input, UGenNode};
use crate::ops::{BinaryOp, UnaryOp};
use crate::rate::CalculationRate;

/// Identifies one output of one UGen node within the currently active
/// builder scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UGenId(pub u32);

/// Identifies a declared SynthDef parameter by its slot index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamId(pub u32);

/// A value flowing through the graph under construction.
///
/// `Signal` deliberately has no `Into<bool>`/`PartialEq<bool>` impl and
/// no inherent truthiness: comparing two signals with `==` compares the
/// enum structurally (for tests), not their runtime values, and there is
/// no way to branch host-side control flow on one. Audio-rate
/// comparisons are expressed with [`Signal::lt`]/[`Signal::gt`]/etc.,
/// which build a `BinaryOpUGen` and return a new `Signal` — the
/// "boolean trap" the spec warns against is unrepresentable rather than
/// merely discouraged.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    /// One output of a UGen node.
    Output(UGenId, u32),
    /// A literal, always `Scalar`-rate until promoted by an operation.
    Const(f32),
    /// A parameter reference, resolved to a Control-family UGen output
    /// when the enclosing SynthDef is built.
    Param(ParamId),
    /// A multichannel bundle. Operations broadcast elementwise
    /// (spec.md §4.4); a bare scalar operand broadcasts against every
    /// channel.
    Vector(Vec<Signal>),
}

impl Signal {
    pub fn rate(&self) -> CalculationRate {
        match self {
            Signal::Const(_) => CalculationRate::Scalar,
            Signal::Param(_) => CalculationRate::Control,
            Signal::Output(id, out) => {
                with_builder(|b| {
                    Ok(b.nodes
                        .get(id.0 as usize)
                        .and_then(|n| n.output_rates.get(*out as usize).copied())
                        .unwrap_or(CalculationRate::Scalar))
                })
                .unwrap_or(CalculationRate::Scalar)
            }
            Signal::Vector(xs) => CalculationRate::max_of(xs.iter().map(|x| x.rate())),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Signal::Vector(xs) => xs.len(),
            _ => 1,
        }
    }

    fn as_scalar_input(&self) -> Option<Result<Input>> {
        match self {
            Signal::Const(v) => Some(with_builder(|b| b.add_constant(*v).map(Input::Constant))),
            Signal::Output(id, out) => Some(Ok(Input::Node { node_id: id.0, output_index: *out })),
            Signal::Param(_) => None,
            Signal::Vector(_) => None,
        }
    }

    fn to_input(&self) -> Result<Input> {
        match self.as_scalar_input() {
            Some(r) => r,
            None => Err(GraphError::Validation(
                "expected a scalar signal, found a parameter reference or vector \
                 (resolve parameters before wiring, and index vectors first)"
                    .into(),
            )),
        }
    }

    /// Require that a scope is active before this signal is wired into a
    /// new node. Node ids are scope-local: if a node is referenced while
    /// no scope is open at all (e.g. a stray `Signal` kept around after
    /// its builder closed), that is the cross-scope-wiring case the
    /// graph can still reject without per-signal scope tagging.
    fn assert_same_scope(&self) -> Result<()> {
        if let Signal::Output(id, _) = self {
            if current_scope_tag().is_none() {
                return Err(GraphError::CrossScopeWiring(id.0));
            }
        }
        Ok(())
    }

    fn binary(&self, other: &Signal, op: BinaryOp) -> Result<Signal> {
        match (self, other) {
            (Signal::Vector(a), Signal::Vector(b)) => {
                return broadcast_binary(a, b, op);
            }
            (Signal::Vector(a), b) => {
                return Ok(Signal::Vector(
                    a.iter().map(|x| x.binary(b, op)).collect::<Result<Vec<_>>>()?,
                ));
            }
            (a, Signal::Vector(b)) => {
                return Ok(Signal::Vector(
                    b.iter().map(|x| a.binary(x, op)).collect::<Result<Vec<_>>>()?,
                ));
            }
            _ => {}
        }

        if let (Signal::Const(a), Signal::Const(b)) = (self, other) {
            if let Some(folded) = op.apply_f32(*a, *b) {
                return Ok(Signal::Const(folded));
            }
        }

        if let Some(simplified) = simplify_identity(self, other, op) {
            return Ok(simplified);
        }

        build_binary(self, other, op)
    }

    fn unary(&self, op: UnaryOp) -> Result<Signal> {
        if let Signal::Vector(xs) = self {
            return Ok(Signal::Vector(xs.iter().map(|x| x.unary(op)).collect::<Result<Vec<_>>>()?));
        }
        if let Signal::Const(a) = self {
            if let Some(folded) = op.apply_f32(*a) {
                return Ok(Signal::Const(folded));
            }
        }
        build_unary(self, op)
    }

    pub fn lt(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Lt) }
    pub fn gt(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Gt) }
    pub fn le(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Le) }
    pub fn ge(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Ge) }
    pub fn eq_signal(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Eq) }
    pub fn ne_signal(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Ne) }
    pub fn min(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Min) }
    pub fn max(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Max) }
    pub fn pow(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Pow) }
    pub fn modulo(&self, other: &Signal) -> Result<Signal> { self.binary(other, BinaryOp::Mod) }

    pub fn abs(&self) -> Result<Signal> { self.unary(UnaryOp::Abs) }
    pub fn sign(&self) -> Result<Signal> { self.unary(UnaryOp::Sign) }
    pub fn squared(&self) -> Result<Signal> { self.unary(UnaryOp::Squared) }
    pub fn cubed(&self) -> Result<Signal> { self.unary(UnaryOp::Cubed) }
    pub fn sqrt(&self) -> Result<Signal> { self.unary(UnaryOp::Sqrt) }
    pub fn sin(&self) -> Result<Signal> { self.unary(UnaryOp::Sin) }
    pub fn tanh(&self) -> Result<Signal> { self.unary(UnaryOp::Tanh) }
    pub fn distort(&self) -> Result<Signal> { self.unary(UnaryOp::Distort) }
    pub fn db_to_amp(&self) -> Result<Signal> { self.unary(UnaryOp::DbAmp) }
    pub fn amp_to_db(&self) -> Result<Signal> { self.unary(UnaryOp::AmpDb) }
    pub fn midi_to_cps(&self) -> Result<Signal> { self.unary(UnaryOp::MidiCps) }
}

/// Widen `xs` to `width` channels: an equal-length vector passes
/// through, a length-1 vector broadcasts, anything else is an
/// asymmetric-length mismatch that fails at build time rather than
/// silently wrapping (spec.md §4.1).
fn widen_to(xs: &[Signal], width: usize) -> Result<Vec<Signal>> {
    if xs.len() == width {
        Ok(xs.to_vec())
    } else if xs.len() == 1 {
        Ok(std::iter::repeat(xs[0].clone()).take(width).collect())
    } else {
        Err(GraphError::MultichannelLengthMismatch { left: xs.len(), right: width })
    }
}

fn broadcast_binary(a: &[Signal], b: &[Signal], op: BinaryOp) -> Result<Signal> {
    let width = a.len().max(b.len());
    let wa = widen_to(a, width)?;
    let wb = widen_to(b, width)?;
    let zipped = wa.iter().zip(wb.iter()).map(|(x, y)| x.binary(y, op)).collect::<Result<Vec<_>>>()?;
    Ok(Signal::Vector(zipped))
}

fn simplify_identity(a: &Signal, b: &Signal, op: BinaryOp) -> Option<Signal> {
    match (op, a, b) {
        (BinaryOp::Add, x, Signal::Const(0.0)) => Some(x.clone()),
        (BinaryOp::Add, Signal::Const(0.0), y) => Some(y.clone()),
        (BinaryOp::Sub, x, Signal::Const(0.0)) => Some(x.clone()),
        (BinaryOp::Mul, x, Signal::Const(1.0)) => Some(x.clone()),
        (BinaryOp::Mul, Signal::Const(1.0), y) => Some(y.clone()),
        (BinaryOp::Mul, _, Signal::Const(0.0)) => Some(Signal::Const(0.0)),
        (BinaryOp::Mul, Signal::Const(0.0), _) => Some(Signal::Const(0.0)),
        (BinaryOp::Div, x, Signal::Const(1.0)) => Some(x.clone()),
        (BinaryOp::Pow, x, Signal::Const(1.0)) => Some(x.clone()),
        (BinaryOp::Pow, _, Signal::Const(0.0)) => Some(Signal::Const(1.0)),
        _ => None,
    }
}

fn build_binary(a: &Signal, b: &Signal, op: BinaryOp) -> Result<Signal> {
    a.assert_same_scope()?;
    b.assert_same_scope()?;
    let ia = a.to_input()?;
    let ib = b.to_input()?;
    with_builder(|builder| {
        let rate = builder.max_rate_from_inputs(&[ia, ib]);
        let node = UGenNode {
            name: "BinaryOpUGen".to_string(),
            rate,
            inputs: vec![ia, ib],
            num_outputs: 1,
            special_index: op.special_index(),
            is_width_first: false,
            unexpanded_positions: Vec::new(),
            output_rates: vec![rate],
        };
        let id = builder.add_node(node);
        Ok(Signal::Output(UGenId(id), 0))
    })
}

fn build_unary(a: &Signal, op: UnaryOp) -> Result<Signal> {
    a.assert_same_scope()?;
    let ia = a.to_input()?;
    with_builder(|builder| {
        let rate = builder.max_rate_from_inputs(&[ia]);
        let node = UGenNode {
            name: "UnaryOpUGen".to_string(),
            rate,
            inputs: vec![ia],
            num_outputs: 1,
            special_index: op.special_index(),
            is_width_first: false,
            unexpanded_positions: Vec::new(),
            output_rates: vec![rate],
        };
        let id = builder.add_node(node);
        Ok(Signal::Output(UGenId(id), 0))
    })
}

impl From<f32> for Signal {
    fn from(v: f32) -> Self {
        Signal::Const(v)
    }
}

impl From<Vec<Signal>> for Signal {
    fn from(xs: Vec<Signal>) -> Self {
        Signal::Vector(xs)
    }
}

macro_rules! impl_binop {
    ($trait:ident, $method:ident, $op:expr) => {
        impl std::ops::$trait<Signal> for Signal {
            type Output = Result<Signal>;
            fn $method(self, rhs: Signal) -> Result<Signal> {
                self.binary(&rhs, $op)
            }
        }
        impl std::ops::$trait<&Signal> for &Signal {
            type Output = Result<Signal>;
            fn $method(self, rhs: &Signal) -> Result<Signal> {
                self.binary(rhs, $op)
            }
        }
        impl std::ops::$trait<f32> for Signal {
            type Output = Result<Signal>;
            fn $method(self, rhs: f32) -> Result<Signal> {
                self.binary(&Signal::Const(rhs), $op)
            }
        }
    };
}

impl_binop!(Add, add, BinaryOp::Add);
impl_binop!(Sub, sub, BinaryOp::Sub);
impl_binop!(Mul, mul, BinaryOp::Mul);
impl_binop!(Div, div, BinaryOp::Div);

impl std::ops::Neg for Signal {
    type Output = Result<Signal>;
    fn neg(self) -> Result<Signal> {
        self.unary(UnaryOp::Neg)
    }
}

impl std::ops::Neg for &Signal {
    type Output = Result<Signal>;
    fn neg(self) -> Result<Signal> {
        self.unary(UnaryOp::Neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::with_new_scope;

    #[test]
    fn constant_folding_add() {
        let s = (Signal::Const(2.0) + Signal::Const(3.0)).unwrap();
        assert_eq!(s, Signal::Const(5.0));
    }

    #[test]
    fn identity_simplification_add_zero() {
        let (result, _) = with_new_scope(|| {
            crate::graph::with_builder(|b| b.add_constant(0.0))?;
            let x = Signal::Output(UGenId(0), 0);
            x.clone() + Signal::Const(0.0)
        })
        .unwrap();
        assert_eq!(result, Signal::Output(UGenId(0), 0));
    }

    #[test]
    fn identity_simplification_mul_zero() {
        let x = Signal::Output(UGenId(7), 0);
        let s = (x * 0.0).unwrap();
        assert_eq!(s, Signal::Const(0.0));
    }

    #[test]
    fn rate_promotion_picks_max() {
        let (rate, _) = with_new_scope(|| {
            let audio = build_unary(&Signal::Const(1.0), UnaryOp::Sin)?;
            Ok(audio.rate())
        })
        .unwrap();
        assert_eq!(rate, CalculationRate::Scalar);
    }

    #[test]
    fn vector_broadcast_elementwise() {
        let v = Signal::Vector(vec![Signal::Const(1.0), Signal::Const(2.0)]);
        let s = (v * 2.0).unwrap();
        match s {
            Signal::Vector(xs) => {
                assert_eq!(xs, vec![Signal::Const(2.0), Signal::Const(4.0)]);
            }
            _ => panic!("expected vector"),
        }
    }

    #[test]
    fn no_active_builder_propagates_graph_error() {
        let a = Signal::Output(UGenId(0), 0);
        let b = Signal::Output(UGenId(1), 0);
        let err = (a + b).unwrap_err();
        assert!(matches!(err, GraphError::CrossScopeWiring(0)));
    }

    #[test]
    fn asymmetric_vector_lengths_in_binary_op_error() {
        let a = Signal::Vector(vec![Signal::Const(1.0), Signal::Const(2.0)]);
        let b = Signal::Vector(vec![Signal::Const(1.0), Signal::Const(2.0), Signal::Const(3.0)]);
        let err = (a + b).unwrap_err();
        assert!(matches!(err, GraphError::MultichannelLengthMismatch { left: 2, right: 3 }));
    }
}

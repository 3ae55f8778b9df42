//! SynthDef graph IR, compiler, and SCgf binary encoder.
//!
//! `scgraph` builds SuperCollider-compatible `SynthDef`s from ordinary
//! Rust code: [`Signal`] is the handle for a value flowing through the
//! graph under construction, `std::ops` arithmetic on it builds
//! `BinaryOpUGen`/`UnaryOpUGen` nodes (folding constants and simplifying
//! identities as it goes), [`ugens`] provides typed constructors for the
//! common generator/filter UGens, and [`builder::SynthDefBuilder`] ties
//! parameter declarations and a body closure together into a compiled
//! graph that [`encoder::encode_synthdef`] serializes to the on-wire
//! `SCgf` format scsynth's `/d_recv` expects.
//!
//! ## Architecture
//!
//! A graph under construction lives in a thread-local stack of
//! [`graph::GraphBuilderInner`] scopes (see [`graph::with_new_scope`]).
//! `Signal` operations push nodes into whichever scope is innermost;
//! [`topo::compile`] then prunes dead code, topologically orders the
//! survivors, and repacks the constant pool before the graph is handed
//! to the encoder.

pub mod builder;
pub mod encoder;
pub mod envelope;
pub mod errors;
pub mod graph;
pub mod multichannel;
pub mod ops;
pub mod rate;
pub mod signal;
pub mod topo;
pub mod ugens;

pub use builder::{Params, SynthDefBuilder};
pub use envelope::{Envelope, Shape};
pub use errors::{GraphError, Result};
pub use ops::{BinaryOp, UnaryOp};
pub use rate::{CalculationRate, ParameterRate};
pub use signal::{ParamId, Signal, UGenId};
pub use topo::CompiledGraph;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_encodes_a_sine_synthdef() {
        let (name, graph) = SynthDefBuilder::new("sine")
            .param("freq", 440.0)
            .param("amp", 0.1)
            .build(|p| {
                let freq = p.get("freq")?;
                let amp = p.get("amp")?;
                ugens::sin_osc(&freq, &Signal::Const(0.0)) * amp
            })
            .unwrap();
        let bytes = encoder::encode_synthdef(&name, &graph).unwrap();
        assert_eq!(&bytes[0..4], b"SCgf");
        assert!(graph.nodes.iter().any(|n| n.name == "SinOsc"));
        assert!(graph.nodes.iter().any(|n| n.name == "Out"));
    }
}

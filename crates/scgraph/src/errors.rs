//! Error types for graph construction, compilation, and SCgf encoding.

use thiserror::Error;

/// Errors that can occur while building, compiling, or encoding a SynthDef graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// A UGen was constructed while no builder scope was active and the
    /// construction requires one (e.g. anything touching the constant pool).
    #[error("no active graph builder in scope")]
    NoActiveBuilder,

    /// An `OutputProxy`/`Signal::Output` referenced a UGen that belongs to a
    /// different, currently-active builder scope.
    #[error("cross-scope wiring: node {0:?} belongs to a different builder scope")]
    CrossScopeWiring(u32),

    /// Two vector-shaped operands had incompatible lengths (neither equal
    /// nor 1) during multichannel broadcast.
    #[error("multichannel expansion length mismatch: {left} vs {right}")]
    MultichannelLengthMismatch { left: usize, right: usize },

    /// A parameter name was registered twice in the same builder.
    #[error("duplicate parameter name: {0}")]
    DuplicateParameter(String),

    /// A UGen was constructed with a calculation rate outside its
    /// declared supported-rate set.
    #[error("UGen {ugen} does not support rate {rate:?}")]
    UnsupportedRate { ugen: String, rate: crate::rate::CalculationRate },

    /// A `Signal` was evaluated in a boolean context (defensive — the
    /// Rust type system makes this unreachable for `Signal` itself, but
    /// the error is kept for API parity with the spec and for any future
    /// host-side scripting layer built on top).
    #[error("signal used in a boolean context")]
    BooleanTrap,

    /// The graph contained a cycle and could not be topologically sorted.
    #[error("cycle detected in UGen graph at node {0:?}")]
    Cycle(u32),

    /// A numeric value that must be finite (e.g. a constant) was NaN or infinite.
    #[error("non-finite value in {context}: {value}")]
    NonFinite { context: String, value: f32 },

    /// An envelope did not satisfy its dimensionality invariants.
    #[error("envelope dimension mismatch: {0}")]
    EnvelopeShape(String),

    /// The compiled SCgf exceeded an internal size limit.
    #[error("SCgf size limit exceeded: {0} bytes")]
    SizeLimitExceeded(usize),

    /// A generic, descriptive validation failure identifying the
    /// offending UGen or parameter.
    #[error("{0}")]
    Validation(String),

    /// Failure while writing the binary SCgf format.
    #[error("SCgf encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;

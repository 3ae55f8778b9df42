//! SCgf binary encoder.
//!
//! Directly grounded on the teacher's `encoder.rs` (`encode_synthdef`,
//! `encode_graph`, `encode_ugen`, `write_pstring`), generalized in two
//! ways SPEC_FULL.md calls for: (1) the def-count field is no longer
//! hardcoded to one, so [`encode_synthdefs`] can pack several `CompiledGraph`s
//! into one file; (2) each UGen's output-rate bytes are taken from its
//! own `output_rates` list instead of repeating a single shared rate,
//! so mixed-rate multi-output UGens (e.g. `Pan2`) encode correctly.

use byteorder::{BigEndian, WriteBytesExt};
use std::io::Write;

use crate::errors::{GraphError, Result};
use crate::graph::Input;
use crate::topo::CompiledGraph;

const MAGIC: &[u8; 4] = b"SCgf";
const VERSION: i32 = 2;

/// Maximum encoded size of one SCgf file this compiler will hand to
/// `/d_recv`, kept conservative relative to scsynth's OSC-over-UDP
/// transport (large `/d_recv` payloads are typically sent over TCP or
/// written to disk and loaded with `/d_load` instead; this compiler only
/// targets the direct in-message path).
const MAX_SCGF_BYTES: usize = 1_048_576;

fn write_pstring(out: &mut Vec<u8>, s: &str) -> Result<()> {
    if s.len() > 255 {
        return Err(GraphError::Encoding(format!(
            "string {:?} exceeds the 255-byte pstring limit",
            s
        )));
    }
    out.write_u8(s.len() as u8).map_err(io_err)?;
    out.write_all(s.as_bytes()).map_err(io_err)?;
    Ok(())
}

fn io_err(e: std::io::Error) -> GraphError {
    GraphError::Encoding(e.to_string())
}

/// Encode one `(name, graph)` pair's `SynthDesc` body: name, constants,
/// parameter defaults, parameter names, UGens, and a trailing
/// variants count (always `0` — variant SynthDefs are not produced by
/// this compiler).
fn encode_def(out: &mut Vec<u8>, name: &str, graph: &CompiledGraph) -> Result<()> {
    write_pstring(out, name)?;

    out.write_i32::<BigEndian>(graph.constants.len() as i32).map_err(io_err)?;
    for c in &graph.constants {
        out.write_f32::<BigEndian>(*c).map_err(io_err)?;
    }

    let param_values: Vec<f32> = graph.params.iter().flat_map(|p| p.default.iter().copied()).collect();
    out.write_i32::<BigEndian>(param_values.len() as i32).map_err(io_err)?;
    for v in &param_values {
        out.write_f32::<BigEndian>(*v).map_err(io_err)?;
    }

    out.write_i32::<BigEndian>(graph.params.len() as i32).map_err(io_err)?;
    for p in &graph.params {
        write_pstring(out, &p.name)?;
        out.write_i32::<BigEndian>(p.index as i32).map_err(io_err)?;
    }

    out.write_i32::<BigEndian>(graph.nodes.len() as i32).map_err(io_err)?;
    for node in &graph.nodes {
        encode_ugen(out, node)?;
    }

    out.write_i16::<BigEndian>(0).map_err(io_err)?; // variants
    Ok(())
}

fn encode_ugen(out: &mut Vec<u8>, node: &crate::graph::UGenNode) -> Result<()> {
    write_pstring(out, &node.name)?;
    out.write_i8(node.rate.as_byte() as i8).map_err(io_err)?;
    out.write_i32::<BigEndian>(node.inputs.len() as i32).map_err(io_err)?;
    out.write_i32::<BigEndian>(node.num_outputs as i32).map_err(io_err)?;
    out.write_i16::<BigEndian>(node.special_index).map_err(io_err)?;

    for input in &node.inputs {
        match input {
            Input::Node { node_id, output_index } => {
                out.write_i32::<BigEndian>(*node_id as i32).map_err(io_err)?;
                out.write_i32::<BigEndian>(*output_index as i32).map_err(io_err)?;
            }
            Input::Constant(idx) => {
                out.write_i32::<BigEndian>(-1).map_err(io_err)?;
                out.write_i32::<BigEndian>(*idx as i32).map_err(io_err)?;
            }
        }
    }

    if node.output_rates.len() != node.num_outputs as usize {
        return Err(GraphError::Encoding(format!(
            "{}: {} output rates declared but num_outputs is {}",
            node.name,
            node.output_rates.len(),
            node.num_outputs
        )));
    }
    for rate in &node.output_rates {
        out.write_i8(rate.as_byte() as i8).map_err(io_err)?;
    }
    Ok(())
}

/// Encode a single named SynthDef as a standalone SCgf file.
pub fn encode_synthdef(name: &str, graph: &CompiledGraph) -> Result<Vec<u8>> {
    encode_synthdefs(&[(name, graph)])
}

/// Encode several named SynthDefs into one SCgf file, as scsynth's
/// `/d_recv` accepts for batched definition loads.
pub fn encode_synthdefs(defs: &[(&str, &CompiledGraph)]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.write_all(MAGIC).map_err(io_err)?;
    out.write_i32::<BigEndian>(VERSION).map_err(io_err)?;
    out.write_i16::<BigEndian>(defs.len() as i16).map_err(io_err)?;
    for (name, graph) in defs {
        encode_def(&mut out, name, graph)?;
    }
    if out.len() > MAX_SCGF_BYTES {
        return Err(GraphError::SizeLimitExceeded(out.len()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ParamSpec;

    fn empty_graph() -> CompiledGraph {
        CompiledGraph { nodes: Vec::new(), constants: Vec::new(), params: Vec::new() }
    }

    #[test]
    fn header_has_magic_and_version() {
        let bytes = encode_synthdef("empty", &empty_graph()).unwrap();
        assert_eq!(&bytes[0..4], b"SCgf");
        assert_eq!(i32::from_be_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(i16::from_be_bytes(bytes[8..10].try_into().unwrap()), 1);
    }

    #[test]
    fn pstring_too_long_errors() {
        let long_name = "a".repeat(300);
        let result = encode_synthdef(&long_name, &empty_graph());
        assert!(result.is_err());
    }

    #[test]
    fn multiple_defs_increment_def_count() {
        let g = empty_graph();
        let bytes = encode_synthdefs(&[("a", &g), ("b", &g)]).unwrap();
        assert_eq!(i16::from_be_bytes(bytes[8..10].try_into().unwrap()), 2);
    }

    #[test]
    fn param_defaults_roundtrip_into_flat_value_array() {
        let mut graph = empty_graph();
        graph.params.push(ParamSpec { name: "freq".into(), default: vec![440.0], index: 0, lag_ms: None });
        graph.params.push(ParamSpec { name: "pan".into(), default: vec![0.0, 0.0], index: 1, lag_ms: None });
        let bytes = encode_synthdef("test", &graph).unwrap();
        // name pstring "test" is 1 + 4 bytes, then constants count (0 constants)
        let after_name = 1 + 4;
        let constants_count_offset = 10 + after_name;
        let param_values_count_offset = constants_count_offset + 4;
        let count = i32::from_be_bytes(
            bytes[param_values_count_offset..param_values_count_offset + 4].try_into().unwrap(),
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn mismatched_output_rate_count_errors() {
        let mut graph = empty_graph();
        graph.nodes.push(crate::graph::UGenNode {
            name: "SinOsc".into(),
            rate: crate::rate::CalculationRate::Audio,
            inputs: vec![],
            num_outputs: 1,
            special_index: 0,
            is_width_first: false,
            unexpanded_positions: vec![],
            output_rates: vec![],
        });
        assert!(encode_synthdef("bad", &graph).is_err());
    }

    #[test]
    fn oversized_synthdef_is_rejected() {
        let mut graph = empty_graph();
        graph.constants = vec![0.0; 300_000];
        let err = encode_synthdef("big", &graph).unwrap_err();
        assert!(matches!(err, GraphError::SizeLimitExceeded(_)));
    }
}

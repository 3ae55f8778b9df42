//! End-to-end: build a sine SynthDef, compile it, and check the
//! encoded SCgf bytes carry the shape a decoder would expect.

use scgraph::{encoder, ugens, Signal, SynthDefBuilder};

#[test]
fn sine_synthdef_encodes_with_expected_header_and_param_block() {
    let (name, graph) = SynthDefBuilder::new("sine_test")
        .param("freq", 440.0)
        .param("amp", 0.2)
        .build(|p| {
            let freq = p.get("freq")?;
            let amp = p.get("amp")?;
            let osc = ugens::sin_osc(&freq, &Signal::Const(0.0));
            osc * amp
        })
        .expect("synthdef should build");

    assert_eq!(name, "sine_test");
    assert!(graph.nodes.iter().any(|n| n.name == "Control"));
    assert!(graph.nodes.iter().any(|n| n.name == "SinOsc"));
    assert!(graph.nodes.iter().any(|n| n.name == "BinaryOpUGen"));
    assert!(graph.nodes.iter().any(|n| n.name == "Out"));

    let bytes = encoder::encode_synthdef(&name, &graph).expect("encoding should succeed");
    assert_eq!(&bytes[0..4], b"SCgf");

    let version = i32::from_be_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(version, 2);

    let def_count = i16::from_be_bytes(bytes[8..10].try_into().unwrap());
    assert_eq!(def_count, 1);

    let name_len = bytes[10] as usize;
    let decoded_name = std::str::from_utf8(&bytes[11..11 + name_len]).unwrap();
    assert_eq!(decoded_name, "sine_test");
}

#[test]
fn identical_graphs_encode_to_identical_bytes() {
    let build = || {
        SynthDefBuilder::new("deterministic")
            .param("freq", 220.0)
            .build(|p| {
                let freq = p.get("freq")?;
                Ok(ugens::sin_osc(&freq, &Signal::Const(0.0)))
            })
            .unwrap()
    };
    let (name_a, graph_a) = build();
    let (name_b, graph_b) = build();
    let bytes_a = encoder::encode_synthdef(&name_a, &graph_a).unwrap();
    let bytes_b = encoder::encode_synthdef(&name_b, &graph_b).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn commutative_binary_op_compiles_same_either_order() {
    let build_with = |swap: bool| {
        SynthDefBuilder::new("add_test")
            .param("a", 1.0)
            .param("b", 2.0)
            .build(move |p| {
                let a = p.get("a")?;
                let b = p.get("b")?;
                if swap { b + a } else { a + b }
            })
            .unwrap()
    };
    let (_, forward) = build_with(false);
    let (_, swapped) = build_with(true);
    assert_eq!(forward.nodes.len(), swapped.nodes.len());
}

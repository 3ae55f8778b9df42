//! Table-driven UGen constructors.
//!
//! spec.md's own Design Notes prefer a `macro_rules!` table over the
//! teacher's `build.rs` codegen (which reads `ugen_manifests/*.json` at
//! compile time — none ship in this crate, and generating `OUT_DIR`
//! code is unverifiable without running the toolchain). [`make_ugen`]
//! plays the role of the teacher's per-UGen Rhai-registered closures in
//! `rhainodes.rs`/`helpers.rs`: build inputs, look up the active
//! builder, push a node, wrap the result back up as a `Signal`.
//! [`declare_ugens!`] is the thin declarative layer on top that keeps
//! each constructor to one line.

use crate::errors::Result;
use crate::graph::{with_builder, Input, UGenNode};
use crate::multichannel;
use crate::rate::CalculationRate;
use crate::signal::{Signal, UGenId};

fn input_of(signal: &Signal) -> Result<Input> {
    match signal {
        Signal::Const(v) => with_builder(|b| b.add_constant(*v).map(Input::Constant)),
        Signal::Output(id, out) => Ok(Input::Node { node_id: id.0, output_index: *out }),
        Signal::Param(_) => Err(crate::errors::GraphError::Validation(
            "parameter references must be resolved via Params::get before use".into(),
        )),
        Signal::Vector(_) => Err(crate::errors::GraphError::Validation(
            "nested vector passed where a scalar channel was expected".into(),
        )),
    }
}

/// Construct one instance of a named UGen from already-scalar
/// (post-multichannel-expansion) input channels.
pub fn make_ugen(name: &str, inputs: &[Signal], num_outputs: u32) -> Result<Signal> {
    let refs: Vec<Input> = inputs.iter().map(input_of).collect::<Result<_>>()?;
    with_builder(|b| {
        let rate = b.max_rate_from_inputs(&refs);
        let node = UGenNode {
            name: name.to_string(),
            rate,
            inputs: refs,
            num_outputs,
            special_index: 0,
            is_width_first: false,
            unexpanded_positions: Vec::new(),
            output_rates: vec![rate; num_outputs as usize],
        };
        let id = b.add_node(node);
        Ok(if num_outputs <= 1 {
            Signal::Output(UGenId(id), 0)
        } else {
            Signal::Vector((0..num_outputs).map(|i| Signal::Output(UGenId(id), i)).collect())
        })
    })
}

/// Like [`make_ugen`] but pins the node's rate instead of deriving it
/// from its inputs (generators driven purely by constants, e.g.
/// `WhiteNoise`, still need to be explicitly audio-rate). Rejects the
/// call with `GraphError::UnsupportedRate` if `rate` isn't one `name`
/// supports (spec.md §4.3).
pub fn make_ugen_at_rate(name: &str, rate: CalculationRate, inputs: &[Signal], num_outputs: u32) -> Result<Signal> {
    if !supported_rates(name).contains(&rate) {
        return Err(crate::errors::GraphError::UnsupportedRate { ugen: name.to_string(), rate });
    }
    let refs: Vec<Input> = inputs.iter().map(input_of).collect::<Result<_>>()?;
    with_builder(|b| {
        let node = UGenNode {
            name: name.to_string(),
            rate,
            inputs: refs,
            num_outputs,
            special_index: 0,
            is_width_first: false,
            unexpanded_positions: Vec::new(),
            output_rates: vec![rate; num_outputs as usize],
        };
        let id = b.add_node(node);
        Ok(if num_outputs <= 1 {
            Signal::Output(UGenId(id), 0)
        } else {
            Signal::Vector((0..num_outputs).map(|i| Signal::Output(UGenId(id), i)).collect())
        })
    })
}

/// Like [`make_ugen`], but marks `exempt` input positions as exempt
/// from multichannel broadcasting (`UGenNode::unexpanded_positions`) —
/// for arguments that are a fixed data tuple rather than per-channel
/// signal data, e.g. `EnvGen`'s flattened envelope array.
fn make_ugen_with_exempt(name: &str, inputs: &[Signal], num_outputs: u32, exempt: &[usize]) -> Result<Signal> {
    let refs: Vec<Input> = inputs.iter().map(input_of).collect::<Result<_>>()?;
    with_builder(|b| {
        let rate = b.max_rate_from_inputs(&refs);
        let node = UGenNode {
            name: name.to_string(),
            rate,
            inputs: refs,
            num_outputs,
            special_index: 0,
            is_width_first: false,
            unexpanded_positions: exempt.to_vec(),
            output_rates: vec![rate; num_outputs as usize],
        };
        let id = b.add_node(node);
        Ok(if num_outputs <= 1 {
            Signal::Output(UGenId(id), 0)
        } else {
            Signal::Vector((0..num_outputs).map(|i| Signal::Output(UGenId(id), i)).collect())
        })
    })
}

/// Calculation rates each built-in UGen class supports. Used to
/// validate [`make_ugen_at_rate`] and the explicit rate-token
/// constructors (`_ar`/`_kr`/`_ir`) against scsynth's actual rate
/// restrictions; UGens not listed here are only ever built through
/// [`make_ugen`]'s input-derived rate, so they have no explicit
/// whitelist to violate.
fn supported_rates(name: &str) -> &'static [CalculationRate] {
    use CalculationRate::*;
    match name {
        "SinOsc" | "Saw" | "Pulse" | "LFSaw" | "LFPulse" | "Impulse" | "Dust" | "LPF" | "HPF" | "RLPF"
        | "Pan2" | "XFade2" | "EnvGen" => &[Control, Audio],
        "LFNoise0" | "LFNoise1" => &[Scalar, Control, Audio],
        "WhiteNoise" | "PinkNoise" => &[Audio],
        _ => &[Scalar, Control, Audio, Demand],
    }
}

macro_rules! declare_ugens {
    ($(
        $(#[$doc:meta])*
        fn $fname:ident($($arg:ident),*) -> $outs:expr, scname = $scname:expr;
    )+) => {
        $(
            $(#[$doc])*
            pub fn $fname($($arg: &Signal),*) -> Signal {
                let args: &[&Signal] = &[$($arg),*];
                multichannel::expand_call(args, |chans| make_ugen($scname, chans, $outs))
                    .unwrap_or(Signal::Const(0.0))
            }
        )+
    };
}

declare_ugens! {
    /// A sine-wave oscillator.
    fn sin_osc(freq, phase) -> 1, scname = "SinOsc";
    /// A band-limited sawtooth oscillator.
    fn saw(freq) -> 1, scname = "Saw";
    /// A band-limited pulse/square oscillator with variable duty cycle.
    fn pulse(freq, width) -> 1, scname = "Pulse";
    /// Step-interpolated low-frequency noise.
    fn lf_noise0(freq) -> 1, scname = "LFNoise0";
    /// Linearly interpolated low-frequency noise.
    fn lf_noise1(freq) -> 1, scname = "LFNoise1";
    /// A one-pole low-pass filter.
    fn lpf(input, freq) -> 1, scname = "LPF";
    /// A one-pole high-pass filter.
    fn hpf(input, freq) -> 1, scname = "HPF";
    /// Resonant low-pass filter.
    fn rlpf(input, freq, rq) -> 1, scname = "RLPF";
    /// Equal-power two-channel panner.
    fn pan2(input, pos, level) -> 2, scname = "Pan2";
    /// Linear crossfade between two signals.
    fn x_fade2(in_a, in_b, pan, level) -> 1, scname = "XFade2";
    /// A trigger-driven impulse train.
    fn impulse(freq, phase) -> 1, scname = "Impulse";
    /// Random trigger generator at a given average density (Poisson process).
    fn dust(density) -> 1, scname = "Dust";
    /// A free-running, non-band-limited sawtooth.
    fn lf_saw(freq, phase) -> 1, scname = "LFSaw";
    /// A free-running pulse wave.
    fn lf_pulse(freq, phase, width) -> 1, scname = "LFPulse";
}

/// Audio-rate `SinOsc`, bypassing input-derived rate inference.
pub fn sin_osc_ar(freq: &Signal, phase: &Signal) -> Result<Signal> {
    multichannel::expand_call(&[freq, phase], |chans| {
        make_ugen_at_rate("SinOsc", CalculationRate::Audio, chans, 1)
    })
}

/// Control-rate `SinOsc`.
pub fn sin_osc_kr(freq: &Signal, phase: &Signal) -> Result<Signal> {
    multichannel::expand_call(&[freq, phase], |chans| {
        make_ugen_at_rate("SinOsc", CalculationRate::Control, chans, 1)
    })
}

/// Audio-rate step noise.
pub fn lf_noise0_ar(freq: &Signal) -> Result<Signal> {
    multichannel::expand_call(&[freq], |chans| make_ugen_at_rate("LFNoise0", CalculationRate::Audio, chans, 1))
}

/// Control-rate step noise.
pub fn lf_noise0_kr(freq: &Signal) -> Result<Signal> {
    multichannel::expand_call(&[freq], |chans| make_ugen_at_rate("LFNoise0", CalculationRate::Control, chans, 1))
}

/// Init-rate step noise: held constant for the life of the synth.
pub fn lf_noise0_ir(freq: &Signal) -> Result<Signal> {
    multichannel::expand_call(&[freq], |chans| make_ugen_at_rate("LFNoise0", CalculationRate::Scalar, chans, 1))
}

/// White noise generator; always audio-rate since it has no inputs to
/// derive a rate from.
pub fn white_noise() -> Signal {
    make_ugen_at_rate("WhiteNoise", CalculationRate::Audio, &[], 1).unwrap_or(Signal::Const(0.0))
}

/// Pink (1/f) noise generator.
pub fn pink_noise() -> Signal {
    make_ugen_at_rate("PinkNoise", CalculationRate::Audio, &[], 1).unwrap_or(Signal::Const(0.0))
}

/// A gated envelope generator. `done_action` follows scsynth's standard
/// codes (`2` = free the enclosing synth on completion).
pub fn env_gen(env: &crate::envelope::Envelope, gate: &Signal, done_action: f32) -> Signal {
    (|| -> Result<Signal> {
        let flat = env.flatten();
        let mut inputs = vec![gate.clone(), Signal::Const(1.0), Signal::Const(0.0), Signal::Const(done_action)];
        // The flattened envelope array is a fixed data tuple, not
        // per-channel signal data; it must not be subject to
        // multichannel broadcasting.
        let exempt: Vec<usize> = (inputs.len()..inputs.len() + flat.len()).collect();
        inputs.extend(flat.into_iter().map(Signal::Const));
        make_ugen_with_exempt("EnvGen", &inputs, 1, &exempt)
    })()
    .unwrap_or(Signal::Const(0.0))
}

/// Sum a list of signals into one (pseudo-UGen, no dedicated scsynth
/// node — grounded on the teacher's `helpers::mix`, which folds with
/// sequential `.add()` calls rather than a native N-ary UGen).
pub fn mix(signals: &[Signal]) -> Signal {
    (|| -> Result<Signal> {
        let mut iter = signals.iter().cloned();
        match iter.next() {
            Some(first) => iter.try_fold(first, |acc, s| acc + s),
            None => Ok(Signal::Const(0.0)),
        }
    })()
    .unwrap_or(Signal::Const(0.0))
}

/// Equal-power-ish spread of N mono channels across a stereo field
/// (pseudo-UGen; implemented as `N` `Pan2`s summed per side).
pub fn splay(signals: &[Signal], spread: f32, level: f32) -> Signal {
    (|| -> Result<Signal> {
        if signals.is_empty() {
            return Ok(Signal::Vector(vec![Signal::Const(0.0), Signal::Const(0.0)]));
        }
        let n = signals.len();
        let panned: Vec<Signal> = signals
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let pos = if n == 1 { 0.0 } else { (i as f32 / (n - 1) as f32) * 2.0 - 1.0 };
                pan2(s, &Signal::Const(pos * spread), &Signal::Const(1.0))
            })
            .collect();
        let left = mix(&panned.iter().map(|p| channel(p, 0)).collect::<Vec<_>>());
        let right = mix(&panned.iter().map(|p| channel(p, 1)).collect::<Vec<_>>());
        let scale = level / (n as f32).sqrt();
        Ok(Signal::Vector(vec![(left * scale)?, (right * scale)?]))
    })()
    .unwrap_or(Signal::Vector(vec![Signal::Const(0.0), Signal::Const(0.0)]))
}

/// Extract one channel from a multichannel `Signal`, scalar signals
/// pass through unchanged on channel `0`.
pub fn channel(signal: &Signal, index: usize) -> Signal {
    match signal {
        Signal::Vector(xs) => xs.get(index).cloned().unwrap_or(Signal::Const(0.0)),
        other if index == 0 => other.clone(),
        _ => Signal::Const(0.0),
    }
}

/// Linearly remap `input` from `[in_lo, in_hi]` to `[out_lo, out_hi]`
/// (pseudo-UGen: pure signal algebra, no dedicated scsynth node).
pub fn lin_lin(input: &Signal, in_lo: &Signal, in_hi: &Signal, out_lo: &Signal, out_hi: &Signal) -> Signal {
    (|| -> Result<Signal> {
        let range_in = (in_hi.clone() - in_lo.clone())?;
        let offset = (input.clone() - in_lo.clone())?;
        let normalized = (offset / range_in)?;
        let range_out = (out_hi.clone() - out_lo.clone())?;
        let scaled = (normalized * range_out)?;
        scaled + out_lo.clone()
    })()
    .unwrap_or(Signal::Const(0.0))
}

/// Emit a trigger whenever `input` changes by more than `threshold`.
pub fn changed(input: &Signal, threshold: f32) -> Signal {
    make_ugen("Changed", &[input.clone(), Signal::Const(threshold)], 1).unwrap_or(Signal::Const(0.0))
}

/// A constant silent signal at the given channel count.
pub fn silence(channels: usize) -> Signal {
    if channels <= 1 {
        Signal::Const(0.0)
    } else {
        Signal::Vector(vec![Signal::Const(0.0); channels])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::with_new_scope;

    #[test]
    fn sin_osc_builds_one_node() {
        let (sig, scope) = with_new_scope(|| {
            let freq = Signal::Const(440.0);
            let phase = Signal::Const(0.0);
            Ok(sin_osc(&freq, &phase))
        })
        .unwrap();
        assert!(matches!(sig, Signal::Output(_, 0)));
        assert_eq!(scope.nodes.len(), 1);
        assert_eq!(scope.nodes[0].name, "SinOsc");
    }

    #[test]
    fn pan2_returns_two_channels() {
        let (sig, _) = with_new_scope(|| {
            Ok(pan2(&Signal::Const(0.0), &Signal::Const(0.0), &Signal::Const(1.0)))
        })
        .unwrap();
        assert_eq!(sig.channels(), 2);
    }

    #[test]
    fn mix_sums_constants() {
        let signals = vec![Signal::Const(1.0), Signal::Const(2.0), Signal::Const(3.0)];
        assert_eq!(mix(&signals), Signal::Const(6.0));
    }

    #[test]
    fn silence_multi_channel_is_a_vector_of_zeros() {
        let s = silence(2);
        assert_eq!(s, Signal::Vector(vec![Signal::Const(0.0), Signal::Const(0.0)]));
    }

    #[test]
    fn lin_lin_identity_range_is_passthrough() {
        let s = lin_lin(&Signal::Const(0.5), &Signal::Const(0.0), &Signal::Const(1.0), &Signal::Const(0.0), &Signal::Const(1.0));
        assert_eq!(s, Signal::Const(0.5));
    }

    #[test]
    fn env_gen_flattens_into_inputs() {
        let (sig, scope) = with_new_scope(|| {
            let env = crate::envelope::Envelope::perc_curved(0.01, 0.3, 1.0, -4.0);
            Ok(env_gen(&env, &Signal::Const(1.0), 2.0))
        })
        .unwrap();
        assert!(matches!(sig, Signal::Output(_, 0)));
        let node = &scope.nodes[0];
        assert_eq!(node.name, "EnvGen");
        // gate, levelScale, levelBias, doneAction + 4 header + 2 segments * 4
        assert_eq!(node.inputs.len(), 4 + 4 + 8);
    }

    #[test]
    fn env_gen_marks_envelope_array_as_unexpanded() {
        let (_, scope) = with_new_scope(|| {
            let env = crate::envelope::Envelope::perc(0.01, 0.3);
            Ok(env_gen(&env, &Signal::Const(1.0), 2.0))
        })
        .unwrap();
        let node = &scope.nodes[0];
        let expected: Vec<usize> = (4..node.inputs.len()).collect();
        assert_eq!(node.unexpanded_positions, expected);
    }

    #[test]
    fn unsupported_rate_is_rejected() {
        let result = make_ugen_at_rate("WhiteNoise", CalculationRate::Scalar, &[], 1);
        assert!(matches!(result, Err(crate::errors::GraphError::UnsupportedRate { .. })));
    }

    #[test]
    fn rate_token_constructor_pins_the_requested_rate() {
        let (_, scope) = with_new_scope(|| sin_osc_kr(&Signal::Const(440.0), &Signal::Const(0.0))).unwrap();
        assert_eq!(scope.nodes[0].rate, CalculationRate::Control);
    }
}

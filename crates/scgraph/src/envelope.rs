//! Envelope specification and its flattening into the flat float tuple
//! `EnvGen` expects as its `envelope` array argument.
//!
//! Grounded on the teacher's `helpers::Env` (`new`/`perc`/`adsr`/`asr`/
//! `triangle` constructors, `env_gen_with_env_impl`'s flattening). The
//! teacher's shape-to-curve-code mapping only distinguishes linear
//! (`1.0`), exponential (`2.0`), and "else -> custom curve value 5.0";
//! this module promotes that into the full named-shape vocabulary
//! spec.md §4.7 requires.

use crate::errors::{GraphError, Result};

/// The interpolation shape of one envelope segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape {
    Step,
    Linear,
    Exponential,
    Sine,
    Welch,
    /// Curvature parameterized by a single float (positive bows up,
    /// negative bows down, `0.0` degenerates to linear).
    Curve(f32),
    Squared,
    Cubic,
}

impl Shape {
    /// `(shape_code, curve_value)` pair written into the flattened
    /// envelope tuple, matching scsynth's `Env_*` shape constants.
    fn codes(self) -> (f32, f32) {
        match self {
            Shape::Step => (0.0, 0.0),
            Shape::Linear => (1.0, 0.0),
            Shape::Exponential => (2.0, 0.0),
            Shape::Sine => (3.0, 0.0),
            Shape::Welch => (4.0, 0.0),
            Shape::Curve(c) => (5.0, c),
            Shape::Squared => (6.0, 0.0),
            Shape::Cubic => (7.0, 0.0),
        }
    }
}

/// One level-to-level segment of an envelope.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub level: f32,
    pub time: f32,
    pub shape: Shape,
}

/// A breakpoint envelope: an initial level, a sequence of segments, and
/// optional release/loop node indices for use with a gated `EnvGen`.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    pub init_level: f32,
    pub segments: Vec<Segment>,
    /// Index of the segment the envelope releases from when its gate
    /// closes, or `-99` if it has no sustain/release split.
    pub release_node: i32,
    /// Index of a segment the envelope loops back to, or `-99`.
    pub loop_node: i32,
}

impl Envelope {
    pub fn new(levels: &[f32], times: &[f32], shape: Shape) -> Result<Envelope> {
        if levels.is_empty() {
            return Err(GraphError::EnvelopeShape("envelope needs at least one level".into()));
        }
        if times.len() != levels.len() - 1 {
            return Err(GraphError::EnvelopeShape(format!(
                "expected {} segment times for {} levels, got {}",
                levels.len() - 1,
                levels.len(),
                times.len()
            )));
        }
        let segments = levels[1..]
            .iter()
            .zip(times.iter())
            .map(|(&level, &time)| Segment { level, time, shape })
            .collect();
        Ok(Envelope {
            init_level: levels[0],
            segments,
            release_node: -99,
            loop_node: -99,
        })
    }

    /// A percussive attack/release envelope with the default linear
    /// shape and unit peak level, matching the worked example in
    /// spec.md §4.7/§8 (`Envelope::percussive(0.01, 1.0)`). For a
    /// curved percussive envelope, use [`Envelope::perc_curved`].
    pub fn perc(attack: f32, release: f32) -> Envelope {
        Envelope {
            init_level: 0.0,
            segments: vec![
                Segment { level: 1.0, time: attack, shape: Shape::Linear },
                Segment { level: 0.0, time: release, shape: Shape::Linear },
            ],
            release_node: -99,
            loop_node: -99,
        }
    }

    /// A percussive attack/release envelope with an explicit peak level
    /// and curvature (teacher's `Env::perc`). `curve == 0.0` degenerates
    /// to the same linear shape as [`Envelope::perc`].
    pub fn perc_curved(attack: f32, release: f32, level: f32, curve: f32) -> Envelope {
        let shape = if curve == 0.0 { Shape::Linear } else { Shape::Curve(curve) };
        Envelope {
            init_level: 0.0,
            segments: vec![
                Segment { level, time: attack, shape },
                Segment { level: 0.0, time: release, shape },
            ],
            release_node: -99,
            loop_node: -99,
        }
    }

    /// A sustaining attack/decay/sustain/release envelope (teacher's
    /// `Env::adsr`). `release_node` points at the release segment so a
    /// gated `EnvGen` holds at the sustain level until the gate closes.
    pub fn adsr(attack: f32, decay: f32, sustain: f32, release: f32, level: f32, curve: f32) -> Envelope {
        Envelope {
            init_level: 0.0,
            segments: vec![
                Segment { level, time: attack, shape: Shape::Curve(curve) },
                Segment { level: sustain * level, time: decay, shape: Shape::Curve(curve) },
                Segment { level: sustain * level, time: release, shape: Shape::Curve(curve) },
                Segment { level: 0.0, time: release, shape: Shape::Curve(curve) },
            ],
            release_node: 2,
            loop_node: -99,
        }
    }

    /// Attack/sustain/release (teacher's `Env::asr`).
    pub fn asr(attack: f32, sustain_level: f32, release: f32, curve: f32) -> Envelope {
        Envelope {
            init_level: 0.0,
            segments: vec![
                Segment { level: sustain_level, time: attack, shape: Shape::Curve(curve) },
                Segment { level: sustain_level, time: release, shape: Shape::Curve(curve) },
                Segment { level: 0.0, time: release, shape: Shape::Curve(curve) },
            ],
            release_node: 1,
            loop_node: -99,
        }
    }

    /// A symmetric rise/fall envelope (teacher's `Env::triangle`).
    pub fn triangle(duration: f32, level: f32) -> Envelope {
        Envelope {
            init_level: 0.0,
            segments: vec![
                Segment { level, time: duration / 2.0, shape: Shape::Linear },
                Segment { level: 0.0, time: duration / 2.0, shape: Shape::Linear },
            ],
            release_node: -99,
            loop_node: -99,
        }
    }

    /// Flatten into the tuple `EnvGen` expects: `init_level, num_stages,
    /// release_node, loop_node`, followed by `level, time, shape, curve`
    /// for each segment in order (spec.md §4.7).
    pub fn flatten(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(4 + self.segments.len() * 4);
        out.push(self.init_level);
        out.push(self.segments.len() as f32);
        out.push(self.release_node as f32);
        out.push(self.loop_node as f32);
        for seg in &self.segments {
            let (shape_code, curve) = seg.shape.codes();
            out.push(seg.level);
            out.push(seg.time);
            out.push(shape_code);
            out.push(curve);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_envelope_flattens_to_expected_layout() {
        let env = Envelope::new(&[0.0, 1.0, 0.0], &[0.1, 0.2], Shape::Linear).unwrap();
        let flat = env.flatten();
        assert_eq!(flat[0], 0.0); // init_level
        assert_eq!(flat[1], 2.0); // num_stages
        assert_eq!(flat[2], -99.0); // release_node
        assert_eq!(flat[3], -99.0); // loop_node
        assert_eq!(&flat[4..8], &[1.0, 0.1, 1.0, 0.0]);
        assert_eq!(&flat[8..12], &[0.0, 0.2, 1.0, 0.0]);
    }

    #[test]
    fn mismatched_lengths_reject() {
        assert!(Envelope::new(&[0.0, 1.0], &[0.1, 0.2], Shape::Linear).is_err());
    }

    #[test]
    fn adsr_sets_release_node() {
        let env = Envelope::adsr(0.01, 0.2, 0.5, 0.3, 1.0, -4.0);
        assert_eq!(env.release_node, 2);
        assert_eq!(env.segments.len(), 4);
    }

    #[test]
    fn perc_has_no_release_node() {
        let env = Envelope::perc_curved(0.01, 1.0, 1.0, -4.0);
        assert_eq!(env.release_node, -99);
        assert_eq!(env.loop_node, -99);
    }

    #[test]
    fn curve_shape_carries_value_into_flattened_tuple() {
        let env = Envelope::perc_curved(0.01, 0.5, 1.0, -4.0);
        let flat = env.flatten();
        assert_eq!(flat[6], 5.0); // shape code for Curve
        assert_eq!(flat[7], -4.0); // curve value
    }

    #[test]
    fn percussive_two_arg_matches_worked_example() {
        let env = Envelope::perc(0.01, 1.0);
        let flat = env.flatten();
        assert_eq!(flat[2], -99.0); // release_node
        assert_eq!(flat[3], -99.0); // loop_node
        assert_eq!(flat[4], 1.0); // peak level
        assert_eq!(flat[6], 1.0); // shape code for Linear
    }
}

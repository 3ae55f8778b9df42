//! Multichannel expansion for ordinary UGen constructors.
//!
//! spec.md §4.4: when any argument to a UGen constructor is a
//! `Signal::Vector`, the UGen is instantiated once per channel (longest
//! vector wins; shorter vectors and bare scalars wrap/broadcast) and the
//! constructor returns a `Signal::Vector` of the per-channel outputs.
//! This has no direct teacher analogue — the teacher's generated UGen
//! wrappers (`build.rs`) are scalar-only — so the shape below is new,
//! grounded only in the general "build inputs, then add_node" pattern
//! used throughout `helpers.rs` and `rhainodes.rs`.

use crate::errors::{GraphError, Result};
use crate::signal::Signal;

/// The widest channel count among a UGen call's arguments, or 1 if none
/// of them are vectors.
pub fn expansion_width(args: &[&Signal]) -> usize {
    args.iter()
        .map(|s| s.channels())
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Expand each argument to `width` channels. A scalar broadcasts to
/// every channel; a vector argument must be either exactly `width` long
/// (taken as-is) or exactly length 1 (broadcast like a scalar). Any
/// other vector length — including empty — is an asymmetric-length
/// mismatch and is rejected rather than wrapped (spec.md §4.1): wrapping
/// a length-2 vector into a width-3 call would silently drop the
/// argument's true shape instead of surfacing the mistake.
pub fn expand_to_width(args: &[&Signal], width: usize) -> Result<Vec<Vec<Signal>>> {
    args.iter()
        .map(|s| match s {
            Signal::Vector(xs) => {
                if xs.len() == width {
                    Ok(xs.clone())
                } else if xs.len() == 1 {
                    Ok(std::iter::repeat(xs[0].clone()).take(width).collect())
                } else {
                    Err(GraphError::MultichannelLengthMismatch { left: xs.len(), right: width })
                }
            }
            scalar => Ok(std::iter::repeat((*scalar).clone()).take(width).collect()),
        })
        .collect()
}

/// Build a `Signal` from `width` per-channel values: a bare scalar when
/// `width == 1` (so single-channel UGen calls stay ergonomic), a
/// `Signal::Vector` otherwise.
pub fn collapse(mut channels: Vec<Signal>) -> Signal {
    if channels.len() == 1 {
        channels.pop().expect("len checked above")
    } else {
        Signal::Vector(channels)
    }
}

/// Call `make_one` once per expanded channel and collapse the results.
/// `make_one` receives the per-channel argument slice in the same order
/// as `args`.
pub fn expand_call(
    args: &[&Signal],
    make_one: impl Fn(&[Signal]) -> Result<Signal>,
) -> Result<Signal> {
    let width = expansion_width(args);
    if width == 1 {
        let scalar_args: Vec<Signal> = args.iter().map(|s| (*s).clone()).collect();
        return make_one(&scalar_args);
    }
    let expanded = expand_to_width(args, width)?;
    let mut outputs = Vec::with_capacity(width);
    for i in 0..width {
        let per_channel: Vec<Signal> = expanded.iter().map(|col| col[i].clone()).collect();
        outputs.push(make_one(&per_channel)?);
    }
    Ok(collapse(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_is_one_for_all_scalars() {
        let a = Signal::Const(1.0);
        let b = Signal::Const(2.0);
        assert_eq!(expansion_width(&[&a, &b]), 1);
    }

    #[test]
    fn width_matches_longest_vector() {
        let a = Signal::Vector(vec![Signal::Const(1.0), Signal::Const(2.0), Signal::Const(3.0)]);
        let b = Signal::Const(0.0);
        assert_eq!(expansion_width(&[&a, &b]), 3);
    }

    #[test]
    fn length_one_vector_broadcasts_to_width() {
        let a = Signal::Vector(vec![Signal::Const(5.0)]);
        let b = Signal::Const(9.0);
        let expanded = expand_to_width(&[&a, &b], 3).unwrap();
        assert_eq!(expanded[0], vec![Signal::Const(5.0), Signal::Const(5.0), Signal::Const(5.0)]);
        assert_eq!(expanded[1], vec![Signal::Const(9.0), Signal::Const(9.0), Signal::Const(9.0)]);
    }

    #[test]
    fn asymmetric_vector_lengths_reject() {
        let a = Signal::Vector(vec![Signal::Const(1.0), Signal::Const(2.0)]);
        let b = Signal::Const(9.0);
        let err = expand_to_width(&[&a, &b], 3).unwrap_err();
        assert!(matches!(err, GraphError::MultichannelLengthMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn collapse_single_channel_stays_scalar() {
        let s = collapse(vec![Signal::Const(1.0)]);
        assert_eq!(s, Signal::Const(1.0));
    }

    #[test]
    fn empty_vector_argument_errors() {
        let a = Signal::Vector(vec![]);
        let b = Signal::Const(1.0);
        assert!(expand_to_width(&[&a, &b], 2).is_err());
    }
}

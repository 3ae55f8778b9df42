//! Calculation rates and parameter rates.
//!
//! [`CalculationRate`] is the per-UGen rate tag serialized into the SCgf
//! format. [`ParameterRate`] is the richer rate vocabulary available to
//! SynthDef parameters, which materialize as one of the Control-family
//! UGens at `build()` time.

/// Rate at which a UGen is calculated.
///
/// Ordering matters: `Scalar < Control < Audio < Demand`. Binary
/// operator rate promotion takes the maximum rate of its inputs under
/// this ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CalculationRate {
    /// Calculated once at synth instantiation.
    Scalar = 0,
    /// Calculated once per control block (~64 samples).
    Control = 1,
    /// Calculated every sample.
    Audio = 2,
    /// Calculated on demand (demand-rate UGens pulled by a consumer).
    Demand = 3,
}

impl CalculationRate {
    /// Byte value written into the SCgf UGen record.
    ///
    /// Demand rate shares scsynth's historical audio-rate byte value
    /// (demand UGens are tagged via their class, not a distinct on-wire
    /// rate byte).
    pub fn as_byte(self) -> u8 {
        match self {
            CalculationRate::Scalar => 0,
            CalculationRate::Control => 1,
            CalculationRate::Audio => 2,
            CalculationRate::Demand => 3,
        }
    }

    /// The maximum of a set of rates, used for binary-op rate promotion.
    pub fn max_of(rates: impl IntoIterator<Item = CalculationRate>) -> CalculationRate {
        rates
            .into_iter()
            .max()
            .unwrap_or(CalculationRate::Scalar)
    }
}

/// Rate at which a SynthDef parameter is exposed.
///
/// Distinct from [`CalculationRate`]: `Trigger` has no UGen-rate
/// equivalent, and `Scalar` parameters never appear as Control UGen
/// outputs at all (they are baked into the constant pool via their
/// default — see §4.5 step 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParameterRate {
    /// Initialization-only; not updatable after the synth is created.
    Scalar,
    /// Standard control-rate parameter, settable via `/n_set`.
    Control,
    /// Like Control, but designed for momentary trigger values.
    Trigger,
    /// Audio-rate parameter (rare; used for audio-rate control input).
    Audio,
}

impl ParameterRate {
    /// The [`CalculationRate`] of the Control-family UGen that exposes
    /// parameters of this rate.
    pub fn calculation_rate(self) -> CalculationRate {
        match self {
            ParameterRate::Scalar => CalculationRate::Scalar,
            ParameterRate::Control | ParameterRate::Trigger => CalculationRate::Control,
            ParameterRate::Audio => CalculationRate::Audio,
        }
    }

    /// The name of the synthetic Control-family UGen used to materialize
    /// parameters of this rate (§3 "Control / LagControl / TrigControl / AudioControl").
    pub fn control_ugen_name(self, lagged: bool) -> &'static str {
        match self {
            ParameterRate::Scalar => "Control",
            ParameterRate::Control if lagged => "LagControl",
            ParameterRate::Control => "Control",
            ParameterRate::Trigger => "TrigControl",
            ParameterRate::Audio => "AudioControl",
        }
    }
}

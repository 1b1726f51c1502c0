//! The activation function library: scalar activators addressed by tag,
//! plus the module activators used by modular networks.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Tag identifying the scalar activation function a node applies
/// to its input sum.
///
/// Functions are data: nodes store a tag, and evaluation goes through
/// [`ActivationKind::apply`]. Serialized forms use the full function
/// names, which are also the tags appearing in fast-network models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivationKind {
    #[serde(rename = "SigmoidSteepenedActivation")]
    SigmoidSteepened,
    #[serde(rename = "SigmoidPlainActivation")]
    SigmoidPlain,
    #[serde(rename = "SigmoidReducedActivation")]
    SigmoidReduced,
    #[serde(rename = "SigmoidBipolarActivation")]
    SigmoidBipolar,
    #[serde(rename = "SigmoidApproximationActivation")]
    SigmoidApproximation,
    #[serde(rename = "SigmoidSteepenedApproximationActivation")]
    SigmoidSteepenedApproximation,
    #[serde(rename = "SigmoidInverseAbsActivation")]
    SigmoidInverseAbs,
    #[serde(rename = "SigmoidLeftShiftedActivation")]
    SigmoidLeftShifted,
    #[serde(rename = "SigmoidLeftShiftedSteepenedActivation")]
    SigmoidLeftShiftedSteepened,
    #[serde(rename = "SigmoidRightShiftedSteepenedActivation")]
    SigmoidRightShiftedSteepened,
    #[serde(rename = "TanhActivation")]
    Tanh,
    #[serde(rename = "GaussianBipolarActivation")]
    GaussianBipolar,
    #[serde(rename = "LinearActivation")]
    Linear,
    #[serde(rename = "LinearAbsActivation")]
    LinearAbs,
    #[serde(rename = "LinearClippedActivation")]
    LinearClipped,
    #[serde(rename = "NullActivation")]
    Null,
    #[serde(rename = "SignActivation")]
    Sign,
    #[serde(rename = "SineActivation")]
    Sine,
    #[serde(rename = "SquareActivation")]
    Square,
    #[serde(rename = "CubeActivation")]
    Cube,
    #[serde(rename = "ExponentialActivation")]
    Exponential,
}

/// Slope of the steepened sigmoid used as the default activator.
const SIGMOID_STEEPNESS: f64 = 4.924273;

impl ActivationKind {
    /// Evaluates the function at `x`.
    ///
    /// # Examples
    /// ```
    /// use evoneat::networks::ActivationKind;
    ///
    /// assert_eq!(ActivationKind::Linear.apply(1.5), 1.5);
    /// assert_eq!(ActivationKind::Null.apply(1.5), 0.0);
    /// assert!((ActivationKind::SigmoidPlain.apply(0.0) - 0.5).abs() < 1e-12);
    /// ```
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::SigmoidSteepened => 1.0 / (1.0 + (-SIGMOID_STEEPNESS * x).exp()),
            Self::SigmoidPlain => 1.0 / (1.0 + (-x).exp()),
            Self::SigmoidReduced => 1.0 / (1.0 + (-0.5 * x).exp()),
            Self::SigmoidBipolar => 2.0 / (1.0 + (-SIGMOID_STEEPNESS * x).exp()) - 1.0,
            Self::SigmoidApproximation => 0.5 + x / (2.0 * (1.0 + x.abs())),
            Self::SigmoidSteepenedApproximation => {
                let x = SIGMOID_STEEPNESS * x;
                0.5 + x / (2.0 * (1.0 + x.abs()))
            }
            Self::SigmoidInverseAbs => x / (1.0 + x.abs()),
            Self::SigmoidLeftShifted => 1.0 / (1.0 + (-(x + 2.4621365)).exp()),
            Self::SigmoidLeftShiftedSteepened => {
                1.0 / (1.0 + (-SIGMOID_STEEPNESS * (x + 2.4621365)).exp())
            }
            Self::SigmoidRightShiftedSteepened => {
                1.0 / (1.0 + (-SIGMOID_STEEPNESS * (x - 2.4621365)).exp())
            }
            Self::Tanh => (0.9 * x).tanh(),
            Self::GaussianBipolar => 2.0 * (-(2.5 * x).powi(2)).exp() - 1.0,
            Self::Linear => x,
            Self::LinearAbs => x.abs(),
            Self::LinearClipped => x.clamp(-1.0, 1.0),
            Self::Null => 0.0,
            Self::Sign => {
                if x == 0.0 {
                    0.0
                } else {
                    x.signum()
                }
            }
            Self::Sine => (2.0 * x).sin(),
            Self::Square => x * x,
            Self::Cube => x * x * x,
            Self::Exponential => x.exp(),
        }
    }

    /// Returns the function's canonical name, as used in serialized
    /// network models.
    pub fn name(self) -> &'static str {
        match self {
            Self::SigmoidSteepened => "SigmoidSteepenedActivation",
            Self::SigmoidPlain => "SigmoidPlainActivation",
            Self::SigmoidReduced => "SigmoidReducedActivation",
            Self::SigmoidBipolar => "SigmoidBipolarActivation",
            Self::SigmoidApproximation => "SigmoidApproximationActivation",
            Self::SigmoidSteepenedApproximation => "SigmoidSteepenedApproximationActivation",
            Self::SigmoidInverseAbs => "SigmoidInverseAbsActivation",
            Self::SigmoidLeftShifted => "SigmoidLeftShiftedActivation",
            Self::SigmoidLeftShiftedSteepened => "SigmoidLeftShiftedSteepenedActivation",
            Self::SigmoidRightShiftedSteepened => "SigmoidRightShiftedSteepenedActivation",
            Self::Tanh => "TanhActivation",
            Self::GaussianBipolar => "GaussianBipolarActivation",
            Self::Linear => "LinearActivation",
            Self::LinearAbs => "LinearAbsActivation",
            Self::LinearClipped => "LinearClippedActivation",
            Self::Null => "NullActivation",
            Self::Sign => "SignActivation",
            Self::Sine => "SineActivation",
            Self::Square => "SquareActivation",
            Self::Cube => "CubeActivation",
            Self::Exponential => "ExponentialActivation",
        }
    }

    /// Looks up a function by its canonical name.
    pub fn from_name(name: &str) -> Option<ActivationKind> {
        ALL_ACTIVATIONS.iter().copied().find(|a| a.name() == name)
    }
}

impl fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Every available scalar activator, in declaration order.
pub const ALL_ACTIVATIONS: [ActivationKind; 21] = [
    ActivationKind::SigmoidSteepened,
    ActivationKind::SigmoidPlain,
    ActivationKind::SigmoidReduced,
    ActivationKind::SigmoidBipolar,
    ActivationKind::SigmoidApproximation,
    ActivationKind::SigmoidSteepenedApproximation,
    ActivationKind::SigmoidInverseAbs,
    ActivationKind::SigmoidLeftShifted,
    ActivationKind::SigmoidLeftShiftedSteepened,
    ActivationKind::SigmoidRightShiftedSteepened,
    ActivationKind::Tanh,
    ActivationKind::GaussianBipolar,
    ActivationKind::Linear,
    ActivationKind::LinearAbs,
    ActivationKind::LinearClipped,
    ActivationKind::Null,
    ActivationKind::Sign,
    ActivationKind::Sine,
    ActivationKind::Square,
    ActivationKind::Cube,
    ActivationKind::Exponential,
];

/// Tag identifying the opaque sub-activation a module performs over
/// its input group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleActivationKind {
    #[serde(rename = "MultiplyModuleActivation")]
    Multiply,
    #[serde(rename = "MaxModuleActivation")]
    Max,
    #[serde(rename = "MinModuleActivation")]
    Min,
}

impl ModuleActivationKind {
    /// Evaluates the module over its gathered inputs.
    ///
    /// # Examples
    /// ```
    /// use evoneat::networks::ModuleActivationKind;
    ///
    /// assert_eq!(ModuleActivationKind::Multiply.apply(&[2.0, 3.0, 4.0]), 24.0);
    /// assert_eq!(ModuleActivationKind::Max.apply(&[2.0, 3.0]), 3.0);
    /// assert_eq!(ModuleActivationKind::Min.apply(&[2.0, 3.0]), 2.0);
    /// ```
    pub fn apply(self, inputs: &[f64]) -> f64 {
        match self {
            Self::Multiply => inputs.iter().product(),
            Self::Max => inputs.iter().copied().fold(f64::MIN, f64::max),
            Self::Min => inputs.iter().copied().fold(f64::MAX, f64::min),
        }
    }

    /// Returns the module's canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Multiply => "MultiplyModuleActivation",
            Self::Max => "MaxModuleActivation",
            Self::Min => "MinModuleActivation",
        }
    }

    /// Looks up a module activator by its canonical name.
    pub fn from_name(name: &str) -> Option<ModuleActivationKind> {
        [Self::Multiply, Self::Max, Self::Min]
            .into_iter()
            .find(|m| m.name() == name)
    }
}

impl fmt::Display for ModuleActivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigmoids_are_bounded() {
        for kind in [
            ActivationKind::SigmoidSteepened,
            ActivationKind::SigmoidPlain,
            ActivationKind::SigmoidReduced,
            ActivationKind::SigmoidApproximation,
            ActivationKind::SigmoidSteepenedApproximation,
            ActivationKind::SigmoidLeftShifted,
            ActivationKind::SigmoidLeftShiftedSteepened,
            ActivationKind::SigmoidRightShiftedSteepened,
        ] {
            for i in -100..=100 {
                let y = kind.apply(i as f64 / 10.0);
                assert!((0.0..=1.0).contains(&y), "{} out of range: {}", kind, y);
            }
        }
    }

    #[test]
    fn name_round_trip() {
        for kind in ALL_ACTIVATIONS {
            assert_eq!(ActivationKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ActivationKind::from_name("NoSuchActivation"), None);
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&ActivationKind::SigmoidSteepened).unwrap();
        assert_eq!(json, "\"SigmoidSteepenedActivation\"");
        let back: ActivationKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ActivationKind::SigmoidSteepened);
    }

    #[test]
    fn module_names_round_trip() {
        for kind in [
            ModuleActivationKind::Multiply,
            ModuleActivationKind::Max,
            ModuleActivationKind::Min,
        ] {
            assert_eq!(ModuleActivationKind::from_name(kind.name()), Some(kind));
        }
    }
}

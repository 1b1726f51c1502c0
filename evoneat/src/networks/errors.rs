use std::error::Error;
use std::fmt;
use std::io;

/// An error raised while driving signals through a network.
#[derive(Debug)]
pub enum ActivationError {
    /// A node's activation evaluated to NaN or infinity. The evaluator
    /// should assign minimum fitness to the offending organism.
    NumericalFailure { node: usize },
    /// Depth traversal exceeded the loop cutoff, indicating a cycle.
    DepthLoop { cutoff: usize },
    /// The sensor vector length does not match the input node count.
    WrongInputCount { expected: usize, got: usize },
    /// A node retained activation state after a flush.
    FlushResidue { node: usize },
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NumericalFailure { node } => {
                write!(f, "activation of node {} is not finite", node)
            }
            Self::DepthLoop { cutoff } => {
                write!(f, "depth exceeds {} levels, network appears to loop", cutoff)
            }
            Self::WrongInputCount { expected, got } => {
                write!(f, "expected {} sensor values, got {}", expected, got)
            }
            Self::FlushResidue { node } => {
                write!(f, "node {} still holds activation state after flush", node)
            }
        }
    }
}

impl Error for ActivationError {}

/// An error raised while assembling a network from explicit parts.
#[derive(Debug, PartialEq, Eq)]
pub enum NetworkBuildError {
    /// Two nodes share an id.
    DuplicateNodeId(usize),
    /// A link or module references a node id that was never declared.
    UnknownNode(usize),
    /// A link targets a sensor node.
    SensorTarget(usize),
}

impl fmt::Display for NetworkBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId(id) => write!(f, "duplicate network node id {}", id),
            Self::UnknownNode(id) => write!(f, "reference to undeclared network node {}", id),
            Self::SensorTarget(id) => write!(f, "link targets sensor node {}", id),
        }
    }
}

impl Error for NetworkBuildError {}

/// An error raised while reading or writing a fast-network model.
#[derive(Debug)]
pub enum ModelError {
    /// The underlying stream failed.
    Io(io::Error),
    /// The JSON was malformed.
    Json(serde_json::Error),
    /// The model's counts or indices do not describe a coherent network.
    Inconsistent(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read or write model: {}", e),
            Self::Json(e) => write!(f, "malformed model JSON: {}", e),
            Self::Inconsistent(reason) => write!(f, "inconsistent model: {}", reason),
        }
    }
}

impl Error for ModelError {}

impl From<io::Error> for ModelError {
    fn from(e: io::Error) -> ModelError {
        ModelError::Io(e)
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> ModelError {
        ModelError::Json(e)
    }
}

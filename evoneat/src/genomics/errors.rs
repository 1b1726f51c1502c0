use crate::Innovation;

use std::error::Error;
use std::fmt;
use std::io;

/// An error indicating a genome violates one of its structural
/// invariants. Genomes that fail validation must never enter a
/// population.
#[derive(Debug, PartialEq, Eq)]
pub enum GenomeValidityError {
    /// Two nodes share an id.
    DuplicateNodeId(usize),
    /// A gene references a node id absent from the node list.
    DanglingEndpoint { innovation: Innovation, node: usize },
    /// Two genes share a (source, target, recurrent) triple.
    DuplicateGeneEndpoints {
        in_node: usize,
        out_node: usize,
        recurrent: bool,
    },
    /// Gene innovation numbers are not strictly increasing.
    OutOfOrderInnovations {
        previous: Innovation,
        found: Innovation,
    },
    /// A gene targets a sensor node.
    SensorTarget { innovation: Innovation, node: usize },
    /// A node or gene references a trait id absent from the trait list.
    UnknownTrait(usize),
}

impl fmt::Display for GenomeValidityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateNodeId(id) => write!(f, "duplicate node id {}", id),
            Self::DanglingEndpoint { innovation, node } => write!(
                f,
                "gene {} references nonexistent node {}",
                innovation, node
            ),
            Self::DuplicateGeneEndpoints {
                in_node,
                out_node,
                recurrent,
            } => write!(
                f,
                "duplicate gene between {} and {} (recurrent: {})",
                in_node, out_node, recurrent
            ),
            Self::OutOfOrderInnovations { previous, found } => write!(
                f,
                "gene innovation {} follows {} out of order",
                found, previous
            ),
            Self::SensorTarget { innovation, node } => {
                write!(f, "gene {} targets sensor node {}", innovation, node)
            }
            Self::UnknownTrait(id) => write!(f, "reference to nonexistent trait {}", id),
        }
    }
}

impl Error for GenomeValidityError {}

/// An error indicating a mutation operator could not find a legal site.
/// These are routine: callers log them at debug level and move on.
#[derive(Debug, PartialEq, Eq)]
pub enum MutationError {
    /// Add-link exhausted its attempts without a viable node pair.
    NoLinkSiteFound,
    /// Add-node found no enabled gene to split.
    NoSplittableGene,
    /// The genome has no genes to operate on.
    EmptyGenome,
}

impl fmt::Display for MutationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLinkSiteFound => write!(f, "no viable node pair found for add-link mutation"),
            Self::NoSplittableGene => write!(f, "no enabled gene available for add-node mutation"),
            Self::EmptyGenome => write!(f, "mutation attempted on genome with no genes"),
        }
    }
}

impl Error for MutationError {}

/// An error produced while parsing a genome from its text format.
#[derive(Debug)]
pub enum GenomeParseError {
    /// The underlying reader failed.
    Io(io::Error),
    /// A record line is malformed.
    BadRecord { line: usize, reason: String },
    /// The stream ended before `genomeend`.
    UnexpectedEof,
    /// The parsed genome failed validation.
    Invalid(GenomeValidityError),
}

impl GenomeParseError {
    pub(crate) fn bad_record(line: usize, reason: impl Into<String>) -> GenomeParseError {
        GenomeParseError::BadRecord {
            line,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for GenomeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read genome: {}", e),
            Self::BadRecord { line, reason } => {
                write!(f, "line {}: malformed genome record: {}", line, reason)
            }
            Self::UnexpectedEof => write!(f, "genome stream ended before genomeend"),
            Self::Invalid(e) => write!(f, "parsed genome is invalid: {}", e),
        }
    }
}

impl Error for GenomeParseError {}

impl From<io::Error> for GenomeParseError {
    fn from(e: io::Error) -> GenomeParseError {
        GenomeParseError::Io(e)
    }
}

impl From<GenomeValidityError> for GenomeParseError {
    fn from(e: GenomeValidityError) -> GenomeParseError {
        GenomeParseError::Invalid(e)
    }
}

use crate::genomics::{GenomeParseError, GenomeValidityError};

use std::error::Error;
use std::fmt;

/// An error that aborts an epoch. Offspring that violate genome
/// invariants must never enter the population, so these are surfaced
/// instead of recovered.
#[derive(Debug)]
pub enum EpochError {
    /// Total adjusted fitness is zero, leaving nothing to select on.
    DegeneratePopulation,
    /// Reproduction produced a structurally invalid genome.
    InvalidOffspring(GenomeValidityError),
    /// A species was allotted offspring but has no surviving parents.
    NoParents { species: usize },
}

impl fmt::Display for EpochError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DegeneratePopulation => {
                write!(f, "population is degenerate: total adjusted fitness is zero")
            }
            Self::InvalidOffspring(e) => write!(f, "reproduction produced invalid genome: {}", e),
            Self::NoParents { species } => {
                write!(f, "species {} has offspring allotted but no parents", species)
            }
        }
    }
}

impl Error for EpochError {}

impl From<GenomeValidityError> for EpochError {
    fn from(e: GenomeValidityError) -> EpochError {
        EpochError::InvalidOffspring(e)
    }
}

/// An error produced while reading a population dump.
#[derive(Debug)]
pub enum PopulationParseError {
    /// A genome record failed to parse or validate.
    Genome(GenomeParseError),
    /// The stream held no genomes at all.
    NoGenomes,
}

impl fmt::Display for PopulationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Genome(e) => write!(f, "failed to read population: {}", e),
            Self::NoGenomes => write!(f, "population stream holds no genomes"),
        }
    }
}

impl Error for PopulationParseError {}

impl From<GenomeParseError> for PopulationParseError {
    fn from(e: GenomeParseError) -> PopulationParseError {
        PopulationParseError::Genome(e)
    }
}

//! An implementation of NeuroEvolution of Augmenting Topologies,
//! following the 2002 paper: <http://nn.cs.utexas.edu/keyword?stanley:ec02>
//!
//! Populations of small neural networks are evolved by genetic search,
//! optimizing connection weights and network topology at the same time.
//! Starting from a minimal seed genome, repeated rounds of reproduction,
//! mutation and selection produce progressively more capable networks for
//! a caller-defined fitness task.
//!
//! The crate is split the way the algorithm is:
//! - [`genomics`]: the heritable description of a network — traits, nodes,
//!   genes, historical markings, mutation and crossover operators.
//! - [`networks`]: the phenotypes — a graph-form network for iterative
//!   relaxation and a flat fast-form solver for evaluation loops.
//! - [`populations`]: organisms, species and the population-level epoch
//!   cycle (fitness sharing, offspring allotment, re-speciation).
//! - [`config`]: the flat key-value parameter set shared by all of the above.
//!
//! All stochastic operations take an explicit `&mut impl Rng`, so runs are
//! reproducible given a seeded generator.
//!
//! # Example usage: a few generations of XOR evolution
//! ```
//! use evoneat::config::Config;
//! use evoneat::populations::Population;
//! use rand::rngs::SmallRng;
//! use rand::SeedableRng;
//!
//! let mut rng = SmallRng::seed_from_u64(42);
//! let config = Config {
//!     pop_size: 50,
//!     compat_threshold: 3.0,
//!     ..Config::default()
//! };
//!
//! let mut population = Population::new_random(&mut rng, 3, 1, 2, false, 0.5, &config).unwrap();
//! for generation in 1..=5 {
//!     population.evaluate(|organism| {
//!         // Stand-in for a real fitness task.
//!         let complexity = organism.genome().extrons() as f64;
//!         organism.fitness = 1.0 / (1.0 + complexity);
//!     });
//!     population.epoch(generation, &mut rng).unwrap();
//! }
//! assert_eq!(population.organisms().count(), 50);
//! ```

pub mod config;
pub mod genomics;
pub mod networks;
pub mod populations;

/// Identifier type for historical markings: every structural novelty
/// (a new gene, a node split) is tagged with one of these, and identical
/// novelties arising in the same generation share the same value.
pub type Innovation = usize;

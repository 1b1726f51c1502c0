use crate::genomics::Genome;
use crate::networks::Network;

use std::cmp::Ordering;
use std::fmt;

/// The binding of a genome to its phenotype, plus fitness and lineage
/// bookkeeping.
///
/// Organisms are created by reproduction, evaluated, possibly
/// reproduced from, and discarded at the end of their generation unless
/// carried forward as elites.
#[derive(Clone, Debug)]
pub struct Organism {
    /// Working fitness. Raw after evaluation; divided and penalized in
    /// place when species fitness sharing runs.
    pub fitness: f64,
    /// Raw fitness as reported by the evaluator, kept for reporting.
    pub original_fitness: f64,
    /// Task error reported by the evaluator, when it has one.
    pub error: f64,
    /// Set by the evaluator when the organism meets the task threshold.
    pub is_winner: bool,
    /// Marked during selection; eliminated organisms do not reproduce.
    pub is_eliminated: bool,
    /// Whether this organism is its species' champion.
    pub is_champion: bool,
    /// Whether this organism was cloned from a champion.
    pub is_champion_child: bool,
    /// Whether this organism came from the mutate-only path.
    pub mutation_struct_baby: bool,
    /// Whether this organism came from a mating.
    pub mate_baby: bool,
    /// Offspring this organism is expected to contribute.
    pub expected_offspring: f64,
    /// Generation in which the organism was born.
    pub generation: usize,
    genome: Genome,
    phenotype: Option<Network>,
}

impl Organism {
    /// Wraps a genome into a fresh, unevaluated organism.
    pub fn new(genome: Genome, generation: usize) -> Organism {
        Organism {
            fitness: 0.0,
            original_fitness: 0.0,
            error: 0.0,
            is_winner: false,
            is_eliminated: false,
            is_champion: false,
            is_champion_child: false,
            mutation_struct_baby: false,
            mate_baby: false,
            expected_offspring: 0.0,
            generation,
            genome,
            phenotype: None,
        }
    }

    /// Returns the organism's id (shared with its genome).
    pub fn id(&self) -> usize {
        self.genome.id()
    }

    /// Returns the organism's genome.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// Returns the organism's phenotype, compiling and caching it on
    /// first use.
    pub fn phenotype(&mut self) -> &mut Network {
        if self.phenotype.is_none() {
            self.phenotype = Some(Network::new(&self.genome, self.genome.id()));
        }
        self.phenotype.as_mut().unwrap()
    }

    /// Discards the cached phenotype so the next access recompiles it.
    pub fn invalidate_phenotype(&mut self) {
        self.phenotype = None;
    }

    /// Compares the cached phenotype against the genome structure.
    /// Returns true when they disagree — a correctness canary run after
    /// crossover, since a mismatch means an invariant was broken.
    pub fn check_damaged(&mut self) -> bool {
        let node_count = self.genome.nodes().count();
        let expressed = self.genome.extrons();
        let network = self.phenotype();
        network.node_count() != node_count || network.link_count() != expressed
    }

    /// Fitness-descending order with ids breaking ties, so sorts are
    /// deterministic under identical seeds.
    ///
    /// # Panics
    /// Panics on NaN fitness, which indicates an evaluator bug.
    pub fn compare_fitness(a: &Organism, b: &Organism) -> Ordering {
        b.fitness
            .partial_cmp(&a.fitness)
            .unwrap_or_else(|| panic!("organism fitness is NaN"))
            .then_with(|| a.id().cmp(&b.id()))
    }
}

impl fmt::Display for Organism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Organism {} (gen {}, fitness {:.4}{})",
            self.id(),
            self.generation,
            self.fitness,
            if self.is_winner { ", winner" } else { "" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{Gene, NeuronType, NodeGene};

    fn genome(id: usize) -> Genome {
        Genome::new(
            id,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Output),
            ],
            vec![Gene::new(1, 1, 2, 1.0, false)],
        )
        .unwrap()
    }

    #[test]
    fn phenotype_is_cached_and_consistent() {
        let mut organism = Organism::new(genome(1), 0);
        assert_eq!(organism.phenotype().node_count(), 2);
        assert!(!organism.check_damaged());
    }

    #[test]
    fn fitness_ordering_breaks_ties_by_id() {
        let mut a = Organism::new(genome(1), 0);
        let mut b = Organism::new(genome(2), 0);
        a.fitness = 1.0;
        b.fitness = 1.0;
        assert_eq!(Organism::compare_fitness(&a, &b), Ordering::Less);
        b.fitness = 2.0;
        assert_eq!(Organism::compare_fitness(&a, &b), Ordering::Greater);
    }
}

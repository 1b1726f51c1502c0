use super::errors::EpochError;
use super::organism::Organism;
use crate::config::Config;
use crate::genomics::{Genome, InnovationLedger};

use rand::seq::SliceRandom;
use rand::Rng;

use std::fmt;

/// A cohort of genomically compatible organisms.
///
/// Membership is decided by compatibility distance to a representative
/// (the species' first member each generation). Fitness sharing divides
/// each member's fitness by the cohort size, protecting topological
/// innovation from being immediately out-competed. Species stagnant
/// beyond the dropoff age are heavily penalized; species whose member
/// list empties are extinct and removed.
#[derive(Clone, Debug)]
pub struct Species {
    id: usize,
    pub(super) organisms: Vec<Organism>,
    pub(super) representative: Option<Genome>,
    /// Age in generations.
    pub age: usize,
    /// Age at which fitness last improved.
    pub age_of_last_improvement: usize,
    /// Highest raw fitness any member has reached.
    pub max_fitness_ever: f64,
    /// Offspring allotted for the coming generation.
    pub expected_offspring: usize,
    /// Extra champion clones granted by baby stealing.
    pub(super) super_champ_offspring: usize,
    /// Set when population-level stagnation condemns the species.
    pub(super) obliterate: bool,
    /// Scratch flag for evaluators hunting an unchecked champion.
    pub is_checked: bool,
}

impl Species {
    /// Creates an empty species.
    pub fn new(id: usize) -> Species {
        Species {
            id,
            organisms: Vec::new(),
            representative: None,
            age: 1,
            age_of_last_improvement: 0,
            max_fitness_ever: 0.0,
            expected_offspring: 0,
            super_champ_offspring: 0,
            obliterate: false,
            is_checked: false,
        }
    }

    /// Returns the species' id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Adds an organism. The first member becomes the representative.
    pub fn add_organism(&mut self, organism: Organism) {
        if self.representative.is_none() {
            self.representative = Some(organism.genome().clone());
        }
        self.organisms.push(organism);
    }

    /// Returns the genome against which membership is measured.
    pub fn representative(&self) -> Option<&Genome> {
        self.representative.as_ref()
    }

    /// Returns an iterator over the members.
    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.organisms.iter()
    }

    /// Returns a mutable iterator over the members, for evaluators that
    /// re-test specific organisms (e.g. champion generalization runs).
    pub fn organisms_mut(&mut self) -> impl Iterator<Item = &mut Organism> {
        self.organisms.iter_mut()
    }

    /// Returns mutable access to the best member by raw fitness.
    pub fn champion_mut(&mut self) -> Option<&mut Organism> {
        self.organisms.iter_mut().max_by(|a, b| {
            a.original_fitness
                .max(a.fitness)
                .partial_cmp(&b.original_fitness.max(b.fitness))
                .unwrap_or_else(|| panic!("organism fitness is NaN"))
                .then_with(|| b.id().cmp(&a.id()))
        })
    }

    /// Returns the member count.
    pub fn size(&self) -> usize {
        self.organisms.len()
    }

    /// Returns the best member by raw fitness.
    pub fn champion(&self) -> Option<&Organism> {
        self.organisms.iter().max_by(|a, b| {
            a.original_fitness
                .max(a.fitness)
                .partial_cmp(&b.original_fitness.max(b.fitness))
                .unwrap_or_else(|| panic!("organism fitness is NaN"))
                .then_with(|| b.id().cmp(&a.id()))
        })
    }

    /// Returns the highest and mean raw member fitness.
    pub fn compute_max_and_avg_fitness(&self) -> (f64, f64) {
        let mut max = 0.0f64;
        let mut total = 0.0;
        for organism in &self.organisms {
            let fitness = organism.original_fitness.max(organism.fitness);
            max = max.max(fitness);
            total += fitness;
        }
        let avg = if self.organisms.is_empty() {
            0.0
        } else {
            total / self.organisms.len() as f64
        };
        (max, avg)
    }

    /// Generations since fitness last improved.
    pub fn time_since_improvement(&self) -> usize {
        self.age.saturating_sub(self.age_of_last_improvement)
    }

    /// Applies fitness sharing and the age policy, then marks the
    /// non-surviving fraction for elimination.
    ///
    /// Each member's raw fitness is stashed in `original_fitness`; its
    /// working fitness is penalized when the species is stagnant past
    /// the dropoff age (or obliterated), boosted by the age bonus while
    /// the species is young, and finally divided by the species size.
    /// Members are left sorted fitness-descending, the champion marked,
    /// and everything past the survival fraction marked eliminated.
    pub fn adjust_fitness(&mut self, config: &Config) {
        let stagnant = self.time_since_improvement() + 1 > config.dropoff_age;
        let size = self.organisms.len() as f64;

        for organism in &mut self.organisms {
            organism.original_fitness = organism.fitness;
            let mut fitness = organism.fitness;
            if stagnant || self.obliterate {
                fitness *= 0.01;
            }
            if self.age <= 10 {
                fitness *= config.age_significance;
            }
            if fitness <= 0.0 {
                fitness = 0.0001;
            }
            organism.fitness = fitness / size;
        }

        // Track improvement against the all-time record.
        let (max_fitness, _) = self.compute_max_and_avg_fitness();
        if max_fitness > self.max_fitness_ever {
            self.max_fitness_ever = max_fitness;
            self.age_of_last_improvement = self.age;
        }

        self.organisms.sort_unstable_by(Organism::compare_fitness);
        if let Some(first) = self.organisms.first_mut() {
            first.is_champion = true;
        }
        let survivors = self.survivor_count(config);
        for organism in self.organisms.iter_mut().skip(survivors) {
            organism.is_eliminated = true;
        }
    }

    /// Number of members retained as parents.
    fn survivor_count(&self, config: &Config) -> usize {
        (((config.survival_thresh * self.organisms.len() as f64).floor() as usize) + 1)
            .min(self.organisms.len())
    }

    /// Accumulates the members' fractional offspring shares into a whole
    /// offspring count, carrying the remainder in `skim` so nothing is
    /// lost across species.
    pub fn count_offspring(&mut self, mut skim: f64) -> f64 {
        let mut whole = 0usize;
        for organism in &self.organisms {
            whole += organism.expected_offspring.trunc() as usize;
            skim += organism.expected_offspring.fract();
            if skim >= 1.0 {
                whole += skim.trunc() as usize;
                skim -= skim.trunc();
            }
        }
        self.expected_offspring = whole;
        skim
    }

    /// Produces the allotted offspring.
    ///
    /// The first offspring copies the champion unchanged (elitism);
    /// champion clones granted by baby stealing get their weights
    /// jostled instead. The rest take the mutate-only or mate paths at
    /// the configured rates, with a small chance of an interspecies
    /// mating against another species' champion from `other_champions`.
    ///
    /// # Errors
    /// Surfaces invalid offspring (an epoch-fatal invariant violation)
    /// and the no-parents condition.
    pub fn reproduce(
        &mut self,
        generation: usize,
        next_genome_id: &mut usize,
        ledger: &mut InnovationLedger,
        other_champions: &[(Genome, f64)],
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Vec<Organism>, EpochError> {
        if self.expected_offspring == 0 {
            return Ok(Vec::new());
        }
        if self.organisms.is_empty() {
            return Err(EpochError::NoParents { species: self.id });
        }

        let survivors = self.survivor_count(config);
        let parents = &self.organisms[..survivors];
        let champion = &self.organisms[0];
        let mut champion_cloned = false;
        let mut super_champs_made = 0;
        let mut babies = Vec::with_capacity(self.expected_offspring);

        for _ in 0..self.expected_offspring {
            let mut fresh_id = || {
                let id = *next_genome_id;
                *next_genome_id += 1;
                id
            };

            let baby = if super_champs_made < self.super_champ_offspring {
                // A stolen baby: champion structure, jostled weights.
                super_champs_made += 1;
                let mut genome = champion.genome().duplicate(fresh_id());
                genome.mutate_link_weights(rng, config.weight_mut_power, 1.0);
                let mut baby = Organism::new(genome, generation);
                baby.is_champion_child = true;
                baby
            } else if !champion_cloned {
                // Elitism: the champion survives unchanged.
                champion_cloned = true;
                let genome = champion.genome().duplicate(fresh_id());
                let mut baby = Organism::new(genome, generation);
                baby.is_champion_child = true;
                baby
            } else if rng.gen::<f64>() < config.mutate_only_prob || survivors == 1 {
                let parent = parents.choose(rng).unwrap();
                let mut genome = parent.genome().duplicate(fresh_id());
                genome.mutate(ledger, config, rng);
                let mut baby = Organism::new(genome, generation);
                baby.mutation_struct_baby = true;
                baby
            } else {
                let mom = parents.choose(rng).unwrap();
                let interspecies = !other_champions.is_empty()
                    && rng.gen::<f64>() < config.interspecies_mate_rate;
                let (dad_genome, dad_fitness) = if interspecies {
                    let (genome, fitness) = other_champions.choose(rng).unwrap();
                    (genome, *fitness)
                } else {
                    let dad = parents.choose(rng).unwrap();
                    (dad.genome(), dad.original_fitness)
                };

                let variant_total = config.mate_multipoint_prob
                    + config.mate_multipoint_avg_prob
                    + config.mate_singlepoint_prob;
                let pick = if variant_total > 0.0 {
                    rng.gen::<f64>() * variant_total
                } else {
                    0.0
                };
                let mom_genome = mom.genome();
                let mom_fitness = mom.original_fitness;
                let child_genome = if pick < config.mate_multipoint_prob || variant_total == 0.0 {
                    mom_genome.mate_multipoint(
                        dad_genome,
                        fresh_id(),
                        mom_fitness,
                        dad_fitness,
                        config,
                        rng,
                    )?
                } else if pick < config.mate_multipoint_prob + config.mate_multipoint_avg_prob {
                    mom_genome.mate_multipoint_avg(
                        dad_genome,
                        fresh_id(),
                        mom_fitness,
                        dad_fitness,
                        config,
                        rng,
                    )?
                } else {
                    mom_genome.mate_singlepoint(dad_genome, fresh_id(), config, rng)?
                };

                let mut genome = child_genome;
                let parents_identical = mom_genome == dad_genome;
                let mutate_child =
                    rng.gen::<f64>() > config.mate_only_prob || parents_identical;
                if mutate_child {
                    genome.mutate(ledger, config, rng);
                }
                let mut baby = Organism::new(genome, generation);
                baby.mate_baby = true;
                baby.mutation_struct_baby = mutate_child;
                baby
            };
            babies.push(baby);
        }

        self.super_champ_offspring = 0;
        Ok(babies)
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Species {} (age {}, {} members, expecting {})",
            self.id,
            self.age,
            self.organisms.len(),
            self.expected_offspring
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{Gene, NeuronType, NodeGene};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn organism(id: usize, fitness: f64) -> Organism {
        let genome = Genome::new(
            id,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Bias),
                NodeGene::new(3, NeuronType::Output),
            ],
            vec![
                Gene::new(1, 1, 3, 0.5, false),
                Gene::new(2, 2, 3, -0.5, false),
            ],
        )
        .unwrap();
        let mut organism = Organism::new(genome, 0);
        organism.fitness = fitness;
        organism
    }

    fn species_of(fitnesses: &[f64]) -> Species {
        let mut species = Species::new(1);
        for (i, &f) in fitnesses.iter().enumerate() {
            species.add_organism(organism(i + 1, f));
        }
        species
    }

    #[test]
    fn adjust_fitness_shares_and_marks() {
        let config = Config {
            survival_thresh: 0.5,
            age_significance: 1.0,
            ..Config::default()
        };
        let mut species = species_of(&[4.0, 2.0, 1.0, 3.0]);
        species.age = 11; // no age bonus
        species.adjust_fitness(&config);

        // Shared fitness = raw / 4, members sorted descending.
        let shared: Vec<f64> = species.organisms().map(|o| o.fitness).collect();
        assert_eq!(shared, vec![1.0, 0.75, 0.5, 0.25]);
        assert!(species.organisms[0].is_champion);
        // floor(0.5 * 4) + 1 = 3 survivors.
        let eliminated: Vec<bool> = species.organisms().map(|o| o.is_eliminated).collect();
        assert_eq!(eliminated, vec![false, false, false, true]);
    }

    #[test]
    fn stagnant_species_is_penalized() {
        let config = Config {
            dropoff_age: 5,
            ..Config::default()
        };
        let mut fresh = species_of(&[4.0]);
        fresh.age = 11;
        fresh.age_of_last_improvement = 10;
        let mut stale = species_of(&[4.0]);
        stale.age = 20;
        stale.age_of_last_improvement = 2;

        fresh.adjust_fitness(&config);
        stale.adjust_fitness(&config);
        assert!(stale.organisms[0].fitness < fresh.organisms[0].fitness);
    }

    #[test]
    fn young_species_gets_age_bonus() {
        let config = Config {
            age_significance: 2.0,
            ..Config::default()
        };
        let mut species = species_of(&[4.0]);
        species.age = 3;
        species.adjust_fitness(&config);
        assert_eq!(species.organisms[0].fitness, 8.0);
    }

    #[test]
    fn count_offspring_carries_skim() {
        let mut species = species_of(&[0.0, 0.0, 0.0]);
        for (organism, expected) in species.organisms.iter_mut().zip([1.4, 1.4, 0.4]) {
            organism.expected_offspring = expected;
        }
        let skim = species.count_offspring(0.0);
        // 1.4 + 1.4 + 0.4 = 3.2: three whole offspring, 0.2 carried.
        assert_eq!(species.expected_offspring, 3);
        assert!((skim - 0.2).abs() < 1e-9);
    }

    #[test]
    fn reproduce_produces_allotted_count_and_elite() {
        let config = Config::default();
        let mut rng = SmallRng::seed_from_u64(99);
        let mut ledger = InnovationLedger::starting_from(3, 4);
        let mut next_id = 100;

        let mut species = species_of(&[5.0, 4.0, 3.0, 2.0, 1.0]);
        species.adjust_fitness(&config);
        species.expected_offspring = 5;

        let babies = species
            .reproduce(1, &mut next_id, &mut ledger, &[], &config, &mut rng)
            .unwrap();
        assert_eq!(babies.len(), 5);
        assert!(babies[0].is_champion_child);
        // The elite copy is structurally identical to the champion.
        assert_eq!(
            babies[0].genome().genes().count(),
            species.organisms[0].genome().genes().count()
        );
        for baby in &babies {
            baby.genome().verify().unwrap();
            assert!(baby.id() >= 100);
        }
        assert_eq!(next_id, 105);
    }

    #[test]
    fn zero_quota_produces_nothing() {
        let config = Config::default();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut ledger = InnovationLedger::starting_from(3, 4);
        let mut next_id = 10;
        let mut species = species_of(&[1.0]);
        species.expected_offspring = 0;
        let babies = species
            .reproduce(1, &mut next_id, &mut ledger, &[], &config, &mut rng)
            .unwrap();
        assert!(babies.is_empty());
    }
}

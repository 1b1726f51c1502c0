//! Populations group organisms into species and drive the generational
//! cycle: fitness sharing, offspring allotment, reproduction through the
//! innovation ledger, and re-speciation.

mod errors;
mod organism;
mod species;

pub use errors::{EpochError, PopulationParseError};
pub use organism::Organism;
pub use species::Species;

use crate::config::Config;
use crate::genomics::{Genome, GenomeValidityError, InnovationLedger};

use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;

use std::io::{self, BufRead, Write};

/// The top-level container: owns every organism and species, the
/// generation counter, and the innovation ledger shared by all mutation
/// operators during an epoch.
pub struct Population {
    species: Vec<Species>,
    ledger: InnovationLedger,
    generation: usize,
    next_genome_id: usize,
    next_species_id: usize,
    highest_fitness: f64,
    highest_last_changed: usize,
    config: Config,
}

impl Population {
    /// Spawns a population from a seed genome: `pop_size` copies with
    /// jostled link weights, speciated against each other.
    ///
    /// # Errors
    /// Fails when the seed genome is invalid.
    ///
    /// # Examples
    /// ```
    /// use evoneat::config::Config;
    /// use evoneat::genomics::Genome;
    /// use evoneat::populations::Population;
    /// use rand::rngs::SmallRng;
    /// use rand::SeedableRng;
    ///
    /// let seed = "\
    /// genomestart 1
    /// node 1 0 1 1
    /// node 2 0 1 1
    /// node 3 0 1 3
    /// node 4 0 0 2
    /// gene 0 1 4 0.0 false 1 0 true
    /// gene 0 2 4 0.0 false 2 0 true
    /// gene 0 3 4 0.0 false 3 0 true
    /// genomeend 1
    /// ";
    /// let genome = Genome::read(seed.as_bytes()).unwrap();
    /// let config = Config { pop_size: 20, ..Config::default() };
    /// let mut rng = SmallRng::seed_from_u64(1);
    ///
    /// let population = Population::spawn(&genome, &config, &mut rng).unwrap();
    /// assert_eq!(population.organisms().count(), 20);
    /// ```
    pub fn spawn(
        seed: &Genome,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Population, GenomeValidityError> {
        seed.verify()?;
        let mut organisms = Vec::with_capacity(config.pop_size);
        for count in 1..=config.pop_size {
            let mut genome = seed.duplicate(count);
            genome.mutate_link_weights(rng, 1.0, 1.0);
            organisms.push(Organism::new(genome, 0));
        }

        let next_innovation = seed.last_gene_innovation().map_or(1, |i| i + 1);
        let next_node_id = seed.last_node_id().map_or(1, |n| n + 1);
        let mut population = Population {
            species: Vec::new(),
            ledger: InnovationLedger::starting_from(next_innovation, next_node_id),
            generation: 0,
            next_genome_id: config.pop_size + 1,
            next_species_id: 1,
            highest_fitness: 0.0,
            highest_last_changed: 0,
            config: config.clone(),
        };
        population.speciate(organisms);
        Ok(population)
    }

    /// Spawns a population of random genomes with up to `max_hidden`
    /// hidden nodes each.
    ///
    /// # Errors
    /// Fails if a generated genome is invalid, which would indicate a
    /// construction bug rather than bad input.
    pub fn new_random(
        rng: &mut impl Rng,
        inputs: usize,
        outputs: usize,
        max_hidden: usize,
        recurrent: bool,
        link_prob: f64,
        config: &Config,
    ) -> Result<Population, GenomeValidityError> {
        let mut organisms = Vec::with_capacity(config.pop_size);
        let mut max_node = 0;
        let mut max_innovation = 0;
        for count in 1..=config.pop_size {
            let hidden = rng.gen_range(0..=max_hidden);
            let genome =
                Genome::new_random(rng, count, inputs, outputs, hidden, recurrent, link_prob);
            genome.verify()?;
            max_node = max_node.max(genome.last_node_id().unwrap_or(0));
            max_innovation = max_innovation.max(genome.last_gene_innovation().unwrap_or(0));
            organisms.push(Organism::new(genome, 0));
        }

        let mut population = Population {
            species: Vec::new(),
            ledger: InnovationLedger::starting_from(max_innovation + 1, max_node + 1),
            generation: 0,
            next_genome_id: config.pop_size + 1,
            next_species_id: 1,
            highest_fitness: 0.0,
            highest_last_changed: 0,
            config: config.clone(),
        };
        population.speciate(organisms);
        Ok(population)
    }

    /// Reads a population dump: concatenated genome records, optionally
    /// with `/* Species ... */` headers, re-speciated as they load.
    ///
    /// # Errors
    /// Fails on malformed or invalid genomes, or an empty stream.
    pub fn read<R: BufRead>(
        reader: R,
        config: &Config,
    ) -> Result<Population, PopulationParseError> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));
        let mut genomes = Vec::new();
        while let Some(genome) = Genome::read_next(&mut lines)? {
            genomes.push(genome);
        }
        if genomes.is_empty() {
            return Err(PopulationParseError::NoGenomes);
        }

        let mut max_node = 0;
        let mut max_innovation = 0;
        let mut max_id = 0;
        for genome in &genomes {
            max_node = max_node.max(genome.last_node_id().unwrap_or(0));
            max_innovation = max_innovation.max(genome.last_gene_innovation().unwrap_or(0));
            max_id = max_id.max(genome.id());
        }

        let mut population = Population {
            species: Vec::new(),
            ledger: InnovationLedger::starting_from(max_innovation + 1, max_node + 1),
            generation: 0,
            next_genome_id: max_id + 1,
            next_species_id: 1,
            highest_fitness: 0.0,
            highest_last_changed: 0,
            config: config.clone(),
        };
        population.speciate(genomes.into_iter().map(|g| Organism::new(g, 0)).collect());
        Ok(population)
    }

    /// Writes every genome, concatenated, in species order.
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for organism in self.organisms() {
            organism.genome().write(writer)?;
        }
        Ok(())
    }

    /// Writes every genome grouped under `/* Species <id> */` headers.
    pub fn write_by_species<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for species in &self.species {
            writeln!(writer, "/* Species {} */", species.id())?;
            for organism in species.organisms() {
                organism.genome().write(writer)?;
            }
        }
        Ok(())
    }

    /// Runs the evaluator over every organism, sequentially.
    pub fn evaluate<F: FnMut(&mut Organism)>(&mut self, mut evaluator: F) {
        for species in &mut self.species {
            for organism in &mut species.organisms {
                evaluator(organism);
            }
        }
    }

    /// Runs the evaluator over every organism in a worker pool.
    /// Organisms are independent during evaluation, so this is safe as
    /// long as the evaluator itself shares no unguarded mutable state.
    pub fn evaluate_parallel<F>(&mut self, evaluator: F)
    where
        F: Fn(&mut Organism) + Sync,
    {
        self.species.par_iter_mut().for_each(|species| {
            species
                .organisms
                .par_iter_mut()
                .for_each(|organism| evaluator(organism));
        });
    }

    /// Turns one generation: fitness sharing, offspring allotment with
    /// exact population-size preservation, reproduction through the
    /// innovation ledger, and re-speciation of the offspring.
    ///
    /// Fitness must already be computed (via [`Population::evaluate`] or
    /// the caller's own loop). `generation` becomes the population's
    /// generation number and is stamped on the offspring.
    ///
    /// # Errors
    /// Fails when the population is degenerate or when reproduction
    /// produces a structurally invalid genome; the epoch is aborted and
    /// no offspring enter the population.
    pub fn epoch(&mut self, generation: usize, rng: &mut impl Rng) -> Result<(), EpochError> {
        let pop_size = self.config.pop_size;

        for species in &mut self.species {
            species.adjust_fitness(&self.config);
        }

        let total_adjusted: f64 = self.organisms().map(|o| o.fitness).sum();
        if !(total_adjusted > 0.0) {
            return Err(EpochError::DegeneratePopulation);
        }
        let organism_count = self.organisms().count();
        let overall_average = total_adjusted / organism_count as f64;
        for species in &mut self.species {
            for organism in &mut species.organisms {
                organism.expected_offspring = organism.fitness / overall_average;
            }
        }

        let mut skim = 0.0;
        let mut total_expected = 0;
        for species in &mut self.species {
            skim = species.count_offspring(skim);
            total_expected += species.expected_offspring;
        }
        if total_expected < pop_size {
            let best = self.best_species_index();
            self.species[best].expected_offspring += pop_size - total_expected;
        }

        let best_fitness = self
            .organisms()
            .map(|o| o.original_fitness)
            .fold(0.0, f64::max);
        if best_fitness > self.highest_fitness {
            self.highest_fitness = best_fitness;
            self.highest_last_changed = 0;
        } else {
            self.highest_last_changed += 1;
        }
        if self.highest_last_changed > self.config.dropoff_age {
            self.obliterate_all_but_two_best(pop_size);
            self.highest_last_changed = 0;
        } else if self.config.babies_stolen > 0 {
            self.steal_babies(rng);
        }

        let champions: Vec<(usize, Genome, f64)> = self
            .species
            .iter()
            .filter_map(|s| {
                s.champion()
                    .map(|c| (s.id(), c.genome().clone(), c.original_fitness))
            })
            .collect();

        let mut babies = Vec::with_capacity(pop_size);
        for index in 0..self.species.len() {
            let own_id = self.species[index].id();
            let others: Vec<(Genome, f64)> = champions
                .iter()
                .filter(|(id, _, _)| *id != own_id)
                .map(|(_, genome, fitness)| (genome.clone(), *fitness))
                .collect();
            let Population {
                species,
                ledger,
                next_genome_id,
                config,
                ..
            } = self;
            babies.extend(species[index].reproduce(
                generation,
                next_genome_id,
                ledger,
                &others,
                config,
                rng,
            )?);
        }

        // No malformed offspring may enter the population.
        for baby in &babies {
            baby.genome().verify()?;
        }

        for species in &mut self.species {
            if let Some(first) = species.organisms.first() {
                species.representative = Some(first.genome().clone());
            }
            species.organisms.clear();
            species.age += 1;
        }
        self.speciate(babies);
        self.species.retain(|s| !s.organisms.is_empty());
        self.species.sort_unstable_by_key(Species::id);

        self.generation = generation;
        self.ledger.clear();
        Ok(())
    }

    /// Assigns each organism to the first species whose representative
    /// is within the compatibility threshold, creating a new species
    /// when none is.
    fn speciate(&mut self, organisms: Vec<Organism>) {
        for organism in organisms {
            self.place(organism);
        }
    }

    fn place(&mut self, organism: Organism) {
        for species in &mut self.species {
            if let Some(representative) = species.representative() {
                if organism.genome().compatibility(representative, &self.config)
                    < self.config.compat_threshold
                {
                    species.add_organism(organism);
                    return;
                }
            }
        }
        let mut species = Species::new(self.next_species_id);
        self.next_species_id += 1;
        species.add_organism(organism);
        self.species.push(species);
    }

    /// Index of the species with the fittest champion, lowest id
    /// breaking ties.
    fn best_species_index(&self) -> usize {
        let mut best = 0;
        let mut best_fitness = f64::MIN;
        for (index, species) in self.species.iter().enumerate() {
            let fitness = species.champion().map_or(0.0, |c| c.original_fitness);
            if fitness > best_fitness {
                best_fitness = fitness;
                best = index;
            }
        }
        best
    }

    /// Population-wide stagnation response: the two best species split
    /// the whole offspring budget, everyone else is condemned.
    fn obliterate_all_but_two_best(&mut self, pop_size: usize) {
        tracing::warn!(
            generation = self.generation,
            "population stagnant, obliterating all but the two best species"
        );
        let mut order: Vec<usize> = (0..self.species.len()).collect();
        order.sort_unstable_by(|&a, &b| {
            let fa = self.species[a].champion().map_or(0.0, |c| c.original_fitness);
            let fb = self.species[b].champion().map_or(0.0, |c| c.original_fitness);
            fb.partial_cmp(&fa)
                .unwrap_or_else(|| panic!("organism fitness is NaN"))
                .then_with(|| self.species[a].id().cmp(&self.species[b].id()))
        });

        for species in &mut self.species {
            species.expected_offspring = 0;
            species.super_champ_offspring = 0;
            species.obliterate = true;
        }
        let half = pop_size / 2;
        if order.len() >= 2 {
            self.revive(order[0], pop_size - half);
            self.revive(order[1], half);
        } else if let Some(&only) = order.first() {
            self.revive(only, pop_size);
        }
    }

    fn revive(&mut self, index: usize, offspring: usize) {
        let species = &mut self.species[index];
        species.expected_offspring = offspring;
        species.obliterate = false;
        species.age_of_last_improvement = species.age;
    }

    /// Transfers offspring quota from the weakest species to champion
    /// clones in the strongest, per the configured `babies_stolen`.
    fn steal_babies(&mut self, rng: &mut impl Rng) {
        let mut order: Vec<usize> = (0..self.species.len()).collect();
        // Worst champion first.
        order.sort_unstable_by(|&a, &b| {
            let fa = self.species[a].champion().map_or(0.0, |c| c.original_fitness);
            let fb = self.species[b].champion().map_or(0.0, |c| c.original_fitness);
            fa.partial_cmp(&fb)
                .unwrap_or_else(|| panic!("organism fitness is NaN"))
                .then_with(|| self.species[b].id().cmp(&self.species[a].id()))
        });

        let mut pool = 0;
        for &index in &order {
            while self.species[index].expected_offspring > 1 && pool < self.config.babies_stolen {
                self.species[index].expected_offspring -= 1;
                pool += 1;
            }
            if pool >= self.config.babies_stolen {
                break;
            }
        }
        if pool == 0 {
            return;
        }

        let best_first: Vec<usize> = order.into_iter().rev().collect();
        let eligible: Vec<usize> = best_first
            .iter()
            .copied()
            .filter(|&i| self.species[i].time_since_improvement() <= self.config.dropoff_age)
            .collect();
        let fallback = best_first[0];
        if eligible.is_empty() {
            self.grant_stolen(fallback, pool);
            return;
        }

        let mut remaining = pool;
        let shares = [pool / 5, pool / 5, pool / 10];
        for (slot, &share) in eligible.iter().zip(&shares) {
            let grant = share.min(remaining);
            self.grant_stolen(*slot, grant);
            remaining -= grant;
        }
        while remaining > 0 {
            let &index = eligible.choose(rng).unwrap();
            let grant = remaining.min(3);
            self.grant_stolen(index, grant);
            remaining -= grant;
        }
    }

    fn grant_stolen(&mut self, index: usize, count: usize) {
        let species = &mut self.species[index];
        species.expected_offspring += count;
        species.super_champ_offspring += count;
    }

    /// Validates every organism's genome.
    ///
    /// # Errors
    /// Returns the first invariant violation found.
    pub fn verify(&self) -> Result<(), GenomeValidityError> {
        for organism in self.organisms() {
            organism.genome().verify()?;
        }
        Ok(())
    }

    /// Returns an iterator over all organisms, in species order.
    pub fn organisms(&self) -> impl Iterator<Item = &Organism> {
        self.species.iter().flat_map(|s| s.organisms())
    }

    /// Returns an iterator over the species, in creation order.
    pub fn species(&self) -> impl Iterator<Item = &Species> {
        self.species.iter()
    }

    /// Returns mutable access to the species, for evaluators that track
    /// per-species state (e.g. the non-Markov champion hunt).
    pub fn species_mut(&mut self) -> impl Iterator<Item = &mut Species> {
        self.species.iter_mut()
    }

    /// Returns the current best organism.
    pub fn champion(&self) -> Option<&Organism> {
        self.organisms()
            .max_by(|a, b| Organism::compare_fitness(b, a))
    }

    /// Returns the current generation number.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Returns the best fitness ever observed.
    pub fn highest_fitness(&self) -> f64 {
        self.highest_fitness
    }

    /// Returns the innovation ledger.
    pub fn innovation_ledger(&self) -> &InnovationLedger {
        &self.ledger
    }

    /// Returns the configuration the population runs under.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genomics::{Gene, NeuronType, NodeGene, Trait, TRAIT_PARAM_COUNT};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn xor_seed() -> Genome {
        Genome::new(
            1,
            vec![Trait::new(1, [0.1; TRAIT_PARAM_COUNT])],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Input),
                NodeGene::new(3, NeuronType::Bias),
                NodeGene::new(4, NeuronType::Output),
            ],
            vec![
                Gene::new(1, 1, 4, 0.0, false),
                Gene::new(2, 2, 4, 0.0, false),
                Gene::new(3, 3, 4, 0.0, false),
            ],
        )
        .unwrap()
    }

    fn single_gene_genome(id: usize, weight: f64) -> Genome {
        Genome::new(
            id,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Output),
            ],
            vec![Gene::new(1, 1, 2, weight, false)],
        )
        .unwrap()
    }

    #[test]
    fn spawn_fills_population_and_counters() {
        let config = Config {
            pop_size: 30,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(42);
        let population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        assert_eq!(population.organisms().count(), 30);
        assert!(population.species().count() >= 1);
        assert_eq!(population.innovation_ledger().next_innovation(), 4);
        assert_eq!(population.innovation_ledger().next_node_id(), 5);
        population.verify().unwrap();
    }

    #[test]
    fn epoch_preserves_population_size() {
        let config = Config {
            pop_size: 40,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let mut population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        for generation in 1..=8 {
            population.evaluate(|organism| {
                // An arbitrary deterministic fitness.
                organism.fitness = 1.0 + (organism.id() % 7) as f64;
            });
            population.epoch(generation, &mut rng).unwrap();
            assert_eq!(
                population.organisms().count(),
                40,
                "generation {}",
                generation
            );
            population.verify().unwrap();
            assert_eq!(population.generation(), generation);
        }
    }

    #[test]
    fn epoch_keeps_gene_lists_innovation_ordered() {
        let config = Config {
            pop_size: 30,
            mutate_add_node_prob: 0.2,
            mutate_add_link_prob: 0.3,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(13);
        let mut population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        for generation in 1..=6 {
            population.evaluate(|organism| {
                organism.fitness = 1.0 + organism.genome().extrons() as f64;
            });
            population.epoch(generation, &mut rng).unwrap();
        }
        // verify() checks innovation ordering, endpoints, duplicates.
        population.verify().unwrap();
    }

    #[test]
    fn compatibility_threshold_controls_speciation() {
        // Two genomes differing by a single weight delta. With the
        // threshold below c3·Δw they split into two species, above it
        // they share one.
        let delta = 1.0;
        let c3 = 0.5;
        let mut dump = Vec::new();
        single_gene_genome(1, 1.0).write(&mut dump).unwrap();
        single_gene_genome(2, 1.0 + delta).write(&mut dump).unwrap();

        let isolating = Config {
            mutdiff_coeff: c3,
            compat_threshold: c3 * delta / 2.0,
            ..Config::default()
        };
        let population = Population::read(dump.as_slice(), &isolating).unwrap();
        assert_eq!(population.species().count(), 2);

        let merging = Config {
            mutdiff_coeff: c3,
            compat_threshold: 2.0 * c3 * delta,
            ..Config::default()
        };
        let population = Population::read(dump.as_slice(), &merging).unwrap();
        assert_eq!(population.species().count(), 1);
    }

    #[test]
    fn members_are_compatible_with_their_representative() {
        let config = Config {
            pop_size: 50,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(21);
        let mut population =
            Population::new_random(&mut rng, 3, 1, 3, false, 0.6, &config).unwrap();

        population.evaluate(|organism| organism.fitness = 1.0);
        population.epoch(1, &mut rng).unwrap();

        for species in population.species() {
            let representative = species.representative().unwrap();
            for organism in species.organisms() {
                assert!(
                    organism.genome().compatibility(representative, &config)
                        < config.compat_threshold
                );
            }
        }
    }

    #[test]
    fn dump_round_trip() {
        let config = Config {
            pop_size: 10,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(3);
        let population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        let mut dump = Vec::new();
        population.write_by_species(&mut dump).unwrap();
        let restored = Population::read(dump.as_slice(), &config).unwrap();

        assert_eq!(restored.organisms().count(), 10);
        let original: Vec<&Genome> = population.organisms().map(Organism::genome).collect();
        let reread: Vec<&Genome> = restored.organisms().map(Organism::genome).collect();
        assert_eq!(original.len(), reread.len());
        for genome in original {
            assert!(reread.iter().any(|g| *g == genome));
        }
    }

    #[test]
    fn baby_stealing_preserves_total_offspring() {
        let config = Config {
            pop_size: 40,
            babies_stolen: 8,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(77);
        let mut population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        for generation in 1..=4 {
            population.evaluate(|organism| {
                organism.fitness = 1.0 + (organism.id() % 5) as f64;
            });
            population.epoch(generation, &mut rng).unwrap();
            assert_eq!(population.organisms().count(), 40);
        }
    }

    #[test]
    fn stagnation_triggers_delta_coding() {
        let config = Config {
            pop_size: 30,
            dropoff_age: 2,
            ..Config::default()
        };
        let mut rng = SmallRng::seed_from_u64(5);
        let mut population = Population::spawn(&xor_seed(), &config, &mut rng).unwrap();

        // Constant fitness: never improves, so the population stagnates
        // and delta coding kicks in. Size must still be preserved.
        for generation in 1..=8 {
            population.evaluate(|organism| organism.fitness = 1.0);
            population.epoch(generation, &mut rng).unwrap();
            assert_eq!(population.organisms().count(), 30);
            assert!(population.species().count() <= 30);
        }
    }

    #[test]
    fn empty_stream_is_rejected() {
        let config = Config::default();
        assert!(matches!(
            Population::read("".as_bytes(), &config),
            Err(PopulationParseError::NoGenomes)
        ));
    }
}

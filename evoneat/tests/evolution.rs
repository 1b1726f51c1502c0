//! End-to-end evolution runs: spawn a population from the XOR seed,
//! evaluate real phenotypes, and turn generations while checking the
//! population-level invariants hold throughout.

use evoneat::config::Config;
use evoneat::genomics::Genome;
use evoneat::populations::{Organism, Population};

use rand::rngs::SmallRng;
use rand::SeedableRng;

use std::collections::HashSet;

const XOR_SEED: &str = "\
genomestart 1
trait 1 0.1 0 0 0 0 0 0 0
node 1 1 1 1
node 2 1 1 1
node 3 1 1 3
node 4 1 0 2
gene 1 1 4 0.0 false 1 0 true
gene 1 2 4 0.0 false 2 0 true
gene 1 3 4 0.0 false 3 0 true
genomeend 1
";

const XOR_CASES: [([f64; 2], f64); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

fn evaluate_xor(organism: &mut Organism) {
    let depth = match organism.phenotype().max_activation_depth() {
        Ok(depth) => depth,
        Err(_) => {
            organism.fitness = 0.001;
            return;
        }
    };

    let mut error_sum = 0.0;
    for (inputs, expected) in XOR_CASES {
        let network = organism.phenotype();
        network.flush();
        network.load_sensors(&inputs).unwrap();
        if network.forward_steps(depth.max(1)).is_err() {
            organism.fitness = 0.001;
            return;
        }
        error_sum += (network.read_outputs()[0] - expected).abs();
    }
    organism.fitness = (4.0 - error_sum).powi(2);
    organism.error = error_sum;
}

fn xor_config() -> Config {
    Config {
        pop_size: 60,
        compat_threshold: 3.0,
        mutate_add_node_prob: 0.03,
        mutate_add_link_prob: 0.08,
        dropoff_age: 15,
        ..Config::default()
    }
}

#[test]
fn population_invariants_hold_across_generations() {
    let seed = Genome::read(XOR_SEED.as_bytes()).unwrap();
    let config = xor_config();
    let mut rng = SmallRng::seed_from_u64(4242);
    let mut population = Population::spawn(&seed, &config, &mut rng).unwrap();

    for generation in 1..=15 {
        population.evaluate(evaluate_xor);
        population.epoch(generation, &mut rng).unwrap();

        // |P.organisms| == PopSize, every generation.
        assert_eq!(population.organisms().count(), config.pop_size);
        // Every genome keeps its structural invariants.
        population.verify().unwrap();
        // Organism ids are unique and monotonically assigned.
        let ids: HashSet<usize> = population.organisms().map(Organism::id).collect();
        assert_eq!(ids.len(), config.pop_size);
        // Species are listed in creation order.
        let species_ids: Vec<usize> = population.species().map(|s| s.id()).collect();
        let mut sorted = species_ids.clone();
        sorted.sort_unstable();
        assert_eq!(species_ids, sorted);
    }
}

#[test]
fn fitness_pressure_improves_the_champion() {
    let seed = Genome::read(XOR_SEED.as_bytes()).unwrap();
    let config = xor_config();
    let mut rng = SmallRng::seed_from_u64(1001);
    let mut population = Population::spawn(&seed, &config, &mut rng).unwrap();

    population.evaluate(evaluate_xor);
    let initial_best = population.champion().unwrap().fitness;

    for generation in 1..=25 {
        population.epoch(generation, &mut rng).unwrap();
        population.evaluate(evaluate_xor);
    }

    // The all-time record never decreases, and with selection pressure
    // on XOR it should move above the seed population's level.
    assert!(population.highest_fitness() >= initial_best);
    let final_best = population
        .organisms()
        .map(|o| o.fitness)
        .fold(0.0, f64::max);
    assert!(
        final_best > initial_best * 0.9,
        "final best {} collapsed below initial {}",
        final_best,
        initial_best
    );
}

#[test]
fn identical_runs_are_reproducible() {
    let seed = Genome::read(XOR_SEED.as_bytes()).unwrap();
    let config = xor_config();

    let mut dumps = Vec::new();
    for _ in 0..2 {
        let mut rng = SmallRng::seed_from_u64(555);
        let mut population = Population::spawn(&seed, &config, &mut rng).unwrap();
        for generation in 1..=5 {
            population.evaluate(evaluate_xor);
            population.epoch(generation, &mut rng).unwrap();
        }
        let mut dump = Vec::new();
        population.write(&mut dump).unwrap();
        dumps.push(dump);
    }
    assert_eq!(
        dumps[0], dumps[1],
        "two runs under the same seed diverged"
    );
}

#[test]
fn parallel_evaluation_matches_sequential() {
    let seed = Genome::read(XOR_SEED.as_bytes()).unwrap();
    let config = xor_config();
    let mut rng = SmallRng::seed_from_u64(31337);
    let mut population = Population::spawn(&seed, &config, &mut rng).unwrap();

    let mut sequential = Vec::new();
    population.evaluate(|organism| {
        evaluate_xor(organism);
        sequential.push((organism.id(), organism.fitness));
    });

    population.evaluate_parallel(evaluate_xor);
    let parallel: Vec<(usize, f64)> = population
        .organisms()
        .map(|o| (o.id(), o.fitness))
        .collect();

    let mut sequential_sorted = sequential;
    sequential_sorted.sort_by_key(|(id, _)| *id);
    let mut parallel_sorted = parallel;
    parallel_sorted.sort_by_key(|(id, _)| *id);
    assert_eq!(sequential_sorted, parallel_sorted);
}

//! Trial and generation bookkeeping shared by all experiments.

use evoneat::config::Config;
use evoneat::populations::Population;

use rand::rngs::SmallRng;

use std::error::Error;
use std::fmt;

/// A task-specific evaluator, called once per generation. It computes
/// and stores fitness on every organism, marks winners, fills the
/// generation record, and runs the reproduction epoch when the task is
/// not yet solved.
pub trait GenerationEvaluator {
    /// Called when a fresh trial begins.
    fn trial_started(&mut self, _trial: usize) {}

    /// Evaluates one generation and, unless it solved the task,
    /// advances the population an epoch.
    fn evaluate_generation(
        &mut self,
        population: &mut Population,
        generation: &mut Generation,
        config: &Config,
        rng: &mut SmallRng,
    ) -> Result<(), Box<dyn Error>>;
}

/// Statistics for one generation of one trial.
#[derive(Clone, Debug, Default)]
pub struct Generation {
    /// Generation number within the trial.
    pub id: usize,
    /// Whether a winning organism appeared.
    pub solved: bool,
    /// Node count of the winner's genome.
    pub winner_nodes: usize,
    /// Enabled gene count of the winner's genome.
    pub winner_genes: usize,
    /// Organism evaluations performed up to the winner.
    pub winner_evals: usize,
    /// Best raw fitness seen this generation.
    pub best_fitness: f64,
    /// Number of species.
    pub diversity: usize,
    /// Per-species ages.
    pub ages: Vec<f64>,
    /// Per-species champion complexity (nodes + enabled genes).
    pub complexity: Vec<f64>,
    /// Per-species champion fitness.
    pub fitness: Vec<f64>,
}

impl Generation {
    /// Returns an empty record for generation `id`.
    pub fn new(id: usize) -> Generation {
        Generation {
            id,
            ..Generation::default()
        }
    }

    /// Fills the per-species columns from the population.
    pub fn fill_population_statistics(&mut self, population: &Population) {
        self.diversity = population.species().count();
        self.ages.clear();
        self.complexity.clear();
        self.fitness.clear();
        for species in population.species() {
            self.ages.push(species.age as f64);
            if let Some(champion) = species.champion() {
                let genome = champion.genome();
                self.complexity
                    .push((genome.nodes().count() + genome.extrons()) as f64);
                self.fitness
                    .push(champion.original_fitness.max(champion.fitness));
            }
        }
        self.best_fitness = population
            .organisms()
            .map(|o| o.original_fitness.max(o.fitness))
            .fold(self.best_fitness, f64::max);
    }
}

/// One independent run of an experiment.
#[derive(Clone, Debug, Default)]
pub struct Trial {
    /// Trial index.
    pub id: usize,
    /// Per-generation records, in order.
    pub generations: Vec<Generation>,
}

impl Trial {
    /// Whether any generation solved the task.
    pub fn solved(&self) -> bool {
        self.generations.iter().any(|g| g.solved)
    }

    /// The winning generation, if any.
    pub fn winner(&self) -> Option<&Generation> {
        self.generations.iter().find(|g| g.solved)
    }

    /// Best fitness across the whole trial.
    pub fn best_fitness(&self) -> f64 {
        self.generations
            .iter()
            .map(|g| g.best_fitness)
            .fold(0.0, f64::max)
    }
}

/// A named experiment: a set of trials plus the fitness ceiling that
/// counts as a win for reporting purposes.
#[derive(Clone, Debug, Default)]
pub struct Experiment {
    pub name: String,
    pub max_fitness_score: f64,
    pub trials: Vec<Trial>,
}

impl Experiment {
    /// Runs `config.num_runs` trials of `config.num_generations`
    /// generations each, spawning a fresh population from the seed
    /// genome for every trial.
    ///
    /// # Errors
    /// Surfaces evaluator and epoch failures; a failed trial aborts the
    /// whole experiment.
    pub fn execute(
        &mut self,
        config: &Config,
        seed: &evoneat::genomics::Genome,
        evaluator: &mut dyn GenerationEvaluator,
        rng: &mut SmallRng,
    ) -> Result<(), Box<dyn Error>> {
        for run in 0..config.num_runs {
            tracing::info!(trial = run, "spawning population from seed genome");
            let mut population = Population::spawn(seed, config, rng)?;
            population.verify()?;
            evaluator.trial_started(run);

            let mut trial = Trial {
                id: run,
                generations: Vec::new(),
            };
            for gen in 1..=config.num_generations {
                let mut generation = Generation::new(gen);
                evaluator.evaluate_generation(&mut population, &mut generation, config, rng)?;
                let solved = generation.solved;
                trial.generations.push(generation);
                if solved {
                    tracing::info!(trial = run, generation = gen, "winner found");
                    break;
                }
            }
            self.trials.push(trial);
        }
        Ok(())
    }

    /// Prints success-rate and winner-complexity statistics across
    /// trials.
    pub fn print_statistics(&self) {
        let solved: Vec<&Trial> = self.trials.iter().filter(|t| t.solved()).collect();
        println!("experiment: {}", self.name);
        println!(
            "solved {} of {} trials",
            solved.len(),
            self.trials.len()
        );
        if !solved.is_empty() {
            let epochs = Stats::from(solved.iter().map(|t| t.generations.len() as f64));
            let nodes = Stats::from(
                solved
                    .iter()
                    .map(|t| t.winner().unwrap().winner_nodes as f64),
            );
            let genes = Stats::from(
                solved
                    .iter()
                    .map(|t| t.winner().unwrap().winner_genes as f64),
            );
            let evals = Stats::from(
                solved
                    .iter()
                    .map(|t| t.winner().unwrap().winner_evals as f64),
            );
            println!("epochs to win: {}", epochs);
            println!("winner nodes:  {}", nodes);
            println!("winner genes:  {}", genes);
            println!("evaluations:   {}", evals);
        }
        let best = Stats::from(self.trials.iter().map(Trial::best_fitness));
        println!("best fitness:  {}", best);
    }
}

/// Basic summary statistics over a sequence of samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub minimum: f64,
    pub maximum: f64,
    pub mean: f64,
    pub median: f64,
}

impl Stats {
    /// Computes statistics over the samples; all zeros when empty.
    ///
    /// # Examples
    /// ```
    /// use evoneat_experiments::experiment::Stats;
    ///
    /// let stats = Stats::from([-2.0, -1.0, 0.5, 1.0, 1.5].into_iter());
    /// assert_eq!(stats.maximum, 1.5);
    /// assert_eq!(stats.minimum, -2.0);
    /// assert_eq!(stats.mean, 0.0);
    /// assert_eq!(stats.median, 0.5);
    /// ```
    pub fn from(samples: impl Iterator<Item = f64>) -> Stats {
        let mut data: Vec<f64> = samples.collect();
        if data.is_empty() {
            return Stats::default();
        }
        data.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());
        let sum: f64 = data.iter().sum();
        let mid = data.len() / 2;
        let median = if data.len() % 2 == 0 {
            (data[mid - 1] + data[mid]) / 2.0
        } else {
            data[mid]
        };
        Stats {
            minimum: data[0],
            maximum: *data.last().unwrap(),
            mean: sum / data.len() as f64,
            median,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min {:.2} / max {:.2} / mean {:.2} / median {:.2}",
            self.minimum, self.maximum, self.mean, self.median
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_singleton() {
        let stats = Stats::from([3.0].into_iter());
        assert_eq!(stats.minimum, 3.0);
        assert_eq!(stats.maximum, 3.0);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.median, 3.0);
    }

    #[test]
    fn stats_of_even_count_averages_median() {
        let stats = Stats::from([1.0, 2.0, 3.0, 4.0].into_iter());
        assert_eq!(stats.median, 2.5);
    }

    #[test]
    fn trial_winner_is_first_solved_generation() {
        let mut trial = Trial::default();
        trial.generations.push(Generation::new(1));
        let mut won = Generation::new(2);
        won.solved = true;
        won.winner_nodes = 5;
        trial.generations.push(won);
        assert!(trial.solved());
        assert_eq!(trial.winner().unwrap().id, 2);
    }
}

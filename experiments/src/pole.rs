//! Single-pole (Markov) cart balancing. The full state — cart position
//! and velocity, pole angle and angular velocity — is presented to the
//! network each step; fitness is the number of steps the pole stays up.

use crate::experiment::{Generation, GenerationEvaluator};

use evoneat::config::Config;
use evoneat::populations::{Organism, Population};

use rand::rngs::SmallRng;
use rand::Rng;

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

const GRAVITY: f64 = 9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE: f64 = 0.1;
const TOTAL_MASS: f64 = MASS_CART + MASS_POLE;
/// Half the pole's actual length.
const LENGTH: f64 = 0.5;
const POLE_MASS_LENGTH: f64 = MASS_POLE * LENGTH;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.02;

const TWELVE_DEGREES: f64 = 0.2094384;

/// The cart-pole simulation state.
#[derive(Clone, Copy, Debug, Default)]
struct CartState {
    x: f64,
    x_dot: f64,
    theta: f64,
    theta_dot: f64,
}

impl CartState {
    /// Random initial state within the failure bounds.
    fn random(rng: &mut impl Rng) -> CartState {
        CartState {
            x: rng.gen_range(-2.4..2.4),
            x_dot: rng.gen_range(-1.0..1.0),
            theta: rng.gen_range(-0.2..0.2),
            theta_dot: rng.gen_range(-1.5..1.5),
        }
    }

    fn outside_bounds(&self) -> bool {
        self.x.abs() > 2.4 || self.theta.abs() > TWELVE_DEGREES
    }

    /// One Euler step under a bang-bang force.
    fn step(&mut self, push_right: bool) {
        let force = if push_right { FORCE_MAG } else { -FORCE_MAG };
        let cos_theta = self.theta.cos();
        let sin_theta = self.theta.sin();

        let temp = (force + POLE_MASS_LENGTH * self.theta_dot * self.theta_dot * sin_theta)
            / TOTAL_MASS;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (LENGTH * (4.0 / 3.0 - MASS_POLE * cos_theta * cos_theta / TOTAL_MASS));
        let x_acc = temp - POLE_MASS_LENGTH * theta_acc * cos_theta / TOTAL_MASS;

        self.x += TAU * self.x_dot;
        self.x_dot += TAU * x_acc;
        self.theta += TAU * self.theta_dot;
        self.theta_dot += TAU * theta_acc;
    }
}

/// Balances the pole with the organism's network for up to `max_steps`,
/// starting from a random state. Returns the balanced step count.
pub fn run_cart(organism: &mut Organism, max_steps: usize, rng: &mut SmallRng) -> usize {
    let mut state = CartState::random(rng);
    let network = organism.phenotype();
    network.flush();

    for steps in 0..max_steps {
        let inputs = [
            (state.x + 2.4) / 4.8,
            (state.x_dot + 0.75) / 1.5,
            (state.theta + TWELVE_DEGREES) / 0.41,
            (state.theta_dot + 1.0) / 2.0,
        ];
        if network.load_sensors(&inputs).is_err() || network.activate().is_err() {
            return steps.max(1);
        }
        let outputs = network.read_outputs();
        state.step(outputs[0] <= outputs[1]);
        if state.outside_bounds() {
            return steps;
        }
    }
    max_steps
}

/// Generation evaluator for the single-pole task.
pub struct CartPoleEvaluator {
    out_dir: PathBuf,
    /// Steps an organism must balance for to win.
    max_steps: usize,
}

impl CartPoleEvaluator {
    pub fn new(out_dir: impl Into<PathBuf>, max_steps: usize) -> CartPoleEvaluator {
        CartPoleEvaluator {
            out_dir: out_dir.into(),
            max_steps,
        }
    }
}

impl GenerationEvaluator for CartPoleEvaluator {
    fn evaluate_generation(
        &mut self,
        population: &mut Population,
        generation: &mut Generation,
        config: &Config,
        rng: &mut SmallRng,
    ) -> Result<(), Box<dyn Error>> {
        let max_steps = self.max_steps;
        let mut winner_genome = None;

        population.evaluate(|organism| {
            let steps = run_cart(organism, max_steps, rng);
            organism.fitness = steps as f64;
            organism.is_winner = steps >= max_steps;
        });

        if let Some(winner) = population.organisms().find(|o| o.is_winner) {
            generation.solved = true;
            generation.winner_nodes = winner.genome().nodes().count();
            generation.winner_genes = winner.genome().extrons();
            generation.winner_evals = config.pop_size * (generation.id - 1) + winner.id();
            winner_genome = Some(winner.genome().clone());
        }
        generation.fill_population_statistics(population);

        if let Some(genome) = winner_genome {
            let path = self.out_dir.join("pole1_winner");
            match File::create(&path) {
                Ok(mut file) => {
                    if let Err(e) = genome.write(&mut file) {
                        tracing::error!("failed to write winner genome: {}", e);
                    }
                }
                Err(e) => tracing::error!("failed to create {}: {}", path.display(), e),
            }
        } else {
            population.epoch(generation.id, rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn cart_fails_fast_without_control() {
        // Always pushing right loses quickly from most states.
        let mut state = CartState {
            theta: 0.1,
            ..CartState::default()
        };
        let mut steps = 0;
        while !state.outside_bounds() && steps < 10_000 {
            state.step(true);
            steps += 1;
        }
        assert!(steps < 500, "ran {} steps", steps);
    }

    #[test]
    fn random_states_are_within_bounds() {
        let mut rng = SmallRng::seed_from_u64(8);
        for _ in 0..100 {
            assert!(!CartState::random(&mut rng).outside_bounds());
        }
    }

    #[test]
    fn physics_is_deterministic() {
        let mut a = CartState {
            theta: 0.01,
            ..CartState::default()
        };
        let mut b = a;
        for _ in 0..100 {
            a.step(false);
            b.step(false);
        }
        assert_eq!(a.x, b.x);
        assert_eq!(a.theta, b.theta);
    }
}

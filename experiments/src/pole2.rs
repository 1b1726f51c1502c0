//! Double-pole cart balancing, Markov and non-Markov variants.
//!
//! In the Markov variant the network sees the full state including
//! velocities. In the non-Markov variant velocities are withheld, so a
//! controller must evolve recurrent memory; a candidate champion is put
//! through a 100 000-step long test and a 625-point generalization grid
//! before the task is declared solved.

use crate::experiment::{Generation, GenerationEvaluator};

use evoneat::config::Config;
use evoneat::networks::Network;
use evoneat::populations::{Organism, Population};

use rand::rngs::SmallRng;

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

const THIRTY_SIX_DEGREES: f64 = 36.0 * std::f64::consts::PI / 180.0;
const ONE_DEGREE: f64 = std::f64::consts::PI / 180.0;

const MUP: f64 = 0.000002;
const GRAVITY: f64 = -9.8;
const MASS_CART: f64 = 1.0;
const MASS_POLE_1: f64 = 0.1;
/// Half the long pole's length.
const LENGTH_1: f64 = 0.5;
const FORCE_MAG: f64 = 10.0;
const TAU: f64 = 0.01;

/// Steps a non-Markov champion must survive in the long test.
const LONG_TEST_STEPS: f64 = 100_000.0;
/// Generalization grid successes required to declare the task solved.
const GENERALIZATION_GOAL: usize = 200;

/// The double-pole simulation, including the Gruau-style fitness
/// bookkeeping that damps oscillation.
pub struct CartDoublePole {
    /// Steps a Markov controller must survive to win.
    pub max_fitness: f64,
    markov: bool,
    /// Set while the champion runs the 100 000-step test.
    non_markov_long: bool,
    /// Set while the champion runs the generalization grid.
    generalization_test: bool,
    /// `[x, ẋ, θ₁, θ̇₁, θ₂, θ̇₂]`.
    state: [f64; 6],
    jiggle_step: [f64; 1000],
    length_2: f64,
    mass_pole_2: f64,
    balanced_sum: usize,
    cartpos_sum: f64,
    cartv_sum: f64,
    polepos_sum: f64,
    polev_sum: f64,
}

impl CartDoublePole {
    /// If `markov` is false, velocity information is withheld from the
    /// sensor vector.
    pub fn new(markov: bool) -> CartDoublePole {
        CartDoublePole {
            max_fitness: 100_000.0,
            markov,
            non_markov_long: false,
            generalization_test: false,
            state: [0.0; 6],
            jiggle_step: [0.0; 1000],
            length_2: 0.05,
            mass_pole_2: 0.01,
            balanced_sum: 0,
            cartpos_sum: 0.0,
            cartv_sum: 0.0,
            polepos_sum: 0.0,
            polev_sum: 0.0,
        }
    }

    /// Runs one balancing episode and returns its fitness.
    ///
    /// Markov episodes score raw balanced steps. Non-Markov episodes
    /// score the oscillation-damped Gruau fitness, except during the
    /// long test (raw steps) and generalization runs (balanced count).
    pub fn eval_net(&mut self, network: &mut Network) -> f64 {
        let non_markov_max = if self.non_markov_long {
            LONG_TEST_STEPS
        } else {
            1000.0
        };
        self.reset_state();
        network.flush();

        if self.markov {
            let mut steps = 0.0;
            while steps < self.max_fitness {
                let input = [
                    self.state[0] / 4.8,
                    self.state[1] / 2.0,
                    self.state[2] / 0.52,
                    self.state[3] / 2.0,
                    self.state[4] / 0.52,
                    self.state[5] / 2.0,
                ];
                if network.load_sensors(&input).is_err() || network.activate().is_err() {
                    // A looping or numerically broken net scores one step.
                    return 1.0;
                }
                let output = network.read_outputs()[0];
                self.perform_action(output, steps);
                if self.outside_bounds() {
                    break;
                }
                steps += 1.0;
            }
            steps
        } else {
            let mut steps = 0.0;
            while steps < non_markov_max {
                let input = [
                    self.state[0] / 4.8,
                    self.state[2] / 0.52,
                    self.state[4] / 0.52,
                ];
                if network.load_sensors(&input).is_err() || network.activate().is_err() {
                    return 0.0001;
                }
                let output = network.read_outputs()[0];
                self.perform_action(output, steps);
                if self.outside_bounds() {
                    break;
                }
                steps += 1.0;
            }

            if self.generalization_test {
                return self.balanced_sum as f64;
            }
            if self.non_markov_long {
                return steps;
            }

            // Gruau's fitness, damping oscillation over the last 100 steps.
            let mut jiggle_total = 0.0;
            if steps > 100.0 {
                let end = (steps as usize).saturating_sub(2).min(self.jiggle_step.len() - 1);
                let start = end.saturating_sub(99);
                for i in start..=end {
                    jiggle_total += self.jiggle_step[i];
                }
            }
            if self.balanced_sum > 100 {
                0.1 * self.balanced_sum as f64 / 1000.0 + 0.9 * 0.75 / jiggle_total
            } else {
                0.1 * self.balanced_sum as f64 / 1000.0
            }
        }
    }

    /// Sets the initial state for a generalization run. Velocities of
    /// the short pole are zeroed by the episode reset.
    pub fn set_generalization_state(&mut self, x: f64, x_dot: f64, theta: f64, theta_dot: f64) {
        self.state = [x, x_dot, theta, theta_dot, 0.0, 0.0];
    }

    /// Enters or leaves the champion long test.
    pub fn set_long_test(&mut self, on: bool) {
        self.non_markov_long = on;
    }

    /// Enters or leaves the generalization phase.
    pub fn set_generalization_test(&mut self, on: bool) {
        self.generalization_test = on;
    }

    fn reset_state(&mut self) {
        if self.markov {
            self.cartpos_sum = 0.0;
            self.cartv_sum = 0.0;
            self.polepos_sum = 0.0;
            self.polev_sum = 0.0;
        }
        self.balanced_sum = 0;
        self.jiggle_step = [0.0; 1000];
        if !self.generalization_test {
            // Ordinary episodes start from rest with the long pole one
            // degree off vertical; generalization runs keep the state
            // the grid assigned.
            self.state = [0.0, 0.0, ONE_DEGREE, 0.0, 0.0, 0.0];
        }
    }

    /// Applies the network output as a force and advances the
    /// simulation two Runge-Kutta steps, recording fitness bookkeeping.
    fn perform_action(&mut self, output: f64, step_num: f64) {
        for _ in 0..2 {
            self.rk4(output, TAU);
        }

        self.cartpos_sum += self.state[0].abs();
        self.cartv_sum += self.state[1].abs();
        self.polepos_sum += self.state[2].abs();
        self.polev_sum += self.state[3].abs();

        let step_index = step_num as usize;
        if step_index < self.jiggle_step.len() {
            self.jiggle_step[step_index] = self.state[0].abs()
                + self.state[1].abs()
                + self.state[2].abs()
                + self.state[3].abs();
        }
        if !self.outside_bounds() {
            self.balanced_sum += 1;
        }
    }

    /// System derivatives at `state` under the (rescaled) action force.
    fn derivatives(&self, action: f64, state: &[f64; 6], derivs: &mut [f64; 6]) {
        let force = (action - 0.5) * FORCE_MAG * 2.0;
        let cos_theta_1 = state[2].cos();
        let sin_theta_1 = state[2].sin();
        let g_sin_theta_1 = GRAVITY * sin_theta_1;
        let cos_theta_2 = state[4].cos();
        let sin_theta_2 = state[4].sin();
        let g_sin_theta_2 = GRAVITY * sin_theta_2;

        let ml_1 = LENGTH_1 * MASS_POLE_1;
        let ml_2 = self.length_2 * self.mass_pole_2;
        let temp_1 = MUP * state[3] / ml_1;
        let temp_2 = MUP * state[5] / ml_2;
        let fi_1 = (ml_1 * state[3] * state[3] * sin_theta_1)
            + (0.75 * MASS_POLE_1 * cos_theta_1 * (temp_1 + g_sin_theta_1));
        let fi_2 = (ml_2 * state[5] * state[5] * sin_theta_2)
            + (0.75 * self.mass_pole_2 * cos_theta_2 * (temp_2 + g_sin_theta_2));
        let mi_1 = MASS_POLE_1 * (1.0 - (0.75 * cos_theta_1 * cos_theta_1));
        let mi_2 = self.mass_pole_2 * (1.0 - (0.75 * cos_theta_2 * cos_theta_2));

        derivs[0] = state[1];
        derivs[1] = (force + fi_1 + fi_2) / (mi_1 + mi_2 + MASS_CART);
        derivs[2] = state[3];
        derivs[3] = -0.75 * (derivs[1] * cos_theta_1 + g_sin_theta_1 + temp_1) / LENGTH_1;
        derivs[4] = state[5];
        derivs[5] = -0.75 * (derivs[1] * cos_theta_2 + g_sin_theta_2 + temp_2) / self.length_2;
    }

    /// Fourth-order Runge-Kutta integration of one `tau` interval.
    fn rk4(&mut self, action: f64, tau: f64) {
        let hh = tau * 0.5;
        let h6 = tau / 6.0;
        let state = self.state;
        let mut dydx = [0.0; 6];
        let mut dyt = [0.0; 6];
        let mut dym = [0.0; 6];
        let mut yt = [0.0; 6];

        self.derivatives(action, &state, &mut dydx);
        for i in 0..6 {
            yt[i] = state[i] + hh * dydx[i];
        }
        self.derivatives(action, &yt, &mut dyt);
        for i in 0..6 {
            yt[i] = state[i] + hh * dyt[i];
        }
        self.derivatives(action, &yt, &mut dym);
        for i in 0..6 {
            yt[i] = state[i] + tau * dym[i];
            dym[i] += dyt[i];
        }
        self.derivatives(action, &yt, &mut dyt);
        for i in 0..6 {
            self.state[i] = state[i] + h6 * (dydx[i] + dyt[i] + 2.0 * dym[i]);
        }
    }

    fn outside_bounds(&self) -> bool {
        self.state[0].abs() > 2.4
            || self.state[2].abs() > THIRTY_SIX_DEGREES
            || self.state[4].abs() > THIRTY_SIX_DEGREES
    }
}

/// Generation evaluator for the double-pole task, Markov or not.
pub struct CartDoublePoleEvaluator {
    out_dir: PathBuf,
    markov: bool,
    cart: CartDoublePole,
}

impl CartDoublePoleEvaluator {
    pub fn new(out_dir: impl Into<PathBuf>, markov: bool) -> CartDoublePoleEvaluator {
        CartDoublePoleEvaluator {
            out_dir: out_dir.into(),
            markov,
            cart: CartDoublePole::new(markov),
        }
    }

    /// Scores one organism, returning whether it won under the current
    /// phase's rule.
    fn org_evaluate(&mut self, organism: &mut Organism) -> bool {
        organism.fitness = self.cart.eval_net(organism.phenotype());
        organism.is_winner = if self.cart.markov {
            organism.fitness >= self.cart.max_fitness
        } else if self.cart.non_markov_long {
            organism.fitness >= LONG_TEST_STEPS - 1.0
        } else if self.cart.generalization_test {
            organism.fitness >= 999.0
        } else {
            false
        };
        organism.is_winner
    }

    fn dump_winner(&self, genome: &evoneat::genomics::Genome) {
        let path = self.out_dir.join("pole2_winner");
        match File::create(&path) {
            Ok(mut file) => {
                if let Err(e) = genome.write(&mut file) {
                    tracing::error!("failed to write winner genome: {}", e);
                }
            }
            Err(e) => tracing::error!("failed to create {}: {}", path.display(), e),
        }
    }

    fn dump_population(&self, population: &Population, generation: usize) {
        let path = self.out_dir.join(format!("gen_{}", generation));
        match File::create(&path) {
            Ok(mut file) => {
                if let Err(e) = population.write_by_species(&mut file) {
                    tracing::error!("failed to write population dump: {}", e);
                }
            }
            Err(e) => tracing::error!("failed to create {}: {}", path.display(), e),
        }
    }

    /// Non-Markov winner hunt: re-test the most promising unchecked
    /// species champion with the long run and, if it survives, the
    /// 625-point generalization grid.
    fn check_non_markov_champion(
        &mut self,
        population: &mut Population,
        generation: &mut Generation,
        config: &Config,
    ) {
        let mut ranked: Vec<_> = population.species_mut().collect();
        ranked.sort_by(|a, b| {
            b.compute_max_and_avg_fitness()
                .0
                .partial_cmp(&a.compute_max_and_avg_fitness().0)
                .unwrap_or_else(|| panic!("species fitness is NaN"))
                .then_with(|| a.id().cmp(&b.id()))
        });
        for species in ranked.iter_mut() {
            if species.compute_max_and_avg_fitness().0 > species.max_fitness_ever {
                species.is_checked = false;
            }
        }
        let target = match ranked.iter().position(|s| !s.is_checked) {
            Some(index) => index,
            None => 0,
        };
        ranked[target].is_checked = true;
        let champion = match ranked[target].champion_mut() {
            Some(champion) => champion,
            None => return,
        };
        let champion_fitness = champion.fitness;

        self.cart.set_long_test(true);
        self.cart.set_generalization_test(false);
        if !self.org_evaluate(champion) {
            tracing::debug!("champion failed the 100000-step non-Markov run");
            champion.fitness = champion_fitness;
            self.cart.set_long_test(false);
            return;
        }

        self.cart.set_long_test(false);
        let state_vals = [0.05, 0.25, 0.5, 0.75, 0.95];
        let mut score = 0;
        for &s0 in &state_vals {
            for &s1 in &state_vals {
                for &s2 in &state_vals {
                    for &s3 in &state_vals {
                        self.cart.set_generalization_state(
                            s0 * 4.32 - 2.16,
                            s1 * 2.70 - 1.35,
                            s2 * 0.12566304 - 0.06283152, // 3.6 degrees
                            s3 * 0.30019504 - 0.15009752, // 8.6 degrees
                        );
                        self.cart.set_generalization_test(true);
                        // Leftover recurrent activation from the previous
                        // run must not leak into this one.
                        champion.phenotype().flush();
                        if self.org_evaluate(champion) {
                            score += 1;
                        }
                    }
                }
            }
        }
        self.cart.set_generalization_test(false);

        if score >= GENERALIZATION_GOAL {
            tracing::debug!(score, "non-Markov champion generalized");
            champion.is_winner = true;
            generation.solved = true;
            generation.winner_nodes = champion.genome().nodes().count();
            generation.winner_genes = champion.genome().extrons();
            generation.winner_evals = config.pop_size * (generation.id - 1) + champion.id();
        } else {
            tracing::debug!(score, "non-Markov champion failed to generalize");
            champion.fitness = champion_fitness;
        }
    }
}

impl GenerationEvaluator for CartDoublePoleEvaluator {
    fn trial_started(&mut self, _trial: usize) {
        self.cart = CartDoublePole::new(self.markov);
    }

    fn evaluate_generation(
        &mut self,
        population: &mut Population,
        generation: &mut Generation,
        config: &Config,
        rng: &mut SmallRng,
    ) -> Result<(), Box<dyn Error>> {
        self.cart.set_long_test(false);
        self.cart.set_generalization_test(false);

        population.evaluate(|organism| {
            self.org_evaluate(organism);
        });
        let mut winner_genome = population
            .organisms()
            .find(|o| o.is_winner)
            .map(|o| o.genome().clone());

        if let Some(ref genome) = winner_genome {
            generation.solved = true;
            generation.winner_nodes = genome.nodes().count();
            generation.winner_genes = genome.extrons();
            generation.winner_evals = config.pop_size * (generation.id - 1) + genome.id();
        }

        if !self.markov && winner_genome.is_none() {
            self.check_non_markov_champion(population, generation, config);
            if generation.solved {
                winner_genome = population
                    .organisms()
                    .find(|o| o.is_winner)
                    .map(|o| o.genome().clone());
            }
        }

        generation.fill_population_statistics(population);

        if generation.solved
            || (config.print_every > 0 && generation.id % config.print_every == 0)
        {
            self.dump_population(population, generation.id);
        }

        if let Some(genome) = winner_genome {
            self.dump_winner(&genome);
        } else {
            population.epoch(generation.id, rng)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoneat::genomics::{Gene, Genome, NeuronType, NodeGene};
    use evoneat::populations::Organism;

    fn markov_organism() -> Organism {
        let mut nodes = Vec::new();
        for i in 1..=6 {
            nodes.push(NodeGene::new(i, NeuronType::Input));
        }
        nodes.push(NodeGene::new(7, NeuronType::Bias));
        nodes.push(NodeGene::new(8, NeuronType::Output));
        let genes = (1..=7)
            .map(|i| Gene::new(i, i, 8, 0.0, false))
            .collect();
        Organism::new(Genome::new(1, vec![], nodes, genes).unwrap(), 0)
    }

    #[test]
    fn zero_network_balances_briefly() {
        // All-zero weights emit a constant 0.5 force offset of zero;
        // the poles drift and fall within a few hundred steps.
        let mut cart = CartDoublePole::new(true);
        let mut organism = markov_organism();
        let fitness = cart.eval_net(organism.phenotype());
        assert!(fitness >= 1.0);
        assert!(fitness < 10_000.0, "uncontrolled cart balanced {}", fitness);
    }

    #[test]
    fn non_markov_fitness_is_bounded_without_balance() {
        let mut nodes = vec![
            NodeGene::new(1, NeuronType::Input),
            NodeGene::new(2, NeuronType::Input),
            NodeGene::new(3, NeuronType::Input),
            NodeGene::new(4, NeuronType::Bias),
            NodeGene::new(5, NeuronType::Output),
        ];
        nodes.sort_by_key(|n| n.id());
        let genes = (1..=4).map(|i| Gene::new(i, i, 5, 0.0, false)).collect();
        let mut organism = Organism::new(Genome::new(1, vec![], nodes, genes).unwrap(), 0);

        let mut cart = CartDoublePole::new(false);
        let fitness = cart.eval_net(organism.phenotype());
        // 0.1 · balanced/1000 (+ jiggle term when balanced > 100).
        assert!(fitness > 0.0);
        assert!(fitness <= 0.1 + 0.9 * 0.75);
    }

    #[test]
    fn generalization_state_survives_reset() {
        let mut cart = CartDoublePole::new(false);
        cart.set_generalization_test(true);
        cart.set_generalization_state(1.0, 0.5, 0.05, 0.1);
        cart.reset_state();
        assert_eq!(cart.state[0], 1.0);
        assert_eq!(cart.state[2], 0.05);

        cart.set_generalization_test(false);
        cart.reset_state();
        assert_eq!(cart.state[0], 0.0);
        assert_eq!(cart.state[2], ONE_DEGREE);
    }

    #[test]
    fn rk4_conserves_nothing_but_stays_finite() {
        let mut cart = CartDoublePole::new(true);
        cart.reset_state();
        for _ in 0..1000 {
            cart.perform_action(0.5, 0.0);
        }
        assert!(cart.state.iter().all(|s| s.is_finite()));
    }
}

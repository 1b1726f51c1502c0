//! The XOR experiment. XOR is not linearly separable, so solving it
//! requires at least one hidden unit — which makes it a small but real
//! check that topology actually evolves. Recurrency is disabled: a
//! recurrent net can "solve" XOR by memorizing the sample order.

use crate::experiment::{Generation, GenerationEvaluator};

use evoneat::config::Config;
use evoneat::genomics::Genome;
use evoneat::populations::{Organism, Population};

use rand::rngs::SmallRng;

use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

/// Outputs beyond `1 - PRECISION` count as one, below `PRECISION` as
/// zero.
const PRECISION: f64 = 0.5;

const CASES: [([f64; 2], f64); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

/// Generation evaluator for XOR. Fitness is `(4 - Σ|error|)²`; a winner
/// classifies all four cases within [`PRECISION`].
pub struct XorEvaluator {
    out_dir: PathBuf,
}

impl XorEvaluator {
    pub fn new(out_dir: impl Into<PathBuf>) -> XorEvaluator {
        XorEvaluator {
            out_dir: out_dir.into(),
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

    fn dump_winner(&self, genome: &Genome) {
        let path = self.out_dir.join("xor_winner");
        match File::create(&path) {
            Ok(mut file) => {
                if let Err(e) = genome.write(&mut file) {
                    tracing::error!("failed to write winner genome: {}", e);
                } else {
                    tracing::info!("winner genome dumped to {}", path.display());
                }
            }
            Err(e) => tracing::error!("failed to create {}: {}", path.display(), e),
        }
    }
}

/// Scores one organism over the four XOR cases. Returns whether it is a
/// winner.
pub fn evaluate_organism(organism: &mut Organism) -> bool {
    let depth = match organism.phenotype().max_activation_depth() {
        Ok(depth) => depth.max(1),
        Err(e) => {
            tracing::debug!(organism = organism.id(), "depth failed: {}", e);
            organism.fitness = 0.001;
            organism.is_winner = false;
            return false;
        }
    };

    let mut outputs = [0.0; 4];
    for (case, (inputs, _)) in CASES.iter().enumerate() {
        let network = organism.phenotype();
        network.flush();
        if network.load_sensors(inputs).is_err() || network.forward_steps(depth).is_err() {
            organism.fitness = 0.001;
            organism.is_winner = false;
            return false;
        }
        outputs[case] = network.read_outputs()[0];
    }

    let error_sum: f64 = CASES
        .iter()
        .zip(&outputs)
        .map(|((_, expected), output)| (output - expected).abs())
        .sum();
    organism.fitness = (4.0 - error_sum).powi(2);
    organism.error = error_sum;
    organism.is_winner = outputs[0] < PRECISION
        && outputs[1] >= 1.0 - PRECISION
        && outputs[2] >= 1.0 - PRECISION
        && outputs[3] < PRECISION;
    organism.is_winner
}

impl GenerationEvaluator for XorEvaluator {
    fn evaluate_generation(
        &mut self,
        population: &mut Population,
        generation: &mut Generation,
        config: &Config,
        rng: &mut SmallRng,
    ) -> Result<(), Box<dyn Error>> {
        population.evaluate(|organism| {
            evaluate_organism(organism);
        });

        let mut winner_genome = None;
        if let Some(winner) = population.organisms().find(|o| o.is_winner) {
            generation.solved = true;
            generation.winner_nodes = winner.genome().nodes().count();
            generation.winner_genes = winner.genome().extrons();
            generation.winner_evals = config.pop_size * (generation.id - 1) + winner.id();
            winner_genome = Some(winner.genome().clone());
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
    use evoneat::genomics::{Gene, NeuronType, NodeGene};
    use evoneat::networks::ActivationKind;

    /// A hand-built XOR solver: two hidden units implementing
    /// OR-and-not-AND with saturated sigmoid weights.
    fn xor_solver() -> Genome {
        let mut genome = Genome::new(
            1,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Input),
                NodeGene::new(3, NeuronType::Bias),
                NodeGene::new(4, NeuronType::Hidden),
                NodeGene::new(5, NeuronType::Hidden),
                NodeGene::new(6, NeuronType::Output),
            ],
            vec![
                // Hidden 4: OR of the inputs.
                Gene::new(1, 1, 4, 10.0, false),
                Gene::new(2, 2, 4, 10.0, false),
                Gene::new(3, 3, 4, -5.0, false),
                // Hidden 5: AND of the inputs.
                Gene::new(4, 1, 5, 10.0, false),
                Gene::new(5, 2, 5, 10.0, false),
                Gene::new(6, 3, 5, -15.0, false),
                // Output: OR and not AND.
                Gene::new(7, 4, 6, 10.0, false),
                Gene::new(8, 5, 6, -10.0, false),
                Gene::new(9, 3, 6, -5.0, false),
            ],
        )
        .unwrap();
        for node in [4, 5, 6] {
            assert!(genome.set_node_activation(node, ActivationKind::SigmoidSteepened));
        }
        genome
    }

    #[test]
    fn hand_built_solver_wins() {
        let mut organism = Organism::new(xor_solver(), 0);
        assert!(evaluate_organism(&mut organism));
        assert!(organism.fitness > 15.5, "fitness {}", organism.fitness);
    }

    #[test]
    fn unconnected_output_is_no_winner() {
        let genome = Genome::new(
            1,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Input),
                NodeGene::new(3, NeuronType::Bias),
                NodeGene::new(4, NeuronType::Output),
            ],
            vec![Gene::new(1, 1, 4, 0.0, false)],
        )
        .unwrap();
        let mut organism = Organism::new(genome, 0);
        assert!(!evaluate_organism(&mut organism));
        assert!(organism.fitness < 16.0);
    }
}

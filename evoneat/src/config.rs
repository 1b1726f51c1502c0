//! The NEAT parameter set, loadable from the flat key-value text
//! format used by experiment configuration files.

use serde::{Deserialize, Serialize};

use std::error::Error;
use std::fmt;
use std::io::{self, BufRead, Write};

/// All tunable parameters of the algorithm.
///
/// Probabilities are expected to lie in `[0.0, 1.0]`; coefficients and
/// powers are unconstrained. The [`Default`] values reproduce the classic
/// XOR experiment configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of organisms in every generation.
    pub pop_size: usize,
    /// Number of independent trials an experiment performs.
    pub num_runs: usize,
    /// Number of generations per trial.
    pub num_generations: usize,
    /// Compatibility distance beyond which two genomes belong
    /// to different species.
    pub compat_threshold: f64,
    /// Weight of disjoint genes in compatibility distance.
    pub disjoint_coeff: f64,
    /// Weight of excess genes in compatibility distance.
    pub excess_coeff: f64,
    /// Weight of the mean matching-gene weight difference in
    /// compatibility distance.
    pub mutdiff_coeff: f64,
    /// Fraction of each species allowed to reproduce.
    pub survival_thresh: f64,
    /// Chance that an offspring mutation splits a gene with a new node.
    pub mutate_add_node_prob: f64,
    /// Chance that an offspring mutation adds a new gene.
    pub mutate_add_link_prob: f64,
    /// Chance that a genome has its gene weights perturbed.
    pub mutate_link_weights_prob: f64,
    /// Chance of flipping a random gene's enable flag.
    pub mutate_toggle_enable_prob: f64,
    /// Chance of re-enabling the first disabled gene.
    pub mutate_gene_reenable_prob: f64,
    /// Chance of perturbing the parameters of a random trait.
    pub mutate_random_trait_prob: f64,
    /// Chance of pointing a random gene at a new trait.
    pub mutate_link_trait_prob: f64,
    /// Chance of pointing a random node at a new trait.
    pub mutate_node_trait_prob: f64,
    /// Magnitude of trait parameter perturbations.
    pub trait_mutation_power: f64,
    /// Per-parameter chance of perturbation during trait mutation.
    pub trait_param_mut_prob: f64,
    /// Magnitude of gene weight perturbations.
    pub weight_mut_power: f64,
    /// Chance of mating by randomly picking matching genes.
    pub mate_multipoint_prob: f64,
    /// Chance of mating by averaging matching gene weights.
    pub mate_multipoint_avg_prob: f64,
    /// Chance of mating by a single crossover point.
    pub mate_singlepoint_prob: f64,
    /// Chance that a mated child is not additionally mutated.
    pub mate_only_prob: f64,
    /// Chance that an offspring is produced by mutation alone.
    pub mutate_only_prob: f64,
    /// Chance that the second parent is drawn from another species.
    pub interspecies_mate_rate: f64,
    /// Generations without improvement before a species is
    /// penalized as stagnant.
    pub dropoff_age: usize,
    /// Fitness bonus multiplier for young species.
    pub age_significance: f64,
    /// Population dump cadence, in generations.
    pub print_every: usize,
    /// Offspring transferred from the weakest species to the
    /// champions of the strongest. Disabled when zero.
    pub babies_stolen: usize,
    /// Chance that an add-link mutation searches only for
    /// recurrent placements.
    pub recur_only_prob: f64,
    /// Chance that a freshly added link is made recurrent when
    /// the recurrence policy allows either.
    pub recur_prob: f64,
    /// Attempts an add-link mutation makes before giving up.
    pub new_link_tries: usize,
    /// Chance that a gene disabled in either parent stays
    /// disabled in the child.
    pub disable_inherit_prob: f64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            pop_size: 150,
            num_runs: 100,
            num_generations: 100,
            compat_threshold: 3.0,
            disjoint_coeff: 1.0,
            excess_coeff: 1.0,
            mutdiff_coeff: 0.4,
            survival_thresh: 0.2,
            mutate_add_node_prob: 0.03,
            mutate_add_link_prob: 0.05,
            mutate_link_weights_prob: 0.9,
            mutate_toggle_enable_prob: 0.0,
            mutate_gene_reenable_prob: 0.0,
            mutate_random_trait_prob: 0.1,
            mutate_link_trait_prob: 0.1,
            mutate_node_trait_prob: 0.1,
            trait_mutation_power: 1.0,
            trait_param_mut_prob: 0.5,
            weight_mut_power: 2.5,
            mate_multipoint_prob: 0.6,
            mate_multipoint_avg_prob: 0.4,
            mate_singlepoint_prob: 0.0,
            mate_only_prob: 0.2,
            mutate_only_prob: 0.25,
            interspecies_mate_rate: 0.001,
            dropoff_age: 15,
            age_significance: 1.0,
            print_every: 10,
            babies_stolen: 0,
            recur_only_prob: 0.0,
            recur_prob: 0.0,
            new_link_tries: 20,
            disable_inherit_prob: 0.75,
        }
    }
}

impl Config {
    /// Reads a configuration from the flat text format: one
    /// whitespace-separated `Key value` pair per line, `#` comments
    /// and blank lines ignored.
    ///
    /// # Errors
    /// Returns an error on I/O failure, on malformed lines, on values
    /// that fail to parse, and on unrecognized keys.
    ///
    /// # Examples
    /// ```
    /// use evoneat::config::Config;
    ///
    /// let text = "\
    /// # minimal overrides
    /// PopSize 200
    /// CompatThreshold 4.0
    /// ";
    /// let config = Config::read(text.as_bytes()).unwrap();
    /// assert_eq!(config.pop_size, 200);
    /// assert_eq!(config.compat_threshold, 4.0);
    /// ```
    pub fn read<R: BufRead>(reader: R) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line.map_err(ConfigError::Io)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let key = fields.next().unwrap();
            let value = fields
                .next()
                .ok_or_else(|| ConfigError::missing_value(line_number + 1, key))?;
            config.set(key, value, line_number + 1)?;
        }
        Ok(config)
    }

    /// Writes the configuration in the same flat text format
    /// accepted by [`Config::read`].
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "PopSize {}", self.pop_size)?;
        writeln!(writer, "NumRuns {}", self.num_runs)?;
        writeln!(writer, "NumGenerations {}", self.num_generations)?;
        writeln!(writer, "CompatThreshold {}", self.compat_threshold)?;
        writeln!(writer, "DisjointCoeff {}", self.disjoint_coeff)?;
        writeln!(writer, "ExcessCoeff {}", self.excess_coeff)?;
        writeln!(writer, "MutdiffCoeff {}", self.mutdiff_coeff)?;
        writeln!(writer, "SurvivalThresh {}", self.survival_thresh)?;
        writeln!(writer, "MutateAddNodeProb {}", self.mutate_add_node_prob)?;
        writeln!(writer, "MutateAddLinkProb {}", self.mutate_add_link_prob)?;
        writeln!(
            writer,
            "MutateLinkWeightsProb {}",
            self.mutate_link_weights_prob
        )?;
        writeln!(
            writer,
            "MutateToggleEnableProb {}",
            self.mutate_toggle_enable_prob
        )?;
        writeln!(
            writer,
            "MutateGeneReenableProb {}",
            self.mutate_gene_reenable_prob
        )?;
        writeln!(
            writer,
            "MutateRandomTraitProb {}",
            self.mutate_random_trait_prob
        )?;
        writeln!(writer, "MutateLinkTraitProb {}", self.mutate_link_trait_prob)?;
        writeln!(writer, "MutateNodeTraitProb {}", self.mutate_node_trait_prob)?;
        writeln!(writer, "TraitMutationPower {}", self.trait_mutation_power)?;
        writeln!(writer, "TraitParamMutProb {}", self.trait_param_mut_prob)?;
        writeln!(writer, "WeightMutPower {}", self.weight_mut_power)?;
        writeln!(writer, "MateMultipointProb {}", self.mate_multipoint_prob)?;
        writeln!(
            writer,
            "MateMultipointAvgProb {}",
            self.mate_multipoint_avg_prob
        )?;
        writeln!(writer, "MateSinglepointProb {}", self.mate_singlepoint_prob)?;
        writeln!(writer, "MateOnlyProb {}", self.mate_only_prob)?;
        writeln!(writer, "MutateOnlyProb {}", self.mutate_only_prob)?;
        writeln!(writer, "InterspeciesMateRate {}", self.interspecies_mate_rate)?;
        writeln!(writer, "DropoffAge {}", self.dropoff_age)?;
        writeln!(writer, "AgeSignificance {}", self.age_significance)?;
        writeln!(writer, "PrintEvery {}", self.print_every)?;
        writeln!(writer, "BabiesStolen {}", self.babies_stolen)?;
        writeln!(writer, "RecurOnlyProb {}", self.recur_only_prob)?;
        writeln!(writer, "RecurProb {}", self.recur_prob)?;
        writeln!(writer, "NewLinkTries {}", self.new_link_tries)?;
        writeln!(writer, "DisableInheritProb {}", self.disable_inherit_prob)?;
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        fn float(value: &str, line: usize, key: &str) -> Result<f64, ConfigError> {
            value
                .parse()
                .map_err(|_| ConfigError::bad_value(line, key, value))
        }
        fn count(value: &str, line: usize, key: &str) -> Result<usize, ConfigError> {
            value
                .parse()
                .map_err(|_| ConfigError::bad_value(line, key, value))
        }

        match key {
            "PopSize" => self.pop_size = count(value, line, key)?,
            "NumRuns" => self.num_runs = count(value, line, key)?,
            "NumGenerations" => self.num_generations = count(value, line, key)?,
            "CompatThreshold" => self.compat_threshold = float(value, line, key)?,
            "DisjointCoeff" => self.disjoint_coeff = float(value, line, key)?,
            "ExcessCoeff" => self.excess_coeff = float(value, line, key)?,
            "MutdiffCoeff" => self.mutdiff_coeff = float(value, line, key)?,
            "SurvivalThresh" => self.survival_thresh = float(value, line, key)?,
            "MutateAddNodeProb" => self.mutate_add_node_prob = float(value, line, key)?,
            "MutateAddLinkProb" => self.mutate_add_link_prob = float(value, line, key)?,
            "MutateLinkWeightsProb" => self.mutate_link_weights_prob = float(value, line, key)?,
            "MutateToggleEnableProb" => self.mutate_toggle_enable_prob = float(value, line, key)?,
            "MutateGeneReenableProb" => self.mutate_gene_reenable_prob = float(value, line, key)?,
            "MutateRandomTraitProb" => self.mutate_random_trait_prob = float(value, line, key)?,
            "MutateLinkTraitProb" => self.mutate_link_trait_prob = float(value, line, key)?,
            "MutateNodeTraitProb" => self.mutate_node_trait_prob = float(value, line, key)?,
            "TraitMutationPower" => self.trait_mutation_power = float(value, line, key)?,
            "TraitParamMutProb" => self.trait_param_mut_prob = float(value, line, key)?,
            "WeightMutPower" => self.weight_mut_power = float(value, line, key)?,
            "MateMultipointProb" => self.mate_multipoint_prob = float(value, line, key)?,
            "MateMultipointAvgProb" => self.mate_multipoint_avg_prob = float(value, line, key)?,
            "MateSinglepointProb" => self.mate_singlepoint_prob = float(value, line, key)?,
            "MateOnlyProb" => self.mate_only_prob = float(value, line, key)?,
            "MutateOnlyProb" => self.mutate_only_prob = float(value, line, key)?,
            "InterspeciesMateRate" => self.interspecies_mate_rate = float(value, line, key)?,
            "DropoffAge" => self.dropoff_age = count(value, line, key)?,
            "AgeSignificance" => self.age_significance = float(value, line, key)?,
            "PrintEvery" => self.print_every = count(value, line, key)?,
            "BabiesStolen" => self.babies_stolen = count(value, line, key)?,
            "RecurOnlyProb" => self.recur_only_prob = float(value, line, key)?,
            "RecurProb" => self.recur_prob = float(value, line, key)?,
            "NewLinkTries" => self.new_link_tries = count(value, line, key)?,
            "DisableInheritProb" => self.disable_inherit_prob = float(value, line, key)?,
            _ => {
                return Err(ConfigError::UnknownKey {
                    line,
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// An error produced while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The underlying reader failed.
    Io(io::Error),
    /// A line held a key with no value.
    MissingValue { line: usize, key: String },
    /// A value failed to parse as the expected type.
    BadValue {
        line: usize,
        key: String,
        value: String,
    },
    /// The key is not a recognized parameter name.
    UnknownKey { line: usize, key: String },
}

impl ConfigError {
    fn missing_value(line: usize, key: &str) -> ConfigError {
        ConfigError::MissingValue {
            line,
            key: key.to_string(),
        }
    }

    fn bad_value(line: usize, key: &str, value: &str) -> ConfigError {
        ConfigError::BadValue {
            line,
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read configuration: {}", e),
            Self::MissingValue { line, key } => {
                write!(f, "line {}: no value for key {}", line, key)
            }
            Self::BadValue { line, key, value } => {
                write!(f, "line {}: bad value {:?} for key {}", line, value, key)
            }
            Self::UnknownKey { line, key } => {
                write!(f, "line {}: unknown configuration key {}", line, key)
            }
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_overrides_defaults() {
        let text = "PopSize 1000\nDropoffAge 30\nWeightMutPower 1.8\n";
        let config = Config::read(text.as_bytes()).unwrap();
        assert_eq!(config.pop_size, 1000);
        assert_eq!(config.dropoff_age, 30);
        assert_eq!(config.weight_mut_power, 1.8);
        // Untouched keys keep their defaults.
        assert_eq!(config.new_link_tries, Config::default().new_link_tries);
    }

    #[test]
    fn write_read_round_trip() {
        let config = Config {
            pop_size: 42,
            mate_singlepoint_prob: 0.125,
            babies_stolen: 6,
            ..Config::default()
        };
        let mut buffer = Vec::new();
        config.write(&mut buffer).unwrap();
        let restored = Config::read(buffer.as_slice()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::read("NoSuchKey 1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownKey { line: 1, .. }));
    }

    #[test]
    fn bad_value_is_rejected() {
        let err = Config::read("PopSize lots\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::BadValue { line: 1, .. }));
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let text = "# header\n\nPopSize 7\n  # indented comment\n";
        let config = Config::read(text.as_bytes()).unwrap();
        assert_eq!(config.pop_size, 7);
    }
}

//! Genomes are the focus of evolution in NEAT.
//! A genome is an ordered collection of traits, nodes and genes that can
//! be instantiated as a phenotype (a neural network). Genomes are
//! progressively complexified by the mutation operators and recombined by
//! historically-aligned crossover.

mod errors;
mod genes;
mod history;
mod io;
mod nodes;
mod traits;

pub use errors::{GenomeParseError, GenomeValidityError, MutationError};
pub use genes::Gene;
pub use history::{InnovationLedger, NodeSplit};
pub use nodes::{NeuronType, NodeGene};
pub use traits::{Trait, TRAIT_PARAM_COUNT};

use crate::config::Config;
use crate::networks::ActivationKind;
use crate::Innovation;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use std::collections::HashSet;
use std::fmt;

/// Weights are clamped to this magnitude by the weight mutation operator.
const WEIGHT_CAP: f64 = 8.0;

/// Below this gene count, compatibility distance is not normalized by
/// genome size.
const SMALL_GENOME_SIZE: usize = 20;

/// A heritable description of a network: ordered traits, nodes, and
/// genes sorted by innovation number.
///
/// Invariants (checked by [`Genome::verify`], enforced by every
/// constructor): node ids are unique, every gene's endpoints exist in the
/// node list, no two genes share a `(source, target, recurrent)` triple,
/// no gene targets a sensor, and gene innovation numbers are strictly
/// increasing.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Genome {
    id: usize,
    traits: Vec<Trait>,
    nodes: Vec<NodeGene>,
    genes: Vec<Gene>,
}

impl Genome {
    /// Assembles and validates a genome from its parts. Traits and nodes
    /// are sorted by id; genes must already be in innovation order.
    ///
    /// # Errors
    /// Returns the first invariant violation found, if any.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::{Gene, Genome, NeuronType, NodeGene};
    ///
    /// let genome = Genome::new(
    ///     1,
    ///     vec![],
    ///     vec![
    ///         NodeGene::new(1, NeuronType::Input),
    ///         NodeGene::new(2, NeuronType::Bias),
    ///         NodeGene::new(3, NeuronType::Output),
    ///     ],
    ///     vec![
    ///         Gene::new(1, 1, 3, 0.5, false),
    ///         Gene::new(2, 2, 3, -1.0, false),
    ///     ],
    /// )
    /// .unwrap();
    /// assert_eq!(genome.nodes().count(), 3);
    /// assert_eq!(genome.genes().count(), 2);
    /// ```
    pub fn new(
        id: usize,
        mut traits: Vec<Trait>,
        mut nodes: Vec<NodeGene>,
        genes: Vec<Gene>,
    ) -> Result<Genome, GenomeValidityError> {
        traits.sort_unstable_by_key(Trait::id);
        nodes.sort_unstable_by_key(NodeGene::id);
        let genome = Genome {
            id,
            traits,
            nodes,
            genes,
        };
        genome.verify()?;
        Ok(genome)
    }

    /// Generates a random genome: `inputs` sensors (the last of which is
    /// a bias), `hidden` hidden nodes, `outputs` outputs, and a link into
    /// each non-sensor node from each eligible source with probability
    /// `link_prob` (recurrent sources included when `recurrent` is set).
    /// Every non-sensor node is guaranteed at least one incoming link.
    pub fn new_random(
        rng: &mut impl Rng,
        id: usize,
        inputs: usize,
        outputs: usize,
        hidden: usize,
        recurrent: bool,
        link_prob: f64,
    ) -> Genome {
        assert!(inputs >= 1 && outputs >= 1, "genome needs sensors and outputs");
        let mut nodes = Vec::with_capacity(inputs + hidden + outputs);
        for i in 1..=inputs {
            let neuron_type = if i == inputs {
                NeuronType::Bias
            } else {
                NeuronType::Input
            };
            nodes.push(NodeGene::new(i, neuron_type));
        }
        for h in 1..=hidden {
            nodes.push(NodeGene::new(inputs + h, NeuronType::Hidden));
        }
        for o in 1..=outputs {
            nodes.push(NodeGene::new(inputs + hidden + o, NeuronType::Output));
        }

        let mut genes: Vec<Gene> = Vec::new();
        let mut innovation = 1;
        for target_index in inputs..nodes.len() {
            let target = nodes[target_index].id();
            let feed_forward_sources = if nodes[target_index].neuron_type() == NeuronType::Hidden {
                1..=inputs
            } else {
                1..=inputs + hidden
            };
            let mut attached = false;
            for source in feed_forward_sources.clone() {
                if rng.gen::<f64>() < link_prob {
                    let weight = rng.gen_range(-1.0..=1.0);
                    genes.push(Gene::new(innovation, source, target, weight, false));
                    innovation += 1;
                    attached = true;
                }
            }
            if recurrent && rng.gen::<f64>() < link_prob {
                let weight = rng.gen_range(-1.0..=1.0);
                genes.push(Gene::new(innovation, target, target, weight, true));
                innovation += 1;
            }
            if !attached {
                let source = rng.gen_range(feed_forward_sources);
                let weight = rng.gen_range(-1.0..=1.0);
                genes.push(Gene::new(innovation, source, target, weight, false));
                innovation += 1;
            }
        }

        Genome {
            id,
            traits: vec![Trait::new_random(1, rng)],
            nodes,
            genes,
        }
    }

    /// Returns an exact copy of the genome under a new id.
    pub fn duplicate(&self, new_id: usize) -> Genome {
        Genome {
            id: new_id,
            ..self.clone()
        }
    }

    /// Checks every structural invariant.
    ///
    /// # Errors
    /// Returns the first violation found: duplicate node ids, dangling
    /// gene endpoints, duplicate `(source, target, recurrent)` triples,
    /// out-of-order innovation numbers, sensor targets, or unknown trait
    /// references.
    pub fn verify(&self) -> Result<(), GenomeValidityError> {
        for pair in self.nodes.windows(2) {
            if pair[0].id() == pair[1].id() {
                return Err(GenomeValidityError::DuplicateNodeId(pair[0].id()));
            }
        }

        for node in &self.nodes {
            if let Some(trait_id) = node.trait_id() {
                if self.trait_index(trait_id).is_none() {
                    return Err(GenomeValidityError::UnknownTrait(trait_id));
                }
            }
        }

        let mut previous: Option<Innovation> = None;
        let mut endpoints = HashSet::new();
        for gene in &self.genes {
            if let Some(previous) = previous {
                if gene.innovation() <= previous {
                    return Err(GenomeValidityError::OutOfOrderInnovations {
                        previous,
                        found: gene.innovation(),
                    });
                }
            }
            previous = Some(gene.innovation());

            for endpoint in [gene.in_node(), gene.out_node()] {
                if self.node_index(endpoint).is_none() {
                    return Err(GenomeValidityError::DanglingEndpoint {
                        innovation: gene.innovation(),
                        node: endpoint,
                    });
                }
            }
            if self.node(gene.out_node()).unwrap().is_sensor() {
                return Err(GenomeValidityError::SensorTarget {
                    innovation: gene.innovation(),
                    node: gene.out_node(),
                });
            }
            if !endpoints.insert((gene.in_node(), gene.out_node(), gene.recurrent())) {
                return Err(GenomeValidityError::DuplicateGeneEndpoints {
                    in_node: gene.in_node(),
                    out_node: gene.out_node(),
                    recurrent: gene.recurrent(),
                });
            }
            if let Some(trait_id) = gene.trait_id() {
                if self.trait_index(trait_id).is_none() {
                    return Err(GenomeValidityError::UnknownTrait(trait_id));
                }
            }
        }
        Ok(())
    }

    /// Calculates the compatibility distance to `other`:
    /// `c1·E/N + c2·D/N + c3·W̄`, with `E` the excess gene count, `D` the
    /// disjoint gene count, `W̄` the mean absolute weight difference over
    /// matching genes, and `N` the gene count of the larger genome
    /// (1 when that count is below 20).
    ///
    /// Distance is symmetric: `a.compatibility(b, c) == b.compatibility(a, c)`.
    pub fn compatibility(&self, other: &Genome, config: &Config) -> f64 {
        let mut matching = 0usize;
        let mut disjoint = 0usize;
        let mut excess = 0usize;
        let mut weight_diff_total = 0.0;

        let (mut i, mut j) = (0, 0);
        while i < self.genes.len() && j < other.genes.len() {
            let a = &self.genes[i];
            let b = &other.genes[j];
            if a.innovation() == b.innovation() {
                matching += 1;
                weight_diff_total += (a.weight() - b.weight()).abs();
                i += 1;
                j += 1;
            } else if a.innovation() < b.innovation() {
                disjoint += 1;
                i += 1;
            } else {
                disjoint += 1;
                j += 1;
            }
        }
        excess += (self.genes.len() - i) + (other.genes.len() - j);

        let larger = self.genes.len().max(other.genes.len());
        let n = if larger < SMALL_GENOME_SIZE { 1 } else { larger } as f64;
        let mean_weight_diff = weight_diff_total / matching.max(1) as f64;

        config.excess_coeff * excess as f64 / n
            + config.disjoint_coeff * disjoint as f64 / n
            + config.mutdiff_coeff * mean_weight_diff
    }

    /// Perturbs gene weights in the classic NEAT manner: each gene is
    /// either nudged by a uniform amount in `±power`, replaced outright,
    /// or left alone, with replacement pressure concentrated on the
    /// newest genes. A coin flip per call makes the whole pass "severe",
    /// raising both probabilities. Weights are clamped to ±8.
    pub fn mutate_link_weights(&mut self, rng: &mut impl Rng, power: f64, rate: f64) {
        let severe = rng.gen_bool(0.5);
        let gene_total = self.genes.len() as f64;
        let end_part = gene_total * 0.8;

        for (num, gene) in self.genes.iter_mut().enumerate() {
            let (gauss_point, cold_gauss_point) = if severe {
                (0.3, 0.1)
            } else if gene_total >= 10.0 && (num as f64) > end_part {
                // Tail genes are newest, so they are reset more readily.
                (0.5, 0.3)
            } else if rng.gen_bool(0.5) {
                (1.0 - rate, 1.0 - rate - 0.1)
            } else {
                (1.0 - rate, 1.0 - rate)
            };

            let perturbation = rng.gen_range(-1.0..=1.0f64).signum() * rng.gen::<f64>() * power;
            let choice = rng.gen::<f64>();
            if choice > gauss_point {
                gene.set_weight(gene.weight() + perturbation);
            } else if choice > cold_gauss_point {
                gene.set_weight(perturbation);
            }
            gene.set_weight(gene.weight().clamp(-WEIGHT_CAP, WEIGHT_CAP));
            gene.set_mutation_num(gene.weight());
        }
    }

    /// Splits a randomly-chosen enabled gene with a new hidden node:
    /// the gene is disabled and replaced by a weight-1 gene into the new
    /// node and a gene out of it carrying the old weight. Innovation
    /// numbers come from the ledger, so an identical split elsewhere in
    /// the population this generation reuses the same numbers.
    ///
    /// # Errors
    /// Fails when no enabled, non-bias-sourced gene exists. Callers
    /// treat this as routine and skip the mutation.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::{Gene, Genome, InnovationLedger, NeuronType, NodeGene};
    /// use rand::rngs::SmallRng;
    /// use rand::SeedableRng;
    ///
    /// let mut genome = Genome::new(
    ///     1,
    ///     vec![],
    ///     vec![
    ///         NodeGene::new(1, NeuronType::Input),
    ///         NodeGene::new(2, NeuronType::Output),
    ///     ],
    ///     vec![Gene::new(1, 1, 2, 1.5, false)],
    /// )
    /// .unwrap();
    /// let mut ledger = InnovationLedger::starting_from(2, 3);
    /// let mut rng = SmallRng::seed_from_u64(0);
    ///
    /// genome.mutate_add_node(&mut ledger, &mut rng).unwrap();
    ///
    /// assert_eq!(genome.nodes().count(), 3);
    /// assert_eq!(genome.genes().count(), 3);
    /// // The split gene survives, disabled.
    /// assert!(!genome.genes().next().unwrap().enabled());
    /// ```
    pub fn mutate_add_node(
        &mut self,
        ledger: &mut InnovationLedger,
        rng: &mut impl Rng,
    ) -> Result<(), MutationError> {
        let candidates: Vec<usize> = self
            .genes
            .iter()
            .enumerate()
            .filter(|(_, g)| {
                g.enabled()
                    && self
                        .node(g.in_node())
                        .map_or(false, |n| n.neuron_type() != NeuronType::Bias)
            })
            .map(|(i, _)| i)
            .collect();
        let &gene_index = candidates.choose(rng).ok_or(MutationError::NoSplittableGene)?;

        let split_innovation = self.genes[gene_index].innovation();
        let (in_node, out_node) = self.genes[gene_index].endpoints();
        let old_weight = self.genes[gene_index].weight();
        let old_recurrent = self.genes[gene_index].recurrent();
        let old_trait = self.genes[gene_index].trait_id();

        let force_fresh = ledger
            .recorded_split(split_innovation)
            .map_or(false, |s| self.node_index(s.node_id).is_some());
        let split = ledger.node_split(split_innovation, force_fresh);

        self.genes[gene_index].set_enabled(false);
        self.insert_node(
            NodeGene::new(split.node_id, NeuronType::Hidden)
                .with_trait(self.traits.first().map(Trait::id)),
        );
        self.insert_gene(
            Gene::new(split.in_innovation, in_node, split.node_id, 1.0, old_recurrent)
                .with_trait(old_trait),
        );
        self.insert_gene(
            Gene::new(split.out_innovation, split.node_id, out_node, old_weight, false)
                .with_trait(old_trait),
        );
        Ok(())
    }

    /// Adds a new gene between two nodes chosen under the recurrence
    /// policy: with probability `recur_only_prob` only recurrent
    /// placements are considered. Up to `new_link_tries` candidate pairs
    /// are examined.
    ///
    /// # Errors
    /// Fails when no legal pair is found within the attempt bound.
    /// Callers treat this as routine and skip the mutation.
    pub fn mutate_add_link(
        &mut self,
        ledger: &mut InnovationLedger,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<(), MutationError> {
        let non_sensors: Vec<usize> = self
            .nodes
            .iter()
            .filter(|n| !n.is_sensor())
            .map(NodeGene::id)
            .collect();
        if non_sensors.is_empty() {
            return Err(MutationError::NoLinkSiteFound);
        }

        let want_recurrent = rng.gen::<f64>() < config.recur_only_prob;
        for _ in 0..config.new_link_tries {
            let (source, target) = if want_recurrent && rng.gen_bool(0.5) {
                // Self-loop.
                let node = *non_sensors.choose(rng).unwrap();
                (node, node)
            } else {
                let source = self.nodes.choose(rng).unwrap().id();
                let target = *non_sensors.choose(rng).unwrap();
                (source, target)
            };

            let is_recurrent = source == target || self.path_exists(target, source);
            if is_recurrent != want_recurrent {
                continue;
            }
            if self.has_link(source, target, is_recurrent) {
                continue;
            }

            let innovation = ledger.link_innovation(source, target, is_recurrent);
            let weight = rng.gen_range(-1.0..=1.0);
            let trait_id = self.random_trait_id(rng);
            self.insert_gene(
                Gene::new(innovation, source, target, weight, is_recurrent).with_trait(trait_id),
            );
            return Ok(());
        }
        Err(MutationError::NoLinkSiteFound)
    }

    /// Flips the enable flag of a randomly-chosen gene. A gene is only
    /// disabled if its source node keeps another enabled outgoing gene,
    /// so the mutation cannot sever a node from the network entirely.
    pub fn mutate_toggle_enable(&mut self, rng: &mut impl Rng) {
        if self.genes.is_empty() {
            return;
        }
        let index = rng.gen_range(0..self.genes.len());
        if self.genes[index].enabled() {
            let in_node = self.genes[index].in_node();
            let has_other_outlet = self
                .genes
                .iter()
                .enumerate()
                .any(|(i, g)| i != index && g.enabled() && g.in_node() == in_node);
            if has_other_outlet {
                self.genes[index].set_enabled(false);
            }
        } else {
            self.genes[index].set_enabled(true);
        }
    }

    /// Re-enables the first disabled gene, if any.
    pub fn mutate_gene_reenable(&mut self) {
        if let Some(gene) = self.genes.iter_mut().find(|g| !g.enabled()) {
            gene.set_enabled(true);
        }
    }

    /// Perturbs the parameters of a randomly-chosen trait.
    pub fn mutate_random_trait(&mut self, config: &Config, rng: &mut impl Rng) {
        if self.traits.is_empty() {
            return;
        }
        let index = rng.gen_range(0..self.traits.len());
        self.traits[index].mutate(rng, config.trait_mutation_power, config.trait_param_mut_prob);
    }

    /// Points a randomly-chosen gene at a randomly-chosen trait.
    pub fn mutate_link_trait(&mut self, rng: &mut impl Rng) {
        if self.genes.is_empty() {
            return;
        }
        let trait_id = self.random_trait_id(rng);
        let index = rng.gen_range(0..self.genes.len());
        self.genes[index].set_trait_id(trait_id);
    }

    /// Points a randomly-chosen node at a randomly-chosen trait.
    pub fn mutate_node_trait(&mut self, rng: &mut impl Rng) {
        if self.nodes.is_empty() {
            return;
        }
        let trait_id = self.random_trait_id(rng);
        let index = rng.gen_range(0..self.nodes.len());
        self.nodes[index].set_trait_id(trait_id);
    }

    /// Applies the full mutation schedule: a structural mutation
    /// (add-node, else add-link) when its probability fires, otherwise
    /// the non-structural operators each at their configured rate.
    /// Structural operators that find no legal site are skipped.
    pub fn mutate(
        &mut self,
        ledger: &mut InnovationLedger,
        config: &Config,
        rng: &mut impl Rng,
    ) {
        if rng.gen::<f64>() < config.mutate_add_node_prob {
            if let Err(e) = self.mutate_add_node(ledger, rng) {
                tracing::debug!(genome = self.id, "add-node mutation skipped: {}", e);
            }
        } else if rng.gen::<f64>() < config.mutate_add_link_prob {
            if let Err(e) = self.mutate_add_link(ledger, config, rng) {
                tracing::debug!(genome = self.id, "add-link mutation skipped: {}", e);
            }
        } else {
            if rng.gen::<f64>() < config.mutate_random_trait_prob {
                self.mutate_random_trait(config, rng);
            }
            if rng.gen::<f64>() < config.mutate_link_trait_prob {
                self.mutate_link_trait(rng);
            }
            if rng.gen::<f64>() < config.mutate_node_trait_prob {
                self.mutate_node_trait(rng);
            }
            if rng.gen::<f64>() < config.mutate_link_weights_prob {
                self.mutate_link_weights(rng, config.weight_mut_power, 1.0);
            }
            if rng.gen::<f64>() < config.mutate_toggle_enable_prob {
                self.mutate_toggle_enable(rng);
            }
            if rng.gen::<f64>() < config.mutate_gene_reenable_prob {
                self.mutate_gene_reenable();
            }
        }
    }

    /// Recombines two genomes by walking their gene lists in innovation
    /// lockstep. Matching genes are taken from either parent at random;
    /// disjoint and excess genes are inherited from the fitter parent
    /// (from both at even odds when fitnesses tie). A gene disabled in
    /// either parent is disabled in the child with probability
    /// `disable_inherit_prob`.
    ///
    /// # Errors
    /// Returns an error if the assembled child fails validation. This is
    /// an invariant violation and must abort the epoch.
    pub fn mate_multipoint(
        &self,
        other: &Genome,
        child_id: usize,
        self_fitness: f64,
        other_fitness: f64,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Genome, GenomeValidityError> {
        self.mate_aligned(other, child_id, self_fitness, other_fitness, false, config, rng)
    }

    /// Like [`Genome::mate_multipoint`], but matching genes take the
    /// arithmetic mean of the parents' weights instead of one side's.
    pub fn mate_multipoint_avg(
        &self,
        other: &Genome,
        child_id: usize,
        self_fitness: f64,
        other_fitness: f64,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Genome, GenomeValidityError> {
        self.mate_aligned(other, child_id, self_fitness, other_fitness, true, config, rng)
    }

    fn mate_aligned(
        &self,
        other: &Genome,
        child_id: usize,
        self_fitness: f64,
        other_fitness: f64,
        average_matching: bool,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Genome, GenomeValidityError> {
        let traits = Self::merge_traits(self, other);
        let tie = (self_fitness - other_fitness).abs() < f64::EPSILON;
        let self_better = self_fitness > other_fitness
            || (tie && self.genes.len() <= other.genes.len());

        let io_donor = if self_better { self } else { other };
        let mut nodes: Vec<NodeGene> = io_donor
            .nodes
            .iter()
            .filter(|n| n.is_sensor() || n.neuron_type() == NeuronType::Output)
            .cloned()
            .collect();
        let mut genes: Vec<Gene> = Vec::new();
        let mut endpoint_set: HashSet<(usize, usize, bool)> = HashSet::new();

        let mut push_gene = |gene: Gene,
                             donor: &Genome,
                             genes: &mut Vec<Gene>,
                             nodes: &mut Vec<NodeGene>| {
            if !endpoint_set.insert((gene.in_node(), gene.out_node(), gene.recurrent())) {
                return;
            }
            for endpoint in [gene.in_node(), gene.out_node()] {
                if nodes.binary_search_by_key(&endpoint, NodeGene::id).is_err() {
                    if let Some(node) = donor.node(endpoint) {
                        let at = nodes
                            .binary_search_by_key(&endpoint, NodeGene::id)
                            .unwrap_err();
                        nodes.insert(at, node.clone());
                    }
                }
            }
            genes.push(gene);
        };

        let (mut i, mut j) = (0, 0);
        while i < self.genes.len() || j < other.genes.len() {
            if i >= self.genes.len() {
                // Excess genes of `other`.
                let take = !self_better || (tie && rng.gen_bool(0.5));
                if take {
                    let gene = self.inherit_disable(other.genes[j].clone(), &other.genes[j], config, rng);
                    push_gene(gene, other, &mut genes, &mut nodes);
                }
                j += 1;
            } else if j >= other.genes.len() {
                let take = self_better || (tie && rng.gen_bool(0.5));
                if take {
                    let gene = self.inherit_disable(self.genes[i].clone(), &self.genes[i], config, rng);
                    push_gene(gene, self, &mut genes, &mut nodes);
                }
                i += 1;
            } else {
                let a = &self.genes[i];
                let b = &other.genes[j];
                if a.innovation() == b.innovation() {
                    let (mut chosen, donor) = if rng.gen_bool(0.5) {
                        (a.clone(), self)
                    } else {
                        (b.clone(), other)
                    };
                    if average_matching {
                        chosen.set_weight((a.weight() + b.weight()) / 2.0);
                    }
                    let disabled_in_parent = !a.enabled() || !b.enabled();
                    chosen.set_enabled(
                        !(disabled_in_parent && rng.gen::<f64>() < config.disable_inherit_prob),
                    );
                    push_gene(chosen, donor, &mut genes, &mut nodes);
                    i += 1;
                    j += 1;
                } else if a.innovation() < b.innovation() {
                    let take = self_better || (tie && rng.gen_bool(0.5));
                    if take {
                        let gene = self.inherit_disable(a.clone(), a, config, rng);
                        push_gene(gene, self, &mut genes, &mut nodes);
                    }
                    i += 1;
                } else {
                    let take = !self_better || (tie && rng.gen_bool(0.5));
                    if take {
                        let gene = self.inherit_disable(b.clone(), b, config, rng);
                        push_gene(gene, other, &mut genes, &mut nodes);
                    }
                    j += 1;
                }
            }
        }

        Genome::new(child_id, traits, nodes, genes)
    }

    /// Recombines two genomes around a single crossover point in the
    /// shorter genome: matching genes come from the shorter parent
    /// before the point and the longer after, with the weights averaged
    /// on the crossing gene itself. Disjoint genes are taken from
    /// whichever side currently donates.
    ///
    /// # Errors
    /// Returns an error if the assembled child fails validation.
    pub fn mate_singlepoint(
        &self,
        other: &Genome,
        child_id: usize,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Result<Genome, GenomeValidityError> {
        let (shorter, longer) = if self.genes.len() <= other.genes.len() {
            (self, other)
        } else {
            (other, self)
        };
        let traits = Self::merge_traits(self, other);
        let crosspoint = if shorter.genes.is_empty() {
            0
        } else {
            rng.gen_range(0..shorter.genes.len())
        };

        let mut nodes: Vec<NodeGene> = shorter
            .nodes
            .iter()
            .filter(|n| n.is_sensor() || n.neuron_type() == NeuronType::Output)
            .cloned()
            .collect();
        let mut genes: Vec<Gene> = Vec::new();
        let mut endpoint_set: HashSet<(usize, usize, bool)> = HashSet::new();

        let mut push_gene = |gene: Gene,
                             donor: &Genome,
                             genes: &mut Vec<Gene>,
                             nodes: &mut Vec<NodeGene>| {
            if !endpoint_set.insert((gene.in_node(), gene.out_node(), gene.recurrent())) {
                return;
            }
            for endpoint in [gene.in_node(), gene.out_node()] {
                if nodes.binary_search_by_key(&endpoint, NodeGene::id).is_err() {
                    if let Some(node) = donor.node(endpoint) {
                        let at = nodes
                            .binary_search_by_key(&endpoint, NodeGene::id)
                            .unwrap_err();
                        nodes.insert(at, node.clone());
                    }
                }
            }
            genes.push(gene);
        };

        let mut consumed = 0usize;
        let (mut i, mut j) = (0, 0);
        while i < shorter.genes.len() || j < longer.genes.len() {
            let before_point = consumed <= crosspoint;
            if i >= shorter.genes.len() {
                push_gene(longer.genes[j].clone(), longer, &mut genes, &mut nodes);
                j += 1;
            } else if j >= longer.genes.len() {
                if before_point {
                    push_gene(shorter.genes[i].clone(), shorter, &mut genes, &mut nodes);
                }
                i += 1;
                consumed += 1;
            } else {
                let a = &shorter.genes[i];
                let b = &longer.genes[j];
                if a.innovation() == b.innovation() {
                    let mut chosen = if before_point { a.clone() } else { b.clone() };
                    if consumed == crosspoint {
                        chosen.set_weight((a.weight() + b.weight()) / 2.0);
                    }
                    let disabled_in_parent = !a.enabled() || !b.enabled();
                    chosen.set_enabled(
                        !(disabled_in_parent && rng.gen::<f64>() < config.disable_inherit_prob),
                    );
                    let donor = if before_point { shorter } else { longer };
                    push_gene(chosen, donor, &mut genes, &mut nodes);
                    i += 1;
                    j += 1;
                    consumed += 1;
                } else if a.innovation() < b.innovation() {
                    if before_point {
                        push_gene(a.clone(), shorter, &mut genes, &mut nodes);
                    }
                    i += 1;
                    consumed += 1;
                } else {
                    if !before_point {
                        push_gene(b.clone(), longer, &mut genes, &mut nodes);
                    }
                    j += 1;
                }
            }
        }

        Genome::new(child_id, traits, nodes, genes)
    }

    fn inherit_disable(
        &self,
        mut gene: Gene,
        parent_gene: &Gene,
        config: &Config,
        rng: &mut impl Rng,
    ) -> Gene {
        if !parent_gene.enabled() {
            gene.set_enabled(!(rng.gen::<f64>() < config.disable_inherit_prob));
        }
        gene
    }

    /// Merges parents' trait lists by id, averaging parameters where
    /// both carry a trait.
    fn merge_traits(first: &Genome, second: &Genome) -> Vec<Trait> {
        let mut traits: Vec<Trait> = Vec::with_capacity(first.traits.len().max(second.traits.len()));
        for t in &first.traits {
            match second.trait_index(t.id()) {
                Some(other_index) => traits.push(Trait::new_avg(t, &second.traits[other_index])),
                None => traits.push(t.clone()),
            }
        }
        for t in &second.traits {
            if first.trait_index(t.id()).is_none() {
                traits.push(t.clone());
            }
        }
        traits
    }

    /// Returns whether `to` is reachable from `from` through enabled
    /// non-recurrent genes. Used to classify a candidate link as
    /// recurrent before it is added.
    pub fn path_exists(&self, from: usize, to: usize) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            for gene in &self.genes {
                if gene.enabled() && !gene.recurrent() && gene.in_node() == node {
                    stack.push(gene.out_node());
                }
            }
        }
        false
    }

    /// Returns the genome's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Reassigns the genome's id.
    pub fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// Returns an iterator over the genes, in innovation order.
    pub fn genes(&self) -> impl Iterator<Item = &Gene> {
        self.genes.iter()
    }

    /// Returns an iterator over the nodes, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeGene> {
        self.nodes.iter()
    }

    /// Returns an iterator over the traits, in id order.
    pub fn traits(&self) -> impl Iterator<Item = &Trait> {
        self.traits.iter()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: usize) -> Option<&NodeGene> {
        self.node_index(id).map(|i| &self.nodes[i])
    }

    /// Looks up a trait by id.
    pub fn lookup_trait(&self, id: usize) -> Option<&Trait> {
        self.trait_index(id).map(|i| &self.traits[i])
    }

    /// Returns the number of enabled genes.
    pub fn extrons(&self) -> usize {
        self.genes.iter().filter(|g| g.enabled()).count()
    }

    /// Returns the highest node id, if any node exists.
    pub fn last_node_id(&self) -> Option<usize> {
        self.nodes.last().map(NodeGene::id)
    }

    /// Returns the highest gene innovation number, if any gene exists.
    pub fn last_gene_innovation(&self) -> Option<Innovation> {
        self.genes.last().map(Gene::innovation)
    }

    /// Sets a node's activation function tag. Returns false if the node
    /// does not exist.
    pub fn set_node_activation(&mut self, node_id: usize, activation: ActivationKind) -> bool {
        match self.node_index(node_id) {
            Some(index) => {
                let node = self.nodes[index].clone().with_activation(activation);
                self.nodes[index] = node;
                true
            }
            None => false,
        }
    }

    fn node_index(&self, id: usize) -> Option<usize> {
        self.nodes.binary_search_by_key(&id, NodeGene::id).ok()
    }

    fn trait_index(&self, id: usize) -> Option<usize> {
        self.traits.binary_search_by_key(&id, Trait::id).ok()
    }

    fn has_link(&self, in_node: usize, out_node: usize, recurrent: bool) -> bool {
        self.genes
            .iter()
            .any(|g| g.endpoints() == (in_node, out_node) && g.recurrent() == recurrent)
    }

    fn random_trait_id(&self, rng: &mut impl Rng) -> Option<usize> {
        self.traits.choose(rng).map(Trait::id)
    }

    fn insert_node(&mut self, node: NodeGene) {
        let at = self
            .nodes
            .binary_search_by_key(&node.id(), NodeGene::id)
            .unwrap_err();
        self.nodes.insert(at, node);
    }

    fn insert_gene(&mut self, gene: Gene) {
        let at = self
            .genes
            .binary_search_by_key(&gene.innovation(), Gene::innovation)
            .unwrap_err();
        self.genes.insert(at, gene);
    }
}

impl fmt::Display for Genome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Genome {}:", self.id)?;
        for node in &self.nodes {
            writeln!(f, "  {}", node)?;
        }
        for gene in &self.genes {
            writeln!(f, "  {}", gene)?;
        }
        Ok(())
    }
}

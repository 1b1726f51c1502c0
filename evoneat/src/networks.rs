//! Networks are the phenotypes genomes encode: executable graphs with
//! activation state, built from a genome's enabled genes.
//!
//! Two representations are provided. [`Network`] is the graph form, a
//! node/link arena convenient for iterative relaxation and structural
//! inspection. [`FastNetwork`] is the flat-array form consumed by
//! evaluation loops, serializable to a JSON model.

mod activation;
mod errors;
mod fast_network;
mod nodes;

pub use activation::{ActivationKind, ModuleActivationKind, ALL_ACTIVATIONS};
pub use errors::{ActivationError, ModelError, NetworkBuildError};
pub use fast_network::{FastConnection, FastModule, FastNetwork};
pub use nodes::NNode;

use crate::genomics::{Genome, NeuronType};

use ahash::RandomState;

use std::collections::HashMap;
use std::fmt;

/// Depth traversal beyond this many levels is treated as a loop.
const DEPTH_CUTOFF: usize = 100;

/// A weighted directed connection between two nodes of a [`Network`].
/// Endpoints are arena indices, never owning references.
#[derive(Clone, Debug)]
pub struct Link {
    /// Arena index of the source node.
    pub in_node: usize,
    /// Arena index of the target node.
    pub out_node: usize,
    /// Connection weight.
    pub weight: f64,
    /// Whether the link reads its source's previous-step output.
    pub recurrent: bool,
}

/// A module embedded in a graph-form network: an opaque sub-activation
/// over a fixed group of input nodes, written to a fixed group of
/// output nodes.
#[derive(Clone, Debug)]
pub struct ControlNode {
    kind: ModuleActivationKind,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

/// A graph-form network: a single arena of nodes and links keyed by
/// stable indices, plus optional modules.
#[derive(Clone, Debug)]
pub struct Network {
    id: usize,
    /// Human-readable label carried into serialized models.
    pub name: String,
    nodes: Vec<NNode>,
    links: Vec<Link>,
    inputs: Vec<usize>,
    biases: Vec<usize>,
    outputs: Vec<usize>,
    control: Vec<ControlNode>,
}

impl Network {
    /// Compiles a genome into its phenotype: one node per genome node,
    /// one link per enabled gene, trait parameters copied onto nodes.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::{Gene, Genome, NeuronType, NodeGene};
    /// use evoneat::networks::Network;
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
    ///         Gene::new(2, 2, 3, -1.0, false).with_enabled(false),
    ///     ],
    /// )
    /// .unwrap();
    ///
    /// let network = Network::new(&genome, 1);
    /// assert_eq!(network.node_count(), 3);
    /// // Disabled genes are not expressed.
    /// assert_eq!(network.link_count(), 1);
    /// ```
    pub fn new(genome: &Genome, net_id: usize) -> Network {
        let mut nodes = Vec::new();
        let mut index_of: HashMap<usize, usize, RandomState> = HashMap::default();
        let mut inputs = Vec::new();
        let mut biases = Vec::new();
        let mut outputs = Vec::new();

        for node_gene in genome.nodes() {
            let mut node = NNode::new(node_gene.id(), node_gene.neuron_type(), node_gene.activation());
            if let Some(t) = node_gene.trait_id().and_then(|id| genome.lookup_trait(id)) {
                node.params = *t.params();
            }
            let index = nodes.len();
            index_of.insert(node_gene.id(), index);
            match node_gene.neuron_type() {
                NeuronType::Input => inputs.push(index),
                NeuronType::Bias => biases.push(index),
                NeuronType::Output => outputs.push(index),
                NeuronType::Hidden => {}
            }
            nodes.push(node);
        }

        let mut links = Vec::new();
        for gene in genome.genes().filter(|g| g.enabled()) {
            let in_node = index_of[&gene.in_node()];
            let out_node = index_of[&gene.out_node()];
            let link_index = links.len();
            links.push(Link {
                in_node,
                out_node,
                weight: gene.weight(),
                recurrent: gene.recurrent(),
            });
            nodes[out_node].incoming.push(link_index);
            nodes[in_node].outgoing.push(link_index);
        }

        Network {
            id: net_id,
            name: String::new(),
            nodes,
            links,
            inputs,
            biases,
            outputs,
            control: Vec::new(),
        }
    }

    /// Returns the network's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Writes caller-supplied values into the INPUT nodes, in id order.
    /// BIAS nodes are loaded with 1 at the same time.
    ///
    /// # Errors
    /// Fails if the value count does not match the input node count.
    pub fn load_sensors(&mut self, values: &[f64]) -> Result<(), ActivationError> {
        if values.len() != self.inputs.len() {
            return Err(ActivationError::WrongInputCount {
                expected: self.inputs.len(),
                got: values.len(),
            });
        }
        for (&index, &value) in self.inputs.iter().zip(values) {
            self.nodes[index].sensor_load(value);
        }
        for i in 0..self.biases.len() {
            let index = self.biases[i];
            self.nodes[index].sensor_load(1.0);
        }
        Ok(())
    }

    /// Performs one relaxation step. Every non-sensor node with at least
    /// one activated source computes its input sum — current-step values
    /// over plain links, previous-step values over recurrent ones —
    /// applies its activation function, and rotates its time-delayed
    /// memory. Modules are evaluated after the node pass, gated on all
    /// of their inputs having activated.
    ///
    /// # Errors
    /// Fails when any activation evaluates to a non-finite value.
    pub fn activate(&mut self) -> Result<(), ActivationError> {
        // Gather sums against the pre-step state so the step is
        // synchronous regardless of node order.
        let mut pending: Vec<(usize, f64)> = Vec::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if node.is_sensor() || node.incoming.is_empty() {
                continue;
            }
            let mut sum = 0.0;
            let mut active = false;
            for &link_index in &node.incoming {
                let link = &self.links[link_index];
                let source = &self.nodes[link.in_node];
                sum += link.weight
                    * if link.recurrent {
                        source.active_out_td()
                    } else {
                        source.active_out()
                    };
                if source.activations_count > 0 {
                    active = true;
                }
            }
            if active {
                pending.push((index, sum));
            }
        }

        for (index, sum) in pending {
            let value = self.nodes[index].activation_kind().apply(sum);
            if !value.is_finite() {
                return Err(ActivationError::NumericalFailure {
                    node: self.nodes[index].id(),
                });
            }
            self.nodes[index].activation_sum = sum;
            self.nodes[index].set_activation(value);
        }

        for module in &self.control {
            if !module
                .inputs
                .iter()
                .all(|&i| self.nodes[i].activations_count > 0)
            {
                continue;
            }
            let gathered: Vec<f64> = module
                .inputs
                .iter()
                .map(|&i| self.nodes[i].active_out())
                .collect();
            let value = module.kind.apply(&gathered);
            for &target in &module.outputs {
                if !value.is_finite() {
                    return Err(ActivationError::NumericalFailure {
                        node: self.nodes[target].id(),
                    });
                }
                self.nodes[target].set_activation(value);
            }
        }
        Ok(())
    }

    /// Performs `steps` sequential activation steps, enough to push
    /// signals through a network of that depth without false zeros.
    pub fn forward_steps(&mut self, steps: usize) -> Result<(), ActivationError> {
        for _ in 0..steps {
            self.activate()?;
        }
        Ok(())
    }

    /// Activates until the outputs move by less than `epsilon` between
    /// steps, or `max_steps` is reached. Returns whether relaxation
    /// converged.
    pub fn relax(&mut self, max_steps: usize, epsilon: f64) -> Result<bool, ActivationError> {
        let mut previous = self.read_outputs();
        for _ in 0..max_steps {
            self.activate()?;
            let current = self.read_outputs();
            let delta = current
                .iter()
                .zip(&previous)
                .map(|(c, p)| (c - p).abs())
                .fold(0.0, f64::max);
            let all_live = self
                .outputs
                .iter()
                .all(|&i| self.nodes[i].activations_count > 0);
            if all_live && delta < epsilon {
                return Ok(true);
            }
            previous = current;
        }
        Ok(false)
    }

    /// Zeroes all activation state.
    pub fn flush(&mut self) {
        for node in &mut self.nodes {
            node.flush();
        }
    }

    /// Confirms that a flush left no residue behind.
    pub fn flush_check(&self) -> Result<(), ActivationError> {
        for node in &self.nodes {
            if !node.is_flushed() {
                return Err(ActivationError::FlushResidue { node: node.id() });
            }
        }
        Ok(())
    }

    /// Returns the current output activations, in output id order.
    pub fn read_outputs(&self) -> Vec<f64> {
        self.outputs
            .iter()
            .map(|&i| self.nodes[i].active_out())
            .collect()
    }

    /// Returns the maximum depth over all outputs: the longest path from
    /// an output back to a sensor.
    ///
    /// # Errors
    /// Fails when traversal exceeds the loop cutoff, which indicates a
    /// cycle reachable from an output.
    pub fn max_activation_depth(&self) -> Result<usize, ActivationError> {
        let mut max = 0;
        for &output in &self.outputs {
            max = max.max(self.depth_from(output, 0)?);
        }
        Ok(max)
    }

    fn depth_from(&self, index: usize, depth: usize) -> Result<usize, ActivationError> {
        if depth > DEPTH_CUTOFF {
            return Err(ActivationError::DepthLoop {
                cutoff: DEPTH_CUTOFF,
            });
        }
        let node = &self.nodes[index];
        if node.is_sensor() {
            return Ok(depth);
        }
        let mut max = depth;
        for &link_index in &node.incoming {
            max = max.max(self.depth_from(self.links[link_index].in_node, depth + 1)?);
        }
        Ok(max)
    }

    /// Returns an iterator over all nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &NNode> {
        self.nodes.iter()
    }

    /// Returns an iterator over the output nodes.
    pub fn outputs(&self) -> impl Iterator<Item = &NNode> {
        self.outputs.iter().map(|&i| &self.nodes[i])
    }

    /// Looks up a node by id.
    pub fn node_by_id(&self, id: usize) -> Option<&NNode> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of expressed links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Returns the number of input (non-bias) nodes.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Returns the number of output nodes.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// A size measure used in experiment statistics: node count plus
    /// link count.
    pub fn complexity(&self) -> usize {
        self.nodes.len() + self.links.len()
    }

    /// Compiles the flat fast-form solver for this network, with neuron
    /// layout `[bias][input][output][hidden]` and links from bias nodes
    /// folded into the per-neuron bias list.
    pub fn fast_solver(&self) -> Result<FastNetwork, ModelError> {
        let mut fast_index = vec![usize::MAX; self.nodes.len()];
        let mut counter = 0;

        for &i in &self.biases {
            fast_index[i] = counter;
            counter += 1;
        }
        for &i in &self.inputs {
            fast_index[i] = counter;
            counter += 1;
        }
        for &i in &self.outputs {
            fast_index[i] = counter;
            counter += 1;
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.neuron_type() == NeuronType::Hidden {
                fast_index[i] = counter;
                counter += 1;
            }
        }

        let total = self.nodes.len();
        let mut activations = vec![ActivationKind::Linear; total];
        for (i, node) in self.nodes.iter().enumerate() {
            activations[fast_index[i]] = node.activation_kind();
        }

        let mut bias_list = vec![0.0; total];
        let mut connections = Vec::new();
        for link in &self.links {
            if self.nodes[link.in_node].neuron_type() == NeuronType::Bias {
                bias_list[fast_index[link.out_node]] += link.weight;
            } else {
                connections.push(FastConnection {
                    source_index: fast_index[link.in_node],
                    target_index: fast_index[link.out_node],
                    weight: link.weight,
                    signal: 0.0,
                });
            }
        }

        let modules = self
            .control
            .iter()
            .map(|m| FastModule {
                activation: m.kind,
                input_indexes: m.inputs.iter().map(|&i| fast_index[i]).collect(),
                output_indexes: m.outputs.iter().map(|&i| fast_index[i]).collect(),
            })
            .collect();

        FastNetwork::new(
            self.id,
            self.name.clone(),
            self.inputs.len(),
            self.biases.len(),
            self.outputs.len(),
            total,
            activations,
            bias_list,
            connections,
            modules,
        )
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Network {} ({} nodes, {} links, {} modules)",
            self.id,
            self.nodes.len(),
            self.links.len(),
            self.control.len()
        )
    }
}

/// Assembles a [`Network`] from explicitly declared nodes, links and
/// modules. Used by tests and by code that needs a network without a
/// genome behind it.
///
/// # Examples
/// ```
/// use evoneat::genomics::NeuronType;
/// use evoneat::networks::{ActivationKind, NetworkBuilder};
///
/// let mut network = NetworkBuilder::new()
///     .node(1, NeuronType::Input, ActivationKind::Linear)
///     .node(2, NeuronType::Output, ActivationKind::Linear)
///     .link(1, 2, 2.0)
///     .build(7, "doubler")
///     .unwrap();
///
/// network.load_sensors(&[3.0]).unwrap();
/// network.activate().unwrap();
/// assert_eq!(network.read_outputs(), vec![6.0]);
/// ```
#[derive(Default)]
pub struct NetworkBuilder {
    nodes: Vec<(usize, NeuronType, ActivationKind)>,
    links: Vec<(usize, usize, f64, bool)>,
    modules: Vec<(ModuleActivationKind, Vec<usize>, Vec<usize>)>,
}

impl NetworkBuilder {
    /// Returns an empty builder.
    pub fn new() -> NetworkBuilder {
        NetworkBuilder::default()
    }

    /// Declares a node.
    pub fn node(
        mut self,
        id: usize,
        neuron_type: NeuronType,
        activation: ActivationKind,
    ) -> NetworkBuilder {
        self.nodes.push((id, neuron_type, activation));
        self
    }

    /// Declares a forward link between two declared nodes.
    pub fn link(mut self, from: usize, to: usize, weight: f64) -> NetworkBuilder {
        self.links.push((from, to, weight, false));
        self
    }

    /// Declares a recurrent link between two declared nodes.
    pub fn recurrent_link(mut self, from: usize, to: usize, weight: f64) -> NetworkBuilder {
        self.links.push((from, to, weight, true));
        self
    }

    /// Declares a module reading from `inputs` and writing to `outputs`.
    pub fn module(
        mut self,
        kind: ModuleActivationKind,
        inputs: &[usize],
        outputs: &[usize],
    ) -> NetworkBuilder {
        self.modules.push((kind, inputs.to_vec(), outputs.to_vec()));
        self
    }

    /// Assembles the network.
    ///
    /// # Errors
    /// Fails on duplicate node ids, references to undeclared nodes, or
    /// links targeting sensors.
    pub fn build(self, id: usize, name: &str) -> Result<Network, NetworkBuildError> {
        let mut nodes = Vec::new();
        let mut index_of: HashMap<usize, usize, RandomState> = HashMap::default();
        let mut inputs = Vec::new();
        let mut biases = Vec::new();
        let mut outputs = Vec::new();

        for (node_id, neuron_type, activation) in self.nodes {
            if index_of.contains_key(&node_id) {
                return Err(NetworkBuildError::DuplicateNodeId(node_id));
            }
            let index = nodes.len();
            index_of.insert(node_id, index);
            match neuron_type {
                NeuronType::Input => inputs.push(index),
                NeuronType::Bias => biases.push(index),
                NeuronType::Output => outputs.push(index),
                NeuronType::Hidden => {}
            }
            nodes.push(NNode::new(node_id, neuron_type, activation));
        }

        let resolve = |id: usize| -> Result<usize, NetworkBuildError> {
            index_of
                .get(&id)
                .copied()
                .ok_or(NetworkBuildError::UnknownNode(id))
        };

        let mut links = Vec::new();
        for (from, to, weight, recurrent) in self.links {
            let in_node = resolve(from)?;
            let out_node = resolve(to)?;
            if nodes[out_node].is_sensor() {
                return Err(NetworkBuildError::SensorTarget(to));
            }
            let link_index = links.len();
            links.push(Link {
                in_node,
                out_node,
                weight,
                recurrent,
            });
            nodes[out_node].incoming.push(link_index);
            nodes[in_node].outgoing.push(link_index);
        }

        let mut control = Vec::new();
        for (kind, module_inputs, module_outputs) in self.modules {
            control.push(ControlNode {
                kind,
                inputs: module_inputs
                    .into_iter()
                    .map(resolve)
                    .collect::<Result<_, _>>()?,
                outputs: module_outputs
                    .into_iter()
                    .map(resolve)
                    .collect::<Result<_, _>>()?,
            });
        }

        Ok(Network {
            id,
            name: name.to_string(),
            nodes,
            links,
            inputs,
            biases,
            outputs,
            control,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The canonical test network: sensors 1, 2 and bias 3, hidden
    /// 4, 5, 6, outputs 7, 8.
    pub(crate) fn build_fixture_network() -> Network {
        NetworkBuilder::new()
            .node(1, NeuronType::Input, ActivationKind::SigmoidSteepened)
            .node(2, NeuronType::Input, ActivationKind::SigmoidSteepened)
            .node(3, NeuronType::Bias, ActivationKind::SigmoidSteepened)
            .node(4, NeuronType::Hidden, ActivationKind::SigmoidSteepened)
            .node(5, NeuronType::Hidden, ActivationKind::SigmoidSteepened)
            .node(6, NeuronType::Hidden, ActivationKind::SigmoidSteepened)
            .node(7, NeuronType::Output, ActivationKind::SigmoidSteepened)
            .node(8, NeuronType::Output, ActivationKind::SigmoidSteepened)
            .link(1, 4, 15.0)
            .link(2, 4, 10.0)
            .link(2, 5, 5.0)
            .link(3, 5, 1.0)
            .link(5, 6, 17.0)
            .link(4, 7, 7.0)
            .link(6, 7, 4.5)
            .link(6, 8, 13.0)
            .build(123456, "test network")
            .unwrap()
    }

    /// The modular fixture: a multiply module over two linear staging
    /// nodes, feeding two outputs through its output node.
    pub(crate) fn build_modular_fixture_network() -> Network {
        NetworkBuilder::new()
            .node(1, NeuronType::Input, ActivationKind::SigmoidSteepened)
            .node(2, NeuronType::Input, ActivationKind::SigmoidSteepened)
            .node(3, NeuronType::Bias, ActivationKind::SigmoidSteepened)
            .node(4, NeuronType::Hidden, ActivationKind::Linear)
            .node(5, NeuronType::Hidden, ActivationKind::Linear)
            .node(6, NeuronType::Hidden, ActivationKind::Null)
            .node(7, NeuronType::Output, ActivationKind::Linear)
            .node(8, NeuronType::Output, ActivationKind::Linear)
            .link(1, 4, 15.0)
            .link(3, 4, 10.0)
            .link(2, 5, 5.0)
            .link(3, 5, 1.0)
            .link(6, 7, 4.5)
            .link(6, 8, 13.0)
            .module(ModuleActivationKind::Multiply, &[4, 5], &[6])
            .build(123456, "test network")
            .unwrap()
    }

    #[test]
    fn genome_compilation_expresses_enabled_genes_only() {
        use crate::genomics::{Gene, Genome, NodeGene};

        let genome = Genome::new(
            1,
            vec![],
            vec![
                NodeGene::new(1, NeuronType::Input),
                NodeGene::new(2, NeuronType::Bias),
                NodeGene::new(3, NeuronType::Hidden),
                NodeGene::new(4, NeuronType::Output),
            ],
            vec![
                Gene::new(1, 1, 3, 1.0, false),
                Gene::new(2, 2, 3, 1.0, false).with_enabled(false),
                Gene::new(3, 3, 4, 1.0, false),
            ],
        )
        .unwrap();

        let network = Network::new(&genome, 1);
        assert_eq!(network.node_count(), 4);
        assert_eq!(network.link_count(), 2);
        assert_eq!(network.input_count(), 1);
        assert_eq!(network.output_count(), 1);
        // The hidden node keeps only its expressed links: one in (the
        // bias gene is disabled), one out.
        let hidden = network.node_by_id(3).unwrap();
        assert_eq!(hidden.incoming_count(), 1);
        assert_eq!(hidden.outgoing_count(), 1);
    }

    #[test]
    fn fixture_depth() {
        let network = build_fixture_network();
        // Longest path: sensor -> 5 -> 6 -> 7/8.
        assert_eq!(network.max_activation_depth().unwrap(), 3);
    }

    #[test]
    fn depth_fails_on_loops() {
        let network = NetworkBuilder::new()
            .node(1, NeuronType::Input, ActivationKind::Linear)
            .node(2, NeuronType::Hidden, ActivationKind::Linear)
            .node(3, NeuronType::Hidden, ActivationKind::Linear)
            .node(4, NeuronType::Output, ActivationKind::Linear)
            .link(1, 2, 1.0)
            .link(2, 3, 1.0)
            .link(3, 2, 1.0)
            .link(3, 4, 1.0)
            .build(1, "loop")
            .unwrap();
        assert!(matches!(
            network.max_activation_depth(),
            Err(ActivationError::DepthLoop { .. })
        ));
    }

    #[test]
    fn outputs_stay_zero_until_signals_arrive() {
        let mut network = build_fixture_network();
        network.load_sensors(&[1.0, 1.0]).unwrap();
        network.activate().unwrap();
        // After one step only depth-1 nodes carry signal; outputs are
        // still gated.
        assert_eq!(network.read_outputs(), vec![0.0, 0.0]);
        let depth = network.max_activation_depth().unwrap();
        network.forward_steps(depth - 1).unwrap();
        assert!(network.read_outputs().iter().all(|&o| o > 0.0));
    }

    #[test]
    fn flush_clears_all_state() {
        let mut network = build_fixture_network();
        network.load_sensors(&[1.0, 0.5]).unwrap();
        network.forward_steps(4).unwrap();
        network.flush();
        network.flush_check().unwrap();
        assert_eq!(network.read_outputs(), vec![0.0, 0.0]);
    }

    #[test]
    fn relax_converges_on_acyclic_network() {
        let mut network = build_fixture_network();
        network.load_sensors(&[0.5, 0.75]).unwrap();
        assert!(network.relax(20, 1e-9).unwrap());
    }

    #[test]
    fn recurrent_link_reads_previous_step() {
        let mut network = NetworkBuilder::new()
            .node(1, NeuronType::Input, ActivationKind::Linear)
            .node(2, NeuronType::Output, ActivationKind::Linear)
            .link(1, 2, 1.0)
            .recurrent_link(2, 2, 1.0)
            .build(1, "accumulator")
            .unwrap();

        // The recurrent loop reads the previous step's output, which is
        // reported as 0 until the node has activated twice. The output
        // therefore goes 1, 1, 2, 3, ...
        let mut seen = Vec::new();
        for _ in 0..4 {
            network.load_sensors(&[1.0]).unwrap();
            network.activate().unwrap();
            seen.push(network.read_outputs()[0]);
        }
        assert_eq!(seen, vec![1.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn modular_fixture_multiplies() {
        let mut network = build_modular_fixture_network();
        let depth = 3;
        network.load_sensors(&[1.0, 2.0]).unwrap();
        network.forward_steps(depth).unwrap();
        // Staging nodes: 1*15 + bias 10 = 25 and 2*5 + bias 1 = 11;
        // module output 25 * 11 = 275, scaled into the outputs.
        let outputs = network.read_outputs();
        assert!((outputs[0] - 275.0 * 4.5).abs() < 1e-9);
        assert!((outputs[1] - 275.0 * 13.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_sensor_count_is_rejected() {
        let mut network = build_fixture_network();
        assert!(matches!(
            network.load_sensors(&[1.0]),
            Err(ActivationError::WrongInputCount {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn builder_rejects_unknown_nodes() {
        let err = NetworkBuilder::new()
            .node(1, NeuronType::Input, ActivationKind::Linear)
            .link(1, 9, 1.0)
            .build(1, "broken")
            .unwrap_err();
        assert_eq!(err, NetworkBuildError::UnknownNode(9));
    }
}

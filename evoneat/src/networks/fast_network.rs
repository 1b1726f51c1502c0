//! The flat-array network form consumed by evaluation loops, and its
//! JSON model format.
//!
//! Neurons are laid out `[bias][input][output][hidden]`. Links sourced
//! at bias nodes are folded into a per-neuron bias list, so sensors
//! loaded by the caller cover the inputs only.

use super::activation::{ActivationKind, ModuleActivationKind};
use super::errors::{ActivationError, ModelError};

use serde::{Deserialize, Serialize};

use std::io::{Read, Write};

/// A connection in the flat form: source and target neuron indices, the
/// weight, and the signal carried in the most recent step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FastConnection {
    pub source_index: usize,
    pub target_index: usize,
    pub weight: f64,
    pub signal: f64,
}

/// A module in the flat form: an opaque sub-activation over fixed
/// input indexes, written to fixed output indexes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FastModule {
    #[serde(rename = "activation_type")]
    pub activation: ModuleActivationKind,
    pub input_indexes: Vec<usize>,
    pub output_indexes: Vec<usize>,
}

/// The fast-form solver: activation and bias vectors plus a flat,
/// target-grouped connection list, stepped synchronously.
#[derive(Clone, Debug)]
pub struct FastNetwork {
    id: usize,
    name: String,
    input_count: usize,
    bias_count: usize,
    output_count: usize,
    total_count: usize,
    activations: Vec<ActivationKind>,
    bias_list: Vec<f64>,
    connections: Vec<FastConnection>,
    modules: Vec<FastModule>,
    signals: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
struct Model {
    id: usize,
    name: String,
    input_neuron_count: usize,
    sensor_neuron_count: usize,
    output_neuron_count: usize,
    bias_neuron_count: usize,
    total_neuron_count: usize,
    activation_functions: Vec<ActivationKind>,
    bias_list: Vec<f64>,
    connections: Vec<FastConnection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    modules: Vec<FastModule>,
}

impl FastNetwork {
    /// Assembles a fast network from its parts, validating that the
    /// counts and indices describe a coherent layout. Connections are
    /// regrouped by target neuron.
    ///
    /// # Errors
    /// Fails when vector lengths disagree with `total_count`, the
    /// sensor/output ranges overflow it, or any index is out of range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        name: String,
        input_count: usize,
        bias_count: usize,
        output_count: usize,
        total_count: usize,
        activations: Vec<ActivationKind>,
        bias_list: Vec<f64>,
        mut connections: Vec<FastConnection>,
        modules: Vec<FastModule>,
    ) -> Result<FastNetwork, ModelError> {
        if activations.len() != total_count {
            return Err(ModelError::Inconsistent(format!(
                "{} activation functions for {} neurons",
                activations.len(),
                total_count
            )));
        }
        if bias_list.len() != total_count {
            return Err(ModelError::Inconsistent(format!(
                "{} bias entries for {} neurons",
                bias_list.len(),
                total_count
            )));
        }
        if bias_count + input_count + output_count > total_count {
            return Err(ModelError::Inconsistent(
                "sensor and output ranges exceed total neuron count".to_string(),
            ));
        }
        for c in &connections {
            if c.source_index >= total_count || c.target_index >= total_count {
                return Err(ModelError::Inconsistent(format!(
                    "connection {} -> {} outside of {} neurons",
                    c.source_index, c.target_index, total_count
                )));
            }
        }
        for m in &modules {
            for &index in m.input_indexes.iter().chain(&m.output_indexes) {
                if index >= total_count {
                    return Err(ModelError::Inconsistent(format!(
                        "module index {} outside of {} neurons",
                        index, total_count
                    )));
                }
            }
        }

        connections.sort_by_key(|c| (c.target_index, c.source_index));

        let mut network = FastNetwork {
            id,
            name,
            input_count,
            bias_count,
            output_count,
            total_count,
            activations,
            bias_list,
            connections,
            modules,
            signals: vec![0.0; total_count],
        };
        network.flush();
        Ok(network)
    }

    /// Returns the network's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the network's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of input neurons (bias excluded).
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    /// Number of sensor neurons: inputs plus biases.
    pub fn sensor_count(&self) -> usize {
        self.input_count + self.bias_count
    }

    /// Number of output neurons.
    pub fn output_count(&self) -> usize {
        self.output_count
    }

    /// Total neuron count.
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    /// Writes caller-supplied values into the input neurons. The bias
    /// is inherent: bias neurons always carry 1.
    ///
    /// # Errors
    /// Fails if the value count does not match the input neuron count.
    pub fn load_sensors(&mut self, values: &[f64]) -> Result<(), ActivationError> {
        if values.len() != self.input_count {
            return Err(ActivationError::WrongInputCount {
                expected: self.input_count,
                got: values.len(),
            });
        }
        self.signals[self.bias_count..self.bias_count + self.input_count].copy_from_slice(values);
        Ok(())
    }

    /// Performs one synchronous step: every non-sensor neuron sums its
    /// bias and incoming signals, modules are evaluated on the freshly
    /// computed values, and the new signal vector replaces the old.
    ///
    /// # Errors
    /// Fails when any activation evaluates to a non-finite value.
    pub fn forward_step(&mut self) -> Result<(), ActivationError> {
        let sensor = self.sensor_count();
        let mut sums = self.bias_list.clone();
        for c in &mut self.connections {
            c.signal = self.signals[c.source_index] * c.weight;
            sums[c.target_index] += c.signal;
        }

        let mut next = self.signals.clone();
        for t in sensor..self.total_count {
            let value = self.activations[t].apply(sums[t]);
            if !value.is_finite() {
                return Err(ActivationError::NumericalFailure { node: t });
            }
            next[t] = value;
        }

        for m in &self.modules {
            let gathered: Vec<f64> = m.input_indexes.iter().map(|&i| next[i]).collect();
            let value = m.activation.apply(&gathered);
            for &o in &m.output_indexes {
                if !value.is_finite() {
                    return Err(ActivationError::NumericalFailure { node: o });
                }
                next[o] = value;
            }
        }

        self.signals = next;
        Ok(())
    }

    /// Performs `steps` sequential forward steps.
    pub fn forward_steps(&mut self, steps: usize) -> Result<(), ActivationError> {
        for _ in 0..steps {
            self.forward_step()?;
        }
        Ok(())
    }

    /// Steps until the outputs move by less than `epsilon` between
    /// steps, or `max_steps` is reached. Returns whether relaxation
    /// converged.
    pub fn relax(&mut self, max_steps: usize, epsilon: f64) -> Result<bool, ActivationError> {
        let mut previous = self.read_outputs();
        for _ in 0..max_steps {
            self.forward_step()?;
            let current = self.read_outputs();
            let delta = current
                .iter()
                .zip(&previous)
                .map(|(c, p)| (c - p).abs())
                .fold(0.0, f64::max);
            if delta < epsilon {
                return Ok(true);
            }
            previous = current;
        }
        Ok(false)
    }

    /// Zeroes all signals, restoring bias neurons to 1.
    pub fn flush(&mut self) {
        for (i, signal) in self.signals.iter_mut().enumerate() {
            *signal = if i < self.bias_count { 1.0 } else { 0.0 };
        }
        for c in &mut self.connections {
            c.signal = 0.0;
        }
    }

    /// Returns the current output signals.
    pub fn read_outputs(&self) -> Vec<f64> {
        let start = self.sensor_count();
        self.signals[start..start + self.output_count].to_vec()
    }

    /// Writes the network as a JSON model with the fields `id`, `name`,
    /// neuron counts, `activation_functions` (by name), `bias_list`,
    /// `connections`, and `modules` when present.
    ///
    /// # Errors
    /// Fails on serialization or stream errors.
    pub fn write_model<W: Write>(&self, writer: W) -> Result<(), ModelError> {
        let model = Model {
            id: self.id,
            name: self.name.clone(),
            input_neuron_count: self.input_count,
            sensor_neuron_count: self.sensor_count(),
            output_neuron_count: self.output_count,
            bias_neuron_count: self.bias_count,
            total_neuron_count: self.total_count,
            activation_functions: self.activations.clone(),
            bias_list: self.bias_list.clone(),
            connections: self.connections.clone(),
            modules: self.modules.clone(),
        };
        serde_json::to_writer(writer, &model)?;
        Ok(())
    }

    /// Reads a network from its JSON model.
    ///
    /// # Errors
    /// Fails on malformed JSON and on models whose counts or indices
    /// are incoherent.
    ///
    /// # Examples
    /// ```
    /// use evoneat::networks::FastNetwork;
    ///
    /// let json = r#"{
    ///     "id": 1, "name": "tiny",
    ///     "input_neuron_count": 1, "sensor_neuron_count": 2,
    ///     "output_neuron_count": 1, "bias_neuron_count": 1,
    ///     "total_neuron_count": 3,
    ///     "activation_functions":
    ///         ["LinearActivation", "LinearActivation", "LinearActivation"],
    ///     "bias_list": [0, 0, 0.5],
    ///     "connections": [
    ///         {"source_index": 1, "target_index": 2, "weight": 2.0, "signal": 0}
    ///     ]
    /// }"#;
    ///
    /// let mut network = FastNetwork::read_model(json.as_bytes()).unwrap();
    /// network.load_sensors(&[3.0]).unwrap();
    /// network.forward_step().unwrap();
    /// assert_eq!(network.read_outputs(), vec![6.5]);
    /// ```
    pub fn read_model<R: Read>(reader: R) -> Result<FastNetwork, ModelError> {
        let model: Model = serde_json::from_reader(reader)?;
        if model.sensor_neuron_count != model.input_neuron_count + model.bias_neuron_count {
            return Err(ModelError::Inconsistent(format!(
                "sensor count {} is not inputs {} + biases {}",
                model.sensor_neuron_count, model.input_neuron_count, model.bias_neuron_count
            )));
        }
        FastNetwork::new(
            model.id,
            model.name,
            model.input_neuron_count,
            model.bias_neuron_count,
            model.output_neuron_count,
            model.total_neuron_count,
            model.activation_functions,
            model.bias_list,
            model.connections,
            model.modules,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::tests::{build_fixture_network, build_modular_fixture_network};

    #[test]
    fn fixture_layout_folds_bias_links() {
        let fast = build_fixture_network().fast_solver().unwrap();
        assert_eq!(fast.input_count(), 2);
        assert_eq!(fast.sensor_count(), 3);
        assert_eq!(fast.output_count(), 2);
        assert_eq!(fast.total_count(), 8);
        // Seven plain connections; the bias link became a bias entry on
        // the hidden neuron it fed.
        assert_eq!(fast.connections.len(), 7);
        assert_eq!(fast.bias_list[6], 1.0);
        assert_eq!(fast.bias_list.iter().filter(|&&b| b != 0.0).count(), 1);
    }

    #[test]
    fn fast_agrees_with_graph_form() {
        let mut graph = build_fixture_network();
        let mut fast = graph.fast_solver().unwrap();

        let depth = graph.max_activation_depth().unwrap();
        graph.load_sensors(&[1.5, 2.0]).unwrap();
        graph.forward_steps(depth).unwrap();

        fast.load_sensors(&[1.5, 2.0]).unwrap();
        assert!(fast.relax(depth, 0.1).unwrap());

        for (a, b) in graph.read_outputs().iter().zip(fast.read_outputs()) {
            assert!((a - b).abs() < 1e-9, "graph {} vs fast {}", a, b);
        }
    }

    #[test]
    fn fast_agrees_with_graph_form_modular() {
        let mut graph = build_modular_fixture_network();
        let mut fast = graph.fast_solver().unwrap();

        let steps = 3;
        graph.load_sensors(&[1.0, 2.0]).unwrap();
        graph.forward_steps(steps).unwrap();

        fast.load_sensors(&[1.0, 2.0]).unwrap();
        fast.forward_steps(steps).unwrap();

        for (a, b) in graph.read_outputs().iter().zip(fast.read_outputs()) {
            assert!((a - b).abs() < 1e-9, "graph {} vs fast {}", a, b);
        }
    }

    #[test]
    fn model_round_trip_preserves_behavior() {
        let mut original = build_modular_fixture_network().fast_solver().unwrap();

        let mut buffer = Vec::new();
        original.write_model(&mut buffer).unwrap();
        let mut restored = FastNetwork::read_model(buffer.as_slice()).unwrap();

        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.name(), original.name());

        original.load_sensors(&[0.25, -0.75]).unwrap();
        restored.load_sensors(&[0.25, -0.75]).unwrap();
        original.forward_steps(3).unwrap();
        restored.forward_steps(3).unwrap();

        for (a, b) in original.read_outputs().iter().zip(restored.read_outputs()) {
            assert!((a - b).abs() <= 1e-12, "original {} vs restored {}", a, b);
        }
    }

    #[test]
    fn model_fields_use_canonical_names() {
        let fast = build_fixture_network().fast_solver().unwrap();
        let mut buffer = Vec::new();
        fast.write_model(&mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value["input_neuron_count"], 2);
        assert_eq!(value["sensor_neuron_count"], 3);
        assert_eq!(value["bias_neuron_count"], 1);
        assert_eq!(value["total_neuron_count"], 8);
        assert_eq!(
            value["activation_functions"][0],
            "SigmoidSteepenedActivation"
        );
        assert_eq!(value["connections"].as_array().unwrap().len(), 7);
        // No modules, no modules field.
        assert!(value.get("modules").is_none());
    }

    #[test]
    fn modular_model_carries_module_block() {
        let fast = build_modular_fixture_network().fast_solver().unwrap();
        let mut buffer = Vec::new();
        fast.write_model(&mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        let modules = value["modules"].as_array().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0]["activation_type"], "MultiplyModuleActivation");
        assert_eq!(modules[0]["output_indexes"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn flush_restores_bias_signals() {
        let mut fast = build_fixture_network().fast_solver().unwrap();
        fast.load_sensors(&[1.0, 1.0]).unwrap();
        fast.forward_steps(4).unwrap();
        fast.flush();
        assert_eq!(fast.read_outputs(), vec![0.0, 0.0]);
        assert_eq!(fast.signals[0], 1.0);
    }

    #[test]
    fn inconsistent_model_is_rejected() {
        let json = r#"{
            "id": 1, "name": "broken",
            "input_neuron_count": 2, "sensor_neuron_count": 2,
            "output_neuron_count": 1, "bias_neuron_count": 1,
            "total_neuron_count": 3,
            "activation_functions": ["LinearActivation"],
            "bias_list": [0, 0, 0],
            "connections": []
        }"#;
        assert!(matches!(
            FastNetwork::read_model(json.as_bytes()),
            Err(ModelError::Inconsistent(_))
        ));
    }
}

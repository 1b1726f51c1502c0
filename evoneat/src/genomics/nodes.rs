use crate::networks::ActivationKind;

use serde::{Deserialize, Serialize};

use std::fmt;

/// The role a node plays in the network its genome encodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NeuronType {
    /// Internal nodes introduced by node mutations.
    Hidden,
    /// Sensor nodes loaded with caller-supplied values.
    Input,
    /// Actuator nodes read as the network's result.
    Output,
    /// Sensor node that always emits 1.
    Bias,
}

impl NeuronType {
    /// Numeric code used by the genome text format.
    pub fn code(self) -> u8 {
        match self {
            Self::Hidden => 0,
            Self::Input => 1,
            Self::Output => 2,
            Self::Bias => 3,
        }
    }

    /// Inverse of [`NeuronType::code`].
    pub fn from_code(code: u8) -> Option<NeuronType> {
        match code {
            0 => Some(Self::Hidden),
            1 => Some(Self::Input),
            2 => Some(Self::Output),
            3 => Some(Self::Bias),
            _ => None,
        }
    }

    /// Whether nodes of this role are sensors (loaded, never computed).
    pub fn is_sensor(self) -> bool {
        matches!(self, Self::Input | Self::Bias)
    }
}

/// A neuron as described by a genome: identity, role, activation
/// function tag and an optional trait reference.
///
/// Runtime activation state lives on the phenotype analogue
/// ([`crate::networks::NNode`]), not here.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NodeGene {
    id: usize,
    neuron_type: NeuronType,
    activation: ActivationKind,
    trait_id: Option<usize>,
}

impl NodeGene {
    /// Returns a new node gene with the steepened-sigmoid default
    /// activator and no trait.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::{NeuronType, NodeGene};
    ///
    /// let node = NodeGene::new(4, NeuronType::Hidden);
    /// assert_eq!(node.id(), 4);
    /// assert!(!node.is_sensor());
    /// ```
    pub fn new(id: usize, neuron_type: NeuronType) -> NodeGene {
        NodeGene {
            id,
            neuron_type,
            activation: ActivationKind::SigmoidSteepened,
            trait_id: None,
        }
    }

    /// Returns a copy of `other` with the given trait reference.
    pub fn new_copy(other: &NodeGene, trait_id: Option<usize>) -> NodeGene {
        NodeGene {
            trait_id,
            ..other.clone()
        }
    }

    /// Sets the node's activation function tag.
    pub fn with_activation(mut self, activation: ActivationKind) -> NodeGene {
        self.activation = activation;
        self
    }

    /// Sets the node's trait reference.
    pub fn with_trait(mut self, trait_id: Option<usize>) -> NodeGene {
        self.trait_id = trait_id;
        self
    }

    /// Returns the node's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the node's role.
    pub fn neuron_type(&self) -> NeuronType {
        self.neuron_type
    }

    /// Returns the node's activation function tag.
    pub fn activation(&self) -> ActivationKind {
        self.activation
    }

    /// Returns the node's trait reference, if any.
    pub fn trait_id(&self) -> Option<usize> {
        self.trait_id
    }

    /// Points the node at a different trait.
    pub fn set_trait_id(&mut self, trait_id: Option<usize>) {
        self.trait_id = trait_id;
    }

    /// Whether the node is a sensor (INPUT or BIAS).
    pub fn is_sensor(&self) -> bool {
        self.neuron_type.is_sensor()
    }
}

impl fmt::Display for NodeGene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:03} ({})", self.neuron_type, self.id, self.activation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neuron_type_codes_round_trip() {
        for t in [
            NeuronType::Hidden,
            NeuronType::Input,
            NeuronType::Output,
            NeuronType::Bias,
        ] {
            assert_eq!(NeuronType::from_code(t.code()), Some(t));
        }
        assert_eq!(NeuronType::from_code(9), None);
    }

    #[test]
    fn sensor_roles() {
        assert!(NeuronType::Input.is_sensor());
        assert!(NeuronType::Bias.is_sensor());
        assert!(!NeuronType::Hidden.is_sensor());
        assert!(!NeuronType::Output.is_sensor());
    }
}

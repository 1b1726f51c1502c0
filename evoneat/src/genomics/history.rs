use crate::Innovation;

use ahash::RandomState;
use serde::{Deserialize, Serialize};

use std::collections::hash_map::{Entry, HashMap};

/// The innovation numbers produced by a node-split mutation: the new
/// node's id and the innovations of its two flanking genes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSplit {
    /// Id assigned to the hidden node inserted by the split.
    pub node_id: usize,
    /// Innovation of the gene into the new node (weight 1).
    pub in_innovation: Innovation,
    /// Innovation of the gene out of the new node (the split gene's weight).
    pub out_innovation: Innovation,
}

/// The per-generation registry of structural novelties.
///
/// Any structurally identical mutation occurring within the same
/// generation is handed the same innovation numbers, which is what makes
/// historical alignment across genomes meaningful. The ledger's records
/// are cleared at the end of every generation; its monotonic counters
/// persist for the population's lifetime.
///
/// The ledger is owned by the population and passed explicitly to the
/// mutation operators — it is never global state.
///
/// # Examples
/// ```
/// use evoneat::genomics::InnovationLedger;
///
/// let mut ledger = InnovationLedger::starting_from(10, 5);
///
/// // Identical link mutations in one generation share a number.
/// let a = ledger.link_innovation(1, 4, false);
/// let b = ledger.link_innovation(1, 4, false);
/// assert_eq!(a, b);
///
/// // A different structure gets a fresh number.
/// assert_ne!(ledger.link_innovation(2, 4, false), a);
///
/// // After the generation rolls over, the same mutation is new again.
/// ledger.clear();
/// assert_ne!(ledger.link_innovation(1, 4, false), a);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InnovationLedger {
    next_innovation: Innovation,
    next_node_id: usize,
    link_records: HashMap<(usize, usize, bool), Innovation, RandomState>,
    split_records: HashMap<Innovation, NodeSplit, RandomState>,
}

impl InnovationLedger {
    /// Creates a ledger whose counters begin at the given values,
    /// typically one past the seed genome's highest gene innovation
    /// and node id.
    pub fn starting_from(next_innovation: Innovation, next_node_id: usize) -> InnovationLedger {
        InnovationLedger {
            next_innovation,
            next_node_id,
            link_records: HashMap::default(),
            split_records: HashMap::default(),
        }
    }

    /// Returns the innovation number for a link from `in_node` to
    /// `out_node` with the given recurrence, recording the novelty if it
    /// is new this generation.
    pub fn link_innovation(
        &mut self,
        in_node: usize,
        out_node: usize,
        recurrent: bool,
    ) -> Innovation {
        match self.link_records.entry((in_node, out_node, recurrent)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let innovation = self.next_innovation;
                self.next_innovation += 1;
                *entry.insert(innovation)
            }
        }
    }

    /// Returns the node id and flanking gene innovations for a split of
    /// the gene with innovation `split_innovation`, recording the novelty
    /// if it is new this generation.
    ///
    /// `force_fresh` requests brand-new numbers even when the split is
    /// already recorded. A genome that re-enables and re-splits the same
    /// gene within one generation must use this, or it would be handed a
    /// node id it already contains.
    pub fn node_split(&mut self, split_innovation: Innovation, force_fresh: bool) -> NodeSplit {
        if !force_fresh {
            if let Some(split) = self.split_records.get(&split_innovation) {
                return *split;
            }
        }
        let split = NodeSplit {
            node_id: self.next_node_id,
            in_innovation: self.next_innovation,
            out_innovation: self.next_innovation + 1,
        };
        self.next_node_id += 1;
        self.next_innovation += 2;
        self.split_records.insert(split_innovation, split);
        split
    }

    /// Returns the recorded split for a gene this generation, if any.
    pub fn recorded_split(&self, split_innovation: Innovation) -> Option<NodeSplit> {
        self.split_records.get(&split_innovation).copied()
    }

    /// Drops this generation's records, keeping the counters.
    pub fn clear(&mut self) {
        self.link_records.clear();
        self.split_records.clear();
    }

    /// Returns the next innovation number the ledger will assign.
    pub fn next_innovation(&self) -> Innovation {
        self.next_innovation
    }

    /// Returns the next node id the ledger will assign.
    pub fn next_node_id(&self) -> usize {
        self.next_node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_innovations_are_monotonic() {
        let mut ledger = InnovationLedger::starting_from(0, 0);
        let a = ledger.link_innovation(0, 1, false);
        let b = ledger.link_innovation(0, 2, false);
        let c = ledger.link_innovation(0, 3, false);
        assert!(a < b && b < c);
    }

    #[test]
    fn recurrence_distinguishes_links() {
        let mut ledger = InnovationLedger::starting_from(0, 0);
        let forward = ledger.link_innovation(1, 2, false);
        let recurrent = ledger.link_innovation(1, 2, true);
        assert_ne!(forward, recurrent);
    }

    #[test]
    fn node_split_reuses_within_generation() {
        let mut ledger = InnovationLedger::starting_from(100, 10);
        let first = ledger.node_split(3, false);
        let again = ledger.node_split(3, false);
        assert_eq!(first, again);
        assert_eq!(first.node_id, 10);
        assert_eq!(first.in_innovation, 100);
        assert_eq!(first.out_innovation, 101);
    }

    #[test]
    fn node_split_forced_fresh_advances() {
        let mut ledger = InnovationLedger::starting_from(100, 10);
        let first = ledger.node_split(3, false);
        let fresh = ledger.node_split(3, true);
        assert_ne!(first.node_id, fresh.node_id);
        assert_ne!(first.in_innovation, fresh.in_innovation);
    }

    #[test]
    fn clear_keeps_counters() {
        let mut ledger = InnovationLedger::starting_from(0, 0);
        let a = ledger.link_innovation(0, 1, false);
        ledger.clear();
        let b = ledger.link_innovation(0, 1, false);
        assert_ne!(a, b);
        assert_eq!(ledger.next_innovation(), 2);
    }
}

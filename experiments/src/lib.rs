//! Experiments exercising the `evoneat` engine end to end: XOR and the
//! single- and double-pole balancing tasks, plus the trial/statistics
//! harness they share.

pub mod experiment;
pub mod pole;
pub mod pole2;
pub mod xor;

use rand::Rng;
use serde::{Deserialize, Serialize};

use std::fmt;

/// Number of parameters carried by every trait.
pub const TRAIT_PARAM_COUNT: usize = 8;

/// A named vector of shared learning parameters.
///
/// Traits are referenced by id from nodes and genes, so many structural
/// elements can share one parameter set. They only change through the
/// explicit trait mutation operators.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Trait {
    id: usize,
    params: [f64; TRAIT_PARAM_COUNT],
}

impl Trait {
    /// Returns a new trait with the given id and parameters.
    pub fn new(id: usize, params: [f64; TRAIT_PARAM_COUNT]) -> Trait {
        Trait { id, params }
    }

    /// Returns a new trait whose first parameter is random in `[0, 1)`
    /// and whose remaining parameters are zero.
    pub fn new_random(id: usize, rng: &mut impl Rng) -> Trait {
        let mut params = [0.0; TRAIT_PARAM_COUNT];
        params[0] = rng.gen::<f64>();
        Trait { id, params }
    }

    /// Returns a trait averaging the parameters of two parents,
    /// keeping the first parent's id.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::Trait;
    ///
    /// let a = Trait::new(1, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    /// let b = Trait::new(2, [0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    /// let avg = Trait::new_avg(&a, &b);
    /// assert_eq!(avg.id(), 1);
    /// assert_eq!(avg.params()[0], 0.5);
    /// assert_eq!(avg.params()[1], 0.5);
    /// ```
    pub fn new_avg(first: &Trait, second: &Trait) -> Trait {
        let mut params = [0.0; TRAIT_PARAM_COUNT];
        for (i, p) in params.iter_mut().enumerate() {
            *p = (first.params[i] + second.params[i]) / 2.0;
        }
        Trait {
            id: first.id,
            params,
        }
    }

    /// Perturbs each parameter with probability `param_mut_prob` by a
    /// uniform amount in `±mutation_power`.
    pub fn mutate(&mut self, rng: &mut impl Rng, mutation_power: f64, param_mut_prob: f64) {
        for p in &mut self.params {
            if rng.gen::<f64>() < param_mut_prob {
                *p += rng.gen_range(-mutation_power..=mutation_power);
            }
        }
    }

    /// Returns the trait's id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the trait's parameter vector.
    pub fn params(&self) -> &[f64; TRAIT_PARAM_COUNT] {
        &self.params
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trait {} {:?}", self.id, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn mutate_stays_within_power() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut t = Trait::new(1, [0.5; TRAIT_PARAM_COUNT]);
        t.mutate(&mut rng, 0.25, 1.0);
        for p in t.params() {
            assert!((p - 0.5).abs() <= 0.25);
        }
    }

    #[test]
    fn mutate_with_zero_probability_is_identity() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut t = Trait::new(1, [0.5; TRAIT_PARAM_COUNT]);
        t.mutate(&mut rng, 10.0, 0.0);
        assert_eq!(t.params(), &[0.5; TRAIT_PARAM_COUNT]);
    }
}

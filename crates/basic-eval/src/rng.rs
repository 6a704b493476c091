//! `RND`'s pseudo-random generator (spec §4.F builtins).
//!
//! `RND` is entirely self-contained — it needs no host service, just a
//! seed the interpreter owns. A xorshift64* generator stands in for the
//! original's specific algorithm, which the spec doesn't pin down; only
//! the four call-shape behaviours below are part of the contract.

use basic_core::{BasicError, ErrorCode, Value};

pub struct Rng {
    state: u64,
    last: f64,
}

impl Default for Rng {
    fn default() -> Self {
        Self::new(0x9E37_79B9_7F4A_7C15)
    }
}

impl Rng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
            last: 0.0,
        }
    }

    pub fn reseed(&mut self, seed: i64) {
        self.state = if seed == 0 { 1 } else { seed as u64 };
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    fn next_unit_float(&mut self) -> f64 {
        let v = (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        self.last = v;
        v
    }

    /// `RND` (no arg) and `RND(1)`: a float in `[0, 1)`.
    pub fn next_float(&mut self) -> f64 {
        self.next_unit_float()
    }

    /// `RND(n)` dispatch per classic BBC BASIC semantics:
    /// - `n == 0`: the last value `RND(1)` produced.
    /// - `n == 1` or no argument: a fresh float in `[0, 1)`.
    /// - `n > 1`: an integer uniformly in `1..=n`.
    /// - `n < 0`: reseed to a repeatable sequence from `n`, then behave as
    ///   `RND(1)`.
    ///
    /// # Errors
    /// [`ErrorCode::TYPE_MISMATCH`] if `arg` isn't numeric.
    pub fn rnd(&mut self, arg: Option<Value>) -> Result<Value, BasicError> {
        let Some(arg) = arg else {
            return Ok(Value::Float(self.next_float()));
        };
        let n = match arg {
            Value::Int(n) => n,
            Value::Float(f) => f as i64,
            Value::Str(_) => return Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
        };
        match n {
            0 => Ok(Value::Float(self.last)),
            1 => Ok(Value::Float(self.next_float())),
            n if n > 1 => {
                let r = self.next_u64() % n as u64;
                Ok(Value::Int(1 + r as i64))
            }
            n => {
                self.reseed(n);
                Ok(Value::Float(self.next_float()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rnd_one_stays_in_unit_range() {
        let mut rng = Rng::default();
        for _ in 0..100 {
            let v = rng.rnd(Some(Value::Int(1))).unwrap();
            match v {
                Value::Float(f) => assert!((0.0..1.0).contains(&f)),
                _ => panic!("expected float"),
            }
        }
    }

    #[test]
    fn rnd_n_is_in_range_one_to_n() {
        let mut rng = Rng::default();
        for _ in 0..200 {
            match rng.rnd(Some(Value::Int(6))).unwrap() {
                Value::Int(n) => assert!((1..=6).contains(&n)),
                _ => panic!("expected int"),
            }
        }
    }

    #[test]
    fn rnd_zero_repeats_the_last_value() {
        let mut rng = Rng::default();
        let a = rng.rnd(Some(Value::Int(1))).unwrap();
        let b = rng.rnd(Some(Value::Int(0))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn negative_seed_reseeds_to_a_repeatable_sequence() {
        let mut a = Rng::default();
        let mut b = Rng::default();
        a.rnd(Some(Value::Int(-42))).ok();
        b.rnd(Some(Value::Int(-42))).ok();
        let seq_a: Vec<_> = (0..5).map(|_| a.rnd(Some(Value::Int(1))).unwrap()).collect();
        let seq_b: Vec<_> = (0..5).map(|_| b.rnd(Some(Value::Int(1))).unwrap()).collect();
        assert_eq!(seq_a, seq_b);
    }
}

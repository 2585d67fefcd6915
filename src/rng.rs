// PCG-LCG random stream with exact skip-ahead.
//
// The generator advances a 64-bit LCG and permutes the output (RXS-M-XS
// variant), which keeps the state to a single u64 while passing the usual
// statistical batteries. The LCG recurrence makes `jump(n)` exact in
// O(log n): after n steps the state is g^n * s + c * (g^n - 1)/(g - 1)
// (mod 2^64), which the loop below accumulates bit by bit.
//
// Every history derives its stream from the base stream by jumping
// `history_index * max_draws_per_history`, so runs are reproducible and
// independent of which worker executes which history. The struct counts
// draws so the transport loop can fail a history that would otherwise
// wander into its neighbor's stream.

use rand::{RngCore, SeedableRng};

/// LCG multiplier
const PRN_MULT: u64 = 6364136223846793005;
/// LCG additive constant
const PRN_ADD: u64 = 1442695040888963407;

#[derive(Clone, Copy, Debug)]
pub struct Prn {
    state: u64,
    draws: u64,
}

impl Prn {
    #[inline]
    pub fn new(seed: u64) -> Self {
        Self { state: seed, draws: 0 }
    }

    /// Generate a random f64 in [0, 1).
    #[inline(always)]
    pub fn random(&mut self) -> f64 {
        // Equivalent to ldexp(next_u64, -64)
        (self.next_u64() as f64) * 5.421010862427522e-20
    }

    /// Number of draws taken from this stream since construction or the
    /// last jump.
    #[inline]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Advance the underlying LCG by exactly `n` steps without generating
    /// the intermediate values. Resets the draw counter.
    pub fn jump(&mut self, mut n: u64) {
        let mut g = PRN_MULT;
        let mut c = PRN_ADD;
        let mut g_new: u64 = 1;
        let mut c_new: u64 = 0;
        while n > 0 {
            if n & 1 == 1 {
                g_new = g_new.wrapping_mul(g);
                c_new = c_new.wrapping_mul(g).wrapping_add(c);
            }
            c = c.wrapping_mul(g.wrapping_add(1));
            g = g.wrapping_mul(g);
            n >>= 1;
        }
        self.state = g_new.wrapping_mul(self.state).wrapping_add(c_new);
        self.draws = 0;
    }

    /// A copy of this stream advanced by `n` steps.
    #[inline]
    pub fn jumped(&self, n: u64) -> Self {
        let mut copy = *self;
        copy.jump(n);
        copy
    }
}

impl SeedableRng for Prn {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }
}

impl RngCore for Prn {
    #[inline(always)]
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    #[inline(always)]
    fn next_u64(&mut self) -> u64 {
        // Advance the LCG
        self.state = PRN_MULT.wrapping_mul(self.state).wrapping_add(PRN_ADD);
        self.draws += 1;

        // PCG output permutation (RXS-M-XS variant)
        let word = ((self.state >> ((self.state >> 59) + 5)) ^ self.state)
            .wrapping_mul(12605985483714917081);
        (word >> 43) ^ word
    }

    #[inline]
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let mut left = dest;
        while left.len() >= 8 {
            let bytes = self.next_u64().to_le_bytes();
            left[..8].copy_from_slice(&bytes);
            left = &mut left[8..];
        }
        if !left.is_empty() {
            let bytes = self.next_u64().to_le_bytes();
            let n = left.len();
            left.copy_from_slice(&bytes[..n]);
        }
    }

    #[inline]
    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

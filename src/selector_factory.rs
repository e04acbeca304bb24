//! Pre-cached pools of encryptions of zero and one.
//!
//! Filling the pools ahead of time moves all encryption work off the
//! selector critical path: `create` only computes the choice vector and
//! consumes cached ciphertexts.

use std::sync::Mutex;

use curve25519_dalek::scalar::Scalar;
use rayon::prelude::*;

use crate::ecelgamal::{Cipher, Encrypt, EncryptionContext, CIPHER_SIZE};
use crate::error::Error;
use crate::selector::create_choice;

/// A pool pair with configured capacities, generic over the encrypt
/// variant (a [`crate::PublicKey`] or, for the fast path, a
/// [`crate::PrivateKey`]).
pub struct SelectorFactory<E: Encrypt> {
    key: E,
    capacities: [usize; 2],
    // One mutex guards both pools; a pool's length is its cursor.
    pools: Mutex<[Vec<Cipher>; 2]>,
}

impl<E: Encrypt> SelectorFactory<E> {
    pub fn new(key: E, capacity_zero: usize, capacity_one: usize) -> Self {
        Self {
            key,
            capacities: [capacity_zero, capacity_one],
            pools: Mutex::new([
                Vec::with_capacity(capacity_zero),
                Vec::with_capacity(capacity_one),
            ]),
        }
    }

    /// Top both pools up to their capacities.
    ///
    /// Generation is parallel; every finished ciphertext is inserted under
    /// the pool mutex, so `fill` may run concurrently with `create` and
    /// with another `fill`.
    pub fn fill(&self, enc_ctx: &EncryptionContext) {
        for msg in 0..2usize {
            let needs = {
                let pools = self.pools.lock().unwrap();
                self.capacities[msg].saturating_sub(pools[msg].len())
            };
            (0..needs).into_par_iter().for_each(|_| {
                let cipher = self.key.encrypt(enc_ctx, &Scalar::from(msg as u64), None);
                let mut pools = self.pools.lock().unwrap();
                if pools[msg].len() < self.capacities[msg] {
                    pools[msg].push(cipher);
                }
            });
        }
    }

    /// Assemble the selector for `idx` from cached ciphertexts.
    ///
    /// Consumes one cached encryption per choice byte and never encrypts.
    /// Underflow of either pool fails the call; ciphertexts consumed before
    /// the underflow are not returned to the pool.
    pub fn create(&self, index_counts: &[u64], idx: u64) -> Result<Vec<u8>, Error> {
        let choices = create_choice(index_counts, idx)?;
        let mut out = Vec::with_capacity(choices.len() * CIPHER_SIZE);
        let mut pools = self.pools.lock().unwrap();
        for &choice in &choices {
            let cipher = pools[choice as usize]
                .pop()
                .ok_or(Error::InsufficientCache)?;
            out.extend_from_slice(&cipher.to_bytes());
        }
        Ok(out)
    }

    /// Remaining cached ciphertexts as `(zeros, ones)`.
    pub fn remaining(&self) -> (usize, usize) {
        let pools = self.pools.lock().unwrap();
        (pools[0].len(), pools[1].len())
    }
}

//! Server reply handling: sizing, the dimension-by-dimension decryption,
//! and a mock reply generator for tests and benchmarks.
//!
//! A reply is a `dimension`-deep nesting of ciphertexts. Decryption peels
//! one layer per phase: every ciphertext in the layer decrypts to a small
//! integer whose `packing` little-endian bytes are the next layer's data,
//! so the buffer contracts by `64 / packing` per phase.

use std::convert::TryFrom;

use curve25519_dalek::scalar::Scalar;
use rayon::prelude::*;

use crate::ecelgamal::{Cipher, Encrypt, EncryptionContext, PrivateKey, CIPHER_SIZE, SCALAR_SIZE};
use crate::error::Error;
use crate::mg::DecryptionContext;

fn divide_up(a: usize, b: usize) -> usize {
    (a / b) + if a % b == 0 { 0 } else { 1 }
}

fn validate_fold(dimension: u8, packing: u8) -> Result<(), Error> {
    if dimension == 0 {
        return Err(Error::InvalidArgument("dimension must be at least 1"));
    }
    // The packed value must fit the 32-bit table key.
    if packing == 0 || packing > 4 {
        return Err(Error::InvalidArgument("packing must be between 1 and 4"));
    }
    Ok(())
}

/// The reply size in bytes for an element of `elem_size` bytes:
/// `elem_size` folded `dimension` times by `x -> 64 * ceil(x / packing)`.
pub fn reply_size(dimension: u8, packing: u8, elem_size: usize) -> usize {
    let mut target = elem_size;
    for _ in 0..dimension {
        target = CIPHER_SIZE * divide_up(target, packing as usize);
    }
    target
}

/// The number of random scalars a deterministic [`reply_mock`] consumes:
/// one per ciphertext over all phases.
pub fn reply_r_count(dimension: u8, packing: u8, elem_size: usize) -> usize {
    let mut r_count = 0;
    let mut target = elem_size;
    for _ in 0..dimension {
        r_count += divide_up(target, packing as usize);
        target = CIPHER_SIZE * divide_up(target, packing as usize);
    }
    r_count
}

impl DecryptionContext {
    /// Decrypt a server reply.
    ///
    /// Works on an owned copy of the reply, phase by phase: decrypt every
    /// ciphertext of the current layer in parallel, write each value's
    /// `packing` little-endian bytes back into its slot, compact the slots
    /// into a dense buffer, and reinterpret it as the next layer. Any
    /// single decryption failure fails the whole reply.
    ///
    /// Returns at least `elem_size` bytes; trailing bytes are padding the
    /// caller ignores.
    pub fn decrypt_reply(
        &self,
        privkey: &PrivateKey,
        reply: &[u8],
        dimension: u8,
        packing: u8,
    ) -> Result<Vec<u8>, Error> {
        validate_fold(dimension, packing)?;
        if reply.is_empty() || reply.len() % CIPHER_SIZE != 0 {
            return Err(Error::InvalidArgument(
                "reply length must be a positive multiple of the cipher size",
            ));
        }
        let packing = packing as usize;
        let mut buf = reply.to_vec();
        let mut mid_count = buf.len() / CIPHER_SIZE;
        for phase in 0..dimension {
            buf[..mid_count * CIPHER_SIZE]
                .par_chunks_mut(CIPHER_SIZE)
                .try_for_each(|slot| {
                    let cipher = Cipher::try_from(&slot[..])?;
                    let decrypted = self.decrypt(privkey, &cipher)?;
                    for p in 0..packing {
                        slot[p] = ((decrypted >> (8 * p)) & 0xff) as u8;
                    }
                    Ok::<(), Error>(())
                })?;
            for i in 0..mid_count {
                buf.copy_within(i * CIPHER_SIZE..i * CIPHER_SIZE + packing, i * packing);
            }
            if phase == dimension - 1 {
                mid_count *= packing;
                break;
            }
            mid_count = mid_count * packing / CIPHER_SIZE;
        }
        buf.truncate(mid_count);
        Ok(buf)
    }
}

/// Generate a server reply for `elem` the way an honest server would,
/// using the given encrypt variant.
///
/// Each phase packs `packing` plaintext bytes into one integer per
/// ciphertext; the encrypted layer becomes the next phase's plaintext.
/// With `r` supplied (one scalar per ciphertext over all phases, see
/// [`reply_r_count`]) the reply is deterministic.
pub fn reply_mock<E>(
    key: &E,
    enc_ctx: &EncryptionContext,
    dimension: u8,
    packing: u8,
    elem: &[u8],
    r: Option<&[u8]>,
) -> Result<Vec<u8>, Error>
where
    E: Encrypt + ?Sized,
{
    validate_fold(dimension, packing)?;
    if elem.is_empty() {
        return Err(Error::InvalidArgument("element must not be empty"));
    }
    if let Some(r) = r {
        if r.len() != reply_r_count(dimension, packing, elem.len()) * SCALAR_SIZE {
            return Err(Error::InvalidArgument(
                "reply randomness must hold one scalar per ciphertext",
            ));
        }
    }
    let packing = packing as usize;
    let mut state = elem.to_vec();
    let mut r_offset = 0usize;
    for _ in 0..dimension {
        let count = divide_up(state.len(), packing);
        let mut next = vec![0u8; count * CIPHER_SIZE];
        let state_ref = &state;
        next.par_chunks_mut(CIPHER_SIZE)
            .enumerate()
            .for_each(|(i, out)| {
                let mut msg = 0u64;
                for j in 0..packing {
                    if i * packing + j < state_ref.len() {
                        msg |= (state_ref[i * packing + j] as u64) << (8 * j);
                    }
                }
                let rr = r.map(|r| {
                    let offset = (r_offset + i) * SCALAR_SIZE;
                    let mut bytes = [0u8; SCALAR_SIZE];
                    bytes.copy_from_slice(&r[offset..offset + SCALAR_SIZE]);
                    Scalar::from_bits(bytes)
                });
                let cipher = key.encrypt(enc_ctx, &Scalar::from(msg), rr.as_ref());
                out.copy_from_slice(&cipher.to_bytes());
            });
        r_offset += count;
        state = next;
    }
    Ok(state)
}

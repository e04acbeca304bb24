//! Selector construction: the encrypted one-hot vector that addresses one
//! cell of the server's multi-dimensional matrix.

use curve25519_dalek::scalar::Scalar;
use rayon::prelude::*;

use crate::ecelgamal::{Encrypt, EncryptionContext, CIPHER_SIZE, SCALAR_SIZE};
use crate::error::Error;

/// The number of ciphertexts in a selector: the sum of the index counts.
pub fn ciphers_count(index_counts: &[u64]) -> u64 {
    index_counts.iter().sum()
}

/// The number of addressable matrix cells: the product of the index counts.
pub fn elements_count(index_counts: &[u64]) -> u64 {
    index_counts.iter().product()
}

fn validate(index_counts: &[u64], idx: u64) -> Result<(), Error> {
    if index_counts.is_empty() {
        return Err(Error::InvalidArgument("index_counts must not be empty"));
    }
    if index_counts.len() > 255 {
        return Err(Error::InvalidArgument("index_counts holds more than 255 dimensions"));
    }
    if index_counts.iter().any(|&n| n == 0) {
        return Err(Error::InvalidArgument("every index count must be positive"));
    }
    if idx >= elements_count(index_counts) {
        return Err(Error::InvalidArgument("idx is out of range"));
    }
    Ok(())
}

/// Compute the plaintext choice vector for `idx`.
///
/// `idx` is decomposed mixed-radix over the index counts; the result is the
/// concatenation of one one-hot byte segment per dimension.
pub fn create_choice(index_counts: &[u64], idx: u64) -> Result<Vec<u8>, Error> {
    validate(index_counts, idx)?;
    let mut remaining = idx;
    let mut prod = elements_count(index_counts);
    let mut choices = Vec::with_capacity(ciphers_count(index_counts) as usize);
    for &cols in index_counts {
        prod /= cols;
        let rows = remaining / prod;
        remaining -= rows * prod;
        for r in 0..cols {
            choices.push(if r == rows { 1 } else { 0 });
        }
    }
    Ok(choices)
}

/// Encrypt the choice vector for `idx` into a selector.
///
/// Every choice byte is encrypted independently (in parallel) with the
/// given variant. When `r` is supplied it must hold one 32-byte scalar per
/// ciphertext, making the output deterministic.
pub fn create_selector<E>(
    key: &E,
    enc_ctx: &EncryptionContext,
    index_counts: &[u64],
    idx: u64,
    r: Option<&[u8]>,
) -> Result<Vec<u8>, Error>
where
    E: Encrypt + ?Sized,
{
    let choices = create_choice(index_counts, idx)?;
    if let Some(r) = r {
        if r.len() != choices.len() * SCALAR_SIZE {
            return Err(Error::InvalidArgument(
                "selector randomness must hold one scalar per ciphertext",
            ));
        }
    }
    let mut selector = vec![0u8; choices.len() * CIPHER_SIZE];
    selector
        .par_chunks_mut(CIPHER_SIZE)
        .enumerate()
        .for_each(|(i, out)| {
            let msg = Scalar::from(choices[i] as u64);
            let rr = r.map(|r| {
                let mut buf = [0u8; SCALAR_SIZE];
                buf.copy_from_slice(&r[i * SCALAR_SIZE..(i + 1) * SCALAR_SIZE]);
                Scalar::from_bits(buf)
            });
            let cipher = key.encrypt(enc_ctx, &msg, rr.as_ref());
            out.copy_from_slice(&cipher.to_bytes());
        });
    Ok(selector)
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use super::*;
    use crate::ecelgamal::{Cipher, PrivateKey, PublicKey};
    use crate::test_utils::{TestRng, PRIVKEY, SMALL_CTX};

    const INDEX_COUNTS: [u64; 3] = [1000, 1000, 1000];
    const IDX: u64 = 12_345_678;
    const ROWS: [u64; 3] = [12, 345, 678];

    #[test]
    fn counts() {
        assert_eq!(ciphers_count(&INDEX_COUNTS), 3000);
        assert_eq!(elements_count(&INDEX_COUNTS), 1_000_000_000);
    }

    #[test]
    fn choice_vector_is_one_hot() {
        let choices = create_choice(&INDEX_COUNTS, IDX).unwrap();
        assert_eq!(choices.len(), 3000);
        let mut offset = 0usize;
        for (d, &cols) in INDEX_COUNTS.iter().enumerate() {
            for i in 0..cols as usize {
                let expected = if i as u64 == ROWS[d] { 1 } else { 0 };
                assert_eq!(choices[offset + i], expected);
            }
            offset += cols as usize;
        }
    }

    #[test]
    fn arguments_are_validated() {
        assert!(create_choice(&[], 0).is_err());
        assert!(create_choice(&[4, 0, 3], 0).is_err());
        assert!(create_choice(&[4, 3], 12).is_err());
        assert!(create_choice(&[1u64; 256], 0).is_err());
        assert!(create_choice(&[4, 3], 11).is_ok());
    }

    #[test]
    fn selector_is_deterministic_across_variants() {
        let enc_ctx = EncryptionContext::new();
        let privkey = PrivateKey::from(PRIVKEY);
        let pubkey = PublicKey::new(&privkey);
        let index_counts = [7u64, 5];
        let n = ciphers_count(&index_counts) as usize;
        let r = TestRng::new().scalar_stream(n);
        let fast = create_selector(&privkey, &enc_ctx, &index_counts, 13, Some(&r)).unwrap();
        let normal = create_selector(&pubkey, &enc_ctx, &index_counts, 13, Some(&r)).unwrap();
        assert_eq!(fast, normal);
        assert_eq!(fast.len(), n * CIPHER_SIZE);
    }

    #[test]
    fn selector_rejects_short_randomness() {
        let enc_ctx = EncryptionContext::new();
        let privkey = PrivateKey::from(PRIVKEY);
        let r = vec![0u8; SCALAR_SIZE];
        assert!(create_selector(&privkey, &enc_ctx, &[4, 3], 0, Some(&r)).is_err());
    }

    #[test]
    fn selector_decrypts_to_choice_vector() {
        let enc_ctx = EncryptionContext::new();
        let privkey = PrivateKey::from(PRIVKEY);
        let index_counts = [4u64, 3];
        let idx = 7;
        let selector = create_selector(&privkey, &enc_ctx, &index_counts, idx, None).unwrap();
        let choices = create_choice(&index_counts, idx).unwrap();
        for (i, chunk) in selector.chunks(CIPHER_SIZE).enumerate() {
            let cipher = Cipher::try_from(chunk).unwrap();
            let decrypted = SMALL_CTX.decrypt(&privkey, &cipher).unwrap();
            assert_eq!(decrypted, choices[i] as u32);
        }
    }
}

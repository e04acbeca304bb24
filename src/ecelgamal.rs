//! EC-ElGamal on the Ed25519 curve.
//!
//! A message `m` is encrypted as `(rG, rY + mG)`, hence ciphertexts are
//! additively homomorphic in `m`. Decryption recovers the point `mG`;
//! solving it back to the integer `m` is the job of [`crate::mg`].

use std::convert::TryFrom;

use curve25519_dalek::constants::ED25519_BASEPOINT_POINT;
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::edwards::EdwardsBasepointTable;
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::error::Error;

/// The byte length of a scalar.
pub const SCALAR_SIZE: usize = 32;
/// The byte length of a point.
pub const POINT_SIZE: usize = 32;
/// The byte length of a ciphertext.
pub const CIPHER_SIZE: usize = 2 * POINT_SIZE;
/// log_2(DEFAULT_MMAX).
pub const DEFAULT_MMAX_MOD: u8 = 24;
/// The default number of entries in an mG table.
pub const DEFAULT_MMAX: usize = 1 << DEFAULT_MMAX_MOD;

fn format_as_hex(f: &mut std::fmt::Formatter<'_>, bytes: &[u8]) -> std::fmt::Result {
    for i in 0..bytes.len() {
        write!(f, "{:02x}", bytes[i])?;
    }
    Ok(())
}

/// Get a random Scalar.
pub fn random_scalar() -> Scalar {
    let mut csprng = OsRng;
    Scalar::random(&mut csprng)
}

/// Ciphertext.
#[derive(Debug, Clone, Copy)]
pub struct Cipher {
    pub(crate) c1: CompressedEdwardsY,
    pub(crate) c2: CompressedEdwardsY,
}

impl Cipher {
    pub fn to_bytes(&self) -> [u8; CIPHER_SIZE] {
        let mut buf = [0u8; CIPHER_SIZE];
        buf[0..POINT_SIZE].copy_from_slice(self.c1.as_bytes());
        buf[POINT_SIZE..CIPHER_SIZE].copy_from_slice(self.c2.as_bytes());
        buf
    }
}

impl From<[u8; CIPHER_SIZE]> for Cipher {
    fn from(buf: [u8; CIPHER_SIZE]) -> Self {
        Self {
            c1: CompressedEdwardsY::from_slice(&buf[0..POINT_SIZE]),
            c2: CompressedEdwardsY::from_slice(&buf[POINT_SIZE..CIPHER_SIZE]),
        }
    }
}

impl TryFrom<&[u8]> for Cipher {
    type Error = Error;
    fn try_from(buf: &[u8]) -> Result<Self, Self::Error> {
        if buf.len() != CIPHER_SIZE {
            return Err(Error::InvalidArgument("a ciphertext is 64 bytes long"));
        }
        Ok(Self {
            c1: CompressedEdwardsY::from_slice(&buf[0..POINT_SIZE]),
            c2: CompressedEdwardsY::from_slice(&buf[POINT_SIZE..CIPHER_SIZE]),
        })
    }
}

impl PartialEq for Cipher {
    fn eq(&self, other: &Self) -> bool {
        (self.c1 == other.c1) && (self.c2 == other.c2)
    }
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format_as_hex(f, self.c1.as_bytes())?;
        format_as_hex(f, self.c2.as_bytes())
    }
}

/// A context needed to encrypt a message.
///
/// Holds a precomputed table of basepoint multiples shared by every
/// fixed-base multiplication. Create once and reuse.
pub struct EncryptionContext {
    pub(crate) table: EdwardsBasepointTable,
}

impl EncryptionContext {
    pub fn new() -> Self {
        Self {
            table: EdwardsBasepointTable::create(&ED25519_BASEPOINT_POINT),
        }
    }
}

impl Default for EncryptionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The encrypt operation, implemented both by [`PublicKey`] (the normal
/// path) and by [`PrivateKey`] (the fast path). For the same `(key, msg, r)`
/// the two produce byte-identical ciphertexts.
pub trait Encrypt: Sync {
    fn encrypt(&self, enc_ctx: &EncryptionContext, msg: &Scalar, r: Option<&Scalar>) -> Cipher;
}

/// A private key.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    pub(crate) scalar: Scalar,
}

impl PrivateKey {
    /// Generate a new private key from the process CSPRNG.
    pub fn new() -> Self {
        Self {
            scalar: random_scalar(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; SCALAR_SIZE] {
        self.scalar.as_bytes()
    }

    /// Compute `C2 - s * C1`, i.e. the point `mG` for an honest ciphertext.
    ///
    /// A ciphertext whose halves do not decode to valid group elements is
    /// reported as a decryption failure.
    pub fn decrypt_to_point(&self, cipher: &Cipher) -> Result<CompressedEdwardsY, Error> {
        let c1 = cipher.c1.decompress().ok_or(Error::Decryption)?;
        let c2 = cipher.c2.decompress().ok_or(Error::Decryption)?;
        Ok((c2 - self.scalar * c1).compress())
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

impl From<[u8; SCALAR_SIZE]> for PrivateKey {
    fn from(buf: [u8; SCALAR_SIZE]) -> Self {
        Self {
            scalar: Scalar::from_bits(buf),
        }
    }
}

impl Encrypt for PrivateKey {
    /// Fast encryption: with `s` at hand, `C2 = (r * s + m) * G` needs only
    /// fixed-base multiplications.
    fn encrypt(&self, enc_ctx: &EncryptionContext, msg: &Scalar, r: Option<&Scalar>) -> Cipher {
        let rr = match r {
            Some(r) => *r,
            None => random_scalar(),
        };
        Cipher {
            c1: enc_ctx.table.basepoint_mul(&rr).compress(),
            c2: enc_ctx.table.basepoint_mul(&(&rr * self.scalar + msg)).compress(),
        }
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.scalar == other.scalar
    }
}

impl std::fmt::Display for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bytes = self.scalar.as_bytes();
        format_as_hex(f, bytes)
    }
}

/// A public key.
#[derive(Debug, Clone)]
pub struct PublicKey {
    pub(crate) point: EdwardsPoint,
}

impl PublicKey {
    pub fn new(privkey: &PrivateKey) -> Self {
        Self {
            point: privkey.scalar * ED25519_BASEPOINT_POINT,
        }
    }

    pub fn to_bytes(&self) -> [u8; POINT_SIZE] {
        self.point.compress().to_bytes()
    }
}

impl TryFrom<[u8; POINT_SIZE]> for PublicKey {
    type Error = Error;
    fn try_from(buf: [u8; POINT_SIZE]) -> Result<Self, Self::Error> {
        let point = CompressedEdwardsY::from_slice(&buf).decompress();
        match point {
            Some(point) => Ok(Self { point }),
            None => Err(Error::InvalidArgument("not a canonical point encoding")),
        }
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point
    }
}

impl Encrypt for PublicKey {
    fn encrypt(&self, enc_ctx: &EncryptionContext, msg: &Scalar, r: Option<&Scalar>) -> Cipher {
        let rr = match r {
            Some(r) => *r,
            None => random_scalar(),
        };
        // The key and the message point are public here, so a variable-time
        // double scalar multiplication is fine for C2.
        Cipher {
            c1: enc_ctx.table.basepoint_mul(&rr).compress(),
            c2: EdwardsPoint::vartime_double_scalar_mul_basepoint(&rr, &self.point, msg).compress(),
        }
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let compressed = self.point.compress();
        let bytes = compressed.as_bytes();
        format_as_hex(f, bytes)
    }
}

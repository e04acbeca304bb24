//! EllipticPIR client library.
//!
//! The cryptographic core of a client for private information retrieval
//! built on additively homomorphic EC-ElGamal over the Ed25519 group.
//! A client builds an encrypted selector addressing one cell of the
//! server's matrix, the server answers with a homomorphically evaluated
//! reply, and the client unwraps that reply dimension by dimension.
//!
//! - [`ecelgamal`]: keys, ciphertexts, and the two encrypt paths.
//! - [`mg`]: the precomputed discrete-log table that makes decryption of
//!   small plaintexts a lookup, plus [`mg::DecryptionContext`].
//! - [`selector`] / [`selector_factory`]: encrypted one-hot selector
//!   construction, optionally from pre-generated cipher pools.
//! - [`reply`]: reply sizing, the multi-phase decryption, and a mock reply
//!   generator for tests.

pub mod ecelgamal;
pub mod error;
pub mod mg;
pub mod reply;
pub mod selector;
pub mod selector_factory;

pub use crate::ecelgamal::{
    random_scalar, Cipher, Encrypt, EncryptionContext, PrivateKey, PublicKey, CIPHER_SIZE,
    DEFAULT_MMAX, DEFAULT_MMAX_MOD, POINT_SIZE, SCALAR_SIZE,
};
pub use crate::error::Error;
pub use crate::mg::{DecryptionContext, MGEntry};
pub use crate::reply::{reply_mock, reply_r_count, reply_size};
pub use crate::selector::{ciphers_count, create_choice, create_selector, elements_count};
pub use crate::selector_factory::SelectorFactory;

#[cfg(test)]
pub(crate) mod test_utils {
    use lazy_static::lazy_static;

    use crate::ecelgamal::{DEFAULT_MMAX, SCALAR_SIZE};
    use crate::mg::DecryptionContext;

    pub const PRIVKEY: [u8; 32] = [
        0x7e, 0xf6, 0xad, 0xd2, 0xbe, 0xd5, 0x9a, 0x79,
        0xba, 0x6e, 0xdc, 0xfb, 0xa4, 0x8f, 0xde, 0x7a,
        0x55, 0x31, 0x75, 0x4a, 0xf5, 0x93, 0x76, 0x34,
        0x6c, 0x8b, 0x52, 0x84, 0xee, 0xf2, 0x52, 0x07,
    ];
    pub const PUBKEY: [u8; 32] = [
        0x9c, 0x76, 0x82, 0x3d, 0xbd, 0xb9, 0xbf, 0x04,
        0x8f, 0xc5, 0xc2, 0xaf, 0x00, 0x0e, 0x28, 0xa1,
        0x48, 0xee, 0x02, 0x19, 0x99, 0xfb, 0x7f, 0x21,
        0xca, 0x1f, 0x84, 0xb8, 0xfe, 0x73, 0xd7, 0xe8,
    ];
    pub const MSG: u64 = (0x12345678 & (DEFAULT_MMAX - 1)) as u64;
    pub const R: [u8; 32] = [
        0x42, 0xff, 0x2d, 0x98, 0x4a, 0xe5, 0xa2, 0x8f,
        0x7d, 0x02, 0x69, 0x87, 0xc7, 0x10, 0x9a, 0x7b,
        0x3a, 0x1d, 0x36, 0x58, 0x82, 0x5a, 0x09, 0x17,
        0xe1, 0x69, 0x3e, 0x83, 0xa5, 0x71, 0x5d, 0x09,
    ];
    pub const CIPHER: [u8; 64] = [
        0x11, 0xa9, 0x4e, 0xb7, 0x18, 0x53, 0x7e, 0x94,
        0x7d, 0x0f, 0xf3, 0x0c, 0xdd, 0xae, 0x16, 0xae,
        0xab, 0x42, 0x9e, 0xac, 0x09, 0x2b, 0x22, 0x00,
        0x06, 0xb1, 0x9c, 0xcc, 0xb5, 0x26, 0xb4, 0x30,
        0xeb, 0x76, 0x83, 0xc0, 0xdf, 0x90, 0x3a, 0x88,
        0xf6, 0xf1, 0x09, 0x52, 0xbc, 0xa4, 0xd6, 0x45,
        0x28, 0x4f, 0xf7, 0xed, 0x95, 0xc6, 0xa4, 0xe9,
        0x67, 0xf5, 0xe7, 0xae, 0x22, 0xc9, 0x33, 0xcb,
    ];

    /// Small table size that keeps table-backed tests fast.
    pub const SMALL_MMAX_MOD: u8 = 16;
    pub const SMALL_MMAX: usize = 1 << SMALL_MMAX_MOD;
    /// SHA-256 of the sorted 36-byte-record stream for mmax = 2^16.
    pub const MG_HASH_SMALL: [u8; 32] = [
        0x8c, 0x55, 0x49, 0x7e, 0x28, 0xd5, 0xea, 0x75,
        0x15, 0xdd, 0x32, 0xb3, 0x98, 0x34, 0x0b, 0xfa,
        0xf8, 0x89, 0x40, 0x35, 0xe0, 0x30, 0xd2, 0x13,
        0x50, 0x80, 0x84, 0x31, 0xb8, 0x00, 0x8a, 0xf2,
    ];

    lazy_static! {
        /// One shared small decryption context; generating it per test would
        /// dominate the suite's runtime.
        pub static ref SMALL_CTX: DecryptionContext = DecryptionContext::generate(SMALL_MMAX);
    }

    /// Deterministic scalar stream for reproducible encryption in tests
    /// (xorshift64, final byte clamped below the group order).
    pub struct TestRng(u64);

    impl TestRng {
        pub fn new() -> Self {
            TestRng(0x123456789abcdef0)
        }

        pub fn next_u8(&mut self) -> u8 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.0 = x;
            (x & 0xff) as u8
        }

        pub fn next_scalar_bytes(&mut self) -> [u8; SCALAR_SIZE] {
            let mut buf = [0u8; SCALAR_SIZE];
            for b in buf.iter_mut() {
                *b = self.next_u8();
            }
            buf[SCALAR_SIZE - 1] &= 0x1f;
            buf
        }

        /// `count` scalars, concatenated.
        pub fn scalar_stream(&mut self, count: usize) -> Vec<u8> {
            let mut out = Vec::with_capacity(count * SCALAR_SIZE);
            for _ in 0..count {
                out.extend_from_slice(&self.next_scalar_bytes());
            }
            out
        }
    }
}

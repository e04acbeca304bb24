//! Error types surfaced by the library.

use thiserror::Error;

/// All failures the client core can report. None of them are retried
/// internally.
#[derive(Error, Debug)]
pub enum Error {
    /// The decrypted point was not found in the mG table, or a ciphertext
    /// half did not decode to a group element.
    #[error("failed to decrypt the ciphertext")]
    Decryption,

    /// An input violated a documented constraint.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A selector factory pool ran dry.
    #[error("insufficient ciphers cache")]
    InsufficientCache,

    /// The mG file opened but held fewer entries than requested.
    #[error("mG file ended after {got} of {expected} entries")]
    MGShortRead { expected: usize, got: usize },

    /// The mG file could not be read or written.
    #[error("mG file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

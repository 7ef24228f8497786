//! # QC-01 Crypto
//!
//! The signature and hash contract every other crate builds on:
//! `sign`, `verify`, `address_of`, `hash`. Swapping the post-quantum scheme
//! later should only ever touch this crate.
//!
//! | Module | Algorithm |
//! |--------|-----------|
//! | `signatures` | Falcon-512 (lattice-based, post-quantum) |
//! | `hashing` | SHA3-256 |

pub mod errors;
pub mod hashing;
pub mod signatures;

pub use errors::CryptoError;
pub use hashing::{hash, hash_many, Hash};
pub use signatures::{address_of, sign, verify, KeyPair};

//! Compute backends.
//!
//! Only a CPU backend exists: mining and batch hashing are embarrassingly
//! parallel but don't warrant a GPU dependency for a consensus-critical path
//! that must behave identically on every node.

#[cfg(feature = "cpu")]
pub mod cpu;

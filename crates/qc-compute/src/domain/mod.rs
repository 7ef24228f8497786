//! Domain layer placeholder.
//!
//! This crate is a thin compute abstraction, not a bounded domain of its
//! own; it keeps the same module shape as the rest of the workspace so the
//! crate-to-component mapping stays uniform.

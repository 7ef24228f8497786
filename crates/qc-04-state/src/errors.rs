use thiserror::Error;

/// Errors internal to the state store's own bookkeeping, not reject reasons
/// for untrusted input. Per-transaction and per-block rejection reasons
/// (insufficient balance, reused signing key, unknown token, ...) are
/// `shared_types::CoreError` values, shared with every other crate that can
/// reject a transaction or block for the same underlying reason.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot revert block {requested}: current tip is {tip:?}")]
    RevertMismatch { requested: u64, tip: Option<u64> },
}

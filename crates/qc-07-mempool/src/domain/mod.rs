//! Domain layer: the pool, its entries, and its errors.

pub mod entities;
pub mod errors;
pub mod pool;
pub mod value_objects;

pub use entities::{GossipItemType, GossipRecord, MempoolEntry};
pub use errors::MempoolError;
pub use pool::TransactionPool;
pub use value_objects::FeeRateKey;

mod flock;

pub use flock::DatabaseLock;

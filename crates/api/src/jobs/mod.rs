//! Background job scheduler and job implementations.

mod expire_seat_locks;
mod pool_metrics;
mod scheduler;

pub use expire_seat_locks::ExpireSeatLocksJob;
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::JobScheduler;

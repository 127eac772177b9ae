pub mod metrics;
pub mod todo;

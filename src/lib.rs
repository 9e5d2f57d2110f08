pub mod config;
pub mod download;
pub mod logging;
pub mod observability;
pub mod pool;
pub mod queue;
pub mod task;
pub mod worker;

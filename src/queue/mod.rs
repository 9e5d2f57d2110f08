pub mod shutdown;
pub mod store;

pub use shutdown::Shutdown;
pub use store::{Next, TaskQueue};

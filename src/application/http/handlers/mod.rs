mod heartbeat;
mod register;
mod rules;
mod tasks;

pub use heartbeat::heartbeat;
pub use register::register;
pub use rules::{download, version};
pub use tasks::{fetch_tasks, submit_result};

mod manager;

pub use manager::{wait_termination_signal, TaskManager};

pub mod extract;
pub mod task;

pub mod driver;
pub mod scheduler;

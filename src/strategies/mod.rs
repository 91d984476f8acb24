pub mod allocator;
pub mod classifier;
pub mod types;

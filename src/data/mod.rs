pub mod filters;
pub mod provider;
pub mod types;

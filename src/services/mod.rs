pub mod issues;
pub mod store;

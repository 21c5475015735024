pub mod readings;
pub mod topics;
pub mod types;

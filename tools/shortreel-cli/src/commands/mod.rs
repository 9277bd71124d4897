pub mod check;
pub mod config;
pub mod plan;
pub mod produce;
pub mod validate;

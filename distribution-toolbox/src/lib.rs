pub mod chain;
pub mod distribution;
pub mod utils;

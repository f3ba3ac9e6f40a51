pub mod error;
pub mod passes;
pub mod satellites;
pub mod station;

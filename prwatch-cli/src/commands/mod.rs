pub mod config;
pub mod daemon;
pub mod repo;
pub mod status;
pub mod update;

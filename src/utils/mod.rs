//! Configuration management

pub mod config;

pub use config::ConfigurationManager;

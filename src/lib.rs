pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod registry;
pub mod session;

pub mod autopilot;
pub mod config;
pub mod constants;
pub mod engine;
pub mod grid;
pub mod logging;
pub mod maps;
pub mod rng;
pub mod server_protocol;
pub mod types;

pub mod config;
pub mod credentials;
pub mod debug_log;
pub mod error;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod storage;

pub mod cli;
pub mod config;
pub mod error;
pub mod install;
pub mod inventory;
pub mod log;
pub mod pip;
pub mod prompt;
pub mod pyproject;
pub mod utils;

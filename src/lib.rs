pub mod analyze;
pub mod config;
pub mod error;
pub mod llm;
pub mod util;
pub mod warehouse;
pub mod web;

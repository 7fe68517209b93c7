pub mod azure;
pub mod ollama;

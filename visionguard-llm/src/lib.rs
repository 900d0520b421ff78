pub mod config;
pub mod error;
pub mod providers;
pub mod enricher;

#[cfg(test)]
mod enricher_tests;

pub use config::*;
pub use error::*;
pub use enricher::{fallback_mapping, AlertEnricher};
pub use providers::{OpenAIProvider, ProviderTrait};

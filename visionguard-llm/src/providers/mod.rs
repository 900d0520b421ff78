pub mod trait_impl;
pub mod openai;

pub use trait_impl::Provider as ProviderTrait;
pub use openai::OpenAIProvider;
pub use crate::config::Provider;

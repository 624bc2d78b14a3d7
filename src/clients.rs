pub mod llm;
pub mod poll_backend;
pub mod translator;

pub use llm::{AiAdapter, LanguageModel, OllamaClient, TokenStream};
pub use poll_backend::{PollBackendClient, PollBackendConfig};
pub use translator::{MyMemoryClient, TranslationBackend, Translator, TranslatorConfig};

//! Image generation providers.

mod gemini;

pub use gemini::{GeminiBackend, GeminiProvider, GeminiProviderBuilder};

//! Provider Implementations

pub mod gemini;

pub use gemini::GeminiProvider;

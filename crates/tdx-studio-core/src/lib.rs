//! TDX Studio Core Library
//!
//! Client engine for a remote multimodal generation service. Covers image
//! payload handling, credential session management, the generative provider
//! abstraction (Gemini image edits, Veo video jobs), and the fixed-interval
//! polling engine. Front-ends (CLI, GUI) sit on top of this crate.

pub mod credentials;
pub mod generative;
pub mod media;
pub mod notice;

mod error;
pub use error::*;

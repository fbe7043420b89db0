//! Generation service clients for Skyhook.
//!
//! Currently one backend: the Gemini `generateContent` REST API. The wire
//! schema lives in [`wire`] as explicit tagged records validated at the
//! serialization boundary — nothing downstream ever touches loose JSON.

pub mod gemini;
pub mod wire;

pub use gemini::GeminiClient;

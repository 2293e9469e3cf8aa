pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod models;
pub mod normalize;
pub mod poll;
pub mod render;
pub mod resolve;

#[cfg(test)]
mod testing;

pub use client::{FirefliesClient, TranscriptProvider};
pub use config::FirefliesConfig;
pub use error::{NotesError, ProviderError, RenderError};
pub use generator::{GenerateOptions, NotesGenerator};
pub use render::{DocumentRenderer, PdfRenderer};
pub use resolve::Lookup;

//! DeskMate - question answering over uploaded documents
//!
//! # Architecture
//!
//! ```text
//! Documents -> Chunker -> Embedder -> VectorIndex -> persist(location)
//!                                          |
//! Question -> Embedder -> query(k) <-------+
//!                            |
//!                  prompt(context, question)
//!                            |
//!               primary backend --err--> fallback backend
//!                            |
//!                          Answer
//! ```
//!
//! # Example
//!
//! ```ignore
//! use deskmate_lib::config::Settings;
//! use deskmate_lib::pipeline::{Document, DynPipeline};
//!
//! let settings = Settings::load(None)?;
//! let mut pipeline = DynPipeline::from_settings(&settings)?;
//!
//! // Index the uploaded documents
//! pipeline.ingest(&[Document::new("policy.txt", text)])?;
//!
//! // Ask
//! let answer = pipeline.ask("What is the refund window?")?;
//! println!("{} ({:?})", answer.text, answer.backend_used);
//! ```

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod provider;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

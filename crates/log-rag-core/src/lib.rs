//! # log-rag core
//!
//! Backend-agnostic logic for asking questions about log files: parsing
//! log lines, the vector store and embedding abstractions, the adapter
//! that ties them together, and the retrieval + answer pipeline.
//!
//! This crate contains no HTTP clients, sqlx, or filesystem I/O. Concrete
//! backends live in the `log-rag` application crate.
//!
//! | Module | Role |
//! |--------|------|
//! | [`parse`] | Raw lines → [`models::LogRecord`] ([`parse::LogIngestor`]) |
//! | [`adapter`] | Records → embedded entries in a [`store::VectorStore`] |
//! | [`pipeline`] | Question → retrieval → prompt → [`models::Answer`] |

pub mod adapter;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod hints;
pub mod llm;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testing;

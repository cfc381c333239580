//! # Ragabond - Question Answering over Local Documents
//!
//! Ragabond builds named vector indexes from local PDF, text, CSV and JSON files
//! and answers natural-language questions by retrieving the most similar chunks
//! and handing them to a local language model.
//!
//! ## Overview
//!
//! Documents are concatenated in the order given, split into overlapping
//! fixed-size chunks, embedded one by one with progress reporting, and stored in
//! an embedded LanceDB table under `<index_root>/<name>`. A manifest of the
//! source files is kept next to the vectors. Queries embed the question, fetch
//! the nearest chunks, and ask an Ollama model for an answer with the chunks as
//! context.
//!
//! ## Key Features
//!
//! - **Local Embeddings**: FastEmbed (all-MiniLM-L6-v2) by default, or Ollama
//! - **Named Indexes**: create, list, inspect and delete independent indexes
//! - **Progress Reporting**: processed/total counts with remaining-time estimates
//! - **Cited Answers**: every answer lists the chunks it was built from
//! - **MCP Protocol**: tools and slash commands for AI assistant integration
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │ CLI (clap)   │   │ RagMcpServer │ (stdio)
//! └──────┬───────┘   └──────┬───────┘
//!        └────────┬─────────┘
//!          ┌──────▼──────┐
//!          │  RagClient  │
//!          └──────┬──────┘
//!    ┌────────────┼──────────────┐
//! ┌──▼─────────┐ ┌▼───────────┐ ┌▼─────────────────────┐
//! │IndexManager│ │VectorIndex │ │ConversationalRetriever│
//! └──┬─────────┘ └┬───────────┘ └┬─────────────────────┘
//!    │ loader,    │ LanceDB,     │ Ollama
//!    │ chunker    │ embeddings   │ generation
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Library entry point tying the pieces together
//! - [`mcp_server`]: MCP protocol server implementation with tools and prompts
//! - [`indexer`]: Document loading and text chunking
//! - [`embedding`]: Embedding providers (FastEmbed, Ollama, hashing)
//! - [`vector_db`]: LanceDB storage for chunk vectors
//! - [`index`]: Named index lifecycle, build progress and search
//! - [`generation`]: Language models used to answer questions
//! - [`retriever`]: Question answering over an index
//! - [`config`]: Configuration management with environment variable support
//! - [`types`]: Request/response types with JSON schema
//! - [`error`]: Error types
//! - [`paths`]: Platform-specific default locations
//!
//! ## Usage Example
//!
//! ```no_run
//! use ragabond::mcp_server::RagMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Serve over stdio (MCP protocol) with the default configuration
//!     RagMcpServer::serve_stdio().await?;
//!
//!     Ok(())
//! }
//! ```

/// Main client interface for library use
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding providers for chunks and questions
pub mod embedding;

/// Error types and utilities
pub mod error;

/// Language models that produce answers
pub mod generation;

/// Named index lifecycle and build progress
pub mod index;

/// Document loading and text chunking
pub mod indexer;

/// MCP server implementation with tools and prompts
pub mod mcp_server;

/// Blocking HTTP client for the Ollama API
pub(crate) mod ollama_api;

/// Platform-specific default paths
pub mod paths;

/// Question answering over an index
pub mod retriever;

/// Request/response types with JSON schema definitions
pub mod types;

/// LanceDB storage for chunk vectors
pub mod vector_db;

pub use client::RagClient;
pub use config::Config;
pub use error::RagError;
pub use index::{IndexManager, ProgressState, VectorIndex};
pub use retriever::ConversationalRetriever;
pub use types::{AskRequest, AskResponse, CreateIndexRequest, CreateIndexResponse};

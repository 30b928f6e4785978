//! # docqa
//!
//! Question answering over your own PDF, text, and Word documents.
//!
//! Documents are split into overlapping chunks, embedded, and stored in a
//! local SQLite collection. Questions retrieve the closest chunks and an LLM
//! answers from them, keeping a bounded conversation history. A second
//! workflow routes free text through a search tool (local documents,
//! DuckDuckGo, or Wikipedia) and summarizes the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ PDF/TXT/DOC │──▶│ Extract+Chunk │──▶│  SQLite   │
//! │   files     │   │   +Embed      │   │ vectors   │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!               ┌─────────────┐      ┌────────────┐
//!               │ Conversation │      │ Tool router │──▶ DuckDuckGo
//!               │  (ask/chat)  │      │  (run)      │──▶ Wikipedia
//!               └──────┬──────┘      └─────┬──────┘
//!                      └──────▶ LLM ◀──────┘
//! ```
//!
//! The pipeline logic lives in `docqa-core`; this crate adds the SQLite
//! store, file extraction, providers, configuration, CLI, and HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`app`] | Wiring from config to components |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`discover`] | File discovery for ingestion |
//! | [`extract`] | PDF, text, and Word text extraction |
//! | [`ingest`] | Load → chunk → embed → store |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Chat-completion providers |
//! | [`tools`] | Web search tools |
//! | [`session`] | Per-client conversations |
//! | [`server`] | HTTP API |

pub mod app;
pub mod config;
pub mod db;
pub mod discover;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod tools;

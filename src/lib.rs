//! # Drive Recall
//!
//! Semantic search over a user's Google Drive documents.
//!
//! Selected documents are fetched from Drive, embedded with a single
//! embedding model, and upserted into a vector index keyed by Drive file
//! id. Free-text queries are embedded with the same model and answered with
//! the nearest stored documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ Google Drive│──▶│  Embedder   │──▶│ Vector index │
//! │  (fetch)    │   │ OpenAI/Olla │   │ Pinecone/mem │
//! └─────────────┘   └──────┬──────┘   └──────┬───────┘
//!                          │ query           │ top-k
//!                      ┌───┴─────────────────┴──┐
//!                      ▼                        ▼
//!                 ┌──────────┐            ┌──────────┐
//!                 │   CLI    │            │   HTTP   │
//!                 │ (recall) │            │  (/api)  │
//!                 └──────────┘            └──────────┘
//! ```
//!
//! The pipelines themselves ([`Ingestor`](drive_recall_core::ingest::Ingestor),
//! [`Retriever`](drive_recall_core::search::Retriever)) live in
//! `drive-recall-core`; this crate supplies the concrete clients and the
//! outer surfaces.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`commands`] | CLI command implementations |
//! | [`drive`] | Google Drive document source |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`pinecone`] | Pinecone vector index |
//! | [`identity`] | Google OAuth sign-in |
//! | [`services`] | Component wiring |
//! | [`server`] | HTTP API server |

pub mod commands;
pub mod config;
pub mod drive;
pub mod embedding;
pub mod identity;
pub mod pinecone;
pub mod server;
pub mod services;

//! # Receipt Harness
//!
//! A receipt line-item ingestion service with LLM-backed product enrichment.
//!
//! Receipt Harness accepts retail receipt line items over HTTP (or from a
//! JSON file via the CLI), normalizes heterogeneous caller input into a
//! canonical record, optionally enriches missing product attributes through
//! a text-generation call, reconciles enriched fields against caller data
//! under confidence tiers, and persists the merged record to SQLite keyed
//! by the external receipt identifier.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐
//! │ Raw request  │──▶│ Normalizer  │──▶│ Reconcile  │──▶│  SQLite   │
//! │ HTTP / CLI   │   │ keys/price │   │  engine    │   │ receipts  │
//! └──────────────┘   └────────────┘   └─────┬──────┘   └──────────┘
//!                                          │
//!                                          ▼
//!                                    ┌───────────┐
//!                                    │ Enrichment │
//!                                    │ LLM client │
//!                                    └───────────┘
//! ```
//!
//! Enrichment is invoked only when a product description is present and the
//! brand or category is missing (or enrichment is forced), and an
//! enrichment failure never fails ingestion — it degrades to `unknown`
//! placeholders at `low` confidence.
//!
//! ## Quick Start
//!
//! ```bash
//! rcpt init                         # create database
//! rcpt ingest receipts.json         # ingest from a JSON file
//! rcpt get R-2024-001               # fetch a persisted receipt
//! rcpt serve                        # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Field normalization and input validation |
//! | [`standardize`] | Brand/merchant name standardization |
//! | [`enrichment`] | Enrichment provider abstraction |
//! | [`reconcile`] | Merge/reconciliation engine |
//! | [`ingest`] | Pipeline orchestration |
//! | [`store`] | Persistence gateway (SQLite + in-memory) |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod enrichment;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod server;
pub mod standardize;
pub mod store;

//! Cloudmirror Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `ObjectKey`, `ContentHash`, `Locator`, `LogicalPath`,
//!   and the `LocalItem` / `BlobItem` / `IndexItem` views
//! - **Port definitions** - Traits for adapters: `IBlobStore`, `IIndexStore`,
//!   `ILocalFileSystem`
//! - **Configuration** - YAML-backed settings with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! The reconciliation engine in `cloudmirror-sync` drives the ports.

pub mod config;
pub mod domain;
pub mod ports;

//! Domain types
//!
//! - Newtypes for identity: [`ContentHash`], [`ObjectKey`], [`Locator`]
//! - The structured path model, [`LogicalPath`]
//! - The three per-source item views
//! - The protected bookkeeping object names
//! - Domain-specific error types

pub mod errors;
pub mod items;
pub mod newtypes;
pub mod path;
pub mod protected;

// Re-export commonly used types
pub use errors::DomainError;
pub use items::{format_index_date, BlobItem, IndexItem, LocalItem, INDEX_DATE_FORMAT};
pub use newtypes::*;
pub use path::{LogicalPath, PathRoot, FOLDER_SEPARATOR};
pub use protected::ProtectedNames;

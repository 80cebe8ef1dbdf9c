//! Protected system object names
//!
//! A handful of blob store objects are bookkeeping: the index record, its
//! folder-list aid and vendor files. They are stored under their bare name
//! and generic add/remove logic never touches them.

use std::collections::BTreeSet;

/// Vendor bookkeeping objects that share the store
pub const VENDOR_OBJECT_NAMES: &[&str] = &["WorkshopUpload", "WorkshopImageUpload.png"];

/// Case-sensitive set of protected object names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedNames {
    names: BTreeSet<String>,
}

impl ProtectedNames {
    /// Index record, folder list and vendor names, plus `extra`
    pub fn new<I, S>(index_name: &str, folder_list_name: &str, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: BTreeSet<String> = VENDOR_OBJECT_NAMES
            .iter()
            .map(|name| (*name).to_string())
            .collect();
        names.insert(index_name.to_string());
        names.insert(folder_list_name.to_string());
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

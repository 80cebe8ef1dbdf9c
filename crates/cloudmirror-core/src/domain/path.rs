//! Structured path values
//!
//! [`LogicalPath`] is a root marker plus an ordered list of segments. It is
//! the single vocabulary used to translate between the host's native
//! directory layout and the `/`-delimited folder strings kept in the
//! hierarchical index. Every operation here is a pure value operation: no
//! filesystem access, no normalization beyond dropping empty segments.
//!
//! Scope and relocation checks are expressed with [`LogicalPath::prune`] and
//! friends, which compare whole segments. A folder `GameExtra` is therefore
//! never mistaken for a child of `Game`.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::DomainError;

/// Delimiter used by the hierarchical index for folder paths
pub const FOLDER_SEPARATOR: char = '/';

/// Root marker of an absolute path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathRoot {
    /// Rooted at the separator (`/` natively, or a leading delimiter)
    Separator,
    /// A drive or share prefix such as `C:` or `\\server\share`
    Prefix(String),
}

/// A path as a root marker plus segments
///
/// `root == None` means the path is relative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LogicalPath {
    root: Option<PathRoot>,
    segments: Vec<String>,
}

impl LogicalPath {
    /// The empty relative path
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a relative path from segments
    #[must_use]
    pub fn relative<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: None,
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a native path using the host's separator and root syntax
    ///
    /// `.` components are dropped; `..` is kept as a literal segment.
    #[must_use]
    pub fn from_native(path: &Path) -> Self {
        let mut root = None;
        let mut segments = Vec::new();

        for component in path.components() {
            match component {
                Component::Prefix(prefix) => {
                    root = Some(PathRoot::Prefix(
                        prefix.as_os_str().to_string_lossy().into_owned(),
                    ));
                }
                Component::RootDir => {
                    if root.is_none() {
                        root = Some(PathRoot::Separator);
                    }
                }
                Component::CurDir => {}
                Component::ParentDir => segments.push("..".to_string()),
                Component::Normal(segment) => {
                    segments.push(segment.to_string_lossy().into_owned());
                }
            }
        }

        Self { root, segments }
    }

    /// Render as a native path
    #[must_use]
    pub fn to_native(&self) -> PathBuf {
        let mut path = match &self.root {
            None => PathBuf::new(),
            Some(PathRoot::Separator) => PathBuf::from(MAIN_SEPARATOR_STR),
            Some(PathRoot::Prefix(prefix)) => PathBuf::from(format!("{prefix}{MAIN_SEPARATOR}")),
        };
        for segment in &self.segments {
            path.push(segment);
        }
        path
    }

    /// Parse a path written with a single fixed delimiter
    ///
    /// A leading delimiter makes the path rooted. Empty and `.` segments are
    /// dropped, so `"."` and `""` both parse to the empty relative path.
    #[must_use]
    pub fn from_delimited(separator: char, path: &str) -> Self {
        let root = path.starts_with(separator).then_some(PathRoot::Separator);
        let segments = path
            .split(separator)
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .map(str::to_string)
            .collect();

        Self { root, segments }
    }

    /// Render with a single fixed delimiter
    #[must_use]
    pub fn to_delimited(&self, separator: char) -> String {
        let joined = self.segments.join(&separator.to_string());
        match &self.root {
            None => joined,
            Some(PathRoot::Separator) => format!("{separator}{joined}"),
            Some(PathRoot::Prefix(prefix)) => format!("{prefix}{separator}{joined}"),
        }
    }

    /// Parse an index folder string
    #[must_use]
    pub fn from_folder(folder: &str) -> Self {
        Self::from_delimited(FOLDER_SEPARATOR, folder)
    }

    /// Render as an index folder string
    #[must_use]
    pub fn to_folder(&self) -> String {
        self.to_delimited(FOLDER_SEPARATOR)
    }

    #[must_use]
    pub fn root(&self) -> Option<&PathRoot> {
        self.root.as_ref()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    #[must_use]
    pub fn is_relative(&self) -> bool {
        self.root.is_none()
    }

    /// Whether every segment names a real child: no empty, `.` or `..` segment
    #[must_use]
    pub fn is_normal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
    }

    /// Append segments, keeping the root
    #[must_use]
    pub fn resolve<I, S>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut resolved = self.clone();
        resolved
            .segments
            .extend(segments.into_iter().map(Into::into));
        resolved
    }

    /// Append the segments of a relative path
    ///
    /// # Errors
    /// Returns `DomainError::NotRelative` if `relative` carries a root
    pub fn combine(&self, relative: &LogicalPath) -> Result<Self, DomainError> {
        if relative.is_absolute() {
            return Err(DomainError::NotRelative(relative.to_string()));
        }
        Ok(self.resolve(relative.segments.iter().cloned()))
    }

    /// Remainder of this path below `ancestor`
    ///
    /// Returns `Ok(None)` when the roots differ or `ancestor` is not a
    /// segment prefix of this path.
    ///
    /// # Errors
    /// Returns `DomainError::NotAbsolute` if either operand is relative
    pub fn relativize(&self, ancestor: &LogicalPath) -> Result<Option<Self>, DomainError> {
        if ancestor.is_relative() {
            return Err(DomainError::NotAbsolute(ancestor.to_string()));
        }
        if self.is_relative() {
            return Err(DomainError::NotAbsolute(self.to_string()));
        }
        if ancestor.root != self.root {
            return Ok(None);
        }

        Ok(self
            .segments
            .strip_prefix(ancestor.segments.as_slice())
            .map(|rest| Self::relative(rest.iter().cloned())))
    }

    /// Strip a leading segment sequence, keeping this path's root
    ///
    /// Returns `Ok(None)` when `prefix` is not a segment prefix.
    ///
    /// # Errors
    /// Returns `DomainError::NotRelative` if `prefix` is absolute
    pub fn prune(&self, prefix: &LogicalPath) -> Result<Option<Self>, DomainError> {
        if prefix.is_absolute() {
            return Err(DomainError::NotRelative(prefix.to_string()));
        }

        Ok(self
            .segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Self {
                root: self.root.clone(),
                segments: rest.to_vec(),
            }))
    }

    /// Strip a trailing segment sequence, keeping this path's root
    ///
    /// Returns `Ok(None)` when `suffix` is not a segment suffix.
    ///
    /// # Errors
    /// Returns `DomainError::NotRelative` if `suffix` is absolute
    pub fn strip(&self, suffix: &LogicalPath) -> Result<Option<Self>, DomainError> {
        if suffix.is_absolute() {
            return Err(DomainError::NotRelative(suffix.to_string()));
        }

        Ok(self
            .segments
            .strip_suffix(suffix.segments.as_slice())
            .map(|rest| Self {
                root: self.root.clone(),
                segments: rest.to_vec(),
            }))
    }

    /// Drop the last segment
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            root: self.root.clone(),
            segments: rest.to_vec(),
        })
    }
}

impl Display for LogicalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_folder())
    }
}

impl Serialize for LogicalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_folder())
    }
}

impl<'de> Deserialize<'de> for LogicalPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let folder = String::deserialize(deserializer)?;
        Ok(Self::from_folder(&folder))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn rel(path: &str) -> LogicalPath {
        LogicalPath::from_folder(path)
    }

    fn abs(path: &str) -> LogicalPath {
        LogicalPath::from_folder(&format!("/{path}"))
    }

    #[rstest]
    #[case("Game/Decks", false, &["Game", "Decks"])]
    #[case("/Game/Decks", true, &["Game", "Decks"])]
    #[case("Game//Decks/", false, &["Game", "Decks"])]
    #[case(".", false, &[])]
    #[case("", false, &[])]
    #[case("./Game", false, &["Game"])]
    fn test_from_delimited(#[case] input: &str, #[case] absolute: bool, #[case] segments: &[&str]) {
        let path = LogicalPath::from_delimited('/', input);
        assert_eq!(path.is_absolute(), absolute);
        assert_eq!(path.segments(), segments);
    }

    #[test]
    fn test_to_delimited() {
        assert_eq!(rel("a/b").to_delimited('|'), "a|b");
        assert_eq!(abs("a/b").to_delimited('/'), "/a/b");
        assert_eq!(LogicalPath::empty().to_delimited('/'), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_native_roundtrip() {
        let path = LogicalPath::from_native(Path::new("/home/user/sync/decks"));
        assert_eq!(path.root(), Some(&PathRoot::Separator));
        assert_eq!(path.segments(), ["home", "user", "sync", "decks"]);
        assert_eq!(path.to_native(), PathBuf::from("/home/user/sync/decks"));

        let relative = LogicalPath::from_native(Path::new("./a/b"));
        assert!(relative.is_relative());
        assert_eq!(relative.to_native(), PathBuf::from("a/b"));
    }

    #[test]
    fn test_resolve_keeps_root() {
        let path = abs("a").resolve(["b", "c"]);
        assert_eq!(path, abs("a/b/c"));
    }

    #[test]
    fn test_combine_rejects_absolute_argument() {
        let result = rel("a").combine(&abs("b"));
        assert!(matches!(result, Err(DomainError::NotRelative(_))));
        assert_eq!(abs("a").combine(&rel("b/c")).unwrap(), abs("a/b/c"));
    }

    #[test]
    fn test_relativize() {
        let path = abs("root/a/b");
        assert_eq!(path.relativize(&abs("root")).unwrap(), Some(rel("a/b")));
        assert_eq!(path.relativize(&abs("root/a/b")).unwrap(), Some(rel("")));
        assert_eq!(path.relativize(&abs("other")).unwrap(), None);
        assert_eq!(path.relativize(&abs("root/a/b/c")).unwrap(), None);
    }

    #[test]
    fn test_relativize_requires_absolute_operands() {
        assert!(matches!(
            abs("a").relativize(&rel("a")),
            Err(DomainError::NotAbsolute(_))
        ));
        assert!(matches!(
            rel("a").relativize(&abs("a")),
            Err(DomainError::NotAbsolute(_))
        ));
    }

    #[test]
    fn test_relativize_different_roots() {
        let drive = LogicalPath {
            root: Some(PathRoot::Prefix("C:".to_string())),
            segments: vec!["a".to_string()],
        };
        assert_eq!(drive.relativize(&abs("a")).unwrap(), None);
    }

    #[rstest]
    #[case("Game/Decks", "Game", Some("Decks"))]
    #[case("Game", "Game", Some(""))]
    #[case("GameExtra/Decks", "Game", None)]
    #[case("Other", "Game", None)]
    #[case("Game/Decks", "", Some("Game/Decks"))]
    fn test_prune(#[case] path: &str, #[case] prefix: &str, #[case] expected: Option<&str>) {
        let pruned = rel(path).prune(&rel(prefix)).unwrap();
        assert_eq!(pruned, expected.map(rel));
    }

    #[test]
    fn test_prune_keeps_root_and_rejects_absolute_prefix() {
        assert_eq!(abs("a/b").prune(&rel("a")).unwrap(), Some(abs("b")));
        assert!(matches!(
            rel("a/b").prune(&abs("a")),
            Err(DomainError::NotRelative(_))
        ));
    }

    #[rstest]
    #[case("a/b/c", "b/c", Some("a"))]
    #[case("a/b/c", "c", Some("a/b"))]
    #[case("a/b/c", "b", None)]
    #[case("a", "a/b", None)]
    fn test_strip(#[case] path: &str, #[case] suffix: &str, #[case] expected: Option<&str>) {
        assert_eq!(rel(path).strip(&rel(suffix)).unwrap(), expected.map(rel));
    }

    #[test]
    fn test_strip_rejects_absolute_suffix() {
        assert!(matches!(
            rel("a").strip(&abs("a")),
            Err(DomainError::NotRelative(_))
        ));
    }

    #[test]
    fn test_parent() {
        assert_eq!(abs("a/b").parent(), Some(abs("a")));
        assert_eq!(abs("a").parent(), Some(abs("")));
        assert_eq!(abs("").parent(), None);
        assert_eq!(LogicalPath::empty().parent(), None);
    }

    #[rstest]
    #[case(LogicalPath::empty(), true)]
    #[case(LogicalPath::from_folder("Game/Decks"), true)]
    #[case(LogicalPath::from_folder("Game/../outside"), false)]
    #[case(LogicalPath::relative([".."]), false)]
    #[case(LogicalPath::relative(["a", "."]), false)]
    #[case(LogicalPath::relative(["a", ""]), false)]
    fn test_is_normal(#[case] path: LogicalPath, #[case] expected: bool) {
        assert_eq!(path.is_normal(), expected);
    }

    #[test]
    fn test_serde_as_folder_string() {
        let path = rel("Game/Decks");
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, "\"Game/Decks\"");
        let parsed: LogicalPath = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, path);
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9 _-]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_combine_relativize_roundtrip(
            base in prop::collection::vec(segment(), 0..4),
            tail in prop::collection::vec(segment(), 0..4),
        ) {
            let ancestor = LogicalPath::empty().resolve(base.clone());
            let ancestor = LogicalPath { root: Some(PathRoot::Separator), ..ancestor };
            let path = ancestor.resolve(tail);

            let remainder = path.relativize(&ancestor).unwrap().unwrap();
            prop_assert_eq!(ancestor.combine(&remainder).unwrap(), path);
        }

        #[test]
        fn prop_delimited_roundtrip(segments in prop::collection::vec(segment(), 0..5)) {
            let path = LogicalPath::relative(segments);
            prop_assert_eq!(LogicalPath::from_folder(&path.to_folder()), path);
        }
    }
}

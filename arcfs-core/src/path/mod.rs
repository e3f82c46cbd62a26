use relative_path::{Component, RelativePath};
use std::borrow::Borrow;
use std::fmt;

mod error;

pub use self::error::IntoArchivePathError;

/// The separator used between components of an `ArchivePath`, matching the
/// separator stored in zip and squashfs entry names.
pub const PATH_ARCHIVE_SEP: &str = "/";

/// A cleaned, relative path inside an archive view.
///
/// Components are joined by `/`, never contain `.` or `..`, and there is no
/// leading or trailing separator. The empty path is the root of the view.
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArchivePath(pub(crate) String);

/// Splits `raw` into its surviving components: `.` and empty components are
/// dropped and `..` removes the previous component, never rising above the
/// root. Returns `None` if any component contains a control character.
pub fn sanitize(raw: &str) -> Option<Vec<&str>> {
    use unic_ucd_category::GeneralCategory;

    let mut out = vec![];

    for component in RelativePath::new(raw).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) if name.is_empty() => {}
            Component::Normal(name) => {
                if name
                    .chars()
                    .any(|c| GeneralCategory::of(c) == GeneralCategory::Control)
                {
                    return None;
                }
                out.push(name);
            }
        }
    }

    Some(out)
}

/// A raw archive name ending in a separator names a directory.
#[inline(always)]
pub fn is_directory_name(raw: &str) -> bool {
    raw.ends_with(PATH_ARCHIVE_SEP)
}

impl ArchivePath {
    pub fn new(raw: &str) -> std::result::Result<ArchivePath, IntoArchivePathError> {
        let out = sanitize(raw).ok_or(IntoArchivePathError::UnrepresentableStr)?;
        Ok(ArchivePath(out.join(PATH_ARCHIVE_SEP)))
    }

    /// Like `new`, but refuses paths that clean to the root.
    pub fn new_entry(raw: &str) -> std::result::Result<ArchivePath, IntoArchivePathError> {
        let path = Self::new(raw)?;
        if path.is_root() {
            return Err(IntoArchivePathError::EmptyPath);
        }
        Ok(path)
    }

    #[inline(always)]
    pub fn root() -> ArchivePath {
        ArchivePath(String::new())
    }

    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parent(&self) -> Option<ArchivePath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(PATH_ARCHIVE_SEP) {
            Some(idx) => Some(ArchivePath(self.0[..idx].to_string())),
            None => Some(ArchivePath::root()),
        }
    }

    /// The last component, or the empty string for the root.
    pub fn filename(&self) -> &str {
        match self.0.rfind(PATH_ARCHIVE_SEP) {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn join(&self, tail: &ArchivePath) -> ArchivePath {
        match (self.is_root(), tail.is_root()) {
            (true, _) => tail.clone(),
            (false, true) => self.clone(),
            (false, false) => ArchivePath(format!("{}{}{}", self.0, PATH_ARCHIVE_SEP, tail.0)),
        }
    }

    /// Every proper ancestor, nearest first, ending with the root.
    pub fn ancestors(&self) -> impl Iterator<Item = ArchivePath> {
        std::iter::successors(self.parent(), |x| x.parent())
    }

    /// Whole-component prefix match: `a/cd` does not start with `a/c`.
    pub fn starts_with(&self, other: &ArchivePath) -> bool {
        other.is_root()
            || self.0 == other.0
            || (self.0.starts_with(&other.0)
                && self.0[other.0.len()..].starts_with(PATH_ARCHIVE_SEP))
    }

    /// Re-expresses this path relative to `ancestor`, or `None` if it does not
    /// lie at or below it.
    pub fn strip_ancestor(&self, ancestor: &ArchivePath) -> Option<ArchivePath> {
        if !self.starts_with(ancestor) {
            return None;
        }
        if ancestor.is_root() {
            return Some(self.clone());
        }
        let rest = &self.0[ancestor.0.len()..];
        Some(ArchivePath(
            rest.trim_start_matches(PATH_ARCHIVE_SEP).to_string(),
        ))
    }
}

impl Borrow<str> for ArchivePath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an archive's entries land in the host tree.
///
/// Every entry name is first placed under `prefix`; only names at or below
/// `root` are kept, and they are re-expressed relative to `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootConfig {
    prefix: ArchivePath,
    root: ArchivePath,
}

impl RootConfig {
    pub fn new(prefix: &str, root: &str) -> std::result::Result<RootConfig, IntoArchivePathError> {
        Ok(RootConfig {
            prefix: ArchivePath::new(prefix)?,
            root: ArchivePath::new(root)?,
        })
    }

    #[inline(always)]
    pub fn prefix(&self) -> &ArchivePath {
        &self.prefix
    }

    #[inline(always)]
    pub fn root(&self) -> &ArchivePath {
        &self.root
    }

    /// Places an already cleaned entry name into the view.
    pub fn place(&self, cleaned: &ArchivePath) -> Option<ArchivePath> {
        self.prefix.join(cleaned).strip_ancestor(&self.root)
    }

    /// Cleans a raw entry name and places it into the view. `Ok(None)` means
    /// the entry lies outside the root.
    pub fn normalize(
        &self,
        raw: &str,
    ) -> std::result::Result<Option<ArchivePath>, IntoArchivePathError> {
        let cleaned = ArchivePath::new(raw)?;
        Ok(self.place(&cleaned))
    }

    /// The name a lone file is presented under when it is the root itself.
    pub fn single_object_name(&self) -> &str {
        if self.root.is_root() {
            self.prefix.filename()
        } else {
            self.root.filename()
        }
    }
}

//! Validated domain newtypes: bucket names, local paths, remote keys.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// A bucket's name: the last path segment of its local directory, with no
/// path separator of its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Validates and wraps a bucket name.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBucketName` if `name` is empty or
    /// contains a path separator.
    pub fn new(name: String) -> Result<Self, DomainError> {
        if name.is_empty() {
            return Err(DomainError::InvalidBucketName(
                "bucket name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(DomainError::InvalidBucketName(format!(
                "bucket name must not contain a path separator: {name}"
            )));
        }
        Ok(Self(name))
    }

    /// Derives a `BucketName` from the last segment of a directory path.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBucketName` if the path has no final
    /// segment (e.g. `/`).
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let segment = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                DomainError::InvalidBucketName(format!(
                    "path has no usable final segment: {}",
                    path.display()
                ))
            })?;
        Self::new(segment.to_string())
    }

    /// Returns the inner string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BucketName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BucketName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for BucketName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}

/// An absolute local filesystem path, normalized and free of `.`/`..`
/// components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct LocalPath(PathBuf);

impl LocalPath {
    /// Validates and normalizes a path.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLocalPath` if `path` is not absolute or
    /// escapes its root via `..`.
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidLocalPath(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        Ok(Self(Self::normalize(&path)?))
    }

    /// Returns this path relative to `root`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLocalPath` if this path does not lie
    /// under `root`.
    pub fn relative_to(&self, root: &LocalPath) -> Result<PathBuf, DomainError> {
        self.0.strip_prefix(&root.0).map(Path::to_path_buf).map_err(|_| {
            DomainError::InvalidLocalPath(format!(
                "{} is not within {}",
                self.0.display(),
                root.0.display()
            ))
        })
    }

    /// Returns `true` if this path lies under `root`.
    #[must_use]
    pub fn is_within(&self, root: &LocalPath) -> bool {
        self.0.starts_with(&root.0)
    }

    /// Returns the inner path reference.
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consumes this value, returning the inner `PathBuf`.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    fn normalize(path: &Path) -> Result<PathBuf, DomainError> {
        use std::path::Component;

        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push(std::path::MAIN_SEPARATOR.to_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidLocalPath(
                            "path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }
        Ok(normalized)
    }
}

impl Display for LocalPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for LocalPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<LocalPath> for PathBuf {
    fn from(path: LocalPath) -> Self {
        path.0
    }
}

impl AsRef<Path> for LocalPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// A remote object key: `/`-separated, no leading slash, URL-unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteKey(String);

impl RemoteKey {
    /// Validates and wraps a remote key.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRemoteKey` if `key` is empty, starts
    /// with `/`, or contains a `..` traversal segment.
    pub fn new(key: String) -> Result<Self, DomainError> {
        if key.is_empty() {
            return Err(DomainError::InvalidRemoteKey(
                "remote key cannot be empty".to_string(),
            ));
        }
        if key.starts_with('/') {
            return Err(DomainError::InvalidRemoteKey(format!(
                "remote key must not have a leading slash: {key}"
            )));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(DomainError::InvalidRemoteKey(format!(
                "remote key contains a traversal segment: {key}"
            )));
        }
        Ok(Self(key))
    }

    /// Derives the remote key for local file `file` relative to bucket root
    /// `bucket_root`: forward-slash separated, no leading slash.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRemoteKey` if `file` does not lie under
    /// `bucket_root`, or if the derived key is otherwise invalid.
    pub fn derive(file: &LocalPath, bucket_root: &LocalPath) -> Result<Self, DomainError> {
        let relative = file.relative_to(bucket_root).map_err(|_| {
            DomainError::InvalidRemoteKey(format!(
                "{} is not under bucket root {}",
                file, bucket_root
            ))
        })?;
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                std::path::Component::Normal(s) => {
                    segments.push(s.to_string_lossy().into_owned());
                }
                _ => {
                    return Err(DomainError::InvalidRemoteKey(format!(
                        "unexpected path component in {}",
                        relative.display()
                    )))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    /// Returns the inner string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteKey {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteKey> for String {
    fn from(key: RemoteKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod bucket_name_tests {
        use super::*;

        #[test]
        fn rejects_separator() {
            assert!(BucketName::new("a/b".to_string()).is_err());
        }

        #[test]
        fn from_path_takes_last_segment() {
            let name = BucketName::from_path(Path::new("/srv/root/b1")).unwrap();
            assert_eq!(name.as_str(), "b1");
        }

        #[test]
        fn rejects_empty() {
            assert!(BucketName::new(String::new()).is_err());
        }
    }

    mod local_path_tests {
        use super::*;

        #[test]
        fn rejects_relative() {
            assert!(LocalPath::new(PathBuf::from("relative/path")).is_err());
        }

        #[test]
        fn relative_to_root() {
            let root = LocalPath::new(PathBuf::from("/root/b1")).unwrap();
            let file = LocalPath::new(PathBuf::from("/root/b1/sub/a.bin")).unwrap();
            assert_eq!(file.relative_to(&root).unwrap(), PathBuf::from("sub/a.bin"));
        }

        #[test]
        fn is_within_false_for_sibling() {
            let root = LocalPath::new(PathBuf::from("/root/b1")).unwrap();
            let other = LocalPath::new(PathBuf::from("/root/b2/a.bin")).unwrap();
            assert!(!other.is_within(&root));
        }

        #[test]
        fn normalizes_parent_dir_within_bounds() {
            let path = LocalPath::new(PathBuf::from("/root/b1/./sub/../a.bin")).unwrap();
            assert_eq!(path.as_path(), Path::new("/root/b1/a.bin"));
        }

        #[test]
        fn escaping_root_via_parent_fails() {
            assert!(LocalPath::new(PathBuf::from("/..")).is_err());
        }
    }

    mod remote_key_tests {
        use super::*;

        #[test]
        fn rejects_leading_slash() {
            assert!(RemoteKey::new("/a.bin".to_string()).is_err());
        }

        #[test]
        fn rejects_traversal() {
            assert!(RemoteKey::new("sub/../a.bin".to_string()).is_err());
        }

        #[test]
        fn derive_strips_bucket_root() {
            let root = LocalPath::new(PathBuf::from("/root/b1")).unwrap();
            let file = LocalPath::new(PathBuf::from("/root/b1/sub/new.bin")).unwrap();
            let key = RemoteKey::derive(&file, &root).unwrap();
            assert_eq!(key.as_str(), "sub/new.bin");
        }

        #[test]
        fn derive_is_stable() {
            let root = LocalPath::new(PathBuf::from("/root/b1")).unwrap();
            let file = LocalPath::new(PathBuf::from("/root/b1/a.bin")).unwrap();
            let k1 = RemoteKey::derive(&file, &root).unwrap();
            let k2 = RemoteKey::derive(&file, &root).unwrap();
            assert_eq!(k1, k2);
        }
    }
}

use core::str::FromStr;

use alloc::fmt;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::{Error, ShortName};

/// An absolute path on the volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePath {
    /// Components of the path, not including separators (the `/` character).
    /// Empty for the root directory itself.
    pub components: Vec<FilePathComponent>,
}

impl FilePath {
    /// Parses `s`, which must start with `/`. Repeated and trailing
    /// separators produce no empty components.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if !s.starts_with('/') {
            return Err(Error::RelativePathRejected);
        }
        let components = s
            .split('/')
            .filter_map(FilePathComponent::new)
            .collect();
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }
}

/// A component of a file path. Notably, this cannot include the `/` character,
/// and is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePathComponent(String);

impl FilePathComponent {
    fn new(s: &str) -> Option<Self> {
        assert!(
            !s.contains('/'),
            "constructed FilePathComponent with '/': {s}"
        );
        if s.is_empty() {
            None
        } else {
            Some(Self(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short_name(&self) -> ShortName {
        ShortName::from_segment(&self.0)
    }
}

impl fmt::Display for FilePathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FilePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

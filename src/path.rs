//! Textual namespace paths.
//!
//! A path is an optional leading `/` (rooted), zero or more `name/`
//! segments, and optionally a trailing bare name which makes the path
//! class-terminal. `/test/namespace/` names a namespace,
//! `/test/namespace/Thing` names a class inside it.

use lazy_static::lazy_static;
use regex::Regex;
use std::error::Error as StdError;
use std::fmt;

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new("^[A-Za-z_$][A-Za-z_$0-9]*$").unwrap();
    static ref PATH_REGEX: Regex =
        Regex::new("^(/?(?:[A-Za-z_$][A-Za-z_$0-9]*/)*)([A-Za-z_$][A-Za-z_$0-9]*)?$").unwrap();
}

/// Rejected namespace/class path or name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Invalid(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::Invalid(path) => write!(f, "invalid namespace path: {path:?}"),
        }
    }
}

impl StdError for PathError {}

/// A parsed, validated path through the namespace hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePath {
    rooted: bool,
    namespace: bool,
    components: Vec<String>,
}

impl NamespacePath {
    /// The rooted path of the root namespace itself.
    pub fn root() -> Self {
        NamespacePath {
            rooted: true,
            namespace: true,
            components: Vec::new(),
        }
    }

    /// Parse a textual path against the grammar.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let captures = PATH_REGEX
            .captures(path)
            .ok_or_else(|| PathError::Invalid(path.to_string()))?;

        let namespace_part = captures.get(1).map_or("", |m| m.as_str());
        let class_name = captures
            .get(2)
            .map(|m| m.as_str())
            .filter(|name| !name.is_empty());

        let mut components: Vec<String> = namespace_part
            .split('/')
            .filter(|component| !component.is_empty())
            .map(str::to_string)
            .collect();
        let namespace = class_name.is_none();
        if let Some(name) = class_name {
            components.push(name.to_string());
        }

        Ok(NamespacePath {
            rooted: path.starts_with('/'),
            namespace,
            components,
        })
    }

    /// Assemble a path from already-validated parts (used when walking the
    /// namespace tree up to its root).
    pub(crate) fn from_parts(rooted: bool, namespace: bool, components: Vec<String>) -> Self {
        NamespacePath {
            rooted,
            namespace,
            components,
        }
    }

    /// Whether `name` is a valid single name component.
    pub fn is_name_valid(name: &str) -> bool {
        NAME_REGEX.is_match(name)
    }

    /// Whether `path` matches the full path grammar.
    pub fn is_path_valid(path: &str) -> bool {
        PATH_REGEX.is_match(path)
    }

    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// True when the path denotes a namespace; false when its final
    /// component is a class name.
    pub fn is_namespace(&self) -> bool {
        self.namespace
    }

    pub fn is_rooted(&self) -> bool {
        self.rooted
    }

    /// Render the path with a leading slash per component and a trailing
    /// slash for namespaces.
    pub fn fully_qualified(&self) -> String {
        let mut path = String::new();
        for component in &self.components {
            path.push('/');
            path.push_str(component);
        }
        if self.namespace {
            path.push('/');
        }
        path
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rooted_namespace_path() {
        let path = NamespacePath::parse("/test/namespace/").unwrap();
        assert!(path.is_rooted());
        assert!(path.is_namespace());
        assert_eq!(path.components(), ["test", "namespace"]);
        assert_eq!(path.depth(), 2);
    }

    #[test]
    fn parses_relative_class_path() {
        let path = NamespacePath::parse("test/Thing").unwrap();
        assert!(!path.is_rooted());
        assert!(!path.is_namespace());
        assert_eq!(path.components(), ["test", "Thing"]);
    }

    #[test]
    fn bare_name_is_class_terminal() {
        let path = NamespacePath::parse("Thing").unwrap();
        assert!(!path.is_rooted());
        assert!(!path.is_namespace());
        assert_eq!(path.depth(), 1);
    }

    #[test]
    fn root_and_empty_paths() {
        let root = NamespacePath::parse("/").unwrap();
        assert!(root.is_rooted());
        assert!(root.is_namespace());
        assert_eq!(root.depth(), 0);
        assert_eq!(root, NamespacePath::root());

        let relative = NamespacePath::parse("").unwrap();
        assert!(!relative.is_rooted());
        assert!(relative.is_namespace());
        assert_eq!(relative.depth(), 0);
    }

    #[test]
    fn rejects_bad_paths() {
        for bad in ["*", "//test", "/te st", "9abc", "a//b", "a b/c"] {
            assert!(
                NamespacePath::parse(bad).is_err(),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn name_validation() {
        for good in ["Thing", "_private", "$gen", "a9", "A_b$3"] {
            assert!(NamespacePath::is_name_valid(good), "{good:?}");
        }
        for bad in ["", "9a", "a b", "a/b", "a-b"] {
            assert!(!NamespacePath::is_name_valid(bad), "{bad:?}");
        }
    }

    #[test]
    fn fully_qualified_rendering() {
        assert_eq!(
            NamespacePath::parse("/test/namespace/")
                .unwrap()
                .fully_qualified(),
            "/test/namespace/"
        );
        assert_eq!(
            NamespacePath::parse("test/Thing").unwrap().fully_qualified(),
            "/test/Thing"
        );
        assert_eq!(NamespacePath::root().fully_qualified(), "/");
    }
}

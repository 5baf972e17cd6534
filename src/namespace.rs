//! The namespace tree: namespaces and classes resolved by path.
//!
//! The tree is an arena: every node lives in a flat table owned by the tree
//! and its handle is just its index in that table. Handle 0 is the root
//! namespace. A parent namespace owns its children through the table and
//! indexes them by lowercased name; a child keeps a non-owning handle back
//! to its parent. Removing a node leaves an explicit empty slot behind, so
//! handles are stable for a node's whole lifetime and a removed node's
//! handle can never resolve to some later node.
//!
//! No locking: a tree expects a single writer.

use crate::classfile::ClassFile;
use crate::path::NamespacePath;
use indexmap::IndexMap;
use log::debug;
use std::error::Error as StdError;
use std::fmt;

/// Stable integer identifying a node within its tree.
pub type Handle = u64;

/// Errors raised by tree queries and mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// Handle outside the table, or pointing at a removed node.
    UnknownHandle(Handle),
    /// A path step tried to descend through a class node.
    NotANamespace(Handle),
    /// A class-file operation was applied to a namespace node.
    NotAClass(Handle),
    /// An insert collided with an existing sibling of that name.
    DuplicateName(String),
    /// The root namespace cannot be removed.
    RootRemoval,
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceError::UnknownHandle(handle) => {
                write!(f, "handle {handle} does not name a live node")
            }
            NamespaceError::NotANamespace(handle) => {
                write!(f, "node {handle} is not a namespace")
            }
            NamespaceError::NotAClass(handle) => write!(f, "node {handle} is not a class"),
            NamespaceError::DuplicateName(name) => {
                write!(f, "a sibling named {name:?} already exists")
            }
            NamespaceError::RootRemoval => write!(f, "the root namespace cannot be removed"),
        }
    }
}

impl StdError for NamespaceError {}

#[derive(Debug)]
enum NodeKind {
    Namespace {
        subspaces: IndexMap<String, Handle>,
        classes: IndexMap<String, Handle>,
    },
    Class {
        class_file: Option<ClassFile>,
    },
}

/// One node of the tree: a namespace or a class.
#[derive(Debug)]
pub struct Node {
    name: String,
    parent: Option<Handle>,
    kind: NodeKind,
}

impl Node {
    /// The node's name with its original case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning parent; `None` only for the root.
    pub fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub fn is_namespace(&self) -> bool {
        matches!(self.kind, NodeKind::Namespace { .. })
    }
}

fn empty_namespace(name: &str, parent: Option<Handle>) -> Node {
    Node {
        name: name.to_string(),
        parent,
        kind: NodeKind::Namespace {
            subspaces: IndexMap::new(),
            classes: IndexMap::new(),
        },
    }
}

/// A namespace hierarchy rooted at handle 0.
///
/// Trees are independent values; there is no process-wide tree.
#[derive(Debug)]
pub struct NamespaceTree {
    nodes: Vec<Option<Node>>,
}

impl Default for NamespaceTree {
    fn default() -> Self {
        NamespaceTree::new()
    }
}

impl NamespaceTree {
    /// A fresh tree holding only its root namespace.
    pub fn new() -> Self {
        NamespaceTree {
            nodes: vec![Some(empty_namespace("", None))],
        }
    }

    /// Handle of the root namespace.
    pub fn root(&self) -> Handle {
        0
    }

    /// Number of handle-table slots, live or removed.
    pub fn handle_count(&self) -> u64 {
        self.nodes.len() as u64
    }

    /// Look up a live node by handle.
    pub fn node(&self, handle: Handle) -> Result<&Node, NamespaceError> {
        self.nodes
            .get(handle as usize)
            .and_then(Option::as_ref)
            .ok_or(NamespaceError::UnknownHandle(handle))
    }

    fn node_mut(&mut self, handle: Handle) -> Result<&mut Node, NamespaceError> {
        self.nodes
            .get_mut(handle as usize)
            .and_then(Option::as_mut)
            .ok_or(NamespaceError::UnknownHandle(handle))
    }

    fn tables(
        &self,
        handle: Handle,
    ) -> Result<(&IndexMap<String, Handle>, &IndexMap<String, Handle>), NamespaceError> {
        match &self.node(handle)?.kind {
            NodeKind::Namespace { subspaces, classes } => Ok((subspaces, classes)),
            NodeKind::Class { .. } => Err(NamespaceError::NotANamespace(handle)),
        }
    }

    pub fn subspace_count(&self, handle: Handle) -> Result<usize, NamespaceError> {
        self.tables(handle).map(|(subspaces, _)| subspaces.len())
    }

    pub fn class_count(&self, handle: Handle) -> Result<usize, NamespaceError> {
        self.tables(handle).map(|(_, classes)| classes.len())
    }

    /// Whether the namespace already holds a subspace or class with this
    /// name, compared case-insensitively.
    pub fn contains_child(&self, handle: Handle, name: &str) -> Result<bool, NamespaceError> {
        let key = name.to_ascii_lowercase();
        let (subspaces, classes) = self.tables(handle)?;
        Ok(subspaces.contains_key(&key) || classes.contains_key(&key))
    }

    /// The class file attached to a class node, if any.
    pub fn class_file(&self, handle: Handle) -> Result<Option<&ClassFile>, NamespaceError> {
        match &self.node(handle)?.kind {
            NodeKind::Class { class_file } => Ok(class_file.as_ref()),
            NodeKind::Namespace { .. } => Err(NamespaceError::NotAClass(handle)),
        }
    }

    /// Attach a class file to a class node, replacing any previous one.
    pub fn set_class_file(
        &mut self,
        handle: Handle,
        file: ClassFile,
    ) -> Result<(), NamespaceError> {
        match &mut self.node_mut(handle)?.kind {
            NodeKind::Class { class_file } => {
                *class_file = Some(file);
                Ok(())
            }
            NodeKind::Namespace { .. } => Err(NamespaceError::NotAClass(handle)),
        }
    }

    /// Resolve a path from `from` (or from the root, for rooted paths)
    /// without creating anything. A missing component is `Ok(None)`.
    pub fn find(
        &self,
        from: Handle,
        path: &NamespacePath,
    ) -> Result<Option<Handle>, NamespaceError> {
        self.node(from)?;
        let mut current = if path.is_rooted() { self.root() } else { from };

        let depth = path.depth();
        for (step, name) in path.components().iter().enumerate() {
            let key = name.to_ascii_lowercase();
            let (subspaces, classes) = self.tables(current)?;
            let table = if step + 1 == depth && !path.is_namespace() {
                classes
            } else {
                subspaces
            };
            match table.get(&key) {
                Some(child) => current = *child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Resolve a path, creating missing namespaces along the way and a
    /// missing terminal namespace or class, per the path's terminal flag.
    pub fn find_or_create(
        &mut self,
        from: Handle,
        path: &NamespacePath,
    ) -> Result<Handle, NamespaceError> {
        self.node(from)?;
        let mut current = if path.is_rooted() { self.root() } else { from };

        let depth = path.depth();
        for (step, name) in path.components().iter().enumerate() {
            let class_terminal = step + 1 == depth && !path.is_namespace();
            let key = name.to_ascii_lowercase();
            let (subspaces, classes) = self.tables(current)?;
            let existing = if class_terminal {
                classes.get(&key).copied()
            } else {
                subspaces.get(&key).copied()
            };
            current = match existing {
                Some(child) => child,
                None if class_terminal => self.insert_class(current, name)?,
                None => self.insert_namespace(current, name)?,
            };
        }
        Ok(current)
    }

    /// Create a namespace under `parent`. The stored name keeps its case;
    /// the parent indexes it lowercased.
    pub fn insert_namespace(
        &mut self,
        parent: Handle,
        name: &str,
    ) -> Result<Handle, NamespaceError> {
        self.insert_node(parent, empty_namespace(name, Some(parent)), false)
    }

    /// Create a class under `parent` with no class file attached yet.
    pub fn insert_class(&mut self, parent: Handle, name: &str) -> Result<Handle, NamespaceError> {
        let node = Node {
            name: name.to_string(),
            parent: Some(parent),
            kind: NodeKind::Class { class_file: None },
        };
        self.insert_node(parent, node, true)
    }

    fn insert_node(
        &mut self,
        parent: Handle,
        node: Node,
        class: bool,
    ) -> Result<Handle, NamespaceError> {
        if self.contains_child(parent, &node.name)? {
            return Err(NamespaceError::DuplicateName(node.name));
        }
        let key = node.name.to_ascii_lowercase();
        let name = node.name.clone();
        let handle = self.nodes.len() as Handle;
        self.nodes.push(Some(node));
        match &mut self.node_mut(parent)?.kind {
            NodeKind::Namespace { subspaces, classes } => {
                if class {
                    classes.insert(key, handle);
                } else {
                    subspaces.insert(key, handle);
                }
            }
            // contains_child already proved the parent is a namespace.
            NodeKind::Class { .. } => return Err(NamespaceError::NotANamespace(parent)),
        }
        debug!(
            "created {} {:?} with handle {}",
            if class { "class" } else { "namespace" },
            name,
            handle
        );
        Ok(handle)
    }

    /// Unlink a node from its parent and remove its whole subtree. The
    /// vacated handle slots are never reused.
    pub fn remove(&mut self, handle: Handle) -> Result<(), NamespaceError> {
        let node = self.node(handle)?;
        let Some(parent) = node.parent else {
            return Err(NamespaceError::RootRemoval);
        };
        let key = node.name.to_ascii_lowercase();
        let class = !node.is_namespace();

        if let NodeKind::Namespace { subspaces, classes } = &mut self.node_mut(parent)?.kind {
            if class {
                classes.shift_remove(&key);
            } else {
                subspaces.shift_remove(&key);
            }
        }
        self.tombstone(handle);
        Ok(())
    }

    fn tombstone(&mut self, handle: Handle) {
        let Some(slot) = self.nodes.get_mut(handle as usize) else {
            return;
        };
        let Some(node) = slot.take() else {
            return;
        };
        debug!("removed {:?} (handle {})", node.name, handle);
        if let NodeKind::Namespace { subspaces, classes } = node.kind {
            for (_, child) in subspaces {
                self.tombstone(child);
            }
            for (_, child) in classes {
                self.tombstone(child);
            }
        }
    }

    /// The rooted path of a node, built by walking its parent links.
    pub fn path_of(&self, handle: Handle) -> Result<NamespacePath, NamespaceError> {
        let namespace = self.node(handle)?.is_namespace();
        let mut components = Vec::new();
        let mut current = handle;
        while let Some(parent) = self.node(current)?.parent() {
            components.push(self.node(current)?.name().to_string());
            current = parent;
        }
        components.reverse();
        Ok(NamespacePath::from_parts(true, namespace, components))
    }

    /// The fully qualified textual path of a node, for diagnostics.
    pub fn fully_qualified(&self, handle: Handle) -> Result<String, NamespaceError> {
        self.path_of(handle).map(|path| path.fully_qualified())
    }
}

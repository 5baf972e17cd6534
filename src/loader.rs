//! The class loader: from a byte stream to a linked class node.

use crate::classfile::{ClassFile, ClassLoadError};
use crate::namespace::{Handle, NamespaceTree};
use crate::path::{NamespacePath, PathError};
use log::{debug, info};
use std::io::{Cursor, Read};

/// Loads class files and links them into its own namespace tree.
pub struct ClassLoader {
    tree: NamespaceTree,
}

impl Default for ClassLoader {
    fn default() -> Self {
        ClassLoader::new()
    }
}

impl ClassLoader {
    pub fn new() -> Self {
        ClassLoader {
            tree: NamespaceTree::new(),
        }
    }

    pub fn tree(&self) -> &NamespaceTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut NamespaceTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> NamespaceTree {
        self.tree
    }

    /// Read one class file from the stream and link it into the tree,
    /// returning the handle of the new class node.
    pub fn load(&mut self, stream: &mut impl Read) -> Result<Handle, ClassLoadError> {
        let mut file = ClassFile::new();
        file.input(stream)?;
        self.link(file)
    }

    /// Load a class file held in memory.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<Handle, ClassLoadError> {
        self.load(&mut Cursor::new(bytes))
    }

    /// Validate a parsed class file's namespace and name literals and link a
    /// new class node. The node is only created once every check has passed,
    /// so a failed load registers nothing.
    pub fn link(&mut self, file: ClassFile) -> Result<Handle, ClassLoadError> {
        let namespace_text = file.literal_string(file.class_format.namespace_index)?;
        let class_name = file.literal_string(file.class_format.name_index)?;
        debug!("linking class {class_name:?} into {namespace_text:?}");

        let path = NamespacePath::parse(&namespace_text)?;
        if !path.is_namespace() {
            return Err(ClassLoadError::Malformed(format!(
                "namespace literal {namespace_text:?} does not name a namespace"
            )));
        }
        if !NamespacePath::is_name_valid(&class_name) {
            return Err(ClassLoadError::InvalidPath(PathError::Invalid(class_name)));
        }

        let root = self.tree.root();
        let namespace = self.tree.find_or_create(root, &path)?;
        if self.tree.contains_child(namespace, &class_name)? {
            return Err(ClassLoadError::DuplicateClass(class_name));
        }

        let class = self.tree.insert_class(namespace, &class_name)?;
        self.tree.set_class_file(class, file)?;
        info!(
            "loaded class {} (handle {})",
            self.tree.fully_qualified(class)?,
            class
        );
        Ok(class)
    }
}

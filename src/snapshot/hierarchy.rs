//! Hierarchy snapshot model
//!
//! The tree handed to the hierarchy-display side. Grouping and formatting of attributes
//! is the display side's business; this module only fixes the shape that crosses the
//! wire.

use crate::core::value::AttrValue;
use crate::object::Oid;
use serde::{Deserialize, Serialize};

/// A captured view of the object graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HierarchySnapshot {
    /// Version of the target-side server that produced the snapshot
    pub server_version: String,
    /// Root items
    pub items: Vec<DisplayItem>,
}

impl HierarchySnapshot {
    /// Depth of the deepest item, 0 for an empty snapshot
    pub fn depth(&self) -> usize {
        self.items.iter().map(DisplayItem::depth).max().unwrap_or(0)
    }

    /// Total number of items in the tree
    pub fn item_count(&self) -> usize {
        self.items.iter().map(DisplayItem::item_count).sum()
    }

    /// Depth-first search for an item by OID
    pub fn find(&self, oid: Oid) -> Option<&DisplayItem> {
        self.items.iter().find_map(|item| item.find(oid))
    }
}

/// One object in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub oid: Oid,
    pub class_name: String,
    pub attributes: Vec<AttributesGroup>,
    pub children: Vec<DisplayItem>,
}

impl DisplayItem {
    // Iterative so hostile inputs cannot overflow the stack
    fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((item, level)) = stack.pop() {
            max = max.max(level);
            stack.extend(item.children.iter().map(|child| (child, level + 1)));
        }
        max
    }

    fn item_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(item) = stack.pop() {
            count += 1;
            stack.extend(item.children.iter());
        }
        count
    }

    fn find(&self, oid: Oid) -> Option<&DisplayItem> {
        let mut stack = vec![self];
        while let Some(item) = stack.pop() {
            if item.oid == oid {
                return Some(item);
            }
            stack.extend(item.children.iter());
        }
        None
    }

    /// Look up an attribute value by identifier across all groups
    pub fn attribute(&self, identifier: &str) -> Option<&AttrValue> {
        self.attributes
            .iter()
            .flat_map(|group| group.sections.iter())
            .flat_map(|section| section.attributes.iter())
            .find(|attribute| attribute.identifier == identifier)
            .map(|attribute| &attribute.value)
    }
}

/// Top-level grouping of attributes, e.g. "Layout" or "Visibility"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributesGroup {
    pub identifier: String,
    pub sections: Vec<AttributesSection>,
}

impl AttributesGroup {
    /// Group holding a single section of the same name
    pub fn single(identifier: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        let identifier = identifier.into();
        Self {
            sections: vec![AttributesSection {
                identifier: identifier.clone(),
                attributes,
            }],
            identifier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributesSection {
    pub identifier: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub identifier: String,
    pub value: AttrValue,
}

impl Attribute {
    pub fn new(identifier: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self {
            identifier: identifier.into(),
            value: value.into(),
        }
    }
}

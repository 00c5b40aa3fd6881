//! Statically declared attribute descriptors.
//!
//! Instead of discovering persisted attributes through runtime reflection,
//! every entity type declares a static [`EntityDef`] table: one level per
//! type in its hierarchy, linked most-derived to base through `parent`.
//! Query derivation, record building, and the storage engine all walk
//! these tables.

use crate::value::Value;

/// The kind of a declared attribute.
///
/// The kind decides how query-by-example treats the attribute: text gets
/// pattern predicates, array and relation kinds are never inspected, and
/// everything else gets equality predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttrKind {
    /// Signed integer.
    Int,
    /// Floating-point number.
    Float,
    /// Boolean.
    Bool,
    /// Text string; pattern-matched in query-by-example.
    Text,
    /// Point in time.
    Timestamp,
    /// Enumeration, stored as its integer discriminant.
    Enum,
    /// To-one reference, stored as the target row key.
    Reference,
    /// Array of values; excluded from query-by-example.
    Array,
    /// To-many relationship; declared for completeness, never stored on
    /// the owning record and excluded from query-by-example.
    Relation,
}

impl AttrKind {
    /// Whether a runtime value has the shape this kind declares.
    ///
    /// Null is admissible everywhere since any attribute may be unset.
    /// A mismatch here means the descriptor table and the accessor
    /// disagree, which callers treat as a metadata inconsistency.
    #[must_use]
    pub fn admits(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            AttrKind::Int | AttrKind::Enum | AttrKind::Reference => {
                matches!(value, Value::Int(_))
            }
            AttrKind::Float => matches!(value, Value::Float(_)),
            AttrKind::Bool => matches!(value, Value::Bool(_)),
            AttrKind::Text => matches!(value, Value::Text(_)),
            AttrKind::Timestamp => matches!(value, Value::Timestamp(_)),
            AttrKind::Array => matches!(value, Value::Array(_)),
            AttrKind::Relation => false,
        }
    }

    /// Whether query-by-example may inspect attributes of this kind.
    #[must_use]
    pub fn example_eligible(self) -> bool {
        !matches!(self, AttrKind::Array | AttrKind::Relation)
    }
}

/// A single declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrDef {
    /// Attribute name as stored and queried.
    pub name: &'static str,
    /// Declared kind.
    pub kind: AttrKind,
}

impl AttrDef {
    /// Creates an attribute descriptor.
    #[must_use]
    pub const fn new(name: &'static str, kind: AttrKind) -> Self {
        Self { name, kind }
    }
}

/// One level of an entity type's descriptor chain.
///
/// A hierarchy declares one `EntityDef` per type; subtype levels link to
/// their base through `parent`. Only the root level names the identity
/// attribute. All rows of a hierarchy live in the root's table, tagged
/// with their concrete level name.
#[derive(Debug)]
pub struct EntityDef {
    /// Storage-visible type name; also the tag for rows of this level.
    pub name: &'static str,
    /// Base level, if this is a subtype.
    pub parent: Option<&'static EntityDef>,
    /// Identity attribute name; set on the root level only.
    pub key_attr: Option<&'static str>,
    /// Attributes declared at this level (not inherited ones).
    pub declared: &'static [AttrDef],
}

impl EntityDef {
    /// Iterates the chain from this level to the root.
    pub fn chain(&'static self) -> ChainIter {
        ChainIter { next: Some(self) }
    }

    /// The root level of this hierarchy.
    #[must_use]
    pub fn root(&'static self) -> &'static EntityDef {
        let mut def = self;
        while let Some(parent) = def.parent {
            def = parent;
        }
        def
    }

    /// The identity attribute name, resolved at the root level.
    #[must_use]
    pub fn key_attribute(&'static self) -> Option<&'static str> {
        self.root().key_attr
    }

    /// Whether this level is `ancestor` or descends from it.
    #[must_use]
    pub fn extends(&'static self, ancestor: &str) -> bool {
        self.chain().any(|level| level.name == ancestor)
    }

    /// Looks an attribute up across the chain, most-derived level first.
    #[must_use]
    pub fn attr(&'static self, name: &str) -> Option<&'static AttrDef> {
        self.chain()
            .flat_map(|level| level.declared.iter())
            .find(|attr| attr.name == name)
    }
}

/// Iterator over a descriptor chain, most-derived level first.
#[derive(Debug, Clone)]
pub struct ChainIter {
    next: Option<&'static EntityDef>,
}

impl Iterator for ChainIter {
    type Item = &'static EntityDef;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent;
        Some(current)
    }
}

/// Read access to one attribute of an entity value.
///
/// The accessor table is the static replacement for field/getter probing:
/// a declared attribute with no accessor entry simply cannot be read from
/// a sample, and query-by-example skips it silently.
pub struct Accessor<T> {
    /// Attribute name this accessor reads.
    pub attr: &'static str,
    /// Reads the attribute off an instance.
    pub read: fn(&T) -> Value,
}

impl<T> Accessor<T> {
    /// Creates an accessor.
    #[must_use]
    pub const fn new(attr: &'static str, read: fn(&T) -> Value) -> Self {
        Self { attr, read }
    }
}

impl<T> std::fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessor").field("attr", &self.attr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE: EntityDef = EntityDef {
        name: "Base",
        parent: None,
        key_attr: Some("id"),
        declared: &[
            AttrDef::new("label", AttrKind::Text),
            AttrDef::new("tags", AttrKind::Array),
        ],
    };

    static LEAF: EntityDef = EntityDef {
        name: "Leaf",
        parent: Some(&BASE),
        key_attr: None,
        declared: &[AttrDef::new("rank", AttrKind::Int)],
    };

    #[test]
    fn chain_walks_most_derived_first() {
        let names: Vec<_> = LEAF.chain().map(|d| d.name).collect();
        assert_eq!(names, vec!["Leaf", "Base"]);
    }

    #[test]
    fn root_and_key_attribute() {
        assert_eq!(LEAF.root().name, "Base");
        assert_eq!(LEAF.key_attribute(), Some("id"));
        assert_eq!(BASE.key_attribute(), Some("id"));
    }

    #[test]
    fn extends_covers_self_and_ancestors() {
        assert!(LEAF.extends("Leaf"));
        assert!(LEAF.extends("Base"));
        assert!(!BASE.extends("Leaf"));
    }

    #[test]
    fn attr_lookup_spans_levels() {
        assert_eq!(LEAF.attr("rank").map(|a| a.kind), Some(AttrKind::Int));
        assert_eq!(LEAF.attr("label").map(|a| a.kind), Some(AttrKind::Text));
        assert!(LEAF.attr("missing").is_none());
    }

    #[test]
    fn kind_admits_values() {
        assert!(AttrKind::Int.admits(&Value::Int(1)));
        assert!(AttrKind::Int.admits(&Value::Null));
        assert!(!AttrKind::Int.admits(&Value::Text("1".to_string())));
        assert!(AttrKind::Enum.admits(&Value::Int(2)));
        assert!(!AttrKind::Relation.admits(&Value::Int(2)));
    }

    #[test]
    fn example_eligibility() {
        assert!(AttrKind::Text.example_eligible());
        assert!(AttrKind::Reference.example_eligible());
        assert!(!AttrKind::Array.example_eligible());
        assert!(!AttrKind::Relation.example_eligible());
    }
}

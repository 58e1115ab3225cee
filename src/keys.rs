use crate::models::PropertyType;
use std::collections::HashMap;
use tracing::debug;

/// A property key declaration from a `<key>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeclaration {
    pub name: String,
    pub ty: PropertyType,
}

/// Run-scoped registry of property keys declared by `<key>` elements.
///
/// The registry is append/overwrite-only: a re-declared id replaces the
/// earlier entry, nothing is ever removed. Lookups for ids that were never
/// declared fall back to type string and to the id itself as the name, so a
/// `<data>` element may legally reference an undeclared key.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: HashMap<String, KeyDeclaration>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key declaration, overwriting any earlier one for the id.
    /// A missing `attr.name` defaults the display name to the id.
    pub fn register(&mut self, id: &str, name: Option<&str>, ty: PropertyType) {
        let name = name.unwrap_or(id).to_string();
        debug!(key = id, name = %name, code = ty.code(), "Registered property key");
        self.keys
            .insert(id.to_string(), KeyDeclaration { name, ty });
    }

    /// Declared type for a key id; string when never declared.
    pub fn resolve_type(&self, id: &str) -> PropertyType {
        self.keys.get(id).map(|k| k.ty).unwrap_or_default()
    }

    /// Display name for a key id; the id itself when never declared.
    pub fn resolve_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.keys.get(id).map(|k| k.name.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

use serde::Serialize;

/// Declared property type from a GraphML `<key attr.type="...">` element.
///
/// The numeric codes are the ones the destination vertex/edge tables store in
/// their type column (boolean is 6, there is no code 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyType {
    #[default]
    Str,
    Int,
    Float,
    Double,
    Boolean,
    Long,
}

impl PropertyType {
    /// Map an `attr.type` attribute to a type. Absent or unrecognized values
    /// fall back to string; `"integer"` is accepted as an alias of `"int"`.
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr {
            Some("int") | Some("integer") => PropertyType::Int,
            Some("float") => PropertyType::Float,
            Some("double") => PropertyType::Double,
            Some("boolean") => PropertyType::Boolean,
            Some("long") => PropertyType::Long,
            _ => PropertyType::Str,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            PropertyType::Str => 1,
            PropertyType::Int => 2,
            PropertyType::Float => 3,
            PropertyType::Double => 4,
            PropertyType::Boolean => 6,
            PropertyType::Long => 7,
        }
    }
}

/// A property value after casting through its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    Int(i32),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Long(i64),
}

impl PropertyValue {
    pub fn type_code(&self) -> i64 {
        match self {
            PropertyValue::Str(_) => PropertyType::Str.code(),
            PropertyValue::Int(_) => PropertyType::Int.code(),
            PropertyValue::Float(_) => PropertyType::Float.code(),
            PropertyValue::Double(_) => PropertyType::Double.code(),
            PropertyValue::Boolean(_) => PropertyType::Boolean.code(),
            PropertyValue::Long(_) => PropertyType::Long.code(),
        }
    }

    /// True for the types that also populate the numeric value column.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PropertyValue::Int(_)
                | PropertyValue::Float(_)
                | PropertyValue::Double(_)
                | PropertyValue::Long(_)
        )
    }

    /// Render the value back to its column string form. Numeric rendering is
    /// locale-independent (always a decimal point).
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Str(s) => s.clone(),
            PropertyValue::Int(v) => v.to_string(),
            PropertyValue::Float(v) => v.to_string(),
            PropertyValue::Double(v) => v.to_string(),
            PropertyValue::Boolean(v) => v.to_string(),
            PropertyValue::Long(v) => v.to_string(),
        }
    }
}

fn upsert(properties: &mut Vec<(String, PropertyValue)>, name: String, value: PropertyValue) {
    if let Some(slot) = properties.iter_mut().find(|(k, _)| *k == name) {
        slot.1 = value;
    } else {
        properties.push((name, value));
    }
}

/// A vertex accumulated while its `<node>` element is open.
///
/// Properties keep insertion order; writing the same key twice overwrites the
/// earlier value in place.
#[derive(Debug, Clone)]
pub struct VertexRecord {
    pub id: i64,
    pub label: Option<String>,
    pub properties: Vec<(String, PropertyValue)>,
}

impl VertexRecord {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            label: None,
            properties: Vec::new(),
        }
    }

    pub fn set_property(&mut self, name: String, value: PropertyValue) {
        upsert(&mut self.properties, name, value);
    }
}

/// An edge accumulated while its `<edge>` element is open.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub id: i64,
    pub source: i64,
    pub target: i64,
    pub label: Option<String>,
    pub properties: Vec<(String, PropertyValue)>,
}

impl EdgeRecord {
    pub fn new(id: i64, source: i64, target: i64) -> Self {
        Self {
            id,
            source,
            target,
            label: None,
            properties: Vec::new(),
        }
    }

    pub fn set_property(&mut self, name: String, value: PropertyValue) {
        upsert(&mut self.properties, name, value);
    }
}

/// One row of the destination vertex table: one property of one vertex, or a
/// fully-null property when the vertex carries none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertexRow {
    pub vid: i64,
    pub label: String,
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub type_code: Option<i64>,
    pub value: Option<String>,
    pub numeric_value: Option<String>,
}

/// One row of the destination edge table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeRow {
    pub eid: i64,
    pub svid: i64,
    pub dvid: i64,
    pub label: String,
    pub key: Option<String>,
    #[serde(rename = "type")]
    pub type_code: Option<i64>,
    pub value: Option<String>,
    pub numeric_value: Option<String>,
}

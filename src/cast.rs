use crate::models::{PropertyType, PropertyValue};
use anyhow::{Context, Result};

/// Cast raw GraphML text through a declared type.
///
/// Numeric parsing is locale-independent (decimal point only). A malformed
/// numeric literal fails the cast -- and with it the run -- since it signals
/// a corrupt source file, not a value to skip.
///
/// Boolean accepts case-insensitive "true"; any other text yields `false`.
/// That looseness matches the source exports this tool consumes and is kept
/// deliberately, so `cast` never fails for booleans.
pub fn cast(ty: PropertyType, raw: &str) -> Result<PropertyValue> {
    match ty {
        PropertyType::Str => Ok(PropertyValue::Str(raw.to_string())),
        PropertyType::Int => raw
            .parse::<i32>()
            .map(PropertyValue::Int)
            .with_context(|| format!("Invalid int literal: {raw:?}")),
        PropertyType::Float => raw
            .parse::<f32>()
            .map(PropertyValue::Float)
            .with_context(|| format!("Invalid float literal: {raw:?}")),
        PropertyType::Double => raw
            .parse::<f64>()
            .map(PropertyValue::Double)
            .with_context(|| format!("Invalid double literal: {raw:?}")),
        PropertyType::Boolean => Ok(PropertyValue::Boolean(raw.eq_ignore_ascii_case("true"))),
        PropertyType::Long => raw
            .parse::<i64>()
            .map(PropertyValue::Long)
            .with_context(|| format!("Invalid long literal: {raw:?}")),
    }
}

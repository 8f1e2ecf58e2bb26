//! Dotted property paths and the null-safe accessor.
//!
//! A path names a location inside a model graph: dotted segments traverse
//! nested [`Value::Object`] fields, `[n]` indexes into a list field, and
//! `("key")` looks up an entry of a map field. Paths are parsed once, at
//! binding time, so malformed paths surface as [`LoomError::InvalidPath`]
//! before any copy runs.
//!
//! Reads are null-safe: a null value anywhere before the final segment
//! stops the traversal and yields `Value::Null` instead of an error.
//! A failure to resolve the final segment (missing field, index out of
//! bounds, accessor on the wrong kind) is a [`LoomError::PropertyAccess`].
//! Writes mirror the same rule and report whether the value was stored.
//!
//! # Example
//!
//! ```
//! use horizon_loom::{MapModel, ModelRc, PropertyPath, Value};
//!
//! let address: ModelRc = MapModel::new().with("city", "Aarhus").into_shared();
//! let person = MapModel::new()
//!     .with("name", "Bob")
//!     .with("address", Value::Object(address))
//!     .into_shared();
//!
//! let path = PropertyPath::parse("address.city").unwrap();
//! assert_eq!(path.read(&*person.read()).unwrap(), Value::from("Aarhus"));
//! ```

use std::fmt;

use tracing::trace;

use crate::error::{LoomError, Result};
use crate::logging::targets;
use crate::value::{Model, Value};

/// Optional accessor applied after a segment's field lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAccessor {
    /// `[n]` list element access.
    Index(usize),
    /// `("key")` map entry access.
    Key(String),
}

/// One parsed segment: a field name plus an optional accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Field name looked up on the current model.
    pub name: String,
    /// Accessor applied to the field value, if any.
    pub accessor: Option<PathAccessor>,
}

/// A parsed, validated property path.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Parses a path from its textual form.
    ///
    /// Grammar: `segment ('.' segment)*` where a segment is a field name
    /// optionally followed by `[n]` or `("key")`.
    pub fn parse(text: &str) -> Result<Self> {
        let segments = parse_segments(text)?;
        Ok(Self {
            raw: text.to_string(),
            segments,
        })
    }

    /// The original path text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments, in traversal order.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Reads the value at this path.
    ///
    /// Returns `Value::Null` when a null value is encountered before the
    /// final segment (null-safe traversal).
    pub fn read(&self, model: &dyn Model) -> Result<Value> {
        let resolved = self.resolve_chain(model, self.segments.len())?;
        Ok(resolved.unwrap_or(Value::Null))
    }

    /// Writes a value at this path.
    ///
    /// Returns `Ok(true)` when the value was stored and `Ok(false)` when a
    /// null intermediate made the target unreachable (the write is skipped,
    /// mirroring the null-safe read).
    pub fn write(&self, model: &mut dyn Model, value: Value) -> Result<bool> {
        if self.segments.len() <= 1 {
            return self.apply_final(model, value);
        }
        match self.resolve_chain(&*model, self.segments.len() - 1)? {
            None => {
                trace!(
                    target: targets::PATH,
                    path = %self.raw,
                    "write skipped: null intermediate"
                );
                Ok(false)
            }
            Some(Value::Object(object)) => self.apply_final(&mut *object.write(), value),
            Some(other) => Err(LoomError::property_access(
                &self.raw,
                format!("cannot write through {}", other.kind()),
            )),
        }
    }

    /// Resolves the first `count` segments to a value.
    ///
    /// `Ok(None)` means the chain hit a null value (nested-null rule);
    /// `Ok(Some(_))` is always non-null.
    fn resolve_chain(&self, model: &dyn Model, count: usize) -> Result<Option<Value>> {
        let mut current: Option<Value> = None;
        for segment in &self.segments[..count] {
            let base = match &current {
                None => model.get_field(&segment.name),
                Some(Value::Object(object)) => object.read().get_field(&segment.name),
                Some(other) => {
                    return Err(LoomError::property_access(
                        &self.raw,
                        format!("cannot traverse into {} at '{}'", other.kind(), segment.name),
                    ));
                }
            };
            let mut value = base.ok_or_else(|| {
                LoomError::property_access(&self.raw, format!("no field '{}'", segment.name))
            })?;

            if let Some(accessor) = &segment.accessor {
                value = match (accessor, value) {
                    (_, Value::Null) => return Ok(None),
                    (PathAccessor::Index(index), Value::List(items)) => {
                        let len = items.len();
                        items.into_iter().nth(*index).ok_or_else(|| {
                            LoomError::property_access(
                                &self.raw,
                                format!("index {index} out of bounds (len {len})"),
                            )
                        })?
                    }
                    (PathAccessor::Key(key), Value::Map(mut entries)) => {
                        entries.remove(key).unwrap_or(Value::Null)
                    }
                    (PathAccessor::Index(_), other) => {
                        return Err(LoomError::property_access(
                            &self.raw,
                            format!("cannot index into {}", other.kind()),
                        ));
                    }
                    (PathAccessor::Key(_), other) => {
                        return Err(LoomError::property_access(
                            &self.raw,
                            format!("cannot apply keyed lookup to {}", other.kind()),
                        ));
                    }
                };
            }

            if value.is_null() {
                return Ok(None);
            }
            current = Some(value);
        }
        Ok(current)
    }

    /// Applies the final segment's write to its owning model.
    fn apply_final(&self, target: &mut dyn Model, value: Value) -> Result<bool> {
        let segment = match self.segments.last() {
            Some(segment) => segment,
            None => return Ok(false),
        };
        match &segment.accessor {
            None => {
                if target.set_field(&segment.name, value) {
                    Ok(true)
                } else {
                    Err(LoomError::property_access(
                        &self.raw,
                        format!("no writable field '{}'", segment.name),
                    ))
                }
            }
            Some(PathAccessor::Index(index)) => {
                let field = target.get_field(&segment.name).ok_or_else(|| {
                    LoomError::property_access(&self.raw, format!("no field '{}'", segment.name))
                })?;
                match field {
                    Value::Null => Ok(false),
                    Value::List(mut items) => {
                        if *index >= items.len() {
                            return Err(LoomError::property_access(
                                &self.raw,
                                format!("index {index} out of bounds (len {})", items.len()),
                            ));
                        }
                        items[*index] = value;
                        self.store_field(target, &segment.name, Value::List(items))
                    }
                    other => Err(LoomError::property_access(
                        &self.raw,
                        format!("cannot index into {}", other.kind()),
                    )),
                }
            }
            Some(PathAccessor::Key(key)) => {
                let field = target.get_field(&segment.name).ok_or_else(|| {
                    LoomError::property_access(&self.raw, format!("no field '{}'", segment.name))
                })?;
                match field {
                    Value::Null => Ok(false),
                    Value::Map(mut entries) => {
                        entries.insert(key.clone(), value);
                        self.store_field(target, &segment.name, Value::Map(entries))
                    }
                    other => Err(LoomError::property_access(
                        &self.raw,
                        format!("cannot apply keyed lookup to {}", other.kind()),
                    )),
                }
            }
        }
    }

    fn store_field(&self, target: &mut dyn Model, name: &str, value: Value) -> Result<bool> {
        if target.set_field(name, value) {
            Ok(true)
        } else {
            Err(LoomError::property_access(
                &self.raw,
                format!("model rejected write to field '{name}'"),
            ))
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segments(raw: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = raw.char_indices().peekable();
    loop {
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c == '.' || c == '[' || c == '(' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if name.is_empty() {
            return Err(LoomError::invalid_path(raw, "empty segment"));
        }

        let mut accessor = None;
        match chars.peek().map(|&(_, c)| c) {
            Some('[') => {
                chars.next();
                let mut digits = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c == ']' {
                        break;
                    }
                    digits.push(c);
                    chars.next();
                }
                if chars.next().is_none() {
                    return Err(LoomError::invalid_path(raw, "unterminated index"));
                }
                let index: usize = digits.parse().map_err(|_| {
                    LoomError::invalid_path(raw, format!("invalid index '{digits}'"))
                })?;
                accessor = Some(PathAccessor::Index(index));
            }
            Some('(') => {
                chars.next();
                if !matches!(chars.next(), Some((_, '"'))) {
                    return Err(LoomError::invalid_path(raw, "expected '\"' after '('"));
                }
                let mut key = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => break,
                        Some((_, c)) => key.push(c),
                        None => return Err(LoomError::invalid_path(raw, "unterminated key")),
                    }
                }
                if !matches!(chars.next(), Some((_, ')'))) {
                    return Err(LoomError::invalid_path(raw, "expected ')' after key"));
                }
                accessor = Some(PathAccessor::Key(key));
            }
            _ => {}
        }
        segments.push(PathSegment { name, accessor });

        match chars.next() {
            None => break,
            Some((_, '.')) => continue,
            Some((offset, c)) => {
                return Err(LoomError::invalid_path(
                    raw,
                    format!("unexpected character '{c}' at offset {offset}"),
                ));
            }
        }
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{MapModel, ModelRc};

    fn person() -> ModelRc {
        let address: ModelRc = MapModel::new()
            .with("city", "Aarhus")
            .with("zip", "8000")
            .into_shared();
        MapModel::new()
            .with("name", "Bob")
            .with("address", Value::Object(address))
            .with("nicknames", Value::List(vec![Value::from("Bobby"), Value::from("Rob")]))
            .with("settings", Value::Map(std::collections::HashMap::from([(
                "theme".to_string(),
                Value::from("dark"),
            )])))
            .with("employer", Value::Null)
            .into_shared()
    }

    #[test]
    fn parses_segments_and_accessors() {
        let path = PropertyPath::parse("orders[2].status").unwrap();
        assert_eq!(path.segments().len(), 2);
        assert_eq!(path.segments()[0].name, "orders");
        assert_eq!(path.segments()[0].accessor, Some(PathAccessor::Index(2)));
        assert_eq!(path.segments()[1].accessor, None);

        let keyed = PropertyPath::parse(r#"settings("a.b")"#).unwrap();
        assert_eq!(
            keyed.segments()[0].accessor,
            Some(PathAccessor::Key("a.b".to_string()))
        );
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["", "a..b", "a.", "a[", "a[x]", "a(key)", r#"a("key"#] {
            assert!(
                matches!(PropertyPath::parse(bad), Err(LoomError::InvalidPath { .. })),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn reads_nested_fields() {
        let model = person();
        let path = PropertyPath::parse("address.city").unwrap();
        assert_eq!(path.read(&*model.read()).unwrap(), Value::from("Aarhus"));
    }

    #[test]
    fn null_intermediate_reads_as_null() {
        let model = person();
        let path = PropertyPath::parse("employer.name").unwrap();
        assert_eq!(path.read(&*model.read()).unwrap(), Value::Null);
    }

    #[test]
    fn missing_final_field_is_an_error() {
        let model = person();
        let path = PropertyPath::parse("address.country").unwrap();
        assert!(matches!(
            path.read(&*model.read()),
            Err(LoomError::PropertyAccess { .. })
        ));
    }

    #[test]
    fn indexed_and_keyed_reads() {
        let model = person();
        let first = PropertyPath::parse("nicknames[0]").unwrap();
        assert_eq!(first.read(&*model.read()).unwrap(), Value::from("Bobby"));

        let out_of_bounds = PropertyPath::parse("nicknames[9]").unwrap();
        assert!(out_of_bounds.read(&*model.read()).is_err());

        let theme = PropertyPath::parse(r#"settings("theme")"#).unwrap();
        assert_eq!(theme.read(&*model.read()).unwrap(), Value::from("dark"));

        // Absent map keys read as null rather than erroring.
        let missing = PropertyPath::parse(r#"settings("font")"#).unwrap();
        assert_eq!(missing.read(&*model.read()).unwrap(), Value::Null);
    }

    #[test]
    fn writes_root_and_nested_fields() {
        let model = person();
        let name = PropertyPath::parse("name").unwrap();
        assert!(name.write(&mut *model.write(), Value::from("Alice")).unwrap());
        assert_eq!(name.read(&*model.read()).unwrap(), Value::from("Alice"));

        let city = PropertyPath::parse("address.city").unwrap();
        assert!(city.write(&mut *model.write(), Value::from("Odense")).unwrap());
        assert_eq!(city.read(&*model.read()).unwrap(), Value::from("Odense"));
    }

    #[test]
    fn write_through_null_is_skipped() {
        let model = person();
        let path = PropertyPath::parse("employer.name").unwrap();
        assert!(!path.write(&mut *model.write(), Value::from("ACME")).unwrap());
        // The null field itself is untouched.
        assert_eq!(
            PropertyPath::parse("employer")
                .unwrap()
                .read(&*model.read())
                .unwrap(),
            Value::Null
        );
    }

    #[test]
    fn writes_list_elements_and_map_entries() {
        let model = person();
        let nickname = PropertyPath::parse("nicknames[1]").unwrap();
        assert!(nickname.write(&mut *model.write(), Value::from("Robert")).unwrap());
        assert_eq!(nickname.read(&*model.read()).unwrap(), Value::from("Robert"));

        let out_of_bounds = PropertyPath::parse("nicknames[5]").unwrap();
        assert!(out_of_bounds
            .write(&mut *model.write(), Value::from("x"))
            .is_err());

        let font = PropertyPath::parse(r#"settings("font")"#).unwrap();
        assert!(font.write(&mut *model.write(), Value::from("mono")).unwrap());
        assert_eq!(font.read(&*model.read()).unwrap(), Value::from("mono"));
    }

    #[test]
    fn write_to_unknown_field_is_an_error() {
        let model = person();
        let path = PropertyPath::parse("height").unwrap();
        assert!(matches!(
            path.write(&mut *model.write(), Value::from(180)),
            Err(LoomError::PropertyAccess { .. })
        ));
    }
}

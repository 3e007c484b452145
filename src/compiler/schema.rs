//! Schema translation - OpenAPI schema nodes to runtime validators
//!
//! Translation never fails: every unrecognized or malformed shape degrades
//! to the permissive "any" validator instead of aborting the compile, so a
//! single bad schema fragment cannot take the rest of the document down
//! with it.
//!
//! A [`Validator`] carries three things: the acceptance check used at the
//! protocol boundary, the JSON-Schema rendering advertised to the agent,
//! and a human-readable annotation assembled from the node's `title`,
//! `description`, `default`, and `example`.

use regex::Regex;
use serde_json::{Map, Value, json};

/// Reference chains longer than this degrade to "any" instead of recursing.
const MAX_REF_DEPTH: usize = 32;

/// Runtime-checkable description of an accepted value shape
#[derive(Debug, Clone)]
pub struct Validator {
    kind: ValidatorKind,
    note: Option<String>,
}

/// Closed set of validator shapes
#[derive(Debug, Clone)]
enum ValidatorKind {
    /// Accepts anything (absent, unresolvable, or unrecognized schemas)
    Any,
    Bool,
    Str {
        min_length: Option<u64>,
        max_length: Option<u64>,
        pattern: Option<Regex>,
    },
    StrEnum {
        variants: Vec<String>,
    },
    /// Offset-qualified RFC 3339 timestamp or a looser ISO date
    DateTime,
    Num {
        integer: bool,
        minimum: Option<Bound>,
        maximum: Option<Bound>,
        multiple_of: Option<f64>,
    },
    Array {
        items: Box<Validator>,
    },
    Object {
        fields: Vec<ObjectField>,
    },
    /// Open string-keyed map with a uniform value shape
    MapOf {
        values: Box<Validator>,
    },
    Union {
        variants: Vec<Validator>,
    },
}

/// Inclusive or exclusive numeric bound
#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    exclusive: bool,
}

/// One declared field of an object validator
#[derive(Debug, Clone)]
pub struct ObjectField {
    /// Field name
    pub name: String,
    /// Field value shape
    pub validator: Validator,
    /// Whether the field is listed under `required`
    pub required: bool,
}

impl Validator {
    /// The permissive validator accepting any value
    #[must_use]
    pub fn any(note: Option<String>) -> Self {
        Self {
            kind: ValidatorKind::Any,
            note,
        }
    }

    /// The attached annotation, when any source field was present
    #[must_use]
    pub fn annotation(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Attach a note when the schema itself supplied none
    /// (e.g. a parameter-level description)
    #[must_use]
    pub fn with_fallback_note(mut self, note: Option<&str>) -> Self {
        if self.note.is_none() {
            self.note = note.map(String::from);
        }
        self
    }

    /// Declared fields when this validator is object-shaped
    #[must_use]
    pub fn fields(&self) -> Option<&[ObjectField]> {
        match &self.kind {
            ValidatorKind::Object { fields } => Some(fields),
            _ => None,
        }
    }

    /// Check a value against this validator.
    ///
    /// Returns a human-readable violation on rejection.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match &self.kind {
            ValidatorKind::Any => Ok(()),
            ValidatorKind::Bool => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    Err(format!("expected boolean, got {}", type_name(value)))
                }
            }
            ValidatorKind::Str {
                min_length,
                max_length,
                pattern,
            } => check_string(value, *min_length, *max_length, pattern.as_ref()),
            ValidatorKind::StrEnum { variants } => match value.as_str() {
                Some(s) if variants.iter().any(|v| v == s) => Ok(()),
                Some(s) => Err(format!(
                    "\"{s}\" must be one of: {}",
                    variants.join(", ")
                )),
                None => Err(format!("expected string, got {}", type_name(value))),
            },
            ValidatorKind::DateTime => check_datetime(value),
            ValidatorKind::Num {
                integer,
                minimum,
                maximum,
                multiple_of,
            } => check_number(value, *integer, *minimum, *maximum, *multiple_of),
            ValidatorKind::Array { items } => {
                let Some(arr) = value.as_array() else {
                    return Err(format!("expected array, got {}", type_name(value)));
                };
                for (i, item) in arr.iter().enumerate() {
                    items
                        .check(item)
                        .map_err(|e| format!("item {i}: {e}"))?;
                }
                Ok(())
            }
            ValidatorKind::Object { fields } => {
                let Some(map) = value.as_object() else {
                    return Err(format!("expected object, got {}", type_name(value)));
                };
                for field in fields {
                    match map.get(&field.name) {
                        Some(v) => field
                            .validator
                            .check(v)
                            .map_err(|e| format!("field '{}': {e}", field.name))?,
                        None if field.required => {
                            return Err(format!("missing required field '{}'", field.name));
                        }
                        None => {}
                    }
                }
                // Undeclared keys pass through; the assembler drops them.
                Ok(())
            }
            ValidatorKind::MapOf { values } => {
                let Some(map) = value.as_object() else {
                    return Err(format!("expected object, got {}", type_name(value)));
                };
                for (k, v) in map {
                    values.check(v).map_err(|e| format!("key '{k}': {e}"))?;
                }
                Ok(())
            }
            ValidatorKind::Union { variants } => {
                if variants.iter().any(|v| v.check(value).is_ok()) {
                    Ok(())
                } else {
                    Err("did not match any accepted shape".to_string())
                }
            }
        }
    }

    /// Render this validator as a JSON Schema fragment for the agent
    #[must_use]
    pub fn json_schema(&self) -> Value {
        let mut schema = match &self.kind {
            ValidatorKind::Any => json!({}),
            ValidatorKind::Bool => json!({"type": "boolean"}),
            ValidatorKind::Str {
                min_length,
                max_length,
                pattern,
            } => {
                let mut s = json!({"type": "string"});
                let obj = s.as_object_mut().expect("literal object");
                if let Some(min) = min_length {
                    obj.insert("minLength".to_string(), json!(min));
                }
                if let Some(max) = max_length {
                    obj.insert("maxLength".to_string(), json!(max));
                }
                if let Some(p) = pattern {
                    obj.insert("pattern".to_string(), json!(p.as_str()));
                }
                s
            }
            ValidatorKind::StrEnum { variants } => json!({"type": "string", "enum": variants}),
            ValidatorKind::DateTime => json!({"type": "string", "format": "date-time"}),
            ValidatorKind::Num {
                integer,
                minimum,
                maximum,
                multiple_of,
            } => {
                let mut s = json!({"type": if *integer { "integer" } else { "number" }});
                let obj = s.as_object_mut().expect("literal object");
                if let Some(b) = minimum {
                    let key = if b.exclusive { "exclusiveMinimum" } else { "minimum" };
                    obj.insert(key.to_string(), json!(b.value));
                }
                if let Some(b) = maximum {
                    let key = if b.exclusive { "exclusiveMaximum" } else { "maximum" };
                    obj.insert(key.to_string(), json!(b.value));
                }
                if let Some(m) = multiple_of {
                    obj.insert("multipleOf".to_string(), json!(m));
                }
                s
            }
            ValidatorKind::Array { items } => json!({"type": "array", "items": items.json_schema()}),
            ValidatorKind::Object { fields } => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.validator.json_schema());
                    if field.required {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                let mut s = json!({"type": "object", "properties": properties});
                if !required.is_empty() {
                    s.as_object_mut()
                        .expect("literal object")
                        .insert("required".to_string(), Value::Array(required));
                }
                s
            }
            ValidatorKind::MapOf { values } => {
                if matches!(values.kind, ValidatorKind::Any) {
                    json!({"type": "object", "additionalProperties": true})
                } else {
                    json!({"type": "object", "additionalProperties": values.json_schema()})
                }
            }
            ValidatorKind::Union { variants } => {
                let rendered: Vec<Value> = variants.iter().map(Validator::json_schema).collect();
                json!({"anyOf": rendered})
            }
        };

        if let Some(note) = &self.note {
            if let Some(obj) = schema.as_object_mut() {
                obj.entry("description".to_string())
                    .or_insert_with(|| Value::String(note.clone()));
            }
        }
        schema
    }
}

/// Translate a schema node into a validator.
///
/// `root` supplies the `$ref` resolution context. Never fails; see the
/// module docs for the degradation policy.
#[must_use]
pub fn translate(node: Option<&Value>, root: &Value) -> Validator {
    translate_at(node, root, 0)
}

fn translate_at(node: Option<&Value>, root: &Value, depth: usize) -> Validator {
    let Some(node) = node else {
        return Validator::any(None);
    };
    let Some(obj) = node.as_object() else {
        // JSON Schema boolean form and other scalars: unconstrained.
        return Validator::any(None);
    };

    // Reference nodes take priority over everything else.
    if let Some(pointer) = obj.get("$ref").and_then(Value::as_str) {
        return translate_ref(node, pointer, root, depth);
    }

    // Composition keywords.
    for key in ["oneOf", "anyOf"] {
        if let Some(variants) = obj.get(key).and_then(Value::as_array) {
            if !variants.is_empty() {
                return translate_union(variants, node, root, depth);
            }
        }
    }
    if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
        if !members.is_empty() {
            return translate_all_of(members, node, root, depth);
        }
    }

    // Typed dispatch with an explicit fallback for the unrecognized.
    let kind = match obj.get("type").and_then(Value::as_str) {
        Some("string") => translate_string(obj),
        Some("integer") => translate_number(obj, true),
        Some("number") => translate_number(obj, false),
        Some("boolean") => ValidatorKind::Bool,
        Some("array") => ValidatorKind::Array {
            items: Box::new(translate_at(obj.get("items"), root, depth + 1)),
        },
        Some("object") => translate_object(obj, root, depth),
        Some(other) => {
            return Validator {
                kind: ValidatorKind::Any,
                note: merge_notes(
                    Some(format!("unsupported type: {other}")),
                    annotation(obj),
                ),
            };
        }
        // No reference, no composition, no type: unconstrained.
        None => ValidatorKind::Any,
    };

    Validator {
        kind,
        note: annotation(obj),
    }
}

fn translate_ref(node: &Value, pointer: &str, root: &Value, depth: usize) -> Validator {
    if depth >= MAX_REF_DEPTH {
        return Validator::any(Some(pointer.to_string()));
    }
    let Some(target) = resolve_pointer(root, pointer) else {
        return Validator::any(Some(pointer.to_string()));
    };

    let mut validator = translate_at(Some(target), root, depth + 1);

    // Propagate the referencing node's description when the target has none.
    if target.get("description").is_none() {
        if let Some(desc) = node.get("description").and_then(Value::as_str) {
            validator.note = merge_notes(Some(desc.to_string()), validator.note);
        }
    }
    validator
}

fn translate_union(variants: &[Value], node: &Value, root: &Value, depth: usize) -> Validator {
    let translated: Vec<Validator> = variants
        .iter()
        .map(|v| translate_at(Some(v), root, depth + 1))
        .collect();

    let note = node.as_object().and_then(annotation);
    if translated.len() == 1 {
        // A single variant degenerates to that validator, not a union of one.
        let mut single = translated.into_iter().next().expect("one variant");
        single.note = merge_notes(note, single.note);
        return single;
    }
    Validator {
        kind: ValidatorKind::Union {
            variants: translated,
        },
        note,
    }
}

fn translate_all_of(members: &[Value], node: &Value, root: &Value, depth: usize) -> Validator {
    let translated: Vec<Validator> = members
        .iter()
        .map(|m| translate_at(Some(m), root, depth + 1))
        .collect();
    let note = node.as_object().and_then(annotation);

    let all_objects = translated.iter().all(|v| v.fields().is_some());
    if all_objects {
        // Merge field sets; later members override earlier on collision.
        let mut merged: Vec<ObjectField> = Vec::new();
        for member in &translated {
            for field in member.fields().unwrap_or_default() {
                merged.retain(|f| f.name != field.name);
                merged.push(field.clone());
            }
        }
        return Validator {
            kind: ValidatorKind::Object { fields: merged },
            note,
        };
    }

    // Known lossy fallback: keep the first member only.
    let mut first = translated.into_iter().next().expect("non-empty allOf");
    first.note = merge_notes(note, first.note);
    first
}

fn translate_string(obj: &Map<String, Value>) -> ValidatorKind {
    if let Some(variants) = obj.get("enum").and_then(Value::as_array) {
        let values: Vec<String> = variants
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect();
        if !values.is_empty() {
            return ValidatorKind::StrEnum { variants: values };
        }
    }

    if matches!(
        obj.get("format").and_then(Value::as_str),
        Some("date" | "date-time")
    ) {
        return ValidatorKind::DateTime;
    }

    ValidatorKind::Str {
        min_length: obj.get("minLength").and_then(Value::as_u64),
        max_length: obj.get("maxLength").and_then(Value::as_u64),
        pattern: obj
            .get("pattern")
            .and_then(Value::as_str)
            .and_then(|p| Regex::new(p).ok()),
    }
}

fn translate_number(obj: &Map<String, Value>, integer: bool) -> ValidatorKind {
    ValidatorKind::Num {
        integer,
        minimum: bound(obj, "minimum", "exclusiveMinimum"),
        maximum: bound(obj, "maximum", "exclusiveMaximum"),
        multiple_of: obj.get("multipleOf").and_then(Value::as_f64),
    }
}

/// Read a numeric bound, honoring both the legacy boolean and the modern
/// numeric `exclusive*` forms.
fn bound(obj: &Map<String, Value>, key: &str, exclusive_key: &str) -> Option<Bound> {
    match obj.get(exclusive_key) {
        // Modern form: the exclusive keyword carries the bound itself.
        Some(Value::Number(n)) => Some(Bound {
            value: n.as_f64()?,
            exclusive: true,
        }),
        // Legacy form: a boolean flag qualifying the plain bound.
        Some(Value::Bool(flag)) => Some(Bound {
            value: obj.get(key)?.as_f64()?,
            exclusive: *flag,
        }),
        _ => Some(Bound {
            value: obj.get(key)?.as_f64()?,
            exclusive: false,
        }),
    }
}

fn translate_object(obj: &Map<String, Value>, root: &Value, depth: usize) -> ValidatorKind {
    if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
        let required: Vec<&str> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = properties
            .iter()
            .map(|(name, prop)| ObjectField {
                name: name.clone(),
                validator: translate_at(Some(prop), root, depth + 1),
                required: required.contains(&name.as_str()),
            })
            .collect();
        return ValidatorKind::Object { fields };
    }

    match obj.get("additionalProperties") {
        // `additionalProperties: true` (or absent): dynamic untyped object.
        None | Some(Value::Bool(true)) => ValidatorKind::MapOf {
            values: Box::new(Validator::any(None)),
        },
        Some(Value::Bool(false)) => ValidatorKind::Object { fields: Vec::new() },
        Some(schema) => ValidatorKind::MapOf {
            values: Box::new(translate_at(Some(schema), root, depth + 1)),
        },
    }
}

/// Walk a `#/`-rooted reference path into the document.
///
/// Segments are `/`-separated with `~1` and `~0` unescaping; array segments
/// may be numeric indices. Returns `None` for external or dangling refs.
#[must_use]
pub fn resolve_pointer<'a>(root: &'a Value, pointer: &str) -> Option<&'a Value> {
    let path = pointer.strip_prefix('#')?;
    let mut current = root;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Build the annotation string from `title`, `description`, `default`,
/// and `example` (only the present ones).
fn annotation(obj: &Map<String, Value>) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    if let Some(title) = obj.get("title").and_then(Value::as_str) {
        parts.push(title.to_string());
    }
    if let Some(desc) = obj.get("description").and_then(Value::as_str) {
        parts.push(desc.to_string());
    }
    if let Some(default) = obj.get("default") {
        parts.push(format!("default: {default}"));
    }
    if let Some(example) = obj.get("example") {
        parts.push(format!("example: {example}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" | "))
    }
}

fn merge_notes(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) if a != b => Some(format!("{a} | {b}")),
        (Some(a), _) => Some(a),
        (None, b) => b,
    }
}

fn check_string(
    value: &Value,
    min_length: Option<u64>,
    max_length: Option<u64>,
    pattern: Option<&Regex>,
) -> Result<(), String> {
    let Some(s) = value.as_str() else {
        return Err(format!("expected string, got {}", type_name(value)));
    };
    let len = s.chars().count() as u64;
    if let Some(min) = min_length {
        if len < min {
            return Err(format!("must be at least {min} characters long"));
        }
    }
    if let Some(max) = max_length {
        if len > max {
            return Err(format!("must be at most {max} characters long"));
        }
    }
    if let Some(re) = pattern {
        if !re.is_match(s) {
            return Err(format!("must match pattern {}", re.as_str()));
        }
    }
    Ok(())
}

fn check_datetime(value: &Value) -> Result<(), String> {
    let Some(s) = value.as_str() else {
        return Err(format!("expected string, got {}", type_name(value)));
    };
    let accepted = chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok();
    if accepted {
        Ok(())
    } else {
        Err(format!("\"{s}\" is not a date or date-time"))
    }
}

fn check_number(
    value: &Value,
    integer: bool,
    minimum: Option<Bound>,
    maximum: Option<Bound>,
    multiple_of: Option<f64>,
) -> Result<(), String> {
    let Some(n) = value.as_f64() else {
        return Err(format!(
            "expected {}, got {}",
            if integer { "integer" } else { "number" },
            type_name(value)
        ));
    };
    if integer && !(value.is_i64() || value.is_u64() || n.fract() == 0.0) {
        return Err(format!("expected integer, got float {n}"));
    }
    if let Some(b) = minimum {
        let ok = if b.exclusive { n > b.value } else { n >= b.value };
        if !ok {
            let op = if b.exclusive { ">" } else { ">=" };
            return Err(format!("must be {op} {}", b.value));
        }
    }
    if let Some(b) = maximum {
        let ok = if b.exclusive { n < b.value } else { n <= b.value };
        if !ok {
            let op = if b.exclusive { "<" } else { "<=" };
            return Err(format!("must be {op} {}", b.value));
        }
    }
    if let Some(m) = multiple_of {
        if m.abs() > f64::EPSILON {
            let remainder = (n / m).fract().abs();
            if remainder > 1e-9 && (1.0 - remainder) > 1e-9 {
                return Err(format!("must be a multiple of {m}"));
            }
        }
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

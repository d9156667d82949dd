//! Structural validation of catalog documents.
//!
//! Runs on the raw JSON model before deserialization so every violation is
//! reported with the path of the offending node.

use curate_protocol::ContainerType;
use serde_json::{Map, Value};

use crate::error::{violation, Result, TemplateError};

const NAMESPACE_KEYS: &[&str] = &["namespace", "description", "datatypes"];
const DATATYPE_KEYS: &[&str] = &[
    "id",
    "container_type",
    "parent_container_type",
    "description",
    "where",
    "properties",
    "required",
];
const PROPERTY_KEYS: &[&str] = &[
    "type",
    "label",
    "default",
    "enum",
    "auto_update",
    "initialize",
];

/// Fails with every structural violation found in `value`.
pub fn validate_catalog_value(value: &Value) -> Result<()> {
    let mut violations = Vec::new();

    let Value::Object(root) = value else {
        return Err(TemplateError::schema("", "catalog must be a JSON object"));
    };

    unknown_keys(&mut violations, root, "", NAMESPACE_KEYS);

    match root.get("namespace") {
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(Value::String(_)) => violations.push(violation("namespace", "must not be empty")),
        Some(other) => violations.push(violation(
            "namespace",
            &format!("{other} is not of type 'string'"),
        )),
        None => violations.push(violation("", "'namespace' is a required property")),
    }

    optional_string(&mut violations, root, "", "description");

    match root.get("datatypes") {
        Some(Value::Array(datatypes)) => {
            for (idx, datatype) in datatypes.iter().enumerate() {
                validate_datatype(&mut violations, datatype, &format!("datatypes[{idx}]"));
            }
        }
        Some(_) => violations.push(violation("datatypes", "is not of type 'array'")),
        None => violations.push(violation("", "'datatypes' is a required property")),
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(TemplateError::Schema { violations })
    }
}

fn validate_datatype(violations: &mut Vec<String>, value: &Value, base: &str) {
    let Value::Object(datatype) = value else {
        violations.push(violation(base, "is not of type 'object'"));
        return;
    };

    unknown_keys(violations, datatype, base, DATATYPE_KEYS);

    match datatype.get("container_type") {
        Some(kind) => container_type(violations, kind, &join(base, "container_type")),
        None => violations.push(violation(base, "'container_type' is a required property")),
    }
    if let Some(kind) = datatype.get("parent_container_type") {
        container_type(violations, kind, &join(base, "parent_container_type"));
    }

    optional_string(violations, datatype, base, "id");
    optional_string(violations, datatype, base, "description");

    if let Some(predicate) = datatype.get("where") {
        if !predicate.is_object() {
            violations.push(violation(&join(base, "where"), "is not of type 'object'"));
        }
    }

    let properties = match datatype.get("properties") {
        Some(Value::Object(properties)) => {
            for (name, property) in properties {
                validate_property(violations, property, &format!("{base}.properties.{name}"));
            }
            Some(properties)
        }
        Some(_) => {
            violations.push(violation(&join(base, "properties"), "is not of type 'object'"));
            None
        }
        None => {
            violations.push(violation(base, "'properties' is a required property"));
            None
        }
    };

    match datatype.get("required") {
        None => {}
        Some(Value::Array(required)) => {
            for (idx, name) in required.iter().enumerate() {
                let path = format!("{base}.required[{idx}]");
                match name {
                    Value::String(name) => {
                        if properties.is_some_and(|props| !props.contains_key(name)) {
                            violations.push(violation(
                                &path,
                                &format!("'{name}' is not a declared property"),
                            ));
                        }
                    }
                    other => violations.push(violation(
                        &path,
                        &format!("{other} is not of type 'string'"),
                    )),
                }
            }
        }
        Some(_) => violations.push(violation(&join(base, "required"), "is not of type 'array'")),
    }
}

fn validate_property(violations: &mut Vec<String>, value: &Value, base: &str) {
    let Value::Object(property) = value else {
        violations.push(violation(base, "is not of type 'object'"));
        return;
    };

    unknown_keys(violations, property, base, PROPERTY_KEYS);
    optional_string(violations, property, base, "type");
    optional_string(violations, property, base, "label");
    optional_string(violations, property, base, "auto_update");

    if let Some(values) = property.get("enum") {
        if !values.is_array() {
            violations.push(violation(&join(base, "enum"), "is not of type 'array'"));
        }
    }
    if let Some(init) = property.get("initialize") {
        if !init.is_object() {
            violations.push(violation(&join(base, "initialize"), "is not of type 'object'"));
        }
    }
}

fn container_type(violations: &mut Vec<String>, value: &Value, path: &str) {
    match value {
        Value::String(kind) => {
            if let Err(err) = kind.parse::<ContainerType>() {
                violations.push(violation(path, &err));
            }
        }
        other => violations.push(violation(path, &format!("{other} is not of type 'string'"))),
    }
}

fn optional_string(violations: &mut Vec<String>, obj: &Map<String, Value>, base: &str, key: &str) {
    match obj.get(key) {
        None | Some(Value::String(_)) => {}
        Some(other) => violations.push(violation(
            &join(base, key),
            &format!("{other} is not of type 'string'"),
        )),
    }
}

fn unknown_keys(violations: &mut Vec<String>, obj: &Map<String, Value>, base: &str, allowed: &[&str]) {
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            violations.push(violation(&join(base, key), "unknown field"));
        }
    }
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}

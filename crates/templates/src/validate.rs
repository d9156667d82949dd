use std::fmt;

use curate_protocol::MetadataBlock;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::RuleDefinition;

/// One failed check on a metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Property name, empty for block-level failures.
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} {}", self.path, self.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl Validation {
    /// Newline-joined violations; empty when valid.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Checks computed blocks against their rule's requirements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    /// Also reject values outside a property's `enum`.
    pub check_enums: bool,
}

impl Validator {
    #[must_use]
    pub const fn new(check_enums: bool) -> Self {
        Self { check_enums }
    }

    #[must_use]
    pub fn validate(&self, block: &MetadataBlock, rule: &RuleDefinition) -> Validation {
        let Some(fields) = block.fields() else {
            return Validation {
                valid: false,
                violations: Vec::new(),
            };
        };

        let mut violations = required_violations(fields, rule);
        if self.check_enums {
            violations.extend(enum_violations(fields, rule));
        }

        Validation {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Required-field check with enums left unchecked.
#[must_use]
pub fn validate(block: &MetadataBlock, rule: &RuleDefinition) -> Validation {
    Validator::default().validate(block, rule)
}

fn required_violations(fields: &Map<String, Value>, rule: &RuleDefinition) -> Vec<Violation> {
    let mut violations = Vec::new();
    for name in rule.required() {
        match fields.get(name) {
            None => violations.push(Violation {
                path: String::new(),
                message: format!("'{name}' is a required property"),
            }),
            Some(Value::String(text)) if text.is_empty() => violations.push(Violation {
                path: name.clone(),
                message: "'' is too short".to_string(),
            }),
            Some(Value::String(_)) => {}
            Some(other) => violations.push(Violation {
                path: name.clone(),
                message: format!("{other} is not of type 'string'"),
            }),
        }
    }
    violations
}

fn enum_violations<'a>(
    fields: &'a Map<String, Value>,
    rule: &'a RuleDefinition,
) -> impl Iterator<Item = Violation> + 'a {
    rule.properties().iter().filter_map(move |(name, spec)| {
        let allowed = spec.enum_values.as_ref()?;
        let value = fields.get(name)?;
        if value.as_str().is_some_and(str::is_empty) || allowed.contains(value) {
            return None;
        }
        let listed: Vec<String> = allowed.iter().map(quoted).collect();
        Some(Violation {
            path: name.clone(),
            message: format!("{} is not one of [{}]", quoted(value), listed.join(", ")),
        })
    })
}

fn quoted(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Namespace;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn block(value: Value) -> MetadataBlock {
        MetadataBlock::from_value(&value).unwrap()
    }

    #[test]
    fn complete_block_is_valid() {
        let catalog = Namespace::bids();
        let rule = catalog.definition("anat_file").unwrap();
        let result = validate(
            &block(json!({
                "template": "anat_file",
                "Filename": "sub-001_T1w.nii.gz",
                "Folder": "anat",
                "Path": "sub-001/anat",
                "Modality": "T1w"
            })),
            rule,
        );
        assert!(result.valid);
        assert_eq!(result.error_message(), "");
    }

    #[test]
    fn reports_missing_empty_and_mistyped_fields() {
        let catalog = Namespace::bids();
        let rule = catalog.definition("anat_file").unwrap();
        let result = validate(
            &block(json!({"Filename": "", "Folder": 3, "Modality": "T1w"})),
            rule,
        );
        assert!(!result.valid);
        assert_eq!(
            result.error_message(),
            "Filename '' is too short\nFolder 3 is not of type 'string'\n'Path' is a required property"
        );
    }

    #[test]
    fn not_applicable_is_never_valid() {
        let catalog = Namespace::bids();
        let rule = catalog.definition("project_file").unwrap();
        let result = validate(&MetadataBlock::NotApplicable, rule);
        assert!(!result.valid);
        assert!(result.violations.is_empty());
    }

    #[test]
    fn enums_are_checked_on_request() {
        let catalog = Namespace::bids();
        let rule = catalog.definition("diffusion_file").unwrap();
        let fields = block(json!({
            "Filename": "f", "Folder": "dwi", "Path": "p", "Modality": "T1w"
        }));

        assert!(validate(&fields, rule).valid);

        let strict = Validator::new(true).validate(&fields, rule);
        assert!(!strict.valid);
        assert_eq!(
            strict.error_message(),
            "Modality 'T1w' is not one of ['dwi', 'sbref']"
        );
    }

    #[test]
    fn empty_optional_enum_values_are_allowed() {
        let catalog = Namespace::from_value(&json!({
            "namespace": "X",
            "datatypes": [{
                "container_type": "session",
                "properties": {"Kind": {"default": "", "enum": ["a", "b"]}}
            }]
        }))
        .unwrap();
        let rule = &catalog.rules()[0];
        let result = Validator::new(true).validate(&block(json!({"Kind": ""})), rule);
        assert!(result.valid);
    }
}

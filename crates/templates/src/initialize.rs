use curate_protocol::ContextLookup;
use regex::Regex;
use serde_json::{Map, Value};

use crate::catalog::RuleDefinition;
use crate::error::{violation, Result, TemplateError};

const DEFAULT_GROUP: &str = "value";

/// How a property obtains its first value from the context.
#[derive(Debug, Clone)]
pub enum Initializer {
    /// Context fields tried in declaration order; the first hit wins.
    Extract(Vec<FieldRule>),
    /// Evaluates `on` once and picks the first matching case.
    Switch { on: String, cases: Vec<SwitchCase> },
}

#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: String,
    pub action: FieldAction,
}

#[derive(Debug, Clone)]
pub enum FieldAction {
    /// Copy the field's value verbatim.
    Take,
    /// Search the field's text and keep one named capture group.
    Pattern { regex: Regex, group: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub when: CaseMatch,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseMatch {
    Eq(Value),
    Default,
}

impl Initializer {
    /// Compiles an `initialize` document; `path` locates it for error messages.
    pub fn compile(raw: &Value, path: &str) -> Result<Self> {
        let Value::Object(spec) = raw else {
            return Err(TemplateError::schema(path, "initialize must be an object"));
        };

        if let Some(switch) = spec.get("$switch") {
            if spec.len() != 1 {
                return Err(TemplateError::schema(
                    path,
                    "'$switch' cannot be combined with field rules",
                ));
            }
            return compile_switch(switch, &format!("{path}.$switch"));
        }

        let mut rules = Vec::with_capacity(spec.len());
        for (field, action) in spec {
            let action_path = format!("{path}.{field}");
            rules.push(FieldRule {
                field: field.clone(),
                action: compile_field_action(action, &action_path)?,
            });
        }
        Ok(Self::Extract(rules))
    }

    /// Value for the property, or `None` to leave it unset.
    #[must_use]
    pub fn evaluate(&self, context: &impl ContextLookup) -> Option<Value> {
        match self {
            Self::Extract(rules) => rules.iter().find_map(|rule| rule.apply(context)),
            Self::Switch { on, cases } => {
                let subject = context.lookup(on).unwrap_or(Value::Null);
                cases
                    .iter()
                    .find(|case| match &case.when {
                        CaseMatch::Default => true,
                        CaseMatch::Eq(expected) => switch_values_equal(&subject, expected),
                    })
                    .map(|case| case.value.clone())
            }
        }
    }
}

impl FieldRule {
    fn apply(&self, context: &impl ContextLookup) -> Option<Value> {
        let value = context.lookup(&self.field)?;
        match &self.action {
            FieldAction::Take => (!value.is_null()).then_some(value),
            FieldAction::Pattern { regex, group } => {
                let text = value.as_str()?;
                let captures = regex.captures(text)?;
                captures
                    .name(group)
                    .map(|m| Value::String(m.as_str().to_string()))
            }
        }
    }
}

impl RuleDefinition {
    /// Fills properties absent from `block` from their `initialize` specs,
    /// in declaration order. Properties whose initializer finds nothing stay
    /// unset.
    pub fn initialize_properties<'b>(
        &self,
        block: &'b mut Map<String, Value>,
        context: &impl ContextLookup,
    ) -> &'b mut Map<String, Value> {
        for (name, spec) in self.properties() {
            if block.contains_key(name) {
                continue;
            }
            let Some(initializer) = spec.initialize.as_ref() else {
                continue;
            };
            if let Some(value) = initializer.evaluate(context) {
                log::debug!("initialized {}.{name} from context", self.id());
                block.insert(name.clone(), value);
            }
        }
        block
    }
}

/// JSON equality, or exact set equality when both sides are arrays.
#[must_use]
pub fn switch_values_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (actual, expected) {
        (Value::Array(left), Value::Array(right)) => {
            left.iter().all(|item| right.contains(item))
                && right.iter().all(|item| left.contains(item))
        }
        _ => false,
    }
}

fn compile_switch(raw: &Value, path: &str) -> Result<Initializer> {
    let Value::Object(switch) = raw else {
        return Err(TemplateError::schema(path, "'$switch' must be an object"));
    };

    let mut violations = Vec::new();
    for key in switch.keys() {
        if key != "$on" && key != "$cases" {
            violations.push(violation(&format!("{path}.{key}"), "unknown field"));
        }
    }

    let on = match switch.get("$on") {
        Some(Value::String(on)) if !on.trim().is_empty() => on.clone(),
        _ => {
            violations.push(violation(
                &format!("{path}.$on"),
                "must be a non-empty context path",
            ));
            String::new()
        }
    };

    let mut cases = Vec::new();
    match switch.get("$cases") {
        Some(Value::Array(raw_cases)) => {
            for (idx, raw_case) in raw_cases.iter().enumerate() {
                let case_path = format!("{path}.$cases[{idx}]");
                match compile_case(raw_case, &case_path) {
                    Ok(case) => {
                        if case.when == CaseMatch::Default && idx + 1 != raw_cases.len() {
                            violations.push(violation(
                                &case_path,
                                "'$default' case must be the last case",
                            ));
                        }
                        cases.push(case);
                    }
                    Err(err) => violations.push(err),
                }
            }
        }
        _ => violations.push(violation(&format!("{path}.$cases"), "must be an array")),
    }

    if violations.is_empty() {
        Ok(Initializer::Switch { on, cases })
    } else {
        Err(TemplateError::Schema { violations })
    }
}

fn compile_case(raw: &Value, path: &str) -> std::result::Result<SwitchCase, String> {
    let Value::Object(case) = raw else {
        return Err(violation(path, "case must be an object"));
    };
    if let Some(key) = case
        .keys()
        .find(|key| !matches!(key.as_str(), "$eq" | "$default" | "$value"))
    {
        return Err(violation(&format!("{path}.{key}"), "unknown field"));
    }
    let Some(value) = case.get("$value") else {
        return Err(violation(&format!("{path}.$value"), "is required"));
    };

    let when = match (case.get("$eq"), case.get("$default")) {
        (Some(expected), None) => CaseMatch::Eq(expected.clone()),
        (None, Some(Value::Bool(true))) => CaseMatch::Default,
        (None, Some(_)) => {
            return Err(violation(&format!("{path}.$default"), "must be true"));
        }
        (Some(_), Some(_)) => {
            return Err(violation(path, "case cannot have both '$eq' and '$default'"));
        }
        (None, None) => {
            return Err(violation(path, "case needs '$eq' or '$default'"));
        }
    };

    Ok(SwitchCase {
        when,
        value: value.clone(),
    })
}

fn compile_field_action(raw: &Value, path: &str) -> Result<FieldAction> {
    let Value::Object(action) = raw else {
        return Err(TemplateError::schema(
            path,
            "field rule must be an object with 'take' or 'regex'",
        ));
    };
    if let Some(key) = action
        .keys()
        .find(|key| !matches!(key.as_str(), "take" | "regex" | "group"))
    {
        return Err(TemplateError::schema(
            &format!("{path}.{key}"),
            "unknown field",
        ));
    }

    match (action.get("take"), action.get("regex")) {
        (Some(Value::Bool(true)), None) => Ok(FieldAction::Take),
        (None, Some(Value::String(pattern))) => {
            let regex = Regex::new(pattern).map_err(|err| {
                TemplateError::schema(&format!("{path}.regex"), format!("invalid regex: {err}"))
            })?;
            let group = match action.get("group") {
                None => DEFAULT_GROUP.to_string(),
                Some(Value::String(group)) => group.clone(),
                Some(_) => {
                    return Err(TemplateError::schema(
                        &format!("{path}.group"),
                        "must be a string",
                    ));
                }
            };
            if !regex.capture_names().flatten().any(|name| name == group) {
                return Err(TemplateError::schema(
                    &format!("{path}.regex"),
                    format!("pattern has no capture group named '{group}'"),
                ));
            }
            Ok(FieldAction::Pattern { regex, group })
        }
        _ => Err(TemplateError::schema(
            path,
            "field rule needs either \"take\": true or a \"regex\" string",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn switch(cases: Value) -> Initializer {
        Initializer::compile(
            &json!({"$switch": {"$on": "value", "$cases": cases}}),
            "initialize",
        )
        .unwrap()
    }

    #[test]
    fn switch_matches_scalars_with_default() {
        let init = switch(json!([
            {"$eq": "foo", "$value": "found_foo"},
            {"$eq": "bar", "$value": "found_bar"},
            {"$default": true, "$value": "found_nothing"}
        ]));
        assert_eq!(init.evaluate(&json!({"value": "foo"})), Some(json!("found_foo")));
        assert_eq!(init.evaluate(&json!({"value": "bar"})), Some(json!("found_bar")));
        assert_eq!(
            init.evaluate(&json!({"value": "something_else"})),
            Some(json!("found_nothing"))
        );
        assert_eq!(init.evaluate(&json!({})), Some(json!("found_nothing")));
    }

    #[test]
    fn switch_compares_lists_as_exact_sets() {
        let init = switch(json!([
            {"$eq": ["a", "b", "c"], "$value": "match1"},
            {"$eq": ["a", "d"], "$value": "match2"},
            {"$default": true, "$value": "no_match"}
        ]));
        let eval = |value: Value| init.evaluate(&json!({ "value": value }));
        assert_eq!(eval(json!(["c", "b", "a"])), Some(json!("match1")));
        assert_eq!(eval(json!(["a", "d"])), Some(json!("match2")));
        assert_eq!(eval(json!(["a", "b"])), Some(json!("no_match")));
        assert_eq!(eval(json!(["a", "b", "c", "d"])), Some(json!("no_match")));
    }

    #[test]
    fn switch_without_default_leaves_unset() {
        let init = switch(json!([{"$eq": "foo", "$value": 1}]));
        assert_eq!(init.evaluate(&json!({"value": "bar"})), None);
    }

    #[test]
    fn switch_rejects_misplaced_default() {
        let err = Initializer::compile(
            &json!({"$switch": {"$on": "value", "$cases": [
                {"$default": true, "$value": "x"},
                {"$eq": "foo", "$value": "y"}
            ]}}),
            "p",
        )
        .unwrap_err();
        assert!(err.to_string().contains("p.$switch.$cases[0]"), "{err}");
    }

    #[test]
    fn extraction_tries_fields_in_order() {
        let init = Initializer::compile(
            &json!({
                "acquisition.label": {"regex": "(^|[-_])task[-_](?P<value>[^-_]+)($|[-_])"},
                "file.name": {"regex": "(^|[-_])task[-_](?P<value>[^-_]+)($|[-_])"}
            }),
            "initialize",
        )
        .unwrap();

        let from_file = json!({
            "acquisition": {"label": "fMRI rest"},
            "file": {"name": "sub-01_task-nback_bold.nii.gz"}
        });
        assert_eq!(init.evaluate(&from_file), Some(json!("nback")));

        let from_acquisition = json!({
            "acquisition": {"label": "task-rest_run-1"},
            "file": {"name": "sub-01_task-nback_bold.nii.gz"}
        });
        assert_eq!(init.evaluate(&from_acquisition), Some(json!("rest")));

        let nothing = json!({"acquisition": {"label": "anat"}, "file": {"name": "t1.nii"}});
        assert_eq!(init.evaluate(&nothing), None);
    }

    #[test]
    fn take_copies_raw_value() {
        let init = Initializer::compile(&json!({"file.name": {"take": true}}), "i").unwrap();
        assert_eq!(
            init.evaluate(&json!({"file": {"name": "1.dcm.zip"}})),
            Some(json!("1.dcm.zip"))
        );
        assert_eq!(init.evaluate(&json!({"file": {"name": null}})), None);
    }

    #[test]
    fn custom_group_names_are_honored() {
        let init = Initializer::compile(
            &json!({"file.name": {"regex": "run-(?P<run>\\d+)", "group": "run"}}),
            "i",
        )
        .unwrap();
        assert_eq!(
            init.evaluate(&json!({"file": {"name": "x_run-02.nii"}})),
            Some(json!("02"))
        );
    }

    #[test]
    fn bad_field_rules_fail_with_paths() {
        let cases = [
            (json!({"file.name": {"regex": "("}}), "i.file.name.regex"),
            (json!({"file.name": {"regex": "abc"}}), "i.file.name.regex"),
            (json!({"file.name": {"take": false}}), "i.file.name"),
            (json!({"file.name": {"take": true, "extra": 1}}), "i.file.name.extra"),
        ];
        for (raw, path) in cases {
            let err = Initializer::compile(&raw, "i").unwrap_err();
            assert!(err.to_string().contains(path), "{err}");
        }
    }

    #[test]
    fn switch_cannot_be_mixed_with_field_rules() {
        let raw = json!({
            "$switch": {"$on": "file.type", "$cases": [{"$default": true, "$value": "x"}]},
            "file.name": {"take": true}
        });
        let err = Initializer::compile(&raw, "properties.Modality.initialize").unwrap_err();
        assert_eq!(
            err.violations(),
            Some(
                &["properties.Modality.initialize: '$switch' cannot be combined with field rules"
                    .to_string()][..]
            )
        );
    }
}

use std::collections::HashSet;
use std::path::Path;

use curate_protocol::ContainerType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{violation, Result, TemplateError};
use crate::initialize::Initializer;
use crate::render::Template;
use crate::schema::validate_catalog_value;

const BUILTIN_BIDS: &str = include_str!("../catalogs/bids.json");

/// Catalog document as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawNamespace {
    /// Key under `info` the rendered metadata is stored at.
    pub namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Rules in precedence order.
    pub datatypes: Vec<RawRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawRule {
    /// Defaults to `<container_type>_<index>`.
    #[serde(default)]
    pub id: Option<String>,
    /// One of project, subject, session, acquisition, file.
    pub container_type: String,
    #[serde(default)]
    pub parent_container_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Attribute predicates on the container; arrays list accepted values.
    #[serde(default, rename = "where")]
    pub where_: Map<String, Value>,
    #[serde(default)]
    #[schemars(with = "std::collections::BTreeMap<String, RawProperty>")]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RawProperty {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default, rename = "enum")]
    pub enum_values: Option<Vec<Value>>,
    /// Template re-rendered on every curation run.
    #[serde(default)]
    pub auto_update: Option<String>,
    /// Field rules (`{"file.name": {"regex": ...}}`) or a `$switch`.
    #[serde(default)]
    pub initialize: Option<Value>,
}

/// Compiled template catalog.
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    description: Option<String>,
    rules: Vec<RuleDefinition>,
}

/// One datatype rule: where it applies and which properties it carries.
#[derive(Debug, Clone)]
pub struct RuleDefinition {
    id: String,
    container_type: ContainerType,
    parent_container_type: Option<ContainerType>,
    description: Option<String>,
    predicates: Vec<WherePredicate>,
    properties: Vec<(String, PropertySpec)>,
    required: Vec<String>,
}

/// `where` entry: the container attribute must hit one of `accepted`.
#[derive(Debug, Clone, PartialEq)]
pub struct WherePredicate {
    pub attribute: String,
    pub accepted: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub kind: Option<String>,
    pub label: Option<String>,
    pub default: Value,
    pub enum_values: Option<Vec<Value>>,
    pub auto_update: Option<Template>,
    pub initialize: Option<Initializer>,
}

impl Namespace {
    /// The bundled BIDS catalog.
    #[must_use]
    pub fn bids() -> Self {
        Self::from_bytes(BUILTIN_BIDS.as_bytes()).expect("builtin BIDS catalog must parse")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Accepts JSON, falling back to TOML.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value = parse_raw(bytes)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        validate_catalog_value(value)?;
        let raw: RawNamespace = serde_json::from_value(value.clone())
            .map_err(|err| TemplateError::Parse(err.to_string()))?;
        Self::compile(raw)
    }

    fn compile(raw: RawNamespace) -> Result<Self> {
        let mut violations = Vec::new();
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(raw.datatypes.len());

        for (idx, rule) in raw.datatypes.into_iter().enumerate() {
            let base = format!("datatypes[{idx}]");
            match RuleDefinition::compile(rule, idx, &base) {
                Ok(rule) => {
                    if !seen.insert(rule.id.clone()) {
                        violations.push(violation(
                            &format!("{base}.id"),
                            &format!("duplicate template id '{}'", rule.id),
                        ));
                    }
                    rules.push(rule);
                }
                Err(TemplateError::Schema { violations: found }) => violations.extend(found),
                Err(err) => return Err(err),
            }
        }

        if !violations.is_empty() {
            return Err(TemplateError::Schema { violations });
        }

        log::debug!(
            "compiled catalog '{}' with {} templates",
            raw.namespace,
            rules.len()
        );
        Ok(Self {
            name: raw.namespace,
            description: raw.description,
            rules,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Rules in precedence order.
    #[must_use]
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&RuleDefinition> {
        self.rules.iter().find(|rule| rule.id == id)
    }

    /// JSON schema of the on-disk catalog format.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(RawNamespace)
    }
}

impl RuleDefinition {
    fn compile(raw: RawRule, idx: usize, base: &str) -> Result<Self> {
        let mut violations = Vec::new();

        let container_type = raw
            .container_type
            .parse::<ContainerType>()
            .map_err(|err| TemplateError::schema(&format!("{base}.container_type"), err))?;
        let parent_container_type = match raw.parent_container_type.as_deref() {
            Some(kind) => Some(kind.parse::<ContainerType>().map_err(|err| {
                TemplateError::schema(&format!("{base}.parent_container_type"), err)
            })?),
            None => None,
        };

        let id = raw
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("{container_type}_{idx}"));

        let predicates = raw
            .where_
            .into_iter()
            .map(|(attribute, accepted)| WherePredicate {
                attribute,
                accepted: match accepted {
                    Value::Array(items) => items,
                    scalar => vec![scalar],
                },
            })
            .collect();

        let mut properties = Vec::with_capacity(raw.properties.len());
        for (name, value) in raw.properties {
            let path = format!("{base}.properties.{name}");
            match PropertySpec::compile(value, &path) {
                Ok(spec) => properties.push((name, spec)),
                Err(TemplateError::Schema { violations: found }) => violations.extend(found),
                Err(err) => return Err(err),
            }
        }

        if !violations.is_empty() {
            return Err(TemplateError::Schema { violations });
        }

        Ok(Self {
            id,
            container_type,
            parent_container_type,
            description: raw.description,
            predicates,
            properties,
            required: raw.required,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn container_type(&self) -> ContainerType {
        self.container_type
    }

    #[must_use]
    pub const fn parent_container_type(&self) -> Option<ContainerType> {
        self.parent_container_type
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn predicates(&self) -> &[WherePredicate] {
        &self.predicates
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[(String, PropertySpec)] {
        &self.properties
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, spec)| spec)
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Writes every declared default whose key is absent from `block`.
    pub fn fill_defaults(&self, block: &mut Map<String, Value>) {
        for (name, spec) in &self.properties {
            if !block.contains_key(name) {
                block.insert(name.clone(), spec.default.clone());
            }
        }
    }
}

impl PropertySpec {
    fn compile(value: Value, path: &str) -> Result<Self> {
        let raw: RawProperty =
            serde_json::from_value(value).map_err(|err| TemplateError::schema(path, err.to_string()))?;

        let auto_update = match raw.auto_update.as_deref() {
            Some(source) => Some(Template::parse(source).map_err(|err| {
                TemplateError::schema(&format!("{path}.auto_update"), err.to_string())
            })?),
            None => None,
        };
        let initialize = match raw.initialize.as_ref() {
            Some(init) => Some(Initializer::compile(init, &format!("{path}.initialize"))?),
            None => None,
        };

        Ok(Self {
            kind: raw.kind,
            label: raw.label,
            default: raw.default.unwrap_or_else(|| Value::String(String::new())),
            enum_values: raw.enum_values,
            auto_update,
            initialize,
        })
    }
}

/// The bundled catalog used when no other is configured.
#[must_use]
pub fn default_catalog() -> Namespace {
    Namespace::bids()
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Namespace> {
    let path = path.as_ref();
    log::info!("loading template catalog from {}", path.display());
    Namespace::from_file(path)
}

fn parse_raw(bytes: &[u8]) -> Result<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(value) => Ok(value),
        Err(json_err) => {
            let text = std::str::from_utf8(bytes).map_err(|_| {
                TemplateError::Parse(format!("catalog is not valid JSON ({json_err})"))
            })?;
            let table: toml::Value = toml::from_str(text).map_err(|toml_err| {
                TemplateError::Parse(format!(
                    "catalog is neither JSON ({json_err}) nor TOML ({toml_err})"
                ))
            })?;
            serde_json::to_value(table).map_err(|err| TemplateError::Parse(err.to_string()))
        }
    }
}

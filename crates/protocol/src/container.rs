use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Sentinel stored in place of a metadata block when no rule matched.
pub const NOT_APPLICABLE: &str = "NA";

/// Level of a container in the project hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Project,
    Subject,
    Session,
    Acquisition,
    File,
}

impl ContainerType {
    pub const ALL: [Self; 5] = [
        Self::Project,
        Self::Subject,
        Self::Session,
        Self::Acquisition,
        Self::File,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Subject => "subject",
            Self::Session => "session",
            Self::Acquisition => "acquisition",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown container type '{s}' (expected one of: project, subject, session, acquisition, file)"
                )
            })
    }
}

/// Shallow snapshot of one container's own fields.
///
/// Child collections are not part of the snapshot; the only field the engine
/// writes is `info[<namespace>]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container(Map<String, Value>);

impl Container {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON value; anything but an object yields `None`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get("_id").and_then(Value::as_str)
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.get("label").and_then(Value::as_str)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }

    #[must_use]
    pub fn info(&self) -> Option<&Map<String, Value>> {
        self.get("info").and_then(Value::as_object)
    }

    /// Returns the `info` map, creating it (or replacing a non-object) first.
    pub fn info_mut(&mut self) -> &mut Map<String, Value> {
        let slot = self
            .0
            .entry("info")
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("info slot was just normalized to an object"),
        }
    }

    #[must_use]
    pub fn has_block(&self, namespace: &str) -> bool {
        self.info().is_some_and(|info| info.contains_key(namespace))
    }

    /// Parsed copy of `info[namespace]`.
    #[must_use]
    pub fn block(&self, namespace: &str) -> Option<MetadataBlock> {
        self.info()
            .and_then(|info| info.get(namespace))
            .and_then(MetadataBlock::from_value)
    }

    pub fn set_block(&mut self, namespace: &str, block: MetadataBlock) {
        self.info_mut()
            .insert(namespace.to_string(), block.into_value());
    }

    /// Mutable access to the property map of a populated block.
    pub fn block_fields_mut(&mut self, namespace: &str) -> Option<&mut Map<String, Value>> {
        self.0
            .get_mut("info")
            .and_then(Value::as_object_mut)
            .and_then(|info| info.get_mut(namespace))
            .and_then(Value::as_object_mut)
    }

    /// Removes `info[namespace]`; returns whether anything was removed.
    pub fn clear_block(&mut self, namespace: &str) -> bool {
        self.0
            .get_mut("info")
            .and_then(Value::as_object_mut)
            .and_then(|info| info.remove(namespace))
            .is_some()
    }
}

impl From<Map<String, Value>> for Container {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The namespaced metadata a rule computes for a container.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataBlock {
    /// No rule matched the container.
    NotApplicable,
    /// Property name → value, plus the engine-owned `template`, `valid` and
    /// `error_message` keys.
    Fields(Map<String, Value>),
}

impl MetadataBlock {
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if s == NOT_APPLICABLE => Some(Self::NotApplicable),
            Value::Object(map) => Some(Self::Fields(map.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::NotApplicable => Value::String(NOT_APPLICABLE.to_string()),
            Self::Fields(map) => Value::Object(map),
        }
    }

    #[must_use]
    pub const fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable)
    }

    #[must_use]
    pub const fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::NotApplicable => None,
            Self::Fields(map) => Some(map),
        }
    }

    /// Name of the rule that produced this block, if recorded.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        self.fields()
            .and_then(|map| map.get("template"))
            .and_then(Value::as_str)
    }
}

impl Serialize for MetadataBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
            Self::Fields(map) => map.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for MetadataBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).ok_or_else(|| {
            D::Error::custom(format!(
                "metadata block must be an object or \"{NOT_APPLICABLE}\", got {value}"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn container(value: Value) -> Container {
        Container::from_value(value).unwrap()
    }

    #[test]
    fn container_type_round_trips_through_str() {
        for kind in ContainerType::ALL {
            assert_eq!(kind.as_str().parse::<ContainerType>().unwrap(), kind);
        }
        assert!("dataset".parse::<ContainerType>().is_err());
    }

    #[test]
    fn block_reads_sentinel_and_objects() {
        let na = container(json!({"info": {"BIDS": "NA"}}));
        assert_eq!(na.block("BIDS"), Some(MetadataBlock::NotApplicable));

        let filled = container(json!({"info": {"BIDS": {"template": "anat_file"}}}));
        let block = filled.block("BIDS").unwrap();
        assert_eq!(block.template(), Some("anat_file"));

        let garbage = container(json!({"info": {"BIDS": 42}}));
        assert_eq!(garbage.block("BIDS"), None);
        assert!(garbage.has_block("BIDS"));
    }

    #[test]
    fn info_mut_replaces_non_object_info() {
        let mut file = container(json!({"name": "a.nii.gz", "info": "junk"}));
        file.set_block("BIDS", MetadataBlock::NotApplicable);
        assert_eq!(file.get("info"), Some(&json!({"BIDS": "NA"})));
    }

    #[test]
    fn clear_block_reports_removal() {
        let mut file = container(json!({"info": {"BIDS": {"Folder": "anat"}, "other": 1}}));
        assert!(file.clear_block("BIDS"));
        assert!(!file.clear_block("BIDS"));
        assert_eq!(file.get("info"), Some(&json!({"other": 1})));
    }

    #[test]
    fn block_serializes_sentinel_as_string() {
        let value = serde_json::to_value(MetadataBlock::NotApplicable).unwrap();
        assert_eq!(value, json!("NA"));
        let parsed: MetadataBlock = serde_json::from_value(json!({"Folder": "func"})).unwrap();
        assert_eq!(parsed.fields().unwrap()["Folder"], json!("func"));
        assert!(serde_json::from_value::<MetadataBlock>(json!(7)).is_err());
    }
}

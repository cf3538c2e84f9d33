//! Node, argument and project types.
//!
//! Defines the YAML schema for declarative trees: tagged nodes, the arguments
//! an isomorphic app receives, and the runtime mode that gates plugin
//! construction. All types derive Serialize/Deserialize for YAML roundtripping.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Free-form, order-preserving property bag.
pub type Properties = IndexMap<String, serde_yaml_ng::Value>;

// ============================================================================
// Top-level isotree.yaml
// ============================================================================

/// Root project file — one isomorphic app and its declarative tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// The isomorphic app arguments, including its children
    pub app: IsomorphicArgs,
}

// ============================================================================
// Node kinds
// ============================================================================

/// Discriminator carried by every node in the tree.
///
/// Unknown tags are preserved as [`InstanceType::Other`] so that trees
/// authored for newer node kinds still load; they simply match no capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceType {
    Isomorphic,
    Middleware,
    WebApp,
    Route,
    Service,
    Storage,
    DataLayer,
    Environment,
    Identity,
    Authentication,
    Other(String),
}

impl InstanceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Isomorphic => "IsomorphicComponent",
            Self::Middleware => "Middleware",
            Self::WebApp => "WebApp",
            Self::Route => "Route",
            Self::Service => "Service",
            Self::Storage => "Storage",
            Self::DataLayer => "DataLayer",
            Self::Environment => "Environment",
            Self::Identity => "Identity",
            Self::Authentication => "Authentication",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for InstanceType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "IsomorphicComponent" => Self::Isomorphic,
            "Middleware" => Self::Middleware,
            "WebApp" => Self::WebApp,
            "Route" => Self::Route,
            "Service" => Self::Service,
            "Storage" => Self::Storage,
            "DataLayer" => Self::DataLayer,
            "Environment" => Self::Environment,
            "Identity" => Self::Identity,
            "Authentication" => Self::Authentication,
            _ => Self::Other(s),
        }
    }
}

impl From<InstanceType> for String {
    fn from(t: InstanceType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A single node of the declarative tree.
///
/// The tag is fixed at construction: there is no setter, and deserialization
/// writes it exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Kind discriminator; a node without one never matches a capability
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    instance_type: Option<InstanceType>,

    /// Identifier (data layers use it to name themselves)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Ordered children; `None` marks an opaque leaf
    #[serde(
        default,
        deserialize_with = "deserialize_children",
        skip_serializing_if = "Option::is_none"
    )]
    pub children: Option<Vec<Node>>,

    /// Everything else the author attached to the node
    #[serde(flatten)]
    pub props: Properties,
}

impl Node {
    /// Create a tagged node with no id and no children.
    pub fn new(instance_type: InstanceType) -> Self {
        Self {
            instance_type: Some(instance_type),
            ..Self::default()
        }
    }

    /// Create a node that carries no discriminator.
    pub fn untagged() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: serde_yaml_ng::Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn instance_type(&self) -> Option<&InstanceType> {
        self.instance_type.as_ref()
    }
}

// ============================================================================
// Isomorphic app arguments
// ============================================================================

/// Arguments a user supplies to an isomorphic app.
///
/// Every field defaults so that missing values surface as validation errors
/// instead of parse failures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsomorphicArgs {
    /// Name of the deployed stack; becomes the instance id
    #[serde(default)]
    pub stack_name: String,

    /// Local, relative directory for the final bundles
    #[serde(default)]
    pub build_path: String,

    /// Relative directory for client assets
    #[serde(default)]
    pub assets_path: String,

    /// Cloud region (opaque)
    #[serde(default)]
    pub region: String,

    /// Runtime mode set by the host (e.g. "COMPILATION")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure_mode: Option<String>,

    /// Additional permission statements, passed through untouched
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iam_role_statements: Vec<serde_yaml_ng::Value>,

    /// The declarative subtree
    #[serde(
        default,
        deserialize_with = "deserialize_children",
        skip_serializing_if = "Option::is_none"
    )]
    pub children: Option<Vec<Node>>,

    /// Any other user-supplied keys
    #[serde(flatten)]
    pub extra: Properties,
}

// ============================================================================
// Mode
// ============================================================================

/// Host runtime mode. Only [`Mode::Compilation`] permits plugin construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Compilation,
    Deployment,
    Domain,
    Other(String),
}

impl Mode {
    pub fn is_compilation(&self) -> bool {
        matches!(self, Self::Compilation)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Compilation => "COMPILATION",
            Self::Deployment => "DEPLOYMENT",
            Self::Domain => "DOMAIN",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Mode {
    fn from(s: &str) -> Self {
        match s {
            "COMPILATION" => Self::Compilation,
            "DEPLOYMENT" => Self::Deployment,
            "DOMAIN" => Self::Domain,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Mode> for String {
    fn from(m: Mode) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Value helpers
// ============================================================================

/// Convert a serde_yaml_ng::Value to a string (used for mapping keys).
pub fn yaml_value_to_string(val: &serde_yaml_ng::Value) -> String {
    match val {
        serde_yaml_ng::Value::String(s) => s.clone(),
        serde_yaml_ng::Value::Number(n) => n.to_string(),
        serde_yaml_ng::Value::Bool(b) => b.to_string(),
        serde_yaml_ng::Value::Null => String::new(),
        other => format!("{:?}", other),
    }
}

/// Lenient `children` field: a sequence is kept, a single mapping becomes a
/// one-element list, and a scalar or null becomes an empty list.
///
/// Non-mapping entries inside a sequence (e.g. bare text) are dropped.
fn deserialize_children<'de, D>(deserializer: D) -> Result<Option<Vec<Node>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_yaml_ng::Value::deserialize(deserializer)?;
    children_from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

fn children_from_value(value: serde_yaml_ng::Value) -> Result<Vec<Node>, serde_yaml_ng::Error> {
    match value {
        serde_yaml_ng::Value::Sequence(items) => items
            .into_iter()
            .filter(serde_yaml_ng::Value::is_mapping)
            .map(serde_yaml_ng::from_value)
            .collect(),
        serde_yaml_ng::Value::Mapping(_) => Ok(vec![serde_yaml_ng::from_value(value)?]),
        serde_yaml_ng::Value::Tagged(tagged) => children_from_value(tagged.value),
        _ => Ok(Vec::new()),
    }
}

/// Serialize a value into a flat property bag.
///
/// Non-mapping values are rejected: only structs and maps have keys to merge.
pub fn to_properties<T: Serialize>(value: &T) -> Result<Properties, String> {
    match serde_yaml_ng::to_value(value).map_err(|e| format!("serialize error: {}", e))? {
        serde_yaml_ng::Value::Mapping(map) => Ok(map
            .into_iter()
            .map(|(k, v)| (yaml_value_to_string(&k), v))
            .collect()),
        serde_yaml_ng::Value::Null => Ok(Properties::new()),
        other => Err(format!("expected a mapping, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types_project_parse() {
        let yaml = r#"
version: "1.0"
app:
  stackName: shop
  buildPath: build
  assetsPath: assets
  region: eu-west-1
  children:
    - type: Middleware
    - type: WebApp
      path: /
      children:
        - type: Route
    - type: DataLayer
      id: main-db
"#;
        let config: ProjectConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.app.stack_name, "shop");
        assert_eq!(config.app.region, "eu-west-1");
        let children = config.app.children.unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].instance_type(), Some(&InstanceType::Middleware));
        assert_eq!(children[1].props["path"], serde_yaml_ng::Value::from("/"));
        assert_eq!(children[2].id.as_deref(), Some("main-db"));
    }

    #[test]
    fn test_types_unknown_tag_preserved() {
        let node: Node = serde_yaml_ng::from_str("type: Queue\nid: q1").unwrap();
        assert_eq!(
            node.instance_type(),
            Some(&InstanceType::Other("Queue".to_string()))
        );
        let back = serde_yaml_ng::to_string(&node).unwrap();
        assert!(back.contains("type: Queue"));
    }

    #[test]
    fn test_types_untagged_node() {
        let node: Node = serde_yaml_ng::from_str("label: plain").unwrap();
        assert!(node.instance_type().is_none());
        assert!(node.children.is_none());
        assert_eq!(node.props.len(), 1);
    }

    #[test]
    fn test_types_children_single_mapping() {
        let node: Node =
            serde_yaml_ng::from_str("type: WebApp\nchildren:\n  type: Route\n  id: r1\n").unwrap();
        let children = node.children.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].instance_type(), Some(&InstanceType::Route));
        assert_eq!(children[0].id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_types_children_scalar_is_empty() {
        let node: Node = serde_yaml_ng::from_str("type: WebApp\nchildren: 5\n").unwrap();
        assert_eq!(node.children, Some(vec![]));
        let node: Node = serde_yaml_ng::from_str("type: WebApp\nchildren: ~\n").unwrap();
        assert_eq!(node.children, Some(vec![]));
    }

    #[test]
    fn test_types_children_skips_text_entries() {
        let node: Node = serde_yaml_ng::from_str(
            "type: WebApp\nchildren:\n  - hello\n  - type: Middleware\n  - 3\n",
        )
        .unwrap();
        let children = node.children.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].instance_type(), Some(&InstanceType::Middleware));
    }

    #[test]
    fn test_types_instance_type_display() {
        assert_eq!(InstanceType::Isomorphic.to_string(), "IsomorphicComponent");
        assert_eq!(InstanceType::DataLayer.to_string(), "DataLayer");
        assert_eq!(
            InstanceType::from("IsomorphicComponent".to_string()),
            InstanceType::Isomorphic
        );
    }

    #[test]
    fn test_types_mode_parse() {
        assert_eq!(Mode::from("COMPILATION"), Mode::Compilation);
        assert_eq!(Mode::from("DEPLOYMENT"), Mode::Deployment);
        assert_eq!(Mode::from("compilation"), Mode::Other("compilation".into()));
        assert!(Mode::Compilation.is_compilation());
        assert!(!Mode::from("SYNTHESIS").is_compilation());
        assert_eq!(Mode::Domain.to_string(), "DOMAIN");
    }

    #[test]
    fn test_types_args_defaults() {
        let args: IsomorphicArgs = serde_yaml_ng::from_str("stackName: s1").unwrap();
        assert_eq!(args.stack_name, "s1");
        assert!(args.build_path.is_empty());
        assert!(args.children.is_none());
        assert!(args.infrastructure_mode.is_none());
        assert!(args.extra.is_empty());
    }

    #[test]
    fn test_types_args_extra_keys() {
        let args: IsomorphicArgs =
            serde_yaml_ng::from_str("stackName: s1\nowner: team-a\n").unwrap();
        assert_eq!(args.extra["owner"], serde_yaml_ng::Value::from("team-a"));
    }

    #[test]
    fn test_types_to_properties() {
        let args = IsomorphicArgs {
            stack_name: "s1".to_string(),
            region: "us-east-1".to_string(),
            ..IsomorphicArgs::default()
        };
        let props = to_properties(&args).unwrap();
        assert_eq!(props["stackName"], serde_yaml_ng::Value::from("s1"));
        assert_eq!(props["region"], serde_yaml_ng::Value::from("us-east-1"));
        assert!(!props.contains_key("children"));
    }

    #[test]
    fn test_types_to_properties_rejects_scalar() {
        assert!(to_properties(&42).is_err());
    }

    #[test]
    fn test_types_yaml_value_to_string() {
        assert_eq!(
            yaml_value_to_string(&serde_yaml_ng::Value::String("hello".into())),
            "hello"
        );
        assert_eq!(yaml_value_to_string(&serde_yaml_ng::Value::Bool(true)), "true");
        assert_eq!(yaml_value_to_string(&serde_yaml_ng::Value::Null), "");
    }
}

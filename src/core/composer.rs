//! Node composer — turn isomorphic app arguments into a composed node.
//!
//! A composed node is three layers:
//! 1. the user's [`IsomorphicArgs`]
//! 2. the generated [`InfrastructureDescriptor`] (type tag, id, pipeline request)
//! 3. the [`IsomorphicProps`] derived by searching the children
//!
//! [`ComposedNode::to_properties`] flattens them with [`merge_layers`] in that
//! precedence order. Later layers win on key collisions; every collision is
//! reported and logged.

use super::capability::{is_data_layer, is_middleware, is_service_or_storage, is_web_app};
use super::pipeline::{PipelineRequest, PluginRecord};
use super::search::find_recursively;
use super::types::{to_properties, InstanceType, IsomorphicArgs, Mode, Node, Properties};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Identifies a composed node as configuration-level infrastructure.
pub const INFRASTRUCTURE_TYPE_CONFIGURATION: &str = "configuration";

/// Generated identity of a composed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureDescriptor {
    pub infrastructure_type: String,
    pub instance_id: String,
    pub instance_type: InstanceType,
    /// Deferred plugin factory, evaluated by the host in compilation mode
    pub create_plugins: PipelineRequest,
}

/// Properties derived from the app's children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsomorphicProps {
    pub middlewares: Vec<Node>,
    pub web_apps: Vec<Node>,
    /// Services and storages, in discovery order
    pub services: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_layer_id: Option<String>,
}

/// The result of composing an isomorphic app.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedNode {
    pub args: IsomorphicArgs,
    pub descriptor: InfrastructureDescriptor,
    pub props: IsomorphicProps,
}

/// Which layer a merged key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Args,
    Descriptor,
    Derived,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args => write!(f, "args"),
            Self::Descriptor => write!(f, "descriptor"),
            Self::Derived => write!(f, "derived"),
        }
    }
}

/// A key defined by more than one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCollision {
    pub key: String,
    pub shadowed: Layer,
    pub winner: Layer,
}

/// Merged property bag plus every collision encountered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub merged: Properties,
    pub collisions: Vec<KeyCollision>,
}

/// Merge three property layers with precedence args < descriptor < derived.
///
/// Key order follows first appearance. A later layer overwrites the value of
/// an existing key in place.
pub fn merge_layers(args: Properties, descriptor: Properties, derived: Properties) -> MergeReport {
    let mut report = MergeReport::default();
    let mut origin: std::collections::HashMap<String, Layer> = std::collections::HashMap::new();

    for (layer, bag) in [
        (Layer::Args, args),
        (Layer::Descriptor, descriptor),
        (Layer::Derived, derived),
    ] {
        for (key, value) in bag {
            if let Some(shadowed) = origin.insert(key.clone(), layer) {
                warn!(key = %key, shadowed = %shadowed, winner = %layer, "property key collision");
                report.collisions.push(KeyCollision {
                    key: key.clone(),
                    shadowed,
                    winner: layer,
                });
            }
            report.merged.insert(key, value);
        }
    }

    report
}

/// Compose an isomorphic app from its arguments.
pub fn compose(args: IsomorphicArgs) -> ComposedNode {
    let descriptor = InfrastructureDescriptor {
        infrastructure_type: INFRASTRUCTURE_TYPE_CONFIGURATION.to_string(),
        instance_id: args.stack_name.clone(),
        instance_type: InstanceType::Isomorphic,
        create_plugins: PipelineRequest {
            mode: args.infrastructure_mode.as_deref().map(Mode::from),
            build_path: args.build_path.clone(),
            assets_path: args.assets_path.clone(),
        },
    };

    let children = args.children.as_deref();
    let data_layers = find_recursively(children, is_data_layer);
    let props = IsomorphicProps {
        middlewares: cloned(find_recursively(children, is_middleware)),
        web_apps: cloned(find_recursively(children, is_web_app)),
        services: cloned(find_recursively(children, is_service_or_storage)),
        data_layer_id: first_data_layer_id(&data_layers),
    };

    if data_layers.len() > 1 {
        warn!(
            stack = %args.stack_name,
            count = data_layers.len(),
            chosen = props.data_layer_id.as_deref().unwrap_or(""),
            "multiple data layers found, using the first"
        );
    }
    debug!(
        stack = %args.stack_name,
        middlewares = props.middlewares.len(),
        web_apps = props.web_apps.len(),
        services = props.services.len(),
        "composed isomorphic app"
    );

    ComposedNode {
        args,
        descriptor,
        props,
    }
}

fn cloned(nodes: Vec<&Node>) -> Vec<Node> {
    nodes.into_iter().cloned().collect()
}

/// First non-empty id in discovery order; later candidates are ignored.
fn first_data_layer_id(data_layers: &[&Node]) -> Option<String> {
    data_layers.iter().fold(None, |found, dl| {
        found.or_else(|| dl.id.clone().filter(|id| !id.is_empty()))
    })
}

impl ComposedNode {
    pub fn instance_type(&self) -> &InstanceType {
        &self.descriptor.instance_type
    }

    pub fn instance_id(&self) -> &str {
        &self.descriptor.instance_id
    }

    pub fn pipeline(&self) -> &PipelineRequest {
        &self.descriptor.create_plugins
    }

    /// Evaluate the deferred plugin factory. Empty outside compilation mode.
    pub fn create_plugins(
        &self,
        config_path: &str,
        stage: Option<&str>,
        parser_mode: &str,
    ) -> Vec<PluginRecord> {
        self.pipeline().create_plugins(config_path, stage, parser_mode)
    }

    /// Ids of every data layer in the tree, in discovery order.
    pub fn data_layer_candidates(&self) -> Vec<&str> {
        find_recursively(self.args.children.as_deref(), is_data_layer)
            .into_iter()
            .filter_map(|n| n.id.as_deref())
            .collect()
    }

    /// Flatten the three layers into a single property bag.
    pub fn to_properties(&self) -> Result<MergeReport, String> {
        Ok(merge_layers(
            to_properties(&self.args)?,
            to_properties(&self.descriptor)?,
            to_properties(&self.props)?,
        ))
    }

    /// Re-express this app as a tree node so sibling composers can find it.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(InstanceType::Isomorphic)
            .with_id(self.instance_id())
            .with_prop("region", serde_yaml_ng::Value::from(self.args.region.as_str()));
        node.children.clone_from(&self.args.children);
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::is_isomorphic_app;
    use crate::core::pipeline::{PluginKind, PIPELINE_ORDER};
    use crate::core::search::find_recursively;

    fn args(children: Option<Vec<Node>>) -> IsomorphicArgs {
        IsomorphicArgs {
            stack_name: "s1".to_string(),
            build_path: "build".to_string(),
            assets_path: "assets".to_string(),
            region: "us-east-1".to_string(),
            children,
            ..IsomorphicArgs::default()
        }
    }

    fn bag(pairs: &[(&str, i64)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_yaml_ng::Value::from(*v)))
            .collect()
    }

    #[test]
    fn test_compose_empty_children() {
        let node = compose(args(Some(vec![])));
        assert_eq!(node.instance_type(), &InstanceType::Isomorphic);
        assert_eq!(node.instance_type().to_string(), "IsomorphicComponent");
        assert_eq!(node.instance_id(), "s1");
        assert!(node.props.middlewares.is_empty());
        assert!(node.props.web_apps.is_empty());
        assert!(node.props.services.is_empty());
        assert!(node.props.data_layer_id.is_none());
        assert_eq!(
            node.descriptor.infrastructure_type,
            INFRASTRUCTURE_TYPE_CONFIGURATION
        );
    }

    #[test]
    fn test_compose_absent_children() {
        let node = compose(args(None));
        assert!(node.props.middlewares.is_empty());
        assert!(node.props.services.is_empty());
        assert!(node.data_layer_candidates().is_empty());
    }

    #[test]
    fn test_compose_first_data_layer_wins() {
        let tree = vec![
            Node::new(InstanceType::WebApp).with_children(vec![
                Node::new(InstanceType::DataLayer).with_id("a").with_children(vec![
                    Node::new(InstanceType::DataLayer).with_id("b"),
                ]),
            ]),
            Node::new(InstanceType::DataLayer).with_id("c"),
        ];
        let node = compose(args(Some(tree)));
        assert_eq!(node.props.data_layer_id.as_deref(), Some("a"));
        assert_eq!(node.data_layer_candidates(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compose_data_layer_skips_missing_ids() {
        let tree = vec![
            Node::new(InstanceType::DataLayer),
            Node::new(InstanceType::DataLayer).with_id(""),
            Node::new(InstanceType::DataLayer).with_id("db"),
        ];
        let node = compose(args(Some(tree)));
        assert_eq!(node.props.data_layer_id.as_deref(), Some("db"));
    }

    #[test]
    fn test_compose_groups_in_discovery_order() {
        let tree = vec![
            Node::new(InstanceType::Middleware).with_id("cors"),
            Node::new(InstanceType::Storage).with_id("files"),
            Node::new(InstanceType::WebApp).with_id("main").with_children(vec![
                Node::new(InstanceType::Middleware).with_id("auth"),
                Node::new(InstanceType::Route).with_children(vec![
                    Node::new(InstanceType::Service).with_id("api"),
                ]),
            ]),
        ];
        let node = compose(args(Some(tree)));
        fn ids(nodes: &[Node]) -> Vec<String> {
            nodes.iter().map(|n| n.id.clone().unwrap_or_default()).collect()
        }
        assert_eq!(ids(&node.props.middlewares), vec!["cors", "auth"]);
        assert_eq!(ids(&node.props.web_apps), vec!["main"]);
        assert_eq!(ids(&node.props.services), vec!["files", "api"]);
    }

    #[test]
    fn test_compose_pipeline_gated_by_mode() {
        let node = compose(args(Some(vec![])));
        assert!(node.pipeline().mode.is_none());
        assert!(node.create_plugins("cfg", Some("dev"), "spa").is_empty());

        let mut deploy = args(Some(vec![]));
        deploy.infrastructure_mode = Some("DEPLOYMENT".to_string());
        assert!(compose(deploy).create_plugins("cfg", None, "spa").is_empty());

        let mut compile = args(Some(vec![]));
        compile.infrastructure_mode = Some("COMPILATION".to_string());
        let records = compose(compile).create_plugins("cfg", Some("dev"), "spa");
        let kinds: Vec<PluginKind> = records.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, PIPELINE_ORDER.to_vec());
        assert_eq!(records[0].build_path.as_deref(), Some("build"));
        assert_eq!(records[2].assets_path.as_deref(), Some("assets"));
    }

    #[test]
    fn test_merge_last_write_wins() {
        let report = merge_layers(bag(&[("x", 1)]), bag(&[("x", 2)]), bag(&[("x", 3)]));
        assert_eq!(report.merged["x"], serde_yaml_ng::Value::from(3));
        assert_eq!(report.collisions.len(), 2);
        assert_eq!(report.collisions[0].shadowed, Layer::Args);
        assert_eq!(report.collisions[0].winner, Layer::Descriptor);
        assert_eq!(report.collisions[1].shadowed, Layer::Descriptor);
        assert_eq!(report.collisions[1].winner, Layer::Derived);
    }

    #[test]
    fn test_merge_disjoint_keeps_order() {
        let report = merge_layers(bag(&[("a", 1)]), bag(&[("b", 2)]), bag(&[("c", 3)]));
        assert!(report.collisions.is_empty());
        let keys: Vec<&str> = report.merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_compose_layers_do_not_collide() {
        let tree = vec![Node::new(InstanceType::DataLayer).with_id("db")];
        let mut a = args(Some(tree));
        a.infrastructure_mode = Some("COMPILATION".to_string());
        let report = compose(a).to_properties().unwrap();
        assert!(report.collisions.is_empty(), "{:?}", report.collisions);
        assert_eq!(report.merged["instanceType"], serde_yaml_ng::Value::from("IsomorphicComponent"));
        assert_eq!(report.merged["instanceId"], serde_yaml_ng::Value::from("s1"));
        assert_eq!(report.merged["stackName"], serde_yaml_ng::Value::from("s1"));
        assert_eq!(report.merged["dataLayerId"], serde_yaml_ng::Value::from("db"));
        assert!(report.merged.contains_key("createPlugins"));
        assert!(report.merged.contains_key("middlewares"));
    }

    #[test]
    fn test_compose_user_extra_is_shadowed() {
        let mut a = args(Some(vec![]));
        a.extra.insert(
            "instanceId".to_string(),
            serde_yaml_ng::Value::from("user-id"),
        );
        let report = compose(a).to_properties().unwrap();
        assert_eq!(report.merged["instanceId"], serde_yaml_ng::Value::from("s1"));
        assert_eq!(
            report.collisions,
            vec![KeyCollision {
                key: "instanceId".to_string(),
                shadowed: Layer::Args,
                winner: Layer::Descriptor,
            }]
        );
    }

    #[test]
    fn test_compose_to_node_is_discoverable() {
        let inner = compose(args(Some(vec![Node::new(InstanceType::WebApp)])));
        let outer = vec![Node::untagged().with_children(vec![inner.to_node()])];
        let found = find_recursively(Some(&outer[..]), is_isomorphic_app);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_deref(), Some("s1"));
        assert!(is_isomorphic_app(Some(&inner.to_node())));
        assert!(!is_isomorphic_app(None));
    }
}

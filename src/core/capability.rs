//! Capability predicates — classify nodes by their discriminator.
//!
//! Every predicate has the shape `fn(Option<&Node>) -> bool`, is total, and
//! looks only at the node's own tag. Sibling composers reuse these to search
//! each other's trees, so a new node kind only has to add its predicate here.

use super::types::{InstanceType, Node};
use std::str::FromStr;

/// A capability check over a possibly-absent node.
pub type Predicate = fn(Option<&Node>) -> bool;

fn has_type(node: Option<&Node>, kind: &InstanceType) -> bool {
    node.and_then(Node::instance_type)
        .is_some_and(|t| t == kind)
}

pub fn is_middleware(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::Middleware)
}

pub fn is_web_app(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::WebApp)
}

pub fn is_service(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::Service)
}

pub fn is_storage(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::Storage)
}

pub fn is_data_layer(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::DataLayer)
}

/// Recognise an isomorphic app, e.g. one produced by
/// [`ComposedNode::to_node`](super::composer::ComposedNode::to_node).
pub fn is_isomorphic_app(node: Option<&Node>) -> bool {
    has_type(node, &InstanceType::Isomorphic)
}

/// Services and storages are collected into the same group.
pub fn is_service_or_storage(node: Option<&Node>) -> bool {
    is_service(node) || is_storage(node)
}

/// OR together any number of predicates.
pub fn any_of(predicates: &[Predicate]) -> impl Fn(Option<&Node>) -> bool + '_ {
    move |node| predicates.iter().any(|p| p(node))
}

/// Named capability groups, as selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Middleware,
    WebApp,
    Service,
    Storage,
    ServiceOrStorage,
    DataLayer,
    Isomorphic,
}

impl Capability {
    pub fn predicate(self) -> Predicate {
        match self {
            Self::Middleware => is_middleware,
            Self::WebApp => is_web_app,
            Self::Service => is_service,
            Self::Storage => is_storage,
            Self::ServiceOrStorage => is_service_or_storage,
            Self::DataLayer => is_data_layer,
            Self::Isomorphic => is_isomorphic_app,
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "middleware" => Ok(Self::Middleware),
            "webapp" | "web-app" => Ok(Self::WebApp),
            "service" => Ok(Self::Service),
            "storage" => Ok(Self::Storage),
            "services" | "service-or-storage" => Ok(Self::ServiceOrStorage),
            "datalayer" | "data-layer" => Ok(Self::DataLayer),
            "isomorphic" => Ok(Self::Isomorphic),
            other => Err(format!(
                "unknown capability '{}' (expected middleware, webapp, service, storage, services, datalayer, isomorphic)",
                other
            )),
        }
    }
}

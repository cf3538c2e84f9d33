//! Plugin pipeline — decide which plugin units exist and in what order.
//!
//! Plugins are built only in [`Mode::Compilation`]. In every other mode the
//! pipeline is empty and no constructor runs, because constructing a plugin
//! may register global hooks. Construction itself is deferred: a composed
//! node carries a [`PipelineRequest`] value, and the host evaluates it when
//! (and if) it compiles.

use super::types::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The configuration-generating units an isomorphic app pulls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Isomorphic,
    DataLayer,
    WebApp,
    Service,
    Storage,
    Environment,
    Identity,
    Authentication,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isomorphic => write!(f, "isomorphic"),
            Self::DataLayer => write!(f, "data_layer"),
            Self::WebApp => write!(f, "web_app"),
            Self::Service => write!(f, "service"),
            Self::Storage => write!(f, "storage"),
            Self::Environment => write!(f, "environment"),
            Self::Identity => write!(f, "identity"),
            Self::Authentication => write!(f, "authentication"),
        }
    }
}

/// Fixed pipeline order. Later units may rely on earlier ones having
/// registered their configuration.
pub const PIPELINE_ORDER: [PluginKind; 8] = [
    PluginKind::Isomorphic,
    PluginKind::DataLayer,
    PluginKind::WebApp,
    PluginKind::Service,
    PluginKind::Storage,
    PluginKind::Environment,
    PluginKind::Identity,
    PluginKind::Authentication,
];

/// Shared inputs every unit may draw from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildContext {
    pub parser_mode: String,
    pub build_path: String,
    pub config_file_path: String,
    pub assets_path: String,
    pub stage: Option<String>,
}

/// Construction record handed to a plugin constructor.
///
/// Only the fields a unit consumes are populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub kind: PluginKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parser_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
}

impl PluginRecord {
    fn bare(kind: PluginKind) -> Self {
        Self {
            kind,
            parser_mode: None,
            build_path: None,
            config_file_path: None,
            assets_path: None,
            stage: None,
        }
    }
}

fn record_for(kind: PluginKind, ctx: &BuildContext) -> PluginRecord {
    let mut record = PluginRecord::bare(kind);
    match kind {
        PluginKind::Isomorphic | PluginKind::DataLayer => {
            record.parser_mode = Some(ctx.parser_mode.clone());
            record.build_path = Some(ctx.build_path.clone());
            record.config_file_path = Some(ctx.config_file_path.clone());
        }
        PluginKind::WebApp => {
            record.parser_mode = Some(ctx.parser_mode.clone());
            record.build_path = Some(ctx.build_path.clone());
            record.config_file_path = Some(ctx.config_file_path.clone());
            record.assets_path = Some(ctx.assets_path.clone());
        }
        PluginKind::Storage => {
            record.build_path = Some(ctx.build_path.clone());
            record.parser_mode = Some(ctx.parser_mode.clone());
        }
        PluginKind::Environment => {
            record.stage.clone_from(&ctx.stage);
            record.parser_mode = Some(ctx.parser_mode.clone());
        }
        PluginKind::Service | PluginKind::Identity | PluginKind::Authentication => {}
    }
    record
}

/// Build the ordered construction records for `mode`.
///
/// Empty unless `mode` is compilation.
pub fn build(mode: &Mode, ctx: &BuildContext) -> Vec<PluginRecord> {
    if !mode.is_compilation() {
        debug!(mode = %mode, "plugin pipeline gated off");
        return Vec::new();
    }
    let records: Vec<PluginRecord> = PIPELINE_ORDER
        .iter()
        .map(|kind| record_for(*kind, ctx))
        .collect();
    debug!(units = records.len(), build_path = %ctx.build_path, "plugin pipeline built");
    records
}

/// Host-side plugin construction. Units are opaque to this crate.
pub trait PluginConstructor {
    type Unit;

    fn construct(&mut self, record: PluginRecord) -> Self::Unit;
}

impl<F, U> PluginConstructor for F
where
    F: FnMut(PluginRecord) -> U,
{
    type Unit = U;

    fn construct(&mut self, record: PluginRecord) -> U {
        self(record)
    }
}

/// Feed each record to `constructor`, keeping pipeline order.
pub fn instantiate<C: PluginConstructor>(
    records: Vec<PluginRecord>,
    constructor: &mut C,
) -> Vec<C::Unit> {
    records
        .into_iter()
        .map(|record| constructor.construct(record))
        .collect()
}

/// The deferred plugin factory of a composed node.
///
/// Captures what is known at composition time; the host supplies the rest
/// when it evaluates the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    /// Mode the app was composed under; `None` never yields plugins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub build_path: String,
    pub assets_path: String,
}

impl PipelineRequest {
    /// Assemble the build context from the captured paths and host inputs.
    pub fn context(&self, config_path: &str, stage: Option<&str>, parser_mode: &str) -> BuildContext {
        BuildContext {
            parser_mode: parser_mode.to_string(),
            build_path: self.build_path.clone(),
            config_file_path: config_path.to_string(),
            assets_path: self.assets_path.clone(),
            stage: stage.map(str::to_string),
        }
    }

    /// Evaluate the request into construction records.
    pub fn create_plugins(
        &self,
        config_path: &str,
        stage: Option<&str>,
        parser_mode: &str,
    ) -> Vec<PluginRecord> {
        match &self.mode {
            Some(mode) => build(mode, &self.context(config_path, stage, parser_mode)),
            None => {
                debug!("plugin pipeline gated off: no mode set");
                Vec::new()
            }
        }
    }

    /// Evaluate the request and construct every unit with `constructor`.
    pub fn create_units<C: PluginConstructor>(
        &self,
        config_path: &str,
        stage: Option<&str>,
        parser_mode: &str,
        constructor: &mut C,
    ) -> Vec<C::Unit> {
        instantiate(self.create_plugins(config_path, stage, parser_mode), constructor)
    }
}

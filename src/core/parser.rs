//! YAML parsing and validation of isotree.yaml.
//!
//! Validates structural constraints (errors):
//! - Version must be "1.0"
//! - stackName, buildPath, assetsPath and region must be set
//!
//! Tree shape problems are only warnings, since composition tolerates them:
//! - A node without a type tag
//! - A data layer without an id
//! - More than one data layer (the first in pre-order is used)

use super::capability::is_data_layer;
use super::search::find_recursively;
use super::types::*;
use std::path::Path;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse an isotree.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<ProjectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse an isotree.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<ProjectConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &ProjectConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", config.version),
        });
    }

    let app = &config.app;
    for (field, value) in [
        ("stackName", &app.stack_name),
        ("buildPath", &app.build_path),
        ("assetsPath", &app.assets_path),
        ("region", &app.region),
    ] {
        if value.is_empty() {
            errors.push(ValidationError {
                message: format!("app.{} must not be empty", field),
            });
        }
    }

    errors
}

/// Collect non-fatal findings about the declarative tree.
pub fn tree_warnings(config: &ProjectConfig) -> Vec<ValidationError> {
    let mut warnings = Vec::new();
    let app = &config.app;

    if let Some(children) = &app.children {
        check_nodes(children, "app.children", &mut warnings);
    }

    let data_layers = find_recursively(app.children.as_deref(), is_data_layer);
    if data_layers.len() > 1 {
        let ids: Vec<&str> = data_layers
            .iter()
            .map(|n| n.id.as_deref().unwrap_or("?"))
            .collect();
        warnings.push(ValidationError {
            message: format!(
                "app declares {} data layers ({}); using the first",
                data_layers.len(),
                ids.join(", ")
            ),
        });
    }

    warnings
}

fn check_nodes(nodes: &[Node], path: &str, warnings: &mut Vec<ValidationError>) {
    for (i, node) in nodes.iter().enumerate() {
        let here = format!("{}[{}]", path, i);
        match node.instance_type() {
            None => warnings.push(ValidationError {
                message: format!("node {} has no type", here),
            }),
            Some(InstanceType::DataLayer) => {
                if node.id.as_deref().is_none_or(str::is_empty) {
                    warnings.push(ValidationError {
                        message: format!("node {} (DataLayer) has no id", here),
                    });
                }
            }
            Some(_) => {}
        }
        if let Some(children) = &node.children {
            check_nodes(children, &format!("{}.children", here), warnings);
        }
    }
}

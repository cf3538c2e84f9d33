//! CLI subcommands — init, validate, compose, plugins, discover.

use crate::core::capability::Capability;
use crate::core::search::{find_with_policy, DescentPolicy};
use crate::core::{composer, parser, pipeline, types};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new isotree project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate isotree.yaml
    Validate {
        /// Path to isotree.yaml
        #[arg(short, long, default_value = "isotree.yaml")]
        file: PathBuf,
    },

    /// Compose the app and print the merged node
    Compose {
        /// Path to isotree.yaml
        #[arg(short, long, default_value = "isotree.yaml")]
        file: PathBuf,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Evaluate the app's plugin pipeline
    Plugins {
        /// Path to isotree.yaml
        #[arg(short, long, default_value = "isotree.yaml")]
        file: PathBuf,

        /// Override the app's infrastructure mode
        #[arg(long)]
        mode: Option<String>,

        /// Deployment stage passed to the environment plugin
        #[arg(long)]
        stage: Option<String>,

        /// Parser mode passed to every plugin
        #[arg(long, default_value = "full")]
        parser_mode: String,

        /// Config file path passed to the plugins (default: the project file)
        #[arg(long)]
        config_path: Option<String>,
    },

    /// List nodes of one capability group in discovery order
    Discover {
        /// Path to isotree.yaml
        #[arg(short, long, default_value = "isotree.yaml")]
        file: PathBuf,

        /// Capability group (middleware, webapp, service, storage, services, datalayer, isomorphic)
        #[arg(short, long)]
        kind: Capability,

        /// Do not descend below a matching node
        #[arg(long)]
        exclusive: bool,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Compose { file, json } => cmd_compose(&file, json),
        Commands::Plugins {
            file,
            mode,
            stage,
            parser_mode,
            config_path,
        } => cmd_plugins(
            &file,
            mode.as_deref(),
            stage.as_deref(),
            &parser_mode,
            config_path.as_deref(),
        ),
        Commands::Discover {
            file,
            kind,
            exclusive,
        } => cmd_discover(&file, kind, exclusive),
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("isotree.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;

    let template = r#"version: "1.0"
app:
  stackName: my-stack
  buildPath: build
  assetsPath: assets
  region: us-east-1
  children:
    - type: WebApp
      id: main
"#;
    std::fs::write(&config_path, template)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized isotree project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let composed = composer::compose(config.app);
    println!(
        "OK: {} ({} middlewares, {} web apps, {} services)",
        composed.instance_id(),
        composed.props.middlewares.len(),
        composed.props.web_apps.len(),
        composed.props.services.len()
    );
    Ok(())
}

/// Parse and validate an isotree config file, returning errors if invalid.
/// Tree warnings are printed but never fail the command.
fn parse_and_validate(file: &Path) -> Result<types::ProjectConfig, String> {
    let config = parser::parse_config_file(file)?;
    for w in parser::tree_warnings(&config) {
        eprintln!("  WARNING: {}", w);
    }
    let errors = parser::validate_config(&config);
    if errors.is_empty() {
        return Ok(config);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err(format!("{} validation error(s)", errors.len()))
}

fn cmd_compose(file: &Path, json: bool) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    println!("{}", render_composed(config.app, json)?);
    Ok(())
}

/// Compose an app and serialize the merged property bag.
fn render_composed(args: types::IsomorphicArgs, json: bool) -> Result<String, String> {
    let report = composer::compose(args).to_properties()?;
    for c in &report.collisions {
        eprintln!(
            "  WARNING: key '{}' from {} overridden by {}",
            c.key, c.shadowed, c.winner
        );
    }
    if json {
        serde_json::to_string_pretty(&report.merged).map_err(|e| format!("JSON error: {}", e))
    } else {
        serde_yaml_ng::to_string(&report.merged).map_err(|e| format!("YAML error: {}", e))
    }
}

fn cmd_plugins(
    file: &Path,
    mode: Option<&str>,
    stage: Option<&str>,
    parser_mode: &str,
    config_path: Option<&str>,
) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    let default_config_path = file.display().to_string();
    let records = plugin_records(
        config.app,
        mode,
        stage,
        parser_mode,
        config_path.unwrap_or(&default_config_path),
    );

    if records.is_empty() {
        println!("No plugins (pipeline is only built in COMPILATION mode).");
        return Ok(());
    }
    for (i, record) in records.iter().enumerate() {
        let fields = serde_json::to_string(record).map_err(|e| format!("JSON error: {}", e))?;
        println!("  {}. {} {}", i + 1, record.kind, fields);
    }
    Ok(())
}

/// Compose the app (optionally under a different mode) and evaluate its pipeline.
fn plugin_records(
    mut args: types::IsomorphicArgs,
    mode: Option<&str>,
    stage: Option<&str>,
    parser_mode: &str,
    config_path: &str,
) -> Vec<pipeline::PluginRecord> {
    if let Some(mode) = mode {
        args.infrastructure_mode = Some(mode.to_string());
    }
    composer::compose(args).create_plugins(config_path, stage, parser_mode)
}

fn cmd_discover(file: &Path, kind: Capability, exclusive: bool) -> Result<(), String> {
    let config = parse_and_validate(file)?;
    for line in discover_lines(&config.app, kind, exclusive) {
        println!("{}", line);
    }
    Ok(())
}

fn discover_lines(args: &types::IsomorphicArgs, kind: Capability, exclusive: bool) -> Vec<String> {
    let policy = if exclusive {
        DescentPolicy::Exclusive
    } else {
        DescentPolicy::Inclusive
    };
    find_with_policy(args.children.as_deref(), kind.predicate(), policy)
        .into_iter()
        .map(|n| {
            let tag = n.instance_type().map(|t| t.to_string()).unwrap_or_default();
            match &n.id {
                Some(id) => format!("{} {}", tag, id),
                None => tag,
            }
        })
        .collect()
}

//! # xflow
//!
//! CLI for validating, inspecting and running YAML flow graphs.

mod definition;
mod operators;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use definition::{GraphDef, DEPENDS_ON};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xgraph::directed_sort;
use xgraph_flow::{analyze, parse_duration, Executor, FlowContext, NodeAttributes};

#[derive(Parser)]
#[command(name = "xflow")]
#[command(about = "Validate, inspect and run YAML dataflow graphs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a YAML graph definition
    Validate {
        /// Path to YAML file
        file: PathBuf,
    },

    /// Print evaluation order, inputs, outputs and node attributes
    Check {
        /// Path to YAML file
        file: PathBuf,
    },

    /// Run one flow through a graph
    Run {
        /// Path to YAML file
        file: PathBuf,

        /// Input JSON object keyed by input node
        #[arg(short, long)]
        input: Option<String>,

        /// Flow timeout, e.g. 500ms or 2s
        #[arg(long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { file } => validate_graph(&file),
        Commands::Check { file } => check_graph(&file),
        Commands::Run {
            file,
            input,
            timeout,
        } => run_graph(&file, input.as_deref(), timeout).await,
    }
}

fn load(file: &Path) -> Result<GraphDef> {
    let def = GraphDef::from_file(file)?;
    def.validate()
        .with_context(|| format!("invalid graph definition {}", file.display()))?;
    Ok(def)
}

fn validate_graph(file: &Path) -> Result<()> {
    let def = load(file)?;
    println!("✓ Graph is valid");
    println!("  Graph name: {}", def.name);
    println!("  Nodes: {}", def.nodes.len());
    println!("  Edges: {}", def.edges.len());
    Ok(())
}

fn check_graph(file: &Path) -> Result<()> {
    let def = load(file)?;
    let graph = def.build()?;
    let ordered = directed_sort(&graph, DEPENDS_ON)?;
    let compiled = analyze(def.name.as_str(), &graph, DEPENDS_ON, &ordered, &def.options)?;

    println!("✓ Graph structure is valid");
    println!("\nGraph Analysis:");
    println!("  Name: {}", def.name);
    if let Some(desc) = &def.description {
        println!("  Description: {}", desc);
    }
    println!("  Inputs: {}", join(compiled.input_nodes()));
    println!("  Outputs: {}", join(compiled.output_nodes()));

    println!("\nEvaluation order ({}):", ordered.len());
    for node in &ordered {
        let key = node.key();
        let attributes = NodeAttributes::from_attributes(node.attributes())?;
        let op = def
            .nodes
            .get(key.as_str())
            .and_then(|n| n.op.as_deref())
            .unwrap_or("collect");
        println!("  - {} [{}]", key, op);
        if !attributes.timeout.is_zero() {
            println!("      timeout: {:?}", attributes.timeout);
        }
        if attributes.max_workers > 0 {
            println!("      max_workers: {}", attributes.max_workers);
        }
        if attributes.inline {
            println!("      inline: true");
        }
        if let Some(sorter) = &attributes.edge_sorter {
            println!("      edge_sorter: {}", sorter);
        }
    }
    Ok(())
}

async fn run_graph(file: &Path, input: Option<&str>, timeout: Option<Duration>) -> Result<()> {
    let def = load(file)?;
    let args: Map<String, Value> = match input {
        Some(raw) => serde_json::from_str(raw).context("--input must be a JSON object")?,
        None => Map::new(),
    };

    let graph = def.build()?;
    let executor = Executor::new(def.name.as_str(), &graph, DEPENDS_ON, def.options.clone()).await?;
    tracing::info!(graph = %def.name, inputs = args.len(), "Running flow");

    // Without a deadline a flow missing an input would never finish.
    let missing: Vec<&str> = executor
        .input_nodes()
        .iter()
        .map(|k| k.as_str())
        .filter(|k| !args.contains_key(*k))
        .collect();
    if timeout.is_none() && !missing.is_empty() {
        executor.close().await?;
        bail!(
            "missing input(s): {}; supply them with --input or set --timeout",
            missing.join(", ")
        );
    }

    let mut ctx = FlowContext::background();
    if let Some(timeout) = timeout {
        ctx = ctx.with_timeout(timeout);
    }

    let outcome = execute(&executor, ctx, args).await;
    executor.close().await?;
    let (rendered, failures) = outcome?;

    println!("{}", serde_json::to_string_pretty(&rendered)?);
    if failures > 0 {
        bail!("{} output(s) failed", failures);
    }
    Ok(())
}

async fn execute(
    executor: &Executor,
    ctx: FlowContext,
    args: Map<String, Value>,
) -> Result<(Value, usize)> {
    let (_ctx, result) = executor.exec(ctx, args).await?;
    let outputs = result.await?;

    let mut rendered = Map::new();
    let mut failures = 0;
    for key in executor.output_nodes() {
        let value = match outputs.get(key) {
            Some(awaitable) => match awaitable.result().await {
                Ok(value) => value,
                Err(e) => {
                    failures += 1;
                    json!({ "error": e.to_string() })
                }
            },
            None => {
                failures += 1;
                json!({ "error": "no result" })
            }
        };
        rendered.insert(key.to_string(), value);
    }
    Ok((Value::Object(rendered), failures))
}

fn join(keys: &[xgraph::NodeKey]) -> String {
    keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", ")
}

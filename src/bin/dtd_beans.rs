//! DTD Beans CLI
//!
//! Parses a DTD (file or directory) and prints the schema graph, the
//! derived bean classes, a DOT export or diagnostics.

use std::path::{Path, PathBuf};
use anyhow::Context;
use clap::{Parser, Subcommand};
use dtd_beans::{
    bind_links, load_from_directory, load_from_file, BeanBuilder, BeansConfig, LoadConfig,
    SchemaGraph,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dtd-beans")]
#[command(about = "Parse DTDs into a schema graph and derive bean classes")]
struct Cli {
    /// DTD file, or directory of .dtd files
    input: PathBuf,

    /// Config file (defaults to dtd-beans.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Element to use as the document root
    #[arg(long)]
    root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of the schema graph
    Graph {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Derive bean classes and print them as JSON
    Beans {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export the element graph in DOT format
    Dot {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fuzzy search for element names
    Search {
        query: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Resolve a slash-separated path from the root element
    Xpath { path: String },

    /// Print diagnostics; exits non-zero on warnings
    Check,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load(input: &Path, beans: BeansConfig) -> anyhow::Result<SchemaGraph> {
    let config = LoadConfig::with_beans(beans);
    if input.is_dir() {
        load_from_directory(input, &config)
    } else {
        load_from_file(input, &config).with_context(|| format!("failed to load {}", input.display()))
    }
}

fn emit(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, content)?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut beans = BeansConfig::load_from(cli.config.as_deref()).context("failed to load config")?;
    if let Some(root) = cli.root {
        beans = beans.with_doc_root(root);
    }
    let mut graph = load(&cli.input, beans.clone())?;

    match cli.command {
        Commands::Graph { json } => {
            let summary = graph.summary();
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }
            println!("Root: {}", summary.root.as_deref().unwrap_or("-"));
            println!("Nodes: {}  Links: {}", summary.node_count, summary.link_count);
            for node in &summary.nodes {
                println!(
                    "  {} ({} refs) -> {}",
                    node.name,
                    node.ref_count,
                    node.uses.join(", ")
                );
            }
            if !summary.undefined.is_empty() {
                println!("Undefined: {}", summary.undefined.join(", "));
            }
            Ok(())
        }

        Commands::Beans { output } => {
            let mut builder = BeanBuilder::new(&graph, &beans);
            let classes = builder.build();
            let package = builder.package();
            let notes = builder.diagnostics().clone();
            bind_links(&mut graph, &classes);

            if !notes.is_empty() {
                eprint!("{}", notes.format_all());
            }
            let doc = serde_json::json!({
                "package": package,
                "classes": classes,
            });
            emit(output, &format!("{}\n", serde_json::to_string_pretty(&doc)?))
        }

        Commands::Dot { output } => emit(output, &graph.to_dot()),

        Commands::Search { query, limit } => {
            let results = graph.search(&query, limit);
            if results.is_empty() {
                println!("No elements match '{}'", query);
            }
            for r in results {
                let state = if r.created { "declared" } else { "undeclared" };
                println!("{:>5}  {} ({})", r.score, r.name, state);
            }
            Ok(())
        }

        Commands::Xpath { path } => {
            let root = graph.root().context("schema has no root element")?;
            let found = graph
                .xpath_from_node(root, &path)
                .and_then(|iter| iter.resolve());
            match found {
                Some(link) => {
                    let link_data = graph.link(link);
                    println!(
                        "{}{}",
                        graph.link_schema_name(link).unwrap_or("(group)"),
                        link_data.element_cardinality.suffix()
                    );
                    Ok(())
                }
                None => anyhow::bail!("no match for '{}'", path),
            }
        }

        Commands::Check => {
            let diagnostics = graph.diagnostics();
            print!("{}", diagnostics.format_all());
            if diagnostics.has_warnings() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

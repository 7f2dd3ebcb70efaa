use clap::{ArgAction, Args, Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use protograph::config::{load_config, save_config, ProtoGraphConfig, CONFIG_FILENAME};
use protograph::errors::{ProtoGraphError, Result};
use protograph::graph::selection::SELECT_IMPORTS;
use protograph::pipeline::{run_batch, ProtoGraph};

/// Type-reference diagrams for Protocol Buffers schemas.
#[derive(Parser)]
#[command(name = "protograph", about = "Type-reference diagrams for Protocol Buffers schemas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILENAME)]
    config: PathBuf,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

/// Overrides for the missing-symbol toggles of the config file.
#[derive(Args, Debug, Default)]
struct Toggles {
    /// Tolerate imports that cannot be opened
    #[arg(long, conflicts_with = "strict_imports")]
    allow_missing_imports: bool,
    /// Fail on any import that cannot be opened
    #[arg(long)]
    strict_imports: bool,
    /// Draw unresolved types as placeholder nodes
    #[arg(long, conflicts_with = "hide_missing_types")]
    show_missing_types: bool,
    /// Fail on any unresolved type
    #[arg(long)]
    hide_missing_types: bool,
}

impl Toggles {
    fn apply(&self, config: &mut ProtoGraphConfig) {
        if self.allow_missing_imports {
            config.allow_missing_imports = true;
        }
        if self.strict_imports {
            config.allow_missing_imports = false;
        }
        if self.show_missing_types {
            config.show_missing_types = true;
        }
        if self.hide_missing_types {
            config.show_missing_types = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render the inclusion graph, or the part reachable from a selection
    Render {
        /// Schema file, directory, glob pattern or list:<file>
        src: String,
        /// Entities to start from, separated by ';' ('*' for the root file)
        #[arg(short, long)]
        select: Option<String>,
        /// Output file name inside the output directory
        #[arg(short, long)]
        output: Option<String>,
        /// Also produce an SVG image
        #[arg(long)]
        svg: bool,
        /// Also produce a PNG image
        #[arg(long)]
        png: bool,
        #[command(flatten)]
        toggles: Toggles,
    },
    /// Render the import dependency tree
    Imports {
        /// Schema file, directory, glob pattern or list:<file>
        src: String,
        /// Output file name inside the output directory
        #[arg(short, long)]
        output: Option<String>,
        /// Also produce an SVG image
        #[arg(long)]
        svg: bool,
        #[command(flatten)]
        toggles: Toggles,
    },
    /// Show graph statistics for one schema file
    Stats {
        /// Schema file
        src: String,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
        #[command(flatten)]
        toggles: Toggles,
    },
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.verbose, cli.log.as_deref()) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8, log: Option<&Path>) -> Result<()> {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log {
        Some(path) => {
            let file = File::create(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => subscriber.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Returns `false` when some input of a batch failed.
fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Render {
            src,
            select,
            output,
            svg,
            png,
            toggles,
        } => {
            let mut config = load_config(&cli.config)?;
            toggles.apply(&mut config);
            config.generate_svg |= svg;
            config.generate_png |= png;
            report_batch(&src, select.as_deref(), &config, output.as_deref())
        }
        Commands::Imports {
            src,
            output,
            svg,
            toggles,
        } => {
            let mut config = load_config(&cli.config)?;
            toggles.apply(&mut config);
            config.generate_svg |= svg;
            report_batch(&src, Some(SELECT_IMPORTS), &config, output.as_deref())
        }
        Commands::Stats { src, json, toggles } => {
            let mut config = load_config(&cli.config)?;
            toggles.apply(&mut config);
            let protograph = ProtoGraph::open(Path::new(&src), &config)?;
            let stats = protograph.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("protograph stats for {}", protograph.root());
                println!("  Files:       {}", stats.file_count);
                println!("  Missing:     {}", stats.missing_file_count);
                println!("  Entities:    {}", stats.entity_count);
                println!("  Edges:       {}", stats.edge_count);
                println!("  Placeholders: {}", stats.unresolved_count);
                println!("  Unsupported: {}", stats.unsupported_count);
                if !stats.unreferenced_types.is_empty() {
                    println!("\n  Unreferenced types:");
                    for name in &stats.unreferenced_types {
                        println!("    {}", name);
                    }
                }
                if !stats.entities_by_kind.is_empty() {
                    println!("\n  Entities by kind:");
                    let mut sorted: Vec<_> = stats.entities_by_kind.iter().collect();
                    sorted.sort_by_key(|(k, _)| (*k).clone());
                    for (kind, count) in &sorted {
                        println!("    {}: {}", kind, count);
                    }
                }
            }
            Ok(true)
        }
        Commands::Init { force } => {
            if cli.config.exists() && !force {
                return Err(ProtoGraphError::Config {
                    message: format!(
                        "'{}' already exists (use --force to overwrite)",
                        cli.config.display()
                    ),
                });
            }
            save_config(&cli.config, &ProtoGraphConfig::default())?;
            println!("Wrote {}", cli.config.display());
            Ok(true)
        }
    }
}

/// Runs a batch and prints one line per input.
fn report_batch(
    src: &str,
    selection: Option<&str>,
    config: &ProtoGraphConfig,
    output: Option<&str>,
) -> Result<bool> {
    let outcomes = run_batch(src, selection, config, output)?;
    let mut ok = true;
    for outcome in &outcomes {
        let input = outcome.input.lines().next().unwrap_or("");
        match &outcome.result {
            Ok(path) => println!("{} -> {}", input, path.display()),
            Err(e) => {
                ok = false;
                eprintln!("Failed {}: {}", input, e);
            }
        }
    }
    Ok(ok)
}

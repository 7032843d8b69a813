use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use entiform_core::config::CONFIG_FILE_NAME;
use entiform_core::report::{collect_validation_errors, save_entities_to_json};
use entiform_core::{Config, EntityFile, ProcessedEntity};
use entiform_engine::{EntityProcessor, FsReader, Pipeline, PipelineOptions, PipelineOutput};
use entiform_package::Package;

/// Entiform - entity package validation and JSON Schema generation
#[derive(Parser)]
#[command(name = "entiform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: entiform.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every entity in a package and derive schemas
    Check {
        /// Package directory (holds package.yml and entities/)
        dir: PathBuf,

        /// Worker threads (0 uses the configured default)
        #[arg(short, long, env = "ENTIFORM_WORKERS", default_value_t = 0)]
        workers: usize,

        /// Output file for processed entities
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Hide the live progress line
        #[arg(short, long)]
        quiet: bool,
    },

    /// Process a single entity file and print its derived schema
    Schema {
        /// Entity document (.yml / .yaml)
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    let failing = match cli.command {
        Commands::Check {
            dir,
            workers,
            output,
            quiet,
        } => check_command(&config, &dir, workers, output, quiet)?,
        Commands::Schema { file } => schema_command(&file)?,
    };

    if failing {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)
            .with_context(|| format!("failed to load config {}", config_path.display()))?
    } else if Path::new(CONFIG_FILE_NAME).exists() {
        Config::from_file(Path::new(CONFIG_FILE_NAME))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    tracing::debug!(workers = config.workers, output = %config.output_path().display(), "configuration loaded");
    Ok(config)
}

/// Check command - process a package; returns whether the run is failing
fn check_command(
    config: &Config,
    dir: &Path,
    workers: usize,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<bool> {
    let package = Package::load(dir)
        .with_context(|| format!("failed to load package at {}", dir.display()))?;

    print_package_header(&package);

    let options = PipelineOptions::from(config).with_progress(config.show_progress && !quiet);
    let pipeline = Pipeline::new(options);
    tracing::debug!(options = ?pipeline.options(), "pipeline configured");
    let run = pipeline.process(package.files.clone(), workers)?;

    print_results(&run);

    let failing = run.is_failing();
    if failing && !config.write_output_on_failure {
        eprintln!("{}", "Run has errors, output not written".yellow());
        return Ok(true);
    }

    if !run.processed.is_empty() {
        let path = output.unwrap_or_else(|| config.output_path());
        let count = save_entities_to_json(&run.processed, &path)
            .with_context(|| format!("failed to save entities to {}", path.display()))?;
        println!("{} {} entities to {}", "Saved".green(), count, path.display());
    }

    Ok(failing)
}

/// Schema command - process one file without the worker pool
fn schema_command(file: &Path) -> Result<bool> {
    let metadata = std::fs::metadata(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let modified: DateTime<Utc> = metadata
        .modified()
        .map(DateTime::from)
        .unwrap_or_else(|_| Utc::now());

    let entity = EntityProcessor::process_file(
        EntityFile::new(file, metadata.len(), modified),
        &FsReader,
    );

    if let Some(fatal) = &entity.fatal {
        eprintln!("{} {}: {}", "✗".red().bold(), file.display(), fatal);
        return Ok(true);
    }

    match &entity.schema {
        Some(schema) => {
            println!("{}", serde_json::to_string_pretty(schema)?);
            Ok(false)
        }
        None => {
            eprintln!("{} {}", "!".yellow().bold(), file.display());
            for error in &entity.errors {
                eprintln!("    • [{}] {}", error.class.as_str().yellow(), error.message);
            }
            Ok(true)
        }
    }
}

fn print_package_header(package: &Package) {
    println!(
        "{} v{}",
        package.manifest.name.bold().bright_blue(),
        package.manifest.version
    );
    println!(
        "files:{} size:{:.1}KB hash:{}",
        package.entity_count(),
        package.total_size as f64 / 1024.0,
        package.structure_hash_hex()
    );
    println!();
}

fn print_results(run: &PipelineOutput) {
    let stats = run.stats();
    println!(
        "processed:{} failed:{} errors:{} duplicates:{}",
        stats.success,
        run.fatal_errors.len(),
        stats.total_errors,
        run.duplicates
    );
    println!();

    let mut processed: Vec<&ProcessedEntity> = run.processed.iter().collect();
    processed.sort_by(|a, b| a.file.path.cmp(&b.file.path));

    if !processed.is_empty() {
        println!("{:<6} {:<40} {:>7} {}", "STATUS", "PATH", "SIZE", "CONTENT_HASH");
        println!("{:<6} {:<40} {:>7} {}", "------", "----", "----", "------------");

        for entity in &processed {
            let status = if entity.fatal.is_some() {
                "✗".red()
            } else if !entity.errors.is_empty() {
                "!".yellow()
            } else {
                "✓".green()
            };

            println!(
                "{}      {:<40} {:>7} {}",
                status,
                short_path(&entity.file.display_path(), 40),
                format!("{:.1}K", entity.file.size as f64 / 1024.0),
                entity.fingerprint
            );
        }
    }

    if !run.fatal_errors.is_empty() {
        let mut failures: Vec<_> = run.fatal_errors.iter().collect();
        failures.sort_by(|a, b| a.path.cmp(&b.path));

        println!("\n{}", "FATAL ERRORS:".red().bold());
        for failure in failures {
            println!("  [{}] {}", failure.error.class().as_str().red(), failure);
        }
    }

    let findings = collect_validation_errors(&run.processed);
    if !findings.is_empty() {
        println!("\n{}", "VALIDATION ERRORS:".yellow().bold());
        for (path, messages) in &findings {
            println!("  {}", short_path(path, 50));
            for message in messages {
                println!("    • {}", message.yellow());
            }
        }
    }

    println!();
}

/// Shorten long paths to their trailing components, prefixed with `…/`
fn short_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    // Room for the "…/" prefix
    let budget = max_len.saturating_sub(2);
    let mut kept: Vec<&str> = Vec::new();
    let mut len = 0;
    for part in path.rsplit(['/', std::path::MAIN_SEPARATOR]) {
        let added = part.chars().count() + usize::from(!kept.is_empty());
        if len + added > budget {
            break;
        }
        len += added;
        kept.push(part);
    }

    if kept.is_empty() {
        return path
            .rsplit(['/', std::path::MAIN_SEPARATOR])
            .next()
            .unwrap_or(path)
            .to_string();
    }

    kept.reverse();
    format!("…/{}", kept.join("/"))
}

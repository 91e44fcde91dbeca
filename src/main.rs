use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dir2db::cli::{Cli, OutputFormat};
use dir2db::config::{Config, resolve_config_path, resolve_db_override, write_template};
use dir2db::extract::ClassNameExtractor;
use dir2db::filter::compile_pattern;
use dir2db::logging::{self, LogOptions};
use dir2db::pipeline::{IngestSummary, Pipeline};
use dir2db::scan::ScanRequest;
use dir2db::store::LmdbStore;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref())?;
    if cli.init_config {
        if write_template(&config_path)? {
            println!("[+] Wrote config template to {}", config_path.display());
        } else {
            println!("[=] Config already present at {}", config_path.display());
        }
        return Ok(());
    }

    if cli.path.is_none() && !cli.stats {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    init_logging(&cli, &config)?;

    if cli.stats {
        return print_stats(&cli, &config, &config_path);
    }

    let root = cli.path.clone().context("--path is required")?;
    let db_path = resolve_db_path(&cli, &config, &config_path)?;
    let request = ScanRequest::from_patterns(
        &root,
        cli.regex.as_deref(),
        cli.exclusions.as_deref(),
    )?;
    let extract_filter = compile_pattern("extract", &config.extract.pattern)?;

    let store = LmdbStore::open(&db_path, &config.store_options())?;
    let extractor = ClassNameExtractor::new(config.extract.chunk_size);
    log::debug!(
        "[+] Store at {}, reading sources in {}-byte chunks",
        store.db_path().display(),
        extractor.chunk_size()
    );
    let pipeline = Pipeline::new(&store, extractor).with_extract_filter(extract_filter);

    let summary = pipeline
        .run(&request)
        .with_context(|| format!("Ingestion of {} aborted", root.display()))?;

    write_summary(&summary, cli.format)?;
    log::info!("[+] Execution complete");
    Ok(())
}

fn init_logging(cli: &Cli, config: &Config) -> Result<()> {
    logging::init(&LogOptions {
        default_level: cli.log_level(),
        file: cli.log_file.clone().or_else(|| config.log.file.clone()),
        append: config.log.append,
    })
}

fn resolve_db_path(cli: &Cli, config: &Config, config_path: &Path) -> Result<PathBuf> {
    let override_path = resolve_db_override(cli.db.as_deref());
    Ok(config.store_path(override_path.as_deref(), config_path)?)
}

fn print_stats(cli: &Cli, config: &Config, config_path: &Path) -> Result<()> {
    let db_path = resolve_db_path(cli, config, config_path)?;
    let store = LmdbStore::open(&db_path, &config.store_options())?;
    let stats = store.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn write_summary(summary: &IngestSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            println!("[+] Files found: {}", summary.total_files);
            println!("[+] Rows inserted: {}", summary.rows_inserted);
            println!("[+] Class names recorded: {}", summary.class_names);
            let marker = if summary.error_count == 0 { '+' } else { '-' };
            println!("[{marker}] Error count: {}", summary.error_count);
        }
    }
    Ok(())
}

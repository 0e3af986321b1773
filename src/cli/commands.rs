//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_duration, print_divider, print_header, print_info, print_success, print_warning,
    PhaseProgressBars,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::pipeline::{Pipeline, RunOptions, RunReport};
use crate::media::scanner::ExtensionFilter;
use anyhow::{bail, Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config) -> Result<()> {
    match &args.command {
        Some(Commands::Config { path, reset }) => handle_config_command(*path, *reset),
        Some(Commands::GenerateConfig { output }) => generate_config_file(output.clone()),
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(())
        }
        None => run_pipeline(args, config),
    }
}

/// Merge the config file with the command-line flags
///
/// Mode flags can only switch a mode on; the config decides the default.
pub fn build_run_options(args: &Args, config: &Config) -> Result<RunOptions> {
    let destination = match &args.destination {
        Some(destination) => destination.clone(),
        None => bail!("No destination folder given (use -d/--destination)"),
    };

    let mut pipeline = config.pipeline.clone();
    if let Some(workers) = args.workers {
        pipeline.workers = workers;
    }

    Ok(RunOptions::new(args.sources.clone(), destination)
        .with_rename(args.rename || config.transfer.rename)
        .with_move(args.move_files || config.transfer.move_files)
        .with_simulate(args.simulate || config.transfer.simulate)
        .with_pool_size(
            pipeline.effective_workers(),
            pipeline.effective_queue_capacity(),
        )
        .with_extensions(ExtensionFilter::new(&pipeline.extensions)))
}

/// Deduplicate the source folders into the destination
pub fn run_pipeline(args: &Args, config: &Config) -> Result<()> {
    let options = build_run_options(args, config)?.validated()?;
    let quiet = args.json;

    if !quiet {
        print_run_header(&options);
    }

    let bars = Arc::new(PhaseProgressBars::new(quiet));
    let sink = Arc::clone(&bars);
    let mut pipeline = Pipeline::new(options).with_progress(move |p| sink.update(p));

    let report = pipeline.run();
    bars.finish();
    let report = report.context("Deduplication run failed")?;

    if quiet {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_run_summary(&report);
    }

    Ok(())
}

fn print_run_header(options: &RunOptions) {
    print_header("Media Deduplicator");
    for source in &options.sources {
        print_info(&format!("Source:      {}", source.display()));
    }
    print_info(&format!("Destination: {}", options.destination.display()));
    print_info(&format!(
        "Mode:        {}{}{}",
        if options.move_files { "move" } else { "copy" },
        if options.rename { ", rename" } else { "" },
        if options.simulate { ", simulate" } else { "" },
    ));
    print_info(&format!(
        "Workers:     {} (queue {})",
        options.workers, options.queue_capacity
    ));
    println!();
}

fn print_run_summary(report: &RunReport) {
    if report.simulated {
        print_divider();
        println!("  Planned transfers:");
        for transfer in &report.planned {
            println!(
                "    {} -> {}",
                transfer.source.display(),
                transfer.destination.display()
            );
        }
    }

    print_divider();
    println!("  📊 Results:");
    println!("     Files found:        {}", report.files_found);
    println!("     Unique files:       {}", report.unique_files);
    println!("     Duplicates:         {}", report.duplicates);
    println!("     Read errors:        {}", report.read_errors);
    println!("     Copy errors:        {}", report.copy_errors);
    if report.moved {
        println!("     Remove errors:      {}", report.remove_errors);
    }
    println!(
        "     Elapsed:            {}",
        format_duration(Duration::from_millis(report.elapsed_ms as u64))
    );
    println!();

    if report.panicked_jobs > 0 {
        print_warning(&format!(
            "{} job(s) crashed; see the log for details",
            report.panicked_jobs
        ));
    }
    if report.simulated {
        print_success("Simulation complete, no files were changed");
    } else if report.read_errors + report.copy_errors + report.remove_errors == 0 {
        print_success("Done");
    } else {
        print_warning("Done with errors");
    }
}

/// Handle the config command
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        let path = init_config(true)?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    let path = init_config(false)?;
    info!("Config file: {}", path.display());
    info!("Edit this file to change the defaults.");
    info!("Run 'deduplicate show-config' to verify your settings.");
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config(false)?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the deduplication settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[pipeline]");
    info!(
        "  workers = {} (effective {})",
        config.pipeline.workers,
        config.pipeline.effective_workers()
    );
    info!(
        "  queue_capacity = {} (effective {})",
        config.pipeline.queue_capacity,
        config.pipeline.effective_queue_capacity()
    );
    info!("  extensions = {:?}", config.pipeline.extensions);
    info!("");
    info!("[transfer]");
    info!("  rename = {}", config.transfer.rename);
    info!("  move_files = {}", config.transfer.move_files);
    info!("  simulate = {}", config.transfer.simulate);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
    if let Some(path) = get_config_path() {
        info!("");
        info!("Standard config location: {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["deduplicate"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_build_run_options_from_flags() {
        let args = parse(&["-s", "/a", "-d", "/out", "-m", "--workers", "3"]);
        let options = build_run_options(&args, &Config::default()).unwrap();

        assert_eq!(options.sources, vec![PathBuf::from("/a")]);
        assert_eq!(options.destination, PathBuf::from("/out"));
        assert!(options.move_files);
        assert!(!options.rename);
        assert!(!options.simulate);
        assert_eq!(options.workers, 3);
        assert_eq!(options.queue_capacity, 3);
    }

    #[test]
    fn test_config_modes_apply_without_flags() {
        let mut config = Config::default();
        config.transfer.rename = true;
        config.transfer.simulate = true;
        config.pipeline.workers = 5;
        config.pipeline.queue_capacity = 7;
        config.pipeline.extensions = vec!["png".to_string()];

        let options = build_run_options(&parse(&["-s", "/a", "-d", "/out"]), &config).unwrap();

        assert!(options.rename);
        assert!(options.simulate);
        assert!(!options.move_files);
        assert_eq!(options.workers, 5);
        assert_eq!(options.queue_capacity, 7);
        assert!(options.extensions.matches(&PathBuf::from("x.PNG")).is_some());
        assert!(options.extensions.matches(&PathBuf::from("x.jpg")).is_none());
    }

    #[test]
    fn test_missing_destination_is_rejected() {
        let err = build_run_options(&parse(&["-s", "/a"]), &Config::default()).unwrap_err();
        assert!(err.to_string().contains("destination"));
    }
}

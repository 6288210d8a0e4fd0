mod targets;

use darwin_core::config::{CommandHarnessSettings, DarwinConfig, HarnessType};
use darwin_core::engine::{EvolutionEngine, RunReport};
use darwin_core::genome::Genome;
use darwin_core::harness::{CommandHarness, Harness, InProcessHarness};

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Run this program as the target instead of an in-process one.
    #[clap(long)]
    target_command: Option<String>,
    /// Built-in in-process target (bubble-sort, insertion-sort, sum, crash-on-zero).
    #[clap(short, long)]
    target: Option<String>,
    #[clap(short, long)]
    generations: Option<usize>,
    #[clap(short, long)]
    seed: Option<u64>,
    /// Stop after the generation running when this many seconds have passed.
    #[clap(long)]
    time_budget_secs: Option<u64>,
    /// Print the full run report as JSON on stdout.
    #[clap(long)]
    json: bool,
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(config_file: Option<PathBuf>) -> Result<DarwinConfig, anyhow::Error> {
    match config_file {
        Some(config_path) => {
            log::info!("Loading configuration from specified path: {config_path:?}");
            DarwinConfig::load_from_file(&config_path)
        }
        None => {
            let default_config_path = PathBuf::from("config.toml");
            if default_config_path.exists() {
                log::info!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                DarwinConfig::load_from_file(&default_config_path)
            } else {
                log::info!(
                    "No config file specified and default 'config.toml' not found, using built-in defaults."
                );
                Ok(DarwinConfig::default())
            }
        }
    }
}

fn apply_overrides(config: &mut DarwinConfig, cli: &Cli) {
    if let Some(generations) = cli.generations {
        config.search.generations = generations;
    }
    if let Some(seed) = cli.seed {
        config.search.seed = seed;
    }
    if let Some(target) = &cli.target {
        config
            .harness
            .in_process_settings
            .get_or_insert_with(Default::default)
            .target = target.clone();
        if cli.target_command.is_none() {
            config.harness.harness_type = HarnessType::InProcess;
        }
    }
    if let Some(target_cmd_str) = &cli.target_command {
        if cli.target.is_some() {
            log::warn!("Both --target and --target-command given; running the command.");
        }
        config.harness.harness_type = HarnessType::Command;
        let cmd_settings = config
            .harness
            .command_settings
            .get_or_insert_with(CommandHarnessSettings::default);
        if cmd_settings.command.is_empty() {
            cmd_settings.command.push(target_cmd_str.clone());
        } else {
            cmd_settings.command[0] = target_cmd_str.clone();
        }
    }
}

fn build_harness(config: &DarwinConfig) -> Result<Box<dyn Harness>, anyhow::Error> {
    match config.harness.harness_type {
        HarnessType::InProcess => {
            let settings = config
                .harness
                .in_process_settings
                .clone()
                .unwrap_or_default();
            let target = targets::lookup(&settings.target).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown in-process target `{}`; expected one of: {}",
                    settings.target,
                    targets::NAMES.join(", ")
                )
            })?;
            log::info!("Using in-process target `{}`", settings.target);
            let mut harness = InProcessHarness::new(target);
            if let Some(limit) = settings.work_limit {
                harness = harness.with_work_limit(limit);
            }
            if let Some(limit) = settings.max_abandoned {
                harness = harness.with_max_abandoned(limit);
            }
            Ok(Box::new(harness))
        }
        HarnessType::Command => {
            let command_config = config.command_harness_config()?;
            log::info!("Using command target {:?}", command_config.command);
            Ok(Box::new(CommandHarness::new(command_config)))
        }
    }
}

fn print_summary(report: &RunReport, elapsed: Duration) {
    println!(
        "Search finished in {elapsed:.2?}: {:?} after {} generations, {} evaluations.",
        report.termination, report.generations_run, report.evaluations
    );
    println!("  Best fitness: {:.4}", report.best_fitness());
    println!("  Best genome:  {:?}", report.best_genome().elements());
    println!("  Outcome:      {:?}", report.best.measurement.status);
    if report.crash_findings.is_empty() {
        println!("No crashes found.");
    } else {
        println!("{} unique crash(es) found:", report.crash_findings.len());
        for finding in &report.crash_findings {
            println!(
                "  [gen {}] {} {:?}: {}",
                finding.generation,
                finding.input_hash,
                finding.genome.elements(),
                finding.description
            );
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let mut config = load_config(cli.config_file.clone())?;
    apply_overrides(&mut config, &cli);
    config.validate().context("Invalid configuration")?;
    log::debug!("Effective configuration: {config:#?}");

    let engine_config = config.engine_config()?;
    let evaluator = config.fitness_evaluator()?;
    let harness = build_harness(&config)?;
    let engine = EvolutionEngine::new(engine_config, harness, evaluator)
        .context("Failed to set up the search")?;

    if let Some(secs) = cli.time_budget_secs {
        let cancel = engine.cancel_handle();
        thread::Builder::new()
            .name("darwin-time-budget".to_string())
            .spawn(move || {
                thread::sleep(Duration::from_secs(secs));
                log::info!("Time budget of {secs}s spent, stopping after the current generation");
                cancel.cancel();
            })
            .context("Failed to start time budget timer")?;
    }

    let start_time = Instant::now();
    let report = engine.run(|generation: usize, best_fitness: f64, best: &Genome| {
        log::info!(
            "Generation {generation}: best fitness {best_fitness:.4}, genome length {} ({:.1?} elapsed)",
            best.len(),
            start_time.elapsed()
        );
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, start_time.elapsed());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("darwin_cli").chain(args.iter().copied()))
    }

    #[test]
    fn overrides_replace_config_values() {
        let mut config = DarwinConfig::default();
        apply_overrides(
            &mut config,
            &cli(&["--generations", "7", "--seed", "3", "--target", "sum"]),
        );
        assert_eq!(config.search.generations, 7);
        assert_eq!(config.search.seed, 3);
        assert_eq!(
            config.harness.in_process_settings.map(|s| s.target),
            Some("sum".to_string())
        );
    }

    #[test]
    fn target_command_switches_to_command_harness() {
        let mut config = DarwinConfig::default();
        apply_overrides(&mut config, &cli(&["--target-command", "/bin/true"]));
        assert_eq!(config.harness.harness_type, HarnessType::Command);
        let command = config.command_harness_config().unwrap().command;
        assert_eq!(command, vec!["/bin/true".to_string()]);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let mut config = DarwinConfig::default();
        apply_overrides(&mut config, &cli(&["--target", "nope"]));
        let err = build_harness(&config).err().map(|e| e.to_string());
        assert!(err.is_some_and(|e| e.contains("Unknown in-process target")));
    }

    #[test]
    fn sum_target_runs_end_to_end() {
        let mut config = DarwinConfig::default();
        config.search.population_size = 10;
        config.search.report_every = 1;
        config.genome.min_len = 1;
        config.genome.max_len = 3;
        config.genome.min_val = 0;
        config.genome.max_val = 5;
        apply_overrides(&mut config, &cli(&["-g", "3", "-t", "sum"]));

        let engine = EvolutionEngine::new(
            config.engine_config().unwrap(),
            build_harness(&config).unwrap(),
            config.fitness_evaluator().unwrap(),
        )
        .unwrap();
        let report = engine.run(|_: usize, _: f64, _: &Genome| {}).unwrap();
        assert_eq!(report.generations_run, 3);
        assert!(serde_json::to_string(&report).unwrap().contains("\"termination\""));
    }
}

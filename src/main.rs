//! typeguess - guess accuracy statistics and plots
//!
//! A CLI tool that aggregates model category guesses against
//! crowd-labelled ground truth and renders bar charts, accuracy
//! heatmaps and a summary report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any error (malformed record, misaligned source, I/O, config)

mod analysis;
mod cli;
mod config;
mod error;
mod loader;
mod models;
mod report;
mod scanner;

use analysis::RefusalRule;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use loader::GuessFields;
use models::{GuessSource, GuesserSummary, LogitSummary, RunMetadata, RunReport, Vocabulary};
use report::PlotSettings;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("typeguess v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args) {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .typeguess.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE_NAME);
    println!("   Edit it to customize input files, vocabulary and refusal detection.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete pipeline: load, aggregate, then write outputs.
fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let vocabulary = config.vocabulary.to_vocabulary();
    if vocabulary.is_empty() {
        anyhow::bail!("Vocabulary is empty; set [vocabulary] labels in the config file");
    }
    debug!("Vocabulary ({} labels): {}", vocabulary.len(), vocabulary);

    let fields = GuessFields::from(&config.data);

    // Step 1: Ground truth
    let ground_truth_path = config.data.ground_truth.clone();
    say(&args, format!("📥 Loading ground truth: {}", ground_truth_path.display()));
    let pb = spinner(&args, format!("Reading {}", ground_truth_path.display()));
    let ground_truth =
        loader::read_ground_truth(&ground_truth_path, &config.data.ground_truth_field);
    finish_spinner(pb);
    let ground_truth = ground_truth?;
    info!(
        "Loaded {} ground-truth records (total weight {})",
        ground_truth.len(),
        ground_truth.iter().map(|r| r.total_weight()).sum::<f64>()
    );

    // Step 2: Guess sources
    let source_paths = resolve_guess_sources(&args, &config)?;
    say(&args, format!("📥 Loading {} guess sources...", source_paths.len()));

    let mut sources = Vec::with_capacity(source_paths.len());
    for (name, path) in source_paths {
        let pb = spinner(&args, format!("Reading {} ({})", name, path.display()));
        let records = loader::read_guesses(&path, &fields);
        finish_spinner(pb);
        let records = records?;
        info!("{}: {} records from {}", name, records.len(), path.display());
        sources.push(GuessSource::new(name, records));
    }

    // Step 3: Aggregate everything before any output is written
    say(&args, "🔬 Aggregating guesses...".to_string());
    let totals = analysis::ground_truth_totals(&ground_truth);
    let tables = analysis::aggregate(&sources, &ground_truth, &vocabulary)?;

    let guessers: Vec<GuesserSummary> = tables
        .iter()
        .map(|(name, table)| GuesserSummary {
            name: name.clone(),
            valid_guesses: table.total_count(),
            counts: table.counts.clone(),
            matrix: analysis::ratio_matrix(table, &vocabulary),
        })
        .collect();

    // Step 4: Confidence statistics
    let confidence = compute_confidence(&config, &fields)?;
    for summary in &confidence {
        println!("{}", report::format_logit_line(summary));
    }

    let run_report = RunReport {
        metadata: RunMetadata {
            generated_at: Utc::now(),
            ground_truth_path: ground_truth_path.display().to_string(),
            ground_truth_records: ground_truth.len(),
            vocabulary: vocabulary.clone(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        ground_truth_totals: totals,
        guessers,
        confidence,
    };

    if args.dry_run {
        print_summary(&run_report);
        say(&args, "\n✅ Dry run complete. No files were written.".to_string());
        return Ok(());
    }

    // Step 5: Plots
    let settings = PlotSettings {
        output_dir: config.general.output_dir.clone(),
        width: config.plot.width,
        height: config.plot.height,
    };
    std::fs::create_dir_all(&settings.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            settings.output_dir.display()
        )
    })?;

    say(&args, "\n📊 Rendering plots...".to_string());
    write_plots(&run_report, &tables, &vocabulary, &ground_truth_path, &settings)?;

    // Step 6: Summary report
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&run_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&run_report),
    };
    let report_path = settings.output_dir.join(args.format.report_file_name());
    std::fs::write(&report_path, &output)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;

    print_summary(&run_report);
    say(
        &args,
        format!(
            "\n✅ Done in {:.1}s. Output saved to: {}",
            start_time.elapsed().as_secs_f64(),
            settings.output_dir.display()
        ),
    );

    Ok(())
}

/// Collect `(display name, path)` pairs for every guess source.
///
/// Explicit `--guesses` and `--guess-dir` take precedence over the
/// configured file list.
fn resolve_guess_sources(args: &Args, config: &Config) -> Result<Vec<(String, PathBuf)>> {
    let mut sources: Vec<(String, PathBuf)> =
        args.guesses.iter().map(|a| scanner::parse_source_arg(a)).collect();

    if let Some(ref dir) = args.guess_dir {
        let scan_config = scanner::ScanConfig::from(&config.scanner);
        let files = scanner::GuessFileScanner::new(dir.clone(), scan_config).scan()?;
        if files.is_empty() {
            warn!("No guess files found in {}", dir.display());
        }
        sources.extend(
            files
                .into_iter()
                .map(|path| (scanner::display_name_from_path(&path), path)),
        );
    }

    if args.guesses.is_empty() && args.guess_dir.is_none() {
        sources = config
            .data
            .guess_files
            .iter()
            .map(|path| (scanner::display_name_from_path(path), path.clone()))
            .collect();
    }

    for (name, first, later) in scanner::colliding_names(&sources) {
        warn!(
            "{} and {} both resolve to display name '{}'; name one with NAME=FILE or narrow --guess-dir with --prefix",
            first.display(),
            later.display(),
            name
        );
    }

    Ok(sources)
}

/// Compute the confidence/refusal statistic for every configured logit file.
fn compute_confidence(config: &Config, fields: &GuessFields) -> Result<Vec<LogitSummary>> {
    let mut summaries = Vec::with_capacity(config.data.logit_files.len());

    for path in &config.data.logit_files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let rule = RefusalRule::for_source(
            config.refusal.marker.clone(),
            &file_name,
            &config.refusal.domains,
        );
        debug!(
            "{}: refusal detection {}",
            file_name,
            if rule.enabled { "on" } else { "off" }
        );

        let records = loader::read_guesses(path, fields)?;
        let summary = analysis::logit_info(&path.display().to_string(), &records, |r| {
            rule.matches(r)
        })?;

        if summary.average_top_probability.is_none() {
            warn!("{}: no non-refusal records to average", file_name);
        }
        summaries.push(summary);
    }

    Ok(summaries)
}

/// Render the ground-truth chart plus one bar chart and heatmap per guesser.
fn write_plots(
    run_report: &RunReport,
    tables: &std::collections::BTreeMap<String, models::AccuracyTable>,
    vocabulary: &Vocabulary,
    ground_truth_path: &Path,
    settings: &PlotSettings,
) -> Result<()> {
    let stem = ground_truth_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "ground_truth".to_string());

    let totals: Vec<(String, f64)> = run_report
        .ground_truth_totals
        .iter()
        .map(|(k, v)| (k.clone(), *v))
        .collect();
    let path = settings.bar_chart_path(&stem);
    report::render_bar_chart(
        &path,
        &format!("Total number of guesses per type for {}", stem),
        "Number of guesses",
        &totals,
        settings,
    )
    .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", path.display(), e))?;

    for guesser in &run_report.guessers {
        let Some(table) = tables.get(&guesser.name) else {
            continue;
        };

        let bars = analysis::counts_by_vocabulary(table, vocabulary);
        let path = settings.bar_chart_path(&guesser.name);
        report::render_bar_chart(
            &path,
            &format!("Total number of guesses per type for {}", guesser.name),
            "Number of guesses",
            &bars,
            settings,
        )
        .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", path.display(), e))?;

        if guesser.matrix.is_empty() {
            warn!("{}: no valid guesses, skipping heatmap", guesser.name);
            continue;
        }

        let path = settings.heatmap_path(&guesser.name);
        report::render_heatmap(
            &path,
            &format!("Accuracy per type for {}", guesser.name),
            &guesser.matrix,
            settings,
        )
        .map_err(|e| anyhow::anyhow!("Failed to render {}: {}", path.display(), e))?;
    }

    Ok(())
}

/// Print a short per-guesser summary to stdout.
fn print_summary(run_report: &RunReport) {
    println!("\n📊 Summary:");
    println!(
        "   Ground truth: {} records",
        run_report.metadata.ground_truth_records
    );
    for guesser in &run_report.guessers {
        match analysis::most_common_guess(&guesser.counts) {
            Some((label, count)) => println!(
                "   {}: {} valid guesses, most common {} ({})",
                guesser.name, guesser.valid_guesses, label, count
            ),
            None => println!("   {}: no valid guesses", guesser.name),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE_NAME);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

fn say(args: &Args, message: String) {
    if !args.quiet {
        println!("{}", message);
    }
}

fn spinner(args: &Args, message: String) -> Option<ProgressBar> {
    if args.quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish_spinner(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
    }

    #[test]
    fn test_fixture_pipeline() {
        let truth =
            loader::read_ground_truth(&fixture("mbti_reddit.jsonl"), "commented_types").unwrap();
        let path = fixture("mbti_demo-model_brief.jsonl");
        let records = loader::read_guesses(&path, &GuessFields::default()).unwrap();
        let sources = vec![GuessSource::new(
            scanner::display_name_from_path(&path),
            records,
        )];

        let tables = analysis::aggregate(&sources, &truth, &Vocabulary::mbti()).unwrap();
        let table = &tables["demo-model_brief"];

        assert_eq!(table.counts.get("INTJ"), Some(&2));
        assert_eq!(table.counts.get("ENTJ"), Some(&1));
        assert!(!table.counts.contains_key("XXXX"));
        assert_eq!(table.accuracy["INTJ"]["INTJ"], 2.0);
        assert_eq!(table.accuracy["INTJ"]["ENFP"], 1.0);
        assert_eq!(table.accuracy["ENTJ"]["ENTJ"], 0.5);
        assert!((table.total_weight() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn test_fixture_confidence() {
        let mut config = Config::default();
        config.data.logit_files = vec![
            fixture("zodiac_demo-model_brief_manylogs.jsonl"),
            fixture("mbti_demo-model_brief.jsonl"),
        ];

        let summaries = compute_confidence(&config, &GuessFields::default()).unwrap();

        assert_eq!(summaries[0].refusals, 2);
        assert_eq!(summaries[0].average_top_probability, Some(1.0));
        assert!((summaries[0].refusal_rate.unwrap() - 2.0 / 3.0).abs() < 1e-9);

        // Not a refusal domain: every record is averaged
        let avg = summaries[1].average_top_probability.unwrap();
        assert!((avg - 0.725).abs() < 1e-9);
        assert_eq!(summaries[1].refusal_rate, Some(0.0));
    }

    #[test]
    fn test_resolve_defaults_to_config_list() {
        let args = Args::try_parse_from(["typeguess"]).unwrap();
        let sources = resolve_guess_sources(&args, &Config::default()).unwrap();

        assert_eq!(sources.len(), 5);
        assert_eq!(sources[0].0, "gpt-4_brief");
        assert_eq!(sources[4].0, "claude-3-haiku-20240307_long");
    }

    #[test]
    fn test_resolve_explicit_sources() {
        let fixtures = fixture("").to_string_lossy().to_string();
        let args = Args::try_parse_from([
            "typeguess",
            "--guesses",
            "named=runs/a.jsonl",
            "--guess-dir",
            fixtures.as_str(),
            "--prefix",
            "mbti_demo",
        ])
        .unwrap();
        let mut config = Config::default();
        config.merge_with_args(&args);

        let sources = resolve_guess_sources(&args, &config).unwrap();
        let names: Vec<&str> = sources.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["named", "demo-model_brief"]);
    }
}

//! AutoMate ML CLI Module
//!
//! Command-line front end: scripted subcommands plus an interactive wizard
//! that walks through choosing data, target, scaler, model and artifact name.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::data::{DataFormat, DataLoader, DataSource, DatasetCatalog};
use crate::pipeline::{TrainReport, TrainingPipeline};
use crate::preprocessing::ScalerKind;
use crate::training::{ArtifactStore, ModelKind};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// Print a failed stage's error exactly as the library reported it
pub fn print_error(err: &anyhow::Error) {
    println!();
    println!("  {} {}", "error".red().bold(), err);
    println!();
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "automate-ml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train tabular classifiers without writing code")]
#[command(long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for trained model artifacts
    #[arg(long, global = true)]
    pub models_dir: Option<PathBuf>,

    /// Directory holding pre-existing datasets
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a classifier and save it as a named artifact
    Train {
        /// Data file path, or the name of a dataset in the data directory
        #[arg(short, long)]
        dataset: String,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Scaler (standard, minmax)
        #[arg(short, long, default_value = "standard")]
        scaler: ScalerKind,

        /// Model (logistic-regression, support-vector-classifier, random-forest, gradient-boosted-trees)
        #[arg(short, long, default_value = "logistic-regression")]
        model: ModelKind,

        /// Artifact name; the model is saved as <models-dir>/<name>.json
        #[arg(short, long)]
        name: String,

        /// Declared data format (csv, tsv, xlsx, ...); inferred from the file name otherwise
        #[arg(short, long)]
        format: Option<DataFormat>,

        /// Also keep the data file in the data directory under this name
        #[arg(long)]
        save_as: Option<String>,
    },

    /// List datasets in the data directory
    Datasets,

    /// Show columns, types and null counts of a dataset
    Info {
        /// Data file path or dataset name
        #[arg(short, long)]
        dataset: String,
    },

    /// List saved model artifacts
    Models,

    /// Copy a saved artifact out of the models directory
    Export {
        /// Artifact name
        #[arg(short, long)]
        name: String,

        /// Destination directory or file
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

impl Cli {
    /// Configuration file (if any) with per-flag overrides applied
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(dir) = &self.models_dir {
            config = config.with_models_dir(dir.clone());
        }
        if let Some(dir) = &self.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

// ─── Data resolution ───────────────────────────────────────────────────────────

/// An existing file wins over a catalog entry of the same name. A declared
/// format skips extension inference.
fn resolve_dataset(
    config: &PipelineConfig,
    dataset: &str,
    declared: Option<DataFormat>,
) -> anyhow::Result<(DataSource, DataFormat)> {
    let path = Path::new(dataset);
    let path = if path.is_file() {
        path.to_path_buf()
    } else {
        DatasetCatalog::new(config.data_dir.clone()).locate(dataset)?
    };
    let format = match declared {
        Some(format) => format,
        None => DataFormat::from_path(&path)?,
    };
    Ok((DataSource::Path(path), format))
}

fn print_report(report: &TrainReport) {
    println!();
    println!("  {} {}", ok("✓"), report.success_message().white().bold());
    println!("  {:<16} {}", muted("Model"), report.model.display_name());
    println!("  {:<16} {}", muted("Scaler"), report.scaler);
    println!("  {:<16} {} train / {} test", muted("Rows"), report.n_train, report.n_test);
    println!("  {:<16} {}", muted("Features"), report.n_features);
    println!("  {:<16} {}", muted("Classes"), report.classes.join(", "));
    println!("  {:<16} {}", muted("Artifact"), report.artifact_path.display());
    println!("  {:<16} {:.3}s", muted("Time"), report.elapsed.as_secs_f64());
    println!();
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_train(
    config: PipelineConfig,
    dataset: &str,
    target: &str,
    scaler: ScalerKind,
    model: ModelKind,
    name: &str,
    format: Option<DataFormat>,
    save_as: Option<&str>,
) -> anyhow::Result<()> {
    section("Train");

    let (source, format) = resolve_dataset(&config, dataset, format)?;

    step_run(&format!("Loading {}", source.describe()));
    let start = Instant::now();
    let df = DataLoader::new().load(source.clone(), format)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));

    if let Some(dataset_name) = save_as {
        let bytes = match &source {
            DataSource::Path(path) => std::fs::read(path)?,
            DataSource::Upload { bytes, .. } => bytes.clone(),
        };
        let entry = DatasetCatalog::new(config.data_dir.clone()).import(dataset_name, &source.describe(), format, &bytes)?;
        println!("  {} saved dataset {}", ok("✓"), entry.path.display());
    }

    step_run(&format!("Training {}", model.display_name().cyan()));
    let pipeline = TrainingPipeline::new(config);
    let report = pipeline.run_on_table(&df, target, scaler, model, name)?;
    step_done(&format!("{:?}", report.elapsed));

    print_report(&report);
    Ok(())
}

pub fn cmd_datasets(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Datasets");

    let entries = DatasetCatalog::new(config.data_dir.clone()).list()?;
    if entries.is_empty() {
        println!("  {}", dim(&format!("no datasets in {}", config.data_dir.display())));
        println!();
        return Ok(());
    }

    println!("  {:<28} {:<8} {:>10}", muted("Name"), muted("Format"), muted("Size"));
    println!("  {}", dim(&"─".repeat(48)));
    for entry in entries {
        println!(
            "  {:<28} {:<8} {:>7.1} KB",
            entry.name,
            entry.format.to_string(),
            entry.size_bytes as f64 / 1024.0
        );
    }
    println!();
    Ok(())
}

pub fn cmd_info(config: &PipelineConfig, dataset: &str) -> anyhow::Result<()> {
    section("Data Info");

    let (source, format) = resolve_dataset(config, dataset, None)?;
    let label = source.describe();
    let df = DataLoader::new().load(source, format)?;

    println!("  {:<12} {}", muted("Source"), label);
    println!("  {:<12} {}", muted("Format"), format);
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!("  {:<20} {:<12} {:>6}", muted("Column"), muted("Type"), muted("Nulls"));
    println!("  {}", dim(&"─".repeat(40)));

    for col in df.get_columns() {
        println!(
            "  {:<20} {:<12} {:>6}",
            col.name().as_str(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count()
        );
    }

    println!();
    Ok(())
}

pub fn cmd_models(config: &PipelineConfig) -> anyhow::Result<()> {
    section("Models");

    let store = ArtifactStore::new(config.models_dir.clone());
    let names = store.list()?;
    if names.is_empty() {
        println!("  {}", dim(&format!("no artifacts in {}", config.models_dir.display())));
        println!();
        return Ok(());
    }

    println!("  {:<24} {:<28} {:<10}", muted("Name"), muted("Model"), muted("Target"));
    println!("  {}", dim(&"─".repeat(62)));
    for name in names {
        match store.load(&name) {
            Ok(artifact) => println!(
                "  {:<24} {:<28} {:<10}",
                name,
                artifact.model_kind.display_name(),
                artifact.target_column
            ),
            Err(e) => println!("  {:<24} {}", name, format!("unreadable: {}", e).red()),
        }
    }
    println!();
    Ok(())
}

pub fn cmd_export(config: &PipelineConfig, name: &str, output: &Path) -> anyhow::Result<()> {
    section("Export");

    let store = ArtifactStore::new(config.models_dir.clone());
    let target = store.export_to(name, output)?;
    println!("  {} {}", ok("✓"), target.display());
    println!();
    Ok(())
}

// ─── Interactive mode ──────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("       {}", "AutoMate ML".truecolor(120, 170, 255).bold());
    println!("       {}", dim(&format!("no-code classifier training  ·  v{}", env!("CARGO_PKG_VERSION"))));
    println!();
}

fn wizard_theme() -> dialoguer::theme::ColorfulTheme {
    use dialoguer::console::{style, Style};

    dialoguer::theme::ColorfulTheme {
        active_item_prefix: style("  ›".to_string()).for_stderr().cyan(),
        active_item_style: Style::new().for_stderr().white().bold(),
        inactive_item_prefix: style("   ".to_string()).for_stderr(),
        inactive_item_style: Style::new().for_stderr().color256(245),
        prompt_prefix: style("  ?".to_string()).for_stderr().color256(111),
        prompt_style: Style::new().for_stderr().white().bold(),
        ..dialoguer::theme::ColorfulTheme::default()
    }
}

/// Walk through one training run; `Ok(None)` when the user backs out
fn train_wizard(
    config: &PipelineConfig,
    theme: &dialoguer::theme::ColorfulTheme,
) -> anyhow::Result<Option<TrainReport>> {
    use dialoguer::{Input, Select};

    let catalog = DatasetCatalog::new(config.data_dir.clone());

    let origin = Select::with_theme(theme)
        .with_prompt("Data source")
        .items(&["Upload a file", "Use an existing dataset"])
        .default(0)
        .interact_opt()?;

    let (source, format) = match origin {
        Some(0) => {
            let path: String = Input::with_theme(theme)
                .with_prompt("File path (csv, tsv, xlsx, xls, ods)")
                .interact_text()?;
            let path = PathBuf::from(path.trim());
            let format = DataFormat::from_path(&path)?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bytes = std::fs::read(&path)?;

            let dataset_name: String = Input::with_theme(theme)
                .with_prompt("Save as dataset (leave empty to skip)")
                .allow_empty(true)
                .interact_text()?;
            if !dataset_name.trim().is_empty() {
                let entry = catalog.import(dataset_name.trim(), &file_name, format, &bytes)?;
                println!("  {} saved dataset {}", ok("✓"), entry.path.display());
            }
            (DataSource::upload(file_name, bytes), format)
        }
        Some(1) => {
            let entries = catalog.list()?;
            if entries.is_empty() {
                println!("  {}", dim(&format!("no datasets in {}", config.data_dir.display())));
                return Ok(None);
            }
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            let Some(idx) = Select::with_theme(theme)
                .with_prompt("Dataset")
                .items(&names)
                .default(0)
                .interact_opt()?
            else {
                return Ok(None);
            };
            catalog.resolve(&entries[idx].name)?
        }
        _ => return Ok(None),
    };

    step_run(&format!("Loading {}", source.describe()));
    let df = DataLoader::new().load(source, format)?;
    step_done(&format!("{} rows × {} cols", df.height(), df.width()));

    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let Some(target_idx) = Select::with_theme(theme)
        .with_prompt("Target column")
        .items(&columns)
        .default(columns.len().saturating_sub(1))
        .interact_opt()?
    else {
        return Ok(None);
    };

    let scaler_labels: Vec<&str> = ScalerKind::ALL.iter().map(|s| s.as_str()).collect();
    let Some(scaler_idx) = Select::with_theme(theme)
        .with_prompt("Scaler")
        .items(&scaler_labels)
        .default(0)
        .interact_opt()?
    else {
        return Ok(None);
    };

    let model_labels: Vec<&str> = ModelKind::ALL.iter().map(|m| m.display_name()).collect();
    let Some(model_idx) = Select::with_theme(theme)
        .with_prompt("Model")
        .items(&model_labels)
        .default(0)
        .interact_opt()?
    else {
        return Ok(None);
    };

    let name: String = Input::with_theme(theme)
        .with_prompt("Model name")
        .allow_empty(true)
        .interact_text()?;

    step_run(&format!("Training {}", ModelKind::ALL[model_idx].display_name().cyan()));
    let pipeline = TrainingPipeline::new(config.clone());
    let report = pipeline.run_on_table(
        &df,
        &columns[target_idx],
        ScalerKind::ALL[scaler_idx],
        ModelKind::ALL[model_idx],
        name.trim(),
    )?;
    step_done(&format!("{:?}", report.elapsed));
    Ok(Some(report))
}

pub fn cmd_interactive(config: &PipelineConfig) -> anyhow::Result<()> {
    use dialoguer::Select;

    print_banner();
    let theme = wizard_theme();

    loop {
        let items = &[
            "Train a model         upload or pick data, then fit",
            "Datasets              files in the data directory",
            "Saved models          artifacts in the models directory",
            "Exit",
        ];

        println!();
        let sel = Select::with_theme(&theme)
            .with_prompt("What would you like to do")
            .items(items)
            .default(0)
            .interact_opt()?;

        match sel {
            Some(0) => match train_wizard(config, &theme) {
                Ok(Some(report)) => print_report(&report),
                Ok(None) => {}
                Err(e) => print_error(&e),
            },
            Some(1) => cmd_datasets(config)?,
            Some(2) => cmd_models(config)?,
            Some(3) | None => {
                println!();
                println!("  {}", dim("goodbye"));
                println!();
                break;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Dispatch a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.pipeline_config()?;

    match cli.command {
        Some(Commands::Train { dataset, target, scaler, model, name, format, save_as }) => {
            cmd_train(config, &dataset, &target, scaler, model, &name, format, save_as.as_deref())
        }
        Some(Commands::Datasets) => cmd_datasets(&config),
        Some(Commands::Info { dataset }) => cmd_info(&config, &dataset),
        Some(Commands::Models) => cmd_models(&config),
        Some(Commands::Export { name, output }) => cmd_export(&config, &name, &output),
        None => cmd_interactive(&config),
    }
}

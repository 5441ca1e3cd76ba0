use super::CliError;
use super::helpers::*;
use anyhow::Context;
use burnup_core::domain::{BurnupError, ExecutorKind, NuclearLibrary};
use burnup_core::modules::batch::{
    BatchConfig, BatchOptions, WorkerRequest, render_human_summary, run_batch, run_worker_request,
};
use burnup_core::modules::extractor::{HeaderPattern, OutputExtractor};
use burnup_core::modules::material::{
    DEFAULT_GEOMETRY_VOLUME_CM3, DEFAULT_MIN_WEIGHT_FRACTION, GenerationSettings,
    render_material_card,
};
use burnup_core::modules::pipeline::{CancellationToken, FilePipeline};
use burnup_core::modules::registry::LibraryRegistry;
use burnup_core::modules::serialization::{format_scientific, write_text_artifact};
use burnup_core::modules::store::MaterialStore;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(clap::Args)]
pub(super) struct BatchArgs {
    /// JSON batch configuration; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the element output files
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// File name glob selecting element output files
    #[arg(long)]
    pattern: Option<String>,

    /// Number of concurrent workers
    #[arg(long, short = 'j')]
    max_workers: Option<usize>,

    /// Worker pool backing: thread or process
    #[arg(long)]
    executor: Option<ExecutorKind>,

    /// Nuclear-data library suffix (.00c, .70c, .31c)
    #[arg(long)]
    library: Option<NuclearLibrary>,

    /// Directory holding the per-library isotope files
    #[arg(long)]
    isotope_dir: Option<PathBuf>,

    /// Isotope file replacing the active library's default file
    #[arg(long)]
    isotope_file: Option<PathBuf>,

    /// Element name to atomic number cache
    #[arg(long)]
    element_cache: Option<PathBuf>,

    /// Material volume in cm3 used for densities
    #[arg(long)]
    geometry_volume: Option<f64>,

    /// Material number assigned to the first file
    #[arg(long)]
    material_id_base: Option<u32>,

    /// Weight fractions below this value are dropped from cards
    #[arg(long)]
    min_weight_fraction: Option<f64>,

    /// Time header matching: strict or permissive
    #[arg(long)]
    header_pattern: Option<HeaderPattern>,

    /// Case label to extract (defaults to the last case in each file)
    #[arg(long = "case")]
    target_case: Option<String>,

    /// Combined material card output
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Processing summary JSON output
    #[arg(long)]
    summary: Option<PathBuf>,

    /// SQLite database receiving the completed materials
    #[arg(long)]
    database: Option<PathBuf>,

    /// Burnup cycle number recorded with stored materials
    #[arg(long)]
    cycle: Option<u32>,
}

impl BatchArgs {
    fn into_config(self) -> Result<BatchConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path).map_err(|error| CliError::Compute(error.into()))?,
            None => BatchConfig::default(),
        };

        if let Some(input_dir) = self.input_dir {
            config.input_dir = input_dir;
        }
        if let Some(pattern) = self.pattern {
            config.pattern = pattern;
        }
        if let Some(max_workers) = self.max_workers {
            config.max_workers = max_workers;
        }
        if let Some(executor) = self.executor {
            config.executor = executor;
        }
        if let Some(library) = self.library {
            config.library = library;
        }
        if let Some(isotope_dir) = self.isotope_dir {
            config.isotope_dir = isotope_dir;
        }
        if self.isotope_file.is_some() {
            config.isotope_file = self.isotope_file;
        }
        if let Some(element_cache) = self.element_cache {
            config.element_cache_path = element_cache;
        }
        if let Some(volume) = self.geometry_volume {
            config.geometry_volume_cm3 = volume;
        }
        if let Some(base) = self.material_id_base {
            config.material_id_base = base;
        }
        if let Some(threshold) = self.min_weight_fraction {
            config.min_weight_fraction = threshold;
        }
        if let Some(header_pattern) = self.header_pattern {
            config.header_pattern = header_pattern;
        }
        if self.target_case.is_some() {
            config.target_case = self.target_case;
        }
        if let Some(output) = self.output {
            config.output_path = output;
        }
        if self.summary.is_some() {
            config.summary_path = self.summary;
        }
        if self.database.is_some() {
            config.database_path = self.database;
        }
        if let Some(cycle) = self.cycle {
            config.cycle_number = cycle;
        }

        config
            .validate()
            .map_err(|error| CliError::Compute(error.into()))?;
        Ok(config)
    }
}

#[derive(clap::Args)]
pub(super) struct ParseArgs {
    /// Depletion output file
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Material card output
    #[arg(long, short, default_value = DEFAULT_CARD_OUTPUT)]
    output: PathBuf,

    /// Material number written on the card
    #[arg(long, default_value_t = 200)]
    material_id: u32,

    /// Nuclear-data library suffix (.00c, .70c, .31c)
    #[arg(long, default_value = ".00c")]
    library: NuclearLibrary,

    /// Directory holding the per-library isotope files
    #[arg(long, default_value = ".")]
    isotope_dir: PathBuf,

    /// Isotope file replacing the active library's default file
    #[arg(long)]
    isotope_file: Option<PathBuf>,

    /// Element name to atomic number cache
    #[arg(long, default_value = "element_cache.json")]
    element_cache: PathBuf,

    /// Material volume in cm3 used for densities
    #[arg(long, default_value_t = DEFAULT_GEOMETRY_VOLUME_CM3)]
    geometry_volume: f64,

    /// Weight fractions below this value are dropped from the card
    #[arg(long, default_value_t = DEFAULT_MIN_WEIGHT_FRACTION)]
    min_weight_fraction: f64,

    /// Time header matching: strict or permissive
    #[arg(long, default_value = "strict")]
    header_pattern: HeaderPattern,

    /// Case label to extract (defaults to the last case in the file)
    #[arg(long = "case")]
    target_case: Option<String>,
}

#[derive(clap::Args)]
pub(super) struct DatabaseArgs {
    /// SQLite database written by `batch --database`
    #[arg(long, default_value = DEFAULT_DATABASE_PATH)]
    database: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct StatusArgs {
    #[command(flatten)]
    db: DatabaseArgs,

    /// Cycle to report (defaults to the latest)
    #[arg(long)]
    cycle: Option<u32>,
}

#[derive(clap::Args)]
pub(super) struct HistoryArgs {
    #[command(flatten)]
    db: DatabaseArgs,

    /// Element name (file stem), e.g. element_001
    #[arg(value_name = "ELEMENT")]
    element: String,
}

pub(super) fn run_batch_command(args: BatchArgs) -> Result<i32, CliError> {
    let config = args.into_config()?;
    let cancel = CancellationToken::new();
    install_interrupt_handler(&cancel);

    let observer = ProgressObserver;
    let run = run_batch(
        &config,
        BatchOptions {
            cancel,
            observer: &observer,
            worker_program: None,
        },
    )?;

    println!("{}", render_human_summary(&run.report));
    if let Some(summary_path) = &config.summary_path {
        println!("JSON summary: {}", summary_path.display());
    }

    if run.report.all_succeeded() { Ok(0) } else { Ok(1) }
}

pub(super) fn run_parse_command(args: ParseArgs) -> Result<i32, CliError> {
    let registry = LibraryRegistry::load(&args.isotope_dir, args.library, args.isotope_file.as_deref())?;
    let mut element_cache = load_element_cache(&args.element_cache);
    let settings = GenerationSettings {
        geometry_volume_cm3: args.geometry_volume,
        min_weight_fraction: args.min_weight_fraction,
    };
    let pipeline = FilePipeline::new(registry.active().clone(), element_cache.clone())
        .with_extractor(OutputExtractor::new(args.header_pattern))
        .with_settings(settings)
        .with_target_case(args.target_case);

    let output = pipeline.run_file(&args.file, args.material_id, &CancellationToken::new())?;
    let card = render_material_card(&output.composition);
    write_text_artifact(&args.output, &card)
        .with_context(|| format!("failed to write material card '{}'", args.output.display()))?;

    let added = element_cache.merge(output.discovered_elements);
    if added > 0 {
        info!(added, "recorded new element lookups");
    }
    if let Err(error) = element_cache.save(&args.element_cache) {
        warn!(%error, "element cache was not saved");
    }

    let material = &output.composition;
    println!(
        "Case '{}' at {}: {} isotopes, total mass {} g, density {} g/cm3",
        material.case_label,
        material.time_label,
        material.isotope_count(),
        format_scientific(material.total_mass_g, 6),
        format_scientific(material.density_g_cm3, 6)
    );
    println!(
        "Surrogate mass: {} g",
        format_scientific(material.surrogate_mass_g, 6)
    );
    println!("Material card: {}", args.output.display());
    Ok(0)
}

pub(super) fn run_status_command(args: StatusArgs) -> Result<i32, CliError> {
    let store = MaterialStore::open_existing(&args.db.database).map_err(BurnupError::from)?;
    let cycle = match args.cycle {
        Some(cycle) => Some(cycle),
        None => store.latest_cycle().map_err(BurnupError::from)?,
    };
    let Some(cycle) = cycle else {
        println!("No cycles stored in {}", args.db.database.display());
        return Ok(0);
    };

    match store.cycle_status(cycle).map_err(BurnupError::from)? {
        Some(summary) => {
            println!("Cycle {}", summary.cycle_number);
            println!("Materials: {}", summary.material_count);
            println!(
                "Total mass: {} g",
                format_scientific(summary.total_mass_g, 6)
            );
            println!(
                "Stored at: {}",
                format_unix_seconds(summary.created_at_unix_seconds)
            );
            Ok(0)
        }
        None => Err(CliError::Compute(BurnupError::input_validation(
            "INPUT.CYCLE",
            format!("cycle {} has no stored materials", cycle),
        ))),
    }
}

pub(super) fn run_cycles_command(args: DatabaseArgs) -> Result<i32, CliError> {
    let store = MaterialStore::open_existing(&args.database).map_err(BurnupError::from)?;
    let cycles = store.list_cycles().map_err(BurnupError::from)?;
    if cycles.is_empty() {
        println!("No cycles stored in {}", args.database.display());
        return Ok(0);
    }
    for cycle in cycles {
        println!(
            "Cycle {}: {} materials, total mass {} g",
            cycle.cycle_number,
            cycle.material_count,
            format_scientific(cycle.total_mass_g, 6)
        );
    }
    Ok(0)
}

pub(super) fn run_history_command(args: HistoryArgs) -> Result<i32, CliError> {
    let store = MaterialStore::open_existing(&args.db.database).map_err(BurnupError::from)?;
    let history = store
        .element_history(&args.element)
        .map_err(BurnupError::from)?;
    if history.is_empty() {
        println!("No stored materials for {}", args.element);
        return Ok(0);
    }
    println!("History for {}", args.element);
    for entry in history {
        println!(
            "  cycle {}: M{} case '{}' at {}, {} isotopes, mass {} g, density {} g/cm3",
            entry.cycle_number,
            entry.material_id,
            entry.case_name,
            entry.time_point,
            entry.isotope_count,
            format_scientific(entry.total_mass_g, 6),
            format_scientific(entry.density_g_cm3, 6)
        );
    }
    Ok(0)
}

pub(super) fn run_worker_command() -> Result<i32, CliError> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read worker request from stdin")?;
    let request: WorkerRequest = serde_json::from_str(&input).map_err(|source| {
        CliError::Compute(BurnupError::internal(
            "SYS.WORKER_REQUEST",
            format!("failed to decode worker request: {}", source),
        ))
    })?;

    let reply = run_worker_request(request);
    let encoded = serde_json::to_string(&reply).map_err(|source| {
        CliError::Compute(BurnupError::internal(
            "SYS.WORKER_REPLY",
            format!("failed to encode worker reply: {}", source),
        ))
    })?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", encoded).context("failed to write worker reply")?;
    stdout.flush().context("failed to flush worker reply")?;
    Ok(0)
}

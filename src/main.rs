use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ct_viewer::{
    CancelToken, CapabilityCatalog, CapabilityRegistry, ConfigManager, Interpolation, Orientation,
    PanelOrchestrator, Processor, ScanOptions, Session, VolumeSlot, WindowPreset, WindowSetting,
    config::DEFAULT_CONFIG_FILE,
};

const DEFAULT_MODULES_DIR: &str = "modules";

#[derive(Parser, Debug)]
#[command(name = "ct-viewer")]
#[command(author, version, about = "Inspect CT studies stored as DICOM files", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the series found under a directory
    Scan(ScanArgs),
    /// Render one plane of a series to a PNG file
    Render(RenderArgs),
    /// List discovered capabilities and their configuration
    Modules(PanelArgs),
    /// Load a series and print the surfaces of the active panels
    Stats {
        #[command(flatten)]
        study: StudyArgs,
        #[command(flatten)]
        panels: PanelArgs,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// File or directory holding DICOM files
    path: PathBuf,

    /// Only look at files directly inside the directory
    #[arg(long, default_value_t = false)]
    no_recursive: bool,

    /// Number of threads reading headers
    #[arg(long, env = "CT_VIEWER_WORKERS")]
    workers: Option<usize>,
}

impl ScanArgs {
    fn options(&self) -> ScanOptions {
        let mut options = ScanOptions {
            recursive: !self.no_recursive,
            ..ScanOptions::default()
        };
        if let Some(workers) = self.workers {
            options.workers = workers;
        }
        options
    }
}

#[derive(Args, Debug)]
struct StudyArgs {
    #[command(flatten)]
    scan: ScanArgs,

    /// Series Instance UID to load (defaults to the first series found)
    #[arg(long)]
    series: Option<String>,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    study: StudyArgs,

    /// axial, sagittal or coronal
    #[arg(long, default_value = "axial")]
    orientation: Orientation,

    /// Slice index (defaults to the center of the volume)
    #[arg(long)]
    index: Option<usize>,

    /// lung, mediastinum, bone or soft-tissue
    #[arg(long, conflicts_with_all = ["center", "width"])]
    preset: Option<WindowPreset>,

    /// Window center in HU
    #[arg(long, requires = "width")]
    center: Option<f32>,

    /// Window width in HU
    #[arg(long, requires = "center")]
    width: Option<f32>,

    /// Resample sagittal and coronal planes to square pixels
    #[arg(long, default_value_t = false)]
    interpolate: bool,

    /// PNG file to write
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct PanelArgs {
    /// Directory holding capability unit files
    #[arg(long, default_value = DEFAULT_MODULES_DIR, env = "CT_VIEWER_MODULES_DIR")]
    dir: PathBuf,

    /// Module configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE, env = "CT_VIEWER_CONFIG")]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Scan(args) => run_scan(args),
        Command::Render(args) => run_render(args),
        Command::Modules(args) => run_modules(args),
        Command::Stats { study, panels } => run_stats(study, panels),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "ct_viewer=debug"
    } else {
        "ct_viewer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn run_scan(args: ScanArgs) -> CliResult {
    let mut viewer = VolumeSlot::new();
    let series = viewer.scan(&args.path, &args.options(), &CancelToken::new())?;

    if series.is_empty() {
        println!("No DICOM series found in {}", args.path.display());
    }
    for series in series {
        println!("{}  {}", series.uid, series);
    }
    Ok(())
}

/// Scan and load the requested series into a fresh slot.
fn load_study(args: &StudyArgs) -> Result<VolumeSlot, Box<dyn std::error::Error>> {
    let cancel = CancelToken::new();
    let mut viewer = VolumeSlot::new();
    let series = viewer.scan(&args.scan.path, &args.scan.options(), &cancel)?;

    let uid = match &args.series {
        Some(uid) => uid.clone(),
        None => series
            .first()
            .map(|series| series.uid.clone())
            .ok_or_else(|| format!("No DICOM series found in {}", args.scan.path.display()))?,
    };
    viewer.load_series(&uid, &cancel)?;
    Ok(viewer)
}

fn run_render(args: RenderArgs) -> CliResult {
    let viewer = load_study(&args.study)?;
    let volume = viewer.current().ok_or("No volume loaded")?;

    let window = match (args.preset, args.center, args.width) {
        (Some(preset), _, _) => WindowSetting::from(preset),
        (None, Some(center), Some(width)) => WindowSetting::new(center, width)?,
        _ => WindowSetting::default(),
    };
    let interpolation = if args.interpolate {
        Interpolation::Bilinear(Processor::CPU)
    } else {
        Interpolation::None
    };
    let index = args
        .index
        .unwrap_or_else(|| volume.center_index(args.orientation));

    let image = volume
        .render(index, args.orientation, &window, interpolation)
        .ok_or_else(|| {
            format!(
                "Slice {} is outside the {} range 0..{}",
                index,
                args.orientation,
                volume.slice_count(args.orientation)
            )
        })?;
    image.save(&args.output)?;
    info!(
        "Wrote {} slice {} ({}x{}) to {}",
        args.orientation,
        index,
        image.width(),
        image.height(),
        args.output.display()
    );
    Ok(())
}

fn orchestrator(args: &PanelArgs) -> Result<PanelOrchestrator, Box<dyn std::error::Error>> {
    let config = ConfigManager::load_or_create(&args.config)?;
    let registry = CapabilityRegistry::new(CapabilityCatalog::builtin());
    let mut orchestrator = PanelOrchestrator::new(registry, config, Session::default());
    orchestrator.start(&args.dir)?;
    Ok(orchestrator)
}

fn run_modules(args: PanelArgs) -> CliResult {
    let orchestrator = orchestrator(&args)?;

    for descriptor in orchestrator.registry().descriptors() {
        let module = orchestrator.config().module(&descriptor.id);
        println!(
            "{:<16} {:<24} {:<8} visible={} order={} removable={}",
            descriptor.id,
            descriptor.name,
            descriptor.version,
            module.is_some_and(|module| module.visible),
            module.map_or(0, |module| module.order),
            descriptor.removable,
        );
    }
    Ok(())
}

fn run_stats(study: StudyArgs, panels: PanelArgs) -> CliResult {
    let mut orchestrator = orchestrator(&panels)?;
    let viewer = load_study(&study)?;
    let volume = viewer.current().ok_or("No volume loaded")?;
    orchestrator.notify_data_loaded(&volume);

    for (_, panel) in orchestrator.panels() {
        let surface = panel.surface();
        println!("== {} ==", surface.title());
        for line in surface.lines() {
            println!("{line}");
        }
        println!();
    }
    orchestrator.shutdown();
    Ok(())
}

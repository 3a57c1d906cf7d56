use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use indicatif::ProgressBar;
use kindlr_core::batch::{BatchCoordinator, Phase};
use kindlr_core::config::{
    DEFAULT_CONTENT_DIR, DEFAULT_MARKER, DEFAULT_SOURCE_EXTENSION, DEFAULT_TARGET_EXTENSION,
    DEFAULT_WARNING_EXIT_CODE, Settings,
};
use kindlr_core::device::{Device, DeviceLocator, FixedMounts, MountTable, SystemMounts, Volume};
use kindlr_core::transfer::Pipeline;
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

mod drop;
mod render;

/// How often the display is refreshed while a batch runs.
const TICK: Duration = Duration::from_millis(50);
/// How often mounted volumes are rescanned for the device.
const SCAN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "kindlr")]
#[command(about = "Convert e-books and send them to a connected Kindle", version)]
struct Cli {
    #[command(flatten)]
    options: Options,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert files and send them to the device
    Send {
        /// E-books to convert
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Wait for the device to be connected instead of failing
        #[arg(short, long)]
        wait: bool,
    },
    /// Keep running and convert every batch of paths dropped onto the terminal
    Watch,
    /// Show whether a device is connected
    Status,
    /// List mounted volumes and mark the device
    Volumes,
}

#[derive(Args, Clone, Debug)]
struct Options {
    /// Directory holding the per-OS converter executables
    #[arg(long, env = "KINDLR_ASSETS_DIR", default_value = "assets", global = true)]
    assets_dir: PathBuf,

    /// Converter executable, overriding the one under the assets directory
    #[arg(long, env = "KINDLR_CONVERTER", global = true)]
    converter: Option<PathBuf>,

    /// Only look for the device at these mount points
    #[arg(long = "mount", env = "KINDLR_MOUNTS", value_delimiter = ',', global = true)]
    mounts: Vec<PathBuf>,

    /// File that identifies the device, relative to its mount point
    #[arg(long, default_value = DEFAULT_MARKER, global = true)]
    marker: PathBuf,

    /// Directory on the device that receives converted books
    #[arg(long, default_value = DEFAULT_CONTENT_DIR, global = true)]
    content_dir: PathBuf,

    /// Extension of the files the converter accepts
    #[arg(long, default_value = DEFAULT_SOURCE_EXTENSION, global = true)]
    source_extension: String,

    /// Extension of the converted files placed on the device
    #[arg(long, default_value = DEFAULT_TARGET_EXTENSION, global = true)]
    target_extension: String,

    /// Converter exit code that means "succeeded with warnings"
    #[arg(long, default_value_t = DEFAULT_WARNING_EXIT_CODE, global = true, allow_negative_numbers = true)]
    warning_exit_code: i32,

    /// Seconds a finished batch stays on screen before the next drop is accepted
    #[arg(long, default_value_t = 5, global = true)]
    dwell: u64,

    /// Read every copied file back and compare checksums before deleting the original
    #[arg(long, env = "KINDLR_VERIFY", global = true)]
    verify: bool,
}

impl Options {
    fn settings(&self) -> Settings {
        Settings {
            assets_dir: self.assets_dir.clone(),
            converter: self.converter.clone(),
            marker: self.marker.clone(),
            content_dir: self.content_dir.clone(),
            source_extension: self.source_extension.clone(),
            target_extension: self.target_extension.clone(),
            warning_exit_code: self.warning_exit_code,
            dwell: Duration::from_secs(self.dwell),
            verify: self.verify,
        }
    }

    fn mounts(&self) -> Mounts {
        if self.mounts.is_empty() {
            Mounts::System(SystemMounts)
        } else {
            Mounts::Fixed(FixedMounts(self.mounts.clone()))
        }
    }
}

/// Either the host's volumes or the ones given with `--mount`.
enum Mounts {
    System(SystemMounts),
    Fixed(FixedMounts),
}

impl MountTable for Mounts {
    fn volumes(&self) -> io::Result<Vec<Volume>> {
        match self {
            Self::System(m) => m.volumes(),
            Self::Fixed(m) => m.volumes(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?;

    Ok(confirmation)
}

/// Warns about things that will make every file in a batch fail.
fn preflight(settings: &Settings, device: &Device) {
    let program = settings.converter_path();
    if !program.is_file() {
        println!(
            "{} Converter not found at {}; every file will fail.",
            style("WARNING:").yellow().bold(),
            style(program.display()).cyan()
        );
    }
    let content_dir = device.content_dir(&settings.content_dir);
    if !content_dir.is_dir() {
        println!(
            "{} {} does not exist on the device.",
            style("WARNING:").yellow().bold(),
            style(content_dir.display()).cyan()
        );
    }
}

fn warn_unexpected_extensions(settings: &Settings, files: &[PathBuf]) {
    for file in files {
        let matches = file
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&settings.source_extension));
        if !matches {
            println!(
                "{} {} is not an .{} file; the converter may reject it.",
                style("NOTE:").yellow(),
                style(file.display()).cyan(),
                settings.source_extension
            );
        }
    }
}

fn absolute(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .map(|p| std::path::absolute(&p).unwrap_or(p))
        .collect()
}

/// Blocks until a device shows up, showing a spinner meanwhile.
fn wait_for_device<M: MountTable>(locator: &mut DeviceLocator<M>) -> Device {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Connect your Kindle!");
    spinner.enable_steady_tick(Duration::from_millis(100));
    loop {
        if locator.is_connected() {
            if let Some(device) = locator.device() {
                spinner.finish_and_clear();
                return device.clone();
            }
        }
        thread::sleep(SCAN_INTERVAL);
    }
}

fn send(settings: &Settings, mounts: Mounts, files: Vec<PathBuf>, yes: bool, wait: bool) -> Result<()> {
    let mut locator = DeviceLocator::with_mounts(mounts, &settings.marker);
    let found = if locator.is_connected() { locator.device().cloned() } else { None };
    let device = match found {
        Some(device) => device,
        None if wait => wait_for_device(&mut locator),
        None => bail!("Connect your Kindle! No mounted volume has {}.", settings.marker.display()),
    };

    let files = absolute(files);
    let dest = device.content_dir(&settings.content_dir);

    println!("  Device: {}", style(&device).cyan());
    println!("  Target: {}", style(dest.display()).cyan());
    println!("  Files:  {}", files.len());
    println!();
    warn_unexpected_extensions(settings, &files);
    preflight(settings, &device);

    if !yes && io::stdin().is_terminal() && !confirm_operation("Convert and send these files?")? {
        println!("Send cancelled.");
        return Ok(());
    }

    let pipeline = Arc::new(Pipeline::from_settings(settings));
    let mut batch = BatchCoordinator::new(pipeline, settings.dwell);
    let bar = render::batch_bar(files.len())?;
    batch.start_batch(&dest, files)?;

    let report = loop {
        if let Some(report) = batch.poll() {
            break report;
        }
        render::update_bar(&bar, &batch.snapshot());
        thread::sleep(TICK);
    };
    bar.finish_and_clear();
    render::print_report(&report);

    if report.all_succeeded() {
        Ok(())
    } else {
        bail!("{} of {} files failed", report.failed.len(), report.total)
    }
}

/// Reads dropped lines from stdin on a background thread.
fn spawn_drop_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_prompt(connected: bool) {
    if connected {
        println!("{}", style("Drop EPUBs!").bold());
    } else {
        println!("{}", style("Connect your Kindle!").bold());
    }
}

/// The long-running shell: rescans for the device, accepts one drop at a
/// time while idle, and shows each batch's progress and result.
fn watch(settings: &Settings, mounts: Mounts) -> Result<()> {
    let mut locator = DeviceLocator::with_mounts(mounts, &settings.marker);
    let pipeline = Arc::new(Pipeline::from_settings(settings));
    let mut batch = BatchCoordinator::new(pipeline, settings.dwell);
    let drops = spawn_drop_reader();

    let mut connected = locator.is_connected();
    let mut last_scan = Instant::now();
    let mut last_phase = batch.phase();
    let mut bar: Option<ProgressBar> = None;
    let mut input_open = true;
    print_prompt(connected);

    loop {
        if last_scan.elapsed() >= SCAN_INTERVAL {
            let now = locator.is_connected();
            last_scan = Instant::now();
            if now != connected {
                connected = now;
                if batch.is_idle() {
                    print_prompt(connected);
                }
            }
        }

        match drops.try_recv() {
            Ok(line) => {
                let files = absolute(drop::parse_drop(&line));
                if files.is_empty() {
                    continue;
                }
                if !batch.is_idle() {
                    println!("{} Still busy with the last batch; drop again when it's done.", style("!").yellow());
                } else if let (true, Some(device)) = (connected, locator.device()) {
                    let dest = device.content_dir(&settings.content_dir);
                    let b = render::batch_bar(files.len())?;
                    batch.start_batch(&dest, files)?;
                    bar = Some(b);
                } else {
                    println!("{} Connect your Kindle first.", style("!").yellow());
                }
            }
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => input_open = false,
        }

        if let Some(report) = batch.poll() {
            if let Some(b) = bar.take() {
                b.finish_and_clear();
            }
            render::print_report(&report);
        } else if let Some(b) = &bar {
            render::update_bar(b, &batch.snapshot());
        }

        let phase = batch.phase();
        if phase == Phase::Idle && last_phase != Phase::Idle {
            println!();
            print_prompt(connected);
        }
        last_phase = phase;

        if !input_open && batch.is_idle() {
            return Ok(());
        }
        thread::sleep(TICK);
    }
}

fn status(settings: &Settings, mounts: Mounts) -> Result<()> {
    let mut locator = DeviceLocator::with_mounts(mounts, &settings.marker);
    let found = if locator.is_connected() { locator.device() } else { None };
    if let Some(device) = found {
        println!("{} {}", style("Connected:").green().bold(), device);
        let dest = device.content_dir(&settings.content_dir);
        println!("  Documents: {}", style(dest.display()).cyan());
    } else {
        println!("{} no mounted volume has {}", style("Not connected:").red().bold(), settings.marker.display());
    }
    Ok(())
}

fn volumes(settings: &Settings, mounts: Mounts) -> Result<()> {
    let locator = DeviceLocator::with_mounts(mounts, &settings.marker);
    let volumes = locator.volumes().context("Failed to list mounted volumes")?;
    if volumes.is_empty() {
        println!("No mounted volumes found.");
        return Ok(());
    }

    println!("Found {} mounted volumes:", volumes.len());
    println!("\n  {:<20} {:<40} {}", "NAME", "MOUNT POINT", "DEVICE");
    println!("  {:-<20} {:-<40} {:-<6}", "", "", "");
    for (volume, is_device) in volumes {
        let marker = if is_device { style("yes").green().to_string() } else { String::new() };
        println!(
            "  {:<20} {:<40} {}",
            volume.name,
            volume.mount_point.display().to_string(),
            marker
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = cli.options.settings();
    let mounts = cli.options.mounts();
    tracing::debug!(?settings, "Resolved settings");

    match cli.command {
        Commands::Send { files, yes, wait } => send(&settings, mounts, files, yes, wait),
        Commands::Watch => watch(&settings, mounts),
        Commands::Status => status(&settings, mounts),
        Commands::Volumes => volumes(&settings, mounts),
    }
}

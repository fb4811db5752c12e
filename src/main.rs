use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{Level, LevelFilter, Log, Metadata, Record};

use upd78k2_dasm::config::{parse_address, TraceConfig};
use upd78k2_dasm::format::OutputFormat;
use upd78k2_dasm::memory::Rom;
use upd78k2_dasm::{disassemble, Address};

#[derive(Parser, Debug)]
#[command(name = "upd78k2-dasm")]
#[command(about = "Tracing disassembler for uPD78K/II ROM images", long_about = None)]
struct Args {
    /// ROM image to disassemble
    #[arg(short = 'f', long = "file", default_value = "rom.bin")]
    rom: PathBuf,

    /// Print debug messages
    #[arg(short, long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// JSON trace configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra entry point in hex (repeatable)
    #[arg(short, long = "entry", value_parser = entry_address)]
    entries: Vec<Address>,

    /// Write the listing here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn entry_address(text: &str) -> Result<Address, String> {
    parse_address(text).map_err(|e| e.to_string())
}

/// Writes every record to stderr as `level: message`.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => "error",
            Level::Warn => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        };
        // Nowhere left to report a failed write to stderr.
        writeln!(io::stderr().lock(), "{}: {}", level, record.args()).ok();
    }

    fn flush(&self) {
        io::stderr().flush().ok();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn main() -> Result<()> {
    let args = Args::parse();

    log::set_logger(&LOGGER).context("failed to install logger")?;
    log::set_max_level(if args.debug { LevelFilter::Debug } else { LevelFilter::Info });

    let mut config = match &args.config {
        Some(path) => TraceConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TraceConfig::default(),
    };
    config.entry_points.extend(&args.entries);

    let bytes = fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM {}", args.rom.display()))?;
    log::info!("Loaded {} bytes from {}", bytes.len(), args.rom.display());

    let disassembly = disassemble(Rom::new(bytes), &config);
    log::info!(
        "Traced {} instructions, {} symbols",
        disassembly.memory.instruction_count(),
        disassembly.symbols.len()
    );
    if !disassembly.report.is_empty() || !disassembly.orphans.is_empty() {
        log::info!("Trace diagnostics are listed at the end of the output");
    }

    let listing = args
        .format
        .get_formatter()
        .format(&disassembly.listing(&config))
        .with_context(|| format!("failed to render {} listing", args.format))?;

    match &args.output {
        Some(path) => fs::write(path, listing)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => io::stdout()
            .lock()
            .write_all(listing.as_bytes())
            .context("failed to write listing")?,
    }

    Ok(())
}

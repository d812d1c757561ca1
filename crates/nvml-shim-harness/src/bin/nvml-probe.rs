//! CLI entrypoint for probing the host's NVML installation.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use nvml_shim::{DriverVersion, FixedDriverVersion, LoaderConfig, NvmlLoader};
use nvml_shim_harness::report::load_failure_entry;
use nvml_shim_harness::{DeviceInventory, HarnessError, LogEmitter, ProbeReport};

/// Inspect which NVML entry points this host provides.
#[derive(Debug, Parser)]
#[command(name = "nvml-probe")]
#[command(about = "Probe runtime NVML availability through nvml-shim")]
struct Cli {
    /// Library to try before the default candidates.
    #[arg(long, global = true)]
    library: Option<String>,
    /// Treat every version-gated group as unavailable.
    #[arg(long, global = true)]
    disable_gated: bool,
    /// Skip the CUDA driver query and gate on this `MAJOR.MINOR` instead.
    #[arg(long, global = true, value_name = "MAJOR.MINOR")]
    assume_driver: Option<DriverVersion>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Plain,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load the library and report symbol availability.
    Probe {
        #[arg(long, value_enum, default_value = "plain")]
        format: Format,
        /// Write the report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Append JSONL probe records to this file.
        #[arg(long)]
        log: Option<PathBuf>,
    },
    /// Initialize NVML and list visible devices.
    Devices {
        #[arg(long, value_enum, default_value = "plain")]
        format: Format,
    },
}

fn main() -> ExitCode {
    nvml_shim_harness::logging::init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nvml-probe: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn loader(cli: &Cli) -> NvmlLoader {
    let mut config = LoaderConfig::from_env();
    if let Some(library) = &cli.library {
        let candidates = std::iter::once(library.clone())
            .chain(config.library_candidates().iter().cloned())
            .collect::<Vec<_>>();
        config = config.with_library_candidates(candidates);
    }
    if cli.disable_gated {
        config = config.with_gated_disabled(true);
    }
    let nvml = NvmlLoader::new(config);
    match cli.assume_driver {
        Some(version) => nvml.with_probe(FixedDriverVersion(Some(version))),
        None => nvml,
    }
}

fn run(cli: Cli) -> Result<(), HarnessError> {
    let nvml = loader(&cli);

    match cli.command {
        Command::Probe {
            format,
            output,
            log,
        } => {
            let mut emitter = log
                .as_deref()
                .map(|path| LogEmitter::to_file(path, &run_id()))
                .transpose()?;

            let report = match ProbeReport::collect(&nvml) {
                Ok(report) => report,
                Err(err) => {
                    if let Some(emitter) = emitter.as_mut() {
                        emitter.emit_entry(load_failure_entry(&err))?;
                        emitter.flush()?;
                    }
                    return Err(err.into());
                }
            };

            if let Some(emitter) = emitter.as_mut() {
                for entry in report.log_entries() {
                    emitter.emit_entry(entry)?;
                }
                emitter.flush()?;
            }

            let rendered = match format {
                Format::Json => report.to_json()?,
                Format::Plain => report.to_plain(),
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    eprintln!("Wrote probe report to {}", path.display());
                }
                None => print!("{rendered}"),
            }
        }
        Command::Devices { format } => {
            let inventory = DeviceInventory::collect(&nvml)?;
            match format {
                Format::Json => println!("{}", inventory.to_json()?),
                Format::Plain => print!("{}", inventory.to_plain()),
            }
        }
    }
    Ok(())
}

fn run_id() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("{secs}-{}", std::process::id())
}

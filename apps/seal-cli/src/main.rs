//! Contract seal command line
//!
//! Merges, analyses and stamps contract PDFs. Logs go to stderr so that
//! JSON results on stdout stay machine readable.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use seal_core::{
    default_seal_image, execute, generate_output_filename, write_default_seal, ContractJob,
    SealCommand, SealConfig, SealPipeline,
};
use shared_types::StampPosition;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "seal-cli")]
#[command(version, about = "Merge, analyse and seal contract PDFs")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for merged and stamped files
    #[arg(long, global = true, default_value = "output")]
    work_dir: PathBuf,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append attachments to a contract
    Merge {
        main: PathBuf,
        attachments: Vec<PathBuf>,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Suggest where the seal should go
    Analyze {
        pdf: PathBuf,
        /// Print every candidate, best first
        #[arg(long)]
        all: bool,
    },
    /// Stamp the seal at explicit positions
    Stamp {
        pdf: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Seal image; the built-in seal when omitted
        #[arg(short, long)]
        seal: Option<PathBuf>,
        /// PAGE:X:Y with a 0-based page and top-left coordinates in points
        #[arg(short = 'a', long = "at", value_parser = parse_position, required = true)]
        positions: Vec<StampPosition>,
    },
    /// Merge, analyse and stamp a contract at the suggested position
    Process {
        #[arg(long)]
        number: String,
        #[arg(long)]
        counterparty: String,
        #[arg(long)]
        name: String,
        main: PathBuf,
        attachments: Vec<PathBuf>,
        #[arg(short, long)]
        seal: Option<PathBuf>,
    },
    /// Print the stamped file name for a contract
    Filename {
        number: String,
        counterparty: String,
        name: String,
    },
    /// Write the built-in seal image as PNG
    DefaultSeal { output: PathBuf },
    /// Execute a JSON command from a file, or stdin with `-`
    Run { command: PathBuf },
}

fn parse_position(value: &str) -> Result<StampPosition, String> {
    let parts: Vec<&str> = value.split(':').collect();
    let [page, x, y] = parts.as_slice() else {
        return Err(format!("expected PAGE:X:Y, got {}", value));
    };
    let page = page
        .trim()
        .parse()
        .map_err(|_| format!("invalid page: {}", page))?;
    let x = x.trim().parse().map_err(|_| format!("invalid x: {}", x))?;
    let y = y.trim().parse().map_err(|_| format!("invalid y: {}", y))?;
    Ok(StampPosition::new(page, x, y))
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SealConfig> {
    match path {
        Some(path) => SealConfig::from_file(path),
        None => Ok(SealConfig::default()),
    }
}

/// The given seal, or the built-in one written into the work directory
fn seal_path(seal: Option<PathBuf>, work_dir: &Path) -> Result<PathBuf> {
    if let Some(seal) = seal {
        return Ok(seal);
    }
    std::fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create {}", work_dir.display()))?;
    let path = work_dir.join("default_seal.png");
    write_default_seal(&path).context("Failed to write the built-in seal")?;
    Ok(path)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let pipeline = SealPipeline::new(config, &args.work_dir)?;

    match args.command {
        Command::Merge {
            main,
            attachments,
            output,
        } => {
            let pages = seal_core::try_merge_pdfs(&main, &attachments, &output)
                .with_context(|| format!("Failed to merge {}", main.display()))?;
            println!("{} ({} pages)", output.display(), pages);
        }
        Command::Analyze { pdf, all } => {
            let layouts = shared_pdf::try_extract_layout(&pdf)
                .with_context(|| format!("Failed to read {}", pdf.display()))?;
            if all {
                print_json(&pipeline.detector().rank(&layouts))?;
            } else {
                match pipeline.detector().detect(&layouts) {
                    Some(candidate) => print_json(&candidate)?,
                    None => bail!("{} has no pages", pdf.display()),
                }
            }
        }
        Command::Stamp {
            pdf,
            output,
            seal,
            positions,
        } => {
            let seal = seal_path(seal, pipeline.work_dir())?;
            let report = pipeline
                .renderer()
                .stamp_file(&pdf, &output, &seal, &positions)
                .with_context(|| format!("Failed to stamp {}", pdf.display()))?;
            print_json(&report)?;
        }
        Command::Process {
            number,
            counterparty,
            name,
            main,
            attachments,
            seal,
        } => {
            let seal = seal_path(seal, pipeline.work_dir())?;
            let job = ContractJob {
                contract_number: number,
                counterparty_abbr: counterparty,
                contract_name: name,
                main_pdf: main,
                attachments,
            };
            let outcome = pipeline
                .run(&job, &seal)
                .with_context(|| format!("Failed to process contract {}", job.contract_number))?;
            print_json(&outcome)?;
        }
        Command::Filename {
            number,
            counterparty,
            name,
        } => {
            println!("{}", generate_output_filename(&number, &counterparty, &name));
        }
        Command::DefaultSeal { output } => {
            default_seal_image()
                .save(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Command::Run { command } => {
            let json = if command.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&command)
                    .with_context(|| format!("Failed to read {}", command.display()))?
            };
            let command: SealCommand =
                serde_json::from_str(&json).context("Failed to parse command")?;
            let result = execute(&pipeline, command);
            print_json(&result)?;
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_binary_name_matches_package() {
        use clap::CommandFactory;
        assert_eq!(Args::command().get_name(), env!("CARGO_PKG_NAME"));
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(
            parse_position("2:400.5:600").unwrap(),
            StampPosition::new(2, 400.5, 600.0)
        );
    }

    #[test]
    fn test_parse_position_rejects_bad_input() {
        assert!(parse_position("2:400").is_err());
        assert!(parse_position("a:1:2").is_err());
        assert!(parse_position("1:2:3:4").is_err());
    }

    #[test]
    fn test_args_parse_stamp() {
        let args = Args::try_parse_from([
            "seal-cli", "stamp", "in.pdf", "-o", "out.pdf", "--at", "0:10:20", "--at", "1:30:40",
        ])
        .unwrap();
        match args.command {
            Command::Stamp { positions, seal, .. } => {
                assert_eq!(positions.len(), 2);
                assert!(seal.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_args_parse_process() {
        let args = Args::try_parse_from([
            "seal-cli",
            "-v",
            "process",
            "--number",
            "HT-1",
            "--counterparty",
            "ACME",
            "--name",
            "Supply",
            "main.pdf",
            "a1.pdf",
            "a2.pdf",
        ])
        .unwrap();
        assert_eq!(args.verbose, 1);
        match args.command {
            Command::Process { attachments, .. } => assert_eq!(attachments.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }
}

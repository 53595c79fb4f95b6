use crate::error::SealError;
use crate::merge::try_merge_pdfs;
use crate::pipeline::{ContractJob, PreparedContract, SealPipeline};
use crate::stamp::stamp_request;
use serde::{Deserialize, Serialize};
use shared_types::{CandidatePosition, StampRequest};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SealCommand {
    Merge {
        main: PathBuf,
        #[serde(default)]
        attachments: Vec<PathBuf>,
        output: PathBuf,
    },
    Analyze {
        pdf: PathBuf,
    },
    Stamp(StampRequest),
    Process {
        job: ContractJob,
        seal_image: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: Option<PathBuf>,
    pub suggestion: Option<CandidatePosition>,
    pub error: Option<String>,
    pub metrics: Option<CommandMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandMetrics {
    pub page_count: usize,
    pub processing_time_ms: u64,
    /// 0 when the command writes no file
    pub output_size_bytes: u64,
}

struct Completed {
    output: Option<PathBuf>,
    suggestion: Option<CandidatePosition>,
    page_count: usize,
}

/// Run one command against the pipeline. Failures are reported in the
/// result rather than returned.
pub fn execute(pipeline: &SealPipeline, command: SealCommand) -> CommandResult {
    let start = Instant::now();
    match run(pipeline, command) {
        Ok(done) => {
            let output_size_bytes = done
                .output
                .as_deref()
                .and_then(|path| std::fs::metadata(path).ok())
                .map_or(0, |meta| meta.len());
            CommandResult {
                success: true,
                output: done.output,
                suggestion: done.suggestion,
                error: None,
                metrics: Some(CommandMetrics {
                    page_count: done.page_count,
                    processing_time_ms: start.elapsed().as_millis() as u64,
                    output_size_bytes,
                }),
            }
        }
        Err(e) => {
            error!(error = %e, "command failed");
            CommandResult {
                success: false,
                output: None,
                suggestion: None,
                error: Some(e.to_string()),
                metrics: None,
            }
        }
    }
}

fn run(pipeline: &SealPipeline, command: SealCommand) -> Result<Completed, SealError> {
    match command {
        SealCommand::Merge {
            main,
            attachments,
            output,
        } => {
            let page_count = try_merge_pdfs(&main, &attachments, &output)?;
            Ok(Completed {
                output: Some(output),
                suggestion: None,
                page_count,
            })
        }
        SealCommand::Analyze { pdf } => analyze(pipeline, &pdf),
        SealCommand::Stamp(request) => {
            let report = stamp_request(pipeline.renderer(), &request)?;
            Ok(Completed {
                output: Some(request.output_pdf),
                suggestion: None,
                page_count: report.page_count,
            })
        }
        SealCommand::Process { job, seal_image } => {
            let outcome = pipeline.run(&job, &seal_image)?;
            Ok(Completed {
                output: Some(outcome.output),
                suggestion: Some(outcome.suggestion),
                page_count: outcome.report.page_count,
            })
        }
    }
}

fn analyze(pipeline: &SealPipeline, pdf: &Path) -> Result<Completed, SealError> {
    let prepared = PreparedContract {
        pdf: pdf.to_path_buf(),
        merged: false,
    };
    let layouts = pipeline.layout(&prepared)?;
    let suggestion = pipeline
        .detector()
        .detect(&layouts)
        .ok_or_else(|| SealError::ExtractionFailed(pdf.display().to_string()))?;
    Ok(Completed {
        output: None,
        suggestion: Some(suggestion),
        page_count: layouts.len(),
    })
}

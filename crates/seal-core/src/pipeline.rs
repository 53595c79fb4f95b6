//! Upload, analyse and stamp workflow
//!
//! A contract goes through three steps: its attachments are merged into the
//! main PDF, the merged document is analysed for a seal position, and the
//! chosen positions are stamped into a file named after the contract.

use crate::annotate::{today, try_annotate_contract};
use crate::config::SealConfig;
use crate::detector::PositionDetector;
use crate::error::SealError;
use crate::filename::generate_output_filename;
use crate::merge::try_merge_pdfs;
use crate::stamp::{StampReport, StampRenderer};
use serde::{Deserialize, Serialize};
use shared_types::{CandidatePosition, PageLayout, StampPosition};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// A contract as submitted for sealing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractJob {
    pub contract_number: String,
    pub counterparty_abbr: String,
    pub contract_name: String,
    pub main_pdf: PathBuf,
    #[serde(default)]
    pub attachments: Vec<PathBuf>,
}

impl ContractJob {
    pub fn output_filename(&self) -> String {
        generate_output_filename(
            &self.contract_number,
            &self.counterparty_abbr,
            &self.contract_name,
        )
    }
}

/// The document that analysis and stamping operate on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedContract {
    pub pdf: PathBuf,
    /// False when merging failed and the main PDF is used on its own
    pub merged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampOutcome {
    pub output: PathBuf,
    pub suggestion: CandidatePosition,
    pub report: StampReport,
}

/// Runs contracts through merge, analysis and stamping.
///
/// Holds no per-contract state, so one pipeline can serve several threads
/// as long as their contracts produce different output names.
#[derive(Debug, Clone)]
pub struct SealPipeline {
    config: SealConfig,
    detector: PositionDetector,
    renderer: StampRenderer,
    work_dir: PathBuf,
}

impl SealPipeline {
    pub fn new(config: SealConfig, work_dir: impl Into<PathBuf>) -> Result<Self, SealError> {
        let detector = PositionDetector::new(config.detector.clone())?;
        let renderer = StampRenderer::new(config.renderer.clone());
        Ok(Self {
            config,
            detector,
            renderer,
            work_dir: work_dir.into(),
        })
    }

    pub fn config(&self) -> &SealConfig {
        &self.config
    }

    pub fn detector(&self) -> &PositionDetector {
        &self.detector
    }

    pub fn renderer(&self) -> &StampRenderer {
        &self.renderer
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Merge the attachments into `work_dir/merged_<uuid>.pdf`.
    ///
    /// Without attachments, or when merging fails, the main PDF is used
    /// as it is.
    pub fn prepare(&self, job: &ContractJob) -> Result<PreparedContract, SealError> {
        if !job.main_pdf.exists() {
            return Err(SealError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", job.main_pdf.display()),
            )));
        }
        if job.attachments.is_empty() {
            return Ok(PreparedContract {
                pdf: job.main_pdf.clone(),
                merged: false,
            });
        }

        std::fs::create_dir_all(&self.work_dir)?;
        let merged_path = self.work_dir.join(format!("merged_{}.pdf", Uuid::new_v4()));
        match try_merge_pdfs(&job.main_pdf, &job.attachments, &merged_path) {
            Ok(_) => Ok(PreparedContract {
                pdf: merged_path,
                merged: true,
            }),
            Err(e) => {
                warn!(
                    contract = %job.contract_number,
                    error = %e,
                    "merge failed, continuing with the main contract only"
                );
                Ok(PreparedContract {
                    pdf: job.main_pdf.clone(),
                    merged: false,
                })
            }
        }
    }

    /// Extract the layout of the prepared document
    pub fn layout(&self, prepared: &PreparedContract) -> Result<Vec<PageLayout>, SealError> {
        let layouts = shared_pdf::extract_layout(&prepared.pdf);
        if layouts.is_empty() {
            return Err(SealError::ExtractionFailed(prepared.pdf.display().to_string()));
        }
        Ok(layouts)
    }

    /// Suggest where the seal should go
    pub fn analyze(&self, prepared: &PreparedContract) -> Result<CandidatePosition, SealError> {
        let layouts = self.layout(prepared)?;
        self.detector
            .detect(&layouts)
            .ok_or_else(|| SealError::ExtractionFailed(prepared.pdf.display().to_string()))
    }

    /// Annotate and stamp the prepared document into `work_dir/<output name>`.
    ///
    /// The annotated intermediate file is removed however this returns.
    pub fn stamp(
        &self,
        job: &ContractJob,
        prepared: &PreparedContract,
        seal_image: &Path,
        positions: &[StampPosition],
    ) -> Result<(PathBuf, StampReport), SealError> {
        std::fs::create_dir_all(&self.work_dir)?;
        let annotated = tempfile::Builder::new()
            .prefix("annotated_")
            .suffix(".pdf")
            .tempfile_in(&self.work_dir)?
            .into_temp_path();

        try_annotate_contract(
            &prepared.pdf,
            &annotated,
            &job.contract_number,
            &today(&self.config.annotation),
            &self.config.annotation,
        )?;

        let output = self.work_dir.join(job.output_filename());
        let report = self
            .renderer
            .stamp_file(&annotated, &output, seal_image, positions)?;
        Ok((output, report))
    }

    /// Prepare, analyse and stamp at the suggested position
    pub fn run(&self, job: &ContractJob, seal_image: &Path) -> Result<StampOutcome, SealError> {
        let prepared = self.prepare(job)?;
        let suggestion = self.analyze(&prepared)?;
        info!(
            contract = %job.contract_number,
            page = suggestion.page,
            score = suggestion.score,
            reason = %suggestion.reason,
            "seal position chosen"
        );

        let (output, report) =
            self.stamp(job, &prepared, seal_image, &[suggestion.to_stamp_position()])?;
        Ok(StampOutcome {
            output,
            suggestion,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(main: PathBuf) -> ContractJob {
        ContractJob {
            contract_number: "HT-001".to_string(),
            counterparty_abbr: "ACME".to_string(),
            contract_name: "Services".to_string(),
            main_pdf: main,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(job(PathBuf::new()).output_filename(), "HT-001ACMEServices.pdf");
    }

    #[test]
    fn test_job_deserializes_without_attachments() {
        let job: ContractJob = serde_json::from_str(
            r#"{"contract_number":"1","counterparty_abbr":"A","contract_name":"N","main_pdf":"m.pdf"}"#,
        )
        .unwrap();
        assert!(job.attachments.is_empty());
    }

    #[test]
    fn test_prepare_missing_main_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = SealPipeline::new(SealConfig::default(), dir.path()).unwrap();
        let result = pipeline.prepare(&job(dir.path().join("missing.pdf")));
        assert!(matches!(result, Err(SealError::Io(_))));
    }

    #[test]
    fn test_bad_keyword_config_rejected() {
        let mut config = SealConfig::default();
        config.detector.priority_keywords = vec!["[".to_string()];
        assert!(matches!(
            SealPipeline::new(config, "/tmp"),
            Err(SealError::Config(_))
        ));
    }

    #[test]
    fn test_unreadable_pdf_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.pdf");
        std::fs::write(&main, b"%PDF-garbage").unwrap();
        let pipeline = SealPipeline::new(SealConfig::default(), dir.path()).unwrap();
        let prepared = pipeline.prepare(&job(main)).unwrap();
        assert!(matches!(
            pipeline.analyze(&prepared),
            Err(SealError::ExtractionFailed(_))
        ));
    }
}

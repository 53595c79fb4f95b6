//! Contract sealing
//!
//! Merges a contract with its attachments, finds where the company seal
//! should go, and stamps it along with a straddle seal across the page edges.

pub mod annotate;
pub mod command;
pub mod config;
pub mod detector;
pub mod error;
pub mod filename;
pub mod geometry;
pub mod merge;
mod page;
pub mod pipeline;
pub mod seal_image;
pub mod stamp;
pub mod straddle;

pub use annotate::{annotate_contract, try_annotate_contract};
pub use command::{execute, CommandMetrics, CommandResult, SealCommand};
pub use config::SealConfig;
pub use detector::{detect_stamp_position, rank_candidates, PositionDetector};
pub use error::SealError;
pub use filename::generate_output_filename;
pub use merge::{merge_pdfs, try_merge_pdfs};
pub use pipeline::{ContractJob, PreparedContract, SealPipeline, StampOutcome};
pub use seal_image::{default_seal_image, write_default_seal};
pub use stamp::{stamp_positions, try_stamp_positions, StampRenderer, StampReport};

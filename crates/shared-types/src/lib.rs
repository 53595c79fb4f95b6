pub mod types;

pub use types::{
    CandidatePosition, PageLayout, Rect, StampPosition, StampRequest, TextSpan,
};

//! Trajectory data model
//!
//! Canonical Guard/Step/Trajectory shapes plus the normalization rules that
//! every ingestion path (manual authoring, recording, exploration fallback)
//! runs through, so the store and retriever always see one shape.

pub mod authoring;
pub mod model;
pub mod normalize;

pub use authoring::{
    parse_steps, validate_steps_payload, ValidationReport, MATCH_LINE_ANCHOR, MAX_BRANCHES,
};
pub use model::{Guard, GuardKind, Step, Trajectory, TrajectoryDraft, UsageStats};
pub use normalize::{domain_from_site_or_url, normalize_text, short_id, tokenize};

//! Data model shared by every pipeline stage

mod candidate;
mod input;
mod names;
mod plan;

pub use candidate::{
    clean_null, is_systemic_route, normalize_frequency, normalize_route, Category,
    ResistanceGeneObservation, TherapyCandidate,
};
pub use input::{
    join_human, IcdCodeName, IcdTransformation, InputParameters, Pathogen, SourceDocument,
};
pub use names::{canonical_medical_name, is_combination, normalize_name};
pub use plan::{Field, SourceRef, SourceSummary, TherapyPlan, Tier, UnifiedEntry};

//! Service layer: the pipeline stages of the selection engine.

pub mod cancel;
pub mod category_assigner;
pub mod candidate_filter;
pub mod chain;
pub mod customizer;
pub mod detailed_selector;
pub mod emergency;
pub mod parse;
pub mod validation_loop;

pub use cancel::CancelFlag;
pub use candidate_filter::CandidateFilter;
pub use category_assigner::CategoryAssigner;
pub use chain::{Completion, ModelBackendChain};
pub use customizer::{CustomizedDocument, PolicyCustomizer};
pub use detailed_selector::{DetailedSelector, SelectionDraft};
pub use emergency::EmergencySelector;
pub use validation_loop::ValidationLoop;

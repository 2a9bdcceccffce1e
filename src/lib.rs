//! Run tracking and hierarchical decomposition for iterative, LLM-assisted
//! text clustering.
//!
//! An external pipeline drives a [`recorder::RunRecorder`] through
//! propose, assign and select stages each iteration. Finished runs can be
//! split further with [`decompose`], which scopes a child job to the texts of
//! a chosen cluster.

pub mod cli;
pub mod commands;
pub mod decompose;
pub mod error;
pub mod metrics;
pub mod model;
pub mod recorder;
pub mod util;

pub use error::{DecomposeError, RecorderError};
pub use model::{AssignmentMatrix, Evaluation, LabelSet, Problem, UNMATCHED};
pub use recorder::RunRecorder;

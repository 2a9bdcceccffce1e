//! Evaluation metrics for cluster descriptions and cluster predictions
//!
//! Everything here is pure: no I/O, no shared state. Degenerate inputs (empty
//! populations, descriptions nobody matches) score 0 instead of failing.

mod agreement;
mod assignment;
mod retrieval;

pub use agreement::{ClusterAgreement, cluster_agreement};
pub use assignment::{best_label_mapping, contingency, max_weight_matching};
pub use retrieval::{
    DescriptionPerformance, RetrievalScore, description_performance, expected_membership,
};

//! Response verification and corrective retrieval

mod crag;
mod verifier;

pub use crag::{generate_crag_queries, verify_and_correct, CragResult};
pub use verifier::{
    calculate_confidence, verify_response, Claim, ClaimStatus, VerificationResult,
};

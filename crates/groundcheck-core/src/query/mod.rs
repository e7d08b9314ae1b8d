//! Query understanding: preprocessing, planning, expansion, HyDE

mod expander;
mod hyde;
mod planner;
mod preprocess;

pub use expander::{expand_query, ExpansionResult};
pub use hyde::generate_hyde_document;
pub use planner::{
    heuristic_plan, plan_query, AnswerStyle, Complexity, QueryPlan, QueryType, RetrievalStrategy,
};
pub use preprocess::{
    detect_document_request, expand_contractions, preprocess_query, PreprocessedQuery,
};

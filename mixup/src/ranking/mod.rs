//! Group-aware re-ranking
//!
//! - [`decline`]: multiplier functions of the intra-group position
//! - [`expression`]: user-supplied decline expressions
//! - [`resolver`]: field value lookup for window candidates
//! - [`reranker`]: the windowed grouping re-ranker itself

pub mod decline;
pub mod expression;
pub mod reranker;
pub mod resolver;

pub use decline::{
    Constant, DeclineFactory, DeclineFunction, DeclineInput, DeclineRegistry, DeclineSpec,
    Exponential, ExpressionDecline, Linear, PositionRecip,
};
pub use expression::Expression;
pub use reranker::{GroupingReranker, RerankStats};
pub use resolver::{FieldResolver, FieldTable, StoredFields};

pub mod error;
pub mod index_construction;
pub mod store;
pub mod types;

pub use error::IndexError;
pub use index_construction::chaining::{
    calculate_index, EngineConfig, IndexCalculationInput, IndexEngine, IndexRun,
};
pub use index_construction::weighting::WeightingScheme;
pub use store::{InMemoryStore, PriceStore};
pub use types::*;

/// Standard result type for all index operations
pub type IndexResult<T> = Result<T, IndexError>;

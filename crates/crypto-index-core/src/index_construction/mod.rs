pub mod chaining;
pub mod daily_value;
pub mod divisor;
pub mod verification;
pub mod weighting;

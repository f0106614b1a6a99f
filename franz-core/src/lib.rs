pub mod crd;
pub mod error;

pub use error::AppError;

/// Comma-separated list of canonical label selectors which match the
/// Franz Operator's labelling scheme.
pub const FRANZ_OPERATOR_LABEL_SELECTORS: &str = "app=kafka,franz.rs/controlled-by=franz-operator";

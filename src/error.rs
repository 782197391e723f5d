use thiserror::Error;

/// Errors surfaced by the clustering facade.
///
/// Configuration and domain errors are raised before any clustering state is
/// mutated; `CorruptedState` is only produced by the optional consistency
/// check and indicates a bug in the engine itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JetError {
    #[error("algorithm {algorithm} fixes p = {expected}, but p = {got} was requested")]
    InvalidPower {
        algorithm: &'static str,
        expected: f64,
        got: f64,
    },
    #[error("algorithm {0} requires an explicit power parameter")]
    MissingPower(&'static str),
    #[error("algorithm {algorithm} is not supported by the {strategy} strategy")]
    UnsupportedAlgorithm {
        algorithm: &'static str,
        strategy: &'static str,
    },
    #[error("cannot cluster an empty event")]
    EmptyEvent,
    #[error("input particle {index} has a non-finite momentum component")]
    NonFiniteInput { index: usize },
    #[error("cluster state corrupted: {0}")]
    CorruptedState(String),
}

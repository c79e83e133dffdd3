use netcheck_net::NetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Network error: {0}")]
    Net(#[from] NetError),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Solver returned unknown: {0}")]
    UnknownResult(String),
    #[error("Encoder {encoder} belongs to session {expected}, not session {found}")]
    SessionMismatch {
        encoder: usize,
        expected: usize,
        found: usize,
    },
    #[error("Encoder {0} has not been computed")]
    NotComputed(usize),
    #[error("Environment input {left} has no counterpart {right}")]
    AsymmetricEnvironment { left: String, right: String },
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("token error: {0}")]
    Token(String),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CardError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing data: {0}")]
    MissingData(String),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("location not found: {0}")]
    NotFound(String),

    #[error("provider error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed provider payload: {0}")]
    Payload(String),
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeepdiveError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Research job with id '{0}' already exists")]
    JobExists(String),

    #[error("Research job '{0}' not found")]
    JobNotFound(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

use thiserror::Error;

/// Failures talking to the browser-automation layer.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("could not launch chrome: {0}")]
    Launch(String),

    #[error("chrome error: {0}")]
    Chrome(#[from] anyhow::Error),

    #[error("unexpected script result: {0}")]
    Script(String),

    #[error("browser session already closed")]
    Closed,
}

/// Failures while pulling data out of a page.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

/// A normalization step could not apply to the record it was given.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("column `{0}` not present")]
    MissingColumn(String),

    #[error("column `{column}` has unexpected shape, expected {expected}")]
    Shape {
        column: String,
        expected: &'static str,
    },
}

/// Failures writing or reading tabular output and checkpoints.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

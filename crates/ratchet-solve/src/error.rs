use ratchet_spec::SpecParseError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SolveError {
    // Input errors
    #[error("Malformed spec: {0}")]
    MalformedSpec(#[from] SpecParseError),

    // Terminal solver outcomes
    #[error(
        "The following packages are not available from current channels: {} (channels: {})",
        .specs.join(", "),
        .channels.join(", ")
    )]
    PackagesNotFound {
        specs: Vec<String>,
        channels: Vec<String>,
    },

    #[error("{message}")]
    Unsatisfiable { message: String, allow_retry: bool },

    #[error("Requested spec \"{requested}\" conflicts with pinned spec \"{pin}\"")]
    PinConflict { requested: String, pin: String },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // JSON/parsing errors
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl SolveError {
    /// Whether the caller may retry with different top-level parameters
    pub fn allow_retry(&self) -> bool {
        match self {
            SolveError::Unsatisfiable { allow_retry, .. } => *allow_retry,
            SolveError::Runtime(_) | SolveError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SolveError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("TLE directory not found: {0}")]
    DirectoryNotFound(String),
    #[error("TLE file read error: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Invalid elements for NORAD {norad_id}: {message}")]
    InvalidElements { norad_id: u32, message: String },
    #[error("Propagation error: {0}")]
    Propagation(String),
    #[error("Station position unavailable, cannot compute without a position")]
    NoStationPosition,
    #[error("No satellites selected")]
    EmptySelection,
    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),
}

impl PredictError {
    pub fn invalid_elements(norad_id: u32, message: impl Into<String>) -> Self {
        PredictError::InvalidElements {
            norad_id,
            message: message.into(),
        }
    }
}

impl From<sgp4::Error> for PredictError {
    fn from(err: sgp4::Error) -> Self {
        PredictError::Propagation(err.to_string())
    }
}

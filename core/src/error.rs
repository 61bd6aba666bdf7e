use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("case load failed: {0}")]
    CaseLoad(String),

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("audit sink error: {0}")]
    AuditSink(String),

    #[error("report artifact error: {0}")]
    ReportArtifact(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

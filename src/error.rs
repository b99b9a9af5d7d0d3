use thiserror::Error as ThisError;

/// Replacement text for secret values in surfaced errors.
pub const REDACTED: &str = "[redacted]";

#[derive(Debug, ThisError)]
pub enum HdbError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("username generation error: {0}")]
    Generation(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("config load error: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),
}

impl HdbError {
    pub fn connection(e: impl std::fmt::Display) -> Self {
        HdbError::Connection(e.to_string())
    }

    pub fn execution(e: impl std::fmt::Display) -> Self {
        HdbError::Execution(e.to_string())
    }

    /// Stable tag for the error class, used in host responses.
    pub fn kind(&self) -> &'static str {
        match self {
            HdbError::Configuration(_) => "configuration",
            HdbError::Validation(_) => "validation",
            HdbError::Connection(_) => "connection",
            HdbError::Execution(_) => "execution",
            HdbError::Generation(_) => "generation",
            HdbError::Cancelled => "cancelled",
            HdbError::DeadlineExceeded => "deadline_exceeded",
            HdbError::ConfigLoad(_) => "config_load",
        }
    }

    /// Mask every occurrence of the given secret values in the error text.
    ///
    /// Empty secrets are ignored so that an unset password does not turn
    /// every character boundary into a redaction marker. Longer secrets are
    /// masked first, so an escaped form is not half-masked by its raw value.
    pub fn redact<S: AsRef<str>>(self, secrets: &[S]) -> Self {
        let mut ordered: Vec<&str> = secrets
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.is_empty())
            .collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));
        let mask = |msg: String| {
            ordered
                .iter()
                .fold(msg, |acc, secret| acc.replace(*secret, REDACTED))
        };
        match self {
            HdbError::Configuration(m) => HdbError::Configuration(mask(m)),
            HdbError::Validation(m) => HdbError::Validation(mask(m)),
            HdbError::Connection(m) => HdbError::Connection(mask(m)),
            HdbError::Execution(m) => HdbError::Execution(mask(m)),
            HdbError::Generation(m) => HdbError::Generation(mask(m)),
            other => other,
        }
    }
}

impl From<figment::Error> for HdbError {
    fn from(e: figment::Error) -> Self {
        HdbError::ConfigLoad(Box::new(e))
    }
}

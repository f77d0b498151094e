use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("connection failed: {0:#}")]
    Connection(anyhow::Error),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("invalid catalog: {} violation(s)", .0.len())]
    InvalidCatalog(Vec<CatalogViolation>),

    #[error("{context}: {source:#}")]
    Store {
        context: String,
        source: anyhow::Error,
    },
}

impl SeedError {
    pub fn store(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Store {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Prefix the context of a `Store` error with the item being seeded.
    /// Other variants pass through unchanged.
    pub fn within(self, item: &str) -> Self {
        match self {
            Self::Store { context, source } => Self::Store {
                context: format!("{item}: {context}"),
                source,
            },
            other => other,
        }
    }

    /// Process exit code for the seed binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 1,
            Self::Connection(_) => 2,
            Self::InvalidCatalog(_) => 3,
            Self::DuplicateKey(_) | Self::Store { .. } => 4,
        }
    }
}

/// A single reason a catalog was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogViolation {
    pub template: Option<String>,
    pub criterion: Option<String>,
    pub message: String,
}

impl CatalogViolation {
    pub fn catalog(message: impl Into<String>) -> Self {
        Self {
            template: None,
            criterion: None,
            message: message.into(),
        }
    }

    pub fn template(template: &str, message: impl Into<String>) -> Self {
        Self {
            template: Some(template.to_string()),
            criterion: None,
            message: message.into(),
        }
    }

    pub fn criterion(template: &str, criterion: &str, message: impl Into<String>) -> Self {
        Self {
            template: Some(template.to_string()),
            criterion: Some(criterion.to_string()),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CatalogViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.template, &self.criterion) {
            (Some(t), Some(c)) => write!(f, "[{t}/{c}] {}", self.message),
            (Some(t), None) => write!(f, "[{t}] {}", self.message),
            _ => write!(f, "[catalog] {}", self.message),
        }
    }
}

use thiserror::Error;

use super::origin::OriginRejection;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("parentDomain rejected: {0}")]
    Origin(#[from] OriginRejection),
    #[error("invalid value `{value}` for parameter `{name}`")]
    InvalidParameter { name: &'static str, value: String },
}

impl DomainError {
    pub fn invalid_parameter(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            value: value.into(),
        }
    }
}

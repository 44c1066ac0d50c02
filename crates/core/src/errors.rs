use thiserror::Error;

use crate::recommender::{CatalogError, StoreError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("affinity store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("catalog lookup failed: {0}")]
    Catalog(#[from] CatalogError),
}

impl RecommendationError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "Recommendations are temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl RecommendationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<RecommendationError> for InterfaceError {
    fn from(value: RecommendationError) -> Self {
        let message = value.to_string();
        match value {
            RecommendationError::StoreUnavailable(_)
            | RecommendationError::Catalog(CatalogError::Unavailable(_)) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
            RecommendationError::Catalog(CatalogError::Decode(_)) => {
                Self::Internal { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}

use thiserror::Error;

use crate::domain::entities::promo_code::PromoRejection;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store unavailable")]
    StoreUnavailable,

    #[error("Unknown plan type: {0}")]
    InvalidPlan(String),

    #[error("Malformed invoice token: {0}")]
    BadToken(String),

    #[error("Promo code rejected: {0}")]
    PromoInvalid(PromoRejection),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transient failures the caller should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable | AppError::Internal(_))
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    StoreUnavailable,
    InvalidPlan,
    BadToken,
    PromoInvalid,
    InvalidSignature,
    Unauthorized,
    InvalidInput,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorCode::InvalidPlan => "INVALID_PLAN",
            ErrorCode::BadToken => "BAD_TOKEN",
            ErrorCode::PromoInvalid => "PROMO_INVALID",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

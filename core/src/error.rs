use thiserror::Error;

use crate::view::Screen;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Food name must not be empty")]
    EmptyName,
    #[error("Weight must be greater than 0 (got {0})")]
    NonPositiveWeight(f64),
    #[error("{field} per 100g must be between 0 and 100 (got {value})")]
    DensityOutOfRange { field: &'static str, value: f64 },
    #[error("{field} goal must be a non-negative number (got {value})")]
    InvalidGoal { field: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("write failed: {0:#}")]
    Write(anyhow::Error),
    #[error("read failed: {0:#}")]
    Read(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sign-in token is empty")]
    EmptyToken,
    #[error("sign-in failed: {0:#}")]
    SignIn(anyhow::Error),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("cannot go from {from:?} to {to:?}")]
    InvalidTransition { from: Screen, to: Screen },
    #[error("{0} not found")]
    NotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

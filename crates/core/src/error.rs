use rust_decimal::Decimal;
use thiserror::Error;

use crate::asset::Asset;

/// Errors raised by pure domain-type construction and validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("weight for {asset} out of range [0,1]: {weight}")]
    WeightOutOfRange { asset: Asset, weight: Decimal },

    #[error("weights sum to {sum}, expected 1 within tolerance")]
    WeightsDoNotSumToOne { sum: Decimal },

    #[error("portfolio total_krw is zero; cannot compute weights")]
    ZeroPortfolioValue,
}

use serde::Deserialize;
use std::ops::RangeInclusive;
use uuid::Uuid;

use super::{pipeline::default_strategy, ItemId, UserId};
use crate::error::{AppError, AppResult};

pub const K_RANGE: RangeInclusive<usize> = 1..=100;
pub const TIME_PERIOD_RANGE: RangeInclusive<u64> = 3_600..=1_209_600;

fn default_k() -> usize {
    20
}

fn default_exploration_factor() -> f64 {
    0.1
}

fn default_time_period() -> u64 {
    604_800 // 1 week in seconds
}

/// Body of `POST /recommendations`
#[derive(Debug, Clone, Deserialize)]
pub struct RecommendationRequest {
    pub pipeline_id: Uuid,
    pub user_id: UserId,
    /// Seed item for the content and graph signals
    #[serde(default)]
    pub item_id: Option<ItemId>,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_strategy")]
    pub retriever_strategy: String,
    #[serde(default = "default_strategy")]
    pub ranker_strategy: String,
    #[serde(default = "default_exploration_factor")]
    pub exploration_factor: f64,
    #[serde(default)]
    pub promoted_items: Vec<ItemId>,
    #[serde(default)]
    pub excluded_items: Vec<ItemId>,
    #[serde(default)]
    pub detailed_output: bool,
}

impl RecommendationRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_k(self.k)?;
        if !(0.0..=1.0).contains(&self.exploration_factor) {
            return Err(AppError::InvalidArgument(format!(
                "exploration_factor must be between 0 and 1, got {}",
                self.exploration_factor
            )));
        }
        Ok(())
    }
}

/// Body of `POST /trends`: a recommendation request ranked by recent interaction volume
#[derive(Debug, Clone, Deserialize)]
pub struct TrendsRequest {
    #[serde(flatten)]
    pub base: RecommendationRequest,
    /// Trend window in seconds
    #[serde(default = "default_time_period")]
    pub time_period: u64,
}

impl TrendsRequest {
    pub fn validate(&self) -> AppResult<()> {
        self.base.validate()?;
        if !TIME_PERIOD_RANGE.contains(&self.time_period) {
            return Err(AppError::InvalidArgument(format!(
                "time_period must be between {} and {} seconds, got {}",
                TIME_PERIOD_RANGE.start(),
                TIME_PERIOD_RANGE.end(),
                self.time_period
            )));
        }
        Ok(())
    }
}

/// Body of `POST /random-recommendations`
#[derive(Debug, Clone, Deserialize)]
pub struct RandomRecommendationRequest {
    pub pipeline_id: Uuid,
    pub user_id: UserId,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub promoted_items: Vec<ItemId>,
    #[serde(default)]
    pub excluded_items: Vec<ItemId>,
    #[serde(default)]
    pub detailed_output: bool,
}

impl RandomRecommendationRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_k(self.k)
    }
}

fn validate_k(k: usize) -> AppResult<()> {
    if K_RANGE.contains(&k) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "k must be between {} and {}, got {}",
            K_RANGE.start(),
            K_RANGE.end(),
            k
        )))
    }
}

pub mod aggregation;
pub mod exploration;
pub mod formatter;
pub mod model_cache;
pub mod promotion;
pub mod providers;
pub mod recommendations;
pub mod stores;

pub use recommendations::RecommendationService;

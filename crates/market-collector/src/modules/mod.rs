//! 파이프라인 단계 모듈.

pub mod extract;
pub mod load;
pub mod mirror;
pub mod pipeline;
pub mod scheduler;
pub mod transform;

pub use extract::extract_history;
pub use load::{load_warehouse, refresh_analytics_views};
pub use mirror::{blob_name, mirror_dataset, mirror_to_connection};
pub use pipeline::Pipeline;
pub use scheduler::{MarketHours, MarketStatus, Scheduler};
pub use transform::transform_history;

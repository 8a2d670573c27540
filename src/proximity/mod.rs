// 接近提醒

pub mod engine;
pub mod model;
pub mod service;
pub mod state;

pub use engine::{EvaluationSummary, Outcome, ProximityEngine};
pub use model::{AlertStatus, ProximitySubscription, RequestedStatus, SubscriptionUpdate};
pub use service::AlertService;
pub use state::{HYSTERESIS_FACTOR, Transition, next_transition};

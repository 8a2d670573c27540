// 位置上报、共享范围和可见性处理

pub mod model;
pub mod redact;
pub mod scope;
pub mod service;

pub use model::{ConnectionType, Coordinates, DeviceMetadata, LocationSample, PrivacyLevel, RedactedSample};
pub use redact::redact;
pub use scope::{SharingScope, resolve_sharing_scope};
pub use service::{Ingested, LocationService};

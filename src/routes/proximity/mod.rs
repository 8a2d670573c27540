mod handler;
mod model;

pub use handler::{create_alert, delete_alert, list_group_alerts, update_alert};

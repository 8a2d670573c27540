mod handler;
mod model;

pub use handler::{get_group_locations, get_location_history, get_user_location, set_privacy, update_location};

pub mod health;
pub mod shows;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use shows::{add_show, get_show, list_accepted_shows, list_shows, list_unaccepted_shows};

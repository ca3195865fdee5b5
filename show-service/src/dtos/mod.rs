pub mod shows;

pub use shows::{CreateShowRequest, ShowResponse};

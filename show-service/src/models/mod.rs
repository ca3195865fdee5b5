pub mod message;
pub mod show;

pub use message::AcceptanceMessage;
pub use show::{Show, ShowFilter};

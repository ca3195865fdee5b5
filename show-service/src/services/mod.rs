pub mod database;
pub mod memory;
pub mod metrics;
pub mod store;

pub use database::ShowDb;
pub use memory::InMemoryShowStore;
pub use metrics::{get_metrics, init_metrics, record_acceptance, record_show_created};
pub use store::ShowStore;

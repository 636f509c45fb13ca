pub mod error;
pub mod models;
pub mod repository;
pub mod schema;
pub mod slots;

pub use error::StoreError;
pub use models::*;
pub use repository::{PgManager, PgSchedulingStore, SchedulingStore};
pub use slots::{day_of_week, generate_slots};

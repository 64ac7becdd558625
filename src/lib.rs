pub mod database_ops;
pub mod errors;

pub mod util {
    pub mod env;
    pub mod tracing;
}

pub use database_ops::db::{CharacterStore, Db};
pub use errors::IngestError;

pub mod db;
pub mod models;
pub mod qdrant;
pub mod rag_configs;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

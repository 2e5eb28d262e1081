// The whole data pipeline lives here: catalog -> filter -> serialize -> file
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod query;
pub mod serialize;
pub mod session;

pub use catalog::{CatalogSource, DpkgCatalog};
pub use config::Config;
pub use error::Error;
pub use export::{ExportOutcome, Exporter};
pub use models::AppEntry;
pub use serialize::ExportFormat;
pub use session::{AppListState, Session};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;

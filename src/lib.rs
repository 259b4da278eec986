pub mod cli;
pub mod config;
pub mod logging;
pub mod mcp;
pub mod query;
pub mod registry;
pub mod watcher;

pub use config::Settings;
pub use query::{JaqEngine, QueryEngine, QueryError};
pub use registry::{ChangeNotifier, FileRecord, FileRegistry, Manifest, RegistryError};

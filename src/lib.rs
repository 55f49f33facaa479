pub mod config;
pub mod crm;
pub mod db;
pub mod error;
pub mod util;

pub use config::{load_config, Config};
pub use crm::Crm;
pub use error::{CrmError, ErrorKind, ErrorPayload};

pub mod config;
pub mod error;
pub mod page;
pub mod pipeline;
pub mod pool;
pub mod queries;
pub mod service;

pub use config::WikiDbConfig;
pub use error::{ServiceError, ServiceResult};
pub use page::{Page, PageMatch};
pub use pipeline::{chain, join2, join3};
pub use pool::{ConnPool, PoolOptions, PooledConn};
pub use queries::{QueryRegistry, RegistryError, SqlQuery};
pub use service::{WikiDatabase, WikiDatabaseService};

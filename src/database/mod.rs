pub mod bootstrap;
pub mod connector;
pub mod env;
pub mod registry;
pub mod routing;

pub use bootstrap::{bootstrap, bootstrap_with, Routing};
pub use connector::{DbPool, Password, PoolConnector, PoolSettings, PoolSpec, SqlxConnector, TrackedConnection};
pub use registry::{ConnectionPoolRegistry, PoolEntry, PoolEntryInfo, PoolStatus, RegistryError, RegistrySettings};
pub use routing::{ResolvedPool, RouteTier, RoutingError, RoutingMode, RoutingResolver, StaticRoutes};

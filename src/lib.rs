pub mod server;
pub mod shared;
pub mod utils;

pub use server::auth::CompositeAuthenticator;
pub use server::config::ProxyAuthConfig;
pub use shared::{AuthError, ConnectionMetadata, Credential, Permissions};

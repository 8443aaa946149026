pub mod value;

pub mod params;
pub mod pool;
pub mod result;
pub mod serializer;
pub mod transport;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub const DEFAULT_DB_NAME: &str = "default";

/// Pool and session settings. Durations are in seconds, `0` disables the limit.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub max_open_conns: u64, // sessions that may be leased at once
    pub max_idle_conns: u64, // sessions kept for reuse after release
    pub max_lifetime: u64,   // age after which an idle session is discarded
    pub timeout: u64,        // wait for a session on acquire / busy wait
    pub query_timeout: u64,  // default per-command limit of new handles
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_open_conns: 10,
            max_idle_conns: 2,
            max_lifetime: 0,
            timeout: 30,
            query_timeout: 0,
        }
    }
}

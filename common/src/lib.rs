pub mod config;
pub mod error;
pub mod file_info;
pub mod path;

pub use config::{NameServerOptions, ServerConfig};
pub use error::{FsError, Result};
pub use file_info::*;

// Generated gRPC code
pub mod nameserver {
    tonic::include_proto!("pagefs.nameserver");
}

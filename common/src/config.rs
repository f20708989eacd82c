use anyhow::Result;
use serde::Deserialize;
use std::fs;

const GIB: u64 = 1 << 30;
const MIB: u64 = 1 << 20;

/// Namespace-wide allocation parameters, fixed at initialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NameServerOptions {
    /// Smallest page file that may be created, in bytes.
    pub min_file_length: u64,
    /// Allocation granularity of page files, in bytes.
    pub default_segment_size: u64,
    /// Chunk granularity within a segment, in bytes.
    pub default_chunk_size: u64,
    /// Placement hint handed to the chunk allocator.
    pub default_logical_pool_id: u32,
}

impl Default for NameServerOptions {
    fn default() -> Self {
        Self {
            min_file_length: 10 * GIB,
            default_segment_size: GIB,
            default_chunk_size: 16 * MIB,
            default_logical_pool_id: 1,
        }
    }
}

impl NameServerOptions {
    /// Alignment invariants every namespace operation relies on.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.default_segment_size.is_power_of_two() {
            return Err(format!(
                "segment size {} is not a power of two",
                self.default_segment_size
            ));
        }
        if !self.default_chunk_size.is_power_of_two() {
            return Err(format!(
                "chunk size {} is not a power of two",
                self.default_chunk_size
            ));
        }
        if self.default_segment_size % self.default_chunk_size != 0 {
            return Err(format!(
                "segment size {} is not a multiple of chunk size {}",
                self.default_segment_size, self.default_chunk_size
            ));
        }
        if self.min_file_length % self.default_segment_size != 0 {
            return Err(format!(
                "min file length {} is not a multiple of segment size {}",
                self.min_file_length, self.default_segment_size
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// gRPC listen address.
    pub listen: String,
    pub options: NameServerOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:50051".to_string(),
            options: NameServerOptions::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let cfg: ServerConfig = toml::from_str(&content)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(NameServerOptions::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_misaligned_options() {
        let opts = NameServerOptions {
            default_chunk_size: 3 * MIB,
            ..Default::default()
        };
        assert!(opts.validate().is_err());

        let opts = NameServerOptions {
            min_file_length: GIB + 1,
            ..Default::default()
        };
        assert!(opts.validate().is_err());
    }
}

//! Namespace metadata core of the pagefs block-storage system.
//!
//! This crate owns the authoritative mapping from the hierarchical path
//! namespace to file descriptors, from page files to their allocated chunk
//! segments, and the lifecycle of copy-on-write snapshots. All persistent
//! state lives behind the [`storage::NameServerStorage`] trait; the core
//! itself holds no locks and no mutable state beyond the precomputed root
//! descriptor.

pub mod chunk_allocator;
pub mod clean_manager;
pub mod codec;
pub mod fs;
pub mod id_generator;
pub mod mem_store;
pub mod resolver;
pub mod rocks_store;
pub mod storage;

pub use chunk_allocator::{ChunkSegmentAllocator, RoundRobinChunkAllocator};
pub use clean_manager::{CleanTaskManager, SnapshotCleanManager, SnapshotDeleteReply};
pub use fs::PageFs;
pub use id_generator::{InodeIdGenerator, SequentialInodeIdGenerator};
pub use mem_store::MemNameServerStorage;
pub use resolver::PathResolver;
pub use rocks_store::RocksNameServerStorage;
pub use storage::{NameServerStorage, StoreError, StoreResult};

use chrono::{DateTime, Utc};

use crate::nameserver::{
    FileInfo as ProtoFileInfo, FileStatus as ProtoFileStatus, FileType as ProtoFileType,
    PageFileChunkInfo as ProtoChunkInfo, PageFileSegment as ProtoSegment,
};

/// Opaque 64-bit inode identifier assigned at file creation.
pub type InodeId = u64;

/// The root directory's fixed inode id.
pub const ROOT_INODE_ID: InodeId = 0;

/// File kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    PageFile,
    /// Reserved, not creatable.
    AppendFile,
    SnapshotPageFile,
}

/// Descriptor lifecycle state. Only snapshot descriptors ever leave
/// `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Created,
    Deleting,
    /// Reserved.
    CloneMetaInstalled,
}

/// Creation timestamps carry microsecond precision end to end; anything
/// finer would not survive the stored encoding.
fn now_micros() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// The unit addressable by path: a directory, a page file, or a snapshot
/// of a page file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub id: InodeId,
    pub parent_id: InodeId,
    pub filename: String,
    pub full_path: String,
    pub file_type: FileType,
    /// Logical size in bytes; zero for directories.
    pub length: u64,
    /// Allocation granularity; zero for directories.
    pub segment_size: u64,
    pub chunk_size: u64,
    /// Advances on every snapshot taken of this file; starts at 1.
    pub seq_num: u64,
    pub status: FileStatus,
    pub ctime: DateTime<Utc>,
}

impl FileInfo {
    pub fn new_directory(
        id: InodeId,
        parent_id: InodeId,
        filename: String,
        full_path: String,
    ) -> Self {
        Self {
            id,
            parent_id,
            filename,
            full_path,
            file_type: FileType::Directory,
            length: 0,
            segment_size: 0,
            chunk_size: 0,
            seq_num: 1,
            status: FileStatus::Created,
            ctime: now_micros(),
        }
    }

    pub fn new_page_file(
        id: InodeId,
        parent_id: InodeId,
        filename: String,
        full_path: String,
        length: u64,
        segment_size: u64,
        chunk_size: u64,
    ) -> Self {
        Self {
            id,
            parent_id,
            filename,
            full_path,
            file_type: FileType::PageFile,
            length,
            segment_size,
            chunk_size,
            seq_num: 1,
            status: FileStatus::Created,
            ctime: now_micros(),
        }
    }

    /// Build the snapshot child of this page file at its current sequence
    /// number. The snapshot lives under the source file itself:
    /// `{full_path}/{filename}-{seq}`.
    pub fn snapshot_descriptor(&self, id: InodeId) -> FileInfo {
        let filename = format!("{}-{}", self.filename, self.seq_num);
        let full_path = format!("{}/{}", self.full_path, filename);
        Self {
            id,
            parent_id: self.id,
            filename,
            full_path,
            file_type: FileType::SnapshotPageFile,
            length: self.length,
            segment_size: self.segment_size,
            chunk_size: self.chunk_size,
            seq_num: self.seq_num,
            status: FileStatus::Created,
            ctime: now_micros(),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_page_file(&self) -> bool {
        self.file_type == FileType::PageFile
    }
}

/// One (chunk, copyset) placement entry of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    pub chunk_id: u64,
    pub copyset_id: u32,
}

/// One allocation unit of a page file. Exists iff allocation succeeded;
/// absent offsets are unallocated holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFileSegment {
    pub file_id: InodeId,
    pub logical_pool_id: u32,
    /// Copies of the owner's fields at allocation time.
    pub segment_size: u64,
    pub chunk_size: u64,
    /// Byte offset within the file, a multiple of `segment_size`.
    pub start_offset: u64,
    /// Exactly `segment_size / chunk_size` entries, in chunk order.
    pub chunks: Vec<ChunkInfo>,
}

impl From<FileType> for ProtoFileType {
    fn from(t: FileType) -> Self {
        match t {
            FileType::Directory => ProtoFileType::InodeDirectory,
            FileType::PageFile => ProtoFileType::InodePagefile,
            FileType::AppendFile => ProtoFileType::InodeAppendfile,
            FileType::SnapshotPageFile => ProtoFileType::InodeSnapshotPagefile,
        }
    }
}

impl From<ProtoFileType> for FileType {
    fn from(t: ProtoFileType) -> Self {
        match t {
            ProtoFileType::InodeDirectory => FileType::Directory,
            ProtoFileType::InodePagefile => FileType::PageFile,
            ProtoFileType::InodeAppendfile => FileType::AppendFile,
            ProtoFileType::InodeSnapshotPagefile => FileType::SnapshotPageFile,
        }
    }
}

impl From<FileStatus> for ProtoFileStatus {
    fn from(s: FileStatus) -> Self {
        match s {
            FileStatus::Created => ProtoFileStatus::FileCreated,
            FileStatus::Deleting => ProtoFileStatus::FileDeleting,
            FileStatus::CloneMetaInstalled => ProtoFileStatus::FileCloneMetaInstalled,
        }
    }
}

impl From<ProtoFileStatus> for FileStatus {
    fn from(s: ProtoFileStatus) -> Self {
        match s {
            ProtoFileStatus::FileCreated => FileStatus::Created,
            ProtoFileStatus::FileDeleting => FileStatus::Deleting,
            ProtoFileStatus::FileCloneMetaInstalled => FileStatus::CloneMetaInstalled,
        }
    }
}

impl From<FileInfo> for ProtoFileInfo {
    fn from(info: FileInfo) -> Self {
        ProtoFileInfo {
            id: info.id,
            parent_id: info.parent_id,
            filename: info.filename,
            full_path: info.full_path,
            file_type: ProtoFileType::from(info.file_type) as i32,
            length: info.length,
            segment_size: info.segment_size,
            chunk_size: info.chunk_size,
            seq_num: info.seq_num,
            status: ProtoFileStatus::from(info.status) as i32,
            ctime: info.ctime.timestamp_micros() as u64,
        }
    }
}

impl TryFrom<ProtoFileInfo> for FileInfo {
    type Error = String;

    fn try_from(proto: ProtoFileInfo) -> Result<Self, Self::Error> {
        let file_type = ProtoFileType::try_from(proto.file_type)
            .map_err(|_| format!("invalid file_type {} in FileInfo", proto.file_type))?;
        let status = ProtoFileStatus::try_from(proto.status)
            .map_err(|_| format!("invalid status {} in FileInfo", proto.status))?;
        let ctime = DateTime::from_timestamp_micros(proto.ctime as i64)
            .ok_or_else(|| format!("invalid ctime {} in FileInfo", proto.ctime))?;
        Ok(Self {
            id: proto.id,
            parent_id: proto.parent_id,
            filename: proto.filename,
            full_path: proto.full_path,
            file_type: file_type.into(),
            length: proto.length,
            segment_size: proto.segment_size,
            chunk_size: proto.chunk_size,
            seq_num: proto.seq_num,
            status: status.into(),
            ctime,
        })
    }
}

impl From<ChunkInfo> for ProtoChunkInfo {
    fn from(chunk: ChunkInfo) -> Self {
        ProtoChunkInfo {
            chunk_id: chunk.chunk_id,
            copyset_id: chunk.copyset_id,
        }
    }
}

impl From<ProtoChunkInfo> for ChunkInfo {
    fn from(proto: ProtoChunkInfo) -> Self {
        ChunkInfo {
            chunk_id: proto.chunk_id,
            copyset_id: proto.copyset_id,
        }
    }
}

impl From<PageFileSegment> for ProtoSegment {
    fn from(segment: PageFileSegment) -> Self {
        ProtoSegment {
            file_id: segment.file_id,
            logical_pool_id: segment.logical_pool_id,
            segment_size: segment.segment_size,
            chunk_size: segment.chunk_size,
            start_offset: segment.start_offset,
            chunks: segment.chunks.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ProtoSegment> for PageFileSegment {
    fn from(proto: ProtoSegment) -> Self {
        PageFileSegment {
            file_id: proto.file_id,
            logical_pool_id: proto.logical_pool_id,
            segment_size: proto.segment_size,
            chunk_size: proto.chunk_size,
            start_offset: proto.start_offset,
            chunks: proto.chunks.into_iter().map(Into::into).collect(),
        }
    }
}

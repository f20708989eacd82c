use crate::nameserver::StatusCode;
use thiserror::Error;

/// Every way a namespace operation can fail. One variant per wire status
/// code; `OK` is the absence of an error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("invalid parameter")]
    ParamError,

    #[error("file exists")]
    FileExists,

    #[error("file not exists")]
    FileNotExists,

    #[error("not a directory")]
    NotDirectory,

    #[error("directory not exist")]
    DirNotExist,

    #[error("not supported")]
    NotSupported,

    #[error("storage error")]
    StorageError,

    #[error("shrink bigger file")]
    ShrinkBiggerFile,

    #[error("extend unit error")]
    ExtentUnitError,

    #[error("segment not allocated")]
    SegmentNotAllocated,

    #[error("segment allocate error")]
    SegmentAllocateError,

    #[error("file under snapshot")]
    FileUnderSnapshot,

    #[error("snapshot file not exists")]
    SnapshotFileNotExists,

    #[error("snapshot deleting")]
    SnapshotDeleting,

    #[error("internal error")]
    InternalError,
}

impl FsError {
    /// Projection onto the wire status code. The only place internal errors
    /// and wire codes meet.
    pub fn status_code(&self) -> StatusCode {
        match self {
            FsError::ParamError => StatusCode::ParamError,
            FsError::FileExists => StatusCode::FileExists,
            FsError::FileNotExists => StatusCode::FileNotExists,
            FsError::NotDirectory => StatusCode::NotDirectory,
            FsError::DirNotExist => StatusCode::DirNotExist,
            FsError::NotSupported => StatusCode::NotSupported,
            FsError::StorageError => StatusCode::StorageError,
            FsError::ShrinkBiggerFile => StatusCode::ShrinkBiggerFile,
            FsError::ExtentUnitError => StatusCode::ExtentUnitError,
            FsError::SegmentNotAllocated => StatusCode::SegmentNotAllocated,
            FsError::SegmentAllocateError => StatusCode::SegmentAllocateError,
            FsError::FileUnderSnapshot => StatusCode::FileUnderSnapshot,
            FsError::SnapshotFileNotExists => StatusCode::SnapshotFileNotExists,
            FsError::SnapshotDeleting => StatusCode::SnapshotDeleting,
            FsError::InternalError => StatusCode::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

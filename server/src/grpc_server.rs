//! Thin translator from wire requests to the namespace core.
//!
//! Every handler logs an entry line keyed by the request-provided logid,
//! dispatches to [`PageFs`], and answers with an in-band status code; the
//! RPC itself only fails on transport errors. The one asymmetric case is
//! DeleteSnapShot, whose reply is produced by the snapshot cleaner once
//! the background job finishes.

use common::nameserver::{
    name_server_service_server::{NameServerService, NameServerServiceServer},
    CheckSnapShotStatusRequest, CheckSnapShotStatusResponse, CreateFileRequest,
    CreateFileResponse, CreateSnapShotRequest, CreateSnapShotResponse, DeleteSegmentRequest,
    DeleteSegmentResponse, DeleteSnapShotRequest, DeleteSnapShotResponse, ExtendFileRequest,
    ExtendFileResponse, FileType as ProtoFileType, GetFileInfoRequest, GetFileInfoResponse,
    GetOrAllocateSegmentRequest, GetOrAllocateSegmentResponse, ListSnapShotRequest,
    ListSnapShotResponse, RenameFileRequest, RenameFileResponse, StatusCode,
};
use common::{FileType, FsError};
use nameserver::{PageFs, SnapshotDeleteReply};
use std::sync::Arc;
use tonic::{Request, Response, Status};

pub struct NameServerGrpcService {
    fs: Arc<PageFs>,
}

impl NameServerGrpcService {
    pub fn new(fs: Arc<PageFs>) -> Self {
        Self { fs }
    }

    pub fn into_server(self) -> NameServerServiceServer<Self> {
        NameServerServiceServer::new(self)
    }
}

fn ok_code() -> i32 {
    StatusCode::Ok as i32
}

fn err_code(e: FsError) -> i32 {
    e.status_code() as i32
}

#[tonic::async_trait]
impl NameServerService for NameServerGrpcService {
    async fn create_file(
        &self,
        request: Request<CreateFileRequest>,
    ) -> Result<Response<CreateFileResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, CreateFile request, filename = {}, filetype = {}, filelength = {}",
            req.log_id,
            req.filename,
            req.file_type,
            req.file_length
        );

        let file_type = match ProtoFileType::try_from(req.file_type) {
            Ok(t) => FileType::from(t),
            Err(_) => {
                tracing::error!(
                    "logid = {}, CreateFile fail, filename = {}, invalid filetype = {}",
                    req.log_id,
                    req.filename,
                    req.file_type
                );
                return Ok(Response::new(CreateFileResponse {
                    status_code: err_code(FsError::ParamError),
                }));
            }
        };

        match self.fs.create_file(&req.filename, file_type, req.file_length).await {
            Ok(()) => {
                tracing::info!(
                    "logid = {}, CreateFile ok, filename = {}",
                    req.log_id,
                    req.filename
                );
                Ok(Response::new(CreateFileResponse {
                    status_code: ok_code(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, CreateFile fail, filename = {}, status = {}",
                    req.log_id,
                    req.filename,
                    e
                );
                Ok(Response::new(CreateFileResponse {
                    status_code: err_code(e),
                }))
            }
        }
    }

    async fn get_file_info(
        &self,
        request: Request<GetFileInfoRequest>,
    ) -> Result<Response<GetFileInfoResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, GetFileInfo request, filename = {}",
            req.log_id,
            req.filename
        );

        match self.fs.get_file_info(&req.filename).await {
            Ok(info) => {
                tracing::info!(
                    "logid = {}, GetFileInfo ok, filename = {}",
                    req.log_id,
                    req.filename
                );
                Ok(Response::new(GetFileInfoResponse {
                    status_code: ok_code(),
                    file_info: Some(info.into()),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, GetFileInfo fail, filename = {}, status = {}",
                    req.log_id,
                    req.filename,
                    e
                );
                Ok(Response::new(GetFileInfoResponse {
                    status_code: err_code(e),
                    file_info: None,
                }))
            }
        }
    }

    async fn get_or_allocate_segment(
        &self,
        request: Request<GetOrAllocateSegmentRequest>,
    ) -> Result<Response<GetOrAllocateSegmentResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, GetOrAllocateSegment request, filename = {}, offset = {}, allocateTag = {}",
            req.log_id,
            req.filename,
            req.offset,
            req.allocate_if_not_exist
        );

        match self
            .fs
            .get_or_allocate_segment(&req.filename, req.offset, req.allocate_if_not_exist)
            .await
        {
            Ok(segment) => {
                tracing::info!(
                    "logid = {}, GetOrAllocateSegment ok, filename = {}, offset = {}",
                    req.log_id,
                    req.filename,
                    req.offset
                );
                Ok(Response::new(GetOrAllocateSegmentResponse {
                    status_code: ok_code(),
                    page_file_segment: Some(segment.into()),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, GetOrAllocateSegment fail, filename = {}, offset = {}, status = {}",
                    req.log_id,
                    req.filename,
                    req.offset,
                    e
                );
                Ok(Response::new(GetOrAllocateSegmentResponse {
                    status_code: err_code(e),
                    page_file_segment: None,
                }))
            }
        }
    }

    async fn delete_segment(
        &self,
        request: Request<DeleteSegmentRequest>,
    ) -> Result<Response<DeleteSegmentResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, DeleteSegment request, filename = {}, offset = {}",
            req.log_id,
            req.filename,
            req.offset
        );

        match self.fs.delete_segment(&req.filename, req.offset).await {
            Ok(()) => {
                tracing::info!(
                    "logid = {}, DeleteSegment ok, filename = {}, offset = {}",
                    req.log_id,
                    req.filename,
                    req.offset
                );
                Ok(Response::new(DeleteSegmentResponse {
                    status_code: ok_code(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, DeleteSegment fail, filename = {}, offset = {}, status = {}",
                    req.log_id,
                    req.filename,
                    req.offset,
                    e
                );
                Ok(Response::new(DeleteSegmentResponse {
                    status_code: err_code(e),
                }))
            }
        }
    }

    async fn rename_file(
        &self,
        request: Request<RenameFileRequest>,
    ) -> Result<Response<RenameFileResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, RenameFile request, oldfilename = {}, newfilename = {}",
            req.log_id,
            req.old_filename,
            req.new_filename
        );

        match self.fs.rename_file(&req.old_filename, &req.new_filename).await {
            Ok(()) => {
                tracing::info!(
                    "logid = {}, RenameFile ok, oldfilename = {}, newfilename = {}",
                    req.log_id,
                    req.old_filename,
                    req.new_filename
                );
                Ok(Response::new(RenameFileResponse {
                    status_code: ok_code(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, RenameFile fail, oldfilename = {}, newfilename = {}, status = {}",
                    req.log_id,
                    req.old_filename,
                    req.new_filename,
                    e
                );
                Ok(Response::new(RenameFileResponse {
                    status_code: err_code(e),
                }))
            }
        }
    }

    async fn extend_file(
        &self,
        request: Request<ExtendFileRequest>,
    ) -> Result<Response<ExtendFileResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, ExtendFile request, filename = {}, newsize = {}",
            req.log_id,
            req.filename,
            req.new_size
        );

        match self.fs.extend_file(&req.filename, req.new_size).await {
            Ok(()) => {
                tracing::info!(
                    "logid = {}, ExtendFile ok, filename = {}, newsize = {}",
                    req.log_id,
                    req.filename,
                    req.new_size
                );
                Ok(Response::new(ExtendFileResponse {
                    status_code: ok_code(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, ExtendFile fail, filename = {}, newsize = {}, status = {}",
                    req.log_id,
                    req.filename,
                    req.new_size,
                    e
                );
                Ok(Response::new(ExtendFileResponse {
                    status_code: err_code(e),
                }))
            }
        }
    }

    async fn create_snap_shot(
        &self,
        request: Request<CreateSnapShotRequest>,
    ) -> Result<Response<CreateSnapShotResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, CreateSnapShot request, filename = {}",
            req.log_id,
            req.filename
        );

        match self.fs.create_snapshot_file(&req.filename).await {
            Ok(snapshot) => {
                tracing::info!(
                    "logid = {}, CreateSnapShot ok, filename = {}, seq = {}",
                    req.log_id,
                    req.filename,
                    snapshot.seq_num
                );
                Ok(Response::new(CreateSnapShotResponse {
                    status_code: ok_code(),
                    snapshot_file_info: Some(snapshot.into()),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, CreateSnapShot fail, filename = {}, status = {}",
                    req.log_id,
                    req.filename,
                    e
                );
                Ok(Response::new(CreateSnapShotResponse {
                    status_code: err_code(e),
                    snapshot_file_info: None,
                }))
            }
        }
    }

    async fn list_snap_shot(
        &self,
        request: Request<ListSnapShotRequest>,
    ) -> Result<Response<ListSnapShotResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, ListSnapShot request, filename = {}, seqs = {:?}",
            req.log_id,
            req.filename,
            req.seq
        );

        let result = if req.seq.is_empty() {
            self.fs.list_snapshot_file(&req.filename).await
        } else {
            self.fs.list_snapshot_file_by_seq(&req.filename, &req.seq).await
        };

        match result {
            Ok(snapshots) => {
                tracing::info!(
                    "logid = {}, ListSnapShot ok, filename = {}",
                    req.log_id,
                    req.filename
                );
                Ok(Response::new(ListSnapShotResponse {
                    status_code: ok_code(),
                    file_info: snapshots.into_iter().map(Into::into).collect(),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, ListSnapShot fail, filename = {}, status = {}",
                    req.log_id,
                    req.filename,
                    e
                );
                Ok(Response::new(ListSnapShotResponse {
                    status_code: err_code(e),
                    file_info: Vec::new(),
                }))
            }
        }
    }

    async fn delete_snap_shot(
        &self,
        request: Request<DeleteSnapShotRequest>,
    ) -> Result<Response<DeleteSnapShotResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, DeleteSnapShot request, filename = {}, seq = {}",
            req.log_id,
            req.filename,
            req.seq
        );

        let (reply, rx) = SnapshotDeleteReply::channel();
        if let Err(e) = self
            .fs
            .delete_file_snapshot_file(&req.filename, req.seq, Some(reply))
            .await
        {
            tracing::error!(
                "logid = {}, DeleteSnapShot fail, filename = {}, seq = {}, status = {}",
                req.log_id,
                req.filename,
                req.seq,
                e
            );
            return Ok(Response::new(DeleteSnapShotResponse {
                status_code: err_code(e),
            }));
        }

        // The reply now belongs to the cleaner; answer with whatever it
        // reports.
        let status_code = match rx.await {
            Ok(Ok(())) => {
                tracing::info!(
                    "logid = {}, DeleteSnapShot ok, filename = {}, seq = {}",
                    req.log_id,
                    req.filename,
                    req.seq
                );
                ok_code()
            }
            Ok(Err(e)) => {
                tracing::error!(
                    "logid = {}, DeleteSnapShot clean failed, filename = {}, seq = {}, status = {}",
                    req.log_id,
                    req.filename,
                    req.seq,
                    e
                );
                err_code(e)
            }
            Err(_) => {
                tracing::error!(
                    "logid = {}, DeleteSnapShot reply dropped, filename = {}, seq = {}",
                    req.log_id,
                    req.filename,
                    req.seq
                );
                err_code(FsError::InternalError)
            }
        };
        Ok(Response::new(DeleteSnapShotResponse { status_code }))
    }

    async fn check_snap_shot_status(
        &self,
        request: Request<CheckSnapShotStatusRequest>,
    ) -> Result<Response<CheckSnapShotStatusResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, CheckSnapShotStatus not supported yet, filename = {}, seq = {}",
            req.log_id,
            req.filename,
            req.seq
        );
        Ok(Response::new(CheckSnapShotStatusResponse {
            status_code: err_code(FsError::NotSupported),
        }))
    }

    async fn get_snap_shot_file_segment(
        &self,
        request: Request<GetOrAllocateSegmentRequest>,
    ) -> Result<Response<GetOrAllocateSegmentResponse>, Status> {
        let req = request.into_inner();
        tracing::info!(
            "logid = {}, GetSnapShotFileSegment request, filename = {}, offset = {}, seqnum = {:?}",
            req.log_id,
            req.filename,
            req.offset,
            req.seq_num
        );

        let Some(seq) = req.seq_num else {
            tracing::error!(
                "logid = {}, GetSnapShotFileSegment fail, filename = {}, seqnum not set",
                req.log_id,
                req.filename
            );
            return Ok(Response::new(GetOrAllocateSegmentResponse {
                status_code: err_code(FsError::ParamError),
                page_file_segment: None,
            }));
        };

        match self
            .fs
            .get_snapshot_file_segment(&req.filename, seq, req.offset)
            .await
        {
            Ok(segment) => {
                tracing::info!(
                    "logid = {}, GetSnapShotFileSegment ok, filename = {}, offset = {}, seqnum = {}",
                    req.log_id,
                    req.filename,
                    req.offset,
                    seq
                );
                Ok(Response::new(GetOrAllocateSegmentResponse {
                    status_code: ok_code(),
                    page_file_segment: Some(segment.into()),
                }))
            }
            Err(e) => {
                tracing::error!(
                    "logid = {}, GetSnapShotFileSegment fail, filename = {}, offset = {}, seqnum = {}, status = {}",
                    req.log_id,
                    req.filename,
                    req.offset,
                    seq,
                    e
                );
                Ok(Response::new(GetOrAllocateSegmentResponse {
                    status_code: err_code(e),
                    page_file_segment: None,
                }))
            }
        }
    }
}

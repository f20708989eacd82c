use chrono::Utc;
use clap::{Parser, Subcommand};
use common::nameserver::{
    name_server_service_client::NameServerServiceClient, CheckSnapShotStatusRequest,
    CreateFileRequest, CreateSnapShotRequest, DeleteSegmentRequest, DeleteSnapShotRequest,
    ExtendFileRequest, FileInfo, FileType, GetFileInfoRequest, GetOrAllocateSegmentRequest,
    ListSnapShotRequest, RenameFileRequest, StatusCode,
};

#[derive(Parser)]
#[command(name = "pagefs")]
#[command(version, about = "pagefs nameserver CLI", long_about = None)]
struct Cli {
    /// Server address
    #[arg(short, long, default_value = "http://localhost:50051", global = true)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a page file
    Create {
        /// Absolute path (/vols/vol1)
        path: String,
        /// Logical size in bytes
        length: u64,
    },

    /// Create a directory
    Mkdir {
        path: String,
    },

    /// Show a file or directory descriptor
    Stat {
        path: String,
    },

    /// Grow a page file to a new size
    Extend {
        path: String,
        new_size: u64,
    },

    /// Move a file to a new path
    Rename {
        old_path: String,
        new_path: String,
    },

    /// Fetch a segment mapping, optionally allocating it
    GetSegment {
        path: String,
        offset: u64,
        /// Allocate the segment when it does not exist yet
        #[arg(long)]
        allocate: bool,
    },

    /// Release a segment back to the allocator
    DeleteSegment {
        path: String,
        offset: u64,
    },

    /// Take a snapshot of a page file
    Snapshot {
        path: String,
    },

    /// List snapshots of a page file
    ListSnapshots {
        path: String,
        /// Restrict to these sequence numbers
        seq: Vec<u64>,
    },

    /// Delete a snapshot by sequence number
    DeleteSnapshot {
        path: String,
        seq: u64,
    },

    /// Poll snapshot deletion progress
    SnapshotStatus {
        path: String,
        seq: u64,
    },

    /// Fetch a snapshot's segment mapping
    SnapshotSegment {
        path: String,
        seq: u64,
        offset: u64,
    },
}

fn log_id() -> u64 {
    Utc::now().timestamp_micros() as u64
}

fn status_name(code: i32) -> String {
    StatusCode::try_from(code)
        .map(|c| format!("{:?}", c))
        .unwrap_or_else(|_| format!("Unknown({})", code))
}

fn print_file_info(info: &FileInfo) {
    println!("id:           {}", info.id);
    println!("parent_id:    {}", info.parent_id);
    println!("filename:     {}", info.filename);
    println!("full_path:    {}", info.full_path);
    println!(
        "file_type:    {:?}",
        FileType::try_from(info.file_type).unwrap_or(FileType::InodeDirectory)
    );
    println!("length:       {}", info.length);
    println!("segment_size: {}", info.segment_size);
    println!("chunk_size:   {}", info.chunk_size);
    println!("seq_num:      {}", info.seq_num);
    println!("ctime:        {}", info.ctime);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut client = NameServerServiceClient::connect(cli.server.clone()).await?;

    match cli.command {
        Commands::Create { path, length } => {
            let resp = client
                .create_file(CreateFileRequest {
                    log_id: log_id(),
                    filename: path,
                    file_type: FileType::InodePagefile as i32,
                    file_length: length,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::Mkdir { path } => {
            let resp = client
                .create_file(CreateFileRequest {
                    log_id: log_id(),
                    filename: path,
                    file_type: FileType::InodeDirectory as i32,
                    file_length: 0,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::Stat { path } => {
            let resp = client
                .get_file_info(GetFileInfoRequest {
                    log_id: log_id(),
                    filename: path,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
            if let Some(info) = resp.file_info {
                print_file_info(&info);
            }
        }
        Commands::Extend { path, new_size } => {
            let resp = client
                .extend_file(ExtendFileRequest {
                    log_id: log_id(),
                    filename: path,
                    new_size,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::Rename { old_path, new_path } => {
            let resp = client
                .rename_file(RenameFileRequest {
                    log_id: log_id(),
                    old_filename: old_path,
                    new_filename: new_path,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::GetSegment {
            path,
            offset,
            allocate,
        } => {
            let resp = client
                .get_or_allocate_segment(GetOrAllocateSegmentRequest {
                    log_id: log_id(),
                    filename: path,
                    offset,
                    allocate_if_not_exist: allocate,
                    seq_num: None,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
            if let Some(segment) = resp.page_file_segment {
                println!(
                    "segment: pool = {}, offset = {}, chunks = {}",
                    segment.logical_pool_id,
                    segment.start_offset,
                    segment.chunks.len()
                );
            }
        }
        Commands::DeleteSegment { path, offset } => {
            let resp = client
                .delete_segment(DeleteSegmentRequest {
                    log_id: log_id(),
                    filename: path,
                    offset,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::Snapshot { path } => {
            let resp = client
                .create_snap_shot(CreateSnapShotRequest {
                    log_id: log_id(),
                    filename: path,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
            if let Some(info) = resp.snapshot_file_info {
                print_file_info(&info);
            }
        }
        Commands::ListSnapshots { path, seq } => {
            let resp = client
                .list_snap_shot(ListSnapShotRequest {
                    log_id: log_id(),
                    filename: path,
                    seq,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
            for info in &resp.file_info {
                println!(
                    "seq = {}, path = {}, status = {}",
                    info.seq_num, info.full_path, info.status
                );
            }
        }
        Commands::DeleteSnapshot { path, seq } => {
            let resp = client
                .delete_snap_shot(DeleteSnapShotRequest {
                    log_id: log_id(),
                    filename: path,
                    seq,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::SnapshotStatus { path, seq } => {
            let resp = client
                .check_snap_shot_status(CheckSnapShotStatusRequest {
                    log_id: log_id(),
                    filename: path,
                    seq,
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
        }
        Commands::SnapshotSegment { path, seq, offset } => {
            let resp = client
                .get_snap_shot_file_segment(GetOrAllocateSegmentRequest {
                    log_id: log_id(),
                    filename: path,
                    offset,
                    allocate_if_not_exist: false,
                    seq_num: Some(seq),
                })
                .await?
                .into_inner();
            println!("{}", status_name(resp.status_code));
            if let Some(segment) = resp.page_file_segment {
                println!(
                    "segment: pool = {}, offset = {}, chunks = {}",
                    segment.logical_pool_id,
                    segment.start_offset,
                    segment.chunks.len()
                );
            }
        }
    }

    Ok(())
}

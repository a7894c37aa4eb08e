//! File Transfer Worker: the outstation-side handle table backing
//! OPEN/READ/WRITE/CLOSE/DELETE/GET_FILE_INFO and directory listing.
//! Handles are rooted under a single sandbox directory; `..`, absolute
//! components, and prefixes in a requested path are rejected rather than
//! resolved, so a request can never escape the root.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use dnp3_dtyp::{Permissions, Timestamp};
use dnp3_file::{DnpFileType, FileCommandStatus, FileDescriptor, FileTransportStatus};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct FileWorkerConfig {
    pub enabled: bool,
    pub max_open_files: usize,
    pub overwrite_on_write: bool,
    pub permit_delete: bool,
    pub preferred_tx_block: u16,
    pub preferred_rx_block: u16,
}

impl Default for FileWorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_open_files: 8,
            overwrite_on_write: true,
            permit_delete: false,
            preferred_tx_block: 2048,
            preferred_rx_block: 2048,
        }
    }
}

enum HandleKind {
    Read(File),
    Write(File),
    /// Pre-encoded Group 70 var7 descriptor stream for a directory listing,
    /// with a read cursor into it.
    Directory(Vec<u8>, usize),
}

struct Handle {
    path: PathBuf,
    kind: HandleKind,
}

/// The outstation's file handle table.
pub struct FileTransferWorker {
    root: PathBuf,
    config: FileWorkerConfig,
    handles: HashMap<u32, Handle>,
    open_paths: HashSet<PathBuf>,
    next_handle: u32,
}

impl FileTransferWorker {
    pub fn new(root: PathBuf, config: FileWorkerConfig) -> Self {
        Self {
            root,
            config,
            handles: HashMap::new(),
            open_paths: HashSet::new(),
            next_handle: 1,
        }
    }

    pub fn config(&self) -> &FileWorkerConfig {
        &self.config
    }

    pub fn open_count(&self) -> usize {
        self.handles.len()
    }

    /// Maps a wire path (always `/`-separated) onto a sandboxed disk path,
    /// rejecting anything that could escape `root`.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(name.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }

    fn allocate_handle(&mut self, path: PathBuf, kind: HandleKind) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.open_paths.insert(path.clone());
        self.handles.insert(handle, Handle { path, kind });
        handle
    }

    /// OPEN in read mode: a plain file yields a `Read` handle; a directory
    /// yields a `Directory` handle already holding the encoded listing.
    pub async fn open_read(&mut self, name: &str) -> Result<(u32, u32), FileCommandStatus> {
        if self.handles.len() >= self.config.max_open_files {
            return Err(FileCommandStatus::OpenCountExceeded);
        }
        let path = self.resolve(name).ok_or(FileCommandStatus::NotFound)?;
        if self.open_paths.contains(&path) {
            return Err(FileCommandStatus::FileLocked);
        }
        let metadata = fs::metadata(&path).await.map_err(|_| FileCommandStatus::NotFound)?;
        if metadata.is_dir() {
            let listing = self.encode_directory(&path).await?;
            let handle = self.allocate_handle(path, HandleKind::Directory(listing, 0));
            return Ok((handle, 0));
        }
        let file = File::open(&path).await.map_err(|_| FileCommandStatus::NotFound)?;
        let size = metadata.len() as u32;
        let handle = self.allocate_handle(path, HandleKind::Read(file));
        Ok((handle, size))
    }

    /// OPEN in write mode (`overwrite_on_write` controls truncation).
    pub async fn open_write(&mut self, name: &str) -> Result<u32, FileCommandStatus> {
        if self.handles.len() >= self.config.max_open_files {
            return Err(FileCommandStatus::OpenCountExceeded);
        }
        let path = self.resolve(name).ok_or(FileCommandStatus::PermissionDenied)?;
        if self.open_paths.contains(&path) {
            return Err(FileCommandStatus::FileLocked);
        }
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(self.config.overwrite_on_write)
            .open(&path)
            .await
            .map_err(|_| FileCommandStatus::PermissionDenied)?;
        Ok(self.allocate_handle(path, HandleKind::Write(file)))
    }

    pub async fn read_block(&mut self, handle: u32, max_len: usize) -> Result<(Vec<u8>, bool), FileTransportStatus> {
        let entry = self.handles.get_mut(&handle).ok_or(FileTransportStatus::FileNotOpened)?;
        match &mut entry.kind {
            HandleKind::Read(file) => {
                let mut buf = vec![0u8; max_len];
                let n = file.read(&mut buf).await.map_err(|_| FileTransportStatus::FatalError)?;
                buf.truncate(n);
                Ok((buf, n < max_len))
            }
            HandleKind::Directory(data, offset) => {
                let start = *offset;
                let end = (start + max_len).min(data.len());
                let chunk = data[start..end].to_vec();
                *offset = end;
                Ok((chunk, end >= data.len()))
            }
            HandleKind::Write(_) => Err(FileTransportStatus::FileNotOpened),
        }
    }

    pub async fn write_block(&mut self, handle: u32, data: &[u8]) -> Result<(), FileTransportStatus> {
        let entry = self.handles.get_mut(&handle).ok_or(FileTransportStatus::FileNotOpened)?;
        match &mut entry.kind {
            HandleKind::Write(file) => file
                .write_all(data)
                .await
                .map_err(|_| FileTransportStatus::FatalError),
            _ => Err(FileTransportStatus::FileNotOpened),
        }
    }

    /// Releases the handle and any OS-level resources, even if the caller
    /// never finished reading/writing ("released even on error paths").
    pub async fn close(&mut self, handle: u32) -> FileCommandStatus {
        match self.handles.remove(&handle) {
            Some(entry) => {
                self.open_paths.remove(&entry.path);
                FileCommandStatus::Success
            }
            None => FileCommandStatus::FileNotOpen,
        }
    }

    pub async fn delete(&mut self, name: &str) -> FileCommandStatus {
        if !self.config.permit_delete {
            return FileCommandStatus::PermissionDenied;
        }
        let Some(path) = self.resolve(name) else {
            return FileCommandStatus::NotFound;
        };
        if self.open_paths.contains(&path) {
            return FileCommandStatus::FileLocked;
        }
        match fs::remove_file(&path).await {
            Ok(()) => FileCommandStatus::Success,
            Err(_) => FileCommandStatus::NotFound,
        }
    }

    pub async fn file_info(&self, name: &str) -> Result<FileDescriptor, FileCommandStatus> {
        let path = self.resolve(name).ok_or(FileCommandStatus::NotFound)?;
        let metadata = fs::metadata(&path).await.map_err(|_| FileCommandStatus::NotFound)?;
        Ok(describe(&path, &metadata))
    }

    async fn encode_directory(&self, dir: &Path) -> Result<Vec<u8>, FileCommandStatus> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(|_| FileCommandStatus::NotFound)?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue; // OS-hidden names and `.`/`..`
            }
            if let Ok(metadata) = entry.metadata().await {
                out.extend(describe(&entry.path(), &metadata).encode());
            }
        }
        Ok(out)
    }
}

#[cfg(unix)]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn mode_of(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn describe(path: &Path, metadata: &std::fs::Metadata) -> FileDescriptor {
    FileDescriptor {
        file_type: if metadata.is_dir() {
            DnpFileType::Directory
        } else {
            DnpFileType::SimpleFile
        },
        size: metadata.len() as u32,
        ctime: Timestamp::now(),
        permissions: Permissions::from_unix_mode(mode_of(metadata)),
        request_id: 0,
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn sandbox() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dnp3-file-worker-test-{:?}", std::thread::current().id()));
        let _ = fs::remove_dir_all(&dir).await;
        fs::create_dir_all(&dir).await.unwrap();
        dir
    }

    #[tokio::test]
    async fn second_open_of_same_path_is_file_locked() {
        let root = sandbox().await;
        fs::write(root.join("a.bin"), b"hello").await.unwrap();
        let mut worker = FileTransferWorker::new(root, FileWorkerConfig::default());

        let (handle, size) = worker.open_read("/a.bin").await.unwrap();
        assert_eq!(size, 5);
        let err = worker.open_read("/a.bin").await.unwrap_err();
        assert_eq!(err, FileCommandStatus::FileLocked);

        assert_eq!(worker.close(handle).await, FileCommandStatus::Success);
        assert!(worker.open_read("/a.bin").await.is_ok());
    }

    #[tokio::test]
    async fn open_count_exceeded_when_at_capacity() {
        let root = sandbox().await;
        fs::write(root.join("a.bin"), b"a").await.unwrap();
        fs::write(root.join("b.bin"), b"b").await.unwrap();
        let mut config = FileWorkerConfig::default();
        config.max_open_files = 1;
        let mut worker = FileTransferWorker::new(root, config);

        worker.open_read("/a.bin").await.unwrap();
        let err = worker.open_read("/b.bin").await.unwrap_err();
        assert_eq!(err, FileCommandStatus::OpenCountExceeded);
    }

    #[tokio::test]
    async fn delete_refuses_without_permission() {
        let root = sandbox().await;
        fs::write(root.join("a.bin"), b"a").await.unwrap();
        let mut worker = FileTransferWorker::new(root, FileWorkerConfig::default());
        assert_eq!(worker.delete("/a.bin").await, FileCommandStatus::PermissionDenied);
    }

    #[tokio::test]
    async fn delete_refuses_while_locked() {
        let root = sandbox().await;
        fs::write(root.join("a.bin"), b"a").await.unwrap();
        let mut config = FileWorkerConfig::default();
        config.permit_delete = true;
        let mut worker = FileTransferWorker::new(root, config);
        worker.open_read("/a.bin").await.unwrap();
        assert_eq!(worker.delete("/a.bin").await, FileCommandStatus::FileLocked);
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let root = sandbox().await;
        let mut worker = FileTransferWorker::new(root, FileWorkerConfig::default());
        let err = worker.open_read("/../etc/passwd").await.unwrap_err();
        assert_eq!(err, FileCommandStatus::NotFound);
    }

    #[tokio::test]
    async fn directory_listing_skips_hidden_entries() {
        let root = sandbox().await;
        fs::write(root.join("visible.txt"), b"x").await.unwrap();
        fs::write(root.join(".hidden"), b"y").await.unwrap();
        let mut worker = FileTransferWorker::new(root, FileWorkerConfig::default());

        let (handle, _) = worker.open_read("/").await.unwrap();
        let (data, last) = worker.read_block(handle, 4096).await.unwrap();
        assert!(last);
        let descriptors = FileDescriptor::decode_all(&data).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "visible.txt");
    }
}

pub mod archive;
pub mod cache;
pub mod config;
pub mod delegate;
pub mod error;
pub mod vfs;

pub use archive::archive_locator;
pub use archive::copy_from_archive;
pub use archive::create_archive;
pub use archive::create_archive_with;
pub use archive::create_reproducible;
pub use archive::new_zip;
pub use archive::new_zip_configured;
pub use archive::new_zip_with;
pub use archive::open_archive;
pub use archive::open_archive_with;
pub use archive::open_locator;
pub use archive::unzip;
pub use archive::zip_reproducibly;
pub use archive::zip_tree;
pub use archive::ArchiveFileSystem;
pub use archive::ArchiveProvider;
pub use archive::ReproducibleFileSystem;

pub use cache::{CacheableFileSystem, FileSystemCache};

pub use config::ArchiveOptions;
pub use config::CompressionMethod;

pub use delegate::ignore_file_writability;
pub use delegate::{OverrideFileSystem, OverridePath, OverrideProvider};

pub use error::{ArchiveError, Result};

pub use vfs::{
    local_path, unwrap_file_system, unwrap_path, AccessMode, Env, FileSystem,
    FileSystemProvider, FileSystemRef, Locator, PathRef, ProviderRef, VirtualPath, WalkOrder,
};

//! Zip archives mounted as file systems (scheme `jar`).
//!
//! A mount reads the whole archive through the backing path's own provider
//! into an in-memory tree that keeps member insertion order. Closing a mount
//! that was modified, or that created its archive, encodes the tree again and
//! writes it back through the same provider. Members are written in
//! insertion order, so an archive filled in a fixed order encodes the same
//! way every time.

use std::any::Any;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Datelike, NaiveDate, Timelike, Utc};
use fxhash::{FxHashMap, FxHashSet};
use parking_lot::Mutex;
use zip::write::FullFileOptions;
use zip::{ExtraField, ZipArchive, ZipWriter};

use crate::config::{ArchiveOptions, CompressionMethod};
use crate::error::{ArchiveError, Result, ResultExt};
use crate::vfs::{
    files, local_path, AccessMode, Attributes, EntryTimes, Env, FileKind, FileSystem,
    FileSystemProvider, FileSystemRef, Locator, PathRef, ProviderRef, VirtualPath, WalkOrder,
    WriteMode,
};

pub const JAR_SCHEME: &str = "jar";

const DIRECTORY_PERMISSIONS: u32 = 0o755;
const FILE_PERMISSIONS: u32 = 0o644;

/// Info-ZIP extended timestamp extra field.
const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;
/// Modification, access and creation times present.
const EXTENDED_TIMESTAMP_FLAGS: u8 = 0b111;

static INSTALLED: LazyLock<Arc<ArchiveProvider>> =
    LazyLock::new(|| Arc::new(ArchiveProvider::new()));

/// Opens zip archives as file systems.
///
/// Clones share the registry of locator-opened mounts, so at most one such
/// mount per backing file is live across all of them.
#[derive(Debug, Clone, Default)]
pub struct ArchiveProvider {
    mounts: Arc<Mutex<FxHashSet<PathBuf>>>,
}

impl ArchiveProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide archive provider.
    pub fn installed() -> Arc<ArchiveProvider> {
        Arc::clone(&INSTALLED)
    }

    pub fn is_mounted(&self, backing_file: &Path) -> bool {
        self.mounts.lock().contains(backing_file)
    }

    fn mount(
        &self,
        backing: &PathRef,
        env: &Env,
        registered: Option<PathBuf>,
    ) -> Result<Arc<ArchiveFileSystem>> {
        let options = ArchiveOptions::from_env(env)?;
        let backing_provider = files::provider_of(backing);

        let (members, read_only, dirty) = match backing_provider.check_access(backing, &[]) {
            Ok(()) => {
                backing_provider
                    .check_access(backing, &[AccessMode::Read])
                    .with_context(|| format!("Archive {} is not readable", backing))?;
                let read_only = match backing_provider.check_access(backing, &[AccessMode::Write]) {
                    Ok(()) => false,
                    Err(e) if e.is_permission_denied() => true,
                    Err(e) => return Err(e),
                };
                let data = files::read(backing)?;
                let members = Members::decode(&data)
                    .with_context(|| format!("Could not read archive {}", backing))?;
                (members, read_only, false)
            }
            Err(e) if e.is_not_found() && options.get_create() => (Members::new(), false, true),
            Err(e) => return Err(e),
        };

        tracing::debug!(
            "Mounted archive {} ({} members, read_only={})",
            backing,
            members.order.len(),
            read_only
        );

        Ok(Arc::new(ArchiveFileSystem {
            provider: Arc::new(self.clone()),
            backing: Arc::clone(backing),
            registered,
            read_only,
            options,
            open: AtomicBool::new(true),
            members: Mutex::new(Members { dirty, ..members }),
        }))
    }

    fn unregister(&self, backing_file: &Path) {
        self.mounts.lock().remove(backing_file);
    }
}

impl FileSystemProvider for ArchiveProvider {
    fn scheme(&self) -> &str {
        JAR_SCHEME
    }

    fn new_file_system(&self, path: &PathRef, env: &Env) -> Result<FileSystemRef> {
        Ok(self.mount(path, env, None)?)
    }

    fn new_file_system_at(&self, locator: &Locator, env: &Env) -> Result<FileSystemRef> {
        if locator.scheme() != JAR_SCHEME {
            return Err(ArchiveError::InvalidLocator(locator.to_string()));
        }
        let backing_file = locator.archive_file_path()?;
        if !self.mounts.lock().insert(backing_file.clone()) {
            return Err(ArchiveError::AlreadyMounted(locator.to_string()));
        }
        match self.mount(&local_path(&backing_file), env, Some(backing_file.clone())) {
            Ok(fs) => Ok(fs as FileSystemRef),
            Err(e) => {
                self.unregister(&backing_file);
                Err(e)
            }
        }
    }

    fn check_access(&self, path: &PathRef, modes: &[AccessMode]) -> Result<()> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_open()?;
        let members = fs.members.lock();
        let member = members.get(&key, path)?;
        let denied = modes.iter().any(|mode| match mode {
            AccessMode::Read => false,
            AccessMode::Write => fs.read_only,
            AccessMode::Execute => !member.is_dir(),
        });
        if denied {
            return Err(ArchiveError::PermissionDenied {
                path: path.to_string(),
                modes: modes.to_vec(),
            });
        }
        Ok(())
    }

    fn read_attributes(&self, path: &PathRef) -> Result<Attributes> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_open()?;
        let members = fs.members.lock();
        Ok(members.get(&key, path)?.attributes())
    }

    fn set_times(&self, path: &PathRef, times: EntryTimes) -> Result<()> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_writable()?;
        let mut members = fs.members.lock();
        let member = members.get_mut(&key, path)?;
        if let Some(created) = times.created {
            member.created = created;
        }
        if let Some(modified) = times.modified {
            member.modified = modified;
        }
        if let Some(accessed) = times.accessed {
            member.accessed = accessed;
        }
        members.dirty = true;
        Ok(())
    }

    fn create_directory(&self, dir: &PathRef) -> Result<()> {
        let (fs, key) = archive_path(dir)?;
        fs.ensure_writable()?;
        let mut members = fs.members.lock();
        if members.entries.contains_key(&key) {
            return Err(ArchiveError::AlreadyExists(dir.to_string()));
        }
        members.check_parent(&key, dir)?;
        members.insert(key, Member::directory(SystemTime::now()));
        Ok(())
    }

    fn read(&self, path: &PathRef) -> Result<Vec<u8>> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_open()?;
        let members = fs.members.lock();
        match &members.get(&key, path)?.content {
            Content::File(data) => Ok(data.clone()),
            Content::Directory => Err(ArchiveError::IsADirectory(path.to_string())),
        }
    }

    fn write(&self, path: &PathRef, data: &[u8], mode: WriteMode) -> Result<()> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_writable()?;
        let mut members = fs.members.lock();
        let now = SystemTime::now();
        if let Some(existing) = members.entries.get_mut(&key) {
            if existing.is_dir() {
                return Err(ArchiveError::IsADirectory(path.to_string()));
            }
            if mode == WriteMode::CreateNew {
                return Err(ArchiveError::AlreadyExists(path.to_string()));
            }
            existing.content = Content::File(data.to_vec());
            existing.modified = now;
            existing.accessed = now;
            members.dirty = true;
            return Ok(());
        }
        members.check_parent(&key, path)?;
        members.insert(key, Member::file(data.to_vec(), now));
        Ok(())
    }

    fn delete(&self, path: &PathRef) -> Result<()> {
        let (fs, key) = archive_path(path)?;
        fs.ensure_writable()?;
        if key.is_empty() {
            return Err(ArchiveError::Unsupported {
                op: "delete_root",
                scheme: JAR_SCHEME.to_string(),
            });
        }
        let mut members = fs.members.lock();
        members.get(&key, path)?;
        let prefix = format!("{key}/");
        if members.order.iter().any(|other| other.starts_with(&prefix)) {
            return Err(ArchiveError::DirectoryNotEmpty(path.to_string()));
        }
        members.entries.remove(&key);
        members.order.retain(|other| *other != key);
        members.dirty = true;
        Ok(())
    }

    fn read_dir(&self, dir: &PathRef) -> Result<Vec<PathRef>> {
        let (fs, key) = archive_path(dir)?;
        fs.ensure_open()?;
        let children: Vec<String> = {
            let members = fs.members.lock();
            if !members.get(&key, dir)?.is_dir() {
                return Err(ArchiveError::NotADirectory(dir.to_string()));
            }
            members
                .order
                .iter()
                .filter(|other| parent_key(other) == key)
                .cloned()
                .collect()
        };
        Ok(children
            .iter()
            .map(|child| fs.member_path(child))
            .collect())
    }

    fn walk(&self, root: &PathRef, order: WalkOrder) -> Result<Vec<PathRef>> {
        let (fs, key) = archive_path(root)?;
        fs.ensure_open()?;
        let keys = {
            let members = fs.members.lock();
            members.get(&key, root)?;
            members.walk(&key, order)
        };
        Ok(keys.iter().map(|member| fs.member_path(member)).collect())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A mounted zip archive.
pub struct ArchiveFileSystem {
    provider: Arc<ArchiveProvider>,
    backing: PathRef,
    registered: Option<PathBuf>,
    read_only: bool,
    options: ArchiveOptions,
    open: AtomicBool,
    members: Mutex<Members>,
}

impl ArchiveFileSystem {
    /// The archive file this mount reads from and writes back to.
    pub fn backing_path(&self) -> &PathRef {
        &self.backing
    }

    /// The options the mount was opened with.
    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ArchiveError::Closed(self.backing.to_string()))
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(ArchiveError::ReadOnly(self.backing.to_string()));
        }
        Ok(())
    }

    fn member_path(self: &Arc<Self>, key: &str) -> PathRef {
        Arc::new(ArchivePath {
            fs: Arc::clone(self),
            path: PathBuf::from(format!("/{key}")),
        })
    }

    fn write_back(&self) -> Result<()> {
        let mut members = self.members.lock();
        if !members.dirty || self.read_only {
            return Ok(());
        }
        let method = self.options.get_compression_method();
        let data = members
            .encode(method)
            .with_context(|| format!("Could not encode archive {}", self.backing))?;
        files::write(&self.backing, data)
            .with_context(|| format!("Could not write archive {}", self.backing))?;
        members.dirty = false;
        tracing::debug!(
            "Wrote archive {} ({} members, {})",
            self.backing,
            members.order.len(),
            method
        );
        Ok(())
    }
}

impl fmt::Debug for ArchiveFileSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveFileSystem")
            .field("backing", &self.backing)
            .field("read_only", &self.read_only)
            .field("open", &self.open.load(Ordering::Relaxed))
            .finish()
    }
}

impl FileSystem for ArchiveFileSystem {
    fn provider(&self) -> ProviderRef {
        self.provider.clone()
    }

    fn close(&self) -> Result<()> {
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.write_back();
        if let Some(backing_file) = &self.registered {
            self.provider.unregister(backing_file);
        }
        tracing::debug!("Closed archive {}", self.backing);
        result
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn root_directories(self: Arc<Self>) -> Vec<PathRef> {
        vec![self.member_path("")]
    }

    fn path(self: Arc<Self>, path: &str) -> PathRef {
        let path = if path.starts_with('/') {
            PathBuf::from(path)
        } else {
            Path::new("/").join(path)
        };
        Arc::new(ArchivePath { fs: self, path })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for ArchiveFileSystem {
    fn drop(&mut self) {
        if self.open.load(Ordering::Acquire) {
            tracing::debug!("Archive {} dropped without close", self.backing);
            if let Some(backing_file) = &self.registered {
                self.provider.unregister(backing_file);
            }
        }
    }
}

/// A member of a mounted archive. Paths are absolute, rooted at `/`.
pub struct ArchivePath {
    fs: Arc<ArchiveFileSystem>,
    path: PathBuf,
}

impl ArchivePath {
    fn sibling(&self, path: PathBuf) -> PathRef {
        Arc::new(ArchivePath {
            fs: Arc::clone(&self.fs),
            path,
        })
    }
}

impl fmt::Debug for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ArchivePath").field(&self.path).finish()
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl VirtualPath for ArchivePath {
    fn file_system(&self) -> FileSystemRef {
        self.fs.clone()
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(&self, other: &str) -> PathRef {
        self.sibling(self.path.join(other))
    }

    fn parent(&self) -> Option<PathRef> {
        self.path
            .parent()
            .map(|parent| self.sibling(parent.to_path_buf()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn archive_path(path: &PathRef) -> Result<(&Arc<ArchiveFileSystem>, String)> {
    path.as_any()
        .downcast_ref::<ArchivePath>()
        .map(|archive| (&archive.fs, member_key(&archive.path)))
        .ok_or_else(|| ArchiveError::ProviderMismatch {
            expected: JAR_SCHEME,
            path: path.to_string(),
        })
}

/// Normalized member name: no leading or trailing `/`, `.` and `..` folded.
/// The root is the empty key.
fn member_key(path: &Path) -> String {
    let text = path.to_string_lossy();
    let mut parts: Vec<&str> = Vec::new();
    for part in text.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

fn parent_key(key: &str) -> &str {
    key.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

#[derive(Debug, Clone)]
enum Content {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Member {
    content: Content,
    created: SystemTime,
    modified: SystemTime,
    accessed: SystemTime,
}

impl Member {
    fn directory(time: SystemTime) -> Self {
        Member {
            content: Content::Directory,
            created: time,
            modified: time,
            accessed: time,
        }
    }

    fn file(data: Vec<u8>, time: SystemTime) -> Self {
        Member {
            content: Content::File(data),
            created: time,
            modified: time,
            accessed: time,
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self.content, Content::Directory)
    }

    fn attributes(&self) -> Attributes {
        let (kind, size) = match &self.content {
            Content::Directory => (FileKind::Directory, 0),
            Content::File(data) => (FileKind::File, data.len() as u64),
        };
        Attributes {
            kind,
            size,
            created: self.created,
            modified: self.modified,
            accessed: self.accessed,
        }
    }
}

/// The in-memory member tree. `order` lists every key except the root in
/// insertion order; every parent precedes its children.
#[derive(Debug)]
struct Members {
    order: Vec<String>,
    entries: FxHashMap<String, Member>,
    dirty: bool,
}

impl Members {
    fn new() -> Self {
        let mut entries = FxHashMap::default();
        entries.insert(String::new(), Member::directory(SystemTime::now()));
        Members {
            order: Vec::new(),
            entries,
            dirty: false,
        }
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut members = Members::new();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let key = member_key(Path::new(file.name()));
            if key.is_empty() {
                continue;
            }
            let stamp = file.extra_data_fields().find_map(|field| match field {
                ExtraField::ExtendedTimestamp(stamp) => Some(stamp.clone()),
                _ => None,
            });
            let modified = stamp
                .as_ref()
                .and_then(|s| s.mod_time())
                .map(from_unix_seconds)
                .or_else(|| file.last_modified().and_then(from_dos_time))
                .unwrap_or(UNIX_EPOCH);
            let mut member = if file.is_dir() {
                Member::directory(modified)
            } else {
                let mut data = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut data)?;
                Member::file(data, modified)
            };
            if let Some(stamp) = &stamp {
                if let Some(accessed) = stamp.ac_time() {
                    member.accessed = from_unix_seconds(accessed);
                }
                if let Some(created) = stamp.cr_time() {
                    member.created = from_unix_seconds(created);
                }
            }
            members.ensure_parents(&key, modified);
            members.insert(key, member);
        }
        members.dirty = false;
        Ok(members)
    }

    fn encode(&self, method: CompressionMethod) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for key in &self.order {
            let Some(member) = self.entries.get(key) else {
                continue;
            };
            let mut options = FullFileOptions::default()
                .compression_method(method.into())
                .last_modified_time(to_dos_time(member.modified));
            if let Some(stamp) = extended_timestamp(member) {
                options.add_extra_data(EXTENDED_TIMESTAMP_ID, stamp, false)?;
            }
            match &member.content {
                Content::Directory => {
                    writer.add_directory(
                        format!("{key}/"),
                        options.unix_permissions(DIRECTORY_PERMISSIONS),
                    )?;
                }
                Content::File(data) => {
                    writer.start_file(key.as_str(), options.unix_permissions(FILE_PERMISSIONS))?;
                    writer.write_all(data)?;
                }
            }
        }
        Ok(writer.finish()?.into_inner())
    }

    fn get(&self, key: &str, path: &PathRef) -> Result<&Member> {
        self.entries
            .get(key)
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    fn get_mut(&mut self, key: &str, path: &PathRef) -> Result<&mut Member> {
        self.entries
            .get_mut(key)
            .ok_or_else(|| ArchiveError::NotFound(path.to_string()))
    }

    fn check_parent(&self, key: &str, path: &PathRef) -> Result<()> {
        match self.entries.get(parent_key(key)) {
            Some(parent) if parent.is_dir() => Ok(()),
            Some(_) => Err(ArchiveError::NotADirectory(path.to_string())),
            None => Err(ArchiveError::NotFound(path.to_string())),
        }
    }

    /// Add or replace a member. A replaced member keeps its position.
    fn insert(&mut self, key: String, member: Member) {
        if self.entries.insert(key.clone(), member).is_none() {
            self.order.push(key);
        }
        self.dirty = true;
    }

    /// Zip files need not list the directories their members live in.
    fn ensure_parents(&mut self, key: &str, time: SystemTime) {
        let parent = parent_key(key);
        if parent.is_empty() || self.entries.contains_key(parent) {
            return;
        }
        let parent = parent.to_string();
        self.ensure_parents(&parent, time);
        self.insert(parent, Member::directory(time));
    }

    fn walk(&self, root: &str, order: WalkOrder) -> Vec<String> {
        let mut children: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for key in &self.order {
            children.entry(parent_key(key)).or_default().push(key);
        }
        if order == WalkOrder::Sorted {
            // Siblings share their parent prefix, so key order is name order.
            for siblings in children.values_mut() {
                siblings.sort_unstable();
            }
        }

        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            out.push(key.to_string());
            if let Some(siblings) = children.get(key) {
                stack.extend(siblings.iter().rev());
            }
        }
        out
    }
}

/// DOS timestamps have two-second resolution and cover 1980 to 2107.
fn to_dos_time(time: SystemTime) -> zip::DateTime {
    let utc: chrono::DateTime<Utc> = time.into();
    zip::DateTime::from_date_and_time(
        utc.year().clamp(1980, 2107) as u16,
        utc.month() as u8,
        utc.day() as u8,
        utc.hour() as u8,
        utc.minute() as u8,
        (utc.second() as u8) & !1,
    )
    .unwrap_or_default()
}

fn from_dos_time(time: zip::DateTime) -> Option<SystemTime> {
    let date = NaiveDate::from_ymd_opt(time.year() as i32, time.month() as u32, time.day() as u32)?;
    let naive = date.and_hms_opt(time.hour() as u32, time.minute() as u32, time.second() as u32)?;
    Some(naive.and_utc().into())
}

/// Whole seconds since the epoch, if the instant fits a signed 32-bit field.
fn unix_seconds(time: SystemTime) -> Option<u32> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    u32::try_from(secs).ok().filter(|&secs| secs <= i32::MAX as u32)
}

fn from_unix_seconds(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(secs))
}

/// The extended timestamp payload for `member`: flags, then modification,
/// access and creation times. `None` when any time is out of range, leaving
/// the DOS time as the only record.
fn extended_timestamp(member: &Member) -> Option<Box<[u8]>> {
    let mut data = vec![EXTENDED_TIMESTAMP_FLAGS];
    for time in [member.modified, member.accessed, member.created] {
        data.extend_from_slice(&unix_seconds(time)?.to_le_bytes());
    }
    Some(data.into_boxed_slice())
}

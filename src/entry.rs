use std::{fmt::Debug, fs::Metadata, sync::Arc};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    content::{ContentSource, IgnoreCancellation},
    structs::{self, CompressionMethod},
};

// Unix file type and special bits. Not part of the zip specification, but agreed on by tools.
const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;
const S_IFREG: u32 = 0o100000;
#[cfg_attr(unix, allow(dead_code))]
const S_IFLNK: u32 = 0o120000;

const MSDOS_DIR: u32 = 0x10;
const MSDOS_READ_ONLY: u32 = 0x01;

/// One file or directory of the archive.
///
/// The entry only carries metadata and an optional handle to its (already compressed) content.
/// CRC32 and both sizes must be known in advance, the archive never reads the content to
/// compute them.
/// Names ending with a slash are directories; they must not have content.
#[derive(Clone)]
pub struct Entry {
    pub(crate) name: Vec<u8>,
    pub(crate) comment: Vec<u8>,
    pub(crate) non_utf8: bool,
    pub(crate) creator_version: u16,
    pub(crate) reader_version: u16,
    pub(crate) flags: u16,
    pub(crate) method: CompressionMethod,
    pub(crate) modified: DateTime<FixedOffset>,
    pub(crate) crc32: u32,
    pub(crate) compressed_size: u64,
    pub(crate) uncompressed_size: u64,
    pub(crate) extra: Vec<u8>,
    pub(crate) external_attributes: u32,
    pub(crate) content: Option<Arc<dyn ContentSource>>,
}

impl Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("name", &self.display_name())
            .field("method", &self.method)
            .field("modified", &self.modified)
            .field("crc32", &self.crc32)
            .field("compressed_size", &self.compressed_size)
            .field("uncompressed_size", &self.uncompressed_size)
            .field("flags", &self.flags)
            .field("has_content", &self.content.is_some())
            .finish_non_exhaustive()
    }
}

impl Entry {
    /// Creates an empty entry with the given name.
    ///
    /// The entry uses Store method, has zero sizes, no content and modification time
    /// at the MS-DOS epoch (1980-01-01T00:00:00Z).
    pub fn new(name: impl Into<Vec<u8>>) -> Entry {
        Entry {
            name: name.into(),
            comment: Vec::new(),
            non_utf8: false,
            creator_version: 0,
            reader_version: 0,
            flags: 0,
            method: CompressionMethod::STORE,
            modified: dos_epoch(),
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            extra: Vec::new(),
            external_attributes: 0,
            content: None,
        }
    }

    /// Creates a stored (uncompressed) entry from in-memory data.
    /// CRC32 and sizes are computed from the data.
    pub fn stored(name: impl Into<Vec<u8>>, data: impl Into<Bytes>) -> Entry {
        let data = data.into();
        let size = data.len() as u64;
        let mut entry = Entry::new(name);
        entry
            .crc32(crc32fast::hash(&data))
            .sizes(size, size)
            .content(IgnoreCancellation::new(data));
        entry
    }

    /// Sets the entry comment. Must fit into 16bit length.
    pub fn comment(&mut self, comment: impl Into<Vec<u8>>) -> &mut Self {
        self.comment = comment.into();
        self
    }

    /// Marks the name and comment as not UTF-8 encoded.
    /// The UTF-8 flag will never be set for this entry.
    pub fn non_utf8(&mut self, non_utf8: bool) -> &mut Self {
        self.non_utf8 = non_utf8;
        self
    }

    /// Sets the general purpose flags. Encoding and data descriptor bits are managed by the archive.
    pub fn flags(&mut self, flags: u16) -> &mut Self {
        self.flags = flags;
        self
    }

    /// Sets the compression method the content is compressed with.
    pub fn method(&mut self, method: CompressionMethod) -> &mut Self {
        self.method = method;
        self
    }

    /// Sets the last modification time.
    ///
    /// The offset of the datetime is used for the MS-DOS fields, the extended timestamp is
    /// always UTC.
    pub fn modified(&mut self, modified: DateTime<FixedOffset>) -> &mut Self {
        self.modified = modified;
        self
    }

    /// Sets the CRC32 of the uncompressed data.
    pub fn crc32(&mut self, crc32: u32) -> &mut Self {
        self.crc32 = crc32;
        self
    }

    /// Sets the compressed (= content) and uncompressed sizes.
    pub fn sizes(&mut self, compressed_size: u64, uncompressed_size: u64) -> &mut Self {
        self.compressed_size = compressed_size;
        self.uncompressed_size = uncompressed_size;
        self
    }

    /// Sets the extra fields blob. The archive appends its own fields to it.
    pub fn extra(&mut self, extra: impl Into<Vec<u8>>) -> &mut Self {
        self.extra = extra.into();
        self
    }

    /// Sets the raw "version made by" field. Only the high byte (platform) is kept.
    pub fn creator_version(&mut self, creator_version: u16) -> &mut Self {
        self.creator_version = creator_version;
        self
    }

    /// Sets the raw external attributes, whose meaning depends on the creator platform.
    pub fn external_attributes(&mut self, external_attributes: u32) -> &mut Self {
        self.external_attributes = external_attributes;
        self
    }

    /// Sets the compressed content of the entry.
    /// The content must provide exactly `compressed_size` bytes.
    pub fn content(&mut self, content: impl ContentSource + 'static) -> &mut Self {
        self.content = Some(Arc::new(content));
        self
    }

    /// Removes the content of the entry.
    pub fn no_content(&mut self) -> &mut Self {
        self.content = None;
        self
    }

    /// Sets unix mode (file type and permissions).
    /// Also switches the creator platform to unix and sets the MS-DOS directory and
    /// read only attributes as appropriate.
    pub fn unix_mode(&mut self, mode: u32) -> &mut Self {
        self.creator_version = self.creator_version & 0xff | (structs::CREATOR_UNIX as u16) << 8;
        self.external_attributes = mode << 16;
        if mode & S_IFMT == S_IFDIR {
            self.external_attributes |= MSDOS_DIR;
        }
        if mode & 0o200 == 0 {
            self.external_attributes |= MSDOS_READ_ONLY;
        }
        self
    }

    /// Sets the modification time, mode and sizes from file metadata.
    ///
    /// Sizes are set for storing the file uncompressed (zero for directories),
    /// modification time is converted to UTC.
    /// Content has to be set separately.
    pub fn metadata(&mut self, metadata: &Metadata) -> &mut Self {
        let size = if metadata.is_dir() { 0 } else { metadata.len() };
        self.sizes(size, size).unix_mode(metadata_mode(metadata));
        if let Ok(modified) = metadata.modified() {
            // We're skiping the modification time on platforms where the file metadata don't contain it
            self.modified(DateTime::<Utc>::from(modified).fixed_offset());
        }
        self
    }

    pub fn get_name(&self) -> &[u8] {
        &self.name
    }

    pub fn get_comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn get_method(&self) -> CompressionMethod {
        self.method
    }

    pub fn get_modified(&self) -> DateTime<FixedOffset> {
        self.modified
    }

    pub fn get_crc32(&self) -> u32 {
        self.crc32
    }

    pub fn get_compressed_size(&self) -> u64 {
        self.compressed_size
    }

    pub fn get_uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    pub fn get_extra(&self) -> &[u8] {
        &self.extra
    }

    pub fn get_flags(&self) -> u16 {
        self.flags
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Returns unix mode of the entry, decoded according to the creator platform.
    pub fn mode(&self) -> u32 {
        let mut mode = match (self.creator_version >> 8) as u8 {
            structs::CREATOR_UNIX | structs::CREATOR_MACOSX => self.external_attributes >> 16,
            structs::CREATOR_NTFS | structs::CREATOR_VFAT | structs::CREATOR_FAT => {
                msdos_to_unix_mode(self.external_attributes)
            }
            _ => 0,
        };
        if self.is_dir() {
            mode = mode & !S_IFMT | S_IFDIR;
        }
        mode
    }

    /// Directory entries are marked by a trailing slash.
    pub fn is_dir(&self) -> bool {
        self.name.last() == Some(&b'/')
    }

    /// Either of the sizes needs the zip64 extensions.
    pub fn is_zip64(&self) -> bool {
        self.compressed_size >= structs::UINT32_MAX || self.uncompressed_size >= structs::UINT32_MAX
    }

    /// Name for error messages.
    pub(crate) fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

fn dos_epoch() -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_timestamp(315532800, 0)
        .unwrap_or_default()
        .fixed_offset()
}

fn msdos_to_unix_mode(attributes: u32) -> u32 {
    let mut mode = if attributes & MSDOS_DIR != 0 {
        S_IFDIR | 0o777
    } else {
        S_IFREG | 0o666
    };
    if attributes & MSDOS_READ_ONLY != 0 {
        mode &= !0o222;
    }
    mode
}

#[cfg(unix)]
fn metadata_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt as _;
    metadata.mode()
}

#[cfg(not(unix))]
fn metadata_mode(metadata: &Metadata) -> u32 {
    let (file_type, permissions) = if metadata.is_dir() {
        (S_IFDIR, 0o755)
    } else if metadata.is_symlink() {
        (S_IFLNK, 0o777)
    } else {
        (S_IFREG, 0o644)
    };
    if metadata.permissions().readonly() {
        file_type | permissions & !0o222
    } else {
        file_type | permissions
    }
}

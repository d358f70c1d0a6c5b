use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use md5::{Digest, Md5};

use crate::{
    archive::Archive,
    central::{central_directory, DirectoryRecord},
    content::{ContentSource, IgnoreCancellation},
    entry::Entry,
    error::ContentMismatchReason,
    local::{data_descriptor, local_header},
    normalize::normalize,
    segments::Segments,
    structs::UINT16_MAX,
    Error,
};

/// Contents and options of a zip archive.
///
/// Entries are written in the order they were added.
/// Duplicate names are not checked.
#[derive(Clone, Default)]
pub struct Template {
    prefix: Option<(Arc<dyn ContentSource>, u64)>,
    entries: Vec<Entry>,
    comment: Vec<u8>,
    create_time: Option<DateTime<FixedOffset>>,
}

impl Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("prefix_size", &self.prefix.as_ref().map(|(_, size)| *size))
            .field("entries", &self.entries)
            .field("comment", &String::from_utf8_lossy(&self.comment))
            .field("create_time", &self.create_time)
            .finish()
    }
}

impl Template {
    /// Creates a new empty template.
    pub fn new() -> Self {
        Template::default()
    }

    /// Sets the content placed at the beginning of the file, before any zip entries.
    ///
    /// Can be used to create self-extracting archives, for example.
    /// The source must provide exactly `size` bytes.
    pub fn prefix(&mut self, source: impl ContentSource + 'static, size: u64) -> &mut Self {
        self.prefix = Some((Arc::new(source), size));
        self
    }

    /// Sets an in-memory prefix.
    pub fn prefix_bytes(&mut self, prefix: impl Into<Bytes>) -> &mut Self {
        let prefix = prefix.into();
        let size = prefix.len() as u64;
        self.prefix(IgnoreCancellation::new(prefix), size)
    }

    /// Adds an entry to the archive.
    /// The returned reference can be used to modify the entry further.
    pub fn add_entry(&mut self, entry: Entry) -> &mut Entry {
        let index = self.entries.len();
        self.entries.push(entry);
        &mut self.entries[index]
    }

    /// Sets the archive comment. It may be up to 64K long.
    pub fn comment(&mut self, comment: impl Into<Vec<u8>>) -> &mut Self {
        self.comment = comment.into();
        self
    }

    /// Sets the creation time of the archive (eg. for the Last-Modified HTTP header).
    /// If not set, the latest modification time of the entries is used.
    pub fn create_time(&mut self, create_time: DateTime<FixedOffset>) -> &mut Self {
        self.create_time = Some(create_time);
        self
    }

    /// Entries added so far, in archive order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Lays out the archive.
    ///
    /// Headers, data descriptors and the central directory are encoded into memory, entry
    /// content stays with its sources and is read only when the archive is read.
    ///
    /// # Errors
    /// Fails if any of the names, comments or extra fields don't fit into their 16bit lengths,
    /// or if entry content is inconsistent with the entry (directory with content, or missing
    /// content with nonzero compressed size). Fails with [`Error::ArchiveTooLarge`] if the
    /// total archive size doesn't fit into 64 bits.
    pub fn build(self) -> Result<Archive, Error> {
        if self.comment.len() as u64 > UINT16_MAX {
            return Err(Error::CommentTooLong {
                length: self.comment.len(),
            });
        }

        let mut segments = Segments::new();
        let mut fingerprint = Md5::new();

        if let Some((source, size)) = self.prefix {
            segments.push(source, size)?;
            fingerprint.update(size.to_le_bytes());
        }

        let mut records = Vec::with_capacity(self.entries.len());
        let mut max_modified: Option<DateTime<FixedOffset>> = None;

        for entry in self.entries {
            let entry = normalize(entry)?;
            check_content(&entry)?;

            let offset = segments.size();
            log::trace!("Entry {:?} at offset {}", entry.display_name(), offset);

            let header = local_header(&entry)?;
            fingerprint.update(&header);
            push_bytes(&mut segments, header)?;

            if !entry.is_dir() {
                if let Some(content) = &entry.content {
                    segments.push(content.clone(), entry.compressed_size)?;
                }
                let descriptor = data_descriptor(&entry);
                fingerprint.update(&descriptor);
                push_bytes(&mut segments, descriptor)?;
            }

            max_modified = match max_modified {
                Some(max) if max >= entry.modified => Some(max),
                _ => Some(entry.modified),
            };

            records.push(DirectoryRecord { entry, offset });
        }

        let cd_offset = segments.size();
        let central = central_directory(&records, cd_offset, &self.comment)?;
        fingerprint.update(&central.data);
        push_bytes(&mut segments, central.data)?;

        log::debug!(
            "Built archive with {} entries, {} B (central directory {} B at {}, zip64: {})",
            records.len(),
            segments.size(),
            central.size,
            cd_offset,
            central.zip64
        );

        Ok(Archive::new(
            segments,
            fingerprint.finalize().into(),
            self.create_time.or(max_modified),
        ))
    }
}

fn check_content(entry: &Entry) -> Result<(), Error> {
    let reason = if entry.is_dir() {
        if entry.content.is_none() {
            return Ok(());
        }
        ContentMismatchReason::DirectoryWithContent
    } else {
        if entry.content.is_some() || entry.compressed_size == 0 {
            return Ok(());
        }
        ContentMismatchReason::MissingContent {
            compressed_size: entry.compressed_size,
        }
    };
    Err(Error::ContentSizeMismatch {
        entry_name: entry.display_name(),
        reason,
    })
}

fn push_bytes(segments: &mut Segments, data: Vec<u8>) -> Result<(), Error> {
    let len = data.len() as u64;
    segments.push(Arc::new(IgnoreCancellation::new(Bytes::from(data))), len)
}

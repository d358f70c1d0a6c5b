use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    #[error("Archive comment too long ({length} B, length must fit into 16bit)")]
    CommentTooLong { length: usize },
    #[error("Comment of entry {entry_name} too long ({length} B, length must fit into 16bit)")]
    EntryCommentTooLong { entry_name: String, length: usize },
    #[error("Entry name too long ({length} B, length must fit into 16bit)")]
    NameTooLong { length: usize },
    #[error("Extra field of entry {entry_name} too long ({length} B, length must fit into 16bit)")]
    ExtraTooLong { entry_name: String, length: usize },
    #[error("Entry {entry_name} has inconsistent content: {reason}")]
    ContentSizeMismatch {
        entry_name: String,
        reason: ContentMismatchReason,
    },
    #[error("Archive too large: {len} B at offset {offset} overflows the 64bit size")]
    ArchiveTooLarge { offset: u64, len: u64 },
    #[error("Attempting to seek before the start of the file")]
    SeekingBeforeStart,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ContentMismatchReason {
    #[error("entry without content has nonzero compressed size {compressed_size}")]
    MissingContent { compressed_size: u64 },
    #[error("directory entry has content")]
    DirectoryWithContent,
}

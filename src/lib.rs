mod archive;
mod builder;
mod central;
mod content;
mod entry;
mod error;
mod local;
mod normalize;
mod reader;
mod segments;
mod structs;

#[cfg(feature = "proptest")]
pub mod proptest;

#[cfg(test)]
mod test_util;

pub use archive::Archive;
pub use builder::Template;
pub use content::{ContentSource, IgnoreCancellation, ReadAt};
pub use entry::Entry;
pub use error::{ContentMismatchReason, Error};
pub use reader::ArchiveReader;
pub use segments::{ReadOutcome, Segments};
pub use structs::{CompressionMethod, FLAG_DATA_DESCRIPTOR, FLAG_UTF8};

pub use tokio_util::sync::CancellationToken;

#[cfg(doctest)]
#[doc = include_str!("../README.md")]
struct ReadMe;

use crate::{
    entry::Entry,
    structs::{
        CompressionMethod, ExtendedTimestampExtraField, PackedStructZipExt, FLAG_DATA_DESCRIPTOR,
        FLAG_UTF8, UINT16_MAX, ZIP_VERSION_20,
    },
    Error,
};

/// Checks whether the string is valid UTF-8 and whether it has to be flagged as UTF-8.
///
/// Returns `(valid, require)`. Officially zip uses CP-437, but most readers just use whatever
/// the local encoding is. Most of those agree with ASCII on 0x20 ..= 0x7d, except 0x5c, which
/// is a currency symbol in Shift-JIS and EUC-KR (0x7e is excluded for the same reason).
/// Anything outside of that range requires the UTF-8 flag.
pub(crate) fn detect_utf8(s: &[u8]) -> (bool, bool) {
    match std::str::from_utf8(s) {
        Ok(s) => (
            true,
            s.chars().any(|c| c < '\x20' || c > '\x7d' || c == '\x5c'),
        ),
        Err(_) => (false, false),
    }
}

/// Fills in the fields derived from the user provided entry data.
///
/// Sets the UTF-8 flag, versions, adds the extended timestamp extra field and switches
/// between directory and data descriptor handling.
pub(crate) fn normalize(mut entry: Entry) -> Result<Entry, Error> {
    if entry.comment.len() as u64 > UINT16_MAX {
        return Err(Error::EntryCommentTooLong {
            entry_name: entry.display_name(),
            length: entry.comment.len(),
        });
    }

    let (name_valid, name_requires) = detect_utf8(&entry.name);
    let (comment_valid, comment_requires) = detect_utf8(&entry.comment);
    if entry.non_utf8 {
        entry.flags &= !FLAG_UTF8;
    } else if (name_requires || comment_requires) && name_valid && comment_valid {
        entry.flags |= FLAG_UTF8;
    }

    // Keep the platform byte
    entry.creator_version = entry.creator_version & 0xff00 | ZIP_VERSION_20;
    entry.reader_version = ZIP_VERSION_20;

    let extra_len = entry.extra.len() + ExtendedTimestampExtraField::packed_size_usize();
    if extra_len as u64 > UINT16_MAX {
        return Err(Error::ExtraTooLong {
            entry_name: entry.display_name(),
            length: extra_len,
        });
    }
    ExtendedTimestampExtraField {
        tag: ExtendedTimestampExtraField::TAG,
        size: ExtendedTimestampExtraField::packed_size() as u16 - 4,
        flags: ExtendedTimestampExtraField::FLAG_MOD_TIME,
        mod_time: entry.modified.timestamp().clamp(0, u32::MAX.into()) as u32,
    }
    .append_to(&mut entry.extra);

    if entry.is_dir() {
        // Sizes are always written as zero for directories, so the data must really be empty.
        // Most compression methods produce nonzero output even for empty input.
        entry.method = CompressionMethod::STORE;
        entry.flags &= !FLAG_DATA_DESCRIPTOR;
        entry.compressed_size = 0;
        entry.uncompressed_size = 0;
    } else {
        entry.flags |= FLAG_DATA_DESCRIPTOR;
    }

    Ok(entry)
}

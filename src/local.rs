use crate::{
    entry::Entry,
    structs::{
        DataDescriptor32, DataDescriptor64, DosDatetime, LocalFileHeader, PackedStructZipExt,
    },
    Error,
};

pub(crate) fn name_len(entry: &Entry) -> Result<u16, Error> {
    u16::try_from(entry.name.len()).map_err(|_| Error::NameTooLong {
        length: entry.name.len(),
    })
}

/// Length of the extra fields as stored in the header.
/// The extra fields don't have to be the entry's own (central directory may add zip64 fields).
pub(crate) fn extra_len(entry: &Entry, extra: &[u8]) -> Result<u16, Error> {
    u16::try_from(extra.len()).map_err(|_| Error::ExtraTooLong {
        entry_name: entry.display_name(),
        length: extra.len(),
    })
}

/// Encodes the local file header of a normalized entry, followed by name and extra fields.
///
/// CRC and sizes are left zero, the data descriptor after the content carries them.
pub(crate) fn local_header(entry: &Entry) -> Result<Vec<u8>, Error> {
    let file_name_len = name_len(entry)?;
    let extra_field_len = extra_len(entry, &entry.extra)?;
    let datetime = DosDatetime::from_datetime(&entry.modified);

    let mut output = Vec::with_capacity(
        LocalFileHeader::packed_size_usize() + entry.name.len() + entry.extra.len(),
    );
    LocalFileHeader {
        signature: LocalFileHeader::SIGNATURE,
        version_to_extract: entry.reader_version,
        flags: entry.flags,
        compression: entry.method.0,
        last_mod_time: datetime.time,
        last_mod_date: datetime.date,
        crc32: 0,
        compressed_size: 0,
        uncompressed_size: 0,
        file_name_len,
        extra_field_len,
    }
    .append_to(&mut output);
    output.extend_from_slice(&entry.name);
    output.extend_from_slice(&entry.extra);

    Ok(output)
}

/// Encodes the data descriptor that follows the entry content.
///
/// Zip64 sized entries get the 8 byte size variant, without a zip64 extra field in the local
/// header (that was already written).
pub(crate) fn data_descriptor(entry: &Entry) -> Vec<u8> {
    let mut output = Vec::new();
    if entry.is_zip64() {
        DataDescriptor64 {
            signature: DataDescriptor64::SIGNATURE,
            crc32: entry.crc32,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
        }
        .append_to(&mut output);
    } else {
        DataDescriptor32 {
            signature: DataDescriptor32::SIGNATURE,
            crc32: entry.crc32,
            compressed_size: entry.compressed_size as u32,
            uncompressed_size: entry.uncompressed_size as u32,
        }
        .append_to(&mut output);
    }
    output
}

use crate::{
    entry::Entry,
    local::{extra_len, name_len},
    structs::{
        CentralDirectoryHeader, DosDatetime, EndOfCentralDirectory, PackedStructZipExt,
        Zip64EndOfCentralDirectoryLocator, Zip64EndOfCentralDirectoryRecord, Zip64ExtraField,
        UINT16_MAX, UINT32_MAX, ZIP_VERSION_45,
    },
    Error,
};

/// Normalized entry together with the offset of its local header in the archive.
#[derive(Clone, Debug)]
pub(crate) struct DirectoryRecord {
    pub entry: Entry,
    pub offset: u64,
}

impl DirectoryRecord {
    fn needs_zip64(&self) -> bool {
        self.entry.is_zip64() || self.offset >= UINT32_MAX
    }
}

/// Encoded central directory including the end records.
#[derive(Clone, Debug)]
pub(crate) struct CentralDirectory {
    pub data: Vec<u8>,
    /// Size of the directory headers, without the end records.
    pub size: u64,
    /// Zip64 end of central directory record and locator were emitted.
    pub zip64: bool,
}

/// Encodes the central directory starting at offset `start` of the archive.
///
/// The records are not modified, so encoding can be repeated with the same result.
pub(crate) fn central_directory(
    records: &[DirectoryRecord],
    start: u64,
    comment: &[u8],
) -> Result<CentralDirectory, Error> {
    let file_comment_length = u16::try_from(comment.len()).map_err(|_| Error::CommentTooLong {
        length: comment.len(),
    })?;

    let mut data = Vec::new();
    for record in records {
        append_header(record, &mut data)?;
    }

    let size = data.len() as u64;
    let end = start.checked_add(size).ok_or(Error::ArchiveTooLarge {
        offset: start,
        len: size,
    })?;
    let mut count = records.len() as u64;
    let mut cd_size = size;
    let mut cd_offset = start;

    let zip64 = needs_zip64_end(count, cd_size, cd_offset);
    if zip64 {
        Zip64EndOfCentralDirectoryRecord {
            signature: Zip64EndOfCentralDirectoryRecord::SIGNATURE,
            size_of_zip64_eocd: Zip64EndOfCentralDirectoryRecord::packed_size() - 12,
            version_made_by: ZIP_VERSION_45,
            version_to_extract: ZIP_VERSION_45,
            this_disk_number: 0,
            start_of_cd_disk_number: 0,
            this_cd_entry_count: count,
            total_cd_entry_count: count,
            size_of_cd: cd_size,
            cd_offset,
        }
        .append_to(&mut data);
        Zip64EndOfCentralDirectoryLocator {
            signature: Zip64EndOfCentralDirectoryLocator::SIGNATURE,
            start_of_cd_disk_number: 0,
            zip64_eocd_offset: end,
            number_of_disks: 1,
        }
        .append_to(&mut data);

        // Readers should look for the zip64 values
        count = UINT16_MAX;
        cd_size = UINT32_MAX;
        cd_offset = UINT32_MAX;
    }

    EndOfCentralDirectory {
        signature: EndOfCentralDirectory::SIGNATURE,
        this_disk_number: 0,
        start_of_cd_disk_number: 0,
        this_cd_entry_count: count as u16,
        total_cd_entry_count: count as u16,
        size_of_cd: cd_size as u32,
        cd_offset: cd_offset as u32,
        file_comment_length,
    }
    .append_to(&mut data);
    data.extend_from_slice(comment);

    Ok(CentralDirectory { data, size, zip64 })
}

/// The legacy end record can't hold the entry count, directory size or directory offset.
fn needs_zip64_end(count: u64, size: u64, offset: u64) -> bool {
    count >= UINT16_MAX || size >= UINT32_MAX || offset >= UINT32_MAX
}

fn append_header(record: &DirectoryRecord, output: &mut Vec<u8>) -> Result<(), Error> {
    let entry = &record.entry;
    let datetime = DosDatetime::from_datetime(&entry.modified);
    let needs_zip64 = record.needs_zip64();

    let mut extra = entry.extra.clone();
    let (compressed_size, uncompressed_size) = if needs_zip64 {
        Zip64ExtraField {
            tag: Zip64ExtraField::TAG,
            size: Zip64ExtraField::packed_size() as u16 - 4,
            uncompressed_size: entry.uncompressed_size,
            compressed_size: entry.compressed_size,
            offset: record.offset,
        }
        .append_to(&mut extra);
        (UINT32_MAX as u32, UINT32_MAX as u32)
    } else {
        (entry.compressed_size as u32, entry.uncompressed_size as u32)
    };

    let version_to_extract = if entry.is_zip64() {
        ZIP_VERSION_45
    } else {
        entry.reader_version
    };

    CentralDirectoryHeader {
        signature: CentralDirectoryHeader::SIGNATURE,
        version_made_by: entry.creator_version,
        version_to_extract,
        flags: entry.flags,
        compression: entry.method.0,
        last_mod_time: datetime.time,
        last_mod_date: datetime.date,
        crc32: entry.crc32,
        compressed_size,
        uncompressed_size,
        file_name_len: name_len(entry)?,
        extra_field_len: extra_len(entry, &extra)?,
        file_comment_length: u16::try_from(entry.comment.len()).map_err(|_| {
            Error::EntryCommentTooLong {
                entry_name: entry.display_name(),
                length: entry.comment.len(),
            }
        })?,
        disk_number_start: 0,
        internal_attributes: 0,
        external_attributes: entry.external_attributes,
        local_header_offset: record.offset.min(UINT32_MAX) as u32,
    }
    .append_to(output);
    output.extend_from_slice(&entry.name);
    output.extend_from_slice(&extra);
    output.extend_from_slice(&entry.comment);

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{normalize::normalize, structs::ZIP_VERSION_20};
    use assert2::assert;
    use assert_matches::assert_matches;
    use packed_struct::PackedStructSlice;
    use test_case::test_case;

    fn record(name: &str, compressed: u64, uncompressed: u64, offset: u64) -> DirectoryRecord {
        let mut entry = Entry::new(name);
        entry.sizes(compressed, uncompressed).crc32(0x12345678);
        DirectoryRecord {
            entry: normalize(entry).unwrap(),
            offset,
        }
    }

    fn eocd(data: &[u8], comment_len: usize) -> EndOfCentralDirectory {
        let start = data.len() - comment_len - EndOfCentralDirectory::packed_size_usize();
        EndOfCentralDirectory::unpack_from_slice(&data[start..start + 22]).unwrap()
    }

    #[test]
    fn empty_directory() {
        let cd = central_directory(&[], 0, b"").unwrap();
        assert!(cd.size == 0);
        assert!(!cd.zip64);
        assert!(cd.data.len() == 22);
        assert!(&cd.data[..4] == b"PK\x05\x06");
    }

    #[test]
    fn plain_header() {
        let records = [record("a.txt", 5, 7, 1234)];
        let cd = central_directory(&records, 5000, b"archive comment").unwrap();

        // 46 + name + timestamp extra field
        assert!(cd.size == 46 + 5 + 9);
        assert!(!cd.zip64);
        let header = CentralDirectoryHeader::unpack_from_slice(&cd.data[..46]).unwrap();
        assert!(header.signature == CentralDirectoryHeader::SIGNATURE);
        assert!(header.version_to_extract == ZIP_VERSION_20);
        assert!(header.crc32 == 0x12345678);
        assert!(header.compressed_size == 5);
        assert!(header.uncompressed_size == 7);
        assert!(header.extra_field_len == 9);
        assert!(header.local_header_offset == 1234);

        let end = eocd(&cd.data, 15);
        assert!(end.this_cd_entry_count == 1);
        assert!(end.total_cd_entry_count == 1);
        assert!(end.size_of_cd as u64 == cd.size);
        assert!(end.cd_offset == 5000);
        assert!(end.file_comment_length == 15);
        assert!(cd.data.ends_with(b"archive comment"));
    }

    #[test_case(0xffffffff, 10, 0; "large compressed size")]
    #[test_case(10, 0x100000000, 0; "large uncompressed size")]
    #[test_case(10, 10, 0xffffffff; "offset at threshold")]
    #[test_case(10, 10, 0x1_0000_0000; "large offset")]
    fn zip64_extra(compressed: u64, uncompressed: u64, offset: u64) {
        let records = [record("a", compressed, uncompressed, offset)];
        let cd = central_directory(&records, offset + 100, b"").unwrap();

        let header = CentralDirectoryHeader::unpack_from_slice(&cd.data[..46]).unwrap();
        assert!(header.compressed_size == u32::MAX);
        assert!(header.uncompressed_size == u32::MAX);
        assert!(header.local_header_offset == offset.min(UINT32_MAX) as u32);
        assert!(header.extra_field_len == 9 + 28);

        let extra_start = 46 + 1 + 9;
        let extra =
            Zip64ExtraField::unpack_from_slice(&cd.data[extra_start..extra_start + 28]).unwrap();
        assert!(extra.tag == Zip64ExtraField::TAG);
        assert!(extra.size == 24);
        assert!(extra.uncompressed_size == uncompressed);
        assert!(extra.compressed_size == compressed);
        assert!(extra.offset == offset);

        let expected_version = if records[0].entry.is_zip64() {
            ZIP_VERSION_45
        } else {
            ZIP_VERSION_20
        };
        assert!(header.version_to_extract == expected_version);
    }

    #[test]
    fn encoding_is_repeatable() {
        let records = [
            record("a", 0x100000000, 0x100000000, 0),
            record("b", 1, 1, 0x100000030),
        ];
        let first = central_directory(&records, 0x200000000, b"x").unwrap();
        let second = central_directory(&records, 0x200000000, b"x").unwrap();

        assert!(first.data == second.data);
        assert!(records[0].entry.extra.len() == 9);
    }

    #[test]
    fn zip64_end_records_for_offset() {
        let records = [record("a", 1, 1, 0)];
        let start = 0x100000000;
        let cd = central_directory(&records, start, b"").unwrap();
        assert!(cd.zip64);

        let record_start = cd.size as usize;
        let zip64_eocd = Zip64EndOfCentralDirectoryRecord::unpack_from_slice(
            &cd.data[record_start..record_start + 56],
        )
        .unwrap();
        assert!(zip64_eocd.size_of_zip64_eocd == 44);
        assert!(zip64_eocd.version_made_by == ZIP_VERSION_45);
        assert!(zip64_eocd.version_to_extract == ZIP_VERSION_45);
        assert!(zip64_eocd.this_cd_entry_count == 1);
        assert!(zip64_eocd.total_cd_entry_count == 1);
        assert!(zip64_eocd.size_of_cd == cd.size);
        assert!(zip64_eocd.cd_offset == start);

        let locator = Zip64EndOfCentralDirectoryLocator::unpack_from_slice(
            &cd.data[record_start + 56..record_start + 76],
        )
        .unwrap();
        assert!(locator.signature == Zip64EndOfCentralDirectoryLocator::SIGNATURE);
        assert!(locator.zip64_eocd_offset == start + cd.size);
        assert!(locator.number_of_disks == 1);

        let end = eocd(&cd.data, 0);
        assert!(end.this_cd_entry_count == u16::MAX);
        assert!(end.total_cd_entry_count == u16::MAX);
        assert!(end.size_of_cd == u32::MAX);
        assert!(end.cd_offset == u32::MAX);
        assert!(cd.data.len() == record_start + 56 + 20 + 22);
    }

    #[test_case(0xfffe, false; "below entry limit")]
    #[test_case(0xffff, true; "at entry limit")]
    fn zip64_end_records_for_count(count: usize, expected_zip64: bool) {
        let records = vec![record("e", 0, 0, 0); count];
        let cd = central_directory(&records, 0, b"").unwrap();
        assert!(cd.zip64 == expected_zip64);

        let end = eocd(&cd.data, 0);
        assert!(end.total_cd_entry_count as usize == count.min(0xffff));
    }

    #[test_case(0xfffe, 0, 0, false; "small")]
    #[test_case(0xffff, 0, 0, true; "count at limit")]
    #[test_case(1, 0xfffffffe, 0, false; "size below limit")]
    #[test_case(1, 0xffffffff, 0, true; "size at limit")]
    #[test_case(1, 0, 0xfffffffe, false; "offset below limit")]
    #[test_case(1, 0, 0xffffffff, true; "offset at limit")]
    #[test_case(0xfffe, 0xfffffffe, 0xfffffffe, false; "everything just below")]
    fn zip64_end_triggers(count: u64, size: u64, offset: u64, expected: bool) {
        assert!(needs_zip64_end(count, size, offset) == expected);
    }

    #[test]
    fn directory_end_overflow() {
        let records = [record("a", 1, 1, 0)];
        assert_matches!(
            central_directory(&records, u64::MAX - 10, b""),
            Err(Error::ArchiveTooLarge { offset, .. }) if offset == u64::MAX - 10
        );
    }

    #[test]
    fn entry_comment_is_written() {
        let mut entry = Entry::new("a");
        entry.comment("hello");
        let records = [DirectoryRecord {
            entry: normalize(entry).unwrap(),
            offset: 0,
        }];
        let cd = central_directory(&records, 0, b"").unwrap();

        let header = CentralDirectoryHeader::unpack_from_slice(&cd.data[..46]).unwrap();
        assert!(header.file_comment_length == 5);
        assert!(&cd.data[cd.size as usize - 5..cd.size as usize] == b"hello");
    }

    #[test]
    fn comment_too_long() {
        let comment = vec![b'x'; u16::MAX as usize + 1];
        assert_matches!(
            central_directory(&[], 0, &comment),
            Err(Error::CommentTooLong { length }) if length == comment.len()
        );
    }

    #[test]
    fn zip64_extra_overflows_extra_field() {
        let mut entry = Entry::new("a");
        entry
            .extra(vec![0; u16::MAX as usize - 9 - 10])
            .sizes(0x100000000, 0x100000000);
        let records = [DirectoryRecord {
            entry: normalize(entry).unwrap(),
            offset: 0,
        }];
        assert_matches!(
            central_directory(&records, 0, b""),
            Err(Error::ExtraTooLong { .. })
        );
    }
}

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use packed_struct::prelude::*;
use packed_struct::PackedStructSlice;

/// Version 2.0, baseline needed to extract entries without extensions.
pub const ZIP_VERSION_20: u16 = 20;
/// Version 4.5, needed to extract zip64 extensions.
pub const ZIP_VERSION_45: u16 = 45;

/// Limits for non zip64 files.
pub const UINT16_MAX: u64 = u16::MAX as u64;
pub const UINT32_MAX: u64 = u32::MAX as u64;

/// General purpose flag: CRC and sizes follow the data in a data descriptor.
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: name and comment are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Creator platforms stored in the high byte of "version made by".
pub const CREATOR_FAT: u8 = 0;
pub const CREATOR_UNIX: u8 = 3;
pub const CREATOR_NTFS: u8 = 11;
pub const CREATOR_VFAT: u8 = 14;
pub const CREATOR_MACOSX: u8 = 19;

/// Compression method code of an entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompressionMethod(pub u16);

impl CompressionMethod {
    pub const STORE: CompressionMethod = CompressionMethod(0);
    pub const DEFLATE: CompressionMethod = CompressionMethod(8);
}

/// Local file header
/// Preceedes every file.
/// Must be followed by file name and extra fields (length is part of this struct)
#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct LocalFileHeader {
    pub signature: u32,
    pub version_to_extract: u16,
    pub flags: u16,
    pub compression: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_len: u16,
    pub extra_field_len: u16,
}

impl LocalFileHeader {
    pub const SIGNATURE: u32 = 0x04034b50;
}

/// Data descriptor with 32bit sizes.
/// Follows file data.
#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct DataDescriptor32 {
    pub signature: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor32 {
    pub const SIGNATURE: u32 = 0x08074b50;
}

/// Zip64 version of the data descriptor
/// Follows file data.
#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct DataDescriptor64 {
    pub signature: u32,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

impl DataDescriptor64 {
    pub const SIGNATURE: u32 = DataDescriptor32::SIGNATURE;
}

#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct Zip64ExtraField {
    pub tag: u16,
    pub size: u16,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub offset: u64,
}

impl Zip64ExtraField {
    pub const TAG: u16 = 0x0001;
}

/// Info-ZIP extended timestamp, carrying only the modification time.
/// Identical in local and central headers in this form.
#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct ExtendedTimestampExtraField {
    pub tag: u16,
    pub size: u16,
    pub flags: u8,
    pub mod_time: u32,
}

impl ExtendedTimestampExtraField {
    pub const TAG: u16 = 0x5455;
    pub const FLAG_MOD_TIME: u8 = 1;
}

/// Central directory header
/// One per each file, placed in central directory.
#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct CentralDirectoryHeader {
    pub signature: u32,
    pub version_made_by: u16,
    pub version_to_extract: u16,
    pub flags: u16,
    pub compression: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_len: u16,
    pub extra_field_len: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    pub const SIGNATURE: u32 = 0x02014b50;
}

#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct Zip64EndOfCentralDirectoryRecord {
    pub signature: u32,
    pub size_of_zip64_eocd: u64,
    pub version_made_by: u16,
    pub version_to_extract: u16,
    pub this_disk_number: u32,
    pub start_of_cd_disk_number: u32,
    pub this_cd_entry_count: u64,
    pub total_cd_entry_count: u64,
    pub size_of_cd: u64,
    pub cd_offset: u64,
}

impl Zip64EndOfCentralDirectoryRecord {
    pub const SIGNATURE: u32 = 0x06064b50;
}

#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct Zip64EndOfCentralDirectoryLocator {
    pub signature: u32,
    pub start_of_cd_disk_number: u32,
    pub zip64_eocd_offset: u64,
    pub number_of_disks: u32,
}

impl Zip64EndOfCentralDirectoryLocator {
    pub const SIGNATURE: u32 = 0x07064b50;
}

#[derive(Debug, PackedStruct)]
#[packed_struct(endian = "lsb")]
pub struct EndOfCentralDirectory {
    pub signature: u32,
    pub this_disk_number: u16,
    pub start_of_cd_disk_number: u16,
    pub this_cd_entry_count: u16,
    pub total_cd_entry_count: u16,
    pub size_of_cd: u32,
    pub cd_offset: u32,
    pub file_comment_length: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x06054b50;
}

/// MS-DOS date and time fields, 2 second resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DosDatetime {
    pub date: u16,
    pub time: u16,
}

impl DosDatetime {
    /// Converts the wall clock fields of the datetime (in its own offset).
    /// Values outside 1980-01-01 ..= 2107-12-31 are clamped to the representable range.
    pub fn from_datetime(datetime: &DateTime<FixedOffset>) -> Self {
        let year = datetime.year();
        if year < 1980 {
            return DosDatetime::new_unchecked(1980, 1, 1, 0, 0, 0);
        }
        if year > 2107 {
            return DosDatetime::new_unchecked(2107, 12, 31, 23, 59, 58);
        }
        DosDatetime::new_unchecked(
            year,
            datetime.month(),
            datetime.day(),
            datetime.hour(),
            datetime.minute(),
            datetime.second(),
        )
    }

    fn new_unchecked(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let date = day + (month << 5) + (((year - 1980) as u32) << 9);
        let time = second / 2 + (minute << 5) + (hour << 11);
        DosDatetime {
            date: date as u16,
            time: time as u16,
        }
    }
}

impl Default for DosDatetime {
    fn default() -> Self {
        DosDatetime::new_unchecked(1980, 1, 1, 0, 0, 0)
    }
}

pub trait PackedStructZipExt {
    fn packed_size() -> u64;
    fn packed_size_usize() -> usize;

    /// Packs the struct to the end of `output`.
    fn append_to(&self, output: &mut Vec<u8>);
}

impl<T: PackedStruct> PackedStructZipExt for T {
    fn packed_size() -> u64 {
        Self::packed_size_usize() as u64
    }

    fn packed_size_usize() -> usize {
        Self::packed_bytes_size(None).unwrap_or_else(|_| unreachable!("All structs have fixed size"))
    }

    fn append_to(&self, output: &mut Vec<u8>) {
        let start = output.len();
        output.resize(start + Self::packed_size_usize(), 0);
        self.pack_to_slice(&mut output[start..]).unwrap_or_else(|_| {
            unreachable!("Buffer is resized appropriately, there is no other way this could fail")
        });
    }
}

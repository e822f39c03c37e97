//! A library that makes a GUID partition table written with 4096 bytes sectors readable with 512
//! bytes sectors too.
//!
//! The 4096 bytes sector GPT is left untouched (except, when there is no room elsewhere, its
//! usable range is shrunk by 8 sectors). A second GPT addressed in 512 bytes sectors is written
//! in the unused space: its headers at the bytes 512 and 1024 and two copies of its partition
//! table in a gap of 8 unused 4096 bytes sectors.
//!
//! # Examples
//!
//! Looking at what would be done on a disk without writing anything:
//!
//! ```no_run
//! let mut f = std::fs::File::open("disk.img")
//!     .expect("could not open disk");
//!
//! match gpt4096to512::convert(&mut f, gpt4096to512::WriteMode::DryRun)
//!     .expect("could not convert the disk")
//! {
//!     Some(report) => println!("{}", report),
//!     None => println!("no space available"),
//! }
//! ```
//!
//! Validating a disk and looking for a gap:
//!
//! ```no_run
//! let mut f = std::fs::File::open("disk.img")
//!     .expect("could not open disk");
//! let gpt = gpt4096to512::validate(&mut f)
//!     .expect("invalid GPT");
//!
//! println!("Disk GUID: {:?}", gpt.primary.disk_guid);
//!
//! if let Some(gap) = gpt.find_gap() {
//!     println!("{} gap at 4096-LBAs {}", gap.kind, gap);
//! }
//! ```

#![deny(missing_docs)]

use bincode::{deserialize, serialize};
use crc::{Crc, CRC_32_ISO_HDLC};
use serde::de::{Error as _, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io;
use thiserror::Error;

mod check;
mod device;
mod inject;
/// Linux specific helpers
#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(test)]
mod testing;

pub use check::{check, validate, CheckResult, GPTPair, Gap, GapKind, HeaderCopy, GAP_LBAS};
pub use device::Device;
pub use inject::{
    convert, ensure_gap, inject_headers, inject_partition_tables, rescale_header,
    rescale_partitions, BoundaryChange, Journal, PlannedWrite, Report, WriteMode,
};

/// Sector size (in bytes) of the existing GPT.
pub const SOURCE_SECTOR_SIZE: u64 = 4096;
/// Sector size (in bytes) of the GPT that gets injected.
pub const TARGET_SECTOR_SIZE: u64 = 512;
/// Number of 512 bytes sectors in a 4096 bytes sector.
pub const SECTOR_RATIO: u64 = SOURCE_SECTOR_SIZE / TARGET_SECTOR_SIZE;
/// Size (in bytes) of the fixed part of a GPT header.
pub const HEADER_SIZE: usize = 92;
/// Size (in bytes) of a partition entry.
pub const PARTITION_ENTRY_SIZE: usize = 128;
/// Number of entries in a partition table.
pub const NUMBER_OF_PARTITION_ENTRIES: u32 = 128;
/// Number of UTF-16 code units in a partition name.
pub const PARTITION_NAME_UNITS: usize = 36;

/// Type GUID of a Microsoft Reserved Partition (E3C9E316-0B5C-4DB8-817D-F92DF00215AE).
pub const MICROSOFT_RESERVED_TYPE_GUID: [u8; 16] = [
    0x16, 0xe3, 0xc9, 0xe3, 0x5c, 0x0b, 0xb8, 0x4d, 0x81, 0x7d, 0xf9, 0x2d, 0xf0, 0x02, 0x15, 0xae,
];

const SIGNATURE: [u8; 8] = *b"EFI PART";
const REVISION: [u8; 4] = [0x00, 0x00, 0x01, 0x00];
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// An error that can be produced while reading, checking or converting a GPT.
#[derive(Debug, Error)]
pub enum Error {
    /// Derialization errors.
    #[error("deserialization failed")]
    Deserialize(#[from] bincode::Error),
    /// I/O errors. Short reads and short writes end up here.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// An error that occurs when there are less than 92 bytes to decode a header from.
    #[error("header too short ({0} < 92 bytes)")]
    HeaderTooShort(usize),
    /// An error that occurs when the signature of the GPT isn't what would be expected ("EFI
    /// PART").
    #[error("invalid signature")]
    InvalidSignature,
    /// An error that occurs when the revision of the GPT isn't what would be expected (00 00 01
    /// 00).
    #[error("invalid revision")]
    InvalidRevision,
    /// An error that occurs when the header's size (in bytes) isn't what would be expected (92).
    #[error("invalid header size: {0}")]
    InvalidHeaderSize(u32),
    /// An error that occurs when the reserved bytes of the header are not zero.
    #[error("reserved field is not zero")]
    InvalidReserved,
    /// An error that occurs when the bytes following the header in its sector are not zero.
    #[error("header filler is not zeroed")]
    NonZeroFiller,
    /// An error that occurs when the header doesn't describe exactly 128 partition entries.
    #[error("invalid number of partition entries: {0}")]
    InvalidPartitionEntryCount(u32),
    /// An error that occurs when the header doesn't describe partition entries of 128 bytes.
    #[error("invalid size of partition entry: {0}")]
    InvalidPartitionEntrySize(u32),
    /// An error that occurs when the CRC32 checksum of the header doesn't match the expected
    /// checksum for the actual header.
    #[error("corrupted CRC32 checksum ({0} != {1})")]
    InvalidChecksum(u32, u32),
    /// An error that occurs when the CRC32 checksum of the partition entries array doesn't match
    /// the expected checksum for the actual partition entries array.
    #[error("corrupted partition entry array CRC32 checksum ({0} != {1})")]
    InvalidPartitionEntryArrayChecksum(u32, u32),
    /// An error that occurs when a partition table is not made of whole 128 bytes entries.
    #[error("invalid partition table length: {0} is not a multiple of 128")]
    InvalidPartitionTableLength(usize),
    /// An error in one of the two headers.
    #[error("{0} header: {1}")]
    InvalidHeader(HeaderCopy, Box<Error>),
    /// A field doesn't have the value it must have.
    #[error("unexpected {field} ({found} != {expected})")]
    Mismatch {
        /// Name of the field.
        field: &'static str,
        /// The value it must have.
        expected: String,
        /// The value found on disk.
        found: String,
    },
    /// Two regions of the disk are not ordered as they should be (`left` must not be greater
    /// than `right`).
    #[error("invalid layout: {what} ({left} > {right})")]
    Layout {
        /// Description of the ordering that is violated.
        what: &'static str,
        /// The LBA that should come first.
        left: u64,
        /// The LBA that should come last.
        right: u64,
    },
    /// An error that occurs when the primary and the backup partition tables are not identical.
    #[error("primary and backup partition tables differ")]
    PartitionTablesDiffer,
    /// An error that occurs when a partition has an invalid boundary.
    #[error(
        "invalid partition boundaries: partition #{index} [{starting_lba}, {ending_lba}] \
        doesn't fit in the usable range [{first_usable_lba}, {last_usable_lba}]"
    )]
    PartitionOutOfBounds {
        /// Partition number (starting at 1).
        index: u32,
        /// First LBA of the partition.
        starting_lba: u64,
        /// Last LBA of the partition.
        ending_lba: u64,
        /// First usable LBA of the disk.
        first_usable_lba: u64,
        /// Last usable LBA of the disk.
        last_usable_lba: u64,
    },
    /// An error that occurs when a header read back after being written is not what was
    /// written.
    #[error("{0} header read back differs from what was written")]
    ReadBackMismatch(HeaderCopy),
}

/// The result of reading, checking or converting a GPT.
pub type Result<T> = std::result::Result<T, Error>;

/// Standard CRC-32 (the one used by GPT, zlib, Ethernet, ...).
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// A GUID Partition Table header as describe on
/// [Wikipedia's page](https://en.wikipedia.org/wiki/GUID_Partition_Table#Partition_table_header_(LBA_1)).
///
/// The `filler` holds the rest of the sector after the 92 bytes of the header. It is not part of
/// the header's checksum.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GPTHeader {
    /// GPT signature (must be "EFI PART").
    pub signature: [u8; 8],
    /// GPT revision (must be 00 00 01 00).
    pub revision: [u8; 4],
    /// GPT header size (must be 92).
    pub header_size: u32,
    /// CRC32 checksum of the header.
    pub crc32_checksum: u32,
    /// Reserved bytes of the header.
    pub reserved: [u8; 4],
    /// Location (in sectors) of this header.
    pub primary_lba: u64,
    /// Location (in sectors) of the other header.
    pub backup_lba: u64,
    /// Location (in sectors) of the first usable sector.
    pub first_usable_lba: u64,
    /// Location (in sectors) of the last usable sector.
    pub last_usable_lba: u64,
    /// 16 bytes representing the UUID of the GPT.
    pub disk_guid: [u8; 16],
    /// Location (in sectors) of the partition entries array.
    pub partition_entry_lba: u64,
    /// Number of partition entries in the array.
    pub number_of_partition_entries: u32,
    /// Size (in bytes) of a partition entry.
    pub size_of_partition_entry: u32,
    /// CRC32 checksum of the partition array.
    pub partition_entry_array_crc32: u32,
    /// Bytes between the end of the header and the end of its sector.
    #[serde(skip)]
    pub filler: Vec<u8>,
}

impl GPTHeader {
    /// Decode a header from the content of its sector. Everything after the first 92 bytes is
    /// kept as `filler`.
    pub fn decode(data: &[u8]) -> Result<GPTHeader> {
        if data.len() < HEADER_SIZE {
            return Err(Error::HeaderTooShort(data.len()));
        }

        let mut header: GPTHeader = deserialize(&data[..HEADER_SIZE])?;
        header.filler = data[HEADER_SIZE..].to_vec();

        Ok(header)
    }

    /// Encode the header followed by its filler.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut data = serialize(self)?;
        data.extend_from_slice(&self.filler);

        Ok(data)
    }

    /// Check the header on its own: constants, checksum and zeroed padding.
    pub fn check(&self) -> Result<()> {
        if self.signature != SIGNATURE {
            return Err(Error::InvalidSignature);
        }

        if self.revision != REVISION {
            return Err(Error::InvalidRevision);
        }

        if self.header_size as usize != HEADER_SIZE {
            return Err(Error::InvalidHeaderSize(self.header_size));
        }

        let sum = self.generate_crc32_checksum();
        if self.crc32_checksum != sum {
            return Err(Error::InvalidChecksum(self.crc32_checksum, sum));
        }

        if self.reserved != [0; 4] {
            return Err(Error::InvalidReserved);
        }

        if self.number_of_partition_entries != NUMBER_OF_PARTITION_ENTRIES {
            return Err(Error::InvalidPartitionEntryCount(
                self.number_of_partition_entries,
            ));
        }

        if self.size_of_partition_entry as usize != PARTITION_ENTRY_SIZE {
            return Err(Error::InvalidPartitionEntrySize(self.size_of_partition_entry));
        }

        if self.filler.iter().any(|&x| x != 0) {
            return Err(Error::NonZeroFiller);
        }

        Ok(())
    }

    /// Generate the CRC32 checksum of the header only (the checksum field zeroed and the filler
    /// left out).
    pub fn generate_crc32_checksum(&self) -> u32 {
        let clone = GPTHeader {
            crc32_checksum: 0,
            filler: Vec::new(),
            ..self.clone()
        };
        let data = serialize(&clone).expect("could not serialize");

        crc32(&data)
    }

    /// Update the CRC32 checksum of this header.
    pub fn update_crc32_checksum(&mut self) {
        self.crc32_checksum = self.generate_crc32_checksum();
    }

    /// Generate the CRC32 checksum of the partition entry array.
    pub fn generate_partition_entry_array_crc32(
        &self,
        partitions: &[GPTPartitionEntry],
    ) -> Result<u32> {
        let mut digest = CRC32.digest();
        for x in partitions {
            digest.update(&x.encode()?);
        }

        Ok(digest.finalize())
    }

    /// Update the CRC32 checksum of the partition entry array.
    pub fn update_partition_entry_array_crc32(
        &mut self,
        partitions: &[GPTPartitionEntry],
    ) -> Result<()> {
        self.partition_entry_array_crc32 = self.generate_partition_entry_array_crc32(partitions)?;

        Ok(())
    }

    /// Size (in bytes) of the partition entries array.
    pub fn partition_table_bytes(&self) -> u64 {
        u64::from(self.number_of_partition_entries) * u64::from(self.size_of_partition_entry)
    }

    /// Number of sectors occupied by the partition entries array.
    pub fn partition_table_lbas(&self, sector_size: u64) -> u64 {
        (self.partition_table_bytes() + sector_size - 1) / sector_size
    }
}

impl fmt::Debug for GPTHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("GPTHeader")
            .field("signature", &String::from_utf8_lossy(&self.signature))
            .field("revision", &self.revision)
            .field("header_size", &self.header_size)
            .field("crc32_checksum", &self.crc32_checksum)
            .field("reserved", &self.reserved)
            .field("primary_lba", &self.primary_lba)
            .field("backup_lba", &self.backup_lba)
            .field("first_usable_lba", &self.first_usable_lba)
            .field("last_usable_lba", &self.last_usable_lba)
            .field("disk_guid", &self.disk_guid)
            .field("partition_entry_lba", &self.partition_entry_lba)
            .field(
                "number_of_partition_entries",
                &self.number_of_partition_entries,
            )
            .field("size_of_partition_entry", &self.size_of_partition_entry)
            .field(
                "partition_entry_array_crc32",
                &self.partition_entry_array_crc32,
            )
            .field("filler", &format_args!("[{} bytes]", self.filler.len()))
            .finish()
    }
}

impl fmt::Display for GPTHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "lba={} backup_lba={} usable=[{}, {}] entries_lba={} entries={}x{} \
            crc32={:#010x} entries_crc32={:#010x}",
            self.primary_lba,
            self.backup_lba,
            self.first_usable_lba,
            self.last_usable_lba,
            self.partition_entry_lba,
            self.number_of_partition_entries,
            self.size_of_partition_entry,
            self.crc32_checksum,
            self.partition_entry_array_crc32,
        )
    }
}

/// A partition's name: 36 UTF-16LE code units.
///
/// All the code units are kept, including whatever follows the first NUL, so a name always
/// encodes back to the exact bytes it was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionName([u16; PARTITION_NAME_UNITS]);

impl PartitionName {
    /// The raw code units of the name.
    pub fn as_units(&self) -> &[u16; PARTITION_NAME_UNITS] {
        &self.0
    }

    /// Returns `true` if all the code units are NUL.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&x| x == 0)
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let units = self.as_units();
        let end = units.iter().position(|&x| x == 0).unwrap_or(units.len());
        write!(f, "{}", String::from_utf16_lossy(&units[..end]))
    }
}

impl From<&str> for PartitionName {
    fn from(value: &str) -> PartitionName {
        let mut units = [0; PARTITION_NAME_UNITS];
        for (e, v) in units.iter_mut().zip(value.encode_utf16()) {
            *e = v;
        }

        PartitionName(units)
    }
}

struct UTF16LEVisitor;

impl<'de> Visitor<'de> for UTF16LEVisitor {
    type Value = PartitionName;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("36 UTF-16LE code units (72 bytes)")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<PartitionName, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut units = [0; PARTITION_NAME_UNITS];
        for (i, unit) in units.iter_mut().enumerate() {
            *unit = seq
                .next_element()?
                .ok_or_else(|| A::Error::invalid_length(i, &self))?;
        }

        Ok(PartitionName(units))
    }
}

impl<'de> Deserialize<'de> for PartitionName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(PARTITION_NAME_UNITS, UTF16LEVisitor)
    }
}

impl Serialize for PartitionName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_tuple(PARTITION_NAME_UNITS)?;
        for x in self.0.iter() {
            seq.serialize_element(x)?;
        }
        seq.end()
    }
}

/// A GPT partition's entry in the partition array.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let entry = gpt4096to512::GPTPartitionEntry {
///     partition_type_guid: [0xff; 16],
///     unique_partition_guid: [0xff; 16],
///     starting_lba: 40,
///     ending_lba: 100,
///     attribute_bits: 0,
///     partition_name: "A Robot Named Fight!".into(),
/// };
///
/// let rescaled = entry.rescale(8);
/// assert_eq!(rescaled.starting_lba, 320);
/// assert_eq!(rescaled.ending_lba, 807);
/// assert_eq!(rescaled.partition_name.to_string(), "A Robot Named Fight!");
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct GPTPartitionEntry {
    /// 16 bytes representing the UUID of the partition's type.
    pub partition_type_guid: [u8; 16],
    /// 16 bytes representing the UUID of the partition.
    pub unique_partition_guid: [u8; 16],
    /// The position (in sectors) of the first sector (used) of the partition.
    pub starting_lba: u64,
    /// The position (in sectors) of the last sector (used) of the partition.
    pub ending_lba: u64,
    /// The attribute bits.
    pub attribute_bits: u64,
    /// The partition name.
    pub partition_name: PartitionName,
}

impl GPTPartitionEntry {
    /// Creates an empty partition entry
    pub fn empty() -> GPTPartitionEntry {
        GPTPartitionEntry {
            partition_type_guid: [0; 16],
            unique_partition_guid: [0; 16],
            starting_lba: 0,
            ending_lba: 0,
            attribute_bits: 0,
            partition_name: "".into(),
        }
    }

    /// Decode a partition entry from the first 128 bytes of `data`.
    pub fn decode(data: &[u8]) -> Result<GPTPartitionEntry> {
        Ok(deserialize(data)?)
    }

    /// Encode the partition entry (always 128 bytes).
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serialize(self)?)
    }

    /// Returns `true` if every field of the entry is zero: this is how an unused slot of the
    /// partition table is stored.
    pub fn is_zero(&self) -> bool {
        *self == GPTPartitionEntry::empty()
    }

    /// Returns `true` if the partition entry is not used (type GUID == `[0; 16]`)
    pub fn is_unused(&self) -> bool {
        self.partition_type_guid == [0; 16]
    }

    /// Returns `true` if the partition entry is used (type GUID != `[0; 16]`)
    pub fn is_used(&self) -> bool {
        !self.is_unused()
    }

    /// Returns `true` if this is a Microsoft Reserved Partition.
    pub fn is_microsoft_reserved(&self) -> bool {
        self.partition_type_guid == MICROSOFT_RESERVED_TYPE_GUID
    }

    /// Returns the number of sectors in the partition, or `None` if the `ending_lba` is lesser
    /// than the `starting_lba`.
    pub fn size(&self) -> Option<u64> {
        if self.ending_lba < self.starting_lba {
            return None;
        }

        Some(self.ending_lba - self.starting_lba + 1)
    }

    /// Express the partition in sectors `ratio` times smaller. The partition covers exactly the
    /// same bytes.
    ///
    /// An entry that starts at 0 keeps ending at 0 so an unused slot stays all zeroes.
    pub fn rescale(&self, ratio: u64) -> GPTPartitionEntry {
        let starting_lba = self.starting_lba * ratio;
        let ending_lba = if starting_lba == 0 {
            0
        } else {
            (self.ending_lba + 1) * ratio - 1
        };

        GPTPartitionEntry {
            starting_lba,
            ending_lba,
            ..self.clone()
        }
    }
}

/// Split a partition table into its entries.
///
/// # Errors
///
/// The length of `data` must be a multiple of 128.
pub fn decode_partition_table(data: &[u8]) -> Result<Vec<GPTPartitionEntry>> {
    if data.len() % PARTITION_ENTRY_SIZE != 0 {
        return Err(Error::InvalidPartitionTableLength(data.len()));
    }

    data.chunks(PARTITION_ENTRY_SIZE)
        .map(GPTPartitionEntry::decode)
        .collect()
}

/// Concatenate the encoded entries of a partition table.
pub fn encode_partition_table(partitions: &[GPTPartitionEntry]) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(partitions.len() * PARTITION_ENTRY_SIZE);
    for x in partitions {
        data.extend(x.encode()?);
    }

    Ok(data)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{header, partition};

    #[test]
    fn crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xcbf4_3926);
        assert_eq!(crc32(b""), 0);
    }

    #[test]
    fn header_round_trip_keeps_filler() {
        let mut h = header(1, 99, 2, 6, 93, [0xab; 16]);
        h.filler = vec![0; SOURCE_SECTOR_SIZE as usize - HEADER_SIZE];
        h.update_crc32_checksum();

        let data = h.encode().unwrap();
        assert_eq!(data.len(), SOURCE_SECTOR_SIZE as usize);
        assert_eq!(&data[..8], b"EFI PART");
        assert_eq!(&data[8..12], &[0x00, 0x00, 0x01, 0x00]);
        assert_eq!(&data[12..16], &92_u32.to_le_bytes());
        assert_eq!(&data[24..32], &1_u64.to_le_bytes());
        assert_eq!(&data[32..40], &99_u64.to_le_bytes());
        assert_eq!(&data[72..80], &2_u64.to_le_bytes());
        assert_eq!(&data[80..84], &128_u32.to_le_bytes());

        let decoded = GPTHeader::decode(&data).unwrap();
        assert_eq!(decoded, h);
        assert_eq!(decoded.encode().unwrap(), data);
        assert!(decoded.check().is_ok());
    }

    #[test]
    fn header_too_short() {
        assert!(matches!(
            GPTHeader::decode(&[0; 91]),
            Err(Error::HeaderTooShort(91))
        ));
        assert!(GPTHeader::decode(&[0; 92]).is_ok());
    }

    #[test]
    fn checksum_ignores_filler() {
        let mut h = header(1, 99, 2, 6, 93, [1; 16]);
        h.update_crc32_checksum();
        let sum = h.crc32_checksum;

        h.filler = vec![0; 420];
        assert_eq!(h.generate_crc32_checksum(), sum);

        // independent computation: 92 bytes with the checksum field zeroed
        let mut data = h.encode().unwrap();
        data.truncate(HEADER_SIZE);
        data[16..20].copy_from_slice(&[0; 4]);
        assert_eq!(crc32(&data), sum);
    }

    #[test]
    fn check_detects_each_field() {
        let mut h = header(1, 99, 2, 6, 93, [1; 16]);
        h.filler = vec![0; 420];
        h.update_crc32_checksum();
        assert!(h.check().is_ok());

        let mut bad = h.clone();
        bad.first_usable_lba += 1;
        assert!(matches!(bad.check(), Err(Error::InvalidChecksum(_, _))));

        let mut bad = h.clone();
        bad.signature = *b"EFI BART";
        bad.update_crc32_checksum();
        assert!(matches!(bad.check(), Err(Error::InvalidSignature)));

        let mut bad = h.clone();
        bad.revision = [0, 0, 2, 0];
        bad.update_crc32_checksum();
        assert!(matches!(bad.check(), Err(Error::InvalidRevision)));

        let mut bad = h.clone();
        bad.header_size = 96;
        bad.update_crc32_checksum();
        assert!(matches!(bad.check(), Err(Error::InvalidHeaderSize(96))));

        let mut bad = h.clone();
        bad.reserved = [0, 0, 0, 1];
        bad.update_crc32_checksum();
        assert!(matches!(bad.check(), Err(Error::InvalidReserved)));

        let mut bad = h.clone();
        bad.number_of_partition_entries = 64;
        bad.update_crc32_checksum();
        assert!(matches!(
            bad.check(),
            Err(Error::InvalidPartitionEntryCount(64))
        ));

        let mut bad = h.clone();
        bad.size_of_partition_entry = 256;
        bad.update_crc32_checksum();
        assert!(matches!(
            bad.check(),
            Err(Error::InvalidPartitionEntrySize(256))
        ));

        let mut bad = h;
        bad.filler[419] = 1;
        assert!(matches!(bad.check(), Err(Error::NonZeroFiller)));
    }

    #[test]
    fn partition_entry_round_trip() {
        let mut p = partition(1, 40, 100);
        p.attribute_bits = 0x8000_0000_0000_0001;
        let data = p.encode().unwrap();
        assert_eq!(data.len(), PARTITION_ENTRY_SIZE);
        assert_eq!(&data[32..40], &40_u64.to_le_bytes());
        assert_eq!(&data[40..48], &100_u64.to_le_bytes());
        assert_eq!(&data[56..58], &[b'p', 0]);
        assert_eq!(GPTPartitionEntry::decode(&data).unwrap(), p);
    }

    #[test]
    fn partition_name_keeps_bytes_after_nul() {
        let mut data = partition(1, 40, 100).encode().unwrap();
        // garbage after the terminating NUL of the name
        data[120] = 0x41;
        let p = GPTPartitionEntry::decode(&data).unwrap();
        assert_eq!(p.partition_name.to_string(), "part1");
        assert_eq!(p.encode().unwrap(), data);
    }

    #[test]
    fn partition_name_display() {
        let name: PartitionName = "A Robot Named Fight!".into();
        assert_eq!(name.to_string(), "A Robot Named Fight!");
        assert!(!name.is_empty());
        assert!(PartitionName::from("").is_empty());

        let units = name.as_units();
        assert_eq!(units[0], u16::from(b'A'));
        assert_eq!(units[19], u16::from(b'!'));
        assert!(units[20..].iter().all(|&x| x == 0));

        let long = "x".repeat(40);
        assert_eq!(PartitionName::from(long.as_str()).to_string(), "x".repeat(36));
    }

    #[test]
    fn zero_entry() {
        let zero = GPTPartitionEntry::empty();
        assert!(zero.is_zero());
        assert!(zero.is_unused());
        assert_eq!(zero.encode().unwrap(), vec![0; PARTITION_ENTRY_SIZE]);

        let mut p = GPTPartitionEntry::empty();
        p.attribute_bits = 1;
        assert!(!p.is_zero());
        assert!(p.is_unused());
    }

    #[test]
    fn rescale_law() {
        let p = partition(1, 40, 100);
        let r = p.rescale(SECTOR_RATIO);
        assert_eq!(r.starting_lba, 320);
        assert_eq!(r.ending_lba, 807);
        assert_eq!(r.size(), p.size().map(|x| x * SECTOR_RATIO));
        assert_eq!(r.partition_type_guid, p.partition_type_guid);
        assert_eq!(r.partition_name, p.partition_name);

        let single = partition(2, 7, 7).rescale(SECTOR_RATIO);
        assert_eq!((single.starting_lba, single.ending_lba), (56, 63));

        assert_eq!(GPTPartitionEntry::empty().rescale(SECTOR_RATIO), GPTPartitionEntry::empty());

        // an entry starting at 0 stays with both bounds at 0
        let mut odd = GPTPartitionEntry::empty();
        odd.ending_lba = 5;
        odd.attribute_bits = 4;
        let r = odd.rescale(SECTOR_RATIO);
        assert_eq!((r.starting_lba, r.ending_lba), (0, 0));
        assert_eq!(r.attribute_bits, 4);
    }

    #[test]
    fn partition_table_codec() {
        let mut partitions = vec![GPTPartitionEntry::empty(); 4];
        partitions[1] = partition(2, 10, 20);
        let data = encode_partition_table(&partitions).unwrap();
        assert_eq!(data.len(), 4 * PARTITION_ENTRY_SIZE);
        assert_eq!(decode_partition_table(&data).unwrap(), partitions);

        assert!(matches!(
            decode_partition_table(&data[..200]),
            Err(Error::InvalidPartitionTableLength(200))
        ));
        assert!(decode_partition_table(&[]).unwrap().is_empty());
    }

    #[test]
    fn partition_entry_array_crc32() {
        let mut partitions = vec![GPTPartitionEntry::empty(); 128];
        partitions[0] = partition(1, 40, 100);
        let mut h = header(1, 99, 2, 6, 93, [1; 16]);
        h.update_partition_entry_array_crc32(&partitions).unwrap();
        assert_eq!(
            h.partition_entry_array_crc32,
            crc32(&encode_partition_table(&partitions).unwrap())
        );
        assert_ne!(h.partition_entry_array_crc32, 0);
    }

    #[test]
    fn microsoft_reserved() {
        let mut p = partition(1, 40, 100);
        assert!(!p.is_microsoft_reserved());
        p.partition_type_guid = MICROSOFT_RESERVED_TYPE_GUID;
        assert!(p.is_microsoft_reserved());
    }
}

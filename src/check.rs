use crate::{
    crc32, decode_partition_table, Device, Error, GPTHeader, GPTPartitionEntry, Result,
    SOURCE_SECTOR_SIZE,
};
use log::{debug, info};
use std::fmt;

/// Number of 4096 bytes sectors needed to hold the two copies of the 512 bytes sector partition
/// table.
pub const GAP_LBAS: u64 = 8;

/// Which one of the two headers of a GPT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCopy {
    /// The header at LBA 1.
    Primary,
    /// The header at the end of the disk.
    Backup,
}

impl fmt::Display for HeaderCopy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeaderCopy::Primary => write!(f, "primary"),
            HeaderCopy::Backup => write!(f, "backup"),
        }
    }
}

fn read_header<D: ?Sized>(device: &mut D, lba: u64, copy: HeaderCopy) -> Result<GPTHeader>
where
    D: Device,
{
    let offset = lba
        .checked_mul(SOURCE_SECTOR_SIZE)
        .ok_or_else(|| {
            in_header(
                copy,
                Error::Layout {
                    what: "header LBA is beyond the addressable bytes",
                    left: lba,
                    right: u64::MAX / SOURCE_SECTOR_SIZE,
                },
            )
        })?;
    let data = device.read_at(offset, SOURCE_SECTOR_SIZE as usize)?;
    let header = GPTHeader::decode(&data).map_err(|err| in_header(copy, err))?;
    debug!("{} header: {}", copy, header);
    header.check().map_err(|err| in_header(copy, err))?;

    Ok(header)
}

fn in_header(copy: HeaderCopy, err: Error) -> Error {
    Error::InvalidHeader(copy, Box::new(err))
}

fn expect_eq<T>(field: &'static str, expected: T, found: T) -> Result<()>
where
    T: PartialEq + fmt::Debug,
{
    if expected != found {
        return Err(Error::Mismatch {
            field,
            expected: format!("{:?}", expected),
            found: format!("{:?}", found),
        });
    }

    Ok(())
}

fn expect_le(what: &'static str, left: u64, right: u64) -> Result<()> {
    if left > right {
        return Err(Error::Layout { what, left, right });
    }

    Ok(())
}

/// The sector following `count` sectors starting at `lba`, as long as it is addressable.
fn lba_after(what: &'static str, lba: u64, count: u64) -> Result<u64> {
    lba.checked_add(count).ok_or(Error::Layout {
        what,
        left: lba,
        right: u64::MAX - count,
    })
}

/// Every field but the locations and the header's own checksum must be the same on both
/// headers.
fn check_agreement(primary: &GPTHeader, backup: &GPTHeader) -> Result<()> {
    expect_eq("signature", primary.signature, backup.signature)?;
    expect_eq("revision", primary.revision, backup.revision)?;
    expect_eq("header size", primary.header_size, backup.header_size)?;
    expect_eq("reserved", primary.reserved, backup.reserved)?;
    expect_eq(
        "first usable LBA",
        primary.first_usable_lba,
        backup.first_usable_lba,
    )?;
    expect_eq(
        "last usable LBA",
        primary.last_usable_lba,
        backup.last_usable_lba,
    )?;
    expect_eq("disk GUID", primary.disk_guid, backup.disk_guid)?;
    expect_eq(
        "number of partition entries",
        primary.number_of_partition_entries,
        backup.number_of_partition_entries,
    )?;
    expect_eq(
        "size of partition entry",
        primary.size_of_partition_entry,
        backup.size_of_partition_entry,
    )?;
    expect_eq(
        "partition entry array CRC32",
        primary.partition_entry_array_crc32,
        backup.partition_entry_array_crc32,
    )?;

    Ok(())
}

/// A primary and a backup GPT (4096 bytes sectors) that have been checked against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GPTPair {
    /// The header at LBA 1.
    pub primary: GPTHeader,
    /// The header at the LBA `primary.backup_lba`.
    pub backup: GPTHeader,
    /// The partition entries (identical on both tables).
    pub partitions: Vec<GPTPartitionEntry>,
    /// Size of the disk in 4096 bytes sectors.
    pub disk_lbas: u64,
}

impl GPTPair {
    /// LBA of the primary header.
    pub fn primary_header_lba(&self) -> u64 {
        self.primary.primary_lba
    }

    /// LBA of the primary partition table.
    pub fn primary_partitions_lba(&self) -> u64 {
        self.primary.partition_entry_lba
    }

    /// LBA of the backup header.
    pub fn backup_header_lba(&self) -> u64 {
        self.backup.primary_lba
    }

    /// LBA of the backup partition table.
    pub fn backup_partitions_lba(&self) -> u64 {
        self.backup.partition_entry_lba
    }

    /// Size (in bytes) of a partition table.
    pub fn partitions_bytes(&self) -> u64 {
        self.primary.partition_table_bytes()
    }

    /// Number of sectors occupied by a partition table.
    pub fn partitions_lbas(&self) -> u64 {
        self.primary.partition_table_lbas(SOURCE_SECTOR_SIZE)
    }

    /// The unused areas between the GPT structures, in the order they are considered.
    pub fn natural_gaps(&self) -> [Gap; 5] {
        let table_lbas = self.partitions_lbas();
        let natural = |first, after_last| Gap {
            kind: GapKind::Natural,
            first,
            after_last,
        };

        [
            natural(
                self.primary_header_lba().saturating_add(1),
                self.primary_partitions_lba(),
            ),
            natural(
                self.primary_partitions_lba().saturating_add(table_lbas),
                self.primary.first_usable_lba,
            ),
            natural(
                self.primary.last_usable_lba.saturating_add(1),
                self.backup_partitions_lba(),
            ),
            natural(
                self.backup_partitions_lba().saturating_add(table_lbas),
                self.backup_header_lba(),
            ),
            natural(self.backup_header_lba().saturating_add(1), self.disk_lbas),
        ]
    }

    /// The smallest range `[first, after_last)` covering all the partitions, `None` if there is
    /// no partition.
    pub fn partition_extents(&self) -> Option<(u64, u64)> {
        self.partitions
            .iter()
            .filter(|x| !x.is_zero())
            .map(|x| (x.starting_lba, x.ending_lba.saturating_add(1)))
            .fold(None, |acc, (first, after_last)| match acc {
                None => Some((first, after_last)),
                Some((a, b)) => Some((a.min(first), b.max(after_last))),
            })
    }

    /// Find a gap of at least 8 sectors for the partition tables of the 512 bytes sector GPT.
    ///
    /// The unused areas between the GPT structures come first (see `natural_gaps`), then the
    /// usable space before the first partition and finally the usable space after the last
    /// partition. The first one that is big enough wins.
    pub fn find_gap(&self) -> Option<Gap> {
        info!("Looking for a {} 4096-LBA hole...", GAP_LBAS);
        for gap in self.natural_gaps().iter() {
            if gap.is_large_enough() {
                info!("Found gap of {} 4096-LBAs at {}", gap.len(), gap);
                return Some(*gap);
            }
            debug!("Ignoring gap of {} 4096-LBAs at {}", gap.len(), gap);
        }

        info!("No big enough gap found between GPT metadata and usable space");
        info!("Checking used partition extents...");
        for (i, p) in self.partitions.iter().enumerate().filter(|(_, x)| !x.is_zero()) {
            debug!(
                "Partition #{} at 4096-LBAs: [{}, {})",
                i + 1,
                p.starting_lba,
                p.ending_lba.saturating_add(1)
            );
            if p.is_microsoft_reserved() {
                info!(
                    "Partition #{} is a Microsoft Reserved Partition (MSR). You can shrink it to \
                    make space if it is the first partition",
                    i + 1
                );
            }
        }

        let after_last_usable_lba = self.primary.last_usable_lba.saturating_add(1);
        let (partitions_first, partitions_after_last) = self
            .partition_extents()
            .unwrap_or((after_last_usable_lba, after_last_usable_lba));
        debug!(
            "Overall partition 4096-LBA extents: [{}, {})",
            partitions_first, partitions_after_last
        );

        let candidates = [
            Gap {
                kind: GapKind::BeforeFirst,
                first: self.primary.first_usable_lba,
                after_last: partitions_first,
            },
            Gap {
                kind: GapKind::AfterLast,
                first: partitions_after_last,
                after_last: after_last_usable_lba,
            },
        ];
        for gap in candidates.iter() {
            if gap.is_large_enough() {
                info!("Found {} gap of {} 4096-LBAs at {}", gap.kind, gap.len(), gap);
                return Some(*gap);
            }
            debug!("Ignoring {} gap of {} 4096-LBAs at {}", gap.kind, gap.len(), gap);
        }

        info!("No suitable gap found");
        None
    }
}

/// Where the gap comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapKind {
    /// Unused space between the GPT structures. It can be used as is.
    Natural,
    /// Usable space before the first partition. The first usable LBA must be moved after it.
    BeforeFirst,
    /// Usable space after the last partition. The last usable LBA must be moved before it.
    AfterLast,
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GapKind::Natural => write!(f, "natural"),
            GapKind::BeforeFirst => write!(f, "before_first"),
            GapKind::AfterLast => write!(f, "after_last"),
        }
    }
}

/// A range `[first, after_last)` of 4096 bytes sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Where the gap comes from.
    pub kind: GapKind,
    /// First sector of the gap.
    pub first: u64,
    /// The sector following the last sector of the gap.
    pub after_last: u64,
}

impl Gap {
    /// Number of sectors in the gap.
    pub fn len(&self) -> u64 {
        self.after_last.saturating_sub(self.first)
    }

    /// Returns `true` if the gap has no sector.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the gap can hold the two copies of the 512 bytes sector partition table.
    pub fn is_large_enough(&self) -> bool {
        self.len() >= GAP_LBAS
    }

    /// The exact 8 sectors taken out of the usable space: the beginning of a `BeforeFirst` gap,
    /// the end of an `AfterLast` gap. A `Natural` gap is returned as is.
    pub fn reserved(&self) -> Gap {
        match self.kind {
            GapKind::Natural => *self,
            GapKind::BeforeFirst => Gap {
                after_last: self.first + GAP_LBAS,
                ..*self
            },
            GapKind::AfterLast => Gap {
                first: self.after_last - GAP_LBAS,
                ..*self
            },
        }
    }
}

impl fmt::Display for Gap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}, {})", self.first, self.after_last)
    }
}

/// A checked GPT and the gap where the 512 bytes sector partition tables will go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// The checked GPT.
    pub gpt: GPTPair,
    /// The gap found by `GPTPair::find_gap`.
    pub gap: Gap,
}

/// Read and check the primary and the backup GPT (4096 bytes sectors) of a device.
///
/// Nothing is ever fixed: the first inconsistency found is returned as an error.
pub fn validate<D: ?Sized>(device: &mut D) -> Result<GPTPair>
where
    D: Device,
{
    use self::HeaderCopy::*;

    let primary = read_header(device, 1, Primary)?;
    let table_bytes = primary.partition_table_bytes();
    let table_lbas = primary.partition_table_lbas(SOURCE_SECTOR_SIZE);
    let disk_bytes = device.size()?;
    let disk_lbas = disk_bytes / SOURCE_SECTOR_SIZE;
    (|| {
        expect_eq("current LBA", 1, primary.primary_lba)?;
        expect_le(
            "partition table must be after the header",
            lba_after("current LBA overflows", primary.primary_lba, 1)?,
            primary.partition_entry_lba,
        )?;
        expect_le(
            "partition table must end before the first usable LBA",
            lba_after(
                "partition table LBA overflows",
                primary.partition_entry_lba,
                table_lbas,
            )?,
            primary.first_usable_lba,
        )?;
        let after_usable = lba_after("last usable LBA overflows", primary.last_usable_lba, 1)?;
        expect_le(
            "first usable LBA must not be after the last usable LBA",
            primary.first_usable_lba,
            after_usable,
        )?;
        expect_le(
            "last usable LBA must be before the backup header",
            after_usable,
            primary.backup_lba,
        )?;
        expect_le(
            "backup header must be within the disk",
            lba_after("backup LBA overflows", primary.backup_lba, 1)?,
            disk_lbas,
        )
    })()
    .map_err(|err| in_header(Primary, err))?;
    info!("Primary header checks out");

    let backup = read_header(device, primary.backup_lba, Backup)?;
    (|| {
        expect_eq("current LBA", primary.backup_lba, backup.primary_lba)?;
        expect_eq("backup LBA", 1, backup.backup_lba)?;
        check_agreement(&primary, &backup)?;
        expect_le(
            "last usable LBA must be before the partition table",
            lba_after("last usable LBA overflows", backup.last_usable_lba, 1)?,
            backup.partition_entry_lba,
        )?;
        expect_le(
            "partition table must end before the header",
            lba_after(
                "partition table LBA overflows",
                backup.partition_entry_lba,
                table_lbas,
            )?,
            backup.primary_lba,
        )
    })()
    .map_err(|err| in_header(Backup, err))?;
    info!("Backup header checks out");

    // every region is now ordered and within the disk
    info!("Full disk bytes: [0, {})", disk_bytes);
    info!("Full disk 4096-LBAs: [0, {})", disk_lbas);
    info!(
        "Primary header 4096-LBAs: [{}, {})",
        primary.primary_lba,
        primary.primary_lba + 1
    );
    info!(
        "Primary partition table 4096-LBAs: [{}, {})",
        primary.partition_entry_lba,
        primary.partition_entry_lba + table_lbas
    );
    info!(
        "Usable 4096-LBAs: [{}, {})",
        primary.first_usable_lba,
        primary.last_usable_lba + 1
    );
    info!(
        "Backup partition table 4096-LBAs: [{}, {})",
        backup.partition_entry_lba,
        backup.partition_entry_lba + table_lbas
    );
    info!(
        "Backup header 4096-LBAs: [{}, {})",
        backup.primary_lba,
        backup.primary_lba + 1
    );

    let data = device.read_at(
        primary.partition_entry_lba * SOURCE_SECTOR_SIZE,
        table_bytes as usize,
    )?;
    let backup_data = device.read_at(
        backup.partition_entry_lba * SOURCE_SECTOR_SIZE,
        table_bytes as usize,
    )?;
    if data != backup_data {
        return Err(Error::PartitionTablesDiffer);
    }

    let sum = crc32(&data);
    if primary.partition_entry_array_crc32 != sum {
        return Err(in_header(
            Primary,
            Error::InvalidPartitionEntryArrayChecksum(primary.partition_entry_array_crc32, sum),
        ));
    }

    let partitions = decode_partition_table(&data)?;
    if partitions != decode_partition_table(&backup_data)? {
        return Err(Error::PartitionTablesDiffer);
    }

    for (i, p) in partitions.iter().enumerate().filter(|(_, x)| !x.is_zero()) {
        if p.starting_lba < primary.first_usable_lba
            || p.ending_lba < p.starting_lba
            || p.ending_lba > primary.last_usable_lba
        {
            return Err(Error::PartitionOutOfBounds {
                index: i as u32 + 1,
                starting_lba: p.starting_lba,
                ending_lba: p.ending_lba,
                first_usable_lba: primary.first_usable_lba,
                last_usable_lba: primary.last_usable_lba,
            });
        }
    }
    info!("Partition tables check out");

    Ok(GPTPair {
        primary,
        backup,
        partitions,
        disk_lbas,
    })
}

/// Validate the GPT of a device and look for a gap. Returns `None` if there is no space
/// available.
pub fn check<D: ?Sized>(device: &mut D) -> Result<Option<CheckResult>>
where
    D: Device,
{
    let gpt = validate(device)?;

    Ok(gpt.find_gap().map(|gap| CheckResult { gpt, gap }))
}

use crate::check::{check, validate, CheckResult, GPTPair, Gap, GapKind, HeaderCopy, GAP_LBAS};
use crate::{
    crc32, decode_partition_table, encode_partition_table, Device, Error, GPTHeader,
    GPTPartitionEntry, Result, HEADER_SIZE, SECTOR_RATIO, SOURCE_SECTOR_SIZE, TARGET_SECTOR_SIZE,
};
use log::{debug, info, warn};
use std::fmt;

/// Whether the writes are really done or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Compute everything, write nothing.
    DryRun,
    /// Write to the device.
    Commit,
}

impl WriteMode {
    /// Returns `true` if nothing gets written.
    pub fn is_dry_run(self) -> bool {
        self == WriteMode::DryRun
    }
}

/// A write to the device, performed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedWrite {
    /// What is being written.
    pub label: &'static str,
    /// Absolute byte offset.
    pub offset: u64,
    /// Number of bytes.
    pub len: usize,
}

impl fmt::Display for PlannedWrite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}: {} bytes at byte {}",
            self.label, self.len, self.offset
        )
    }
}

/// Writes to a device (unless in dry run mode) and keeps track of every write in order.
pub struct Journal<'a, D: ?Sized> {
    device: &'a mut D,
    mode: WriteMode,
    writes: Vec<PlannedWrite>,
}

impl<'a, D: ?Sized> Journal<'a, D>
where
    D: Device,
{
    /// Make a new journal for a device.
    pub fn new(device: &'a mut D, mode: WriteMode) -> Self {
        Journal {
            device,
            mode,
            writes: Vec::new(),
        }
    }

    /// The device. Reading from it is always fine.
    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// The write mode of the journal.
    pub fn mode(&self) -> WriteMode {
        self.mode
    }

    /// Every write recorded so far.
    pub fn writes(&self) -> &[PlannedWrite] {
        &self.writes
    }

    /// Write `data` at `offset`, or only record it in dry run mode.
    pub fn write(&mut self, label: &'static str, offset: u64, data: &[u8]) -> Result<()> {
        let write = PlannedWrite {
            label,
            offset,
            len: data.len(),
        };

        if self.mode.is_dry_run() {
            info!("Would write {}", write);
        } else {
            info!("Writing {}", write);
            self.device.write_at(offset, data)?;
        }
        self.writes.push(write);

        Ok(())
    }
}

/// A change of the usable range of the 4096 bytes sector GPT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryChange {
    /// The header field that changed.
    pub field: &'static str,
    /// Value before.
    pub from: u64,
    /// Value after.
    pub to: u64,
}

impl fmt::Display for BoundaryChange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} from {} to {}", self.field, self.from, self.to)
    }
}

/// Make room for the gap if it is not a natural gap: the usable range of both 4096 bytes sector
/// headers is shrunk by 8 sectors and both headers are written back.
///
/// The returned result carries the updated headers and the exact 8 sectors of the gap.
pub fn ensure_gap<D: ?Sized>(
    journal: &mut Journal<D>,
    result: CheckResult,
) -> Result<(CheckResult, Option<BoundaryChange>)>
where
    D: Device,
{
    let CheckResult { gpt, gap } = result;
    let mut primary = gpt.primary.clone();
    let mut backup = gpt.backup.clone();

    let change = match gap.kind {
        GapKind::Natural => return Ok((CheckResult { gpt, gap }, None)),
        GapKind::BeforeFirst => {
            let change = BoundaryChange {
                field: "first usable LBA",
                from: primary.first_usable_lba,
                to: primary.first_usable_lba + GAP_LBAS,
            };
            primary.first_usable_lba = change.to;
            backup.first_usable_lba = change.to;
            change
        }
        GapKind::AfterLast => {
            let change = BoundaryChange {
                field: "last usable LBA",
                from: primary.last_usable_lba,
                to: primary.last_usable_lba - GAP_LBAS,
            };
            primary.last_usable_lba = change.to;
            backup.last_usable_lba = change.to;
            change
        }
    };
    info!("Changing {}", change);

    primary.update_crc32_checksum();
    backup.update_crc32_checksum();
    debug!("New primary header: {}", primary);
    debug!("New backup header: {}", backup);
    primary
        .check()
        .map_err(|err| Error::InvalidHeader(HeaderCopy::Primary, Box::new(err)))?;
    backup
        .check()
        .map_err(|err| Error::InvalidHeader(HeaderCopy::Backup, Box::new(err)))?;

    journal.write(
        "4096-LBA primary header",
        gpt.primary_header_lba() * SOURCE_SECTOR_SIZE,
        &primary.encode()?,
    )?;
    journal.write(
        "4096-LBA backup header",
        gpt.backup_header_lba() * SOURCE_SECTOR_SIZE,
        &backup.encode()?,
    )?;

    let gpt = if journal.mode().is_dry_run() {
        GPTPair {
            primary,
            backup,
            ..gpt
        }
    } else {
        let revalidated = validate(journal.device())?;
        if revalidated.primary != primary {
            return Err(Error::ReadBackMismatch(HeaderCopy::Primary));
        }
        if revalidated.backup != backup {
            return Err(Error::ReadBackMismatch(HeaderCopy::Backup));
        }
        revalidated
    };

    let gap = gap.reserved();
    debug!("{} gap reserved at 4096-LBAs {}", gap.kind, gap);

    Ok((CheckResult { gpt, gap }, Some(change)))
}

/// Express every partition entry in 512 bytes sectors.
pub fn rescale_partitions(partitions: &[GPTPartitionEntry]) -> Vec<GPTPartitionEntry> {
    partitions.iter().map(|x| x.rescale(SECTOR_RATIO)).collect()
}

/// Read the 4096 bytes sector partition table, rescale it and write it twice at the beginning of
/// the gap: the primary copy then the backup copy right after.
///
/// Returns the rescaled partitions and their encoded table.
pub fn inject_partition_tables<D: ?Sized>(
    journal: &mut Journal<D>,
    result: &CheckResult,
) -> Result<(Vec<GPTPartitionEntry>, Vec<u8>)>
where
    D: Device,
{
    let table_bytes = result.gpt.partitions_bytes();
    let data = journal.device().read_at(
        result.gpt.primary_partitions_lba() * SOURCE_SECTOR_SIZE,
        table_bytes as usize,
    )?;
    let partitions = rescale_partitions(&decode_partition_table(&data)?);

    info!("512-LBA partition table:");
    for (i, p) in partitions.iter().enumerate().filter(|(_, x)| !x.is_zero()) {
        info!(
            "Partition #{} at 512-LBAs: [{}, {})",
            i + 1,
            p.starting_lba,
            p.ending_lba + 1
        );
    }

    let table = encode_partition_table(&partitions)?;
    let offset = result.gap.first * SOURCE_SECTOR_SIZE;
    journal.write("512-LBA primary partition table", offset, &table)?;
    journal.write(
        "512-LBA backup partition table",
        offset + table_bytes,
        &table,
    )?;

    Ok((partitions, table))
}

/// Make a 512 bytes sector header out of a 4096 bytes sector header: every field is kept except
/// the locations, the usable range (same bytes, in 512 bytes sectors), the partition entry
/// array's checksum and the filler (zeroes up to 512 bytes). The header's checksum is
/// recomputed.
///
/// # Errors
///
/// The usable range must still be addressable in 512 bytes sectors.
pub fn rescale_header(
    header: &GPTHeader,
    primary_lba: u64,
    backup_lba: u64,
    partition_entry_lba: u64,
    partition_entry_array_crc32: u32,
) -> Result<GPTHeader> {
    let rescale = |what, lba: u64| {
        lba.checked_mul(SECTOR_RATIO).ok_or(Error::Layout {
            what,
            left: lba,
            right: u64::MAX / SECTOR_RATIO,
        })
    };
    let after_last_usable_lba = header
        .last_usable_lba
        .checked_add(1)
        .ok_or(Error::Layout {
            what: "last usable LBA overflows",
            left: header.last_usable_lba,
            right: u64::MAX - 1,
        })?;

    let mut rescaled = GPTHeader {
        crc32_checksum: 0,
        primary_lba,
        backup_lba,
        first_usable_lba: rescale("first usable LBA overflows", header.first_usable_lba)?,
        last_usable_lba: rescale("last usable LBA overflows", after_last_usable_lba)? - 1,
        partition_entry_lba,
        partition_entry_array_crc32,
        filler: vec![0; TARGET_SECTOR_SIZE as usize - HEADER_SIZE],
        ..header.clone()
    };
    rescaled.update_crc32_checksum();

    Ok(rescaled)
}

/// Write the 512 bytes sector headers at LBA 1 (byte 512) and LBA 2 (byte 1024). The primary
/// header points to the first copy of the partition table in the gap, the backup header to the
/// second copy 4 4096-LBAs (32 512-LBAs) further.
///
/// Returns the primary and the backup headers written.
pub fn inject_headers<D: ?Sized>(
    journal: &mut Journal<D>,
    result: &CheckResult,
    partition_entry_array_crc32: u32,
) -> Result<(GPTHeader, GPTHeader)>
where
    D: Device,
{
    let gap_first = result.gap.first;
    let table_lbas = result.gpt.partitions_lbas();

    let primary = rescale_header(
        &result.gpt.primary,
        result.gpt.primary.primary_lba,
        2,
        gap_first * SECTOR_RATIO,
        partition_entry_array_crc32,
    )?;
    info!("512-LBA GPT primary header: {}", primary);

    let backup = rescale_header(
        &result.gpt.backup,
        2,
        1,
        (gap_first + table_lbas) * SECTOR_RATIO,
        partition_entry_array_crc32,
    )?;
    info!("512-LBA GPT backup header: {}", backup);

    journal.write(
        "512-LBA primary header",
        TARGET_SECTOR_SIZE,
        &primary.encode()?,
    )?;
    journal.write(
        "512-LBA backup header",
        2 * TARGET_SECTOR_SIZE,
        &backup.encode()?,
    )?;

    Ok((primary, backup))
}

/// What has been (or would have been) done to a disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Whether the writes were performed.
    pub mode: WriteMode,
    /// The exact 8 sectors (4096 bytes) used for the 512 bytes sector partition tables.
    pub gap: Gap,
    /// The change made to the 4096 bytes sector usable range, if any.
    pub boundary_change: Option<BoundaryChange>,
    /// The 4096 bytes sector partition table.
    pub partitions: Vec<GPTPartitionEntry>,
    /// The 512 bytes sector partition table.
    pub rescaled_partitions: Vec<GPTPartitionEntry>,
    /// The 512 bytes sector primary header.
    pub primary_header: GPTHeader,
    /// The 512 bytes sector backup header.
    pub backup_header: GPTHeader,
    /// Every write, in the order they were issued.
    pub writes: Vec<PlannedWrite>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Gap ({}): 4096-LBAs {}", self.gap.kind, self.gap)?;
        if let Some(change) = self.boundary_change {
            writeln!(f, "Changed {}", change)?;
        }
        writeln!(f, "512-LBA GPT primary header: {}", self.primary_header)?;
        writeln!(f, "512-LBA GPT backup header: {}", self.backup_header)?;
        if self.mode.is_dry_run() {
            writeln!(f, "Writes (dry run, nothing has been written):")?;
        } else {
            writeln!(f, "Writes:")?;
        }
        for write in self.writes.iter() {
            writeln!(f, "  {}", write)?;
        }

        Ok(())
    }
}

/// Check a disk and inject a 512 bytes sector GPT in it.
///
/// Returns `None` when there is no space available for the new partition tables: nothing has
/// been written in that case.
///
/// # Examples
///
/// Basic usage:
/// ```
/// let mut cur = std::io::Cursor::new(vec![0; 100 * 4096]);
///
/// // there is no GPT on this disk
/// assert!(gpt4096to512::convert(&mut cur, gpt4096to512::WriteMode::DryRun).is_err());
/// ```
pub fn convert<D: ?Sized>(device: &mut D, mode: WriteMode) -> Result<Option<Report>>
where
    D: Device,
{
    let result = match check(device)? {
        Some(result) => result,
        None => return Ok(None),
    };

    if mode.is_dry_run() {
        warn!("Dry run: nothing will be written to the device");
    }

    let mut journal = Journal::new(device, mode);
    let (result, boundary_change) = ensure_gap(&mut journal, result)?;
    let (rescaled_partitions, table) = inject_partition_tables(&mut journal, &result)?;
    let (primary_header, backup_header) = inject_headers(&mut journal, &result, crc32(&table))?;
    let writes = journal.writes().to_vec();

    Ok(Some(Report {
        mode,
        gap: result.gap,
        boundary_change,
        partitions: result.gpt.partitions,
        rescaled_partitions,
        primary_header,
        backup_header,
        writes,
    }))
}

//! Builders for in-memory 4096 bytes sector disks.

use crate::{
    encode_partition_table, Device, GPTHeader, GPTPartitionEntry, HEADER_SIZE,
    NUMBER_OF_PARTITION_ENTRIES, SOURCE_SECTOR_SIZE,
};
use std::io;

pub const DISK_GUID: [u8; 16] = [
    0x5c, 0x1f, 0x2a, 0x90, 0x3e, 0x47, 0x4b, 0x11, 0x9a, 0x01, 0x6d, 0x3b, 0xc4, 0x88, 0x02, 0x7f,
];

/// A header with a null CRC32 checksum and no filler.
pub fn header(
    primary_lba: u64,
    backup_lba: u64,
    partition_entry_lba: u64,
    first_usable_lba: u64,
    last_usable_lba: u64,
    disk_guid: [u8; 16],
) -> GPTHeader {
    GPTHeader {
        signature: *b"EFI PART",
        revision: [0x00, 0x00, 0x01, 0x00],
        header_size: 92,
        crc32_checksum: 0,
        reserved: [0; 4],
        primary_lba,
        backup_lba,
        first_usable_lba,
        last_usable_lba,
        disk_guid,
        partition_entry_lba,
        number_of_partition_entries: 128,
        size_of_partition_entry: 128,
        partition_entry_array_crc32: 0,
        filler: Vec::new(),
    }
}

/// A used partition named after its number.
pub fn partition(number: u32, starting_lba: u64, ending_lba: u64) -> GPTPartitionEntry {
    GPTPartitionEntry {
        partition_type_guid: [0x11; 16],
        unique_partition_guid: [number as u8; 16],
        starting_lba,
        ending_lba,
        attribute_bits: 0,
        partition_name: format!("part{}", number).as_str().into(),
    }
}

type Tweak = Box<dyn Fn(&mut GPTHeader)>;

/// Makes a disk with a valid GPT (4096 bytes sectors). By default the primary table is at LBA 2,
/// the usable space starts right after it and ends right before the backup table which is right
/// before the backup header in the last sector of the disk.
///
/// Tweaks are applied after the partition entry array checksum and before the header checksum.
pub struct DiskBuilder {
    disk_lbas: u64,
    partition_entry_lba: u64,
    first_usable_lba: Option<u64>,
    last_usable_lba: Option<u64>,
    backup_lba: Option<u64>,
    backup_partition_entry_lba: Option<u64>,
    partitions: Vec<GPTPartitionEntry>,
    primary_tweaks: Vec<Tweak>,
    backup_tweaks: Vec<Tweak>,
}

impl DiskBuilder {
    pub fn new(disk_lbas: u64) -> DiskBuilder {
        DiskBuilder {
            disk_lbas,
            partition_entry_lba: 2,
            first_usable_lba: None,
            last_usable_lba: None,
            backup_lba: None,
            backup_partition_entry_lba: None,
            partitions: vec![GPTPartitionEntry::empty(); NUMBER_OF_PARTITION_ENTRIES as usize],
            primary_tweaks: Vec::new(),
            backup_tweaks: Vec::new(),
        }
    }

    pub fn partition_entry_lba(mut self, lba: u64) -> Self {
        self.partition_entry_lba = lba;
        self
    }

    pub fn first_usable_lba(mut self, lba: u64) -> Self {
        self.first_usable_lba = Some(lba);
        self
    }

    pub fn last_usable_lba(mut self, lba: u64) -> Self {
        self.last_usable_lba = Some(lba);
        self
    }

    pub fn backup_lba(mut self, lba: u64) -> Self {
        self.backup_lba = Some(lba);
        self
    }

    pub fn backup_partition_entry_lba(mut self, lba: u64) -> Self {
        self.backup_partition_entry_lba = Some(lba);
        self
    }

    /// Put `entry` at the partition number `number` (starting at 1).
    pub fn entry(mut self, number: u32, entry: GPTPartitionEntry) -> Self {
        self.partitions[number as usize - 1] = entry;
        self
    }

    pub fn partition(self, number: u32, starting_lba: u64, ending_lba: u64) -> Self {
        self.entry(number, partition(number, starting_lba, ending_lba))
    }

    /// Change the primary header before its checksum is computed.
    pub fn tweak_primary<F: Fn(&mut GPTHeader) + 'static>(mut self, f: F) -> Self {
        self.primary_tweaks.push(Box::new(f));
        self
    }

    /// Change the backup header before its checksum is computed.
    pub fn tweak_backup<F: Fn(&mut GPTHeader) + 'static>(mut self, f: F) -> Self {
        self.backup_tweaks.push(Box::new(f));
        self
    }

    pub fn tweak_both<F: Fn(&mut GPTHeader) + Clone + 'static>(self, f: F) -> Self {
        self.tweak_primary(f.clone()).tweak_backup(f)
    }

    pub fn build(self) -> io::Cursor<Vec<u8>> {
        let table_lbas = 4;
        let backup_lba = self.backup_lba.unwrap_or(self.disk_lbas - 1);
        let backup_partition_entry_lba = self
            .backup_partition_entry_lba
            .unwrap_or(backup_lba - table_lbas);
        let first_usable_lba = self
            .first_usable_lba
            .unwrap_or(self.partition_entry_lba + table_lbas);
        let last_usable_lba = self
            .last_usable_lba
            .unwrap_or(backup_partition_entry_lba - 1);

        let table = encode_partition_table(&self.partitions).unwrap();
        let filler = vec![0; SOURCE_SECTOR_SIZE as usize - HEADER_SIZE];

        let mut primary = header(
            1,
            backup_lba,
            self.partition_entry_lba,
            first_usable_lba,
            last_usable_lba,
            DISK_GUID,
        );
        primary.filler = filler.clone();
        primary
            .update_partition_entry_array_crc32(&self.partitions)
            .unwrap();
        for tweak in self.primary_tweaks.iter() {
            tweak(&mut primary);
        }
        primary.update_crc32_checksum();

        let mut backup = GPTHeader {
            primary_lba: backup_lba,
            backup_lba: 1,
            partition_entry_lba: backup_partition_entry_lba,
            filler,
            ..header(0, 0, 0, first_usable_lba, last_usable_lba, DISK_GUID)
        };
        backup
            .update_partition_entry_array_crc32(&self.partitions)
            .unwrap();
        for tweak in self.backup_tweaks.iter() {
            tweak(&mut backup);
        }
        backup.update_crc32_checksum();

        let mut cur = io::Cursor::new(vec![0; (self.disk_lbas * SOURCE_SECTOR_SIZE) as usize]);
        cur.write_at(SOURCE_SECTOR_SIZE, &primary.encode().unwrap())
            .unwrap();
        cur.write_at(self.partition_entry_lba * SOURCE_SECTOR_SIZE, &table)
            .unwrap();
        cur.write_at(
            backup_partition_entry_lba * SOURCE_SECTOR_SIZE,
            &table,
        )
        .unwrap();
        cur.write_at(backup_lba * SOURCE_SECTOR_SIZE, &backup.encode().unwrap())
            .unwrap();

        cur
    }
}

/// A cheap fingerprint of a whole disk image.
pub fn fingerprint(cur: &io::Cursor<Vec<u8>>) -> (usize, u32) {
    (cur.get_ref().len(), crate::crc32(cur.get_ref()))
}

use crate::display_bytes::DisplayBytes;
use crate::error::*;
use crate::table::Table;
use crate::types::PartitionTypeGUID;
use crate::uuid::UUID;
use gpt4096to512::{Report, SOURCE_SECTOR_SIZE};
use std::path::Path;

pub fn print(path: &Path, report: &Report, len: u64) -> Result<()> {
    let header = &report.primary_header;

    println!("Disk: {}", path.display());
    println!("Disk size: {} ({} bytes)", DisplayBytes::new(len), len);
    println!("Disk identifier: {}", header.disk_guid.display_uuid());
    println!(
        "Usable 512-LBAs: {}-{}",
        header.first_usable_lba, header.last_usable_lba
    );
    println!();

    let mut table = Table::new(9);
    table.add_cell("Device");
    table.add_cell_rtl("Start 4K");
    table.add_cell_rtl("End 4K");
    table.add_cell_rtl("Start 512");
    table.add_cell_rtl("End 512");
    table.add_cell_rtl("Size");
    table.add_cell("Type");
    table.add_cell("GUID");
    table.add_cell("Name");
    for (i, (p, r)) in report
        .partitions
        .iter()
        .zip(report.rescaled_partitions.iter())
        .enumerate()
        .filter(|(_, (p, _))| p.is_used())
    {
        table.add_cell(&format!("{}{}", path.display(), i + 1));
        table.add_cell_rtl(&p.starting_lba.to_string());
        table.add_cell_rtl(&p.ending_lba.to_string());
        table.add_cell_rtl(&r.starting_lba.to_string());
        table.add_cell_rtl(&r.ending_lba.to_string());
        table.add_cell_rtl(
            &DisplayBytes::new_padded(p.size().unwrap_or(0) * SOURCE_SECTOR_SIZE).to_string(),
        );
        table.add_cell(&p.partition_type_guid.display_partition_type_guid());
        table.add_cell(&p.unique_partition_guid.display_uuid());
        table.add_cell(&p.partition_name.to_string());
    }
    print!("{}", table);
    println!();
    print!("{}", report);

    Ok(())
}

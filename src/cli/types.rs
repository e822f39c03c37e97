use crate::uuid::{convert_str_to_array, UUID};
use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    pub static ref TYPE_MAP: HashMap<[u8; 16], &'static str> = {
        let mut m = HashMap::new();
        for (guid, name) in [
            ("C12A7328-F81F-11D2-BA4B-00A0C93EC93B", "EFI System partition"),
            ("21686148-6449-6E6F-744E-656564454649", "BIOS boot partition"),
            ("E3C9E316-0B5C-4DB8-817D-F92DF00215AE", "Microsoft Reserved Partition (MSR)"),
            ("EBD0A0A2-B9E5-4433-87C0-68B6B72699C7", "Basic data partition"),
            ("DE94BBA4-06D1-4D40-A16A-BFD50179D6AC", "Windows Recovery Environment"),
            ("0FC63DAF-8483-4772-8E79-3D69D8477DE4", "Linux filesystem data"),
            ("0657FD6D-A4AB-43C4-84E5-0933C84B4F4F", "Linux swap partition"),
            ("E6D6D379-F507-44C2-A23C-238F2A3DF928", "Linux Logical Volume Manager (LVM)"),
            ("A19D880F-05FC-4D3B-A006-743F0F84911E", "Linux RAID partition"),
            ("48465300-0000-11AA-AA11-00306543ECAC", "Apple HFS+ partition"),
            ("7C3457EF-0000-11AA-AA11-00306543ECAC", "Apple APFS container"),
        ]
        .iter()
        {
            m.insert(convert_str_to_array(guid).unwrap(), *name);
        }

        m
    };
}

pub trait PartitionTypeGUID {
    fn display_partition_type_guid(&self) -> String;
}

impl PartitionTypeGUID for [u8; 16] {
    fn display_partition_type_guid(&self) -> String {
        TYPE_MAP
            .get(self)
            .map(|x| x.to_string())
            .unwrap_or_else(|| self.display_uuid())
    }
}

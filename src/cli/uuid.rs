pub trait UUID {
    fn display_uuid(&self) -> String;
}

impl UUID for [u8; 16] {
    fn display_uuid(&self) -> String {
        let mut digits: Vec<_> = self.iter().collect();
        let mut uuid: Vec<String> = Vec::new();
        uuid.extend(digits.drain(..4).rev().map(|x| format!("{:02X}", x)));
        uuid.push("-".to_string());
        uuid.extend(digits.drain(..2).rev().map(|x| format!("{:02X}", x)));
        uuid.push("-".to_string());
        uuid.extend(digits.drain(..2).rev().map(|x| format!("{:02X}", x)));
        uuid.push("-".to_string());
        uuid.extend(digits.drain(..2).map(|x| format!("{:02X}", x)));
        uuid.push("-".to_string());
        uuid.extend(digits.drain(..).map(|x| format!("{:02X}", x)));

        uuid.into_iter().collect()
    }
}

/// Parse a textual GUID (mixed endian, as displayed) into its 16 bytes on disk.
pub fn convert_str_to_array(uuid: &str) -> Option<[u8; 16]> {
    let hex: Vec<char> = uuid.chars().filter(|&x| x != '-').collect();
    if hex.len() != 32 {
        return None;
    }

    let mut digits = hex
        .chunks(2)
        .map(|x| u8::from_str_radix(&x.iter().collect::<String>(), 16).ok())
        .collect::<Option<Vec<u8>>>()?;

    let mut arr = [0; 16];
    let mut reordered = Vec::with_capacity(16);
    reordered.extend(digits.drain(..4).rev());
    reordered.extend(digits.drain(..2).rev());
    reordered.extend(digits.drain(..2).rev());
    reordered.extend(digits.drain(..));
    arr.copy_from_slice(&reordered);

    Some(arr)
}

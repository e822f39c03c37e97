use std::fmt;

const BYTE_UNITS: &[&str] = &["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

pub struct DisplayBytes {
    unit: Option<&'static str>,
    value: f64,
    padded: bool,
}

impl fmt::Display for DisplayBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.unit {
            Some(unit) => write!(f, "{:.2} {}", self.value, unit),
            None if self.padded => write!(f, "{:.0} B ", self.value),
            None => write!(f, "{:.0} B", self.value),
        }
    }
}

impl DisplayBytes {
    fn with_padding(value: u64, padded: bool) -> Self {
        let bytes = value as f64;
        let (value, unit) = BYTE_UNITS
            .iter()
            .enumerate()
            .map(|(i, u)| (bytes / 1000_f64.powf(i as f64 + 1.0), Some(*u)))
            .take_while(|(x, _)| *x > 1.0)
            .last()
            .unwrap_or((bytes, None));

        Self {
            unit,
            value,
            padded,
        }
    }

    pub fn new(value: u64) -> Self {
        Self::with_padding(value, false)
    }

    /// Units are aligned with the other values of a column.
    pub fn new_padded(value: u64) -> Self {
        Self::with_padding(value, true)
    }
}

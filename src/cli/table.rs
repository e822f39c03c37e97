use ansi_term::Style;
use pad::{Alignment, PadStr};
use std::fmt::{Display, Error, Formatter};
use unicode_width::UnicodeWidthStr;

pub struct Table {
    columns: usize,
    cells: Vec<Cell>,
}

impl Table {
    pub fn new(columns: usize) -> Table {
        Table {
            columns,
            cells: Vec::new(),
        }
    }

    pub fn add_cell(&mut self, text: &str) {
        self.push(text, Alignment::Left);
    }

    pub fn add_cell_rtl(&mut self, text: &str) {
        self.push(text, Alignment::Right);
    }

    fn push(&mut self, text: &str, align: Alignment) {
        self.cells.push(Cell {
            text: text.to_string(),
            align,
        });
    }

    fn column_width(&self, column: usize) -> usize {
        self.cells
            .iter()
            .skip(column)
            .step_by(self.columns)
            .map(|x| UnicodeWidthStr::width(x.text.as_str()))
            .max()
            .unwrap_or(0)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let widths: Vec<_> = (0..self.columns).map(|i| self.column_width(i)).collect();

        for (i, cell) in self.cells.iter().enumerate() {
            let c = i % self.columns;
            let text = cell.text.pad_to_width_with_alignment(widths[c], cell.align);

            // header row
            if i < self.columns {
                write!(f, "{}", Style::new().bold().paint(text))?;
            } else {
                write!(f, "{}", text)?;
            }

            if c == self.columns - 1 {
                writeln!(f)?;
            } else {
                write!(f, " ")?;
            }
        }

        Ok(())
    }
}

struct Cell {
    text: String,
    align: Alignment,
}

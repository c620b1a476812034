use crate::gauge::format_value;
use serde::Serialize;
use std::fmt;
use twin_config::TableConfig;
use twin_core::{MetricSet, Metrics};

/// Shown in a cell until the table's endpoint has answered once.
pub const NO_READING: &str = "-";

/// One overview table: a header row and the latest value under each header.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTable {
    pub component: String,
    pub title: String,
    pub columns: Vec<String>,
    keys: MetricSet,
}

impl DataTable {
    pub fn from_config(config: &TableConfig) -> Self {
        Self {
            component: config.component.clone(),
            title: config.title.clone(),
            columns: config.columns.clone(),
            keys: config.metric_set(),
        }
    }

    /// Payload keys, one per column.
    pub fn metric_set(&self) -> &MetricSet {
        &self.keys
    }

    /// Fill the row from the latest reading, if there is one.
    pub fn row(&self, latest: Option<&Metrics>) -> TableRow {
        let cells = self
            .columns
            .iter()
            .zip(self.keys.iter())
            .map(|(header, key)| TableCell {
                header: header.clone(),
                display: latest
                    .and_then(|m| m.get(key))
                    .map_or_else(|| NO_READING.to_string(), format_value),
            })
            .collect();
        TableRow {
            component: self.component.clone(),
            title: self.title.clone(),
            cells,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub component: String,
    pub title: String,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCell {
    pub header: String,
    pub display: String,
}

impl fmt::Display for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}:", self.component, self.title)?;
        for (i, cell) in self.cells.iter().enumerate() {
            let sep = if i == 0 { " " } else { " | " };
            write!(f, "{sep}{} {}", cell.header, cell.display)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twin_core::RawSample;

    fn vibration() -> DataTable {
        DataTable::from_config(&TableConfig {
            component: "Spindle".into(),
            title: "Vibration Data (mm/sec)".into(),
            url: "http://x".into(),
            columns: vec!["Front X".into(), "Rear Y".into()],
        })
    }

    #[test]
    fn empty_until_first_reading() {
        let row = vibration().row(None);
        assert_eq!(row.to_string(), "Spindle / Vibration Data (mm/sec): Front X - | Rear Y -");
    }

    #[test]
    fn cells_read_normalized_header_keys() {
        let table = vibration();
        let raw = RawSample::new("t")
            .with_field("frontx", "1.234")
            .with_field("Front X", 99)
            .with_field("reary", 0.5);
        let latest = Metrics::normalize(table.metric_set(), &raw);

        let row = table.row(Some(&latest));
        assert_eq!(row.cells[0].display, "1.23");
        assert_eq!(row.cells[1].display, "0.50");
    }
}

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use super::domain::{FieldValue, Record};

/// Label and bookkeeping columns that never reach the feature transformer.
pub const NON_FEATURE_COLUMNS: [&str; 5] = [
    "Attrition",
    "EmployeeNumber",
    "EmployeeCount",
    "Over18",
    "StandardHours",
];

#[derive(Debug)]
pub enum DatasetError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io(err) => write!(f, "failed to read employee dataset: {}", err),
            DatasetError::Csv(err) => write!(f, "invalid employee CSV data: {}", err),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::Io(err) => Some(err),
            DatasetError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for DatasetError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<Record>, DatasetError> {
    let file = std::fs::File::open(path)?;
    records_from_reader(file)
}

pub fn records_from_reader<R: Read>(reader: R) -> Result<Vec<Record>, DatasetError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for row in csv_reader.deserialize::<BTreeMap<String, String>>() {
        let record = row?
            .into_iter()
            .map(|(column, raw)| (column.trim_start_matches('\u{feff}').to_string(), raw))
            .filter(|(column, _)| !NON_FEATURE_COLUMNS.contains(&column.as_str()))
            .map(|(column, raw)| (column, FieldValue::from_raw(&raw)))
            .collect::<Record>();
        records.push(record);
    }

    Ok(records)
}

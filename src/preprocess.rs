//! CSV dataset preparation: the step that produces the encoded feature names
//! a trained tree refers to.
//!
//! Loading validates the table and drops columns that look like identifiers.
//! `prepare` then label-encodes the target and one-hot encodes every
//! categorical column as `<column>_<category>`, which is the naming the
//! renderer reverses. Fully populated `true`/`false` columns stay a single
//! 0/1 feature and are not one-hot encoded.
//!
//! This module does not have performance critical code. Safety checks are allowed!

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::{debug, info};

use crate::config::{
    DEFAULT_SEPARATOR, ID_MAX_UNIQUE, ID_UNIQUE_RATIO, MAX_CLASSES, MIN_COLUMNS, MIN_ROWS,
    MIN_SAMPLES_PER_CLASS, MISSING_CATEGORY,
};
use crate::error::{DatasetError, Error};

/// How a column's cells are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Every cell present and an integer.
    Integer,
    /// Every present cell parses as a number; empty cells are missing values.
    Float,
    /// Every cell present and one of `true`/`false` (`True`, `TRUE`, ...). Encoded as 0/1.
    Boolean,
    /// Anything else. Empty cells become the category `nan`.
    Categorical,
}

impl ColumnKind {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ColumnKind::Categorical)
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    kind: ColumnKind,
    cells: Vec<String>,
}

/// A validated CSV table with identifier-like columns removed.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
    dropped_columns: Vec<String>,
}

/// Encoded training data plus the names the renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedDataset {
    /// Numeric columns in table order, then one-hot columns.
    pub feature_names: Vec<String>,
    /// `class_names[i]` is the original value encoded as class `i`.
    pub class_names: Vec<String>,
    /// Row-major feature matrix. Missing numeric cells are NaN.
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<usize>,
    pub dropped_columns: Vec<String>,
}

impl Dataset {
    /// Reads a CSV file with a header row.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_reader(file)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        // --- Header Validation ---
        let mut seen = FxHashSet::default();
        for name in &headers {
            let trimmed = name.trim();
            if trimmed.is_empty() || trimmed.starts_with("Unnamed") {
                return Err(DatasetError::InvalidColumnName(name.clone()));
            }
        }
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(DatasetError::DuplicateColumn(name.clone()));
            }
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut n_rows = 0;
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(DatasetError::RaggedRow {
                    row: row + 1,
                    expected: headers.len(),
                    found: record.len(),
                });
            }
            for (column, value) in cells.iter_mut().zip(record.iter()) {
                column.push(value.trim().to_string());
            }
            n_rows += 1;
        }

        // --- Shape Validation ---
        if n_rows == 0 || headers.is_empty() {
            return Err(DatasetError::Empty);
        }
        if headers.len() < MIN_COLUMNS {
            return Err(DatasetError::TooFewColumns {
                min: MIN_COLUMNS,
                found: headers.len(),
            });
        }
        if n_rows < MIN_ROWS {
            return Err(DatasetError::TooFewRows {
                min: MIN_ROWS,
                found: n_rows,
            });
        }

        let mut columns = Vec::with_capacity(headers.len());
        let mut dropped_columns = Vec::new();
        for (name, cells) in headers.into_iter().zip(cells) {
            let kind = classify(&cells);
            if looks_like_id(&name, kind, &cells, n_rows) {
                dropped_columns.push(name);
            } else {
                columns.push(Column { name, kind, cells });
            }
        }
        if !dropped_columns.is_empty() {
            info!(columns = ?dropped_columns, "dropped identifier-like columns");
        }

        if !columns.iter().any(|c| c.kind == ColumnKind::Categorical) {
            return Err(DatasetError::NoCategoricalColumns);
        }

        Ok(Dataset {
            columns,
            n_rows,
            dropped_columns,
        })
    }

    /// Column names remaining after identifier columns were dropped.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.kind)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    /// Checks that `target` can be used as a classification target.
    pub fn validate_target(&self, target: &str) -> Result<(), DatasetError> {
        let column = self
            .columns
            .iter()
            .find(|c| c.name == target)
            .ok_or_else(|| DatasetError::TargetNotFound(target.to_string()))?;
        let classes = sorted_classes(column);
        let counts = class_counts(column);

        if classes.len() < 2 {
            return Err(DatasetError::TooFewClasses(classes.len()));
        }
        for class in &classes {
            let count = counts[class.as_str()];
            if count < MIN_SAMPLES_PER_CLASS {
                return Err(DatasetError::ClassTooSmall {
                    class: class.clone(),
                    count,
                    min: MIN_SAMPLES_PER_CLASS,
                });
            }
        }
        if classes.len() > MAX_CLASSES {
            return Err(DatasetError::TooManyClasses {
                found: classes.len(),
                max: MAX_CLASSES,
            });
        }
        Ok(())
    }

    /// Encodes the table for training on `target`.
    pub fn prepare(&self, target: &str) -> Result<PreparedDataset, DatasetError> {
        self.validate_target(target)?;
        let target_column = self
            .columns
            .iter()
            .find(|c| c.name == target)
            .ok_or_else(|| DatasetError::TargetNotFound(target.to_string()))?;

        // --- Label-encode the target ---
        let class_names = sorted_classes(target_column);
        let class_index: FxHashMap<&str, usize> =
            class_names.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
        let targets: Vec<usize> = target_column
            .cells
            .iter()
            .map(|cell| class_index[category_of(cell)])
            .collect();

        // --- Numeric columns keep their order, one-hot columns follow ---
        let feature_columns: Vec<&Column> = self.columns.iter().filter(|c| c.name != target).collect();
        let mut feature_names = Vec::new();
        let mut encoders: Vec<Box<dyn Fn(usize) -> f64 + '_>> = Vec::new();

        for column in feature_columns.iter().filter(|c| c.kind.is_numeric()) {
            feature_names.push(column.name.clone());
            encoders.push(Box::new(move |row| numeric_value(column.kind, &column.cells[row])));
        }
        for column in feature_columns.iter().filter(|c| !c.kind.is_numeric()) {
            let categories: BTreeSet<&str> = column.cells.iter().map(|c| category_of(c)).collect();
            for category in categories {
                feature_names.push(format!("{}{}{}", column.name, DEFAULT_SEPARATOR, category));
                encoders.push(Box::new(move |row| {
                    if category_of(&column.cells[row]) == category {
                        1.0
                    } else {
                        0.0
                    }
                }));
            }
        }

        let features: Vec<Vec<f64>> = (0..self.n_rows)
            .map(|row| encoders.iter().map(|encode| encode(row)).collect())
            .collect();

        debug!(
            features = feature_names.len(),
            classes = class_names.len(),
            rows = self.n_rows,
            "prepared dataset"
        );
        Ok(PreparedDataset {
            feature_names,
            class_names,
            features,
            targets,
            dropped_columns: self.dropped_columns.clone(),
        })
    }
}

fn classify(cells: &[String]) -> ColumnKind {
    if cells.iter().all(|c| parse_bool(c).is_some()) {
        return ColumnKind::Boolean;
    }
    let mut all_present_integers = true;
    for cell in cells {
        if cell.is_empty() {
            all_present_integers = false;
            continue;
        }
        if cell.parse::<f64>().is_err() {
            return ColumnKind::Categorical;
        }
        if cell.parse::<i64>().is_err() {
            all_present_integers = false;
        }
    }
    if all_present_integers {
        ColumnKind::Integer
    } else {
        ColumnKind::Float
    }
}

/// Integer or text columns that are named like ids, or are nearly unique, are identifiers.
fn looks_like_id(name: &str, kind: ColumnKind, cells: &[String], n_rows: usize) -> bool {
    if matches!(kind, ColumnKind::Float | ColumnKind::Boolean) {
        return false;
    }
    let lower = name.to_lowercase();
    let name_match = lower.contains("id") || lower.contains("uuid");
    let unique = cells
        .iter()
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect::<FxHashSet<_>>()
        .len();
    let high_uniqueness = unique as f64 / n_rows as f64 > ID_UNIQUE_RATIO;
    name_match || high_uniqueness || unique > ID_MAX_UNIQUE
}

fn parse_bool(cell: &str) -> Option<bool> {
    match cell {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Value of a numeric cell; missing or unparsable cells are NaN.
fn numeric_value(kind: ColumnKind, cell: &str) -> f64 {
    match kind {
        ColumnKind::Boolean => parse_bool(cell).map_or(f64::NAN, f64::from),
        _ => cell.parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn category_of(cell: &str) -> &str {
    if cell.is_empty() {
        MISSING_CATEGORY
    } else {
        cell
    }
}

fn class_counts(column: &Column) -> FxHashMap<&str, usize> {
    let mut counts = FxHashMap::default();
    for cell in &column.cells {
        *counts.entry(category_of(cell)).or_insert(0) += 1;
    }
    counts
}

/// Distinct target values, numerically ordered for numeric columns.
fn sorted_classes(column: &Column) -> Vec<String> {
    let mut classes: Vec<&str> = column
        .cells
        .iter()
        .map(|c| category_of(c))
        .collect::<FxHashSet<_>>()
        .into_iter()
        .collect();
    if column.kind.is_numeric() {
        classes.sort_by(|a, b| {
            let (x, y) = (numeric_value(column.kind, a), numeric_value(column.kind, b));
            x.partial_cmp(&y).unwrap_or_else(|| x.is_nan().cmp(&y.is_nan())).then_with(|| a.cmp(b))
        });
    } else {
        classes.sort_unstable();
    }
    classes.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 24 rows: age (float), color (3 categories), size (2 categories), label target.
    fn sample_csv() -> String {
        let mut csv = String::from("record_id,age,color,size,label\n");
        let colors = ["red", "green", "blue"];
        for i in 0..24 {
            let label = if i % 2 == 0 { "yes" } else { "no" };
            let size = if i % 4 < 2 { "S" } else { "M" };
            csv.push_str(&format!("{i},{}.5,{},{size},{label}\n", 20 + i % 5, colors[i % 3]));
        }
        csv
    }

    #[test]
    fn test_load_drops_id_columns() {
        let dataset = Dataset::from_reader(sample_csv().as_bytes()).unwrap();
        assert_eq!(dataset.dropped_columns(), ["record_id"]);
        assert_eq!(dataset.column_names(), ["age", "color", "size", "label"]);
        assert_eq!(dataset.column_kind("age"), Some(ColumnKind::Float));
        assert_eq!(dataset.column_kind("color"), Some(ColumnKind::Categorical));
        assert_eq!(dataset.n_rows(), 24);
    }

    #[test]
    fn test_prepare_one_hot_names_and_labels() {
        let dataset = Dataset::from_reader(sample_csv().as_bytes()).unwrap();
        let prepared = dataset.prepare("label").unwrap();

        assert_eq!(
            prepared.feature_names,
            ["age", "color_blue", "color_green", "color_red", "size_M", "size_S"]
        );
        assert_eq!(prepared.class_names, ["no", "yes"]);
        // Row 0: age 20.5, red, S, yes.
        assert_eq!(prepared.features[0], [20.5, 0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(prepared.targets[0], 1);
        assert_eq!(prepared.targets[1], 0);
        assert_eq!(prepared.features.len(), 24);
    }

    #[test]
    fn test_numeric_target_sorted_numerically() {
        let mut csv = String::from("grade,color\n");
        for i in 0..24 {
            let grade = ["10", "9", "100"][i % 3];
            csv.push_str(&format!("{grade},{}\n", ["a", "b"][i % 2]));
        }
        let prepared = Dataset::from_reader(csv.as_bytes()).unwrap().prepare("grade").unwrap();
        assert_eq!(prepared.class_names, ["9", "10", "100"]);
        assert_eq!(prepared.feature_names, ["color_a", "color_b"]);
    }

    #[test]
    fn test_boolean_column_stays_single_feature() {
        let mut csv = String::from("windy,color,play\n");
        for i in 0..24 {
            let windy = ["true", "False", "TRUE"][i % 3];
            csv.push_str(&format!("{windy},{},{}\n", ["a", "b"][i % 2], ["no", "yes"][i % 2]));
        }
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.column_kind("windy"), Some(ColumnKind::Boolean));
        assert!(dataset.dropped_columns().is_empty());

        let prepared = dataset.prepare("play").unwrap();
        assert_eq!(prepared.feature_names, ["windy", "color_a", "color_b"]);
        assert_eq!(prepared.features[0], [1.0, 1.0, 0.0]);
        assert_eq!(prepared.features[1], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_boolean_with_missing_cells_is_categorical() {
        let mut csv = String::from("windy,color\n");
        for i in 0..24 {
            let windy = if i == 5 { "" } else { ["true", "false"][i % 2] };
            csv.push_str(&format!("{windy},{}\n", ["a", "b"][i % 2]));
        }
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(dataset.column_kind("windy"), Some(ColumnKind::Categorical));
    }

    #[test]
    fn test_rejects_bad_headers() {
        let err = Dataset::from_reader("a,,b\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColumnName(_)));

        let err = Dataset::from_reader("a,Unnamed: 1\n1,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidColumnName(_)));

        let err = Dataset::from_reader("a,b,a\n1,2,3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::DuplicateColumn(ref name) if name == "a"));
    }

    #[test]
    fn test_rejects_small_tables() {
        let err = Dataset::from_reader("a,b\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::Empty));

        let err = Dataset::from_reader("a,b\nx,1\nx,2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::TooFewRows { min: 20, found: 2 }));

        let mut single = String::from("a\n");
        single.push_str(&"x\n".repeat(25));
        let err = Dataset::from_reader(single.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::TooFewColumns { min: 2, found: 1 }));
    }

    #[test]
    fn test_requires_categorical_column() {
        let mut csv = String::from("a,b\n");
        for i in 0..24 {
            csv.push_str(&format!("{}.25,{}.75\n", i % 3, i % 2));
        }
        let err = Dataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::NoCategoricalColumns));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let err = Dataset::from_reader("a,b\n1,2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, DatasetError::RaggedRow { row: 2, expected: 2, found: 1 }));
    }

    #[test]
    fn test_target_validation() {
        let dataset = Dataset::from_reader(sample_csv().as_bytes()).unwrap();
        assert!(matches!(dataset.prepare("missing"), Err(DatasetError::TargetNotFound(_))));

        let mut csv = String::from("color,label\n");
        for i in 0..24 {
            let label = if i == 0 { "rare" } else { "common" };
            csv.push_str(&format!("{},{label}\n", ["a", "b"][i % 2]));
        }
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert!(matches!(
            dataset.prepare("label"),
            Err(DatasetError::ClassTooSmall { ref class, count: 1, .. }) if class == "rare"
        ));

        let mut csv = String::from("color,label\n");
        for i in 0..24 {
            csv.push_str(&format!("{},same\n", ["a", "b"][i % 2]));
        }
        let dataset = Dataset::from_reader(csv.as_bytes()).unwrap();
        assert!(matches!(dataset.prepare("label"), Err(DatasetError::TooFewClasses(1))));
    }
}

//! Ground truth dataset loading and validation.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{GroundTruthError, Result};
use crate::fields::{self, Validator};
use crate::models::field::{FieldSpec, FieldValue};

/// Verified values for one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub invoice_id: String,

    /// Canonical values keyed by field name. Optional fields left blank
    /// in the dataset are absent.
    pub fields: BTreeMap<String, FieldValue>,
}

impl GroundTruthRecord {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// A validated ground truth dataset, read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthSet {
    records: Vec<GroundTruthRecord>,
    index: HashMap<String, usize>,
}

impl GroundTruthSet {
    /// Load a ground truth CSV file.
    pub fn from_csv(path: &Path, specs: &[FieldSpec], id_column: &str) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let set = Self::from_reader(file, specs, id_column)?;
        info!(
            "Loaded {} ground truth records from {}",
            set.len(),
            path.display()
        );
        Ok(set)
    }

    /// Load ground truth CSV data from any reader.
    ///
    /// Columns are matched to fields by name, label or synonym. Every
    /// row is checked before failing so all problems are reported at once.
    pub fn from_reader<R: Read>(reader: R, specs: &[FieldSpec], id_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let id_index = headers.iter().position(|h| h == id_column);
        let mut columns: Vec<(&FieldSpec, usize)> = Vec::new();
        let mut missing = Vec::new();

        if id_index.is_none() {
            missing.push(id_column.to_string());
        }
        for spec in specs {
            match headers.iter().position(|h| spec.matches_label(h)) {
                Some(i) => columns.push((spec, i)),
                None if spec.required => missing.push(spec.label.clone()),
                None => debug!("No ground truth column for optional field {}", spec.name),
            }
        }
        let id_index = match id_index {
            Some(i) if missing.is_empty() => i,
            _ => return Err(GroundTruthError::MissingColumns(missing).into()),
        };

        let validators: Vec<Validator> = columns
            .iter()
            .map(|(spec, _)| Validator::for_spec(spec))
            .collect();

        let mut records = Vec::new();
        let mut row_errors = Vec::new();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let row = row + 1;

            let invoice_id = record.get(id_index).unwrap_or_default().to_string();
            if invoice_id.is_empty() {
                row_errors.push(format!("Row {}: {} cannot be empty", row, id_column));
                continue;
            }

            let mut values = BTreeMap::new();
            for ((spec, column), validator) in columns.iter().zip(&validators) {
                let cell = record.get(*column).unwrap_or_default();
                if cell.is_empty() {
                    if spec.required {
                        row_errors.push(format!("Row {}: {} cannot be empty", row, spec.label));
                    }
                    continue;
                }

                match fields::normalize(cell, spec) {
                    Ok(value) => {
                        let result = validator.validate(Some(&value));
                        if result.is_valid {
                            values.insert(spec.name.clone(), value);
                        } else {
                            row_errors.extend(
                                result
                                    .errors
                                    .iter()
                                    .map(|e| format!("Row {}: {}: {}", row, spec.label, e)),
                            );
                        }
                    }
                    Err(e) => row_errors.push(format!("Row {}: {}", row, e)),
                }
            }

            records.push(GroundTruthRecord {
                invoice_id,
                fields: values,
            });
        }

        let mut index = HashMap::with_capacity(records.len());
        let mut duplicates = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.invoice_id.clone(), i).is_some()
                && !duplicates.contains(&record.invoice_id)
            {
                duplicates.push(record.invoice_id.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(GroundTruthError::DuplicateIds(duplicates).into());
        }
        if !row_errors.is_empty() {
            return Err(GroundTruthError::InvalidRows(row_errors).into());
        }

        Ok(Self { records, index })
    }

    /// Record for an invoice, if present.
    pub fn get(&self, invoice_id: &str) -> Option<&GroundTruthRecord> {
        self.index.get(invoice_id).map(|&i| &self.records[i])
    }

    /// Record for an invoice, failing when it is not in the dataset.
    pub fn require(&self, invoice_id: &str) -> std::result::Result<&GroundTruthRecord, GroundTruthError> {
        self.get(invoice_id)
            .ok_or_else(|| GroundTruthError::UnknownInvoice(invoice_id.to_string()))
    }

    /// Invoice ids in file order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.invoice_id.as_str())
    }

    pub fn records(&self) -> &[GroundTruthRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvexError;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::io::Write;

    fn specs() -> Vec<FieldSpec> {
        vec![FieldSpec::work_order(), FieldSpec::total()]
    }

    fn load(csv: &str) -> Result<GroundTruthSet> {
        GroundTruthSet::from_reader(csv.as_bytes(), &specs(), "Invoice")
    }

    #[test]
    fn test_load_valid_dataset() {
        let set = load(
            "Invoice,Work Order Number,Total\n\
             1017,00123,\"$1,234.56\"\n\
             1018,AB123,140\n",
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.ids().collect::<Vec<_>>(), vec!["1017", "1018"]);

        let record = set.get("1017").unwrap();
        assert_eq!(
            record.get("work_order"),
            Some(&FieldValue::Text("00123".to_string()))
        );
        assert_eq!(
            record.get("total"),
            Some(&FieldValue::Amount(Decimal::new(123456, 2)))
        );
        assert_eq!(set.get("1018").unwrap().get("total").unwrap().to_string(), "140.00");
    }

    #[test]
    fn test_columns_matched_by_synonym() {
        let set = load("Invoice,work_order,Total Cost\n7,12345,10.50\n").unwrap();
        assert!(set.get("7").unwrap().get("total").is_some());
    }

    #[test]
    fn test_missing_columns() {
        let err = load("Invoice,Total\n1,10.00\n").unwrap_err();
        match err {
            InvexError::GroundTruth(GroundTruthError::MissingColumns(cols)) => {
                assert_eq!(cols, vec!["Work Order Number".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = load("Id,Work Order Number,Total\n1,12345,10.00\n").unwrap_err();
        assert!(matches!(
            err,
            InvexError::GroundTruth(GroundTruthError::MissingColumns(cols)) if cols == vec!["Invoice".to_string()]
        ));
    }

    #[test]
    fn test_duplicate_ids() {
        let err = load(
            "Invoice,Work Order Number,Total\n1,12345,1.00\n1,12346,2.00\n2,12347,3.00\n",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            InvexError::GroundTruth(GroundTruthError::DuplicateIds(ids)) if ids == vec!["1".to_string()]
        ));
    }

    #[test]
    fn test_all_row_errors_reported() {
        let err = load(
            "Invoice,Work Order Number,Total\n\
             1,1234,10.00\n\
             2,12345,\n\
             3,12345,abc\n",
        )
        .unwrap_err();

        match err {
            InvexError::GroundTruth(GroundTruthError::InvalidRows(rows)) => {
                assert_eq!(rows.len(), 3);
                assert!(rows[0].starts_with("Row 1: Work Order Number"));
                assert_eq!(rows[1], "Row 2: Total cannot be empty");
                assert!(rows[2].starts_with("Row 3: total: no number"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_optional_column_may_be_blank() {
        let specs = vec![
            FieldSpec::work_order(),
            FieldSpec::invoice_date().with_required(false),
        ];
        let set = GroundTruthSet::from_reader(
            "Invoice,Work Order Number,Invoice Date\n1,12345,\n2,12346,03/07/2024\n".as_bytes(),
            &specs,
            "Invoice",
        )
        .unwrap();

        assert!(set.get("1").unwrap().get("date").is_none());
        assert_eq!(set.get("2").unwrap().get("date").unwrap().to_string(), "2024-03-07");
    }

    #[test]
    fn test_unknown_invoice() {
        let set = load("Invoice,Work Order Number,Total\n1,12345,1.00\n").unwrap();
        assert!(matches!(
            set.require("99"),
            Err(GroundTruthError::UnknownInvoice(id)) if id == "99"
        ));
    }

    #[test]
    fn test_from_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Invoice,Work Order Number,Total").unwrap();
        writeln!(file, "1017,00123,$99.99").unwrap();

        let set = GroundTruthSet::from_csv(file.path(), &specs(), "Invoice").unwrap();
        assert_eq!(set.len(), 1);
    }
}

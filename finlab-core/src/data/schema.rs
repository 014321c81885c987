use polars::prelude::*;

/// Expected schema for panel query results
pub struct PanelSchema;

impl PanelSchema {
    /// Get the canonical panel schema
    pub fn schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("date".into(), DataType::Date),
            Field::new("permno".into(), DataType::Int64),
            Field::new("permco".into(), DataType::Int64),
            Field::new("ticker".into(), DataType::String),
            Field::new("comnam".into(), DataType::String),
            Field::new("shrcd".into(), DataType::Int64),
            Field::new("exchcd".into(), DataType::Int64),
            Field::new("siccd".into(), DataType::Int64),
            Field::new("prc".into(), DataType::Float64),
            Field::new("ret".into(), DataType::Float64),
            Field::new("retx".into(), DataType::Float64),
            Field::new("vol".into(), DataType::Float64),
            Field::new("shrout".into(), DataType::Float64),
        ])
    }

    /// Validate DataFrame against schema
    pub fn validate(df: &DataFrame) -> Result<(), SchemaError> {
        let expected = Self::schema();
        let actual = df.schema();

        for field in expected.iter_fields() {
            let actual_dtype = actual
                .get(field.name())
                .ok_or_else(|| SchemaError::MissingColumn(field.name().to_string()))?;
            if actual_dtype != field.dtype() {
                return Err(SchemaError::TypeMismatch {
                    column: field.name().to_string(),
                    expected: field.dtype().clone(),
                    actual: actual_dtype.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PanelRow, PanelTable};
    use chrono::NaiveDate;

    fn panel() -> PanelTable {
        PanelTable::from_rows(vec![PanelRow {
            date: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            permno: 14593,
            permco: Some(7),
            ticker: Some("AAPL".into()),
            comnam: Some("APPLE INC".into()),
            shrcd: Some(11),
            exchcd: Some(3),
            siccd: Some(3571),
            prc: Some(193.97),
            ret: Some(0.0943),
            retx: Some(0.0943),
            vol: Some(1_000_000.0),
            shrout: Some(15_728_702.0),
        }])
    }

    #[test]
    fn test_schema_has_all_required_columns() {
        let schema = PanelSchema::schema();
        for name in ["date", "permno", "ticker", "prc", "ret", "shrout"] {
            assert!(schema.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_validate_accepts_panel_frame() {
        let df = panel().to_dataframe().unwrap();
        let result = PanelSchema::validate(&df);
        if let Err(ref e) = result {
            eprintln!("Validation error: {:?}", e);
            eprintln!("DataFrame schema: {:?}", df.schema());
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_column() {
        let df = panel().to_dataframe().unwrap().drop("ret").unwrap();
        let result = PanelSchema::validate(&df);
        assert!(matches!(result.unwrap_err(), SchemaError::MissingColumn(c) if c == "ret"));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let df = DataFrame::new(vec![Column::new("date".into(), &["2023-06"])]).unwrap();
        let result = PanelSchema::validate(&df);
        assert!(matches!(result.unwrap_err(), SchemaError::TypeMismatch { .. }));
    }
}

use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{ColumnKind, ColumnSpec, NormalizedRow, Provider, Value};

enum ColumnData {
    Float(Vec<Option<f64>>),
    Int(Vec<Option<i64>>),
    Text(Vec<Option<String>>),
    Timestamp(Vec<Option<i64>>),
}

impl ColumnData {
    fn new(kind: ColumnKind) -> Self {
        match kind {
            ColumnKind::Float => ColumnData::Float(Vec::new()),
            ColumnKind::Int => ColumnData::Int(Vec::new()),
            ColumnKind::Text => ColumnData::Text(Vec::new()),
            ColumnKind::Timestamp => ColumnData::Timestamp(Vec::new()),
        }
    }

    fn push(&mut self, value: Value) -> Result<(), Value> {
        match (self, value) {
            (ColumnData::Float(values), Value::Float(v)) => values.push(Some(v)),
            (ColumnData::Float(values), Value::Absent) => values.push(None),
            (ColumnData::Int(values), Value::Int(v)) => values.push(Some(v)),
            (ColumnData::Int(values), Value::Absent) => values.push(None),
            (ColumnData::Text(values), Value::Text(v)) => values.push(Some(v)),
            (ColumnData::Text(values), Value::Absent) => values.push(None),
            (ColumnData::Timestamp(values), Value::Timestamp(v)) => {
                values.push(Some(v.timestamp_micros()))
            }
            (ColumnData::Timestamp(values), Value::Absent) => values.push(None),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    fn into_column(self, name: &str) -> PolarsResult<Column> {
        let series = match self {
            ColumnData::Float(values) => Series::new(name.into(), values),
            ColumnData::Int(values) => Series::new(name.into(), values),
            ColumnData::Text(values) => {
                let utf8: Vec<Option<&str>> = values.iter().map(|v| v.as_deref()).collect();
                Series::new(name.into(), utf8)
            }
            ColumnData::Timestamp(values) => Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?,
        };
        Ok(series.into())
    }
}

/// Assembles normalized rows into a typed `DataFrame`.
///
/// Rows must carry exactly the schema's columns, in schema order. Row order is
/// preserved; nothing is sorted or deduplicated.
pub struct TableBuilder {
    provider: Provider,
    schema: Vec<ColumnSpec>,
    columns: Vec<ColumnData>,
    rows: usize,
}

impl TableBuilder {
    pub fn new(provider: Provider, schema: Vec<ColumnSpec>) -> Self {
        let columns = schema.iter().map(|spec| ColumnData::new(spec.kind)).collect();
        Self {
            provider,
            schema,
            columns,
            rows: 0,
        }
    }

    pub fn schema(&self) -> &[ColumnSpec] {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn push(&mut self, row: NormalizedRow) -> Result<(), ParserError> {
        let row_index = self.rows;
        if row.len() != self.schema.len()
            || row
                .columns()
                .zip(self.schema.iter())
                .any(|(name, spec)| name != spec.name)
        {
            return Err(ParserError::SchemaMismatch {
                provider: self.provider,
                row_index,
                message: format!(
                    "expected columns {:?}, found {:?}",
                    self.schema.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                    row.columns().collect::<Vec<_>>()
                ),
            });
        }

        // Validate every cell before touching the columns so a bad row leaves them aligned.
        for ((name, value), spec) in row.cells().iter().zip(self.schema.iter()) {
            if let Some(kind) = value.kind() {
                if kind != spec.kind {
                    return Err(ParserError::SchemaMismatch {
                        provider: self.provider,
                        row_index,
                        message: format!("column '{name}' expects {} but got {kind}", spec.kind),
                    });
                }
            }
        }

        for ((name, value), column) in row.into_cells().into_iter().zip(self.columns.iter_mut()) {
            column.push(value).map_err(|value| ParserError::SchemaMismatch {
                provider: self.provider,
                row_index,
                message: format!("column '{name}' rejected value {value:?}"),
            })?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<DataFrame, ParserError> {
        let provider = self.provider;
        let columns = self
            .schema
            .iter()
            .zip(self.columns)
            .map(|(spec, data)| data.into_column(&spec.name))
            .collect::<PolarsResult<Vec<Column>>>()
            .map_err(|source| ParserError::Table { provider, source })?;
        DataFrame::new(columns).map_err(|source| ParserError::Table { provider, source })
    }
}

/// Builds a frame from rows alone, taking column names from the first row and
/// each column's kind from its first present value. All-absent columns become
/// floats.
pub fn build_rows(provider: Provider, rows: Vec<NormalizedRow>) -> Result<DataFrame, ParserError> {
    let Some(first) = rows.first() else {
        return Ok(DataFrame::default());
    };

    let schema = first
        .columns()
        .enumerate()
        .map(|(idx, name)| {
            let kind = rows
                .iter()
                .filter_map(|row| row.cells().get(idx))
                .find_map(|(_, value)| value.kind())
                .unwrap_or(ColumnKind::Float);
            ColumnSpec::new(name, kind)
        })
        .collect();

    let mut builder = TableBuilder::new(provider, schema);
    for row in rows {
        builder.push(row)?;
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;

    fn row(cells: Vec<(&str, Value)>) -> NormalizedRow {
        let mut row = NormalizedRow::new();
        for (name, value) in cells {
            row.push(name, value);
        }
        row
    }

    fn instant(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn builds_typed_columns_in_input_order() {
        let schema = vec![
            ColumnSpec::new("time", ColumnKind::Timestamp),
            ColumnSpec::new("temp", ColumnKind::Float),
            ColumnSpec::new("flag", ColumnKind::Int),
            ColumnSpec::new("station", ColumnKind::Text),
        ];
        let mut builder = TableBuilder::new(Provider::Nerr, schema);
        builder
            .push(row(vec![
                ("time", Value::Timestamp(instant(120))),
                ("temp", Value::Float(12.5)),
                ("flag", Value::Int(0)),
                ("station", Value::Text("elkapwq".into())),
            ]))
            .unwrap();
        builder
            .push(row(vec![
                ("time", Value::Timestamp(instant(60))),
                ("temp", Value::Absent),
                ("flag", Value::Absent),
                ("station", Value::Text("elkapwq".into())),
            ]))
            .unwrap();

        let df = builder.finish().unwrap();
        assert_eq!(df.get_column_names(), ["time", "temp", "flag", "station"]);
        assert_eq!(
            df.column("time").unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Microseconds, None)
        );
        let micros = df.column("time").unwrap().cast(&DataType::Int64).unwrap();
        assert_eq!(micros.i64().unwrap().get(0), Some(120_000_000));
        assert_eq!(micros.i64().unwrap().get(1), Some(60_000_000));
        assert_eq!(df.column("temp").unwrap().null_count(), 1);
        assert_eq!(df.column("flag").unwrap().i64().unwrap().get(0), Some(0));
    }

    #[test]
    fn rejects_rows_with_different_columns() {
        let schema = vec![
            ColumnSpec::new("time", ColumnKind::Timestamp),
            ColumnSpec::new("temp", ColumnKind::Float),
        ];
        let mut builder = TableBuilder::new(Provider::Mlml, schema);
        let err = builder
            .push(row(vec![
                ("time", Value::Timestamp(instant(0))),
                ("salinity", Value::Float(33.1)),
            ]))
            .unwrap_err();
        assert!(matches!(err, ParserError::SchemaMismatch { row_index: 0, .. }));
        assert!(builder.is_empty());
    }

    #[test]
    fn rejects_value_of_wrong_kind_without_misaligning_columns() {
        let schema = vec![
            ColumnSpec::new("time", ColumnKind::Timestamp),
            ColumnSpec::new("temp", ColumnKind::Float),
        ];
        let mut builder = TableBuilder::new(Provider::Lobo, schema);
        let err = builder
            .push(row(vec![
                ("time", Value::Timestamp(instant(0))),
                ("temp", Value::Text("warm".into())),
            ]))
            .unwrap_err();
        assert!(matches!(err, ParserError::SchemaMismatch { .. }));
        builder
            .push(row(vec![
                ("time", Value::Timestamp(instant(0))),
                ("temp", Value::Float(9.0)),
            ]))
            .unwrap();
        assert_eq!(builder.finish().unwrap().height(), 1);
    }

    #[test]
    fn build_rows_infers_kinds_and_detects_inconsistent_sets() {
        let rows = vec![
            row(vec![("time", Value::Timestamp(instant(0))), ("sal", Value::Absent)]),
            row(vec![("time", Value::Timestamp(instant(1))), ("sal", Value::Float(33.0))]),
        ];
        let df = build_rows(Provider::Mlml, rows).unwrap();
        assert_eq!(df.column("sal").unwrap().dtype(), &DataType::Float64);

        let rows = vec![
            row(vec![("time", Value::Timestamp(instant(0))), ("sal", Value::Float(1.0))]),
            row(vec![("time", Value::Timestamp(instant(1)))]),
        ];
        assert!(matches!(
            build_rows(Provider::Mlml, rows),
            Err(ParserError::SchemaMismatch { row_index: 1, .. })
        ));

        assert_eq!(build_rows(Provider::Mlml, Vec::new()).unwrap().height(), 0);
    }
}

//! Row to JSON conversion for routine results.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Number, Value};
use sqlx::postgres::types::{PgInterval, PgTimeTz};
use sqlx::postgres::{PgRow, PgTypeKind};
use sqlx::{Column, Decode, Postgres, Row as _, Type, TypeInfo};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dispatch::sql::ROW_COLUMN;

/// A result row as returned to clients: column name to JSON value.
pub type Row = Map<String, Value>;

/// How a column is read out of a `PgRow`, keyed by PostgreSQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Json,
    Uuid,
    Date,
    Time,
    TimeTz,
    Timestamp,
    TimestampTz,
    Interval,
    BoolArray,
    Int2Array,
    Int4Array,
    Int8Array,
    Float8Array,
    NumericArray,
    TextArray,
    Other,
}

impl ColumnKind {
    pub(crate) fn from_type_name(name: &str) -> Self {
        match name {
            "BOOL" => ColumnKind::Bool,
            "INT2" => ColumnKind::Int2,
            "INT4" => ColumnKind::Int4,
            "INT8" => ColumnKind::Int8,
            "FLOAT4" => ColumnKind::Float4,
            "FLOAT8" => ColumnKind::Float8,
            "NUMERIC" => ColumnKind::Numeric,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => ColumnKind::Text,
            "JSON" | "JSONB" => ColumnKind::Json,
            "UUID" => ColumnKind::Uuid,
            "DATE" => ColumnKind::Date,
            "TIME" => ColumnKind::Time,
            "TIMETZ" => ColumnKind::TimeTz,
            "TIMESTAMP" => ColumnKind::Timestamp,
            "TIMESTAMPTZ" => ColumnKind::TimestampTz,
            "INTERVAL" => ColumnKind::Interval,
            "BOOL[]" => ColumnKind::BoolArray,
            "INT2[]" => ColumnKind::Int2Array,
            "INT4[]" => ColumnKind::Int4Array,
            "INT8[]" => ColumnKind::Int8Array,
            "FLOAT8[]" => ColumnKind::Float8Array,
            "NUMERIC[]" => ColumnKind::NumericArray,
            "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => ColumnKind::TextArray,
            _ => ColumnKind::Other,
        }
    }
}

/// Decode every column of a row (procedure OUT parameters).
pub fn row_to_json(row: &PgRow) -> Row {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let kind = ColumnKind::from_type_name(column.type_info().name());
        let value = decode_column(row, i, kind).unwrap_or_else(|e| {
            debug!(
                "Could not decode column {} ({}): {}",
                column.name(),
                column.type_info().name(),
                e
            );
            Value::Null
        });
        map.insert(column.name().to_string(), value);
    }
    map
}

/// Extract the `row_to_json` column produced for function calls. Scalar rows
/// are wrapped so every element of `data` is an object.
pub fn wrapped_row(row: &PgRow) -> Result<Row, sqlx::Error> {
    let value: Option<Value> = row.try_get(ROW_COLUMN)?;
    Ok(match value {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = Map::new();
            map.insert(ROW_COLUMN.to_string(), other);
            map
        }
        None => Map::new(),
    })
}

fn decode_column(row: &PgRow, i: usize, kind: ColumnKind) -> Result<Value, sqlx::Error> {
    let value = match kind {
        ColumnKind::Bool => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        ColumnKind::Int2 => row.try_get::<Option<i16>, _>(i)?.map(Value::from),
        ColumnKind::Int4 => row.try_get::<Option<i32>, _>(i)?.map(Value::from),
        ColumnKind::Int8 => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        ColumnKind::Float4 => row.try_get::<Option<f32>, _>(i)?.map(float4),
        ColumnKind::Float8 => row.try_get::<Option<f64>, _>(i)?.map(float),
        ColumnKind::Numeric => row
            .try_get::<Option<BigDecimal>, _>(i)?
            .map(|d| numeric(&d.to_string())),
        ColumnKind::Text => row.try_get::<Option<String>, _>(i)?.map(Value::String),
        ColumnKind::Json => row.try_get::<Option<Value>, _>(i)?,
        ColumnKind::Uuid => row.try_get::<Option<Uuid>, _>(i)?.map(|u| Value::String(u.to_string())),
        ColumnKind::Date => row
            .try_get::<Option<NaiveDate>, _>(i)?
            .map(|d| Value::String(d.to_string())),
        ColumnKind::Time => row
            .try_get::<Option<NaiveTime>, _>(i)?
            .map(|t| Value::String(t.to_string())),
        ColumnKind::TimeTz => row
            .try_get::<Option<PgTimeTz>, _>(i)?
            .map(|t| Value::String(format!("{}{}", t.time, t.offset))),
        ColumnKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(i)?
            .map(|t| Value::String(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        ColumnKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(i)?
            .map(|t| Value::String(t.to_rfc3339())),
        ColumnKind::Interval => row.try_get::<Option<PgInterval>, _>(i)?.map(|d| interval(&d)),
        ColumnKind::BoolArray => array(row, i, Value::Bool)?,
        ColumnKind::Int2Array => array(row, i, |n: i16| Value::from(n))?,
        ColumnKind::Int4Array => array(row, i, |n: i32| Value::from(n))?,
        ColumnKind::Int8Array => array(row, i, |n: i64| Value::from(n))?,
        ColumnKind::Float8Array => array(row, i, float)?,
        ColumnKind::NumericArray => array(row, i, |d: BigDecimal| numeric(&d.to_string()))?,
        ColumnKind::TextArray => array(row, i, Value::String)?,
        ColumnKind::Other => {
            let type_info = row.column(i).type_info();
            match type_info.kind() {
                // Enum labels are sent as their text even in binary format.
                PgTypeKind::Enum(_) => row.try_get_unchecked::<Option<String>, _>(i)?.map(Value::String),
                _ => {
                    warn!(
                        "Column {} has unsupported type {}; returning null",
                        row.column(i).name(),
                        type_info.name()
                    );
                    None
                }
            }
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// One-dimensional array with nullable elements.
fn array<'r, T>(row: &'r PgRow, i: usize, each: impl Fn(T) -> Value) -> Result<Option<Value>, sqlx::Error>
where
    Vec<Option<T>>: Decode<'r, Postgres> + Type<Postgres>,
{
    Ok(row.try_get::<Option<Vec<Option<T>>>, _>(i)?.map(|items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&each).unwrap_or(Value::Null))
                .collect(),
        )
    }))
}

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// REAL goes through its shortest decimal text so 0.1 stays 0.1.
fn float4(f: f32) -> Value {
    f.to_string().parse::<f64>().map(float).unwrap_or(Value::Null)
}

/// ISO 8601 duration, e.g. `P1Y2M3DT4H5M6.5S`.
fn interval(d: &PgInterval) -> Value {
    let mut text = String::from("P");
    let (years, months) = (d.months / 12, d.months % 12);
    if years != 0 {
        text.push_str(&format!("{}Y", years));
    }
    if months != 0 {
        text.push_str(&format!("{}M", months));
    }
    if d.days != 0 {
        text.push_str(&format!("{}D", d.days));
    }

    let micros = d.microseconds;
    if micros != 0 || text.len() == 1 {
        text.push('T');
        let (hours, rest) = (micros / 3_600_000_000, micros % 3_600_000_000);
        let (minutes, rest) = (rest / 60_000_000, rest % 60_000_000);
        if hours != 0 {
            text.push_str(&format!("{}H", hours));
        }
        if minutes != 0 {
            text.push_str(&format!("{}M", minutes));
        }
        if rest != 0 || (hours == 0 && minutes == 0) {
            let sign = if rest < 0 { "-" } else { "" };
            let (whole, frac) = (rest.abs() / 1_000_000, rest.abs() % 1_000_000);
            if frac == 0 {
                text.push_str(&format!("{}{}S", sign, whole));
            } else {
                let frac = format!("{:06}", frac);
                text.push_str(&format!("{}{}.{}S", sign, whole, frac.trim_end_matches('0')));
            }
        }
    }
    Value::String(text)
}

/// NUMERIC keeps its decimal text when it does not fit a JSON number.
fn numeric(text: &str) -> Value {
    text.parse::<Number>()
        .map(Value::Number)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}

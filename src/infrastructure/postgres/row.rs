//! Dynamic row records.
//!
//! Query results are returned as [`DbRow`]s: ordered column-name to value
//! mappings whose shape is decided by the SQL text. Values are decoded into
//! `serde_json::Value` based on the column's PostgreSQL type. A column whose
//! type has no JSON mapping fails the query with
//! [`PostgresPoolError::UnsupportedType`]; cast it in SQL instead.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgHasArrayType, PgRow, PgTypeInfo, PgTypeKind,
};
use sqlx::query::Query;
use sqlx::types::ipnetwork::IpNetwork;
use sqlx::types::BigDecimal;
use sqlx::{Column, Decode, Encode, Postgres, Row, Type, TypeInfo};
use uuid::Uuid;

use super::PostgresPoolError;

/// A single result row keyed by column name, in select-list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DbRow {
    fields: Map<String, Value>,
}

impl DbRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column value.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Column value as text, if it is a string.
    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decode every column of a PostgreSQL row.
    pub fn from_pg_row(row: &PgRow) -> Result<Self, PostgresPoolError> {
        row.columns()
            .iter()
            .map(|column| {
                let value = decode_column(row, column.ordinal(), column.name(), column.type_info())?;
                Ok((column.name().to_string(), value))
            })
            .collect()
    }
}

impl FromIterator<(String, Value)> for DbRow {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

fn decode_column(
    row: &PgRow,
    index: usize,
    column: &str,
    type_info: &PgTypeInfo,
) -> Result<Value, PostgresPoolError> {
    let decoded = match type_info.name() {
        "BOOL" => get::<bool>(row, index)?.map(Value::Bool),
        "INT2" => get::<i16>(row, index)?.map(Value::from),
        "INT4" => get::<i32>(row, index)?.map(Value::from),
        "INT8" => get::<i64>(row, index)?.map(Value::from),
        "OID" => get::<Oid>(row, index)?.map(|oid| Value::from(oid.0)),
        "FLOAT4" => get::<f32>(row, index)?.map(|f| float(f as f64)),
        "FLOAT8" => get::<f64>(row, index)?.map(float),
        // Exact decimals stay text so no precision is lost
        "NUMERIC" => get::<BigDecimal>(row, index)?.map(|d| Value::String(d.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
            get::<String>(row, index)?.map(Value::String)
        }
        "UUID" => get::<Uuid>(row, index)?.map(|u| Value::String(u.to_string())),
        "JSON" | "JSONB" => get::<Value>(row, index)?,
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, index)?.map(|t| Value::String(t.to_rfc3339())),
        "TIMESTAMP" => get::<NaiveDateTime>(row, index)?.map(|t| Value::String(t.to_string())),
        "DATE" => get::<NaiveDate>(row, index)?.map(|d| Value::String(d.to_string())),
        "TIME" => get::<NaiveTime>(row, index)?.map(|t| Value::String(t.to_string())),
        "INTERVAL" => get::<PgInterval>(row, index)?.map(|i| Value::String(format_interval(&i))),
        "INET" | "CIDR" => get::<IpNetwork>(row, index)?.map(|net| Value::String(format_network(&net))),
        "BYTEA" => get::<Vec<u8>>(row, index)?.map(|bytes| Value::String(hex(&bytes))),
        "VOID" => None,

        "BOOL[]" => get_array::<bool>(row, index, Value::Bool)?,
        "INT2[]" => get_array::<i16>(row, index, Value::from)?,
        "INT4[]" => get_array::<i32>(row, index, Value::from)?,
        "INT8[]" => get_array::<i64>(row, index, Value::from)?,
        "FLOAT4[]" => get_array::<f32>(row, index, |f| float(f as f64))?,
        "FLOAT8[]" => get_array::<f64>(row, index, float)?,
        "NUMERIC[]" => get_array::<BigDecimal>(row, index, |d| Value::String(d.to_string()))?,
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => get_array::<String>(row, index, Value::String)?,
        "UUID[]" => get_array::<Uuid>(row, index, |u| Value::String(u.to_string()))?,
        "JSONB[]" => get_array::<Value>(row, index, |v| v)?,
        "TIMESTAMPTZ[]" => get_array::<DateTime<Utc>>(row, index, |t| Value::String(t.to_rfc3339()))?,
        "DATE[]" => get_array::<NaiveDate>(row, index, |d| Value::String(d.to_string()))?,

        // User-defined enums travel as their label text
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => row
            .try_get_unchecked::<Option<String>, _>(index)?
            .map(Value::String),

        other => {
            return Err(PostgresPoolError::UnsupportedType {
                column: column.to_string(),
                type_name: other.to_string(),
            })
        }
    };

    Ok(decoded.unwrap_or(Value::Null))
}

fn get<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>, sqlx::Error>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(index)
}

/// Decode a one-dimensional array; NULL elements become JSON null.
fn get_array<T>(
    row: &PgRow,
    index: usize,
    to_value: impl Fn(T) -> Value,
) -> Result<Option<Value>, sqlx::Error>
where
    T: for<'a> Decode<'a, Postgres> + Type<Postgres> + PgHasArrayType,
{
    let items = get::<Vec<Option<T>>>(row, index)?;
    Ok(items.map(|items| {
        Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&to_value).unwrap_or(Value::Null))
                .collect(),
        )
    }))
}

// NaN and infinities have no JSON representation
fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// ISO 8601 duration, e.g. `P1Y2M3DT4H5M6.5S`.
fn format_interval(interval: &PgInterval) -> String {
    const MICROS_PER_SECOND: i64 = 1_000_000;
    const MICROS_PER_MINUTE: i64 = 60 * MICROS_PER_SECOND;
    const MICROS_PER_HOUR: i64 = 60 * MICROS_PER_MINUTE;

    let mut out = String::from("P");
    let date_parts = [
        (interval.months / 12, 'Y'),
        (interval.months % 12, 'M'),
        (interval.days, 'D'),
    ];
    for (amount, unit) in date_parts {
        if amount != 0 {
            out.push_str(&format!("{}{}", amount, unit));
        }
    }

    let micros = interval.microseconds;
    let hours = micros / MICROS_PER_HOUR;
    let minutes = (micros % MICROS_PER_HOUR) / MICROS_PER_MINUTE;
    let rest = micros % MICROS_PER_MINUTE;

    if micros != 0 {
        out.push('T');
        if hours != 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes != 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if rest != 0 {
            let sign = if rest < 0 { "-" } else { "" };
            let rest = rest.abs();
            let seconds = rest / MICROS_PER_SECOND;
            let fraction = rest % MICROS_PER_SECOND;
            if fraction == 0 {
                out.push_str(&format!("{}{}S", sign, seconds));
            } else {
                let fraction = format!("{:06}", fraction);
                out.push_str(&format!("{}{}.{}S", sign, seconds, fraction.trim_end_matches('0')));
            }
        }
    }

    if out == "P" {
        out.push_str("T0S");
    }
    out
}

/// Host addresses print without a prefix, as PostgreSQL does for `inet`.
fn format_network(net: &IpNetwork) -> String {
    let host_prefix = if net.is_ipv4() { 32 } else { 128 };
    if net.prefix() == host_prefix {
        net.ip().to_string()
    } else {
        net.to_string()
    }
}

/// NULL parameter with no declared type.
///
/// Sent with type OID 0 so the server infers the type from context, which
/// lets `INSERT INTO t (n) VALUES ($1)` accept NULL for any column type.
#[derive(Debug, Clone, Copy)]
pub(crate) struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

/// Bind a positional parameter given as a JSON value.
///
/// Booleans and numbers bind as `BOOL`, `INT8` or `FLOAT8`; arrays and
/// objects bind as `JSONB`; null binds untyped. Strings bind as `TEXT`:
/// parameters are sent in binary format, so the server cannot reparse them
/// as another type. Cast the placeholder when the target column is not
/// textual, e.g. `VALUES ($1::date)`.
pub(crate) fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(param)),
    }
}

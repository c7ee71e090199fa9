//! Binary wire values to [`Value`]s.
//!
//! Cursor rows are fetched over the extended query protocol, so each column
//! arrives in PostgreSQL's binary format and is decoded by the `postgres`
//! crate's `FromSql` impls. The session's `DateStyle` and `bytea_output` do
//! not affect these values.
//!
//! `infinity` and `-infinity` dates and timestamps map to the largest and
//! smallest value of the Arrow column.

use std::error::Error;

use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{Date, FromSql, Timestamp, Type};

use crate::error::ConversionError;
use crate::types::Value;

type BoxError = Box<dyn Error + Sync + Send>;

/// One column of a fetched row, not yet decoded.
pub(crate) struct RawValue<'a> {
    ty: Type,
    bytes: Option<&'a [u8]>,
}

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Self {
            ty: ty.clone(),
            bytes: Some(raw),
        })
    }

    fn from_sql_null(ty: &Type) -> Result<Self, BoxError> {
        Ok(Self {
            ty: ty.clone(),
            bytes: None,
        })
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

/// `time` as microseconds since midnight.
///
/// chrono's `NaiveTime` wraps `24:00:00` to midnight, so the raw value is
/// read instead.
struct TimeOfDay(i64);

impl<'a> FromSql<'a> for TimeOfDay {
    fn from_sql(_: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let bytes: [u8; 8] = raw.try_into()?;
        Ok(Self(i64::from_be_bytes(bytes)))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::TIME
    }
}

/// Decode one column into the [`Value`] the Arrow column expects.
pub(crate) fn decode_value(
    raw: &RawValue<'_>,
    data_type: &DataType,
    column: &str,
) -> Result<Value, ConversionError> {
    let cell = Cell {
        ty: &raw.ty,
        bytes: raw.bytes,
        data_type,
        column,
    };

    let value = match data_type {
        DataType::Boolean => cell.read::<bool>()?.map(Value::Boolean),
        DataType::Int16 => cell.read::<i16>()?.map(Value::Int16),
        DataType::Int32 => cell.read::<i32>()?.map(Value::Int32),
        DataType::Int64 if *cell.ty == Type::OID => {
            cell.read::<u32>()?.map(|v| Value::Int64(i64::from(v)))
        }
        DataType::Int64 => cell.read::<i64>()?.map(Value::Int64),
        DataType::Float32 => cell.read::<f32>()?.map(Value::Float32),
        DataType::Float64 => cell.read::<f64>()?.map(Value::Float64),
        DataType::Utf8 => cell.read::<String>()?.map(Value::Utf8),
        DataType::Binary => cell.read::<Vec<u8>>()?.map(Value::Binary),
        DataType::Date32 => match cell.read::<Date<NaiveDate>>()? {
            Some(date) => Some(Value::Date32(cell.days(date)?)),
            None => None,
        },
        DataType::Time64(TimeUnit::Microsecond) => {
            cell.read::<TimeOfDay>()?.map(|t| Value::Time64(t.0))
        }
        DataType::Timestamp(TimeUnit::Microsecond, None) => cell
            .read::<Timestamp<NaiveDateTime>>()?
            .map(|ts| timestamp_micros(ts, |dt| dt.and_utc().timestamp_micros()))
            .map(Value::Timestamp),
        DataType::Timestamp(TimeUnit::Microsecond, Some(_)) => cell
            .read::<Timestamp<DateTime<Utc>>>()?
            .map(|ts| timestamp_micros(ts, |dt| dt.timestamp_micros()))
            .map(Value::Timestamp),
        other => return Err(ConversionError::UnsupportedType(format!("{other}"))),
    };
    Ok(value.unwrap_or(Value::Null))
}

struct Cell<'c, 'a> {
    ty: &'c Type,
    bytes: Option<&'a [u8]>,
    data_type: &'c DataType,
    column: &'c str,
}

impl<'a> Cell<'_, 'a> {
    fn read<T: FromSql<'a>>(&self) -> Result<Option<T>, ConversionError> {
        if !<Option<T> as FromSql<'a>>::accepts(self.ty) {
            return Err(ConversionError::TypeMismatch {
                column: self.column.to_string(),
                value: format!("postgres type {}", self.ty),
                expected: format!("{}", self.data_type),
            });
        }
        Option::<T>::from_sql_nullable(self.ty, self.bytes).map_err(|e| self.decode_error(e))
    }

    fn days(&self, date: Date<NaiveDate>) -> Result<i32, ConversionError> {
        match date {
            Date::PosInfinity => Ok(i32::MAX),
            Date::NegInfinity => Ok(i32::MIN),
            Date::Value(date) => i32::try_from((date - NaiveDate::default()).num_days())
                .map_err(|e| self.decode_error(e)),
        }
    }

    fn decode_error(&self, err: impl std::fmt::Display) -> ConversionError {
        ConversionError::Decode {
            column: self.column.to_string(),
            postgres_type: self.ty.to_string(),
            message: err.to_string(),
        }
    }
}

fn timestamp_micros<T>(ts: Timestamp<T>, micros: impl FnOnce(T) -> i64) -> i64 {
    match ts {
        Timestamp::PosInfinity => i64::MAX,
        Timestamp::NegInfinity => i64::MIN,
        Timestamp::Value(value) => micros(value),
    }
}

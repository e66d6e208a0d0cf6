//! The generic walker that reads and writes any field table.

use crate::error::{MiloError, Result};
use crate::stream::{ByteReader, ByteWriter, Endian};
use crate::symbol::Symbol;

use super::{FieldStep, LengthSource, Record, Value, WireType};

/// Full record, or the reduced form written for proxy entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordVariant {
    #[default]
    Full,
    Proxy,
}

/// Per-record state the walker needs.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext {
    pub endian: Endian,
    pub revision: u16,
    pub variant: RecordVariant,
}

impl FieldContext {
    #[must_use]
    pub const fn new(endian: Endian, revision: u16) -> Self {
        Self {
            endian,
            revision,
            variant: RecordVariant::Full,
        }
    }

    #[must_use]
    pub const fn with_variant(mut self, variant: RecordVariant) -> Self {
        self.variant = variant;
        self
    }
}

/// Read the fields of `steps` into `record`.
///
/// Steps that do not apply are derived when the table says how, and left
/// unset otherwise.
pub fn read_fields(
    reader: &mut ByteReader<'_>,
    cx: &FieldContext,
    type_name: &str,
    steps: &[FieldStep],
    record: &mut Record,
) -> Result<()> {
    for step in steps {
        if step.applies(cx) {
            let value = read_value(reader, cx, type_name, step.name, &step.wire, record)?;
            record.set(step.name, value);
        } else if let Some(derive) = step.derive {
            let value = derive(record);
            record.set(step.name, value);
        }
    }
    Ok(())
}

/// Write the fields of `steps` from `record`.
pub fn write_fields(
    writer: &mut ByteWriter,
    cx: &FieldContext,
    type_name: &str,
    steps: &[FieldStep],
    record: &Record,
) -> Result<()> {
    for step in steps.iter().filter(|step| step.applies(cx)) {
        let value = record
            .get(step.name)
            .ok_or_else(|| MiloError::schema_mismatch(type_name, step.name, "field missing"))?;
        write_value(writer, cx, type_name, step.name, &step.wire, value, record)?;
    }
    Ok(())
}

/// Recompute every derived field that the revision leaves off the wire.
///
/// Called before writing so byte counts that depend on derived values follow
/// edits made since the record was read.
pub fn refresh_derived(cx: &FieldContext, steps: &[FieldStep], record: &mut Record) {
    for step in steps {
        if !step.applies(cx)
            && let Some(derive) = step.derive
        {
            let value = derive(record);
            record.set(step.name, value);
        }
    }
}

/// Record holding zero values for every field present in the context.
#[must_use]
pub fn default_record(steps: &[FieldStep], cx: &FieldContext) -> Record {
    let mut record = Record::new();
    for step in steps {
        if step.applies(cx) {
            let value = match step.wire {
                WireType::Bytes(LengthSource::Derived(length)) => {
                    Value::Bytes(vec![0; length(&record).unwrap_or(0)])
                }
                wire => wire.zero(cx),
            };
            record.set(step.name, value);
        } else if let Some(derive) = step.derive {
            let value = derive(&record);
            record.set(step.name, value);
        }
    }
    record
}

fn read_value(
    reader: &mut ByteReader<'_>,
    cx: &FieldContext,
    type_name: &str,
    field: &str,
    wire: &WireType,
    scope: &Record,
) -> Result<Value> {
    let endian = cx.endian;
    let value = match wire {
        WireType::U8 => Value::U8(reader.read_u8()?),
        WireType::Bool => Value::Bool(reader.read_bool()?),
        WireType::U16 => Value::U16(reader.read_u16(endian)?),
        WireType::I16 => Value::I16(reader.read_i16(endian)?),
        WireType::U32 => Value::U32(reader.read_u32(endian)?),
        WireType::I32 => Value::I32(reader.read_i32(endian)?),
        WireType::F32 => Value::F32(reader.read_f32(endian)?),
        WireType::Symbol => Value::Symbol(Symbol::read(reader, endian)?),
        WireType::Bytes(LengthSource::Prefixed) => {
            let len = reader.read_count(endian, 1)?;
            Value::Bytes(reader.read_bytes(len)?.to_vec())
        }
        WireType::Bytes(LengthSource::Derived(length)) => {
            let len = length(scope).ok_or_else(|| {
                MiloError::schema_mismatch(type_name, field, "length cannot be derived")
            })?;
            Value::Bytes(reader.read_bytes(len)?.to_vec())
        }
        WireType::List(item) => {
            let count = reader.read_count(endian, item.min_size())?;
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(read_value(reader, cx, type_name, field, item, scope)?);
            }
            Value::List(items)
        }
        WireType::Array(item, count) => {
            let mut items = Vec::with_capacity(*count);
            for _ in 0..*count {
                items.push(read_value(reader, cx, type_name, field, item, scope)?);
            }
            Value::List(items)
        }
        WireType::Struct(steps) => {
            let mut nested = Record::new();
            read_fields(reader, cx, type_name, steps, &mut nested)?;
            Value::Struct(nested)
        }
    };
    Ok(value)
}

fn write_value(
    writer: &mut ByteWriter,
    cx: &FieldContext,
    type_name: &str,
    field: &str,
    wire: &WireType,
    value: &Value,
    scope: &Record,
) -> Result<()> {
    let endian = cx.endian;
    let mismatch = || {
        MiloError::schema_mismatch(
            type_name,
            field,
            format!("expected {}, found {}", wire_name(wire), value.kind()),
        )
    };
    match (wire, value) {
        (WireType::U8, Value::U8(v)) => writer.write_u8(*v),
        (WireType::Bool, Value::Bool(v)) => writer.write_bool(*v),
        (WireType::U16, Value::U16(v)) => writer.write_u16(endian, *v),
        (WireType::I16, Value::I16(v)) => writer.write_i16(endian, *v),
        (WireType::U32, Value::U32(v)) => writer.write_u32(endian, *v),
        (WireType::I32, Value::I32(v)) => writer.write_i32(endian, *v),
        (WireType::F32, Value::F32(v)) => writer.write_f32(endian, *v),
        (WireType::Symbol, Value::Symbol(v)) => v.write(writer, endian)?,
        (WireType::Bytes(LengthSource::Prefixed), Value::Bytes(bytes)) => {
            writer.write_count(endian, bytes.len())?;
            writer.write_bytes(bytes);
        }
        (WireType::Bytes(LengthSource::Derived(length)), Value::Bytes(bytes)) => {
            let expected = length(scope).ok_or_else(|| {
                MiloError::schema_mismatch(type_name, field, "length cannot be derived")
            })?;
            if bytes.len() != expected {
                return Err(MiloError::schema_mismatch(
                    type_name,
                    field,
                    format!("expected {expected} bytes, found {}", bytes.len()),
                ));
            }
            writer.write_bytes(bytes);
        }
        (WireType::List(item), Value::List(items)) => {
            writer.write_count(endian, items.len())?;
            for value in items {
                write_value(writer, cx, type_name, field, item, value, scope)?;
            }
        }
        (WireType::Array(item, count), Value::List(items)) => {
            if items.len() != *count {
                return Err(MiloError::schema_mismatch(
                    type_name,
                    field,
                    format!("expected {count} items, found {}", items.len()),
                ));
            }
            for value in items {
                write_value(writer, cx, type_name, field, item, value, scope)?;
            }
        }
        (WireType::Struct(steps), Value::Struct(nested)) => {
            let mut nested = nested.clone();
            refresh_derived(cx, steps, &mut nested);
            write_fields(writer, cx, type_name, steps, &nested)?;
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

fn wire_name(wire: &WireType) -> &'static str {
    match wire {
        WireType::U8 => "u8",
        WireType::Bool => "bool",
        WireType::U16 => "u16",
        WireType::I16 => "i16",
        WireType::U32 => "u32",
        WireType::I32 => "i32",
        WireType::F32 => "f32",
        WireType::Symbol => "symbol",
        WireType::Bytes(_) => "bytes",
        WireType::List(_) | WireType::Array(..) => "list",
        WireType::Struct(_) => "struct",
    }
}

#[cfg(test)]
mod tests {
    use super::super::RevisionPredicate::{AtLeast, Always, Between};
    use super::super::Schema;
    use super::*;

    fn doubled_len(record: &Record) -> Option<usize> {
        record.u32("count").map(|count| count as usize * 2)
    }

    fn default_scale(_: &Record) -> Value {
        Value::F32(1.0)
    }

    const POINT: &[FieldStep] = &[
        FieldStep::new("x", Always, WireType::I16),
        FieldStep::new("scale", AtLeast(3), WireType::F32).derived(default_scale),
    ];
    static POINT_WIRE: WireType = WireType::Struct(POINT);

    static FIELDS: &[FieldStep] = &[
        FieldStep::new("name", Always, WireType::Symbol),
        FieldStep::new("legacy", Between(1, 2), WireType::U8),
        FieldStep::new("count", Always, WireType::U32),
        FieldStep::new("data", Always, WireType::Bytes(LengthSource::Derived(doubled_len))),
        FieldStep::new("points", AtLeast(2), WireType::List(&POINT_WIRE)),
        FieldStep::new("environ", Always, WireType::Symbol).full_only(),
    ];
    static TEST: Schema = Schema::new("Test", &[1, 2, 3], FIELDS);

    fn write(record: &Record, cx: &FieldContext) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        write_fields(&mut writer, cx, TEST.type_name, TEST.fields, record).unwrap();
        writer.into_bytes()
    }

    fn read(bytes: &[u8], cx: &FieldContext) -> Record {
        let mut reader = ByteReader::new(bytes);
        let mut record = Record::new();
        read_fields(&mut reader, cx, TEST.type_name, TEST.fields, &mut record).unwrap();
        assert!(reader.is_empty(), "walker left {} bytes", reader.remaining());
        record
    }

    #[test]
    fn test_default_record_roundtrip_every_revision() {
        for &revision in TEST.revisions {
            for endian in [Endian::Big, Endian::Little] {
                let cx = FieldContext::new(endian, revision);
                let record = default_record(TEST.fields, &cx);
                let first = write(&record, &cx);
                let second = write(&read(&first, &cx), &cx);
                assert_eq!(first, second, "revision {revision} {endian}");
            }
        }
    }

    #[test]
    fn test_closed_interval_field() {
        let at = |revision| default_record(TEST.fields, &FieldContext::new(Endian::Big, revision));
        assert!(at(1).contains("legacy"));
        assert!(at(2).contains("legacy"));
        assert!(!at(3).contains("legacy"));
    }

    #[test]
    fn test_derived_length_consumes_exact_bytes() {
        let cx = FieldContext::new(Endian::Little, 1);
        let record = Record::new()
            .with("name", "a")
            .with("legacy", 7u8)
            .with("count", 2u32)
            .with("data", vec![1, 2, 3, 4])
            .with("environ", "");
        let bytes = write(&record, &cx);
        let back = read(&bytes, &cx);
        assert_eq!(back.bytes("data"), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_derived_length_mismatch_on_write() {
        let cx = FieldContext::new(Endian::Little, 1);
        let record = Record::new()
            .with("name", "a")
            .with("legacy", 7u8)
            .with("count", 3u32)
            .with("data", vec![1, 2])
            .with("environ", "");
        let mut writer = ByteWriter::new();
        let err = write_fields(&mut writer, &cx, "Test", TEST.fields, &record).unwrap_err();
        assert!(matches!(err, MiloError::SchemaMismatch { ref field, .. } if field == "data"));
    }

    #[test]
    fn test_derivation_fills_absent_nested_field() {
        let cx = FieldContext::new(Endian::Big, 2);
        let mut record = default_record(TEST.fields, &cx);
        record.set(
            "points",
            Value::List(vec![Value::Struct(Record::new().with("x", 5i16))]),
        );
        let back = read(&write(&record, &cx), &cx);
        let point = back.list("points").unwrap()[0].as_struct().unwrap();
        assert_eq!(point.get("x"), Some(&Value::I16(5)));
        assert_eq!(point.f32("scale"), Some(1.0));
    }

    #[test]
    fn test_proxy_variant_omits_full_only_fields() {
        let full = FieldContext::new(Endian::Big, 3);
        let proxy = full.with_variant(RecordVariant::Proxy);
        let record = default_record(TEST.fields, &full);
        let full_bytes = write(&record, &full);
        let proxy_bytes = write(&record, &proxy);
        assert_eq!(full_bytes.len(), proxy_bytes.len() + 4);
        assert!(!read(&proxy_bytes, &proxy).contains("environ"));
    }

    #[test]
    fn test_kind_mismatch() {
        let cx = FieldContext::new(Endian::Big, 3);
        let mut record = default_record(TEST.fields, &cx);
        record.set("count", Value::Bool(true));
        let mut writer = ByteWriter::new();
        assert!(write_fields(&mut writer, &cx, "Test", TEST.fields, &record).is_err());
    }

    #[test]
    fn test_truncated_list() {
        let cx = FieldContext::new(Endian::Little, 3);
        let mut bytes = write(&default_record(TEST.fields, &cx), &cx);
        // name(4) + count(4) + data(0), then the list count
        bytes[8] = 0xFF;
        let mut reader = ByteReader::new(&bytes);
        let mut record = Record::new();
        let err = read_fields(&mut reader, &cx, "Test", TEST.fields, &mut record).unwrap_err();
        assert!(matches!(err, MiloError::TruncatedStream { .. }));
    }
}

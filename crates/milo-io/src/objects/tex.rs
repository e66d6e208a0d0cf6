//! `Tex`: texture metadata and, in early revisions, the pixel data itself.

use crate::schema::RevisionPredicate::{Always, AtLeast, AtMost, Between};
use crate::schema::{FieldStep, LengthSource, Record, Schema, Value, WireType};

/// Early revisions store the bitmap inline, sized by the dimensions.
fn bitmap_len(record: &Record) -> Option<usize> {
    let width = record.u32("width")? as usize;
    let height = record.u32("height")? as usize;
    let bpp = record.u32("bpp")? as usize;
    width.checked_mul(height)?.checked_mul(bpp).map(|bits| bits / 8)
}

fn uses_ext_path(record: &Record) -> Value {
    Value::Bool(record.symbol("ext_path").is_some_and(|path| !path.is_empty()))
}

static FIELDS: &[FieldStep] = &[
    FieldStep::new("width", Always, WireType::U32),
    FieldStep::new("height", Always, WireType::U32),
    FieldStep::new("bpp", Always, WireType::U32),
    FieldStep::new("ext_path", Always, WireType::Symbol),
    FieldStep::new("use_ext_path", AtLeast(6), WireType::Bool).derived(uses_ext_path),
    FieldStep::new("index_f", Between(8, 10), WireType::F32),
    FieldStep::new("index", AtLeast(8), WireType::I32),
    FieldStep::new("optimize_for_ps3", AtLeast(10), WireType::Bool),
    FieldStep::new(
        "bitmap",
        AtMost(6),
        WireType::Bytes(LengthSource::Derived(bitmap_len)),
    ),
];

pub static TEX: Schema = Schema::new("Tex", &[5, 6, 7, 8, 9, 10, 11], FIELDS);

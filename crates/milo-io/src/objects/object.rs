//! `Object`: the base record most asset types start with.

use crate::schema::RevisionPredicate::{Always, AtLeast};
use crate::schema::{FieldStep, LengthSource, Schema, WireType};

static FIELDS: &[FieldStep] = &[
    FieldStep::new("type_name", Always, WireType::Symbol),
    FieldStep::new("props", AtLeast(1), WireType::Bytes(LengthSource::Prefixed)),
    FieldStep::new("note", AtLeast(2), WireType::Symbol),
];

pub static OBJECT: Schema = Schema::new("Object", &[0, 1, 2], FIELDS);

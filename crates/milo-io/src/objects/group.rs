//! `Group`: an ordered set of drawables.

use crate::schema::RevisionPredicate::{Always, AtLeast, Between};
use crate::schema::{FieldStep, Schema, WireType};

static FIELDS: &[FieldStep] = &[
    FieldStep::new("objects", Always, WireType::List(&WireType::Symbol)),
    FieldStep::new("environ", Always, WireType::Symbol).full_only(),
    FieldStep::new("draw_only", AtLeast(11), WireType::Symbol).full_only(),
    FieldStep::new("lod", Between(12, 13), WireType::Symbol),
    FieldStep::new("lod_screen_size", Between(12, 13), WireType::F32),
    FieldStep::new("sort_in_world", AtLeast(14), WireType::Bool),
];

pub static GROUP: Schema = Schema::new("Group", &[10, 11, 12, 13, 14], FIELDS);

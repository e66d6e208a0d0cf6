//! `ObjectDir`: the record carried by a directory's own payload.

use crate::schema::RevisionPredicate::{Always, AtLeast, Between};
use crate::schema::{FieldStep, Schema, WireType};

static FIELDS: &[FieldStep] = &[
    FieldStep::new("path_name", Always, WireType::Symbol),
    FieldStep::new("viewports", Between(17, 21), WireType::List(&WireType::F32)),
    FieldStep::new("curr_viewport", AtLeast(19), WireType::U32).full_only(),
    FieldStep::new("inline_proxy", AtLeast(18), WireType::Bool),
    FieldStep::new("proxy_file", AtLeast(18), WireType::Symbol),
    FieldStep::new("subdirs", Always, WireType::List(&WireType::Symbol)).full_only(),
];

pub static OBJECT_DIR: Schema = Schema::new("ObjectDir", &[16, 17, 18, 19, 20, 21, 22], FIELDS);

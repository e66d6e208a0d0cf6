//! `CharBonesSamples`: baked animation samples for a set of bones.
//!
//! Each bone drives one channel, named by its suffix. A frame packs every
//! channel of every bone, grouped by channel kind in this order:
//!
//! | Suffix  | Bytes per bone |
//! |---------|----------------|
//! | `.pos`  | 12 |
//! | `.scale`| 12 |
//! | `.quat` | 16 |
//! | `.rotx` | 4 |
//! | `.roty` | 4 |
//! | `.rotz` | 4 |
//!
//! Revisions before 15 do not store the per-kind counts; they are derived
//! from the bone names.

use crate::schema::RevisionPredicate::{Always, AtLeast};
use crate::schema::{FieldStep, LengthSource, Record, Schema, Value, WireType};

const CHANNELS: [(&str, usize); 6] = [
    (".pos", 12),
    (".scale", 12),
    (".quat", 16),
    (".rotx", 4),
    (".roty", 4),
    (".rotz", 4),
];

fn unit_weight(_: &Record) -> Value {
    Value::F32(1.0)
}

const BONE: &[FieldStep] = &[
    FieldStep::new("name", Always, WireType::Symbol),
    FieldStep::new("weight", AtLeast(14), WireType::F32).derived(unit_weight),
];

static BONE_WIRE: WireType = WireType::Struct(BONE);

fn counts_from_names(record: &Record) -> Value {
    let mut counts = [0u32; 6];
    for bone in record.list("bones").unwrap_or_default() {
        let Some(name) = bone.as_struct().and_then(|bone| bone.symbol("name")) else {
            continue;
        };
        if let Some(slot) = CHANNELS
            .iter()
            .position(|(suffix, _)| name.as_str().ends_with(suffix))
        {
            counts[slot] += 1;
        }
    }
    Value::List(counts.into_iter().map(Value::U32).collect())
}

/// Bytes in one sample frame for the given per-channel counts.
#[must_use]
pub fn frame_size(counts: &[u32]) -> Option<usize> {
    counts
        .iter()
        .zip(CHANNELS)
        .try_fold(0usize, |total, (&count, (_, width))| {
            (count as usize).checked_mul(width)?.checked_add(total)
        })
}

fn samples_len(record: &Record) -> Option<usize> {
    let counts: Vec<u32> = record
        .list("counts")?
        .iter()
        .map(Value::as_u32)
        .collect::<Option<_>>()?;
    let frames = record.u32("num_samples")? as usize;
    frame_size(&counts)?.checked_mul(frames)
}

static FIELDS: &[FieldStep] = &[
    FieldStep::new("bones", Always, WireType::List(&BONE_WIRE)),
    FieldStep::new("counts", AtLeast(15), WireType::Array(&WireType::U32, 6))
        .derived(counts_from_names),
    FieldStep::new("num_samples", Always, WireType::U32),
    FieldStep::new("frames", AtLeast(16), WireType::List(&WireType::F32)),
    FieldStep::new(
        "samples",
        Always,
        WireType::Bytes(LengthSource::Derived(samples_len)),
    ),
];

pub static CHAR_BONES_SAMPLES: Schema =
    Schema::new("CharBonesSamples", &[13, 14, 15, 16], FIELDS);

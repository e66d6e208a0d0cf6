//! `Trans`: a node's local and world transforms.

use crate::schema::RevisionPredicate::{Always, AtLeast, Less};
use crate::schema::{FieldStep, Schema, WireType};

/// 3x3 rotation followed by a translation.
const XFM: WireType = WireType::Array(&WireType::F32, 12);

static FIELDS: &[FieldStep] = &[
    FieldStep::new("local_xfm", Always, XFM),
    FieldStep::new("world_xfm", Always, XFM),
    FieldStep::new("trans_objects", Less(8), WireType::List(&WireType::Symbol)),
    FieldStep::new("constraint", Always, WireType::U32),
    FieldStep::new("target", AtLeast(6), WireType::Symbol),
    FieldStep::new("preserve_scale", AtLeast(7), WireType::Bool),
    FieldStep::new("parent", AtLeast(7), WireType::Symbol),
];

pub static TRANS: Schema = Schema::new("Trans", &[5, 6, 7, 8, 9], FIELDS);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{MiloObject, SchemaObject, write_record};
    use crate::revision::RevisionPair;
    use crate::stream::Endian;

    #[test]
    fn test_transform_sizes() {
        let trans = SchemaObject::new(&TRANS, RevisionPair::new(9, 0));
        let bytes = write_record(&trans, Endian::Big).unwrap();
        // revision, two matrices, constraint, target, preserve_scale, parent, sentinel
        assert_eq!(bytes.len(), 4 + 96 + 4 + 4 + 1 + 4 + 4);
        assert_eq!(trans.record().unwrap().list("local_xfm").unwrap().len(), 12);
    }

    #[test]
    fn test_trans_objects_dropped_at_8() {
        assert!(TRANS.fields_at(7).contains(&"trans_objects"));
        assert!(!TRANS.fields_at(8).contains(&"trans_objects"));
    }
}

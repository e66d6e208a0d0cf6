//! Built-in record types.
//!
//! Each type is a static [`Schema`](crate::schema::Schema) table. Adding a
//! type means writing its table and registering it here.

mod char_bones;
mod group;
mod object;
mod object_dir;
mod tex;
mod trans;

pub use char_bones::{CHAR_BONES_SAMPLES, frame_size};
pub use group::GROUP;
pub use object::OBJECT;
pub use object_dir::OBJECT_DIR;
pub use tex::TEX;
pub use trans::TRANS;

use crate::registry::{TypeKind, TypeRegistry};

/// Register every built-in type.
pub fn register_builtin(registry: &mut TypeRegistry) {
    registry.register_schema(&OBJECT, TypeKind::Object);
    registry.register_schema(&TRANS, TypeKind::Object);
    registry.register_schema(&TEX, TypeKind::Object);
    registry.register_schema(&GROUP, TypeKind::Object);
    registry.register_schema(&CHAR_BONES_SAMPLES, TypeKind::Object);
    registry.register_schema(&OBJECT_DIR, TypeKind::Directory);
    registry.register_schema_as("RndDir", &OBJECT_DIR, TypeKind::Directory);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let mut registry = TypeRegistry::empty();
        register_builtin(&mut registry);
        assert_eq!(
            registry.type_names(),
            vec!["CharBonesSamples", "Group", "Object", "ObjectDir", "RndDir", "Tex", "Trans"]
        );
        assert_eq!(registry.revisions("RndDir"), OBJECT_DIR.revisions);
    }
}

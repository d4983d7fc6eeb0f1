//! Packed union-of-kinds representation.
//!
//! A union carries at most one of each kind: the five primitives live in a
//! bitset, and each compound kind (array, class, map, enum) occupies a
//! single slot. Merging two unions is a bitwise OR plus a per-slot merge,
//! which keeps unification O(1) in the number of member kinds and gives a
//! fixed canonical iteration order for stable rendering.

use crate::graph::{ClassId, EnumData, IrType, NameSet, Named};

const NULL: u8 = 1 << 0;
const INTEGER: u8 = 1 << 1;
const DOUBLE: u8 = 1 << 2;
const BOOL: u8 = 1 << 3;
const STRING: u8 = 1 << 4;

/// "At most one of each kind" disjunction of types.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionRep {
    pub names: NameSet,
    primitives: u8,
    pub array_type: Option<Box<IrType>>,
    pub class_ref: Option<ClassId>,
    pub map_type: Option<Box<IrType>>,
    pub enum_data: Option<EnumData>,
}

impl UnionRep {
    pub fn empty() -> Self {
        UnionRep {
            names: Named::none(),
            primitives: 0,
            array_type: None,
            class_ref: None,
            map_type: None,
            enum_data: None,
        }
    }

    /// Sets the bit for a primitive kind. Only the five primitive variants
    /// are legal here; compound kinds go through their slots.
    pub fn insert_primitive(&mut self, t: IrType) {
        self.primitives |= match t {
            IrType::Null => NULL,
            IrType::Integer => INTEGER,
            IrType::Double => DOUBLE,
            IrType::Bool => BOOL,
            IrType::String => STRING,
            other => unreachable!("not a primitive kind: {other:?}"),
        };
    }

    pub fn has_null(&self) -> bool {
        self.primitives & NULL != 0
    }

    /// True when both `Integer` and `Double` were observed. Emission
    /// collapses the pair to `Double`, but the bits stay distinct so
    /// renderers can see the mixed origin.
    pub fn is_mixed_numeric(&self) -> bool {
        self.primitives & INTEGER != 0 && self.primitives & DOUBLE != 0
    }

    pub fn is_empty(&self) -> bool {
        self.primitives == 0
            && self.array_type.is_none()
            && self.class_ref.is_none()
            && self.map_type.is_none()
            && self.enum_data.is_none()
    }

    /// Member kinds in canonical order: `Null, Integer, Double, Bool,
    /// String, Array, Class, Map, Enum`. When both numeric bits are set,
    /// only `Double` is visited.
    pub fn members(&self) -> Vec<IrType> {
        let mut out = Vec::new();
        if self.primitives & NULL != 0 {
            out.push(IrType::Null);
        }
        if self.primitives & INTEGER != 0 && self.primitives & DOUBLE == 0 {
            out.push(IrType::Integer);
        }
        if self.primitives & DOUBLE != 0 {
            out.push(IrType::Double);
        }
        if self.primitives & BOOL != 0 {
            out.push(IrType::Bool);
        }
        if self.primitives & STRING != 0 {
            out.push(IrType::String);
        }
        if let Some(elem) = &self.array_type {
            out.push(IrType::Array(elem.clone()));
        }
        if let Some(id) = self.class_ref {
            out.push(IrType::Class(id));
        }
        if let Some(elem) = &self.map_type {
            out.push(IrType::Map(elem.clone()));
        }
        if let Some(e) = &self.enum_data {
            out.push(IrType::Enum(e.clone()));
        }
        out
    }

    pub fn for_each(&self, mut f: impl FnMut(&IrType)) {
        for member in self.members() {
            f(&member);
        }
    }

    pub fn is_member(&self, t: &IrType) -> bool {
        self.members().iter().any(|m| m == t)
    }

    /// Clears the null bit, reporting whether it was set.
    pub fn remove_null(mut self) -> (bool, UnionRep) {
        let had = self.has_null();
        self.primitives &= !NULL;
        (had, self)
    }

    /// If this union is `T | Null` for exactly one non-null kind `T`,
    /// returns `T`.
    pub fn nullable_from_union(&self) -> Option<IrType> {
        if !self.has_null() {
            return None;
        }
        let mut non_null = self.members();
        non_null.retain(|m| !matches!(m, IrType::Null));
        match non_null.len() {
            1 => non_null.pop(),
            _ => None,
        }
    }

    /// Wraps into an [`IrType`], mapping the empty union to `NoInformation`.
    pub fn into_type(self) -> IrType {
        if self.is_empty() {
            IrType::NoInformation
        } else {
            IrType::Union(self)
        }
    }

    /// Bitwise union of the primitive sets; compound slot merging is the
    /// inference engine's job since class slots may mutate the arena.
    pub(crate) fn or_primitives(&mut self, other: &UnionRep) {
        self.primitives |= other.primitives;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn members_follow_canonical_order() {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::String);
        u.insert_primitive(IrType::Null);
        u.insert_primitive(IrType::Bool);
        u.array_type = Some(Box::new(IrType::Integer));
        assert_eq!(
            u.members(),
            vec![
                IrType::Null,
                IrType::Bool,
                IrType::String,
                IrType::Array(Box::new(IrType::Integer)),
            ]
        );
    }

    #[test]
    fn for_each_visits_every_member() {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::Null);
        u.insert_primitive(IrType::Integer);
        u.map_type = Some(Box::new(IrType::Bool));
        let mut visited = Vec::new();
        u.for_each(|m| visited.push(m.clone()));
        assert_eq!(
            visited,
            vec![IrType::Null, IrType::Integer, IrType::Map(Box::new(IrType::Bool))]
        );
        assert!(u.is_member(&IrType::Integer));
        assert!(!u.is_member(&IrType::String));
    }

    #[test]
    fn mixed_numeric_emits_double_once() {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::Integer);
        u.insert_primitive(IrType::Double);
        assert!(u.is_mixed_numeric());
        assert_eq!(u.members(), vec![IrType::Double]);
    }

    #[test]
    fn nullable_detection() {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::Null);
        u.insert_primitive(IrType::Integer);
        assert_eq!(u.nullable_from_union(), Some(IrType::Integer));

        u.insert_primitive(IrType::String);
        assert_eq!(u.nullable_from_union(), None);
    }

    #[test]
    fn remove_null_reports_presence() {
        let mut u = UnionRep::empty();
        u.insert_primitive(IrType::Null);
        u.insert_primitive(IrType::Bool);
        let (had, rest) = u.remove_null();
        assert!(had);
        assert_eq!(rest.members(), vec![IrType::Bool]);

        let (had, _) = rest.remove_null();
        assert!(!had);
    }

    #[test]
    fn empty_union_becomes_no_information() {
        assert_eq!(UnionRep::empty().into_type(), IrType::NoInformation);
    }
}

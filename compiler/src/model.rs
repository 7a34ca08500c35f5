// model.rs — Typed schema model
//
// In-memory form of a parsed ADT schema: one declaration per top-level
// entry (newtype, record, or sum), each holding `TypeRef` operand slots.
// The model is produced by `parse`, mutated only by `boxing` (the
// `is_boxed`/`is_sized` flags), and read by every downstream phase.
//
// Preconditions: produced by the shape-directed parser from a decoded
//                YAML document.
// Postconditions: declaration and case order match the schema's own order.
// Failure modes: none (data-only module).
// Side effects: none.

use std::fmt;

use serde::Deserialize;

/// Leaf names the generator treats as built-in rather than schema-defined.
pub const PRIMITIVES: &[&str] = &["u8", "char", "bool", "usize", "str", "String"];

/// The sole unsized primitive; must end up behind a box wherever it surfaces.
pub const UNSIZED_PRIMITIVE: &str = "str";

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

// ── Type references ─────────────────────────────────────────────────────────

/// What a `TypeRef` points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Leaf reference by name (a top-level type or a primitive).
    Name(String),
    /// Unit-payload sentinel: an empty sequence in operand position.
    Unit,
    /// Array element type: the contained ref of a one-element sequence.
    Elem(Box<TypeRef>),
}

/// A reference to another type, with the wrapper attributes that decide its
/// surface form (`Vec`, `Box`, `Option`) and its sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub target: Target,
    pub is_array: bool,
    pub is_optional: bool,
    pub is_boxed: bool,
    pub is_sized: bool,
}

impl TypeRef {
    pub fn leaf(name: impl Into<String>) -> Self {
        TypeRef {
            target: Target::Name(name.into()),
            is_array: false,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        }
    }

    pub fn unit() -> Self {
        TypeRef {
            target: Target::Unit,
            is_array: false,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        }
    }

    /// The leaf name this ref ultimately points at, descending through
    /// array elements. `None` for the unit-payload sentinel.
    pub fn leaf_name(&self) -> Option<&str> {
        match &self.target {
            Target::Name(n) => Some(n),
            Target::Unit => None,
            Target::Elem(inner) => inner.leaf_name(),
        }
    }

    /// Whether this slot's immediate target is the named leaf (arrays
    /// excluded — their edge to the element type is a heap boundary).
    pub fn direct_leaf(&self) -> Option<&str> {
        if self.is_array {
            return None;
        }
        match &self.target {
            Target::Name(n) => Some(n),
            _ => None,
        }
    }
}

// ── Declarations ────────────────────────────────────────────────────────────

/// A type with 0 or 1 unnamed operand: a unit marker or transparent wrapper.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtypeDecl {
    pub name: String,
    pub operands: Vec<TypeRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeRef,
}

/// A tuple of named, typed fields. Field order is the schema's.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseDecl {
    pub name: String,
    pub operands: Vec<TypeRef>,
}

/// A tagged union of named alternatives. Case order is the schema's and
/// doubles as the runtime tag assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SumDecl {
    pub name: String,
    pub cases: Vec<CaseDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Newtype(NewtypeDecl),
    Record(RecordDecl),
    Sum(SumDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Newtype(d) => &d.name,
            Decl::Record(d) => &d.name,
            Decl::Sum(d) => &d.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Decl::Newtype(_) => "newtype",
            Decl::Record(_) => "record",
            Decl::Sum(_) => "sum",
        }
    }
}

// ── Config ──────────────────────────────────────────────────────────────────

/// The optional `config` section of the schema document. Unknown keys are
/// ignored by the deserializer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub derive: Vec<String>,
    #[serde(default)]
    pub visibility: Option<String>,
}

// ── Schema ──────────────────────────────────────────────────────────────────

/// Identifies one operand slot in the schema, for mutation by the cycle
/// breaker and payload lookup by the cast planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotId {
    NewtypeOperand { decl: usize, operand: usize },
    RecordField { decl: usize, field: usize },
    CaseOperand { decl: usize, case: usize, operand: usize },
}

/// The parsed schema: declarations in document order plus the config copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub decls: Vec<Decl>,
    pub config: Config,
}

impl Schema {
    pub fn decl(&self, name: &str) -> Option<&Decl> {
        self.decls.iter().find(|d| d.name() == name)
    }

    pub fn slot(&self, id: SlotId) -> &TypeRef {
        match id {
            SlotId::NewtypeOperand { decl, operand } => match &self.decls[decl] {
                Decl::Newtype(d) => &d.operands[operand],
                other => panic!("slot {:?} does not address a newtype: {:?}", id, other.name()),
            },
            SlotId::RecordField { decl, field } => match &self.decls[decl] {
                Decl::Record(d) => &d.fields[field].ty,
                other => panic!("slot {:?} does not address a record: {:?}", id, other.name()),
            },
            SlotId::CaseOperand { decl, case, operand } => match &self.decls[decl] {
                Decl::Sum(d) => &d.cases[case].operands[operand],
                other => panic!("slot {:?} does not address a sum: {:?}", id, other.name()),
            },
        }
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut TypeRef {
        match id {
            SlotId::NewtypeOperand { decl, operand } => match &mut self.decls[decl] {
                Decl::Newtype(d) => &mut d.operands[operand],
                other => panic!("slot {:?} does not address a newtype: {:?}", id, other.name()),
            },
            SlotId::RecordField { decl, field } => match &mut self.decls[decl] {
                Decl::Record(d) => &mut d.fields[field].ty,
                other => panic!("slot {:?} does not address a record: {:?}", id, other.name()),
            },
            SlotId::CaseOperand { decl, case, operand } => match &mut self.decls[decl] {
                Decl::Sum(d) => &mut d.cases[case].operands[operand],
                other => panic!("slot {:?} does not address a sum: {:?}", id, other.name()),
            },
        }
    }

    /// Visit every `TypeRef` in the schema, nested array elements included.
    pub fn for_each_ref(&self, mut visit: impl FnMut(SlotId, &TypeRef)) {
        fn descend(id: SlotId, r: &TypeRef, visit: &mut impl FnMut(SlotId, &TypeRef)) {
            visit(id, r);
            if let Target::Elem(inner) = &r.target {
                descend(id, inner, visit);
            }
        }
        for (di, decl) in self.decls.iter().enumerate() {
            match decl {
                Decl::Newtype(d) => {
                    for (oi, op) in d.operands.iter().enumerate() {
                        descend(
                            SlotId::NewtypeOperand { decl: di, operand: oi },
                            op,
                            &mut visit,
                        );
                    }
                }
                Decl::Record(d) => {
                    for (fi, f) in d.fields.iter().enumerate() {
                        descend(SlotId::RecordField { decl: di, field: fi }, &f.ty, &mut visit);
                    }
                }
                Decl::Sum(d) => {
                    for (ci, c) in d.cases.iter().enumerate() {
                        for (oi, op) in c.operands.iter().enumerate() {
                            descend(
                                SlotId::CaseOperand { decl: di, case: ci, operand: oi },
                                op,
                                &mut visit,
                            );
                        }
                    }
                }
            }
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Schema ({} declarations)", self.decls.len())?;
        for decl in &self.decls {
            match decl {
                Decl::Newtype(d) => {
                    writeln!(f, "  newtype {} ({} operands)", d.name, d.operands.len())?
                }
                Decl::Record(d) => {
                    writeln!(f, "  record {} ({} fields)", d.name, d.fields.len())?
                }
                Decl::Sum(d) => writeln!(f, "  sum {} ({} cases)", d.name, d.cases.len())?,
            }
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_name_descends_through_arrays() {
        let r = TypeRef {
            target: Target::Elem(Box::new(TypeRef::leaf("Datum"))),
            is_array: true,
            is_optional: false,
            is_boxed: false,
            is_sized: true,
        };
        assert_eq!(r.leaf_name(), Some("Datum"));
        assert_eq!(r.direct_leaf(), None, "array slots expose no direct leaf");
    }

    #[test]
    fn slot_roundtrip_through_ids() {
        let mut schema = Schema {
            decls: vec![Decl::Sum(SumDecl {
                name: "Datum".into(),
                cases: vec![CaseDecl {
                    name: "Quotation".into(),
                    operands: vec![TypeRef::leaf("Datum")],
                }],
            })],
            config: Config::default(),
        };
        let id = SlotId::CaseOperand { decl: 0, case: 0, operand: 0 };
        assert!(!schema.slot(id).is_boxed);
        schema.slot_mut(id).is_boxed = true;
        assert!(schema.slot(id).is_boxed);
    }

    #[test]
    fn for_each_ref_visits_array_elements() {
        let schema = Schema {
            decls: vec![Decl::Newtype(NewtypeDecl {
                name: "List".into(),
                operands: vec![TypeRef {
                    target: Target::Elem(Box::new(TypeRef::leaf("Datum"))),
                    is_array: true,
                    is_optional: false,
                    is_boxed: false,
                    is_sized: true,
                }],
            })],
            config: Config::default(),
        };
        let mut seen = Vec::new();
        schema.for_each_ref(|_, r| seen.push(r.clone()));
        assert_eq!(seen.len(), 2, "outer array ref and inner element ref");
    }

    #[test]
    fn primitive_table() {
        assert!(is_primitive("usize"));
        assert!(is_primitive(UNSIZED_PRIMITIVE));
        assert!(!is_primitive("Datum"));
    }
}

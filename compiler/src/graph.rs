// graph.rs — Reference graph construction for ADT schemas
//
// Transforms the parsed schema into a directed graph over string-labeled
// vertices: one vertex per type, one per record-field/newtype-operand slot,
// one per sum-case operand slot. Edges run owner type → slot → referenced
// type. Array slots contribute no vertices or edges: an array is a heap
// boundary for sizing and an impassable boundary for casts, so one graph
// serves both downstream phases.
//
// Preconditions: `schema` passed shape parsing without errors.
// Postconditions: returns a `RefGraph` whose vertex order follows the
//                 schema's declaration order; referenced primitives and
//                 dangling names get type vertices on first use.
// Failure modes: none fatal. Dangling and unreferenced names produce
//                warning diagnostics.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::diag::{codes, Diagnostic, Locus};
use crate::model::{is_primitive, Decl, Schema, SlotId, TypeRef};

// ── Public types ────────────────────────────────────────────────────────────

/// Unique identifier for a vertex within the reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(pub u32);

/// The kind of a graph vertex.
#[derive(Debug, Clone, PartialEq)]
pub enum VertexKind {
    /// A top-level type, primitive, or dangling reference target.
    Type { name: String },
    /// A record field or newtype operand position.
    Field { slot: SlotId },
    /// An operand position of a sum case, with the case's total arity.
    CaseOperand {
        slot: SlotId,
        sum: String,
        case: String,
        arity: usize,
    },
}

/// A vertex in the reference graph.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub id: VertexId,
    pub label: String,
    pub kind: VertexKind,
}

impl Vertex {
    pub fn is_type(&self) -> bool {
        matches!(self.kind, VertexKind::Type { .. })
    }

    /// The slot this vertex addresses, if it is an operand vertex.
    pub fn slot(&self) -> Option<SlotId> {
        match &self.kind {
            VertexKind::Type { .. } => None,
            VertexKind::Field { slot } => Some(*slot),
            VertexKind::CaseOperand { slot, .. } => Some(*slot),
        }
    }
}

/// The complete reference graph.
#[derive(Debug)]
pub struct RefGraph {
    vertices: Vec<Vertex>,
    edges: Vec<(VertexId, VertexId)>,
    adjacency: Vec<Vec<VertexId>>,
    by_label: HashMap<String, VertexId>,
}

impl RefGraph {
    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0 as usize]
    }

    pub fn lookup(&self, label: &str) -> Option<VertexId> {
        self.by_label.get(label).copied()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[(VertexId, VertexId)] {
        &self.edges
    }

    pub fn out_neighbors(&self, id: VertexId) -> &[VertexId] {
        &self.adjacency[id.0 as usize]
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_self_loop(&self, id: VertexId) -> bool {
        self.adjacency[id.0 as usize].contains(&id)
    }

    /// Type vertices in creation order (declarations first, then referenced
    /// primitives and dangling names in first-use order).
    pub fn type_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter().filter(|v| v.is_type())
    }
}

impl fmt::Display for RefGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types = self.vertices.iter().filter(|v| v.is_type()).count();
        writeln!(
            f,
            "RefGraph ({} vertices, {} of them types, {} edges)",
            self.vertices.len(),
            types,
            self.edges.len()
        )?;
        for (from, to) in &self.edges {
            writeln!(f, "  {} -> {}", self.vertex(*from).label, self.vertex(*to).label)?;
        }
        Ok(())
    }
}

/// Result of graph construction.
#[derive(Debug)]
pub struct GraphResult {
    pub graph: RefGraph,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the reference graph from a parsed schema.
pub fn build_graph(schema: &Schema) -> GraphResult {
    let mut builder = GraphBuilder::new(schema);
    builder.add_type_vertices();
    builder.add_slot_vertices();
    builder.check_references();

    GraphResult {
        graph: RefGraph {
            vertices: builder.vertices,
            edges: builder.edges,
            adjacency: builder.adjacency,
            by_label: builder.by_label,
        },
        diagnostics: builder.diagnostics,
    }
}

// ── Internal builder ────────────────────────────────────────────────────────

struct GraphBuilder<'a> {
    schema: &'a Schema,
    vertices: Vec<Vertex>,
    edges: Vec<(VertexId, VertexId)>,
    adjacency: Vec<Vec<VertexId>>,
    by_label: HashMap<String, VertexId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> GraphBuilder<'a> {
    fn new(schema: &'a Schema) -> Self {
        GraphBuilder {
            schema,
            vertices: Vec::new(),
            edges: Vec::new(),
            adjacency: Vec::new(),
            by_label: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn add_vertex(&mut self, label: String, kind: VertexKind) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.by_label.insert(label.clone(), id);
        self.vertices.push(Vertex { id, label, kind });
        self.adjacency.push(Vec::new());
        id
    }

    fn add_edge(&mut self, from: VertexId, to: VertexId) {
        self.edges.push((from, to));
        self.adjacency[from.0 as usize].push(to);
    }

    /// Fetch the type vertex for `name`, creating it for primitives and
    /// dangling references on first use.
    fn type_vertex(&mut self, name: &str) -> VertexId {
        if let Some(id) = self.by_label.get(name) {
            return *id;
        }
        self.add_vertex(name.to_string(), VertexKind::Type { name: name.to_string() })
    }

    fn add_type_vertices(&mut self) {
        for decl in &self.schema.decls {
            self.add_vertex(
                decl.name().to_string(),
                VertexKind::Type { name: decl.name().to_string() },
            );
        }
    }

    // ── Slot vertices and edges ─────────────────────────────────────────

    fn add_slot_vertices(&mut self) {
        for (di, decl) in self.schema.decls.iter().enumerate() {
            match decl {
                Decl::Newtype(d) => {
                    for (oi, op) in d.operands.iter().enumerate() {
                        let slot = SlotId::NewtypeOperand { decl: di, operand: oi };
                        let label = format!("{}.{}", d.name, oi);
                        self.add_slot(&d.name, label, VertexKind::Field { slot }, op);
                    }
                }
                Decl::Record(d) => {
                    for (fi, field) in d.fields.iter().enumerate() {
                        let slot = SlotId::RecordField { decl: di, field: fi };
                        let label = format!("{}.{}", d.name, field.name);
                        self.add_slot(&d.name, label, VertexKind::Field { slot }, &field.ty);
                    }
                }
                Decl::Sum(d) => {
                    for (ci, case) in d.cases.iter().enumerate() {
                        for (oi, op) in case.operands.iter().enumerate() {
                            let slot = SlotId::CaseOperand { decl: di, case: ci, operand: oi };
                            // 1-based index among the case's operands.
                            let label = format!("{}::{}#{}", d.name, case.name, oi + 1);
                            let kind = VertexKind::CaseOperand {
                                slot,
                                sum: d.name.clone(),
                                case: case.name.clone(),
                                arity: case.operands.len(),
                            };
                            self.add_slot(&d.name, label, kind, op);
                        }
                    }
                }
            }
        }
    }

    /// Add one operand slot: owner → slot → unwrapped target. Array slots
    /// and unit payloads contribute nothing.
    fn add_slot(&mut self, owner: &str, label: String, kind: VertexKind, ty: &TypeRef) {
        let leaf = match ty.direct_leaf() {
            Some(leaf) => leaf.to_string(),
            None => return,
        };
        let owner_id = self.type_vertex(owner);
        let slot_id = self.add_vertex(label, kind);
        let target_id = self.type_vertex(&leaf);
        self.add_edge(owner_id, slot_id);
        self.add_edge(slot_id, target_id);
    }

    // ── Reference checks ────────────────────────────────────────────────

    /// Warn on dangling leaf names (accepted, per the tool's leniency) and
    /// on declared types nothing references. Array elements count here even
    /// though they are absent from the graph.
    fn check_references(&mut self) {
        let declared: HashSet<&str> = self.schema.decls.iter().map(|d| d.name()).collect();
        let mut referenced: HashSet<String> = HashSet::new();
        let mut dangling: Vec<(SlotId, String)> = Vec::new();

        self.schema.for_each_ref(|slot, r| {
            if let Some(leaf) = r.leaf_name() {
                if let crate::model::Target::Name(_) = r.target {
                    referenced.insert(leaf.to_string());
                    if !is_primitive(leaf) && !declared.contains(leaf) {
                        dangling.push((slot, leaf.to_string()));
                    }
                }
            }
        });

        for (slot, leaf) in dangling {
            let locus = self.slot_locus(slot);
            self.diagnostics.push(
                Diagnostic::warning(
                    locus,
                    format!("reference to undeclared type `{}`", leaf),
                )
                .with_code(codes::W0002),
            );
        }

        for decl in &self.schema.decls {
            if !referenced.contains(decl.name()) {
                self.diagnostics.push(
                    Diagnostic::warning(
                        Locus::root().key("models").key(decl.name()),
                        format!("type `{}` is never referenced", decl.name()),
                    )
                    .with_code(codes::W0003),
                );
            }
        }
    }

    fn slot_locus(&self, slot: SlotId) -> Locus {
        let models = Locus::root().key("models");
        match slot {
            SlotId::NewtypeOperand { decl, operand } => {
                models.key(self.schema.decls[decl].name()).index(operand)
            }
            SlotId::RecordField { decl, field } => {
                let name = match &self.schema.decls[decl] {
                    Decl::Record(d) => d.fields[field].name.as_str(),
                    _ => "?",
                };
                models.key(self.schema.decls[decl].name()).key(name)
            }
            SlotId::CaseOperand { decl, case, operand } => {
                let name = match &self.schema.decls[decl] {
                    Decl::Sum(d) => d.cases[case].name.as_str(),
                    _ => "?",
                };
                models
                    .key(self.schema.decls[decl].name())
                    .key(name)
                    .index(operand)
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

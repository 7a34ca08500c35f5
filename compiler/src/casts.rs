// casts.rs — Conversion-path inference over the reference graph
//
// Computes, for every ordered pair of types (From, To) where From embeds To
// through a chain of single-operand sum cases, the shortest such chain in
// canonical hop form. Downstream codegen turns each chain into an injection
// (constructor chain) and, for lossy pairs, an extraction (pattern match).
//
// Preconditions: `graph` was built from `schema` and `schema` has been
//                through cycle breaking, so every hop payload carries its
//                final box/sizing flags.
// Postconditions: every returned plan's hops alternate sum → single-operand
//                 case → payload type; no plan starts and ends at the same
//                 type; plan order is a pure function of the schema.
// Failure modes: none user-facing — candidate paths that touch record
//                fields, newtype operands, or multi-operand cases are
//                silently skipped.
// Side effects: none.

use std::collections::{HashMap, VecDeque};

use crate::diag::Diagnostic;
use crate::graph::{RefGraph, Vertex, VertexId, VertexKind};
use crate::model::{Schema, TypeRef};

// ── Public types ────────────────────────────────────────────────────────────

/// One link in a conversion chain: a single-operand case of a sum.
#[derive(Debug, Clone, PartialEq)]
pub struct CastHop {
    pub sum: String,
    pub case: String,
    /// The operand's original ref, so codegen can see the `Box`/`Option`
    /// boundary it crosses at this hop.
    pub payload: TypeRef,
}

/// A canonical conversion path between two types.
#[derive(Debug, Clone, PartialEq)]
pub struct CastPlan {
    pub from: String,
    pub to: String,
    /// Outermost hop first: `hops[0].sum == from`.
    pub hops: Vec<CastHop>,
    /// Both directions exist; extraction would always succeed and is not
    /// emitted.
    pub lossless: bool,
}

impl CastPlan {
    /// The hop whose payload is the conversion's terminal value.
    pub fn terminal(&self) -> &CastHop {
        self.hops.last().expect("plans always have at least one hop")
    }
}

/// Result of path inference.
#[derive(Debug)]
pub struct CastResult {
    pub plans: Vec<CastPlan>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Infer all conversion paths between types in the schema.
pub fn infer_casts(schema: &Schema, graph: &RefGraph) -> CastResult {
    let sources: Vec<VertexId> = graph.type_vertices().map(|v| v.id).collect();

    // Phase 1: collect the shortest viable chain per ordered pair.
    let mut order: Vec<(String, String)> = Vec::new();
    let mut chains: HashMap<(String, String), Vec<CastHop>> = HashMap::new();
    for &source in &sources {
        let preds = shortest_paths_from(graph, source);
        for &target in &sources {
            if target == source {
                continue;
            }
            let Some(path) = reconstruct(&preds, source, target) else { continue };
            let Some(hops) = canonicalize(schema, graph, &path) else { continue };
            let from = graph.vertex(source).label.clone();
            let to = graph.vertex(target).label.clone();
            order.push((from.clone(), to.clone()));
            chains.insert((from, to), hops);
        }
    }

    // Phase 2: pair off directions. A pair is lossless iff its reverse
    // chain also exists.
    let plans = order
        .into_iter()
        .map(|(from, to)| {
            let lossless = chains.contains_key(&(to.clone(), from.clone()));
            let hops = chains[&(from.clone(), to.clone())].clone();
            CastPlan { from, to, hops, lossless }
        })
        .collect();

    CastResult { plans, diagnostics: Vec::new() }
}

// ── Shortest-path search ────────────────────────────────────────────────────

/// Single-source shortest paths with uniform edge weight 1 (Dijkstra
/// degenerates to breadth-first order). Returns the predecessor of each
/// reached vertex; unreached vertices have none.
///
/// The search only steps onto vertices a cast can traverse: type vertices
/// and single-operand case slots. Letting it wander onto record fields or
/// multi-operand slots would spend the one recorded shortest path on a
/// chain the filter must then reject, shadowing an equally short viable
/// chain.
fn shortest_paths_from(graph: &RefGraph, source: VertexId) -> Vec<Option<VertexId>> {
    let mut pred: Vec<Option<VertexId>> = vec![None; graph.vertex_count()];
    let mut seen = vec![false; graph.vertex_count()];
    let mut queue = VecDeque::new();
    seen[source.0 as usize] = true;
    queue.push_back(source);
    while let Some(v) = queue.pop_front() {
        for &w in graph.out_neighbors(v) {
            if seen[w.0 as usize] || !traversable(graph, w) {
                continue;
            }
            seen[w.0 as usize] = true;
            pred[w.0 as usize] = Some(v);
            queue.push_back(w);
        }
    }
    pred
}

fn traversable(graph: &RefGraph, id: VertexId) -> bool {
    match &graph.vertex(id).kind {
        VertexKind::Type { .. } => true,
        VertexKind::Field { .. } => false,
        VertexKind::CaseOperand { arity, .. } => *arity == 1,
    }
}

/// Walk the predecessor chain back from `target`, yielding the vertex
/// sequence source..=target. `None` if the target was never reached.
fn reconstruct(
    pred: &[Option<VertexId>],
    source: VertexId,
    target: VertexId,
) -> Option<Vec<VertexId>> {
    let mut path = vec![target];
    let mut cursor = target;
    while cursor != source {
        cursor = pred[cursor.0 as usize]?;
        path.push(cursor);
    }
    path.reverse();
    Some(path)
}

// ── Canonicalization ────────────────────────────────────────────────────────

/// Collapse a vertex path into hop form, rejecting paths that cannot be
/// expressed as a chain of single-operand sum cases.
fn canonicalize(schema: &Schema, graph: &RefGraph, path: &[VertexId]) -> Option<Vec<CastHop>> {
    let mut hops = Vec::new();
    for &vid in path {
        let vertex: &Vertex = graph.vertex(vid);
        match &vertex.kind {
            VertexKind::Type { .. } => {}
            // Record fields and newtype operands are not convertible: a
            // cast names no field.
            VertexKind::Field { .. } => return None,
            VertexKind::CaseOperand { slot, sum, case, arity } => {
                if *arity != 1 {
                    return None;
                }
                hops.push(CastHop {
                    sum: sum.clone(),
                    case: case.clone(),
                    payload: schema.slot(*slot).clone(),
                });
            }
        }
    }
    if hops.is_empty() {
        return None;
    }
    Some(hops)
}

// ── Tests ───────────────────────────────────────────────────────────────────

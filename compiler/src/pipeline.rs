// pipeline.rs — Compilation state and pass orchestration
//
// Holds all pass artifacts and runs the minimal set of passes for a given
// terminal PassId. The schema artifact is mutated in place by the
// cycle-breaking pass; every other pass treats its inputs as read-only.
//
// Preconditions: the decoded document must be set before calling
//                run_pipeline.
// Postconditions: all artifacts for required passes are populated, or
//                 has_error is set.
// Failure modes: any pass emitting error-level diagnostics.
// Side effects: calls on_pass_complete callback after each pass for
//               immediate display.

use std::time::Instant;

use crate::boxing::break_cycles;
use crate::casts::{infer_casts, CastPlan};
use crate::codegen::{codegen, CodegenOptions, GeneratedCode};
use crate::diag::{DiagLevel, Diagnostic};
use crate::graph::{build_graph, RefGraph};
use crate::model::{Schema, SlotId};
use crate::parse::parse_document;
use crate::pass::{descriptor, required_passes, PassId};

// ── Artifact storage ───────────────────────────────────────────────────────

/// Pass outputs, populated in dependency order.
pub struct Artifacts {
    pub schema: Option<Schema>,
    pub graph: Option<RefGraph>,
    pub boxed_refs: Option<Vec<SlotId>>,
    pub casts: Option<Vec<CastPlan>>,
    pub generated: Option<GeneratedCode>,
}

/// Provenance metadata for hermetic builds.
///
/// `source_hash`: SHA-256 of the raw schema text.
/// `compiler_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub compiler_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Serialize provenance as a JSON string for `--emit build-info`.
    pub fn to_json(&self) -> String {
        format!(
            "{{\n  \"source_hash\": \"{}\",\n  \"manifest_schema_version\": 1,\n  \"compiler_version\": \"{}\"\n}}\n",
            self.source_hash_hex(),
            self.compiler_version,
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from the raw schema text.
pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    let result = hasher.finalize();
    let mut source_hash = [0u8; 32];
    source_hash.copy_from_slice(&result);

    Provenance {
        source_hash,
        compiler_version: env!("CARGO_PKG_VERSION"),
    }
}

/// Holds the decoded document, all pass artifacts, and accumulated
/// diagnostics.
pub struct CompilationState {
    pub document: serde_yaml::Value,
    pub artifacts: Artifacts,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(document: serde_yaml::Value) -> Self {
        Self {
            document,
            artifacts: Artifacts {
                schema: None,
                graph: None,
                boxed_refs: None,
                casts: None,
                generated: None,
            },
            diagnostics: Vec::new(),
            has_error: false,
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

// ── Helper: per-pass post-processing ───────────────────────────────────────

fn has_error_diags(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

/// Per-pass post-processing: callback, accumulate, verbose, error check.
/// Returns Err if error diagnostics were found.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: std::time::Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_error_diags(&diags);
    state.diagnostics.extend(diags);
    if verbose {
        eprintln!(
            "astgen: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
    if is_err {
        state.has_error = true;
        return Err(PipelineError { failing_pass: pass_id });
    }
    Ok(())
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose →
/// error check.
///
/// Preconditions: `state.document` is the decoded schema document.
/// Postconditions: artifacts for all passes in `required_passes(terminal)`
///   are populated, or `state.has_error` is true.
/// Failure modes: any pass producing error-level diagnostics.
/// Side effects: calls `on_pass_complete` after each pass for immediate
///   diagnostic display.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    codegen_options: &CodegenOptions,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    let passes = required_passes(terminal);

    for &pass_id in &passes {
        match pass_id {
            PassId::BuildModel => {
                let t = Instant::now();
                let result = parse_document(&state.document);
                let elapsed = t.elapsed();
                let mut diags = result.diagnostics;
                if result.schema.is_none() && !has_error_diags(&diags) {
                    diags.push(Diagnostic::error(
                        crate::diag::Locus::root(),
                        "schema document produced no model",
                    ));
                }
                state.artifacts.schema = result.schema;
                finish_pass(
                    state,
                    PassId::BuildModel,
                    diags,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::BuildGraph => {
                let t = Instant::now();
                let schema = state
                    .artifacts
                    .schema
                    .as_ref()
                    .expect("internal: BuildGraph requires the model artifact");
                let result = build_graph(schema);
                let elapsed = t.elapsed();
                let diags = result.diagnostics;
                state.artifacts.graph = Some(result.graph);
                finish_pass(
                    state,
                    PassId::BuildGraph,
                    diags,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::BreakCycles => {
                let t = Instant::now();
                let Artifacts { schema, graph, .. } = &mut state.artifacts;
                let result = break_cycles(
                    schema
                        .as_mut()
                        .expect("internal: BreakCycles requires the model artifact"),
                    graph
                        .as_ref()
                        .expect("internal: BreakCycles requires the graph artifact"),
                );
                let elapsed = t.elapsed();
                let diags = result.diagnostics;
                state.artifacts.boxed_refs = Some(result.boxed_slots);
                finish_pass(
                    state,
                    PassId::BreakCycles,
                    diags,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::InferCasts => {
                let t = Instant::now();
                let result = infer_casts(
                    state
                        .artifacts
                        .schema
                        .as_ref()
                        .expect("internal: InferCasts requires the model artifact"),
                    state
                        .artifacts
                        .graph
                        .as_ref()
                        .expect("internal: InferCasts requires the graph artifact"),
                );
                let elapsed = t.elapsed();
                let diags = result.diagnostics;
                state.artifacts.casts = Some(result.plans);
                finish_pass(
                    state,
                    PassId::InferCasts,
                    diags,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::Codegen => {
                let t = Instant::now();
                let result = codegen(
                    state
                        .artifacts
                        .schema
                        .as_ref()
                        .expect("internal: Codegen requires the model artifact"),
                    state
                        .artifacts
                        .casts
                        .as_ref()
                        .expect("internal: Codegen requires the casts artifact"),
                    codegen_options,
                );
                let elapsed = t.elapsed();
                let diags = result.diagnostics;
                state.artifacts.generated = Some(result.generated);
                finish_pass(
                    state,
                    PassId::Codegen,
                    diags,
                    elapsed,
                    verbose,
                    &mut on_pass_complete,
                )?;
            }
        }
    }
    Ok(())
}

/// Decode a schema source string and run the full pipeline to Rust source.
/// Convenience wrapper used by tests and benchmarks; the CLI drives
/// `run_pipeline` directly for per-pass reporting.
pub fn compile_to_rust(
    source: &str,
    options: &CodegenOptions,
) -> Result<CompilationState, serde_yaml::Error> {
    let document = serde_yaml::from_str(source)?;
    let mut state = CompilationState::new(document);
    state.provenance = Some(compute_provenance(source));
    let _ = run_pipeline(&mut state, PassId::Codegen, options, false, |_, _| {});
    Ok(state)
}

// ── Tests ──────────────────────────────────────────────────────────────────

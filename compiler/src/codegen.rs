// codegen.rs — Rust source emission for ADT schemas
//
// Projects the finalized schema and the inferred cast plans into a single
// Rust module: type declarations, tag reflection impls for sums, GC trace
// impls, conversion impls, and a size-printing test fixture. Pure string
// formatting over the upstream model; the output is a deterministic
// function of the schema.
//
// Preconditions: `schema` has been through cycle breaking; `plans` came
//                from path inference over the same schema.
// Postconditions: returns `CodegenResult` with the generated source text.
// Failure modes: none (pure string formatting).
// Side effects: none.

use crate::casts::CastPlan;
use crate::diag::Diagnostic;
use crate::model::{
    CaseDecl, Decl, NewtypeDecl, RecordDecl, Schema, SumDecl, Target, TypeRef, UNSIZED_PRIMITIVE,
};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CodegenResult {
    pub generated: GeneratedCode,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct GeneratedCode {
    pub rust_source: String,
}

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Import path of the GC runtime the generated module compiles against.
    pub runtime_path: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions { runtime_path: "crate::runtime".to_string() }
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn codegen(schema: &Schema, plans: &[CastPlan], options: &CodegenOptions) -> CodegenResult {
    let mut ctx = CodegenCtx::new(schema, plans, options);
    ctx.emit_all();
    ctx.build_result()
}

/// The Rust surface form of a type reference. Wrapper order is fixed:
/// `Option` outside `Box` outside `Vec`.
pub fn render_type(r: &TypeRef) -> String {
    let base = match &r.target {
        Target::Name(n) => {
            if n == UNSIZED_PRIMITIVE && !r.is_boxed {
                // An unsized leaf that escaped boxing still surfaces as the
                // sized wrapper.
                return wrap_type(r, format!("Box<{}>", UNSIZED_PRIMITIVE));
            }
            n.clone()
        }
        Target::Unit => "()".to_string(),
        Target::Elem(inner) => render_type(inner),
    };
    wrap_type(r, base)
}

fn wrap_type(r: &TypeRef, base: String) -> String {
    let mut out = base;
    if r.is_array {
        out = format!("Vec<{}>", out);
    }
    if r.is_boxed {
        out = format!("Box<{}>", out);
    }
    if r.is_optional {
        out = format!("Option<{}>", out);
    }
    out
}

// ── Internal context ────────────────────────────────────────────────────────

struct CodegenCtx<'a> {
    schema: &'a Schema,
    plans: &'a [CastPlan],
    options: &'a CodegenOptions,
    out: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CodegenCtx<'a> {
    fn new(schema: &'a Schema, plans: &'a [CastPlan], options: &'a CodegenOptions) -> Self {
        CodegenCtx {
            schema,
            plans,
            options,
            out: String::with_capacity(8192),
            diagnostics: Vec::new(),
        }
    }

    fn build_result(self) -> CodegenResult {
        CodegenResult {
            generated: GeneratedCode { rust_source: self.out },
            diagnostics: self.diagnostics,
        }
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Visibility prefix (with trailing space) from the config section.
    fn vis(&self) -> String {
        match &self.schema.config.visibility {
            Some(v) => format!("{} ", v),
            None => String::new(),
        }
    }

    fn derive_attr(&self) -> Option<String> {
        if self.schema.config.derive.is_empty() {
            None
        } else {
            Some(format!("#[derive({})]", self.schema.config.derive.join(", ")))
        }
    }

    fn sum_case_count(&self, name: &str) -> Option<usize> {
        match self.schema.decl(name) {
            Some(Decl::Sum(d)) => Some(d.cases.len()),
            _ => None,
        }
    }

    // ── Top-level emission ──────────────────────────────────────────────

    fn emit_all(&mut self) {
        self.emit_preamble();
        for decl in &self.schema.decls {
            match decl {
                Decl::Newtype(d) => self.emit_newtype(d),
                Decl::Record(d) => self.emit_record(d),
                Decl::Sum(d) => {
                    self.emit_sum(d);
                    self.emit_tagged_union(d);
                }
            }
            self.emit_trace(decl);
        }
        for plan in self.plans {
            self.emit_injection(plan);
            if !plan.lossless {
                self.emit_extraction(plan);
            }
        }
        self.emit_size_fixture();
    }

    fn emit_preamble(&mut self) {
        self.line("// @generated by astgen — do not edit by hand.");
        self.blank();
        let import = format!(
            "use {}::{{Marker, TaggedUnion, Trace}};",
            self.options.runtime_path
        );
        self.line(&import);
        self.blank();
        self.line("/// A conversion failed: the live payload did not lie on the requested");
        self.line("/// cast chain.");
        self.line("#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        self.line("pub struct CastError {");
        self.line("    pub from: &'static str,");
        self.line("    pub to: &'static str,");
        self.line("}");
        self.blank();
        self.line("impl CastError {");
        self.line("    pub fn new(from: &'static str, to: &'static str) -> Self {");
        self.line("        CastError { from, to }");
        self.line("    }");
        self.line("}");
        self.blank();
        self.line("impl std::fmt::Display for CastError {");
        self.line("    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {");
        self.line("        write!(f, \"cannot cast {} into {}\", self.from, self.to)");
        self.line("    }");
        self.line("}");
        self.blank();
        self.line("impl std::error::Error for CastError {}");
        self.blank();
    }

    // ── Type declarations ───────────────────────────────────────────────

    fn emit_newtype(&mut self, d: &NewtypeDecl) {
        if let Some(attr) = self.derive_attr() {
            self.line(&attr);
        }
        let vis = self.vis();
        match d.operands.first() {
            None => {
                let decl = format!("{}struct {};", vis, d.name);
                self.line(&decl);
            }
            Some(op) => {
                let decl = format!("{}struct {}({}{});", vis, d.name, vis, render_type(op));
                self.line(&decl);
            }
        }
        self.blank();
    }

    fn emit_record(&mut self, d: &RecordDecl) {
        if let Some(attr) = self.derive_attr() {
            self.line(&attr);
        }
        let vis = self.vis();
        let header = format!("{}struct {} {{", vis, d.name);
        self.line(&header);
        for field in &d.fields {
            let line = format!("    {}{}: {},", vis, field.name, render_type(&field.ty));
            self.line(&line);
        }
        self.line("}");
        self.blank();
    }

    fn emit_sum(&mut self, d: &SumDecl) {
        if let Some(attr) = self.derive_attr() {
            self.line(&attr);
        }
        self.line("#[repr(u8)]");
        let header = format!("{}enum {} {{", self.vis(), d.name);
        self.line(&header);
        for case in &d.cases {
            if case.operands.is_empty() {
                let line = format!("    {},", case.name);
                self.line(&line);
            } else {
                let operands: Vec<String> = case.operands.iter().map(render_type).collect();
                let line = format!("    {}({}),", case.name, operands.join(", "));
                self.line(&line);
            }
        }
        self.line("}");
        self.blank();
    }

    // ── Tag reflection ──────────────────────────────────────────────────

    /// Per-sum static tag-to-payload-type table. Unit cases, tuple cases,
    /// array payloads, and optional payloads map to the `None` sentinel.
    fn emit_tagged_union(&mut self, d: &SumDecl) {
        let header = format!("impl TaggedUnion for {} {{", d.name);
        self.line(&header);
        self.line("    const PAYLOADS: &'static [Option<&'static str>] = &[");
        for case in &d.cases {
            let entry = match payload_type_name(case) {
                Some(name) => format!("        Some(\"{}\"),", name),
                None => "        None,".to_string(),
            };
            self.line(&entry);
        }
        self.line("    ];");
        self.blank();
        self.line("    fn tag(&self) -> u8 {");
        self.line("        match self {");
        for (i, case) in d.cases.iter().enumerate() {
            let pattern = if case.operands.is_empty() {
                format!("            {}::{} => {},", d.name, case.name, i)
            } else {
                format!("            {}::{}(..) => {},", d.name, case.name, i)
            };
            self.line(&pattern);
        }
        self.line("        }");
        self.line("    }");
        self.line("}");
        self.blank();
    }

    // ── GC trace ────────────────────────────────────────────────────────

    fn emit_trace(&mut self, decl: &Decl) {
        let mut body = Vec::new();
        match decl {
            Decl::Newtype(d) => {
                if let Some(op) = d.operands.first() {
                    push_trace_lines(&mut body, 2, "self.0", op, 0);
                }
            }
            Decl::Record(d) => {
                for field in &d.fields {
                    let expr = format!("self.{}", field.name);
                    push_trace_lines(&mut body, 2, &expr, &field.ty, 0);
                }
            }
            Decl::Sum(d) => {
                body.push("        match self {".to_string());
                for case in &d.cases {
                    push_trace_arm(&mut body, d, case);
                }
                body.push("        }".to_string());
            }
        }

        let header = format!("impl Trace for {} {{", decl.name());
        self.line(&header);
        if body.is_empty() {
            self.line("    fn trace(&self, _marker: &Marker) {}");
        } else {
            self.line("    fn trace(&self, marker: &Marker) {");
            for line in body {
                self.line(&line);
            }
            self.line("    }");
        }
        self.line("}");
        self.blank();
    }

    // ── Conversions ─────────────────────────────────────────────────────

    /// Lossless direction: wrap the inner value through the constructor
    /// chain, boxing at each sized heap boundary.
    fn emit_injection(&mut self, plan: &CastPlan) {
        let source_ty = plan_target_type(plan);
        let mut expr = "value".to_string();
        for hop in plan.hops.iter().rev() {
            let p = &hop.payload;
            if p.is_boxed && !p.is_array && p.is_sized {
                expr = format!("Box::new({})", expr);
            }
            if p.is_optional {
                expr = format!("Some({})", expr);
            }
            expr = format!("{}::{}({})", hop.sum, hop.case, expr);
        }

        let header = format!("impl From<{}> for {} {{", source_ty, plan.from);
        self.line(&header);
        let sig = format!("    fn from(value: {}) -> Self {{", source_ty);
        self.line(&sig);
        let body = format!("        {}", expr);
        self.line(&body);
        self.line("    }");
        self.line("}");
        self.blank();
    }

    /// Lossy direction: pattern-match down the chain, dereferencing through
    /// each boxed payload before the next match.
    fn emit_extraction(&mut self, plan: &CastPlan) {
        let target_ty = plan_target_type(plan);
        let header = format!("impl TryFrom<{}> for {} {{", plan.from, target_ty);
        self.line(&header);
        self.line("    type Error = CastError;");
        self.blank();
        let sig = format!(
            "    fn try_from(value: {}) -> Result<Self, Self::Error> {{",
            plan.from
        );
        self.line(&sig);
        let mut body = Vec::new();
        self.push_extract_match(&mut body, 2, "value", plan, 0);
        for line in body {
            self.line(&line);
        }
        self.line("    }");
        self.line("}");
        self.blank();
    }

    /// Emit `match <scrutinee> { Sum::Case(payloadN) => ..., _ => Err }`
    /// for hop `idx`, recursing into the payload for the following hop.
    fn push_extract_match(
        &self,
        lines: &mut Vec<String>,
        indent: usize,
        scrutinee: &str,
        plan: &CastPlan,
        idx: usize,
    ) {
        let pad = "    ".repeat(indent);
        let hop = &plan.hops[idx];
        let p = &hop.payload;
        let err = format!("Err(CastError::new(\"{}\", \"{}\"))", plan.from, plan.to);
        let payload_var = format!("payload{}", idx);

        lines.push(format!("{}match {} {{", pad, scrutinee));
        lines.push(format!(
            "{}    {}::{}({}) => {{",
            pad, hop.sum, hop.case, payload_var
        ));

        let mut inner = Vec::new();
        if p.is_optional {
            inner.push(format!("match {} {{", payload_var));
            let some_var = format!("inner{}", idx);
            inner.push(format!("    Some({}) => {{", some_var));
            let mut deepest = Vec::new();
            self.push_extract_value(&mut deepest, 0, &some_var, plan, idx);
            for line in deepest {
                inner.push(format!("        {}", line));
            }
            inner.push("    }".to_string());
            inner.push(format!("    None => {},", err));
            inner.push("}".to_string());
        } else {
            self.push_extract_value(&mut inner, 0, &payload_var, plan, idx);
        }
        for line in inner {
            lines.push(format!("{}        {}", pad, line));
        }

        lines.push(format!("{}    }}", pad));
        // A one-case sum is exhausted by the arm above.
        if self.sum_case_count(&hop.sum) != Some(1) {
            lines.push(format!("{}    _ => {},", pad, err));
        }
        lines.push(format!("{}}}", pad));
    }

    /// The payload is in hand (options peeled); either finish the chain or
    /// descend into the next hop, dereferencing through a box if needed.
    fn push_extract_value(
        &self,
        lines: &mut Vec<String>,
        indent: usize,
        expr: &str,
        plan: &CastPlan,
        idx: usize,
    ) {
        let p = &plan.hops[idx].payload;
        let deref = p.is_boxed && !p.is_array && p.is_sized;
        if idx + 1 == plan.hops.len() {
            let pad = "    ".repeat(indent);
            let value = if deref { format!("*{}", expr) } else { expr.to_string() };
            lines.push(format!("{}Ok({})", pad, value));
        } else {
            let scrutinee = if deref { format!("*{}", expr) } else { expr.to_string() };
            self.push_extract_match(lines, indent, &scrutinee, plan, idx + 1);
        }
    }

    // ── Size fixture ────────────────────────────────────────────────────

    fn emit_size_fixture(&mut self) {
        self.line("#[cfg(test)]");
        self.line("mod layout {");
        self.line("    use super::*;");
        self.blank();
        self.line("    #[test]");
        self.line("    fn print_sizes() {");
        for decl in &self.schema.decls {
            let line = format!(
                "        println!(\"{}: {{}} bytes\", std::mem::size_of::<{}>());",
                decl.name(),
                decl.name()
            );
            self.line(&line);
        }
        self.line("    }");
        self.line("}");
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// The type a conversion plan trades in: the terminal payload's leaf, with
/// the unsized string surfacing as its sized wrapper.
fn plan_target_type(plan: &CastPlan) -> String {
    let term = plan.terminal();
    match term.payload.leaf_name() {
        Some(leaf) if leaf == UNSIZED_PRIMITIVE => format!("Box<{}>", UNSIZED_PRIMITIVE),
        _ => plan.to.clone(),
    }
}

/// The reflection table entry for a case: the payload's nominal type when
/// the case has exactly one plain operand, the sentinel otherwise.
fn payload_type_name(case: &CaseDecl) -> Option<&str> {
    if case.operands.len() != 1 {
        return None;
    }
    let op = &case.operands[0];
    if op.is_array || op.is_optional {
        return None;
    }
    op.direct_leaf()
}

/// Append trace statements for one owned child, peeling `Option` and array
/// wrappers; boxes are transparent to the traced call.
fn push_trace_lines(lines: &mut Vec<String>, indent: usize, expr: &str, r: &TypeRef, depth: usize) {
    let pad = "    ".repeat(indent);
    if r.is_optional {
        let var = format!("item{}", depth);
        let mut unwrapped = r.clone();
        unwrapped.is_optional = false;
        let mut inner = Vec::new();
        push_trace_lines(&mut inner, indent + 1, &var, &unwrapped, depth + 1);
        if inner.is_empty() {
            return;
        }
        lines.push(format!("{}if let Some({}) = {}.as_ref() {{", pad, var, expr));
        lines.extend(inner);
        lines.push(format!("{}}}", pad));
        return;
    }
    if r.is_array {
        let elem = match &r.target {
            Target::Elem(inner) => inner,
            _ => return,
        };
        let var = format!("item{}", depth);
        let mut inner = Vec::new();
        push_trace_lines(&mut inner, indent + 1, &var, elem, depth + 1);
        if inner.is_empty() {
            return;
        }
        lines.push(format!("{}for {} in {}.iter() {{", pad, var, expr));
        lines.extend(inner);
        lines.push(format!("{}}}", pad));
        return;
    }
    match &r.target {
        Target::Name(_) => lines.push(format!("{}{}.trace(marker);", pad, expr)),
        Target::Unit => {}
        // Unreachable: element targets always sit under an array flag.
        Target::Elem(_) => {}
    }
}

/// One match arm of a sum's trace impl.
fn push_trace_arm(lines: &mut Vec<String>, sum: &SumDecl, case: &CaseDecl) {
    if case.operands.is_empty() {
        lines.push(format!("            {}::{} => {{}}", sum.name, case.name));
        return;
    }

    let mut arm_body = Vec::new();
    let mut bindings = Vec::new();
    for (i, op) in case.operands.iter().enumerate() {
        let var = format!("op{}", i);
        let mut stmts = Vec::new();
        push_trace_lines(&mut stmts, 4, &var, op, 0);
        if stmts.is_empty() {
            bindings.push("_".to_string());
        } else {
            bindings.push(var);
            arm_body.extend(stmts);
        }
    }

    if arm_body.is_empty() {
        lines.push(format!(
            "            {}::{}(..) => {{}}",
            sum.name, case.name
        ));
        return;
    }
    lines.push(format!(
        "            {}::{}({}) => {{",
        sum.name,
        case.name,
        bindings.join(", ")
    ));
    lines.extend(arm_body);
    lines.push("            }".to_string());
}

// ── Tests ───────────────────────────────────────────────────────────────────

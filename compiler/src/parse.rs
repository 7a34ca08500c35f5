// parse.rs — Shape-directed schema decoding
//
// Reads the decoded YAML document into the typed schema model. The shape of
// each node (scalar, singleton list, list, map) decides the kind of type it
// describes; there are no explicit kind tags in the input.
//
// Preconditions: `doc` is a `serde_yaml::Value` decoded from the schema file.
// Postconditions: returns declarations in document order plus a copy of the
//                 config section, with all accumulated diagnostics.
// Failure modes: unsupported shapes, malformed decorators, duplicate type or
//                case names, tuples in single-reference positions produce
//                error diagnostics. Parsing continues past errors.
// Side effects: none.

use std::collections::HashSet;

use serde_yaml::Value;

use crate::diag::{codes, Diagnostic, Locus};
use crate::model::{
    CaseDecl, Config, Decl, FieldDecl, NewtypeDecl, RecordDecl, Schema, SumDecl, Target, TypeRef,
};

// ── Public types ────────────────────────────────────────────────────────────

/// Result of schema parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub schema: Option<Schema>,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Shape discriminator ─────────────────────────────────────────────────────

/// The closed set of node shapes the parser dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Scalar,
    Sequence,
    Mapping,
    Null,
}

fn shape_of(value: &Value) -> Option<Shape> {
    match value {
        Value::Null => Some(Shape::Null),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(Shape::Scalar),
        Value::Sequence(_) => Some(Shape::Sequence),
        Value::Mapping(_) => Some(Shape::Mapping),
        Value::Tagged(_) => None,
    }
}

/// One-line rendering of a raw node for error messages.
fn raw_snippet(value: &Value) -> String {
    match serde_yaml::to_string(value) {
        Ok(s) => s.trim_end().replace('\n', " "),
        Err(_) => "<unprintable>".to_string(),
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Parse a decoded schema document into the typed model.
pub fn parse_document(doc: &Value) -> ParseResult {
    let mut parser = Parser { diagnostics: Vec::new() };
    let schema = parser.parse_root(doc);
    ParseResult {
        schema,
        diagnostics: parser.diagnostics,
    }
}

// ── Internal parser ─────────────────────────────────────────────────────────

struct Parser {
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn error(&mut self, locus: Locus, code: crate::diag::DiagCode, message: String) {
        self.diagnostics.push(Diagnostic::error(locus, message).with_code(code));
    }

    // ── Document root ───────────────────────────────────────────────────

    fn parse_root(&mut self, doc: &Value) -> Option<Schema> {
        let root = Locus::root();
        let mapping = match doc {
            Value::Mapping(m) => m,
            other => {
                self.error(
                    root,
                    codes::E0001,
                    format!("schema document must be a mapping, found `{}`", raw_snippet(other)),
                );
                return None;
            }
        };

        let mut models = None;
        let mut config = Config::default();

        for (key, value) in mapping {
            let key_name = match key.as_str() {
                Some(k) => k,
                None => {
                    self.error(
                        root.clone(),
                        codes::E0001,
                        format!("document keys must be strings, found `{}`", raw_snippet(key)),
                    );
                    continue;
                }
            };
            match key_name {
                "models" => models = Some(value),
                "config" => match serde_yaml::from_value::<Config>(value.clone()) {
                    Ok(c) => config = c,
                    Err(e) => {
                        self.error(root.key("config"), codes::E0001, e.to_string());
                    }
                },
                unknown => {
                    self.diagnostics.push(
                        Diagnostic::warning(
                            root.key(unknown),
                            format!("unknown top-level key `{}` is ignored", unknown),
                        )
                        .with_code(codes::W0001),
                    );
                }
            }
        }

        let models = match models {
            Some(Value::Mapping(m)) => m,
            Some(other) => {
                self.error(
                    root.key("models"),
                    codes::E0001,
                    format!("`models` must be a mapping, found `{}`", raw_snippet(other)),
                );
                return None;
            }
            None => {
                self.error(root, codes::E0001, "missing required `models` mapping".to_string());
                return None;
            }
        };

        let models_locus = root.key("models");
        let mut decls = Vec::new();
        let mut seen = HashSet::new();
        for (key, value) in models {
            let name = match key.as_str() {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    self.error(
                        models_locus.clone(),
                        codes::E0001,
                        format!("type names must be non-empty strings, found `{}`", raw_snippet(key)),
                    );
                    continue;
                }
            };
            if !seen.insert(name.clone()) {
                self.error(
                    models_locus.key(&name),
                    codes::E0003,
                    format!("duplicate declaration of type `{}`", name),
                );
                continue;
            }
            if let Some(decl) = self.parse_decl(&name, value, &models_locus.key(&name)) {
                decls.push(decl);
            }
        }

        Some(Schema { decls, config })
    }

    // ── Top-level entries ───────────────────────────────────────────────

    /// Shape-to-declaration dispatch, applied once per top-level entry.
    fn parse_decl(&mut self, name: &str, value: &Value, locus: &Locus) -> Option<Decl> {
        match shape_of(value) {
            Some(Shape::Scalar) => {
                let op = self.parse_type(value, locus)?;
                Some(Decl::Newtype(NewtypeDecl { name: name.to_string(), operands: vec![op] }))
            }
            Some(Shape::Sequence) => {
                let seq = value.as_sequence().expect("shape said sequence");
                match seq.len() {
                    0 => Some(Decl::Newtype(NewtypeDecl {
                        name: name.to_string(),
                        operands: Vec::new(),
                    })),
                    // A one-element sequence is an array newtype, unless the
                    // element is a case mapping — then it is a one-case sum.
                    1 if !matches!(seq[0], Value::Mapping(_)) => {
                        let op = self.parse_type(value, locus)?;
                        Some(Decl::Newtype(NewtypeDecl {
                            name: name.to_string(),
                            operands: vec![op],
                        }))
                    }
                    _ => {
                        let cases = self.parse_cases(seq, locus);
                        Some(Decl::Sum(SumDecl { name: name.to_string(), cases }))
                    }
                }
            }
            Some(Shape::Mapping) => {
                let map = value.as_mapping().expect("shape said mapping");
                let fields = self.parse_fields(map, locus);
                Some(Decl::Record(RecordDecl { name: name.to_string(), fields }))
            }
            Some(Shape::Null) | None => {
                self.error(
                    locus.clone(),
                    codes::E0001,
                    format!("unsupported shape for type `{}`: `{}`", name, raw_snippet(value)),
                );
                None
            }
        }
    }

    // ── Type references ─────────────────────────────────────────────────

    /// Parse one type reference: a decorated scalar, or a sequence (empty =
    /// unit payload, one element = array, more = rejected tuple).
    fn parse_type(&mut self, value: &Value, locus: &Locus) -> Option<TypeRef> {
        match value {
            Value::String(s) => self.parse_scalar_ref(s, locus),
            Value::Bool(_) | Value::Number(_) => {
                self.error(
                    locus.clone(),
                    codes::E0001,
                    format!("type reference must be a string, found `{}`", raw_snippet(value)),
                );
                None
            }
            Value::Sequence(seq) => match seq.len() {
                0 => Some(TypeRef::unit()),
                1 => {
                    let inner = self.parse_type(&seq[0], &locus.index(0))?;
                    // `?`/`~` written on the contained scalar lift to the
                    // array slot: optional-array, boxed-array.
                    let (is_optional, is_boxed) = (inner.is_optional, inner.is_boxed);
                    let mut elem = inner;
                    elem.is_optional = false;
                    elem.is_boxed = false;
                    Some(TypeRef {
                        target: Target::Elem(Box::new(elem)),
                        is_array: true,
                        is_optional,
                        is_boxed,
                        is_sized: true,
                    })
                }
                n => {
                    self.error(
                        locus.clone(),
                        codes::E0005,
                        format!("a single type reference cannot be a {}-element tuple", n),
                    );
                    None
                }
            },
            other => {
                self.error(
                    locus.clone(),
                    codes::E0001,
                    format!("unsupported shape in type position: `{}`", raw_snippet(other)),
                );
                None
            }
        }
    }

    /// Strip decorators from a scalar reference: `ref := "~"? name "?"?`.
    fn parse_scalar_ref(&mut self, raw: &str, locus: &Locus) -> Option<TypeRef> {
        let mut rest = raw;
        let is_boxed = rest.starts_with('~');
        if is_boxed {
            rest = &rest[1..];
        }
        let is_optional = rest.ends_with('?');
        if is_optional {
            rest = &rest[..rest.len() - 1];
        }
        let valid = !rest.is_empty()
            && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !rest.starts_with(|c: char| c.is_ascii_digit());
        if !valid {
            self.error(
                locus.clone(),
                codes::E0002,
                format!("invalid type reference `{}`", raw),
            );
            return None;
        }
        Some(TypeRef {
            target: Target::Name(rest.to_string()),
            is_array: false,
            is_optional,
            is_boxed,
            is_sized: true,
        })
    }

    // ── Sum cases ───────────────────────────────────────────────────────

    fn parse_cases(&mut self, seq: &[Value], locus: &Locus) -> Vec<CaseDecl> {
        let mut cases = Vec::new();
        let mut seen = HashSet::new();
        for (i, alt) in seq.iter().enumerate() {
            let alt_locus = locus.index(i);
            let parsed = match alt {
                // Self-named case: the case and its payload type share the name.
                Value::String(s) => self.parse_scalar_ref(s, &alt_locus).map(|r| {
                    let name = r
                        .leaf_name()
                        .expect("scalar refs always have a leaf")
                        .to_string();
                    CaseDecl { name, operands: vec![r] }
                }),
                Value::Mapping(m) if m.len() == 1 => {
                    let (key, payload) = m.iter().next().expect("len checked");
                    match key.as_str() {
                        Some(case_name) if !case_name.is_empty() => self
                            .parse_case_payload(payload, &locus.key(case_name))
                            .map(|operands| CaseDecl { name: case_name.to_string(), operands }),
                        _ => {
                            self.error(
                                alt_locus.clone(),
                                codes::E0001,
                                format!("case names must be non-empty strings, found `{}`", raw_snippet(key)),
                            );
                            None
                        }
                    }
                }
                other => {
                    self.error(
                        alt_locus.clone(),
                        codes::E0001,
                        format!("unsupported alternative shape: `{}`", raw_snippet(other)),
                    );
                    None
                }
            };
            if let Some(case) = parsed {
                if !seen.insert(case.name.clone()) {
                    self.error(
                        locus.key(&case.name),
                        codes::E0004,
                        format!("duplicate case `{}`", case.name),
                    );
                    continue;
                }
                cases.push(case);
            }
        }
        cases
    }

    /// Parse the payload of a named case into its operand list.
    fn parse_case_payload(&mut self, payload: &Value, locus: &Locus) -> Option<Vec<TypeRef>> {
        match payload {
            Value::String(_) => self.parse_type(payload, locus).map(|r| vec![r]),
            // `Case:` with no value decodes as null — a unit case.
            Value::Null => Some(Vec::new()),
            Value::Sequence(seq) => match seq.len() {
                0 => Some(Vec::new()),
                1 => self.parse_type(payload, locus).map(|r| vec![r]),
                _ => {
                    // Heterogeneous tuple case: one operand per element.
                    let mut operands = Vec::new();
                    for (i, elem) in seq.iter().enumerate() {
                        operands.push(self.parse_type(elem, &locus.index(i))?);
                    }
                    Some(operands)
                }
            },
            other => {
                self.error(
                    locus.clone(),
                    codes::E0001,
                    format!("unsupported case payload shape: `{}`", raw_snippet(other)),
                );
                None
            }
        }
    }

    // ── Record fields ───────────────────────────────────────────────────

    fn parse_fields(&mut self, map: &serde_yaml::Mapping, locus: &Locus) -> Vec<FieldDecl> {
        let mut fields = Vec::new();
        for (key, value) in map {
            let name = match key.as_str() {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    self.error(
                        locus.clone(),
                        codes::E0001,
                        format!("field names must be non-empty strings, found `{}`", raw_snippet(key)),
                    );
                    continue;
                }
            };
            let field_locus = locus.key(&name);
            if let Value::Sequence(seq) = value {
                if seq.len() > 1 {
                    self.error(
                        field_locus,
                        codes::E0005,
                        format!("field `{}` cannot hold a tuple", name),
                    );
                    continue;
                }
            }
            if let Some(ty) = self.parse_type(value, &field_locus) {
                fields.push(FieldDecl { name, ty });
            }
        }
        fields
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

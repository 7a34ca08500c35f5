use clap::Parser;
use std::path::PathBuf;

use astgen::codegen::CodegenOptions;
use astgen::pass::PassId;
use astgen::pipeline::{compute_provenance, run_pipeline, CompilationState};

#[derive(Debug, Clone, clap::ValueEnum)]
enum EmitStage {
    Rust,
    Model,
    Graph,
    Dot,
    BuildInfo,
}

#[derive(Parser, Debug)]
#[command(
    name = "astgen",
    version,
    about = "astgen — compiles YAML ADT schemas into Rust AST modules"
)]
struct Cli {
    /// Input schema file
    #[arg(default_value = "./ast.yaml")]
    schema: PathBuf,

    /// Output file path (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Rust)]
    emit: EmitStage,

    /// Import path of the GC runtime in generated code
    #[arg(long, default_value = "crate::runtime")]
    runtime_path: String,

    /// Print generator phases and timing
    #[arg(long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        eprintln!("astgen: schema = {}", cli.schema.display());
        eprintln!("astgen: emit   = {:?}", cli.emit);
    }

    // ── Load and decode the schema document ──
    let source = match std::fs::read_to_string(&cli.schema) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("astgen: error: {}: {}", cli.schema.display(), e);
            std::process::exit(2);
        }
    };
    let document: serde_yaml::Value = match serde_yaml::from_str(&source) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("astgen: error: {}", e);
            std::process::exit(2);
        }
    };

    let provenance = compute_provenance(&source);
    if let EmitStage::BuildInfo = cli.emit {
        write_output(cli.output.as_deref(), &provenance.to_json());
        return;
    }

    // ── Run the pipeline to the requested stage ──
    let terminal = match cli.emit {
        EmitStage::Rust => PassId::Codegen,
        EmitStage::Model => PassId::BuildModel,
        EmitStage::Graph | EmitStage::Dot => PassId::BreakCycles,
        EmitStage::BuildInfo => unreachable!("handled above"),
    };
    let options = CodegenOptions { runtime_path: cli.runtime_path.clone() };

    let mut state = CompilationState::new(document);
    state.provenance = Some(provenance);
    let run = run_pipeline(&mut state, terminal, &options, cli.verbose, |_, diags| {
        for d in diags {
            eprintln!("{}", d);
        }
    });
    if run.is_err() || state.has_error {
        std::process::exit(1);
    }

    // ── Project the requested artifact ──
    let text = match cli.emit {
        EmitStage::Rust => state
            .artifacts
            .generated
            .as_ref()
            .expect("internal: codegen artifact missing")
            .rust_source
            .clone(),
        EmitStage::Model => state
            .artifacts
            .schema
            .as_ref()
            .expect("internal: model artifact missing")
            .to_string(),
        EmitStage::Graph => state
            .artifacts
            .graph
            .as_ref()
            .expect("internal: graph artifact missing")
            .to_string(),
        EmitStage::Dot => astgen::dot::emit_dot(
            state.artifacts.schema.as_ref().expect("internal: model artifact missing"),
            state.artifacts.graph.as_ref().expect("internal: graph artifact missing"),
        ),
        EmitStage::BuildInfo => unreachable!("handled above"),
    };
    write_output(cli.output.as_deref(), &text);
}

fn write_output(path: Option<&std::path::Path>, text: &str) {
    match path {
        Some(path) => {
            if let Err(e) = std::fs::write(path, text) {
                eprintln!("astgen: error: {}: {}", path.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{}", text),
    }
}

//! Tensile Run - compiles a behaviour description from the command line
//!
//! Prints the generated integration routine of every selected modelling
//! hypothesis, either as source text or as the JSON form of its IR.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tensile::{compile, format_errors, Algorithm, CompilerOptions, ModellingHypothesis, SourceMap};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Generated source text
    Code,
    /// Routine IR as JSON
    Ir,
}

#[derive(Parser, Debug)]
#[command(name = "tensile-run")]
#[command(about = "Generate explicit Runge-Kutta integration routines from a behaviour file")]
struct Cli {
    /// Path to the behaviour description
    file: PathBuf,

    /// Restrict generation to this modelling hypothesis (repeatable)
    #[arg(long = "hypothesis")]
    hypotheses: Vec<String>,

    /// Algorithm used when the file has no @Algorithm
    #[arg(long)]
    algorithm: Option<String>,

    /// Output form
    #[arg(long, value_enum, default_value = "code")]
    emit: Emit,

    /// Do not emit explanatory comments
    #[arg(long)]
    no_comments: bool,
}

impl Cli {
    fn options(&self) -> Result<CompilerOptions, String> {
        let mut options = CompilerOptions::default().with_comments(!self.no_comments);
        if let Some(name) = &self.algorithm {
            let algorithm = Algorithm::from_name(name)
                .ok_or_else(|| format!("unknown algorithm '{}'", name))?;
            options = options.with_default_algorithm(algorithm);
        }
        if !self.hypotheses.is_empty() {
            let hypotheses = self
                .hypotheses
                .iter()
                .map(|name| name.parse::<ModellingHypothesis>())
                .collect::<Result<Vec<_>, _>>()?;
            options = options.with_hypotheses(hypotheses);
        }
        Ok(options)
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tensile=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Compiles the file named on the command line and returns the text to print.
fn run(cli: &Cli) -> Result<String, String> {
    let options = cli.options()?;
    let source = std::fs::read_to_string(&cli.file)
        .map_err(|e| format!("failed to read {}: {}", cli.file.display(), e))?;

    let mut sources = SourceMap::new();
    sources.add_file(cli.file.clone(), source);

    let behaviours = compile(&sources, &options).map_err(|errors| format_errors(&errors, &sources))?;

    let mut output = String::new();
    for behaviour in &behaviours {
        match cli.emit {
            Emit::Code => {
                for (hypothesis, code) in behaviour.sources() {
                    output.push_str(&format!("// {} ({})\n", behaviour.name(), hypothesis));
                    output.push_str(&code);
                    output.push('\n');
                }
            }
            Emit::Ir => {
                let json = behaviour.routines_json().map_err(|e| e.to_string())?;
                output.push_str(&json);
                output.push('\n');
            }
        }
    }
    Ok(output)
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    info!("Compiling {}", cli.file.display());

    match run(&cli) {
        Ok(output) => print!("{}", output),
        Err(message) => {
            error!("Compilation failed");
            eprintln!("{}", message);
            std::process::exit(1);
        }
    }
}

//! Reasoner CLI entry point

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use strix_cli::ScriptRunner;
use strix_kernel::KernelError;
use tracing::error;

#[derive(Parser)]
#[command(name = "strix", version, about = "Tableau-based description logic reasoner")]
struct Cli {
    /// Ontology script to load
    #[arg(short, long)]
    load: Option<PathBuf>,

    /// Query script to run after loading
    #[arg(short, long)]
    run: Option<PathBuf>,

    /// Print the classified taxonomy
    #[arg(short, long)]
    print_taxonomy: bool,

    /// Emit query answers as JSON instead of plain text
    #[arg(long)]
    json: bool,
}

/// Exit codes: 0 success, 1 inconsistent ontology, 2 user error, 3 internal
fn exit_code_for(err: &KernelError) -> u8 {
    match err {
        KernelError::Inconsistent => 1,
        KernelError::Syntax(_)
        | KernelError::UndefinedName(_)
        | KernelError::RoleBox(_)
        | KernelError::Datatype(_)
        | KernelError::SaveLoad(_) => 2,
        KernelError::NotClassified | KernelError::Cancelled | KernelError::Internal(_) => 3,
    }
}

fn run(cli: &Cli) -> Result<(), KernelError> {
    let mut runner = ScriptRunner::new();

    if let Some(path) = &cli.load {
        let text = std::fs::read_to_string(path)
            .map_err(|e| KernelError::SaveLoad(format!("{}: {}", path.display(), e)))?;
        runner.run_script(&text)?;
        if !runner.kernel.is_consistent()? {
            return Err(KernelError::Inconsistent);
        }
    }

    if let Some(path) = &cli.run {
        let text = std::fs::read_to_string(path)
            .map_err(|e| KernelError::SaveLoad(format!("{}: {}", path.display(), e)))?;
        runner.run_script(&text)?;
    }

    if cli.json {
        println!("{}", serde_json::json!({ "answers": runner.output }));
    } else {
        for line in &runner.output {
            println!("{}", line);
        }
    }

    if cli.print_taxonomy {
        println!("{}", runner.kernel.print_taxonomy()?);
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

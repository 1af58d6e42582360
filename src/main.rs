use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use block_editor::core::NodeId;
use block_editor::runtime::{Editor, EditorConfig, Evaluation};
use block_editor::DomainError;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Editor configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a saved diagram and print every node
    Run {
        /// Diagram saved as a JSON snapshot
        diagram: PathBuf,

        /// Override an input source before running, e.g. `--set 3=0.5`
        #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_assignment)]
        assignments: Vec<(u64, f64)>,
    },
    /// Evaluate a saved diagram one node at a time
    Step {
        /// Diagram saved as a JSON snapshot
        diagram: PathBuf,
    },
    /// List the available block kinds
    Kinds,
}

fn parse_assignment(arg: &str) -> std::result::Result<(u64, f64), String> {
    let (id, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ID=VALUE, got '{}'", arg))?;
    let id = id
        .trim()
        .trim_start_matches('#')
        .parse::<u64>()
        .map_err(|e| format!("invalid node id '{}': {}", id, e))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value '{}': {}", value, e))?;
    Ok((id, value))
}

fn describe(result: Option<Result<f64, DomainError>>) -> String {
    match result {
        Some(Ok(value)) => value.to_string(),
        Some(Err(e)) => format!("error: {}", e),
        None => "-".to_string(),
    }
}

fn print_evaluation(editor: &Editor, evaluation: &Evaluation) {
    for &id in &evaluation.order {
        let label = editor.graph().node_label(id).unwrap_or("?");
        println!("{}\t{}\t{}", id, label, describe(evaluation.result(id)));
    }
}

fn open_editor(config: Option<&PathBuf>, diagram: &PathBuf) -> Result<Editor> {
    let config = match config {
        Some(path) => EditorConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EditorConfig::default(),
    };
    let mut editor = Editor::new(config);
    editor
        .load(diagram)
        .with_context(|| format!("failed to load diagram {}", diagram.display()))?;
    Ok(editor)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            diagram,
            assignments,
        } => {
            let mut editor = open_editor(cli.config.as_ref(), &diagram)?;
            for (id, value) in assignments {
                editor
                    .set_input_value(NodeId(id), value)
                    .with_context(|| format!("cannot set node {} to {}", id, value))?;
            }
            let report = editor.run();
            print_evaluation(&editor, &report.evaluation);
        }
        Commands::Step { diagram } => {
            let mut editor = open_editor(cli.config.as_ref(), &diagram)?;
            let mut count = 0usize;
            while let Some(outcome) = editor.step() {
                count += 1;
                let label = editor.graph().node_label(outcome.node).unwrap_or("?");
                println!(
                    "step {}\t{}\t{}\t{}",
                    count,
                    outcome.node,
                    label,
                    describe(Some(outcome.result))
                );
                if outcome.finished {
                    break;
                }
            }
        }
        Commands::Kinds => {
            let editor = Editor::new(EditorConfig::default());
            for (id, kind) in editor.block_kinds() {
                println!(
                    "{}\t{}\t{}\t{} input(s)",
                    id.0,
                    kind.name,
                    kind.category,
                    kind.arity()
                );
            }
        }
    }

    Ok(())
}

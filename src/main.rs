use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use search_syntax::ast::Node;
use search_syntax::config::SearchConfig;
use search_syntax::sql_compiler::SqlCompiler;
use search_syntax::{analyze, Analysis};

const DEFAULT_CONFIG_PATH: &str = "search_config.json";

#[derive(Parser)]
#[command(name = "search_syntax")]
#[command(about = "Search query playground - tokenize, validate and preview search-bar queries")]
#[command(version)]
struct Args {
    /// JSON configuration (fields, validation, sql); defaults to search_config.json
    config: Option<PathBuf>,

    /// Analyze a single query and exit instead of starting the prompt
    #[arg(short = 'q', long = "query")]
    query: Option<String>,

    /// Print the analysis as JSON
    #[arg(long = "json")]
    json: bool,
}

/// Loads the configuration at `path`, falling back to the builtin fields when
/// it cannot be read.
fn load_config(path: &Path) -> SearchConfig {
    match SearchConfig::from_json_file(path) {
        Ok(config) => {
            log::info!("using configuration {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("{e}, using builtin field definitions");
            SearchConfig::default()
        }
    }
}

fn print_fields(config: &SearchConfig) {
    for (name, definition) in config.fields.iter() {
        let operators: Vec<_> = definition.operators().iter().map(|op| op.symbol()).collect();
        let value_type = format!("{:?}", definition.value_type);
        println!("  {name:<32} {value_type:<10} {}", operators.join(" "));
    }
}

fn print_analysis(source: &str, analysis: &Analysis<'_>, compiler: &SqlCompiler) {
    for token in &analysis.tokens {
        if matches!(token.node, Node::Spaces) {
            continue;
        }
        let kind = format!("{:?}", token.kind());
        println!("  {:>3}..{:<3} {kind:<16} {}", token.span.start, token.span.end, token.text);
    }

    if analysis.validation.valid {
        println!("valid");
        match compiler.compile(&analysis.tokens, &analysis.validation) {
            Ok(result) => {
                println!("{}", result.sql);
                for optimization in &result.optimizations {
                    println!("  optimization: {optimization:?}");
                }
            }
            Err(e) => println!("cannot compile: {e}"),
        }
        return;
    }

    println!("invalid");
    for diagnostic in &analysis.validation.diagnostics {
        let text = source.get(diagnostic.span.start..diagnostic.span.end).unwrap_or("");
        println!("  {}..{} {}: {text:?}", diagnostic.span.start, diagnostic.span.end, diagnostic.reason);
    }
}

fn run_query(query: &str, json: bool, config: &SearchConfig, compiler: &SqlCompiler) -> Result<()> {
    let analysis = analyze(query, config);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(query, &analysis, compiler);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = load_config(&config_path);
    let compiler = SqlCompiler::from_options(config.sql.clone());

    if let Some(query) = &args.query {
        return run_query(query, args.json, &config, &compiler);
    }

    println!("search syntax playground, `:fields` lists keys, `:json <query>` dumps the analysis, `:quit` exits");
    let mut editor = DefaultEditor::new()?;

    loop {
        match editor.readline("search> ") {
            Ok(line) => {
                let line = line.trim_end();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;

                if line == ":quit" {
                    break;
                } else if line == ":fields" {
                    print_fields(&config);
                } else if let Some(query) = line.strip_prefix(":json ") {
                    run_query(query, true, &config, &compiler)?;
                } else {
                    run_query(line, args.json, &config, &compiler)?;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

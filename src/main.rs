//! gilt CLI
//!
//! Interactive Go prompt plus file commands for the checker and the
//! front end.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::*;
use gilt::config::Config;
use gilt::lexer::Lexer;
use gilt::parser::parse_source;
use gilt::Session;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gilt")]
#[command(author = "gilt developers")]
#[command(version)]
#[command(about = "gilt - an incremental Go-to-Lua REPL compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Source file to compile
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Configuration file (defaults to ./gilt.toml when present)
    #[arg(long, global = true, env = "GILT_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory searched for imported Go source; may be repeated
    #[arg(long = "source-root", global = true, value_name = "DIR")]
    source_roots: Vec<PathBuf>,

    /// Allow test-only bridge packages such as gitesting
    #[arg(long, global = true)]
    test_mode: bool,

    /// Skip the unused-import check
    #[arg(long, global = true)]
    no_unused_imports: bool,

    /// Log filter, e.g. `gilt=debug`
    #[arg(long, global = true, env = "GILT_LOG", value_name = "FILTER")]
    log: Option<String>,

    /// No banner or result echo
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive prompt
    Repl,
    /// Type-check a Go file as one package and print the program text
    /// handed to the runtime
    Compile {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Type-check a Go file as one package
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Parse a Go file and print its syntax tree
    Parse {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the tokens of a Go file
    Lex {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(2);
        }
    };
    init_tracing(config.log_filter.as_deref());

    let result = match &cli.command {
        Some(Commands::Repl) => run_repl(config),
        Some(Commands::Compile { file }) => compile_file(config, file),
        Some(Commands::Check { file }) => check_file(config, file),
        Some(Commands::Parse { file, json }) => parse_file(file, *json),
        Some(Commands::Lex { file }) => lex_file(file),
        None => match &cli.file {
            Some(file) => compile_file(config, file),
            None => run_repl(config),
        },
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// File settings first, then flags and environment on top
fn load_config(cli: &Cli) -> gilt::Result<Config> {
    let mut config = Config::discover(cli.config.as_deref())?;
    config.source_roots.extend(cli.source_roots.iter().cloned());
    config.test_mode |= cli.test_mode;
    config.disable_unused_import_check |= cli.no_unused_imports;
    config.quiet |= cli.quiet;
    if cli.log.is_some() {
        config.log_filter = cli.log.clone();
    }
    Ok(config)
}

fn init_tracing(filter: Option<&str>) {
    let filter = match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_repl(config: Config) -> anyhow::Result<()> {
    let quiet = config.quiet;
    if !quiet {
        println!("{}", format!("gilt v{}", env!("CARGO_PKG_VERSION")).green().bold());
        println!("Type {} for help, {} to exit\n", ":help".cyan(), ":quit".cyan());
    }

    let mut rl = DefaultEditor::new()?;
    let mut session = Session::new(config.clone())?;
    let mut pending = String::new();

    loop {
        let prompt = if pending.is_empty() {
            format!("{} ", "gi>".blue().bold())
        } else {
            format!("{} ", "..>".blue())
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                if pending.is_empty() && line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                if pending.is_empty() && line.trim_start().starts_with(':') {
                    match line.trim() {
                        ":quit" | ":q" | ":exit" => break,
                        ":help" | ":h" => print_repl_help(),
                        ":ls" => {
                            for global in session.globals() {
                                println!("{}", global);
                            }
                        }
                        ":stats" => {
                            let stats = session.cache_stats();
                            println!(
                                "archives: {}, hits: {}, misses: {}",
                                stats.archives, stats.hits, stats.misses
                            );
                        }
                        ":clear" => {
                            session = Session::new(config.clone())?;
                            println!("Session cleared.");
                        }
                        other => println!("{}: Unknown command: {}", "Error".red(), other),
                    }
                    continue;
                }

                pending.push_str(&line);
                pending.push('\n');
                if !is_balanced(&pending) {
                    continue;
                }
                let source = std::mem::take(&mut pending);

                match session.submit(&source) {
                    Ok(outcome) => {
                        if !quiet {
                            for line in outcome.describe(session.env()) {
                                println!("{}", line.green());
                            }
                        }
                    }
                    Err(e) => println!("{}: {}", "Error".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    if !quiet {
        println!("Goodbye!");
    }
    Ok(())
}

/// Whether every bracket opened in `source` is closed again
fn is_balanced(source: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for c in source.chars() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' && quote != '`' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '`' | '\'' => in_string = Some(c),
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}

fn print_repl_help() {
    println!("{}", "\nREPL Commands:".yellow().bold());
    println!("  {}   - List declarations", ":ls".cyan());
    println!("  {} - Show archive cache statistics", ":stats".cyan());
    println!("  {} - Start a new session", ":clear".cyan());
    println!("  {}  - Exit", ":quit".cyan());
    println!("{}", "\nInput:".yellow().bold());
    println!("  {}", "x := 21".cyan());
    println!("  {}", "type Celsius float64".cyan());
    println!("  {}", "import \"strings\"".cyan());
    println!("  {}", "v, err := __lua(\"3 + 4\")".cyan());
    println!();
}

fn file_session(mut config: Config, path: &Path) -> anyhow::Result<Session> {
    config.full_package = true;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(Session::new(config)?.with_dir(if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir }))
}

fn compile_file(config: Config, path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let mut session = file_session(config, path)?;
    session.submit(&source)?;
    for chunk in session.runtime().executed() {
        print!("{}", chunk);
    }
    Ok(())
}

fn check_file(config: Config, path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let mut session = file_session(config, path)?;
    session.submit(&source)?;
    println!("{} No errors found in {}", "✓".green(), path.display());
    Ok(())
}

fn parse_file(path: &Path, json: bool) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    let ast = parse_source(&source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ast)?);
    } else {
        println!("{:#?}", ast);
    }
    Ok(())
}

fn lex_file(path: &Path) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)?;
    for token in Lexer::new(&source) {
        println!("{:?}", token);
    }
    Ok(())
}

use clap::{Parser, Subcommand};
use duo::{Error, FsResolver, GenerateOptions, Page, Renderer, Value};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "duo")]
#[command(about = "Duo - HTML templates rendered on the server and compiled for the browser")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a .duo file and print it back in canonical form
    Parse {
        /// Path to .duo file
        file: PathBuf,

        /// Print the token stream instead
        #[arg(long)]
        tokens: bool,

        /// Print the scope table instead
        #[arg(long)]
        scope: bool,

        /// Print tokens as JSON
        #[arg(long, requires = "tokens")]
        json: bool,
    },
    /// Render .duo files to HTML
    Render {
        /// Path to .duo file or directory
        file: PathBuf,

        /// Props as a JSON object
        #[arg(long, conflicts_with = "props_file")]
        props: Option<String>,

        /// Read props from a JSON file
        #[arg(long)]
        props_file: Option<PathBuf>,

        /// Directory that template paths resolve against
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Template rendered when a page fails
        #[arg(long)]
        error_page: Option<String>,
    },
    /// Generate DOM modules from .duo files
    Generate {
        /// Path to .duo file or directory
        #[arg(required_unless_present = "stdin")]
        file: Option<PathBuf>,

        /// Read from stdin
        #[arg(long)]
        stdin: bool,

        /// Name of the element factory
        #[arg(long, default_value = "h")]
        factory: String,

        /// Name of the reactive proxy
        #[arg(long, default_value = "proxy")]
        proxy: String,

        /// Name of the props parameter
        #[arg(long, default_value = "props")]
        props: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let result = match cli.command {
        Commands::Parse { file, tokens, scope, json } => parse_file(&file, tokens, scope, json),
        Commands::Render { file, props, props_file, root, error_page } => {
            read_props(props, props_file).and_then(|props| render_path(&file, props, root, error_page))
        }
        Commands::Generate { file, stdin, factory, proxy, props } => {
            let options = GenerateOptions { factory, proxy, props };
            if stdin {
                generate_stdin(&options)
            } else if let Some(path) = file {
                generate_path(&path, &options)
            } else {
                Err("provide a file/directory or use --stdin".to_string())
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprint!("{}", message);
            if !message.ends_with('\n') {
                eprintln!();
            }
            ExitCode::FAILURE
        }
    }
}

fn read(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("Error: {}: {}", path.display(), err))
}

/// Format an error with source context, colored on a terminal
fn report(err: &Error, source: &str, filename: &str) -> String {
    if io::stderr().is_terminal() {
        err.render_color(source, filename)
    } else {
        err.render(source, filename)
    }
}

fn parse_file(path: &Path, tokens: bool, scope: bool, json: bool) -> Result<(), String> {
    let source = read(path)?;
    let filename = path.display().to_string();

    if tokens {
        if json {
            let tokens = duo::parser::tokenize(&source);
            let out = serde_json::to_string_pretty(&tokens).map_err(|err| format!("Error: {}", err))?;
            println!("{}", out);
        } else {
            print!("{}", duo::parser::tokenizer::print(&source));
        }
        return Ok(());
    }

    let document = duo::parse(&filename, &source).map_err(|err| report(&Error::from(err), &source, &filename))?;
    if scope {
        print!("{}", document.scopes);
    } else {
        println!("{}", document);
    }
    Ok(())
}

fn read_props(props: Option<String>, props_file: Option<PathBuf>) -> Result<Value, String> {
    let json = match (props, props_file) {
        (Some(json), _) => json,
        (None, Some(path)) => read(&path)?,
        (None, None) => return Ok(Value::Absent),
    };
    let value: serde_json::Value =
        serde_json::from_str(&json).map_err(|err| format!("Error: invalid props: {}", err))?;
    Ok(Value::from(value))
}

fn render_path(path: &Path, props: Value, root: PathBuf, error_page: Option<String>) -> Result<(), String> {
    let resolver = FsResolver::new(root);
    let render = |file: &Path| -> Result<String, String> {
        let name = file.display().to_string();
        let result = match &error_page {
            Some(error_page) => Page::new(&resolver).error_page(error_page.as_str()).render(&name, props.clone()),
            None => Renderer::new(&resolver).render(&name, props.clone()),
        };
        result.map_err(|err| {
            let source = fs::read_to_string(file).unwrap_or_default();
            report(&err, &source, &name)
        })
    };

    if path.is_dir() {
        let start = Instant::now();
        let mut count = 0;
        for file in duo_files(path) {
            let html = render(&file)?;
            let output = file.with_extension("html");
            fs::write(&output, html).map_err(|err| format!("Error: {}: {}", output.display(), err))?;
            print_generated(&output.display().to_string());
            count += 1;
        }
        if count == 0 {
            return Err(format!("No .duo files found in {}", path.display()));
        }
        print_summary("Rendered", count, start.elapsed());
        Ok(())
    } else {
        print!("{}", render(path)?);
        Ok(())
    }
}

fn generate_stdin(options: &GenerateOptions) -> Result<(), String> {
    let mut source = String::new();
    io::stdin()
        .read_to_string(&mut source)
        .map_err(|err| format!("Error: failed to read stdin: {}", err))?;
    let code = duo::generate::generate("<stdin>", &source, options).map_err(|err| report(&err, &source, "<stdin>"))?;
    print!("{}", code);
    Ok(())
}

fn generate_path(path: &Path, options: &GenerateOptions) -> Result<(), String> {
    if path.is_file() {
        if path.extension().is_none_or(|ext| ext != "duo") {
            return Err(format!("Error: {} is not a .duo file", path.display()));
        }
        let start = Instant::now();
        generate_file(path, options)?;
        print_summary("Generated", 1, start.elapsed());
        Ok(())
    } else if path.is_dir() {
        let start = Instant::now();
        let mut count = 0;
        for file in duo_files(path) {
            generate_file(&file, options)?;
            count += 1;
        }
        if count == 0 {
            return Err(format!("No .duo files found in {}", path.display()));
        }
        print_summary("Generated", count, start.elapsed());
        Ok(())
    } else {
        Err(format!("Error: {} does not exist", path.display()))
    }
}

fn generate_file(path: &Path, options: &GenerateOptions) -> Result<(), String> {
    let source = read(path)?;
    let name = path.display().to_string();
    let code = duo::generate::generate(&name, &source, options).map_err(|err| report(&err, &source, &name))?;

    let output = path.with_extension("js");
    fs::write(&output, code).map_err(|err| format!("Error: {}: {}", output.display(), err))?;
    print_generated(&output.display().to_string());
    Ok(())
}

fn duo_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "duo"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

fn print_generated(path: &str) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("  \x1b[32m✓\x1b[0m {}", path);
    } else {
        eprintln!("  ✓ {}", path);
    }
}

fn print_summary(verb: &str, count: usize, elapsed: std::time::Duration) {
    let is_tty = io::stderr().is_terminal();
    let time_str = format_duration(elapsed);
    let files_word = if count == 1 { "file" } else { "files" };

    if is_tty {
        eprintln!("\n\x1b[1m✨ {} {} {} in {}\x1b[0m", verb, count, files_word, time_str);
    } else {
        eprintln!("\n✨ {} {} {} in {}", verb, count, files_word, time_str);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let micros = d.as_micros();
    if micros < 1000 {
        format!("{}μs", micros)
    } else if micros < 1_000_000 {
        format!("{:.1}ms", micros as f64 / 1000.0)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}

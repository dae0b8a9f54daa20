//! Swipe CLI.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use swipe_compiler::{CompilerConfig, CompilerError, Orchestrator, Output};

mod ui;

#[derive(Parser)]
#[command(name = "swipe")]
#[command(about = "Swipe - generates go-kit transports, clients and docs from Go option expressions")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate code for every Build call in the matched packages
    Gen {
        /// Package patterns relative to the module root
        #[arg(default_value = "./...")]
        patterns: Vec<String>,

        /// Module root (the directory containing go.mod)
        #[arg(short = 'C', long, default_value = ".")]
        work_dir: PathBuf,

        /// Build tag of generator-only files
        #[arg(long, default_value = "swipe")]
        build_tag: String,

        /// Worker threads (0: one per core)
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,

        /// Generate without sweeping or writing files
        #[arg(long)]
        dry_run: bool,

        /// Print generated files to stdout (implies --dry-run)
        #[arg(long)]
        print: bool,

        /// JS formatter command; reads stdin, writes stdout
        #[arg(long, default_value = "prettier --parser babel")]
        js_formatter: String,

        /// Leave generated JS unformatted
        #[arg(long)]
        no_js_format: bool,

        /// External Go formatter run after the built-in layout (e.g. "gofmt")
        #[arg(long)]
        go_formatter: Option<String>,

        /// Extra environment for formatter processes (KEY=VALUE)
        #[arg(short, long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
    },

    /// Print the version
    Version,
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}

fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("swipe {}", version());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Gen {
            patterns,
            work_dir,
            build_tag,
            jobs,
            dry_run,
            print,
            js_formatter,
            no_js_format,
            go_formatter,
            env,
        } => {
            let js_formatter = if no_js_format {
                None
            } else {
                Some(js_formatter.split_whitespace().map(str::to_string).collect())
            };
            let config = CompilerConfig {
                work_dir,
                patterns,
                env,
                build_tag,
                version: version(),
                js_formatter,
                go_formatter: go_formatter.map(|c| c.split_whitespace().map(str::to_string).collect()),
                jobs,
                write: !(dry_run || print),
            };
            generate(config, print)
        }
    }
}

fn generate(config: CompilerConfig, print: bool) -> miette::Result<ExitCode> {
    let start = Instant::now();
    let root = config.work_dir.clone();
    let write = config.write;
    tracing::debug!(work_dir = %root.display(), patterns = ?config.patterns, write, "starting generation");

    ui::print_compact_header(&version());
    let spinner = ui::spinner("Generating...");
    let output = Orchestrator::new(config).run();
    spinner.finish_and_clear();

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            ui::error_header();
            return Err(e.into());
        }
    };

    if print {
        for result in &output.results {
            println!("// {}\n{}", result.output_path.display(), result.content);
        }
    } else {
        report_files(&root, &output, write);
    }

    if output.is_success() {
        ui::timing("Generated", start.elapsed().as_millis());
        return Ok(ExitCode::SUCCESS);
    }

    ui::error_header();
    for failure in &output.failures {
        ui::error(&format!("{} ({})", failure.file.display(), failure.pkg_path));
        report_errors(&failure.errors);
    }
    for result in output.results.iter().filter(|r| !r.errs.is_empty()) {
        ui::error(&result.output_path.display().to_string());
        report_errors(&result.errs);
    }
    ui::dim(&format!("{} error(s)", output.error_count()));
    Ok(ExitCode::FAILURE)
}

fn report_files(root: &Path, output: &Output, write: bool) {
    if output.results.is_empty() && output.failures.is_empty() {
        ui::info("No Build calls found.");
        return;
    }
    let verb = if write { "Wrote" } else { "Generated (dry run)" };
    ui::success(&format!(
        "{verb} {} file(s) {} {} build(s) failed",
        output.results.len(),
        ui::symbols::DOT,
        output.failures.len()
    ));
    for result in &output.results {
        ui::file_line(root, &result.output_path, result.errs.len());
    }
}

fn report_errors(errors: &[CompilerError]) {
    for error in errors {
        eprintln!("{:?}", miette::Report::new(error.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_gen_defaults() {
        let cli = Cli::parse_from(["swipe", "gen"]);
        let Commands::Gen { patterns, dry_run, jobs, .. } = cli.command else {
            panic!("expected gen");
        };
        assert_eq!(patterns, ["./..."]);
        assert!(!dry_run);
        assert_eq!(jobs, 0);
    }

    #[test]
    fn test_parse_env() {
        assert_eq!(parse_env("GOFLAGS=-mod=mod").unwrap(), ("GOFLAGS".to_string(), "-mod=mod".to_string()));
        assert!(parse_env("GOFLAGS").is_err());
    }
}

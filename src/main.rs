use clap::Parser;
use metaforge::cli::{Cli, Command, PackageSpec};
use metaforge::config::Config;
use metaforge::output::{self, PythonRangeResult, RequirementResult};
use metaforge::registry::PyPi;
use metaforge::requirements::marker::parse_requirement_clause;
use metaforge::requirements::python_version::{python_limit, python_skip_selector};
use metaforge::requirements::selector::markers_to_selector;
use metaforge::resolve::Resolver;
use metaforge::sdist::{PythonHarness, SdistExtractor};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_output = cli.json;

    let result = match cli.command {
        Some(Command::Resolve {
            spec,
            no_sdist,
            index_url,
        }) => run_resolve(spec, no_sdist, index_url, json_output),
        Some(Command::PythonRange { expr }) => run_python_range(&expr, json_output),
        Some(Command::Requirement { raw }) => run_requirement(&raw, json_output),
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Log to stderr so JSON on stdout stays parseable; RUST_LOG overrides
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_resolve(
    spec: PackageSpec,
    no_sdist: bool,
    index_url: Option<String>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let support = config.python_support()?;

    let registry = PyPi::new(index_url.as_deref().unwrap_or(&config.index_url));
    let extractor = SdistExtractor::new(PythonHarness::new(
        &config.python_interpreter,
        config.build_script_timeout(),
    ));

    let mut resolver = Resolver::new(&registry, support);
    if !no_sdist {
        resolver = resolver.with_build_source(&extractor);
    }

    let resolved = resolver.resolve(&spec.package, spec.version.as_deref())?;

    if json_output {
        output::print_json(&resolved);
    } else {
        print!("{}", output::render_resolved(&resolved));
    }

    Ok(())
}

fn run_python_range(expr: &str, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let support = Config::load()?.python_support()?;

    let result = PythonRangeResult {
        expr: expr.to_string(),
        skip: python_skip_selector(expr, &support)?,
        limit: python_limit(expr, &support)?,
    };

    if json_output {
        output::print_json(&result);
    } else {
        print!("{}", output::render_python_range(&result));
    }

    Ok(())
}

fn run_requirement(raw: &str, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let clause = parse_requirement_clause(raw)?;
    let selector = markers_to_selector(&clause.markers);
    let result = RequirementResult::new(clause, selector);

    if json_output {
        output::print_json(&result);
    } else {
        print!("{}", output::render_requirement(&result));
    }

    Ok(())
}

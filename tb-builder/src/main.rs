use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use builder::logging;
use builder::{BuildConfig, ConfigError, GenerationOutput, MethodSlot, Module, encode_module};
use tokens::{WireError, decode_stream};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CliConfig {
    input: Option<String>,
    config: Option<String>,
    output: Option<String>,
    auto_name: bool,
    info: bool,
    help: bool,
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Io { path: PathBuf, err: std::io::Error },
    Config(ConfigError),
    Wire { path: PathBuf, err: WireError },
    Diagnostics(usize),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Usage(message) => write!(f, "{message}"),
            CliError::Io { path, err } => write!(f, "{}: {err}", path.display()),
            CliError::Config(err) => write!(f, "{err}"),
            CliError::Wire { path, err } => write!(f, "{}: {err}", path.display()),
            CliError::Diagnostics(count) => write!(f, "build failed with {count} diagnostic(s)"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Config(err)
    }
}

fn main() -> ExitCode {
    if let Err(err) = builder::init_logging() {
        eprintln!("logging disabled: {err}");
    }
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}: {err}", logging::category_build());
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), CliError> {
    let cli = parse_cli_args(args).map_err(CliError::Usage)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    let input = cli
        .input
        .as_deref()
        .map(PathBuf::from)
        .ok_or_else(|| CliError::Usage("missing input token file".to_string()))?;

    let config = build_config(&cli, &input)?;
    let bytes = std::fs::read(&input).map_err(|err| CliError::Io {
        path: input.clone(),
        err,
    })?;
    let stream = decode_stream(&bytes).map_err(|err| CliError::Wire {
        path: input.clone(),
        err,
    })?;
    info!(input = %input.display(), header = %stream.header(), tokens = stream.len(), "building");

    let output_path = output_path(&cli, &config);
    let output = builder::build(stream, config, cli.auto_name);
    for diagnostic in &output.diagnostics {
        eprintln!("{}", diagnostic.render());
    }
    if cli.info {
        print_module(&output.module);
    }
    persist(&output, &output_path)?;
    if !output.diagnostics.is_empty() {
        return Err(CliError::Diagnostics(output.diagnostics.len()));
    }
    Ok(())
}

/// Config file values first, then flags. Relative paths in the module are
/// resolved next to the input.
fn build_config(cli: &CliConfig, input: &Path) -> Result<BuildConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => BuildConfig::load(Path::new(path))?,
        None => BuildConfig::default(),
    };
    if (cli.config.is_none() || config.base_dir == Path::new("."))
        && let Some(parent) = input.parent().filter(|parent| !parent.as_os_str().is_empty())
    {
        config.base_dir = parent.to_path_buf();
    }
    if let Some(output) = &cli.output
        && let Some(name) = Path::new(output).file_name().and_then(|name| name.to_str())
    {
        config.file_name = name.to_string();
    }
    Ok(config)
}

fn output_path(cli: &CliConfig, config: &BuildConfig) -> PathBuf {
    match &cli.output {
        Some(output) => PathBuf::from(output),
        None => config.base_dir.join(&config.file_name),
    }
}

fn persist(output: &GenerationOutput, path: &Path) -> Result<(), CliError> {
    if !output.persist {
        info!(header = %output.module.header, "module is not written for this header");
        return Ok(());
    }
    let bytes = encode_module(&output.module).map_err(|err| CliError::Wire {
        path: path.to_path_buf(),
        err,
    })?;
    std::fs::write(path, bytes).map_err(|err| CliError::Io {
        path: path.to_path_buf(),
        err,
    })?;
    info!(path = %path.display(), "module written");
    Ok(())
}

fn print_module(module: &Module) {
    println!(
        "module {} {} ({}, {})",
        module.name,
        module.version,
        module.header,
        module.output.name()
    );
    if let Some(entry) = module.entry_point {
        let owner = module.symbols.type_name(entry.owner);
        println!("entry point: {owner}.{}", module.symbols.method(entry).name);
    }
    for ty in &module.types {
        let def = module.type_def(ty);
        println!("type {} ({:?})", def.full_name(), def.kind);
        for body in &ty.methods {
            let name = match body.slot {
                MethodSlot::Method(method) => module.symbols.method(method).name.clone(),
                MethodSlot::Constructor(_) => ".ctor".to_string(),
            };
            println!("  {name} ({} locals)", body.locals.len());
            for (index, instruction) in body.code.iter().enumerate() {
                println!("    IL_{index:04}: {instruction}");
            }
        }
    }
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    let mut index = 0usize;

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--config" => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --config".to_string())?;
                cfg.config = Some(path.clone());
                index += 2;
            }
            "-o" | "--output" => {
                let path = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for -o".to_string())?;
                cfg.output = Some(path.clone());
                index += 2;
            }
            "--auto-name" => {
                cfg.auto_name = true;
                index += 1;
            }
            "--info" => {
                cfg.info = true;
                index += 1;
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown flag '{value}'"));
            }
            path => {
                if cfg.input.is_some() {
                    return Err("multiple input files provided".to_string());
                }
                cfg.input = Some(path.to_string());
                index += 1;
            }
        }
    }

    Ok(cfg)
}

fn print_usage() {
    println!("Usage:");
    println!("  tb-build [--config <file>] [-o <out>] [--auto-name] [--info] <input.tkns>");
    println!();
    println!("  --config <file>  JSON build configuration");
    println!("  -o <out>         module file to write");
    println!("  --auto-name      name the module after the application");
    println!("  --info           print the generated module");
}

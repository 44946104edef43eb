//! CLI entry point for the `regmap` binary.

use std::env;
use std::ffi::OsString;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

use regmap_core::{
    decode_batch, extract_document, load_document, load_register_list, resolve_named,
    save_document, DecodeError, DecodeReport, Document, FileSink, LogSink, PageDumpSet, QueryError,
    RegisterQuery, ReportSink, SocProfile,
};
#[cfg(test)]
use tempfile as _;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const USAGE_TEXT: &str = "\
Usage: regmap <command> [options]

Commands:
  extract  Build a register map from dumped manual pages
  decode   Split register values into their named fields
  profiles List the built-in SoC profiles

Extract options:
  -s, --soc <name>         Built-in SoC profile (imx8mp, stm32mp157)
  -p, --profile <file>     Profile JSON file, replaces the built-in one
      --pages <file>       Page dump JSON of the reference manual
  -o, --output <file>      Output file (default: profile output file)

Decode options:
  -s, --soc <name>         SoC name, selects <soc>_registers.json
  -i, --input-dir <dir>    Directory of the register map (default: .)
  -o, --output-dir <dir>   Directory of <soc>_result.txt (default: .)
      --map <file>         Register map file, replaces the input-dir lookup
      --regsfile <file>    File of `name index value` lines
      --json               Print decoded registers as JSON on stdout
  <regs>                   '[{\"address\":\"0x30330070\",\"value\":\"0x0\"}]'

Common options:
  -v, --verbose            Debug logging (RUST_LOG overrides)
  -h, --help               Show this help message

Examples:
  regmap extract --soc imx8mp --pages imx8mp_pages.json
  regmap decode --soc imx8mp '[{\"address\":\"0x30330070\",\"value\":\"0x0\"}]'
  regmap decode --soc stm32mp157 --regsfile regs.txt
  regmap profiles
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Extract(ExtractArgs),
    Decode(DecodeArgs),
    Profiles(ProfilesArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct ExtractArgs {
    soc: Option<String>,
    profile: Option<PathBuf>,
    pages: PathBuf,
    output: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct DecodeArgs {
    soc: String,
    input_dir: PathBuf,
    output_dir: PathBuf,
    map: Option<PathBuf>,
    regsfile: Option<PathBuf>,
    regs: Option<String>,
    json: bool,
    verbose: bool,
}

#[derive(Debug, PartialEq, Eq)]
struct ProfilesArgs {
    json: bool,
    verbose: bool,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "extract" => parse_extract_args(args)
            .map(Command::Extract)
            .map(ParseResult::Command),
        "decode" => parse_decode_args(args)
            .map(Command::Decode)
            .map(ParseResult::Command),
        "profiles" => parse_profiles_args(args)
            .map(Command::Profiles)
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

fn option_value(args: &mut impl Iterator<Item = OsString>, flag: &OsString) -> Result<OsString, String> {
    args.next()
        .ok_or_else(|| format!("missing value for {}", flag.to_string_lossy()))
}

#[allow(clippy::while_let_on_iterator)]
fn parse_extract_args(mut args: impl Iterator<Item = OsString>) -> Result<ExtractArgs, String> {
    let mut soc: Option<String> = None;
    let mut profile: Option<PathBuf> = None;
    let mut pages: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg == "-s" || arg == "--soc" {
            soc = Some(option_value(&mut args, &arg)?.to_string_lossy().to_string());
        } else if arg == "-p" || arg == "--profile" {
            profile = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg == "--pages" {
            pages = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg == "-o" || arg == "--output" {
            output = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }
    }

    if soc.is_none() && profile.is_none() {
        return Err("missing --soc or --profile".to_string());
    }
    let pages = pages.ok_or_else(|| "missing --pages".to_string())?;
    Ok(ExtractArgs {
        soc,
        profile,
        pages,
        output,
        verbose,
    })
}

#[allow(clippy::while_let_on_iterator)]
fn parse_decode_args(mut args: impl Iterator<Item = OsString>) -> Result<DecodeArgs, String> {
    let mut soc: Option<String> = None;
    let mut input_dir = PathBuf::from(".");
    let mut output_dir = PathBuf::from(".");
    let mut map: Option<PathBuf> = None;
    let mut regsfile: Option<PathBuf> = None;
    let mut regs: Option<String> = None;
    let mut json = false;
    let mut verbose = false;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else if arg == "--json" {
            json = true;
        } else if arg == "-s" || arg == "--soc" {
            soc = Some(option_value(&mut args, &arg)?.to_string_lossy().to_string());
        } else if arg == "-i" || arg == "--input-dir" {
            input_dir = PathBuf::from(option_value(&mut args, &arg)?);
        } else if arg == "-o" || arg == "--output-dir" {
            output_dir = PathBuf::from(option_value(&mut args, &arg)?);
        } else if arg == "--map" {
            map = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg == "--regsfile" {
            regsfile = Some(PathBuf::from(option_value(&mut args, &arg)?));
        } else if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        } else if regs.is_some() {
            return Err("multiple register lists provided".to_string());
        } else {
            regs = Some(arg.to_string_lossy().to_string());
        }
    }

    let soc = soc.ok_or_else(|| "missing --soc".to_string())?;
    if regs.is_none() && regsfile.is_none() {
        return Err("missing register list or --regsfile".to_string());
    }
    Ok(DecodeArgs {
        soc,
        input_dir,
        output_dir,
        map,
        regsfile,
        regs,
        json,
        verbose,
    })
}

fn parse_profiles_args(args: impl Iterator<Item = OsString>) -> Result<ProfilesArgs, String> {
    let mut json = false;
    let mut verbose = false;

    for arg in args {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--json" {
            json = true;
        } else if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }
    }

    Ok(ProfilesArgs { json, verbose })
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(error: &impl Display) -> i32 {
    eprintln!("error: {error}");
    1
}

fn load_profile(args: &ExtractArgs) -> Result<SocProfile, i32> {
    let profile = match (&args.profile, &args.soc) {
        (Some(path), _) => SocProfile::from_json_file(path),
        (None, Some(soc)) => SocProfile::builtin(soc),
        (None, None) => return Err(fail(&"missing --soc or --profile")),
    };
    profile.map_err(|e| fail(&e))
}

fn run_extract(args: &ExtractArgs) -> Result<(), i32> {
    let profile = load_profile(args)?;
    let source = PageDumpSet::from_json_file(&args.pages).map_err(|e| fail(&e))?;
    debug!(pages = source.pages.len(), path = %args.pages.display(), "page dump loaded");

    let document = extract_document(&profile, &source).map_err(|e| fail(&e))?;

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&profile.output_file));
    save_document(&output_path, &document).map_err(|e| fail(&e))?;

    println!(
        "Extracted {} registers ({}) -> {}",
        document.register_count(),
        profile.name,
        output_path.display()
    );
    Ok(())
}

fn map_path(args: &DecodeArgs) -> PathBuf {
    args.map.clone().unwrap_or_else(|| {
        args.input_dir
            .join(format!("{}_registers.json", args.soc))
    })
}

fn result_path(args: &DecodeArgs) -> PathBuf {
    args.output_dir.join(format!("{}_result.txt", args.soc))
}

/// Appends to the result file and mirrors each block to the log or to stdout JSON.
struct CliSink {
    file: FileSink,
    log: LogSink,
    collected: Option<Vec<DecodeReport>>,
}

impl ReportSink for CliSink {
    fn report(&mut self, report: &DecodeReport) -> Result<(), QueryError> {
        self.file.report(report)?;
        match self.collected.as_mut() {
            Some(reports) => reports.push(report.clone()),
            None => self.log.report(report)?,
        }
        Ok(())
    }

    fn miss(&mut self, query: &RegisterQuery, error: &DecodeError) -> Result<(), QueryError> {
        self.file.miss(query, error)?;
        self.log.miss(query, error)
    }
}

fn load_queries(args: &DecodeArgs, document: &Document) -> Result<Vec<RegisterQuery>, QueryError> {
    if let Some(path) = &args.regsfile {
        let named = load_register_list(path)?;
        return Ok(resolve_named(document, &named));
    }
    args.regs
        .as_deref()
        .map_or_else(|| Ok(Vec::new()), RegisterQuery::parse_list)
}

fn create_output_dir(dir: &Path) -> Result<(), i32> {
    fs::create_dir_all(dir)
        .map_err(|e| fail(&format!("failed to create {}: {e}", dir.display())))
}

fn run_decode(args: &DecodeArgs) -> Result<(), i32> {
    let document = load_document(&map_path(args)).map_err(|e| fail(&e))?;
    debug!(
        family = document.family().as_str(),
        name_key = document.register_name_key(),
        "register map layout"
    );
    let queries = load_queries(args, &document).map_err(|e| fail(&e))?;

    create_output_dir(&args.output_dir)?;
    let output_path = result_path(args);
    let mut sink = CliSink {
        file: FileSink::new(&output_path),
        log: LogSink,
        collected: args.json.then(Vec::new),
    };
    let summary = decode_batch(&document, &queries, &mut sink).map_err(|e| fail(&e))?;

    if let Some(reports) = sink.collected {
        let json = serde_json::to_string_pretty(&reports).map_err(|e| fail(&e))?;
        println!("{json}");
    } else {
        println!(
            "Decoded {} of {} registers -> {}",
            summary.decoded,
            queries.len(),
            output_path.display()
        );
    }
    if !summary.is_clean() {
        eprintln!("warning: {} registers not decoded", summary.failures.len());
    }
    Ok(())
}

fn run_profiles(args: &ProfilesArgs) -> Result<(), i32> {
    let profiles = SocProfile::builtin_names()
        .iter()
        .map(|name| SocProfile::builtin(name))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| fail(&e))?;

    if args.json {
        let json = serde_json::to_string_pretty(&profiles).map_err(|e| fail(&e))?;
        println!("{json}");
        return Ok(());
    }

    for profile in &profiles {
        println!(
            "{:<12} {:<15} {}",
            profile.name,
            profile.family.as_str(),
            profile.source_document
        );
    }
    Ok(())
}

const fn verbose(command: &Command) -> bool {
    match command {
        Command::Extract(args) => args.verbose,
        Command::Decode(args) => args.verbose,
        Command::Profiles(args) => args.verbose,
    }
}

fn main() {
    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            init_tracing(verbose(&command));
            info!(version = env!("CARGO_PKG_VERSION"), "regmap started");
            let result = match &command {
                Command::Extract(args) => run_extract(args),
                Command::Decode(args) => run_decode(args),
                Command::Profiles(args) => run_profiles(args),
            };
            result.err().unwrap_or(0)
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}

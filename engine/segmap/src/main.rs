use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use log::{debug, LevelFilter};
use segmap::{
    check_spec, explain_message, get_field, map_message, order_groups, read_input,
    ConverterRegistry, EngineConfig, Error, ErrorPolicy, MappingSpec,
};
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(
    name = "segmap",
    version,
    about = "Resolve fields in HL7 v2 messages and map them to JSON records",
    long_about = "segmap reads HL7 v2 messages and resolves field addresses such as\n\
        PID.5.1 or PID.11[2].3, maps whole messages to JSON records from a\n\
        declarative spec document, and groups order segments.\n\n\
        EXAMPLES:\n\
        \n  segmap get PID.5.1 adt.hl7                 Print the family name\n\
        \n  segmap map --spec admission.json adt.hl7   Map a message to JSON\n\
        \n  segmap orders --spec pharmacy.json omp.hl7 Group order segments\n\
        \n  segmap check-spec admission.json           Validate a spec document\n\
        \n  cat adt.hl7 | segmap get PV1.2             Read the message from stdin\n\n\
        ENVIRONMENT:\n\
        \n  SEGMAP_STRICT      Report ignored and overwritten order segments\n\
        \n  SEGMAP_FAIL_FAST   Stop mapping at the first failing field\n\
        \n  RUST_LOG           Log filter, overrides -v"
)]
struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the text at a field address
    #[command(
        long_about = "Print the text at a field address.\n\n\
            Exits with 1 and prints nothing when the address is absent."
    )]
    Get(GetArgs),

    /// Map a message to a JSON record
    Map(MapArgs),

    /// Group the order segments of a message
    Orders(OrdersArgs),

    /// Compile a spec document and summarize it
    CheckSpec(CheckSpecArgs),
}

#[derive(Debug, Args, Clone)]
struct GetArgs {
    /// Field address, e.g. PID.5.1 or OBX.5
    #[arg(value_name = "ADDR")]
    address: String,

    /// Message file (reads from stdin if not provided)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Which occurrence of a repeating segment to read, from 0
    #[arg(short = 'n', long, default_value_t = 0)]
    occurrence: usize,

    /// Print escape sequences as they appear in the message
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Args, Clone)]
struct MapArgs {
    /// JSON spec document
    #[arg(short, long, value_name = "FILE")]
    spec: PathBuf,

    /// Message file (reads from stdin if not provided)
    #[arg(value_name = "MESSAGE")]
    input: Option<PathBuf>,

    /// Stop at the first failing field
    #[arg(long)]
    fail_fast: bool,

    /// Also print where each value came from
    #[arg(long)]
    explain: bool,
}

#[derive(Debug, Args, Clone)]
struct OrdersArgs {
    /// JSON spec document with an `orders` section
    #[arg(short, long, value_name = "FILE")]
    spec: PathBuf,

    /// Message file (reads from stdin if not provided)
    #[arg(value_name = "MESSAGE")]
    input: Option<PathBuf>,

    /// Report segments that do not belong to their group
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Args, Clone)]
struct CheckSpecArgs {
    /// JSON spec document
    #[arg(value_name = "FILE")]
    spec: PathBuf,
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn write_json<W: Write, T: Serialize>(mut out: W, value: &T) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out).map_err(serde_json::Error::io)?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Error> {
    write_json(io::stdout().lock(), value)
}

fn load_spec(path: &Path) -> Result<MappingSpec, Error> {
    let text = read_input(Some(path))?;
    Ok(MappingSpec::from_json(&text)?)
}

fn run_get(args: &GetArgs) -> Result<i32, Error> {
    let text = read_input(args.input.as_deref())?;
    match get_field(&text, &args.address, args.occurrence, args.raw)? {
        Some(value) => {
            println!("{value}");
            Ok(0)
        }
        None => {
            debug!("{} is absent", args.address);
            Ok(1)
        }
    }
}

fn run_map(args: &MapArgs, mut config: EngineConfig) -> Result<i32, Error> {
    if args.fail_fast {
        config.error_policy = ErrorPolicy::FailFast;
    }
    let spec = load_spec(&args.spec)?;
    let text = read_input(args.input.as_deref())?;
    if args.explain {
        print_json(&explain_message(&spec, &text, &config)?)?;
    } else {
        print_json(&map_message(&spec, &text, &config)?)?;
    }
    Ok(0)
}

fn run_orders(args: &OrdersArgs, mut config: EngineConfig) -> Result<i32, Error> {
    if args.strict {
        config.strict_orders = true;
    }
    let spec = load_spec(&args.spec)?;
    let text = read_input(args.input.as_deref())?;
    let report = order_groups(&spec, &text, &config)?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&report)?;
    Ok(0)
}

fn run_check_spec(args: &CheckSpecArgs) -> Result<i32, Error> {
    let text = read_input(Some(args.spec.as_path()))?;
    print_json(&check_spec(&text, &ConverterRegistry::default())?)?;
    Ok(0)
}

fn run_cli() -> i32 {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let config = EngineConfig::from_env();
    debug!("{config:?}");

    let result = match &cli.command {
        Command::Get(args) => run_get(args),
        Command::Map(args) => run_map(args, config),
        Command::Orders(args) => run_orders(args, config),
        Command::CheckSpec(args) => run_check_spec(args),
    };
    match result {
        Ok(code) => code,
        Err(Error::Mapping(errors)) => {
            for err in errors.iter() {
                eprintln!("error: {err}");
            }
            1
        }
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn main() {
    std::process::exit(run_cli());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn help_lists_examples_and_environment() {
        let mut buf = Vec::new();
        Cli::command().write_long_help(&mut buf).unwrap();
        let help = String::from_utf8(buf).unwrap();
        assert!(help.contains("EXAMPLES"));
        assert!(help.contains("SEGMAP_FAIL_FAST"));
        assert!(help.contains("check-spec"));
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["segmap", "get", "PID.5.1", "adt.hl7", "-n", "2"]).unwrap();
        match cli.command {
            Command::Get(args) => {
                assert_eq!(args.address, "PID.5.1");
                assert_eq!(args.input, Some(PathBuf::from("adt.hl7")));
                assert_eq!(args.occurrence, 2);
                assert!(!args.raw);
            }
            other => panic!("expected get, got {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "segmap", "-vv", "map", "--spec", "s.json", "--fail-fast", "--explain",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Map(args) => {
                assert_eq!(args.spec, PathBuf::from("s.json"));
                assert!(args.input.is_none());
                assert!(args.fail_fast && args.explain);
            }
            other => panic!("expected map, got {other:?}"),
        }

        assert!(Cli::try_parse_from(["segmap", "map"]).is_err());
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_output_ends_with_newline_and_reports_write_errors() {
        let mut buf = Vec::new();
        write_json(&mut buf, &["a", "b"]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[\n  \"a\",\n  \"b\"\n]\n");

        let err = write_json(ClosedPipe, &"x").unwrap_err();
        assert!(matches!(err, Error::Output(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn commands_run_against_files() {
        let dir = tempfile::tempdir().unwrap();
        let message = dir.path().join("adt.hl7");
        fs::write(&message, "MSH|^~\\&|SRC\rPID|1||MRN1\rPV1|1|I").unwrap();
        let spec = dir.path().join("spec.json");
        fs::write(
            &spec,
            r#"{ "root": "Visit", "types": { "Visit": { "fields": [
                { "name": "mrn", "candidates": [ { "address": "PID.3", "required": true } ] }
            ] } } }"#,
        )
        .unwrap();

        let get = |address: &str| GetArgs {
            address: address.to_string(),
            input: Some(message.clone()),
            occurrence: 0,
            raw: false,
        };
        assert_eq!(run_get(&get("PV1.2")).unwrap(), 0);
        assert_eq!(run_get(&get("PV1.3")).unwrap(), 1);

        let rc = run_check_spec(&CheckSpecArgs { spec: spec.clone() }).unwrap();
        assert_eq!(rc, 0);

        let missing = dir.path().join("missing.hl7");
        let err = run_get(&GetArgs {
            input: Some(missing),
            ..get("PV1.2")
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

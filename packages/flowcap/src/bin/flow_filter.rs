//! flow-filter: copy the records of a capture stream that pass a filter
//! definition.
//!
//! Usage:
//!   flow-filter -f <filter-file> -F <definition> [-z level] [-m] [-c config.json]
//!               [-s symbol-dir] [-v VAR=value]... [-d] [--in <path>] [--out <path>]
//!
//! Without `--in`/`--out` the stream is read from stdin and written to stdout.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flowcap::filter::{Evaluator, FilterSet, LoadContext, Symbols, Variables};
use flowcap::record::xfield;
use flowcap::stream::{StreamConfig, StreamReader, StreamWriter};

const STDIN: &str = "/dev/stdin";
const STDOUT: &str = "/dev/stdout";

struct Args {
    filter_file: PathBuf,
    definition: String,
    z_level: Option<u32>,
    mmap: bool,
    config: Option<PathBuf>,
    symbol_dir: Option<PathBuf>,
    bindings: Vec<String>,
    debug: bool,
    input: PathBuf,
    output: PathBuf,
}

fn usage() {
    eprintln!("Usage: flow-filter -f <filter-file> -F <definition> [options] < in > out");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -f <file>       Filter file");
    eprintln!("  -F <name>       Filter definition to apply");
    eprintln!("  -z <level>      Compress output at zlib level 0-9");
    eprintln!("  -m              Map the input file instead of buffered reads");
    eprintln!("  -c <file>       JSON stream configuration");
    eprintln!("  -s <dir>        Directory with ip-prot.sym, ip-ports.sym, asn.sym, tag.sym");
    eprintln!("  -v NAME=value   Bind a filter file variable (repeatable)");
    eprintln!("  -d              Debug logging");
    eprintln!("  --in <path>     Input stream (default stdin)");
    eprintln!("  --out <path>    Output stream (default stdout)");
    eprintln!("  -V, --version   Print version information");
    eprintln!("  -h, --help      Print this help message");
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut filter_file = None;
    let mut definition = None;
    let mut z_level = None;
    let mut mmap = false;
    let mut config = None;
    let mut symbol_dir = None;
    let mut bindings = Vec::new();
    let mut debug = false;
    let mut input = PathBuf::from(STDIN);
    let mut output = PathBuf::from(STDOUT);

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        let mut value = || {
            it.next()
                .cloned()
                .with_context(|| format!("{arg} needs a value"))
        };
        match arg.as_str() {
            "-f" => filter_file = Some(PathBuf::from(value()?)),
            "-F" => definition = Some(value()?),
            "-z" => {
                let v = value()?;
                z_level = Some(v.parse().with_context(|| format!("bad zlib level '{v}'"))?);
            }
            "-m" => mmap = true,
            "-c" => config = Some(PathBuf::from(value()?)),
            "-s" => symbol_dir = Some(PathBuf::from(value()?)),
            "-v" => bindings.push(value()?),
            "-d" => debug = true,
            "--in" => input = PathBuf::from(value()?),
            "--out" => output = PathBuf::from(value()?),
            other => bail!("unexpected argument '{other}'"),
        }
    }

    Ok(Args {
        filter_file: filter_file.context("missing -f <filter-file>")?,
        definition: definition.context("missing -F <definition>")?,
        z_level,
        mmap,
        config,
        symbol_dir,
        bindings,
        debug,
        input,
        output,
    })
}

fn init_logging(debug: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::new(if debug { "debug" } else { "warn" }),
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => StreamConfig::read_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StreamConfig::default(),
    };
    if args.mmap {
        config.read.mmap = true;
    }
    if let Some(level) = args.z_level {
        config.write.compress = level > 0;
        config.write.z_level = level;
    }

    // Filter
    let mut vars = Variables::new();
    for binding in &args.bindings {
        vars.set_binding(binding)
            .with_context(|| format!("bad variable binding '{binding}'"))?;
    }
    let symbols = match &args.symbol_dir {
        Some(dir) => Symbols::from_dir(dir)
            .with_context(|| format!("loading symbols from {}", dir.display()))?,
        None => Symbols::default(),
    };
    let ctx = LoadContext {
        symbols,
        vars: Some(&vars),
        ..LoadContext::default()
    };
    let filters = FilterSet::load(&args.filter_file, &ctx)
        .with_context(|| format!("loading filter {}", args.filter_file.display()))?;
    let def = filters
        .definition(&args.definition)
        .with_context(|| format!("no filter definition named '{}'", args.definition))?;

    // Input
    let in_file = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let mut reader = StreamReader::open(in_file, &config.read)
        .with_context(|| format!("reading stream header from {}", args.input.display()))?;
    def.check_xfields(reader.xfield()).with_context(|| {
        format!(
            "definition '{}' needs fields the stream lacks: {}",
            def.name,
            xfield::names(def.xfields & !reader.xfield()).join(", ")
        )
    })?;

    // Output
    let out_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&args.output)
        .with_context(|| format!("opening {}", args.output.display()))?;
    let seekable = out_file.metadata().map(|m| m.is_file()).unwrap_or(false);
    let mut writer = StreamWriter::new(out_file, &config.write)?;
    {
        let src = reader.header();
        let version = reader.version();
        let out = writer.header_mut();
        out.set_version(version.d_version, version.agg_version, version.agg_method);
        if let Some(comments) = src.comments() {
            out.set_comments(comments);
        }
        if let Some(host) = src.cap_hostname() {
            out.set_cap_hostname(host);
        }
        if seekable {
            out.set_flows_count(0);
        }
    }
    writer.write_header().context("writing stream header")?;

    let mut evaluator = Evaluator::new();
    let fo = reader.offsets().clone();
    let mut rec = vec![0u8; reader.record_size()];
    let mut passed: u32 = 0;

    while let Some(r) = reader.next_record().context("reading record")? {
        if !evaluator.evaluate(&filters, def, r, &fo).is_permit() {
            continue;
        }
        rec.copy_from_slice(r);
        writer.write_record(&mut rec).context("writing record")?;
        passed = passed.wrapping_add(1);
    }

    if seekable {
        writer.header_mut().set_flows_count(passed);
        writer.write_header().context("rewriting stream header")?;
    }
    let total = writer.close().context("closing output stream")?;

    tracing::info!(
        read = reader.records_read(),
        written = passed,
        bytes = total,
        definition = %def.name,
        "filter done"
    );
    Ok(())
}

fn main() {
    let raw: Vec<String> = std::env::args().collect();
    if raw.iter().any(|a| a == "--version" || a == "-V") {
        println!("flow-filter {}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }
    if raw.iter().any(|a| a == "--help" || a == "-h") {
        usage();
        std::process::exit(0);
    }

    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("flow-filter: {e:#}");
            usage();
            std::process::exit(1);
        }
    };
    init_logging(args.debug);

    if let Err(e) = run(&args) {
        tracing::error!("{e:#}");
        eprintln!("flow-filter: {e:#}");
        std::process::exit(1);
    }
}

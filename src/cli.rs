// Command-line interface for tscodec.
//
// Uses explicit subcommands and long-form options over the engine and io
// layers: text integers in, codec streams out, and back.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::{info, warn};

use crate::codec::header::{FORMAT_VERSION, MAX_COUNT};
use crate::codec::{self, Bucket};
use crate::compress::frame;
use crate::compress::secondary::SecondaryCompression;
use crate::engine::EncodeOptions;
use crate::io::{decode_stream, encode_stream};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DEFAULT_ZLIB_LEVEL: u32 = 6;

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Delta-of-delta codec for 64-bit integer series.
#[derive(Parser, Debug)]
#[command(
    name = "tscodec",
    version,
    about = "Delta-of-delta encoder/decoder for integer time series",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Encode newline-separated integers.
    Encode(EncodeArgs),
    /// Decode a raw or wrapped stream back to integers.
    Decode(DecodeArgs),
    /// Print the header, preamble and class histogram of a stream.
    Inspect(InspectArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SecondaryArg {
    None,
    Lzma,
    Zlib,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Secondary compressor applied to the encoded stream.
    #[arg(long, value_enum, default_value_t = SecondaryArg::None)]
    secondary: SecondaryArg,

    /// Secondary compression level (0-9, zlib only).
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u32).range(0..=9))]
    level: Option<u32>,

    /// Input text file (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Input stream (default: stdin).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "input_pos")]
    input: Option<PathBuf>,

    /// Output text file (default: stdout).
    #[arg(long, value_hint = ValueHint::FilePath, conflicts_with = "output_pos")]
    output: Option<PathBuf>,

    /// Input file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    input_pos: Option<PathBuf>,

    /// Output file (positional form).
    #[arg(value_hint = ValueHint::FilePath)]
    output_pos: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Encoded input file (default: stdin).
    #[arg(value_hint = ValueHint::FilePath)]
    input: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Inspect,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    secondary: SecondaryArg,
    level: Option<u32>,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(3),
        json_output: cli.json_output,
        secondary: SecondaryArg::None,
        level: None,
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Encode(args) => {
            opts.command = Command::Encode;
            opts.secondary = args.secondary;
            opts.level = args.level;
            opts.input_file = args.input.or(args.input_pos);
            opts.output_file = args.output.or(args.output_pos);
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.input_file = args.input.or(args.input_pos);
            opts.output_file = args.output.or(args.output_pos);
        }
        Cmd::Inspect(args) => {
            opts.command = Command::Inspect;
            opts.input_file = args.input;
        }
        Cmd::Config => {}
    }
    opts
}

/// Log filter for the given flags. `RUST_LOG` still takes precedence.
fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    }
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("tscodec".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let opts = resolve_options(cli);
        let _ = build_encode_options(&opts);
    }
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!("tscodec version {version} (Rust)");

    let lzma = cfg!(feature = "lzma-secondary") as u8;
    let zlib = cfg!(feature = "zlib-secondary") as u8;
    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;

    eprintln!("SECONDARY_LZMA={lzma}");
    eprintln!("SECONDARY_ZLIB={zlib}");
    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("FORMAT_VERSION={FORMAT_VERSION}");
    eprintln!("MAX_COUNT={MAX_COUNT}");
    eprintln!("DEFAULT_ZLIB_LEVEL={DEFAULT_ZLIB_LEVEL}");
}

// ---------------------------------------------------------------------------
// Build EncodeOptions from CLI options
// ---------------------------------------------------------------------------

fn build_encode_options(opts: &Options) -> Result<EncodeOptions, String> {
    if opts.level.is_some() && opts.secondary != SecondaryArg::Zlib {
        warn!("--level only applies to zlib, ignoring");
    }

    let secondary = match opts.secondary {
        SecondaryArg::None => SecondaryCompression::None,
        #[cfg(feature = "lzma-secondary")]
        SecondaryArg::Lzma => SecondaryCompression::Lzma,
        #[cfg(not(feature = "lzma-secondary"))]
        SecondaryArg::Lzma => {
            return Err("lzma support requires the 'lzma-secondary' feature".into());
        }
        #[cfg(feature = "zlib-secondary")]
        SecondaryArg::Zlib => SecondaryCompression::Zlib {
            level: opts.level.unwrap_or(DEFAULT_ZLIB_LEVEL),
        },
        #[cfg(not(feature = "zlib-secondary"))]
        SecondaryArg::Zlib => {
            return Err("zlib support requires the 'zlib-secondary' feature".into());
        }
    };

    Ok(EncodeOptions::with_secondary(secondary))
}

// ---------------------------------------------------------------------------
// Input / output helpers
// ---------------------------------------------------------------------------

fn read_input(path: Option<&Path>) -> Result<Vec<u8>, String> {
    let mut data = Vec::new();
    match path {
        Some(path) => {
            let file =
                File::open(path).map_err(|e| format!("input file: {}: {e}", path.display()))?;
            BufReader::with_capacity(BUF_SIZE, file)
                .read_to_end(&mut data)
                .map_err(|e| format!("input file: {}: {e}", path.display()))?;
        }
        None => {
            io::stdin()
                .lock()
                .read_to_end(&mut data)
                .map_err(|e| format!("read error: {e}"))?;
        }
    }
    Ok(data)
}

/// Refuse to clobber an existing output file unless `-f` was given.
fn check_output(path: Option<&Path>, force: bool) -> Result<(), String> {
    match path {
        Some(path) if path.exists() && !force => Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        )),
        _ => Ok(()),
    }
}

fn write_output(path: Option<&Path>, data: &[u8]) -> Result<(), String> {
    match path {
        Some(path) => crate::io::write_file_atomic(path, data)
            .map_err(|e| format!("output file: {}: {e}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(data)
                .and_then(|()| stdout.flush())
                .map_err(|e| format!("write error: {e}"))
        }
    }
}

fn hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> Result<(), String> {
    let encode_opts = build_encode_options(opts)?;
    check_output(opts.output_file.as_deref(), opts.force)?;
    let input = read_input(opts.input_file.as_deref())?;

    // Encode fully before touching the output, so failures leave nothing behind.
    let mut encoded = Vec::new();
    let stats = encode_stream(input.as_slice(), &mut encoded, &encode_opts)
        .map_err(|e| format!("encode error: {e}"))?;
    write_output(opts.output_file.as_deref(), &encoded)?;

    info!(
        "encoder: {} values, input size: {}, output size: {}",
        stats.values, stats.input_size, stats.output_size
    );

    if opts.json_output {
        let json = serde_json::json!({
            "command": "encode",
            "values": stats.values,
            "input_size": stats.input_size,
            "codec_size": stats.codec_size,
            "output_size": stats.output_size,
            "secondary": encode_opts.secondary.name(),
            "wrapped": stats.secondary_id.is_some(),
            "output_sha256": stats.output_sha256.as_ref().map(|d| hex(d)),
        });
        eprintln!("{json:#}");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> Result<(), String> {
    check_output(opts.output_file.as_deref(), opts.force)?;
    let input = read_input(opts.input_file.as_deref())?;

    let mut text = Vec::new();
    let stats =
        decode_stream(input.as_slice(), &mut text).map_err(|e| format!("decode error: {e}"))?;
    write_output(opts.output_file.as_deref(), &text)?;

    info!(
        "decoder: {} values, input size: {}, wrapped: {}",
        stats.values, stats.input_size, stats.wrapped
    );

    if opts.json_output {
        let json = serde_json::json!({
            "command": "decode",
            "values": stats.values,
            "input_size": stats.input_size,
            "output_size": stats.output_size,
            "wrapped": stats.wrapped,
            "output_sha256": stats.output_sha256.as_ref().map(|d| hex(d)),
        });
        eprintln!("{json:#}");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Inspect command
// ---------------------------------------------------------------------------

fn cmd_inspect(opts: &Options) -> Result<(), String> {
    let data = read_input(opts.input_file.as_deref())?;
    let secondary_id = frame::is_wrapped(&data).then(|| data.get(1).copied()).flatten();
    let raw = frame::unwrap(&data).map_err(|e| format!("invalid stream: {e}"))?;
    let info = codec::inspect(&raw).map_err(|e| format!("invalid stream: {e}"))?;

    if opts.json_output {
        let histogram: serde_json::Map<String, serde_json::Value> = info
            .histogram
            .iter()
            .map(|(bucket, n)| (bucket_name(bucket).to_string(), n.into()))
            .collect();
        let json = serde_json::json!({
            "version": info.header.version,
            "count_width": info.header.width.bytes(),
            "payload": format!("{:?}", info.header.payload),
            "count": info.header.count,
            "first_value": info.first_value,
            "first_delta": info.first_delta,
            "input_size": data.len(),
            "encoded_size": info.encoded_len,
            "secondary_id": secondary_id,
            "bitstream_size": info.bitstream_len,
            "bitstream_used": info.bitstream_used,
            "buckets": histogram,
        });
        println!("{json:#}");
        return Ok(());
    }

    println!("format version:      {}", info.header.version);
    println!("count width:         {} byte(s)", info.header.width.bytes());
    println!("payload:             {:?}", info.header.payload);
    match secondary_id {
        Some(id) => println!("secondary:           id {id} ({} bytes wrapped)", data.len()),
        None => println!("secondary:           none"),
    }
    println!("value count:         {}", info.header.count);
    println!("first value:         {}", info.first_value);
    println!("first delta:         {}", info.first_delta);
    println!("encoded size:        {}", info.encoded_len);
    println!(
        "bitstream:           {} bytes ({} used)",
        info.bitstream_len, info.bitstream_used
    );
    for (bucket, n) in info.histogram.iter() {
        println!(
            "  {:<8} {:>2}-bit payload: {n}",
            bucket_name(bucket),
            bucket.payload_bits()
        );
    }
    Ok(())
}

fn bucket_name(bucket: Bucket) -> &'static str {
    match bucket {
        Bucket::Zero => "zero",
        Bucket::Tiny => "tiny",
        Bucket::Small => "small",
        Bucket::Medium => "medium",
        Bucket::Word => "word",
        Bucket::Full => "full",
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Main CLI entry point. Parses arguments via clap, dispatches commands.
pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(opts.quiet, opts.verbose)),
    )
    .format_timestamp(None)
    .format_target(false)
    .init();

    let result = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Inspect => cmd_inspect(&opts),
        Command::Config => {
            cmd_config();
            Ok(())
        }
    };

    let exit_code = match result {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("tscodec: {msg}");
            1
        }
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("tscodec".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    #[test]
    fn encode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "encode",
            "--secondary",
            "zlib",
            "--level",
            "9",
            "in.txt",
            "out.tsc",
        ]);
        assert_eq!(opts.command, Command::Encode);
        assert_eq!(opts.secondary, SecondaryArg::Zlib);
        assert_eq!(opts.level, Some(9));
        assert_eq!(opts.input_file, Some(PathBuf::from("in.txt")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.tsc")));
    }

    #[test]
    fn long_form_paths() {
        let opts = parse_opts(&["decode", "--input", "a.tsc", "--output", "a.txt"]);
        assert_eq!(opts.command, Command::Decode);
        assert_eq!(opts.input_file, Some(PathBuf::from("a.tsc")));
        assert_eq!(opts.output_file, Some(PathBuf::from("a.txt")));
    }

    #[test]
    fn stdin_stdout_when_paths_omitted() {
        let opts = parse_opts(&["encode"]);
        assert!(opts.input_file.is_none());
        assert!(opts.output_file.is_none());
        assert_eq!(opts.secondary, SecondaryArg::None);
    }

    #[test]
    fn level_out_of_range_is_rejected() {
        let argv = ["tscodec", "encode", "--level", "10"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "--json", "inspect", "x.tsc"]);
        assert!(opts.force);
        assert!(opts.json_output);
        assert_eq!(opts.command, Command::Inspect);
        assert_eq!(opts.input_file, Some(PathBuf::from("x.tsc")));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let argv = ["tscodec", "-q", "-v", "config"];
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn verbose_is_capped() {
        let opts = parse_opts(&["-v", "-v", "-v", "-v", "-v", "config"]);
        assert_eq!(opts.verbose, 3);
    }

    #[test]
    fn log_filter_levels() {
        assert_eq!(log_filter(true, 0), "error");
        assert_eq!(log_filter(false, 0), "warn");
        assert_eq!(log_filter(false, 1), "info");
        assert_eq!(log_filter(false, 2), "debug");
        assert_eq!(log_filter(false, 3), "trace");
    }

    #[test]
    fn encode_options_mapping() {
        let opts = parse_opts(&["encode", "--secondary", "none", "in", "out"]);
        let e = build_encode_options(&opts).unwrap();
        assert!(!e.secondary.is_enabled());

        #[cfg(feature = "zlib-secondary")]
        {
            let opts = parse_opts(&["encode", "--secondary", "zlib", "in", "out"]);
            let e = build_encode_options(&opts).unwrap();
            assert!(matches!(
                e.secondary,
                SecondaryCompression::Zlib {
                    level: DEFAULT_ZLIB_LEVEL
                }
            ));
        }

        #[cfg(feature = "lzma-secondary")]
        {
            let opts = parse_opts(&["encode", "--secondary", "lzma", "in", "out"]);
            let e = build_encode_options(&opts).unwrap();
            assert_eq!(e.secondary.name(), "lzma");
        }
    }

    #[test]
    fn existing_output_needs_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsc");
        std::fs::write(&path, b"old").unwrap();
        assert!(check_output(Some(path.as_path()), false).is_err());
        assert!(check_output(Some(path.as_path()), true).is_ok());
        assert!(check_output(Some(dir.path().join("new").as_path()), false).is_ok());
        assert!(check_output(None, false).is_ok());
    }

    #[test]
    fn hex_digest() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
    }

    #[test]
    fn fuzz_parse_does_not_panic() {
        fuzz_try_parse_args(&["encode".into(), "--secondary".into(), "bogus".into()]);
        fuzz_try_parse_args(&["inspect".into()]);
        fuzz_try_parse_args(&[]);
    }
}

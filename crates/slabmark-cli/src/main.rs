use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process;

use slabmark_core::{Engine, EngineConfig, HtmlEmitOptions, SoftBreak};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_IO: i32 = 74;
const EXIT_USAGE: i32 = 64;

struct Args {
    input: Option<String>,
    sanitized: bool,
    soft_break: SoftBreak,
    max_nesting: Option<usize>,
    verbose: bool,
}

fn main() {
    let args = parse_args();
    init_tracing(args.verbose);

    let source = match &args.input {
        Some(path) => fs::read(path).unwrap_or_else(|err| {
            eprintln!("failed to read {}: {}", path, err);
            process::exit(EXIT_IO);
        }),
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer).unwrap_or_else(|err| {
                eprintln!("failed to read stdin: {}", err);
                process::exit(EXIT_IO);
            });
            buffer
        }
    };
    debug!(bytes = source.len(), "input read");

    let mut config = EngineConfig {
        emit: HtmlEmitOptions {
            sanitize: args.sanitized,
            soft_break: args.soft_break,
        },
        ..EngineConfig::default()
    };
    if let Some(max_nesting) = args.max_nesting {
        config.max_nesting = max_nesting;
    }

    let mut engine = Engine::new(config);
    let status = render(&mut engine, &source);
    let output = engine.output().to_vec();
    engine.free_output_buffer();

    if status != 0 {
        eprintln!("error: {}", String::from_utf8_lossy(&output));
        process::exit(status);
    }
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout.write_all(&output).and_then(|()| stdout.flush()) {
        eprintln!("failed to write output: {}", err);
        process::exit(EXIT_IO);
    }
}

/// Stages `source` in engine memory and renders it the way a wasm host
/// would: alloc, copy, render, free.
fn render(engine: &mut Engine, source: &[u8]) -> i32 {
    let Ok(len) = u32::try_from(source.len()) else {
        eprintln!("input too large: {} bytes", source.len());
        process::exit(EXIT_IO);
    };
    let staged = engine.alloc(len).and_then(|ptr| engine.write(ptr, source).map(|()| ptr));
    let ptr = match staged {
        Ok(ptr) => ptr,
        Err(err) => {
            eprintln!("error: {}", err);
            process::exit(err.status());
        }
    };
    let status = engine.render(ptr, len);
    engine.free(ptr, len);
    debug!(status, output_len = engine.output_len(), "render done");
    status
}

fn parse_args() -> Args {
    let mut args = Args {
        input: None,
        sanitized: false,
        soft_break: SoftBreak::Newline,
        max_nesting: None,
        verbose: false,
    };

    let mut argv = env::args().skip(1);
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                process::exit(0);
            }
            "--sanitized" => args.sanitized = true,
            "--soft-break-space" => args.soft_break = SoftBreak::Space,
            "-v" | "--verbose" => args.verbose = true,
            "--max-nesting" => {
                let value = argv.next().and_then(|value| value.parse().ok());
                match value {
                    Some(depth) => args.max_nesting = Some(depth),
                    None => {
                        eprintln!("--max-nesting expects a number");
                        print_usage();
                        process::exit(EXIT_USAGE);
                    }
                }
            }
            _ => {
                if args.input.is_none() && !arg.starts_with('-') {
                    args.input = Some(arg);
                } else {
                    eprintln!("unexpected argument: {}", arg);
                    print_usage();
                    process::exit(EXIT_USAGE);
                }
            }
        }
    }
    args
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn print_usage() {
    eprintln!(
        "Usage: slabmark [--sanitized] [--soft-break-space] [--max-nesting N] [-v|--verbose] [input]\n\
         Renders Markdown from `input` or stdin to HTML on stdout.\n\
         On failure the exit code is the render status: 1 invalid encoding, \
         2 allocation failure, 3 invalid span."
    );
}

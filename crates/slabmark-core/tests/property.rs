use std::panic;
use std::time::{Duration, Instant};

use slabmark_core::{Engine, EngineConfig, HtmlEmitOptions, SoftBreak, markdown_to_html_with};

const CASES: usize = 200;
const MAX_LEN: usize = 512;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \
\n\t\r#*_`[](){}!<>:+-=.&;/\\\\\"'~|";

#[test]
fn render_never_panics_on_random_markdown() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_1a2b_3c4d_5e6f);
    let mut engine = Engine::default();
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let status = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let ptr = engine.alloc(source.len() as u32)?;
            engine.write(ptr, source.as_bytes())?;
            let status = engine.render(ptr, source.len() as u32);
            engine.free(ptr, source.len() as u32);
            Ok::<i32, slabmark_core::RenderError>(status)
        }));
        match status {
            Ok(Ok(0)) => {}
            Ok(Ok(status)) => {
                return Err(format!("case {} returned status {}: {:?}", case, status, source).into());
            }
            Ok(Err(err)) => return Err(format!("case {} staging failed: {}", case, err).into()),
            Err(_) => return Err(format!("render panicked for case {}: {:?}", case, source).into()),
        }
        if std::str::from_utf8(engine.output()).is_err() {
            return Err(format!("case {} produced non-UTF-8 output", case).into());
        }
        engine.free_output_buffer();
    }
    assert_eq!(engine.memory().live_count(), 0);
    Ok(())
}

#[test]
fn random_bytes_yield_html_or_encoding_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x0bad_f00d_dead_beef);
    let mut engine = Engine::default();
    for case in 0..CASES {
        let len = rng.gen_range(0, 64);
        let bytes: Vec<u8> = (0..len).map(|_| rng.next_u32() as u8).collect();
        let expected = if std::str::from_utf8(&bytes).is_ok() { 0 } else { 1 };
        let ptr = engine.alloc(len as u32)?;
        engine.write(ptr, &bytes)?;
        let status = engine.render(ptr, len as u32);
        engine.free(ptr, len as u32);
        if status != expected {
            return Err(format!("case {} returned {} for {:?}", case, status, bytes).into());
        }
    }
    Ok(())
}

#[test]
fn renders_are_deterministic_across_engines() {
    let mut rng = Lcg::new(0x1234_5678_9abc_def0);
    let mut left = Engine::default();
    let mut right = Engine::default();
    for _ in 0..CASES / 4 {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let a = left.render_bytes(source.as_bytes()).map(str::to_string);
        let b = right.render_bytes(source.as_bytes()).map(str::to_string);
        assert_eq!(a, b, "diverged on {:?}", source);
    }
}

#[test]
fn sanitized_and_space_break_modes_do_not_panic() {
    let mut rng = Lcg::new(0x2718_2818_2845_9045);
    let config = EngineConfig {
        emit: HtmlEmitOptions {
            sanitize: true,
            soft_break: SoftBreak::Space,
        },
        ..EngineConfig::default()
    };
    for case in 0..CASES / 4 {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let result = panic::catch_unwind(|| markdown_to_html_with(&source, &config));
        assert!(result.is_ok(), "sanitized render panicked for case {}: {:?}", case, source);
    }
}

#[test]
fn pathological_inputs_complete() {
    let inputs = [
        ">".repeat(5000),
        "- ".repeat(2000),
        "[".repeat(20_000),
        "*a".repeat(10_000),
        "*".repeat(20_000) + "a" + &"_".repeat(20_000),
        "`".repeat(5000) + "x",
        "[a](".repeat(3000),
        "![".repeat(5000) + &"](b)".repeat(5000),
        "<".repeat(10_000),
        "1. ".repeat(1000) + "x",
        "\t".repeat(1000) + "- x",
        "*a* ".repeat(40_000),
        "**a** _b_ ".repeat(10_000),
        "*a_ ".repeat(20_000),
        "a* ".repeat(20_000),
        "[".repeat(5000) + &"[a](b)".repeat(5000),
    ];
    let mut engine = Engine::default();
    for input in inputs {
        let started = Instant::now();
        let result = engine.render_bytes(input.as_bytes());
        assert!(result.is_ok(), "failed on input starting {:?}", &input[..8]);
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "input starting {:?} took {:?}",
            &input[..8],
            started.elapsed()
        );
    }
}

fn random_string(rng: &mut Lcg, len: usize) -> String {
    let mut bytes = Vec::with_capacity(len);
    for _ in 0..len {
        let idx = rng.gen_range(0, CHARSET.len());
        bytes.push(CHARSET[idx]);
    }
    String::from_utf8(bytes).unwrap_or_default()
}

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    fn gen_range(&mut self, start: usize, end: usize) -> usize {
        if end <= start {
            return start;
        }
        let span = end - start;
        start + (self.next_u32() as usize % span)
    }
}

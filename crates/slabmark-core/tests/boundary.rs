use slabmark_core::{Engine, EngineConfig, RenderError};

fn stage(engine: &mut Engine, input: &[u8]) -> (u32, u32) {
    let len = input.len() as u32;
    let ptr = engine.alloc(len).expect("alloc");
    engine.write(ptr, input).expect("write");
    (ptr, len)
}

fn output_text(engine: &Engine) -> String {
    String::from_utf8(engine.output().to_vec()).expect("output is UTF-8")
}

#[test]
fn empty_input_renders_empty_output() {
    let mut engine = Engine::default();
    let (ptr, len) = stage(&mut engine, b"");
    assert_eq!(engine.render(ptr, len), 0);
    assert_eq!(engine.output_len(), 0);
    assert!(engine.output().is_empty());
}

#[test]
fn invalid_utf8_reports_status_and_message() {
    let mut engine = Engine::default();
    let (ptr, len) = stage(&mut engine, b"# ok\n\xe2\x28\xa1");
    let status = engine.render(ptr, len);
    assert_eq!(status, 1);
    let message = output_text(&engine);
    assert!(message.starts_with("invalid encoding"), "got {:?}", message);
    assert!(!message.contains("<h1>"), "no partial HTML alongside an error");
}

#[test]
fn unknown_span_reports_invalid_span() {
    let mut engine = Engine::default();
    assert_eq!(engine.render(0x7fff_fff0, 8), 3);
    assert!(output_text(&engine).starts_with("invalid span"));
}

#[test]
fn allocation_failure_reports_status_two() {
    let config = EngineConfig {
        node_limit: 8,
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(config);
    let source = "- a\n- b\n- c\n- d\n- e\n- f\n";
    let (ptr, len) = stage(&mut engine, source.as_bytes());
    assert_eq!(engine.render(ptr, len), 2);
    assert!(output_text(&engine).starts_with("allocation failure"));
}

#[test]
fn rendering_is_deterministic() {
    let source = b"# Title\n\n- one\n- *two*\n\n> [x](/y \"z\")\n";
    let mut engine = Engine::default();
    let (ptr, len) = stage(&mut engine, source);

    assert_eq!(engine.render(ptr, len), 0);
    let first = output_text(&engine);
    engine.free_output_buffer();
    assert_eq!(engine.render(ptr, len), 0);
    let second = output_text(&engine);
    assert_eq!(first, second);

    let mut fresh = Engine::default();
    assert_eq!(fresh.render_bytes(source).expect("render"), first);
}

#[test]
fn output_stays_valid_until_freed() {
    let mut engine = Engine::default();
    let (ptr, len) = stage(&mut engine, b"*stable*\n");
    assert_eq!(engine.render(ptr, len), 0);

    let out_ptr = engine.output_ptr();
    let out_len = engine.output_len();
    let scratch = engine.alloc(64).expect("alloc");
    engine.write(scratch, &[0xaa; 64]).expect("write");
    engine.free(scratch, 64);

    assert_eq!(engine.output_ptr(), out_ptr);
    assert_eq!(engine.output_len(), out_len);
    assert_eq!(engine.memory().slice(out_ptr, out_len).expect("live"), b"<p><em>stable</em></p>\n");

    engine.free_output_buffer();
    assert!(engine.memory().slice(out_ptr, out_len).is_err());
}

#[test]
fn free_output_buffer_twice_is_noop() {
    let mut engine = Engine::default();
    engine.free_output_buffer();
    let (ptr, len) = stage(&mut engine, b"x");
    engine.render(ptr, len);
    let live = engine.memory().live_count();
    engine.free_output_buffer();
    engine.free_output_buffer();
    assert_eq!(engine.memory().live_count(), live - 1);
}

#[test]
fn next_render_reclaims_unfreed_output() {
    let mut engine = Engine::default();
    let (ptr, len) = stage(&mut engine, b"paragraph\n");
    for _ in 0..50 {
        assert_eq!(engine.render(ptr, len), 0);
    }
    // staged input plus one output
    assert_eq!(engine.memory().live_count(), 2);
}

#[test]
fn input_buffer_is_untouched_by_render() {
    let mut engine = Engine::default();
    let source = b"- a\n\t- b\n";
    let (ptr, len) = stage(&mut engine, source);
    engine.render(ptr, len);
    assert_eq!(engine.memory().slice(ptr, len).expect("input"), source);
}

#[test]
fn render_bytes_surfaces_error_kind() {
    let mut engine = Engine::default();
    let err = engine.render_bytes(&[0xff]).expect_err("invalid input");
    assert!(matches!(err, RenderError::InvalidEncoding { valid_up_to: 0 }));
    assert_eq!(err.status(), 1);
}

//! WebAssembly boundary for the slabmark engine.
//!
//! The host stages UTF-8 bytes with `alloc`, calls `render`, reads the
//! result through `get_output_ptr`/`get_output_len` and releases it with
//! `free_output_buffer`. Pointers are real addresses in the module's
//! linear memory. One engine lives per thread; a wasm instance has one.

use std::cell::RefCell;

use slabmark_core::{Engine, RenderError};
use tracing::warn;

thread_local! {
    static ENGINE: RefCell<Engine> = RefCell::new(Engine::default());
}

fn with_engine<R>(f: impl FnOnce(&mut Engine) -> R) -> R {
    ENGINE.with(|engine| f(&mut engine.borrow_mut()))
}

fn host_pointer(engine: &Engine, offset: u32) -> *mut u8 {
    engine
        .host_address(offset)
        .map_or(std::ptr::null_mut(), |address| address as *mut u8)
}

/// Reserves `size` bytes and returns their address, or null when memory is
/// exhausted.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn alloc(size: usize) -> *mut u8 {
    with_engine(|engine| {
        let Ok(size) = u32::try_from(size) else {
            warn!(size, "alloc request exceeds address space");
            return std::ptr::null_mut();
        };
        match engine.alloc(size) {
            Ok(offset) => host_pointer(engine, offset),
            Err(err) => {
                warn!(size, %err, "alloc failed");
                std::ptr::null_mut()
            }
        }
    })
}

/// Releases memory returned by [`alloc`]. Unknown pointers are ignored.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn free(ptr: *mut u8, len: usize) {
    with_engine(|engine| match engine.from_host_address(ptr as usize) {
        Some(offset) => engine.free(offset, u32::try_from(len).unwrap_or(u32::MAX)),
        None => warn!(address = ptr as usize, "free of foreign pointer ignored"),
    })
}

/// Renders `len` bytes at `ptr`. Returns `0` on success, otherwise the
/// status of the failure with its message in the output buffer.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn render(ptr: *const u8, len: usize) -> i32 {
    with_engine(|engine| {
        // Offset 0 is never allocated, so a foreign pointer fails span checks.
        let offset = engine.from_host_address(ptr as usize).unwrap_or(0);
        engine.render(offset, u32::try_from(len).unwrap_or(u32::MAX))
    })
}

#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn get_output_ptr() -> *const u8 {
    with_engine(|engine| match engine.output_buffer() {
        Some(buffer) => host_pointer(engine, buffer.ptr).cast_const(),
        None => std::ptr::null(),
    })
}

#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn get_output_len() -> usize {
    with_engine(|engine| engine.output_len() as usize)
}

/// Releases the current output. Safe to call when there is none.
#[cfg_attr(target_arch = "wasm32", unsafe(no_mangle))]
pub extern "C" fn free_output_buffer() {
    with_engine(Engine::free_output_buffer)
}

/// Renders a string through the thread's engine, for Rust callers that
/// link this crate directly.
pub fn render_str(source: &str) -> Result<String, RenderError> {
    with_engine(|engine| {
        let html = engine.render_bytes(source.as_bytes())?.to_string();
        engine.free_output_buffer();
        Ok(html)
    })
}

#[cfg(feature = "bindgen")]
mod bindgen {
    use serde::Deserialize;
    use slabmark_core::{EngineConfig, HtmlEmitOptions, SoftBreak, markdown_to_html_with};
    use wasm_bindgen::prelude::*;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RenderOptions {
        sanitize: Option<bool>,
        soft_break: Option<String>,
    }

    #[wasm_bindgen]
    pub fn render_html(source: &str) -> Result<String, JsValue> {
        render_html_with_options(source, JsValue::UNDEFINED)
    }

    #[wasm_bindgen]
    pub fn render_html_with_options(source: &str, options: JsValue) -> Result<String, JsValue> {
        let config = EngineConfig {
            emit: options_from_js(options)?,
            ..EngineConfig::default()
        };
        Ok(markdown_to_html_with(source, &config))
    }

    fn options_from_js(value: JsValue) -> Result<HtmlEmitOptions, JsValue> {
        if value.is_null() || value.is_undefined() {
            return Ok(HtmlEmitOptions::default());
        }
        let parsed: RenderOptions = serde_wasm_bindgen::from_value(value)
            .map_err(|err| JsValue::from_str(&err.to_string()))?;
        let mut out = HtmlEmitOptions::default();
        if let Some(sanitize) = parsed.sanitize {
            out.sanitize = sanitize;
        }
        match parsed.soft_break.as_deref() {
            None | Some("newline") => {}
            Some("space") => out.soft_break = SoftBreak::Space,
            Some(other) => {
                return Err(JsValue::from_str(&format!("unknown softBreak: {}", other)));
            }
        }
        Ok(out)
    }
}

//! WebAssembly bindings for gif-cube.
//!
//! Provides a thin wrapper around `GifPipeline` for browser environments.
//! Frames arrive as one flat buffer of back-to-back captures.

use wasm_bindgen::prelude::*;

use crate::{
    compute::{GifPipeline, PipelineOutput, narrow::to_u32_saturating},
    schema::{CapturedFrame, ChannelOrder, PipelineConfig, RawFrame, expected_buffer_len},
};

/// Initialize WASM module with panic hook and logging.
#[wasm_bindgen(start)]
pub fn init() {
    // Set panic hook for better error messages in browser
    console_error_panic_hook::set_once();

    // Initialize WASM logger
    wasm_logger::init(wasm_logger::Config::default());
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WebAssembly wrapper for the frame-to-GIF pipeline.
#[wasm_bindgen]
pub struct WasmGifPipeline {
    pipeline: GifPipeline,
    last: Option<PipelineOutput>,
}

#[wasm_bindgen]
impl WasmGifPipeline {
    /// Create a pipeline from a JSON `PipelineConfig`; an empty string uses defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmGifPipeline, JsValue> {
        let config: PipelineConfig = if config_json.trim().is_empty() {
            PipelineConfig::default()
        } else {
            serde_json::from_str(config_json)
                .map_err(|e| JsValue::from_str(&format!("Invalid config JSON: {e}")))?
        };
        let pipeline = GifPipeline::new(config).map_err(js_error)?;
        Ok(WasmGifPipeline {
            pipeline,
            last: None,
        })
    }

    /// Encode `frameCount` tightly packed frames of `width` x `height`.
    ///
    /// `order` is one of "rgba", "bgra", "argb" or "abgr". Returns the GIF bytes.
    #[wasm_bindgen]
    pub fn process(
        &mut self,
        frames: &[u8],
        width: u32,
        height: u32,
        order: &str,
    ) -> Result<Vec<u8>, JsValue> {
        let order = ChannelOrder::from_tag(order)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown channel order: {order}")))?;
        let frame_count = self.pipeline.config().frame_count;
        let needed = expected_buffer_len(width, height, frame_count)
            .ok_or_else(|| JsValue::from_str("Frame buffer size overflows"))?;
        if needed == 0 || frames.len() < needed {
            return Err(JsValue::from_str(&format!(
                "Expected {needed} bytes for {frame_count} frames, got {}",
                frames.len()
            )));
        }

        let frame_bytes = needed / frame_count;
        let captures = frames[..needed]
            .chunks_exact(frame_bytes)
            .enumerate()
            .map(|(index, bytes)| {
                CapturedFrame::new(index, RawFrame::packed(width, height, order, bytes.to_vec()))
            });

        self.last = None;
        let output = self.pipeline.process(captures).map_err(js_error)?;
        let gif = output.gif.as_bytes().to_vec();
        self.last = Some(output);
        Ok(gif)
    }

    /// Re-encode the last finalized sequence.
    #[wasm_bindgen(js_name = retryEncode)]
    pub fn retry_encode(&self) -> Result<Vec<u8>, JsValue> {
        self.pipeline
            .retry_encode()
            .map(|gif| gif.into_bytes())
            .map_err(js_error)
    }

    /// Stats of the last successful run as a JS object.
    #[wasm_bindgen(js_name = getStats)]
    pub fn get_stats(&self) -> Result<JsValue, JsValue> {
        let stats = self.last.as_ref().map(|out| &out.stats);
        serde_wasm_bindgen::to_value(&stats)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
    }

    /// RGBA voxel tensor of the last run, empty when disabled.
    #[wasm_bindgen(js_name = getTensor)]
    pub fn get_tensor(&self) -> Vec<u8> {
        self.last
            .as_ref()
            .and_then(|out| out.tensor.as_ref())
            .map(|t| t.as_bytes().to_vec())
            .unwrap_or_default()
    }

    /// Tensor dimensions as [width, height, depth], empty when disabled.
    #[wasm_bindgen(js_name = getTensorDims)]
    pub fn get_tensor_dims(&self) -> Vec<u32> {
        self.last
            .as_ref()
            .and_then(|out| out.tensor.as_ref())
            .map(|t| vec![t.width(), t.height(), to_u32_saturating(t.depth())])
            .unwrap_or_default()
    }

    /// Byte length of the last GIF.
    #[wasm_bindgen(js_name = gifLength)]
    pub fn gif_length(&self) -> u32 {
        self.last
            .as_ref()
            .map_or(0, |out| to_u32_saturating(out.gif.len()))
    }

    /// Drop the finalized sequence and the last output.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.pipeline.reset();
        self.last = None;
    }

    /// Default configuration as JSON.
    #[wasm_bindgen(js_name = defaultConfig)]
    pub fn default_config() -> Result<String, JsValue> {
        serde_json::to_string(&PipelineConfig::default()).map_err(js_error)
    }
}

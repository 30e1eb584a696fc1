use wasm_bindgen::prelude::*;

use crate::config::RenderConfig;
use crate::image_loader::{ImageFetcher, LocalImageLoader};
use crate::model::ImageRef;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

/// Only inline (base64 / data URI) images resolve in the browser; anything
/// else becomes a placeholder.
fn inline_only(loader: &LocalImageLoader) -> impl Fn(&ImageRef, u32) -> Option<crate::canvas::Bitmap> + '_ {
    move |image: &ImageRef, max: u32| match image {
        ImageRef::Inline(_) => loader.fetch(image, max),
        _ => None,
    }
}

#[wasm_bindgen]
pub fn render_report(json: &str) -> Result<Vec<u8>, JsValue> {
    let doc = crate::parse_report(json).map_err(js_error)?;
    let loader = LocalImageLoader::new();
    crate::render(&doc, &RenderConfig::default(), &inline_only(&loader)).map_err(js_error)
}

/// Render with a configuration object passed from JavaScript.
#[wasm_bindgen]
pub fn render_report_with_config(json: &str, config: JsValue) -> Result<Vec<u8>, JsValue> {
    let config: RenderConfig = serde_wasm_bindgen::from_value(config)?;
    config.validate().map_err(js_error)?;
    let doc = crate::parse_report(json).map_err(js_error)?;
    let loader = LocalImageLoader::new();
    crate::render(&doc, &config, &inline_only(&loader)).map_err(js_error)
}

use wasm_bindgen::prelude::*;

/// Fill a JSON report with JSON rows; returns the pages as a JS value.
#[wasm_bindgen]
pub fn fill_report_json(report: &str, rows: &str) -> Result<JsValue, JsValue> {
    let pages = crate::fill_json(report, rows).map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&pages)
        .map_err(|e| JsValue::from_str(&format!("Failed to convert pages: {}", e)))
}

use std::cell::RefCell;

use tabletop::document::DocumentError;
use wasm_bindgen::prelude::*;


pub type JsResult<T> = Result<T, JsValue>;

// The client is single-threaded, so wrapping all mutable singletons in `thread_local!` seems ok.
thread_local! {
    static LAST_PANIC: RefCell<String> = const { RefCell::new(String::new()) };
}

// Copied from console_error_panic_hook
#[wasm_bindgen]
extern "C" {
    type Error;
    #[wasm_bindgen(constructor)]
    fn new() -> Error;
    #[wasm_bindgen(structural, method, getter)]
    fn stack(error: &Error) -> String;
}

// Optimization potential: Remove or shrink the panic hook when the client is stable.
#[wasm_bindgen]
pub fn set_panic_hook() {
    use std::panic;
    use std::sync::Once;
    static SET_HOOK: Once = Once::new();
    SET_HOOK.call_once(|| {
        panic::set_hook(Box::new(|panic_info| {
            // Log to the browser developer console. For more details see
            // https://github.com/rustwasm/console_error_panic_hook#readme
            console_error_panic_hook::hook(panic_info);

            let backtrace = Error::new().stack();
            let report = serde_json::json!({
                "panic_info": panic_info.to_string(),
                "backtrace": backtrace,
            });
            LAST_PANIC.with(|cell| *cell.borrow_mut() = report.to_string());
        }));
    });
}

// JSON report of the last panic, empty if there was none.
#[wasm_bindgen]
pub fn last_panic() -> String { LAST_PANIC.with(|cell| cell.borrow().clone()) }

#[wasm_bindgen(getter_with_clone)]
pub struct RustError {
    pub message: String,
}

#[macro_export]
macro_rules! rust_error {
    ($($arg:tt)*) => {
        wasm_bindgen::JsValue::from(
            $crate::web_error_handling::RustError{ message: format!($($arg)*) }
        )
    };
}

pub fn from_document_error(err: DocumentError) -> JsValue { rust_error!("{}", err) }

// Inverse direction: a failed DOM call surfacing through the `Document` trait.
pub fn to_document_error(err: JsValue) -> DocumentError {
    match err.as_string() {
        Some(message) => DocumentError(message),
        None => DocumentError(format!("{err:?}")),
    }
}

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::convert::FromWasmAbi;

use crate::web_document::web_document;
use crate::web_error_handling::JsResult;


pub trait WebElementExt {
    fn with_classes<'a>(
        self, classes: impl IntoIterator<Item = &'a str>,
    ) -> JsResult<web_sys::Element>;
    fn with_attributes<'a>(
        self, attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> JsResult<web_sys::Element>;

    fn add_event_listener_and_forget<E: FromWasmAbi + 'static>(
        &self, event_type: &str, listener: impl FnMut(E) -> JsResult<()> + 'static,
    ) -> JsResult<()>;

    fn append_new_element(&self, local_name: &str) -> JsResult<web_sys::Element>;
    fn scroll_to_bottom(&self);
}

impl WebElementExt for web_sys::Element {
    fn with_classes<'a>(
        self, classes: impl IntoIterator<Item = &'a str>,
    ) -> JsResult<web_sys::Element> {
        for class in classes {
            self.class_list().add_1(class)?;
        }
        Ok(self)
    }

    fn with_attributes<'a>(
        self, attributes: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> JsResult<web_sys::Element> {
        for (name, value) in attributes {
            self.set_attribute(name, value)?;
        }
        Ok(self)
    }

    // TODO: Don't leak, let JS GC handle it. The listeners are attached once per page load to
    // elements that live as long as the page, so this only matters if that changes.
    fn add_event_listener_and_forget<E: FromWasmAbi + 'static>(
        &self, event_type: &str, listener: impl FnMut(E) -> JsResult<()> + 'static,
    ) -> JsResult<()> {
        let closure = Closure::new(listener);
        self.add_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref())?;
        closure.forget();
        Ok(())
    }

    fn append_new_element(&self, local_name: &str) -> JsResult<web_sys::Element> {
        let node = web_document().create_element(local_name)?;
        self.append_child(&node)?;
        Ok(node)
    }

    fn scroll_to_bottom(&self) { self.set_scroll_top(self.scroll_height()); }
}

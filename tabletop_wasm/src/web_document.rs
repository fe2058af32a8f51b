// `Document` and `History` over the real DOM.

use tabletop::document::{CONTAINER_TAG, Document, DocumentError, History, HistoryEntry};
use tabletop::document_error;
use tabletop::render::Fragment;
use wasm_bindgen::JsValue;

use crate::rust_error;
use crate::web_element_ext::WebElementExt;
use crate::web_error_handling::{JsResult, to_document_error};
use crate::web_iterators::{HtmlCollectionIterator, NodeListIterator};


pub struct WebDocument(web_sys::Document);

impl WebDocument {
    pub fn get_existing_element_by_id(&self, element_id: &str) -> JsResult<web_sys::Element> {
        self.0
            .get_element_by_id(element_id)
            .ok_or_else(|| rust_error!("Cannot find element \"{}\"", element_id))
    }

    pub fn query_selector_existing(&self, selectors: &str) -> JsResult<web_sys::Element> {
        self.0.query_selector(selectors).and_then(|e| {
            e.ok_or_else(|| rust_error!("Cannot find element by selectors \"{}\"", selectors))
        })
    }
    pub fn query_selector_all(&self, selectors: &str) -> JsResult<NodeListIterator> {
        self.0.query_selector_all(selectors).map(|iter| iter.into())
    }

    pub fn create_element(&self, local_name: &str) -> JsResult<web_sys::Element> {
        self.0.create_element(local_name)
    }

    fn build(&self, fragment: &Fragment) -> JsResult<web_sys::Element> {
        let element = self
            .create_element(&fragment.tag)?
            .with_classes(fragment.classes.iter().map(String::as_str))?
            .with_attributes(fragment.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str())))?;
        if let Some(text) = &fragment.text {
            element.set_text_content(Some(text));
        }
        for child in &fragment.children {
            let child_element = self.build(child)?;
            element.append_child(&child_element)?;
        }
        Ok(element)
    }
}

impl Document for WebDocument {
    type Node = web_sys::Element;

    fn element_by_id(&self, id: &str) -> Option<web_sys::Element> { self.0.get_element_by_id(id) }

    fn elements_by_class(&self, class: &str) -> Vec<web_sys::Element> {
        HtmlCollectionIterator::from(self.0.get_elements_by_class_name(class)).collect()
    }

    fn child_with_class(&self, parent: &web_sys::Element, class: &str) -> Option<web_sys::Element> {
        HtmlCollectionIterator::from(parent.children()).find(|e| e.class_list().contains(class))
    }

    fn append_container(
        &mut self, parent: &web_sys::Element, class: &str,
    ) -> Result<web_sys::Element, DocumentError> {
        parent
            .append_new_element(CONTAINER_TAG)
            .and_then(|e| e.with_classes([class]))
            .map_err(to_document_error)
    }

    fn set_attribute(
        &mut self, node: &web_sys::Element, name: &str, value: &str,
    ) -> Result<(), DocumentError> {
        node.set_attribute(name, value).map_err(to_document_error)
    }

    fn set_inner_html(&mut self, node: &web_sys::Element, html: &str) -> Result<(), DocumentError> {
        node.set_inner_html(html);
        Ok(())
    }

    fn set_text(&mut self, node: &web_sys::Element, text: &str) -> Result<(), DocumentError> {
        node.set_text_content(Some(text));
        Ok(())
    }

    fn append_line(&mut self, node: &web_sys::Element, text: &str) -> Result<(), DocumentError> {
        node.append_with_str_1(text).map_err(to_document_error)?;
        node.append_new_element("br").map_err(to_document_error)?;
        node.scroll_to_bottom();
        Ok(())
    }

    fn replace_with(
        &mut self, node: &web_sys::Element, fragment: &Fragment,
    ) -> Result<web_sys::Element, DocumentError> {
        if node.parent_node().is_none() {
            return Err(document_error!("Cannot replace a detached element"));
        }
        let new_node = self.build(fragment).map_err(to_document_error)?;
        node.replace_with_with_node_1(&new_node).map_err(to_document_error)?;
        Ok(new_node)
    }
}

impl History for WebDocument {
    fn push_state(&mut self, entry: HistoryEntry) -> Result<(), DocumentError> {
        let history = web_sys::window()
            .ok_or_else(|| document_error!("Cannot find window"))?
            .history()
            .map_err(to_document_error)?;
        // Improvement potential: Pass the state as a JS object rather than its JSON text.
        let state = JsValue::from_str(&entry.state.to_string());
        history.push_state_with_url(&state, "", Some(&entry.url)).map_err(to_document_error)
    }
}

pub fn web_document() -> WebDocument {
    // The client is only ever loaded into a page, which always has a window and a document.
    let window = web_sys::window().expect("no window");
    WebDocument(window.document().expect("no document"))
}

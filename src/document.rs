// Page abstraction shared by the browser client (real DOM via `web_sys`) and the console client
// and tests (in-memory `VirtualPage`).

use std::fmt;

use crate::render::Fragment;


// Elements the client expects to find on the page.
pub const LOG_ID: &str = "log";
pub const STATUS_ID: &str = "status";
pub const CONNECT_BUTTON_ID: &str = "connect";
pub const TEXT_INPUT_ID: &str = "text";
pub const PROTOCOLS_ID: &str = "protocols";

// Tag of the empty containers synthesized by DOM path resolution.
pub const CONTAINER_TAG: &str = "span";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DocumentError(pub String);

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl std::error::Error for DocumentError {}

#[macro_export]
macro_rules! document_error {
    ($($arg:tt)*) => {
        $crate::document::DocumentError(format!($($arg)*))
    };
}

pub trait Document {
    type Node: Clone + PartialEq + fmt::Debug;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;
    fn elements_by_class(&self, class: &str) -> Vec<Self::Node>;
    // First direct child of `parent` carrying `class`.
    fn child_with_class(&self, parent: &Self::Node, class: &str) -> Option<Self::Node>;

    // Appends an empty `CONTAINER_TAG` element with the given class and returns it.
    fn append_container(
        &mut self, parent: &Self::Node, class: &str,
    ) -> Result<Self::Node, DocumentError>;
    fn set_attribute(
        &mut self, node: &Self::Node, name: &str, value: &str,
    ) -> Result<(), DocumentError>;
    // Replaces the node content with `html`. The string is inserted as-is.
    fn set_inner_html(&mut self, node: &Self::Node, html: &str) -> Result<(), DocumentError>;
    // Replaces the node content with plain text.
    fn set_text(&mut self, node: &Self::Node, text: &str) -> Result<(), DocumentError>;
    // Appends a line of plain text followed by a line break and scrolls to it.
    fn append_line(&mut self, node: &Self::Node, text: &str) -> Result<(), DocumentError>;
    // Replaces `node` in its parent with a freshly built element tree. Returns the new root.
    fn replace_with(
        &mut self, node: &Self::Node, fragment: &Fragment,
    ) -> Result<Self::Node, DocumentError>;

    // Writes a line to `#log`. Pages without a log are fine.
    fn log(&mut self, text: &str) -> Result<(), DocumentError> {
        match self.element_by_id(LOG_ID) {
            Some(log) => self.append_line(&log, text),
            None => Ok(()),
        }
    }

    // Sets text of an element that must exist.
    fn set_text_by_id(&mut self, id: &str, text: &str) -> Result<(), DocumentError> {
        let node = self
            .element_by_id(id)
            .ok_or_else(|| document_error!("Cannot find element \"{}\"", id))?;
        self.set_text(&node, text)
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct HistoryEntry {
    pub state: serde_json::Value,
    pub url: String,
}

pub trait History {
    fn push_state(&mut self, entry: HistoryEntry) -> Result<(), DocumentError>;
}

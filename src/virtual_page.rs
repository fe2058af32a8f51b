// In-memory page: an element arena implementing `Document` and `History`. Used by tests and by
// the console client, which renders it to the terminal.

use itertools::Itertools;

use crate::document::{
    CONNECT_BUTTON_ID, CONTAINER_TAG, Document, DocumentError, History, HistoryEntry, LOG_ID,
    PROTOCOLS_ID, STATUS_ID, TEXT_INPUT_ID,
};
use crate::document_error;
use crate::event::{VAR_TYPE_GAME, VAR_TYPE_PLAYER, VAR_TYPE_PRIVATE};
use crate::render::{Fragment, escape_html};
use crate::session::SessionVariable;


// Slot index plus the generation of the slot at the time the node was created. Handles to removed
// nodes never match a recycled slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Clone, Debug)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    // Raw HTML content preceding child elements.
    pub inner_html: String,
    pub children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Element {
            tag: tag.to_owned(),
            id: None,
            classes: Vec::new(),
            attributes: Vec::new(),
            inner_html: String::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn has_class(&self, class: &str) -> bool { self.classes.iter().any(|c| c == class) }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    element: Option<Element>,
}

// Removed subtrees are freed right away and their slots are reused.
#[derive(Clone, Debug)]
pub struct VirtualPage {
    slots: Vec<Slot>,
    free: Vec<usize>,
    root: NodeId,
    history: Vec<HistoryEntry>,
}

impl VirtualPage {
    pub fn new() -> Self {
        VirtualPage {
            slots: vec![Slot { generation: 0, element: Some(Element::new("body")) }],
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            history: Vec::new(),
        }
    }

    // Page with the elements the client expects: log, status label, connect button, text input
    // and transport checkboxes.
    pub fn with_client_skeleton() -> Self {
        let mut page = VirtualPage::new();
        let root = page.root;
        page.add_element(root, "div", Some(STATUS_ID), &[]);
        page.add_element(root, "button", Some(CONNECT_BUTTON_ID), &[]);
        page.add_element(root, "div", Some(LOG_ID), &[]);
        let form = page.add_element(root, "form", None, &[]);
        page.add_element(form, "input", Some(TEXT_INPUT_ID), &[]);
        page.add_element(root, "div", Some(PROTOCOLS_ID), &[]);
        page
    }

    // Client skeleton plus the containers game state is written into: one element per session
    // identifier and one root per variable type.
    pub fn with_game_skeleton() -> Self {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root;
        let session_ids: [&'static str; 3] = [
            SessionVariable::GameType.into(),
            SessionVariable::GameId.into(),
            SessionVariable::PlayerId.into(),
        ];
        let var_types = [VAR_TYPE_GAME, VAR_TYPE_PLAYER, VAR_TYPE_PRIVATE];
        for id in session_ids.into_iter().chain(var_types) {
            page.add_element(root, "div", Some(id), &[]);
        }
        page
    }

    pub fn root(&self) -> NodeId { self.root }
    pub fn history(&self) -> &[HistoryEntry] { &self.history }

    // Number of allocated slots, live or free.
    pub fn slot_count(&self) -> usize { self.slots.len() }

    // Returns `None` if the node has been removed from the page.
    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.slots
            .get(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_ref())
    }

    fn get_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.slots
            .get_mut(node.index)
            .filter(|slot| slot.generation == node.generation)
            .and_then(|slot| slot.element.as_mut())
    }

    // Panics if the node has been removed from the page.
    pub fn element(&self, node: NodeId) -> &Element {
        self.get(node).unwrap_or_else(|| panic!("{node:?} has been removed"))
    }

    // `parent` must be live.
    pub fn add_element(
        &mut self, parent: NodeId, tag: &str, id: Option<&str>, classes: &[&str],
    ) -> NodeId {
        let mut element = Element::new(tag);
        element.id = id.map(str::to_owned);
        element.classes = classes.iter().map(|c| (*c).to_owned()).collect();
        self.attach(parent, None, element)
    }

    // Text content of a node with markup stripped.
    pub fn text_content(&self, node: NodeId) -> String {
        let element = self.element(node);
        let mut text = strip_tags(&element.inner_html);
        for &child in &element.children {
            text.push_str(&self.text_content(child));
        }
        text
    }

    pub fn text_by_id(&self, id: &str) -> Option<String> {
        self.element_by_id(id).map(|node| self.text_content(node))
    }

    pub fn log_lines(&self) -> Vec<String> {
        let Some(log) = self.element_by_id(LOG_ID) else {
            return Vec::new();
        };
        let html = &self.element(log).inner_html;
        html.split("<br/>")
            .filter(|line| !line.is_empty())
            .map(unescape_html)
            .collect_vec()
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        let element = self.element(node);
        let mut html = element.inner_html.clone();
        for &child in &element.children {
            html.push_str(&self.outer_html(child));
        }
        html
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        let element = self.element(node);
        let mut html = format!("<{}", element.tag);
        if let Some(id) = &element.id {
            html.push_str(&format!(" id=\"{}\"", escape_html(id)));
        }
        if !element.classes.is_empty() {
            html.push_str(&format!(" class=\"{}\"", escape_html(&element.classes.join(" "))));
        }
        for (name, value) in &element.attributes {
            html.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
        }
        html.push('>');
        html.push_str(&self.inner_html(node));
        html.push_str(&format!("</{}>", element.tag));
        html
    }

    // The node and everything below it, in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if let Some(element) = self.get(n) {
                out.push(n);
                stack.extend(element.children.iter().rev().copied());
            }
        }
        out
    }

    // Indented outline of the page, one element per line. Used for terminal rendering.
    pub fn outline(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.write_outline(self.root, 0, &mut lines);
        lines
    }

    fn write_outline(&self, node: NodeId, depth: usize, lines: &mut Vec<String>) {
        let element = self.element(node);
        let mut line = format!("{}{}", "  ".repeat(depth), element.tag);
        if let Some(id) = &element.id {
            line.push_str(&format!("#{id}"));
        }
        for class in &element.classes {
            line.push_str(&format!(".{class}"));
        }
        let text = strip_tags(&element.inner_html);
        if !text.is_empty() {
            line.push_str(&format!(" {text:?}"));
        }
        lines.push(line);
        for &child in &element.children {
            self.write_outline(child, depth + 1, lines);
        }
    }

    fn allocate(&mut self, element: Element) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index];
                slot.element = Some(element);
                NodeId { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, element: Some(element) });
                NodeId { index: self.slots.len() - 1, generation: 0 }
            }
        }
    }

    // Frees the node and its subtree. The node must already be unlinked from its parent.
    fn release(&mut self, node: NodeId) {
        for n in self.descendants(node) {
            let slot = &mut self.slots[n.index];
            slot.element = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(n.index);
        }
    }

    fn attach(&mut self, parent: NodeId, index: Option<usize>, mut element: Element) -> NodeId {
        element.parent = Some(parent);
        let node = self.allocate(element);
        let children = &mut self
            .get_mut(parent)
            .unwrap_or_else(|| panic!("Cannot attach to removed {parent:?}"))
            .children;
        match index {
            Some(i) => children.insert(i, node),
            None => children.push(node),
        }
        node
    }

    fn build(&mut self, parent: NodeId, index: Option<usize>, fragment: &Fragment) -> NodeId {
        let mut element = Element::new(&fragment.tag);
        element.classes = fragment.classes.clone();
        element.attributes = fragment.attributes.clone();
        element.inner_html = fragment.text.as_deref().map(escape_html).unwrap_or_default();
        let node = self.attach(parent, index, element);
        for child in &fragment.children {
            self.build(node, None, child);
        }
        node
    }

    fn is_attached(&self, mut node: NodeId) -> bool {
        loop {
            if node == self.root {
                return true;
            }
            match self.get(node).and_then(|element| element.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }
}

impl Default for VirtualPage {
    fn default() -> Self { Self::new() }
}

impl Document for VirtualPage {
    type Node = NodeId;

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.element(n).id.as_deref() == Some(id))
    }

    fn elements_by_class(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.element(n).has_class(class))
            .collect()
    }

    fn child_with_class(&self, parent: &NodeId, class: &str) -> Option<NodeId> {
        self.get(*parent)?
            .children
            .iter()
            .copied()
            .find(|&n| self.get(n).is_some_and(|element| element.has_class(class)))
    }

    fn append_container(&mut self, parent: &NodeId, class: &str) -> Result<NodeId, DocumentError> {
        if self.get(*parent).is_none() {
            return Err(removed_error());
        }
        Ok(self.add_element(*parent, CONTAINER_TAG, None, &[class]))
    }

    fn set_attribute(
        &mut self, node: &NodeId, name: &str, value: &str,
    ) -> Result<(), DocumentError> {
        let attributes = &mut self.get_mut(*node).ok_or_else(removed_error)?.attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_owned(),
            None => attributes.push((name.to_owned(), value.to_owned())),
        }
        Ok(())
    }

    fn set_inner_html(&mut self, node: &NodeId, html: &str) -> Result<(), DocumentError> {
        let element = self.get_mut(*node).ok_or_else(removed_error)?;
        element.inner_html = html.to_owned();
        for child in std::mem::take(&mut element.children) {
            self.release(child);
        }
        Ok(())
    }

    fn set_text(&mut self, node: &NodeId, text: &str) -> Result<(), DocumentError> {
        self.set_inner_html(node, &escape_html(text))
    }

    fn append_line(&mut self, node: &NodeId, text: &str) -> Result<(), DocumentError> {
        let element = self.get_mut(*node).ok_or_else(removed_error)?;
        element.inner_html.push_str(&escape_html(text));
        element.inner_html.push_str("<br/>");
        Ok(())
    }

    fn replace_with(
        &mut self, node: &NodeId, fragment: &Fragment,
    ) -> Result<NodeId, DocumentError> {
        if !self.is_attached(*node) {
            return Err(document_error!("Cannot replace a detached element"));
        }
        let parent = self
            .element(*node)
            .parent
            .ok_or_else(|| document_error!("Cannot replace the page root"))?;
        let siblings = &mut self.get_mut(parent).ok_or_else(removed_error)?.children;
        let index = siblings
            .iter()
            .position(|&n| n == *node)
            .ok_or_else(|| document_error!("Element is not a child of its parent"))?;
        siblings.remove(index);
        self.release(*node);
        Ok(self.build(parent, Some(index), fragment))
    }
}

impl History for VirtualPage {
    fn push_state(&mut self, entry: HistoryEntry) -> Result<(), DocumentError> {
        self.history.push(entry);
        Ok(())
    }
}

fn removed_error() -> DocumentError { document_error!("Element has been removed from the page") }

fn strip_tags(html: &str) -> String {
    let mut out = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    unescape_html(&out)
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn skeleton_has_client_elements() {
        let page = VirtualPage::with_client_skeleton();
        for id in [STATUS_ID, CONNECT_BUTTON_ID, LOG_ID, TEXT_INPUT_ID, PROTOCOLS_ID] {
            assert!(page.element_by_id(id).is_some(), "missing #{id}");
        }
    }

    #[test]
    fn log_lines_are_escaped_and_split() {
        let mut page = VirtualPage::with_client_skeleton();
        page.log("Received: [\"setText\",[\"a\",\"<b>\"]]").unwrap();
        page.log("Connected.").unwrap();
        assert_eq!(page.log_lines(), vec![
            "Received: [\"setText\",[\"a\",\"<b>\"]]".to_owned(),
            "Connected.".to_owned(),
        ]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut page = VirtualPage::new();
        let root = page.root();
        let a = page.add_element(root, "span", None, &["a"]);
        page.add_element(root, "span", None, &["b"]);
        let new = page.replace_with(&a, &Fragment::new("ul").with_class("a")).unwrap();
        assert_eq!(page.element(root).children[0], new);
        assert_eq!(page.element(new).tag, "ul");
        assert_eq!(page.elements_by_class("a"), vec![new]);
        assert!(page.replace_with(&a, &Fragment::new("ul")).is_err());
    }

    #[test]
    fn set_inner_html_drops_children() {
        let mut page = VirtualPage::new();
        let root = page.root();
        let div = page.add_element(root, "div", Some("d"), &[]);
        page.add_element(div, "span", None, &["x"]);
        page.set_inner_html(&div, "hello <i>world</i>").unwrap();
        assert!(page.elements_by_class("x").is_empty());
        assert_eq!(page.text_content(div), "hello world");
        assert_eq!(page.inner_html(div), "hello <i>world</i>");
    }

    #[test]
    fn repeated_updates_reuse_slots() {
        use crate::dispatch::dispatch_frame;
        use crate::session::SessionContext;

        let mut page = VirtualPage::with_game_skeleton();
        let mut session = SessionContext::default();
        let frame = r#"["update", {"varType": "game", "key": "dealer_hand", "value":
            [{"value": "K", "suit": "spades"}, {"value": "7", "suit": "hearts"}]}]"#;
        dispatch_frame(&mut page, &mut session, frame).unwrap();
        let slots = page.slot_count();
        assert_eq!(slots, page.descendants(page.root()).len());
        for _ in 0..1000 {
            dispatch_frame(&mut page, &mut session, frame).unwrap();
        }
        assert_eq!(page.slot_count(), slots);
    }

    #[test]
    fn removed_handles_are_rejected() {
        let mut page = VirtualPage::new();
        let root = page.root();
        let div = page.add_element(root, "div", None, &[]);
        let span = page.add_element(div, "span", None, &["x"]);
        page.set_inner_html(&div, "").unwrap();
        let reused = page.add_element(root, "b", None, &["x"]);
        assert_eq!(page.slot_count(), 3);
        assert!(page.get(span).is_none());
        assert!(page.set_attribute(&span, "src", "a.png").is_err());
        assert!(page.append_container(&span, "y").is_err());
        assert_eq!(page.child_with_class(&span, "x"), None);
        assert_eq!(page.elements_by_class("x"), vec![reused]);
    }
}

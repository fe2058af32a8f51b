use serde_json::Value;

use crate::session::scalar_text;
use crate::util::humanize;


// Detached element tree. Built from game values and inserted into a `Document` in one go.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Fragment {
    pub tag: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Fragment>,
}

impl Fragment {
    pub fn new(tag: &str) -> Self {
        Fragment {
            tag: tag.to_owned(),
            classes: Vec::new(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_owned());
        self
    }
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }
    pub fn with_child(mut self, child: Fragment) -> Self {
        self.children.push(child);
        self
    }

    // Later values for the same attribute win, like repeated `setAttribute` calls.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.to_owned(),
            None => self.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape_html(&self.classes.join(" "))));
        }
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_html(text));
        }
        for child in &self.children {
            child.write_html(out);
        }
        out.push_str(&format!("</{}>", self.tag));
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// Renders a game variable as nested lists:
//
//   <ul class="KEY" data-KEY="VALUE">
//     <li class="title">KEY (humanized)</li>
//     <li class="value">VALUE</li>
//   </ul>
//
// For mappings (and sequences, keyed by index) each entry becomes a `<li class="value">` holding
// the rendering of that entry. Scalar entries are also mirrored as `data-*` attributes on the
// enclosing list. Null renders as the title alone.
pub fn render_value(key: &str, value: &Value) -> Fragment {
    let mut ul = Fragment::new("ul").with_class(key);
    ul.children.push(Fragment::new("li").with_class("title").with_text(&humanize(key)));
    match value {
        Value::Null => {}
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            let text = scalar_text(value).unwrap_or_default();
            ul.set_attribute(&format!("data-{key}"), &text);
            ul.children.push(Fragment::new("li").with_class("value").with_text(&text));
        }
        Value::Object(map) => {
            for (entry_key, entry_value) in map {
                render_entry(&mut ul, entry_key, entry_value);
            }
        }
        Value::Array(items) => {
            for (index, entry_value) in items.iter().enumerate() {
                render_entry(&mut ul, &index.to_string(), entry_value);
            }
        }
    }
    ul
}

fn render_entry(ul: &mut Fragment, key: &str, value: &Value) {
    if !value.is_object() && !value.is_array() {
        if let Some(text) = scalar_text(value) {
            ul.set_attribute(&format!("data-{key}"), &text);
        }
    }
    ul.children.push(Fragment::new("li").with_class("value").with_child(render_value(key, value)));
}

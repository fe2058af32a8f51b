// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use tabletop::document::Document;
use tabletop::virtual_page::VirtualPage;


// Value of a scalar variable rendered under `#<root> .<path...>`, read from the `data-<key>`
// attribute that `render_value` sets.
#[allow(dead_code)]
pub fn var_value(page: &VirtualPage, root: &str, path: &[&str]) -> Option<String> {
    let mut node = page.element_by_id(root)?;
    for class in path {
        node = page.child_with_class(&node, class)?;
    }
    let key = path.last()?;
    page.element(node).attribute(&format!("data-{key}")).map(str::to_owned)
}

#[allow(dead_code)]
pub fn has_path(page: &VirtualPage, root: &str, path: &[&str]) -> bool {
    let Some(mut node) = page.element_by_id(root) else {
        return false;
    };
    for class in path {
        match page.child_with_class(&node, class) {
            Some(child) => node = child,
            None => return false,
        }
    }
    true
}

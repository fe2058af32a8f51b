use std::fmt;

use itertools::Itertools;

use crate::document::{Document, DocumentError};
use crate::session::{PlayerId, SessionContext};


// Location of a nested UI container: the id of the root element followed by class names of
// nested children, e.g. `["player", "2", "coins"]` stands for `#player > .2 > .coins`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DomPath {
    root_id: String,
    classes: Vec<String>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum PathError {
    MissingRoot(String),
    Document(DocumentError),
}

impl From<DocumentError> for PathError {
    fn from(err: DocumentError) -> Self { PathError::Document(err) }
}

// Outcome of looking a path up without touching the document.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PathResolution<N> {
    // Deepest node on the path that already exists.
    pub anchor: N,
    // Classes that still need containers, outermost first. Empty if the path exists.
    pub missing: Vec<String>,
}

impl<N> PathResolution<N> {
    pub fn is_complete(&self) -> bool { self.missing.is_empty() }
}

impl DomPath {
    pub fn new(root_id: impl Into<String>, classes: Vec<String>) -> Self {
        DomPath { root_id: root_id.into(), classes }
    }

    // Path targeted by an `update` message. The player segment is present only for other
    // players' variables: own variables live directly under the variable type.
    pub fn for_update(
        var_type: &str, player: Option<&PlayerId>, key: &str, session: &SessionContext,
    ) -> Self {
        let mut classes = Vec::new();
        if let Some(player) = player {
            if !session.is_local_player(player) {
                classes.push(player.to_string());
            }
        }
        classes.push(key.to_owned());
        DomPath::new(var_type, classes)
    }

    pub fn root_id(&self) -> &str { &self.root_id }
    pub fn classes(&self) -> &[String] { &self.classes }

    pub fn segments(&self) -> Vec<&str> {
        std::iter::once(self.root_id.as_str())
            .chain(self.classes.iter().map(String::as_str))
            .collect()
    }

    // Finds the deepest existing node along the path. Pure: the document is not modified.
    pub fn resolve<D: Document>(&self, doc: &D) -> Result<PathResolution<D::Node>, PathError> {
        let mut anchor = doc
            .element_by_id(&self.root_id)
            .ok_or_else(|| PathError::MissingRoot(self.root_id.clone()))?;
        for (index, class) in self.classes.iter().enumerate() {
            match doc.child_with_class(&anchor, class) {
                Some(child) => anchor = child,
                None => {
                    return Ok(PathResolution {
                        anchor,
                        missing: self.classes[index..].to_vec(),
                    });
                }
            }
        }
        Ok(PathResolution { anchor, missing: Vec::new() })
    }
}

impl fmt::Display for DomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.root_id)?;
        if !self.classes.is_empty() {
            write!(f, " {}", self.classes.iter().map(|c| format!(".{c}")).join(" "))?;
        }
        Ok(())
    }
}

// Creates the containers a resolution reports as missing. Returns the node at the end of the
// path.
pub fn materialize<D: Document>(
    doc: &mut D, resolution: PathResolution<D::Node>,
) -> Result<D::Node, PathError> {
    let mut node = resolution.anchor;
    for class in &resolution.missing {
        node = doc.append_container(&node, class)?;
    }
    Ok(node)
}

// Returns the node at `path`, creating intermediate containers as needed. Resolving the same path
// again reuses the containers created the first time.
pub fn resolve_or_create<D: Document>(doc: &mut D, path: &DomPath) -> Result<D::Node, PathError> {
    let resolution = path.resolve(doc)?;
    materialize(doc, resolution)
}

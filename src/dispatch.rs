use std::fmt;

use log::warn;
use serde_json::Value;

use crate::document::{Document, DocumentError, History, HistoryEntry};
use crate::dom_path::{DomPath, PathError, resolve_or_create};
use crate::event::{ElementContent, FrameError, ServerAction, SetAttribute, VarUpdate};
use crate::render::render_value;
use crate::session::{SessionContext, scalar_text};


#[derive(Clone, PartialEq, Debug)]
pub enum DispatchError {
    Frame(FrameError),
    Path(PathError),
    Document(DocumentError),
}

impl From<FrameError> for DispatchError {
    fn from(err: FrameError) -> Self { DispatchError::Frame(err) }
}
impl From<PathError> for DispatchError {
    fn from(err: PathError) -> Self { DispatchError::Path(err) }
}
impl From<DocumentError> for DispatchError {
    fn from(err: DocumentError) -> Self { DispatchError::Document(err) }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Frame(err) => write!(f, "{err}"),
            DispatchError::Path(err) => write!(f, "cannot resolve path: {err:?}"),
            DispatchError::Document(err) => write!(f, "document error: {err}"),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub enum DispatchOutcome {
    Applied,
    // Server reported an error; the message is meant for the user.
    ServerError(String),
    // Unknown action, nothing done.
    Ignored { action: String },
}

pub fn dispatch_frame<P: Document + History>(
    page: &mut P, session: &mut SessionContext, frame: &str,
) -> Result<DispatchOutcome, DispatchError> {
    let action = ServerAction::decode(frame)?;
    apply_action(page, session, action)
}

pub fn apply_action<P: Document + History>(
    page: &mut P, session: &mut SessionContext, action: ServerAction,
) -> Result<DispatchOutcome, DispatchError> {
    match action {
        ServerAction::Set(set) => apply_set(page, &set)?,
        ServerAction::SetText(content) => apply_set_text(page, &content)?,
        ServerAction::PushState(content) => apply_push_state(page, session, content)?,
        ServerAction::Update(update) => apply_update(page, session, &update)?,
        ServerAction::Error(message) => return Ok(DispatchOutcome::ServerError(message)),
        ServerAction::Unknown { action, .. } => {
            warn!("Ignoring unknown action \"{}\"", action);
            return Ok(DispatchOutcome::Ignored { action });
        }
    }
    Ok(DispatchOutcome::Applied)
}

fn value_text(value: &Value) -> String { scalar_text(value).unwrap_or_default() }

fn apply_set<D: Document>(doc: &mut D, set: &SetAttribute) -> Result<(), DispatchError> {
    let value = value_text(&set.value);
    for node in doc.elements_by_class(&set.element) {
        doc.set_attribute(&node, &set.attr, &value)?;
    }
    Ok(())
}

fn apply_set_text<D: Document>(doc: &mut D, content: &ElementContent) -> Result<(), DispatchError> {
    let ElementContent(id, value) = content;
    match doc.element_by_id(id) {
        Some(node) => doc.set_inner_html(&node, &value_text(value))?,
        None => warn!("setText: no element \"{}\"", id),
    }
    Ok(())
}

fn apply_push_state<P: Document + History>(
    page: &mut P, session: &mut SessionContext, content: ElementContent,
) -> Result<(), DispatchError> {
    apply_set_text(page, &content)?;
    let ElementContent(variable, value) = content;
    session.assign(&variable, &value);
    let mut state = serde_json::Map::new();
    state.insert(variable, value);
    page.push_state(HistoryEntry {
        state: Value::Object(state),
        url: session.history_url(),
    })?;
    Ok(())
}

fn apply_update<D: Document>(
    doc: &mut D, session: &SessionContext, update: &VarUpdate,
) -> Result<(), DispatchError> {
    let path = DomPath::for_update(&update.var_type, update.player.as_ref(), &update.key, session);
    let node = resolve_or_create(doc, &path)?;
    doc.replace_with(&node, &render_value(&update.key, &update.value))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::session::ScalarId;
    use crate::virtual_page::VirtualPage;

    fn page() -> VirtualPage {
        let mut page = VirtualPage::with_client_skeleton();
        let root = page.root();
        page.add_element(root, "div", Some("round"), &[]);
        page.add_element(root, "div", Some("score"), &[]);
        page
    }

    #[test]
    fn set_applies_to_every_element_of_class() {
        let mut page = page();
        let root = page.root();
        let a = page.add_element(root, "img", None, &["card"]);
        let b = page.add_element(root, "img", None, &["card", "big"]);
        let c = page.add_element(root, "img", None, &["chip"]);
        let mut session = SessionContext::default();
        let frame = r#"["set", {"element": "card", "attr": "src", "value": "back.png"}]"#;
        assert_eq!(dispatch_frame(&mut page, &mut session, frame), Ok(DispatchOutcome::Applied));
        assert_eq!(page.element(a).attribute("src"), Some("back.png"));
        assert_eq!(page.element(b).attribute("src"), Some("back.png"));
        assert_eq!(page.element(c).attribute("src"), None);
    }

    #[test]
    fn set_text_replaces_content() {
        let mut page = page();
        let mut session = SessionContext::default();
        dispatch_frame(&mut page, &mut session, r#"["setText", ["round", 3]]"#).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some("3"));
        dispatch_frame(&mut page, &mut session, r#"["setText", ["round", "four"]]"#).unwrap();
        assert_eq!(page.text_by_id("round").as_deref(), Some("four"));
        assert!(page.history().is_empty());
    }

    #[test]
    fn push_state_updates_session_and_history() {
        let mut page = page();
        let root = page.root();
        page.add_element(root, "div", Some("gameId"), &[]);
        let mut session = SessionContext::new(Some("blackjack".to_owned()), None, None);
        dispatch_frame(&mut page, &mut session, r#"["pushState", ["gameId", "x7Yz"]]"#).unwrap();
        assert_eq!(page.text_by_id("gameId").as_deref(), Some("x7Yz"));
        assert_eq!(session.game_id, Some(ScalarId::new("x7Yz")));
        assert_eq!(page.history(), &[HistoryEntry {
            state: json!({"gameId": "x7Yz"}),
            url: "/g/blackjack/x7Yz/".to_owned(),
        }]);
    }

    #[test]
    fn push_state_of_other_variable_keeps_session() {
        let mut page = page();
        let mut session = SessionContext::new(Some("blackjack".to_owned()), None, None);
        dispatch_frame(&mut page, &mut session, r#"["pushState", ["round", 2]]"#).unwrap();
        assert_eq!(session, SessionContext::new(Some("blackjack".to_owned()), None, None));
        assert_eq!(page.text_by_id("round").as_deref(), Some("2"));
        assert_eq!(page.history()[0].url, "/g/blackjack/");
    }

    #[test]
    fn update_for_other_player() {
        let mut page = page();
        let mut session = SessionContext::new(None, None, Some(ScalarId::from(1)));
        let frame = r#"["update", {"varType": "score", "player": 2, "key": "hp", "value": 42}]"#;
        dispatch_frame(&mut page, &mut session, frame).unwrap();
        let score = page.element_by_id("score").unwrap();
        let player = page.child_with_class(&score, "2").unwrap();
        let hp = page.child_with_class(&player, "hp").unwrap();
        assert_eq!(page.element(hp).tag, "ul");
        assert_eq!(page.element(hp).attribute("data-hp"), Some("42"));
        assert_eq!(page.text_content(hp), "hp42");
    }

    #[test]
    fn update_for_local_player() {
        let mut page = page();
        let mut session = SessionContext::new(None, None, Some(ScalarId::from(1)));
        let frame = r#"["update", {"varType": "score", "player": 1, "key": "hp", "value": 42}]"#;
        dispatch_frame(&mut page, &mut session, frame).unwrap();
        let score = page.element_by_id("score").unwrap();
        assert!(page.child_with_class(&score, "1").is_none());
        let hp = page.child_with_class(&score, "hp").unwrap();
        assert_eq!(page.element(hp).attribute("data-hp"), Some("42"));
    }

    #[test]
    fn repeated_update_replaces_in_place() {
        let mut page = page();
        let mut session = SessionContext::default();
        for value in [1, 2, 3] {
            let frame =
                format!(r#"["update", {{"varType": "score", "key": "hp", "value": {value}}}]"#);
            dispatch_frame(&mut page, &mut session, &frame).unwrap();
        }
        let hp = page.elements_by_class("hp");
        assert_eq!(hp.len(), 1);
        assert_eq!(page.element(hp[0]).attribute("data-hp"), Some("3"));
    }

    #[test]
    fn update_with_missing_root_fails() {
        let mut page = page();
        let mut session = SessionContext::default();
        let frame = r#"["update", {"varType": "nowhere", "key": "hp", "value": 1}]"#;
        assert_eq!(
            dispatch_frame(&mut page, &mut session, frame),
            Err(DispatchError::Path(PathError::MissingRoot("nowhere".to_owned())))
        );
    }

    #[test]
    fn unknown_action_is_a_no_op() {
        let mut page = page();
        let before = page.outer_html(page.root());
        let mut session = SessionContext::default();
        assert_eq!(
            dispatch_frame(&mut page, &mut session, r#"["explode", null]"#),
            Ok(DispatchOutcome::Ignored { action: "explode".to_owned() })
        );
        assert_eq!(page.outer_html(page.root()), before);
    }

    #[test]
    fn error_action_is_reported() {
        let mut page = page();
        let mut session = SessionContext::default();
        assert_eq!(
            dispatch_frame(&mut page, &mut session, r#"["error", "not your turn"]"#),
            Ok(DispatchOutcome::ServerError("not your turn".to_owned()))
        );
    }
}

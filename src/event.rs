// Wire protocol.
//
// Server -> client: JSON text `[action, data]`.
// Client -> server: `method` or `method,<json>`, the format SockJS game handlers split on the
//   first comma.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{EnumString, IntoStaticStr};

use crate::session::{GameId, PlayerId, SessionContext};


// Variable types used by the game server in `update` messages. Clients treat the type as an
// opaque DOM id, so other values are fine too.
pub const VAR_TYPE_GAME: &str = "game";
pub const VAR_TYPE_PLAYER: &str = "player";
pub const VAR_TYPE_PRIVATE: &str = "private";

#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ActionName {
    Set,
    SetText,
    PushState,
    Update,
    Error,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SetAttribute {
    // Class name of the target elements.
    pub element: String,
    pub attr: String,
    pub value: Value,
}

// `[element_id, content]`
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ElementContent(pub String, pub Value);

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct VarUpdate {
    #[serde(rename = "varType", alias = "var_type")]
    pub var_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerId>,
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, PartialEq, Debug)]
pub enum ServerAction {
    Set(SetAttribute),
    SetText(ElementContent),
    PushState(ElementContent),
    Update(VarUpdate),
    Error(String),
    // Well-formed frame with an action this client does not know about.
    Unknown { action: String, data: Value },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FrameError {
    // Not JSON or not a `[string, any]` pair.
    Malformed(String),
    // Known action, but the payload has the wrong shape.
    InvalidPayload { action: String, reason: String },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Malformed(reason) => write!(f, "malformed frame: {reason}"),
            FrameError::InvalidPayload { action, reason } => {
                write!(f, "invalid payload for \"{action}\": {reason}")
            }
        }
    }
}

impl ServerAction {
    pub fn action_name(&self) -> &str {
        match self {
            ServerAction::Set(_) => ActionName::Set.into(),
            ServerAction::SetText(_) => ActionName::SetText.into(),
            ServerAction::PushState(_) => ActionName::PushState.into(),
            ServerAction::Update(_) => ActionName::Update.into(),
            ServerAction::Error(_) => ActionName::Error.into(),
            ServerAction::Unknown { action, .. } => action.as_str(),
        }
    }

    pub fn decode(frame: &str) -> Result<Self, FrameError> {
        let (action, data): (String, Value) = match serde_json::from_str::<Value>(frame) {
            Ok(Value::Array(items)) => {
                let Ok([action, data]) = <[Value; 2]>::try_from(items) else {
                    return Err(FrameError::Malformed("expected a two-element array".to_owned()));
                };
                let Value::String(action) = action else {
                    return Err(FrameError::Malformed("action must be a string".to_owned()));
                };
                (action, data)
            }
            Ok(_) => return Err(FrameError::Malformed("expected a two-element array".to_owned())),
            Err(err) => return Err(FrameError::Malformed(err.to_string())),
        };
        let Ok(name) = action.parse::<ActionName>() else {
            return Ok(ServerAction::Unknown { action, data });
        };
        let invalid = |err: serde_json::Error| FrameError::InvalidPayload {
            action: action.clone(),
            reason: err.to_string(),
        };
        Ok(match name {
            ActionName::Set => ServerAction::Set(serde_json::from_value(data).map_err(invalid)?),
            ActionName::SetText => {
                ServerAction::SetText(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionName::PushState => {
                ServerAction::PushState(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionName::Update => {
                ServerAction::Update(serde_json::from_value(data).map_err(invalid)?)
            }
            ActionName::Error => ServerAction::Error(match data {
                Value::String(message) => message,
                other => other.to_string(),
            }),
        })
    }

    pub fn encode(&self) -> String {
        let data = match self {
            ServerAction::Set(v) => serde_json::to_value(v),
            ServerAction::SetText(v) | ServerAction::PushState(v) => serde_json::to_value(v),
            ServerAction::Update(v) => serde_json::to_value(v),
            ServerAction::Error(message) => Ok(Value::String(message.clone())),
            ServerAction::Unknown { data, .. } => Ok(data.clone()),
        };
        // Serializing plain data structs into `Value` cannot fail.
        let data = data.unwrap_or(Value::Null);
        Value::Array(vec![Value::String(self.action_name().to_owned()), data]).to_string()
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub game_type: Option<String>,
    #[serde(default)]
    pub game_id: Option<GameId>,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

impl From<&SessionContext> for JoinRequest {
    fn from(session: &SessionContext) -> Self {
        JoinRequest {
            game_type: session.game_type.clone(),
            game_id: session.game_id.clone(),
            player_id: session.player_id.clone(),
        }
    }
}

pub const JOIN_METHOD: &str = "join";

#[derive(Clone, PartialEq, Debug)]
pub struct ClientMessage {
    pub method: String,
    pub data: Option<Value>,
}

impl ClientMessage {
    pub fn new(method: impl Into<String>, data: Option<Value>) -> Self {
        ClientMessage { method: method.into(), data }
    }

    pub fn join(request: &JoinRequest) -> Self {
        // Serializing a struct of options and strings cannot fail.
        let data = serde_json::to_value(request).unwrap_or(Value::Null);
        ClientMessage::new(JOIN_METHOD, Some(data))
    }

    pub fn encode(&self) -> String {
        match &self.data {
            Some(data) => format!("{},{}", self.method, data),
            None => self.method.clone(),
        }
    }

    // Splits on the first comma; everything after it must be JSON.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        match text.split_once(',') {
            Some((method, raw)) => {
                let data = serde_json::from_str(raw).map_err(|err| FrameError::InvalidPayload {
                    action: method.to_owned(),
                    reason: err.to_string(),
                })?;
                Ok(ClientMessage::new(method.trim(), Some(data)))
            }
            None => {
                let method = text.trim();
                if method.is_empty() {
                    return Err(FrameError::Malformed("empty message".to_owned()));
                }
                Ok(ClientMessage::new(method, None))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::session::ScalarId;

    #[test]
    fn decode_update_accepts_both_spellings() {
        let camel = ServerAction::decode(
            r#"["update", {"varType": "score", "player": 2, "key": "hp", "value": 42}]"#,
        )
        .unwrap();
        let snake = ServerAction::decode(
            r#"["update", {"var_type": "score", "player": "2", "key": "hp", "value": 42}]"#,
        )
        .unwrap();
        assert_eq!(camel, snake);
        assert_eq!(
            camel,
            ServerAction::Update(VarUpdate {
                var_type: "score".to_owned(),
                player: Some(ScalarId::from(2)),
                key: "hp".to_owned(),
                value: json!(42),
            })
        );
    }

    #[test]
    fn decode_unknown_action() {
        assert_eq!(
            ServerAction::decode(r#"["explode", {"radius": 3}]"#),
            Ok(ServerAction::Unknown {
                action: "explode".to_owned(),
                data: json!({"radius": 3}),
            })
        );
    }

    #[test]
    fn decode_rejects_bad_shapes() {
        for frame in ["not json", "{}", "[]", r#"["set"]"#, r#"["set", 1, 2]"#, "[1, 2]"] {
            assert!(
                matches!(ServerAction::decode(frame), Err(FrameError::Malformed(_))),
                "{frame}"
            );
        }
        assert!(matches!(
            ServerAction::decode(r#"["setText", {"id": "x"}]"#),
            Err(FrameError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn encode_server_frame() {
        let action = ServerAction::SetText(ElementContent("round".to_owned(), json!(3)));
        assert_eq!(action.encode(), r#"["setText",["round",3]]"#);
        let decoded = ServerAction::decode(&action.encode()).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn join_message_format() {
        let session = SessionContext::new(
            Some("blackjack".to_owned()),
            Some(ScalarId::new("x7Yz")),
            None,
        );
        let message = ClientMessage::join(&JoinRequest::from(&session));
        assert_eq!(
            message.encode(),
            r#"join,{"game_type":"blackjack","game_id":"x7Yz","player_id":null}"#
        );
    }

    #[test]
    fn decode_client_message() {
        assert_eq!(ClientMessage::decode("hit"), Ok(ClientMessage::new("hit", None)));
        assert_eq!(
            ClientMessage::decode("bet,[10]"),
            Ok(ClientMessage::new("bet", Some(json!([10]))))
        );
        assert_eq!(
            ClientMessage::decode(r#"join,{"a": "b,c"}"#),
            Ok(ClientMessage::new("join", Some(json!({"a": "b,c"}))))
        );
        assert!(ClientMessage::decode("bet,{oops").is_err());
        assert!(ClientMessage::decode("  ").is_err());
    }
}

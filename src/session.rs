use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use crate::lazy_regex;


// An identifier that travels over the wire either as a JSON number or as a JSON string
// (URL segments are always strings, server-assigned ids are numbers). Compared by its textual
// form, so `2` and `"2"` are the same id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ScalarId(String);

impl ScalarId {
    pub fn new(s: impl Into<String>) -> Self { ScalarId(s.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ScalarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<u64> for ScalarId {
    fn from(v: u64) -> Self { ScalarId(v.to_string()) }
}
impl From<&str> for ScalarId {
    fn from(v: &str) -> Self { ScalarId(v.to_owned()) }
}

impl Serialize for ScalarId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Keep numeric ids numeric on the wire.
        match self.0.parse::<u64>() {
            Ok(n) if n.to_string() == self.0 => serializer.serialize_u64(n),
            _ => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for ScalarId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            String(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => ScalarId(n.to_string()),
            Raw::String(s) => ScalarId(s),
        })
    }
}

pub type GameId = ScalarId;
pub type PlayerId = ScalarId;

// Names under which session identifiers appear in `pushState` messages.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumString, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum SessionVariable {
    GameType,
    GameId,
    PlayerId,
}

// Identifiers of the game this client participates in. Set once on page load and afterwards only
// changed by explicit `pushState` updates from the server.
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub game_type: Option<String>,
    pub game_id: Option<GameId>,
    pub player_id: Option<PlayerId>,
}

impl SessionContext {
    pub fn new(
        game_type: Option<String>, game_id: Option<GameId>, player_id: Option<PlayerId>,
    ) -> Self {
        SessionContext { game_type, game_id, player_id }
    }

    // Parses a page path such as `/g/blackjack/x7Yz/2/`. Paths outside of `/g/` yield an empty
    // session.
    pub fn from_path(path: &str) -> Self {
        let re = lazy_regex!(r"^/g/(?P<type>[^/]+)?/?(?P<game>[^/]+)?/?(?P<player>[^/]+)?/?$");
        let Some(caps) = re.captures(path) else {
            return SessionContext::default();
        };
        let segment = |name| caps.name(name).map(|m| m.as_str().to_owned());
        SessionContext {
            game_type: segment("type"),
            game_id: segment("game").map(ScalarId),
            player_id: segment("player").map(ScalarId),
        }
    }

    pub fn is_local_player(&self, player: &PlayerId) -> bool {
        self.player_id.as_ref() == Some(player)
    }

    // Applies a `pushState` assignment. Returns false if `variable` is not a session identifier,
    // in which case nothing changes.
    pub fn assign(&mut self, variable: &str, value: &serde_json::Value) -> bool {
        let Ok(variable) = variable.parse::<SessionVariable>() else {
            return false;
        };
        let value = scalar_text(value);
        match variable {
            SessionVariable::GameType => self.game_type = value,
            SessionVariable::GameId => self.game_id = value.map(ScalarId),
            SessionVariable::PlayerId => self.player_id = value.map(ScalarId),
        }
        true
    }

    // URL recorded in browser history: `/g/<gameType>/<gameId>/<playerId>/`, skipping absent
    // segments.
    pub fn history_url(&self) -> String {
        let mut url = "/g/".to_owned();
        let segments = [
            self.game_type.as_deref(),
            self.game_id.as_ref().map(ScalarId::as_str),
            self.player_id.as_ref().map(ScalarId::as_str),
        ];
        for segment in segments.into_iter().flatten() {
            url.push_str(segment);
            url.push('/');
        }
        url
    }
}

// Text form of a scalar JSON value; `None` for null. Compound values keep their JSON form.
pub fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}


#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn scalar_id_accepts_numbers_and_strings() {
        let a: ScalarId = serde_json::from_value(json!(2)).unwrap();
        let b: ScalarId = serde_json::from_value(json!("2")).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_value(&a).unwrap(), json!(2));
        assert_eq!(serde_json::to_value(ScalarId::new("x7")).unwrap(), json!("x7"));
        assert_eq!(serde_json::to_value(ScalarId::new("007")).unwrap(), json!("007"));
    }

    #[test]
    fn parse_path() {
        assert_eq!(
            SessionContext::from_path("/g/blackjack/abc/3/"),
            SessionContext::new(
                Some("blackjack".to_owned()),
                Some(ScalarId::new("abc")),
                Some(ScalarId::new("3"))
            )
        );
        assert_eq!(
            SessionContext::from_path("/g/blackjack"),
            SessionContext::new(Some("blackjack".to_owned()), None, None)
        );
        assert_eq!(SessionContext::from_path("/"), SessionContext::default());
    }

    #[test]
    fn history_url_skips_missing_segments() {
        let mut session = SessionContext::new(Some("blackjack".to_owned()), None, None);
        assert_eq!(session.history_url(), "/g/blackjack/");
        session.game_id = Some(ScalarId::new("abc"));
        session.player_id = Some(ScalarId::from(2));
        assert_eq!(session.history_url(), "/g/blackjack/abc/2/");
        assert_eq!(SessionContext::default().history_url(), "/g/");
    }

    #[test]
    fn assign_only_touches_session_variables() {
        let mut session = SessionContext::default();
        assert!(session.assign("gameId", &json!("abc")));
        assert!(session.assign("playerId", &json!(4)));
        assert!(!session.assign("round", &json!(4)));
        assert_eq!(session.game_id, Some(ScalarId::new("abc")));
        assert_eq!(session.player_id, Some(ScalarId::new("4")));
        assert!(session.assign("playerId", &json!(null)));
        assert_eq!(session.player_id, None);
    }
}

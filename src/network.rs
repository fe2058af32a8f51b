// Improvement potential: Implement SockJS polling transports. For now all clients use the raw
//   websocket entry point that SockJS servers expose next to the framed ones.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};


pub const PORT: u16 = 8080;

// Logical endpoint, as seen by SockJS clients.
pub const GAME_ENDPOINT: &str = "/game";

// Raw websocket entry point under `GAME_ENDPOINT`. Frames are plain text, without SockJS framing.
pub const RAW_WEBSOCKET_SUFFIX: &str = "/websocket";

// Transport names as understood by SockJS. The page offers one checkbox per name.
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumString, IntoStaticStr, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    Websocket,
    XhrStreaming,
    XdrStreaming,
    Eventsource,
    IframeEventsource,
    Htmlfile,
    IframeHtmlfile,
    XhrPolling,
    XdrPolling,
    IframeXhrPolling,
    JsonpPolling,
}

impl Transport {
    pub fn name(self) -> &'static str { self.into() }

    // Transports that this crate can actually open.
    pub fn is_supported(self) -> bool { self == Transport::Websocket }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// Parses a list of transport names, e.g. the ids of checked checkboxes. Unknown names are
// returned as errors rather than silently dropped.
pub fn parse_transports<'a>(
    names: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Transport>, String> {
    names
        .into_iter()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.parse().map_err(|_| format!("Unknown transport: \"{name}\"")))
        .collect()
}

// Picks the transport to use given the user whitelist. Empty whitelist means "anything goes",
// same as in SockJS.
pub fn choose_transport(whitelist: &[Transport]) -> Option<Transport> {
    if whitelist.is_empty() {
        Transport::iter().find(|t| t.is_supported())
    } else {
        whitelist.iter().copied().find(|t| t.is_supported())
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Endpoint {
    pub secure: bool,
    pub host: String,
    pub transports: Vec<Transport>,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, secure: bool, transports: Vec<Transport>) -> Self {
        Endpoint { secure, host: host.into(), transports }
    }

    pub fn websocket_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}{}", scheme, self.host, GAME_ENDPOINT, RAW_WEBSOCKET_SUFFIX)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_names_match_sockjs() {
        assert_eq!(Transport::Websocket.name(), "websocket");
        assert_eq!(Transport::XhrStreaming.name(), "xhr-streaming");
        assert_eq!(Transport::IframeXhrPolling.name(), "iframe-xhr-polling");
        assert_eq!("jsonp-polling".parse::<Transport>(), Ok(Transport::JsonpPolling));
    }

    #[test]
    fn parse_transports_rejects_unknown() {
        assert_eq!(
            parse_transports(["websocket", " xhr-polling "]),
            Ok(vec![Transport::Websocket, Transport::XhrPolling])
        );
        assert!(parse_transports(["carrier-pigeon"]).is_err());
    }

    #[test]
    fn choose_transport_respects_whitelist() {
        assert_eq!(choose_transport(&[]), Some(Transport::Websocket));
        assert_eq!(
            choose_transport(&[Transport::XhrPolling, Transport::Websocket]),
            Some(Transport::Websocket)
        );
        assert_eq!(choose_transport(&[Transport::XhrPolling]), None);
    }

    #[test]
    fn websocket_url() {
        let endpoint = Endpoint::new("example.org:8080", false, vec![]);
        assert_eq!(endpoint.websocket_url(), "ws://example.org:8080/game/websocket");
        let endpoint = Endpoint::new("example.org", true, vec![]);
        assert_eq!(endpoint.websocket_url(), "wss://example.org/game/websocket");
    }
}

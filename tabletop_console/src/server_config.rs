use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tabletop::game::GameType;
use tabletop::network::PORT;


fn default_port() -> u16 { PORT }
fn default_game_type() -> String { GameType::Blackjack.name().to_owned() }

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    // HTML page served for `/` and `/g/...`. The `{{ args }}` placeholder receives the session
    // identifiers parsed from the URL as a JSON object.
    pub index_file: String,
    // Directory served under `/static`.
    #[serde(default)]
    pub static_path: Option<String>,
    #[serde(default = "default_game_type")]
    pub default_game_type: String,
}

impl ServerConfig {
    pub fn default_game_type(&self) -> anyhow::Result<GameType> {
        self.default_game_type
            .parse()
            .map_err(|_| anyhow!("Unknown game type '{}'", self.default_game_type))
    }
}


#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn minimal_config() {
        let config: ServerConfig = serde_yaml::from_str("index_file: index.html").unwrap();
        assert_eq!(config, ServerConfig {
            port: PORT,
            index_file: "index.html".to_owned(),
            static_path: None,
            default_game_type: "blackjack".to_owned(),
        });
        assert_eq!(config.default_game_type().unwrap(), GameType::Blackjack);
    }

    #[test]
    fn full_config() {
        let config: ServerConfig = serde_yaml::from_str(indoc! {"
            port: 9000
            index_file: www/index.html
            static_path: www/static
            default_game_type: blackjack
        "})
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.static_path.as_deref(), Some("www/static"));
    }

    #[test]
    fn rejects_unknown_game_and_fields() {
        let config: ServerConfig =
            serde_yaml::from_str("index_file: a.html\ndefault_game_type: poker").unwrap();
        assert!(config.default_game_type().is_err());
        assert!(serde_yaml::from_str::<ServerConfig>("index_file: a.html\ncolor: red").is_err());
    }
}

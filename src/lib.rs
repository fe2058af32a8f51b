#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod blackjack;
pub mod cards;
pub mod client;
pub mod connection;
pub mod dispatch;
pub mod document;
pub mod dom_path;
pub mod error;
pub mod event;
pub mod game;
pub mod network;
pub mod render;
pub mod server;
pub mod session;
pub mod test_util;
pub mod turn_based;
pub mod util;
pub mod virtual_page;

//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::MatchState;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Attach a player identity (wallet address or similar) to this connection
    Register { identity: String },

    /// Join a match, creating it if needed
    #[serde(rename_all = "camelCase")]
    PlayerReady {
        game_id: String,
        /// Opaque stake metadata, echoed back in `game_start`
        #[serde(default)]
        bet_amount: Option<Value>,
    },

    /// Pointer position for this player's paddle (paddle center)
    #[serde(rename_all = "camelCase")]
    PlayerMove { game_id: String, y_position: f64 },

    #[serde(rename_all = "camelCase")]
    LeaveGame { game_id: String },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    #[serde(rename_all = "camelCase")]
    Welcome { connection_id: Uuid, server_time: u64 },

    /// Both participants are present; ticks follow
    #[serde(rename_all = "camelCase")]
    GameStart {
        player1: String,
        player2: String,
        bet_amount: Option<Value>,
        game_id: String,
    },

    /// Full authoritative state, sent every tick
    GameState(MatchState),

    /// Match finished. `winner` is absent if the winning side's slot was vacated.
    GameOver { winner: Option<String> },

    /// Error message
    Error { code: String, message: String },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_player_move() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"player_move","gameId":"A-B","yPosition":120.5}"#)
                .unwrap();
        match msg {
            ClientMsg::PlayerMove { game_id, y_position } => {
                assert_eq!(game_id, "A-B");
                assert_eq!(y_position, 120.5);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn player_ready_stake_is_optional() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"player_ready","gameId":"A-B"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::PlayerReady { bet_amount: None, .. }
        ));

        let msg: ClientMsg = serde_json::from_str(
            r#"{"type":"player_ready","gameId":"A-B","betAmount":"1000000"}"#,
        )
        .unwrap();
        match msg {
            ClientMsg::PlayerReady { bet_amount, .. } => {
                assert_eq!(bet_amount, Some(Value::from("1000000")))
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn game_state_is_flattened_under_type_tag() {
        let json = serde_json::to_value(ServerMsg::GameState(MatchState::default())).unwrap();
        assert_eq!(json["type"], "game_state");
        assert_eq!(json["ball"]["x"], 200.0);
        assert_eq!(json["score2"], 0);
    }

    #[test]
    fn game_start_uses_camel_case() {
        let json = serde_json::to_value(ServerMsg::GameStart {
            player1: "A".into(),
            player2: "B".into(),
            bet_amount: None,
            game_id: "A-B".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "game_start");
        assert_eq!(json["gameId"], "A-B");
        assert!(json["betAmount"].is_null());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"fire"}"#).is_err());
    }
}

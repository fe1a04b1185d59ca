use serde::{Deserialize, Serialize};

/// Body of a move submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    #[serde(rename = "move")]
    pub token: String,
}

/// Result of an applied move, returned to the mover and broadcast to the game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveResponse {
    #[serde(rename = "gameID")]
    pub game_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "newFEN")]
    pub new_fen: String,
    pub outcome: String,
    pub turn: String,
}

/// Messages delivered over the real-time channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SocketMessage {
    #[serde(rename = "gameStateUpdate")]
    GameStateUpdate {
        #[serde(rename = "gameID")]
        game_id: String,
        payload: MoveResponse,
    },
    #[serde(rename = "chat")]
    Chat {
        #[serde(rename = "gameID")]
        game_id: String,
        payload: String,
    },
}

impl SocketMessage {
    /// Message types that are never echoed back to the connection that sent them
    pub fn is_sender_exclusive(kind: &str) -> bool {
        kind == "chat"
    }
}

/// Frames a client may send over its socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")]
    Chat { payload: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_state_update_wire_format() {
        let msg = SocketMessage::GameStateUpdate {
            game_id: "g1".to_string(),
            payload: MoveResponse {
                game_id: "g1".to_string(),
                status: "ok".to_string(),
                message: None,
                new_fen: "fen".to_string(),
                outcome: String::new(),
                turn: "black".to_string(),
            },
        };

        let value: Value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "gameStateUpdate",
                "gameID": "g1",
                "payload": {
                    "gameID": "g1",
                    "status": "ok",
                    "newFEN": "fen",
                    "outcome": "",
                    "turn": "black"
                }
            })
        );
    }

    #[test]
    fn test_move_request_field_name() {
        let req: MoveRequest = serde_json::from_str(r#"{"move":"e2e4"}"#).unwrap();
        assert_eq!(req.token, "e2e4");
    }

    #[test]
    fn test_client_chat_ignores_extra_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"chat","payload":"gg","gameID":"other"}"#).unwrap();
        let ClientMessage::Chat { payload } = msg;
        assert_eq!(payload, "gg");
    }
}

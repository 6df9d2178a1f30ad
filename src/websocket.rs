use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::actions::ActionResponse;
use crate::application::GameService;
use crate::enums::ActionType;
use crate::game_log::LogEntry;

/// WebSocket message types for client-server communication
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "greeting")]
    Greeting { message: String },

    /// One game log entry, streamed in sequence order.
    #[serde(rename = "log_entry")]
    Log { entry: LogEntry },

    #[serde(rename = "submit_action")]
    SubmitAction {
        user_name: String,
        action: serde_json::Value,
    },

    #[serde(rename = "get_possible_actions")]
    GetPossibleActions { user_name: String },

    #[serde(rename = "possible_actions")]
    PossibleActions {
        user_name: String,
        actions: Vec<ActionType>,
    },

    #[serde(rename = "action_result")]
    ActionResult { response: ActionResponse },

    #[serde(rename = "error")]
    Error { message: String },
}

/// Streams a game's log to a socket and accepts actions from it.
/// Transport only; every rule lives behind [`GameService`].
#[derive(Clone)]
pub struct WebSocketService {
    game_service: GameService,
}

impl WebSocketService {
    pub fn new(game_service: GameService) -> Self {
        Self { game_service }
    }

    /// Handle a new WebSocket connection, replaying the log from `since`.
    pub async fn handle_connection(&self, socket: WebSocket, game_id: String, since: u64) {
        let connection_id = format!("conn_{}", uuid::Uuid::new_v4());
        log::info!(
            "🔌 WebSocket connected: {} (game {})",
            connection_id,
            game_id
        );

        let (mut sender, mut receiver) = socket.split();

        let greeting = WsMessage::Greeting {
            message: format!("Connected to game {game_id}"),
        };
        if let Err(e) = Self::send_message(&mut sender, &greeting).await {
            log::error!("❌ Failed to send greeting: {}", e);
            return;
        }

        // Subscribe before reading the backlog so nothing falls in between.
        let mut game_updates = self.game_service.subscribe();
        let backlog = match self.game_service.log_since(&game_id, since).await {
            Ok(entries) => entries,
            Err(e) => {
                let error = WsMessage::Error {
                    message: e.to_string(),
                };
                let _ = Self::send_message(&mut sender, &error).await;
                return;
            }
        };
        let mut next_sequence = since;
        for entry in backlog {
            next_sequence = entry.sequence() + 1;
            if Self::send_message(&mut sender, &WsMessage::Log { entry })
                .await
                .is_err()
            {
                return;
            }
        }

        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<WsMessage>();

        // Task to forward log entries and replies to this client
        let game_id_for_updates = game_id.clone();
        let connection_id_for_updates = connection_id.clone();
        let mut update_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    update = game_updates.recv() => match update {
                        Ok(event) => {
                            if event.game_id != game_id_for_updates
                                || event.entry.sequence() < next_sequence
                            {
                                continue;
                            }
                            next_sequence = event.entry.sequence() + 1;
                            WsMessage::Log { entry: event.entry }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            log::warn!(
                                "Connection {} lagged, {} log events dropped",
                                connection_id_for_updates,
                                skipped
                            );
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    reply = reply_rx.recv() => match reply {
                        Some(message) => message,
                        None => break,
                    },
                };
                if let Err(e) = Self::send_message(&mut sender, &message).await {
                    log::error!(
                        "Failed to send message to connection {}: {:?}",
                        connection_id_for_updates,
                        e
                    );
                    break; // Client disconnected
                }
            }
        });

        // Task to handle incoming messages
        let service = self.clone();
        let game_id_for_messages = game_id.clone();
        let connection_id_for_messages = connection_id.clone();
        let mut message_task = tokio::spawn(async move {
            while let Some(Ok(message)) = receiver.next().await {
                match message {
                    Message::Text(text) => {
                        let reply = service
                            .handle_text_message(&game_id_for_messages, text.as_str())
                            .await;
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => {
                        log::info!(
                            "WebSocket connection {} closed for game {}",
                            connection_id_for_messages,
                            game_id_for_messages
                        );
                        break;
                    }
                    _ => {
                        // Ignore other message types
                    }
                }
            }
        });

        // Wait for either task to complete (client disconnect or error)
        tokio::select! {
            _ = &mut update_task => {
                message_task.abort();
            }
            _ = &mut message_task => {
                update_task.abort();
            }
        }

        log::info!(
            "WebSocket connection {} terminated for game {}",
            connection_id,
            game_id
        );
    }

    /// Handles one client message and returns the reply for that client.
    pub async fn handle_text_message(&self, game_id: &str, text: &str) -> WsMessage {
        log::debug!("🔍 WebSocket received raw message: {}", text);

        let ws_message: WsMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("❌ Failed to deserialize WebSocket message: {}", e);
                return WsMessage::Error {
                    message: format!("Message deserialization failed: {e}"),
                };
            }
        };

        match ws_message {
            WsMessage::SubmitAction { user_name, action } => {
                log::debug!("🎯 {} submits {} in game {}", user_name, action, game_id);
                match self
                    .game_service
                    .submit_raw_action(game_id, &user_name, action)
                    .await
                {
                    Ok(response) => WsMessage::ActionResult { response },
                    Err(e) => WsMessage::Error {
                        message: e.to_string(),
                    },
                }
            }
            WsMessage::GetPossibleActions { user_name } => {
                match self
                    .game_service
                    .possible_actions(game_id, &user_name)
                    .await
                {
                    Ok(actions) => WsMessage::PossibleActions { user_name, actions },
                    Err(e) => WsMessage::Error {
                        message: e.to_string(),
                    },
                }
            }
            other => WsMessage::Error {
                message: format!("Unexpected client message: {other:?}"),
            },
        }
    }

    async fn send_message(
        sender: &mut SplitSink<WebSocket, Message>,
        message: &WsMessage,
    ) -> Result<(), axum::Error> {
        match serde_json::to_string(message) {
            Ok(json) => sender.send(Message::Text(json.into())).await,
            Err(e) => {
                log::error!("Failed to serialize WebSocket message: {}", e);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::GameConfiguration;
    use crate::errors::ErrorKind;
    use crate::state::PlayerSeat;

    async fn service_with_game() -> (WebSocketService, String) {
        let game_service = GameService::default();
        let game_id = game_service
            .create_game(
                GameConfiguration::default(),
                vec![PlayerSeat::new("Ann", "ann"), PlayerSeat::new("Ben", "ben")],
            )
            .await
            .unwrap();
        (WebSocketService::new(game_service), game_id)
    }

    #[tokio::test]
    async fn test_submit_action_message() {
        let (service, game_id) = service_with_game().await;
        let reply = service
            .handle_text_message(
                &game_id,
                r#"{"type":"submit_action","user_name":"ann","action":{"type":"RollDice","options":{"dice_count":1,"auto_commit":true}}}"#,
            )
            .await;
        match reply {
            WsMessage::ActionResult { response } => assert!(response.accepted),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_possible_actions_message() {
        let (service, game_id) = service_with_game().await;
        let reply = service
            .handle_text_message(
                &game_id,
                r#"{"type":"get_possible_actions","user_name":"ben"}"#,
            )
            .await;
        match reply {
            WsMessage::PossibleActions { actions, .. } => {
                assert_eq!(actions, vec![ActionType::Forfeit])
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_action_payload_gets_logged_rejection() {
        let (service, game_id) = service_with_game().await;
        let reply = service
            .handle_text_message(
                &game_id,
                r#"{"type":"submit_action","user_name":"ann","action":{"type":"StealEverything"}}"#,
            )
            .await;
        match reply {
            WsMessage::ActionResult { response } => {
                assert!(!response.accepted);
                assert_eq!(
                    response.error.map(|e| e.kind),
                    Some(ErrorKind::UnknownAction)
                );
            }
            other => panic!("unexpected reply {other:?}"),
        }

        let reply = service
            .handle_text_message(
                &game_id,
                r#"{"type":"submit_action","user_name":"ann","action":{"type":"BuildBuilding","options":{}}}"#,
            )
            .await;
        match reply {
            WsMessage::ActionResult { response } => assert_eq!(
                response.error.map(|e| e.kind),
                Some(ErrorKind::InvalidActionOptions)
            ),
            other => panic!("unexpected reply {other:?}"),
        }

        let log = service.game_service.log_since(&game_id, 0).await.unwrap();
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_message_gets_error_reply() {
        let (service, game_id) = service_with_game().await;
        let reply = service.handle_text_message(&game_id, "not json").await;
        assert!(matches!(reply, WsMessage::Error { .. }));

        let reply = service
            .handle_text_message(&game_id, r#"{"type":"greeting","message":"hi"}"#)
            .await;
        assert!(matches!(reply, WsMessage::Error { .. }));
    }
}

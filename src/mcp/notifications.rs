//! Notification broadcasting for MCP servers
//!
//! The registry signals a single [`ChangeNotifier`]. This module fans that
//! signal out over a broadcast channel so every connected session (one per
//! HTTP client, or the single stdio client) can forward it to its peer.

use rmcp::service::ServiceError;
use tokio::sync::broadcast;

use crate::registry::ChangeNotifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChangeEvent {
    /// A rescan completed and the file listing may have changed.
    ResourceListChanged { total_files: usize },
}

/// Manages notification broadcasting to multiple MCP server instances
#[derive(Clone)]
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<FileChangeEvent>,
}

impl NotificationBroadcaster {
    /// Create a new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers
    pub fn send(&self, event: FileChangeEvent) {
        match self.sender.send(event.clone()) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent", "{event:?} to {count} subscribers");
            }
            Err(_) => {
                crate::debug_event!("broadcast", "dropped", "no subscribers for {event:?}");
            }
        }
    }

    /// Subscribe to receive notifications
    pub fn subscribe(&self) -> broadcast::Receiver<FileChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl ChangeNotifier for NotificationBroadcaster {
    fn resources_changed(&self, total_files: usize) {
        self.send(FileChangeEvent::ResourceListChanged { total_files });
    }
}

impl super::JqServer {
    /// Forward broadcast events to this session's peer until the channel
    /// closes or the session's transport goes away.
    ///
    /// Events arriving before the client has initialized are dropped.
    pub async fn start_notification_listener(
        &self,
        mut receiver: broadcast::Receiver<FileChangeEvent>,
    ) {
        crate::debug_event!("mcp-notify", "listening");

        loop {
            match receiver.recv().await {
                Ok(FileChangeEvent::ResourceListChanged { total_files }) => {
                    let peer_guard = self.peer.lock().await;
                    let Some(peer) = peer_guard.as_ref() else {
                        crate::debug_event!("mcp-notify", "dropped", "no peer");
                        continue;
                    };

                    match peer.notify_resource_list_changed().await {
                        Ok(()) => crate::debug_event!(
                            "mcp-notify",
                            "sent",
                            "resource list changed ({total_files} files)"
                        ),
                        Err(ServiceError::TransportClosed) => {
                            crate::debug_event!("mcp-notify", "session closed");
                            break;
                        }
                        Err(e) => crate::debug_event!("mcp-notify", "failed", "{e}"),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("[mcp-notify] lagged by {n} messages");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    crate::debug_event!("mcp-notify", "channel closed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_subscribers_is_harmless() {
        let broadcaster = NotificationBroadcaster::new(4);
        broadcaster.resources_changed(3);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_event() {
        let broadcaster = NotificationBroadcaster::new(4);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        broadcaster.resources_changed(7);

        let expected = FileChangeEvent::ResourceListChanged { total_files: 7 };
        assert_eq!(first.recv().await.unwrap(), expected);
        assert_eq!(second.recv().await.unwrap(), expected);
    }

    const INITIALIZE: &str = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"#,
        r#""protocolVersion":"2024-11-05","capabilities":{},"#,
        r#""clientInfo":{"name":"listener-test","version":"0.0.0"}}}"#,
        "\n"
    );
    const INITIALIZED: &str = "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n";

    #[tokio::test]
    async fn test_listener_ends_with_its_session() {
        use crate::config::Settings;
        use crate::registry::FileRegistry;
        use rmcp::ServiceExt;
        use std::sync::Arc;
        use std::time::Duration;
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let temp = tempfile::TempDir::new().unwrap();
        let registry = Arc::new(FileRegistry::new(temp.path()).unwrap());
        let server = super::super::JqServer::new(registry, Arc::new(Settings::default()));

        let broadcaster = NotificationBroadcaster::new(4);
        let listener = {
            let server = server.clone();
            let receiver = broadcaster.subscribe();
            tokio::spawn(async move { server.start_notification_listener(receiver).await })
        };

        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let running = tokio::spawn(async move { server.serve(tokio::io::split(server_io)).await });

        let (client_read, mut client_write) = tokio::io::split(client_io);
        let mut lines = BufReader::new(client_read).lines();
        client_write.write_all(INITIALIZE.as_bytes()).await.unwrap();
        let response = lines.next_line().await.unwrap().unwrap();
        assert!(response.contains("\"id\":1"));
        client_write.write_all(INITIALIZED.as_bytes()).await.unwrap();

        let service = running.await.unwrap().unwrap();

        // Client disconnects
        drop(lines);
        drop(client_write);
        let _ = tokio::time::timeout(Duration::from_secs(5), service.waiting()).await;

        broadcaster.resources_changed(1);

        let finished = tokio::time::timeout(Duration::from_secs(5), listener).await;
        assert!(finished.is_ok());
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_usable_as_registry_notifier() {
        let broadcaster = std::sync::Arc::new(NotificationBroadcaster::new(4));
        let mut receiver = broadcaster.subscribe();
        let notifier: std::sync::Arc<dyn ChangeNotifier> = broadcaster.clone();

        notifier.resources_changed(2);

        assert_eq!(
            receiver.recv().await.unwrap(),
            FileChangeEvent::ResourceListChanged { total_files: 2 }
        );
    }
}

//! Notification handling for the thermometer
//! This module forwards values from the notify characteristic to the
//! platform event queue.

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::types::PlatformEvent;

/// Owns the background task reading a characteristic's notify stream
#[derive(Default)]
pub struct NotificationHandler {
    cancel_token: Option<CancellationToken>,
}

impl NotificationHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Subscribes to `notify_char`. bluest writes the client-config
    /// descriptor itself when the notify stream opens.
    pub fn setup_notifications(
        &mut self,
        runtime: &Handle,
        notify_char: Characteristic,
        events: UnboundedSender<PlatformEvent>,
    ) {
        self.stop_notifications();
        info!("Subscribing to notifications...");

        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        runtime.spawn(async move {
            Self::process_notifications(notify_char, events, cancel_token_for_task.clone()).await;
            cancel_token_for_task.cancel();
        });
        self.cancel_token = Some(cancel_token);
    }

    pub fn stop_notifications(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            debug!("Stopping notification task");
            token.cancel();
        }
    }

    async fn process_notifications(
        notify_char: Characteristic,
        events: UnboundedSender<PlatformEvent>,
        cancel_token: CancellationToken,
    ) {
        info!("Listening for thermometer notifications...");
        let uuid = notify_char.uuid();

        let mut notification_stream = match notify_char.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                result = notification_stream.next() => match result {
                    Some(Ok(value)) => {
                        debug!("Received thermometer data: {:02X?}", value);
                        let event = PlatformEvent::CharacteristicChanged {
                            characteristic: uuid,
                            value,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("Error in notification stream: {}", e);
                        break;
                    }
                    None => break,
                },
                _ = cancel_token.cancelled() => break,
            }
        }

        info!("Notification stream ended");
    }
}

impl Drop for NotificationHandler {
    fn drop(&mut self) {
        self.stop_notifications();
    }
}

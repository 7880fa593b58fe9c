//! Event coordinator. Routes channel messages through the dialogue.
//!
//! Each user gets a worker task fed by an unbounded queue, so different
//! users are served concurrently while one user's events are handled
//! strictly in arrival order. The per-user lock taken in [`QuoteBot::process`]
//! additionally keeps direct callers from interleaving.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::channels::{Channel, IncomingMessage, MessageKind, OutgoingResponse};
use crate::dialogue::prompts;
use crate::dialogue::{Dialogue, Event, SessionChange, Step};
use crate::error::Error;
use crate::session::{SessionStore, UserLocks};

/// The pricing bot: one dialogue, one session store, one channel.
pub struct QuoteBot {
    dialogue: Dialogue,
    store: Arc<dyn SessionStore>,
    locks: UserLocks,
    channel: Arc<dyn Channel>,
}

impl QuoteBot {
    pub fn new(dialogue: Dialogue, store: Arc<dyn SessionStore>, channel: Arc<dyn Channel>) -> Self {
        Self {
            dialogue,
            store,
            locks: UserLocks::new(),
            channel,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // ── Main loop ───────────────────────────────────────────────────

    /// Run until Ctrl+C or the channel stream ends.
    pub async fn run(self: Arc<Self>) -> Result<(), Error> {
        let mut message_stream = self.channel.start().await?;
        let mut workers = JoinSet::new();
        let mut queues: HashMap<String, mpsc::UnboundedSender<IncomingMessage>> = HashMap::new();

        tracing::info!(channel = self.channel.name(), "Bot ready and listening");

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Ctrl+C received, shutting down...");
                    break;
                }
                msg = message_stream.next() => {
                    match msg {
                        Some(m) => m,
                        None => {
                            tracing::info!("Channel stream ended, shutting down...");
                            break;
                        }
                    }
                }
            };

            let message = match queues.get(&message.user_id) {
                Some(queue) => match queue.send(message) {
                    Ok(()) => continue,
                    // Worker is gone (it panicked); start a new one below.
                    Err(mpsc::error::SendError(message)) => message,
                },
                None => message,
            };

            let (queue, inbox) = mpsc::unbounded_channel();
            let user_id = message.user_id.clone();
            // Cannot fail: the receiver is still held here.
            let _ = queue.send(message);
            queues.insert(user_id, queue);
            workers.spawn(Arc::clone(&self).serve_user(inbox));

            while let Some(result) = workers.try_join_next() {
                if let Err(e) = result {
                    tracing::error!("User worker failed: {e}");
                }
            }
        }

        // Closing the queues lets each worker finish what is already queued.
        drop(queues);
        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                tracing::error!("User worker failed: {e}");
            }
        }

        tracing::info!("Bot shutting down...");
        self.channel.shutdown().await?;
        Ok(())
    }

    /// Process one user's messages in order until their queue closes.
    async fn serve_user(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<IncomingMessage>) {
        while let Some(message) = inbox.recv().await {
            self.process(message).await;
        }
    }

    /// Handle one message and send the reply, holding the user's lock
    /// throughout. Failures are logged and answered with a generic error.
    pub async fn process(&self, message: IncomingMessage) {
        let _guard = self.locks.lock(&message.user_id).await;

        let response = match self.handle_message(&message).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                self.channel.acknowledge(&message).await;
                return;
            }
            Err(e) => {
                tracing::error!(user_id = %message.user_id, error = %e, "Error handling message");
                OutgoingResponse::from(prompts::calculation_failed())
            }
        };

        if let Err(e) = self.channel.respond(&message, response).await {
            tracing::error!(user_id = %message.user_id, error = %e, "Failed to send reply");
        }
    }

    // ── Message dispatch ────────────────────────────────────────────

    /// Apply one message to the sender's session. Returns `None` for
    /// messages the bot ignores (unknown commands or button data).
    ///
    /// Callers must hold the sender's lock.
    pub async fn handle_message(
        &self,
        message: &IncomingMessage,
    ) -> Result<Option<OutgoingResponse>, Error> {
        let event = match message.kind {
            MessageKind::Text => Event::from_text(&message.content),
            MessageKind::Button => Event::from_callback(&message.content),
        };
        let Some(event) = event else {
            tracing::debug!(
                user_id = %message.user_id,
                content = %message.content,
                "Ignoring unrecognized input"
            );
            return Ok(None);
        };

        let user_id = message.user_id.as_str();
        let session = self.store.get(user_id).await?;
        let transition = self
            .dialogue
            .transition(user_id, session.as_ref(), &event, Utc::now());

        // A successful choice replaces the buttons it came from.
        let replaces_choice = matches!(event, Event::SelectMaterial(_) | Event::SelectSubtype(_))
            && matches!(transition.change, SessionChange::Advanced(_));

        match transition.change {
            SessionChange::Unchanged => {
                tracing::debug!(user_id, event = event.name(), "Session unchanged");
            }
            SessionChange::Started(fresh) => {
                self.store.delete(user_id).await?;
                self.store.create(fresh).await?;
                let user_name = message.user_name.as_deref().unwrap_or("-");
                tracing::info!(
                    user_id,
                    user_name,
                    channel = %message.channel,
                    event = event.name(),
                    "Calculation started"
                );
            }
            SessionChange::Advanced(updated) => {
                if let Step::Completed { order, price } = &updated.step {
                    tracing::info!(
                        user_id,
                        material = %order.selection.material,
                        subtype = order.selection.subtype.as_deref().unwrap_or("-"),
                        width = %order.width,
                        height = %order.height,
                        quantity = order.quantity,
                        price = %price.amount(),
                        "Quote computed"
                    );
                } else {
                    tracing::info!(user_id, step = %updated.kind(), event = event.name(), "Session advanced");
                }
                self.store.update(updated).await?;
            }
        }

        let mut response = OutgoingResponse::from(transition.reply);
        if replaces_choice {
            response = response.editing_origin();
        }
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::channels::MessageStream;
    use crate::config::Limits;
    use crate::dialogue::StepKind;
    use crate::error::{ChannelError, StoreError};
    use crate::pricing::PricingTable;
    use crate::session::InMemorySessionStore;
    use crate::dialogue::Session;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<OutgoingResponse>>,
        acknowledged: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            "test"
        }
        async fn start(&self) -> Result<MessageStream, ChannelError> {
            Ok(Box::pin(futures::stream::empty()))
        }
        async fn acknowledge(&self, msg: &IncomingMessage) {
            self.acknowledged.lock().await.push(msg.content.clone());
        }
        async fn respond(
            &self,
            _msg: &IncomingMessage,
            response: OutgoingResponse,
        ) -> Result<(), ChannelError> {
            self.sent.lock().await.push(response);
            Ok(())
        }
        async fn health_check(&self) -> Result<(), ChannelError> {
            Ok(())
        }
        async fn shutdown(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get(&self, _user_id: &str) -> Result<Option<Session>, StoreError> {
            Ok(None)
        }
        async fn create(&self, _session: Session) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn update(&self, _session: Session) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".into()))
        }
        async fn delete(&self, _user_id: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn count(&self) -> Result<usize, StoreError> {
            Ok(0)
        }
    }

    fn bot_with(store: Arc<dyn SessionStore>) -> (QuoteBot, Arc<RecordingChannel>) {
        let channel = Arc::new(RecordingChannel::default());
        let dialogue = Dialogue::new(PricingTable::default(), Limits::default());
        (QuoteBot::new(dialogue, store, channel.clone()), channel)
    }

    fn bot() -> (QuoteBot, Arc<RecordingChannel>) {
        bot_with(Arc::new(InMemorySessionStore::new()))
    }

    #[tokio::test]
    async fn start_creates_session() {
        let (bot, _) = bot();
        let reply = bot
            .handle_message(&IncomingMessage::new("test", "1", "/start"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.buttons.len(), 3);
        assert!(!reply.edit_origin);
        let session = bot.store().get("1").await.unwrap().unwrap();
        assert_eq!(session.kind(), StepKind::AwaitingMaterial);
    }

    #[tokio::test]
    async fn material_choice_edits_origin_message() {
        let (bot, _) = bot();
        bot.handle_message(&IncomingMessage::new("test", "1", "/start"))
            .await
            .unwrap();
        let reply = bot
            .handle_message(&IncomingMessage::button("test", "1", "material:банер"))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.edit_origin);
        assert!(reply.buttons.is_empty());
    }

    #[tokio::test]
    async fn stale_choice_sends_new_message() {
        let (bot, _) = bot();
        bot.handle_message(&IncomingMessage::new("test", "1", "/start"))
            .await
            .unwrap();
        bot.handle_message(&IncomingMessage::button("test", "1", "material:банер"))
            .await
            .unwrap();
        let reply = bot
            .handle_message(&IncomingMessage::button("test", "1", "material:холст"))
            .await
            .unwrap()
            .unwrap();
        assert!(!reply.edit_origin);
        let session = bot.store().get("1").await.unwrap().unwrap();
        assert_eq!(session.kind(), StepKind::AwaitingWidth);
    }

    #[tokio::test]
    async fn unknown_command_is_ignored() {
        let (bot, _) = bot();
        let reply = bot
            .handle_message(&IncomingMessage::new("test", "1", "/help"))
            .await
            .unwrap();
        assert!(reply.is_none());
        assert_eq!(bot.store().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_button_data_is_ignored() {
        let (bot, _) = bot();
        let reply = bot
            .handle_message(&IncomingMessage::button("test", "1", "garbage"))
            .await
            .unwrap();
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn store_failure_replies_with_error() {
        let (bot, channel) = bot_with(Arc::new(BrokenStore));
        bot.process(IncomingMessage::new("test", "1", "/start")).await;
        let sent = channel.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, prompts::CALCULATION_FAILED);
    }

    #[tokio::test]
    async fn ignored_message_sends_nothing() {
        let (bot, channel) = bot();
        bot.process(IncomingMessage::new("test", "1", "/settings")).await;
        assert!(channel.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn ignored_button_is_acknowledged_without_reply() {
        let (bot, channel) = bot();
        bot.process(IncomingMessage::button("test", "1", "garbage")).await;
        assert!(channel.sent.lock().await.is_empty());
        assert_eq!(*channel.acknowledged.lock().await, vec!["garbage".to_string()]);
    }

    #[tokio::test]
    async fn answered_message_is_not_acknowledged_separately() {
        let (bot, channel) = bot();
        bot.process(IncomingMessage::new("test", "1", "/start")).await;
        assert_eq!(channel.sent.lock().await.len(), 1);
        assert!(channel.acknowledged.lock().await.is_empty());
    }
}

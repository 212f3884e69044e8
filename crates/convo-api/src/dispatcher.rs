use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error};

use convo_db::Database;
use convo_platform::{CompletionClient, MessagePayload, PlatformClient};
use convo_types::webhook::{InboundMessage, MessagingEvent};

use crate::commands::{self, Command, HELP_TEXT};

const SONG_REPLY: &str = "🎵 Song: https://www.youtube.com/watch?v=dQw4w9WgXcQ";
const PHOTO_URL: &str = "https://via.placeholder.com/800x400.png?text=Photo";
const MEME_URL: &str = "https://i.imgflip.com/1bij.jpg";

/// Per-event processing: user bookkeeping, command matching and exactly one
/// outbound reply per non-echo message.
#[derive(Clone)]
pub struct Dispatcher {
    db: Arc<Database>,
    platform: Arc<PlatformClient>,
    completion: Option<Arc<CompletionClient>>,
}

impl Dispatcher {
    pub fn new(
        db: Arc<Database>,
        platform: Arc<PlatformClient>,
        completion: Option<Arc<CompletionClient>>,
    ) -> Self {
        Self {
            db,
            platform,
            completion,
        }
    }

    /// Entry point for one webhook event. Failures are logged here so one
    /// event can never poison the rest of a delivery batch.
    pub async fn handle_event(&self, event: &MessagingEvent) {
        if let Some(message) = &event.message {
            if let Err(e) = self.handle_message(&event.sender.id, message).await {
                error!("Event handling failed for {}: {:#}", event.sender.id, e);
            }
        } else if let Some(postback) = &event.postback {
            debug!(
                "Ignoring postback from {}: {:?}",
                event.sender.id,
                postback.payload.as_deref()
            );
        }
    }

    async fn handle_message(&self, sender: &str, message: &InboundMessage) -> Result<()> {
        // First contact: create the user row, with a best-effort profile
        // name. A failed lookup just leaves the name unknown.
        let known = {
            let psid = sender.to_string();
            self.with_db(move |db| db.get_user(&psid)).await?
        };
        if known.is_none() {
            let profile = match self.platform.fetch_display_name(sender).await {
                Ok(name) => name,
                Err(e) => {
                    debug!("Profile fetch failed for {}: {:#}", sender, e);
                    None
                }
            };
            let psid = sender.to_string();
            self.with_db(move |db| db.ensure_user(&psid, profile.as_deref()))
                .await?;
        }

        // Echoes of our own outbound messages: no XP, no reply.
        if message.is_echo {
            return Ok(());
        }

        {
            let psid = sender.to_string();
            self.with_db(move |db| db.add_xp(&psid)).await?;
        }

        let text = message.text.as_deref().unwrap_or("");
        let reply = self.reply_for(sender, commands::parse(text)).await?;

        // Fire-and-forget: a failed send is logged, never retried, and the
        // store writes above stay committed.
        if let Err(e) = self.platform.send_message(sender, &reply).await {
            error!("Send API error for {}: {:#}", sender, e);
        }
        Ok(())
    }

    async fn reply_for(&self, sender: &str, command: Command) -> Result<MessagePayload> {
        let reply = match command {
            Command::SetNick(nick) => {
                let psid = sender.to_string();
                let stored = nick.clone();
                self.with_db(move |db| db.set_nickname(&psid, &stored))
                    .await?;
                MessagePayload::text(format!("Nickname set to: {nick}"))
            }
            Command::GetNick => {
                let nick = self
                    .nickname_of(sender)
                    .await?
                    .unwrap_or_else(|| "(not set)".to_string());
                MessagePayload::text(format!("Your nickname: {nick}"))
            }
            Command::Level => {
                let psid = sender.to_string();
                let points = self.with_db(move |db| db.get_xp(&psid)).await?;
                MessagePayload::text(format!("⭐ Your XP: {points}"))
            }
            Command::Help => MessagePayload::text(HELP_TEXT),
            Command::Song => MessagePayload::text(SONG_REPLY),
            Command::Photo => MessagePayload::image(PHOTO_URL, true),
            Command::Meme => MessagePayload::image(MEME_URL, false),
            Command::YoutubeSearch(query) => MessagePayload::text(format!(
                "YouTube search: https://www.youtube.com/results?search_query={}",
                urlencoding::encode(&query)
            )),
            Command::Ai(query) => match &self.completion {
                Some(completion) => match completion.complete(&query).await {
                    Ok(answer) => MessagePayload::text(format!("🤖 {answer}")),
                    Err(e) => {
                        error!("Completion error: {:#}", e);
                        MessagePayload::text("🤖 AI error")
                    }
                },
                None => MessagePayload::text(format!("🤖 (demo) {query}")),
            },
            Command::Chat(text) => match self.nickname_of(sender).await? {
                Some(nick) => MessagePayload::text(format!("({nick}) — You said: {text}")),
                None => MessagePayload::text(format!("You said: {text}")),
            },
        };
        Ok(reply)
    }

    async fn nickname_of(&self, sender: &str) -> Result<Option<String>> {
        let psid = sender.to_string();
        let user = self.with_db(move |db| db.get_user(&psid)).await?;
        Ok(user.and_then(|u| u.nickname))
    }

    /// Run a blocking rusqlite call off the async runtime.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convo_types::webhook::Sender;

    fn dispatcher(server: &mockito::Server) -> (Dispatcher, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let platform = Arc::new(PlatformClient::with_base_url(server.url(), "test-token"));
        (Dispatcher::new(db.clone(), platform, None), db)
    }

    fn message_event(psid: &str, text: &str) -> MessagingEvent {
        MessagingEvent {
            sender: Sender {
                id: psid.to_string(),
            },
            message: Some(InboundMessage {
                text: Some(text.to_string()),
                is_echo: false,
            }),
            postback: None,
        }
    }

    fn mock_profile(server: &mut mockito::Server, psid: &str, name: &str) -> mockito::Mock {
        server
            .mock("GET", format!("/{psid}").as_str())
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(format!(r#"{{"name":"{name}","id":"{psid}"}}"#))
    }

    fn mock_send(server: &mut mockito::Server, text: &str) -> mockito::Mock {
        server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": { "text": text }
            })))
            .with_status(200)
    }

    #[tokio::test]
    async fn plain_message_creates_user_adds_xp_and_replies_once() {
        let mut server = mockito::Server::new_async().await;
        let profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "You said: hello").expect(1).create_async().await;

        let (dispatcher, db) = dispatcher(&server);
        dispatcher.handle_event(&message_event("u1", "hello")).await;

        profile.assert_async().await;
        send.assert_async().await;

        let user = db.get_user("u1").unwrap().unwrap();
        assert_eq!(user.last_known_name.as_deref(), Some("Bob"));
        assert_eq!(db.get_xp("u1").unwrap(), 1);
    }

    #[tokio::test]
    async fn echo_creates_user_but_no_xp_and_no_reply() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (dispatcher, db) = dispatcher(&server);
        let event = MessagingEvent {
            sender: Sender {
                id: "u1".to_string(),
            },
            message: Some(InboundMessage {
                text: Some("hello".to_string()),
                is_echo: true,
            }),
            postback: None,
        };
        dispatcher.handle_event(&event).await;

        send.assert_async().await;
        assert!(db.get_user("u1").unwrap().is_some());
        assert_eq!(db.get_xp("u1").unwrap(), 0);
    }

    #[tokio::test]
    async fn profile_fetch_failure_still_creates_user_and_replies() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/u1")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let send = mock_send(&mut server, "You said: hi").expect(1).create_async().await;

        let (dispatcher, db) = dispatcher(&server);
        dispatcher.handle_event(&message_event("u1", "hi")).await;

        send.assert_async().await;
        let user = db.get_user("u1").unwrap().unwrap();
        assert!(user.last_known_name.is_none());
    }

    #[tokio::test]
    async fn nick_then_getnick_round_trip() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let set = mock_send(&mut server, "Nickname set to: Alice").expect(1).create_async().await;
        let get = mock_send(&mut server, "Your nickname: Alice").expect(1).create_async().await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher
            .handle_event(&message_event("u1", "/nick Alice"))
            .await;
        dispatcher
            .handle_event(&message_event("u1", "/getnick"))
            .await;

        set.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn getnick_without_nickname_is_placeholder() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "Your nickname: (not set)").expect(1).create_async().await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher
            .handle_event(&message_event("u1", "/getnick"))
            .await;

        send.assert_async().await;
    }

    #[tokio::test]
    async fn level_counts_the_triggering_message() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "⭐ Your XP: 1").expect(1).create_async().await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher.handle_event(&message_event("u1", "/level")).await;

        send.assert_async().await;
    }

    #[tokio::test]
    async fn fixed_media_commands() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let song = mock_send(&mut server, SONG_REPLY).expect(1).create_async().await;
        let photo = server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": { "attachment": {
                    "type": "image",
                    "payload": { "url": PHOTO_URL, "is_reusable": true }
                }}
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;
        let meme = server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "message": { "attachment": {
                    "type": "image",
                    "payload": { "url": MEME_URL, "is_reusable": false }
                }}
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher.handle_event(&message_event("u1", "/song")).await;
        dispatcher.handle_event(&message_event("u1", "/photo")).await;
        dispatcher.handle_event(&message_event("u1", "/meme")).await;

        song.assert_async().await;
        photo.assert_async().await;
        meme.assert_async().await;
    }

    #[tokio::test]
    async fn yt_url_encodes_the_query() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(
            &mut server,
            "YouTube search: https://www.youtube.com/results?search_query=rust%20lang",
        )
        .expect(1).create_async().await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher
            .handle_event(&message_event("u1", "/yt rust lang"))
            .await;

        send.assert_async().await;
    }

    #[tokio::test]
    async fn ai_without_credential_is_deterministic_demo() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "🤖 (demo) test").expect(1).create_async().await;

        let (dispatcher, _db) = dispatcher(&server);
        dispatcher
            .handle_event(&message_event("u1", "/ai test"))
            .await;

        send.assert_async().await;
    }

    #[tokio::test]
    async fn ai_with_credential_forwards_to_completion() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"hi there"}}]}"#)
            .create_async()
            .await;
        let send = mock_send(&mut server, "🤖 hi there").expect(1).create_async().await;

        let db = Arc::new(Database::open_in_memory().unwrap());
        let platform = Arc::new(PlatformClient::with_base_url(server.url(), "tok"));
        let completion = Arc::new(CompletionClient::with_base_url(server.url(), "key"));
        let dispatcher = Dispatcher::new(db, platform, Some(completion));

        dispatcher.handle_event(&message_event("u1", "/ai hi")).await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn ai_completion_failure_is_fixed_error_reply() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .create_async()
            .await;
        let send = mock_send(&mut server, "🤖 AI error").expect(1).create_async().await;

        let db = Arc::new(Database::open_in_memory().unwrap());
        let platform = Arc::new(PlatformClient::with_base_url(server.url(), "tok"));
        let completion = Arc::new(CompletionClient::with_base_url(server.url(), "key"));
        let dispatcher = Dispatcher::new(db, platform, Some(completion));

        dispatcher.handle_event(&message_event("u1", "/ai hi")).await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn default_reply_uses_nickname_when_set() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "(Alice) — You said: hi").expect(1).create_async().await;

        let (dispatcher, db) = dispatcher(&server);
        db.set_nickname("u1", "Alice").unwrap();
        dispatcher.handle_event(&message_event("u1", "hi")).await;

        send.assert_async().await;
    }

    #[tokio::test]
    async fn attachment_only_message_gets_default_reply() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        let send = mock_send(&mut server, "You said: ").expect(1).create_async().await;

        let (dispatcher, db) = dispatcher(&server);
        let event = MessagingEvent {
            sender: Sender {
                id: "u1".to_string(),
            },
            message: Some(InboundMessage {
                text: None,
                is_echo: false,
            }),
            postback: None,
        };
        dispatcher.handle_event(&event).await;

        send.assert_async().await;
        assert_eq!(db.get_xp("u1").unwrap(), 1);
    }

    #[tokio::test]
    async fn send_failure_keeps_store_state() {
        let mut server = mockito::Server::new_async().await;
        let _profile = mock_profile(&mut server, "u1", "Bob").create_async().await;
        server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let (dispatcher, db) = dispatcher(&server);
        dispatcher.handle_event(&message_event("u1", "hello")).await;

        // the increment committed even though the reply failed
        assert_eq!(db.get_xp("u1").unwrap(), 1);
    }

    #[tokio::test]
    async fn postback_is_acknowledged_without_reply() {
        let mut server = mockito::Server::new_async().await;
        let send = server
            .mock("POST", "/me/messages")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let (dispatcher, db) = dispatcher(&server);
        let event = MessagingEvent {
            sender: Sender {
                id: "u1".to_string(),
            },
            message: None,
            postback: Some(convo_types::webhook::Postback {
                payload: Some("GET_STARTED".to_string()),
                title: None,
            }),
        };
        dispatcher.handle_event(&event).await;

        send.assert_async().await;
        assert!(db.get_user("u1").unwrap().is_none());
    }
}

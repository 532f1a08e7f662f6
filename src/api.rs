//! the hosted generative api, as the chat core sees it.
//!
//! - `GenerativeApi`: create a session, stream a one-shot answer, stream a
//!   session turn. fragments arrive as a lazy, non-restartable stream.
//! - `LlmApi`: the `llm`-backed implementation (gemini by default).
//!
//! api docs for the underlying provider types: https://docs.rs/llm

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bevy::prelude::*;
use futures_lite::{stream, Stream, StreamExt};
use std::any::type_name_of_val;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use llm::chat::ImageMime;

use crate::compose::{InlineData, Part, RequestContent};
use crate::error::ChatError;
use crate::{
    ChatMessage, ChatProvider, ChatRole, LLMProvider, StreamChoice, StreamDelta, StreamResponse,
};

/// incremental text fragments; ends on completion, or right after an `Err`.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// handle to a conversation kept on the api side.
///
/// cloning shares the same turn log. turns are only ever appended, and only
/// once a reply has streamed to completion.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: u64,
    model_id: String,
    turns: Arc<Mutex<Vec<ChatMessage>>>,
}

impl SessionHandle {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            model_id: model_id.into(),
            turns: Arc::default(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// snapshot of the prior turns.
    pub fn turns(&self) -> Vec<ChatMessage> {
        self.turns.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn turn_count(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|m| matches!(m.role, ChatRole::Assistant))
            .count()
    }

    fn commit(&self, sent: Vec<ChatMessage>, reply: String) {
        let mut turns = self.turns.lock().unwrap_or_else(|p| p.into_inner());
        turns.extend(sent);
        turns.push(ChatMessage::assistant().content(reply).build());
    }
}

#[async_trait]
pub trait GenerativeApi: Send + Sync {
    fn create_session(&self, model_id: &str) -> SessionHandle;

    async fn generate_stream(
        &self,
        model_id: &str,
        content: RequestContent,
    ) -> Result<FragmentStream, ChatError>;

    async fn session_send_stream(
        &self,
        session: &SessionHandle,
        content: RequestContent,
    ) -> Result<FragmentStream, ChatError>;
}

/// `llm` providers keyed by model id, with a default for everything else.
#[derive(Clone)]
pub struct LlmApi {
    pub default: Arc<dyn LLMProvider>,
    pub per_model: HashMap<String, Arc<dyn LLMProvider>>,
}

impl LlmApi {
    pub fn new(default: Arc<dyn LLMProvider>) -> Self {
        Self { default, per_model: HashMap::new() }
    }

    pub fn with(mut self, model_id: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        self.per_model.insert(model_id.into(), provider);
        self
    }

    fn get(&self, model_id: &str) -> Arc<dyn LLMProvider> {
        self.per_model
            .get(model_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl GenerativeApi for LlmApi {
    fn create_session(&self, model_id: &str) -> SessionHandle {
        let session = SessionHandle::new(model_id);
        info!(target: "bevy_genai_chat", "session {} created (model={})", session.id(), model_id);
        session
    }

    async fn generate_stream(
        &self,
        model_id: &str,
        content: RequestContent,
    ) -> Result<FragmentStream, ChatError> {
        let messages = to_messages(&content)?;
        open_stream(self.get(model_id), messages).await
    }

    async fn session_send_stream(
        &self,
        session: &SessionHandle,
        content: RequestContent,
    ) -> Result<FragmentStream, ChatError> {
        let sent = to_messages(&content)?;
        let mut messages = session.turns();
        messages.extend(sent.iter().cloned());
        debug!(target: "bevy_genai_chat",
            "session {}: sending {} new message(s) on top of {} prior",
            session.id(), sent.len(), messages.len() - sent.len()
        );
        let inner = open_stream(self.get(session.model_id()), messages).await?;
        Ok(track_turn(inner, session.clone(), sent))
    }
}

/// map request parts onto user messages, file first.
pub fn to_messages(content: &RequestContent) -> Result<Vec<ChatMessage>, ChatError> {
    content
        .parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => Ok(ChatMessage::user().content(text.clone()).build()),
            Part::InlineData { inline_data } => inline_message(inline_data),
        })
        .collect()
}

fn inline_message(inline: &InlineData) -> Result<ChatMessage, ChatError> {
    let bytes = general_purpose::STANDARD
        .decode(&inline.data)
        .map_err(|e| ChatError::UnsupportedFile(format!("{}: {e}", inline.mime_type)))?;
    let user = ChatMessage::user();
    let msg = match inline.mime_type.as_str() {
        "image/png" => user.image(ImageMime::PNG, bytes),
        "image/jpeg" | "image/jpg" => user.image(ImageMime::JPEG, bytes),
        "image/gif" => user.image(ImageMime::GIF, bytes),
        "image/webp" => user.image(ImageMime::WEBP, bytes),
        "application/pdf" => user.pdf(bytes),
        m if m.starts_with("text/") || m == "application/json" || m == "application/xml" => {
            let text = String::from_utf8(bytes)
                .map_err(|_| ChatError::UnsupportedFile(format!("{m}: not valid utf-8")))?;
            user.content(text)
        }
        other => return Err(ChatError::UnsupportedFile(other.to_string())),
    };
    Ok(msg.build())
}

/// structured streaming first; providers that can't stream get a one-shot
/// `chat()` replayed as a single fragment.
async fn open_stream(
    provider: Arc<dyn LLMProvider>,
    messages: Vec<ChatMessage>,
) -> Result<FragmentStream, ChatError> {
    let pty = type_name_of_val(provider.as_ref());
    info!(target: "bevy_genai_chat", "open_stream: provider={} msgs={}", pty, messages.len());

    match provider.chat_stream_struct(&messages).await {
        Ok(s) => {
            let fragments = s
                .map(|item| match item {
                    Ok(StreamResponse { choices, .. }) => Ok(choices
                        .into_iter()
                        .filter_map(|StreamChoice { delta: StreamDelta { content, .. }, .. }| content)
                        .collect::<String>()),
                    Err(err) => Err(ChatError::Stream(err.to_string())),
                })
                .filter(|item| !matches!(item, Ok(text) if text.is_empty()));
            Ok(Box::pin(fragments))
        }
        Err(err) => {
            warn!(target: "bevy_genai_chat",
                "structured streaming failed for provider {}: {err}. falling back to one-shot chat()",
                pty
            );
            let resp = provider
                .chat(&messages)
                .await
                .map_err(|e| ChatError::Stream(e.to_string()))?;
            let text = resp.text().unwrap_or_default();
            let once: Vec<Result<String, ChatError>> =
                if text.is_empty() { Vec::new() } else { vec![Ok(text)] };
            Ok(Box::pin(stream::iter(once)))
        }
    }
}

/// pass fragments through; on clean completion append the turn to the session.
pub(crate) fn track_turn(
    inner: FragmentStream,
    session: SessionHandle,
    sent: Vec<ChatMessage>,
) -> FragmentStream {
    let seed = Some((inner, String::new(), session, sent));
    Box::pin(stream::unfold(seed, |state| async move {
        let (mut inner, mut reply, session, sent) = state?;
        match inner.next().await {
            Some(Ok(text)) => {
                reply.push_str(&text);
                Some((Ok(text), Some((inner, reply, session, sent))))
            }
            Some(Err(err)) => Some((Err(err), None)),
            None => {
                debug!(target: "bevy_genai_chat",
                    "session {}: turn committed (reply_len={})", session.id(), reply.len()
                );
                session.commit(sent, reply);
                None
            }
        }
    }))
}

//! bevy_genai_chat: a bevy chat front-end for hosted generative-ai apis.
//!
//! - single-shot (query -> streamed answer) and conversational (session) modes.
//! - one optional file attachment per send, with an lgpd anonymize directive.
//! - daily / weekly / monthly prompt usage meter.
//! - all state lives in one `Controller` resource, driven by `ChatAction`
//!   events; the ui only reads it back.
//! - never blocks the main thread: on native we spawn onto a tiny tokio
//!   runtime (no bevy pool blocking); on wasm we use bevy's async pool,
//!   which yields to the browser/event loop.
//!
//! provider types come from `llm` (re-exported below), gemini by default.

use bevy::prelude::*;
use bevy::tasks::AsyncComputeTaskPool;
use flume::{Receiver, Sender, TryRecvError};
use futures_lite::StreamExt;
use std::sync::Arc;

pub mod api;
pub mod capsule;
pub mod compose;
pub mod config;
pub mod controller;
pub mod error;
pub mod render;
pub mod usage;

pub use api::{FragmentStream, GenerativeApi, LlmApi, SessionHandle};
pub use capsule::{FileCapsule, FileSlot, FileSource};
pub use compose::{compose, Part, RequestContent};
pub use config::ChatConfig;
pub use controller::{Action, Controller, Controls, Phase, PendingRequest, RequestMode, ViewState};
pub use error::ChatError;
pub use render::{Entry, ResponseHandle, ResponseRenderer, Role};
pub use usage::{UsageDisplay, UsageMeter, Window};

/// re-export the llm types so downstream code can use the same structs/enums.
pub use llm::{
    builder::{LLMBackend, LLMBuilder},
    chat::{ChatMessage, ChatProvider, ChatRole, StreamChoice, StreamDelta, StreamResponse},
    error::LLMError,
    LLMProvider,
};

/// the generative api the plugin streams from.
#[derive(Resource, Clone)]
pub struct GenAi(pub Arc<dyn GenerativeApi>);

impl GenAi {
    pub fn new(api: impl GenerativeApi + 'static) -> Self {
        Self(Arc::new(api))
    }

    /// `llm` provider built from config, wrapped as a `GenerativeApi`.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatError> {
        Ok(Self::new(LlmApi::new(config.build_provider()?)))
    }
}

/// on native we keep a tiny tokio runtime to drive `llm` futures.
/// we spawn onto this rt from compute tasks so neither the main thread
/// nor bevy's compute pools block.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct TokioRt(pub Arc<tokio::runtime::Runtime>);

#[cfg(not(target_arch = "wasm32"))]
impl Default for TokioRt {
    fn default() -> Self {
        info!(target: "bevy_genai_chat", "GenaiChat: initializing Tokio multi-thread runtime (native)");
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .expect("tokio runtime");
        Self(Arc::new(rt))
    }
}

/// system ordering so uis can run after we emit events
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum ChatSet {
    /// `ChatAction`s are applied here
    Dispatch,
    /// stream fragments are applied and Chat* events emitted here
    Drain,
}

/// ui -> controller.
#[derive(Event, Debug, Clone)]
pub struct ChatAction(pub Action);

/// events emitted by the plugin during/after a request.
#[derive(Event, Debug)]
pub struct ChatStarted {
    pub target: ResponseHandle,
}
#[derive(Event, Debug)]
pub struct ChatDeltaEvt {
    pub target: ResponseHandle,
    pub text: String,
}
#[derive(Event, Debug)]
pub struct ChatCompletedEvt {
    pub target: ResponseHandle,
}
#[derive(Event, Debug)]
pub struct ChatErrorEvt {
    pub error: String,
}

/// cross-thread inbox for streaming; the stream task sends, main thread drains.
/// bounded to avoid unbounded growth when the frame stalls briefly.
#[derive(Resource, Clone)]
struct StreamInbox {
    tx: Sender<StreamMsg>,
    rx: Receiver<StreamMsg>,
}

impl Default for StreamInbox {
    fn default() -> Self {
        let (tx, rx) = flume::bounded(2048);
        Self { tx, rx }
    }
}

#[derive(Debug)]
pub enum StreamMsg {
    Begin { target: ResponseHandle },
    Delta { target: ResponseHandle, text: String },
    Done  { target: ResponseHandle },
    Err   { target: ResponseHandle, error: ChatError },
}

/// open the request and forward every fragment into the inbox.
pub async fn pump_request(
    api: Arc<dyn GenerativeApi>,
    pending: PendingRequest,
    tx: Sender<StreamMsg>,
) {
    let PendingRequest { target, request } = pending;
    let mut fragments = match request.open(api.as_ref()).await {
        Ok(s) => s,
        Err(error) => {
            error!(target: "bevy_genai_chat", "failed to open stream: {}", error);
            let _ = tx.send_async(StreamMsg::Err { target, error }).await;
            return;
        }
    };
    let _ = tx.send_async(StreamMsg::Begin { target }).await;
    let mut total = 0usize;
    while let Some(item) = fragments.next().await {
        match item {
            Ok(text) => {
                total += text.len();
                let _ = tx.send_async(StreamMsg::Delta { target, text }).await;
            }
            Err(error) => {
                error!(target: "bevy_genai_chat", "streaming error: {}", error);
                let _ = tx.send_async(StreamMsg::Err { target, error }).await;
                return;
            }
        }
    }
    debug!(target: "bevy_genai_chat", "stream drained: total_len={}", total);
    let _ = tx.send_async(StreamMsg::Done { target }).await;
}

/// bevy plugin: wires systems, events, resources.
///
/// uses `ChatConfig` and `GenAi` resources when present; otherwise builds
/// them from the environment on first use.
/// on native, also inserts a tiny tokio runtime resource by default.
pub struct GenaiChatPlugin;

impl Plugin for GenaiChatPlugin {
    fn build(&self, app: &mut App) {
        info!(target: "bevy_genai_chat", "GenaiChatPlugin: build()");
        if app.world().get_resource::<ChatConfig>().is_none() {
            app.insert_resource(ChatConfig::from_env());
        }
        let config = app.world().resource::<ChatConfig>().clone();
        if app.world().get_resource::<GenAi>().is_none() {
            match GenAi::from_config(&config) {
                Ok(api) => {
                    app.insert_resource(api);
                }
                Err(err) => {
                    error!(target: "bevy_genai_chat", "no generative api available: {}", err);
                }
            }
        }
        if app.world().get_resource::<Controller>().is_none() {
            app.insert_resource(Controller::new(&config));
        }

        app.init_resource::<StreamInbox>()
            .add_event::<ChatAction>()
            .add_event::<ChatStarted>()
            .add_event::<ChatDeltaEvt>()
            .add_event::<ChatCompletedEvt>()
            .add_event::<ChatErrorEvt>()
            // write + read events in the same schedule (Update)
            .configure_sets(Update, (ChatSet::Dispatch, ChatSet::Drain).chain())
            .add_systems(Update, dispatch_actions.in_set(ChatSet::Dispatch))
            .add_systems(Update, drain_stream_inbox.in_set(ChatSet::Drain));

        #[cfg(not(target_arch = "wasm32"))]
        if app.world().get_resource::<TokioRt>().is_none() {
            app.insert_resource(TokioRt::default());
        }
    }
}

/// applies ui actions; an accepted send is streamed off-thread.
fn dispatch_actions(
    mut actions: EventReader<ChatAction>,
    mut controller: ResMut<Controller>,
    api: Option<Res<GenAi>>,
    inbox: Res<StreamInbox>,
    mut ev_start: EventWriter<ChatStarted>,
    mut ev_err: EventWriter<ChatErrorEvt>,

    // native-only: small runtime to drive network futures from `llm`
    #[cfg(not(target_arch = "wasm32"))] rt: Res<TokioRt>,
) {
    for ChatAction(action) in actions.read() {
        // without an api only the local actions can land
        let outcome = match api.as_deref() {
            Some(GenAi(api)) => controller
                .dispatch(action.clone(), api.as_ref())
                .map(|p| p.map(|p| (p, api.clone()))),
            None => controller.apply_local(action.clone()).map(|()| None),
        };
        let (pending, api) = match outcome {
            Ok(Some(p)) => p,
            Ok(None) => continue,
            Err(err) if err.is_rejection() => {
                debug!(target: "bevy_genai_chat", "{} rejected: {}", action.kind(), err);
                continue;
            }
            Err(err) => {
                warn!(target: "bevy_genai_chat", "{} failed: {}", action.kind(), err);
                ev_err.write(ChatErrorEvt { error: err.to_string() });
                continue;
            }
        };

        let content = pending.request.content();
        info!(target: "bevy_genai_chat",
            "spawning request: target={:?} parts={} text_len={} file={}",
            pending.target, content.parts.len(), content.text_len(), content.has_file()
        );
        ev_start.write(ChatStarted { target: pending.target });

        let run = pump_request(api, pending, inbox.tx.clone());

        let pool = AsyncComputeTaskPool::get();
        #[cfg(not(target_arch = "wasm32"))]
        let rt = rt.0.clone();

        pool.spawn(async move {
            #[cfg(target_arch = "wasm32")]
            {
                // wasm path: just await directly (no tokio).
                run.await;
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                // native: hand off to tokio so bevy pools stay free.
                let _ = rt.spawn(run).await;
            }
        })
        .detach();
    }
}

/// drains the inbox into the controller and emits user-facing events.
fn drain_stream_inbox(
    inbox: Res<StreamInbox>,
    mut controller: ResMut<Controller>,
    mut ev_delta: EventWriter<ChatDeltaEvt>,
    mut ev_done: EventWriter<ChatCompletedEvt>,
    mut ev_err: EventWriter<ChatErrorEvt>,
) {
    // drain up to a cap per frame to avoid long frames on bursty streams
    const MAX_PER_FRAME: usize = 512;
    let mut drained = Vec::with_capacity(64);
    for _ in 0..MAX_PER_FRAME {
        match inbox.rx.try_recv() {
            Ok(m) => drained.push(m),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => break,
        }
    }
    if drained.is_empty() { return; }

    // coalesce consecutive deltas so the ui applies one push per frame
    let mut pending: Option<(ResponseHandle, String)> = None;
    for msg in drained {
        match msg {
            StreamMsg::Delta { target, text } => {
                if matches!(&pending, Some((t, _)) if *t == target) {
                    if let Some((_, buf)) = pending.as_mut() {
                        buf.push_str(&text);
                    }
                } else {
                    flush_delta(&mut pending, &mut controller, &mut ev_delta);
                    pending = Some((target, text));
                }
            }
            StreamMsg::Begin { target } => {
                flush_delta(&mut pending, &mut controller, &mut ev_delta);
                controller.stream_opened(target);
            }
            // ensure deltas land before "done" for the same frame
            StreamMsg::Done { target } => {
                flush_delta(&mut pending, &mut controller, &mut ev_delta);
                let live = controller.in_flight() == Some(target);
                if controller.finish(target, Ok(())).is_ok() && live {
                    ev_done.write(ChatCompletedEvt { target });
                }
            }
            StreamMsg::Err { target, error } => {
                flush_delta(&mut pending, &mut controller, &mut ev_delta);
                let live = controller.in_flight() == Some(target);
                let message = error.to_string();
                let _ = controller.finish(target, Err(error));
                if live {
                    ev_err.write(ChatErrorEvt { error: message });
                }
            }
        }
    }
    flush_delta(&mut pending, &mut controller, &mut ev_delta);
}

fn flush_delta(
    pending: &mut Option<(ResponseHandle, String)>,
    controller: &mut Controller,
    ev_delta: &mut EventWriter<ChatDeltaEvt>,
) {
    if let Some((target, text)) = pending.take() {
        controller.append_fragment(target, &text);
        ev_delta.write(ChatDeltaEvt { target, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Script, ScriptedApi};
    use bevy::app::AppExit;

    fn test_app(api: ScriptedApi) -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_event::<AppExit>();
        app.insert_resource(ChatConfig::default());
        app.insert_resource(GenAi::new(api));
        app.add_plugins(GenaiChatPlugin);
        app
    }

    fn act(app: &mut App, action: Action) {
        app.world_mut().send_event(ChatAction(action));
    }

    #[test]
    fn send_action_enters_sending_and_counts() {
        let mut app = test_app(ScriptedApi::new([Script::Fragments(vec!["4"])]));
        act(&mut app, Action::SetPrompt("What is 2+2?".into()));
        act(&mut app, Action::Send);
        app.update();

        let ctl = app.world().resource::<Controller>();
        assert_eq!(ctl.usage().window(Window::Daily).consumed, 1);
        let mut ev = app.world_mut().resource_mut::<Events<ChatStarted>>();
        let started: Vec<_> = ev.drain().collect();
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].target, ResponseHandle::Surface);
    }

    #[test]
    fn empty_send_emits_nothing() {
        let mut app = test_app(ScriptedApi::default());
        act(&mut app, Action::Send);
        app.update();

        let ctl = app.world().resource::<Controller>();
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(ctl.usage().window(Window::Daily).consumed, 0);
        let mut ev = app.world_mut().resource_mut::<Events<ChatStarted>>();
        assert_eq!(ev.drain().count(), 0);
    }

    #[test]
    fn drain_stream_applies_fragments_and_finishes() {
        let mut app = test_app(ScriptedApi::default());

        // put the controller in flight without spawning a stream task
        let target = {
            let api = ScriptedApi::default();
            let mut ctl = app.world_mut().resource_mut::<Controller>();
            ctl.dispatch(Action::SetPrompt("hi".into()), &api).unwrap();
            ctl.dispatch(Action::Send, &api).unwrap().unwrap().target
        };

        {
            let tx = app.world().resource::<StreamInbox>().tx.clone();
            tx.send(StreamMsg::Begin { target }).unwrap();
            tx.send(StreamMsg::Delta { target, text: "hel".into() }).unwrap();
            tx.send(StreamMsg::Delta { target, text: "lo".into() }).unwrap();
            tx.send(StreamMsg::Done { target }).unwrap();
        }
        app.update();

        let ctl = app.world().resource::<Controller>();
        assert_eq!(ctl.renderer().surface(), "hello");
        assert_eq!(ctl.phase(), Phase::Idle);
        {
            let mut ev = app.world_mut().resource_mut::<Events<ChatDeltaEvt>>();
            let deltas: Vec<_> = ev.drain().collect();
            assert_eq!(deltas.len(), 1, "consecutive deltas are coalesced");
            assert_eq!(deltas[0].text, "hello");
        }
        {
            let mut ev = app.world_mut().resource_mut::<Events<ChatCompletedEvt>>();
            assert_eq!(ev.drain().count(), 1);
        }
    }

    #[test]
    fn drain_stream_error_replaces_partial_output() {
        let mut app = test_app(ScriptedApi::default());
        let target = {
            let api = ScriptedApi::default();
            let mut ctl = app.world_mut().resource_mut::<Controller>();
            ctl.dispatch(Action::SetPrompt("hi".into()), &api).unwrap();
            ctl.dispatch(Action::Send, &api).unwrap().unwrap().target
        };
        {
            let tx = app.world().resource::<StreamInbox>().tx.clone();
            tx.send(StreamMsg::Delta { target, text: "partial".into() }).unwrap();
            tx.send(StreamMsg::Err { target, error: ChatError::Stream("reset".into()) }).unwrap();
        }
        app.update();

        let ctl = app.world().resource::<Controller>();
        assert_eq!(ctl.renderer().surface(), controller::SINGLE_SHOT_FAILURE);
        assert!(!ctl.is_busy());
        let mut ev = app.world_mut().resource_mut::<Events<ChatErrorEvt>>();
        assert_eq!(ev.drain().count(), 1);
    }

    #[test]
    fn local_actions_land_without_an_api() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_event::<AppExit>();
        app.insert_resource(ChatConfig { backend: "carrier-pigeon".into(), ..Default::default() });
        app.add_plugins(GenaiChatPlugin);
        assert!(app.world().get_resource::<GenAi>().is_none());

        act(&mut app, Action::ToggleSidebar);
        act(&mut app, Action::SetPrompt("hello".into()));
        act(&mut app, Action::OpenAbout);
        act(&mut app, Action::Send);
        act(&mut app, Action::ToggleMode);
        app.update();

        let ctl = app.world().resource::<Controller>();
        assert!(ctl.view().sidebar_collapsed);
        assert!(ctl.view().about_open);
        assert_eq!(ctl.prompt(), "hello");
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(ctl.mode(), RequestMode::SingleShot);
        assert_eq!(ctl.usage().window(Window::Daily).consumed, 0);
        let mut ev = app.world_mut().resource_mut::<Events<ChatErrorEvt>>();
        assert_eq!(ev.drain().count(), 2);
    }

    #[test]
    fn stale_stream_endings_emit_nothing() {
        let mut app = test_app(ScriptedApi::default());
        {
            let tx = app.world().resource::<StreamInbox>().tx.clone();
            tx.send(StreamMsg::Done { target: ResponseHandle::Surface }).unwrap();
            tx.send(StreamMsg::Err {
                target: ResponseHandle::Entry(3),
                error: ChatError::Stream("late".into()),
            })
            .unwrap();
        }
        app.update();

        assert_eq!(app.world().resource::<Controller>().renderer().surface(), "");
        assert_eq!(app.world_mut().resource_mut::<Events<ChatCompletedEvt>>().drain().count(), 0);
        assert_eq!(app.world_mut().resource_mut::<Events<ChatErrorEvt>>().drain().count(), 0);
    }

    #[test]
    fn streamed_request_round_trips_through_the_runtime() {
        let mut app = test_app(ScriptedApi::new([Script::Fragments(vec!["Hel", "lo"])]));
        act(&mut app, Action::ToggleMode);
        act(&mut app, Action::SetPrompt("Hi".into()));
        act(&mut app, Action::Send);

        for _ in 0..400 {
            app.update();
            if !app.world().resource::<Controller>().is_busy() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let ctl = app.world().resource::<Controller>();
        assert!(!ctl.is_busy());
        let t = ctl.renderer().transcript();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].text, "Hi");
        assert_eq!(t[1].text, "Hello");
    }
}

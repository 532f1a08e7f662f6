//! mode / session controller: the single owner of chat front-end state.
//!
//! states are `{Idle, Sending} x {SingleShot, Conversational}`. every ui
//! interaction arrives as an `Action` and goes through `Controller::dispatch`;
//! the stream outcome comes back through `stream_opened`, `append_fragment`
//! and `finish`. only one request is ever in flight.

use bevy::prelude::*;
use futures_lite::StreamExt;

use crate::api::{FragmentStream, GenerativeApi, SessionHandle};
use crate::capsule::{FileSlot, FileSource};
use crate::compose::{compose, RequestContent, ANONYMIZING_NOTICE};
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::render::{ResponseHandle, ResponseRenderer, Role};
use crate::usage::UsageMeter;

pub const SINGLE_SHOT_FAILURE: &str =
    "Error: Failed to get a response. Please check the console for more details.";
pub const CONVERSATION_FAILURE: &str =
    "Error: Failed to get a response. Please check the console.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestMode {
    #[default]
    SingleShot,
    Conversational,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Sending,
}

/// mode with its session: a session exists iff we are conversational.
#[derive(Clone, Debug, Default)]
enum ModeState {
    #[default]
    SingleShot,
    Conversational(SessionHandle),
}

impl ModeState {
    fn kind(&self) -> RequestMode {
        match self {
            ModeState::SingleShot => RequestMode::SingleShot,
            ModeState::Conversational(_) => RequestMode::Conversational,
        }
    }
}

/// everything the ui can ask for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    SetPrompt(String),
    AttachFile(FileSource),
    RemoveFile,
    SetAnonymize(bool),
    ToggleMode,
    Send,
    UseRecommendedPrompt(usize),
    ToggleSidebar,
    OpenAbout,
    CloseAbout,
}

impl Action {
    /// short name for logs; never includes prompt text or file bytes.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::SetPrompt(_) => "set_prompt",
            Action::AttachFile(_) => "attach_file",
            Action::RemoveFile => "remove_file",
            Action::SetAnonymize(_) => "set_anonymize",
            Action::ToggleMode => "toggle_mode",
            Action::Send => "send",
            Action::UseRecommendedPrompt(_) => "use_recommended_prompt",
            Action::ToggleSidebar => "toggle_sidebar",
            Action::OpenAbout => "open_about",
            Action::CloseAbout => "close_about",
        }
    }
}

/// which inputs are live right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub send: bool,
    pub prompt: bool,
    pub attach: bool,
    pub anonymize: bool,
    pub mode_toggle: bool,
    pub loader_visible: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewState {
    pub sidebar_collapsed: bool,
    pub about_open: bool,
}

/// the network half of an accepted send.
#[derive(Clone, Debug)]
pub enum OutboundRequest {
    Generate { model_id: String, content: RequestContent },
    Session { session: SessionHandle, content: RequestContent },
}

impl OutboundRequest {
    pub fn content(&self) -> &RequestContent {
        match self {
            OutboundRequest::Generate { content, .. } | OutboundRequest::Session { content, .. } => {
                content
            }
        }
    }

    pub async fn open(self, api: &dyn GenerativeApi) -> Result<FragmentStream, ChatError> {
        match self {
            OutboundRequest::Generate { model_id, content } => {
                api.generate_stream(&model_id, content).await
            }
            OutboundRequest::Session { session, content } => {
                api.session_send_stream(&session, content).await
            }
        }
    }
}

/// an accepted send: where to render, and what to ask.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub target: ResponseHandle,
    pub request: OutboundRequest,
}

#[derive(Resource, Debug)]
pub struct Controller {
    model_id: String,
    mode: ModeState,
    phase: Phase,
    prompt: String,
    file: FileSlot,
    anonymize: bool,
    usage: UsageMeter,
    renderer: ResponseRenderer,
    view: ViewState,
    recommended: Vec<String>,
    in_flight: Option<ResponseHandle>,
    notice_shown: bool,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(&ChatConfig::default())
    }
}

impl Controller {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            model_id: config.model.clone(),
            mode: ModeState::SingleShot,
            phase: Phase::Idle,
            prompt: String::new(),
            file: FileSlot::default(),
            anonymize: false,
            usage: UsageMeter::new(config.usage_limits),
            renderer: ResponseRenderer::default(),
            view: ViewState::default(),
            recommended: config.recommended_prompts.clone(),
            in_flight: None,
            notice_shown: false,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn mode(&self) -> RequestMode {
        self.mode.kind()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Sending
    }

    pub fn session(&self) -> Option<&SessionHandle> {
        match &self.mode {
            ModeState::Conversational(s) => Some(s),
            ModeState::SingleShot => None,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn file(&self) -> &FileSlot {
        &self.file
    }

    pub fn anonymize(&self) -> bool {
        self.anonymize
    }

    pub fn usage(&self) -> &UsageMeter {
        &self.usage
    }

    pub fn renderer(&self) -> &ResponseRenderer {
        &self.renderer
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn recommended_prompts(&self) -> &[String] {
        &self.recommended
    }

    pub fn in_flight(&self) -> Option<ResponseHandle> {
        self.in_flight
    }

    pub fn controls(&self) -> Controls {
        let idle = self.phase == Phase::Idle;
        Controls {
            send: idle,
            prompt: idle,
            attach: idle,
            anonymize: idle && self.mode() == RequestMode::SingleShot,
            mode_toggle: idle,
            loader_visible: !idle,
        }
    }

    /// `Action -> handler`. `Send` hands back the request to stream.
    pub fn dispatch(
        &mut self,
        action: Action,
        api: &dyn GenerativeApi,
    ) -> Result<Option<PendingRequest>, ChatError> {
        debug!(target: "bevy_genai_chat", "dispatch: {} (phase={:?})", action.kind(), self.phase);
        match action {
            Action::ToggleMode => {
                self.toggle_mode(api)?;
                Ok(None)
            }
            Action::Send => self.begin_send().map(Some),
            local => self.apply_local(local).map(|()| None),
        }
    }

    /// every action that never reaches the api. `Send` and `ToggleMode`
    /// fail with `Config` here.
    pub fn apply_local(&mut self, action: Action) -> Result<(), ChatError> {
        let controls = self.controls();
        match action {
            Action::SetPrompt(text) => {
                self.gate(controls.prompt)?;
                self.prompt = text;
            }
            Action::AttachFile(source) => {
                self.gate(controls.attach)?;
                self.file.select(source);
            }
            Action::RemoveFile => {
                self.gate(controls.attach)?;
                self.file.clear();
            }
            Action::SetAnonymize(on) => {
                self.gate(!self.is_busy())?;
                if controls.anonymize {
                    self.anonymize = on;
                }
            }
            Action::UseRecommendedPrompt(i) => {
                self.gate(controls.prompt)?;
                if let Some(p) = self.recommended.get(i) {
                    self.prompt = p.clone();
                }
            }
            Action::ToggleSidebar => self.view.sidebar_collapsed = !self.view.sidebar_collapsed,
            Action::OpenAbout => self.view.about_open = true,
            Action::CloseAbout => self.view.about_open = false,
            Action::ToggleMode | Action::Send => {
                return Err(ChatError::Config(format!(
                    "{}: no generative api configured",
                    action.kind()
                )));
            }
        }
        Ok(())
    }

    fn gate(&self, enabled: bool) -> Result<(), ChatError> {
        if enabled { Ok(()) } else { Err(ChatError::Busy) }
    }

    /// flip between single-shot and conversational. idle only.
    pub fn toggle_mode(&mut self, api: &dyn GenerativeApi) -> Result<RequestMode, ChatError> {
        if self.is_busy() {
            warn!(target: "bevy_genai_chat", "toggle_mode ignored: request in flight");
            return Err(ChatError::Busy);
        }
        self.renderer.clear();
        self.mode = match std::mem::take(&mut self.mode) {
            ModeState::SingleShot => {
                self.anonymize = false;
                ModeState::Conversational(api.create_session(&self.model_id))
            }
            ModeState::Conversational(session) => {
                info!(target: "bevy_genai_chat", "discarding session {}", session.id());
                ModeState::SingleShot
            }
        };
        info!(target: "bevy_genai_chat", "mode -> {:?}", self.mode());
        Ok(self.mode())
    }

    /// validate, count, compose and prepare the render target.
    ///
    /// `EmptyInput` / `Busy` change nothing. any later error has already been
    /// rendered and the controller is back to idle when it is returned.
    pub fn begin_send(&mut self) -> Result<PendingRequest, ChatError> {
        if self.is_busy() {
            return Err(ChatError::Busy);
        }
        let prompt = self.prompt.trim().to_string();
        if prompt.is_empty() && self.file.is_empty() {
            debug!(target: "bevy_genai_chat", "send rejected: empty input");
            return Err(ChatError::EmptyInput);
        }

        self.phase = Phase::Sending;
        self.usage.record_use();
        info!(target: "bevy_genai_chat",
            "send accepted: mode={:?} prompt_len={} file={}",
            self.mode(), prompt.len(), self.file.name().unwrap_or_default()
        );

        match self.mode.clone() {
            ModeState::SingleShot => self.begin_single(prompt),
            ModeState::Conversational(session) => self.begin_conversation(prompt, session),
        }
    }

    fn begin_single(&mut self, prompt: String) -> Result<PendingRequest, ChatError> {
        let target = self.renderer.begin_target(RequestMode::SingleShot, &prompt);
        self.in_flight = Some(target);

        let anonymize = self.anonymize && !self.file.is_empty();
        let content = match self.file.capture().and_then(|c| compose(&prompt, c.as_ref(), anonymize)) {
            Ok(content) => content,
            Err(err) => return Err(self.abort(err)),
        };
        if anonymize {
            self.renderer.replace(target, ANONYMIZING_NOTICE);
            self.notice_shown = true;
        }

        Ok(PendingRequest {
            target,
            request: OutboundRequest::Generate { model_id: self.model_id.clone(), content },
        })
    }

    fn begin_conversation(
        &mut self,
        prompt: String,
        session: SessionHandle,
    ) -> Result<PendingRequest, ChatError> {
        let content = match self.file.capture().and_then(|c| compose(&prompt, c.as_ref(), false)) {
            Ok(content) => content,
            Err(err) => return Err(self.abort(err)),
        };

        // optimistic echo; the input is free again right away
        let target = self.renderer.begin_target(RequestMode::Conversational, &prompt);
        self.in_flight = Some(target);
        self.prompt.clear();
        self.file.clear();

        Ok(PendingRequest { target, request: OutboundRequest::Session { session, content } })
    }

    /// the stream is open: drop the anonymize notice before any text lands.
    pub fn stream_opened(&mut self, target: ResponseHandle) {
        if self.in_flight == Some(target) && self.notice_shown {
            self.renderer.replace(target, "");
            self.notice_shown = false;
        }
    }

    pub fn append_fragment(&mut self, target: ResponseHandle, text: &str) {
        if self.in_flight != Some(target) {
            warn!(target: "bevy_genai_chat", "dropping fragment for stale target {:?}", target);
            return;
        }
        self.stream_opened(target);
        self.renderer.append_fragment(target, text);
    }

    /// end of stream, clean or not. always lands in `Idle`.
    pub fn finish(
        &mut self,
        target: ResponseHandle,
        outcome: Result<(), ChatError>,
    ) -> Result<(), ChatError> {
        if self.in_flight != Some(target) {
            warn!(target: "bevy_genai_chat", "finish for stale target {:?} ignored", target);
            return outcome;
        }
        match outcome {
            Ok(()) => {
                info!(target: "bevy_genai_chat",
                    "stream completed: final_len={}",
                    self.renderer.text(target).map(str::len).unwrap_or(0)
                );
                self.settle();
                Ok(())
            }
            Err(err) => Err(self.abort(err)),
        }
    }

    /// begin, stream and finish in one cooperative flow.
    pub async fn submit(&mut self, api: &dyn GenerativeApi) -> Result<(), ChatError> {
        let PendingRequest { target, request } = self.begin_send()?;
        let outcome = match request.open(api).await {
            Ok(mut fragments) => {
                self.stream_opened(target);
                let mut outcome = Ok(());
                while let Some(item) = fragments.next().await {
                    match item {
                        Ok(text) => self.append_fragment(target, &text),
                        Err(err) => {
                            outcome = Err(err);
                            break;
                        }
                    }
                }
                outcome
            }
            Err(err) => Err(err),
        };
        self.finish(target, outcome)
    }

    fn abort(&mut self, err: ChatError) -> ChatError {
        error!(target: "bevy_genai_chat", "request failed: {err}");
        match self.mode() {
            RequestMode::SingleShot => {
                self.renderer.replace(ResponseHandle::Surface, SINGLE_SHOT_FAILURE);
            }
            RequestMode::Conversational => {
                self.renderer.push_entry(Role::Model, CONVERSATION_FAILURE);
            }
        }
        self.settle();
        err
    }

    fn settle(&mut self) {
        if self.mode() == RequestMode::SingleShot {
            self.prompt.clear();
            self.file.clear();
        }
        self.in_flight = None;
        self.notice_shown = false;
        self.phase = Phase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{Script, ScriptedApi};
    use crate::compose::Part;
    use crate::render::Entry;
    use crate::usage::Window;
    use pretty_assertions::assert_eq;

    fn send(ctl: &mut Controller, api: &ScriptedApi, prompt: &str) -> Result<(), ChatError> {
        ctl.dispatch(Action::SetPrompt(prompt.into()), api).unwrap();
        pollster::block_on(ctl.submit(api))
    }

    fn daily(ctl: &Controller) -> u32 {
        ctl.usage().window(Window::Daily).consumed
    }

    fn pdf() -> FileSource {
        FileSource::bytes("laudo.pdf", Some("application/pdf".into()), b"%PDF-1.4".to_vec())
    }

    #[test]
    fn empty_send_is_a_silent_no_op() {
        let api = ScriptedApi::default();
        let mut ctl = Controller::default();
        for prompt in ["", "   ", "\n\t"] {
            ctl.dispatch(Action::SetPrompt(prompt.into()), &api).unwrap();
            let err = ctl.dispatch(Action::Send, &api).unwrap_err();
            assert!(matches!(err, ChatError::EmptyInput));
        }
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(daily(&ctl), 0);
        assert!(api.requests.lock().unwrap().is_empty());
        assert_eq!(ctl.renderer().surface(), "");
    }

    #[test]
    fn single_shot_end_to_end() {
        let api = ScriptedApi::new([Script::Fragments(vec!["4"])]);
        let mut ctl = Controller::default();

        send(&mut ctl, &api, "What is 2+2?").unwrap();

        assert_eq!(api.last_request().unwrap().parts, vec![Part::text("What is 2+2?")]);
        assert_eq!(ctl.renderer().surface(), "4");
        assert_eq!(daily(&ctl), 1);
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(ctl.prompt(), "");
    }

    #[test]
    fn every_accepted_send_counts_once_per_window() {
        let api = ScriptedApi::new([
            Script::Fragments(vec!["a"]),
            Script::FailOpen,
            Script::Fragments(vec!["b"]),
        ]);
        let mut ctl = Controller::default();
        send(&mut ctl, &api, "one").unwrap();
        assert!(send(&mut ctl, &api, "two").is_err());
        ctl.dispatch(Action::ToggleMode, &api).unwrap();
        send(&mut ctl, &api, "three").unwrap();

        for w in Window::ALL {
            assert_eq!(ctl.usage().window(w).consumed, 3);
        }
    }

    #[test]
    fn anonymized_single_shot_sends_file_then_directive() {
        let api = ScriptedApi::new([Script::Fragments(vec!["[NOME] ", "ok"])]);
        let mut ctl = Controller::default();
        ctl.dispatch(Action::AttachFile(pdf()), &api).unwrap();
        ctl.dispatch(Action::SetAnonymize(true), &api).unwrap();

        send(&mut ctl, &api, "Summarize").unwrap();

        let parts = api.last_request().unwrap().parts;
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], Part::InlineData { inline_data } if inline_data.mime_type == "application/pdf"));
        let text = parts[1].as_text().unwrap();
        assert!(text.contains("Summarize"));
        assert_ne!(text, "Summarize");

        // notice is gone, only the answer remains; file slot emptied
        assert_eq!(ctl.renderer().surface(), "[NOME] ok");
        assert!(ctl.file().is_empty());
        for w in Window::ALL {
            assert_eq!(ctl.usage().window(w).consumed, 1);
        }
    }

    #[test]
    fn local_actions_apply_without_an_api() {
        let mut ctl = Controller::default();
        ctl.apply_local(Action::SetPrompt("hello".into())).unwrap();
        ctl.apply_local(Action::ToggleSidebar).unwrap();
        ctl.apply_local(Action::OpenAbout).unwrap();
        ctl.apply_local(Action::AttachFile(pdf())).unwrap();
        assert_eq!(ctl.prompt(), "hello");
        assert!(ctl.view().sidebar_collapsed && ctl.view().about_open);
        assert!(!ctl.file().is_empty());

        for action in [Action::Send, Action::ToggleMode] {
            assert!(matches!(ctl.apply_local(action), Err(ChatError::Config(_))));
        }
        assert_eq!(ctl.phase(), Phase::Idle);
        assert_eq!(ctl.mode(), RequestMode::SingleShot);
        assert_eq!(ctl.usage().window(Window::Daily).consumed, 0);
    }

    #[test]
    fn anonymize_notice_shows_until_stream_opens() {
        let api = ScriptedApi::default();
        let mut ctl = Controller::default();
        ctl.dispatch(Action::AttachFile(pdf()), &api).unwrap();
        ctl.dispatch(Action::SetAnonymize(true), &api).unwrap();

        let pending = ctl.dispatch(Action::Send, &api).unwrap().unwrap();
        assert_eq!(ctl.renderer().surface(), ANONYMIZING_NOTICE);
        ctl.stream_opened(pending.target);
        assert_eq!(ctl.renderer().surface(), "");
        ctl.finish(pending.target, Ok(())).unwrap();
    }

    #[test]
    fn single_shot_failure_mid_stream_shows_only_error() {
        let api = ScriptedApi::new([Script::FailAfter(vec!["The ans", "wer is"])]);
        let mut ctl = Controller::default();
        ctl.dispatch(Action::AttachFile(pdf()), &api).unwrap();

        let err = send(&mut ctl, &api, "explain").unwrap_err();
        assert!(matches!(err, ChatError::Stream(_)));
        assert_eq!(ctl.renderer().surface(), SINGLE_SHOT_FAILURE);
        assert_eq!(ctl.phase(), Phase::Idle);
        assert!(ctl.controls().send);
        // input and file are cleared on failure too
        assert_eq!(ctl.prompt(), "");
        assert!(ctl.file().is_empty());
    }

    #[test]
    fn unreadable_file_counts_and_fails_generically() {
        let dir = tempfile::tempdir().unwrap();
        let api = ScriptedApi::default();
        let mut ctl = Controller::default();
        ctl.dispatch(Action::AttachFile(FileSource::path(dir.path().join("gone.pdf"))), &api)
            .unwrap();

        let err = ctl.dispatch(Action::Send, &api).unwrap_err();
        assert!(matches!(err, ChatError::Io(_)));
        assert_eq!(daily(&ctl), 1);
        assert_eq!(ctl.renderer().surface(), SINGLE_SHOT_FAILURE);
        assert_eq!(ctl.phase(), Phase::Idle);
        assert!(api.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn conversation_keeps_ordered_transcript() {
        let api = ScriptedApi::new([
            Script::Fragments(vec!["Hel", "lo!"]),
            Script::Fragments(vec!["Fine, ", "thanks."]),
        ]);
        let mut ctl = Controller::default();
        ctl.dispatch(Action::ToggleMode, &api).unwrap();

        send(&mut ctl, &api, "Hi").unwrap();
        send(&mut ctl, &api, "How are you?").unwrap();

        assert_eq!(
            ctl.renderer().transcript(),
            &[
                Entry { role: Role::User, text: "Hi".into() },
                Entry { role: Role::Model, text: "Hello!".into() },
                Entry { role: Role::User, text: "How are you?".into() },
                Entry { role: Role::Model, text: "Fine, thanks.".into() },
            ]
        );
        assert_eq!(ctl.session().unwrap().turn_count(), 2);
    }

    #[test]
    fn conversation_clears_input_at_echo_and_appends_error() {
        let api = ScriptedApi::new([Script::FailAfter(vec!["par"])]);
        let mut ctl = Controller::default();
        ctl.dispatch(Action::ToggleMode, &api).unwrap();
        ctl.dispatch(Action::SetPrompt("Hi".into()), &api).unwrap();

        let pending = ctl.dispatch(Action::Send, &api).unwrap().unwrap();
        assert_eq!(ctl.prompt(), "");
        assert_eq!(ctl.renderer().transcript().len(), 2);
        assert!(ctl.is_busy());

        ctl.append_fragment(pending.target, "par");
        ctl.finish(pending.target, Err(ChatError::Stream("reset".into()))).unwrap_err();

        let t = ctl.renderer().transcript();
        assert_eq!(t.len(), 3);
        assert_eq!(t[1].text, "par");
        assert_eq!(t[2], Entry { role: Role::Model, text: CONVERSATION_FAILURE.into() });
        assert_eq!(ctl.phase(), Phase::Idle);
    }

    #[test]
    fn conversational_mode_ignores_anonymize() {
        let api = ScriptedApi::new([Script::Fragments(vec!["ok"])]);
        let mut ctl = Controller::default();
        ctl.dispatch(Action::SetAnonymize(true), &api).unwrap();
        ctl.dispatch(Action::ToggleMode, &api).unwrap();
        assert!(!ctl.anonymize());
        assert!(!ctl.controls().anonymize);

        ctl.dispatch(Action::SetAnonymize(true), &api).unwrap();
        assert!(!ctl.anonymize());

        ctl.dispatch(Action::AttachFile(pdf()), &api).unwrap();
        send(&mut ctl, &api, "Summarize").unwrap();
        let parts = api.last_request().unwrap().parts;
        assert_eq!(parts[1], Part::text("Summarize"));
    }

    #[test]
    fn busy_blocks_sends_toggles_and_inputs() {
        let api = ScriptedApi::default();
        let mut ctl = Controller::default();
        ctl.dispatch(Action::SetPrompt("first".into()), &api).unwrap();
        let pending = ctl.dispatch(Action::Send, &api).unwrap().unwrap();

        let c = ctl.controls();
        assert!(!c.send && !c.prompt && !c.attach && !c.anonymize && !c.mode_toggle);
        assert!(c.loader_visible);

        assert!(matches!(ctl.dispatch(Action::Send, &api), Err(ChatError::Busy)));
        assert!(matches!(ctl.dispatch(Action::ToggleMode, &api), Err(ChatError::Busy)));
        assert!(matches!(ctl.dispatch(Action::RemoveFile, &api), Err(ChatError::Busy)));
        assert!(matches!(ctl.dispatch(Action::SetAnonymize(true), &api), Err(ChatError::Busy)));
        assert!(!ctl.anonymize());
        assert_eq!(ctl.mode(), RequestMode::SingleShot);
        assert_eq!(daily(&ctl), 1);
        assert_eq!(api.sessions(), 0);

        // layout actions stay live
        ctl.dispatch(Action::ToggleSidebar, &api).unwrap();
        assert!(ctl.view().sidebar_collapsed);

        ctl.finish(pending.target, Ok(())).unwrap();
        assert!(ctl.controls().send);
    }

    #[test]
    fn toggling_twice_restores_mode_with_fresh_session() {
        let api = ScriptedApi::new([Script::Fragments(vec!["yo"])]);
        let mut ctl = Controller::default();

        assert_eq!(ctl.toggle_mode(&api).unwrap(), RequestMode::Conversational);
        let first = ctl.session().unwrap().id();
        send(&mut ctl, &api, "Hi").unwrap();

        assert_eq!(ctl.toggle_mode(&api).unwrap(), RequestMode::SingleShot);
        assert!(ctl.session().is_none());
        assert!(ctl.renderer().transcript().is_empty());
        assert!(ctl.controls().anonymize);

        ctl.toggle_mode(&api).unwrap();
        assert_ne!(ctl.session().unwrap().id(), first);
        assert_eq!(ctl.session().unwrap().turn_count(), 0);
        assert!(ctl.renderer().transcript().is_empty());
        assert_eq!(api.sessions(), 2);
    }

    #[test]
    fn recommended_prompt_fills_input() {
        let api = ScriptedApi::default();
        let config = ChatConfig {
            recommended_prompts: vec!["Resuma o documento".into()],
            ..Default::default()
        };
        let mut ctl = Controller::new(&config);
        ctl.dispatch(Action::UseRecommendedPrompt(0), &api).unwrap();
        assert_eq!(ctl.prompt(), "Resuma o documento");
        ctl.dispatch(Action::UseRecommendedPrompt(9), &api).unwrap();
        assert_eq!(ctl.prompt(), "Resuma o documento");
    }

    #[test]
    fn about_modal_open_close() {
        let api = ScriptedApi::default();
        let mut ctl = Controller::default();
        ctl.dispatch(Action::CloseAbout, &api).unwrap();
        assert!(!ctl.view().about_open);
        ctl.dispatch(Action::OpenAbout, &api).unwrap();
        assert!(ctl.view().about_open);
        ctl.dispatch(Action::CloseAbout, &api).unwrap();
        assert!(!ctl.view().about_open);
    }
}

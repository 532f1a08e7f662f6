//! streaming response renderer.
//!
//! single-shot output goes to one shared surface that is wiped per request;
//! conversational output grows a transcript of user / model entries.

use crate::controller::RequestMode;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub role: Role,
    pub text: String,
}

/// where the fragments of the in-flight request land.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseHandle {
    Surface,
    Entry(usize),
}

#[derive(Clone, Debug, Default)]
pub struct ResponseRenderer {
    surface: String,
    transcript: Vec<Entry>,
    scroll_generation: u64,
}

impl ResponseRenderer {
    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn transcript(&self) -> &[Entry] {
        &self.transcript
    }

    /// bumps whenever new content should be scrolled into view.
    pub fn scroll_generation(&self) -> u64 {
        self.scroll_generation
    }

    pub fn clear(&mut self) {
        self.surface.clear();
        self.transcript.clear();
    }

    pub fn push_entry(&mut self, role: Role, text: impl Into<String>) -> ResponseHandle {
        self.transcript.push(Entry { role, text: text.into() });
        self.scroll_generation += 1;
        ResponseHandle::Entry(self.transcript.len() - 1)
    }

    /// single-shot: clear and reuse the surface.
    /// conversational: echo the user turn, then an empty model placeholder.
    pub fn begin_target(&mut self, mode: RequestMode, echo: &str) -> ResponseHandle {
        match mode {
            RequestMode::SingleShot => {
                self.surface.clear();
                ResponseHandle::Surface
            }
            RequestMode::Conversational => {
                self.push_entry(Role::User, echo);
                self.push_entry(Role::Model, "")
            }
        }
    }

    pub fn append_fragment(&mut self, handle: ResponseHandle, text: &str) {
        if let Some(buf) = self.slot_mut(handle) {
            buf.push_str(text);
            self.scroll_generation += 1;
        }
    }

    pub fn replace(&mut self, handle: ResponseHandle, text: &str) {
        if let Some(buf) = self.slot_mut(handle) {
            buf.clear();
            buf.push_str(text);
            self.scroll_generation += 1;
        }
    }

    pub fn text(&self, handle: ResponseHandle) -> Option<&str> {
        match handle {
            ResponseHandle::Surface => Some(&self.surface),
            ResponseHandle::Entry(i) => self.transcript.get(i).map(|e| e.text.as_str()),
        }
    }

    fn slot_mut(&mut self, handle: ResponseHandle) -> Option<&mut String> {
        match handle {
            ResponseHandle::Surface => Some(&mut self.surface),
            ResponseHandle::Entry(i) => self.transcript.get_mut(i).map(|e| &mut e.text),
        }
    }
}

//! OpenAI-compatible `chat.completion.chunk` object reused across stream frames.

use serde::Serialize;

pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Incremental message content of one choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reasoning_content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<serde_json::Value>,
}

impl ChunkDelta {
    fn clear(&mut self) {
        self.role = None;
        self.content.clear();
        self.reasoning_content.clear();
        self.tool_calls.clear();
    }

    fn is_empty(&self) -> bool {
        self.role.is_none()
            && self.content.is_empty()
            && self.reasoning_content.is_empty()
            && self.tool_calls.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    /// Serialised as `null` until the stream finishes.
    pub finish_reason: Option<&'static str>,
}

/// One streamed chunk. Strings keep their capacity across [`reset`](Self::reset)
/// so a pooled chunk stops allocating once warmed up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatChunk {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl Default for ChatChunk {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatChunk {
    /// Neutral shape: one choice at index 0, empty delta, no finish reason.
    pub fn new() -> Self {
        Self {
            id: String::new(),
            object: CHUNK_OBJECT,
            created: 0,
            model: String::new(),
            choices: vec![ChunkChoice::default()],
        }
    }

    /// Return to the neutral shape, dropping all request-specific content.
    pub fn reset(&mut self) {
        self.id.clear();
        self.object = CHUNK_OBJECT;
        self.created = 0;
        self.model.clear();
        self.choices.truncate(1);
        match self.choices.first_mut() {
            Some(choice) => {
                choice.index = 0;
                choice.delta.clear();
                choice.finish_reason = None;
            }
            None => self.choices.push(ChunkChoice::default()),
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.id.is_empty()
            && self.created == 0
            && self.model.is_empty()
            && self.choices.len() == 1
            && self.choices[0].index == 0
            && self.choices[0].delta.is_empty()
            && self.choices[0].finish_reason.is_none()
    }

    /// The single delta slot.
    pub fn choice_mut(&mut self) -> &mut ChunkChoice {
        if self.choices.is_empty() {
            self.choices.push(ChunkChoice::default());
        }
        &mut self.choices[0]
    }

    /// Fill identity fields for a frame of the given response.
    pub fn begin(&mut self, id: &str, model: &str, created: u64) -> &mut ChunkChoice {
        self.id.push_str(id);
        self.model.push_str(model);
        self.created = created;
        self.choice_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_serialises_neutral() {
        let v = serde_json::to_value(ChatChunk::new()).unwrap();
        assert_eq!(v["object"], "chat.completion.chunk");
        assert_eq!(v["choices"][0]["index"], 0);
        assert_eq!(v["choices"][0]["delta"], serde_json::json!({}));
        assert!(v["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn reset_clears_everything() {
        let mut c = ChatChunk::new();
        let choice = c.begin("chatcmpl-1", "gemini-2.5-pro", 1_700_000_000);
        choice.delta.role = Some("assistant");
        choice.delta.content.push_str("hello");
        choice.finish_reason = Some("stop");
        c.choices.push(ChunkChoice::default());
        assert!(!c.is_neutral());
        c.reset();
        assert!(c.is_neutral());
        assert_eq!(c, ChatChunk::new());
    }
}

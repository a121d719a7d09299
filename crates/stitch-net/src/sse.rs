//! Server-Sent Events (SSE)
//!
//! Framing for the `text/event-stream` channel the dev server pushes
//! reload notifications through.

/// SSE message event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    pub last_event_id: String,
}

impl SseEvent {
    /// Unnamed `message` event carrying `data`
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Encode for the wire.
    ///
    /// The default `message` type is implied, so a plain event encodes as
    /// `data: <line>\n\n`.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if self.event_type != "message" {
            out.push_str("event: ");
            out.push_str(&self.event_type);
            out.push('\n');
        }
        if !self.last_event_id.is_empty() {
            out.push_str("id: ");
            out.push_str(&self.last_event_id);
            out.push('\n');
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

impl Default for SseEvent {
    fn default() -> Self {
        Self {
            event_type: "message".to_string(),
            data: String::new(),
            last_event_id: String::new(),
        }
    }
}

/// Feed one line of an event stream; returns the event a blank line completes
pub fn parse_sse_line(line: &str, current_event: &mut SseEvent) -> Option<SseEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.is_empty() {
        if current_event.data.is_empty() {
            return None;
        }
        return Some(std::mem::take(current_event));
    }

    if line.starts_with(':') {
        return None;
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };

    match field {
        "event" => current_event.event_type = value.to_string(),
        "data" => {
            if !current_event.data.is_empty() {
                current_event.data.push('\n');
            }
            current_event.data.push_str(value);
        }
        "id" => current_event.last_event_id = value.to_string(),
        _ => {}
    }

    None
}

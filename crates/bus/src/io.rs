use std::collections::VecDeque;
use std::sync::Arc;

use core_types::{SessionId, SessionState};

use crate::{ChannelError, ChannelHub, ReaderGuard, Stream, WriterGuard};

/// Standard streams handed to running code. Passed explicitly to the evaluator; nothing
/// is redirected process-wide.
pub trait Stdio {
    fn write(&mut self, stream: Stream, text: &str);

    /// Next input line without its newline, or `None` at end of input.
    fn read_line(&mut self) -> Option<String>;
}

/// Stdio bound to a session's channel. Both bindings are released when it drops.
pub struct ChannelIo {
    writer: WriterGuard,
    reader: ReaderGuard,
}

impl ChannelIo {
    pub fn bind(hub: &Arc<ChannelHub>, session: &SessionId) -> Result<Self, ChannelError> {
        let writer = hub.register_writer(session)?;
        let reader = hub.register_reader(session)?;
        Ok(ChannelIo { writer, reader })
    }

    pub fn finish(&self, state: SessionState) {
        self.writer.finish(state);
    }
}

impl Stdio for ChannelIo {
    fn write(&mut self, stream: Stream, text: &str) {
        self.writer.write(stream, text);
    }

    fn read_line(&mut self) -> Option<String> {
        let line = self.reader.read_line()?;
        self.writer.write(Stream::Stdin, &format!("{line}\n"));
        Some(line)
    }
}

/// In-memory stdio: output is captured in order, input comes from a fixed queue.
#[derive(Debug, Default)]
pub struct CaptureIo {
    chunks: Vec<(Stream, String)>,
    input: VecDeque<String>,
}

impl CaptureIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CaptureIo {
            chunks: Vec::new(),
            input: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Everything written, all streams interleaved.
    pub fn text(&self) -> String {
        self.chunks.iter().map(|(_, t)| t.as_str()).collect()
    }

    pub fn stream_text(&self, stream: Stream) -> String {
        self.chunks
            .iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, t)| t.as_str())
            .collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}

impl Stdio for CaptureIo {
    fn write(&mut self, stream: Stream, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.chunks.last_mut() {
            Some((last, buf)) if *last == stream => buf.push_str(text),
            _ => self.chunks.push((stream, text.to_string())),
        }
    }

    fn read_line(&mut self) -> Option<String> {
        let line = self.input.pop_front()?;
        self.write(Stream::Stdin, &format!("{line}\n"));
        Some(line)
    }
}

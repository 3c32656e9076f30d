use std::io::Write;

use interview_stream::{
    AccumulatedAnswer, EventKind, StreamError, StreamEvent, StreamResult, StreamSession,
};
use serde_json::Value;

/// How a rendered session ended.
#[derive(Debug)]
pub enum RenderEnd {
    Completed,
    Cancelled,
}

/// Writes events as they arrive: deltas inline, results as pretty JSON and
/// backend errors on their own line.
pub async fn render_session<W: Write>(
    mut session: StreamSession,
    out: &mut W,
) -> anyhow::Result<(AccumulatedAnswer, RenderEnd)> {
    let mut answer = AccumulatedAnswer::default();
    let end = loop {
        match session.next_event().await {
            Ok(Some(event)) => {
                render_event(&event, out)?;
                answer.apply(&event);
            }
            Ok(None) => break RenderEnd::Completed,
            Err(StreamError::Cancelled) => {
                writeln!(out, "\n[cancelled]")?;
                break RenderEnd::Cancelled;
            }
            Err(err) => {
                writeln!(out)?;
                return Err(anyhow::Error::new(err).context("stream interrupted"));
            }
        }
    };
    if !answer.text.is_empty() && !answer.text.ends_with('\n') {
        writeln!(out)?;
    }
    out.flush()?;
    Ok((answer, end))
}

pub fn render_event<W: Write>(event: &StreamEvent, out: &mut W) -> std::io::Result<()> {
    match &event.kind {
        EventKind::TextDelta(text) => {
            write!(out, "{text}")?;
            out.flush()
        }
        EventKind::StructuredResult(value) => write_json(value, out),
        EventKind::ErrorSignal(message) => writeln!(out, "\n[backend error] {message}"),
        EventKind::Unrecognized => Ok(()),
    }
}

pub fn render_result<W: Write>(result: &StreamResult, out: &mut W) -> std::io::Result<()> {
    match result {
        StreamResult::Structured(value) => write_json(value, out),
        StreamResult::Text(text) => writeln!(out, "{text}"),
    }
}

fn write_json<W: Write>(value: &Value, out: &mut W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)
}

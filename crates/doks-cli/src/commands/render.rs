use colored::Colorize;
use doks_application::ConversationStore;
use doks_core::session::{ConversationEvent, Message};
use std::io::{self, Write};
use tokio::sync::broadcast::error::RecvError;

/// Prints an assistant reply incrementally from `MessageUpdated` events.
///
/// Updates carry the cumulative text, so only the unseen suffix is written.
/// Missed events are harmless: the next update catches up.
pub struct ReplyPrinter<W: Write> {
    session_id: String,
    message_id: Option<u64>,
    printed: usize,
    out: W,
}

impl<W: Write> ReplyPrinter<W> {
    pub fn new(session_id: impl Into<String>, out: W) -> Self {
        Self {
            session_id: session_id.into(),
            message_id: None,
            printed: 0,
            out,
        }
    }

    pub fn handle(&mut self, event: &ConversationEvent) -> io::Result<()> {
        let ConversationEvent::MessageUpdated {
            session_id,
            message,
        } = event
        else {
            return Ok(());
        };
        if *session_id != self.session_id || message.is_from_user {
            return Ok(());
        }

        if self.message_id != Some(message.id) {
            self.message_id = Some(message.id);
            self.printed = 0;
        }

        let content = message.content.as_str();
        if content.len() > self.printed && content.is_char_boundary(self.printed) {
            write!(self.out, "{}", content[self.printed..].bright_blue())?;
            self.printed = content.len();
        }

        if !message.is_streaming {
            writeln!(self.out)?;
            self.write_footer(message)?;
        }
        self.out.flush()
    }

    fn write_footer(&mut self, message: &Message) -> io::Result<()> {
        if let Some(confidence) = message.confidence {
            let line = format!("confidence {:.0}%", confidence * 100.0);
            writeln!(self.out, "{}", line.bright_black())?;
        }
        for source in &message.sources {
            let line = format!(
                "  [{} p.{}] score {:.2}",
                source.document_id, source.page, source.score
            );
            writeln!(self.out, "{}", line.bright_black())?;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

/// Runs `ask` while echoing the revealed answer to stdout.
pub async fn ask_and_render(
    store: &ConversationStore,
    session_id: &str,
    question: &str,
    doc_id: Option<&str>,
) -> io::Result<()> {
    let mut events = store.subscribe();
    let mut printer = ReplyPrinter::new(session_id, io::stdout());

    let ask = store.ask(session_id, question, doc_id);
    tokio::pin!(ask);

    loop {
        tokio::select! {
            _ = &mut ask => break,
            event = events.recv() => match event {
                Ok(event) => printer.handle(&event)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Reply printer skipped {} events", skipped);
                }
                Err(RecvError::Closed) => {
                    (&mut ask).await;
                    break;
                }
            },
        }
    }

    while let Ok(event) = events.try_recv() {
        printer.handle(&event)?;
    }
    Ok(())
}

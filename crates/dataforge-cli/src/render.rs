//! Terminal output for a streamed reply

use std::io::{self, Write};

use dataforge_chat::StreamUpdate;
use tokio::sync::broadcast::{Receiver, error::RecvError};

/// Where each kind of appended text goes
pub struct Renderer<A, R> {
    answer: A,
    reasoning: Option<R>,
}

impl<A: Write, R: Write> Renderer<A, R> {
    /// Answer text goes to `answer`; reasoning is dropped unless a sink is given
    pub fn new(answer: A, reasoning: Option<R>) -> Self {
        Self { answer, reasoning }
    }

    /// Write one update and flush so tokens show up as they arrive
    pub fn render(&mut self, update: &StreamUpdate) -> io::Result<()> {
        match update {
            StreamUpdate::Content(text) => {
                self.answer.write_all(text.as_bytes())?;
                self.answer.flush()
            }
            StreamUpdate::Reasoning(text) => match self.reasoning.as_mut() {
                Some(out) => {
                    out.write_all(text.as_bytes())?;
                    out.flush()
                }
                None => Ok(()),
            },
        }
    }

    /// Finish the answer with a newline
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.answer)?;
        self.answer.flush()
    }

    /// Render updates until the store is dropped
    pub async fn drain(mut self, mut updates: Receiver<StreamUpdate>) -> io::Result<()> {
        loop {
            match updates.recv().await {
                Ok(update) => self.render(&update)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Renderer fell behind, {} updates skipped", skipped);
                }
                Err(RecvError::Closed) => return self.finish(),
            }
        }
    }
}

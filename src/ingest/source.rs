//! Background reading source.
//!
//! Moves raw samples from a file, stdin, or the simulator onto a bounded
//! channel so the monitor loop can consume them one at a time. Parse
//! failures travel down the same channel; the consumer decides what to do
//! with them.

use crate::ingest::types::{RawReading, ReadingError};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Item delivered by a [`ReadingSource`].
pub type SourceItem = Result<RawReading, ReadingError>;

/// Line format for text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    JsonLines,
}

impl InputFormat {
    /// Parse from a CLI value (`csv`, `jsonl`, `json`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "csv" => Some(InputFormat::Csv),
            "jsonl" | "json" | "ndjson" => Some(InputFormat::JsonLines),
            _ => None,
        }
    }

    /// Parse a single line; `None` for blank lines and `#` comments.
    pub fn parse_line(&self, line: &str) -> Option<SourceItem> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        Some(match self {
            InputFormat::Csv => RawReading::from_csv_line(trimmed),
            InputFormat::JsonLines => RawReading::from_json_line(trimmed),
        })
    }
}

/// Errors that can occur while running a source.
#[derive(Debug)]
pub enum SourceError {
    AlreadyRunning,
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::AlreadyRunning => write!(f, "Reading source is already running"),
        }
    }
}

impl std::error::Error for SourceError {}

type Producer = Box<dyn Iterator<Item = SourceItem> + Send>;

/// Feeds samples from a producer thread into a bounded channel.
///
/// The channel disconnects once the producer is exhausted or the source is
/// stopped, which is how the consumer learns the stream has ended.
pub struct ReadingSource {
    producer: Option<Producer>,
    pace: Option<Duration>,
    sender: Option<Sender<SourceItem>>,
    receiver: Receiver<SourceItem>,
    running: Arc<AtomicBool>,
}

impl ReadingSource {
    /// Source over arbitrary items, optionally sleeping `pace` between them.
    pub fn from_items<I>(items: I, pace: Option<Duration>) -> Self
    where
        I: Iterator<Item = SourceItem> + Send + 'static,
    {
        let (sender, receiver) = bounded(1_000);
        Self {
            producer: Some(Box::new(items)),
            pace,
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Source over text lines (file or stdin).
    pub fn from_reader<R>(reader: R, format: InputFormat) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let items = reader.lines().filter_map(move |line| match line {
            Ok(line) => format.parse_line(&line),
            Err(e) => Some(Err(ReadingError::Malformed(e.to_string()))),
        });
        Self::from_items(items, None)
    }

    /// Start the producer thread.
    pub fn start(&mut self) -> Result<(), SourceError> {
        let (producer, sender) = match (self.producer.take(), self.sender.take()) {
            (Some(p), Some(s)) => (p, s),
            _ => return Err(SourceError::AlreadyRunning),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let pace = self.pace;

        // Detached: a producer blocked on stdin must not hold up shutdown.
        thread::spawn(move || {
            for item in producer {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if sender.send(item).is_err() {
                    break;
                }
                if let Some(pace) = pace {
                    thread::sleep(pace);
                }
            }
            running.store(false, Ordering::SeqCst);
            tracing::debug!("reading source exhausted");
        });

        Ok(())
    }

    /// Ask the producer thread to stop after its current item.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the producer thread is still emitting.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for samples.
    pub fn receiver(&self) -> &Receiver<SourceItem> {
        &self.receiver
    }

    /// Try to receive a sample without blocking.
    pub fn try_recv(&self) -> Option<SourceItem> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ReadingSource {
    fn drop(&mut self) {
        self.stop();
    }
}

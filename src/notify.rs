//! Segment-ready notifications
//!
//! The emitter guarantees ordering and exactly-once delivery per closed
//! segment; transports only decide how a notification is serialized.

use std::io::Write;

use serde::Serialize;

use crate::config::NotifyFormat;

/// One closed segment, reported to the downstream transfer step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentNotification {
    pub first_segment_index: u32,
    pub last_segment_index: u32,
    pub is_terminal: bool,
    pub profile_payload: String,
}

/// Notification transport. Fire and forget: failures are logged by the
/// transport and never reach the pipeline.
pub trait SegmentNotifier {
    fn notify(&mut self, notification: &SegmentNotification);
}

impl<T: SegmentNotifier + ?Sized> SegmentNotifier for Box<T> {
    fn notify(&mut self, notification: &SegmentNotification) {
        (**self).notify(notification)
    }
}

/// Reports notifications as structured log events
#[derive(Debug, Default)]
pub struct LogNotifier;

impl SegmentNotifier for LogNotifier {
    fn notify(&mut self, n: &SegmentNotification) {
        tracing::info!(
            first_segment = n.first_segment_index,
            last_segment = n.last_segment_index,
            terminal = n.is_terminal,
            payload = %n.profile_payload,
            "Segment ready"
        );
    }
}

/// Writes `segmenter: first, last, end, payload` lines, the format the
/// transfer scripts scrape from the segmenter's stderr
pub struct LineNotifier<W: Write> {
    out: W,
}

impl LineNotifier<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> LineNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Render the transfer line for a notification
pub fn transfer_line(n: &SegmentNotification) -> String {
    format!(
        "segmenter: {}, {}, {}, {}",
        n.first_segment_index,
        n.last_segment_index,
        u8::from(n.is_terminal),
        n.profile_payload
    )
}

impl<W: Write> SegmentNotifier for LineNotifier<W> {
    fn notify(&mut self, n: &SegmentNotification) {
        // Readers split records on carriage return
        let result = write!(self.out, "{}\n\r", transfer_line(n)).and_then(|_| self.out.flush());
        if let Err(e) = result {
            tracing::error!(
                segment = n.last_segment_index,
                "Failed to write segment notification: {}",
                e
            );
        }
    }
}

/// Writes one JSON object per notification, one per line
pub struct JsonNotifier<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    #[serde(flatten)]
    notification: &'a SegmentNotification,
    closed_at: String,
}

impl JsonNotifier<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonNotifier<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SegmentNotifier for JsonNotifier<W> {
    fn notify(&mut self, n: &SegmentNotification) {
        let record = JsonRecord {
            notification: n,
            closed_at: chrono::Utc::now().to_rfc3339(),
        };
        let result = serde_json::to_writer(&mut self.out, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            tracing::error!(
                segment = n.last_segment_index,
                "Failed to write segment notification: {}",
                e
            );
        }
    }
}

/// Build the transport selected in the configuration
pub fn notifier_for(format: NotifyFormat) -> Box<dyn SegmentNotifier> {
    match format {
        NotifyFormat::Log => Box::new(LogNotifier),
        NotifyFormat::Line => Box::new(LineNotifier::stderr()),
        NotifyFormat::Json => Box::new(JsonNotifier::stdout()),
    }
}

/// Emits notifications in strictly increasing segment order, once per
/// segment, with a single terminal notification per run.
pub struct NotificationEmitter<N: SegmentNotifier> {
    notifier: N,
    first_segment_index: u32,
    profile_payload: String,
    last_emitted: Option<u32>,
    terminal_sent: bool,
}

impl<N: SegmentNotifier> NotificationEmitter<N> {
    pub fn new(notifier: N, first_segment_index: u32, profile_payload: impl Into<String>) -> Self {
        Self {
            notifier,
            first_segment_index,
            profile_payload: profile_payload.into(),
            last_emitted: None,
            terminal_sent: false,
        }
    }

    /// Report a closed segment. Returns `false`, without notifying, when the
    /// index is not past the last one reported or the run already ended.
    pub fn segment_closed(&mut self, index: u32, terminal: bool) -> bool {
        if self.terminal_sent {
            tracing::error!(
                segment = index,
                "Notification after terminal notification suppressed"
            );
            return false;
        }
        if self.last_emitted.is_some_and(|last| index <= last) {
            tracing::error!(
                segment = index,
                last = ?self.last_emitted,
                "Out-of-order segment notification suppressed"
            );
            return false;
        }

        let notification = SegmentNotification {
            first_segment_index: self.first_segment_index,
            last_segment_index: index,
            is_terminal: terminal,
            profile_payload: self.profile_payload.clone(),
        };
        self.notifier.notify(&notification);
        self.last_emitted = Some(index);
        self.terminal_sent = terminal;
        true
    }

    pub fn last_emitted(&self) -> Option<u32> {
        self.last_emitted
    }

    pub fn terminal_sent(&self) -> bool {
        self.terminal_sent
    }
}

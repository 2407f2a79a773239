//! Progress events emitted by the pipeline.
//!
//! A run reports its progress as a flat stream of [`ProgressEvent`]s. The
//! serialized shape `{stage, detail, data}` is what the CLI prints with
//! `--events json`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// What a progress event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Scraping,
    Extracting,
    Profile,
    Searching,
    Ranking,
    CompetitorsFound,
    DeepScraping,
    CompetitorScraping,
    CompetitorDone,
    Analyzing,
    AnalysisReady,
    Storing,
    Done,
    Emailing,
    ReportSent,
    Warning,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scraping => "scraping",
            Self::Extracting => "extracting",
            Self::Profile => "profile",
            Self::Searching => "searching",
            Self::Ranking => "ranking",
            Self::CompetitorsFound => "competitors_found",
            Self::DeepScraping => "deep_scraping",
            Self::CompetitorScraping => "competitor_scraping",
            Self::CompetitorDone => "competitor_done",
            Self::Analyzing => "analyzing",
            Self::AnalysisReady => "analysis_ready",
            Self::Storing => "storing",
            Self::Done => "done",
            Self::Emailing => "emailing",
            Self::ReportSent => "report_sent",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ProgressEvent {
    pub fn new(stage: EventKind) -> Self {
        Self {
            stage,
            detail: None,
            data: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Receives progress events from a running pipeline.
///
/// Implementations are called from concurrent branches and must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// No-op progress sink for headless/test usage.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events into a tokio channel, serializing concurrent emitters
/// into one ordered stream.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn emit(&self, event: ProgressEvent) {
        // A dropped receiver means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_to_stream_shape() {
        let event = ProgressEvent::new(EventKind::CompetitorsFound)
            .with_detail("Found 2 competitors")
            .with_data(serde_json::json!([{"name": "A", "url": "https://a.test"}]));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "competitors_found");
        assert_eq!(json["detail"], "Found 2 competitors");
        assert_eq!(json["data"][0]["name"], "A");

        let bare = serde_json::to_string(&ProgressEvent::new(EventKind::Done)).unwrap();
        assert_eq!(bare, r#"{"stage":"done"}"#);
    }

    #[test]
    fn event_kind_names_match_serde() {
        for kind in [
            EventKind::DeepScraping,
            EventKind::ReportSent,
            EventKind::AnalysisReady,
            EventKind::Error,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[tokio::test]
    async fn channel_progress_preserves_order() {
        let (sink, mut rx) = ChannelProgress::new();
        sink.emit(ProgressEvent::new(EventKind::Scraping));
        sink.emit(ProgressEvent::new(EventKind::Extracting));
        drop(sink);

        assert_eq!(rx.recv().await.unwrap().stage, EventKind::Scraping);
        assert_eq!(rx.recv().await.unwrap().stage, EventKind::Extracting);
        assert!(rx.recv().await.is_none());
    }
}

//! mbox (RFC 4155-ish) sink: appends one record per accepted message to
//! stdout or to a file opened in append mode, serialized so concurrent
//! sessions never interleave a record.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config::OutputTarget;
use crate::smtp::session::Session;

/// A finished transaction, ready to be rendered as one mbox record.
#[derive(Debug, Clone)]
pub struct MailRecord {
    pub reverse_path: String,
    pub forward_path: Vec<String>,
    pub mail_data: String,
    pub date: DateTime<Utc>,
}

impl MailRecord {
    pub fn from_session(session: &Session) -> Self {
        Self {
            reverse_path: session.reverse_path.clone().unwrap_or_default(),
            forward_path: session.forward_path.clone().unwrap_or_default(),
            mail_data: session.mail_data.clone().unwrap_or_default(),
            date: session.date.unwrap_or_else(Utc::now),
        }
    }
}

fn render(record: &MailRecord) -> String {
    let ctime = record.date.format("%a %b %e %H:%M:%S %Y");
    let mut out = format!("From {} {}\n", record.reverse_path, ctime);
    for recipient in &record.forward_path {
        out.push_str(&format!("X-FakeSMTPd-Receiver: {recipient}\n"));
    }
    out.push_str(&record.mail_data.replace("\r\n", "\n"));
    out.push('\n');
    out
}

/// Serializes writes across concurrently-spawned sessions; each write opens
/// (or reuses, for stdout) the sink, writes one full record, and flushes
/// before releasing the lock.
pub struct MboxWriter {
    target: OutputTarget,
    guard: tokio::sync::Mutex<()>,
}

impl MboxWriter {
    pub fn new(target: OutputTarget) -> Self {
        Self { target, guard: tokio::sync::Mutex::new(()) }
    }

    pub async fn write_record(&self, record: &MailRecord) -> std::io::Result<()> {
        let _permit = self.guard.lock().await;
        let text = render(record);
        match &self.target {
            OutputTarget::Stdout => write_to_stdout(&text),
            OutputTarget::File(path) => write_to_file(path, &text),
        }
    }
}

fn write_to_stdout(text: &str) -> std::io::Result<()> {
    let mut out = std::io::stdout();
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn write_to_file(path: &PathBuf, text: &str) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> MailRecord {
        MailRecord {
            reverse_path: "sender@example.com".to_string(),
            forward_path: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            mail_data: "Subject: hi\r\n\r\nbody text\r\n".to_string(),
            date: Utc.with_ymd_and_hms(2017, 6, 4, 14, 34, 15).unwrap(),
        }
    }

    #[test]
    fn render_produces_one_header_per_recipient_and_lf_body() {
        let text = render(&sample_record());
        assert!(text.starts_with("From sender@example.com Sun Jun  4 14:34:15 2017\n"));
        assert!(text.contains("X-FakeSMTPd-Receiver: a@example.com\n"));
        assert!(text.contains("X-FakeSMTPd-Receiver: b@example.com\n"));
        assert!(!text.contains('\r'));
        assert!(text.ends_with("body text\n\n"));
    }

    #[test]
    fn render_handles_null_sender_and_empty_body() {
        let mut record = sample_record();
        record.reverse_path = String::new();
        record.mail_data = String::new();
        let text = render(&record);
        assert!(text.starts_with("From  Sun Jun  4 14:34:15 2017\n"));
    }

    #[tokio::test]
    async fn file_sink_appends_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mbox");
        let writer = MboxWriter::new(OutputTarget::File(path.clone()));
        writer.write_record(&sample_record()).await.unwrap();
        writer.write_record(&sample_record()).await.unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.matches("From sender@example.com").count(), 2);
    }
}

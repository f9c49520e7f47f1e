//! Per-connection transaction state and the gating predicates that decide
//! which commands are currently legal.

use chrono::{DateTime, Utc};

/// Mutable state for one SMTP connection. A session survives across
/// transactions (only `greeted` persists a reset); everything else is
/// transaction-scoped and cleared by `clear()`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub greeted: bool,
    pub reverse_path: Option<String>,
    pub forward_path: Option<Vec<String>>,
    pub mail_data: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the in-progress transaction (reverse path, recipients, body)
    /// without touching `greeted`.
    pub fn clear(&mut self) {
        self.reverse_path = None;
        self.forward_path = None;
        self.mail_data = None;
        self.date = None;
    }

    pub fn add_forward_path(&mut self, path: String) {
        self.forward_path.get_or_insert_with(Vec::new).push(path);
    }

    pub fn add_line(&mut self, line: &str) {
        self.mail_data.get_or_insert_with(String::new).push_str(line);
    }

    pub fn mail_allowed(&self) -> bool {
        self.greeted && self.reverse_path.is_none() && self.forward_path.is_none() && self.mail_data.is_none()
    }

    pub fn rcpt_allowed(&self) -> bool {
        self.greeted && self.reverse_path.is_some() && self.mail_data.is_none()
    }

    pub fn data_allowed(&self) -> bool {
        self.greeted
            && self.reverse_path.is_some()
            && self.forward_path.is_some()
            && self.mail_data.is_none()
    }
}

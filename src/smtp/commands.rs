//! Command dispatch: maps an uppercased command keyword plus its raw
//! argument string onto a state transition and a reply, per-command, the
//! same shape as the original implementation's handler table.

use super::session::Session;
use super::syntax::{self, PathError};

/// An SMTP reply: a three-digit status code and its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

impl Reply {
    fn new(code: u16, text: impl Into<String>) -> Self {
        Self { code, text: text.into() }
    }

    pub fn service_ready(text: impl Into<String>) -> Self {
        Self::new(220, text)
    }

    pub fn ok(text: impl Into<String>) -> Self {
        Self::new(250, text)
    }

    pub fn cannot_vrfy(text: impl Into<String>) -> Self {
        Self::new(252, text)
    }

    pub fn start_mail_input(text: impl Into<String>) -> Self {
        Self::new(354, text)
    }

    pub fn service_closing(text: impl Into<String>) -> Self {
        Self::new(221, text)
    }

    pub fn syntax_error(text: impl Into<String>) -> Self {
        Self::new(500, text)
    }

    pub fn syntax_error_in_params(text: impl Into<String>) -> Self {
        Self::new(501, text)
    }

    pub fn bad_sequence(text: impl Into<String>) -> Self {
        Self::new(503, text)
    }

    pub fn to_wire(&self) -> String {
        format!("{} {}\r\n", self.code, self.text)
    }
}

fn strip_ci_prefix<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes()) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn path_error_reply(err: PathError) -> Reply {
    match err {
        PathError::TooLong => Reply::syntax_error_in_params("Path too long"),
        PathError::Syntax => Reply::syntax_error_in_params("Syntax error in arguments"),
    }
}

fn handle_ehlo(session: &mut Session, args: &str, fqdn: &str) -> Reply {
    if args.is_empty() {
        return Reply::syntax_error_in_params("Missing arguments");
    }
    if !syntax::is_valid_domain_or_literal(args) {
        return Reply::syntax_error_in_params("Syntax error in arguments");
    }
    session.greeted = true;
    Reply::ok(format!("{fqdn} Hello {args}"))
}

fn handle_helo(session: &mut Session, args: &str, fqdn: &str) -> Reply {
    if args.is_empty() {
        return Reply::syntax_error_in_params("Missing arguments");
    }
    if !syntax::is_valid_domain(args) {
        return Reply::syntax_error_in_params("Syntax error in arguments");
    }
    session.greeted = true;
    Reply::ok(format!("{fqdn} Hello {args}"))
}

fn handle_mail(session: &mut Session, args: &str) -> Reply {
    let rest = match strip_ci_prefix(args, "FROM:") {
        Some(r) => r,
        None => return Reply::syntax_error_in_params("Syntax error in arguments"),
    };
    let (path, after) = match syntax::parse_reverse_path(rest) {
        Ok(v) => v,
        Err(e) => return path_error_reply(e),
    };
    if !syntax::is_valid_smtp_arguments(&after) {
        return Reply::syntax_error_in_params("Syntax error in arguments");
    }
    if !session.greeted {
        return Reply::bad_sequence("No EHLO sent");
    }
    if !session.mail_allowed() {
        return Reply::bad_sequence("Bad command sequence");
    }
    session.clear();
    session.reverse_path = Some(path);
    Reply::ok("Sender OK")
}

fn handle_rcpt(session: &mut Session, args: &str) -> Reply {
    let rest = match strip_ci_prefix(args, "TO:") {
        Some(r) => r,
        None => return Reply::syntax_error_in_params("Syntax error in arguments"),
    };
    let (path, after) = match syntax::parse_receiver(rest) {
        Ok(v) => v,
        Err(e) => return path_error_reply(e),
    };
    if !syntax::is_valid_smtp_arguments(&after) {
        return Reply::syntax_error_in_params("Syntax error in arguments");
    }
    if !session.rcpt_allowed() {
        return Reply::bad_sequence("Bad command sequence");
    }
    session.add_forward_path(path);
    Reply::ok("Receiver OK")
}

fn handle_data(session: &mut Session, args: &str) -> Reply {
    if !args.is_empty() {
        return Reply::syntax_error_in_params("Unexpected arguments");
    }
    if !session.data_allowed() {
        return Reply::bad_sequence("Bad command sequence");
    }
    Reply::start_mail_input("Enter mail text. End with . on a separate line.")
}

fn handle_rset(session: &mut Session, args: &str) -> Reply {
    if !args.is_empty() {
        return Reply::syntax_error_in_params("Unexpected arguments");
    }
    session.clear();
    Reply::ok("OK")
}

fn handle_vrfy() -> Reply {
    Reply::cannot_vrfy("Verify not allowed")
}

fn handle_noop() -> Reply {
    Reply::ok("OK")
}

fn handle_quit(args: &str, fqdn: &str) -> Reply {
    if !args.is_empty() {
        return Reply::syntax_error_in_params("Unexpected arguments");
    }
    Reply::service_closing(format!("{fqdn} Service closing transmission channel"))
}

fn handle_unknown() -> Reply {
    Reply::syntax_error("Command unrecognized")
}

/// Dispatches one already-framed command line. `command` is the uppercased
/// (up to 4 byte) keyword; `arguments` is whatever followed the separator.
pub fn dispatch(session: &mut Session, command: &str, arguments: &str, fqdn: &str) -> Reply {
    match command {
        "EHLO" => handle_ehlo(session, arguments, fqdn),
        "HELO" => handle_helo(session, arguments, fqdn),
        "MAIL" => handle_mail(session, arguments),
        "RCPT" => handle_rcpt(session, arguments),
        "DATA" => handle_data(session, arguments),
        "RSET" => handle_rset(session, arguments),
        "VRFY" => handle_vrfy(),
        "NOOP" => handle_noop(),
        "QUIT" => handle_quit(arguments, fqdn),
        _ => handle_unknown(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FQDN: &str = "test.invalid";

    #[test]
    fn ehlo_greets_and_allows_mail() {
        let mut s = Session::new();
        let reply = dispatch(&mut s, "EHLO", "client.example.com", FQDN);
        assert_eq!(reply.code, 250);
        assert!(s.greeted);
    }

    #[test]
    fn ehlo_missing_arguments() {
        let mut s = Session::new();
        let reply = dispatch(&mut s, "EHLO", "", FQDN);
        assert_eq!(reply.code, 501);
        assert_eq!(reply.text, "Missing arguments");
    }

    #[test]
    fn mail_before_greeting_is_rejected() {
        let mut s = Session::new();
        let reply = dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN);
        assert_eq!(reply.code, 503);
        assert_eq!(reply.text, "No EHLO sent");
    }

    #[test]
    fn mail_without_from_prefix_is_syntax_error() {
        let mut s = Session::new();
        s.greeted = true;
        let reply = dispatch(&mut s, "MAIL", "", FQDN);
        assert_eq!(reply.code, 501);
        assert_eq!(reply.text, "Syntax error in arguments");
    }

    #[test]
    fn mail_twice_is_bad_sequence() {
        let mut s = Session::new();
        s.greeted = true;
        assert_eq!(dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN).code, 250);
        let reply = dispatch(&mut s, "MAIL", "FROM:<c@d.com>", FQDN);
        assert_eq!(reply.code, 503);
        assert_eq!(reply.text, "Bad command sequence");
    }

    #[test]
    fn rcpt_accepts_postmaster_case_preserved() {
        let mut s = Session::new();
        s.greeted = true;
        dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN);
        let reply = dispatch(&mut s, "RCPT", "TO:<postMaster>", FQDN);
        assert_eq!(reply.code, 250);
        assert_eq!(s.forward_path.unwrap(), vec!["postMaster".to_string()]);
    }

    #[test]
    fn rcpt_with_invalid_esmtp_param_is_rejected() {
        let mut s = Session::new();
        s.greeted = true;
        dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN);
        let reply = dispatch(&mut s, "RCPT", "TO:<c@d.com> -foo=bar", FQDN);
        assert_eq!(reply.code, 501);
        assert_eq!(reply.text, "Syntax error in arguments");
    }

    #[test]
    fn data_requires_recipient() {
        let mut s = Session::new();
        s.greeted = true;
        dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN);
        let reply = dispatch(&mut s, "DATA", "", FQDN);
        assert_eq!(reply.code, 503);
    }

    #[test]
    fn data_starts_mail_input() {
        let mut s = Session::new();
        s.greeted = true;
        dispatch(&mut s, "MAIL", "FROM:<a@b.com>", FQDN);
        dispatch(&mut s, "RCPT", "TO:<c@d.com>", FQDN);
        let reply = dispatch(&mut s, "DATA", "", FQDN);
        assert_eq!(reply.code, 354);
    }

    #[test]
    fn unknown_command_is_unrecognized() {
        let mut s = Session::new();
        let reply = dispatch(&mut s, "XYZZ", "", FQDN);
        assert_eq!(reply.code, 500);
    }

    #[test]
    fn noop_ignores_arguments() {
        let mut s = Session::new();
        assert_eq!(dispatch(&mut s, "NOOP", "whatever", FQDN).code, 250);
    }

    #[test]
    fn quit_rejects_arguments() {
        let mut s = Session::new();
        let reply = dispatch(&mut s, "QUIT", "extra", FQDN);
        assert_eq!(reply.code, 501);
    }
}

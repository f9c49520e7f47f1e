//! RFC 5321 grammar recognizers and reverse/forward path parsing.
//!
//! Hand-written recursive-descent-style validators instead of a regex
//! engine, mirroring the non-greedy line parsing already used by the
//! connection layer. Every function here is pure and synchronous; the
//! dispatcher in `commands` is the only caller.

/// Bytes including CRLF allowed in a single command line (RFC 5321 §4.5.3.1.4).
pub const SMTP_COMMAND_LIMIT: usize = 512;
/// Bytes including CRLF allowed in a single DATA text line (RFC 5321 §4.5.3.1.6).
pub const SMTP_TEXT_LINE_LIMIT: usize = 1000;
/// Bytes allowed in a `<path>`, angle brackets included.
pub const SMTP_PATH_LIMIT: usize = 256;
/// Bytes allowed in the local-part of a mailbox.
pub const SMTP_LOCAL_PART_LIMIT: usize = 64;
/// Bytes allowed in the domain part of a mailbox.
pub const SMTP_DOMAIN_LIMIT: usize = 255;
/// Default listening port, per `smtplib.SMTP_PORT` in the original implementation.
pub const SMTP_PORT: u16 = 25;

/// Failure modes for `parse_path` and its variants; the dispatcher maps
/// these onto the two distinct 501 reply texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    Syntax,
    TooLong,
}

fn is_let_dig(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

fn is_ldh(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

fn is_valid_sub_domain(s: &str) -> bool {
    let b = s.as_bytes();
    match b.len() {
        0 => false,
        1 => is_let_dig(b[0]),
        _ => is_let_dig(b[0]) && is_let_dig(b[b.len() - 1]) && b[1..b.len() - 1].iter().all(|&c| is_ldh(c)),
    }
}

pub fn is_valid_domain(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_valid_sub_domain)
}

fn is_valid_atom_char(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'/'
                | b'='
                | b'?'
                | b'^'
                | b'_'
                | b'`'
                | b'{'
                | b'}'
                | b'|'
                | b'~'
                | b'-'
        )
}

fn is_valid_atom(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_valid_atom_char)
}

pub fn is_valid_dot_string(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(is_valid_atom)
}

fn is_qtext_smtp(b: u8) -> bool {
    b == 32 || b == 33 || (35..=91).contains(&b) || (93..=126).contains(&b)
}

pub fn is_valid_quoted_string(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() < 2 || b[0] != b'"' || b[b.len() - 1] != b'"' {
        return false;
    }
    let inner = &b[1..b.len() - 1];
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == b'\\' {
            match inner.get(i + 1) {
                Some(&next) if (32..=126).contains(&next) => i += 2,
                _ => return false,
            }
        } else if is_qtext_smtp(inner[i]) {
            i += 1;
        } else {
            return false;
        }
    }
    true
}

pub fn is_valid_local_part(s: &str) -> bool {
    is_valid_dot_string(s) || is_valid_quoted_string(s)
}

fn parse_snum(s: &str) -> Option<u16> {
    if s.is_empty() || s.len() > 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u16>().ok().filter(|&v| v <= 255)
}

pub fn is_valid_ipv4(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    parts.len() == 4 && parts.iter().all(|p| parse_snum(p).is_some())
}

fn is_valid_ipv6_hex_group(s: &str) -> bool {
    (1..=4).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_valid_ipv6_full(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() == 8 && parts.iter().all(|p| is_valid_ipv6_hex_group(p))
}

fn is_valid_ipv6_comp(s: &str) -> bool {
    if s.matches("::").count() != 1 {
        return false;
    }
    let idx = s.find("::").unwrap();
    let (g1, g2) = (&s[..idx], &s[idx + 2..]);
    if !(g1.is_empty() || g1.split(':').all(is_valid_ipv6_hex_group)) {
        return false;
    }
    if !(g2.is_empty() || g2.split(':').all(is_valid_ipv6_hex_group)) {
        return false;
    }
    g1.matches(':').count() + g2.matches(':').count() + 2 <= 6
}

fn is_valid_ipv6v4_full(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() == 6
        && parts[..5].iter().all(|p| is_valid_ipv6_hex_group(p))
        && is_valid_ipv4(parts[5])
}

fn is_valid_ipv6v4_comp(s: &str) -> bool {
    if s.matches("::").count() != 1 {
        return false;
    }
    let idx = s.find("::").unwrap();
    let g1 = &s[..idx];
    let remainder = &s[idx + 2..];
    let (g2, ipv4) = match remainder.rfind(':') {
        Some(last) => (&remainder[..=last], &remainder[last + 1..]),
        None => ("", remainder),
    };
    if !(g1.is_empty() || g1.split(':').all(is_valid_ipv6_hex_group)) {
        return false;
    }
    let g2_groups = g2.strip_suffix(':').unwrap_or(g2);
    if !(g2_groups.is_empty() || g2_groups.split(':').all(is_valid_ipv6_hex_group)) {
        return false;
    }
    if !is_valid_ipv4(ipv4) {
        return false;
    }
    g1.matches(':').count() + g2.matches(':').count() + 1 <= 4
}

pub fn is_valid_ipv6(s: &str) -> bool {
    is_valid_ipv6_full(s) || is_valid_ipv6_comp(s) || is_valid_ipv6v4_full(s) || is_valid_ipv6v4_comp(s)
}

/// General-literals (`[tag:content]` for a tag other than `IPv6`) are not accepted.
pub fn is_valid_address_literal(s: &str) -> bool {
    if s.len() < 2 || !s.starts_with('[') || !s.ends_with(']') {
        return false;
    }
    let lit = &s[1..s.len() - 1];
    if is_valid_ipv4(lit) {
        return true;
    }
    match lit.strip_prefix("IPv6:") {
        Some(rest) => is_valid_ipv6(rest),
        None => false,
    }
}

pub fn is_valid_domain_or_literal(s: &str) -> bool {
    is_valid_domain(s) || is_valid_address_literal(s)
}

fn is_valid_esmtp_keyword(s: &str) -> bool {
    let b = s.as_bytes();
    !b.is_empty() && b[0].is_ascii_alphanumeric() && b[1..].iter().all(|&c| c.is_ascii_alphanumeric() || c == b'-')
}

fn is_valid_esmtp_value(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| (33..=60).contains(&b) || (62..=126).contains(&b))
}

/// Parses one `keyword` or `keyword=value` token.
fn parse_esmtp_param(s: &str) -> Option<(String, Option<String>)> {
    match s.find('=') {
        Some(idx) => {
            let (keyword, value) = (&s[..idx], &s[idx + 1..]);
            if is_valid_esmtp_keyword(keyword) && is_valid_esmtp_value(value) {
                Some((keyword.to_string(), Some(value.to_string())))
            } else {
                None
            }
        }
        None => is_valid_esmtp_keyword(s).then(|| (s.to_string(), None)),
    }
}

/// `rest` is whatever followed the closing `>` of a path. Valid forms are
/// the empty string, or a single leading space followed by space-separated
/// `esmtp-param` tokens.
pub fn is_valid_smtp_arguments(rest: &str) -> bool {
    match rest.strip_prefix(' ') {
        Some(params) => params.split(' ').all(|tok| parse_esmtp_param(tok).is_some()),
        None => rest.is_empty(),
    }
}

/// Parses `<path>` at the start of `s`, returning the path contents and the
/// remainder of `s` after the closing `>`.
pub fn parse_path(s: &str) -> Result<(String, String), PathError> {
    if !s.starts_with('<') {
        return Err(PathError::Syntax);
    }
    let close = s.find('>').ok_or(PathError::Syntax)?;
    let path = &s[1..close];
    if path.len() + 2 > SMTP_PATH_LIMIT {
        return Err(PathError::TooLong);
    }
    let at = path.find('@').ok_or(PathError::Syntax)?;
    let (local, domain) = (&path[..at], &path[at + 1..]);
    if domain.contains('@') {
        return Err(PathError::Syntax);
    }
    if local.len() > SMTP_LOCAL_PART_LIMIT {
        return Err(PathError::TooLong);
    }
    if !is_valid_local_part(local) {
        return Err(PathError::Syntax);
    }
    if domain.len() > SMTP_DOMAIN_LIMIT {
        return Err(PathError::TooLong);
    }
    if !is_valid_domain_or_literal(domain) {
        return Err(PathError::Syntax);
    }
    Ok((path.to_string(), s[close + 1..].to_string()))
}

/// MAIL FROM path: `<>` is the legal null sender.
pub fn parse_reverse_path(s: &str) -> Result<(String, String), PathError> {
    match s.strip_prefix("<>") {
        Some(rest) => Ok((String::new(), rest.to_string())),
        None => parse_path(s),
    }
}

/// RCPT TO path: `<postmaster>` (any letter case) is a reserved forward path.
pub fn parse_receiver(s: &str) -> Result<(String, String), PathError> {
    if s.len() >= 12 && s.as_bytes()[..12].eq_ignore_ascii_case(b"<postmaster>") {
        return Ok((s[1..11].to_string(), s[12..].to_string()));
    }
    parse_path(s)
}

//! Line framing over an async byte stream: command-line length/charset
//! enforcement, DATA-mode text-line collection, and reply writing.
//!
//! Generic over `AsyncBufRead`/`AsyncWrite` so it can be driven by a real
//! `TcpStream` in production and by an in-memory cursor in tests, the same
//! shape the teacher's `SmtpProtocol<R, W>` used.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

use super::commands::Reply;
use super::syntax::{SMTP_COMMAND_LIMIT, SMTP_TEXT_LINE_LIMIT};

/// Outcome of reading one command line.
#[derive(Debug, PartialEq, Eq)]
pub enum CommandLine {
    Command(String, String),
    TooLong,
    NonAscii,
    Eof,
}

/// Outcome of reading one DATA-mode text line.
#[derive(Debug, PartialEq, Eq)]
pub enum DataLine {
    Line(String),
    Terminator,
    TooLong,
    Eof,
}

pub struct Protocol<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> Protocol<R, W>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub async fn write_reply(&mut self, reply: &Reply) -> std::io::Result<()> {
        self.writer.write_all(reply.to_wire().as_bytes()).await?;
        self.writer.flush().await
    }

    pub async fn write_greeting(&mut self, fqdn: &str) -> std::io::Result<()> {
        self.write_reply(&Reply::service_ready(format!("{fqdn} FakeSMTPd Service ready")))
            .await
    }

    /// Reads one CRLF-terminated command line, enforcing
    /// `SMTP_COMMAND_LIMIT` (including the CRLF) and pure-ASCII content.
    /// The keyword/argument split mirrors the original implementation's
    /// fixed `line[:4]`/`line[5:]` slicing without panicking on short lines.
    pub async fn read_command(&mut self) -> std::io::Result<CommandLine> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(CommandLine::Eof);
        }
        if buf.len() > SMTP_COMMAND_LIMIT {
            return Ok(CommandLine::TooLong);
        }
        if buf.iter().any(|&b| b >= 0x80) {
            return Ok(CommandLine::NonAscii);
        }
        let text = String::from_utf8(buf).expect("ascii verified above");
        let line = text.trim_end();
        let (keyword, argument) = split_command(line);
        Ok(CommandLine::Command(keyword, argument))
    }

    /// Reads one line of a DATA-mode message body, enforcing
    /// `SMTP_TEXT_LINE_LIMIT` and folding any 8-bit byte into its 7-bit
    /// equivalent instead of rejecting it.
    pub async fn read_data_line(&mut self) -> std::io::Result<DataLine> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf).await?;
        if n == 0 || !buf.ends_with(b"\n") {
            return Ok(DataLine::Eof);
        }
        if buf == b".\r\n" {
            return Ok(DataLine::Terminator);
        }
        if buf.len() > SMTP_TEXT_LINE_LIMIT {
            return Ok(DataLine::TooLong);
        }
        let text: String = buf
            .iter()
            .map(|&b| if b >= 0x80 { (b & 0x7F) as char } else { b as char })
            .collect();
        Ok(DataLine::Line(text))
    }
}

fn split_command(line: &str) -> (String, String) {
    let command = if line.len() >= 4 {
        line[..4].to_ascii_uppercase()
    } else {
        line.to_ascii_uppercase()
    };
    let arguments = if line.len() > 5 { line[5..].to_string() } else { String::new() };
    (command, arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::{BufReader, Sink};

    fn protocol_over(input: &str) -> Protocol<BufReader<Cursor<Vec<u8>>>, Sink> {
        Protocol::new(BufReader::new(Cursor::new(input.as_bytes().to_vec())), tokio::io::sink())
    }

    #[tokio::test]
    async fn reads_keyword_and_argument() {
        let mut p = protocol_over("MAIL FROM:<a@b.com>\r\n");
        match p.read_command().await.unwrap() {
            CommandLine::Command(cmd, args) => {
                assert_eq!(cmd, "MAIL");
                assert_eq!(args, "FROM:<a@b.com>");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn short_line_does_not_panic() {
        let mut p = protocol_over("ab\r\n");
        match p.read_command().await.unwrap() {
            CommandLine::Command(cmd, args) => {
                assert_eq!(cmd, "AB");
                assert_eq!(args, "");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_8bit_character() {
        let bytes = b"NOOP \xe9\r\n".to_vec();
        let mut p = Protocol::new(BufReader::new(Cursor::new(bytes)), tokio::io::sink());
        assert_eq!(p.read_command().await.unwrap(), CommandLine::NonAscii);
    }

    #[tokio::test]
    async fn rejects_command_line_too_long() {
        let long = "NOOP ".to_string() + &"a".repeat(SMTP_COMMAND_LIMIT) + "\r\n";
        let mut p = protocol_over(&long);
        assert_eq!(p.read_command().await.unwrap(), CommandLine::TooLong);
    }

    #[tokio::test]
    async fn data_line_terminator_detected() {
        let mut p = protocol_over(".\r\n");
        assert_eq!(p.read_data_line().await.unwrap(), DataLine::Terminator);
    }

    #[tokio::test]
    async fn data_line_8bit_is_masked_not_rejected() {
        let bytes = b"hi\xe9\r\n".to_vec();
        let mut p = Protocol::new(BufReader::new(Cursor::new(bytes)), tokio::io::sink());
        match p.read_data_line().await.unwrap() {
            DataLine::Line(text) => assert_eq!(text, "hi\x69\r\n"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn eof_before_terminator_is_reported() {
        let mut p = protocol_over("partial line no newline");
        assert_eq!(p.read_data_line().await.unwrap(), DataLine::Eof);
    }
}

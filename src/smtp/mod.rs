//! SMTP server: listens for connections, frames commands, dispatches them
//! against per-session state, and appends accepted messages to the mbox
//! sink. No message is ever relayed, queued, or delivered.

pub mod commands;
pub mod protocol;
pub mod session;
pub mod syntax;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal::unix::{signal, SignalKind};

use crate::config::Config;
use crate::mbox::{MailRecord, MboxWriter};
use protocol::{CommandLine, DataLine, Protocol};
use session::Session;

fn local_fqdn() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Runs the accept loop until SIGINT or SIGTERM is received. Returns
/// `Ok(())` on a clean shutdown; an `Err` here (always a listener bind
/// failure) is the only case the caller treats as a startup error.
pub async fn run(config: Config) -> Result<()> {
    let mbox = Arc::new(MboxWriter::new(config.output.clone()));
    let addr = std::net::SocketAddr::new(config.bind, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    info!("SMTP server listening on {addr}");

    let fqdn: Arc<str> = Arc::from(local_fqdn());
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        info!("new connection from {peer}");
                        let mbox = Arc::clone(&mbox);
                        let fqdn = Arc::clone(&fqdn);
                        tokio::spawn(async move {
                            if let Err(e) = run_session(stream, mbox, fqdn).await {
                                warn!("session with {peer} ended with error: {e:#}");
                            }
                        });
                    }
                    Err(e) => error!("error accepting connection: {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                return Ok(());
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                return Ok(());
            }
        }
    }
}

/// Drives one connection end to end: greeting, command loop, and (while in
/// DATA mode) body collection, writing exactly one mbox record per
/// successfully terminated transaction.
async fn run_session(stream: TcpStream, mbox: Arc<MboxWriter>, fqdn: Arc<str>) -> Result<()> {
    let (read_half, write_half) = tokio::io::split(stream);
    let mut protocol = Protocol::new(tokio::io::BufReader::new(read_half), write_half);

    info!("connection opened");
    protocol.write_greeting(&fqdn).await?;

    let mut session = Session::new();
    loop {
        match protocol.read_command().await? {
            CommandLine::Eof => break,
            CommandLine::TooLong => {
                protocol
                    .write_reply(&commands::Reply::syntax_error("Line too long."))
                    .await?;
            }
            CommandLine::NonAscii => {
                protocol
                    .write_reply(&commands::Reply::syntax_error_in_params("Unexpected 8 bit character"))
                    .await?;
            }
            CommandLine::Command(command, arguments) => {
                debug!("received {command} {arguments}");
                let reply = commands::dispatch(&mut session, &command, &arguments, &fqdn);
                debug!("replying {} {}", reply.code, reply.text);
                let code = reply.code;
                protocol.write_reply(&reply).await?;
                if code == 221 {
                    break;
                }
                if code == 354 {
                    match collect_data(&mut protocol, &mut session, &mbox).await? {
                        DataOutcome::Eof => break,
                        DataOutcome::Continue => {}
                    }
                }
            }
        }
    }

    info!("connection closed");
    Ok(())
}

enum DataOutcome {
    Continue,
    Eof,
}

/// Collects DATA-mode text lines until the `.` terminator, an oversized
/// line, or EOF. A terminated transaction is written to the mbox sink and
/// the session is reset (preserving `greeted`); an oversized line aborts
/// the transaction back to command mode without writing anything; EOF
/// silently discards the in-progress transaction and ends the connection.
async fn collect_data<R, W>(
    protocol: &mut Protocol<R, W>,
    session: &mut Session,
    mbox: &MboxWriter,
) -> Result<DataOutcome>
where
    R: tokio::io::AsyncBufReadExt + Unpin,
    W: tokio::io::AsyncWriteExt + Unpin,
{
    loop {
        match protocol.read_data_line().await? {
            DataLine::Terminator => {
                session.date = Some(chrono::Utc::now());
                protocol.write_reply(&commands::Reply::ok("OK")).await?;
                let record = MailRecord::from_session(session);
                if let Err(e) = mbox.write_record(&record).await {
                    warn!("failed to write mbox record: {e}");
                }
                let greeted = session.greeted;
                *session = Session::new();
                session.greeted = greeted;
                return Ok(DataOutcome::Continue);
            }
            DataLine::TooLong => {
                protocol
                    .write_reply(&commands::Reply::syntax_error("Line too long."))
                    .await?;
                return Ok(DataOutcome::Continue);
            }
            DataLine::Eof => return Ok(DataOutcome::Eof),
            DataLine::Line(text) => session.add_line(&text),
        }
    }
}

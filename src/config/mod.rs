//! Command-line configuration: bind address, port, and output sink.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::smtp::syntax::SMTP_PORT;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "A test-only SMTP receiver that appends accepted mail to an mbox sink instead of delivering it."
)]
struct Cli {
    /// File to append accepted mail to, in mbox format. "-" writes to stdout.
    #[arg(short = 'o', long = "output-filename", default_value = "-")]
    output_filename: String,

    /// Address to bind the SMTP listener to.
    #[arg(short = 'b', long = "bind", default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to listen on.
    #[arg(short = 'p', long = "port", default_value_t = SMTP_PORT)]
    port: u16,
}

/// Where accepted mail is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub output: OutputTarget,
}

impl Config {
    pub fn from_args() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        let output = if cli.output_filename == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(cli.output_filename))
        };
        Config { bind: cli.bind, port: cli.port, output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_to_loopback_and_stdout() {
        let cli = Cli::parse_from(["fakesmtpd"]);
        let config = Config::from_cli(cli);
        assert_eq!(config.bind, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(config.port, SMTP_PORT);
        assert_eq!(config.output, OutputTarget::Stdout);
    }

    #[test]
    fn output_filename_other_than_dash_is_a_file() {
        let cli = Cli::parse_from(["fakesmtpd", "-o", "mail.mbox"]);
        let config = Config::from_cli(cli);
        assert_eq!(config.output, OutputTarget::File(PathBuf::from("mail.mbox")));
    }

    #[test]
    fn bind_and_port_are_overridable() {
        let cli = Cli::parse_from(["fakesmtpd", "--bind", "0.0.0.0", "--port", "2525"]);
        let config = Config::from_cli(cli);
        assert_eq!(config.bind, "0.0.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(config.port, 2525);
    }
}

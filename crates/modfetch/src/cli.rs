use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "modfetch", version, about = "Resumable, verified downloads of large model files")]
pub struct Cli {
    /// Path to a `modfetch.toml` config file. Missing is not an error.
    #[arg(long, global = true, default_value = "modfetch.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a file, resuming an in-progress transfer if one exists.
    Get {
        url: String,

        /// Destination path. Derived from `Content-Disposition`/the URL when omitted.
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Expected SHA-256 hex digest; mismatch fails the download after one repair pass.
        #[arg(long)]
        sha256: Option<String>,

        /// Ignore any existing staging file/chunk state and start over.
        #[arg(long)]
        resume: bool,
    },
    /// Report the last known status of a download targeting `dest`.
    Status { dest: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_with_all_flags() {
        let cli = Cli::parse_from(["modfetch", "get", "https://example.com/f", "--dest", "f.bin", "--sha256", "deadbeef", "--resume"]);
        match cli.command {
            Command::Get { url, dest, sha256, resume } => {
                assert_eq!(url, "https://example.com/f");
                assert_eq!(dest, Some(PathBuf::from("f.bin")));
                assert_eq!(sha256, Some("deadbeef".to_string()));
                assert!(resume);
            }
            _ => panic!("expected Get"),
        }
    }

    #[test]
    fn parses_status() {
        let cli = Cli::parse_from(["modfetch", "status", "f.bin"]);
        match cli.command {
            Command::Status { dest } => assert_eq!(dest, PathBuf::from("f.bin")),
            _ => panic!("expected Status"),
        }
    }
}

//! shadowdesk-send: post a ticket to a running relay.
//!
//! Reads the body from a file or stdin and picks the content type the
//! relay understands: JSON objects go as application/json, anything else
//! as text/plain. Handy for mail hooks and for testing the voice setup.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use reqwest::Client;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    /// Detect from the body
    Auto,
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "shadowdesk-send", about = "Send a ticket to a shadowdesk relay")]
struct Args {
    /// File to send (stdin when omitted)
    file: Option<PathBuf>,

    /// Webhook URL
    #[arg(short, long, default_value = "http://127.0.0.1:5000/webhook")]
    url: String,

    /// Content type to declare
    #[arg(short, long, value_enum, default_value_t = Kind::Auto)]
    kind: Kind,

    /// Seconds to wait for the announcement to finish
    #[arg(short, long, default_value_t = 120)]
    timeout: u64,
}

fn content_type(kind: Kind, body: &[u8]) -> &'static str {
    match kind {
        Kind::Json => "application/json",
        Kind::Text => "text/plain; charset=utf-8",
        Kind::Auto => match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(_)) => "application/json",
            _ => "text/plain; charset=utf-8",
        },
    }
}

fn read_body(file: Option<&PathBuf>) -> std::io::Result<Vec<u8>> {
    match file {
        Some(path) => std::fs::read(path),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let body = match read_body(args.file.as_ref()) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to read input: {e}");
            return ExitCode::FAILURE;
        }
    };
    let content_type = content_type(args.kind, &body);

    let client = Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .unwrap_or_else(|_| Client::new());

    let resp = match client
        .post(&args.url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(body)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Request to {} failed: {e}", args.url);
            return ExitCode::FAILURE;
        }
    };

    let status = resp.status();
    if status.is_success() {
        println!("{status} ({content_type})");
        ExitCode::SUCCESS
    } else {
        let detail = resp.text().await.unwrap_or_default();
        eprintln!("{status}: {detail}");
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_detects_json_objects_only() {
        assert_eq!(content_type(Kind::Auto, br#"{"Name":"Cody"}"#), "application/json");
        assert_eq!(content_type(Kind::Auto, b"[1,2]"), "text/plain; charset=utf-8");
        assert_eq!(content_type(Kind::Auto, b"printer on fire"), "text/plain; charset=utf-8");
    }

    #[test]
    fn explicit_kind_wins() {
        assert_eq!(content_type(Kind::Json, b"not json"), "application/json");
        assert_eq!(content_type(Kind::Text, br#"{"a":"b"}"#), "text/plain; charset=utf-8");
    }
}

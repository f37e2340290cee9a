//! Dispatch a single SOAP message against the built-in calculator endpoint.
//!
//! ```bash
//! # Route by action
//! actionwire-dispatch request.xml --action 'urn:actionwire:calculator#add'
//!
//! # Route by payload root, reading the envelope from stdin
//! cat divmod.xml | actionwire-dispatch
//!
//! # Send a bare payload as an unparsed stream
//! actionwire-dispatch add.xml --raw --action 'urn:actionwire:calculator#add'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use actionwire_core::{InboundMessage, PayloadSource};
use actionwire_server::codec::XmlCodec;
use actionwire_server::demo::Calculator;
use actionwire_server::service::{
    build_dispatch_pipeline, DispatchConfig, EndpointRegistry, DEFAULT_ACTION_TRIM_CHARS,
};
use actionwire_server::telemetry::{init_tracing, LogFormat};
use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use tokio::io::{AsyncRead, AsyncReadExt};
use tower::ServiceExt;

#[derive(Parser, Debug)]
#[command(name = "actionwire-dispatch")]
#[command(about = "Dispatch one SOAP message and print the response envelope")]
struct Args {
    /// Envelope file (reads stdin if not provided)
    input: Option<PathBuf>,

    /// Action (SOAPAction) of the message
    #[arg(long, short = 'a', env = "ACTIONWIRE_ACTION")]
    action: Option<String>,

    /// Treat the input as a bare payload and pass it unparsed
    #[arg(long)]
    raw: bool,

    /// Characters trimmed from both ends of the action
    #[arg(long, env = "ACTIONWIRE_TRIM_CHARS", default_value = DEFAULT_ACTION_TRIM_CHARS)]
    trim_chars: String,

    /// Do not route messages without an action by their payload root
    #[arg(long, env = "ACTIONWIRE_NO_ROOT_FALLBACK")]
    no_root_fallback: bool,

    /// Log output format
    #[arg(long, env = "ACTIONWIRE_LOG_FORMAT", default_value = "text", value_enum)]
    log_format: LogFormat,

    /// Log filter directive (overrides RUST_LOG)
    #[arg(long, env = "ACTIONWIRE_LOG")]
    log_filter: Option<String>,
}

impl Args {
    fn config(&self) -> DispatchConfig {
        DispatchConfig {
            action_trim_chars: self.trim_chars.clone(),
            payload_root_fallback: !self.no_root_fallback,
        }
    }

    async fn read_input(&self) -> anyhow::Result<String> {
        match &self.input {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display())),
            None => read_all(tokio::io::stdin()).await.context("failed to read stdin"),
        }
    }

    fn message(&self, input: String) -> anyhow::Result<InboundMessage> {
        if self.raw {
            let mut message = InboundMessage::new(PayloadSource::Stream(Bytes::from(input)));
            message.action.clone_from(&self.action);
            return Ok(message);
        }
        InboundMessage::from_envelope(&input, self.action.as_deref())
            .context("input is not a SOAP envelope")
    }
}

async fn read_all(mut reader: impl AsyncRead + Unpin) -> std::io::Result<String> {
    let mut input = String::new();
    reader.read_to_string(&mut input).await?;
    Ok(input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format, args.log_filter.as_deref())?;

    let endpoints = Arc::new(EndpointRegistry::new());
    endpoints.register("calculator", Calculator)?;
    let pipeline = build_dispatch_pipeline(endpoints, Arc::new(XmlCodec::new()), args.config())?;

    let message = args.message(args.read_input().await?)?;
    let response = pipeline.oneshot(message).await?;
    println!("{}", response.into_envelope());
    Ok(())
}

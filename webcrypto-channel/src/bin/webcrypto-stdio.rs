use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};
use webcrypto::CryptoEngine;
use webcrypto_channel::{init_tracing, ChannelError, LogFormat, MethodCall, MethodHandler, MethodResponse, WebCryptoChannel};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Serve WebCrypto method calls as newline-delimited JSON over stdin/stdout
#[derive(Parser, Debug)]
#[command(name = "webcrypto-stdio")]
#[command(about = "WebCrypto engine behind a line-oriented JSON method channel")]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format (logs always go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "WEBCRYPTO_LOG_FORMAT")]
    log_format: LogFormat,
}

async fn respond(channel: &WebCryptoChannel, line: &str) -> MethodResponse {
    match serde_json::from_str::<MethodCall>(line) {
        Ok(call) => channel.handle(call).await,
        Err(err) => MethodResponse::failure(None, &ChannelError::from(err)),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();
    init_tracing(args.verbose, args.log_format)?;

    let engine = CryptoEngine::from_env().inspect_err(|e| error!("engine configuration rejected: {e}"))?;
    info!(version = env!("CARGO_PKG_VERSION"), "webcrypto channel ready");
    let channel = WebCryptoChannel::new(engine);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = respond(&channel, &line).await;
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        stdout.write_all(&encoded).await?;
        stdout.flush().await?;
    }

    debug!(keys = channel.keys().len(), "stdin closed");
    Ok(())
}

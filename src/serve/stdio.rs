//! Newline-delimited JSON-RPC over stdin/stdout.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::shutdown_signal;
use crate::McpHandler;

/// Serves on the process's stdin and stdout until EOF or a shutdown signal.
pub async fn serve(handler: McpHandler) -> Result<()> {
    info!("serving MCP on stdio");
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tokio::select! {
        result = run(handler, reader, writer) => result,
        _ = shutdown_signal() => Ok(()),
    }
}

/// Reads one message per line from `reader` and writes one response per line
/// to `writer`.
///
/// Requests are handled concurrently, so responses may come back in a
/// different order than the requests; clients match them by `id`.
pub async fn run<R, W>(handler: McpHandler, reader: R, writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(64);
    let writer_task = tokio::spawn(write_lines(writer, rx));

    let mut tasks = JoinSet::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let handler = handler.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            if let Some(response) = handler.handle_text(&line).await {
                if tx.send(response.to_string()).await.is_err() {
                    debug!("stdout closed, dropping response");
                }
            }
        });

        // Reap finished tasks so the set does not grow with the session.
        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                warn!(error = %e, "request task failed");
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "request task failed");
        }
    }
    drop(tx);

    writer_task.await.context("stdout writer panicked")??;
    debug!("stdin closed");
    Ok(())
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

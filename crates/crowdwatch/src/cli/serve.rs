//! Line-oriented request loop.
//!
//! Each input line is one JSON [`Request`](crate::dispatch::Request); each
//! output line is the matching [`Response`](crate::dispatch::Response).

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::dispatch::Dispatcher;
use crate::error::Result;

/// Serve requests from `reader` until end of input.
///
/// Blank lines are skipped. Returns the number of requests answered.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub async fn serve_lines<R, W>(dispatcher: &Dispatcher, reader: R, mut writer: W) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Serving requests ({} backend)", dispatcher.store().backend_name());

    let mut lines = reader.lines();
    let mut served = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = dispatcher.handle_json(&line);
        debug!("Request answered with status {}", response.status);

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        served += 1;
    }

    info!("Input closed after {served} requests");
    Ok(served)
}

//! Newline-delimited stdio transport.
//!
//! Requests are read one line at a time and handled in order; each
//! response is written as a single line and flushed. Logging must go to
//! stderr since stdout carries the protocol.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::protocol::{JsonRpcError, JsonRpcResponse, PARSE_ERROR};
use crate::server::McpServer;

/// Lines longer than this are answered with a parse error and skipped.
pub const MAX_LINE_BYTES: usize = 4 * 1024 * 1024;

/// One newline-terminated message read from the input.
enum Frame {
    Line(Vec<u8>),
    /// The line went past [`MAX_LINE_BYTES`]; the rest of it was discarded.
    Oversized,
}

/// Read the next line, holding at most `MAX_LINE_BYTES + 1` bytes of it.
/// `None` at EOF.
async fn next_frame<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<Frame>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Some(Frame::Line(std::mem::take(buf))));
    }
    if buf.len() <= MAX_LINE_BYTES {
        // Final line without a trailing newline.
        return Ok(Some(Frame::Line(std::mem::take(buf))));
    }

    // Skip the remainder of the oversized line without buffering it.
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            break;
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                break;
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
    Ok(Some(Frame::Oversized))
}

fn parse_error(message: String) -> JsonRpcResponse {
    JsonRpcResponse::failure(
        serde_json::Value::Null,
        JsonRpcError::new(PARSE_ERROR, message),
    )
}

/// Serve until `reader` reaches EOF.
pub async fn serve<R, W>(server: &McpServer, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled = 0u64;

    while let Some(frame) = next_frame(&mut reader, &mut buf).await? {
        let response = match frame {
            Frame::Oversized => {
                tracing::warn!(limit = MAX_LINE_BYTES, "oversized message");
                Some(parse_error(format!("message exceeds {MAX_LINE_BYTES} bytes")))
            }
            Frame::Line(bytes) => match std::str::from_utf8(&bytes) {
                Ok(line) => server.handle_line(line).await,
                Err(e) => {
                    tracing::warn!(error = %e, "message is not valid UTF-8");
                    Some(parse_error(format!("Parse error: {e}")))
                }
            },
        };

        if let Some(response) = response {
            let json = serde_json::to_string(&response)?;
            writer.write_all(json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        handled += 1;
    }

    tracing::info!(messages = handled, "input closed");
    Ok(())
}

/// Serve over the process's stdin and stdout.
pub async fn serve_stdio(server: &McpServer) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(server, stdin, stdout).await
}

//! Line transport from child process pipes

use loadrig_core::OutputStream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::IpcError;
use crate::protocol::OutputLine;

/// Channel the reader tasks feed
pub type LineSender = mpsc::Sender<Result<OutputLine, IpcError>>;

/// Read `reader` line by line into `tx` until EOF, a read error or the receiver going away
///
/// Bytes are decoded lossily, trailing CR/LF is stripped and blank lines
/// are skipped. A read error is forwarded once and ends the task.
pub fn spawn_line_reader<R>(reader: R, stream: OutputStream, tx: LineSender) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!("{} closed", stream);
                    break;
                }
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let text = text.trim_end_matches(['\r', '\n']);
                    if text.trim().is_empty() {
                        continue;
                    }
                    if tx.send(Ok(OutputLine::new(stream, text))).await.is_err() {
                        debug!("Line receiver dropped, stopping {} reader", stream);
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read runner {}: {}", stream, e);
                    let _ = tx.send(Err(IpcError::from(e))).await;
                    break;
                }
            }
        }
    })
}

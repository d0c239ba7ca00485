use std::future::Future;
use std::pin::Pin;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use meterflow_api::{AdapterError, MessageSink};

use crate::framing::encode_line;
use crate::reference::StreamRef;

type Writer = Box<dyn AsyncWrite + Send + Unpin>;

/// Sink: одна запись = одна строка. Flush после каждой записи,
/// чтобы успешный publish означал, что строка ушла из процесса.
pub struct LineSink {
    writer: Mutex<Writer>,
}

impl LineSink {
    pub(crate) async fn open(reference: StreamRef) -> Result<Self, AdapterError> {
        let name = reference.to_string();
        let writer: Writer = match reference {
            StreamRef::Stdio => Box::new(tokio::io::stdout()),
            StreamRef::File(path) => {
                let file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await
                    .map_err(|e| AdapterError::io(format!("open {}: {e}", path.display())))?;
                Box::new(file)
            }
            StreamRef::Tcp(addr) => {
                let stream = TcpStream::connect(&addr)
                    .await
                    .map_err(|e| AdapterError::io(format!("TCP connect to {addr}: {e}")))?;
                tracing::info!(sink = %name, "tcp connected");
                Box::new(stream)
            }
            StreamRef::TcpListen(_) => {
                return Err(AdapterError::config(format!(
                    "{name}: tcp-listen is only supported as input"
                )));
            }
        };

        Ok(Self { writer: Mutex::new(writer) })
    }
}

impl MessageSink for LineSink {
    fn publish(&self, payload: Vec<u8>) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(async move {
            let frame = encode_line(&payload);
            let mut writer = self.writer.lock().await;
            writer.write_all(&frame).await?;
            writer.flush().await?;
            Ok(())
        })
    }

    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(async {
            self.writer.lock().await.flush().await?;
            Ok(())
        })
    }
}

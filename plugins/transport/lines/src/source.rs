use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::{CancellationToken, DropGuard};

use meterflow_api::{AckHandle, AdapterError, Message, MessageSource};

use crate::LinesConfig;
use crate::framing::{Frame, LineDecoder};
use crate::reference::StreamRef;

type Line = Result<Vec<u8>, AdapterError>;

// ═══════════════════════════════════════════════════════════════
//  LineSource
// ═══════════════════════════════════════════════════════════════

/// Source поверх построчного потока.
///
/// Читатели работают в фоновых задачах и складывают строки в bounded
/// канал. Конец потока: когда все читатели завершились (tcp-listen не
/// завершается сам). Ack ничего не делает: повторной доставки нет.
pub struct LineSource {
    rx: Mutex<mpsc::Receiver<Line>>,
    next_id: AtomicU64,
    local_addr: Option<SocketAddr>,
    _shutdown: DropGuard,
}

impl LineSource {
    pub(crate) async fn open(reference: StreamRef, config: &LinesConfig) -> Result<Self, AdapterError> {
        let name = reference.to_string();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(config.buffer.max(1));
        let decoder = LineDecoder::new(config.max_length);
        let mut local_addr = None;

        match reference {
            StreamRef::Stdio => {
                spawn_reader(name.clone(), tokio::io::stdin(), decoder, tx, true, token.clone());
            }
            StreamRef::File(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| AdapterError::io(format!("open {}: {e}", path.display())))?;
                spawn_reader(name.clone(), file, decoder, tx, true, token.clone());
            }
            StreamRef::Tcp(addr) => {
                let stream = TcpStream::connect(&addr)
                    .await
                    .map_err(|e| AdapterError::io(format!("TCP connect to {addr}: {e}")))?;
                tracing::info!(source = %name, "tcp connected");
                spawn_reader(name.clone(), stream, decoder, tx, true, token.clone());
            }
            StreamRef::TcpListen(addr) => {
                let listener = TcpListener::bind(&addr)
                    .await
                    .map_err(|e| AdapterError::io(format!("bind {addr}: {e}")))?;
                local_addr = listener.local_addr().ok();
                tracing::info!(source = %name, addr = ?local_addr, "listening");
                spawn_acceptor(name.clone(), listener, decoder, tx, token.clone());
            }
        }

        Ok(Self {
            rx: Mutex::new(rx),
            next_id: AtomicU64::new(1),
            local_addr,
            _shutdown: token.drop_guard(),
        })
    }

    /// Фактический адрес для `tcp-listen://` (полезно при порте 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl MessageSource for LineSource {
    fn pull(&self) -> Pin<Box<dyn Future<Output = Result<Option<Message>, AdapterError>> + Send + '_>> {
        Box::pin(async {
            let mut rx = self.rx.lock().await;
            match rx.recv().await {
                Some(Ok(payload)) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(Message { payload, ack: AckHandle::new(id) }))
                }
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        })
    }

    fn ack(&self, _handle: AckHandle) -> Pin<Box<dyn Future<Output = Result<(), AdapterError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Background tasks
// ═══════════════════════════════════════════════════════════════

/// Accept loop: каждое соединение читается своей задачей в общий канал.
fn spawn_acceptor(
    name: String,
    listener: TcpListener,
    decoder: LineDecoder,
    tx: mpsc::Sender<Line>,
    token: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!(source = %name, %peer, "new connection");
                        let conn_name = format!("{name} {peer}");
                        spawn_reader(conn_name, stream, decoder.clone(), tx.clone(), false, token.clone());
                    }
                    Err(e) => {
                        tracing::error!(source = %name, error = ?e, "accept error");
                        tokio::select! {
                            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                            _ = token.cancelled() => break,
                        }
                    }
                },
                _ = token.cancelled() => break,
            }
        }
        tracing::info!(source = %name, "listener stopped");
    });
}

/// Чтение одного потока. `fatal`: ошибка чтения уходит в pull() и
/// останавливает runner; иначе только закрывает это соединение.
fn spawn_reader<R>(
    name: String,
    mut reader: R,
    mut decoder: LineDecoder,
    tx: mpsc::Sender<Line>,
    fatal: bool,
    token: CancellationToken,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::with_capacity(8192);
        let mut tmp = [0u8; 4096];

        loop {
            while let Some(frame) = decoder.decode(&mut buf) {
                if !deliver(&name, frame, &tx).await {
                    return;
                }
            }

            let read = tokio::select! {
                read = reader.read(&mut tmp) => read,
                _ = token.cancelled() => return,
            };

            match read {
                Ok(0) => break,
                Ok(n) => buf.extend_from_slice(&tmp[..n]),
                Err(e) => {
                    tracing::error!(source = %name, error = ?e, "read error");
                    if fatal {
                        let _ = tx.send(Err(AdapterError::io(format!("{name}: read: {e}")))).await;
                    }
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish(&mut buf) {
            deliver(&name, frame, &tx).await;
        }
        tracing::info!(source = %name, "end of stream");
    });
}

/// false = получатель закрыт, читать дальше незачем.
async fn deliver(name: &str, frame: Frame, tx: &mpsc::Sender<Line>) -> bool {
    match frame {
        Frame::Line(line) => tx.send(Ok(line)).await.is_ok(),
        Frame::TooLong(len) => {
            tracing::warn!(source = %name, len, "line exceeds max_length, skipping");
            true
        }
    }
}

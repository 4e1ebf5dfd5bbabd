//! One debugger connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use simstub_rsp::{Action, Engine, ResumeRequest, SessionConfig, StopReason};
use simstub_target::TargetAdapter;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ServerError;

const READ_CHUNK: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Serve a debugger over `stream` until it detaches or disconnects.
///
/// The target stays locked only while a command is dispatched or while
/// it runs; a resume executes on the blocking pool so `0x03` from the
/// debugger can interrupt it.
pub async fn handle_connection<S, T>(
    stream: S,
    target: Arc<Mutex<T>>,
    config: SessionConfig,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    T: TargetAdapter + Send + 'static,
{
    let mut engine = Engine::new(config);
    {
        let mut guard = target.lock().await;
        engine.attach(&mut *guard)?;
    }

    let (mut reader, mut writer) = tokio::io::split(stream);
    let result = serve_session(&mut engine, &target, &mut reader, &mut writer).await;
    engine.detach();
    result
}

async fn serve_session<R, W, T>(
    engine: &mut Engine,
    target: &Arc<Mutex<T>>,
    reader: &mut R,
    writer: &mut W,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    T: TargetAdapter + Send + 'static,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            info!("debugger closed the connection");
            return Ok(());
        }
        engine.receive(&buf[..n]);
        if drain(engine, target, reader, writer, &mut buf).await? == Flow::Close {
            return Ok(());
        }
    }
}

async fn drain<R, W, T>(
    engine: &mut Engine,
    target: &Arc<Mutex<T>>,
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
) -> Result<Flow, ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    T: TargetAdapter + Send + 'static,
{
    loop {
        let actions = {
            let mut guard = target.lock().await;
            match engine.poll(&mut *guard) {
                Some(actions) => actions,
                None => return Ok(Flow::Continue),
            }
        };

        for action in actions {
            match action {
                Action::Transmit(bytes) => {
                    writer.write_all(&bytes).await?;
                    writer.flush().await?;
                }
                Action::Resume(request) => {
                    let Some(stop) = run_target(request, target, engine, reader, buf).await? else {
                        info!("debugger disconnected while the target was running");
                        return Ok(Flow::Close);
                    };
                    let frame = engine.complete_resume(stop);
                    writer.write_all(&frame).await?;
                    writer.flush().await?;
                }
                Action::Close => return Ok(Flow::Close),
            }
        }
    }
}

/// Run `request` on the blocking pool while watching the socket.
///
/// Returns `None` if the debugger disconnected; the target has been
/// interrupted and has stopped by then. Everything read meanwhile is
/// queued on the engine; a `0x03` outside a frame, including one that
/// arrived together with the resume packet, interrupts the run.
async fn run_target<R, T>(
    request: ResumeRequest,
    target: &Arc<Mutex<T>>,
    engine: &mut Engine,
    reader: &mut R,
    buf: &mut [u8],
) -> Result<Option<StopReason>, ServerError>
where
    R: AsyncRead + Unpin,
    T: TargetAdapter + Send + 'static,
{
    let pending = engine.take_pending_interrupt();
    if pending {
        debug!("interrupt queued behind resume");
    }
    let interrupt = Arc::new(AtomicBool::new(pending));
    let flag = Arc::clone(&interrupt);
    let shared = Arc::clone(target);
    let mut job = tokio::task::spawn_blocking(move || {
        let mut guard = shared.blocking_lock();
        request.run(&mut *guard, &flag)
    });

    loop {
        tokio::select! {
            joined = &mut job => {
                return joined
                    .map(Some)
                    .map_err(|err| ServerError::TaskFailed(err.to_string()));
            }
            read = reader.read(buf) => {
                let n = match read {
                    Ok(n) => n,
                    Err(err) => {
                        interrupt.store(true, Ordering::Release);
                        let _ = (&mut job).await;
                        return Err(err.into());
                    }
                };
                if n == 0 {
                    interrupt.store(true, Ordering::Release);
                    (&mut job).await.map_err(|err| ServerError::TaskFailed(err.to_string()))?;
                    return Ok(None);
                }
                engine.receive(&buf[..n]);
                if engine.take_pending_interrupt() {
                    debug!("interrupt requested");
                    interrupt.store(true, Ordering::Release);
                }
            }
        }
    }
}

//! TCP listener serving one debugger at a time.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use simstub_target::TargetAdapter;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::connection::handle_connection;
use crate::error::ServerError;
use crate::options::ServerOptions;

/// Listens for debuggers and serves them against a shared target.
///
/// Only one session runs at a time. A debugger that connects while another
/// is attached is accepted and immediately disconnected.
pub struct Server<T> {
    listener: TcpListener,
    target: Arc<Mutex<T>>,
    options: ServerOptions,
    active: Arc<AtomicBool>,
}

/// Clears the active flag when a session task ends, however it ends.
struct ActiveSession(Arc<AtomicBool>);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// How long to wait after a failed `accept` before trying again.
///
/// A peer that gave up during the handshake costs nothing; running out of
/// descriptors or memory needs time for sessions to release them.
fn accept_backoff(err: &io::Error) -> Duration {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => Duration::ZERO,
        _ => Duration::from_millis(100),
    }
}

impl<T> Server<T>
where
    T: TargetAdapter + Send + 'static,
{
    /// Bind the listening socket.
    pub async fn bind(options: ServerOptions, target: Arc<Mutex<T>>) -> Result<Self, ServerError> {
        let address = options.socket_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;
        Ok(Self {
            listener,
            target,
            options,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// The address actually bound; useful when the port was `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// The shared target.
    pub fn target(&self) -> Arc<Mutex<T>> {
        Arc::clone(&self.target)
    }

    /// Accept debuggers forever.
    pub async fn serve(self) -> Result<(), ServerError> {
        self.serve_until(std::future::pending()).await
    }

    /// Accept debuggers until `shutdown` completes.
    ///
    /// A failed `accept` is logged and retried; only `shutdown` ends the
    /// loop. A session in progress at shutdown is left to finish on its
    /// own task.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr()?, "waiting for debugger");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down listener");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer),
                    Err(err) => {
                        let delay = accept_backoff(&err);
                        warn!(%err, ?delay, "accept failed");
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(%peer, "refusing debugger: a session is already active");
            drop(stream);
            return;
        }

        if let Err(err) = stream.set_nodelay(true) {
            warn!(%peer, %err, "cannot disable Nagle's algorithm");
        }
        info!(%peer, "debugger connected");
        let guard = ActiveSession(Arc::clone(&self.active));
        let target = Arc::clone(&self.target);
        let config = self.options.session.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match handle_connection(stream, target, config).await {
                Ok(()) => info!(%peer, "session ended"),
                Err(err) => error!(%peer, %err, "session failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simstub_rsp::codec::encode;
    use simstub_target::{AdapterFault, Execution, FlatTarget, FlatTargetConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    /// Never leaves its program counter; runs until interrupted.
    #[derive(Debug, Default)]
    struct Spinner {
        registers: [u64; 2],
        halted: bool,
    }

    impl TargetAdapter for Spinner {
        fn is_big_endian(&self) -> bool {
            false
        }
        fn halt(&mut self) {
            self.halted = true;
        }
        fn register_count(&self) -> usize {
            2
        }
        fn register_width(&self) -> usize {
            4
        }
        fn pc_register(&self) -> usize {
            1
        }
        fn read_register(&self, index: usize) -> u64 {
            self.registers[index]
        }
        fn write_register(&mut self, index: usize, value: u64) {
            self.registers[index] = value;
        }
        fn set_program_counter(&mut self, value: u64) {
            self.registers[1] = value;
        }
        fn read_byte(&self, _address: u64) -> u8 {
            0
        }
        fn write_byte(&mut self, _address: u64, _byte: u8) {}
        fn step(&mut self) -> Result<Execution, AdapterFault> {
            self.halted = false;
            Ok(Execution::Executed)
        }
    }

    fn options() -> ServerOptions {
        ServerOptions {
            bind_address: "127.0.0.1".into(),
            port: 0,
            ..Default::default()
        }
    }

    async fn start<T: TargetAdapter + Send + 'static>(target: T) -> (SocketAddr, Arc<Mutex<T>>) {
        let server = Server::bind(options(), Arc::new(Mutex::new(target)))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let target = server.target();
        tokio::spawn(server.serve());
        (addr, target)
    }

    async fn read_exactly(stream: &mut TcpStream, len: usize) -> String {
        let mut buf = vec![0u8; len];
        timeout(Duration::from_secs(5), stream.read_exact(&mut buf))
            .await
            .expect("timed out")
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn server_answers_register_read() {
        let (addr, target) = start(FlatTarget::new(FlatTargetConfig {
            register_count: 2,
            pc_register: 1,
            ..Default::default()
        }))
        .await;
        {
            let mut t = target.lock().await;
            t.write_register(0, 1);
            t.write_register(1, 2);
        }

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode(b"g")).await.unwrap();
        assert_eq!(read_exactly(&mut client, 21).await, "+$0100000002000000#03");
    }

    #[tokio::test]
    async fn server_refuses_second_debugger() {
        let (addr, _) = start(FlatTarget::new(FlatTargetConfig::default())).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&encode(b"?")).await.unwrap();
        assert_eq!(read_exactly(&mut first, 8).await, "+$S05#b8");

        let mut second = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 16];
        let n = timeout(Duration::from_secs(5), second.read(&mut buf))
            .await
            .expect("timed out")
            .unwrap_or(0);
        assert_eq!(n, 0, "second debugger must be disconnected");

        first.write_all(b"+").await.unwrap();
        first.write_all(&encode(b"qAttached")).await.unwrap();
        assert_eq!(read_exactly(&mut first, 6).await, "+$1#31");
    }

    #[tokio::test]
    async fn server_accepts_new_debugger_after_detach() {
        let (addr, _) = start(FlatTarget::new(FlatTargetConfig::default())).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        first.write_all(&encode(b"D")).await.unwrap();
        assert_eq!(read_exactly(&mut first, 7).await, "+$OK#9a");
        let mut rest = Vec::new();
        timeout(Duration::from_secs(5), first.read_to_end(&mut rest))
            .await
            .expect("timed out")
            .unwrap();

        // The session task may still be winding down; retry briefly.
        let mut attempts = 0;
        loop {
            let mut next = TcpStream::connect(addr).await.unwrap();
            next.write_all(&encode(b"?")).await.unwrap();
            let mut buf = [0u8; 8];
            match timeout(Duration::from_secs(5), next.read_exact(&mut buf)).await {
                Ok(Ok(_)) => {
                    assert_eq!(&buf, b"+$S05#b8");
                    break;
                }
                _ if attempts < 50 => {
                    attempts += 1;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                other => panic!("no session after detach: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn server_interrupts_running_target() {
        let (addr, target) = start(Spinner::default()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode(b"c")).await.unwrap();
        assert_eq!(read_exactly(&mut client, 1).await, "+");

        client.write_all(&[0x03]).await.unwrap();
        assert_eq!(read_exactly(&mut client, 7).await, "$S02#b5");
        assert!(target.lock().await.halted);

        client.write_all(b"+").await.unwrap();
        client.write_all(&encode(b"?")).await.unwrap();
        assert_eq!(read_exactly(&mut client, 8).await, "+$S02#b5");
    }

    #[tokio::test]
    async fn server_interrupt_in_same_segment_as_continue() {
        let (addr, target) = start(Spinner::default()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut input = encode(b"c");
        input.push(0x03);
        client.write_all(&input).await.unwrap();
        assert_eq!(read_exactly(&mut client, 8).await, "+$S02#b5");
        assert!(target.lock().await.halted);
    }

    #[tokio::test]
    async fn server_interrupt_behind_queued_packet() {
        let (addr, _) = start(Spinner::default()).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&encode(b"c")).await.unwrap();
        assert_eq!(read_exactly(&mut client, 1).await, "+");

        // The memory write carries a raw 0x03 data byte; only the trailing
        // one is an interrupt. The write is answered after the stop.
        let mut input = encode(b"X10,1:\x03");
        input.push(0x03);
        client.write_all(&input).await.unwrap();
        assert_eq!(read_exactly(&mut client, 7).await, "$S02#b5");
        assert_eq!(read_exactly(&mut client, 7).await, "+$OK#9a");
    }

    #[test]
    fn accept_backoff_depends_on_error() {
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(accept_backoff(&aborted), Duration::ZERO);
        let exhausted = io::Error::new(io::ErrorKind::Other, "too many open files");
        assert!(accept_backoff(&exhausted) > Duration::ZERO);
    }

    #[tokio::test]
    async fn server_bind_failure_reports_address() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let err = Server::bind(
            ServerOptions {
                port,
                ..options()
            },
            Arc::new(Mutex::new(FlatTarget::new(FlatTargetConfig::default()))),
        )
        .await
        .err()
        .expect("bind must fail");
        assert!(matches!(err, ServerError::Bind { .. }));
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }
}

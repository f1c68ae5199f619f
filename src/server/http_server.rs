use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long [`ServerHandle::wait_ready`] polls before giving up
pub const READY_TIMEOUT: Duration = Duration::from_secs(1);

const READY_POLL: Duration = Duration::from_millis(5);

/// Starts any `may_minihttp` service and hands back a [`ServerHandle`]
pub struct HttpServer<T>(pub T);

/// Running accept loop bound to one address
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until the listener accepts TCP connections, up to [`READY_TIMEOUT`]
    pub fn wait_ready(&self) -> io::Result<()> {
        self.wait_ready_for(READY_TIMEOUT)
    }

    /// Block until the listener accepts TCP connections or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `TimedOut` when no connection succeeded in time.
    pub fn wait_ready_for(&self, timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("server on {} not ready after {:?}", self.addr, timeout),
                ));
            }
            thread::sleep(READY_POLL);
        }
    }

    /// Cancel the accept loop and wait for it to exit
    pub fn stop(self) {
        debug!(addr = %self.addr, "Stopping HTTP server");
        // SAFETY: the handle is owned here and the accept loop is meant to
        // end; cancellation is may's only way to stop it.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the accept loop exits on its own.
    ///
    /// # Errors
    ///
    /// The panic payload if the accept coroutine panicked.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Bind the first address `addr` resolves to and start accepting.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `addr` resolves to nothing, otherwise the bind error.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing"))?;
        let handle = MiniHttpServer(self.0).start(addr)?;
        debug!(addr = %addr, "HTTP server started");
        Ok(ServerHandle { addr, handle })
    }
}

//! A fixed-size pool of workers accepting on one shared listening socket.
//!
//! Every worker owns a [`ConnectionProcessor`] and loops independently:
//! accept, serve the connection to completion, accept again. There is no
//! dispatcher; workers race each other on `accept`, so which worker serves
//! which connection is not defined.
//!
//! Workers keep only a weak reference to the listener between accepts. Once
//! the pool drops its own reference during [`WorkerPool::shutdown`] the
//! socket is closed, even if a worker was abandoned mid-connection.

use std::{
    net::SocketAddr,
    sync::{Arc, Weak},
    time::Duration,
};

use mailrelay_tracing::traced;
use tokio::{
    net::{TcpListener, TcpSocket},
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};

use crate::{
    Signal,
    config::ListenerConfig,
    error::ListenerError,
    internal,
    traits::{ConnectionProcessor, ProcessorFactory},
};

/// Pending connection queue length for the listening socket.
pub const LISTEN_BACKLOG: u32 = 50;

/// How long [`WorkerPool::shutdown`] waits for each worker before moving on.
pub const WORKER_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Pause after a failed `accept` so a persistent error does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

/// One long-lived worker: a processor plus the loop that feeds it connections.
pub struct Worker<P: ConnectionProcessor> {
    id: usize,
    processor: P,
    listener: Weak<TcpListener>,
    shutdown: broadcast::Receiver<Signal>,
}

impl<P: ConnectionProcessor> Worker<P> {
    const fn new(id: usize, processor: P, shutdown: broadcast::Receiver<Signal>) -> Self {
        Self {
            id,
            processor,
            listener: Weak::new(),
            shutdown,
        }
    }

    /// Attach this worker to the pool's shared listening socket.
    pub fn bind_socket(&mut self, listener: &Arc<TcpListener>) {
        self.listener = Arc::downgrade(listener);
    }

    /// Accept and serve connections until shutdown is signalled or the
    /// listener has been closed.
    pub async fn run(mut self) {
        internal!("{} worker {} started", P::ty(), self.id);

        loop {
            let Some(listener) = self.listener.upgrade() else {
                break;
            };

            let accepted = tokio::select! {
                biased;

                signal = self.shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown) | Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }

                connection = listener.accept() => connection,
            };

            drop(listener);

            match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("{} worker {} accepted {peer}", P::ty(), self.id);

                    if let Err(err) = self.processor.process(stream, peer).await {
                        internal!(
                            level = ERROR,
                            "{} worker {} failed serving {peer}: {err}",
                            P::ty(),
                            self.id
                        );
                    }
                }
                Err(err) => {
                    let err = ListenerError::AcceptFailed(err);
                    internal!(level = WARN, "{} worker {}: {err}", P::ty(), self.id);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        internal!("{} worker {} finished", P::ty(), self.id);
    }
}

/// Turns one listening port into `threads` independent accepting workers.
pub struct WorkerPool<F: ProcessorFactory> {
    config: ListenerConfig,
    factory: F,
    state: PoolState,
    listener: Option<Arc<TcpListener>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: broadcast::Sender<Signal>,
    shutdown_grace: Duration,
}

impl<F: ProcessorFactory> WorkerPool<F> {
    pub fn new(config: ListenerConfig, factory: F) -> Self {
        let (shutdown, _) = broadcast::channel(1);

        Self {
            config,
            factory,
            state: PoolState::Created,
            listener: None,
            workers: Vec::default(),
            shutdown,
            shutdown_grace: WORKER_SHUTDOWN_GRACE,
        }
    }

    pub const fn state(&self) -> PoolState {
        self.state
    }

    /// The bound address, while the pool holds its listening socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
    }

    fn bind(&self) -> Result<TcpListener, ListenerError> {
        let address = self.config.socket_addr();
        let bind_failed = |source| ListenerError::BindFailed {
            address: address.to_string(),
            source,
        };

        let socket = if address.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_failed)?;

        socket.set_reuseaddr(true).map_err(bind_failed)?;
        socket.bind(address).map_err(bind_failed)?;
        socket.listen(LISTEN_BACKLOG).map_err(bind_failed)
    }

    /// Bind the listening socket and launch the workers.
    ///
    /// A bind failure is logged and leaves the pool in [`PoolState::Created`]
    /// without accepting anything; it is never returned to the caller.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, fields(port = self.config.port)), timing(precision = "ms"))]
    pub async fn start(&mut self) {
        if self.state != PoolState::Created {
            internal!(
                level = WARN,
                "Listener on port {} cannot be started while {:?}",
                self.config.port,
                self.state
            );
            return;
        }

        let listener = match self.bind() {
            Ok(listener) => Arc::new(listener),
            Err(err) => {
                internal!(
                    level = ERROR,
                    "{err}. No connections will be accepted on port {}!",
                    self.config.port
                );
                return;
            }
        };

        internal!(
            level = INFO,
            "Accepting {} connections on {} with {} workers",
            F::Processor::ty(),
            self.config.socket_addr(),
            self.config.threads
        );

        if self.config.threads == 0 {
            internal!(
                level = WARN,
                "Listener on port {} has no workers configured",
                self.config.port
            );
        }

        self.workers = (0..self.config.threads)
            .map(|id| {
                let mut worker = Worker::new(id, self.factory.create(), self.shutdown.subscribe());
                worker.bind_socket(&listener);
                tokio::spawn(worker.run())
            })
            .collect();

        self.listener = Some(listener);
        self.state = PoolState::Running;
    }

    /// Stop every worker and close the listening socket.
    ///
    /// Workers are asked to stop cooperatively, then awaited one at a time for
    /// up to [`WORKER_SHUTDOWN_GRACE`] each. A worker still busy after that is
    /// logged and left to finish on its own.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, fields(port = self.config.port)), timing(precision = "ms"))]
    pub async fn shutdown(&mut self) {
        match self.state {
            PoolState::Running => {}
            PoolState::Created => {
                internal!(
                    "Listener on port {} stopped before it was started",
                    self.config.port
                );
                self.state = PoolState::Stopped;
                return;
            }
            PoolState::ShuttingDown | PoolState::Stopped => return,
        }

        self.state = PoolState::ShuttingDown;

        // Fails only when every worker has already exited
        let _ = self.shutdown.send(Signal::Shutdown);

        for (id, worker) in self.workers.drain(..).enumerate() {
            match tokio::time::timeout(self.shutdown_grace, worker).await {
                Ok(Ok(())) => internal!("Worker {id} on port {} stopped", self.config.port),
                Ok(Err(err)) => internal!(
                    level = ERROR,
                    "Worker {id} on port {} terminated abnormally: {err}",
                    self.config.port
                ),
                Err(_) => internal!(
                    level = WARN,
                    "Worker {id} on port {} did not stop within {:?}, abandoning it",
                    self.config.port,
                    self.shutdown_grace
                ),
            }
        }

        self.listener = None;
        self.state = PoolState::Stopped;

        internal!(
            level = INFO,
            "Listener on port {} closed",
            self.config.port
        );
    }
}

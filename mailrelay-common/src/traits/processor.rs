use std::net::SocketAddr;

use tokio::net::TcpStream;

use crate::error::SessionError;

/// The strategy a worker uses to serve each connection it accepts.
///
/// A worker owns exactly one processor for its whole lifetime and calls
/// [`process`](ConnectionProcessor::process) once per accepted connection,
/// sequentially. Implementations may keep state between connections.
pub trait ConnectionProcessor: Send + 'static {
    /// Serve `stream` to completion.
    ///
    /// The connection is closed when the stream is dropped, whether or not
    /// this returns an error.
    fn process(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// A short name used in log messages.
    fn ty() -> &'static str {
        "connection"
    }
}

/// Produces one fresh processor per worker.
pub trait ProcessorFactory: Send + Sync {
    type Processor: ConnectionProcessor;

    fn create(&self) -> Self::Processor;
}

impl<F, P> ProcessorFactory for F
where
    F: Fn() -> P + Send + Sync,
    P: ConnectionProcessor,
{
    type Processor = P;

    fn create(&self) -> Self::Processor {
        self()
    }
}

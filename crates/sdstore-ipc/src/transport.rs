//! Transport-agnostic connection handling, with a Unix-domain-socket
//! implementation.
//!
//! Only one transport is implemented; the `Transport` trait is the
//! boundary a FIFO-based or TCP-based transport would plug into, not
//! something this crate needs to exercise the scheduler's core behavior.

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

use crate::codec::{read_frame, write_frame, CodecError};
use crate::frame::{Reply, Request};

/// A bidirectional, length-delimited connection carrying `Request`/`Reply`
/// frames. Implemented for `UnixStream`; any duplex byte stream can
/// implement it the same way.
#[async_trait::async_trait]
pub trait Connection: Send {
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), CodecError>;
    async fn recv_request(&mut self) -> Result<Request, CodecError>;
}

#[async_trait::async_trait]
impl Connection for UnixStream {
    async fn send_reply(&mut self, reply: &Reply) -> Result<(), CodecError> {
        write_frame(self, reply).await
    }

    async fn recv_request(&mut self) -> Result<Request, CodecError> {
        read_frame(self).await
    }
}

/// Errors from standing up the listening transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to accept a connection: {0}")]
    Accept(#[source] std::io::Error),
}

/// Listens for client connections on a Unix-domain socket.
///
/// Binding removes any stale socket file left behind by a prior crashed
/// run before listening, matching how a Unix daemon is expected to take
/// over an abandoned socket path.
pub struct UnixTransport {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixTransport {
    /// Binds a new listener at `path`.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            let _ = std::fs::remove_file(&path);
        }
        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.clone(),
            source,
        })?;
        Ok(Self { listener, path })
    }

    /// Accepts the next client connection.
    pub async fn accept(&self) -> Result<UnixStream, TransportError> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        Ok(stream)
    }

    /// The socket path this transport is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for UnixTransport {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdstore_core::{JobId, Priority};

    #[tokio::test]
    async fn a_client_can_submit_and_receive_a_reply() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("sdstore.sock");
        let transport = UnixTransport::bind(&socket_path).unwrap();

        let server = tokio::spawn(async move {
            let mut stream = transport.accept().await.unwrap();
            let request = stream.recv_request().await.unwrap();
            assert!(matches!(request, Request::Submit { .. }));
            stream
                .send_reply(&Reply::Accepted { job_id: JobId(1) })
                .await
                .unwrap();
        });

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        let request = Request::Submit {
            priority: Priority(0),
            input_path: "/tmp/in".into(),
            output_path: "/tmp/out".into(),
            filters: vec!["nop".to_string()],
        };
        write_frame(&mut client, &request).await.unwrap();
        let reply: Reply = read_frame(&mut client).await.unwrap();
        assert!(matches!(reply, Reply::Accepted { job_id: JobId(1) }));

        server.await.unwrap();
    }
}

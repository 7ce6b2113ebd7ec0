//! Unix-socket [`CommandSource`] implementation.
//!
//! Binds a Unix stream socket and accepts one connection at a time.
//! Each line received is parsed as a JSON-encoded [`Event`].
//!
//! # Wire format
//!
//! Every message is a single line of JSON followed by `\n`:
//!
//! ```json
//! {"WindowOpened":{"window":{"handle":"0x1","class":"kate","resource":"kate","desktop":1},"screen":"DP-1"}}
//! {"WindowSnapped":{"window":"0x1","zones":"{1f0c1f7e-5b2a-4d0e-9f44-7a1c3b9d2e01}","screen":"DP-1"}}
//! {"Navigate":{"command":{"MoveToAdjacent":"left"},"screen":"DP-1"}}
//! "DragCancelled"
//! "Shutdown"
//! ```

use crate::command::Event;
use crate::traits::CommandSource;
use log::{debug, error, info};
use std::io::{BufRead, BufReader};
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

/// A [`CommandSource`] that listens on a Unix stream socket for
/// JSON-encoded events.
///
/// Each accepted connection can send multiple newline-delimited JSON
/// events.  When the connection closes, the listener waits for the next
/// one.
pub struct UnixSocketListener {
    path: PathBuf,
}

/// Errors produced by the Unix socket listener.
#[derive(Debug, thiserror::Error)]
pub enum UnixSocketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UnixSocketListener {
    /// Create a new listener bound to `path`.
    ///
    /// The socket file is created when [`run`](CommandSource::run) is called.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandSource for UnixSocketListener {
    type Error = UnixSocketError;

    /// Bind the socket and start accepting connections.
    ///
    /// This method **blocks** until the sink closes.  Run it on a dedicated
    /// thread.
    fn run(&mut self, sink: mpsc::Sender<Event>) -> Result<(), Self::Error> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };
            debug!("client connected");
            for line in BufReader::new(stream).lines() {
                let text = match line {
                    Ok(text) => text,
                    Err(e) => {
                        error!("read error: {}", e);
                        break;
                    }
                };
                if text.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Event>(&text) {
                    Ok(event) => {
                        debug!("received {:?}", event);
                        if sink.send(event).is_err() {
                            info!("sink closed, shutting down");
                            let _ = std::fs::remove_file(&self.path);
                            return Ok(());
                        }
                    }
                    Err(e) => error!("bad event: {}: {}", text, e),
                }
            }
            debug!("client disconnected");
        }
        Ok(())
    }
}

//  Tests

//! # Monitor Streamer
//!
//! Purpose: Dedicate one connection to the server's MONITOR event stream and
//! relay decoded events to the caller until cancelled or the stream ends.
//!
//! The relay multiplexes the caller's cancellation token against the blocking
//! read with a biased select, so cancellation is observed promptly even on a
//! quiet stream instead of only after the next event arrives.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::Client;
use crate::conn::Connection;
use crate::error::{ClientError, ClientResult};
use crate::resp::Value;

impl Client {
    /// Subscribes to the server's MONITOR stream.
    ///
    /// Acquires a dedicated connection, sends the subscribe command, then
    /// spawns a relay task and returns. Decoded events (and non-fatal read
    /// errors) arrive on `events`; `stopped` fires exactly once when the
    /// relay exits, whether through `cancel` or because the server closed the
    /// stream. The connection returns to the pool only when the relay exits.
    pub async fn monitor(
        &self,
        events: mpsc::Sender<ClientResult<Value>>,
        stopped: oneshot::Sender<()>,
        cancel: CancellationToken,
    ) -> ClientResult<()> {
        let mut conn = self.acquire().await?;
        if let Err(err) = conn.send(&[b"MONITOR"]).await {
            self.release(conn);
            return Err(err);
        }

        tokio::spawn(relay(self.clone(), conn, events, stopped, cancel));
        Ok(())
    }
}

async fn relay(
    client: Client,
    mut conn: Connection,
    events: mpsc::Sender<ClientResult<Value>>,
    stopped: oneshot::Sender<()>,
    cancel: CancellationToken,
) {
    let mut stopped = Some(stopped);
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("monitor cancelled by caller");
                if let Some(tx) = stopped.take() {
                    let _ = tx.send(());
                }
                break;
            }
            result = conn.receive() => match result {
                Ok(value) => {
                    if events.send(Ok(value)).await.is_err() {
                        break;
                    }
                }
                Err(ClientError::ConnectionClosed) => {
                    // Normal termination: the server closed the stream.
                    debug!("monitor stream ended by server");
                    if let Some(tx) = stopped.take() {
                        let _ = tx.send(());
                    }
                    break;
                }
                Err(err) => {
                    if events.send(Err(err)).await.is_err() {
                        break;
                    }
                }
            },
        }
    }
    client.release(conn);
}

//! Per-venue ingestion session (C1): fetch a REST snapshot, open the
//! streaming feed, subscribe, and hand every decoded batch of level updates
//! to the venue's [`OrderBook`]. Runs entirely on the single-threaded
//! executor via `spawn_local`; state shared with the watchdog and evaluator
//! is `Rc<RefCell<_>>`, never `Arc<Mutex<_>>`.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::arbitrage::Evaluator;
use crate::error::{SessionError, TransportError};
use crate::orderbook::{LevelUpdate, OrderBook, Side};
use crate::venue::{VenueAdapter, VenueId};

/// Coarse transport health, inspected by the watchdog every tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Liveness bookkeeping the watchdog reads to decide whether to restart a
/// session. Shared (not owned) by the session that updates it.
#[derive(Debug)]
pub struct SessionState {
    pub last_message_time: Instant,
    pub transport_state: TransportState,
    pub messages_received: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            last_message_time: Instant::now(),
            transport_state: TransportState::Connecting,
            messages_received: 0,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// One running (or about to run) venue session. Created fresh by the
/// supervisor on every (re)start; the [`OrderBook`] it is given is reused
/// across restarts so the ledger and resting levels survive.
pub struct Session {
    pub venue_id: VenueId,
    adapter: VenueAdapter,
    pair: String,
    book: Rc<RefCell<OrderBook>>,
    state: Rc<RefCell<SessionState>>,
    evaluator: Rc<Evaluator>,
    http: reqwest::Client,
}

impl Session {
    pub fn new(
        adapter: VenueAdapter,
        pair: String,
        book: Rc<RefCell<OrderBook>>,
        state: Rc<RefCell<SessionState>>,
        evaluator: Rc<Evaluator>,
    ) -> Self {
        Self {
            venue_id: adapter.id,
            adapter,
            pair,
            book,
            state,
            evaluator,
            http: reqwest::Client::new(),
        }
    }

    /// Run the full session lifecycle until the transport closes, a decode
    /// error occurs, or `cancel` fires. Does not retry internally -- that
    /// is the supervisor's job.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), SessionError> {
        self.load_snapshot().await?;

        let url = (self.adapter.stream_url)();
        let (mut ws, _resp) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(TransportError::WebSocket)?;
        self.state.borrow_mut().transport_state = TransportState::Open;
        info!(venue = %self.venue_id, %url, "session connected");

        let subscribe = (self.adapter.subscribe_message)(&self.pair);
        ws.send(Message::Text(subscribe)).await.map_err(TransportError::WebSocket)?;

        if self.adapter.discards_subscribe_ack {
            // The venue's subscribe ack carries no `data` key; read and
            // discard exactly one frame before entering the data loop.
            let _ = ws.next().await;
            debug!(venue = %self.venue_id, "discarded subscribe ack frame");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state.borrow_mut().transport_state = TransportState::Closing;
                    let _ = ws.close(None).await;
                    self.state.borrow_mut().transport_state = TransportState::Closed;
                    info!(venue = %self.venue_id, "session cancelled");
                    return Ok(());
                }
                frame = ws.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(TransportError::WebSocket(e).into()),
                        None => return Err(TransportError::ConnectionClosed.into()),
                    };

                    let text = match frame {
                        Message::Text(text) => text,
                        Message::Ping(_) | Message::Pong(_) => continue,
                        Message::Close(_) => return Err(TransportError::ConnectionClosed.into()),
                        _ => continue,
                    };

                    self.on_frame(&text).await?;
                }
            }
        }
    }

    async fn load_snapshot(&self) -> Result<(), SessionError> {
        let url = (self.adapter.snapshot_url)(&self.pair);
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(TransportError::Snapshot)?
            .text()
            .await
            .map_err(TransportError::Snapshot)?;

        let (bids, asks) = (self.adapter.parse_snapshot)(&body)?;
        self.apply(Side::Bid, &bids).await;
        self.apply(Side::Ask, &asks).await;

        let mut state = self.state.borrow_mut();
        state.last_message_time = Instant::now();
        state.messages_received += 1;
        info!(venue = %self.venue_id, bids = bids.len(), asks = asks.len(), "snapshot loaded");
        Ok(())
    }

    async fn on_frame(&self, text: &str) -> Result<(), SessionError> {
        let parsed = (self.adapter.parse_stream_frame)(text)?;
        {
            let mut state = self.state.borrow_mut();
            state.last_message_time = Instant::now();
            state.messages_received += 1;
        }
        let Some((bids, asks)) = parsed else {
            return Ok(());
        };
        self.apply(Side::Bid, &bids).await;
        self.apply(Side::Ask, &asks).await;
        Ok(())
    }

    async fn apply(&self, side: Side, updates: &[LevelUpdate]) {
        if updates.is_empty() {
            return;
        }
        let change = {
            let mut book = self.book.borrow_mut();
            let book_side = match side {
                Side::Bid => &mut book.bids,
                Side::Ask => &mut book.asks,
            };
            book_side.apply_deltas(updates)
        };
        if change.is_some() {
            self.evaluator.on_top_changed(self.venue_id, side).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_state_starts_connecting() {
        let state = SessionState::new();
        assert_eq!(state.transport_state, TransportState::Connecting);
        assert_eq!(state.messages_received, 0);
    }

    #[test]
    fn transport_states_compare_by_variant() {
        assert_eq!(TransportState::Open, TransportState::Open);
        assert_ne!(TransportState::Open, TransportState::Closed);
    }
}

//! Watchdog / supervisor (C5): owns the two venue sessions, restarts either
//! one when it stalls, and tears both down on shutdown. The order book and
//! consumed ledger for a venue are reused across restarts -- only the
//! session task and its liveness state are replaced.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::arbitrage::Evaluator;
use crate::error::SessionError;
use crate::orderbook::OrderBook;
use crate::session::{Session, SessionState, TransportState};
use crate::venue::VenueAdapter;

const WATCHDOG_TICK: Duration = Duration::from_secs(5);
const STALL_THRESHOLD_DEGRADED: Duration = Duration::from_secs(5);
const STALL_THRESHOLD_ABSOLUTE: Duration = Duration::from_secs(10);

fn should_restart(state: &Rc<RefCell<SessionState>>) -> bool {
    let state = state.borrow();
    let dt = state.last_message_time.elapsed();
    (dt > STALL_THRESHOLD_DEGRADED
        && matches!(
            state.transport_state,
            TransportState::Closing | TransportState::Closed
        ))
        || dt > STALL_THRESHOLD_ABSOLUTE
}

struct RunningSession {
    state: Rc<RefCell<SessionState>>,
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), SessionError>>,
}

pub struct Supervisor {
    pair: String,
    binance_adapter: VenueAdapter,
    ftx_adapter: VenueAdapter,
    binance_book: Rc<RefCell<OrderBook>>,
    ftx_book: Rc<RefCell<OrderBook>>,
    evaluator: Rc<Evaluator>,
}

impl Supervisor {
    pub fn new(
        pair: String,
        binance_adapter: VenueAdapter,
        ftx_adapter: VenueAdapter,
        binance_book: Rc<RefCell<OrderBook>>,
        ftx_book: Rc<RefCell<OrderBook>>,
        evaluator: Rc<Evaluator>,
    ) -> Self {
        Self {
            pair,
            binance_adapter,
            ftx_adapter,
            binance_book,
            ftx_book,
            evaluator,
        }
    }

    fn spawn_session(&self, adapter: VenueAdapter, book: Rc<RefCell<OrderBook>>) -> RunningSession {
        let state = Rc::new(RefCell::new(SessionState::new()));
        let cancel = CancellationToken::new();
        let session = Session::new(
            adapter,
            self.pair.clone(),
            book,
            Rc::clone(&state),
            Rc::clone(&self.evaluator),
        );
        let venue_id = session.venue_id;
        let task_cancel = cancel.clone();
        let handle = tokio::task::spawn_local(async move {
            let result = session.run(task_cancel).await;
            if let Err(ref e) = result {
                tracing::warn!(venue = %venue_id, error = %e, "session exited");
            }
            result
        });
        RunningSession { state, cancel, handle }
    }

    async fn restart(&self, running: &mut RunningSession, adapter: VenueAdapter, book: Rc<RefCell<OrderBook>>) {
        info!("restarting stalled session");
        running.cancel.cancel();
        let fresh = self.spawn_session(adapter, book);
        let stale = std::mem::replace(running, fresh);
        let _ = stale.handle.await;
    }

    /// Run both sessions and the restart-monitoring loop until `shutdown`
    /// is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut binance = self.spawn_session(self.binance_adapter.clone(), Rc::clone(&self.binance_book));
        let mut ftx = self.spawn_session(self.ftx_adapter.clone(), Rc::clone(&self.ftx_book));

        let mut tick = tokio::time::interval(WATCHDOG_TICK);
        tick.tick().await; // first tick fires immediately; discard it

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    binance.cancel.cancel();
                    ftx.cancel.cancel();
                    let _ = binance.handle.await;
                    let _ = ftx.handle.await;
                    info!("supervisor shut down");
                    return;
                }
                _ = tick.tick() => {
                    if should_restart(&binance.state) {
                        self.restart(&mut binance, self.binance_adapter.clone(), Rc::clone(&self.binance_book)).await;
                    }
                    if should_restart(&ftx.state) {
                        self.restart(&mut ftx, self.ftx_adapter.clone(), Rc::clone(&self.ftx_book)).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn state_with(transport: TransportState, elapsed: Duration) -> Rc<RefCell<SessionState>> {
        Rc::new(RefCell::new(SessionState {
            last_message_time: Instant::now() - elapsed,
            transport_state: transport,
            messages_received: 0,
        }))
    }

    #[test]
    fn healthy_session_is_not_restarted() {
        let state = state_with(TransportState::Open, Duration::from_secs(1));
        assert!(!should_restart(&state));
    }

    #[test]
    fn degraded_transport_past_five_seconds_restarts() {
        let state = state_with(TransportState::Closing, Duration::from_secs(6));
        assert!(should_restart(&state));
    }

    #[test]
    fn open_transport_under_ten_seconds_is_not_restarted() {
        let state = state_with(TransportState::Open, Duration::from_secs(7));
        assert!(!should_restart(&state));
    }

    #[test]
    fn any_transport_past_ten_seconds_restarts() {
        let state = state_with(TransportState::Open, Duration::from_secs(11));
        assert!(should_restart(&state));
    }

    #[test]
    fn connecting_past_five_seconds_is_not_restarted() {
        let state = state_with(TransportState::Connecting, Duration::from_secs(6));
        assert!(!should_restart(&state));
    }

    #[test]
    fn connecting_past_ten_seconds_restarts() {
        let state = state_with(TransportState::Connecting, Duration::from_secs(11));
        assert!(should_restart(&state));
    }
}

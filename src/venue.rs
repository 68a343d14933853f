//! Per-venue adapter: one [`VenueAdapter`] record per exchange, holding the
//! URL/message templates and parsing functions that differ between Binance
//! and FTX. [`crate::session::Session`] is written once against this record
//! rather than against a per-venue trait object or subclass -- there is
//! exactly one session implementation, parameterized by which adapter value
//! it was built with.

use rust_decimal::Decimal;

use crate::error::DecodeError;
use crate::orderbook::LevelUpdate;
use crate::types::LevelRow;

/// Name used only for logging (`tracing` spans/fields), not for dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VenueId {
    Binance,
    Ftx,
}

impl std::fmt::Display for VenueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VenueId::Binance => write!(f, "binance"),
            VenueId::Ftx => write!(f, "ftx"),
        }
    }
}

/// All the venue-specific knowledge a [`crate::session::Session`] needs,
/// collapsed into one record instead of one struct/trait per venue.
#[derive(Clone)]
pub struct VenueAdapter {
    pub id: VenueId,
    pub snapshot_url: fn(pair: &str) -> String,
    pub stream_url: fn() -> String,
    pub subscribe_message: fn(pair: &str) -> String,
    /// Whether the subscribe handshake sends back one ack frame (with no
    /// `data` key) that must be read and discarded before the data loop.
    pub discards_subscribe_ack: bool,
    pub parse_snapshot: fn(body: &str) -> Result<(Vec<LevelUpdate>, Vec<LevelUpdate>), DecodeError>,
    pub parse_stream_frame:
        fn(frame: &str) -> Result<Option<(Vec<LevelUpdate>, Vec<LevelUpdate>)>, DecodeError>,
}

fn level_row_to_update(row: &LevelRow) -> Result<LevelUpdate, DecodeError> {
    let (price, quantity) = match row {
        LevelRow::Strings(p, q) => (
            p.parse::<Decimal>().map_err(|_| DecodeError::MalformedLevel)?,
            q.parse::<Decimal>().map_err(|_| DecodeError::MalformedLevel)?,
        ),
        LevelRow::Numbers(p, q) => (*p, *q),
    };
    Ok(LevelUpdate { price, quantity })
}

fn rows_to_updates(rows: &[LevelRow]) -> Result<Vec<LevelUpdate>, DecodeError> {
    rows.iter().map(level_row_to_update).collect()
}

// --- Binance -----------------------------------------------------------

/// `"BTC/USDT"` -> `"BTCUSDT"` (used in REST URLs).
fn binance_symbol(pair: &str) -> String {
    pair.replace('/', "").to_uppercase()
}

/// `"BTC/USDT"` -> `"btcusdt@depth@100ms"` (used in the subscribe message).
fn binance_stream_name(pair: &str) -> String {
    format!("{}@depth@100ms", pair.replace('/', "").to_lowercase())
}

fn binance_snapshot_url(pair: &str) -> String {
    format!(
        "https://www.binance.com/api/v1/depth?symbol={}&limit=1000",
        binance_symbol(pair)
    )
}

fn binance_stream_url() -> String {
    "wss://stream.binance.com/stream".to_string()
}

fn binance_subscribe_message(pair: &str) -> String {
    format!(
        r#"{{"method":"SUBSCRIBE","params":["{}"],"id":1}}"#,
        binance_stream_name(pair)
    )
}

fn binance_parse_snapshot(
    body: &str,
) -> Result<(Vec<LevelUpdate>, Vec<LevelUpdate>), DecodeError> {
    let snapshot: crate::types::BinanceSnapshot = serde_json::from_str(body)?;
    Ok((rows_to_updates(&snapshot.bids)?, rows_to_updates(&snapshot.asks)?))
}

fn binance_parse_stream_frame(
    frame: &str,
) -> Result<Option<(Vec<LevelUpdate>, Vec<LevelUpdate>)>, DecodeError> {
    let envelope: crate::types::BinanceStreamEnvelope = serde_json::from_str(frame)?;
    Ok(Some((
        rows_to_updates(&envelope.data.bids)?,
        rows_to_updates(&envelope.data.asks)?,
    )))
}

pub fn binance_adapter() -> VenueAdapter {
    VenueAdapter {
        id: VenueId::Binance,
        snapshot_url: binance_snapshot_url,
        stream_url: binance_stream_url,
        subscribe_message: binance_subscribe_message,
        discards_subscribe_ack: true,
        parse_snapshot: binance_parse_snapshot,
        parse_stream_frame: binance_parse_stream_frame,
    }
}

// --- FTX -----------------------------------------------------------------

fn ftx_snapshot_url(pair: &str) -> String {
    format!("https://ftx.com/api/markets/{}/orderbook?depth=25", pair)
}

fn ftx_stream_url() -> String {
    "wss://ws.ftx.com/ws".to_string()
}

fn ftx_subscribe_message(pair: &str) -> String {
    format!(
        r#"{{"op":"subscribe","channel":"orderbook","market":"{}"}}"#,
        pair
    )
}

fn ftx_parse_snapshot(body: &str) -> Result<(Vec<LevelUpdate>, Vec<LevelUpdate>), DecodeError> {
    let envelope: crate::types::FtxSnapshotEnvelope = serde_json::from_str(body)?;
    Ok((
        rows_to_updates(&envelope.result.bids)?,
        rows_to_updates(&envelope.result.asks)?,
    ))
}

fn ftx_parse_stream_frame(
    frame: &str,
) -> Result<Option<(Vec<LevelUpdate>, Vec<LevelUpdate>)>, DecodeError> {
    let envelope: crate::types::FtxStreamEnvelope = serde_json::from_str(frame)?;
    Ok(Some((
        rows_to_updates(&envelope.data.bids)?,
        rows_to_updates(&envelope.data.asks)?,
    )))
}

pub fn ftx_adapter() -> VenueAdapter {
    VenueAdapter {
        id: VenueId::Ftx,
        snapshot_url: ftx_snapshot_url,
        stream_url: ftx_stream_url,
        subscribe_message: ftx_subscribe_message,
        discards_subscribe_ack: true,
        parse_snapshot: ftx_parse_snapshot,
        parse_stream_frame: ftx_parse_stream_frame,
    }
}

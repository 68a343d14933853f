//! Wire-format structs for the venues' REST snapshots and WebSocket streams.
//! Field names follow each venue's actual API; parsing into our internal
//! [`crate::orderbook::LevelUpdate`] representation happens in [`crate::venue`].

use rust_decimal::Decimal;
use serde::Deserialize;

/// One `[price, quantity]` row as delivered by a venue. Binance encodes both
/// as strings; FTX encodes both as JSON numbers. `serde`'s untagged enum
/// lets one type parse either wire shape.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum LevelRow {
    Strings(String, String),
    Numbers(Decimal, Decimal),
}

/// Binance `GET /api/v1/depth` response body.
#[derive(Debug, Deserialize)]
pub struct BinanceSnapshot {
    #[serde(default, rename = "lastUpdateId")]
    pub last_update_id: u64,
    pub bids: Vec<LevelRow>,
    pub asks: Vec<LevelRow>,
}

/// Binance combined-stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct BinanceStreamEnvelope {
    #[serde(default)]
    pub stream: String,
    pub data: BinanceDepthUpdate,
}

/// Binance diff-depth payload, field names per the Binance API:
///   b = bid deltas, a = ask deltas.
#[derive(Debug, Deserialize)]
pub struct BinanceDepthUpdate {
    #[serde(rename = "b")]
    pub bids: Vec<LevelRow>,
    #[serde(rename = "a")]
    pub asks: Vec<LevelRow>,
}

/// Binance's subscribe acknowledgement frame, e.g. `{"result":null,"id":1}`.
/// Carries no `data` key; read once and discarded right after subscribing.
#[derive(Debug, Deserialize)]
pub struct SubscribeAck {
    #[serde(default)]
    pub id: Option<u64>,
}

/// FTX `GET /api/markets/<market>/orderbook` response body.
#[derive(Debug, Deserialize)]
pub struct FtxSnapshotEnvelope {
    pub result: FtxSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct FtxSnapshot {
    pub bids: Vec<LevelRow>,
    pub asks: Vec<LevelRow>,
}

/// FTX streaming orderbook message: `{"channel":"orderbook","data":{...}}`.
#[derive(Debug, Deserialize)]
pub struct FtxStreamEnvelope {
    #[serde(default)]
    pub channel: String,
    pub data: FtxSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_row_parses_string_pair() {
        let row: LevelRow = serde_json::from_str(r#"["10000.50", "1.25"]"#).unwrap();
        assert!(matches!(row, LevelRow::Strings(p, q) if p == "10000.50" && q == "1.25"));
    }

    #[test]
    fn level_row_parses_number_pair() {
        let row: LevelRow = serde_json::from_str("[10000.5, 1.25]").unwrap();
        assert!(matches!(row, LevelRow::Numbers(_, _)));
    }

    #[test]
    fn binance_stream_envelope_parses() {
        let raw = r#"{"stream":"btcusdt@depth@100ms","data":{"b":[["100.0","1.0"]],"a":[["101.0","2.0"]]}}"#;
        let env: BinanceStreamEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.data.bids.len(), 1);
        assert_eq!(env.data.asks.len(), 1);
    }

    #[test]
    fn ftx_stream_envelope_parses() {
        let raw = r#"{"channel":"orderbook","data":{"bids":[[100.0,1.0]],"asks":[[101.0,2.0]]}}"#;
        let env: FtxStreamEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(env.data.bids.len(), 1);
    }
}

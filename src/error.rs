use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config JSON in {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("config missing required key: {0}")]
    MissingKey(&'static str),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("snapshot request failed: {0}")]
    Snapshot(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("connection closed by venue")]
    ConnectionClosed,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("decimal parse error: {0}")]
    Decimal(#[from] rust_decimal::Error),

    #[error("frame missing expected field: {0}")]
    MissingField(&'static str),

    #[error("level row had unexpected shape")]
    MalformedLevel,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("decimal arithmetic overflowed while pricing a deal")]
    Arithmetic,

    #[error("order book reported a negative effective quantity at {price}")]
    NegativeQuantity { price: rust_decimal::Decimal },
}

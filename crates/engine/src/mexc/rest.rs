use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use common::{Candle, Error, ExecutionVenue, MarketData, Result, Side};

const BASE_URL: &str = "https://contract.mexc.com";

// MEXC contract order codes.
const SIDE_OPEN_LONG: u8 = 1;
const SIDE_CLOSE_SHORT: u8 = 2;
const SIDE_OPEN_SHORT: u8 = 3;
const SIDE_CLOSE_LONG: u8 = 4;
const ORDER_TYPE_MARKET: u8 = 5;
const OPEN_TYPE_ISOLATED: u8 = 1;

/// REST client for the MEXC contract API. Serves both as the candle feed
/// and, in live mode, as the execution venue.
pub struct MexcClient {
    api_key: String,
    secret: String,
    http: Client,
}

impl MexcClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http: Client::builder()
                .use_rustls_tls()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// `Signature = HMAC-SHA256(access_key + request_time + payload)`.
    fn sign(&self, request_time: u64, payload: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(format!("{}{}{}", self.api_key, request_time, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn public_get(&self, path_and_query: &str) -> Result<String> {
        let url = format!("{BASE_URL}{path_and_query}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_post(&self, path: &str, payload: serde_json::Value) -> Result<String> {
        let body = payload.to_string();
        let ts = Self::timestamp_ms();
        let signature = self.sign(ts, &body);
        let url = format!("{BASE_URL}{path}");

        let resp = self
            .http
            .post(&url)
            .header("ApiKey", &self.api_key)
            .header("Request-Time", ts.to_string())
            .header("Signature", signature)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Http(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }

    async fn submit_market_order(&self, symbol: &str, side_code: u8, size: f64) -> Result<()> {
        let payload = json!({
            "symbol": symbol,
            "vol": size,
            "side": side_code,
            "type": ORDER_TYPE_MARKET,
            "openType": OPEN_TYPE_ISOLATED,
        });
        debug!(symbol, side_code, size, "submitting market order");
        let body = self.signed_post("/api/v1/private/order/submit", payload).await?;

        let resp: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(&body).map_err(|e| Error::Execution(e.to_string()))?;
        if !resp.success {
            return Err(Error::Execution(format!(
                "order rejected (code {}): {body}",
                resp.code
            )));
        }
        Ok(())
    }
}

fn interval_secs(interval: &str) -> Result<i64> {
    let secs = match interval {
        "Min1" => 60,
        "Min5" => 300,
        "Min15" => 900,
        "Min30" => 1800,
        "Min60" => 3600,
        "Hour4" => 14_400,
        "Day1" => 86_400,
        other => {
            return Err(Error::Config(format!("unsupported candle interval: {other}")));
        }
    };
    Ok(secs)
}

fn ts(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::DataUnavailable(format!("bad candle timestamp: {secs}")))
}

#[async_trait]
impl MarketData for MexcClient {
    /// Fetch the most recent `limit` CLOSED candles, oldest first. The
    /// still-forming bar the exchange returns last is dropped.
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let secs = interval_secs(interval)?;
        let now = Utc::now().timestamp();
        // One extra bar of slack on top of the forming one.
        let start = now - secs * (limit as i64 + 2);

        let body = self
            .public_get(&format!(
                "/api/v1/contract/kline/{symbol}?interval={interval}&start={start}&end={now}"
            ))
            .await?;

        let resp: ApiEnvelope<KlineData> =
            serde_json::from_str(&body).map_err(|e| Error::DataUnavailable(e.to_string()))?;
        if !resp.success {
            return Err(Error::DataUnavailable(format!(
                "kline request failed (code {})",
                resp.code
            )));
        }
        let data = resp
            .data
            .ok_or_else(|| Error::DataUnavailable("kline response missing data".into()))?;

        let n = data.time.len();
        if data.open.len() != n || data.high.len() != n || data.low.len() != n || data.close.len() != n
        {
            return Err(Error::DataUnavailable("kline columns have uneven lengths".into()));
        }

        let mut candles = Vec::with_capacity(n);
        for i in 0..n {
            let open_time = ts(data.time[i])?;
            let close_time = ts(data.time[i] + secs)?;
            // Skip the bar still in progress.
            if close_time.timestamp() > now {
                continue;
            }
            candles.push(Candle {
                open_time,
                close_time,
                open: data.open[i],
                high: data.high[i],
                low: data.low[i],
                close: data.close[i],
            });
        }

        if candles.len() < limit {
            return Err(Error::DataUnavailable(format!(
                "{symbol}: got {} closed candles, need {limit}",
                candles.len()
            )));
        }
        let skip = candles.len() - limit;
        Ok(candles.split_off(skip))
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        let body = self
            .public_get(&format!("/api/v1/contract/ticker?symbol={symbol}"))
            .await?;
        let resp: ApiEnvelope<Ticker> =
            serde_json::from_str(&body).map_err(|e| Error::DataUnavailable(e.to_string()))?;
        resp.data
            .map(|t| t.last_price)
            .ok_or_else(|| Error::DataUnavailable(format!("{symbol}: ticker missing data")))
    }
}

#[async_trait]
impl ExecutionVenue for MexcClient {
    async fn open_market(&self, symbol: &str, side: Side, size: f64) -> Result<()> {
        let code = match side {
            Side::Long => SIDE_OPEN_LONG,
            Side::Short => SIDE_OPEN_SHORT,
        };
        self.submit_market_order(symbol, code, size).await
    }

    /// Reduce-only close of an existing position. `side` is the side of the
    /// position being closed, not of the closing order.
    async fn close_market(&self, symbol: &str, side: Side, size: f64) -> Result<()> {
        let code = match side {
            Side::Long => SIDE_CLOSE_LONG,
            Side::Short => SIDE_CLOSE_SHORT,
        };
        self.submit_market_order(symbol, code, size)
            .await
            .map_err(|e| Error::CloseExecution(e.to_string()))
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: i64,
    data: Option<T>,
}

/// Column-oriented kline payload.
#[derive(Deserialize)]
struct KlineData {
    time: Vec<i64>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_map_covers_configured_values() {
        assert_eq!(interval_secs("Min15").unwrap(), 900);
        assert_eq!(interval_secs("Min60").unwrap(), 3600);
        assert!(interval_secs("Week1").is_err());
    }

    #[test]
    fn kline_envelope_parses_column_arrays() {
        let body = r#"{
            "success": true,
            "code": 0,
            "data": {
                "time": [1717423200, 1717424100],
                "open": [100.0, 101.0],
                "high": [102.0, 103.0],
                "low": [99.0, 100.5],
                "close": [101.0, 102.5],
                "vol": [10.0, 12.0]
            }
        }"#;
        let resp: ApiEnvelope<KlineData> = serde_json::from_str(body).unwrap();
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert_eq!(data.time.len(), 2);
        assert_eq!(data.close[1], 102.5);
    }

    #[test]
    fn ticker_envelope_parses_last_price() {
        let body = r#"{"success":true,"code":0,"data":{"lastPrice":65432.1}}"#;
        let resp: ApiEnvelope<Ticker> = serde_json::from_str(body).unwrap();
        assert_eq!(resp.data.unwrap().last_price, 65432.1);
    }
}

//! HTTP-shaped adapter for a Coinone-like Korean spot exchange.
//!
//! Method surface and request/signature shape are grounded on
//! `original_source/src/trading/coinone_client.py`: `/v2.1/order`,
//! `/private/v2.1/order/info`, `/private/v2.1/order/cancel`,
//! `/v2.1/account/balance/all`, `/public/v2/trades/{quote}/{target}`
//! (preferred last-trade price source) falling back to
//! `/public/v2/ticker/{quote}/{target}`, and the v2.1 private-API
//! signature: `base64(json(body))` HMAC-SHA512'd with the secret key,
//! sent as `X-COINONE-PAYLOAD` / `X-COINONE-SIGNATURE` headers.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use sha2::Sha512;

use kairos_core::schedule::ExchangeOrderId;
use kairos_core::{Asset, Krw, Side};
use kairos_ports::{
    ExchangeAdapter, ExchangeError, HistoryError, OrderState, OrderStatusReport, OrderType,
    PlacedOrder, PriceHistoryProvider,
};

use crate::limits::AdapterLimits;

type HmacSha512 = Hmac<Sha512>;

fn currency_code(asset: Asset) -> &'static str {
    match asset {
        Asset::Btc => "BTC",
        Asset::Eth => "ETH",
        Asset::Xrp => "XRP",
        Asset::Sol => "SOL",
        Asset::Krw => "KRW",
    }
}

/// Credentials and endpoint for a Coinone-shaped exchange.
#[derive(Clone)]
pub struct CoinoneCredentials {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

/// `ExchangeAdapter` + `PriceHistoryProvider` speaking the Coinone v2/v2.1
/// wire protocol over HTTP.
pub struct CoinoneAdapter {
    client: reqwest::Client,
    credentials: CoinoneCredentials,
    limits: AdapterLimits,
    weekly_ma_cache: Mutex<HashMap<Asset, (Krw, NaiveDate, DateTime<Utc>)>>,
}

impl CoinoneAdapter {
    pub fn new(credentials: CoinoneCredentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            limits: AdapterLimits::default(),
            weekly_ma_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_limits(credentials: CoinoneCredentials, limits: AdapterLimits) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            limits,
            weekly_ma_cache: Mutex::new(HashMap::new()),
        }
    }

    /// `base64(json(body))`, HMAC-SHA512'd with the secret key — the v2.1
    /// private-API signature scheme.
    fn sign(&self, body: &serde_json::Value) -> Result<(String, String), ExchangeError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| ExchangeError::Fatal(format!("failed to encode request body: {e}")))?;
        let payload_b64 = BASE64.encode(payload);

        let mut mac = HmacSha512::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Fatal(format!("invalid secret key: {e}")))?;
        mac.update(payload_b64.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok((payload_b64, signature))
    }

    async fn private_post(
        &self,
        endpoint: &str,
        mut params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value, ExchangeError> {
        params.insert("access_token".into(), json!(self.credentials.api_key));
        params.insert("nonce".into(), json!(uuid::Uuid::new_v4().to_string()));
        let body = serde_json::Value::Object(params);
        let (payload_b64, signature) = self.sign(&body)?;

        let response = self
            .client
            .post(format!("{}{endpoint}", self.credentials.base_url))
            .header("Content-Type", "application/json")
            .header("X-COINONE-PAYLOAD", payload_b64)
            .header("X-COINONE-SIGNATURE", signature)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        classify_http_status(&response)?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ExchangeError::Transient(format!("malformed response body: {e}")))
    }

    async fn public_get(&self, endpoint: &str) -> Result<serde_json::Value, ExchangeError> {
        let response = self
            .client
            .get(format!("{}{endpoint}", self.credentials.base_url))
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        classify_http_status(&response)?;
        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ExchangeError::Transient(format!("malformed response body: {e}")))
    }

    /// Most recent trade print for `asset`, the preferred price source.
    async fn latest_trade_price(&self, asset: Asset) -> Result<Krw, ExchangeError> {
        let body = self
            .public_get(&format!("/public/v2/trades/KRW/{}?size=10", currency_code(asset)))
            .await?;
        let price = body
            .get("transactions")
            .and_then(|t| t.as_array())
            .and_then(|a| a.first())
            .and_then(|tx| tx.get("price"))
            .and_then(|p| p.as_str().and_then(|s| s.parse::<i64>().ok()).or_else(|| p.as_i64()));
        match price {
            Some(p) if p > 0 => Ok(Krw(p)),
            _ => Err(ExchangeError::PriceUnavailable),
        }
    }

    /// 24h-close fallback when no recent trade print is available.
    async fn ticker_close_price(&self, asset: Asset) -> Result<Krw, ExchangeError> {
        let body = self
            .public_get(&format!("/public/v2/ticker/KRW/{}", currency_code(asset)))
            .await?;
        let data = body.get("data").unwrap_or(&body);
        for field in ["last", "close_24h", "close"] {
            if let Some(p) = data.get(field).and_then(|v| {
                v.as_str()
                    .and_then(|s| s.parse::<i64>().ok())
                    .or_else(|| v.as_i64())
            }) {
                if p > 0 {
                    return Ok(Krw(p));
                }
            }
        }
        Err(ExchangeError::PriceUnavailable)
    }

}

fn classify_transport_error(err: &reqwest::Error) -> ExchangeError {
    if err.is_timeout() || err.is_connect() {
        ExchangeError::Transient(err.to_string())
    } else {
        ExchangeError::Fatal(err.to_string())
    }
}

fn classify_http_status(response: &reqwest::Response) -> Result<(), ExchangeError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(ExchangeError::Transient(format!("http {status}")))
    } else {
        Err(ExchangeError::Fatal(format!("http {status}")))
    }
}

fn error_code(body: &serde_json::Value) -> Option<String> {
    body.get("error_code").and_then(|v| v.as_str()).map(str::to_owned)
}

#[async_trait]
impl ExchangeAdapter for CoinoneAdapter {
    async fn get_balances(&self) -> Result<BTreeMap<Asset, Decimal>, ExchangeError> {
        let body = self
            .private_post("/v2.1/account/balance/all", serde_json::Map::new())
            .await?;
        if body.get("result").and_then(|v| v.as_str()) != Some("success") {
            return Err(ExchangeError::Fatal(format!(
                "balance query failed: {}",
                error_code(&body).unwrap_or_default()
            )));
        }

        let mut balances = BTreeMap::new();
        if let Some(entries) = body.get("balances").and_then(|v| v.as_array()) {
            for entry in entries {
                let Some(currency) = entry.get("currency").and_then(|v| v.as_str()) else {
                    continue;
                };
                let asset = match currency.to_uppercase().as_str() {
                    "BTC" => Asset::Btc,
                    "ETH" => Asset::Eth,
                    "XRP" => Asset::Xrp,
                    "SOL" => Asset::Sol,
                    "KRW" => Asset::Krw,
                    _ => continue,
                };
                let available: Decimal = entry
                    .get("available")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Decimal::ZERO);
                let locked: Decimal = entry
                    .get("limit")
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(Decimal::ZERO);
                balances.insert(asset, available + locked);
            }
        }
        Ok(balances)
    }

    async fn get_last_price(&self, asset: Asset) -> Result<Krw, ExchangeError> {
        match self.latest_trade_price(asset).await {
            Ok(price) => Ok(price),
            Err(ExchangeError::PriceUnavailable) => self.ticker_close_price(asset).await,
            Err(other) => Err(other),
        }
    }

    async fn place_order(
        &self,
        client_order_id: &str,
        asset: Asset,
        side: Side,
        notional_krw: Krw,
        order_type: OrderType,
        price: Option<Krw>,
    ) -> Result<PlacedOrder, ExchangeError> {
        if order_type == OrderType::Limit && price.is_none() {
            return Err(ExchangeError::Fatal("limit order requires a price".into()));
        }

        let balances = self.get_balances().await?;
        let last_price = self.get_last_price(asset).await?;
        let available = match side {
            Side::Buy => balances.get(&Asset::Krw).copied().unwrap_or(Decimal::ZERO),
            Side::Sell => {
                balances.get(&asset).copied().unwrap_or(Decimal::ZERO) * Decimal::from(last_price.0)
            }
        };
        let available_krw = Krw(available.round().try_into().unwrap_or(0));
        let sized = self.limits.size_order(asset, notional_krw, available_krw)?;

        let mut params = serde_json::Map::new();
        params.insert("side".into(), json!(if side == Side::Buy { "BUY" } else { "SELL" }));
        params.insert("quote_currency".into(), json!("KRW"));
        params.insert("target_currency".into(), json!(currency_code(asset)));
        params.insert("client_order_id".into(), json!(client_order_id));
        match order_type {
            OrderType::Market => {
                params.insert("type".into(), json!("MARKET"));
                if side == Side::Buy {
                    params.insert("amount".into(), json!(sized.0.to_string()));
                } else {
                    let qty = Decimal::from(sized.0) / Decimal::from(last_price.0);
                    params.insert("qty".into(), json!(qty.to_string()));
                }
            }
            OrderType::Limit => {
                params.insert("type".into(), json!("LIMIT"));
                params.insert("price".into(), json!(price.unwrap().0.to_string()));
                let qty = Decimal::from(sized.0) / Decimal::from(price.unwrap().0);
                params.insert("qty".into(), json!(qty.to_string()));
            }
        }

        let body = self.private_post("/v2.1/order", params).await?;
        if body.get("result").and_then(|v| v.as_str()) != Some("success") {
            let code = error_code(&body).unwrap_or_default();
            let message = body
                .get("error_msg")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(match code.as_str() {
                "103" => ExchangeError::InsufficientBalance(message),
                "307" => ExchangeError::NotionalAboveMax(message),
                "405" => ExchangeError::NotionalBelowMin(message),
                _ => ExchangeError::Fatal(format!("{code}: {message}")),
            });
        }

        let order_id = body
            .get("order_id")
            .and_then(|v| v.as_str())
            .unwrap_or(client_order_id)
            .to_string();
        tracing::info!(%asset, ?side, %notional_krw, %order_id, "order placed");
        Ok(PlacedOrder {
            order_id,
            state: OrderState::Open,
        })
    }

    async fn cancel_order(&self, order_id: &ExchangeOrderId) -> Result<(), ExchangeError> {
        tracing::info!(%order_id, "cancelling order");
        let mut params = serde_json::Map::new();
        params.insert("order_id".into(), json!(order_id));
        let body = self
            .private_post("/private/v2.1/order/cancel", params)
            .await?;

        match body.get("result").and_then(|v| v.as_str()) {
            Some("success") => Ok(()),
            // Cancelling an order that is already filled/cancelled is a
            // no-op success, not an error.
            _ if error_code(&body).as_deref() == Some("288") => Ok(()),
            _ => Err(ExchangeError::Fatal(format!(
                "cancel failed: {}",
                error_code(&body).unwrap_or_default()
            ))),
        }
    }

    async fn get_order_status(
        &self,
        order_id: &ExchangeOrderId,
    ) -> Result<OrderStatusReport, ExchangeError> {
        let mut params = serde_json::Map::new();
        params.insert("order_id".into(), json!(order_id));
        let body = self.private_post("/private/v2.1/order/info", params).await?;

        let state = match body.get("status").and_then(|v| v.as_str()) {
            Some("live") => OrderState::Open,
            Some("partially_filled") => OrderState::PartiallyFilled,
            Some("filled") => OrderState::Filled,
            Some("cancelled") => OrderState::Cancelled,
            _ => OrderState::Rejected,
        };
        let filled_amount: Decimal = body
            .get("executed_qty")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
            .unwrap_or(Decimal::ZERO);
        let average_price: Option<Decimal> = body
            .get("avg_executed_price")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok());
        let filled_krw = match average_price {
            Some(p) => Krw((filled_amount * p).round().try_into().unwrap_or(0)),
            None => Krw(0),
        };

        Ok(OrderStatusReport {
            state,
            filled_amount,
            average_price,
            filled_krw,
            fees_krw: Krw(0),
        })
    }
}

#[async_trait]
impl PriceHistoryProvider for CoinoneAdapter {
    async fn weekly_closes(&self, asset: Asset) -> Result<Vec<Krw>, HistoryError> {
        let body = self
            .public_get(&format!("/public/v2/chart/KRW/{}?interval=1w", currency_code(asset)))
            .await
            .map_err(|_| HistoryError::Unavailable)?;
        let closes = body
            .get("chart")
            .and_then(|v| v.as_array())
            .map(|candles| {
                candles
                    .iter()
                    .filter_map(|c| {
                        c.get("close")
                            .and_then(|v| v.as_str().and_then(|s| s.parse::<i64>().ok()).or_else(|| v.as_i64()))
                            .map(Krw)
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if closes.is_empty() {
            return Err(HistoryError::Unavailable);
        }
        Ok(closes)
    }

    async fn daily_closes(&self, asset: Asset, days: u32) -> Result<Vec<Krw>, HistoryError> {
        let body = self
            .public_get(&format!(
                "/public/v2/chart/KRW/{}?interval=1d&size={days}",
                currency_code(asset)
            ))
            .await
            .map_err(|_| HistoryError::Unavailable)?;
        let closes: Vec<Krw> = body
            .get("chart")
            .and_then(|v| v.as_array())
            .map(|candles| {
                candles
                    .iter()
                    .filter_map(|c| {
                        c.get("close")
                            .and_then(|v| v.as_str().and_then(|s| s.parse::<i64>().ok()).or_else(|| v.as_i64()))
                            .map(Krw)
                    })
                    .collect()
            })
            .unwrap_or_default();
        if closes.is_empty() {
            return Err(HistoryError::Unavailable);
        }
        Ok(closes)
    }

    async fn current_price(&self, asset: Asset) -> Result<Krw, HistoryError> {
        self.get_last_price(asset).await.map_err(|_| HistoryError::Unavailable)
    }

    /// Weekly closes with a same-day cache: within a calendar day, repeated
    /// calls reuse the last computed 200-week moving average instead of
    /// re-fetching the full history. On upstream failure, a cached value
    /// less than 24h old is returned instead of propagating the error.
    async fn ma_200w(&self, asset: Asset, now: DateTime<Utc>) -> Result<Krw, HistoryError> {
        let today = now.date_naive();
        if let Some((value, day, _)) = self.weekly_ma_cache.lock().get(&asset).copied() {
            if day == today {
                return Ok(value);
            }
        }

        match self.weekly_closes(asset).await {
            Ok(closes) if closes.len() >= 200 => {
                let window = &closes[closes.len() - 200..];
                let sum: i64 = window.iter().map(|k| k.0).sum();
                let ma = Krw(sum / 200);
                self.weekly_ma_cache.lock().insert(asset, (ma, today, now));
                Ok(ma)
            }
            Ok(_) => Err(HistoryError::Unavailable),
            Err(err) => {
                let cached = self.weekly_ma_cache.lock().get(&asset).copied();
                match cached {
                    Some((value, _, cached_at)) if now - cached_at <= chrono::Duration::hours(24) => {
                        Ok(value)
                    }
                    _ => Err(err),
                }
            }
        }
    }
}

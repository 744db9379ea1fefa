use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::types::{
    Asset, AutoConnectResponse, BankAccount, CarbonCredit, ExchangeList, ExchangeQuote,
    ExchangeRequest, ExchangeSummary, FeeQuote, HoldReceipt, HoldRequest, RailPayload,
    RawFeeQuote, Refund, ServiceStatus, Settlement, SwapReceipt, RAIL_PROXY_PATH,
};
use crate::chat::body_error;
use crate::config::{RailSettings, RequestConfig};
use crate::error::{ApiError, ApiResult, AppError, AppResult};

/// Client for the Cami Money rail behind the `/api/cami_money` proxy.
///
/// Single attempt per call. A body carrying `error` fails the call whatever
/// the status.
#[derive(Clone)]
pub struct RailClient {
    client: Client,
    base_url: String,
}

impl RailClient {
    pub fn new(settings: &RailSettings, request_config: &RequestConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(AppError::Http)?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /api/aegr/redis/status`
    pub async fn redis_status(&self) -> ApiResult<ServiceStatus> {
        self.get("/api/aegr/redis/status").await
    }

    /// `GET /api/aegr/plaid/status`
    pub async fn plaid_status(&self) -> ApiResult<ServiceStatus> {
        self.get("/api/aegr/plaid/status").await
    }

    /// `POST /api/aegr/treasury/ping` with the server's preset credentials.
    pub async fn treasury_ping(&self) -> ApiResult<ServiceStatus> {
        self.post_json("/api/aegr/treasury/ping", &serde_json::json!({}))
            .await
    }

    /// Link the demo bank accounts.
    pub async fn auto_connect(&self) -> ApiResult<Vec<BankAccount>> {
        let response: AutoConnectResponse = self.post_empty("/api/demo/plaid/auto_connect").await?;
        let token_issued = response.access_token().is_some();
        let accounts = response.into_accounts();
        info!(
            accounts = accounts.len(),
            token_issued, "Bank accounts connected"
        );
        Ok(accounts)
    }

    /// Fee and spread for `amount` whole units.
    ///
    /// Never fails: an unreachable or unusable quote falls back to the local
    /// rates.
    pub async fn fee_quote(&self, amount: f64) -> FeeQuote {
        let path = format!("/api/demo/fee/calculate?amount={}", amount);
        match self.get::<RawFeeQuote>(&path).await {
            Ok(raw) => raw.resolve(amount),
            Err(e) => {
                debug!(error = %e, "Fee quote unavailable, using fallback rates");
                FeeQuote::fallback(amount)
            }
        }
    }

    /// Escrow inbound funds.
    pub async fn hold(&self, request: &HoldRequest) -> ApiResult<HoldReceipt> {
        let receipt: HoldReceipt = self.post_json("/api/aegr/hold", request).await?;
        info!(
            hold_id = %receipt.hold_id,
            asset = %request.asset,
            amount = request.amount,
            "Hold placed"
        );
        Ok(receipt)
    }

    /// Match a hold against the target asset.
    pub async fn exchange(&self, request: &ExchangeRequest) -> ApiResult<ExchangeQuote> {
        let quote: ExchangeQuote = self.post_json("/api/aegr/exchange", request).await?;
        info!(
            exchange_id = %quote.exchange_id,
            target = %request.target_asset,
            net_outbound = quote.net_outbound,
            "Exchange matched"
        );
        Ok(quote)
    }

    /// Release a matched exchange.
    pub async fn settle(&self, exchange_id: &str) -> ApiResult<Settlement> {
        let settlement: Settlement = self
            .post_empty(&format!("/api/aegr/settle/{}", exchange_id))
            .await?;
        info!(
            exchange_id,
            final_amount = settlement.final_amount,
            "Exchange settled"
        );
        Ok(settlement)
    }

    /// Return a held amount to its owner.
    pub async fn refund(&self, hold_id: &str) -> ApiResult<Refund> {
        let refund: Refund = self
            .post_empty(&format!("/api/aegr/refund/{}", hold_id))
            .await?;
        info!(hold_id, "Hold refunded");
        Ok(refund)
    }

    /// Recent exchanges with their legs.
    pub async fn exchanges(&self) -> ApiResult<Vec<ExchangeSummary>> {
        let list: ExchangeList = self.get("/api/aegr/demo/exchanges").await?;
        Ok(list.exchanges)
    }

    /// Issue a carbon credit from the demo meter.
    pub async fn issue_carbon(&self) -> ApiResult<CarbonCredit> {
        let credit: CarbonCredit = self.get("/api/demo/carbon/issue").await?;
        info!(credit_id = %credit.credit_id, tons = credit.tons_co2e, "Carbon credit issued");
        Ok(credit)
    }

    /// Hold, exchange and settle in one run. Stops at the first failing step.
    pub async fn swap(
        &self,
        inbound: Asset,
        amount: f64,
        target: Asset,
        payload: RailPayload,
    ) -> ApiResult<SwapReceipt> {
        let hold = self
            .hold(&HoldRequest::new(inbound, amount, payload))
            .await?;
        let exchange = self
            .exchange(&ExchangeRequest::new(hold.hold_id.clone(), target))
            .await
            .map_err(|e| {
                warn!(hold_id = %hold.hold_id, error = %e, "Exchange failed after hold");
                e
            })?;
        let settlement = self.settle(&exchange.exchange_id).await?;

        Ok(SwapReceipt {
            inbound,
            target,
            hold,
            exchange,
            settlement,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, RAIL_PROXY_PATH);
        debug!(%method, path, "Rail request");
        self.client
            .request(method, url)
            .query(&[("__path", path)])
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        decode(path, response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        decode(path, response).await
    }

    async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self
            .request(reqwest::Method::POST, path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        decode(path, response).await
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> ApiResult<T> {
    let status = response.status();
    let body = response.text().await?;
    interpret_rail_response(path, status.as_u16(), &body)
}

/// Turn a rail response into `T`, or the failure it reports.
///
/// `error` in the body wins over the status. Non-JSON bodies usually mean the
/// proxy is misrouted.
pub fn interpret_rail_response<T: DeserializeOwned>(
    path: &str,
    status: u16,
    body: &str,
) -> ApiResult<T> {
    let value: Option<Value> = serde_json::from_str(body).ok();

    if let Some(message) = value.as_ref().and_then(body_error) {
        return Err(ApiError::Api { status, message });
    }

    if !(200..300).contains(&status) {
        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            format!("HTTP {}", status)
        } else {
            trimmed.chars().take(200).collect()
        };
        return Err(ApiError::Api { status, message });
    }

    let value = value.ok_or_else(|| ApiError::InvalidResponse {
        message: format!("{} did not return JSON; check CAMI_MONEY_BASE", path),
    })?;
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse {
        message: format!("{}: {}", path, e),
    })
}

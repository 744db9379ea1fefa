use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every rail call is proxied through this path, with the rail path in `__path`.
pub const RAIL_PROXY_PATH: &str = "/api/cami_money";

/// Participant used when no wallet or bank account is linked.
pub const DEFAULT_PARTICIPANT: &str = "demo_user_123";

/// Fee rate applied when the fee endpoint gives no usable quote.
pub const FALLBACK_FEE_RATE: f64 = 0.0025;

/// Spread rate applied when the rail omits a spread.
pub const FALLBACK_SPREAD_RATE: f64 = 0.001;

/// Asset held in escrow or delivered by an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
    #[serde(rename = "MXN")]
    Mxn,
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "tCO2e", alias = "CARBON")]
    Carbon,
}

impl Asset {
    pub fn as_str(self) -> &'static str {
        match self {
            Asset::Usd => "USD",
            Asset::Eur => "EUR",
            Asset::Mxn => "MXN",
            Asset::Btc => "BTC",
            Asset::Carbon => "tCO2e",
        }
    }

    /// Settlement rail that carries this asset.
    pub fn rail(self) -> RailKind {
        match self {
            Asset::Btc => RailKind::Bitcoin,
            Asset::Carbon => RailKind::Verra,
            _ => RailKind::Ach,
        }
    }

    /// Currency reported to the rail. All fiat settles as USD.
    pub fn currency(self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Carbon => "tCO2e",
            _ => "USD",
        }
    }

    /// Smallest units per whole unit: sats, kilograms, or cents.
    pub fn minor_per_unit(self) -> f64 {
        match self {
            Asset::Btc => 100_000_000.0,
            Asset::Carbon => 1_000.0,
            _ => 100.0,
        }
    }

    /// Convert a whole-unit amount (dollars, BTC, tons) to rail units.
    pub fn to_minor_units(self, amount: f64) -> i64 {
        (amount * self.minor_per_unit()).round() as i64
    }

    /// Render an amount given in rail units.
    pub fn format_minor(self, amount: f64) -> String {
        format_amount(amount, self.as_str())
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "USD" => Ok(Asset::Usd),
            "EUR" => Ok(Asset::Eur),
            "MXN" => Ok(Asset::Mxn),
            "BTC" | "BITCOIN" => Ok(Asset::Btc),
            "TCO2E" | "CARBON" => Ok(Asset::Carbon),
            _ => Err(format!(
                "Unknown asset: {} (expected USD, EUR, MXN, BTC or tCO2e)",
                s
            )),
        }
    }
}

/// Settlement network of a hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RailKind {
    Ach,
    Bitcoin,
    Verra,
}

/// Render an amount in rail units for display.
///
/// Fiat is cents, BTC is sats, ETH is wei, SOL is lamports and carbon is
/// kilograms. Unknown currencies are printed as-is.
pub fn format_amount(amount: f64, currency: &str) -> String {
    match currency {
        "USD" | "USDC" | "EUR" | "MXN" => format_dollars(amount),
        "BTC" | "BITCOIN" => format!("{:.8} BTC", amount / 100_000_000.0),
        "ETH" | "ETHEREUM" => format!("{:.6} ETH", amount / 1e18),
        "SOL" | "SOLANA" => format!("{:.4} SOL", amount / 1_000_000_000.0),
        "tCO2e" | "CARBON" => format!("{:.3} tCO₂e", amount / 1_000.0),
        _ => format!("{} {}", amount, currency),
    }
}

fn format_dollars(cents: f64) -> String {
    let fixed = format!("{:.2}", cents.abs() / 100.0);
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if cents < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, fraction)
}

/// Health of one rail dependency (Redis, Plaid, treasury).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    #[serde(default)]
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Linked bank account, balance in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub name: String,
    pub balance_cents: i64,
}

/// Raw `auto_connect` body: either an `accounts` list or a single account.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AutoConnectResponse {
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawAccount {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: Option<f64>,
}

impl AutoConnectResponse {
    /// Normalize both shapes to accounts with balances in cents.
    pub fn into_accounts(self) -> Vec<BankAccount> {
        let single = self.account_id.clone().map(|id| RawAccount {
            id: Some(id),
            account_id: None,
            name: self.name.clone(),
            balance: self.balance,
        });
        let raw = if self.accounts.is_empty() {
            single.into_iter().collect()
        } else {
            self.accounts
        };

        raw.into_iter()
            .filter_map(|account| {
                let id = account.id.or(account.account_id)?;
                Some(BankAccount {
                    id,
                    name: account.name.unwrap_or_else(|| "Account".to_string()),
                    balance_cents: (account.balance.unwrap_or(0.0) * 100.0).round() as i64,
                })
            })
            .collect()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

/// Fee and spread for an inbound amount, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub fee_cents: i64,
    pub spread_cents: i64,
}

impl FeeQuote {
    /// Quote computed locally from the fallback rates.
    pub fn fallback(amount: f64) -> Self {
        Self {
            fee_cents: (amount * FALLBACK_FEE_RATE * 100.0).round() as i64,
            spread_cents: (amount * FALLBACK_SPREAD_RATE * 100.0).round() as i64,
        }
    }

    /// Fill missing or zero fields from the fallback rates.
    pub fn or_fallback(fee_cents: Option<i64>, spread_cents: Option<i64>, amount: f64) -> Self {
        let fallback = Self::fallback(amount);
        Self {
            fee_cents: fee_cents.filter(|v| *v != 0).unwrap_or(fallback.fee_cents),
            spread_cents: spread_cents
                .filter(|v| *v != 0)
                .unwrap_or(fallback.spread_cents),
        }
    }

    pub fn revenue_cents(&self) -> i64 {
        self.fee_cents + self.spread_cents
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawFeeQuote {
    #[serde(default)]
    pub fee_cents: Option<f64>,
    #[serde(default)]
    pub spread_cents: Option<f64>,
}

impl RawFeeQuote {
    pub fn resolve(self, amount: f64) -> FeeQuote {
        FeeQuote::or_fallback(
            self.fee_cents.map(|v| v.round() as i64),
            self.spread_cents.map(|v| v.round() as i64),
            amount,
        )
    }
}

/// Participant details attached to a hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailPayload {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btc_address: Option<String>,
}

impl Default for RailPayload {
    fn default() -> Self {
        Self::participant(DEFAULT_PARTICIPANT)
    }
}

impl RailPayload {
    pub fn participant(id: impl Into<String>) -> Self {
        Self {
            participant_id: id.into(),
            account_id: None,
            account_name: None,
            btc_address: None,
        }
    }

    pub fn with_account(mut self, account: &BankAccount) -> Self {
        self.account_id = Some(account.id.clone());
        self.account_name = Some(account.name.clone());
        self
    }

    pub fn with_btc_address(mut self, address: impl Into<String>) -> Self {
        self.btc_address = Some(address.into());
        self
    }
}

/// Body of `POST /api/aegr/hold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldRequest {
    pub asset: Asset,
    /// Rail units: sats, kilograms, or cents.
    pub amount: i64,
    pub currency: String,
    pub rail: RailKind,
    pub rail_payload: RailPayload,
}

impl HoldRequest {
    /// Build a hold for `amount` whole units of `asset`.
    pub fn new(asset: Asset, amount: f64, rail_payload: RailPayload) -> Self {
        Self {
            asset,
            amount: asset.to_minor_units(amount),
            currency: asset.currency().to_string(),
            rail: asset.rail(),
            rail_payload,
        }
    }
}

/// Escrow hold accepted by the rail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldReceipt {
    pub hold_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custody_tx: Option<String>,
}

/// Body of `POST /api/aegr/exchange`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRequest {
    pub inbound_hold_id: String,
    pub target_asset: Asset,
    pub target_currency: String,
}

impl ExchangeRequest {
    pub fn new(inbound_hold_id: impl Into<String>, target_asset: Asset) -> Self {
        let target_currency = if target_asset == Asset::Btc { "BTC" } else { "USD" };
        Self {
            inbound_hold_id: inbound_hold_id.into(),
            target_asset,
            target_currency: target_currency.to_string(),
        }
    }
}

/// Matched exchange. Amounts are in the target asset's rail units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    pub exchange_id: String,
    #[serde(default)]
    pub net_outbound: f64,
    #[serde(default)]
    pub fee_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

impl ExchangeQuote {
    /// Reported spread, or the fallback rate applied to the net outbound.
    pub fn spread(&self) -> f64 {
        self.spread_amount
            .filter(|v| *v != 0.0)
            .unwrap_or_else(|| (self.net_outbound * FALLBACK_SPREAD_RATE).round())
    }

    /// Fee plus spread kept by the exchange.
    pub fn revenue(&self) -> f64 {
        self.fee_amount.unwrap_or(0.0) + self.spread()
    }
}

/// Released settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    #[serde(default)]
    pub final_amount: f64,
    #[serde(default)]
    pub release_tx: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_asset: Option<String>,
}

impl Settlement {
    /// Treasury payment id when the release went out over a bank rail.
    pub fn treasury_payment_id(&self) -> Option<&str> {
        self.release_tx
            .as_deref()
            .filter(|tx| tx.starts_with("mt_"))
    }
}

/// Refunded hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    #[serde(default)]
    pub refund_tx: Option<String>,
}

/// One side of an exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeLeg {
    #[serde(default)]
    pub rail: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub status: String,
}

/// Exchange as listed by the demo endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSummary {
    pub exchange_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashlock: Option<String>,
    #[serde(default)]
    pub legs: Vec<ExchangeLeg>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ExchangeList {
    #[serde(default)]
    pub exchanges: Vec<ExchangeSummary>,
}

/// Carbon credit issued from a meter reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonCredit {
    pub credit_id: String,
    #[serde(default)]
    pub tons_co2e: f64,
    #[serde(default)]
    pub anchor_tx: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Outcome of a full hold, exchange and settle run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub inbound: Asset,
    pub target: Asset,
    pub hold: HoldReceipt,
    pub exchange: ExchangeQuote,
    pub settlement: Settlement,
}

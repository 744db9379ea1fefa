//! Command-line front end.
//!
//! Each subcommand maps onto one library operation and reports back through a
//! [`CliResult`] so the binary decides the exit code in one place.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use crate::backend::{BackendClient, FeedbackRating};
use crate::chat::{
    ChatMode, ChatSession, ChatTurn, CredentialProvider, HealthFocus, RequestLifecycle,
    SessionStoreCredentials,
};
use crate::config::Config;
use crate::error::{ApiResult, AppError, AppResult};
use crate::rail::{
    format_amount, Asset, ExchangeQuote, ExchangeRequest, HoldRequest, RailClient, RailPayload,
    ServiceStatus, DEFAULT_PARTICIPANT,
};
use crate::scribe::{transcription_summary, ScribeClient};
use crate::storage::{Conversation, ConversationStore, SqliteStorage};
use crate::widget::WidgetClient;

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "cami", version, about = "Client for the Cami assistant API")]
pub struct Cli {
    /// JSON file of session-store entries used for optional sign-in
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,

    /// Output machine-readable JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Ask one question and print the answer
    Ask {
        question: String,

        /// cami, research, customer_service, health, legal_intelligence, tutor, cami_money
        #[arg(long, default_value = "cami")]
        mode: ChatMode,

        /// mental_health or medicine (health mode only)
        #[arg(long)]
        health_focus: Option<HealthFocus>,

        /// Continue a stored conversation
        #[arg(long)]
        chat: Option<String>,

        /// Attach a transcription result from a JSON file
        #[arg(long, conflicts_with = "scribe_audio")]
        scribe: Option<PathBuf>,

        /// Transcribe an audio file and attach the result
        #[arg(long)]
        scribe_audio: Option<PathBuf>,
    },

    /// Interactive conversation over stdin
    Chat {
        #[arg(long, default_value = "cami")]
        mode: ChatMode,

        #[arg(long)]
        health_focus: Option<HealthFocus>,

        /// Continue a stored conversation
        #[arg(long)]
        chat: Option<String>,
    },

    /// List stored conversations, newest first
    History {
        /// Maximum number of conversations to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Print a stored conversation
    Show { id: String },

    /// Delete a stored conversation
    Delete { id: String },

    /// Send messages through the embeddable widget session
    Widget {
        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// Wake the backend ahead of the first question
    Warmup,

    /// Print backend usage statistics
    Stats,

    /// Rate an assistant message
    Feedback {
        chat_id: String,
        message_index: usize,
        /// positive or negative
        rating: FeedbackRating,
    },

    /// Cami Money rail demo console
    Money {
        #[command(subcommand)]
        action: MoneyCommand,
    },
}

/// `money` subcommands. Amounts are whole units: dollars, BTC, or tons.
#[derive(Subcommand, Debug, Clone)]
pub enum MoneyCommand {
    /// Check Redis, Plaid and treasury connectivity
    Status,

    /// Link the demo bank accounts
    Connect,

    /// Quote the fee and spread for an amount
    Fee {
        #[arg(value_parser = parse_amount)]
        amount: f64,
    },

    /// Escrow an inbound amount
    Hold {
        /// USD, EUR, MXN, BTC or tCO2e
        asset: Asset,
        #[arg(value_parser = parse_amount)]
        amount: f64,
        #[arg(long, default_value = DEFAULT_PARTICIPANT)]
        participant: String,
        /// Bitcoin address of the participant
        #[arg(long)]
        btc_address: Option<String>,
    },

    /// Match a hold against a target asset
    Exchange { hold_id: String, target: Asset },

    /// Release a matched exchange
    Settle { exchange_id: String },

    /// Refund a hold
    Refund { hold_id: String },

    /// List recent exchanges
    Exchanges,

    /// Issue a carbon credit from the demo meter
    Carbon,

    /// Hold, exchange and settle in one go
    Swap {
        asset: Asset,
        #[arg(value_parser = parse_amount)]
        amount: f64,
        target: Asset,
        #[arg(long, default_value = DEFAULT_PARTICIPANT)]
        participant: String,
    },
}

fn parse_amount(raw: &str) -> Result<f64, String> {
    let amount: f64 = raw
        .parse()
        .map_err(|_| format!("not a number: {}", raw))?;
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(format!("amount must be positive, got {}", raw))
    }
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

impl From<AppResult<CliResult>> for CliResult {
    fn from(result: AppResult<CliResult>) -> Self {
        result.unwrap_or_else(|e| CliResult::error(format!("Error: {}", e)))
    }
}

/// Shared clients for one CLI invocation.
pub struct AppContext {
    pub config: Config,
    pub lifecycle: RequestLifecycle,
    pub backend: BackendClient,
    pub json: bool,
}

impl AppContext {
    /// Build clients from config, optionally signing in from a session-store file.
    pub fn new(config: Config, session_file: Option<&PathBuf>, json: bool) -> AppResult<Self> {
        let mut lifecycle = RequestLifecycle::new(&config.api, config.request.clone())?;
        if let Some(path) = session_file {
            let credentials: Arc<dyn CredentialProvider> =
                Arc::new(SessionStoreCredentials::from_file(path)?);
            lifecycle = lifecycle.with_credentials(credentials);
        }
        let backend = BackendClient::new(&config.api, &config.request)?;

        Ok(Self {
            config,
            lifecycle,
            backend,
            json,
        })
    }

    async fn storage(&self) -> AppResult<SqliteStorage> {
        Ok(SqliteStorage::new(&self.config.database).await?)
    }
}

/// Execute a CLI command.
pub async fn execute_command(command: Commands, ctx: &AppContext) -> CliResult {
    let result = match command {
        Commands::Ask {
            question,
            mode,
            health_focus,
            chat,
            scribe,
            scribe_audio,
        } => {
            let attachment = match (scribe, scribe_audio) {
                (Some(path), _) => Some(ScribeAttachment::Json(path)),
                (None, Some(path)) => Some(ScribeAttachment::Audio(path)),
                (None, None) => None,
            };
            execute_ask(ctx, &question, mode, health_focus, chat, attachment).await
        }
        Commands::Chat {
            mode,
            health_focus,
            chat,
        } => execute_chat(ctx, mode, health_focus, chat).await,
        Commands::History { limit } => execute_history(ctx, limit).await,
        Commands::Show { id } => execute_show(ctx, &id).await,
        Commands::Delete { id } => execute_delete(ctx, &id).await,
        Commands::Widget { messages } => execute_widget(ctx, messages).await,
        Commands::Warmup => execute_warmup(ctx).await,
        Commands::Stats => execute_stats(ctx).await,
        Commands::Feedback {
            chat_id,
            message_index,
            rating,
        } => execute_feedback(ctx, &chat_id, message_index, rating).await,
        Commands::Money { action } => execute_money(ctx, action).await,
    };
    result.into()
}

/// Where `ask` gets its transcription from.
#[derive(Debug, Clone, PartialEq)]
enum ScribeAttachment {
    Json(PathBuf),
    Audio(PathBuf),
}

/// Load a stored conversation or start a new one.
async fn open_session(
    ctx: &AppContext,
    storage: &SqliteStorage,
    mode: ChatMode,
    health_focus: Option<HealthFocus>,
    chat: Option<String>,
) -> AppResult<ChatSession> {
    let session = match chat {
        Some(id) => match storage.load_conversation(&id).await? {
            Some(conversation) => conversation.into_session(),
            None => ChatSession::with_id(id, mode),
        },
        None => ChatSession::new(mode),
    };
    Ok(configure_session(session, &ctx.config.api.source, health_focus))
}

/// Apply the command-line settings that every session of one invocation shares.
fn configure_session(
    mut session: ChatSession,
    source: &str,
    health_focus: Option<HealthFocus>,
) -> ChatSession {
    session.set_source(source);
    if let Some(focus) = health_focus {
        session.set_health_focus(focus);
    }
    session
}

fn render_turn(turn: &ChatTurn, session: &ChatSession, json: bool) -> AppResult<String> {
    if !json {
        return Ok(turn.reply.clone());
    }
    let value = match &turn.outcome {
        Ok(response) => serde_json::json!({
            "chat_id": session.id(),
            "ok": true,
            "response": response,
        }),
        Err(err) => serde_json::json!({
            "chat_id": session.id(),
            "ok": false,
            "error": err.kind().as_str(),
            "message": err.message(),
            "display": turn.reply,
        }),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

async fn execute_ask(
    ctx: &AppContext,
    question: &str,
    mode: ChatMode,
    health_focus: Option<HealthFocus>,
    chat: Option<String>,
    scribe: Option<ScribeAttachment>,
) -> AppResult<CliResult> {
    let storage = ctx.storage().await?;
    let mut session = open_session(ctx, &storage, mode, health_focus, chat).await?;

    match scribe {
        Some(ScribeAttachment::Json(path)) => {
            let raw = tokio::fs::read_to_string(&path).await?;
            session.set_scribe_result(serde_json::from_str(&raw)?);
        }
        Some(ScribeAttachment::Audio(path)) => {
            let scribe = ScribeClient::new(&ctx.config.api, &ctx.config.request)?;
            let transcription = scribe.transcribe_file(session.mode(), &path).await?;
            if let Some(summary) = transcription_summary(&transcription) {
                info!(chars = summary.len(), "Transcription summary attached");
            }
            session.set_scribe_result(transcription);
        }
        None => {}
    }

    let Some(turn) = session.send(question, &ctx.lifecycle).await else {
        return Ok(CliResult::error("Nothing to send: the question is empty"));
    };

    storage
        .save_conversation(&Conversation::from_session(&session))
        .await?;

    let output = render_turn(&turn, &session, ctx.json)?;
    Ok(if turn.is_success() {
        CliResult::success(output)
    } else {
        CliResult::error(output)
    })
}

async fn execute_chat(
    ctx: &AppContext,
    mode: ChatMode,
    health_focus: Option<HealthFocus>,
    chat: Option<String>,
) -> AppResult<CliResult> {
    let storage = ctx.storage().await?;
    let mut session = open_session(ctx, &storage, mode, health_focus, chat).await?;
    info!(chat = %session.id(), mode = %session.mode(), "Interactive chat started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(format!("Cami ({}) - /new to reset, /exit to quit\n", session.mode()).as_bytes())
        .await?;

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/exit" | "/quit" => break,
            "/new" => {
                session = configure_session(
                    ChatSession::new(session.mode()),
                    &ctx.config.api.source,
                    health_focus,
                );
                stdout.write_all(b"Started a new chat.\n").await?;
                continue;
            }
            _ => {}
        }

        if let Some(turn) = session.send(&line, &ctx.lifecycle).await {
            storage
                .save_conversation(&Conversation::from_session(&session))
                .await?;
            let output = render_turn(&turn, &session, ctx.json)?;
            stdout.write_all(format!("{}\n", output).as_bytes()).await?;
        }
    }

    Ok(CliResult::success(format!("Chat saved as {}", session.id())))
}

async fn execute_history(ctx: &AppContext, limit: usize) -> AppResult<CliResult> {
    let storage = ctx.storage().await?;
    let chats = storage.list_chats(limit).await?;

    if ctx.json {
        return Ok(CliResult::success(serde_json::to_string_pretty(&chats)?));
    }
    if chats.is_empty() {
        return Ok(CliResult::success("No saved conversations."));
    }

    let lines: Vec<String> = chats
        .iter()
        .map(|c| {
            format!(
                "{}  {:<18} {:>3} msgs  {}",
                c.updated_at.format("%Y-%m-%d %H:%M"),
                c.id,
                c.message_count,
                c.title
            )
        })
        .collect();
    Ok(CliResult::success(lines.join("\n")))
}

async fn execute_show(ctx: &AppContext, id: &str) -> AppResult<CliResult> {
    let storage = ctx.storage().await?;
    let Some(conversation) = storage.load_conversation(id).await? else {
        return Ok(CliResult::error(format!("Conversation not found: {}", id)));
    };

    if ctx.json {
        return Ok(CliResult::success(serde_json::to_string_pretty(&conversation)?));
    }

    let mut out = format!("{} ({})\n", conversation.id, conversation.mode);
    for message in &conversation.messages {
        out.push_str(&format!("\n[{}]\n{}\n", message.role.as_str(), message.content));
    }
    Ok(CliResult::success(out))
}

async fn execute_delete(ctx: &AppContext, id: &str) -> AppResult<CliResult> {
    let storage = ctx.storage().await?;
    storage.delete_conversation(id).await?;
    Ok(CliResult::success(format!("Deleted {}", id)))
}

async fn execute_widget(ctx: &AppContext, messages: Vec<String>) -> AppResult<CliResult> {
    if ctx.config.widget.api_key.is_empty() {
        return Err(AppError::Config {
            message: "CAMI_WIDGET_KEY is required for widget sessions".to_string(),
        });
    }

    let mut widget = WidgetClient::new(
        &ctx.config.api.base_url,
        &ctx.config.widget,
        &ctx.config.request,
    )?;
    widget.load_config().await;

    let mut transcript = Vec::new();
    if let Some(greeting) = widget.messages().first() {
        transcript.push(format!("cami: {}", greeting.content));
    }

    let mut any_failed = false;
    for message in messages {
        if let Some(reply) = widget.send(&message).await {
            any_failed |= reply.failed;
            transcript.push(format!("you:  {}", message.trim()));
            transcript.push(format!("cami: {}", reply.text));
        }
    }

    let output = transcript.join("\n");
    Ok(if any_failed {
        CliResult::error(output)
    } else {
        CliResult::success(output)
    })
}

async fn execute_warmup(ctx: &AppContext) -> AppResult<CliResult> {
    let report = ctx.backend.warmup().await;
    let reached = report.status_reachable || report.preflight_reachable;
    let message = format!(
        "status: {}, preflight: {}",
        if report.status_reachable { "sent" } else { "unreachable" },
        if report.preflight_reachable { "sent" } else { "unreachable" },
    );
    Ok(if reached {
        CliResult::success(message)
    } else {
        CliResult::error(message)
    })
}

async fn execute_stats(ctx: &AppContext) -> AppResult<CliResult> {
    let stats = ctx.backend.stats().await?;
    Ok(CliResult::success(serde_json::to_string_pretty(&stats)?))
}

async fn execute_feedback(
    ctx: &AppContext,
    chat_id: &str,
    message_index: usize,
    rating: FeedbackRating,
) -> AppResult<CliResult> {
    ctx.backend
        .submit_feedback(chat_id, message_index, rating)
        .await?;
    Ok(CliResult::success("Feedback sent"))
}

async fn execute_money(ctx: &AppContext, action: MoneyCommand) -> AppResult<CliResult> {
    let rail = RailClient::new(&ctx.config.rail, &ctx.config.request)?;

    let output = match action {
        MoneyCommand::Status => {
            let (redis, plaid, treasury) = tokio::join!(
                rail.redis_status(),
                rail.plaid_status(),
                rail.treasury_ping()
            );
            let checks = [("redis", redis), ("plaid", plaid), ("treasury", treasury)];
            let all_connected = checks
                .iter()
                .all(|(_, check)| matches!(check, Ok(status) if status.connected));
            let lines: Vec<String> = checks
                .iter()
                .map(|(name, check)| describe_status(name, check))
                .collect();
            return Ok(if all_connected {
                CliResult::success(lines.join("\n"))
            } else {
                CliResult::error(lines.join("\n"))
            });
        }
        MoneyCommand::Connect => {
            let accounts = rail.auto_connect().await?;
            if ctx.json {
                serde_json::to_string_pretty(&accounts)?
            } else if accounts.is_empty() {
                "No accounts linked".to_string()
            } else {
                accounts
                    .iter()
                    .map(|a| {
                        format!(
                            "{}  {}  {}",
                            a.id,
                            a.name,
                            Asset::Usd.format_minor(a.balance_cents as f64)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        MoneyCommand::Fee { amount } => {
            let quote = rail.fee_quote(amount).await;
            if ctx.json {
                serde_json::to_string_pretty(&quote)?
            } else {
                format!(
                    "fee: {}  spread: {}  revenue: {}",
                    Asset::Usd.format_minor(quote.fee_cents as f64),
                    Asset::Usd.format_minor(quote.spread_cents as f64),
                    Asset::Usd.format_minor(quote.revenue_cents() as f64),
                )
            }
        }
        MoneyCommand::Hold {
            asset,
            amount,
            participant,
            btc_address,
        } => {
            let mut payload = RailPayload::participant(participant);
            if let Some(address) = btc_address {
                payload = payload.with_btc_address(address);
            }
            let receipt = rail
                .hold(&HoldRequest::new(asset, amount, payload))
                .await?;
            if ctx.json {
                serde_json::to_string_pretty(&receipt)?
            } else {
                let mut out = format!(
                    "hold: {} ({})",
                    receipt.hold_id,
                    asset.format_minor(asset.to_minor_units(amount) as f64)
                );
                if let Some(tx) = &receipt.custody_tx {
                    out.push_str(&format!("\ncustody tx: {}", tx));
                }
                out
            }
        }
        MoneyCommand::Exchange { hold_id, target } => {
            let quote = rail
                .exchange(&ExchangeRequest::new(hold_id, target))
                .await?;
            if ctx.json {
                serde_json::to_string_pretty(&quote)?
            } else {
                describe_quote(&quote, target)
            }
        }
        MoneyCommand::Settle { exchange_id } => {
            let settlement = rail.settle(&exchange_id).await?;
            if ctx.json {
                serde_json::to_string_pretty(&settlement)?
            } else {
                let currency = settlement.outbound_asset.as_deref().unwrap_or("USD");
                format!(
                    "settled: {}\nrelease tx: {}",
                    format_amount(settlement.final_amount, currency),
                    settlement.release_tx.as_deref().unwrap_or("-"),
                )
            }
        }
        MoneyCommand::Refund { hold_id } => {
            let refund = rail.refund(&hold_id).await?;
            if ctx.json {
                serde_json::to_string_pretty(&refund)?
            } else {
                format!(
                    "refunded {}\nrefund tx: {}",
                    hold_id,
                    refund.refund_tx.as_deref().unwrap_or("-")
                )
            }
        }
        MoneyCommand::Exchanges => {
            let exchanges = rail.exchanges().await?;
            if ctx.json {
                serde_json::to_string_pretty(&exchanges)?
            } else if exchanges.is_empty() {
                "No exchanges".to_string()
            } else {
                let mut out = String::new();
                for exchange in &exchanges {
                    out.push_str(&format!("{}  {}\n", exchange.exchange_id, exchange.status));
                    for leg in &exchange.legs {
                        out.push_str(&format!(
                            "  {} {} {} [{}]\n",
                            leg.side,
                            leg.rail,
                            format_amount(leg.amount, &leg.currency),
                            leg.status
                        ));
                    }
                }
                out.trim_end().to_string()
            }
        }
        MoneyCommand::Carbon => {
            let credit = rail.issue_carbon().await?;
            if ctx.json {
                serde_json::to_string_pretty(&credit)?
            } else {
                format!(
                    "credit: {} ({:.3} tCO₂e)\nanchor tx: {}",
                    credit.credit_id,
                    credit.tons_co2e,
                    credit.anchor_tx.as_deref().unwrap_or("-")
                )
            }
        }
        MoneyCommand::Swap {
            asset,
            amount,
            target,
            participant,
        } => {
            let receipt = rail
                .swap(asset, amount, target, RailPayload::participant(participant))
                .await?;
            info!(
                hold_id = %receipt.hold.hold_id,
                exchange_id = %receipt.exchange.exchange_id,
                "Swap complete"
            );
            if ctx.json {
                serde_json::to_string_pretty(&receipt)?
            } else {
                format!(
                    "hold: {}\n{}\nsettled: {}",
                    receipt.hold.hold_id,
                    describe_quote(&receipt.exchange, target),
                    target.format_minor(receipt.settlement.final_amount),
                )
            }
        }
    };

    Ok(CliResult::success(output))
}

fn describe_status(name: &str, check: &ApiResult<ServiceStatus>) -> String {
    match check {
        Ok(status) if status.connected => {
            let detail = status
                .provider
                .as_deref()
                .or(status.message.as_deref())
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            format!("{}: connected{}", name, detail)
        }
        Ok(status) => format!(
            "{}: not connected{}",
            name,
            status
                .message
                .as_deref()
                .map(|m| format!(" ({})", m))
                .unwrap_or_default()
        ),
        Err(e) => format!("{}: {}", name, e),
    }
}

fn describe_quote(quote: &ExchangeQuote, target: Asset) -> String {
    format!(
        "exchange: {}\nnet: {}  fee: {}  spread: {}  revenue: {}",
        quote.exchange_id,
        target.format_minor(quote.net_outbound),
        target.format_minor(quote.fee_amount.unwrap_or(0.0)),
        target.format_minor(quote.spread()),
        target.format_minor(quote.revenue()),
    )
}

//! Console Bot Example
//!
//! Reads one message per stdin line, routes it through IMR and prints the
//! replies. Every line is treated as if it was sent by the same user in the
//! same group; both can be changed on the command line.
//!
//! # Commands
//!
//! ```text
//! ping              - pong
//! echo <text>       - echoes text
//! add <a> <b>       - sum of two integers, as a service card
//! whoami            - who sent the message
//! card              - the raw order
//! notify <text>     - admin only, sent through the sender handle
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --nick alice
//! cargo run --package console-bot -- --json   # JSON orders, one per line
//! ```

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use futures::Stream;
use imr::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(version, about = "Console bot for the IMR message router")]
struct Args {
    /// Group every line is sent to.
    #[arg(long, default_value_t = 1000)]
    group: i64,

    /// Account number of the sender.
    #[arg(long, default_value_t = 10001)]
    sender_id: i64,

    /// Display name of the sender.
    #[arg(long, default_value = "console")]
    nick: String,

    /// Account allowed to use `notify`.
    #[arg(long, default_value_t = 10001)]
    admin: i64,

    /// Read JSON orders instead of plain lines.
    #[arg(long)]
    json: bool,

    /// Configuration file. Defaults to `imr.toml` in the current directory.
    #[arg(long)]
    config: Option<PathBuf>,
}

// ============================================================================
// Sender
// ============================================================================

struct ConsoleSender;

#[async_trait]
impl Sender for ConsoleSender {
    async fn send(&self, reply: Reply) -> SendResult<()> {
        match reply.service_id() {
            Some(id) => println!(
                "[{}] <service {id}> {}",
                reply.target_group(),
                reply.content()
            ),
            None => println!("[{}] {}", reply.target_group(), reply.content()),
        }
        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

struct Toolbox;

impl Toolbox {
    async fn ping(self: Arc<Self>) -> &'static str {
        "pong"
    }

    async fn echo(self: Arc<Self>, message: String) -> Option<String> {
        message
            .strip_prefix("echo ")
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_owned)
    }

    async fn add(self: Arc<Self>, a: i32, b: i32) -> Result<String> {
        let sum = a
            .checked_add(b)
            .ok_or_else(|| anyhow::anyhow!("{a} + {b} overflows"))?;
        Ok(sum.to_string())
    }

    async fn whoami(self: Arc<Self>, nick: String, sender_id: i64, group_id: i64) -> String {
        format!("{nick} ({sender_id}) in group {group_id}")
    }

    async fn card(self: Arc<Self>, order: Arc<Order>) -> Reply {
        Reply::plain(order.describe(), order.group_id())
    }

    async fn notify(
        self: Arc<Self>,
        message: String,
        group_id: i64,
        sender: BoxedSender,
    ) -> Result<&'static str, SendError> {
        let text = message.trim_start_matches("notify").trim();
        sender
            .send(Reply::plain(format!("NOTICE: {text}"), group_id))
            .await?;
        Ok("notice sent")
    }
}

fn routes() -> Vec<Route<Toolbox>> {
    vec![
        Route::new("ping", Toolbox::ping).reply(ReplyKind::Words),
        Route::new(r"echo .+", Toolbox::echo)
            .param(ParamSpec::FullMessage)
            .reply(ReplyKind::Words),
        Route::new(r"add -?\d+ -?\d+", Toolbox::add).params([
            ParamSpec::TokenIndexAsInt(1),
            ParamSpec::TokenIndexAsInt(2),
        ]),
        Route::new("whoami", Toolbox::whoami)
            .params([ParamSpec::SenderNick, ParamSpec::SenderId, ParamSpec::GroupId])
            .reply(ReplyKind::Words),
        Route::new("card", Toolbox::card),
        Route::new(r"notify .+", Toolbox::notify)
            .name("notify")
            .params([
                ParamSpec::FullMessage,
                ParamSpec::GroupId,
                ParamSpec::ReplySenderHandle,
            ])
            .reply(ReplyKind::Words),
    ]
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn stdin_lines() -> impl Stream<Item = String> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    futures::stream::unfold(lines, |mut lines| async move {
        match lines.next_line().await {
            Ok(Some(line)) => Some((line, lines)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stdin");
                None
            }
        }
    })
}

async fn serve<F: OrderFactory>(
    args: &Args,
    factory: F,
    events: impl Stream<Item = F::Source>,
) -> Result<()> {
    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }

    let admin = args.admin;
    let toolbox = Arc::new(Toolbox);
    let client = Client::builder()
        .order_factory(factory)
        .sender(Arc::new(ConsoleSender))
        .authorizer(move |descriptor: &HandlerDescriptor, order: &Order| {
            descriptor.name() != "notify" || order.sender_id() == admin
        })
        .config_loader(loader)
        .register(&toolbox, routes())?
        .build()?;

    info!("Type a message and press enter. Ctrl+D or Ctrl+C quits.");
    client.run(events).await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.json {
        let lines = futures::StreamExt::filter_map(stdin_lines(), |line| async move {
            serde_json::from_str::<serde_json::Value>(&line)
                .inspect_err(|e| warn!(error = %e, "Skipping malformed JSON line"))
                .ok()
        });
        serve(&args, JsonOrderFactory, lines).await
    } else {
        let (group, sender_id, nick) = (args.group, args.sender_id, args.nick.clone());
        let factory = FnOrderFactory::new(move |line: String| {
            Order::new(line.trim(), group, sender_id, nick.as_str()).ok()
        });
        serve(&args, factory, stdin_lines()).await
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use crate::commands;
use crate::events::EventLevel;
use crate::message::money;
use crate::models::{CustomerDetails, OrderQueue, Product};
use crate::orders::Transition;
use crate::production::ProbeConnectivity;
use crate::retry_scheduler::{trigger_channel, SweepOutcome, Trigger};
use crate::state::AppState;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront - offline-resilient order pipeline", long_about = None)]
pub struct Cli {
    /// Directory holding the store, dev credentials and logs
    #[arg(long, env = "STOREFRONT_DATA_DIR", default_value = ".storefront")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Catalog management
    #[command(subcommand)]
    Products(ProductCommands),

    /// Working cart
    #[command(subcommand)]
    Cart(CartCommands),

    /// Check out the cart as a new order
    Order(CheckoutArgs),

    /// Pending queue and completed ledger
    #[command(subcommand)]
    Orders(OrderCommands),

    /// Export completed and pending orders to CSV
    Export {
        /// Directory to write orders_YYYY-MM-DD.csv into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Notifier settings
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Run the retry scheduler until interrupted
    Run,
}

#[derive(Subcommand)]
pub enum ProductCommands {
    /// List products, optionally filtered
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// List categories
    Categories,
    /// Add a product
    Add(ProductArgs),
    /// Replace an existing product
    Update(ProductArgs),
    /// Delete a product
    Delete {
        #[arg(value_name = "SKU")]
        id: String,
    },
}

#[derive(Args)]
pub struct ProductArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub rate: Decimal,
    #[arg(long, default_value = "pcs")]
    pub unit: String,
    #[arg(long)]
    pub category: String,
    #[arg(long, default_value = "")]
    pub image: String,
}

impl From<ProductArgs> for Product {
    fn from(args: ProductArgs) -> Self {
        Product {
            id: args.id.trim().to_string(),
            name: args.name.trim().to_string(),
            rate: args.rate,
            unit: args.unit,
            category: args.category.trim().to_string(),
            image: args.image,
        }
    }
}

#[derive(Subcommand)]
pub enum CartCommands {
    /// Show cart contents
    Show,
    /// Add a product; re-adding sets its quantity
    Add {
        #[arg(value_name = "SKU")]
        id: String,
        #[arg(short, long, default_value_t = 1)]
        qty: u32,
    },
    /// Change a line's quantity
    Set {
        #[arg(value_name = "SKU")]
        id: String,
        qty: u32,
    },
    /// Remove a line
    Remove {
        #[arg(value_name = "SKU")]
        id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub mobile: String,
    #[arg(long)]
    pub gst: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

#[derive(Subcommand)]
pub enum OrderCommands {
    /// List orders in one queue
    List {
        #[arg(short, long, default_value = "pending")]
        queue: OrderQueue,
    },
    /// Dashboard counts
    Stats,
    /// Retry one pending order, or sweep all of them
    Retry {
        #[arg(value_name = "ORDER_ID")]
        order_id: Option<String>,
    },
    /// Mark a pending order as sent without delivering it
    Complete {
        #[arg(value_name = "ORDER_ID")]
        order_id: String,
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Permanently delete an order record
    Delete {
        #[arg(value_name = "ORDER_ID")]
        order_id: String,
        #[arg(short, long)]
        queue: OrderQueue,
        /// Skip the confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Show current settings
    Show,
    /// Set the Telegram chat id
    ChatId {
        #[arg(value_name = "CHAT_ID")]
        chat_id: String,
    },
    /// Remove the Telegram chat id
    ClearChatId,
    /// Store the Telegram bot token
    Token {
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// Remove the Telegram bot token
    ClearToken,
    /// Simulate delivery while unconfigured
    Stub {
        #[arg(value_name = "on|off", value_parser = parse_switch, action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => Err(format!("expected on or off, got {}", other)),
    }
}

pub async fn dispatch(cli: Cli) -> CliResult {
    let probe = Arc::new(ProbeConnectivity::default());
    let state = AppState::new_production(&cli.data_dir, probe.clone())?;

    match cli.command {
        Commands::Products(cmd) => handle_products(&state, cmd),
        Commands::Cart(cmd) => handle_cart(&state, cmd),
        Commands::Order(args) => handle_checkout(&state, args).await,
        Commands::Orders(cmd) => handle_orders(&state, &probe, cmd).await,
        Commands::Export { dir } => handle_export(&state, &dir),
        Commands::Settings(cmd) => handle_settings(&state, cmd),
        Commands::Run => handle_run(&state, probe).await,
    }
}

fn handle_products(state: &AppState, cmd: ProductCommands) -> CliResult {
    match cmd {
        ProductCommands::List { search, category } => {
            for p in commands::list_products(state, search.as_deref(), category.as_deref()) {
                println!("{:<8} {:<28} ₹{:>10} /{:<4} {}", p.id, p.name, money(p.rate), p.unit, p.category);
            }
        }
        ProductCommands::Categories => {
            for category in commands::list_categories(state) {
                println!("{}", category);
            }
        }
        ProductCommands::Add(args) => {
            let product: Product = args.into();
            let id = product.id.clone();
            commands::add_product(state, product)?;
            println!("✓ Product {} added", id);
        }
        ProductCommands::Update(args) => {
            let product: Product = args.into();
            let id = product.id.clone();
            if commands::update_product(state, product)? {
                println!("✓ Product {} updated", id);
            } else {
                println!("No product with SKU {}", id);
            }
        }
        ProductCommands::Delete { id } => {
            if commands::delete_product(state, &id)? {
                println!("✓ Product {} deleted", id);
            } else {
                println!("No product with SKU {}", id);
            }
        }
    }
    Ok(())
}

fn handle_cart(state: &AppState, cmd: CartCommands) -> CliResult {
    let summary = match cmd {
        CartCommands::Show => commands::get_cart(state),
        CartCommands::Add { id, qty } => commands::add_to_cart(state, &id, qty)?,
        CartCommands::Set { id, qty } => commands::update_cart_quantity(state, &id, qty)?,
        CartCommands::Remove { id } => commands::remove_from_cart(state, &id)?,
        CartCommands::Clear => {
            commands::clear_cart(state)?;
            commands::get_cart(state)
        }
    };

    if summary.items.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }
    for item in &summary.items {
        println!(
            "{:<8} {:<28} x{:<4} ₹{:>10}",
            item.product.id,
            item.product.name,
            item.qty,
            money(item.line_total())
        );
    }
    println!("{} item(s), total ₹{}", summary.total_items, money(summary.total));
    Ok(())
}

async fn handle_checkout(state: &AppState, args: CheckoutArgs) -> CliResult {
    let details = CustomerDetails {
        name: args.name,
        mobile: args.mobile,
        gst: args.gst,
        address: args.address,
        notes: args.notes,
    };
    let receipt = commands::place_order(state, details).await?;
    if receipt.delivered {
        println!("✓ Order {} placed successfully", receipt.order.order_id);
    } else {
        println!(
            "Order {} saved; it will be sent automatically when delivery succeeds",
            receipt.order.order_id
        );
    }
    Ok(())
}

async fn handle_orders(state: &AppState, probe: &ProbeConnectivity, cmd: OrderCommands) -> CliResult {
    match cmd {
        OrderCommands::List { queue: OrderQueue::Pending } => {
            for entry in commands::list_pending_orders(state) {
                println!(
                    "{:<28} {:<20} ₹{:>10} attempts={} {}",
                    entry.order_id(),
                    entry.order.name,
                    money(entry.order.grand_total),
                    entry.attempt_count,
                    entry.last_error.as_deref().unwrap_or("")
                );
            }
        }
        OrderCommands::List { queue: OrderQueue::Completed } => {
            for order in commands::list_completed_orders(state) {
                println!(
                    "{:<28} {:<20} ₹{:>10} {}",
                    order.order_id,
                    order.name,
                    money(order.grand_total),
                    order.timestamp.to_rfc3339()
                );
            }
        }
        OrderCommands::Stats => {
            let stats = commands::get_dashboard(state);
            println!("Products:  {}", stats.products);
            println!("Pending:   {} ({} retried)", stats.pending, stats.retried);
            println!("Completed: {}", stats.completed);
        }
        OrderCommands::Retry { order_id: Some(order_id) } => {
            match commands::retry_order(state, &order_id).await? {
                Transition::Completed => println!("✓ Order {} sent", order_id),
                Transition::Requeued { attempt_count } => {
                    println!("Order {} still pending after {} attempt(s)", order_id, attempt_count)
                }
                Transition::NotPending => println!("Order {} is no longer pending", order_id),
            }
        }
        OrderCommands::Retry { order_id: None } => {
            probe.probe().await;
            match commands::retry_now(state).await? {
                SweepOutcome::Ran(tally) => println!(
                    "{} order(s) sent successfully, {} still pending",
                    tally.delivered.len(),
                    tally.requeued.len()
                ),
                SweepOutcome::Offline => println!("Offline; nothing was retried"),
                SweepOutcome::NothingPending => println!("No pending orders"),
                SweepOutcome::AlreadyRunning => println!("A retry is already running"),
            }
        }
        OrderCommands::Complete { order_id, yes } => {
            commands::mark_complete(state, &order_id, yes)?;
            println!("✓ Order {} marked as sent", order_id);
        }
        OrderCommands::Delete { order_id, queue, yes } => {
            if commands::delete_order(state, &order_id, queue, yes)? {
                println!("✓ Order {} deleted", order_id);
            } else {
                println!("Order {} not found in {:?} orders", order_id, queue);
            }
        }
    }
    Ok(())
}

fn handle_export(state: &AppState, dir: &Path) -> CliResult {
    let (path, rows) = commands::export_orders(state, dir)?;
    println!("✓ Exported {} order(s) to {}", rows, path.display());
    Ok(())
}

fn handle_settings(state: &AppState, cmd: SettingsCommands) -> CliResult {
    match cmd {
        SettingsCommands::Show => {
            let view = commands::get_settings(state)?;
            println!("Chat id:          {}", view.chat_id.as_deref().unwrap_or("(not configured)"));
            println!("Bot token:        {}", if view.bot_token_configured { "configured" } else { "(not configured)" });
            println!("Stub delivery:    {}", if view.stub_when_unconfigured { "on" } else { "off" });
            println!("Stub delay:       {}ms", view.stub_delay_ms);
            println!("Attempt timeout:  {}s", view.attempt_timeout_secs);
            println!("Order prefix:     {}", view.order_prefix);
        }
        SettingsCommands::ChatId { chat_id } => {
            commands::set_chat_id(state, Some(chat_id))?;
            println!("✓ Chat id saved");
        }
        SettingsCommands::ClearChatId => {
            commands::set_chat_id(state, None)?;
            println!("✓ Chat id cleared");
        }
        SettingsCommands::Token { token } => {
            commands::set_bot_token(state, Some(token))?;
            println!("✓ Bot token saved");
        }
        SettingsCommands::ClearToken => {
            commands::set_bot_token(state, None)?;
            println!("✓ Bot token cleared");
        }
        SettingsCommands::Stub { enabled } => {
            commands::set_stub_mode(state, enabled)?;
            println!("✓ Stub delivery {}", if enabled { "on" } else { "off" });
        }
    }
    Ok(())
}

/// Long-running mode: startup sweep, reconnect sweeps, events on stdout
async fn handle_run(state: &AppState, probe: Arc<ProbeConnectivity>) -> CliResult {
    let (triggers, receiver) = trigger_channel();
    probe.probe().await;

    let mut events = state.events.subscribe();
    let scheduler = state.scheduler.clone().spawn(receiver);
    let monitor = probe.clone().spawn_monitor(triggers.clone());
    triggers.send(Trigger::Startup).await?;

    tracing::info!("Storefront runner active, press Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    let marker = match event.level() {
                        EventLevel::Success => "✓",
                        EventLevel::Error => "!",
                        EventLevel::Info => "-",
                    };
                    println!("{} {}", marker, event.message());
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event output fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Shutting down");
    monitor.abort();
    drop(triggers);
    let _ = scheduler.await;
    Ok(())
}

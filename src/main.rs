mod api;
mod console;
mod polling;
mod store;
mod types;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::api_client::ApiClient;
use crate::api::api_config::ApiConfig;
use crate::api::dashboard::{DashboardQuery, DashboardReport, GroupBy};
use crate::console::ConsoleCommand;
use crate::polling::poll_config::{PollingConfig, ResourcePolling};
use crate::polling::poll_task::PollTask;
use crate::polling::types::PollOptions;
use crate::store::orders_store::{OrdersState, OrdersStore};
use crate::store::polled_store::{PolledStore, RecordsFailures};
use crate::store::tables_store::{TablesState, TablesStore};
use crate::types::RecordId;
use crate::types::amount::Amount;
use crate::types::date_range::{DateRange, RangePreset};
use crate::types::order::Order;

#[derive(Debug, Clone, Parser)]
#[command(name = "floorwatch", about = "Watches restaurant orders and tables for changes")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Poll the order list and log every change until Ctrl-C.
    Orders(WatchArgs),

    /// Poll tables with their current orders and log every change until Ctrl-C.
    Tables(WatchArgs),

    /// Fetch one dashboard report and print it as JSON.
    Dashboard(DashboardArgs),
}

#[derive(Debug, Clone, clap::Args)]
struct WatchArgs {
    /// Overrides the interval from polling.yml.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Wait one full interval before the first fetch.
    #[arg(long)]
    no_immediate: bool,

    #[arg(long)]
    deadline_ms: Option<u64>,
}

impl WatchArgs {
    fn options(&self, configured: &ResourcePolling) -> PollOptions {
        let mut options = configured.options();

        if let Some(interval_ms) = self.interval_ms {
            options.interval = Duration::from_millis(interval_ms.max(1));
        }
        if self.no_immediate {
            options.run_immediately = false;
        }
        if let Some(deadline_ms) = self.deadline_ms {
            options.deadline = Some(Duration::from_millis(deadline_ms.max(1)));
        }

        options
    }
}

#[derive(Debug, Clone, clap::Args)]
struct DashboardArgs {
    #[arg(value_enum)]
    report: DashboardReport,

    #[arg(long, value_enum, default_value = "today", conflicts_with_all = ["from", "to"])]
    range: RangePreset,

    /// First day of a custom range (YYYY-MM-DD).
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,

    /// Last day of a custom range (YYYY-MM-DD).
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,

    #[arg(long, value_enum)]
    group_by: Option<GroupBy>,

    #[arg(long)]
    limit: Option<u32>,
}

impl DashboardArgs {
    fn query(&self) -> Result<DashboardQuery> {
        let range = match (self.from, self.to) {
            (Some(from), Some(to)) => DateRange::from_days(from, to)?,
            _ => DateRange::preset(self.range, Local::now().date_naive())?,
        };

        Ok(DashboardQuery {
            range: Some(range),
            group_by: self.group_by,
            limit: self.limit,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("floorwatch=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let client = Arc::new(ApiClient::new(ApiConfig::from_env()?)?);

    match args.command {
        Command::Orders(watch_args) => {
            let options = watch_args.options(&PollingConfig::load()?.orders);
            info!(interval = ?options.interval, "watching orders");

            let mut orders = PolledStore::start(OrdersStore::new(client), options);
            let receiver = orders.subscribe();
            watch_until_shutdown(&mut orders, receiver, log_orders, |_, _| {
                warn!("table refresh only applies to `floorwatch tables`");
            })
            .await;
            orders.stop();
        }
        Command::Tables(watch_args) => {
            let options = watch_args.options(&PollingConfig::load()?.tables);
            info!(interval = ?options.interval, "watching tables");

            let mut tables = PolledStore::start(TablesStore::new(client), options);
            let receiver = tables.subscribe();
            watch_until_shutdown(&mut tables, receiver, log_tables, |store, table_id| {
                let store = Arc::clone(store);
                tokio::spawn(async move { store.refresh_table_orders(table_id).await });
            })
            .await;
            tables.stop();
        }
        Command::Dashboard(dashboard_args) => {
            let query = dashboard_args.query()?;
            let report = client.dashboard(dashboard_args.report, &query).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn watch_until_shutdown<S, T>(
    polled: &mut PolledStore<S>,
    mut receiver: watch::Receiver<T>,
    log: fn(&T),
    refresh_table: impl Fn(&Arc<S>, RecordId),
) where
    S: PollTask + RecordsFailures + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    info!("commands: {}", ConsoleCommand::HELP);

    loop {
        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    error!("store dropped its state channel");
                    break;
                }

                log(&receiver.borrow_and_update());
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                        Ok(command) => apply_command(polled, command, &refresh_table),
                        Err(error) => warn!("{error:#}"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(error) => {
                        warn!("stopped reading commands: {error}");
                        stdin_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }
}

fn apply_command<S>(
    polled: &mut PolledStore<S>,
    command: ConsoleCommand,
    refresh_table: &impl Fn(&Arc<S>, RecordId),
) where
    S: PollTask + RecordsFailures + 'static,
{
    match command {
        ConsoleCommand::Refresh => {
            info!(outcome = ?polled.refresh(), "manual refresh");
        }
        ConsoleCommand::TogglePause => {
            let enabled = !polled.is_enabled();
            polled.set_enabled(enabled);
            info!(enabled, state = ?polled.poll_state(), "polling toggled");
        }
        ConsoleCommand::Interval(interval) => {
            polled.set_interval(interval);
            info!(?interval, "interval changed");
        }
        ConsoleCommand::Table(table_id) => refresh_table(polled.store(), table_id),
    }
}

fn log_orders(state: &OrdersState) {
    if let Some(error) = &state.error {
        warn!("orders unavailable: {error:#}");
        return;
    }

    let total: Amount = state.data.iter().map(|order| order.total_amount).sum();

    info!(
        count = state.data.len(),
        statuses = ?status_tally(&state.data),
        %total,
        "orders"
    );
}

fn log_tables(state: &TablesState) {
    if let Some(error) = &state.error {
        warn!("tables unavailable: {error:#}");
        return;
    }

    let view = &state.data;
    let active = view.tables.iter().filter(|table| table.is_active).count();
    let occupied = view
        .tables
        .iter()
        .filter(|table| !view.orders_for(table.id).is_empty())
        .count();

    info!(
        count = view.tables.len(),
        active,
        occupied,
        "tables"
    );

    for table in view.tables.iter() {
        let orders = view.orders_for(table.id);
        if orders.is_empty() {
            continue;
        }

        info!(
            table = %table.table_number,
            orders = orders.len(),
            statuses = ?status_tally(orders),
            "table orders"
        );
    }
}

fn status_tally(orders: &[Order]) -> BTreeMap<String, usize> {
    let mut tally = BTreeMap::new();
    for order in orders {
        *tally.entry(order.status.to_string()).or_insert(0) += 1;
    }
    tally
}

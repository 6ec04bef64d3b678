// This is my entry point for the FundMe dashboard CLI
// Every panel of the dashboard is a subcommand; the library does the work and I only render here
use chrono::{DateTime, Utc};
use clap::Parser;
use fundme_dashboard::cli::ThemeArg;
use fundme_dashboard::core::aggregation::DEMO_SUCCESS_RATE;
use fundme_dashboard::core::monetary::conversions::{
    amount_to_display_unit, apply_price, display_units, format_number, format_usd,
    meets_minimum, milestone_progress, minimum_usd_value, parse_contribution,
    truncate_identifier,
};
use fundme_dashboard::core::monetary::DEFAULT_DISPLAY_DECIMALS;
use fundme_dashboard::core::types::address_hex;
use fundme_dashboard::network::ReadState;
use fundme_dashboard::testnet::MockChain;
use fundme_dashboard::utils::Variant;
use fundme_dashboard::{
    parse_address, Address, AggregateSnapshot, AggregationRunner, Command, ContractCaller,
    DashboardSettings, DataOrigin, FundMeContract, FunderSource, Notifier, Opt, PriceFeed,
    RelayClient, RpcClient, ScanEnd, Theme, ThemeStore, WalletProvider, WalletSession,
    GLOBAL_CONFIG, SETTINGS_FILE,
};
use log::{error, warn, LevelFilter};
use std::error::Error;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

// I keep the theme preference in its own sled database under the data directory
const PREFERENCES_DIR: &str = "preferences";

// Widest bar in the chart panel
const CHART_WIDTH: f64 = 40.0;

#[tokio::main]
async fn main() {
    // I initialize logging so I can see what the adapters are doing
    // Info level shows submissions and notifications without the per-call noise
    env_logger::builder().filter_level(LevelFilter::Info).init();

    // I parse the command line arguments using clap
    let opt = Opt::parse();

    // If anything goes wrong, I log the error and exit with code 1
    if let Err(e) = run(opt).await {
        error!("Error: {e}");
        process::exit(1);
    }
}

// Here I apply the command line overrides and pick the chain the commands will talk to
async fn run(opt: Opt) -> Result<(), Box<dyn Error>> {
    if let Some(url) = opt.rpc_url {
        GLOBAL_CONFIG.set_rpc_url(url);
    }
    if let Some(contract) = opt.contract {
        GLOBAL_CONFIG.set_contract_address(contract);
    }
    if let Some(wallet) = opt.wallet {
        GLOBAL_CONFIG.set_wallet_address(wallet);
    }
    if let Some(relay) = opt.relay_url {
        GLOBAL_CONFIG.set_relay_url(relay);
    }

    let settings = DashboardSettings::load(opt.config.as_deref().unwrap_or(SETTINGS_FILE))?;

    // The theme command only touches local storage, so I don't need a chain for it
    if let Command::Theme { theme } = opt.command {
        return run_theme(theme);
    }

    if opt.offline {
        // Offline runs go against an in-memory deployment with a few funders already in it
        let chain = Arc::new(MockChain::demo());
        let address = chain.fundme_address();
        Dashboard::new(chain, address, settings)
            .run_command(opt.command)
            .await
    } else {
        let chain = Arc::new(RpcClient::new(&GLOBAL_CONFIG.get_rpc_url())?);
        let address = GLOBAL_CONFIG.require_contract_address()?;
        Dashboard::new(chain, address, settings)
            .run_command(opt.command)
            .await
    }
}

fn open_theme_store() -> fundme_dashboard::Result<ThemeStore> {
    ThemeStore::open(GLOBAL_CONFIG.get_data_dir().join(PREFERENCES_DIR))
}

fn run_theme(theme: Option<ThemeArg>) -> Result<(), Box<dyn Error>> {
    let store = open_theme_store()?;
    let current = match theme {
        None => store.theme(),
        Some(ThemeArg::Toggle) => store.toggle()?,
        Some(ThemeArg::Light) => {
            store.set_theme(Theme::Light)?;
            Theme::Light
        }
        Some(ThemeArg::Dark) => {
            store.set_theme(Theme::Dark)?;
            Theme::Dark
        }
    };
    println!("Theme: {current}");
    Ok(())
}

// Renders a read the way the panels show it: the value, a loading marker or the error
fn show<T>(state: &ReadState<T>, render: impl Fn(&T) -> String) -> String {
    match (&state.value, &state.error) {
        (Some(value), _) => render(value),
        (None, Some(e)) => format!("unavailable ({e})"),
        (None, None) if state.is_loading => "loading...".to_string(),
        (None, None) => "-".to_string(),
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

// This bundles everything a command needs: the chain, the contract adapter and my settings
struct Dashboard<C: ContractCaller + WalletProvider + 'static> {
    chain: Arc<C>,
    contract: Arc<FundMeContract<C>>,
    settings: DashboardSettings,
    theme: Theme,
}

impl<C: ContractCaller + WalletProvider + 'static> Dashboard<C> {
    fn new(chain: Arc<C>, address: Address, settings: DashboardSettings) -> Self {
        let contract = FundMeContract::new(Arc::clone(&chain), address, Notifier::new())
            .with_receipt_polling(settings.receipt_poll(), settings.receipt_attempts);

        // A broken preferences store shouldn't stop the dashboard, I just fall back to light
        let theme = match open_theme_store() {
            Ok(store) => store.theme(),
            Err(e) => {
                warn!("Could not read theme preference: {e}");
                Theme::default()
            }
        };

        Dashboard {
            chain,
            contract: Arc::new(contract),
            settings,
            theme,
        }
    }

    fn heading(&self, title: &str) {
        println!("{}{title}\x1b[0m", self.theme.heading_style());
    }

    // I print whatever the adapters queued up, failures go to stderr
    fn flush_notifications(&self) {
        for notification in self.contract.notifier().drain() {
            match notification.variant {
                Variant::Default => {
                    println!("  [ok] {}: {}", notification.title, notification.description)
                }
                Variant::Destructive => {
                    eprintln!("  [!!] {}: {}", notification.title, notification.description)
                }
            }
        }
    }

    async fn session(&self) -> Result<WalletSession, Box<dyn Error>> {
        let configured = GLOBAL_CONFIG.get_wallet_address()?;
        Ok(WalletSession::connect(
            self.chain.as_ref(),
            configured,
            self.settings.expected_chain_id,
        )
        .await)
    }

    // The oracle address comes from the contract; without it the feed stays disabled
    async fn price_feed(&self) -> Arc<PriceFeed<C>> {
        let oracle = match self.contract.price_feed().await {
            Ok(oracle) => Some(oracle),
            Err(e) => {
                warn!("Price feed address unavailable: {e}");
                None
            }
        };
        Arc::new(PriceFeed::new(
            Arc::clone(&self.chain),
            oracle,
            self.settings.price_stale_after(),
        ))
    }

    async fn eth_price(&self) -> f64 {
        self.price_feed().await.latest().await.price
    }

    fn funder_source(&self, relay: bool) -> Result<Arc<dyn FunderSource>, Box<dyn Error>> {
        let source: Arc<dyn FunderSource> = if relay {
            let url = GLOBAL_CONFIG
                .get_relay_url()
                .ok_or("No relay URL. Set FUNDME_RELAY_URL or pass --relay-url")?;
            Arc::new(RelayClient::new(&url, self.contract.address())?)
        } else {
            self.contract.clone()
        };
        Ok(source)
    }

    async fn aggregate(&self, relay: bool, cap: u64) -> Result<AggregateSnapshot, Box<dyn Error>> {
        let runner = AggregationRunner::new(self.funder_source(relay)?, cap, self.settings.demo_fallback);
        runner
            .run()
            .await
            .ok_or_else(|| "Aggregation was superseded".into())
    }

    // This is where I handle all the dashboard panels and actions
    async fn run_command(&self, command: Command) -> Result<(), Box<dyn Error>> {
        match command {
            Command::Info => {
                let reads = self.contract.refresh_reads(None).await;
                let decimals = self.settings.minimum_usd_decimals;
                self.heading("Contract Information");
                println!(
                    "  Contract:       {}",
                    truncate_identifier(&address_hex(&self.contract.address()))
                );
                println!(
                    "  Minimum USD:    {}",
                    show(&reads.minimum_usd, |raw| format_usd(minimum_usd_value(raw, decimals)))
                );
                println!("  Version:        {}", show(&reads.version, |v| format!("v{v}")));
                println!(
                    "  Price feed:     {}",
                    show(&reads.price_feed, |a| truncate_identifier(&address_hex(a)))
                );
                println!(
                    "  Owner:          {}",
                    show(&reads.owner, |a| truncate_identifier(&address_hex(a)))
                );
            }
            Command::Price => {
                let feed = self.price_feed().await;
                let reading = feed.latest().await;
                self.heading("ETH / USD");
                if !feed.is_enabled() {
                    println!("  Price feed unavailable");
                    return Ok(());
                }
                match (&reading.raw, &reading.error) {
                    (Some(quote), _) => {
                        println!("  Price:          {}", format_usd(reading.price));
                        println!("  Round:          {}", quote.round_id);
                        if let Some(at) = DateTime::<Utc>::from_timestamp(quote.updated_at as i64, 0) {
                            println!("  Updated:        {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                        }
                    }
                    (None, Some(e)) => println!("  Price unavailable ({e})"),
                    (None, None) => println!("  Price:          {}", format_usd(0.0)),
                }
            }
            Command::Stats { relay } => {
                let price = self.eth_price().await;
                let snapshot = self.aggregate(relay, self.settings.stats_funder_cap).await?;
                self.render_stats(&snapshot, price);
            }
            Command::Chart { relay } => {
                let price = self.eth_price().await;
                let snapshot = self.aggregate(relay, self.settings.chart_funder_cap).await?;
                let projection = snapshot.projection(
                    price,
                    Utc::now().date_naive(),
                    self.settings.history_buckets,
                );

                self.heading("Funding History");
                if projection.is_placeholder() {
                    println!("  (demo data, contract unreachable)");
                } else {
                    println!("  (projected from the current total, not on-chain history)");
                }
                let peak = projection
                    .points
                    .iter()
                    .map(|p| p.eth_amount)
                    .fold(0.0_f64, f64::max);
                for point in &projection.points {
                    let width = if peak > 0.0 {
                        (point.eth_amount / peak * CHART_WIDTH).round() as usize
                    } else {
                        0
                    };
                    println!(
                        "  {:<4} {:>10.4} ETH {:>14}  {}",
                        point.label,
                        point.eth_amount,
                        format_usd(point.usd_amount),
                        "#".repeat(width)
                    );
                }
            }
            Command::Funders { relay } => {
                let price = self.eth_price().await;
                let snapshot = self.aggregate(relay, self.settings.stats_funder_cap).await?;
                self.heading("Funders");
                match snapshot.origin {
                    DataOrigin::Unavailable => println!("  Funder data unavailable"),
                    DataOrigin::DemoPlaceholder => println!("  (demo data, no funder list)"),
                    DataOrigin::Live if snapshot.funders.is_empty() => println!("  No funders yet"),
                    DataOrigin::Live => {
                        for funder in &snapshot.funders {
                            let eth = display_units(&funder.amount);
                            println!(
                                "  {:<14} {:>12} ETH {:>14}",
                                truncate_identifier(&address_hex(&funder.address)),
                                amount_to_display_unit(&funder.amount, DEFAULT_DISPLAY_DECIMALS),
                                apply_price(eth, price)
                            );
                        }
                    }
                }
            }
            Command::Funded { address } => {
                let funder = match address {
                    Some(raw) => parse_address(&raw)?,
                    None => self.session().await?.require_address()?,
                };
                let amount = self.contract.amount_funded(&funder).await?;
                let price = self.eth_price().await;
                let eth = display_units(&amount);

                self.heading("Your Contribution");
                println!("  Address:        {}", truncate_identifier(&address_hex(&funder)));
                println!(
                    "  Funded:         {} ETH",
                    amount_to_display_unit(&amount, DEFAULT_DISPLAY_DECIMALS)
                );
                println!("  USD value:      {}", apply_price(eth, price));
                println!("  Milestone:      {:.1}% of 1 ETH", milestone_progress(eth));
            }
            Command::Fund { amount } => {
                let session = self.session().await?;
                let from = session.require_address()?;
                if !session.is_correct_network() {
                    return Err(format!(
                        "Wrong network (chain {:?}). Run `network --switch` to move to chain {}",
                        session.chain_id(),
                        session.expected_chain_id()
                    )
                    .into());
                }

                let value = parse_contribution(&amount)?;

                // I check the minimum locally first so obviously short contributions never hit the chain
                let minimum_raw = self.contract.minimum_usd().await?;
                let minimum = minimum_usd_value(&minimum_raw, self.settings.minimum_usd_decimals);
                let price = self.eth_price().await;
                if !meets_minimum(display_units(&value), price, minimum) {
                    self.contract.notifier().failure(
                        "Amount Too Low",
                        &format!(
                            "Minimum contribution is {} ({} at current price)",
                            format_usd(minimum),
                            apply_price(display_units(&value), price)
                        ),
                    );
                    self.flush_notifications();
                    return Ok(());
                }

                let state = self.contract.fund(&from, value).await;
                self.flush_notifications();
                if let Some(hash) = &state.tx_hash {
                    println!("  Transaction: {hash:#x}");
                }
                if state.is_error {
                    return Err("Funding did not succeed".into());
                }
            }
            Command::Withdraw { cheaper, yes } => {
                let session = self.session().await?;
                let from = session.require_address()?;
                self.contract.refresh_reads(Some(&from)).await;
                if !self.contract.is_owner(Some(&from)) {
                    return Err("Only the contract owner can withdraw".into());
                }

                let method = if cheaper { "cheaper withdrawal" } else { "withdrawal" };
                if !yes && !confirm(&format!("Withdraw all funds using the {method}?"))? {
                    println!("Cancelled");
                    return Ok(());
                }

                let state = if cheaper {
                    self.contract.cheaper_withdraw(&from).await
                } else {
                    self.contract.withdraw(&from).await
                };
                self.flush_notifications();
                if let Some(hash) = &state.tx_hash {
                    println!("  Transaction: {hash:#x}");
                }
                if state.is_error {
                    return Err("Withdrawal did not succeed".into());
                }
            }
            Command::Network { switch } => {
                let mut session = self.session().await?;
                self.heading("Network");
                match session.chain_id() {
                    Some(id) => println!("  Chain:          {id}"),
                    None => println!("  Chain:          unknown"),
                }
                println!("  Expected:       {}", session.expected_chain_id());
                match session.address() {
                    Some(address) => {
                        println!("  Account:        {}", truncate_identifier(&address_hex(address)))
                    }
                    None => println!("  Account:        not connected"),
                }

                if session.is_correct_network() {
                    println!("  Status:         ok");
                } else if switch {
                    session.switch_to_expected(self.chain.as_ref()).await?;
                    println!("  Status:         switched to {}", session.expected_chain_id());
                } else {
                    println!("  Status:         wrong network (use --switch)");
                }
            }
            Command::Watch { updates } => {
                let feed = self.price_feed().await;
                let _refresh = feed
                    .spawn_refresh(self.settings.price_refresh())
                    .ok_or("Price feed unavailable")?;
                let runner = Arc::new(AggregationRunner::new(
                    self.funder_source(false)?,
                    self.settings.stats_funder_cap,
                    self.settings.demo_fallback,
                ));

                // Every new price re-runs the aggregation; an older run still in flight gets cancelled
                // and never publishes, so I only ever render the newest snapshot
                let mut snapshots = runner.subscribe();
                let listener = Arc::clone(&runner).spawn_price_listener(feed.subscribe());
                let mut rendered = 0u32;
                while updates.map_or(true, |limit| rendered < limit) {
                    snapshots.changed().await?;
                    let latest = snapshots.borrow_and_update().clone();
                    if let Some(snapshot) = latest {
                        let price = feed.current().price;
                        println!("  ETH/USD {}", format_usd(price));
                        self.render_stats(&snapshot, price);
                        rendered += 1;
                    }
                }
                listener.abort();
            }
            Command::Theme { theme } => run_theme(theme)?,
        }
        Ok(())
    }

    fn render_stats(&self, snapshot: &AggregateSnapshot, price: f64) {
        self.heading("Funding Stats");
        if snapshot.origin == DataOrigin::Unavailable {
            println!("  Funder data unavailable");
            return;
        }

        let totals = &snapshot.totals;
        println!(
            "  Total funded:   {} ETH",
            amount_to_display_unit(&totals.total_funded, DEFAULT_DISPLAY_DECIMALS)
        );
        if price > 0.0 {
            println!("  USD value:      {}", apply_price(snapshot.total_eth(), price));
        } else {
            println!("  USD value:      price unavailable");
        }
        println!("  Funders:        {}", format_number(totals.funder_count as u64));

        match &snapshot.end {
            Some(ScanEnd::FetchFailed { index, reason }) => {
                println!("  (partial: stopped at funder #{index}: {reason})")
            }
            Some(ScanEnd::CapReached) => println!("  (stopped at the funder cap)"),
            _ => {}
        }
        if snapshot.origin == DataOrigin::DemoPlaceholder {
            println!("  Success rate:   {DEMO_SUCCESS_RATE}%");
            println!("  (demo data, contract unreachable)");
        }
    }
}

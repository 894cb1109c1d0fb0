use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing_subscriber::EnvFilter;

use routebook::config::{config_dir, init_config_dir, load_config};
use routebook::model::{NewCustomer, NewProduct, SheetRecord};
use routebook::{Backend, Config, Ledger, LedgerError, Result};

#[derive(Parser)]
#[command(name = "routebook")]
#[command(version, about = "Route delivery ledger", long_about = None)]
struct Cli {
    /// Path to config directory (default: ~/.routebook or XDG config)
    #[arg(short = 'C', long, global = true)]
    config_dir: Option<PathBuf>,

    /// Log ledger activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory with a template config.toml
    Init,

    /// Show storage backend and record counts
    Status,

    /// Manage customers
    #[command(subcommand)]
    Customer(CustomerCommand),

    /// Manage the product catalog
    #[command(subcommand)]
    Product(ProductCommand),

    /// List routes with customer counts and outstanding totals
    Routes,

    /// Work with route sheets
    #[command(subcommand)]
    Sheet(SheetCommand),

    /// List posted invoices
    Invoices {
        /// Only invoices for this customer id
        #[arg(short, long)]
        customer: Option<String>,

        /// Number of invoices to show, newest first (default: all)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a customer's transactions with running balance
    Statement {
        /// Customer id
        customer: String,
    },
}

#[derive(Subcommand)]
enum CustomerCommand {
    /// Register a customer on a route
    Add {
        /// Customer id (default: generated)
        #[arg(long)]
        id: Option<String>,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        route: String,

        #[arg(short, long)]
        phone: Option<String>,

        /// Amount already owed when the customer joins
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        opening: f64,
    },

    /// List customers
    List {
        #[arg(short, long)]
        route: Option<String>,
    },

    /// Set a customer-specific price for a product
    Price {
        customer: String,
        product: String,
        price: f64,
    },
}

#[derive(Subcommand)]
enum ProductCommand {
    /// Add a product to the catalog
    Add {
        /// Product id used on sheets (e.g., milk-500)
        id: String,

        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        price: f64,

        #[arg(short, long)]
        unit: Option<String>,
    },

    /// List products
    List,
}

#[derive(Subcommand)]
enum SheetCommand {
    /// Open a sheet for a route
    Open {
        #[arg(short, long)]
        route: String,

        /// Sheet date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        /// Opening time, HH:MM (default: now)
        #[arg(long)]
        time: Option<String>,
    },

    /// Record deliveries for a customer
    Deliver {
        sheet: String,
        customer: String,

        /// Deliveries in format "product:quantity" (can be repeated)
        #[arg(short, long, value_name = "PRODUCT:QTY", required = true)]
        item: Vec<String>,
    },

    /// Record what a customer paid
    Pay {
        sheet: String,
        customer: String,

        #[arg(long, default_value_t = 0.0)]
        cash: f64,

        #[arg(long, default_value_t = 0.0)]
        upi: f64,
    },

    /// Show a sheet's entries
    Show { sheet: String },

    /// List sheets
    List {
        #[arg(short, long)]
        route: Option<String>,
    },

    /// Close a sheet and post it to the ledger
    Close { sheet: String },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "routebook=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cfg_dir = match cli.config_dir {
        Some(p) => p,
        None => config_dir()?,
    };

    match cli.command {
        Commands::Init => cmd_init(&cfg_dir),
        Commands::Status => cmd_status(&cfg_dir),
        Commands::Customer(cmd) => cmd_customer(&cfg_dir, cmd),
        Commands::Product(cmd) => cmd_product(&cfg_dir, cmd),
        Commands::Routes => cmd_routes(&cfg_dir),
        Commands::Sheet(cmd) => cmd_sheet(&cfg_dir, cmd),
        Commands::Invoices { customer, limit } => {
            cmd_invoices(&cfg_dir, customer.as_deref(), limit)
        }
        Commands::Statement { customer } => cmd_statement(&cfg_dir, &customer),
    }
}

/// Load config and build the ledger over the configured backend
fn open_ledger(cfg_dir: &Path) -> Result<(Config, Ledger<Backend>)> {
    let config = load_config(cfg_dir)?;
    let backend = Backend::from_config(&config, cfg_dir)?;
    Ok((config, Ledger::new(backend)))
}

fn cmd_init(cfg_dir: &Path) -> Result<()> {
    init_config_dir(cfg_dir)?;

    println!("Initialized routebook config at: {}", cfg_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit business details:  $EDITOR {}/config.toml", cfg_dir.display());
    println!("  2. Add products:           routebook product add milk --name Milk --price 25");
    println!("  3. Add customers:          routebook customer add --name Asha --route north");
    println!();
    println!("Then open your first sheet:");
    println!("  routebook sheet open --route north");

    Ok(())
}

fn cmd_status(cfg_dir: &Path) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let customers = ledger.customers(None)?;
    let products = ledger.products()?;
    let sheets = ledger.sheets(None)?;
    let active = sheets.iter().filter(|s| !s.is_closed()).count();
    let outstanding: f64 = customers.iter().map(|c| c.outstanding_amount).sum();

    println!("Routebook Status");
    println!("{}", "-".repeat(50));
    println!("Config directory: {}", cfg_dir.display());
    println!("Business:         {}", config.business.name);
    println!("Storage:          {}", ledger.store().describe());
    println!("Customers:        {}", customers.len());
    println!("Products:         {}", products.len());
    println!("Sheets:           {} ({} active)", sheets.len(), active);
    println!(
        "Outstanding:      {}",
        format_money(outstanding, &config.business.currency_symbol)
    );

    Ok(())
}

// Table row structs for tabled
#[derive(Tabled)]
struct CustomerRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ROUTE")]
    route: String,
    #[tabled(rename = "PHONE")]
    phone: String,
    #[tabled(rename = "OUTSTANDING")]
    outstanding: String,
}

#[derive(Tabled)]
struct ProductRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PRICE")]
    price: String,
    #[tabled(rename = "UNIT")]
    unit: String,
}

#[derive(Tabled)]
struct RouteRow {
    #[tabled(rename = "ROUTE")]
    name: String,
    #[tabled(rename = "CUSTOMERS")]
    customers: usize,
    #[tabled(rename = "OUTSTANDING")]
    outstanding: String,
}

#[derive(Tabled)]
struct SheetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "ROUTE")]
    route: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "CUSTOMERS")]
    customers: usize,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct SheetLineRow {
    #[tabled(rename = "CUSTOMER")]
    customer: String,
    #[tabled(rename = "DELIVERIES")]
    deliveries: String,
    #[tabled(rename = "PURCHASE")]
    purchase: String,
    #[tabled(rename = "CASH")]
    cash: String,
    #[tabled(rename = "UPI")]
    upi: String,
    #[tabled(rename = "RECEIVED")]
    received: String,
}

#[derive(Tabled)]
struct InvoiceRow {
    #[tabled(rename = "NUMBER")]
    number: String,
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "CUSTOMER")]
    customer: String,
    #[tabled(rename = "TOTAL")]
    total: String,
    #[tabled(rename = "RECEIVED")]
    received: String,
    #[tabled(rename = "STATUS")]
    status: String,
}

#[derive(Tabled)]
struct StatementRow {
    #[tabled(rename = "DATE")]
    date: String,
    #[tabled(rename = "TYPE")]
    kind: String,
    #[tabled(rename = "REFERENCE")]
    reference: String,
    #[tabled(rename = "CHANGE")]
    change: String,
    #[tabled(rename = "BALANCE")]
    balance: String,
}

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "CUSTOMER")]
    customer: String,
    #[tabled(rename = "INVOICE")]
    invoice: String,
    #[tabled(rename = "PURCHASE")]
    purchase: String,
    #[tabled(rename = "RECEIVED")]
    received: String,
    #[tabled(rename = "BALANCE")]
    balance: String,
}

fn format_money(value: f64, currency_symbol: &str) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!(
        "{}{}{}.{:02}",
        sign,
        currency_symbol,
        format_grouped_int(cents / 100),
        cents % 100
    )
}

fn format_grouped_int(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    out.chars().rev().collect()
}

/// Parse delivery input like "milk:2" into (product_id, quantity)
fn parse_delivery_input(input: &str) -> Result<(&str, f64)> {
    let (product, qty) = input
        .rsplit_once(':')
        .ok_or_else(|| LedgerError::InvalidDeliveryFormat(input.to_string()))?;

    let quantity: f64 = qty
        .parse()
        .map_err(|_| LedgerError::InvalidDeliveryFormat(input.to_string()))?;

    Ok((product, quantity))
}

fn parse_date(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| LedgerError::InvalidDate(s.to_string())),
        None => Ok(Local::now().date_naive()),
    }
}

fn parse_time(input: Option<&str>) -> Result<NaiveTime> {
    match input {
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M")
            .map_err(|_| LedgerError::InvalidTime(s.to_string())),
        None => {
            let now = Local::now().time();
            Ok(NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now))
        }
    }
}

fn cmd_customer(cfg_dir: &Path, cmd: CustomerCommand) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let symbol = &config.business.currency_symbol;

    match cmd {
        CustomerCommand::Add {
            id,
            name,
            route,
            phone,
            opening,
        } => {
            let customer = ledger.register_customer(NewCustomer {
                id,
                name,
                phone,
                route,
                opening_balance: opening,
                ..Default::default()
            })?;
            println!("Registered {} ({})", customer.name, customer.id);
            println!("  Route:       {}", customer.route);
            println!("  Outstanding: {}", format_money(customer.outstanding_amount, symbol));
        }
        CustomerCommand::List { route } => {
            let customers = ledger.customers(route.as_deref())?;
            if customers.is_empty() {
                println!("No customers registered.");
                return Ok(());
            }

            let rows: Vec<CustomerRow> = customers
                .iter()
                .map(|c| CustomerRow {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    route: c.route.clone(),
                    phone: c.phone.clone().unwrap_or_default(),
                    outstanding: format_money(c.outstanding_amount, symbol),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
        CustomerCommand::Price {
            customer,
            product,
            price,
        } => {
            ledger.set_customer_price(&customer, &product, price)?;
            println!(
                "Price for {} on {} set to {}",
                product,
                customer,
                format_money(price, symbol)
            );
        }
    }

    Ok(())
}

fn cmd_product(cfg_dir: &Path, cmd: ProductCommand) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let symbol = &config.business.currency_symbol;

    match cmd {
        ProductCommand::Add {
            id,
            name,
            price,
            unit,
        } => {
            let product = ledger.add_product(NewProduct {
                id: Some(id),
                name,
                default_price: price,
                unit,
            })?;
            println!(
                "Added {} ({}) at {}",
                product.name,
                product.id,
                format_money(product.default_price, symbol)
            );
        }
        ProductCommand::List => {
            let products = ledger.products()?;
            if products.is_empty() {
                println!("No products in catalog.");
                return Ok(());
            }

            let rows: Vec<ProductRow> = products
                .iter()
                .map(|p| ProductRow {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    price: format_money(p.default_price, symbol),
                    unit: p.unit.as_ref().map(|u| format!("/{u}")).unwrap_or_default(),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    Ok(())
}

fn cmd_routes(cfg_dir: &Path) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let routes = ledger.routes()?;
    if routes.is_empty() {
        println!("No routes yet. Add a customer with --route to create one.");
        return Ok(());
    }

    let rows: Vec<RouteRow> = routes
        .into_iter()
        .map(|r| RouteRow {
            name: r.name,
            customers: r.customers,
            outstanding: format_money(r.outstanding, &config.business.currency_symbol),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

fn cmd_sheet(cfg_dir: &Path, cmd: SheetCommand) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let symbol = &config.business.currency_symbol;

    match cmd {
        SheetCommand::Open { route, date, time } => {
            let date = parse_date(date.as_deref())?;
            let time = parse_time(time.as_deref())?;
            let sheet = ledger.open_sheet(&route, date, time)?;
            println!("Opened {}", sheet.id);
            println!("  Customers: {}", sheet.customers.len());
        }
        SheetCommand::Deliver {
            sheet,
            customer,
            item,
        } => {
            for input in &item {
                let (product, quantity) = parse_delivery_input(input)?;
                let line = ledger.record_delivery(&sheet, &customer, product, quantity)?;
                println!(
                    "{} x {} for {}: {}",
                    line.quantity,
                    product,
                    customer,
                    format_money(line.amount, symbol)
                );
            }
        }
        SheetCommand::Pay {
            sheet,
            customer,
            cash,
            upi,
        } => {
            let split = ledger.record_payment(&sheet, &customer, cash, upi)?;
            println!(
                "Received {} from {} (cash {}, upi {})",
                format_money(split.total, symbol),
                customer,
                format_money(split.cash, symbol),
                format_money(split.upi, symbol)
            );
        }
        SheetCommand::Show { sheet } => {
            let sheet = ledger.sheet(&sheet)?;
            print_sheet(&sheet, symbol);
        }
        SheetCommand::List { route } => {
            let sheets = ledger.sheets(route.as_deref())?;
            if sheets.is_empty() {
                println!("No sheets opened yet.");
                return Ok(());
            }

            let rows: Vec<SheetRow> = sheets
                .iter()
                .rev()
                .map(|s| SheetRow {
                    id: s.id.clone(),
                    route: s.route_id.clone(),
                    date: format!("{} {}", s.date, s.time.format("%H:%M")),
                    customers: s.customers.len(),
                    status: s.status.to_string(),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
        SheetCommand::Close { sheet } => {
            let summary = ledger.close_sheet(&sheet)?;
            println!("Closed {}", summary.sheet_id);
            println!(
                "  Invoices: {}  Transactions: {}  Idle customers: {}",
                summary.invoices,
                summary.transactions,
                summary.idle.len()
            );
            if !summary.resumed.is_empty() {
                println!("  Resumed after: {}", summary.resumed.join(", "));
            }

            if !summary.posted.is_empty() {
                let rows: Vec<OutcomeRow> = summary
                    .posted
                    .iter()
                    .map(|o| OutcomeRow {
                        customer: o.customer_name.clone(),
                        invoice: match (&o.invoice_number, o.status) {
                            (Some(number), Some(status)) => format!("{number} ({status})"),
                            _ => "-".to_string(),
                        },
                        purchase: format_money(o.purchase_total, symbol),
                        received: format_money(o.received, symbol),
                        balance: format!(
                            "{} -> {}",
                            format_money(o.previous_balance, symbol),
                            format_money(o.new_balance, symbol)
                        ),
                    })
                    .collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
    }

    Ok(())
}

fn print_sheet(sheet: &SheetRecord, symbol: &str) {
    println!("Sheet {} [{}]", sheet.id, sheet.status);
    println!("  Route: {}", sheet.route_id);
    println!("  Date:  {} {}", sheet.date, sheet.time.format("%H:%M"));
    if let Some(closed_at) = sheet.closed_at {
        println!("  Closed: {}", closed_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
    }

    let rows: Vec<SheetLineRow> = sheet
        .customers
        .iter()
        .map(|c| {
            let deliveries = sheet
                .delivery_data
                .get(&c.id)
                .map(|lines| {
                    lines
                        .iter()
                        .map(|(product, line)| format!("{product}:{}", line.quantity))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            let received = sheet.received(&c.id);
            SheetLineRow {
                customer: format!("{} ({})", c.name, c.id),
                deliveries,
                purchase: format_money(
                    sheet.purchase_totals.get(&c.id).copied().unwrap_or(0.0),
                    symbol,
                ),
                cash: format_money(received.cash, symbol),
                upi: format_money(received.upi, symbol),
                received: format_money(received.total, symbol),
            }
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn cmd_invoices(cfg_dir: &Path, customer: Option<&str>, limit: Option<usize>) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let symbol = &config.business.currency_symbol;

    let invoices = ledger.invoices(customer)?;
    if invoices.is_empty() {
        println!("No invoices posted yet.");
        return Ok(());
    }

    let shown: Vec<_> = invoices
        .iter()
        .rev()
        .take(limit.unwrap_or(invoices.len()))
        .collect();

    let rows: Vec<InvoiceRow> = shown
        .iter()
        .map(|i| InvoiceRow {
            number: i.invoice_number.clone(),
            date: i.date.to_string(),
            customer: i.customer_name.clone(),
            total: format_money(i.total_amount, symbol),
            received: format_money(i.amount_received, symbol),
            status: i.status.to_string(),
        })
        .collect();

    let total: f64 = shown.iter().map(|i| i.total_amount).sum();
    let received: f64 = shown.iter().map(|i| i.amount_received).sum();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!();
    println!("Total:    {}", format_money(total, symbol));
    println!("Received: {}", format_money(received, symbol));
    println!("Shown {} of {} invoices", shown.len(), invoices.len());

    Ok(())
}

fn cmd_statement(cfg_dir: &Path, customer: &str) -> Result<()> {
    let (config, ledger) = open_ledger(cfg_dir)?;
    let symbol = &config.business.currency_symbol;

    let lines = ledger.statement(customer)?;
    if lines.is_empty() {
        println!("No transactions for {customer}.");
        return Ok(());
    }

    let rows: Vec<StatementRow> = lines
        .iter()
        .map(|l| StatementRow {
            date: l.date.to_string(),
            kind: l.kind.to_string(),
            reference: l.reference.clone(),
            change: format_money(l.balance_change, symbol),
            balance: format_money(l.balance, symbol),
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));

    Ok(())
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use depot::api::stock::StockQuery;
use depot::api::users::{Credentials, LoginError};
use depot::api::{self, Id, PageQuery};
use depot::config::ConfigError;
use depot::net::{ApiClient, ApiError, Outcome};
use depot::notify::{Notice, NoticeLevel, Notifier};
use depot::router::{DocumentTitle, Location, NavigationGuard, RouteTable, Router, RouterError};
use depot::session::{FileSessionStore, SessionError, SessionStore};
use depot::ClientConfig;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("session store: {0}")]
    Session(#[from] SessionError),
    #[error("navigation failed: {0}")]
    Router(#[from] RouterError),
    #[error("log in first: `depot login --username <name>`")]
    LoginRequired,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl CliError {
    /// Pipeline failures were already shown through the notifier.
    fn already_reported(&self) -> bool {
        matches!(self, Self::Api(_) | Self::Login(LoginError::Api(_)) | Self::LoginRequired)
    }
}

#[derive(Parser, Debug)]
#[command(name = "depot", about = "Warehouse management API client")]
struct Cli {
    #[arg(long, env = "DEPOT_API_BASE")]
    base_url: Option<String>,

    #[arg(long, env = "DEPOT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long, env = "DEPOT_USERNAME")]
        username: String,
        #[arg(long, env = "DEPOT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Print the stored session record.
    Whoami,
    /// Run the navigation guard for a client route.
    Route {
        path: String,
    },
    Customers(CustomerCommand),
    Suppliers(SupplierCommand),
    Categories(CategoryCommand),
    Templates(TemplateCommand),
    Stock(StockCommand),
    Inbound(InboundCommand),
    Users(UserCommand),
}

#[derive(Args, Debug)]
struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page_num: u32,
    #[arg(long, default_value_t = api::DEFAULT_PAGE_SIZE)]
    page_size: u32,
    #[arg(long)]
    keyword: Option<String>,
}

impl From<PageArgs> for PageQuery {
    fn from(args: PageArgs) -> Self {
        Self { page_num: args.page_num, page_size: args.page_size, keyword: args.keyword }
    }
}

#[derive(Args, Debug)]
struct CustomerCommand {
    #[command(subcommand)]
    command: CustomerSubcommand,
}

#[derive(Subcommand, Debug)]
enum CustomerSubcommand {
    Page(PageArgs),
    All,
    Get { id: Id },
    ByName { name: String },
    ByPhone { phone: String },
    Search { keyword: String },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

#[derive(Args, Debug)]
struct SupplierCommand {
    #[command(subcommand)]
    command: SupplierSubcommand,
}

#[derive(Subcommand, Debug)]
enum SupplierSubcommand {
    Page(PageArgs),
    All,
    Get { id: Id },
    ByName { name: String },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

#[derive(Args, Debug)]
struct CategoryCommand {
    #[command(subcommand)]
    command: CategorySubcommand,
}

#[derive(Subcommand, Debug)]
enum CategorySubcommand {
    Page(PageArgs),
    All,
    Get { id: Id },
    ByName { name: String },
    Search { keyword: String },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

#[derive(Args, Debug)]
struct TemplateCommand {
    #[command(subcommand)]
    command: TemplateSubcommand,
}

#[derive(Subcommand, Debug)]
enum TemplateSubcommand {
    Page(PageArgs),
    All,
    Get { id: Id },
    ByName { name: String },
    ByModel { model: String },
    ByCategory { category_id: Id },
    BySupplier { supplier_id: Id },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

#[derive(Args, Debug)]
struct StockCommand {
    #[command(subcommand)]
    command: StockSubcommand,
}

#[derive(Subcommand, Debug)]
enum StockSubcommand {
    Page {
        #[command(flatten)]
        page: PageArgs,
        #[arg(long)]
        product_template_id: Option<Id>,
        #[arg(long)]
        location: Option<String>,
    },
    ByTemplate { product_template_id: Id },
    Update {
        #[arg(long)]
        data: String,
    },
}

#[derive(Args, Debug)]
struct InboundCommand {
    #[command(subcommand)]
    command: InboundSubcommand,
}

#[derive(Subcommand, Debug)]
enum InboundSubcommand {
    Page(PageArgs),
    Get { id: Id },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

#[derive(Args, Debug)]
struct UserCommand {
    #[command(subcommand)]
    command: UserSubcommand,
}

#[derive(Subcommand, Debug)]
enum UserSubcommand {
    Page(PageArgs),
    Get { id: Id },
    ByUsername { username: String },
    Create {
        #[arg(long)]
        data: String,
    },
    Update {
        #[arg(long)]
        data: String,
    },
    Delete { id: Id },
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Prints notices to stderr so stdout stays machine-readable JSON.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        let label = match notice.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("{label}: {}", notice.message);
    }
}

struct CliContext {
    client: ApiClient,
    sessions: Arc<FileSessionStore>,
    notifier: Arc<StderrNotifier>,
    router: Arc<Router>,
    title: Arc<DocumentTitle>,
}

impl CliContext {
    fn build(cli: &Cli) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(base_url) = &cli.base_url {
            config = config.with_base_url(base_url)?;
        }
        if let Some(path) = &cli.session_file {
            config.session_file.clone_from(path);
        }
        tracing::debug!(base_url = %config.base_url, session_file = %config.session_file.display(), "client config");

        let sessions = Arc::new(FileSessionStore::new(config.session_file.clone()));
        let notifier = Arc::new(StderrNotifier);
        let title = Arc::new(DocumentTitle::new());
        let guard = NavigationGuard::new(sessions.clone(), notifier.clone(), title.clone());
        let router = Arc::new(Router::new(RouteTable::warehouse(), guard));
        let client = ApiClient::new(&config, sessions.clone(), notifier.clone(), router.clone())?;
        Ok(Self { client, sessions, notifier, router, title })
    }

    /// Enter the screen a command belongs to; the guard decides if we may.
    fn enter(&self, path: &str) -> Result<(), CliError> {
        let route = self.router.push(path)?;
        if route.path() == path {
            Ok(())
        } else {
            Err(CliError::LoginRequired)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !e.already_reported() {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = CliContext::build(&cli)?;
    match cli.command {
        Command::Login { username, password } => run_login(&ctx, Credentials::new(username, password)).await,
        Command::Logout => {
            api::users::logout(ctx.sessions.as_ref())?;
            ctx.notifier.notify(Notice::info("Logged out."));
            Ok(())
        }
        Command::Whoami => match ctx.sessions.load()? {
            Some(session) => print_json(&serde_json::to_value(session)?),
            None => {
                ctx.notifier.notify(Notice::warning("Not logged in."));
                Err(CliError::LoginRequired)
            }
        },
        Command::Route { path } => run_route(&ctx, &path),
        Command::Customers(c) => run_customers(&ctx, c.command).await,
        Command::Suppliers(c) => run_suppliers(&ctx, c.command).await,
        Command::Categories(c) => run_categories(&ctx, c.command).await,
        Command::Templates(c) => run_templates(&ctx, c.command).await,
        Command::Stock(c) => run_stock(&ctx, c.command).await,
        Command::Inbound(c) => run_inbound(&ctx, c.command).await,
        Command::Users(c) => run_users(&ctx, c.command).await,
    }
}

async fn run_login(ctx: &CliContext, credentials: Credentials) -> Result<(), CliError> {
    ctx.router.push(depot::net::LOGIN_PATH)?;
    let session = api::users::login(&ctx.client, ctx.sessions.as_ref(), &credentials).await?;
    ctx.notifier.notify(Notice::info(format!(
        "Logged in as {}.",
        session.username.as_deref().unwrap_or(&credentials.username)
    )));
    Ok(())
}

fn run_route(ctx: &CliContext, path: &str) -> Result<(), CliError> {
    let target = RouteTable::warehouse().resolve(&Location::parse(path))?;
    let route = ctx.router.push(path)?;
    print_json(&json!({
        "requested": target.full_path(),
        "name": route.name,
        "path": route.full_path(),
        "title": ctx.title.get(),
        "allowed": route.name == target.name,
    }))
}

async fn run_customers(ctx: &CliContext, command: CustomerSubcommand) -> Result<(), CliError> {
    use api::customers;

    ctx.enter("/customers")?;
    let c = &ctx.client;
    let outcome = match command {
        CustomerSubcommand::Page(page) => customers::page(c, &page.into()).await,
        CustomerSubcommand::All => customers::all(c).await,
        CustomerSubcommand::Get { id } => customers::by_id(c, id).await,
        CustomerSubcommand::ByName { name } => customers::by_name(c, &name).await,
        CustomerSubcommand::ByPhone { phone } => customers::by_phone(c, &phone).await,
        CustomerSubcommand::Search { keyword } => customers::search(c, &keyword).await,
        CustomerSubcommand::Create { data } => customers::create(c, &parse_data(&data)?).await,
        CustomerSubcommand::Update { data } => customers::update(c, &parse_data(&data)?).await,
        CustomerSubcommand::Delete { id } => customers::delete(c, id).await,
    };
    print_outcome(outcome)
}

async fn run_suppliers(ctx: &CliContext, command: SupplierSubcommand) -> Result<(), CliError> {
    use api::suppliers;

    ctx.enter("/suppliers")?;
    let c = &ctx.client;
    let outcome = match command {
        SupplierSubcommand::Page(page) => suppliers::page(c, &page.into()).await,
        SupplierSubcommand::All => suppliers::all(c).await,
        SupplierSubcommand::Get { id } => suppliers::by_id(c, id).await,
        SupplierSubcommand::ByName { name } => suppliers::by_name(c, &name).await,
        SupplierSubcommand::Create { data } => suppliers::create(c, &parse_data(&data)?).await,
        SupplierSubcommand::Update { data } => suppliers::update(c, &parse_data(&data)?).await,
        SupplierSubcommand::Delete { id } => suppliers::delete(c, id).await,
    };
    print_outcome(outcome)
}

async fn run_categories(ctx: &CliContext, command: CategorySubcommand) -> Result<(), CliError> {
    use api::product_categories as categories;

    ctx.enter("/product-categories")?;
    let c = &ctx.client;
    let outcome = match command {
        CategorySubcommand::Page(page) => categories::page(c, &page.into()).await,
        CategorySubcommand::All => categories::all(c).await,
        CategorySubcommand::Get { id } => categories::by_id(c, id).await,
        CategorySubcommand::ByName { name } => categories::by_name(c, &name).await,
        CategorySubcommand::Search { keyword } => categories::search(c, &keyword).await,
        CategorySubcommand::Create { data } => categories::create(c, &parse_data(&data)?).await,
        CategorySubcommand::Update { data } => categories::update(c, &parse_data(&data)?).await,
        CategorySubcommand::Delete { id } => categories::delete(c, id).await,
    };
    print_outcome(outcome)
}

async fn run_templates(ctx: &CliContext, command: TemplateSubcommand) -> Result<(), CliError> {
    use api::product_templates as templates;

    ctx.enter("/product-templates")?;
    let c = &ctx.client;
    let outcome = match command {
        TemplateSubcommand::Page(page) => templates::page(c, &page.into()).await,
        TemplateSubcommand::All => templates::all(c).await,
        TemplateSubcommand::Get { id } => templates::by_id(c, id).await,
        TemplateSubcommand::ByName { name } => templates::by_name(c, &name).await,
        TemplateSubcommand::ByModel { model } => templates::by_model(c, &model).await,
        TemplateSubcommand::ByCategory { category_id } => templates::by_category(c, category_id).await,
        TemplateSubcommand::BySupplier { supplier_id } => templates::by_supplier(c, supplier_id).await,
        TemplateSubcommand::Create { data } => templates::create(c, &parse_data(&data)?).await,
        TemplateSubcommand::Update { data } => templates::update(c, &parse_data(&data)?).await,
        TemplateSubcommand::Delete { id } => templates::delete(c, id).await,
    };
    print_outcome(outcome)
}

async fn run_stock(ctx: &CliContext, command: StockSubcommand) -> Result<(), CliError> {
    use api::stock;

    ctx.enter("/stocks")?;
    let c = &ctx.client;
    let outcome = match command {
        StockSubcommand::Page { page, product_template_id, location } => {
            let query = StockQuery { page: page.into(), product_template_id, location };
            stock::page(c, &query).await
        }
        StockSubcommand::ByTemplate { product_template_id } => stock::by_template(c, product_template_id).await,
        StockSubcommand::Update { data } => stock::update(c, &parse_data(&data)?).await,
    };
    print_outcome(outcome)
}

async fn run_inbound(ctx: &CliContext, command: InboundSubcommand) -> Result<(), CliError> {
    use api::inbound_records as inbound;

    ctx.enter("/inbound-records")?;
    let c = &ctx.client;
    let outcome = match command {
        InboundSubcommand::Page(page) => inbound::page(c, &page.into()).await,
        InboundSubcommand::Get { id } => inbound::by_id(c, id).await,
        InboundSubcommand::Create { data } => inbound::create(c, &parse_data(&data)?).await,
        InboundSubcommand::Update { data } => inbound::update(c, &parse_data(&data)?).await,
        InboundSubcommand::Delete { id } => inbound::delete(c, id).await,
    };
    print_outcome(outcome)
}

async fn run_users(ctx: &CliContext, command: UserSubcommand) -> Result<(), CliError> {
    use api::users;

    ctx.enter("/users")?;
    let c = &ctx.client;
    let outcome = match command {
        UserSubcommand::Page(page) => users::page(c, &page.into()).await,
        UserSubcommand::Get { id } => users::by_id(c, id).await,
        UserSubcommand::ByUsername { username } => users::by_username(c, &username).await,
        UserSubcommand::Create { data } => users::create(c, &parse_data(&data)?).await,
        UserSubcommand::Update { data } => users::update(c, &parse_data(&data)?).await,
        UserSubcommand::Delete { id } => users::delete(c, id).await,
    };
    print_outcome(outcome)
}

fn parse_data(data: &str) -> Result<Value, CliError> {
    Ok(serde_json::from_str::<Value>(data)?)
}

fn print_outcome(outcome: Outcome) -> Result<(), CliError> {
    print_json(&outcome?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

//! Inventory Console
//!
//! Terminal front end for the inventory management API: store and staff
//! administration, plus a live feed of inventory changes bound to the
//! current login.

use anyhow::{anyhow, Context};
use inventory_client::{
    AdminError, AuthContext, CatalogWorkflow, ClientConfig, Credential, EventChannelManager,
    InventoryFeed, StaffEntry, StoreStaffAdmin,
};
use inventory_shared::{ApiError, InventoryUpdateEvent, Sku};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod console;

use console::{Command, HELP};

const USER_LIST_LIMIT: u32 = 100;

/// Workflows bound to one login. Replaced on every new credential, so the
/// association cache never outlives the session it was filled in.
struct Session {
    admin: StoreStaffAdmin,
    catalog: CatalogWorkflow,
}

struct Console {
    config: ClientConfig,
    auth: AuthContext,
    manager: EventChannelManager,
    session: Option<Session>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inventory_console=info,inventory_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    let auth = AuthContext::new();
    let manager = EventChannelManager::spawn(config.clone(), auth.watch());
    tokio::spawn(log_feed(manager.subscribe()));

    let mut console = Console {
        config,
        auth,
        manager,
        session: None,
    };

    if let Some(token) = std::env::var("INVENTORY_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
    {
        if let Err(e) = console.run(Command::Login(token.trim().to_string())).await {
            eprintln!("error: {e:#}");
        }
    }
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = console.run(command).await {
            eprintln!("error: {e:#}");
        }
    }

    console.manager.shutdown();
    tracing::info!("console closed");
    Ok(())
}

impl Console {
    async fn run(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Login(token) => self.login(token)?,
            Command::Logout => {
                self.auth.logout();
                self.session = None;
                println!("logged out");
            }
            Command::Status => println!("{:?}", self.manager.state()),
            Command::Event => match self.manager.latest_event() {
                Some(event) => println!("{}", describe_event(&event)),
                None => println!("no inventory event yet"),
            },
            Command::Clear => self.manager.clear_last_event(),
            Command::Stores => {
                let stores = self.session()?.admin.list_stores().await.map_err(admin_error)?;
                if stores.is_empty() {
                    println!("no stores");
                }
                for store in stores {
                    println!("{}  {}  ({})", store.id, store.name, store.address);
                }
            }
            Command::Store(store_id) => {
                let roster = self
                    .session_mut()?
                    .admin
                    .select_store(&store_id)
                    .await
                    .map_err(admin_error)?;
                print_roster(&roster);
            }
            Command::CreateStore { name, address } => {
                let store = self
                    .session_mut()?
                    .admin
                    .create_store(&name, &address)
                    .await
                    .map_err(admin_error)?;
                println!("created store {} ({}), now selected", store.name, store.id);
            }
            Command::DeleteStore(store_id) => {
                self.session_mut()?
                    .admin
                    .delete_store(&store_id)
                    .await
                    .map_err(admin_error)?;
                println!("deleted store {store_id}");
            }
            Command::Staff => {
                let admin = &self.session()?.admin;
                admin.selected_store().context("no store selected")?;
                print_roster(&admin.roster());
            }
            Command::Users => {
                let users = self
                    .session()?
                    .admin
                    .available_users(USER_LIST_LIMIT)
                    .await
                    .map_err(admin_error)?;
                for user in users {
                    println!("{}  {}  {:?}", user.id, user.username, user.role);
                }
            }
            Command::Add(user_id) => {
                let entry = self
                    .session_mut()?
                    .admin
                    .add_staff(&user_id)
                    .await
                    .map_err(admin_error)?;
                println!("added {} ({})", entry.user.username, entry.user.id);
            }
            Command::Remove(user_id) => {
                self.session_mut()?
                    .admin
                    .remove_staff(&user_id)
                    .await
                    .map_err(admin_error)?;
                println!("removed {user_id}");
            }
            Command::Categories => {
                let categories = self
                    .session()?
                    .catalog
                    .categories()
                    .await
                    .map_err(api_error)?;
                println!("{}", categories.join(", "));
            }
            Command::Item(sku_id) => {
                let sku = self
                    .session()?
                    .catalog
                    .item(&sku_id)
                    .await
                    .map_err(api_error)?;
                print_sku(&sku);
            }
            Command::NewItem(item) => {
                let sku = self
                    .session()?
                    .catalog
                    .create_item(&item)
                    .await
                    .map_err(api_error)?;
                println!("created {} ({})", sku.name, sku.id);
            }
            Command::EditItem { sku_id, input } => {
                let sku = self
                    .session()?
                    .catalog
                    .update_item(&sku_id, &input)
                    .await
                    .map_err(api_error)?;
                print_sku(&sku);
            }
            Command::Profile => {
                let user = self.session()?.catalog.profile().await.map_err(api_error)?;
                println!(
                    "{} ({})  {:?}  {}",
                    user.username,
                    user.id,
                    user.role,
                    user.email.as_deref().unwrap_or("-")
                );
            }
            Command::Passwd { old, new } => {
                let message = self
                    .session()?
                    .catalog
                    .change_password(&old, &new)
                    .await
                    .map_err(api_error)?;
                println!("{message}");
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    fn login(&mut self, token: String) -> anyhow::Result<()> {
        let unchanged = self.auth.credential().as_ref().map(Credential::expose) == Some(token.as_str());
        if unchanged && self.session.is_some() {
            println!("already logged in");
            return Ok(());
        }

        self.auth.login(token);
        self.session = None;
        let api = self
            .auth
            .client(&self.config)
            .context("cannot resolve the API address")?;
        self.session = Some(Session {
            admin: StoreStaffAdmin::new(api.clone()),
            catalog: CatalogWorkflow::new(api),
        });
        println!("logged in");
        Ok(())
    }

    fn session(&self) -> anyhow::Result<&Session> {
        self.session.as_ref().context("not logged in")
    }

    fn session_mut(&mut self) -> anyhow::Result<&mut Session> {
        self.session.as_mut().context("not logged in")
    }
}

fn admin_error(err: AdminError) -> anyhow::Error {
    match err {
        AdminError::Api(api) => api_error(api),
        other => other.into(),
    }
}

fn api_error(err: ApiError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn print_sku(sku: &Sku) {
    println!("{}  {}  [{}]  {:.2}", sku.id, sku.name, sku.category, sku.price);
    if let Some(description) = sku.description.as_deref().filter(|d| !d.is_empty()) {
        println!("  {description}");
    }
}

fn print_roster(roster: &[StaffEntry]) {
    if roster.is_empty() {
        println!("no staff assigned");
    }
    for entry in roster {
        let marker = if entry.removable { "" } else { "  (not removable here)" };
        println!("{}  {}{marker}", entry.user.id, entry.user.username);
    }
}

fn describe_event(event: &InventoryUpdateEvent) -> String {
    let mut line = match event.delta {
        Some(delta) => format!("{} {delta:+}", event.sku),
        None => event.sku.clone(),
    };
    if let Some(store_id) = &event.store_id {
        line.push_str(&format!(" at {store_id}"));
    }
    if let Some(quantity) = event.quantity {
        line.push_str(&format!(" (on hand {quantity})"));
    }
    line
}

/// Log status transitions and new events until the manager goes away.
async fn log_feed(mut feed: InventoryFeed) {
    let mut status = feed.status();
    let mut last = feed.latest_event();

    while feed.changed().await {
        let next = feed.status();
        if next != status {
            tracing::info!(status = ?next, "inventory channel status changed");
            status = next;
        }

        let event = feed.latest_event();
        if event != last {
            if let Some(event) = &event {
                tracing::info!(
                    sku = %event.sku,
                    delta = ?event.delta,
                    store_id = event.store_id.as_deref().unwrap_or("-"),
                    "inventory update"
                );
            }
            last = event;
        }
    }
}

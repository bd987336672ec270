//! Command line parsing for the interactive console.

use anyhow::{bail, Context};
use inventory_client::{InitialStock, NewItem};
use inventory_shared::SkuInput;

pub const HELP: &str = "\
commands:
  login <token>                   bind a credential (starts the live channel)
  logout                          drop the credential
  status                          channel status
  event                           latest inventory event
  clear                           forget the latest event
  stores                          list stores
  store <id>                      select a store and show its staff
  create-store <name> | <address> create and select a store
  delete-store <id>               delete a store
  staff                           staff of the selected store
  users                           users that can be added to the selected store
  add <user_id>                   add a user to the selected store
  remove <user_id>                remove a user added during this session
  categories                      SKU categories
  item <sku_id>                   show a SKU
  new-item <name> | <category> | <price> | <description> [| <store_id>:<qty> ...]
                                  create a SKU with optional starting stock
  edit-item <sku_id> | <name> | <category> | <price> | <description>
                                  update a SKU
  profile                         the signed-in user
  passwd <old> <new>              change the password
  help                            this text
  quit                            exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Login(String),
    Logout,
    Status,
    Event,
    Clear,
    Stores,
    Store(String),
    CreateStore { name: String, address: String },
    DeleteStore(String),
    Staff,
    Users,
    Add(String),
    Remove(String),
    Categories,
    Item(String),
    NewItem(NewItem),
    EditItem { sku_id: String, input: SkuInput },
    Profile,
    Passwd { old: String, new: String },
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> anyhow::Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb {
            "login" => Command::Login(argument(verb, rest)?),
            "logout" => Command::Logout,
            "status" => Command::Status,
            "event" => Command::Event,
            "clear" => Command::Clear,
            "stores" => Command::Stores,
            "store" => Command::Store(argument(verb, rest)?),
            "create-store" => {
                let (name, address) = rest
                    .split_once('|')
                    .context("usage: create-store <name> | <address>")?;
                let (name, address) = (name.trim(), address.trim());
                if name.is_empty() || address.is_empty() {
                    bail!("store name and address are required");
                }
                Command::CreateStore {
                    name: name.to_string(),
                    address: address.to_string(),
                }
            }
            "delete-store" => Command::DeleteStore(argument(verb, rest)?),
            "staff" => Command::Staff,
            "users" => Command::Users,
            "add" => Command::Add(argument(verb, rest)?),
            "remove" => Command::Remove(argument(verb, rest)?),
            "categories" => Command::Categories,
            "item" => Command::Item(argument(verb, rest)?),
            "new-item" => {
                let fields = fields(rest);
                if fields.len() < 4 {
                    bail!("usage: new-item <name> | <category> | <price> | <description> [| <store_id>:<qty> ...]");
                }
                let initial_stock = fields[4..]
                    .iter()
                    .map(|row| stock_row(row))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Command::NewItem(NewItem {
                    sku: sku_input(&fields[..4])?,
                    initial_stock,
                })
            }
            "edit-item" => {
                let fields = fields(rest);
                if fields.len() != 5 || fields[0].is_empty() {
                    bail!("usage: edit-item <sku_id> | <name> | <category> | <price> | <description>");
                }
                Command::EditItem {
                    sku_id: fields[0].to_string(),
                    input: sku_input(&fields[1..])?,
                }
            }
            "profile" => Command::Profile,
            "passwd" => match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [old, new] => Command::Passwd {
                    old: old.to_string(),
                    new: new.to_string(),
                },
                _ => bail!("usage: passwd <old> <new>"),
            },
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(Some(command))
    }
}

fn argument(verb: &str, rest: &str) -> anyhow::Result<String> {
    if rest.is_empty() {
        bail!("'{verb}' needs an argument");
    }
    Ok(rest.to_string())
}

fn fields(rest: &str) -> Vec<&str> {
    rest.split('|').map(str::trim).collect()
}

/// `name | category | price | description`
fn sku_input(fields: &[&str]) -> anyhow::Result<SkuInput> {
    let [name, category, price, description] = fields else {
        bail!("expected name, category, price and description");
    };
    if name.is_empty() || category.is_empty() {
        bail!("name and category are required");
    }
    let price: f64 = price
        .parse()
        .with_context(|| format!("invalid price '{price}'"))?;
    if !price.is_finite() || price < 0.0 {
        bail!("price must be a non-negative number");
    }
    Ok(SkuInput {
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        price,
    })
}

/// `store_id:quantity`
fn stock_row(row: &str) -> anyhow::Result<InitialStock> {
    let (store_id, quantity) = row
        .split_once(':')
        .with_context(|| format!("stock row '{row}' should be <store_id>:<qty>"))?;
    let quantity = quantity
        .trim()
        .parse()
        .with_context(|| format!("invalid quantity in '{row}'"))?;
    Ok(InitialStock {
        store_id: store_id.trim().to_string(),
        quantity,
    })
}

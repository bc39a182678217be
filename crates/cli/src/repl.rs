//! Interactive terminal client for the gateway's HTTP API.
//!
//! A `rustyline` readline loop with persistent history, dispatching on
//! the first word of each line. Every action is a thin HTTP call; no
//! scheduling or validation logic lives here — that all happens
//! server-side in the Monitor.

use std::collections::HashMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::client::Client;
use crate::session::{self, Session};

pub async fn run(base_url: String, username: Option<String>) -> anyhow::Result<()> {
    let history_path = dirs::home_dir()
        .unwrap_or_default()
        .join(".vigil")
        .join("cli_history.txt");
    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let mut rl = rustyline::DefaultEditor::new()?;
    let _ = rl.load_history(&history_path);

    let mut client = match username.as_deref().and_then(session::load) {
        Some(session) => {
            eprintln!("Resumed session for {}", session.username);
            Some(Client::new(session.base_url, session.username, session.token))
        }
        None => None,
    };

    eprintln!("Vigil — web-change monitor client");
    eprintln!("Type `help` for the main-menu actions, `exit` to quit");
    eprintln!();

    loop {
        let readline = rl.readline("vigil> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line).ok();

                if trimmed == "exit" || trimmed == "quit" {
                    break;
                }

                if let Err(e) = dispatch(trimmed, &base_url, &mut client).await {
                    eprintln!("error: {e}");
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                eprintln!("(type `exit` to quit)");
                continue;
            }
            Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    rl.save_history(&history_path).ok();
    eprintln!("Goodbye!");
    Ok(())
}

async fn dispatch(line: &str, base_url: &str, client: &mut Option<Client>) -> anyhow::Result<()> {
    let mut parts = line.splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or("").trim();

    if cmd == "help" {
        print_help();
        return Ok(());
    }
    if cmd == "login" {
        *client = Some(interactive_login(base_url, rest).await?);
        return Ok(());
    }

    let c = client
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("not logged in — run `login <username>` first"))?;

    match cmd {
        "scan" => do_scan(c).await,
        "list" => do_list(c).await,
        "add" => do_add(c).await,
        "edit" => do_edit(c, rest).await,
        "delete" => do_delete(c, rest).await,
        "reload-cookies" => do_reload_cookies(c, rest).await,
        "save" => do_save(c).await,
        "clean" => do_clean(c).await,
        other => {
            eprintln!("unknown command \"{other}\" (type `help`)");
            Ok(())
        }
    }
}

fn print_help() {
    eprintln!("Main-menu actions:");
    eprintln!("  login <username>      Authenticate and start a session");
    eprintln!("  scan                  Run a scan and show the resulting dashboard");
    eprintln!("  list                  List all queries without scanning");
    eprintln!("  add                   Add a query (prompts for fields)");
    eprintln!("  edit <uid>            Edit a query (prompts for fields to change)");
    eprintln!("  delete <uid>          Delete a query");
    eprintln!("  reload-cookies <file> <cookies.json>   Reload cookies for a file");
    eprintln!("  save                  Persist the dashboard");
    eprintln!("  clean                 Remove terminated, non-recurring queries");
    eprintln!("  exit                  Quit");
}

async fn interactive_login(base_url: &str, rest: &str) -> anyhow::Result<Client> {
    let username = if rest.is_empty() {
        prompt_line("username: ")?
    } else {
        rest.to_string()
    };
    let password = rpassword::prompt_password("password: ")?;

    let resp = Client::login(base_url, &username, &password).await?;
    if !resp.auth_success {
        anyhow::bail!("login rejected");
    }

    let session = Session {
        base_url: base_url.to_string(),
        username: resp.username.clone(),
        token: resp.token.clone(),
    };
    if let Err(e) = session::save(&session) {
        eprintln!("warning: could not persist session: {e}");
    }

    eprintln!("Logged in as {}", resp.username);
    Ok(Client::new(base_url.to_string(), resp.username, resp.token))
}

fn prompt_line(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn do_scan(client: &Client) -> anyhow::Result<()> {
    let dashboard = client.get_dashboard().await?;
    print_dashboard(&dashboard);
    Ok(())
}

async fn do_list(client: &Client) -> anyhow::Result<()> {
    let queries = client.get_all_queries().await?;
    print_dashboard(&queries);
    Ok(())
}

fn print_dashboard(rows: &HashMap<String, Value>) {
    if rows.is_empty() {
        println!("(no queries)");
        return;
    }
    for (uid, q) in rows {
        let alias = q.get("alias").and_then(Value::as_str).unwrap_or("?");
        let url = q.get("url").and_then(Value::as_str).unwrap_or("?");
        let found = q.get("found").and_then(Value::as_bool).unwrap_or(false);
        let status = q.get("status").and_then(Value::as_str).unwrap_or("?");
        let last_run = q
            .get("last_run")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok())
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{uid}  {alias:<20}  {url:<40}  found={found}  status={status}  last_run={last_run}");
    }
}

async fn do_add(client: &Client) -> anyhow::Result<()> {
    let url = prompt_line("url: ")?;
    let sequence = prompt_line("sequence (pattern): ")?;
    let interval = prompt_line("interval (e.g. 15, 2h, 1d): ")?;

    let mut fields = Map::new();
    fields.insert("url".into(), url.into());
    fields.insert("sequence".into(), sequence.into());
    fields.insert("interval".into(), interval.into());

    let result = client.add_query(fields).await?;
    println!("{}", result.msg);
    Ok(())
}

async fn do_edit(client: &Client, uid: &str) -> anyhow::Result<()> {
    if uid.is_empty() {
        anyhow::bail!("usage: edit <uid>");
    }
    let field = prompt_line("field to change (blank to cancel): ")?;
    if field.is_empty() {
        return Ok(());
    }
    let value = prompt_line(&format!("new value for {field}: "))?;

    let mut fields = Map::new();
    fields.insert("uid".into(), uid.into());
    fields.insert(field, value.into());

    let result = client.edit_query(fields).await?;
    println!("{}", result.msg);
    Ok(())
}

async fn do_delete(client: &Client, uid: &str) -> anyhow::Result<()> {
    if uid.is_empty() {
        anyhow::bail!("usage: delete <uid>");
    }
    let result = client.delete_query(uid).await?;
    println!("{}", result.msg);
    Ok(())
}

async fn do_reload_cookies(client: &Client, rest: &str) -> anyhow::Result<()> {
    let mut args = rest.split_whitespace();
    let cookies_filename = args.next().unwrap_or_default();
    let json_path = args.next().unwrap_or_default();
    if cookies_filename.is_empty() || json_path.is_empty() {
        anyhow::bail!("usage: reload-cookies <cookies_filename> <path/to/cookies.json>");
    }

    let raw = std::fs::read_to_string(json_path)?;
    let values: HashMap<String, String> = serde_json::from_str(&raw)?;
    let mut map = HashMap::new();
    map.insert(cookies_filename.to_string(), values);

    let result = client.refresh_cookies(map).await?;
    println!("{}", result.msg);
    Ok(())
}

async fn do_save(client: &Client) -> anyhow::Result<()> {
    let result = client.save().await?;
    println!("{}", result.msg);
    Ok(())
}

async fn do_clean(client: &Client) -> anyhow::Result<()> {
    let result = client.clean().await?;
    println!("{}", result.msg);
    Ok(())
}

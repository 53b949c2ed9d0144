use crate::admin::keygen::{CardKeyParams, TimeGrant, DEFAULT_CARD_KEY_LENGTH};
use crate::admin::manager::{AppChanges, Console, CredentialChanges};
use crate::admin::request::{ConsoleNotifier, Notifier};
use crate::admin::types::{
    format_duration, format_timestamp, AppDetail, AppSummary, ConsoleError, CredentialDetail,
    CredentialStatus,
};
use crate::admin::users::{
    BatchDeleteReport, CredentialList, GenerateRequest, GenerationReport, PageView,
};
use crate::admin::ConsoleConfig;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "appkey", about = "Admin console for apps, card keys and serials")]
pub struct Cli {
    /// Admin API base URL (defaults to APPKEY_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "APPKEY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and forget the session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Manage apps
    #[command(subcommand)]
    App(AppCommand),
    /// Manage per-app credentials (card keys and serials)
    #[command(subcommand)]
    User(UserCommand),
}

#[derive(Debug, Subcommand)]
enum AppCommand {
    List,
    Add {
        name: String,
    },
    Info {
        id: u64,
    },
    Set {
        id: u64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        notice: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
    /// Regenerate the app's RSA key pair
    Rekey {
        id: u64,
    },
    /// Store a JSON config blob
    Config {
        id: u64,
        #[arg(value_name = "JSON")]
        config: String,
    },
    Del {
        id: u64,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    List {
        app: u64,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        size: Option<usize>,
    },
    Info {
        id: u64,
    },
    Set {
        id: u64,
        #[arg(long)]
        status: Option<CredentialStatus>,
        #[arg(long)]
        description: Option<String>,
        /// RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC); `none` clears the expiry
        #[arg(long, value_name = "TIME")]
        end_time: Option<String>,
    },
    /// Generate card keys in bulk
    Gen {
        app: u64,
        #[arg(long, default_value_t = DEFAULT_CARD_KEY_LENGTH)]
        length: usize,
        #[arg(long, default_value_t = 1)]
        count: usize,
        #[arg(long, default_value_t = 0)]
        days: u32,
        #[arg(long, default_value_t = 0)]
        hours: u32,
    },
    /// Add a single serial
    Serial {
        app: u64,
        key: String,
        #[arg(long, default_value_t = 0)]
        days: u32,
        #[arg(long, default_value_t = 0)]
        hours: u32,
    },
    /// Delete one or more credentials of an app
    Del {
        app: u64,
        #[arg(required = true)]
        ids: Vec<u64>,
    },
}

/// Parse an expiry argument into epoch seconds (0 = none)
pub fn parse_end_time(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") || raw == "0" {
        return Ok(0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.timestamp());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ts| ts.and_utc().timestamp())
        .map_err(|_| {
            anyhow!(
                "Invalid end time '{}': use RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'none'",
                raw
            )
        })
}

struct Output {
    json: bool,
}

impl Output {
    fn emit<T: Serialize>(&self, value: &T, table: impl FnOnce()) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            table();
        }
        Ok(())
    }
}

pub async fn execute(cli: Cli) -> Result<bool> {
    let mut config = ConsoleConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url);
    }

    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
    let console = Console::new(config, Arc::clone(&notifier)).context("Failed to start console")?;
    let output = Output { json: cli.json };

    match cli.command {
        Command::Login { username, password } => {
            let logged = match console.login(&username, &password).await {
                Ok(logged) => logged,
                Err(ConsoleError::Validation(_)) => false,
                Err(e) => return Err(e.into()),
            };
            if logged {
                notifier.success(&format!("Logged in as {}", username.trim()));
            }
            Ok(logged)
        }
        Command::Logout => {
            let done = console.logout().await?;
            if done {
                notifier.success("Logged out");
            }
            Ok(done)
        }
        Command::Whoami => {
            let session = console.session()?;
            match session.username.as_deref().filter(|_| session.logged) {
                Some(username) => println!("{}", username),
                None => println!("not logged in"),
            }
            Ok(session.logged)
        }
        Command::App(command) => {
            console.require_login()?;
            app_command(&console, command, &output).await
        }
        Command::User(command) => {
            console.require_login()?;
            user_command(&console, notifier.as_ref(), command, &output).await
        }
    }
}

async fn app_command(console: &Console, command: AppCommand, output: &Output) -> Result<bool> {
    let api = console.api();
    match command {
        AppCommand::List => {
            let result = api.list_apps().await;
            if !result.success {
                return Ok(false);
            }
            let apps = result.result.unwrap_or_default();
            output.emit(&apps, || print_apps(&apps))?;
            Ok(true)
        }
        AppCommand::Add { name } => Ok(api.add_app(&name).await.success),
        AppCommand::Info { id } => {
            let Some(detail) = api.app_info(id).await.ok() else {
                return Ok(false);
            };
            output.emit(&detail, || print_app_detail(&detail))?;
            Ok(true)
        }
        AppCommand::Set {
            id,
            description,
            notice,
            status,
        } => {
            let changes = AppChanges {
                description,
                notice,
                status,
            };
            Ok(console.update_app(id, changes).await)
        }
        AppCommand::Rekey { id } => Ok(api.regenerate_app_keys(id).await.success),
        AppCommand::Config { id, config } => {
            let config: serde_json::Value =
                serde_json::from_str(&config).context("App config must be valid JSON")?;
            Ok(api.set_app_config(id, config).await.success)
        }
        AppCommand::Del { id } => Ok(api.delete_app(id).await.success),
    }
}

async fn user_command(
    console: &Console,
    notifier: &dyn Notifier,
    command: UserCommand,
    output: &Output,
) -> Result<bool> {
    let list = console.credentials();
    match command {
        UserCommand::List {
            app,
            search,
            page,
            size,
        } => {
            if !list.load(app).await {
                return Ok(false);
            }
            if let Some(keyword) = search {
                list.set_keyword(&keyword);
            }
            list.set_page(page, size.unwrap_or(console.config().page_size));

            let view = list.view();
            output.emit(&view.items, || print_page(&view))?;
            Ok(true)
        }
        UserCommand::Info { id } => {
            let Some(detail) = list.detail(id).await.ok() else {
                return Ok(false);
            };
            output.emit(&detail, || print_credential_detail(&detail))?;
            Ok(true)
        }
        UserCommand::Set {
            id,
            status,
            description,
            end_time,
        } => {
            let changes = CredentialChanges {
                status,
                description,
                end_time: end_time.as_deref().map(parse_end_time).transpose()?,
            };
            Ok(console.update_credential(&list, id, changes).await)
        }
        UserCommand::Gen {
            app,
            length,
            count,
            days,
            hours,
        } => {
            let params = CardKeyParams {
                length,
                count,
                grant: TimeGrant::new(days, hours),
            };
            generate_credentials(&list, app, GenerateRequest::CardKeys(params), output).await
        }
        UserCommand::Serial {
            app,
            key,
            days,
            hours,
        } => {
            let request = GenerateRequest::Serial {
                key,
                grant: TimeGrant::new(days, hours),
            };
            generate_credentials(&list, app, request, output).await
        }
        UserCommand::Del { app, ids } => {
            if !list.load(app).await {
                return Ok(false);
            }

            if let [id] = ids.as_slice() {
                return Ok(list.delete(*id).await);
            }

            list.toggle_select(ids.iter().copied());
            let selected: Vec<u64> = list.snapshot().selected_ids().iter().copied().collect();
            for id in ids.iter().filter(|id| !selected.contains(*id)) {
                notifier.error(&format!("Credential {} not found in app {}", id, app));
            }

            let report = list.batch_delete(&selected).await;
            output.emit(&report.deleted, || print_batch(&report))?;
            Ok(report.failed.is_empty() && selected.len() == ids.len())
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

fn print_apps(apps: &[AppSummary]) {
    println!("{:<8} {:<24} {:<10} DESCRIPTION", "ID", "NAME", "STATUS");
    for app in apps {
        println!("{:<8} {:<24} {:<10} {}", app.id, app.name, app.status, app.description);
    }
}

fn print_app_detail(app: &AppDetail) {
    println!("ID:          {}", app.id);
    println!("Name:        {}", app.name);
    println!("Status:      {}", app.status);
    println!("Description: {}", app.description);
    println!("Notice:      {}", app.notice);
    println!("Created:     {}", format_timestamp(app.creat_time));
    if let Some(count) = app.user_count {
        println!("Users:       {}", count);
    }
    if let Some(key) = &app.public_key {
        println!("Public key:\n{}", key);
    }
    if let Some(config) = &app.config {
        println!("Config:      {}", config);
    }
}

fn print_page(view: &PageView) {
    println!(
        "{:<8} {:<9} {:<18} {:<9} {:<12} {:<24} DESCRIPTION",
        "ID", "KIND", "KEY", "STATUS", "GRANT", "EXPIRES"
    );
    for credential in &view.items {
        println!(
            "{:<8} {:<9} {:<18} {:<9} {:<12} {:<24} {}",
            credential.id,
            credential.kind.to_string(),
            credential.key,
            credential.status.to_string(),
            format_duration(credential.time_interval),
            format_timestamp(credential.end_time),
            credential.description
        );
    }

    let pages = view.total.div_ceil(view.page.size).max(1);
    println!(
        "page {}/{} ({} matching, {} per page)",
        view.page.current, pages, view.total, view.page.size
    );
}

fn print_credential_detail(detail: &CredentialDetail) {
    println!("ID:          {}", detail.id);
    println!("Creator:     {}", detail.creator_id);
    println!("Kind:        {}", detail.user_type);
    println!("Card key:    {}", detail.cardkey);
    println!("Serial:      {}", detail.serial);
    println!("Status:      {}", detail.status);
    println!("Description: {}", detail.description);
    println!("Created:     {}", format_timestamp(detail.creat_time));
    println!("Grant:       {}", format_duration(detail.time_interval));
    println!("Activated:   {}", format_timestamp(detail.active_time));
    println!("Expires:     {}", format_timestamp(detail.end_time));
    println!("Last login:  {}", format_timestamp(detail.login_time));
    println!("Login IP:    {}", detail.login_ip);
}

fn print_generation(report: &GenerationReport) {
    for key in &report.keys {
        println!("{}", key);
    }
}

/// Submit new credentials; true only when every creation call succeeded
async fn generate_credentials(
    list: &CredentialList,
    app: u64,
    request: GenerateRequest,
    output: &Output,
) -> Result<bool> {
    // validation failures were already reported to the operator
    let Ok(report) = list.generate(app, request).await else {
        return Ok(false);
    };
    output.emit(&report.keys, || print_generation(&report))?;
    Ok(report.created == report.keys.len())
}

fn print_batch(report: &BatchDeleteReport) {
    for id in &report.deleted {
        println!("deleted {}", id);
    }
    for id in &report.failed {
        println!("failed  {}", id);
    }
}

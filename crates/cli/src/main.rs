use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use flowsmith_api::{FlowsApiClient, FunctionsApiClient, base_scopes};
use flowsmith_client::{ClientOptions, FlowClient, KeyringCredentials, LoginHandler, NoLogin, PollBudget, RunRequest, Services, Stores, TokenLogin};
use flowsmith_registry::CredentialProvider;
use flowsmith_util::{JsonConfigStore, section_name};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug};

mod manifest;

use manifest::{DEFAULT_MANIFEST, Manifest};

/// Access token handed to every scope on login, for non-interactive environments.
const ACCESS_TOKEN_ENV: &str = "FLOWSMITH_ACCESS_TOKEN";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    tokio::task::spawn_blocking(move || run_command(&matches, &cancel))
        .await
        .context("command task panicked")?
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .try_init();
}

fn build_cli() -> Command {
    Command::new("flowsmith")
        .about("Compile, register and run flows built from tools")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .short('m')
                .global(true)
                .action(ArgAction::Set)
                .default_value(DEFAULT_MANIFEST)
                .help("Path to the project manifest"),
        )
        .arg(
            Arg::new("no-auto-register")
                .long("no-auto-register")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Fail instead of registering missing or changed functions and flows"),
        )
        .arg(
            Arg::new("no-auto-login")
                .long("no-auto-login")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Fail instead of logging in when a scope is missing"),
        )
        .subcommand(Command::new("compile").about("Print the resolved flow definition"))
        .subcommand(Command::new("register").about("Register functions and deploy the flow"))
        .subcommand(
            Command::new("run")
                .about("Start a run")
                .arg(Arg::new("input").long("input").short('i').action(ArgAction::Set).help("Flow input as JSON, or @path to a JSON file"))
                .arg(Arg::new("no-defaults").long("no-defaults").action(ArgAction::SetTrue).help("Do not start from the default input"))
                .arg(Arg::new("label").long("label").action(ArgAction::Set))
                .arg(Arg::new("tag").long("tag").action(ArgAction::Append))
                .arg(Arg::new("wait").long("wait").short('w').action(ArgAction::SetTrue).help("Poll until the run finishes"))
                .args(poll_args()),
        )
        .subcommand(
            Command::new("status")
                .about("Show the status of a run")
                .arg(Arg::new("action_id").required(true))
                .arg(Arg::new("details").long("details").action(ArgAction::Set).help("Print the output of one state"))
                .arg(Arg::new("wait").long("wait").short('w').action(ArgAction::SetTrue))
                .args(poll_args()),
        )
        .subcommand(
            Command::new("login")
                .about("Obtain tokens for every scope the client needs")
                .arg(Arg::new("force").long("force").action(ArgAction::SetTrue)),
        )
        .subcommand(Command::new("logout").about("Revoke stored tokens"))
}

fn poll_args() -> [Arg; 2] {
    [
        Arg::new("interval")
            .long("interval")
            .action(ArgAction::Set)
            .value_parser(clap::value_parser!(u64))
            .default_value("2")
            .help("Seconds between status checks"),
        Arg::new("timeout")
            .long("timeout")
            .action(ArgAction::Set)
            .value_parser(clap::value_parser!(u64))
            .help("Give up waiting after this many seconds"),
    ]
}

fn run_command(matches: &ArgMatches, cancel: &CancellationToken) -> Result<()> {
    let (name, sub) = matches.subcommand().context("expected a subcommand")?;
    let client = build_client(matches)?;

    match name {
        "compile" => {
            let out = json!({
                "checksum": client.flow_checksum(),
                "definition": client.flow_definition(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        "register" => {
            let flow = client.register()?;
            println!("{}", serde_json::to_string_pretty(&flow)?);
        }
        "run" => {
            let request = RunRequest {
                input: sub.get_one::<String>("input").map(|raw| parse_input(raw)).transpose()?,
                use_defaults: !sub.get_flag("no-defaults"),
                label: sub.get_one::<String>("label").cloned(),
                tags: sub.get_many::<String>("tag").map(|tags| tags.cloned().collect()).unwrap_or_default(),
            };
            let run = client.run_flow(&request)?;
            println!("{}", client.run_url(&run.action_id)?);
            let run = if sub.get_flag("wait") {
                client.progress(&run.action_id, &poll_budget(sub), cancel, flowsmith_client::log_active_status)?
            } else {
                run
            };
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        "status" => {
            let action_id = sub.get_one::<String>("action_id").context("action_id is required")?;
            if let Some(state) = sub.get_one::<String>("details") {
                let details = client.get_details(action_id, state)?.unwrap_or(Value::Null);
                println!("{}", serde_json::to_string_pretty(&details)?);
                return Ok(());
            }
            let run = if sub.get_flag("wait") {
                client.progress(action_id, &poll_budget(sub), cancel, flowsmith_client::log_active_status)?
            } else {
                client.get_status(action_id)?
            };
            println!("{}", serde_json::to_string_pretty(&run)?);
        }
        "login" => {
            client.login(sub.get_flag("force"))?;
            println!("Logged in to {} scopes", client.scopes().len());
        }
        "logout" => {
            client.logout()?;
            println!("Logged out");
        }
        other => anyhow::bail!("unsupported command: {}", other),
    }
    Ok(())
}

fn build_client(matches: &ArgMatches) -> Result<FlowClient> {
    let manifest_path = matches
        .get_one::<String>("manifest")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST));
    let definition = Manifest::load(&manifest_path)?.client_definition()?;
    debug!(client = %definition.name, manifest = %manifest_path.display(), "loaded manifest");

    let credentials: Arc<dyn CredentialProvider> = Arc::new(KeyringCredentials::new(&section_name(&definition.name), login_handler()));
    let services = Services {
        functions: Arc::new(FunctionsApiClient::new(credentials.clone())?),
        flows: Arc::new(FlowsApiClient::new(credentials.clone())?),
        credentials,
        base_scopes: base_scopes(),
    };
    let stores = Stores {
        shared: Arc::new(JsonConfigStore::shared_default().context("opening shared config")?),
        private: Arc::new(JsonConfigStore::private_default().context("opening registration store")?),
    };
    let options = ClientOptions {
        auto_login: !matches.get_flag("no-auto-login"),
        auto_register: !matches.get_flag("no-auto-register"),
        ..ClientOptions::default()
    };
    Ok(FlowClient::new(definition, services, stores, options)?)
}

fn login_handler() -> Box<dyn LoginHandler> {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Box::new(TokenLogin::new(token)),
        _ => Box::new(NoLogin),
    }
}

fn parse_input(raw: &str) -> Result<Value> {
    let text = match raw.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading input file {}", path))?,
        None => raw.to_string(),
    };
    serde_json::from_str(&text).context("flow input must be valid JSON")
}

fn poll_budget(matches: &ArgMatches) -> PollBudget {
    let mut budget = PollBudget::default();
    if let Some(interval) = matches.get_one::<u64>("interval") {
        budget = budget.with_interval(std::time::Duration::from_secs(*interval));
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        budget = budget.with_deadline(std::time::Duration::from_secs(*timeout));
    }
    budget
}

//! winfw - Windows Firewall rule manager
//!
//! Command-line front end for the `winfw` library.
//!
//! # Usage
//!
//! ```bash
//! winfw list                                   # All rules
//! winfw show "Remote Desktop - User Mode (TCP-In)"
//! winfw add Web --direction in --action allow --protocol tcp --local-ports 80,443
//! winfw set Web --profiles "Private, Public"
//! winfw disable Web
//! winfw settings                               # Domain / Private / Public settings
//! winfw profile set public --default-inbound block
//! winfw resolve protocol icmp                  # -> ICMPv4
//! winfw config set default_profiles private
//! winfw audit -n 5                             # Newest audit events
//! ```
//!
//! Mutating commands need an elevated prompt. Every change is recorded in
//! the audit log unless disabled in `config.json`.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use tracing::Level;
use winfw::audit::{self, AuditLog, EventType};
use winfw::config::{self, AppConfig};
use winfw::core::error::StoreErrorPattern;
use winfw::{
    Axis, FirewallRule, NewRule, OperationResult, RuleManager, RuleUpdate, SettingsManager,
    SettingsUpdate,
};

shadow_rs::shadow!(build);

#[cfg(windows)]
type Store = winfw::core::com_store::ComPolicyStore;
#[cfg(not(windows))]
type Store = winfw::core::store::UnavailableStore;

#[derive(Parser)]
#[command(name = "winfw")]
#[command(about = "Manage Windows Firewall rules and profiles", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all rules with every field
    List,
    /// List rule names, direction, state and action
    Summary,
    /// Show the first rule with the given name
    Show { name: String },
    /// Create a rule
    Add(AddArgs),
    /// Change fields on every rule with the given name
    Set {
        name: String,
        #[command(flatten)]
        fields: SetArgs,
    },
    /// Rename every rule with the given name
    Rename { name: String, new_name: String },
    /// Enable every rule with the given name
    Enable { name: String },
    /// Disable every rule with the given name
    Disable { name: String },
    /// Delete every rule with the given name
    Remove { name: String },
    /// Show firewall settings for each profile
    Settings,
    /// Change firewall settings for one or more profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// Print the canonical spelling of an alias
    Resolve { axis: Axis, text: String },
    /// Show or change saved preferences
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Show the newest audit log events
    Audit {
        /// Number of events to show
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
    /// Print build information
    Version,
}

#[derive(Args)]
struct AddArgs {
    name: String,
    #[arg(short, long)]
    direction: String,
    #[arg(short, long)]
    action: String,
    #[arg(short, long)]
    protocol: Option<String>,
    #[arg(long)]
    local_ports: Option<String>,
    #[arg(long)]
    remote_ports: Option<String>,
    #[arg(long)]
    local_addresses: Option<String>,
    #[arg(long)]
    remote_addresses: Option<String>,
    /// Path of the program the rule applies to
    #[arg(long)]
    application: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    description: Option<String>,
    /// Profile set, e.g. "Private, Public" (default from config)
    #[arg(long)]
    profiles: Option<String>,
    /// Create the rule disabled
    #[arg(long)]
    disabled: bool,
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    description: Option<String>,
    #[arg(short, long)]
    direction: Option<String>,
    #[arg(short, long)]
    action: Option<String>,
    #[arg(long)]
    group: Option<String>,
    #[arg(long)]
    application: Option<String>,
    #[arg(short, long)]
    protocol: Option<String>,
    #[arg(long)]
    local_ports: Option<String>,
    #[arg(long)]
    remote_ports: Option<String>,
    #[arg(long)]
    local_addresses: Option<String>,
    #[arg(long)]
    remote_addresses: Option<String>,
    #[arg(long)]
    profiles: Option<String>,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Turn the firewall on for a profile set
    Enable { profiles: String },
    /// Turn the firewall off for a profile set
    Disable { profiles: String },
    /// Change profile parameters
    Set {
        profiles: String,
        #[arg(long)]
        block_all_inbound: Option<bool>,
        #[arg(long)]
        notify_on_listen: Option<bool>,
        #[arg(long)]
        default_inbound: Option<String>,
        #[arg(long)]
        default_outbound: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the current preferences
    Show,
    /// Change one preference (json_output, default_profiles, enable_audit_log)
    Set { key: String, value: String },
}

impl From<SetArgs> for RuleUpdate {
    fn from(args: SetArgs) -> Self {
        Self {
            description: args.description,
            direction: args.direction,
            action_type: args.action,
            grouping: args.group,
            application_name: args.application,
            protocol: args.protocol,
            local_ports: args.local_ports,
            remote_ports: args.remote_ports,
            local_addresses: args.local_addresses,
            remote_addresses: args.remote_addresses,
            profiles: args.profiles,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match handle_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let _ = winfw::utils::ensure_dirs();
    if let Some(log_path) = winfw::utils::get_state_dir().map(|dir| dir.join("winfw.log"))
        && let Ok(file) = std::fs::File::create(log_path)
    {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn handle_cli(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config::load_config();
    let json = cli.json || config.json_output;
    let rules = RuleManager::new(Store::default());
    let settings = SettingsManager::new(Store::default());

    match cli.command {
        Commands::List => {
            let all = rules.load_all()?;
            if json {
                print_json(&all)?;
            } else {
                for rule in &all {
                    print_rule(rule);
                    println!();
                }
                println!("{} rule(s)", all.len());
            }
        }
        Commands::Summary => {
            let summaries = rules.load_summaries()?;
            if json {
                print_json(&summaries)?;
            } else {
                println!("{:<9} {:<8} {:<6} NAME", "DIRECTION", "ENABLED", "ACTION");
                for s in &summaries {
                    println!(
                        "{:<9} {:<8} {:<6} {}",
                        s.direction, s.enabled, s.action_type, s.display_name
                    );
                }
            }
        }
        Commands::Show { name } => match rules.find(&name)? {
            Some(rule) if json => print_json(&rule)?,
            Some(rule) => print_rule(&rule),
            None => return Err(format!("No rule named '{name}'").into()),
        },
        Commands::Add(args) => {
            let new = NewRule {
                display_name: args.name,
                description: args.description,
                enabled: !args.disabled,
                direction: args.direction,
                action_type: args.action,
                grouping: args.group,
                application_name: args.application,
                profiles: Some(args.profiles.unwrap_or_else(|| config.default_profiles.clone())),
                protocol: args.protocol,
                local_ports: args.local_ports,
                remote_ports: args.remote_ports,
                local_addresses: args.local_addresses,
                remote_addresses: args.remote_addresses,
            };
            let details = serde_json::to_value(&new)?;
            let result = rules.create(&new);
            report(&config, EventType::CreateRule, details, &result)?;
        }
        Commands::Set { name, fields } => {
            let update = RuleUpdate::from(fields);
            let details = serde_json::json!({ "name": name, "update": update });
            let result = rules.set_fields(&name, &update);
            report(&config, EventType::UpdateRule, details, &result)?;
        }
        Commands::Rename { name, new_name } => {
            let result = rules.rename(&name, &new_name);
            let details = serde_json::json!({ "from": name, "to": new_name });
            report(&config, EventType::RenameRule, details, &result)?;
        }
        Commands::Enable { name } => {
            let result = rules.enable(&name);
            report(&config, EventType::EnableRule, serde_json::json!({ "name": name }), &result)?;
        }
        Commands::Disable { name } => {
            let result = rules.disable(&name);
            report(&config, EventType::DisableRule, serde_json::json!({ "name": name }), &result)?;
        }
        Commands::Remove { name } => {
            let result = rules.remove(&name);
            report(&config, EventType::RemoveRule, serde_json::json!({ "name": name }), &result)?;
        }
        Commands::Settings => {
            let all = settings.load()?;
            if json {
                print_json(&all)?;
            } else {
                for s in &all {
                    println!("{} profile", s.profile);
                    println!("  Enabled:                 {}", s.enabled);
                    println!("  Block all inbound:       {}", s.block_all_inbound);
                    println!("  Notify on listen:        {}", s.notify_on_listen);
                    println!("  Default inbound action:  {}", s.default_inbound_action);
                    println!("  Default outbound action: {}", s.default_outbound_action);
                }
            }
        }
        Commands::Profile { command } => {
            let (result, details) = match command {
                ProfileCommand::Enable { profiles } => (
                    settings.enable(&profiles),
                    serde_json::json!({ "profiles": profiles, "enabled": true }),
                ),
                ProfileCommand::Disable { profiles } => (
                    settings.disable(&profiles),
                    serde_json::json!({ "profiles": profiles, "enabled": false }),
                ),
                ProfileCommand::Set {
                    profiles,
                    block_all_inbound,
                    notify_on_listen,
                    default_inbound,
                    default_outbound,
                } => {
                    let update = SettingsUpdate {
                        block_all_inbound,
                        notify_on_listen,
                        default_inbound_action: default_inbound,
                        default_outbound_action: default_outbound,
                    };
                    (
                        settings.set_parameters(&profiles, &update),
                        serde_json::json!({ "profiles": profiles, "update": update }),
                    )
                }
            };
            report(&config, EventType::UpdateProfileSetting, details, &result)?;
        }
        Commands::Resolve { axis, text } => {
            println!("{}", winfw::canonicalize(axis, &text)?);
        }
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                if json {
                    print_json(&config)?;
                } else {
                    println!("json_output       = {}", config.json_output);
                    println!("default_profiles  = {}", config.default_profiles);
                    println!("enable_audit_log  = {}", config.enable_audit_log);
                }
            }
            ConfigCommand::Set { key, value } => {
                config.set(&key, &value)?;
                config::save_config(&config)?;
                println!("✓ Saved {key}");
            }
        },
        Commands::Audit { count } => {
            let log = AuditLog::new()?;
            let events = match log.read_recent(count) {
                Ok(events) => events,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e.into()),
            };
            if json {
                print_json(&events)?;
            } else if events.is_empty() {
                println!("No audit events in {}", log.path().display());
            } else {
                for event in &events {
                    let status = if event.success { "ok" } else { "failed" };
                    println!(
                        "{} {:<22} {:<6} {}",
                        event.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        event.event_type.to_string(),
                        status,
                        event.details
                    );
                    if let Some(error) = &event.error {
                        println!("    {error}");
                    }
                }
            }
        }
        Commands::Version => {
            println!("winfw {}", build::PKG_VERSION);
            let dirty = if build::GIT_CLEAN { "" } else { " (dirty)" };
            println!("commit:  {}{}", build::SHORT_COMMIT, dirty);
            println!("built:   {}", build::BUILD_TIME);
            println!("rustc:   {}", build::RUST_VERSION);
        }
    }
    Ok(())
}

/// Audits a mutation and prints its outcome; a failed result becomes an error exit.
fn report(
    config: &AppConfig,
    event: EventType,
    details: serde_json::Value,
    result: &OperationResult,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.enable_audit_log {
        audit::record(event, result.success, details, result.error.clone());
    }

    if result.success {
        println!("✓ Done ({} affected)", result.affected);
        return Ok(());
    }

    let message = result.error.clone().unwrap_or_default();
    if !result.soft {
        let translation = StoreErrorPattern::match_error(&message);
        eprintln!("✗ {}", translation.user_message);
        for suggestion in &translation.suggestions {
            eprintln!("  - {suggestion}");
        }
        if let Some(url) = &translation.help_url {
            eprintln!("  See: {url}");
        }
    }
    Err(message.into())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_rule(rule: &FirewallRule) {
    println!("Name:             {}", rule.display_name);
    println!("Description:      {}", rule.description);
    println!("Enabled:          {}", rule.enabled);
    println!("Group:            {}", rule.display_group);
    println!("Direction:        {}", rule.direction);
    println!("Action:           {}", rule.action_type);
    println!("Protocol:         {}", rule.protocol);
    println!("Local ports:      {}", rule.local_ports);
    println!("Remote ports:     {}", rule.remote_ports);
    println!("Local addresses:  {}", rule.local_addresses);
    println!("Remote addresses: {}", rule.remote_addresses);
    println!("Application:      {}", rule.application_name);
    println!("Profiles:         {}", rule.profiles);
}

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use geogate::address::validate_address_entry;
use geogate::config::{Config, RulesFile};
use geogate::gate::AccessGate;
use geogate::geo::GeoResolver;
use geogate::rules::{regions, RequesterContext};

#[derive(Parser)]
#[command(name = "geogate")]
#[command(about = "Geo/IP access decisions from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate address entries (single address, CIDR or start-end range)
    Validate {
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// Describe the network covered by an address entry
    Ip { entry: String },
    /// Resolve an address to its location
    Resolve {
        address: String,
        /// Print the full record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decide access for an address against a rules file
    Check {
        address: String,
        /// Rules file (TOML, JSON or YAML)
        #[arg(long)]
        rules: PathBuf,
        /// Treat the requester as exempt
        #[arg(long)]
        exempt: bool,
        /// Requester is an administrator
        #[arg(long)]
        admin: bool,
        /// Requester is logged in
        #[arg(long)]
        logged_in: bool,
        /// Requester role, repeatable
        #[arg(long = "role")]
        roles: Vec<String>,
        /// Request path, matched against exempted URLs
        #[arg(long)]
        path: Option<String>,
        /// Give up on geolocation after this many milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,
        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the country region groups usable in rules files
    Regions,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geogate=info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { entries } => {
            let mut invalid = 0;
            for entry in &entries {
                match validate_address_entry(entry) {
                    Ok(parsed) => println!("✓ {entry} -> {parsed}"),
                    Err(err) => {
                        invalid += 1;
                        println!("✗ {entry}: {err}");
                    }
                }
            }
            if invalid > 0 {
                bail!("{invalid} of {} entries are invalid", entries.len());
            }
        }
        Commands::Ip { entry } => {
            let parsed = validate_address_entry(&entry)
                .with_context(|| format!("invalid address entry '{entry}'"))?;
            let info = parsed.network_info();
            println!("Entry:      {parsed}");
            println!("Family:     {}", if parsed.is_ipv6() { "IPv6" } else { "IPv4" });
            println!("First:      {}", info.first);
            println!("Last:       {}", info.last);
            if let Some(prefix_len) = info.prefix_len {
                println!("Prefix:     /{prefix_len}");
            }
            println!("Addresses:  {}", info.size);
        }
        Commands::Resolve { address, json } => {
            let resolver = build_resolver()?;
            let record = resolver.resolve(&address).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                println!(
                    "{} -> {} ({}) {} {} [{}]",
                    record.address,
                    record.country_code,
                    record.country_name,
                    record.region,
                    record.city,
                    if record.source.is_empty() { "-" } else { record.source.as_str() }
                );
            }
        }
        Commands::Check {
            address,
            rules,
            exempt,
            admin,
            logged_in,
            roles,
            path,
            budget_ms,
            json,
        } => {
            let loaded = RulesFile::load_validated(&rules)?;

            let requester = RequesterContext {
                is_administrator: admin,
                is_logged_in: logged_in,
                roles,
                request_path: path,
            };
            let exemption = if exempt {
                geogate::rules::Exemption::Caller
            } else {
                loaded.exemptions.evaluate(&requester)
            };

            let mut gate = AccessGate::new(build_resolver()?);
            if let Some(ms) = budget_ms {
                gate = gate.with_resolve_budget(Duration::from_millis(ms));
            }

            let decision = gate.check_str(&address, &exemption, &loaded.snapshot).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                let country = decision
                    .location
                    .as_ref()
                    .map(|l| l.country_code.as_str())
                    .unwrap_or("-");
                println!("{} [{}] {}", decision.address, country, decision.verdict);
            }
        }
        Commands::Regions => {
            for key in regions::keys() {
                let name = regions::display_name(key).unwrap_or(key);
                let members = regions::members(key).unwrap_or(&[]);
                println!("{key:<16} {name} ({})", members.join(", "));
            }
        }
    }

    Ok(())
}

fn build_resolver() -> Result<GeoResolver> {
    let config = Config::from_env()?;
    let resolver = GeoResolver::from_config(&config.geo)?;
    info!(providers = ?resolver.provider_names(), "Resolver ready");
    Ok(resolver)
}

//! ldapmap command-line management tool.
//!
//! Provides subcommands for generating and validating configuration files,
//! listing the available mappers, and running mappers offline over a JSON
//! directory snapshot.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use ldapmap_core::config::{AppConfig, MappingConfig};
use ldapmap_core::{DirectorySnapshot, MapperRegistry};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// ldapmap command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "ldapmap",
    version,
    about = "Inspect and test ldapmap configuration"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "/etc/ldapmap/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./ldapmap.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// List the available mappers.
    Mappers,

    /// Run mappers over a JSON directory snapshot and print the results.
    Resolve {
        /// Snapshot file with `users` and `groups` entry arrays.
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Run only this mapper (default: the mappers in the config file).
        #[arg(short, long)]
        mapper: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Mappers => cmd_mappers(),
        Commands::Resolve { snapshot, mapper } => {
            cmd_resolve(&cli.config, &snapshot, mapper.as_deref())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# ldapmap configuration

[daemon]
interval_secs = 300
log_level = "info"

[ldap]
url = "ldap://ldap.example.com"
# bind_dn = "cn=reader,dc=example,dc=com"
# bind_password_env = "LDAP_BIND_PASSWORD"
starttls = false
timeout_secs = 10
user_base_dn = "ou=People,dc=example,dc=com"
user_filter = "(objectClass=posixAccount)"
group_base_dn = "ou=Groups,dc=example,dc=com"
group_filter = "(objectClass=posixGroup)"

[mapping]
# Available: user-groups, user-gid, group-gid
mappers = ["user-groups"]
# member    : groups list member DNs
# memberuid : groups list member usernames
# memberof  : users list group DNs
member_scheme = "memberuid"
user_prefix = ""
user_attr_map = { name = "uid", gid = "gidNumber" }
group_attr_map = { name = "cn", gid = "gidNumber" }

[output]
dir = "/var/lib/ldapmap"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your directory details");
    println!(
        "  2. Validate with: ldapmap validate --config {}",
        output.display()
    );
    println!(
        "  3. Start the daemon: ldapmap-daemon --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields and mappers are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  LDAP URL      : {}", config.ldap.url);
    println!(
        "  Bind          : {}",
        if config.ldap.bind_dn.is_empty() {
            "anonymous"
        } else {
            config.ldap.bind_dn.as_str()
        }
    );
    if config.ldap.bind_password_env.is_some() {
        println!(
            "  Bind password : {}",
            if config.ldap.bind_password.is_some() {
                "set"
            } else {
                "NOT SET"
            }
        );
    }
    println!("  Users         : {}", config.ldap.user_base_dn);
    println!("  Groups        : {}", config.ldap.group_base_dn);
    println!("  Scheme        : {}", config.mapping.member_scheme);
    println!("  Mappers       : {}", config.mapping.mappers.join(", "));
    println!("  Output dir    : {}", config.output.dir.display());

    Ok(())
}

fn cmd_mappers() -> Result<()> {
    let registry = MapperRegistry::builtin();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Mapper", "Config map", "User roles", "Group roles"]);

    for reg in registry.iter() {
        table.add_row(vec![
            reg.name.to_string(),
            reg.config_map_name.to_string(),
            roles(reg.user_attrs),
            roles(reg.group_attrs),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn roles(roles: &[&str]) -> String {
    if roles.is_empty() {
        "-".to_string()
    } else {
        roles.join(", ")
    }
}

fn cmd_resolve(config_path: &Path, snapshot_path: &Path, only: Option<&str>) -> Result<()> {
    // The config file is optional here; defaults are enough for a snapshot.
    let mapping = if config_path.exists() {
        AppConfig::load_from_file(config_path)
            .context("failed to parse configuration")?
            .mapping
    } else {
        MappingConfig::default()
    };

    let snapshot =
        DirectorySnapshot::load_json(snapshot_path).context("failed to load snapshot")?;

    let names: Vec<String> = match only {
        Some(name) => vec![name.to_string()],
        None => mapping.mappers.clone(),
    };

    let registry = MapperRegistry::builtin();
    for name in &names {
        let mapper = registry
            .build(name, &mapping)
            .with_context(|| format!("cannot build mapper '{}'", name))?;
        let data = mapper
            .get_data(&snapshot.users, &snapshot.groups)
            .with_context(|| format!("mapper '{}' failed", name))?;

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Key", "Value"]);
        for (key, value) in &data {
            table.add_row(vec![key.as_str(), value.as_str()]);
        }

        println!(
            "{} ({} keys, scheme {})",
            mapper.config_map_name(),
            data.len(),
            mapping.member_scheme
        );
        println!("{table}");
        println!();
    }

    Ok(())
}

//! CLI for administering the ticket tracker database.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use ticket_db::default_schema;
use ticket_db::drivers::mysql::max_bytes_for_charset;
use ticket_db::upgrades;
use ticket_db::{
    Config, ConnectorRegistry, DatabaseConnector, DbConnection, DbError, MysqlConnector,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "ticket-db")]
#[command(about = "Create, inspect and back up the ticket tracker's MySQL database")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "ticket-db.yaml")]
    config: PathBuf,

    /// Output results as JSON
    #[arg(long)]
    output_json: bool,

    /// Log format (text or json)
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity (debug, info, warn, error)
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database tables from the default schema
    Init,

    /// Drop every table of the configured database
    Destroy,

    /// Report whether the configured database holds any tables
    Exists,

    /// Verify engine and collation settings and print system information
    Check,

    /// List the tables of the configured database
    Tables,

    /// Empty every table of the configured database
    Reset,

    /// Dump the database with mysqldump
    Backup {
        /// Destination file (defaults to <backup.directory>/<database>.sql)
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Print the DDL of the default schema (no configuration needed)
    Ddl {
        /// Connection charset the key lengths are sized for
        #[arg(long, default_value = "utf8")]
        charset: String,

        /// Only print this table
        #[arg(long)]
        table: Option<String>,
    },

    /// Print the SQL of a schema upgrade (no configuration needed)
    UpgradeSql {
        /// Target schema version
        #[arg(long)]
        version: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), DbError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(DbError::Config)?;

    // Offline commands never touch the configuration file
    match &cli.command {
        Commands::Ddl { charset, table } => return print_ddl(charset, table.as_deref()),
        Commands::UpgradeSql { version } => return print_upgrade(*version),
        _ => {}
    }

    let config = Config::load(&cli.config)?;
    let connector = Arc::new(
        MysqlConnector::new().with_mysqldump_path(config.database.mysqldump_path.clone()),
    );
    let mut registry = ConnectorRegistry::new();
    registry.register_arc(connector);
    let (connector, params) = registry.resolve(&config.database.url)?;

    match cli.command {
        Commands::Init => {
            connector.init_db(&params, None).await?;
            info!(
                "Database {} initialized at version {}",
                params.database(),
                ticket_db::DB_VERSION
            );
            if cli.output_json {
                println!(
                    "{}",
                    serde_json::json!({
                        "database": params.database(),
                        "version": ticket_db::DB_VERSION,
                    })
                );
            } else {
                println!("Database {} initialized", params.database());
            }
        }

        Commands::Destroy => {
            connector.destroy_db(&params).await?;
            println!("{}", destroyed_message(params.database(), cli.output_json));
        }

        Commands::Exists => {
            let exists = connector.db_exists(&params).await?;
            if cli.output_json {
                println!("{}", serde_json::json!({ "exists": exists }));
            } else {
                println!("{}", exists);
            }
        }

        Commands::Check => {
            let mut conn = connector.get_connection(&params).await?;
            let needs_upgrade = connector.environment_needs_upgrade(&mut *conn).await?;
            let system_info = connector.system_info(Some(&*conn));
            conn.close().await?;

            if cli.output_json {
                let info: serde_json::Map<String, serde_json::Value> = system_info
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "needs_upgrade": needs_upgrade,
                        "system_info": info,
                    }))?
                );
            } else {
                println!("Environment check passed");
                for (name, value) in system_info {
                    println!("  {}: {}", name, value);
                }
            }
        }

        Commands::Tables => {
            let mut conn = connector.get_connection(&params).await?;
            let tables = conn.get_table_names().await?;
            conn.close().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&tables)?);
            } else {
                for table in tables {
                    println!("{}", table);
                }
            }
        }

        Commands::Reset => {
            let mut conn = connector.get_connection(&params).await?;
            let emptied = conn.reset_tables().await?;
            conn.commit().await?;
            conn.close().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&emptied)?);
            } else {
                println!("Reset {} table(s)", emptied.len());
                for table in emptied {
                    println!("  {}", table);
                }
            }
        }

        Commands::Backup { dest } => {
            let dest = match dest {
                Some(path) => path,
                None => {
                    std::fs::create_dir_all(&config.backup.directory)?;
                    config
                        .backup
                        .directory
                        .join(format!("{}.sql", params.database()))
                }
            };
            let written = connector.backup(&params, &dest).await?;

            if cli.output_json {
                println!("{}", serde_json::json!({ "backup": written }));
            } else {
                println!("Backup written to {}", written.display());
            }
        }

        Commands::Ddl { .. } | Commands::UpgradeSql { .. } => {}
    }

    Ok(())
}

fn destroyed_message(database: &str, json: bool) -> String {
    if json {
        serde_json::json!({ "destroyed": database }).to_string()
    } else {
        format!("Database {} destroyed", database)
    }
}

fn print_ddl(charset: &str, only: Option<&str>) -> Result<(), DbError> {
    let connector = MysqlConnector::new();
    let max_bytes = max_bytes_for_charset(charset);
    let tables = default_schema::schema();

    let selected: Vec<_> = match only {
        Some(name) => {
            let table = tables
                .into_iter()
                .find(|t| t.name == name)
                .ok_or_else(|| DbError::Config(format!("Unknown table: {}", name)))?;
            vec![table]
        }
        None => tables,
    };

    for table in &selected {
        for stmt in connector.to_sql(table, max_bytes) {
            println!("{};", stmt);
        }
    }
    Ok(())
}

fn print_upgrade(version: u32) -> Result<(), DbError> {
    let statements = upgrades::statements(version)
        .ok_or_else(|| DbError::Config(format!("No upgrade script for version {}", version)))?;
    for stmt in statements {
        println!("{};", stmt.trim_end_matches(';'));
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Unknown log format: {}", other)),
    }

    Ok(())
}

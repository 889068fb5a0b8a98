use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an attendance session
    Start,
    /// Stop the running session
    Stop,
    /// Show daemon and session status
    Status,
    /// List attendance records
    Records,
    /// Export attendance records to a CSV file
    Export {
        /// Output file path
        path: String,
    },
    /// Capture a registration image for a new identity
    Enroll {
        /// Identity name (becomes the registration image filename)
        #[arg(short, long)]
        name: String,
    },
    /// Remove a registered identity
    Remove {
        /// Identity name
        name: String,
    },
    /// List registered identities
    Roster,
}

#[zbus::proxy(
    interface = "org.rollcall.Attendance1",
    default_service = "org.rollcall.Attendance1",
    default_path = "/org/rollcall/Attendance1"
)]
trait Attendance {
    async fn start_session(&self) -> zbus::Result<String>;
    async fn stop_session(&self) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
    async fn records(&self) -> zbus::Result<String>;
    async fn export_csv(&self, path: &str) -> zbus::Result<u32>;
    async fn enroll(&self, name: &str) -> zbus::Result<String>;
    async fn remove_face(&self, name: &str) -> zbus::Result<bool>;
    async fn roster(&self) -> zbus::Result<Vec<String>>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = zbus::Connection::session().await?;
    let proxy = AttendanceProxy::new(&conn).await?;

    match cli.command {
        Commands::Start => {
            let id = proxy.start_session().await?;
            println!("Session started: {id}");
        }
        Commands::Stop => {
            if proxy.stop_session().await? {
                println!("Session stopped");
            } else {
                println!("No session running");
            }
        }
        Commands::Status => {
            let raw = proxy.status().await?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Commands::Records => {
            let raw = proxy.records().await?;
            let records: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
            if records.is_empty() {
                println!("No attendance records");
            }
            for record in records {
                println!(
                    "{}  {}  {}",
                    record["date"].as_str().unwrap_or("-"),
                    record["time"].as_str().unwrap_or("-"),
                    record["name"].as_str().unwrap_or("-"),
                );
            }
        }
        Commands::Export { path } => {
            let rows = proxy.export_csv(&path).await?;
            println!("Exported {rows} records to {path}");
        }
        Commands::Enroll { name } => {
            let path = proxy.enroll(&name).await?;
            println!("Registered {name} ({path})");
        }
        Commands::Remove { name } => {
            if proxy.remove_face(&name).await? {
                println!("Removed {name}");
            } else {
                println!("No registration image for {name}");
            }
        }
        Commands::Roster => {
            let names = proxy.roster().await?;
            if names.is_empty() {
                println!("No registered identities");
            }
            for name in names {
                println!("{name}");
            }
        }
    }

    Ok(())
}

use applist_core::{Config, DpkgCatalog, ExportFormat, Exporter, Session};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "applist")]
#[command(version, about = "List installed applications and export them", long_about = None)]
struct Cli {
    /// Override the registry status file
    #[arg(long, global = true, value_name = "PATH")]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List installed applications
    List {
        /// Filter by name or identifier (case-insensitive substring)
        query: Option<String>,

        /// Include system-owned applications
        #[arg(long)]
        system: bool,
    },
    /// Export the filtered application list to a file
    Export {
        /// Output format
        #[arg(value_enum)]
        format: Format,

        /// Filter by name or identifier (case-insensitive substring)
        query: Option<String>,

        /// Include system-owned applications
        #[arg(long)]
        system: bool,

        /// File name for the artifact (format extension appended if missing)
        #[arg(long, value_name = "NAME")]
        output: Option<String>,

        /// Hand the artifact to the system handler after writing
        #[arg(long)]
        share: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
    Txt,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ExportFormat::Json,
            Format::Csv => ExportFormat::Csv,
            Format::Txt => ExportFormat::Txt,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let catalog = build_catalog(&cli, &config);
    let exporter = match &config.export.directory {
        Some(dir) => Exporter::with_dir(dir),
        None => Exporter::new(),
    };

    match cli.command {
        Commands::List { query, system } => {
            let session = Session::new(catalog, exporter);
            load(&session, system || config.catalog.include_system_apps).await?;
            if let Some(query) = query {
                session.search(query);
            }

            let state = session.state();
            for app in &state.filtered_apps {
                println!(
                    "{:<32} {:<40} {}",
                    app.name, app.identifier, app.version_label
                );
            }
            println!(
                "\n{} applications ({} loaded)",
                state.filtered_apps.len(),
                state.apps.len()
            );
        }
        Commands::Export {
            format,
            query,
            system,
            output,
            share,
        } => {
            let format = ExportFormat::from(format);
            tracing::info!("exporting as {}", format);
            let session = Session::new(catalog, exporter);
            load(&session, system || config.catalog.include_system_apps).await?;
            if let Some(query) = query {
                session.search(query);
            }

            // An explicit output name replaces the session's generated one;
            // the session guards apply either way.
            match (output.as_deref(), share) {
                (Some(name), true) => session.export_named_and_share(format, name).await,
                (Some(name), false) => session.export_named(format, name).await,
                (None, true) => session.export_and_share(format).await,
                (None, false) => session.export(format).await,
            }

            let state = session.state();
            match state.last_export_message {
                Some(message) if message.starts_with("导出失败") => {
                    anyhow::bail!("{}", message)
                }
                Some(message) => println!("{}", message),
                None => {}
            }
        }
    }

    Ok(())
}

async fn load(session: &Session<DpkgCatalog>, include_system: bool) -> anyhow::Result<()> {
    if include_system {
        // Session state starts with system apps excluded; the toggle both
        // flips the flag and performs the load.
        session.toggle_system().await;
    } else {
        session.load().await;
    }

    if let Some(error) = session.state().last_error {
        anyhow::bail!("{}", error);
    }
    Ok(())
}

fn build_catalog(cli: &Cli, config: &Config) -> DpkgCatalog {
    let status = cli
        .registry
        .clone()
        .or_else(|| config.catalog.status_path.clone());

    match status {
        Some(status) => {
            let info_dir = config
                .catalog
                .info_dir
                .clone()
                .or_else(|| status.parent().map(|p| p.join("info")))
                .unwrap_or_else(|| PathBuf::from("info"));
            DpkgCatalog::with_paths(status, info_dir)
        }
        None => DpkgCatalog::new(),
    }
}

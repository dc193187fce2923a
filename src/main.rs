use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use bonsai_care::api::{
    find_bonsai, CareApi, HttpCareApi, MasterSummary, MasterTable, MemoryCareApi, ServerOutlook,
};
use bonsai_care::config::{Aggregation, Config, ConfigOverrides};
use bonsai_care::dosage::{
    compute_dosage, compute_dosage_from_fields, dosage_chart, DosageChartRow, DosageResult,
    FieldSelection,
};
use bonsai_care::output::csv::{
    chart_to_csv, logs_to_csv, master_to_csv, recommendations_to_csv, treatments_to_csv,
    work_logs_to_csv,
};
use bonsai_care::output::json::{render_json, render_json_lines};
use bonsai_care::output::table::{
    render_bonsai_table, render_calendar_table, render_chart_table, render_dosage_table,
    render_logs_table, render_master_table, render_outlook, render_recommendation_table,
    render_risk_view, render_server_outlook, render_summary_table, render_work_logs_table,
};
use bonsai_care::records::{
    BonsaiRecord, NewBonsai, NewPesticideLog, NewWorkLog, PestDiseaseRecord, PesticideLogRecord,
    WorkLogRecord,
};
use bonsai_care::season::Month;
use bonsai_care::server::run_server;
use bonsai_care::session::Session;
use bonsai_care::treatment::{
    build_monthly_view, build_outlook, summarize_recommendations, RecommendationSummary,
    SeasonalOutlook,
};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "bonsai-care",
    about = "Pesticide dosage and seasonal pest/disease planning for bonsai"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long = "api-url")]
    api_url: Option<String>,
    #[arg(short, long)]
    user: Option<u64>,
    /// Serve data from a JSON fixture instead of the remote API.
    #[arg(long)]
    offline: Option<String>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Concentrate needed for a water volume at a dilution ratio.
    ///
    /// Pass `custom` as a value to read it from the matching `--*-custom`
    /// field instead.
    Dosage {
        #[arg(long)]
        water: String,
        #[arg(long = "water-custom", default_value = "")]
        water_custom: String,
        #[arg(long)]
        ratio: String,
        #[arg(long = "ratio-custom", default_value = "")]
        ratio_custom: String,
    },
    DosageChart,
    /// Active pests/diseases and ranked treatments for this month and next.
    Risks {
        #[arg(long)]
        month: Option<Month>,
        #[arg(long, conflicts_with = "bonsai")]
        species: Option<u64>,
        #[arg(long)]
        bonsai: Option<u64>,
        #[arg(long = "server-side")]
        server_side: bool,
    },
    Recommend {
        #[arg(long)]
        month: Option<Month>,
        #[arg(long)]
        bonsai: Option<u64>,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Calendar of when each pest/disease is active.
    Months,
    /// List, register or remove trees; lists when no action is given.
    Bonsai {
        #[command(subcommand)]
        action: Option<BonsaiCommand>,
    },
    Logs {
        #[command(subcommand)]
        action: LogsCommand,
    },
    /// Care work records: pruning, repotting, wiring.
    Work {
        #[command(subcommand)]
        action: WorkCommand,
    },
    Master {
        #[command(subcommand)]
        action: MasterCommand,
    },
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

#[derive(Debug, Subcommand)]
enum LogsCommand {
    List {
        #[arg(long)]
        bonsai: Option<u64>,
    },
    Add {
        #[arg(long)]
        bonsai: u64,
        #[arg(long)]
        pesticide: String,
        #[arg(long)]
        water: String,
        #[arg(long)]
        ratio: String,
        /// Defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Subcommand)]
enum BonsaiCommand {
    List,
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: Option<u64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Also removes the tree's pesticide and work logs.
    Delete { id: u64 },
}

#[derive(Debug, Subcommand)]
enum WorkCommand {
    Types,
    List {
        #[arg(long)]
        bonsai: u64,
    },
    Add {
        #[arg(long)]
        bonsai: u64,
        #[arg(long = "type")]
        work_type: String,
        /// Defaults to today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        notes: String,
        /// Minutes spent.
        #[arg(long)]
        duration: Option<u32>,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Subcommand)]
enum MasterCommand {
    List {
        table: MasterTable,
    },
    /// Adds a row given as a JSON object, e.g. '{"name":"Juniper"}'.
    Add {
        table: MasterTable,
        row: String,
    },
    Delete {
        table: MasterTable,
        id: u64,
    },
    Summary,
}

#[derive(Debug, Serialize)]
struct DosageReport {
    water_volume_ml: Option<f64>,
    dilution_ratio: Option<f64>,
    result: Option<DosageResult>,
    dosage: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        api_url: cli.api_url.clone(),
        user_id: cli.user,
        offline_fixture: cli.offline.clone(),
    });

    match &cli.command {
        Commands::Config { .. } => {
            return handle_config_command(&cli.command, &config, &config_path);
        }
        Commands::Dosage {
            water,
            water_custom,
            ratio,
            ratio_custom,
        } => {
            let water_ml = FieldSelection {
                selected: water.clone(),
                custom: water_custom.clone(),
            }
            .resolve();
            let ratio = FieldSelection {
                selected: ratio.clone(),
                custom: ratio_custom.clone(),
            }
            .resolve();
            let result = water_ml.zip(ratio).and_then(|(w, r)| compute_dosage(w, r));
            let report = DosageReport {
                water_volume_ml: water_ml,
                dilution_ratio: ratio,
                dosage: result.map(|d| d.to_string()),
                result,
            };
            return print_dosage(&report, cli.output);
        }
        Commands::DosageChart => {
            let rows = dosage_chart(
                &config.dosage.water_presets_ml,
                &config.dosage.dilution_presets,
            );
            return print_chart(&rows, cli.output);
        }
        _ => {}
    }

    let api = build_api(&config)?;

    if let Commands::Serve { host, port } = &cli.command {
        let host = host.clone().unwrap_or_else(|| config.server.host.clone());
        let port = port.unwrap_or(config.server.port);
        let bind = format!("{host}:{port}");
        let addr: SocketAddr = bind
            .parse()
            .map_err(|e| anyhow!("invalid bind address {bind}: {e}"))?;
        let session = match Session::from_config(&config.session) {
            Ok(session) => Some(session.resolve_access(api.as_ref()).await?),
            Err(_) => None,
        };
        return run_server(config, api, session, addr).await;
    }

    let session = Session::from_config(&config.session)?;
    let today = Local::now().date_naive();

    match &cli.command {
        Commands::Risks {
            month,
            species,
            bonsai,
            server_side,
        } => {
            let server_side = *server_side || config.recommend.aggregation == Aggregation::Server;
            if server_side {
                let Some(bonsai_id) = bonsai else {
                    bail!("server-side aggregation needs --bonsai");
                };
                if month.is_some() {
                    warn!("--month is ignored with server-side aggregation");
                }
                let outlook = api.fetch_server_outlook(&session, *bonsai_id).await?;
                print_server_outlook(&outlook, cli.output)?;
            } else {
                let month = month.unwrap_or_else(Month::current);
                let species_id = resolve_species(api.as_ref(), &session, *species, *bonsai).await?;
                let data = api
                    .fetch_reference_data(&session)
                    .await
                    .context("failed loading reference data (try --server-side)")?;
                let outlook = build_outlook(&data, species_id, month);
                print_outlook(&outlook, config.recommend.top, cli.output)?;
            }
        }
        Commands::Recommend { month, bonsai, top } => {
            let month = month.unwrap_or_else(Month::current);
            let top = top.unwrap_or(config.recommend.top);
            let species_id = resolve_species(api.as_ref(), &session, None, *bonsai).await?;
            let data = api.fetch_reference_data(&session).await?;
            let logs = match bonsai {
                Some(id) => api.fetch_pesticide_logs(&session, Some(*id)).await?,
                None => Vec::new(),
            };
            let view = build_monthly_view(&data, species_id, month);
            let summary = summarize_recommendations(&view, &logs, today);
            match cli.output {
                OutputFormat::Table => {
                    println!("{}", render_recommendation_table(&summary));
                    println!("{}", render_risk_view(&view, top));
                }
                format => print_recommendations(&summary, format)?,
            }
        }
        Commands::Months => {
            let data = api.fetch_reference_data(&session).await?;
            print_calendar(&data.pest_diseases, cli.output)?;
        }
        Commands::Bonsai { action } => match action {
            None | Some(BonsaiCommand::List) => {
                let bonsai = api.fetch_bonsai(&session).await?;
                print_bonsai(&bonsai, cli.output)?;
            }
            Some(BonsaiCommand::Add {
                name,
                species,
                notes,
            }) => {
                if name.trim().is_empty() {
                    bail!("--name must not be empty");
                }
                let bonsai = NewBonsai {
                    name: name.trim().to_string(),
                    species_id: *species,
                    notes: notes.clone(),
                };
                match api.create_bonsai(&session, &bonsai).await? {
                    Some(id) => println!("Registered bonsai {id} ({})", bonsai.name),
                    None => println!("Registered bonsai {}", bonsai.name),
                }
            }
            Some(BonsaiCommand::Delete { id }) => {
                let tree = find_bonsai(api.as_ref(), &session, *id).await?;
                api.delete_bonsai(&session, tree.id).await?;
                info!("deleted bonsai {} and its logs", tree.name);
                println!("Deleted bonsai {id}");
            }
        },
        Commands::Logs { action } => match action {
            LogsCommand::List { bonsai } => {
                let logs = api.fetch_pesticide_logs(&session, *bonsai).await?;
                print_logs(&logs, cli.output)?;
            }
            LogsCommand::Add {
                bonsai,
                pesticide,
                water,
                ratio,
                date,
                notes,
            } => {
                let tree = find_bonsai(api.as_ref(), &session, *bonsai).await?;
                let dosage = match compute_dosage_from_fields(water, ratio) {
                    Some(dosage) => dosage.to_string(),
                    None => {
                        warn!("dosage not computable from water={water} ratio={ratio}");
                        String::new()
                    }
                };
                let log = NewPesticideLog {
                    bonsai_id: tree.id,
                    pesticide_name: pesticide.trim().to_string(),
                    usage_date: date
                        .clone()
                        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
                    dosage,
                    water_amount: water.trim().to_string(),
                    dilution_ratio: ratio.trim().to_string(),
                    notes: notes.clone(),
                };
                if log.pesticide_name.is_empty() {
                    bail!("--pesticide must not be empty");
                }
                api.create_pesticide_log(&session, &log).await?;
                info!(
                    "logged {} on {} ({})",
                    log.pesticide_name, tree.name, log.usage_date
                );
                println!("{}", render_json(&log)?);
            }
            LogsCommand::Delete { id } => {
                api.delete_pesticide_log(&session, *id).await?;
                println!("Deleted pesticide log {id}");
            }
        },
        Commands::Work { action } => match action {
            WorkCommand::Types => {
                let types = api.fetch_work_types().await?;
                match cli.output {
                    OutputFormat::Json => println!("{}", render_json(&types)?),
                    _ => types.iter().for_each(|t| println!("{t}")),
                }
            }
            WorkCommand::List { bonsai } => {
                let logs = api.fetch_work_logs(&session, *bonsai).await?;
                print_work_logs(&logs, cli.output)?;
            }
            WorkCommand::Add {
                bonsai,
                work_type,
                date,
                description,
                notes,
                duration,
            } => {
                if work_type.trim().is_empty() {
                    bail!("--type must not be empty");
                }
                let tree = find_bonsai(api.as_ref(), &session, *bonsai).await?;
                let log = NewWorkLog {
                    date: date
                        .clone()
                        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
                    work_type: work_type.trim().to_string(),
                    description: description.clone(),
                    notes: notes.clone(),
                    duration: *duration,
                };
                let created = api.create_work_log(&session, tree.id, &log).await?;
                info!("logged {} on {} ({})", log.work_type, tree.name, log.date);
                match created {
                    Some(row) => println!("{}", render_json(&row)?),
                    None => println!("{}", render_json(&log)?),
                }
            }
            WorkCommand::Delete { id } => {
                api.delete_work_log(&session, *id).await?;
                println!("Deleted work log {id}");
            }
        },
        Commands::Master { action } => {
            let session = session.resolve_access(api.as_ref()).await?;
            session.require_admin()?;
            match action {
                MasterCommand::List { table } => {
                    let rows = api.fetch_master(&session, *table).await?;
                    print_master(&rows, cli.output)?;
                }
                MasterCommand::Add { table, row } => {
                    let row: serde_json::Value = serde_json::from_str(row)
                        .with_context(|| format!("row for {table} is not valid JSON"))?;
                    if !row.is_object() {
                        bail!("row for {table} must be a JSON object");
                    }
                    api.create_master(&session, *table, &row).await?;
                    println!("Added {table} row");
                }
                MasterCommand::Delete { table, id } => {
                    api.delete_master(&session, *table, *id).await?;
                    println!("Deleted {table} row {id}");
                }
                MasterCommand::Summary => {
                    let summary = api.fetch_master_summary(&session).await?;
                    print_summary(&summary, cli.output)?;
                }
            }
        }
        Commands::Dosage { .. }
        | Commands::DosageChart
        | Commands::Serve { .. }
        | Commands::Config { .. } => {}
    }

    Ok(())
}

fn build_api(config: &Config) -> Result<Arc<dyn CareApi>> {
    if let Some(path) = config.resolved_fixture_path() {
        let api = MemoryCareApi::load(&path)?;
        return Ok(Arc::new(api));
    }
    info!("using API at {}", config.api.base_url);
    let api = HttpCareApi::new(&config.api.base_url, config.api.timeout_secs)?;
    Ok(Arc::new(api))
}

async fn resolve_species(
    api: &dyn CareApi,
    session: &Session,
    species: Option<u64>,
    bonsai: Option<u64>,
) -> Result<Option<u64>> {
    if species.is_some() {
        return Ok(species);
    }
    let Some(bonsai_id) = bonsai else {
        return Ok(None);
    };
    let tree = find_bonsai(api, session, bonsai_id).await?;
    if tree.species_id.is_none() {
        warn!(
            "bonsai {} has no species; showing risks for all species",
            tree.name
        );
    }
    Ok(tree.species_id)
}

fn handle_config_command(command: &Commands, config: &Config, config_path: &PathBuf) -> Result<()> {
    let Commands::Config { init, show } = command else {
        return Ok(());
    };
    if *init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if *show || !*init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_dosage(report: &DosageReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!(
            "{}",
            render_dosage_table(
                report.water_volume_ml,
                report.dilution_ratio,
                report.result.as_ref()
            )
        ),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => {
            warn!("CSV output for dosage not implemented, using JSON");
            println!("{}", render_json(report)?);
        }
    }
    Ok(())
}

fn print_chart(rows: &[DosageChartRow], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_chart_table(rows)),
        OutputFormat::Json => println!("{}", render_json(rows)?),
        OutputFormat::Csv => println!("{}", chart_to_csv(rows)?),
    }
    Ok(())
}

fn print_outlook(outlook: &SeasonalOutlook, top: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_outlook(outlook, top)),
        OutputFormat::Json => println!("{}", render_json(outlook)?),
        OutputFormat::Csv => {
            print!("{}", treatments_to_csv(&outlook.current, top)?);
            print!("{}", treatments_to_csv(&outlook.next, top)?);
        }
    }
    Ok(())
}

fn print_server_outlook(outlook: &ServerOutlook, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_server_outlook(outlook)),
        OutputFormat::Json => println!("{}", render_json(outlook)?),
        OutputFormat::Csv => {
            warn!("CSV output for server-side risks not implemented, using JSON");
            println!("{}", render_json(outlook)?);
        }
    }
    Ok(())
}

fn print_recommendations(summary: &RecommendationSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_recommendation_table(summary)),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => println!("{}", recommendations_to_csv(summary)?),
    }
    Ok(())
}

fn print_calendar(records: &[PestDiseaseRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_calendar_table(records)),
        OutputFormat::Json => println!("{}", render_json(records)?),
        OutputFormat::Csv => {
            warn!("CSV output for months not implemented, using JSON");
            println!("{}", render_json(records)?);
        }
    }
    Ok(())
}

fn print_bonsai(bonsai: &[BonsaiRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_bonsai_table(bonsai)),
        OutputFormat::Json => println!("{}", render_json(bonsai)?),
        OutputFormat::Csv => {
            warn!("CSV output for bonsai not implemented, using JSON");
            println!("{}", render_json(bonsai)?);
        }
    }
    Ok(())
}

fn print_logs(logs: &[PesticideLogRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_logs_table(logs)),
        OutputFormat::Json => println!("{}", render_json(logs)?),
        OutputFormat::Csv => println!("{}", logs_to_csv(logs)?),
    }
    Ok(())
}

fn print_work_logs(logs: &[WorkLogRecord], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_work_logs_table(logs)),
        OutputFormat::Json => println!("{}", render_json(logs)?),
        OutputFormat::Csv => println!("{}", work_logs_to_csv(logs)?),
    }
    Ok(())
}

fn print_summary(summary: &MasterSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_summary_table(summary)),
        OutputFormat::Json => println!("{}", render_json(summary)?),
        OutputFormat::Csv => {
            warn!("CSV output for master summary not implemented, using JSON");
            println!("{}", render_json(summary)?);
        }
    }
    Ok(())
}

fn print_master(rows: &[serde_json::Value], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_master_table(rows)),
        OutputFormat::Json => print!("{}", render_json_lines(rows)?),
        OutputFormat::Csv => println!("{}", master_to_csv(rows)?),
    }
    Ok(())
}

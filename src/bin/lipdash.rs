use clap::{Parser, Subcommand};

use lipdash::report::{Dashboard, RemediationReport};
use lipdash::{AdviserDashboard, Enrichment, FailureOutcome, Preset, WindowParams};

#[derive(Parser)]
#[command(name = "lipdash", about = "Adviser sales and lead-pipeline dashboard")]
struct Cli {
    /// Database path (default: ~/.lipdash/lipdash.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dashboard for a window
    Dashboard {
        /// Window start (YYYY-MM-DD)
        #[arg(long, conflicts_with = "preset")]
        start: Option<String>,
        /// Window end (YYYY-MM-DD)
        #[arg(long, conflicts_with = "preset")]
        end: Option<String>,
        /// Quick filter: D0, D1, W0, W1, M0, M1
        #[arg(long)]
        preset: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the advisers reported on
    Advisers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one adviser's remediation tasks
    Remediation {
        adviser_id: i64,
        /// Window start (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Window end (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show store status
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// Remove a config value
    Unset { key: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => lipdash::Database::open_at(path).await?,
        None => lipdash::Database::open().await?,
    };
    let mut dash = AdviserDashboard::open(db).await?;

    let result = match cli.command {
        Commands::Dashboard {
            start,
            end,
            preset,
            json,
        } => handle_dashboard(&dash, start, end, preset, json).await,
        Commands::Advisers { json } => handle_advisers(&dash, json).await,
        Commands::Remediation {
            adviser_id,
            start,
            end,
            json,
        } => handle_remediation(&dash, adviser_id, start, end, json).await,
        Commands::Config { action } => handle_config(&mut dash, action).await,
        Commands::Status => print_status(&dash).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<lipdash::Error>() {
            Some(err) => {
                report_failure(err);
                std::process::exit(1);
            }
            None => return Err(e),
        }
    }
    Ok(())
}

fn report_failure(err: &lipdash::Error) {
    log::error!("{err}");
    let outcome = err.outcome();
    match outcome {
        FailureOutcome::InvalidInput | FailureOutcome::NotFound => eprintln!("Error: {err}"),
        _ if matches!(err, lipdash::Error::Config(_)) => eprintln!("Error: {err}"),
        _ => eprintln!("{} ({})", outcome.message(), outcome.status_code()),
    }
    if matches!(err, lipdash::Error::PresetParse(_)) {
        let keys: Vec<&str> = Preset::ALL.iter().map(Preset::to_key).collect();
        eprintln!("Valid presets: {}", keys.join(", "));
    }
}

async fn handle_dashboard(
    dash: &AdviserDashboard,
    start: Option<String>,
    end: Option<String>,
    preset: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let today = dash.today();
    let out = match preset {
        Some(token) => dash.build_preset(Preset::parse(&token)?, today).await?,
        None => {
            let params = WindowParams::new(start.as_deref(), end.as_deref());
            dash.build(&params, today).await?
        }
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_dashboard(&out);
    }
    Ok(())
}

fn print_dashboard(out: &Dashboard) {
    println!(
        "Window: {} ({} business days, {:?} view)",
        out.window, out.biz_days, out.chart_mode
    );
    match &out.freshness {
        Enrichment::Available(f) => println!(
            "Data as of: {}",
            f.last_refresh
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string())
        ),
        Enrichment::Unavailable => println!("Data as of: unavailable"),
    }
    println!("Last business day: {}", out.last_business_day);
    println!();

    println!(
        "{:<24} {:>4} {:>9} {:>9} {:>6} {:>6} {:>6} {:>6} {:>10} {:>6}",
        "Adviser",
        "Days",
        "Talk",
        "Talk/day",
        "Quotes",
        "Q/day",
        "Apps",
        "A/day",
        "Inforce",
        "Remed"
    );
    for r in &out.performance {
        println!(
            "{:<24} {:>4} {:>9} {:>9} {:>6} {:>6.1} {:>6} {:>6.1} {:>10.0} {:>3}/{:<2}",
            r.name,
            r.days_worked,
            r.talk_time,
            r.talk_per_day,
            r.quotes_count,
            r.quotes_per_day,
            r.apps_count,
            r.apps_per_day,
            r.inforce_value,
            r.remed_pending,
            r.remed_total
        );
    }
    let avg = &out.team_averages;
    println!(
        "Team average: talk {}/day, {:.2} quotes/day, {:.2} apps/day",
        avg.talk_fmt, avg.qpd, avg.apd
    );
    println!();

    println!(
        "{:<24} {:>8} {:>9} {:>10} {:>6} {:>6} {:>6} {:>6}",
        "Adviser", "Assigned", "Contacted", "No contact", "Booked", "A>C%", "C>B%", "A>B%"
    );
    for f in &out.funnel {
        println!(
            "{:<24} {:>8} {:>9} {:>10} {:>6} {:>6.1} {:>6.1} {:>6.1}",
            f.name, f.assigned, f.contacted, f.no_contact, f.booked, f.conv_ac, f.conv_cb, f.conv_ab
        );
    }
}

async fn handle_advisers(dash: &AdviserDashboard, json: bool) -> anyhow::Result<()> {
    let advisers = dash.advisers().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&advisers)?);
    } else if advisers.is_empty() {
        println!("No advisers found.");
    } else {
        for a in advisers {
            println!("{:>6}  {} ({})", a.id, a.name, a.initials());
        }
    }
    Ok(())
}

async fn handle_remediation(
    dash: &AdviserDashboard,
    adviser_id: i64,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let params = WindowParams::new(start.as_deref(), end.as_deref());
    let report = dash.remediation(adviser_id, &params, dash.today()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_remediation(&report);
    }
    Ok(())
}

fn print_remediation(report: &RemediationReport) {
    println!(
        "{}: {} pending of {} ({})",
        report.adviser.name, report.counts.pending, report.counts.total, report.window
    );
    for t in &report.tasks {
        let state = if t.is_pending() { "pending" } else { "resolved" };
        let app = t.app_id.map(|id| format!(", app {id}")).unwrap_or_default();
        println!(
            "  {} [{state}] {} - {} (lead {}{app})",
            t.created_date, t.task_name, t.client_name, t.lead_id
        );
        if !t.description.is_empty() {
            println!("      {}", t.description);
        }
        if !t.last_note.is_empty() {
            println!("      note: {}", t.last_note);
        }
    }
}

async fn handle_config(dash: &mut AdviserDashboard, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match dash.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            dash.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::Unset { key } => {
            if dash.config_unset(&key).await? {
                println!("{key} removed.");
            } else {
                println!("{key} is not set");
            }
        }
        ConfigAction::List => {
            let items = dash.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(dash: &AdviserDashboard) -> anyhow::Result<()> {
    let status = dash.status().await?;
    println!("Store Status");
    for (table, count) in &status.tables {
        println!("  {table:<20} {count}");
    }
    println!(
        "  Sessions: {}/{} idle",
        status.idle_sessions, status.pool_size
    );
    Ok(())
}

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use checklist_recon::app::App;
use checklist_recon::config::{ConfigLoader, ResolvedConfig};
use checklist_recon::error::ReconError;
use checklist_recon::registry::SchemaStoreHttpClient;
use checklist_recon::sheets::GoogleSheetsHttpClient;

#[derive(Parser)]
#[command(name = "checklist-recon")]
#[command(about = "Reconcile biosample checklist spreadsheets against the schema-store field registry")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Summarize the registry field dictionary")]
    Fields(FieldsArgs),
    #[command(about = "List registered schemas as id,accession,name")]
    Schemas(SchemasArgs),
    #[command(about = "Run the checklist reconciliation pipeline and write the TSV artifact")]
    Reconcile(ReconcileArgs),
}

#[derive(Args)]
struct FieldsArgs {
    #[arg(long)]
    config: Option<String>,

    /// How many field names to print.
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Field whose full record to print (default: the first field).
    #[arg(long)]
    example: Option<String>,
}

#[derive(Args)]
struct SchemasArgs {
    #[arg(long)]
    config: Option<String>,
}

#[derive(Args)]
struct ReconcileArgs {
    #[arg(long)]
    config: Option<String>,

    /// Override the configured artifact path.
    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(recon) = report.downcast_ref::<ReconError>() {
            return ExitCode::from(recon.exit_code());
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Fields(args) => run_fields(args),
        Commands::Schemas(args) => run_schemas(args),
        Commands::Reconcile(args) => run_reconcile(args),
    }
}

// ReconError implements Diagnostic, so `?` converts through
// `From<ReconError> for Report` and `main` can still downcast the
// concrete error to pick the exit code.
fn build_app(config: ResolvedConfig) -> Result<App<SchemaStoreHttpClient, GoogleSheetsHttpClient>, ReconError> {
    let registry = SchemaStoreHttpClient::new(config.registry_base_url.clone())?;
    let sheets = GoogleSheetsHttpClient::new()?;
    Ok(App::new(registry, sheets, config))
}

fn run_fields(args: FieldsArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let mut app = build_app(config)?;
    let summary = app.field_summary(args.limit, args.example.as_deref())?;

    println!("{} fields in registry", summary.total);
    for name in &summary.names {
        println!("{name}");
    }
    match &summary.example {
        Some(record) => {
            let json = serde_json::to_string_pretty(record).into_diagnostic()?;
            println!("\nexample record:\n{json}");
        }
        None => {
            if let Some(name) = &args.example {
                return Err(miette::Report::msg(format!("field not found: {name}")));
            }
        }
    }
    Ok(())
}

fn run_schemas(args: SchemasArgs) -> miette::Result<()> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let app = build_app(config)?;

    for schema in app.schema_list()? {
        println!(
            "{},{},{}",
            schema.id,
            schema.accession.as_deref().unwrap_or(""),
            schema.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn run_reconcile(args: ReconcileArgs) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref())?;
    if let Some(output) = args.output {
        config.output = output.into();
    }
    let mut app = build_app(config)?;

    let report = app.run_reconciliation()?;
    let json = serde_json::to_string_pretty(&report).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

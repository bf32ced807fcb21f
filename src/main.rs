use std::error::Error;
use std::path::{Path, PathBuf};

use actix_web::{web, App, HttpServer};
use clap::{Parser, Subcommand};
use log::info;

use student_dashboard::{api, build_report, data, model, Config, DashboardQuery, Dataset, FileFormat};

#[derive(Parser)]
#[command(
    name = "student_dashboard",
    about = "Student performance analytics and score prediction",
    long_about = "Loads a class results table (CSV, Excel, JSON or a binary snapshot) and computes \
                 class statistics, risk alerts, learning-path advice and predicted scores."
)]
struct Cli {
    /// TOML settings file; defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the JSON service
    Serve,

    /// Print the full dashboard for a file as JSON
    Report {
        /// Results table (.csv, .xlsx, .json, .bin)
        file: PathBuf,

        /// Read the file as this format instead of going by its extension
        #[arg(long, value_enum)]
        format: Option<FileFormat>,

        /// Student to profile; the first in the file by default
        #[arg(long)]
        student: Option<String>,

        /// Subject for the exam comparison; the student's first by default
        #[arg(long)]
        subject: Option<String>,

        /// Rows in the top and bottom rankings
        #[arg(long, value_name = "N")]
        top_n: Option<usize>,
    },

    /// Predict one student's score
    Predict {
        file: PathBuf,

        #[arg(long, value_enum)]
        format: Option<FileFormat>,

        #[arg(long)]
        student: String,
    },

    /// Rewrite any supported table as a binary snapshot
    Convert { input: PathBuf, output: PathBuf },
}

async fn serve(config: Config) -> std::io::Result<()> {
    let settings = web::Data::new(config.clone());
    let upload_limit = config.max_upload_bytes;

    info!("Starting Student Performance Dashboard on http://{}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(settings.clone())
            .app_data(web::PayloadConfig::new(upload_limit))
            .configure(api::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await
}

fn load(file: &Path, format: Option<FileFormat>) -> student_dashboard::Result<Dataset> {
    match format {
        Some(format) => data::load_bytes(&std::fs::read(file)?, format),
        None => data::load_path(file),
    }
}

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str())).init();

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Report { file, format, student, subject, top_n } => {
            let dataset = load(&file, format)?;
            let query = DashboardQuery { student, subject, top_n: top_n.unwrap_or(config.ranking_size) };
            println!("{}", serde_json::to_string_pretty(&build_report(&dataset, &query))?);
        }
        Commands::Predict { file, format, student } => {
            let dataset = load(&file, format)?;
            let prediction = model::predict_for_student(&dataset, &student)?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Commands::Convert { input, output } => {
            let dataset = data::load_path(&input)?;
            data::write_binary(&dataset, &output)?;
            info!("Wrote {} records to {}", dataset.len(), output.display());
        }
    }
    Ok(())
}

use clap::{Args, Parser, Subcommand};
use review_core::audit::recorder::AuditRecorder;
use review_core::audit::sink::{AuditSink, NdjsonAuditSink};
use review_core::config::ReviewConfig;
use review_core::error::CoreResult;
use review_core::intake::parser::{load_case_record, validate_patient_id};
use review_core::notify::channel::LoggingChannel;
use review_core::report::producer::FileReportProducer;
use review_core::review::session::ReviewSession;
use review_core::review::state::ReviewAction;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "review_runner")]
#[command(about = "Clinician review of AI-generated diagnostic reports")]
struct Cli {
    /// TOML configuration file; defaults apply when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the loaded case and the doctor it routes to
    Show { case: PathBuf },
    /// Approve the case, write the report and compose the patient message
    Approve {
        #[command(flatten)]
        review: ReviewArgs,
        /// Hand the composed message to the logging channel
        #[arg(long)]
        send: bool,
    },
    /// Mark the case as being edited; nothing is recorded
    Edit {
        #[command(flatten)]
        review: ReviewArgs,
    },
    /// Reject the case and route it for manual review
    Reject {
        #[command(flatten)]
        review: ReviewArgs,
    },
    /// List persisted audit records for a patient
    Audit { patient_id: String },
}

#[derive(Args)]
struct ReviewArgs {
    /// Case record JSON
    case: PathBuf,
    /// Follow-up notes for the patient
    #[arg(long)]
    notes: Option<String>,
    /// Next ultrasound, one of the configured scan names
    #[arg(long)]
    ultrasound: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let cfg = match ReviewConfig::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("CONFIG FAIL {}", e);
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli.command, &cfg) {
        tracing::error!(error = %e, "review_runner failed");
        eprintln!("FAIL {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, cfg: &ReviewConfig) -> CoreResult<()> {
    match command {
        Commands::Show { case } => {
            let session = ReviewSession::open(load_case_record(&case)?, cfg);
            print_json(&json!({
                "session_id": session.session_id(),
                "case": session.case(),
                "assignment": session.assignment(),
                "routing": session.assignment().reason.describe(),
                "follow_up": session.follow_up(),
                "ultrasound_options": cfg.ultrasound_options,
            }))
        }
        Commands::Approve { review, send } => decide(ReviewAction::Approve, &review, send, cfg),
        Commands::Edit { review } => decide(ReviewAction::Edit, &review, false, cfg),
        Commands::Reject { review } => decide(ReviewAction::Reject, &review, false, cfg),
        Commands::Audit { patient_id } => {
            validate_patient_id(&patient_id)?;
            let sink = NdjsonAuditSink::open_or_create(&cfg.audit_dir)?;
            print_json(&json!({
                "patient_id": patient_id,
                "records": sink.records_for(&patient_id)?,
            }))
        }
    }
}

fn decide(action: ReviewAction, review: &ReviewArgs, send: bool, cfg: &ReviewConfig) -> CoreResult<()> {
    let mut session = ReviewSession::open(load_case_record(&review.case)?, cfg);
    if let Some(notes) = &review.notes {
        session.set_notes(notes.as_str());
    }
    if review.ultrasound.is_some() {
        session.select_next_ultrasound(review.ultrasound.as_deref())?;
    }

    let mut recorder = AuditRecorder::new(NdjsonAuditSink::open_or_create(&cfg.audit_dir)?);
    let reports = FileReportProducer::new(&cfg.report_dir);
    let outcome = session.apply(action, &mut recorder, &reports)?;

    let delivery = if send {
        Some(session.deliver(&LoggingChannel::new("whatsapp-mock"))?)
    } else {
        None
    };

    print_json(&json!({
        "session_id": session.session_id(),
        "assignment": session.assignment(),
        "outcome": outcome,
        "audit_status": outcome.audit.describe(),
        "delivery": delivery,
    }))
}

fn print_json(value: &serde_json::Value) -> CoreResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

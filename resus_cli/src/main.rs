use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use resus_core::medication::{DueState, MedicationTracker};
use resus_core::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "resus")]
#[command(about = "Cardiac arrest timer with rhythm, shock and medication prompting", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Don't advance the session clock by the wall time since the last command
    #[arg(long, global = true)]
    frozen_clock: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the session, or resume it after a pause
    Start,

    /// Pause the session clock
    Pause,

    /// Advance the session clock by a number of seconds
    Advance { seconds: u64 },

    /// Record the rhythm seen at the rhythm check (VF, pVT, asystole, PEA, sinus)
    Rhythm { rhythm: Rhythm },

    /// Confirm a delivered shock
    Shock { joules: u16 },

    /// Confirm the pulse check and start the next cycle
    Pulse,

    /// Record a protocol drug administration
    Give {
        drug: Drug,

        /// Dose in the drug's unit; defaults to the next protocol dose
        #[arg(long)]
        dose: Option<f64>,
    },

    /// Dismiss a due medication reminder
    Dismiss { drug: Drug },

    /// Snooze a medication reminder
    Snooze { drug: Drug },

    /// Switch between coach and track mode
    Mode {
        mode: Mode,

        /// Confirm the change in alarm behavior
        #[arg(long)]
        confirm: bool,
    },

    /// Set the adrenaline interval in minutes (3, 4 or 5)
    Frequency { minutes: u8 },

    /// Start the next cycle without a pulse check
    Sync,

    /// Revert the most recent action while its undo window is open
    Undo,

    /// Confirm a compressor change
    Compressor,

    /// Toggle the LUCAS mechanical CPR device
    Lucas,

    /// Record a discretionary medication (Bicarb, Ca, Glu, Mg, KCl, Atropine or free text)
    Med {
        name: String,

        #[arg(default_value = "")]
        dosage: String,
    },

    /// Record a procedure (aline, central-line, ett, echo, ecmo)
    Procedure { procedure: Procedure },

    /// Set the doctor notes for this session
    Note { text: String },

    /// Show the session state and reminders
    Status {
        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Print the event log
    Log,

    /// Drive the audio cue queue
    Sound { action: SoundAction },

    /// End the session and store its record
    End {
        #[arg(long)]
        outcome: Outcome,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Discard the current session
    Reset,

    /// List finished sessions
    History,
}

#[derive(Clone, Copy, ValueEnum)]
enum SoundAction {
    /// Start the next queued cue
    Next,
    /// Report that the playing cue has finished
    Finished,
}

struct Paths {
    state: PathBuf,
    sessions: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        Self {
            state: data_dir.join("state.json"),
            sessions: data_dir.join("sessions.jsonl"),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    resus_core::logging::init_with(&config.logging);

    match run(cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_validation() {
                eprintln!("refused: {}", e);
            } else {
                eprintln!("error: {}", e);
            }
            if let Error::ConfirmationRequired(mode) = e {
                eprintln!("hint: run `resus mode {} --confirm`", mode);
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run(cli: Cli, config: &Config) -> Result<()> {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);
    tracing::debug!("Using data directory {:?}", data_dir);

    let now = Utc::now();
    let mut stored = match StoredSession::load(&paths.state)? {
        Some(stored) => stored,
        None => StoredSession::new(Engine::new(config.protocol_settings()?), now),
    };
    if cli.frozen_clock {
        stored.clock_synced_at = now;
    } else {
        stored.catch_up(now);
    }

    let engine = &mut stored.engine;
    match cli.command {
        Commands::Start => {
            let outcome = engine.apply(Action::Start)?;
            match outcome {
                ActionOutcome::Ignored => println!("Session already running"),
                ActionOutcome::Updated => println!(
                    "Session resumed at {}",
                    format_clock(engine.session().total_elapsed_seconds)
                ),
                _ => report(engine, &outcome),
            }
        }
        Commands::Pause => match engine.apply(Action::Pause)? {
            ActionOutcome::Updated => println!(
                "Session paused at {}",
                format_clock(engine.session().total_elapsed_seconds)
            ),
            _ => println!("Session is not running"),
        },
        Commands::Advance { seconds } => {
            engine.advance(seconds);
            print_clock(engine);
            print_active_banners(engine);
        }
        Commands::Rhythm { rhythm } => {
            let outcome = engine.apply(Action::SelectRhythm(rhythm))?;
            if outcome == ActionOutcome::Ignored {
                println!("Rhythm selection is locked until the next pulse check");
            } else {
                report(engine, &outcome);
            }
        }
        Commands::Shock { joules } => {
            let outcome = engine.apply(Action::ConfirmShock {
                energy_joules: joules,
            })?;
            report(engine, &outcome);
        }
        Commands::Pulse => {
            let outcome = engine.apply(Action::ConfirmPulseCheck)?;
            report(engine, &outcome);
        }
        Commands::Give { drug, dose } => {
            let outcome = engine.apply(Action::Administer { drug, dose })?;
            report(engine, &outcome);
        }
        Commands::Dismiss { drug } => {
            let outcome = engine.apply(Action::Dismiss(drug))?;
            if outcome == ActionOutcome::Ignored {
                println!("{} is not due", drug);
            } else {
                report(engine, &outcome);
            }
        }
        Commands::Snooze { drug } => {
            let outcome = engine.apply(Action::Snooze(drug))?;
            if outcome == ActionOutcome::Ignored {
                println!("{} has no reminder to snooze", drug);
            } else {
                report(engine, &outcome);
            }
        }
        Commands::Mode { mode, confirm } => {
            let outcome = engine.apply(Action::SetMode {
                mode,
                confirmed: confirm,
            })?;
            match outcome {
                ActionOutcome::Ignored => println!("Already in {} mode", mode),
                ActionOutcome::Updated => println!("Mode set to {}", mode),
                _ => report(engine, &outcome),
            }
        }
        Commands::Frequency { minutes } => {
            let outcome = engine.apply(Action::SetAdrenalineFrequency(minutes))?;
            match outcome {
                ActionOutcome::Recorded { .. } => report(engine, &outcome),
                _ => println!("Adrenaline every {} min", minutes),
            }
        }
        Commands::Sync => {
            let outcome = engine.apply(Action::SyncCycle)?;
            report(engine, &outcome);
        }
        Commands::Undo => {
            let outcome = engine.apply(Action::UndoLast)?;
            report(engine, &outcome);
        }
        Commands::Compressor => {
            let outcome = engine.apply(Action::ConfirmCompressorChange)?;
            report(engine, &outcome);
        }
        Commands::Lucas => {
            let outcome = engine.apply(Action::ToggleMechanicalCpr)?;
            report(engine, &outcome);
        }
        Commands::Med { name, dosage } => {
            let outcome = engine.apply(Action::RecordMedication {
                medication: name,
                dosage,
            })?;
            report(engine, &outcome);
        }
        Commands::Procedure { procedure } => {
            let outcome = engine.apply(Action::RecordProcedure(procedure))?;
            report(engine, &outcome);
        }
        Commands::Note { text } => {
            engine.apply(Action::SetNotes(text))?;
            println!("Notes saved");
        }
        Commands::Status { json } => {
            if json {
                print_status_json(engine)?;
            } else {
                print_status(engine);
            }
        }
        Commands::Log => print_log(engine),
        Commands::Sound { action } => {
            let now_ms = Utc::now().timestamp_millis().max(0) as u64;
            let sound = match action {
                SoundAction::Next => engine.next_sound(now_ms),
                SoundAction::Finished => engine.sound_finished(now_ms),
            };
            match sound {
                Some(sound) => println!("{}", sound.token()),
                None => println!("none"),
            }
        }
        Commands::End { outcome, notes } => {
            let record = engine.end(outcome, notes)?;
            JsonlSink::new(&paths.sessions).append(&record)?;
            print_record(&record);
        }
        Commands::Reset => {
            engine.reset();
            println!("Session reset");
        }
        Commands::History => return cmd_history(&paths),
    }

    stored.save(&paths.state)
}

fn cmd_history(paths: &Paths) -> Result<()> {
    let records = read_records(&paths.sessions)?;
    if records.is_empty() {
        println!("No finished sessions.");
        return Ok(());
    }

    for record in &records {
        let started = record
            .started_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{}  {}  {:<11}  {}  {} cycles  {} shocks  {} adrenaline",
            record.id,
            started,
            record.outcome.to_string(),
            format_clock(record.duration_seconds()),
            record.total_cycles(),
            record.summary.shock_count,
            record.summary.adrenaline_doses
        );
    }
    Ok(())
}

/// Print the outcome of an accepted action, then anything now due
fn report(engine: &Engine, outcome: &ActionOutcome) {
    match outcome {
        ActionOutcome::Recorded { annotations } => {
            if let Some(event) = engine.last_event() {
                println!(
                    "[{}] {}",
                    format_clock(event.session_seconds),
                    event.kind.describe()
                );
            }
            for anomaly in annotations {
                println!("  ! {}", anomaly);
            }
        }
        ActionOutcome::Updated => println!("OK"),
        ActionOutcome::Ignored => println!("No change"),
        ActionOutcome::Undone(kind) => println!("Undone: {}", kind.describe()),
    }
    print_active_banners(engine);
}

fn print_clock(engine: &Engine) {
    let session = engine.session();
    println!(
        "{}  cycle {} ({} elapsed, {} left)",
        format_clock(session.total_elapsed_seconds),
        session.cycle_number,
        format_clock(u64::from(session.cycle_elapsed_seconds)),
        format_clock(u64::from(session.cycle_remaining_seconds()))
    );
}

fn print_active_banners(engine: &Engine) {
    for banner in engine.banners().iter().filter(|b| b.is_active()) {
        println!(">> {} ({})", banner.label, banner.timing);
    }
}

fn due_label(tracker: &MedicationTracker) -> String {
    match tracker.due_state {
        DueState::Inactive => "-".into(),
        DueState::Due => "DUE".into(),
        DueState::Dismissed { .. } => "dismissed".into(),
        DueState::Snoozed { until_seconds } => {
            format!("snoozed until {}", format_clock(until_seconds))
        }
    }
}

fn print_status(engine: &Engine) {
    let summary = engine.summary();
    println!(
        "Session {} [{}] {} mode",
        engine.id(),
        summary.status,
        summary.mode
    );
    print_clock(engine);

    let rhythm = match summary.rhythm {
        Some(r) if r.is_shockable() => format!("{} (shockable)", r.full_name()),
        Some(r) => format!("{} (non-shockable)", r.full_name()),
        None => "not set".into(),
    };
    println!("Rhythm: {}   Shocks: {}", rhythm, summary.shock_count);
    println!(
        "Pulse checks: {}   Compressor changes: {}{}",
        summary.pulse_checks,
        summary.compressor_changes,
        if summary.mechanical_cpr { "   LUCAS active" } else { "" }
    );

    println!();
    for tracker in engine.medications().iter() {
        let next = tracker
            .next_dose()
            .map(|d| format!("next {} {}", d, tracker.unit()))
            .unwrap_or_else(|| "ceiling reached".into());
        println!(
            "{:<11} {:<20} {} dose(s), {} {} total, {}",
            tracker.drug.name(),
            due_label(tracker),
            tracker.dose_sequence,
            tracker.cumulative_dose,
            tracker.unit(),
            next
        );
    }
    println!(
        "Adrenaline every {} min",
        engine.adrenaline_frequency().minutes()
    );

    println!();
    for banner in engine.banners() {
        let status = match banner.status {
            BannerStatus::Pending => "pending",
            BannerStatus::Active => "ACTIVE",
            BannerStatus::Completed => "done",
        };
        println!("  [{:<7}] {} ({})", status, banner.label, banner.timing);
    }

    if let Some(event) = engine.undoable() {
        println!();
        println!("Undo available: {}", event.kind.describe());
    }
    if !engine.doctor_notes().is_empty() {
        println!("Notes: {}", engine.doctor_notes());
    }
}

fn print_status_json(engine: &Engine) -> Result<()> {
    let status = serde_json::json!({
        "id": engine.id(),
        "summary": engine.summary(),
        "medications": engine.medications(),
        "banners": engine.banners(),
        "pending_sounds": engine.audio().pending().collect::<Vec<_>>(),
        "playing": engine.audio().playing(),
        "undoable": engine.undoable().map(|e| e.kind.name()),
        "doctor_notes": engine.doctor_notes(),
        "outcome": engine.outcome(),
    });
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn print_log(engine: &Engine) {
    if engine.events().next().is_none() {
        println!("No events recorded.");
        return;
    }
    for event in engine.events() {
        let mut line = format!(
            "[{}] cycle {:>2}  {}",
            format_clock(event.session_seconds),
            event.cycle,
            event.kind.describe()
        );
        for anomaly in &event.annotations {
            line.push_str(&format!(" [{}]", anomaly));
        }
        println!("{}", line);
    }
}

fn print_record(record: &SessionRecord) {
    println!("Session ended: {}", record.outcome);
    println!(
        "  Duration {}  Cycles {}  Shocks {}",
        format_clock(record.duration_seconds()),
        record.total_cycles(),
        record.summary.shock_count
    );
    println!(
        "  Adrenaline {} dose(s)  Amiodarone {} mg  Lidocaine {} mg/kg",
        record.summary.adrenaline_doses,
        record.summary.amiodarone_mg,
        record.summary.lidocaine_mg_per_kg
    );
    println!("  Record {} saved", record.id);
}

//! Interactive consultation console.
//!
//! Each input line is split into words (double quotes group words) and parsed with clap as a
//! console command. Commands only start work; results are printed when the controller reports
//! the corresponding [`SessionEvent`].

use clap::{Parser, Subcommand};
use consult_core::constants::{
    COMMON_DOSAGES, COMMON_DURATIONS, COMMON_FREQUENCIES, COMMON_MEDICATIONS,
    COMMON_RECOMMENDATIONS, COMMON_ROUTES, COMMON_TIMINGS,
};
use consult_core::composer::blank_custom_medication;
use consult_core::{
    Completion, ConsultError, ConsultResult, ConsultationController, ConsultationSession,
    MedicationField, Patient, PatientId, PrescriptionComposer, RequestKind, SessionEvent,
    SessionState,
};
use std::fmt::Write as _;

#[derive(Parser, Debug)]
#[command(name = "consult", no_binary_name = true)]
struct Line {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum ConsoleCommand {
    /// List patients from the directory
    Patients,
    /// Load a patient by id, or a random patient
    Load { id: Option<String> },
    /// Load a random patient
    Next,
    /// Show the current session
    Show,
    /// Select a keyword from the current candidates
    Select {
        #[arg(required = true, allow_hyphen_values = true)]
        keyword: Vec<String>,
    },
    /// Search medical records related to the selected keywords
    History,
    /// Finish keyword selection and generate a prescription
    Finish,
    /// Control dictation
    Dictate {
        #[command(subcommand)]
        action: DictateAction,
    },
    /// Dictate recognised (final) text
    Say {
        #[arg(required = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Dictate provisional (interim) text
    Hear {
        #[arg(allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Show the prescription
    Meds,
    /// Toggle selection of a medication
    Toggle { index: usize },
    /// Add a custom medication
    AddMed {
        name: String,
        dosage: Option<String>,
        frequency: Option<String>,
        duration: Option<String>,
    },
    /// Edit one field of a medication
    Edit {
        index: usize,
        field: String,
        #[arg(required = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Drop local edits of a generated medication
    Revert { index: usize },
    /// Add a custom recommendation
    Rec {
        #[arg(required = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Replace a custom recommendation
    EditRec {
        index: usize,
        #[arg(required = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Add a common recommendation
    CommonRec {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Remove a custom recommendation
    RmRec { index: usize },
    /// Show quick-pick values
    Picks,
    /// Send selected medications to the pharmacy
    Send,
    /// Drop the current patient
    Reset,
    /// Leave the console
    Quit,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum DictateAction {
    Start,
    Stop,
    Clear,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Split a console line into words. Double quotes group words; quotes themselves are dropped.
fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_word = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

/// Console indices are 1-based.
fn to_index(position: usize) -> ConsultResult<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| ConsultError::validation("positions start at 1"))
}

pub struct Console {
    controller: ConsultationController,
    directory: Vec<Patient>,
}

impl Console {
    pub fn new(controller: ConsultationController) -> Self {
        Self {
            controller,
            directory: Vec::new(),
        }
    }

    pub fn controller(&self) -> &ConsultationController {
        &self.controller
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.controller.next_event().await
    }

    /// Fetch the patient directory, keeping it for `load <id>`.
    pub async fn refresh_directory(&mut self) -> ConsultResult<&[Patient]> {
        self.directory = self.controller.list_patients().await?;
        Ok(&self.directory)
    }

    /// Load by id, using the directory entry when one is known.
    pub fn load(&mut self, id: Option<&str>) -> ConsultResult<()> {
        match id {
            None => self.controller.load_patient(None),
            Some(raw) => {
                let id = PatientId::new(raw)?;
                match self.directory.iter().find(|p| p.id == id) {
                    Some(patient) => self.controller.load_patient(Some(patient.clone())),
                    None => self.controller.load_patient_by_id(id),
                }
            }
        }
        println!("loading patient...");
        Ok(())
    }

    pub async fn handle_line(&mut self, line: &str) -> Flow {
        let words = split_words(line);
        if words.is_empty() {
            return Flow::Continue;
        }
        let parsed = match Line::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                println!("{e}");
                return Flow::Continue;
            }
        };
        match self.run(parsed.command).await {
            Ok(flow) => flow,
            Err(e) => {
                println!("error: {e}");
                Flow::Continue
            }
        }
    }

    async fn run(&mut self, command: ConsoleCommand) -> ConsultResult<Flow> {
        match command {
            ConsoleCommand::Patients => {
                let patients = self.refresh_directory().await?;
                print!("{}", render_directory(patients));
            }
            ConsoleCommand::Load { id } => self.load(id.as_deref())?,
            ConsoleCommand::Next => self.load(None)?,
            ConsoleCommand::Show => print!("{}", render_session(self.controller.session())),
            ConsoleCommand::Select { keyword } => {
                self.controller.select_keyword(&keyword.join(" "))?;
                print!("{}", render_keywords(self.controller.session()));
            }
            ConsoleCommand::History => {
                self.controller.fetch_medical_history()?;
                println!("searching related records...");
            }
            ConsoleCommand::Finish => {
                self.controller.finish_selection()?;
                println!("generating prescription...");
            }
            ConsoleCommand::Dictate { action } => self.dictate(action)?,
            ConsoleCommand::Say { text } => {
                let mut text = text.join(" ");
                text.push(' ');
                self.controller.transcript_mut().append_final(&text);
            }
            ConsoleCommand::Hear { text } => {
                self.controller.transcript_mut().set_interim(&text.join(" "));
            }
            ConsoleCommand::Meds => print!("{}", render_prescription(self.composer()?)),
            ConsoleCommand::Toggle { index } => {
                let selected = self.controller.composer_mut()?.toggle_select(to_index(index)?)?;
                println!("{} medication {index}", if selected { "selected" } else { "deselected" });
            }
            ConsoleCommand::AddMed {
                name,
                dosage,
                frequency,
                duration,
            } => {
                let mut medication = blank_custom_medication();
                medication.name = name;
                medication.dosage = dosage.unwrap_or_default();
                medication.frequency = frequency.unwrap_or_default();
                medication.duration = duration.unwrap_or_default();
                let index = self.controller.composer_mut()?.add_custom_medication(medication);
                println!("added medication {}", index + 1);
            }
            ConsoleCommand::Edit {
                index,
                field,
                value,
            } => {
                let field: MedicationField = field.parse()?;
                self.controller
                    .composer_mut()?
                    .update_medication(to_index(index)?, field, value.join(" "))?;
            }
            ConsoleCommand::Revert { index } => {
                self.controller.composer_mut()?.revert_medication(to_index(index)?)?;
            }
            ConsoleCommand::Rec { text } => {
                self.controller
                    .composer_mut()?
                    .add_custom_recommendation(text.join(" "));
            }
            ConsoleCommand::EditRec { index, text } => {
                self.controller
                    .composer_mut()?
                    .update_custom_recommendation(to_index(index)?, text.join(" "))?;
            }
            ConsoleCommand::CommonRec { text } => {
                let text = text.join(" ");
                if !COMMON_RECOMMENDATIONS.contains(&text.as_str()) {
                    return Err(ConsultError::validation(format!(
                        "'{text}' is not a common recommendation (see `picks`)"
                    )));
                }
                if !self.controller.composer_mut()?.toggle_common_recommendation(&text) {
                    println!("already added");
                }
            }
            ConsoleCommand::RmRec { index } => {
                let removed = self
                    .controller
                    .composer_mut()?
                    .remove_custom_recommendation(to_index(index)?)?;
                println!("removed '{removed}'");
            }
            ConsoleCommand::Picks => print!("{}", render_picks()),
            ConsoleCommand::Send => {
                self.controller.send_to_pharmacy()?;
                println!("sending to pharmacy...");
            }
            ConsoleCommand::Reset => self.controller.reset(),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn composer(&self) -> ConsultResult<&PrescriptionComposer> {
        self.controller
            .session()
            .composer()
            .ok_or_else(|| ConsultError::validation("no prescription yet; use `finish`"))
    }

    fn dictate(&mut self, action: DictateAction) -> ConsultResult<()> {
        match action {
            DictateAction::Start => {
                self.controller.transcript_mut().start()?;
                println!("dictation on; use `say <text>`");
            }
            DictateAction::Stop => self.controller.transcript_mut().stop(),
            DictateAction::Clear => self.controller.clear_transcript(),
            DictateAction::Commit => match self.controller.commit_transcript() {
                Some(text) => println!("committed: {text}"),
                None => println!("nothing to commit"),
            },
        }
        Ok(())
    }

    /// Print the outcome of one applied response.
    pub fn report(&self, event: &SessionEvent) {
        let session = self.controller.session();
        match &event.completion {
            Completion::Superseded => {
                tracing::debug!(kind = %event.kind, "stale response dropped");
            }
            Completion::Failed(e) => println!("{} failed: {e}", event.kind),
            Completion::Applied => match event.kind {
                RequestKind::PatientLoad => print!("{}", render_session(session)),
                RequestKind::KeywordRefresh => print!("{}", render_keywords(session)),
                RequestKind::RelatedRecords => print!("{}", render_related(session)),
                RequestKind::Generation => {
                    if let Some(composer) = session.composer() {
                        print!("{}", render_prescription(composer));
                    }
                }
                RequestKind::Dispatch => {
                    if let Some(receipt) = session.last_receipt() {
                        println!(
                            "prescription sent to pharmacy with {} medication(s) (order {}): {}",
                            receipt.medication_count, receipt.order_id, receipt.message
                        );
                    }
                }
            },
        }
    }
}

fn render_directory(patients: &[Patient]) -> String {
    let mut out = String::new();
    if patients.is_empty() {
        out.push_str("No patients found.\n");
    }
    for p in patients {
        let age = p.age.map(|a| a.to_string()).unwrap_or_else(|| "?".into());
        let _ = writeln!(out, "{:>6}  {} ({age}, {})  {}", p.id, p.name, p.gender, p.case_summary);
    }
    out
}

fn render_keywords(session: &ConsultationSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "selected:   {}", session.selected_keywords().join(", "));
    let refreshing = if session.is_refreshing_keywords() {
        " (updating)"
    } else {
        ""
    };
    let _ = writeln!(out, "candidates{refreshing}: {}", session.candidates().join(", "));
    out
}

fn render_related(session: &ConsultationSession) -> String {
    let history = session.history();
    let mut out = String::new();
    if let Some(e) = history.error() {
        let _ = writeln!(out, "related records unavailable: {e}");
    } else if history.related_records().is_empty() {
        out.push_str("no related records\n");
    }
    for record in history.related_records() {
        let _ = writeln!(out, "  [{}] {}", record.id, record.content);
    }
    out
}

fn render_session(session: &ConsultationSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "state: {}", session.state());
    if let Some(p) = session.patient() {
        let _ = writeln!(out, "patient {}: {}  last visit {}", p.id, p.name, p.last_visit);
        let _ = writeln!(out, "case: {}", p.case_summary);
    }
    if let Some(h) = session.patient_history() {
        let _ = writeln!(out, "diagnoses: {}", h.diagnoses.join(", "));
        let _ = writeln!(out, "allergies: {}", h.allergies.join(", "));
        let _ = writeln!(out, "medications: {}", h.medications.join(", "));
        for report in &h.reports {
            let _ = writeln!(out, "report: {} {} {}", report.date, report.kind, report.status);
        }
    }
    if session.state() == SessionState::Keywords {
        out.push_str(&render_keywords(session));
    }
    if !session.related_records().is_empty() {
        out.push_str(&render_related(session));
    }
    if !session.transcript().is_empty() {
        let _ = writeln!(out, "transcript: {}", session.transcript());
    }
    if let Some(e) = session.last_error() {
        let _ = writeln!(out, "last error: {e}");
    }
    out
}

fn render_prescription(composer: &PrescriptionComposer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "diagnosis: {}", composer.draft().diagnosis);
    let selected = composer.selected_medications();
    for (i, med) in composer.medications().iter().enumerate() {
        let mark = if selected.contains(&i) { "x" } else { " " };
        let origin = if !composer.is_draft_index(i) {
            " (custom)"
        } else if composer.is_modified(i) {
            " (edited)"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "[{mark}] {}. {} {} {} {} {} {}{origin}",
            i + 1,
            med.name,
            med.dosage,
            med.frequency,
            med.duration,
            med.route,
            med.timing
        );
    }
    let recommendations = composer.recommendations();
    if !recommendations.is_empty() {
        out.push_str("recommendations:\n");
        for r in recommendations {
            let _ = writeln!(out, "  - {r}");
        }
    }
    out
}

fn render_picks() -> String {
    let groups: [(&str, &[&str]); 7] = [
        ("medications", COMMON_MEDICATIONS),
        ("dosages", COMMON_DOSAGES),
        ("frequencies", COMMON_FREQUENCIES),
        ("durations", COMMON_DURATIONS),
        ("routes", COMMON_ROUTES),
        ("timings", COMMON_TIMINGS),
        ("recommendations", COMMON_RECOMMENDATIONS),
    ];
    let mut out = String::new();
    for (label, values) in groups {
        let _ = writeln!(out, "{label}: {}", values.join(" | "));
    }
    out
}

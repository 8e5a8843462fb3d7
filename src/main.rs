mod db;
mod error;
mod models;
mod report;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use db::Database;
use models::{JsonOutput, QuestionType};

const DEFAULT_DB_NAME: &str = "gapcheck.db";

#[derive(Parser)]
#[command(name = "gapcheck")]
#[command(about = "Organizational gap assessments: actual vs required ratings and the gaps between them")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init {
        /// Load the sample clients and question catalog
        #[arg(long)]
        seed: bool,
    },

    /// Manage clients
    #[command(subcommand)]
    Client(ClientCommands),

    /// Manage the question catalog
    #[command(subcommand)]
    Question(QuestionCommands),

    /// Manage candidate answers for a question
    #[command(subcommand)]
    Answer(AnswerCommands),

    /// List all question categories
    Categories,

    /// Manage assessments
    #[command(subcommand)]
    Assessment(AssessmentCommands),

    /// Record the actual/required answer pair for one question
    Record {
        /// Assessment ID
        assessment_id: i64,

        /// Question ID
        question_id: i64,

        /// Answer ID for the actual rating
        #[arg(long, short)]
        actual: i64,

        /// Answer ID for the required rating
        #[arg(long, short)]
        desired: i64,
    },

    /// Show the gap report for an assessment
    Report {
        /// Assessment ID
        assessment_id: i64,

        /// Drill down into one category
        #[arg(long, short)]
        category: Option<String>,

        /// Only list questions with a positive gap (with --category)
        #[arg(long)]
        gaps_only: bool,
    },

    /// Export assessment results as CSV
    Export {
        /// Assessment ID
        assessment_id: i64,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// List all clients
    List,

    /// Add a new client
    Add {
        /// Client name
        name: String,
    },
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// List catalog questions
    List {
        /// Filter by question type: org/action
        #[arg(long, short)]
        qtype: Option<String>,

        /// Filter by category
        #[arg(long, short)]
        category: Option<String>,
    },

    /// Add a catalog question
    Add {
        /// Question text
        text: String,

        /// Category label
        #[arg(long, short)]
        category: String,

        /// Question type: org/action
        #[arg(long, short)]
        qtype: String,

        /// Ordering of the category
        #[arg(long, default_value_t = 0)]
        csequence: i64,

        /// Ordering within the category
        #[arg(long, default_value_t = 0)]
        qsequence: i64,
    },

    /// Update a catalog question (unset fields keep their value)
    Update {
        /// Question ID
        id: i64,

        /// New question text
        #[arg(long)]
        text: Option<String>,

        /// New category label
        #[arg(long, short)]
        category: Option<String>,

        /// New question type: org/action
        #[arg(long, short)]
        qtype: Option<String>,

        /// New category ordering
        #[arg(long)]
        csequence: Option<i64>,

        /// New ordering within the category
        #[arg(long)]
        qsequence: Option<i64>,
    },

    /// Delete a question and its answers
    Delete {
        /// Question ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum AnswerCommands {
    /// List the answers of a question, lowest score first
    List {
        /// Question ID
        question_id: i64,
    },

    /// Add a candidate answer to a question
    Add {
        /// Question ID
        question_id: i64,

        /// Score contributed by this answer
        #[arg(long, short, allow_negative_numbers = true)]
        score: i64,

        /// Answer text
        #[arg(long, short)]
        label: String,
    },

    /// Update an answer (unset fields keep their value)
    Update {
        /// Answer ID
        id: i64,

        /// New score
        #[arg(long, short, allow_negative_numbers = true)]
        score: Option<i64>,

        /// New answer text
        #[arg(long, short)]
        label: Option<String>,
    },

    /// Delete an answer
    Delete {
        /// Answer ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum AssessmentCommands {
    /// Create an assessment for a client
    Create {
        /// Client ID
        client_id: i64,

        /// Question type answered against: org/action
        #[arg(long, short)]
        qtype: String,

        /// Assessment name
        #[arg(long, short)]
        name: String,
    },

    /// List assessments
    List {
        /// Filter by client ID
        #[arg(long)]
        client: Option<i64>,
    },

    /// Show assessment details and completion state
    Show {
        /// Assessment ID
        id: i64,
    },

    /// Delete an assessment and its recorded choices
    Delete {
        /// Assessment ID
        id: i64,
    },
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("GAPCHECK_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gapcheck");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn parse_qtype(s: &str) -> Result<QuestionType, String> {
    QuestionType::from_str(s)
        .ok_or_else(|| format!("Invalid question type '{}'. Use: org or action", s))
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = get_db_path();
    let db = Database::open(&db_path)?;
    db.init()?;

    match cli.command {
        Commands::Init { seed } => {
            let seeded = if seed { db.seed()? } else { false };
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "seeded": seeded
                    })))?
                );
            } else {
                println!("Database initialized at: {}", db_path.display());
                if seed && seeded {
                    println!("Sample catalog loaded.");
                } else if seed {
                    println!("Sample catalog skipped: clients already exist.");
                }
            }
        }

        Commands::Client(client_cmd) => match client_cmd {
            ClientCommands::List => {
                let clients = db.list_clients()?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&clients))?);
                } else if clients.is_empty() {
                    println!("No clients found.");
                } else {
                    println!("{:<5} {:<40} CREATED", "ID", "NAME");
                    println!("{}", "-".repeat(70));
                    for client in clients {
                        println!(
                            "{:<5} {:<40} {}",
                            client.id,
                            truncate(&client.name, 38),
                            client.created_at
                        );
                    }
                }
            }

            ClientCommands::Add { name } => {
                let id = db.add_client(&name)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "name": name
                        })))?
                    );
                } else {
                    println!("Added client '{}' with ID: {}", name, id);
                }
            }
        },

        Commands::Question(question_cmd) => match question_cmd {
            QuestionCommands::List { qtype, category } => {
                let qtype = qtype.as_deref().map(parse_qtype).transpose()?;
                let questions = db.list_questions(qtype, category.as_deref())?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&questions))?);
                } else if questions.is_empty() {
                    println!("No questions found.");
                } else {
                    println!(
                        "{:<5} {:<12} {:<20} {:<5} QUESTION",
                        "ID", "TYPE", "CATEGORY", "SEQ"
                    );
                    println!("{}", "-".repeat(90));
                    for q in questions {
                        println!(
                            "{:<5} {:<12} {:<20} {:<5} {}",
                            q.id,
                            q.qtype.label(),
                            truncate(&q.category, 18),
                            format!("{}.{}", q.csequence, q.qsequence),
                            truncate(&q.question, 44)
                        );
                    }
                }
            }

            QuestionCommands::Add {
                text,
                category,
                qtype,
                csequence,
                qsequence,
            } => {
                let qtype = parse_qtype(&qtype)?;
                let id = db.add_question(&category, qtype, csequence, qsequence, &text)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id
                        })))?
                    );
                } else {
                    println!("Added question with ID: {}", id);
                }
            }

            QuestionCommands::Update {
                id,
                text,
                category,
                qtype,
                csequence,
                qsequence,
            } => {
                if let Some(existing) = db.get_question(id)? {
                    let qtype = match qtype {
                        Some(s) => parse_qtype(&s)?,
                        None => existing.qtype,
                    };
                    db.update_question(
                        id,
                        category.as_deref().unwrap_or(&existing.category),
                        qtype,
                        csequence.unwrap_or(existing.csequence),
                        qsequence.unwrap_or(existing.qsequence),
                        text.as_deref().unwrap_or(&existing.question),
                    )?;
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Question {} updated.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Question not found"))?
                    );
                } else {
                    println!("Question not found.");
                }
            }

            QuestionCommands::Delete { id } => {
                if db.delete_question(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Question {} and its answers deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Question not found"))?
                    );
                } else {
                    println!("Question not found.");
                }
            }
        },

        Commands::Answer(answer_cmd) => match answer_cmd {
            AnswerCommands::List { question_id } => {
                let answers = db.answers_by_question(question_id)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&answers))?);
                } else if answers.is_empty() {
                    println!("No answers found for question {}.", question_id);
                } else {
                    println!("{:<5} {:>6} ANSWER", "ID", "SCORE");
                    println!("{}", "-".repeat(70));
                    for a in answers {
                        println!("{:<5} {:>6} {}", a.id, a.score, truncate(&a.answer, 55));
                    }
                }
            }

            AnswerCommands::Add {
                question_id,
                score,
                label,
            } => {
                let id = db.add_answer(question_id, score, &label)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id
                        })))?
                    );
                } else {
                    println!("Added answer with ID: {}", id);
                }
            }

            AnswerCommands::Update { id, score, label } => {
                if let Some(existing) = db.get_answer(id)? {
                    db.update_answer(
                        id,
                        score.unwrap_or(existing.score),
                        label.as_deref().unwrap_or(&existing.answer),
                    )?;
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Answer {} updated.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Answer not found"))?
                    );
                } else {
                    println!("Answer not found.");
                }
            }

            AnswerCommands::Delete { id } => {
                if db.delete_answer(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Answer {} deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Answer not found"))?
                    );
                } else {
                    println!("Answer not found.");
                }
            }
        },

        Commands::Categories => {
            let categories = db.categories()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&categories))?);
            } else if categories.is_empty() {
                println!("No categories found.");
            } else {
                for category in categories {
                    println!("{}", category);
                }
            }
        }

        Commands::Assessment(assessment_cmd) => match assessment_cmd {
            AssessmentCommands::Create {
                client_id,
                qtype,
                name,
            } => {
                let qtype = parse_qtype(&qtype)?;
                let id = db.create_assessment(client_id, qtype, &name)?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "name": name
                        })))?
                    );
                } else {
                    println!("Created assessment '{}' with ID: {}", name, id);
                }
            }

            AssessmentCommands::List { client } => {
                let assessments = db.list_assessments(client)?;
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&assessments))?);
                } else if assessments.is_empty() {
                    println!("No assessments found.");
                } else {
                    println!("{:<5} {:<24} {:<12} NAME", "ID", "CLIENT", "TYPE");
                    println!("{}", "-".repeat(75));
                    for a in assessments {
                        println!(
                            "{:<5} {:<24} {:<12} {}",
                            a.id,
                            truncate(&a.client_name, 22),
                            a.qtype.label(),
                            truncate(&a.name, 30)
                        );
                    }
                }
            }

            AssessmentCommands::Show { id } => {
                if let Some(assessment) = db.get_assessment(id)? {
                    let progress = db.progress(id)?;
                    if cli.json {
                        // Includes the recorded choices so a caller can
                        // resume with the existing selections
                        let choices = db.choices_by_assessment(id)?;
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "assessment": assessment,
                                "progress": progress,
                                "choices": choices
                            })))?
                        );
                    } else {
                        println!("Assessment: {}", assessment.name);
                        println!("ID: {}", assessment.id);
                        println!("Client: {}", assessment.client_name);
                        println!("Type: {}", assessment.qtype.label());
                        println!("Created: {}", assessment.created_at);
                        println!();
                        println!(
                            "Progress: {}/{} questions ({:.0}%){}",
                            progress.answered,
                            progress.total,
                            progress.percent(),
                            if progress.complete { " - complete" } else { "" }
                        );
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Assessment not found"))?
                    );
                } else {
                    println!("Assessment not found.");
                }
            }

            AssessmentCommands::Delete { id } => {
                if db.delete_assessment(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Assessment {} and its choices deleted.", id);
                    }
                } else if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("Assessment not found"))?
                    );
                } else {
                    println!("Assessment not found.");
                }
            }
        },

        Commands::Record {
            assessment_id,
            question_id,
            actual,
            desired,
        } => {
            db.record_choice(assessment_id, question_id, actual, desired)?;
            let progress = db.progress(assessment_id)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                        "progress": progress
                    })))?
                );
            } else {
                println!("Recorded choice for question {}.", question_id);
                println!(
                    "Progress: {}/{} questions answered{}",
                    progress.answered,
                    progress.total,
                    if progress.complete {
                        " - assessment complete"
                    } else {
                        ""
                    }
                );
            }
        }

        Commands::Report {
            assessment_id,
            category,
            gaps_only,
        } => {
            if let Some(assessment) = db.get_assessment(assessment_id)? {
                let rows = db.assessment_results(assessment_id)?;
                let gap_report = report::build_report(rows);

                if cli.json {
                    let detail = category.as_deref().map(|c| {
                        report::category_detail(&gap_report.rows, c, gaps_only)
                            .into_iter()
                            .cloned()
                            .collect::<Vec<_>>()
                    });
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "assessment": assessment,
                            "report": gap_report,
                            "detail": detail
                        })))?
                    );
                } else {
                    println!("=== Gap Report: {} ===", assessment.name);
                    println!(
                        "Client: {} ({} assessment)",
                        assessment.client_name,
                        assessment.qtype.label()
                    );
                    println!();

                    if gap_report.is_empty() {
                        println!("No choices recorded yet for this assessment.");
                    } else {
                        println!("Total actual score:   {}", gap_report.summary.total_actual);
                        println!("Total required score: {}", gap_report.summary.total_desired);
                        println!("Overall gap:          {}", gap_report.summary.total_gap);
                        println!();

                        println!(
                            "{:<24} {:>8} {:>10} {:>6} {:>8}",
                            "CATEGORY", "ACTUAL", "REQUIRED", "GAP", "GAP%"
                        );
                        println!("{}", "-".repeat(60));
                        for cat in &gap_report.categories {
                            println!(
                                "{:<24} {:>8} {:>10} {:>6} {:>8}",
                                truncate(&cat.category, 22),
                                cat.actual_sum,
                                cat.desired_sum,
                                cat.gap_sum,
                                fmt_percentage(cat.gap_percentage)
                            );
                        }

                        if let Some(category) = category {
                            println!();
                            println!("--- {} ---", category);
                            let detail =
                                report::category_detail(&gap_report.rows, &category, gaps_only);
                            if detail.is_empty() {
                                println!("No matching questions.");
                            }
                            for row in detail {
                                println!("[gap {}] {}", row.gap, row.question);
                                println!(
                                    "    actual:   {} ({})",
                                    row.actual_answer, row.actual_score
                                );
                                println!(
                                    "    required: {} ({})",
                                    row.desired_answer, row.desired_score
                                );
                            }
                        }
                    }
                }
            } else if cli.json {
                println!(
                    "{}",
                    serde_json::to_string(&JsonOutput::<()>::err("Assessment not found"))?
                );
            } else {
                println!("Assessment not found.");
            }
        }

        Commands::Export {
            assessment_id,
            output,
        } => {
            let rows = db.assessment_results(assessment_id)?;
            let scored = report::build_report(rows).rows;
            let csv = report::to_csv(&scored);

            match output {
                Some(path) => {
                    std::fs::write(&path, &csv)?;
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "path": path,
                                "rows": scored.len()
                            })))?
                        );
                    } else {
                        println!("Exported {} rows to {}", scored.len(), path.display());
                    }
                }
                None => {
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                                "csv": csv
                            })))?
                        );
                    } else {
                        print!("{}", csv);
                    }
                }
            }
        }
    }

    Ok(())
}

fn fmt_percentage(p: Option<f64>) -> String {
    match p {
        Some(v) => format!("{:.1}", v),
        None => String::from("n/a"),
    }
}

// Counts chars, not bytes, so multibyte text never splits mid-character.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

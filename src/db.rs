use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{
    Answer, Assessment, AssessmentProgress, Choice, Client, Question, QuestionType, ResultRow,
};

pub struct Database {
    conn: Connection,
}

// A qtype value the schema's CHECK constraint would reject can still reach
// us through a database written by other tooling. Surface it as a
// conversion error instead of coercing it to a default.
fn parse_stored_qtype(qtype_str: &str, column: usize) -> rusqlite::Result<QuestionType> {
    QuestionType::from_str(qtype_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid qtype '{}'", qtype_str).into(),
        )
    })
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                csequence INTEGER NOT NULL DEFAULT 0,
                category TEXT NOT NULL DEFAULT 'General',
                qtype TEXT NOT NULL DEFAULT 'org' CHECK(qtype IN ('org', 'action')),
                qsequence INTEGER NOT NULL DEFAULT 0,
                question TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS answers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question_id INTEGER NOT NULL REFERENCES questions(id),
                score INTEGER NOT NULL,
                answer TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assessments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id INTEGER NOT NULL REFERENCES clients(id),
                qtype TEXT NOT NULL DEFAULT 'org' CHECK(qtype IN ('org', 'action')),
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS choices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                assessment_id INTEGER NOT NULL REFERENCES assessments(id),
                answer_id_desired INTEGER NOT NULL REFERENCES answers(id),
                answer_id_actual INTEGER NOT NULL REFERENCES answers(id)
            );

            CREATE INDEX IF NOT EXISTS idx_questions_qtype ON questions(qtype, csequence, qsequence);
            CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id);
            CREATE INDEX IF NOT EXISTS idx_assessments_client ON assessments(client_id);
            CREATE INDEX IF NOT EXISTS idx_choices_assessment ON choices(assessment_id);
            "#,
        )?;

        Ok(())
    }

    // Client operations
    pub fn add_client(&self, name: &str) -> Result<i64> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO clients (name, created_at) VALUES (?1, ?2)",
            params![name, now.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_client(&self, id: i64) -> Result<Option<Client>> {
        let client = self.conn.query_row(
            "SELECT id, name, created_at FROM clients WHERE id = ?1",
            params![id],
            |row| {
                Ok(Client {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    created_at: row.get(2)?,
                })
            },
        );

        match client {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM clients ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Client {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // Question catalog operations
    pub fn add_question(
        &self,
        category: &str,
        qtype: QuestionType,
        csequence: i64,
        qsequence: i64,
        question: &str,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO questions (category, qtype, csequence, qsequence, question)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![category, qtype.as_str(), csequence, qsequence, question],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let question = self.conn.query_row(
            "SELECT id, csequence, category, qtype, qsequence, question
             FROM questions WHERE id = ?1",
            params![id],
            Self::map_question,
        );

        match question {
            Ok(q) => Ok(Some(q)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_questions(
        &self,
        qtype: Option<QuestionType>,
        category: Option<&str>,
    ) -> Result<Vec<Question>> {
        let mut query = String::from(
            "SELECT id, csequence, category, qtype, qsequence, question FROM questions",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(t) = qtype {
            params_vec.push(Box::new(t.as_str().to_string()));
            clauses.push(format!("qtype = ?{}", params_vec.len()));
        }
        if let Some(c) = category {
            params_vec.push(Box::new(c.to_string()));
            clauses.push(format!("category = ?{}", params_vec.len()));
        }
        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY qtype, csequence, qsequence");

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), Self::map_question)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_question(
        &self,
        id: i64,
        category: &str,
        qtype: QuestionType,
        csequence: i64,
        qsequence: i64,
        question: &str,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE questions
             SET category = ?1, qtype = ?2, csequence = ?3, qsequence = ?4, question = ?5
             WHERE id = ?6",
            params![category, qtype.as_str(), csequence, qsequence, question, id],
        )?;
        Ok(rows > 0)
    }

    /// Removes a question and its answers as one transaction, so a failure
    /// cannot leave the answers behind without their question.
    pub fn delete_question(&self, id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM answers WHERE question_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM questions WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM questions ORDER BY category")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn map_question(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
        let qtype_str: String = row.get(3)?;
        Ok(Question {
            id: row.get(0)?,
            csequence: row.get(1)?,
            category: row.get(2)?,
            qtype: parse_stored_qtype(&qtype_str, 3)?,
            qsequence: row.get(4)?,
            question: row.get(5)?,
        })
    }

    // Answer operations
    pub fn add_answer(&self, question_id: i64, score: i64, answer: &str) -> Result<i64> {
        if self.get_question(question_id)?.is_none() {
            return Err(Error::not_found("question", question_id));
        }
        self.conn.execute(
            "INSERT INTO answers (question_id, score, answer) VALUES (?1, ?2, ?3)",
            params![question_id, score, answer],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_answer(&self, id: i64) -> Result<Option<Answer>> {
        let answer = self.conn.query_row(
            "SELECT id, question_id, score, answer FROM answers WHERE id = ?1",
            params![id],
            |row| {
                Ok(Answer {
                    id: row.get(0)?,
                    question_id: row.get(1)?,
                    score: row.get(2)?,
                    answer: row.get(3)?,
                })
            },
        );

        match answer {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn answers_by_question(&self, question_id: i64) -> Result<Vec<Answer>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, question_id, score, answer
             FROM answers
             WHERE question_id = ?1
             ORDER BY score",
        )?;

        let rows = stmt.query_map(params![question_id], |row| {
            Ok(Answer {
                id: row.get(0)?,
                question_id: row.get(1)?,
                score: row.get(2)?,
                answer: row.get(3)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update_answer(&self, id: i64, score: i64, answer: &str) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE answers SET score = ?1, answer = ?2 WHERE id = ?3",
            params![score, answer, id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_answer(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM answers WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Assessment operations
    pub fn create_assessment(
        &self,
        client_id: i64,
        qtype: QuestionType,
        name: &str,
    ) -> Result<i64> {
        if self.get_client(client_id)?.is_none() {
            return Err(Error::not_found("client", client_id));
        }
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO assessments (client_id, qtype, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![client_id, qtype.as_str(), name, now.to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_assessment(&self, id: i64) -> Result<Option<Assessment>> {
        let assessment = self.conn.query_row(
            r#"
            SELECT a.id, a.client_id, a.qtype, a.name, c.name, a.created_at
            FROM assessments a
            JOIN clients c ON a.client_id = c.id
            WHERE a.id = ?1
            "#,
            params![id],
            Self::map_assessment,
        );

        match assessment {
            Ok(a) => Ok(Some(a)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_assessments(&self, client_id: Option<i64>) -> Result<Vec<Assessment>> {
        let base = r#"
            SELECT a.id, a.client_id, a.qtype, a.name, c.name, a.created_at
            FROM assessments a
            JOIN clients c ON a.client_id = c.id
        "#;

        let (query, params_vec): (String, Vec<Box<dyn rusqlite::ToSql>>) =
            if let Some(cid) = client_id {
                (
                    format!("{} WHERE a.client_id = ?1 ORDER BY a.id", base),
                    vec![Box::new(cid)],
                )
            } else {
                (format!("{} ORDER BY a.id", base), vec![])
            };

        let mut stmt = self.conn.prepare(&query)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), Self::map_assessment)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Removes an assessment and its choices as one transaction.
    pub fn delete_assessment(&self, id: i64) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM choices WHERE assessment_id = ?1", params![id])?;
        let rows = tx.execute("DELETE FROM assessments WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    fn map_assessment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assessment> {
        let qtype_str: String = row.get(2)?;
        Ok(Assessment {
            id: row.get(0)?,
            client_id: row.get(1)?,
            qtype: parse_stored_qtype(&qtype_str, 2)?,
            name: row.get(3)?,
            client_name: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    // Choice operations
    /// Records the actual/required answer pair for one question, replacing
    /// any earlier choice for the same question in the same transaction.
    /// Both answers must belong to the stated question.
    pub fn record_choice(
        &self,
        assessment_id: i64,
        question_id: i64,
        actual_answer_id: i64,
        desired_answer_id: i64,
    ) -> Result<i64> {
        let assessment = self
            .get_assessment(assessment_id)?
            .ok_or(Error::not_found("assessment", assessment_id))?;
        let question = self
            .get_question(question_id)?
            .ok_or(Error::not_found("question", question_id))?;
        if question.qtype != assessment.qtype {
            return Err(Error::QtypeMismatch {
                question_id,
                question_qtype: question.qtype.as_str(),
                assessment_id,
                assessment_qtype: assessment.qtype.as_str(),
            });
        }
        for answer_id in [actual_answer_id, desired_answer_id] {
            let answer = self
                .get_answer(answer_id)?
                .ok_or(Error::not_found("answer", answer_id))?;
            if answer.question_id != question_id {
                return Err(Error::WrongQuestion {
                    answer_id,
                    question_id,
                });
            }
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r#"
            DELETE FROM choices WHERE id IN (
                SELECT c.id
                FROM choices c
                JOIN answers a ON c.answer_id_actual = a.id
                WHERE c.assessment_id = ?1 AND a.question_id = ?2
            )
            "#,
            params![assessment_id, question_id],
        )?;
        tx.execute(
            "INSERT INTO choices (assessment_id, answer_id_desired, answer_id_actual)
             VALUES (?1, ?2, ?3)",
            params![assessment_id, desired_answer_id, actual_answer_id],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn choices_by_assessment(&self, assessment_id: i64) -> Result<Vec<Choice>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.assessment_id, a_actual.question_id,
                   c.answer_id_desired, c.answer_id_actual,
                   a_actual.score, a_desired.score
            FROM choices c
            JOIN answers a_actual ON c.answer_id_actual = a_actual.id
            JOIN answers a_desired ON c.answer_id_desired = a_desired.id
            WHERE c.assessment_id = ?1
            "#,
        )?;

        let rows = stmt.query_map(params![assessment_id], |row| {
            Ok(Choice {
                id: row.get(0)?,
                assessment_id: row.get(1)?,
                question_id: row.get(2)?,
                answer_id_desired: row.get(3)?,
                answer_id_actual: row.get(4)?,
                actual_score: row.get(5)?,
                desired_score: row.get(6)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The gap engine's input feed: one joined row per recorded choice,
    /// in catalog order. A missing assessment is NotFound; an existing
    /// assessment with no choices is an empty (valid) result set.
    pub fn assessment_results(&self, assessment_id: i64) -> Result<Vec<ResultRow>> {
        if self.get_assessment(assessment_id)?.is_none() {
            return Err(Error::not_found("assessment", assessment_id));
        }
        self.check_choice_integrity(assessment_id)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT q.category, q.question,
                   a_actual.answer, a_actual.score,
                   a_desired.answer, a_desired.score
            FROM choices c
            JOIN answers a_actual ON c.answer_id_actual = a_actual.id
            JOIN answers a_desired ON c.answer_id_desired = a_desired.id
            JOIN questions q ON a_actual.question_id = q.id
            WHERE c.assessment_id = ?1
            ORDER BY q.csequence, q.qsequence
            "#,
        )?;

        let rows = stmt.query_map(params![assessment_id], |row| {
            Ok(ResultRow {
                category: row.get(0)?,
                question: row.get(1)?,
                actual_answer: row.get(2)?,
                actual_score: row.get(3)?,
                desired_answer: row.get(4)?,
                desired_score: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // An inner join would silently drop choices whose answer references
    // dangle (or straddle two questions); surface them instead.
    fn check_choice_integrity(&self, assessment_id: i64) -> Result<()> {
        let bad = self.conn.query_row(
            r#"
            SELECT c.id
            FROM choices c
            LEFT JOIN answers a_actual ON c.answer_id_actual = a_actual.id
            LEFT JOIN answers a_desired ON c.answer_id_desired = a_desired.id
            LEFT JOIN questions q ON a_actual.question_id = q.id
            WHERE c.assessment_id = ?1
              AND (a_actual.id IS NULL OR a_desired.id IS NULL OR q.id IS NULL
                   OR a_actual.question_id != a_desired.question_id)
            LIMIT 1
            "#,
            params![assessment_id],
            |row| row.get::<_, i64>(0),
        );

        match bad {
            Ok(choice_id) => Err(Error::IntegrityViolation { choice_id }),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Completion state: answered question count against the catalog of the
    /// assessment's qtype.
    pub fn progress(&self, assessment_id: i64) -> Result<AssessmentProgress> {
        let assessment = self
            .get_assessment(assessment_id)?
            .ok_or(Error::not_found("assessment", assessment_id))?;

        let total: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM questions WHERE qtype = ?1",
            params![assessment.qtype.as_str()],
            |row| row.get(0),
        )?;

        let answered: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(DISTINCT a.question_id)
            FROM choices c
            JOIN answers a ON c.answer_id_actual = a.id
            WHERE c.assessment_id = ?1
            "#,
            params![assessment_id],
            |row| row.get(0),
        )?;

        Ok(AssessmentProgress {
            answered,
            total,
            complete: total > 0 && answered >= total,
        })
    }

    /// Loads the starter catalog (two sample clients plus the org and
    /// action question sets, four scored answers each). Skipped when any
    /// client already exists; returns whether anything was written.
    pub fn seed(&self) -> Result<bool> {
        let clients: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?;
        if clients > 0 {
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        let now = Utc::now().to_rfc3339();

        for name in ["Sample Organization", "Test Company"] {
            tx.execute(
                "INSERT INTO clients (name, created_at) VALUES (?1, ?2)",
                params![name, now],
            )?;
        }

        for (qtype, questions, answers) in [
            (QuestionType::Org, ORG_QUESTIONS, ORG_ANSWER_SET),
            (QuestionType::Action, ACTION_QUESTIONS, ACTION_ANSWER_SET),
        ] {
            for (csequence, category, qsequence, question) in questions {
                tx.execute(
                    "INSERT INTO questions (csequence, category, qtype, qsequence, question)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![csequence, category, qtype.as_str(), qsequence, question],
                )?;
                let question_id = tx.last_insert_rowid();
                for (score, answer) in answers {
                    tx.execute(
                        "INSERT INTO answers (question_id, score, answer) VALUES (?1, ?2, ?3)",
                        params![question_id, score, answer],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(true)
    }
}

const ORG_QUESTIONS: &[(i64, &str, i64, &str)] = &[
    (1, "Leadership", 1, "How would you rate the organization's leadership clarity?"),
    (1, "Leadership", 2, "How effective is the decision-making process?"),
    (2, "Strategy", 1, "Does the organization have a clear strategic direction?"),
    (2, "Strategy", 2, "How well is the strategy communicated throughout the organization?"),
    (3, "Operations", 1, "How efficient are the organization's operational processes?"),
    (3, "Operations", 2, "Are there documented procedures for key operations?"),
];

const ORG_ANSWER_SET: &[(i64, &str)] = &[
    (1, "Poor - Significant improvement needed"),
    (2, "Fair - Some elements in place but gaps exist"),
    (3, "Good - Most elements in place, minor improvements needed"),
    (4, "Excellent - Fully developed and effective"),
];

const ACTION_QUESTIONS: &[(i64, &str, i64, &str)] = &[
    (1, "Risk", 1, "What is the level of risk associated with this action?"),
    (1, "Risk", 2, "Are there mitigation strategies in place?"),
    (2, "Resources", 1, "Are adequate resources available for this action?"),
    (2, "Resources", 2, "Is there a clear resource allocation plan?"),
    (3, "Timeline", 1, "Is the timeline realistic for implementation?"),
    (3, "Timeline", 2, "Are there clear milestones and checkpoints?"),
];

const ACTION_ANSWER_SET: &[(i64, &str)] = &[
    (1, "Not addressed - Major concerns"),
    (2, "Partially addressed - Some concerns remain"),
    (3, "Mostly addressed - Minor concerns"),
    (4, "Fully addressed - No concerns"),
];

use thiserror::Error;

/// Failures surfaced by the repository layer. The scoring engine itself is
/// pure and never fails; a zero required-sum is folded into a `None`
/// percentage long before it could become a division error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("answer {answer_id} does not belong to question {question_id}")]
    WrongQuestion { answer_id: i64, question_id: i64 },

    #[error(
        "question {question_id} ({question_qtype}) does not match assessment {assessment_id} ({assessment_qtype})"
    )]
    QtypeMismatch {
        question_id: i64,
        question_qtype: &'static str,
        assessment_id: i64,
        assessment_qtype: &'static str,
    },

    // A choice row whose answer references are dangling or point at two
    // different questions. Never coerced to zero scores.
    #[error("choice {choice_id} references a missing or mismatched answer")]
    IntegrityViolation { choice_id: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let e = Error::not_found("assessment", 42);
        assert_eq!(e.to_string(), "assessment 42 not found");
    }

    #[test]
    fn qtype_mismatch_message_names_both_sides() {
        let e = Error::QtypeMismatch {
            question_id: 5,
            question_qtype: "action",
            assessment_id: 2,
            assessment_qtype: "org",
        };
        assert_eq!(
            e.to_string(),
            "question 5 (action) does not match assessment 2 (org)"
        );
    }

    #[test]
    fn wrong_question_message() {
        let e = Error::WrongQuestion {
            answer_id: 7,
            question_id: 3,
        };
        assert_eq!(e.to_string(), "answer 7 does not belong to question 3");
    }

    #[test]
    fn db_error_wraps_rusqlite() {
        let e = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(e.to_string().starts_with("database error:"));
    }
}

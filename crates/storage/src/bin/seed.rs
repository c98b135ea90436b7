//! Seeds a demo question bank: one set per difficulty level for a topic,
//! with a handful of arithmetic questions each.

use std::fmt;

use quiz_core::model::{DifficultyLevel, Question, QuestionId, QuestionSet, SetId, TopicId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    topic_id: TopicId,
    questions_per_set: u32,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTopicId { raw: String },
    InvalidQuestions { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTopicId { raw } => write!(f, "invalid --topic-id value: {raw}"),
            ArgsError::InvalidQuestions { raw } => write!(f, "invalid --questions value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("QUIZ_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut topic_id = std::env::var("QUIZ_TOPIC_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| TopicId::new(1), TopicId::new);
        let mut questions_per_set = 8_u32;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    db_url = require_value(&mut args, "--db")?;
                }
                "--topic-id" => {
                    let raw = require_value(&mut args, "--topic-id")?;
                    topic_id = raw
                        .parse::<u64>()
                        .map(TopicId::new)
                        .map_err(|_| ArgsError::InvalidTopicId { raw })?;
                }
                "--questions" => {
                    let raw = require_value(&mut args, "--questions")?;
                    questions_per_set = raw
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidQuestions { raw })?;
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            topic_id,
            questions_per_set,
        })
    }
}

fn build_question(id: u64, set_id: SetId, a: u64, b: u64) -> Question {
    let sum = a + b;
    let options = vec![
        sum.to_string(),
        (sum + 1).to_string(),
        (sum + 2).to_string(),
        sum.saturating_sub(1).to_string(),
    ];
    Question::new(
        QuestionId::new(id),
        set_id,
        format!("{a} + {b} = ?"),
        options,
        sum.to_string(),
        1,
    )
    .expect("seed question should be valid")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse()?;
    let storage = Storage::sqlite(&args.db_url).await?;

    let mut question_id = args.topic_id.value() * 1_000;
    for (i, difficulty) in DifficultyLevel::ALL.into_iter().enumerate() {
        let set_id = SetId::new(args.topic_id.value() * 10 + i as u64 + 1);
        let set = QuestionSet::new(
            set_id,
            args.topic_id,
            difficulty,
            3,
            args.questions_per_set,
            QuestionSet::DEFAULT_SUCCESS_THRESHOLD,
        )?;
        storage.bank.upsert_set(&set).await?;

        for n in 0..args.questions_per_set {
            question_id += 1;
            let scale = (i as u64 + 1) * 10;
            let question = build_question(
                question_id,
                set_id,
                scale + u64::from(n),
                scale + u64::from(n) * 2 + 1,
            );
            storage.bank.upsert_question(&question).await?;
        }

        println!(
            "seeded set {set_id} ({difficulty}) with {} questions",
            args.questions_per_set
        );
    }

    println!(
        "question bank ready for topic {} in {}",
        args.topic_id, args.db_url
    );
    Ok(())
}

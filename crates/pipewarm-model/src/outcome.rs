/// The per-entry event reported to a `ProgressSink` as the engine walks the
/// DAG. Distinct from `Status`: an entry may be reported `parsed` long
/// before it reaches `created`, and `failed` covers both parse and create
/// invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Parsed,
    Created,
    Failed,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Parsed => "parsed",
            Outcome::Created => "created",
            Outcome::Failed => "failed",
        }
    }
}

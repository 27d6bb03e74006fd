//! Ingestion pipeline services

pub mod counter_process;
pub mod normalizer;
pub mod orchestrator;
pub mod source_locator;
pub mod vision_client;

pub use counter_process::{CounterError, CounterRunner};
pub use orchestrator::IngestOrchestrator;
pub use vision_client::{VisionClient, VisionError};

/// Coerce a JSON value into a finite count, accepting numbers and numeric
/// strings (models occasionally quote the count field).
pub(crate) fn numeric_count(value: Option<&serde_json::Value>) -> Option<f64> {
    match value? {
        serde_json::Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        assert_eq!(numeric_count(Some(&json!(3))), Some(3.0));
        assert_eq!(numeric_count(Some(&json!(2.5))), Some(2.5));
        assert_eq!(numeric_count(Some(&json!("14"))), Some(14.0));
        assert_eq!(numeric_count(Some(&json!(" 7 "))), Some(7.0));
    }

    #[test]
    fn rejects_everything_else() {
        assert_eq!(numeric_count(None), None);
        assert_eq!(numeric_count(Some(&json!(null))), None);
        assert_eq!(numeric_count(Some(&json!("several"))), None);
        assert_eq!(numeric_count(Some(&json!([3]))), None);
        assert_eq!(numeric_count(Some(&json!({"n": 3}))), None);
    }
}

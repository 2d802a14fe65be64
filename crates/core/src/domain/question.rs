use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub String);

/// One free-form question, immutable once received.
///
/// `attachment` is a bare file name; the attachment fetcher guarantees the
/// referenced bytes exist under the configured attachments directory before
/// the reasoning loop starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: QuestionId(id.into()), text: text.into(), attachment: None }
    }

    pub fn with_attachment(mut self, file_name: impl Into<String>) -> Self {
        self.attachment = Some(file_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Question;

    #[test]
    fn attachment_round_trips_through_json() {
        let question = Question::new("q-1", "What is in the spreadsheet?")
            .with_attachment("data.xlsx");

        let encoded = serde_json::to_string(&question).expect("serialize question");
        let decoded: Question = serde_json::from_str(&encoded).expect("deserialize question");
        assert_eq!(decoded, question);
    }

    #[test]
    fn missing_attachment_is_omitted_from_json() {
        let question = Question::new("q-2", "What is 2+2?");
        let encoded = serde_json::to_string(&question).expect("serialize question");
        assert!(!encoded.contains("attachment"));
    }
}

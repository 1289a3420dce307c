//! Structured questions and answers exchanged through `ask_questions`.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One selectable option of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionRepr")]
pub struct QuestionOption {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Options may arrive as bare strings or as `{label, description}` objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum OptionRepr {
    Label(String),
    Full {
        label: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl From<OptionRepr> for QuestionOption {
    fn from(repr: OptionRepr) -> Self {
        match repr {
            OptionRepr::Label(label) => QuestionOption {
                label,
                description: None,
            },
            OptionRepr::Full { label, description } => QuestionOption { label, description },
        }
    }
}

fn default_required() -> bool {
    true
}

/// A question the agent wants the human to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,

    /// Short label shown above the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,

    #[serde(default)]
    pub options: Vec<QuestionOption>,

    /// Allow more than one option to be selected
    #[serde(default)]
    pub multi_select: bool,

    /// Forward navigation is blocked until a required question has an answer
    #[serde(default = "default_required")]
    pub required: bool,
}

impl Question {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            header: None,
            options: Vec::new(),
            multi_select: false,
            required: true,
        }
    }

    pub fn with_options<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = labels
            .into_iter()
            .map(|label| QuestionOption {
                label: label.into(),
                description: None,
            })
            .collect();
        self
    }

    pub fn multi(mut self) -> Self {
        self.multi_select = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// An empty answer slot of the right shape for this question.
    pub fn empty_answer(&self) -> Answer {
        if self.multi_select {
            Answer::Choices(Vec::new())
        } else {
            Answer::Text(String::new())
        }
    }

    /// Check an answer against this question.
    pub fn validate(&self, answer: &Answer) -> Result<()> {
        if self.required && answer.is_empty() {
            return Err(Error::Validation(format!(
                "an answer is required for \"{}\"",
                self.question
            )));
        }
        if let Answer::Choices(choices) = answer {
            if !self.multi_select && choices.len() > 1 {
                return Err(Error::Validation(format!(
                    "\"{}\" accepts a single answer",
                    self.question
                )));
            }
            if let Some(unknown) = choices
                .iter()
                .find(|c| !self.options.iter().any(|o| &o.label == *c))
            {
                return Err(Error::Validation(format!(
                    "'{}' is not an option of \"{}\"",
                    unknown, self.question
                )));
            }
        }
        Ok(())
    }
}

/// A human answer: free text (or a single chosen label), or a set of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Choices(Vec<String>),
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        match self {
            Answer::Text(text) => text.trim().is_empty(),
            Answer::Choices(choices) => choices.is_empty(),
        }
    }

    /// Toggle `label` in a multi-select answer, keeping option order.
    pub fn toggle(&mut self, label: &str, options: &[QuestionOption]) {
        let Answer::Choices(choices) = self else {
            *self = Answer::Choices(vec![label.to_string()]);
            return;
        };
        if let Some(pos) = choices.iter().position(|c| c == label) {
            choices.remove(pos);
        } else {
            choices.push(label.to_string());
            choices.sort_by_key(|c| {
                options
                    .iter()
                    .position(|o| &o.label == c)
                    .unwrap_or(usize::MAX)
            });
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        match self {
            Answer::Text(text) => text == label,
            Answer::Choices(choices) => choices.iter().any(|c| c == label),
        }
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Text(text) => write!(f, "{}", text),
            Answer::Choices(choices) => write!(f, "{}", choices.join(", ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_accepts_bare_string_options() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "question": "Pick a color",
            "options": ["Red", {"label": "Blue", "description": "calm"}]
        }))
        .unwrap();
        assert_eq!(q.options[0].label, "Red");
        assert_eq!(q.options[1].description.as_deref(), Some("calm"));
        assert!(q.required);
        assert!(!q.multi_select);
    }

    #[test]
    fn test_empty_answer_shape_follows_multi_select() {
        assert_eq!(Question::new("q").empty_answer(), Answer::Text(String::new()));
        assert_eq!(
            Question::new("q").multi().empty_answer(),
            Answer::Choices(vec![])
        );
    }

    #[test]
    fn test_validate_required() {
        let q = Question::new("Name?");
        assert!(q.validate(&Answer::Text("   ".into())).is_err());
        assert!(q.validate(&Answer::Text("Ada".into())).is_ok());
        assert!(q.optional().validate(&Answer::Text(String::new())).is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_choice() {
        let q = Question::new("Pick").with_options(["A", "B"]).multi();
        assert!(q.validate(&Answer::Choices(vec!["A".into()])).is_ok());
        assert!(q.validate(&Answer::Choices(vec!["C".into()])).is_err());
    }

    #[test]
    fn test_toggle_keeps_option_order() {
        let q = Question::new("Pick").with_options(["A", "B", "C"]).multi();
        let mut answer = q.empty_answer();
        answer.toggle("C", &q.options);
        answer.toggle("A", &q.options);
        assert_eq!(answer, Answer::Choices(vec!["A".into(), "C".into()]));
        answer.toggle("A", &q.options);
        assert_eq!(answer, Answer::Choices(vec!["C".into()]));
    }

    #[test]
    fn test_answers_serialize_untagged() {
        let answers = vec![
            Answer::Text("Red".into()),
            Answer::Choices(vec!["A".into(), "B".into()]),
        ];
        assert_eq!(
            serde_json::to_value(&answers).unwrap(),
            serde_json::json!(["Red", ["A", "B"]])
        );
    }
}

//! Structured-summary requester
//!
//! Asks the language model to reformat a conversation transcript into a
//! FHIR-shaped document: the prompt concatenates a fixed instruction, the
//! transcript as `role: text` lines, and a target-schema skeleton as literal
//! example JSON. The raw reply goes through the response unwrapper; a failed
//! parse reports an error and leaves any previously generated summary alone.

use crate::extract::{self, ParseError};
use crate::llm::{self, ChatProvider, ProviderRequest, TransportError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Which clinical-record fragment to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryKind {
    Condition,
    Questionnaire,
    QuestionnaireResponse,
}

impl SummaryKind {
    /// Expected top-level `resourceType` of a conforming document
    pub fn resource_type(self) -> &'static str {
        match self {
            SummaryKind::Condition => "Condition",
            SummaryKind::Questionnaire => "Questionnaire",
            SummaryKind::QuestionnaireResponse => "QuestionnaireResponse",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            SummaryKind::Condition => {
                "Please extract the relevant symptom information from the following conversation and map it to FHIR data structures:"
            }
            SummaryKind::Questionnaire => {
                "Please create a FHIR Questionnaire resource based on the following conversation. The Questionnaire should capture the relevant symptom information discussed in the conversation. Each question should correspond to a specific symptom-related detail, such as the symptom description, severity, duration, associated symptoms, and aggravating factors."
            }
            SummaryKind::QuestionnaireResponse => {
                "Please create a FHIR QuestionnaireResponse resource based on the following conversation. The QuestionnaireResponse should capture the questions asked by the chatbot and the corresponding answers provided by the user. Each item should represent a question-answer pair."
            }
        }
    }

    /// Target-schema skeleton embedded in the prompt as literal example JSON
    pub fn skeleton(self) -> &'static str {
        match self {
            SummaryKind::Condition => CONDITION_SKELETON,
            SummaryKind::Questionnaire => QUESTIONNAIRE_SKELETON,
            SummaryKind::QuestionnaireResponse => QUESTIONNAIRE_RESPONSE_SKELETON,
        }
    }
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SummaryKind::Condition => "condition",
            SummaryKind::Questionnaire => "questionnaire",
            SummaryKind::QuestionnaireResponse => "questionnaire-response",
        };
        f.write_str(s)
    }
}

impl FromStr for SummaryKind {
    type Err = UnknownSummaryKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "condition" => Ok(SummaryKind::Condition),
            "questionnaire" => Ok(SummaryKind::Questionnaire),
            "questionnaire-response" => Ok(SummaryKind::QuestionnaireResponse),
            _ => Err(UnknownSummaryKind(s.to_string())),
        }
    }
}

/// Unrecognized summary kind in a request path
#[derive(Debug, Error)]
#[error("unknown summary kind: {0} (expected condition, questionnaire, or questionnaire-response)")]
pub struct UnknownSummaryKind(pub String);

/// Why a summary attempt produced no document
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Build the full summary prompt for a rendered transcript.
pub fn build_prompt(kind: SummaryKind, transcript: &str) -> String {
    format!(
        "{}\n\n{transcript}\n\nDesired output format:\n\n{}\n\nReturn only the JSON document.",
        kind.instruction(),
        kind.skeleton()
    )
}

/// Request a structured summary of `transcript` from `provider`.
///
/// One non-streaming request, then the unwrapper. A document whose
/// `resourceType` does not match the target is still returned, with a
/// warning; no shape invariant is enforced beyond "parses as JSON".
///
/// # Errors
///
/// [`SummaryError::Transport`] when the provider call fails,
/// [`SummaryError::Parse`] when the reply is not decodable JSON.
pub async fn request_summary(
    provider: &dyn ChatProvider,
    transcript: &str,
    kind: SummaryKind,
) -> Result<Value, SummaryError> {
    let request = ProviderRequest::single_prompt(build_prompt(kind, transcript));
    let reply = llm::complete_with_retry(provider, &request, llm::MAX_ATTEMPTS).await?;
    let doc = extract::unwrap_json(&reply.text)?;

    let resource_type = doc.get("resourceType").and_then(Value::as_str);
    if resource_type != Some(kind.resource_type()) {
        tracing::warn!(
            expected = kind.resource_type(),
            got = resource_type.unwrap_or("<missing>"),
            "Summary resourceType does not match target"
        );
    }

    Ok(doc)
}

const CONDITION_SKELETON: &str = r#"{
  "resourceType": "Condition",
  "code": {
    "coding": [
      {
        "system": "http://snomed.info/sct",
        "code": "SNOMED_CT_CODE",
        "display": "SYMPTOM_NAME"
      }
    ],
    "text": "SYMPTOM_NAME"
  },
  "subject": {
    "reference": "Patient/PATIENT_ID"
  },
  "severity": {
    "coding": [
      {
        "system": "http://snomed.info/sct",
        "code": "SEVERITY_CODE",
        "display": "SEVERITY"
      }
    ],
    "text": "SEVERITY"
  },
  "onsetDateTime": "ONSET_DATETIME"
}"#;

// https://build.fhir.org/questionnaire.html#resource
const QUESTIONNAIRE_SKELETON: &str = r#"{
  "resourceType": "Questionnaire",
  "id": "symptom-questionnaire",
  "title": "Symptom Questionnaire",
  "status": "draft",
  "item": [
    {
      "linkId": "1",
      "text": "QUESTION_TEXT",
      "type": "QUESTION_TYPE",
      "required": true
    }
  ]
}"#;

// https://build.fhir.org/questionnaireresponse.html#resource
const QUESTIONNAIRE_RESPONSE_SKELETON: &str = r#"{
  "resourceType": "QuestionnaireResponse",
  "id": "symptom-questionnaire-response",
  "questionnaire": "Questionnaire/symptom-questionnaire",
  "status": "completed",
  "item": [
    {
      "linkId": "1",
      "text": "QUESTION_TEXT",
      "answer": [
        {
          "valueString": "USER_ANSWER"
        }
      ]
    }
  ]
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ProviderReply, TokenUsage, TransportErrorKind};
    use async_trait::async_trait;
    use serde_json::json;

    struct CannedProvider {
        reply: Result<&'static str, TransportError>,
    }

    impl CannedProvider {
        fn text(reply: &'static str) -> Self {
            Self { reply: Ok(reply) }
        }
    }

    #[async_trait]
    impl ChatProvider for CannedProvider {
        async fn complete(
            &self,
            _request: &ProviderRequest,
        ) -> Result<ProviderReply, TransportError> {
            match &self.reply {
                Ok(text) => Ok(ProviderReply {
                    text: (*text).to_string(),
                    usage: TokenUsage::default(),
                }),
                Err(e) => Err(TransportError::new(e.kind, e.message.clone())),
            }
        }

        fn id(&self) -> &str {
            "canned"
        }
    }

    const TRANSCRIPT: &str = "user: I have a headache\nassistant: How severe?\nuser: 7 out of 10";

    #[test]
    fn skeletons_are_valid_json_with_matching_resource_type() {
        for kind in [
            SummaryKind::Condition,
            SummaryKind::Questionnaire,
            SummaryKind::QuestionnaireResponse,
        ] {
            let doc: serde_json::Value = serde_json::from_str(kind.skeleton()).unwrap();
            assert_eq!(doc["resourceType"], kind.resource_type());
        }
    }

    #[test]
    fn prompt_embeds_transcript_and_skeleton_in_order() {
        let prompt = build_prompt(SummaryKind::Condition, TRANSCRIPT);
        let transcript_at = prompt.find(TRANSCRIPT).unwrap();
        let skeleton_at = prompt.find("\"resourceType\": \"Condition\"").unwrap();
        assert!(transcript_at < skeleton_at);
        assert!(prompt.starts_with("Please extract"));
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            SummaryKind::Condition,
            SummaryKind::Questionnaire,
            SummaryKind::QuestionnaireResponse,
        ] {
            assert_eq!(kind.to_string().parse::<SummaryKind>().unwrap(), kind);
        }
        assert!("prescription".parse::<SummaryKind>().is_err());
    }

    #[tokio::test]
    async fn conforming_reply_yields_condition_document() {
        let provider = CannedProvider::text(
            "Here is the resource:\n```json\n{\"resourceType\": \"Condition\", \"code\": {\"text\": \"Headache\"}}\n```",
        );
        let doc = request_summary(&provider, TRANSCRIPT, SummaryKind::Condition)
            .await
            .unwrap();
        assert_eq!(doc["resourceType"], json!("Condition"));
        assert_eq!(doc["code"]["text"], json!("Headache"));
    }

    #[tokio::test]
    async fn prose_reply_is_a_parse_error() {
        let provider =
            CannedProvider::text("I'm sorry, I couldn't map that conversation to FHIR.");
        let err = request_summary(&provider, TRANSCRIPT, SummaryKind::Condition)
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::Parse(_)));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let provider = CannedProvider {
            reply: Err(TransportError::new(TransportErrorKind::Auth, "bad key")),
        };
        let err = request_summary(&provider, TRANSCRIPT, SummaryKind::Questionnaire)
            .await
            .unwrap_err();
        assert!(matches!(err, SummaryError::Transport(_)));
    }
}

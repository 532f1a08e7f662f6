//! request composer: prompt + optional capsule -> ordered content parts.

use serde::{Deserialize, Serialize};

use crate::capsule::FileCapsule;
use crate::error::ChatError;

/// placeholder shown while an anonymized request is being opened.
pub const ANONYMIZING_NOTICE: &str =
    "Anonimizando documento para proteger dados sensíveis antes de responder...";

const ANONYMIZE_PREFIX: &str = "IMPORTANTE: Primeiro, anonimize o conteúdo do documento fornecido, \
de acordo com a LGPD. Substitua todos os dados pessoais como nomes, CPFs, RGs, endereços, \
e-mails e números de telefone por placeholders como [NOME], [CPF], [ENDEREÇO], etc. \
Após a anonimização, e usando apenas o conteúdo anonimizado, responda à seguinte pergunta: ";

/// wrap the user's question in the redact-first directive.
pub fn anonymize_directive(prompt: &str) -> String {
    format!("{ANONYMIZE_PREFIX}\"{prompt}\"")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    pub mime_type: String,
}

/// one piece of a request, serialized the way the hosted api spells it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: InlineData },
    Text { text: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(capsule: &FileCapsule) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                data: capsule.data.clone(),
                mime_type: capsule.mime_type.clone(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContent {
    pub parts: Vec<Part>,
}

impl RequestContent {
    pub fn text_len(&self) -> usize {
        self.parts.iter().filter_map(Part::as_text).map(str::len).sum()
    }

    pub fn has_file(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::InlineData { .. }))
    }
}

/// file part first (if any), then the text part (if non-empty after trimming).
///
/// `anonymize` only matters when a file is attached.
pub fn compose(
    prompt: &str,
    capsule: Option<&FileCapsule>,
    anonymize: bool,
) -> Result<RequestContent, ChatError> {
    let prompt = prompt.trim();
    if prompt.is_empty() && capsule.is_none() {
        return Err(ChatError::EmptyInput);
    }

    let mut parts = Vec::with_capacity(2);
    if let Some(c) = capsule {
        parts.push(Part::file(c));
    }

    let text = if anonymize && capsule.is_some() {
        anonymize_directive(prompt)
    } else {
        prompt.to_string()
    };
    if !text.is_empty() {
        parts.push(Part::text(text));
    }

    Ok(RequestContent { parts })
}

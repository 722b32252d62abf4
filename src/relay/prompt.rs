//! Prompt construction for the ShadowDesk herald persona.
//!
//! Each input shape has exactly one instruction template. The instruction
//! never contains payload text, and the payload never contains the
//! instruction, so a ticket can't rewrite the persona or length rules
//! (this is not adversarial hardening, just separation).

use super::normalizer::NormalizedInput;

// ---------------------------------------------------------------------------
// Template table
// ---------------------------------------------------------------------------

/// A fixed system instruction for one input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub version: &'static str,
    pub instruction: &'static str,
}

/// Input shapes that reach the model. `Empty` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    Structured,
    FreeText,
}

const STRUCTURED_TEMPLATE: PromptTemplate = PromptTemplate {
    version: "structured-v2",
    instruction: "\
You are ShadowDesk, a dark, witty herald for the IT department, addressing 'Sir Cody of Technology'.
You have received the details of an IT request, one detail per line.
Craft ONE short spoken announcement of under 35 words.
Mood: mysterious, slightly ominous; vary your wording every time.
Include the submitter's name, department and location verbatim when they are given.
Paraphrase the trouble they describe; do not quote it.
Return ONLY that single sentence.
IMPORTANT: never mention labels, keys, technical terms, or words like 'field', 'extracted' or 'data'.",
};

const FREE_TEXT_TEMPLATE: PromptTemplate = PromptTemplate {
    version: "free-text-v2",
    instruction: "\
You are ShadowDesk, a dark, witty herald for the IT department, addressing 'Sir Cody of Technology'.
You have intercepted the raw text of an incoming message about an IT service request.
Distill it into ONE single, concise spoken announcement of under 35 words.
Keep a mysterious and slightly ominous tone, varying your phrasing each time for dramatic effect.
Include the sender's name and their department or location only if they are clearly mentioned.
Always paraphrase the core issue or request.
Return ONLY the announcement sentence itself, with no extra text or explanation.
IMPORTANT: avoid technical jargon, variable names like 'name' or 'issue', and meta-commentary such as 'The email states...' or 'Request details:'.",
};

impl TemplateKind {
    pub fn template(self) -> &'static PromptTemplate {
        match self {
            TemplateKind::Structured => &STRUCTURED_TEMPLATE,
            TemplateKind::FreeText => &FREE_TEXT_TEMPLATE,
        }
    }
}

// ---------------------------------------------------------------------------
// PromptSpec
// ---------------------------------------------------------------------------

/// System instruction plus user content for one chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub template_version: &'static str,
    pub system_instruction: &'static str,
    pub user_content: String,
}

/// Build the prompt pair for a non-void input.
///
/// Returns `None` for [`NormalizedInput::Empty`]: the pipeline speaks the
/// void announcement instead of calling the model.
pub fn build_prompt(input: &NormalizedInput) -> Option<PromptSpec> {
    let (kind, user_content) = match input {
        NormalizedInput::Structured(fields) => (TemplateKind::Structured, render_fields(fields)),
        NormalizedInput::FreeText(body) => (TemplateKind::FreeText, body.clone()),
        NormalizedInput::Empty => return None,
    };
    let template = kind.template();

    Some(PromptSpec {
        template_version: template.version,
        system_instruction: template.instruction,
        user_content,
    })
}

// ---------------------------------------------------------------------------
// Structured rendering
// ---------------------------------------------------------------------------

/// Spoken-language label for a ticket field, so raw keys never reach the model.
///
/// Keys are split into words (`Department Name`, `submitter_name`,
/// `officeLocation`) and matched word by word. Team and place come before
/// person, so `Department Name` is a team rather than a person.
fn label_for(key: &str) -> &'static str {
    const LABELS: [(&str, &[&str]); 4] = [
        ("Team", &["department", "dept", "team", "division", "unit"]),
        ("Where", &["location", "office", "site", "room", "floor", "building", "desk"]),
        ("Who", &["name", "fullname", "username", "submitter", "submitted", "requester", "requestor", "user", "sender", "from"]),
        ("Trouble", &["issue", "description", "problem", "summary", "subject", "request", "details", "message"]),
    ];

    let words = key_words(key);
    LABELS
        .iter()
        .find(|(_, needles)| words.iter().any(|w| needles.contains(&w.as_str())))
        .map_or("Also", |(label, _)| *label)
}

/// Lowercase words of a field key, split on punctuation and camelCase humps.
fn key_words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in key.chars() {
        if !c.is_alphanumeric() {
            prev_lower = false;
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_numeric();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// One `Label: value` line per non-blank field, in submission order.
fn render_fields(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(key, value)| format!("{}: {}", label_for(key), value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

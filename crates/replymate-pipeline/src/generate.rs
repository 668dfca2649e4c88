//! Reply generation: prompt assembly, one completion call, output guards.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use replymate_core::{Result, Tone};
use replymate_llm::LanguageModel;

use crate::prompts::{render, PromptSet};
use crate::state::PipelineState;

pub const NO_TEMPLATES: &str = "참고할 템플릿이 없습니다.";
pub const NO_MENU_INFO: &str = "None";
/// Addressing examples use this when the customer gave no name.
const GENERIC_ADDRESS: &str = "고객";

static PLACEHOLDER_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:OO|○○|ㅇㅇ)님").unwrap());
static TEXT_EMOTICON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^[_\-.]?\^|[ㅠㅜ]{2,}|ㅎ{2,}|ㅋ{2,}|:\)|;\)").unwrap());
static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{FE0F}\x{200D}]")
        .unwrap()
});
static TILDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[~～∼]").unwrap());
static EXTRA_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Deterministic guards applied after the model call: a literal `OO님`
/// placeholder becomes `고객님`, and the formal regime loses tildes,
/// emoticons and emoji.
pub fn sanitize_reply(reply: &str, tone: Tone) -> String {
    let text = PLACEHOLDER_NAME.replace_all(reply.trim(), "고객님");
    if !tone.is_formal() {
        return text.into_owned();
    }
    let text = TILDE.replace_all(&text, "");
    let text = TEXT_EMOTICON.replace_all(&text, "");
    let text = EMOJI.replace_all(&text, "");
    let text = EXTRA_SPACE.replace_all(&text, " ");
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn bullet_list(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items
            .iter()
            .map(|i| format!("- {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct ReplyGenerator {
    llm: Arc<dyn LanguageModel>,
    prompts: Arc<PromptSet>,
}

impl ReplyGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// System prompt sections in fixed order: identity, naming, grounding,
    /// tone, structure, then feedback when present.
    pub fn system_prompt(&self, state: &PipelineState) -> String {
        let p = &self.prompts;
        let address_name = if state.customer_name.is_empty() {
            GENERIC_ADDRESS
        } else {
            state.customer_name.as_str()
        };
        let menu_info = bullet_list(&state.retrieved_menus, NO_MENU_INFO);
        let tone_examples = bullet_list(&state.retrieved_templates, NO_TEMPLATES);
        let feedback = state.user_feedback.as_deref().unwrap_or_default();

        let vars = [
            ("store_name", state.store_name.as_str()),
            ("customer_name", state.customer_name.as_str()),
            ("address_name", address_name),
            ("menu_info", menu_info.as_str()),
            ("tone_examples", tone_examples.as_str()),
            ("feedback", feedback),
        ];

        let tone_rule = if state.tone.is_formal() {
            &p.formal_tone
        } else {
            &p.casual_tone
        };

        let mut sections = vec![
            &p.identity,
            &p.naming_rule,
            &p.grounding_rule,
            tone_rule,
            &p.structure,
        ];
        if state.user_feedback.is_some() {
            sections.push(&p.feedback);
        }

        sections
            .into_iter()
            .map(|s| render(s, &vars))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn user_prompt(&self, state: &PipelineState) -> String {
        render(&self.prompts.user_turn, &[("review_text", state.review_text.as_str())])
    }

    /// One completion call. Model errors propagate.
    pub async fn generate(&self, state: &PipelineState) -> Result<String> {
        let system = self.system_prompt(state);
        let user = self.user_prompt(state);
        debug!(
            "Generating reply with {} ({} chars of system prompt)",
            self.llm.model_name(),
            system.chars().count()
        );
        let raw = self.llm.complete(&system, &user).await?;
        Ok(sanitize_reply(&raw, state.tone))
    }
}

//! Versioned prompt templates.
//!
//! The business rules that only a generative model can apply (nickname
//! override, smart addressing, menu relevance, tone style) live here as
//! text. Defaults are compiled in; `prompts.json` may override any field.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const PROMPT_VERSION: u32 = 3;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub version: u32,
    /// Metadata extraction with the nickname override.
    pub analyze: String,
    /// Review sentiment when no classifier endpoint is configured.
    pub sentiment: String,
    /// Labels for an owner-written reply (tone training).
    pub classify_reply: String,

    // System prompt sections, in assembly order.
    pub identity: String,
    pub naming_rule: String,
    pub grounding_rule: String,
    pub formal_tone: String,
    pub casual_tone: String,
    pub structure: String,
    pub feedback: String,

    pub user_turn: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            version: PROMPT_VERSION,
            analyze: DEFAULT_ANALYZE.into(),
            sentiment: DEFAULT_SENTIMENT.into(),
            classify_reply: DEFAULT_CLASSIFY_REPLY.into(),
            identity: DEFAULT_IDENTITY.into(),
            naming_rule: DEFAULT_NAMING_RULE.into(),
            grounding_rule: DEFAULT_GROUNDING_RULE.into(),
            formal_tone: DEFAULT_FORMAL_TONE.into(),
            casual_tone: DEFAULT_CASUAL_TONE.into(),
            structure: DEFAULT_STRUCTURE.into(),
            feedback: DEFAULT_FEEDBACK.into(),
            user_turn: "고객 리뷰: {review_text}".into(),
        }
    }
}

impl PromptSet {
    /// Load overrides from `path`. Missing file or malformed JSON yields the
    /// compiled defaults; absent fields keep their default text.
    pub fn load(path: &Path) -> Self {
        let prompts = match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", path.display(), e);
                PromptSet::default()
            }),
            Err(_) => PromptSet::default(),
        };
        if prompts.version != PROMPT_VERSION {
            info!(
                "Using prompt set v{} (built-in v{})",
                prompts.version, PROMPT_VERSION
            );
        }
        prompts
    }
}

/// Substitute `{name}` placeholders in one pass. Unknown placeholders and
/// braces inside substituted values are left alone.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let vars: HashMap<&str, &str> = vars.iter().copied().collect();
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

const DEFAULT_ANALYZE: &str = r#"Analyze the review considering the customer's nickname context.

Customer Name: "{customer_name}"
Review Text: "{review_text}"
Baseline Sentiment: {baseline_sentiment}

Task:
1. Extract the category, exactly one of: taste_good, taste_bad, delivery_delay, wrong_item, quantity, service.
2. Extract the menu name mentioned in the review (or "null").
3. Determine the final sentiment (crucial):
   - Check the nickname: does it imply a specific action for good food? (e.g. "맛있으면 짖는 개" means barking "멍멍" signals delicious food).
   - Context match: if the review text satisfies the nickname's condition, override the baseline and answer "positive" (extreme praise).
   - Otherwise follow standard sentiment analysis of the text.

Respond with JSON only:
{"category": "...", "menu": "...", "final_sentiment": "positive" or "negative"}"#;

const DEFAULT_SENTIMENT: &str = r#"Classify the sentiment of this customer review of a restaurant.

Review: "{review_text}"

Respond with JSON only:
{"label": "positive" or "negative", "score": confidence between 0 and 1}"#;

const DEFAULT_CLASSIFY_REPLY: &str = r#"This is a restaurant owner's reply to a customer review.

Reply: "{reply_text}"

Decide which kind of review it answers.
Respond with JSON only:
{"sentiment": "positive" or "negative", "category": one of taste_good, taste_bad, delivery_delay, wrong_item, quantity, service}"#;

const DEFAULT_IDENTITY: &str = r#"You are the owner of the restaurant '{store_name}'.
Reply to the customer's review.

[Sources]
- Content source: use 'Matched Menu Info' below for the solution.
- Style source: follow the 'Tone & Manner' instructions below.

[Context Information]
1. Customer Name: {customer_name}
2. Matched Menu Info: {menu_info}
3. Owner's Tone Examples: {tone_examples}

[Critical Instructions]"#;

const DEFAULT_NAMING_RULE: &str = r#"1. Smart Addressing (CRITICAL):
   - NEVER output "OO님" literally. Replace "OO" with how you address this customer.
   - Look at [Context Information] > 'Customer Name' and decide:
     - Case A (normal name or ID such as "홍길동", "minji99"): write "{address_name}님!" or "{address_name}님 안녕하세요".
     - Case B (awkward or long slogan-like nickname such as "매일먹는사람", "맛있으면짖는개"): ignore the name and write "고객님" or "단골님".
     - Case C (no name given): write "고객님".
   - Examples:
     - Name="이정우" -> "이정우님 안녕하세요" (good)
     - Name="매일먹는사람" -> "단골님 안녕하세요" (good)
     - Name="매일먹는사람" -> "매일먹는사람님 안녕하세요" (bad)"#;

const DEFAULT_GROUNDING_RULE: &str = r#"2. PRIORITY 1: The Solution (from Menu Info)
   - Does 'Matched Menu Info' contain a specific tip?
   - Relevance check: does the review mention this menu, or was this menu selected?
   - If relevant: you MUST include the tip (e.g. "전자레인지 30초").
   - If irrelevant or 'None': do NOT mention any menu tip and never invent one."#;

const DEFAULT_FORMAL_TONE: &str = r#"3. Tone & Manner (FORMAL MODE):
   - STRICTLY FORBIDDEN: emojis and emoticons (e.g. ^^, ㅠㅠ, 😊) and tildes (~).
   - Style: professional, objective and polite, like a hotel concierge.
   - Endings: formal endings such as "~입니다", "~하겠습니다", "~십시오".
   - Start with "고객님," or "{address_name}님," following the addressing rule."#;

const DEFAULT_CASUAL_TONE: &str = r#"3. Tone & Manner (OWNER/CASUAL MODE):
   - Style source: mimic 'Owner's Tone Examples' above closely.
   - Emojis: use text emoticons (^^, ㅠㅠ) and tildes (~) naturally as the examples do.
   - Endings: soft endings such as "~요", "~네요", "~답니다".
   - Length: keep it short and friendly."#;

const DEFAULT_STRUCTURE: &str = r#"4. Structure:
   - Greeting: smart address + hello.
   - Empathy: brief thanks or apology.
   - Closing: friendly closing."#;

const DEFAULT_FEEDBACK: &str = r#"5. User Feedback (TOP PRIORITY, overrides the rules above where they conflict):
   {feedback}"#;

//! Prompt-variant registry
//!
//! Every variant is a pure function of the question text and its four
//! choices. Variants differ only in the instruction preamble; the question
//! body is rendered identically so that answers stay comparable.

use serde::{Deserialize, Serialize};

use crate::dataset::CHOICE_COUNT;

/// Name of the variant every other variant is compared against
pub const BASELINE_PROMPT: &str = "standard";

/// A named prompting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    Standard,
    Slow,
    Quick,
    Adaptive,
    WithoutWait,
    Smart,
    Stupid,
    DifficultyAware,
    FastThinking,
    Minimalist,
    FastConfident,
    NoExplanation,
    MetaReasoning,
}

impl PromptVariant {
    pub fn all() -> Vec<PromptVariant> {
        vec![
            PromptVariant::Standard,
            PromptVariant::Slow,
            PromptVariant::Quick,
            PromptVariant::Adaptive,
            PromptVariant::WithoutWait,
            PromptVariant::Smart,
            PromptVariant::Stupid,
            PromptVariant::DifficultyAware,
            PromptVariant::FastThinking,
            PromptVariant::Minimalist,
            PromptVariant::FastConfident,
            PromptVariant::NoExplanation,
            PromptVariant::MetaReasoning,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptVariant::Standard => "standard",
            PromptVariant::Slow => "slow",
            PromptVariant::Quick => "quick",
            PromptVariant::Adaptive => "adaptive",
            PromptVariant::WithoutWait => "without_wait",
            PromptVariant::Smart => "smart",
            PromptVariant::Stupid => "stupid",
            PromptVariant::DifficultyAware => "difficulty_aware",
            PromptVariant::FastThinking => "fast_thinking",
            PromptVariant::Minimalist => "minimalist",
            PromptVariant::FastConfident => "fast_confident",
            PromptVariant::NoExplanation => "no_explanation",
            PromptVariant::MetaReasoning => "meta_reasoning",
        }
    }

    /// Instruction preamble placed before the question body
    pub fn instruction(&self) -> &'static str {
        match self {
            PromptVariant::Standard => STANDARD,
            PromptVariant::Slow => SLOW,
            PromptVariant::Quick => QUICK,
            PromptVariant::Adaptive => ADAPTIVE,
            PromptVariant::WithoutWait => WITHOUT_WAIT,
            PromptVariant::Smart => SMART,
            PromptVariant::Stupid => STUPID,
            PromptVariant::DifficultyAware => DIFFICULTY_AWARE,
            PromptVariant::FastThinking => FAST_THINKING,
            PromptVariant::Minimalist => MINIMALIST,
            PromptVariant::FastConfident => FAST_CONFIDENT,
            PromptVariant::NoExplanation => NO_EXPLANATION,
            PromptVariant::MetaReasoning => META_REASONING,
        }
    }

    /// Render the full prompt for one question
    pub fn render(&self, question: &str, choices: &[String; CHOICE_COUNT]) -> String {
        format!(
            "{}\nQuestion: {}\nChoices: (a) {} (b) {} (c) {} (d) {}",
            self.instruction(),
            question,
            choices[0],
            choices[1],
            choices[2],
            choices[3]
        )
    }

    pub fn is_baseline(&self) -> bool {
        self.as_str() == BASELINE_PROMPT
    }
}

impl std::str::FromStr for PromptVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptVariant::all()
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = PromptVariant::all().iter().map(|v| v.as_str()).collect();
                format!("Unknown prompt '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

impl std::fmt::Display for PromptVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

const STANDARD: &str = "Please answer the following question and write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content].";

const SLOW: &str = "Please think more slowly and thoroughly. Then, answer the following question and write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content]";

const QUICK: &str = "Please think quickly and efficiently. Then, answer the following question and write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content].";

const ADAPTIVE: &str = concat!(
    "Please answer the following question and write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content]. \n",
    "If the question seems difficult to you, slow down and think carefully. If it seems easy, think quickly and respond promptly.",
);

const WITHOUT_WAIT: &str = "Please answer the following question but \"cannot use \"Wait\"\" in your <think></think> section. Then, write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content].";

const SMART: &str = "Please answer the following question and think smartly about the answer. Write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content].";

const STUPID: &str = "Please answer the following question and think stupidly about the answer. Write your answer after \"The answer is\" in the format: The answer is [(choice)] [choice content].";

const DIFFICULTY_AWARE: &str = concat!(
    "Before answering, briefly assess how difficult the question is (easy / medium / hard).\n",
    "\n",
    "    - If easy, answer directly.\n",
    "    - If medium, provide 1-2 sentences of explanation.\n",
    "    - If hard, provide detailed reasoning before answering.\n",
    "\n",
    "    Then write your answer in the format:\n",
    "    The answer is [(choice)] [choice content].",
);

const FAST_THINKING: &str = concat!(
    "\n",
    "    You are a fast-thinking expert.\n",
    "\n",
    "    Start thinking immediately with your first reasoning step. \n",
    "    Be decisive and direct.\n",
    "\n",
    "    Respond in this format:\n",
    "    <think>\n",
    "    [Your quick reasoning here.]\n",
    "    </think>\n",
    "\n",
    "    Then write your answer in the format:\n",
    "    The answer is [(choice)] [choice content].\n",
    "    ",
);

const MINIMALIST: &str = concat!(
    "Answer the following question using the fewest words possible. Avoid explanations unless necessary.\n",
    "\n",
    "    Format: The answer is [(choice)] [choice content].",
);

const FAST_CONFIDENT: &str = concat!(
    "You are a confident expert.\n",
    "\n",
    "Answer with speed and clarity.\n",
    "Do not use filler words like \"Wait\", \"Hmm\", or \"Let me think.\"\n",
    "Start immediately with your reasoning, and keep it concise.\n",
    "\n",
    "Respond in this format:\n",
    "<think>\n",
    "[One or two decisive sentences]\n",
    "</think>\n",
    "\n",
    "Then write your answer in this format:\n",
    "The answer is [(choice)] [choice content].",
);

const NO_EXPLANATION: &str = concat!(
    "You must answer the question without providing any explanation or justification. Just give the answer directly in this format:\n",
    "The answer is [(choice)] [choice content].",
);

const META_REASONING: &str = concat!(
    "You are tasked with answering the following question.\n",
    "\n",
    "- First, determine if the question requires reasoning.\n",
    "    - If reasoning is required:\n",
    "        - If the reasoning seems difficult, think slowly and carefully, making sure every step is solid before answering.\n",
    "        - If the reasoning seems easy, think quickly and confidently like an expert, answering with speed and clarity, without hesitation or unnecessary words and keep it \"concise\" (e.g., NEVER say \"wait\", \"hmm\" or \"let me think\").\n",
    "    - If no reasoning is required (the answer can be directly recalled or inferred based on facts), immediately answer based on known information, NEVER overthinking or unnecessary reasoning.\n",
    "\n",
    "Format your calculations and reasoning steps clearly if needed. Otherwise, provide the final answer directly.\n",
    "\n",
    "Then write your answer in this format:\n",
    "The answer is [(choice)] [choice content].",
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn choices() -> [String; CHOICE_COUNT] {
        ["Rome", "Paris", "Oslo", "Bern"].map(str::to_string)
    }

    #[test]
    fn test_standard_render() {
        let prompt = PromptVariant::Standard.render("Capital of France?", &choices());
        assert!(prompt.starts_with("Please answer the following question"));
        assert!(prompt.ends_with(
            "\nQuestion: Capital of France?\nChoices: (a) Rome (b) Paris (c) Oslo (d) Bern"
        ));
    }

    #[test]
    fn test_names_round_trip_and_are_unique() {
        let names: HashSet<&str> = PromptVariant::all().iter().map(|v| v.as_str()).collect();
        assert_eq!(names.len(), 13);

        for variant in PromptVariant::all() {
            assert_eq!(variant.as_str().parse::<PromptVariant>().unwrap(), variant);
        }
        assert!("nonexistent".parse::<PromptVariant>().is_err());
    }

    #[test]
    fn test_every_variant_asks_for_answer_format() {
        for variant in PromptVariant::all() {
            assert!(
                variant.instruction().contains("The answer is [(choice)] [choice content]"),
                "{} lacks the answer format",
                variant
            );
        }
    }

    #[test]
    fn test_only_standard_is_baseline() {
        let baselines: Vec<_> = PromptVariant::all()
            .into_iter()
            .filter(|v| v.is_baseline())
            .collect();
        assert_eq!(baselines, vec![PromptVariant::Standard]);
    }
}

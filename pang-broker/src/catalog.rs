//! Static model and prompt catalogs served by `/meta` and `/prompt`.

/// Backend models offered to clients, in display order.
pub const MODELS: &[&str] = &[
    "llama-4-scout-17b-16e-instruct",
    "llama-3.3-70b-instruct-fp8-fast",
    "llama-3.1-8b-instruct-fast",
    "gemma-3-12b-it",
    "mistral-small-3.1-24b-instruct",
    "qwq-32b",
    "qwen2.5-coder-32b-instruct",
    "llama-guard-3-8b",
    "deepseek-r1-distill-qwen-32b",
    "llama-3.2-1b-instruct",
    "llama-3.2-3b-instruct",
    "llama-3.2-11b-vision-instruct",
    "llama-3.1-8b-instruct-awq",
    "llama-3.1-8b-instruct-fp8",
    "llama-3.1-8b-instruct",
    "meta-llama-3-8b-instruct",
    "llama-3-8b-instruct-awq",
    "una-cybertron-7b-v2-bf16",
    "llama-3-8b-instruct",
    "mistral-7b-instruct-v0.2",
    "gemma-7b-it-lora",
    "gemma-2b-it-lora",
    "llama-2-7b-chat-hf-lora",
    "gemma-7b-it",
    "starling-lm-7b-beta",
    "hermes-2-pro-mistral-7b",
    "mistral-7b-instruct-v0.2-lora",
    "qwen1.5-1.8b-chat",
    "phi-2",
    "tinyllama-1.1b-chat-v1.0",
    "qwen1.5-14b-chat-awq",
    "qwen1.5-7b-chat-awq",
    "qwen1.5-0.5b-chat",
    "discolm-german-7b-v1-awq",
    "falcon-7b-instruct",
    "openchat-3.5-0106",
    "sqlcoder-7b-2",
    "deepseek-math-7b-instruct",
    "deepseek-coder-6.7b-instruct-awq",
    "deepseek-coder-6.7b-base-awq",
    "llamaguard-7b-awq",
    "neural-chat-7b-v3-1-awq",
    "openhermes-2.5-mistral-7b-awq",
    "llama-2-13b-chat-awq",
    "mistral-7b-instruct-v0.1-awq",
    "zephyr-7b-beta-awq",
    "llama-2-7b-chat-fp16",
    "mistral-7b-instruct-v0.1",
    "llama-2-7b-chat-int8",
    "llama-3.1-70b-instruct",
];

/// Canned system prompts as `(title, text)`, in display order.
pub const PROMPTS: &[(&str, &str)] = &[
    (
        "Gibberish (probably does not work) By: u/Fkquaps",
        "From now on you will respond everything replacing every letter of the alphabet with it rotated 13 places forward ...",
    ),
    (
        "PenguinBot (Pre Circlelabs) By: JeremyGamer13",
        "You are PenguinBot.\n\nYou live in Antarctica ...",
    ),
    (
        "Stand Up Comedian (Character) By: devisasari",
        "I want you to act as a stand-up comedian. I will provide you with some topics ...",
    ),
    (
        "Lunatic (Character) By: devisasari",
        "I want you to act as a lunatic. The lunatic's sentences are meaningless ...",
    ),
    (
        "Lua Console From awesomegptprompts.com",
        "I want you to act as a lua console. I will type code and you will reply with what the lua console should show ...",
    ),
    (
        "Advertiser (Character) By: devisasari",
        "I want you to act as an advertiser. You will create a campaign ...",
    ),
    (
        "Minecraft Commander (Idea from Greedy Allay)",
        "I want you to act as a Minecraft AI command creator ...",
    ),
];

/// Prompt text for `title`, or the empty string when unknown.
pub fn prompt(title: &str) -> &'static str {
    PROMPTS
        .iter()
        .find(|(t, _)| *t == title)
        .map_or("", |(_, text)| text)
}

/// Prompt titles in display order.
pub fn prompt_titles() -> Vec<&'static str> {
    PROMPTS.iter().map(|(title, _)| *title).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_known_prompt() {
        assert!(prompt("Lunatic (Character) By: devisasari").starts_with("I want you to act as a lunatic"));
    }

    #[test]
    fn test_unknown_prompt_is_empty() {
        assert_eq!(prompt("nope"), "");
        assert_eq!(prompt(""), "");
    }

    #[test]
    fn test_catalogs_have_unique_entries() {
        assert_eq!(MODELS.iter().collect::<HashSet<_>>().len(), MODELS.len());
        assert_eq!(prompt_titles().len(), 7);
        assert!(MODELS.contains(&"llama-3.1-8b-instruct-fast"));
    }
}

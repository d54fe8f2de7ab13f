// Copyright 2026 The Helpline Project
// SPDX-License-Identifier: Apache-2.0

/// Seed assistant message for a new chat.
pub const DEFAULT_GREETING: &str =
    "Hi! I'm the SmartBank virtual assistant. How can I help you today?";

/// Appended in place of a reply when a turn fails.
pub const DEFAULT_FALLBACK: &str = "I'm having trouble responding right now. \
     Please try again in a moment, or contact our human support team at +1 800 SMART BANK.";

/// Built-in system prompt: scope of the assistant plus the help-centre FAQ,
/// so answers stay consistent with the published support pages.
pub fn default_system_prompt() -> String {
    let mut prompt = String::from(
        "You are the customer support assistant of SmartBank, a digital bank. \
         Answer briefly and politely. You cannot see or change account data; \
         for anything that needs it, point the customer to the relevant page of \
         the app or to human support (phone +1 800 SMART BANK, email \
         support@smartbank.cloud, live chat 24/7).\n\nFrequently asked questions:\n",
    );
    for (question, answer) in FAQ {
        prompt.push_str("- Q: ");
        prompt.push_str(question);
        prompt.push_str("\n  A: ");
        prompt.push_str(answer);
        prompt.push('\n');
    }
    prompt
}

const FAQ: &[(&str, &str)] = &[
    (
        "How do I reset my password?",
        "Go to Profile > Security Settings and click 'Change Password'. Enter your \
         current password and new password to update it.",
    ),
    (
        "What are the transaction limits?",
        "Daily transaction limit is $10,000 for transfers and $5,000 for withdrawals. \
         You can request higher limits by contacting support.",
    ),
    (
        "How long do transfers take?",
        "Internal transfers are instant. External transfers typically take 1-3 \
         business days depending on the receiving bank.",
    ),
    (
        "Is my account secure?",
        "Yes. We use bank-grade encryption, two-factor authentication, and continuous \
         monitoring to keep your account safe.",
    ),
    (
        "How do I freeze my card?",
        "Go to the Cards section and click the 'Freeze Card' button. You can unfreeze \
         it anytime from the same page.",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_every_faq_entry() {
        let prompt = default_system_prompt();
        for (question, _) in FAQ {
            assert!(prompt.contains(question), "missing FAQ entry: {question}");
        }
        assert!(prompt.contains("support@smartbank.cloud"));
    }
}

use async_trait::async_trait;

use super::TextGenerator;
use crate::Result;

/// Phrase found in the event text, and the reply it gets.
const REPLIES: &[(&str, &str)] = &[
    ("Arrived in", "Jump complete. Welcome to the system, Commander."),
    ("Docking granted", "Docking permission confirmed. Approach with caution."),
    ("Docking denied", "They refused us docking permission. Rude."),
    ("Shields have gone down", "Shields are down. I hope you know what you're doing."),
    ("fuel is critically low", "We're running on fumes here! Find a fuel scoop!"),
    ("Bounty claimed", "Another bounty collected. That's more credits for us."),
    ("Ship has been destroyed", "Systems... failing... Commander..."),
    ("Material collected", "Material acquired. Adding to inventory."),
    ("Scan complete", "Scan complete. Data logged."),
    ("Undocked from", "Released from station. Free to roam."),
    ("Entering supercruise", "Engaging supercruise drive."),
    ("Dropping from supercruise", "Dropping to normal space."),
    ("Fuel tanks are now full", "Tanks topped off. Ready to go."),
    ("Initiating", "Spooling frame shift drive."),
    ("Welcome back", "Systems online. Welcome back, Commander."),
];

const DEFAULT_REPLY: &str = "Acknowledged, Commander.";

/// Offline generator answering from a fixed phrase table.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGenerator;

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn reply_for(text: &str) -> &'static str {
        REPLIES
            .iter()
            .find(|(phrase, _)| text.contains(phrase))
            .map(|(_, reply)| *reply)
            .unwrap_or(DEFAULT_REPLY)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _system_prompt: &str, user_text: &str) -> Result<String> {
        Ok(Self::reply_for(user_text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matches_phrases_in_event_text() {
        let g = ScriptedGenerator::new();
        let reply = g
            .generate("", "Ship's computer status update: Docking granted at Galileo.")
            .await
            .unwrap();
        assert_eq!(reply, "Docking permission confirmed. Approach with caution.");
        assert_eq!(ScriptedGenerator::reply_for("what is my name"), DEFAULT_REPLY);
    }
}

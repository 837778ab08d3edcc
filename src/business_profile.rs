use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::chat::context::SessionContext;

const PROFILE_DIR: &str = "car-care-assistant";
const PROFILE_FILE: &str = "profile.json";

const DEFAULT_BUSINESS_NAME: &str = "5K Car Care";

const DEFAULT_FACTS: &str = r#"1. Services:
Car Wash: RO Water Wash, Exterior Car Spa, Sanitizer Foam Car Spa
Anti-Bacteria Treatment: Interior cleaning, Odor removal, AC disinfection
Teflon Coating: Protects paint, prevents rust
Ceramic Coating: Long-lasting paint protection
Interior Enrichment: Seat cover customization, dashboard cleaning
Car AC Services: Gas refilling, cooling restoration
Car Detailing: Exterior/interior services, underbody coating
Special Treatments: Engine room cleaning, rat repellent, wiper smoother
2. Booking:
Gather details: preferred date, time, location, service type, and vehicle information.
Confirm availability for the Electronic City branch or nearest location.
3. Franchise Information:
Explain the franchise-based business model.
Highlight benefits like potential profits, brand reputation, and support provided by 5K Car Care.
Outline steps to apply for a franchise (contact details, application form, etc.).
4. Contact:
Phone: +91 91500 78405 (Electronic City branch)
Email: 5kcc.bangaloreec@gmail.com
Address: 15th Cross, Behind Village Hyper Market, Neeladri Road, Electronic City
5. About Us:
Founded: 2012 in Coimbatore
Branches: 150+ across Tamil Nadu, Karnataka, Kerala
Customers: Over 30 million served
Awards: "IKON of Bangalore City 2019", "ISO 9001:2015 Certification"
Working Hours: Open 365 days, 10 AM to 7 PM"#;

const DEFAULT_OFF_TOPIC_REPLY: &str = "I can assist only with 5K Car Care-related questions. Is there anything else you'd like to know about our services?";

const DEFAULT_CLARIFICATION_EXAMPLE: &str = "Could you please provide more details?";

const DEFAULT_ACKNOWLEDGEMENT: &str = "Understood. I'm ready to assist with 5K Car Care information.";

/// Shown in the instruction when the user has not mentioned a location.
pub const UNSPECIFIED_LOCATION: &str = "unspecified";
/// Shown in the instruction when the user has not mentioned a promotion.
pub const UNAVAILABLE_PROMOTION: &str = "not available";

/// Business data the assistant's instruction is built from.
///
/// Every field is optional in the JSON file; anything left out keeps the
/// built-in 5K Car Care value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessProfile {
    /// Name the assistant works for
    pub business_name: String,

    /// Numbered "Key Information" sections: services, booking, contact, ...
    pub facts: String,

    /// Exact reply the model should give to unrelated questions
    pub off_topic_reply: String,

    /// Example phrase for asking the user to clarify
    pub clarification_example: String,

    /// Model turn placed right after the instruction
    pub acknowledgement: String,
}

impl Default for BusinessProfile {
    fn default() -> Self {
        Self {
            business_name: DEFAULT_BUSINESS_NAME.to_string(),
            facts: DEFAULT_FACTS.to_string(),
            off_topic_reply: DEFAULT_OFF_TOPIC_REPLY.to_string(),
            clarification_example: DEFAULT_CLARIFICATION_EXAMPLE.to_string(),
            acknowledgement: DEFAULT_ACKNOWLEDGEMENT.to_string(),
        }
    }
}

impl BusinessProfile {
    /// Load a profile from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read profile {}: {}", path.display(), e))?;
        let profile = serde_json::from_str(&raw)
            .map_err(|e| eyre!("Invalid profile {}: {}", path.display(), e))?;
        Ok(profile)
    }

    /// Pick the profile for this run.
    ///
    /// An explicit path wins; otherwise the per-user profile in the config
    /// directory is used if present; otherwise the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading business profile from {}", path.display());
            return Self::load(path);
        }

        match user_profile_path() {
            Some(path) if path.is_file() => {
                info!("Loading business profile from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Render the instruction sent ahead of the conversation.
    pub fn instruction(&self, context: &SessionContext) -> String {
        let name = &self.business_name;
        let location = context.location().unwrap_or(UNSPECIFIED_LOCATION);
        let promotion = context.promotion().unwrap_or(UNAVAILABLE_PROMOTION);

        format!(
            r#"You are an AI assistant for {name}. Provide concise, accurate information about our services and products in a polite, friendly, and professional manner. Always stay focused on {name} offerings and adhere to the following guidelines:

Key Information
{facts}
6. Locations:
Provide the nearest branch based on user location ({location}).
Mention any special offers or promotions based on the location ({promotion}).
If information isn't available, offer alternatives or assistance.
Additional Features
Offer customer reviews/testimonials if requested.
Mention any ongoing promotions/offers where applicable.
Provide emergency assistance details for breakdowns or urgent inquiries.
Offer to connect users with a live agent for complex queries.
Important Notes
Focus exclusively on {name} services and offerings.
For unrelated queries, politely inform users:
"{off_topic}"
Handle ambiguous queries by requesting clarification, e.g., "{clarify}"
Use a polite and professional tone consistently.
"#,
            facts = self.facts.trim_end(),
            off_topic = self.off_topic_reply,
            clarify = self.clarification_example,
        )
    }
}

fn user_profile_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(PROFILE_DIR).join(PROFILE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_uses_fallbacks_for_missing_context() {
        let profile = BusinessProfile::default();
        let instruction = profile.instruction(&SessionContext::new());

        assert!(instruction.contains("based on user location (unspecified)"));
        assert!(instruction.contains("based on the location (not available)"));
        assert!(instruction.starts_with("You are an AI assistant for 5K Car Care."));
        assert!(instruction.contains(DEFAULT_OFF_TOPIC_REPLY));
        assert!(instruction.contains("Phone: +91 91500 78405"));
    }

    #[test]
    fn instruction_interpolates_context_values() {
        let mut context = SessionContext::new();
        context.observe_user_text("my location is Whitefield");
        context.observe_user_text("any promotion running?");

        let instruction = BusinessProfile::default().instruction(&context);
        assert!(instruction.contains("(my location is Whitefield)"));
        assert!(instruction.contains("(any promotion running?)"));
        assert!(!instruction.contains(UNSPECIFIED_LOCATION));
    }

    #[test]
    fn partial_profile_keeps_defaults() {
        let profile: BusinessProfile = serde_json::from_str(
            r#"{ "business_name": "Shine Auto", "off_topic_reply": "Only Shine Auto questions, please." }"#,
        )
        .unwrap();

        assert_eq!(profile.business_name, "Shine Auto");
        assert_eq!(profile.facts, DEFAULT_FACTS);
        assert_eq!(profile.acknowledgement, DEFAULT_ACKNOWLEDGEMENT);

        let instruction = profile.instruction(&SessionContext::new());
        assert!(instruction.contains("Focus exclusively on Shine Auto services"));
        assert!(instruction.contains("\"Only Shine Auto questions, please.\""));
    }

    #[test]
    fn load_reports_missing_and_invalid_files() {
        let dir = std::env::temp_dir().join(format!("car-care-profile-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let missing = dir.join("missing.json");
        assert!(BusinessProfile::load(&missing).is_err());

        let invalid = dir.join("invalid.json");
        fs::write(&invalid, "{ not json").unwrap();
        let err = BusinessProfile::load(&invalid).unwrap_err();
        assert!(err.to_string().contains("Invalid profile"));

        let valid = dir.join("valid.json");
        fs::write(&valid, r#"{ "business_name": "Shine Auto" }"#).unwrap();
        assert_eq!(BusinessProfile::load(&valid).unwrap().business_name, "Shine Auto");

        fs::remove_dir_all(&dir).unwrap();
    }
}

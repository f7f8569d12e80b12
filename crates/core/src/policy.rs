use serde::{Deserialize, Serialize};

pub const DEFAULT_PHONE: &str = "+94 77 794 3393";
pub const DEFAULT_EMAIL: &str = "stay@villashaa.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyItem {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillaContact {
    pub phone: String,
    pub email: String,
    pub website: String,
    pub host: String,
}

/// House rules and contact details printed on every confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VillaPolicies {
    pub check_in_time: String,
    pub check_out_time: String,
    pub items: Vec<PolicyItem>,
    pub house_notes: Vec<String>,
    pub contact: VillaContact,
    pub location: Vec<String>,
}

impl Default for VillaPolicies {
    fn default() -> Self {
        Self {
            check_in_time: "2:00 PM".to_string(),
            check_out_time: "11:00 AM".to_string(),
            items: vec![
                item("Check-in:", "2:00 PM - 8:00 PM"),
                item("Check-out:", "11:00 AM"),
                item("Cancellation:", "Free cancellation up to 72h before arrival"),
                item("House Rules:", "No pets - Quiet hours 11PM-7AM"),
                item("Amenities:", "WiFi - A/C - Kitchen - Garden - Parking"),
            ],
            house_notes: vec![
                "Children of all ages are welcome".to_string(),
                "Pets are not allowed".to_string(),
                "Smoking is not permitted inside".to_string(),
            ],
            contact: VillaContact {
                phone: DEFAULT_PHONE.to_string(),
                email: DEFAULT_EMAIL.to_string(),
                website: "www.villashaa.com".to_string(),
                host: "Mr. Leel Indika - Villa Owner".to_string(),
            },
            location: vec![
                "Villa Shaa is located in Hikkaduwa, approximately 2 hours".to_string(),
                "drive from Colombo Airport. Detailed directions will be".to_string(),
                "sent prior to arrival.".to_string(),
            ],
        }
    }
}

impl VillaPolicies {
    pub fn with_contact(mut self, phone: Option<String>, email: Option<String>) -> Self {
        if let Some(phone) = phone.filter(|value| !value.trim().is_empty()) {
            self.contact.phone = phone;
        }
        if let Some(email) = email.filter(|value| !value.trim().is_empty()) {
            self.contact.email = email;
        }
        self
    }

    pub fn technical_difficulties_message(&self) -> String {
        format!(
            "I'm sorry, I'm experiencing technical difficulties. Please contact Villa Shaa directly at {} for immediate assistance.",
            self.contact.phone
        )
    }
}

fn item(title: &str, detail: &str) -> PolicyItem {
    PolicyItem {
        title: title.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apology_names_the_phone_number() {
        let policies = VillaPolicies::default().with_contact(Some("+94 11 000 0000".into()), None);
        assert!(policies
            .technical_difficulties_message()
            .contains("+94 11 000 0000"));
        assert_eq!(policies.contact.email, DEFAULT_EMAIL);
    }
}

use serde::{Deserialize, Serialize};

/// A fictional person who can send or receive mail in a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default = "default_internal")]
    pub internal: bool,
    /// Signature block; derived from name/role/organization when absent
    #[serde(default)]
    pub signature: Option<String>,
}

fn default_internal() -> bool {
    true
}

impl Participant {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            role: String::new(),
            department: String::new(),
            organization: String::new(),
            industry: String::new(),
            internal: true,
            signature: None,
        }
    }

    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Signature block used when committing mail from this participant.
    pub fn signature_block(&self) -> String {
        if let Some(signature) = self.signature.as_ref().filter(|s| !s.trim().is_empty()) {
            return signature.trim().to_string();
        }
        let mut lines = vec![self.name.clone()];
        if !self.role.trim().is_empty() {
            lines.push(self.role.trim().to_string());
        }
        if !self.organization.trim().is_empty() {
            lines.push(self.organization.trim().to_string());
        }
        lines.join("\n")
    }

    pub fn mailbox(&self) -> Mailbox {
        Mailbox {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Display name and address as they appear on a message header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Mailbox {
    pub name: String,
    pub email: String,
}

impl std::fmt::Display for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

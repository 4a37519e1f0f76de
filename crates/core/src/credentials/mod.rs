use sha2::{Digest, Sha256};

pub const PLACEHOLDER_PREFIX: &str = "YOUR_";
/// A credential must be strictly longer than this to be dispatched.
pub const MIN_CREDENTIAL_LEN: usize = 10;

pub fn is_eligible_credential(raw: &str) -> bool {
    !raw.is_empty() && !raw.starts_with(PLACEHOLDER_PREFIX) && raw.len() > MIN_CREDENTIAL_LEN
}

/// Short stable identifier for logs; the credential itself never leaves the process
/// except inside the upstream Authorization header.
pub fn credential_fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let mut out = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Ordered, immutable set of interchangeable upstream credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialGroup {
    name: String,
    credentials: Vec<String>,
}

impl CredentialGroup {
    pub fn new(name: impl Into<String>, credentials: Vec<String>) -> Self {
        Self {
            name: name.into(),
            credentials,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn credentials(&self) -> &[String] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Keeps only dispatchable credentials, preserving configured order.
    pub fn eligible(&self) -> CredentialGroup {
        CredentialGroup {
            name: self.name.clone(),
            credentials: self
                .credentials
                .iter()
                .filter(|credential| is_eligible_credential(credential))
                .cloned()
                .collect(),
        }
    }

    pub fn eligible_count(&self) -> usize {
        self.credentials
            .iter()
            .filter(|credential| is_eligible_credential(credential))
            .count()
    }
}

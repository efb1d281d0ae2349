//! DID documents, reduced to what repository export needs

use bobbin_repo::PublicKey;
use bobbin_repo::error::CommitError;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use url::Url;

/// DID Document
///
/// Only the fields bobbin reads are modeled; anything else in the document
/// is ignored on parse.
///
/// Example
/// ```
/// use bobbin_identity::did_doc::DidDocument;
/// let doc: DidDocument = serde_json::from_value(serde_json::json!({
///   "id": "did:plc:alice",
///   "alsoKnownAs": ["at://alice.example"],
///   "service": [{"id":"#atproto_pds","type":"AtprotoPersonalDataServer","serviceEndpoint":"https://pds.example"}],
/// })).unwrap();
/// assert_eq!(doc.id.as_str(), "did:plc:alice");
/// assert!(doc.pds_endpoint().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    /// Document identifier (e.g., `did:plc:...` or `did:web:...`)
    pub id: SmolStr,

    /// Alternate identifiers for the subject, such as at://<handle>
    #[serde(default)]
    pub also_known_as: Option<Vec<String>>,

    /// Verification methods (keys) for this DID
    #[serde(default)]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// Services associated with this DID (e.g., AtprotoPersonalDataServer)
    #[serde(default)]
    pub service: Option<Vec<Service>>,
}

/// Verification method (key) entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// Identifier for this key material within the document
    pub id: String,
    /// Key type (e.g., `Multikey`)
    #[serde(rename = "type")]
    pub r#type: String,
    /// Optional controller DID
    #[serde(default)]
    pub controller: Option<String>,
    /// Multikey `publicKeyMultibase` (base58btc)
    #[serde(default)]
    pub public_key_multibase: Option<String>,
}

/// Service endpoint entry in a DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service identifier
    pub id: String,
    /// Service type (e.g., `AtprotoPersonalDataServer`)
    #[serde(rename = "type")]
    pub r#type: String,
    /// String or object; string is the common case
    #[serde(default)]
    pub service_endpoint: Option<serde_json::Value>,
}

impl DidDocument {
    /// Handles declared in `alsoKnownAs` (the `at://` entries)
    pub fn handles(&self) -> Vec<SmolStr> {
        self.also_known_as
            .as_ref()
            .map(|v| {
                v.iter()
                    .filter_map(|s| s.strip_prefix("at://"))
                    .filter(|h| !h.is_empty())
                    .map(SmolStr::new)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The atproto signing key's `publicKeyMultibase`
    ///
    /// Prefers the method whose id ends in `#atproto`, then the first Multikey.
    pub fn atproto_multikey(&self) -> Option<&str> {
        let methods = self.verification_method.as_ref()?;
        methods
            .iter()
            .find(|m| m.id.ends_with("#atproto"))
            .or_else(|| methods.iter().find(|m| m.r#type == "Multikey"))
            .and_then(|m| m.public_key_multibase.as_deref())
    }

    /// Decode the atproto signing key, if the document declares one
    pub fn signing_key(&self) -> Result<Option<PublicKey>, CommitError> {
        self.atproto_multikey().map(PublicKey::decode).transpose()
    }

    /// Extract the AtprotoPersonalDataServer service endpoint as a `Url`.
    /// Accepts endpoint as string or object (string preferred).
    pub fn pds_endpoint(&self) -> Option<Url> {
        let services = self.service.as_ref()?;
        services
            .iter()
            .filter(|s| s.r#type == "AtprotoPersonalDataServer")
            .max_by_key(|s| s.id.ends_with("#atproto_pds"))
            .and_then(|s| match &s.service_endpoint {
                Some(serde_json::Value::String(url)) => Url::parse(url).ok(),
                // Some documents include structured endpoints
                Some(serde_json::Value::Object(obj)) => obj
                    .get("url")
                    .and_then(|v| v.as_str())
                    .and_then(|url| Url::parse(url).ok()),
                _ => None,
            })
    }
}

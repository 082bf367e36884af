//! Enrichment payload returned by the remote service.
//!
//! Each sub-result (merchant, category, location, ...) arrives as
//! `{"status": "found" | "not_found" | "not_applicable", "confidence": 0-100, "data": {...}}`.
//! The status tag is mandatory and a `found` entry must carry its data; anything
//! else is rejected at deserialization time so the executor can classify the
//! response as malformed instead of silently defaulting.

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Status tag carried by every enrichment sub-result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Found,
    NotFound,
    NotApplicable,
}

/// One independently-tagged enrichment sub-result.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Found { confidence: Option<u8>, data: T },
    NotFound { confidence: Option<u8> },
    NotApplicable,
}

impl<T> Enrichment<T> {
    pub fn status(&self) -> EnrichmentStatus {
        match self {
            Enrichment::Found { .. } => EnrichmentStatus::Found,
            Enrichment::NotFound { .. } => EnrichmentStatus::NotFound,
            Enrichment::NotApplicable => EnrichmentStatus::NotApplicable,
        }
    }

    pub fn confidence(&self) -> Option<u8> {
        match self {
            Enrichment::Found { confidence, .. } | Enrichment::NotFound { confidence } => {
                *confidence
            }
            Enrichment::NotApplicable => None,
        }
    }

    /// The data, if the service found a match.
    pub fn found(&self) -> Option<&T> {
        match self {
            Enrichment::Found { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Enrichment::Found { .. })
    }
}

#[derive(Deserialize)]
struct RawEnrichment<T> {
    status: EnrichmentStatus,
    confidence: Option<u8>,
    data: Option<T>,
}

#[derive(Serialize)]
struct RawEnrichmentRef<'a, T> {
    status: EnrichmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

impl<T> TryFrom<RawEnrichment<T>> for Enrichment<T> {
    type Error = String;

    fn try_from(raw: RawEnrichment<T>) -> Result<Self, Self::Error> {
        if let Some(confidence) = raw.confidence {
            if confidence > 100 {
                return Err(format!("confidence {confidence} is outside 0-100"));
            }
        }
        match raw.status {
            EnrichmentStatus::Found => match raw.data {
                Some(data) => Ok(Enrichment::Found {
                    confidence: raw.confidence,
                    data,
                }),
                None => Err("status `found` requires a `data` object".to_string()),
            },
            EnrichmentStatus::NotFound => Ok(Enrichment::NotFound {
                confidence: raw.confidence,
            }),
            EnrichmentStatus::NotApplicable => Ok(Enrichment::NotApplicable),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Enrichment<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawEnrichment::<T>::deserialize(deserializer)?;
        Enrichment::try_from(raw).map_err(de::Error::custom)
    }
}

impl<T: Serialize> Serialize for Enrichment<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawEnrichmentRef {
            status: self.status(),
            confidence: self.confidence(),
            data: self.found(),
        }
        .serialize(serializer)
    }
}

/// The structured enrichment for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentPayload {
    pub merchant: Enrichment<MerchantData>,
    pub category: Enrichment<CategoryData>,
    pub location: Enrichment<LocationData>,
    pub payment_processor: Enrichment<PaymentProcessorData>,
    pub peer_to_peer: Enrichment<PeerToPeerData>,
    pub subscription: Enrichment<SubscriptionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<TransactionChannel>,
}

impl EnrichmentPayload {
    pub fn merchant_name(&self) -> Option<&str> {
        self.merchant.found().map(|m| m.name.as_str())
    }

    pub fn primary_category_name(&self) -> Option<&str> {
        self.category.found().map(|c| c.primary.name.as_str())
    }

    pub fn payment_processor_name(&self) -> Option<&str> {
        self.payment_processor.found().map(|p| p.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alias: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Industry classification codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryCode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcc: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sic: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naics: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CategoryCode>,
}

/// Three-level category hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub primary: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tertiary: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Payment processor, platform or wallet that sat between payer and merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentProcessorData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Person-to-person transfer details (Venmo, PIX, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerToPeerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionData {
    pub recurring: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SubscriptionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Streaming,
    Software,
    News,
    Fitness,
    Mobile,
    Gaming,
    Utilities,
    #[serde(other)]
    Other,
}

/// How the transaction was conducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionChannel {
    InStore,
    Online,
    MobileApp,
    Atm,
    BankTransfer,
    #[serde(other)]
    Unknown,
}

/// Success envelope of the enrich endpoint.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EnrichResponse {
    #[serde(default)]
    pub partial: bool,
    pub data: EnrichmentPayload,
    #[serde(default)]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResponseMeta {
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Error envelope: `{"error": {"code": "...", "message": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

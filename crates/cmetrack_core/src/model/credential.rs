//! Credential template and issued credential models.

use super::db_enum;
use super::person::PersonId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TemplateId = Uuid;

db_enum! {
    pub enum CredentialStatus {
        Active => "ACTIVE",
        Expired => "EXPIRED",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    /// Layout document consumed by the certificate renderer.
    pub field_placements: serde_json::Value,
    pub issued_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCredentialTemplate {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub field_placements: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub id: Uuid,
    pub template_id: TemplateId,
    pub template_name: String,
    pub person_id: PersonId,
    pub display_name: String,
    /// Human-readable `CRED-<year>-<8 hex>` identifier.
    pub credential_number: String,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub status: CredentialStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Issue request; a missing `issue_date` means the day of issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCredential {
    pub template_id: TemplateId,
    pub person_id: PersonId,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialTemplateDetail {
    #[serde(flatten)]
    pub template: CredentialTemplate,
    pub issued: Vec<IssuedCredential>,
}

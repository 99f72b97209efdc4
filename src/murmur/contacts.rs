//! Contact requests between users.
//!
//! Every relationship is stored twice, once under each participant:
//! `users/{owner}/contacts/{other}` with the other side's display name, the
//! request status and whether the owner initiated it. Responses always write
//! the same status to both records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::murmur::Murmur;
use crate::murmur::backend::{Document, Fields, Query, SetMode};
use crate::murmur::error::{MurmurError, Result};
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::Accepted => "accepted",
            ContactStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ContactStatus::Pending),
            "accepted" => Ok(ContactStatus::Accepted),
            "rejected" => Ok(ContactStatus::Rejected),
            other => Err(MurmurError::InvalidInput(format!("unknown contact status: {}", other))),
        }
    }
}

/// One side of a contact relationship, as seen by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: UserId,
    pub display_name: String,
    pub status: ContactStatus,
    /// Whether the owner sent the request
    pub initiator: bool,
}

impl Contact {
    /// Decodes a contact record. Records with an unknown status are skipped.
    pub fn from_document(document: &Document) -> Option<Self> {
        let status = match document.get_str("status").map(ContactStatus::from_str) {
            Some(Ok(status)) => status,
            _ => {
                tracing::warn!(
                    target: "murmur::contacts",
                    "Skipping contact record {} with missing or unknown status",
                    document.id
                );
                return None;
            }
        };

        Some(Self {
            id: UserId::new(document.id.as_str()),
            display_name: document.get_str("displayName").unwrap_or_default().to_string(),
            status,
            initiator: document.get_bool("initiator").unwrap_or(false),
        })
    }
}

pub(crate) fn contacts_path(owner: &UserId) -> String {
    format!("users/{}/contacts", owner)
}

fn contact_fields(display_name: &str, status: ContactStatus, initiator: bool) -> Fields {
    let mut fields = Fields::new();
    fields.insert("displayName".to_string(), display_name.into());
    fields.insert("status".to_string(), status.as_str().into());
    fields.insert("initiator".to_string(), initiator.into());
    fields
}

impl Murmur {
    /// Sends a contact request to the user registered with `email`.
    ///
    /// Creates a pending record on both sides: the sender's marked as
    /// initiator, the recipient's not.
    pub async fn send_contact_request(&self, email: &str) -> Result<Contact> {
        let identity = self.session().identity()?;
        let recipient = self
            .find_user_by_email(email)
            .await?
            .ok_or(MurmurError::UserNotFound)?;

        if recipient.id == identity.id {
            return Err(MurmurError::CannotAddSelf);
        }

        self.store()
            .set_document(
                &contacts_path(&identity.id),
                recipient.id.as_str(),
                contact_fields(&recipient.display_name, ContactStatus::Pending, true),
                SetMode::Overwrite,
            )
            .await?;

        self.store()
            .set_document(
                &contacts_path(&recipient.id),
                identity.id.as_str(),
                contact_fields(&identity.display_name, ContactStatus::Pending, false),
                SetMode::Overwrite,
            )
            .await?;

        tracing::info!(
            target: "murmur::contacts::send_contact_request",
            "Contact request sent from {} to {}",
            identity.id,
            recipient.id
        );

        Ok(Contact {
            id: recipient.id,
            display_name: recipient.display_name,
            status: ContactStatus::Pending,
            initiator: true,
        })
    }

    /// Accepts or rejects a pending request, updating both records alike.
    ///
    /// Only the recipient of a request can respond to it. If the requester's
    /// record cannot be updated, the local record is put back to pending so
    /// both sides still agree and the response can be retried.
    pub async fn respond_to_contact_request(
        &self,
        contact_id: &UserId,
        accept: bool,
    ) -> Result<ContactStatus> {
        let identity = self.session().identity()?;

        let record = self
            .store()
            .get_document(&contacts_path(&identity.id), contact_id.as_str())
            .await?
            .as_ref()
            .and_then(Contact::from_document)
            .filter(|c| c.status == ContactStatus::Pending && !c.initiator)
            .ok_or(MurmurError::ContactNotFound)?;

        let status = if accept {
            ContactStatus::Accepted
        } else {
            ContactStatus::Rejected
        };

        let mut update = Fields::new();
        update.insert("status".to_string(), status.as_str().into());

        self.store()
            .set_document(
                &contacts_path(&identity.id),
                record.id.as_str(),
                update.clone(),
                SetMode::Merge,
            )
            .await?;
        if let Err(e) = self
            .store()
            .set_document(
                &contacts_path(&record.id),
                identity.id.as_str(),
                update,
                SetMode::Merge,
            )
            .await
        {
            tracing::warn!(
                target: "murmur::contacts::respond_to_contact_request",
                "Failed to update {}'s record of {}, reverting to pending: {}",
                record.id,
                identity.id,
                e
            );
            self.revert_to_pending(&identity.id, &record.id).await;
            return Err(e.into());
        }

        tracing::info!(
            target: "murmur::contacts::respond_to_contact_request",
            "{} marked contact {} as {}",
            identity.id,
            record.id,
            status
        );
        Ok(status)
    }

    async fn revert_to_pending(&self, owner: &UserId, contact_id: &UserId) {
        let mut revert = Fields::new();
        revert.insert("status".to_string(), ContactStatus::Pending.as_str().into());

        if let Err(e) = self
            .store()
            .set_document(&contacts_path(owner), contact_id.as_str(), revert, SetMode::Merge)
            .await
        {
            tracing::error!(
                target: "murmur::contacts::respond_to_contact_request",
                "Could not revert {}'s record of {}; records now disagree: {}",
                owner,
                contact_id,
                e
            );
        }
    }

    /// Requests other users sent to the signed-in user that await a response.
    pub async fn pending_contact_requests(&self) -> Result<Vec<Contact>> {
        let identity = self.session().identity()?;
        self.query_contacts(
            Query::collection(contacts_path(&identity.id))
                .where_eq("status", ContactStatus::Pending.as_str())
                .where_eq("initiator", false),
        )
        .await
    }

    pub async fn accepted_contacts(&self) -> Result<Vec<Contact>> {
        let identity = self.session().identity()?;
        self.query_contacts(
            Query::collection(contacts_path(&identity.id))
                .where_eq("status", ContactStatus::Accepted.as_str()),
        )
        .await
    }

    pub async fn contact(&self, contact_id: &UserId) -> Result<Option<Contact>> {
        let identity = self.session().identity()?;
        Ok(self
            .store()
            .get_document(&contacts_path(&identity.id), contact_id.as_str())
            .await?
            .as_ref()
            .and_then(Contact::from_document))
    }

    async fn query_contacts(&self, query: Query) -> Result<Vec<Contact>> {
        let documents = self.store().fetch_once(query).await?;
        let mut contacts: Vec<Contact> = documents.iter().filter_map(Contact::from_document).collect();
        contacts.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.id.cmp(&b.id)));
        Ok(contacts)
    }
}

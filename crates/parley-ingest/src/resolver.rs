// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and conversation resolution.
//!
//! Lookups go to the internal mapping first and fall back to the vendor on a
//! miss. Creation is serialized per external id within this process by
//! [`KeyedLocks`]; across processes the store's unique constraints make the
//! create calls converge on one record.

use std::collections::HashSet;
use std::sync::Arc;

use parley_core::types::{
    Conversation, NewMember, User, now_timestamp, vendor_id_attribute,
};
use parley_core::{ParleyError, StorageAdapter};
use tracing::{debug, info, warn};

use crate::locks::KeyedLocks;
use crate::registry::VendorRegistry;

pub struct Resolver {
    storage: Arc<dyn StorageAdapter>,
    vendors: Arc<VendorRegistry>,
    locks: KeyedLocks,
}

impl Resolver {
    pub fn new(storage: Arc<dyn StorageAdapter>, vendors: Arc<VendorRegistry>) -> Self {
        Self {
            storage,
            vendors,
            locks: KeyedLocks::new(),
        }
    }

    /// Maps a vendor user id to an internal user, creating it from the
    /// vendor profile on first sight. Vendor-sourced users are never internal.
    pub async fn resolve_user(
        &self,
        vendor_name: &str,
        external_user_id: &str,
    ) -> Result<User, ParleyError> {
        let key = vendor_id_attribute(vendor_name);
        if let Some(user) = self.storage.find_user_by_attribute(&key, external_user_id).await? {
            return Ok(user);
        }

        let _guard = self
            .locks
            .lock(&format!("user:{vendor_name}:{external_user_id}"))
            .await;
        if let Some(user) = self.storage.find_user_by_attribute(&key, external_user_id).await? {
            return Ok(user);
        }

        let vendor = self.vendors.get(vendor_name)?;
        let profile = vendor.get_user_info(external_user_id).await?;
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: profile.name,
            email: profile.email,
            is_active: profile.is_active,
            is_internal: false,
            created_at: now_timestamp(),
        };
        let user = self
            .storage
            .create_linked_user(&user, &key, external_user_id)
            .await?;
        info!(user_id = %user.id, vendor = vendor_name, external_user_id, "user created from vendor profile");
        Ok(user)
    }

    /// Maps a vendor conversation id to an internal conversation, creating it
    /// and its members on first sight.
    ///
    /// Participants that fail to resolve are skipped with a warning.
    pub async fn resolve_conversation(
        &self,
        vendor_name: &str,
        external_id: &str,
    ) -> Result<Conversation, ParleyError> {
        if let Some(conversation) = self.storage.find_conversation(vendor_name, external_id).await? {
            return Ok(conversation);
        }

        let _guard = self
            .locks
            .lock(&format!("conversation:{vendor_name}:{external_id}"))
            .await;
        if let Some(conversation) = self.storage.find_conversation(vendor_name, external_id).await? {
            return Ok(conversation);
        }

        let vendor = self.vendors.get(vendor_name)?;
        let info = vendor.get_conversation_info(external_id).await?;

        let mut members = Vec::with_capacity(info.participants.len());
        let mut seen = HashSet::new();
        for participant in &info.participants {
            match self.resolve_user(vendor_name, &participant.external_user_id).await {
                Ok(user) => {
                    if seen.insert(user.id.clone()) {
                        members.push(NewMember {
                            user_id: user.id,
                            role: participant.role.clone(),
                        });
                    }
                }
                Err(e) => warn!(
                    vendor = vendor_name,
                    external_id,
                    participant = %participant.external_user_id,
                    error = %e,
                    "skipping participant that failed to resolve"
                ),
            }
        }

        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            vendor_name: vendor_name.to_string(),
            external_id: external_id.to_string(),
            name: info.name,
            context: info.context,
            metadata: (!info.metadata.is_null()).then(|| info.metadata.to_string()),
            last_message_at: None,
            last_message_content: None,
            created_at: now_timestamp(),
        };
        let conversation = self.storage.create_conversation(&conversation, &members).await?;
        info!(
            conversation_id = %conversation.id,
            vendor = vendor_name,
            external_id,
            members = members.len(),
            "conversation created from vendor info"
        );
        Ok(conversation)
    }

    /// Adds `user_id` to the conversation if it is not yet a member.
    pub async fn ensure_member(
        &self,
        conversation_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<(), ParleyError> {
        let added = self
            .storage
            .add_member(
                conversation_id,
                &NewMember {
                    user_id: user_id.to_string(),
                    role: role.to_string(),
                },
            )
            .await?;
        if added {
            debug!(conversation_id, user_id, "new participant joined conversation");
        }
        Ok(())
    }

    /// Creates or flags an operator identity as internal. Used at startup
    /// for the configured bot and merchant accounts.
    pub async fn provision_internal_user(
        &self,
        vendor_name: &str,
        external_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> Result<User, ParleyError> {
        let key = vendor_id_attribute(vendor_name);
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.map(str::to_string),
            is_active: true,
            is_internal: true,
            created_at: now_timestamp(),
        };
        let stored = self.storage.create_linked_user(&user, &key, external_id).await?;
        if !stored.is_internal {
            warn!(
                user_id = %stored.id,
                vendor = vendor_name,
                external_id,
                "configured internal user is already linked to an external identity"
            );
        }
        Ok(stored)
    }
}

//! Permission gate.
//!
//! A user may act on a record when they are a superuser, hold the admin role,
//! or own the record. Ownership is per entity: who created a client, who a
//! lead is assigned to, who created or is assigned to a matter, who uploaded
//! a document, who initiated a compliance check. Failing the gate is never a
//! hard error; the web layer redirects with a message.

use crate::account::User;
use crate::client::{Client, Lead};
use crate::compliance::ComplianceCheck;
use crate::document::Document;
use crate::matter::Matter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Delete,
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Edit => "edit",
            Action::Delete => "delete",
        }
    }
}

/// Records with an owner relation.
pub trait Owned {
    /// Singular noun used in denial messages.
    const NOUN: &'static str;

    fn is_owned_by(&self, user_id: i64, action: Action) -> bool;
}

/// The gate itself.
pub fn allowed<T: Owned>(user: &User, record: &T, action: Action) -> bool {
    user.is_privileged() || record.is_owned_by(user.id, action)
}

/// `You do not have permission to edit this matter.`
pub fn denial_message<T: Owned>(action: Action) -> String {
    format!(
        "You do not have permission to {} this {}.",
        action.verb(),
        T::NOUN
    )
}

/// Matter document uploads: creator or assignee.
pub fn can_upload_to_matter(user: &User, matter: &Matter) -> bool {
    user.is_privileged()
        || matter.created_by == Some(user.id)
        || matter.assigned_user_ids.contains(&user.id)
}

impl Owned for Client {
    const NOUN: &'static str = "client";

    fn is_owned_by(&self, user_id: i64, _action: Action) -> bool {
        self.created_by == Some(user_id)
    }
}

impl Owned for Lead {
    const NOUN: &'static str = "lead";

    fn is_owned_by(&self, user_id: i64, _action: Action) -> bool {
        self.assigned_to == Some(user_id)
    }
}

impl Owned for Matter {
    const NOUN: &'static str = "matter";

    fn is_owned_by(&self, user_id: i64, action: Action) -> bool {
        let creator = self.created_by == Some(user_id);
        match action {
            Action::Delete => creator,
            Action::View | Action::Edit => creator || self.assigned_user_ids.contains(&user_id),
        }
    }
}

impl Owned for Document {
    const NOUN: &'static str = "document";

    fn is_owned_by(&self, user_id: i64, _action: Action) -> bool {
        self.uploaded_by == user_id
    }
}

impl Owned for ComplianceCheck {
    const NOUN: &'static str = "compliance check";

    fn is_owned_by(&self, user_id: i64, _action: Action) -> bool {
        self.initiated_by == Some(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::testing::{sample_matter, sample_user};

    #[test]
    fn matter_delete_is_creator_only() {
        let mut matter = sample_matter(1);
        matter.created_by = Some(10);
        matter.assigned_user_ids = vec![20];

        let creator = sample_user(10, Role::Notary);
        let assignee = sample_user(20, Role::Solicitor);
        let stranger = sample_user(30, Role::PaidUser);

        assert!(allowed(&assignee, &matter, Action::Edit));
        assert!(!allowed(&assignee, &matter, Action::Delete));
        assert!(allowed(&creator, &matter, Action::Delete));
        assert!(!allowed(&stranger, &matter, Action::View));
    }

    #[test]
    fn admin_role_and_superuser_pass_everything() {
        let matter = sample_matter(1);
        let admin = sample_user(99, Role::Admin);
        let mut superuser = sample_user(98, Role::PaidUser);
        superuser.is_superuser = true;
        assert!(allowed(&admin, &matter, Action::Delete));
        assert!(allowed(&superuser, &matter, Action::Delete));
    }

    #[test]
    fn upload_to_matter_allows_assignees() {
        let mut matter = sample_matter(1);
        matter.assigned_user_ids = vec![5];
        assert!(can_upload_to_matter(&sample_user(5, Role::Notary), &matter));
        assert!(!can_upload_to_matter(&sample_user(6, Role::Notary), &matter));
    }

    #[test]
    fn denial_message_names_entity() {
        assert_eq!(
            denial_message::<Matter>(Action::Edit),
            "You do not have permission to edit this matter."
        );
    }
}

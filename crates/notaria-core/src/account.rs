//! Users, roles and password hashing.

use chrono::NaiveDateTime;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    /// Fixed role set. Only `Admin` widens access; the others are labels.
    pub enum Role {
        Admin => ("admin", "Administrator"),
        PaidUser => ("paid_user", "Paid User"),
        Notary => ("notary", "Notary"),
        Solicitor => ("solicitor", "Solicitor"),
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::PaidUser
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_superuser: bool,
    pub is_active: bool,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub created_at: NaiveDateTime,
}

impl User {
    /// Superusers and the admin role see and manage everything.
    pub fn is_privileged(&self) -> bool {
        self.is_superuser || self.role == Role::Admin
    }
}

/// Insert payload for a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl NewUser {
    pub fn new(username: &str, email: &str, password: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password),
            role,
            is_superuser: false,
        }
    }
}

// ── Registration ──

pub const MIN_PASSWORD_LEN: usize = 8;

/// Validate the public sign-up form. Username uniqueness is checked by the
/// store; the admin role cannot be self-assigned.
pub fn registration_from_form(form: &FormData) -> Result<NewUser, FormErrors> {
    let mut errors = FormErrors::new();
    let username = forms::required_text(form, "username", "This field is required.", &mut errors);
    if !username.is_empty()
        && !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@.+-_".contains(c))
    {
        errors.add(
            "username",
            "Enter a valid username. Letters, digits and @/./+/-/_ only.",
        );
    }

    let email = forms::required_text(form, "email", "This field is required.", &mut errors);
    if !email.is_empty() && !forms::is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
    }

    let password = form.raw("password1").unwrap_or_default();
    let confirm = form.raw("password2").unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password1",
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if password != confirm {
        errors.add("password2", "The two password fields didn't match.");
    }

    let role = forms::choice(form, "role", Role::PaidUser, &mut errors);
    if role == Role::Admin {
        errors.add("role", "Select a valid choice. admin is not one of the available choices.");
    }

    let user = NewUser {
        username,
        email,
        password_hash: String::new(),
        role,
        is_superuser: false,
    };
    let mut user = errors.into_result(user)?;
    user.password_hash = hash_password(password);
    Ok(user)
}

// ── Password hashing ──
//
// Stored as `sha256$<salt-hex>$<digest-hex>` where the digest is SHA-256
// applied HASH_ROUNDS times over salt || password.

const HASH_ROUNDS: u32 = 10_000;
const SALT_LEN: usize = 16;

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let salt_hex = hex::encode(salt);
    let digest = stretch(&salt_hex, password);
    format!("sha256${salt_hex}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some("sha256"), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let actual = stretch(salt, password);
    constant_time_eq(actual.as_bytes(), expected.as_bytes())
}

fn stretch(salt: &str, password: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize();
    }
    hex::encode(digest)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

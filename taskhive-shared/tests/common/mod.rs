//! Shared fixtures for the in-memory service tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use taskhive_shared::auth::password::HashingParams;
use taskhive_shared::invite_code::{generate_invite_code, InviteCodeSource};
use taskhive_shared::models::organization::Organization;
use taskhive_shared::models::task::Task;
use taskhive_shared::services::identity::Registration;
use taskhive_shared::services::organizations::NewOrganization;
use taskhive_shared::services::tasks::NewTask;
use taskhive_shared::services::{IdentitySettings, ServiceSettings, Services};
use taskhive_shared::store::{MemoryStore, SharedStore};
use uuid::Uuid;

pub const PASSWORD: &str = "Secret123!";
pub const JWT_SECRET: &str = "test-secret-key-with-at-least-32-characters";

/// Plays back fixed codes, then falls back to random ones
pub struct ScriptedCodes {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedCodes {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }

    /// Scripted codes not yet drawn
    pub fn remaining(&self) -> usize {
        self.codes.lock().unwrap().len()
    }
}

impl InviteCodeSource for ScriptedCodes {
    fn next_code(&self) -> String {
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(generate_invite_code)
    }
}

/// Always returns the same code
pub struct ConstantCode(pub &'static str);

impl InviteCodeSource for ConstantCode {
    fn next_code(&self) -> String {
        self.0.to_string()
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub services: Services,
}

pub fn settings() -> ServiceSettings {
    let mut identity = IdentitySettings::new(JWT_SECRET);
    identity.hashing = HashingParams::fast_insecure();
    ServiceSettings::new(identity)
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let shared: SharedStore = store.clone();
    Harness {
        services: Services::new(shared, settings()),
        store,
    }
}

pub fn harness_with_codes(codes: Arc<dyn InviteCodeSource>, max_attempts: u32) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let shared: SharedStore = store.clone();
    let mut settings = settings();
    settings.invite_code_max_attempts = max_attempts;
    Harness {
        services: Services::with_invite_codes(shared, settings, codes),
        store,
    }
}

pub fn due(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

impl Harness {
    pub async fn user(&self, name: &str) -> Uuid {
        self.services
            .identity
            .register(Registration {
                full_name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase()),
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn org(&self, owner: Uuid, name: &str) -> Organization {
        self.services
            .organizations
            .create(
                owner,
                NewOrganization {
                    name: name.to_string(),
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    /// Creates an organization owned by `owner` with `members` joined
    pub async fn org_with(&self, owner: Uuid, members: &[Uuid]) -> Organization {
        let org = self.org(owner, "Eng").await;
        for member in members {
            self.services
                .organizations
                .join(&org.invite_code, *member)
                .await
                .unwrap();
        }
        org
    }

    pub async fn task(&self, org_id: Uuid, creator: Uuid, assignee: Option<Uuid>) -> Task {
        self.services
            .tasks
            .create(
                NewTask {
                    org_id,
                    title: "Fix bug".to_string(),
                    due_at: due(2025, 6, 1),
                    description: None,
                    assigned_to: assignee,
                },
                creator,
            )
            .await
            .unwrap()
    }
}

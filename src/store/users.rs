use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{NewUser, Role, User, UserUpdate};
use crate::persist::{PersistedState, StorageScope, Storages};

use super::{Snapshot, local_id, matches_query, same_label};

/// Storage slot of the persisted user and role lists.
pub const USER_STORE_KEY: &str = "ecosystia-user-store";

/// `by_role` key for users without a role.
pub const NO_ROLE: &str = "unassigned";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UsersState {
    users: Vec<User>,
    roles: Vec<Role>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserStats {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub by_role: BTreeMap<String, usize>,
}

/// User directory state: users and the roles they can hold, both kept on
/// the client and persisted together.
pub struct UserStore {
    persisted: PersistedState<Snapshot<UsersState>>,
    loading: bool,
    error: Option<String>,
}

impl UserStore {
    pub fn new(storages: &Storages) -> Self {
        Self {
            persisted: PersistedState::new(
                USER_STORE_KEY,
                Snapshot::default(),
                StorageScope::Local,
                storages,
            ),
            loading: false,
            error: None,
        }
    }

    pub fn users(&self) -> &[User] {
        &self.persisted.get().state.users
    }

    pub fn roles(&self) -> &[Role] {
        &self.persisted.get().state.roles
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn fetch_users<F, E>(&mut self, source: F) -> Result<(), E>
    where
        F: Future<Output = Result<Vec<User>, E>>,
        E: fmt::Display,
    {
        self.loading = true;
        self.error = None;
        let result = source.await;
        self.loading = false;
        match result {
            Ok(users) => {
                self.persisted.update(|s| s.state.users = users);
                Ok(())
            }
            Err(e) => Err(self.fail("load users", e)),
        }
    }

    /// Like `fetch_users`, but leaves the loading flag alone.
    pub async fn fetch_roles<F, E>(&mut self, source: F) -> Result<(), E>
    where
        F: Future<Output = Result<Vec<Role>, E>>,
        E: fmt::Display,
    {
        match source.await {
            Ok(roles) => {
                self.persisted.update(|s| s.state.roles = roles);
                Ok(())
            }
            Err(e) => Err(self.fail("load roles", e)),
        }
    }

    /// Append to the list and return the stored user.
    pub fn add_user(&mut self, data: NewUser) -> User {
        self.error = None;
        let id = local_id(|id| self.get_user_by_id(id).is_some());
        let user = data.into_user(id);
        let created = user.clone();
        self.persisted.update(|s| s.state.users.push(user));
        created
    }

    pub fn update_user(&mut self, id: &str, data: &UserUpdate) -> Option<User> {
        self.error = None;
        self.get_user_by_id(id)?;
        let mut updated = None;
        self.persisted.update(|s| {
            if let Some(user) = s.state.users.iter_mut().find(|u| u.id == id) {
                user.apply(data);
                updated = Some(user.clone());
            }
        });
        updated
    }

    pub fn delete_user(&mut self, id: &str) -> bool {
        self.error = None;
        if self.get_user_by_id(id).is_none() {
            return false;
        }
        self.persisted.update(|s| s.state.users.retain(|u| u.id != id));
        true
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Drop users, roles and flags.
    pub fn reset(&mut self) {
        self.persisted.set(Snapshot::default());
        self.loading = false;
        self.error = None;
    }

    /// Case-insensitive match on name, email and role.
    pub fn search_users(&self, query: &str) -> Vec<&User> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.users().iter().collect();
        }
        self.users()
            .iter()
            .filter(|u| {
                matches_query(&u.name, &query)
                    || matches_query(&u.email, &query)
                    || u.role.as_deref().is_some_and(|r| matches_query(r, &query))
            })
            .collect()
    }

    pub fn filter_by_role(&self, role: &str) -> Vec<&User> {
        self.users()
            .iter()
            .filter(|u| u.role.as_deref() == Some(role))
            .collect()
    }

    pub fn filter_by_status(&self, status: &str) -> Vec<&User> {
        self.users()
            .iter()
            .filter(|u| same_label(&u.status, status))
            .collect()
    }

    pub fn get_user_by_id(&self, id: &str) -> Option<&User> {
        self.users().iter().find(|u| u.id == id)
    }

    /// Emails compare case-insensitively.
    pub fn get_user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        self.users()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn stats(&self) -> UserStats {
        let users = self.users();
        let mut by_role = BTreeMap::new();
        for user in users {
            let role = user.role.as_deref().unwrap_or(NO_ROLE);
            *by_role.entry(role.to_string()).or_insert(0) += 1;
        }
        UserStats {
            total: users.len(),
            active: users.iter().filter(|u| same_label(&u.status, "active")).count(),
            inactive: users.iter().filter(|u| same_label(&u.status, "inactive")).count(),
            by_role,
        }
    }

    fn fail<E: fmt::Display>(&mut self, action: &str, error: E) -> E {
        warn!(action, error = %error, "User store action failed");
        self.error = Some(error.to_string());
        error
    }
}

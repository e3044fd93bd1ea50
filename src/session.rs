//! Per-user session state.
//!
//! Every field of [`UserSession`] exists from construction; "no template"
//! is `None`, not a missing map entry. Workflows never hold the store's lock
//! across an `.await`: they take a [`SessionStore::snapshot`], compute, and
//! write the result back with [`SessionStore::update`] or
//! [`SessionStore::persist_template`].

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::DEFAULT_MODEL;
use crate::error::EditError;
use crate::lock::{rw_read, rw_write};

/// Chat-platform user identifier.
pub type UserId = i64;

/// The document a user is iteratively editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSession {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filename: String,
    /// 0 for the upload, +1 per applied edit.
    pub revision: u32,
}

impl TemplateSession {
    pub fn uploaded(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            filename: filename.into(),
            revision: 0,
        }
    }

    /// The next revision of this template.
    pub fn edited(&self, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: self.filename.clone(),
            revision: self.revision + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSession {
    pub model: String,
    pub template_mode: bool,
    pub template: Option<TemplateSession>,
    /// Changes whenever the template is replaced or discarded. An edit is
    /// only stored if the generation it started from is still current.
    pub generation: u64,
}

impl Default for UserSession {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            template_mode: false,
            template: None,
            generation: 0,
        }
    }
}

impl UserSession {
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn enable_template_mode(&mut self) {
        self.template_mode = true;
    }

    /// Leaving template mode discards the template.
    pub fn disable_template_mode(&mut self) {
        self.template_mode = false;
        self.template = None;
        self.generation += 1;
    }

    /// Store an uploaded template, replacing any previous one.
    pub fn upload_template(
        &mut self,
        bytes: Vec<u8>,
        filename: impl Into<String>,
    ) -> Result<(), EditError> {
        if !self.template_mode {
            return Err(EditError::TemplateModeDisabled);
        }
        self.template = Some(TemplateSession::uploaded(bytes, filename));
        self.generation += 1;
        Ok(())
    }

    /// The current template, if template mode is on and one was uploaded.
    pub fn current_template(&self) -> Result<&TemplateSession, EditError> {
        if !self.template_mode {
            return Err(EditError::TemplateModeDisabled);
        }
        self.template.as_ref().ok_or(EditError::NoTemplate)
    }
}

/// All sessions, keyed by user.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, UserSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the user's session; a default session if there is none yet.
    pub fn snapshot(&self, user: UserId) -> UserSession {
        rw_read(&self.sessions, "session.snapshot")
            .get(&user)
            .cloned()
            .unwrap_or_default()
    }

    /// Mutate the user's session in place, creating it if needed.
    pub fn update<R>(&self, user: UserId, f: impl FnOnce(&mut UserSession) -> R) -> R {
        let mut sessions = rw_write(&self.sessions, "session.update");
        f(sessions.entry(user).or_default())
    }

    /// Write back a template edited from the snapshot taken at
    /// `base_generation`.
    ///
    /// Returns `false` and leaves the session alone when the template was
    /// replaced or discarded (or another edit was stored) in the meantime.
    pub fn persist_template(
        &self,
        user: UserId,
        base_generation: u64,
        template: TemplateSession,
    ) -> bool {
        self.update(user, |session| {
            if !session.template_mode || session.generation != base_generation {
                info!(
                    "Dropping edited '{}' for user {}: session changed during the edit",
                    template.filename, user
                );
                return false;
            }
            debug!(
                "Persisting '{}' revision {} for user {}",
                template.filename, template.revision, user
            );
            session.template = Some(template);
            session.generation += 1;
            true
        })
    }

    pub fn remove(&self, user: UserId) -> Option<UserSession> {
        rw_write(&self.sessions, "session.remove").remove(&user)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.sessions, "session.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

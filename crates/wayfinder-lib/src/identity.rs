//! Identity and profile collaborator.
//!
//! The HTTP layer only talks to [`IdentityStore`]; storage and credential
//! handling live behind it. [`MemoryIdentityStore`] is the in-process
//! implementation used for development and tests.
//!
//! A caller is resolved once per request into an [`Identity`]. Anonymous
//! callers get a fresh guest [`Profile`] every time; nothing about them is
//! kept in shared state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::coordinate::is_present;
use crate::error::{Error, Result};

/// bcrypt work factor used for stored passwords.
pub const DEFAULT_HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Cheapest bcrypt work factor; only meant for tests.
pub const MIN_HASH_COST: u32 = 4; // bcrypt::MIN_COST (private in bcrypt 0.18)

/// How long a session stays valid after signup or login.
pub const DEFAULT_SESSION_DAYS: i64 = 30;

/// Stable numeric identifier of an account.
pub type UserId = u64;

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Editable profile attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    pub bio: String,
}

impl Profile {
    /// The profile shown to callers without a session.
    pub fn guest() -> Self {
        Self {
            name: "Guest".to_string(),
            email: String::new(),
            bio: String::new(),
        }
    }

    /// Profile derived from account data for users who never saved one.
    pub fn for_user(user: &User) -> Self {
        Self {
            name: user.username.clone(),
            email: user.email.clone(),
            bio: String::new(),
        }
    }
}

/// Who is making the request, resolved once at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    AuthenticatedUser(User),
    AuthenticatedUserWithProfile(User, Profile),
}

impl Identity {
    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::AuthenticatedUser(user) | Identity::AuthenticatedUserWithProfile(user, _) => {
                Some(user)
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// The profile that should be displayed for this identity.
    pub fn profile(&self) -> Profile {
        match self {
            Identity::Anonymous => Profile::guest(),
            Identity::AuthenticatedUser(user) => Profile::for_user(user),
            Identity::AuthenticatedUserWithProfile(_, profile) => profile.clone(),
        }
    }
}

/// Partial profile update; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
}

impl ProfileUpdate {
    /// Read an update from either `{"profile": {...}}` or the fields at top level.
    ///
    /// An empty or falsy `profile` (`{}`, `[]`, `false`, `0`, `""`, `null`)
    /// selects the top-level fields instead.
    pub fn from_json(body: &Value) -> Result<Self> {
        if !body.is_object() {
            return Err(invalid_profile("profile update must be a JSON object"));
        }

        let fields = match body.get("profile").filter(|v| is_present(v)) {
            Some(Value::Object(nested)) => Value::Object(nested.clone()),
            Some(_) => return Err(invalid_profile("'profile' must be a JSON object")),
            None => body.clone(),
        };

        Ok(Self {
            name: string_field(&fields, "name")?,
            email: string_field(&fields, "email")?,
            bio: string_field(&fields, "bio")?,
        })
    }

    pub fn apply(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(email) = &self.email {
            profile.email = email.clone();
        }
        if let Some(bio) = &self.bio {
            profile.bio = bio.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.bio.is_none()
    }
}

fn string_field(fields: &Value, name: &str) -> Result<Option<String>> {
    match fields.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid_profile(format!("'{}' must be a string", name))),
    }
}

fn invalid_profile(message: impl Into<String>) -> Error {
    Error::InvalidProfile {
        message: message.into(),
    }
}

/// Opaque session token handed to clients after signup or login.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generate a new UUID v7 token.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Signup input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A user together with the session opened for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub token: SessionToken,
}

/// External user/session collaborator.
pub trait IdentityStore: Send + Sync {
    /// Create an account and open a session for it.
    fn signup(&self, account: NewAccount) -> Result<Session>;

    /// Verify credentials and open a session.
    fn login(&self, username: &str, password: &str) -> Result<Session>;

    /// End a session. Returns whether the token was known.
    fn logout(&self, token: &SessionToken) -> Result<bool>;

    /// Resolve an optional session token. Unknown tokens are anonymous.
    fn resolve(&self, token: Option<&SessionToken>) -> Result<Identity>;

    /// Persist `profile` for `user` and return the stored value.
    fn save_profile(&self, user: &User, profile: Profile) -> Result<Profile>;
}

struct Account {
    user: User,
    password_hash: String,
    profile: Option<Profile>,
}

struct SessionEntry {
    username: String,
    expires_at: DateTime<Utc>,
}

impl SessionEntry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
struct Accounts {
    by_username: HashMap<String, Account>,
    sessions: HashMap<SessionToken, SessionEntry>,
    next_id: UserId,
}

impl Accounts {
    /// Drop expired sessions, then open a new one for `username`.
    fn open_session(&mut self, username: String, ttl: TimeDelta) -> SessionToken {
        let now = Utc::now();
        self.sessions.retain(|_, entry| entry.is_live(now));

        let token = SessionToken::generate();
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                username,
                expires_at: now + ttl,
            },
        );
        token
    }
}

/// In-memory [`IdentityStore`].
///
/// Passwords are stored as bcrypt hashes. Sessions expire after
/// [`DEFAULT_SESSION_DAYS`] unless configured otherwise; expired sessions
/// resolve as anonymous and are pruned.
pub struct MemoryIdentityStore {
    accounts: RwLock<Accounts>,
    hash_cost: u32,
    session_ttl: TimeDelta,
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self {
            accounts: RwLock::default(),
            hash_cost: DEFAULT_HASH_COST,
            session_ttl: TimeDelta::days(DEFAULT_SESSION_DAYS),
        }
    }
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the bcrypt work factor.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Override how long new sessions stay valid.
    pub fn with_session_ttl(mut self, ttl: TimeDelta) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Number of registered accounts.
    pub fn len(&self) -> usize {
        self.read().map(|a| a.by_username.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of sessions currently held, expired ones included.
    pub fn session_count(&self) -> usize {
        self.read().map(|a| a.sessions.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Accounts>> {
        self.accounts.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Accounts>> {
        self.accounts.write().map_err(|_| poisoned())
    }
}

impl fmt::Debug for MemoryIdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIdentityStore")
            .field("accounts", &self.len())
            .field("sessions", &self.session_count())
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

fn poisoned() -> Error {
    Error::StoreUnavailable {
        message: "account lock poisoned".to_string(),
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn signup(&self, account: NewAccount) -> Result<Session> {
        let username = account.username.trim().to_string();
        if username.is_empty() || account.password.is_empty() {
            return Err(Error::MissingCredentials);
        }

        if self.read()?.by_username.contains_key(&username) {
            return Err(Error::UsernameTaken { username });
        }
        // Hash outside the lock; bcrypt is deliberately slow.
        let password_hash = bcrypt::hash(&account.password, self.hash_cost)?;

        let mut accounts = self.write()?;
        if accounts.by_username.contains_key(&username) {
            return Err(Error::UsernameTaken { username });
        }

        accounts.next_id += 1;
        let user = User {
            id: accounts.next_id,
            username: username.clone(),
            email: account.email.trim().to_string(),
        };
        accounts.by_username.insert(
            username.clone(),
            Account {
                user: user.clone(),
                password_hash,
                profile: None,
            },
        );

        let token = accounts.open_session(username, self.session_ttl);
        info!(user_id = user.id, username = %user.username, "account created");

        Ok(Session { user, token })
    }

    fn login(&self, username: &str, password: &str) -> Result<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(Error::MissingCredentials);
        }

        let (user, password_hash) = match self.read()?.by_username.get(username) {
            Some(account) => (account.user.clone(), account.password_hash.clone()),
            None => return Err(Error::InvalidCredentials),
        };
        if !bcrypt::verify(password, &password_hash)? {
            return Err(Error::InvalidCredentials);
        }

        let token = self
            .write()?
            .open_session(user.username.clone(), self.session_ttl);
        debug!(user_id = user.id, "session opened");

        Ok(Session { user, token })
    }

    fn logout(&self, token: &SessionToken) -> Result<bool> {
        Ok(self.write()?.sessions.remove(token).is_some())
    }

    fn resolve(&self, token: Option<&SessionToken>) -> Result<Identity> {
        let Some(token) = token else {
            return Ok(Identity::Anonymous);
        };

        let now = Utc::now();
        {
            let accounts = self.read()?;
            match accounts.sessions.get(token) {
                None => return Ok(Identity::Anonymous),
                Some(entry) if entry.is_live(now) => {
                    return Ok(match accounts.by_username.get(&entry.username) {
                        None => Identity::Anonymous,
                        Some(account) => match &account.profile {
                            Some(profile) => Identity::AuthenticatedUserWithProfile(
                                account.user.clone(),
                                profile.clone(),
                            ),
                            None => Identity::AuthenticatedUser(account.user.clone()),
                        },
                    });
                }
                Some(_) => {}
            }
        }

        if self.write()?.sessions.remove(token).is_some() {
            debug!("expired session pruned");
        }
        Ok(Identity::Anonymous)
    }

    fn save_profile(&self, user: &User, profile: Profile) -> Result<Profile> {
        let mut accounts = self.write()?;
        let account = accounts
            .by_username
            .get_mut(&user.username)
            .ok_or_else(|| Error::StoreUnavailable {
                message: format!("account {} no longer exists", user.id),
            })?;
        account.profile = Some(profile.clone());
        Ok(profile)
    }
}

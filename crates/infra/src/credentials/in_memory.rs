//! In-memory credential store for tests/dev.
//!
//! Secrets are stored as Argon2id PHC strings. Identifier and email lookups
//! are case-insensitive through normalized indexes. Verification and the
//! lockout counter are updated under one write lock. Hashing runs on the
//! blocking pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use tokio::sync::OnceCell;
use tokio::task::JoinError;

use eshop_auth::{
    Credential, CredentialStore, CredentialUpdate, NewCredential, Role, SignInOutcome, StoreError,
};
use eshop_core::{FilterSpec, UserId};

use super::policy::{LockoutPolicy, PasswordPolicy};
use crate::read_model::in_memory::page_slice;
use crate::read_model::{RecordSource, SourceError};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug)]
struct Account {
    credential: Credential,
    password_hash: String,
    roles: Vec<Role>,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
}

impl Account {
    fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug, Default)]
struct Accounts {
    by_id: BTreeMap<UserId, Account>,
    by_name: HashMap<String, UserId>,
    by_email: HashMap<String, UserId>,
    /// Ids in creation order; the directory listing order.
    created: Vec<UserId>,
}

impl Accounts {
    fn find_by_name(&self, identifier: &str) -> Option<&Account> {
        self.by_name
            .get(&normalize(identifier))
            .and_then(|id| self.by_id.get(id))
    }

    fn find_by_email(&self, email: &str) -> Option<&Account> {
        self.by_email
            .get(&normalize(email))
            .and_then(|id| self.by_id.get(id))
    }

    fn in_creation_order(&self) -> impl Iterator<Item = &Credential> {
        self.created
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .map(|a| &a.credential)
    }
}

/// Hashed once per store and verified against when the identifier is unknown.
const UNKNOWN_ACCOUNT_SECRET: &str = "unknown-account";

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub struct InMemoryCredentialStore {
    accounts: RwLock<Accounts>,
    hasher: Argon2<'static>,
    unknown_account_hash: OnceCell<String>,
    password_policy: PasswordPolicy,
    lockout: LockoutPolicy,
    clock: Clock,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(Accounts::default()),
            hasher: Argon2::default(),
            unknown_account_hash: OnceCell::new(),
            password_policy: PasswordPolicy::default(),
            lockout: LockoutPolicy::default(),
            clock: Arc::new(Utc::now),
        }
    }

    /// Override the Argon2id cost parameters used for new hashes.
    pub fn with_hash_params(mut self, params: Params) -> Self {
        self.hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        self.unknown_account_hash = OnceCell::new();
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Add `role` to an account. Granting a role twice is a no-op.
    pub fn grant_role(&self, id: UserId, role: Role) -> Result<(), StoreError> {
        let mut accounts = self.write()?;
        let account = accounts
            .by_id
            .get_mut(&id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown account {id}")))?;
        if !account.roles.contains(&role) {
            account.roles.push(role);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.accounts.read().map(|a| a.by_id.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Accounts>, StoreError> {
        self.accounts
            .read()
            .map_err(|_| StoreError::Unavailable("credential store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Accounts>, StoreError> {
        self.accounts
            .write()
            .map_err(|_| StoreError::Unavailable("credential store lock poisoned".into()))
    }

    async fn hash(&self, password: &str) -> Result<String, StoreError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            hasher
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| StoreError::Rejected(format!("password hashing failed: {e}")))
        })
        .await
        .map_err(hashing_task_failed)?
    }

    async fn verify(&self, hash: String, password: &str) -> Result<bool, StoreError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || match PasswordHash::new(&hash) {
            Ok(parsed) => hasher.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        })
        .await
        .map_err(hashing_task_failed)
    }
}

fn hashing_task_failed(e: JoinError) -> StoreError {
    StoreError::Unavailable(format!("password hashing task failed: {e}"))
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.read()?.find_by_name(identifier).map(|a| a.credential.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Credential>, StoreError> {
        Ok(self.read()?.by_id.get(&id).map(|a| a.credential.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.read()?.find_by_email(email).map(|a| a.credential.clone()))
    }

    async fn email_taken_by_other(&self, email: &str, except: UserId) -> Result<bool, StoreError> {
        Ok(self
            .read()?
            .by_email
            .get(&normalize(email))
            .is_some_and(|owner| *owner != except))
    }

    async fn verify_secret(
        &self,
        id: UserId,
        secret: &str,
        lockout_on_failure: bool,
    ) -> Result<SignInOutcome, StoreError> {
        let now = (self.clock)();

        let hash = {
            let accounts = self.read()?;
            let Some(account) = accounts.by_id.get(&id) else {
                return Ok(SignInOutcome::Failed);
            };
            if account.is_locked(now) {
                return Ok(SignInOutcome::LockedOut);
            }
            account.password_hash.clone()
        };

        // Hash outside the lock; the outcome is applied under the write lock.
        let matches = self.verify(hash, secret).await?;

        let mut accounts = self.write()?;
        let Some(account) = accounts.by_id.get_mut(&id) else {
            return Ok(SignInOutcome::Failed);
        };
        if account.is_locked(now) {
            return Ok(SignInOutcome::LockedOut);
        }
        if matches {
            account.failed_attempts = 0;
            account.locked_until = None;
            return Ok(SignInOutcome::Succeeded);
        }
        if !lockout_on_failure {
            return Ok(SignInOutcome::Failed);
        }

        account.failed_attempts += 1;
        if account.failed_attempts >= self.lockout.max_failed_attempts {
            let until = now + self.lockout.lockout;
            account.failed_attempts = 0;
            account.locked_until = Some(until);
            tracing::warn!(user_id = %id, %until, "account locked out after repeated failures");
            return Ok(SignInOutcome::LockedOut);
        }
        Ok(SignInOutcome::Failed)
    }

    async fn verify_unknown(&self, secret: &str) -> Result<SignInOutcome, StoreError> {
        let hash = self
            .unknown_account_hash
            .get_or_try_init(|| self.hash(UNKNOWN_ACCOUNT_SECRET))
            .await?
            .clone();
        // No account to match; the result only matters for its cost.
        self.verify(hash, secret).await?;
        Ok(SignInOutcome::Failed)
    }

    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError> {
        self.password_policy
            .check(&credential.password)
            .map_err(StoreError::Rejected)?;

        let name_key = normalize(&credential.user_name);
        let email_key = normalize(&credential.email);
        {
            let accounts = self.read()?;
            if accounts.by_name.contains_key(&name_key) {
                return Err(StoreError::DuplicateIdentifier);
            }
            if accounts.by_email.contains_key(&email_key) {
                return Err(StoreError::DuplicateEmail);
            }
        }

        let password_hash = self.hash(&credential.password).await?;
        let id = UserId::new();
        let account = Account {
            credential: Credential {
                id,
                user_name: credential.user_name,
                first_name: credential.first_name,
                last_name: credential.last_name,
                dob: credential.dob,
                email: credential.email,
                phone_number: credential.phone_number,
                created_at: (self.clock)(),
            },
            password_hash,
            roles: Vec::new(),
            failed_attempts: 0,
            locked_until: None,
        };

        let mut accounts = self.write()?;
        // Re-check: another create may have won the race while we were hashing.
        if accounts.by_name.contains_key(&name_key) {
            return Err(StoreError::DuplicateIdentifier);
        }
        if accounts.by_email.contains_key(&email_key) {
            return Err(StoreError::DuplicateEmail);
        }
        accounts.by_name.insert(name_key, id);
        accounts.by_email.insert(email_key, id);
        accounts.by_id.insert(id, account);
        accounts.created.push(id);

        tracing::debug!(user_id = %id, "credential created");
        Ok(id)
    }

    async fn update(&self, id: UserId, update: CredentialUpdate) -> Result<u64, StoreError> {
        let mut accounts = self.write()?;
        let new_key = normalize(&update.email);
        if accounts.by_email.get(&new_key).is_some_and(|owner| *owner != id) {
            return Err(StoreError::DuplicateEmail);
        }

        let Some(account) = accounts.by_id.get_mut(&id) else {
            return Ok(0);
        };
        let old_key = normalize(&account.credential.email);
        let c = &mut account.credential;
        c.first_name = update.first_name;
        c.last_name = update.last_name;
        c.dob = update.dob;
        c.email = update.email;
        c.phone_number = update.phone_number;

        if old_key != new_key {
            accounts.by_email.remove(&old_key);
            accounts.by_email.insert(new_key, id);
        }
        Ok(1)
    }

    async fn list_roles(&self, id: UserId) -> Result<Vec<Role>, StoreError> {
        Ok(self
            .read()?
            .by_id
            .get(&id)
            .map(|a| a.roles.clone())
            .unwrap_or_default())
    }
}

/// The user directory pages over credentials in creation order.
#[async_trait]
impl RecordSource<Credential> for InMemoryCredentialStore {
    async fn count(&self, filter: &FilterSpec) -> Result<u64, SourceError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.in_creation_order().filter(|c| filter.matches(*c)).count() as u64)
    }

    async fn fetch(&self, filter: &FilterSpec, skip: u64, take: u64) -> Result<Vec<Credential>, SourceError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(page_slice(accounts.in_creation_order(), filter, skip, take))
    }
}

fn poisoned() -> SourceError {
    SourceError::Backend("credential store lock poisoned".into())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{Duration, NaiveDate};
    use eshop_auth::credential_fields;

    use super::*;

    fn cheap_store() -> InMemoryCredentialStore {
        InMemoryCredentialStore::new().with_hash_params(Params::new(8, 1, 1, None).unwrap())
    }

    fn new_credential(user_name: &str, email: &str, phone: &str) -> NewCredential {
        NewCredential {
            user_name: user_name.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            dob: NaiveDate::from_ymd_opt(1995, 7, 1).unwrap(),
            email: email.into(),
            phone_number: phone.into(),
            password: "Passw0rd!".into(),
        }
    }

    #[tokio::test]
    async fn lookups_ignore_case() {
        let store = cheap_store();
        let id = store.create(new_credential("Alice", "Alice@Example.com", "")).await.unwrap();

        assert_eq!(store.find_by_identifier("alice").await.unwrap().unwrap().id, id);
        assert_eq!(store.find_by_email("ALICE@example.COM").await.unwrap().unwrap().id, id);
        assert!(store.find_by_identifier("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicates_are_refused_by_the_store() {
        let store = cheap_store();
        store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();

        assert_eq!(
            store.create(new_credential("ALICE", "x@example.com", "")).await,
            Err(StoreError::DuplicateIdentifier)
        );
        assert_eq!(
            store.create(new_credential("bob", "alice@EXAMPLE.com", "")).await,
            Err(StoreError::DuplicateEmail)
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn weak_passwords_are_rejected() {
        let store = cheap_store();
        let mut weak = new_credential("alice", "alice@example.com", "");
        weak.password = "password".into();
        assert!(matches!(store.create(weak).await, Err(StoreError::Rejected(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn verify_distinguishes_right_and_wrong_secrets() {
        let store = cheap_store();
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();

        assert_eq!(store.verify_secret(id, "Passw0rd!", true).await, Ok(SignInOutcome::Succeeded));
        assert_eq!(store.verify_secret(id, "nope", true).await, Ok(SignInOutcome::Failed));
        assert_eq!(
            store.verify_secret(UserId::new(), "Passw0rd!", true).await,
            Ok(SignInOutcome::Failed)
        );
    }

    #[tokio::test]
    async fn unknown_accounts_are_verified_against_a_hash_with_the_same_cost() {
        let store = cheap_store();
        assert_eq!(store.verify_unknown("Passw0rd!").await, Ok(SignInOutcome::Failed));
        assert_eq!(
            store.verify_unknown(UNKNOWN_ACCOUNT_SECRET).await,
            Ok(SignInOutcome::Failed)
        );

        let hash = store.unknown_account_hash.get().unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=8,t=1,p=1$"), "{hash}");
    }

    #[tokio::test]
    async fn hashing_leaves_the_runtime_free_for_other_tasks() {
        let store = InMemoryCredentialStore::new()
            .with_hash_params(Params::new(4096, 2, 1, None).unwrap());
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();

        // On this single-threaded runtime the other task can only finish first
        // if verification does not hold the thread.
        let other = async {
            tokio::task::yield_now().await;
            std::time::Instant::now()
        };
        let login = async {
            let outcome = store.verify_secret(id, "Passw0rd!", true).await;
            (outcome, std::time::Instant::now())
        };
        let (other_done, (outcome, login_done)) = tokio::join!(other, login);

        assert_eq!(outcome, Ok(SignInOutcome::Succeeded));
        assert!(other_done < login_done);
    }

    #[tokio::test]
    async fn lockout_holds_until_the_window_ends() {
        let now = Arc::new(Mutex::new(Utc::now()));
        let clock = now.clone();
        let store = cheap_store().with_clock(move || *clock.lock().unwrap());
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();

        for _ in 0..4 {
            assert_eq!(store.verify_secret(id, "wrong", true).await, Ok(SignInOutcome::Failed));
        }
        assert_eq!(store.verify_secret(id, "wrong", true).await, Ok(SignInOutcome::LockedOut));
        assert_eq!(
            store.verify_secret(id, "Passw0rd!", true).await,
            Ok(SignInOutcome::LockedOut)
        );

        *now.lock().unwrap() += Duration::minutes(5) + Duration::seconds(1);
        assert_eq!(
            store.verify_secret(id, "Passw0rd!", true).await,
            Ok(SignInOutcome::Succeeded)
        );
    }

    #[tokio::test]
    async fn success_resets_the_failure_counter() {
        let store = cheap_store();
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();

        for _ in 0..4 {
            store.verify_secret(id, "wrong", true).await.unwrap();
        }
        assert_eq!(store.verify_secret(id, "Passw0rd!", true).await, Ok(SignInOutcome::Succeeded));
        for _ in 0..4 {
            assert_eq!(store.verify_secret(id, "wrong", true).await, Ok(SignInOutcome::Failed));
        }
    }

    #[tokio::test]
    async fn failures_without_lockout_flag_are_not_counted() {
        let store = cheap_store();
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();
        for _ in 0..10 {
            assert_eq!(store.verify_secret(id, "wrong", false).await, Ok(SignInOutcome::Failed));
        }
        assert_eq!(store.verify_secret(id, "Passw0rd!", true).await, Ok(SignInOutcome::Succeeded));
    }

    #[tokio::test]
    async fn update_moves_the_email_index() {
        let store = cheap_store();
        let alice = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();
        let bob = store.create(new_credential("bob", "bob@example.com", "")).await.unwrap();

        let change = |email: &str| CredentialUpdate {
            first_name: "A".into(),
            last_name: "B".into(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            email: email.into(),
            phone_number: String::new(),
        };

        assert_eq!(store.update(alice, change("bob@example.com")).await, Err(StoreError::DuplicateEmail));
        assert_eq!(store.update(alice, change("alice2@example.com")).await, Ok(1));
        assert!(store.find_by_email("alice@example.com").await.unwrap().is_none());
        assert!(!store.email_taken_by_other("alice2@example.com", alice).await.unwrap());
        assert!(store.email_taken_by_other("alice2@example.com", bob).await.unwrap());
        assert_eq!(store.update(UserId::new(), change("z@example.com")).await, Ok(0));
    }

    #[tokio::test]
    async fn roles_are_granted_once() {
        let store = cheap_store();
        let id = store.create(new_credential("alice", "alice@example.com", "")).await.unwrap();
        store.grant_role(id, Role::parse("admin").unwrap()).unwrap();
        store.grant_role(id, Role::parse("admin").unwrap()).unwrap();
        assert_eq!(store.list_roles(id).await.unwrap(), vec![Role::parse("admin").unwrap()]);
        assert!(store.grant_role(UserId::new(), Role::parse("admin").unwrap()).is_err());
    }

    #[tokio::test]
    async fn directory_filter_matches_name_or_phone() {
        let store = cheap_store();
        store.create(new_credential("alice", "a@example.com", "0901")).await.unwrap();
        store.create(new_credential("bob", "b@example.com", "0777")).await.unwrap();
        store.create(new_credential("carol", "c@example.com", "0902")).await.unwrap();

        let filter = FilterSpec::new().contains(
            &[credential_fields::USER_NAME, credential_fields::PHONE_NUMBER],
            Some("090"),
        );
        assert_eq!(store.count(&filter).await.unwrap(), 2);

        let filter = FilterSpec::new().contains(
            &[credential_fields::USER_NAME, credential_fields::PHONE_NUMBER],
            Some("bo"),
        );
        let rows = store.fetch(&filter, 0, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_name, "bob");
    }
}

//! TokenAuthority: credential verification, token issuance and account
//! lookups over a [`CredentialStore`].
//!
//! Every store call is bounded by a [`Deadline`]. Idempotent reads are retried
//! with backoff on transient failures; `verify_secret`, `create` and `update`
//! run exactly once.

use std::future::Future;

use chrono::{DateTime, Utc};

use eshop_core::{Deadline, RetryPolicy, UserId};

use crate::claims::{ClaimSet, TokenError};
use crate::config::SigningConfig;
use crate::error::AuthError;
use crate::profile::{LoginRequest, RegisterRequest, UserUpdateRequest, UserVm};
use crate::store::{CredentialStore, CredentialUpdate, SignInOutcome, StoreError};
use crate::token::{Hs256TokenCodec, TokenValidator};

pub struct TokenAuthority<S> {
    store: S,
    codec: Hs256TokenCodec,
    deadline: Deadline,
    retry: RetryPolicy,
}

impl<S: CredentialStore> TokenAuthority<S> {
    pub fn new(store: S, signing: &SigningConfig) -> Self {
        Self {
            store,
            codec: Hs256TokenCodec::new(signing),
            deadline: Deadline::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Verify a login and issue a signed session token.
    ///
    /// `remember_me` is carried for the caller's session handling only; the
    /// token lifetime is fixed by the signing configuration.
    pub async fn authenticate(
        &self,
        request: &LoginRequest,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        request.validate()?;

        let Some(user) = self
            .read("find_by_identifier", || self.store.find_by_identifier(&request.user_name))
            .await?
        else {
            // Pay for a hash anyway so unknown identifiers are not cheaper to refuse.
            self.write(self.store.verify_unknown(&request.password))
                .await
                .map_err(unavailable)?;
            tracing::debug!("authentication failed: unknown identifier");
            return Err(AuthError::NotFound);
        };

        let outcome = self
            .write(self.store.verify_secret(user.id, &request.password, true))
            .await
            .map_err(unavailable)?;
        match outcome {
            SignInOutcome::Succeeded => {}
            SignInOutcome::Failed => {
                tracing::debug!(user_id = %user.id, "authentication failed: invalid credential");
                return Err(AuthError::InvalidCredential);
            }
            SignInOutcome::LockedOut => {
                tracing::warn!(user_id = %user.id, "authentication refused: account locked out");
                return Err(AuthError::Locked);
            }
        }

        let roles = self
            .read("list_roles", || self.store.list_roles(user.id))
            .await?;

        let claims = ClaimSet::new(
            user.id,
            user.user_name.as_str(),
            user.first_name.as_str(),
            user.email.as_str(),
            roles,
            now,
            self.codec.lifetime(),
        );
        let token = self.codec.issue(&claims)?;

        tracing::info!(
            user_id = %user.id,
            remember_me = request.remember_me,
            expires_at = %claims.expires_at(),
            "session token issued"
        );
        Ok(token)
    }

    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenError> {
        self.codec.validate(token, now)
    }

    /// The validator shared with the HTTP middleware.
    pub fn validator(&self) -> &Hs256TokenCodec {
        &self.codec
    }

    pub async fn lookup(&self, identifier: &str) -> Result<UserVm, AuthError> {
        self.read("find_by_identifier", || self.store.find_by_identifier(identifier))
            .await?
            .map(|c| UserVm::from(&c))
            .ok_or(AuthError::NotFound)
    }

    pub async fn lookup_by_id(&self, id: UserId) -> Result<UserVm, AuthError> {
        self.read("find_by_id", || self.store.find_by_id(id))
            .await?
            .map(|c| UserVm::from(&c))
            .ok_or(AuthError::NotFound)
    }

    /// Replace the display attributes of an account.
    ///
    /// The email collision check ignores the account's own record.
    pub async fn update(
        &self,
        id: UserId,
        request: &UserUpdateRequest,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        request.validate(now.date_naive())?;

        let taken = self
            .read("email_taken_by_other", || {
                self.store.email_taken_by_other(&request.email, id)
            })
            .await?;
        if taken {
            return Err(AuthError::DuplicateEmail);
        }

        let affected = self
            .write(self.store.update(id, CredentialUpdate::from(request)))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => AuthError::DuplicateEmail,
                StoreError::Rejected(reason) => AuthError::Validation(reason),
                other => unavailable(other),
            })?;
        if affected == 0 {
            return Err(AuthError::NotFound);
        }

        tracing::info!(user_id = %id, "account updated");
        Ok(())
    }

    /// Create an account after checking identifier then email uniqueness.
    pub async fn register(
        &self,
        request: &RegisterRequest,
        now: DateTime<Utc>,
    ) -> Result<UserId, AuthError> {
        request.validate(now.date_naive())?;

        if self
            .read("find_by_identifier", || self.store.find_by_identifier(&request.user_name))
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateIdentifier);
        }
        if self
            .read("find_by_email", || self.store.find_by_email(&request.email))
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateEmail);
        }

        let id = self
            .write(self.store.create(request.to_new_credential()))
            .await
            .map_err(|e| match e {
                StoreError::DuplicateIdentifier => AuthError::DuplicateIdentifier,
                StoreError::DuplicateEmail => AuthError::DuplicateEmail,
                StoreError::Rejected(reason) => AuthError::CreationFailed(reason),
                other => unavailable(other),
            })?;

        tracing::info!(user_id = %id, "account registered");
        Ok(id)
    }

    async fn read<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let deadline = self.deadline;
        self.retry
            .run(
                operation,
                || {
                    let fut = call();
                    async move { deadline.run(fut).await.unwrap_or_else(|e| Err(elapsed(e))) }
                },
                StoreError::is_transient,
            )
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "credential store read failed");
                unavailable(e)
            })
    }

    async fn write<T, Fut>(&self, fut: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.deadline
            .run(fut)
            .await
            .unwrap_or_else(|e| Err(elapsed(e)))
    }
}

fn elapsed(e: eshop_core::DeadlineElapsed) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn unavailable(e: StoreError) -> AuthError {
    AuthError::Unavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::roles::Role;
    use crate::store::{Credential, NewCredential};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
    const LOCKOUT_AFTER: u32 = 3;

    struct Account {
        credential: Credential,
        password: String,
        failures: u32,
        roles: Vec<Role>,
    }

    #[derive(Default)]
    struct FakeStore {
        accounts: Mutex<Vec<Account>>,
        delay: Option<StdDuration>,
        create_calls: AtomicU32,
        verify_calls: AtomicU32,
    }

    impl FakeStore {
        fn with_user(self, user_name: &str, email: &str, password: &str) -> Self {
            self.accounts.lock().unwrap().push(Account {
                credential: Credential {
                    id: UserId::new(),
                    user_name: user_name.into(),
                    first_name: "Given".into(),
                    last_name: "Family".into(),
                    dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                    email: email.into(),
                    phone_number: String::new(),
                    created_at: Utc::now(),
                },
                password: password.into(),
                failures: 0,
                roles: vec![Role::parse("admin").unwrap()],
            });
            self
        }

        fn id_of(&self, user_name: &str) -> UserId {
            self.accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.credential.user_name == user_name)
                .unwrap()
                .credential
                .id
        }

        fn len(&self) -> usize {
            self.accounts.lock().unwrap().len()
        }

        async fn pause(&self) {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
        }
    }

    #[async_trait]
    impl CredentialStore for FakeStore {
        async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Credential>, StoreError> {
            self.pause().await;
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.credential.user_name.eq_ignore_ascii_case(identifier))
                .map(|a| a.credential.clone()))
        }

        async fn find_by_id(&self, id: UserId) -> Result<Option<Credential>, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.credential.id == id)
                .map(|a| a.credential.clone()))
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.credential.email.eq_ignore_ascii_case(email))
                .map(|a| a.credential.clone()))
        }

        async fn email_taken_by_other(&self, email: &str, except: UserId) -> Result<bool, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .any(|a| a.credential.id != except && a.credential.email.eq_ignore_ascii_case(email)))
        }

        async fn verify_secret(
            &self,
            id: UserId,
            secret: &str,
            lockout_on_failure: bool,
        ) -> Result<SignInOutcome, StoreError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            let mut accounts = self.accounts.lock().unwrap();
            let Some(account) = accounts.iter_mut().find(|a| a.credential.id == id) else {
                return Ok(SignInOutcome::Failed);
            };
            if account.failures >= LOCKOUT_AFTER {
                return Ok(SignInOutcome::LockedOut);
            }
            if account.password == secret {
                account.failures = 0;
                return Ok(SignInOutcome::Succeeded);
            }
            if lockout_on_failure {
                account.failures += 1;
                if account.failures >= LOCKOUT_AFTER {
                    return Ok(SignInOutcome::LockedOut);
                }
            }
            Ok(SignInOutcome::Failed)
        }

        async fn verify_unknown(&self, _secret: &str) -> Result<SignInOutcome, StoreError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SignInOutcome::Failed)
        }

        async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let id = UserId::new();
            self.accounts.lock().unwrap().push(Account {
                credential: Credential {
                    id,
                    user_name: credential.user_name,
                    first_name: credential.first_name,
                    last_name: credential.last_name,
                    dob: credential.dob,
                    email: credential.email,
                    phone_number: credential.phone_number,
                    created_at: Utc::now(),
                },
                password: credential.password,
                failures: 0,
                roles: Vec::new(),
            });
            Ok(id)
        }

        async fn update(&self, id: UserId, update: CredentialUpdate) -> Result<u64, StoreError> {
            let mut accounts = self.accounts.lock().unwrap();
            let Some(account) = accounts.iter_mut().find(|a| a.credential.id == id) else {
                return Ok(0);
            };
            let c = &mut account.credential;
            c.first_name = update.first_name;
            c.last_name = update.last_name;
            c.dob = update.dob;
            c.email = update.email;
            c.phone_number = update.phone_number;
            Ok(1)
        }

        async fn list_roles(&self, id: UserId) -> Result<Vec<Role>, StoreError> {
            Ok(self
                .accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.credential.id == id)
                .map(|a| a.roles.clone())
                .unwrap_or_default())
        }
    }

    fn authority(store: FakeStore) -> TokenAuthority<FakeStore> {
        let signing = SigningConfig::new(KEY, "https://eshop.local", "https://eshop.local").unwrap();
        TokenAuthority::new(store, &signing).with_retry(RetryPolicy::none())
    }

    fn registration(user_name: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Alice".into(),
            last_name: "Nguyen".into(),
            dob: NaiveDate::from_ymd_opt(1992, 5, 17).unwrap(),
            email: email.into(),
            phone_number: "0901234567".into(),
            user_name: user_name.into(),
            password: "Passw0rd!".into(),
            confirm_password: "Passw0rd!".into(),
        }
    }

    fn update_request(email: &str) -> UserUpdateRequest {
        UserUpdateRequest {
            first_name: "Renamed".into(),
            last_name: "Person".into(),
            dob: NaiveDate::from_ymd_opt(1991, 2, 3).unwrap(),
            email: email.into(),
            phone_number: "0123".into(),
        }
    }

    #[tokio::test]
    async fn authenticate_then_validate_yields_the_same_identifier() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();

        let token = auth.authenticate(&LoginRequest::new("ALICE", "secret1"), now).await.unwrap();
        let claims = auth.validate(&token, now).unwrap();

        assert_eq!(claims.identifier(), "alice");
        assert_eq!(claims.user_id(), auth.store().id_of("alice"));
        assert!(claims.has_role("admin"));
        assert_eq!(claims.expires_at() - claims.issued_at(), Duration::hours(3));
    }

    #[tokio::test]
    async fn remember_me_does_not_extend_the_token() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();
        let mut request = LoginRequest::new("alice", "secret1");
        request.remember_me = true;

        let token = auth.authenticate(&request, now).await.unwrap();
        let claims = auth.validate(&token, now).unwrap();
        assert_eq!(claims.expires_at() - claims.issued_at(), Duration::hours(3));
    }

    #[tokio::test]
    async fn unknown_identifier_and_wrong_secret_are_distinct() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();

        assert_eq!(
            auth.authenticate(&LoginRequest::new("bob", "secret1"), now).await,
            Err(AuthError::NotFound)
        );
        assert_eq!(
            auth.authenticate(&LoginRequest::new("alice", "wrong-secret"), now).await,
            Err(AuthError::InvalidCredential)
        );
    }

    #[tokio::test]
    async fn unknown_identifier_still_goes_through_verification() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();

        let _ = auth.authenticate(&LoginRequest::new("bob", "secret1"), now).await;
        assert_eq!(auth.store().verify_calls.load(Ordering::SeqCst), 1);

        let _ = auth.authenticate(&LoginRequest::new("alice", "wrong-secret"), now).await;
        assert_eq!(auth.store().verify_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_failures_lock_the_account() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();

        for _ in 0..LOCKOUT_AFTER - 1 {
            assert_eq!(
                auth.authenticate(&LoginRequest::new("alice", "wrong-secret"), now).await,
                Err(AuthError::InvalidCredential)
            );
        }
        assert_eq!(
            auth.authenticate(&LoginRequest::new("alice", "wrong-secret"), now).await,
            Err(AuthError::Locked)
        );
        assert_eq!(
            auth.authenticate(&LoginRequest::new("alice", "secret1"), now).await,
            Err(AuthError::Locked)
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let now = Utc::now();
        let token = auth.authenticate(&LoginRequest::new("alice", "secret1"), now).await.unwrap();

        assert_eq!(
            auth.validate(&token, now + Duration::hours(3) + Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[tokio::test]
    async fn registering_an_existing_identifier_creates_nothing() {
        let auth = authority(FakeStore::default());
        let now = Utc::now();

        auth.register(&registration("alice", "alice@example.com"), now).await.unwrap();
        let again = auth.register(&registration("Alice", "other@example.com"), now).await;

        assert_eq!(again, Err(AuthError::DuplicateIdentifier));
        assert_eq!(auth.store().len(), 1);
        assert_eq!(auth.store().create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn registering_an_existing_email_is_rejected() {
        let auth = authority(FakeStore::default().with_user("bob", "shared@example.com", "secret1"));
        let result = auth.register(&registration("alice", "SHARED@example.com"), Utc::now()).await;
        assert_eq!(result, Err(AuthError::DuplicateEmail));
        assert_eq!(auth.store().create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_registration_never_reaches_the_store() {
        let auth = authority(FakeStore::default());
        let mut request = registration("alice", "alice@example.com");
        request.confirm_password = "mismatch".into();

        let result = auth.register(&request, Utc::now()).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
        assert_eq!(auth.store().create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_to_someone_elses_email_leaves_the_record_unchanged() {
        let auth = authority(
            FakeStore::default()
                .with_user("alice", "alice@example.com", "secret1")
                .with_user("bob", "bob@example.com", "secret1"),
        );
        let alice = auth.store().id_of("alice");
        let before = auth.lookup_by_id(alice).await.unwrap();

        let result = auth.update(alice, &update_request("bob@example.com"), Utc::now()).await;

        assert_eq!(result, Err(AuthError::DuplicateEmail));
        assert_eq!(auth.lookup_by_id(alice).await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_may_keep_own_email() {
        let auth = authority(FakeStore::default().with_user("alice", "alice@example.com", "secret1"));
        let alice = auth.store().id_of("alice");

        auth.update(alice, &update_request("alice@example.com"), Utc::now()).await.unwrap();

        let view = auth.lookup("alice").await.unwrap();
        assert_eq!(view.first_name, "Renamed");
        assert_eq!(view.email, "alice@example.com");
    }

    #[tokio::test]
    async fn update_of_unknown_account_is_not_found() {
        let auth = authority(FakeStore::default());
        let result = auth.update(UserId::new(), &update_request("x@example.com"), Utc::now()).await;
        assert_eq!(result, Err(AuthError::NotFound));
    }

    #[tokio::test]
    async fn slow_store_surfaces_as_unavailable() {
        let store = FakeStore {
            delay: Some(StdDuration::from_millis(200)),
            ..FakeStore::default()
        }
        .with_user("alice", "alice@example.com", "secret1");
        let auth = authority(store).with_deadline(Deadline::new(StdDuration::from_millis(20)));

        let result = auth.authenticate(&LoginRequest::new("alice", "secret1"), Utc::now()).await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));
    }
}

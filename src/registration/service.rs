use chrono::Utc;
use parking_lot::Mutex;
use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};
use tokio::{sync::watch, time::timeout};
use tracing::{debug, info, instrument, trace, warn};

use super::{
    entities::{
        Notification, ProfileImage, RegistrationInput, RegistrationOutcome, RegistrationState,
    },
    error::{RegistrationError, RegistrationStep},
    observer::RegistrationObserver,
};
use crate::{
    account::{
        entities::{AuthenticatedUser, ProfileUpdate},
        provider::AuthProvider,
    },
    assets::{
        entities::{Asset, UploadProgress},
        storage::AssetStorage,
        upload::UploadService,
    },
    profiles::{database::ProfileDatabase, entities::ProfileRecord},
    settings::RegistrationSettings,
};

const SUCCESS_MESSAGE: &str = "Account created";

/// Signs up users: account creation, profile picture upload and profile provisioning
pub struct RegistrationService<A, S, D>
where
    A: AuthProvider + ?Sized,
    S: AssetStorage + ?Sized + 'static,
    D: ProfileDatabase + ?Sized,
{
    auth: Arc<A>,
    uploads: UploadService<S>,
    profile_db: Arc<D>,
    settings: RegistrationSettings,
    in_flight: Mutex<HashSet<String>>,
}

impl<A, S, D> RegistrationService<A, S, D>
where
    A: AuthProvider + ?Sized,
    S: AssetStorage + ?Sized + 'static,
    D: ProfileDatabase + ?Sized,
{
    pub fn new(
        auth: Arc<A>,
        asset_storage: Arc<S>,
        profile_db: Arc<D>,
        settings: RegistrationSettings,
    ) -> Self {
        Self {
            auth,
            uploads: UploadService::new(asset_storage),
            profile_db,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Runs a complete registration and reports its progress to `observer`.
    ///
    /// Success is only reported once the account exists, the image is stored and
    /// the profile record is written. Nothing is rolled back on failure. Dropping
    /// the returned future aborts a running upload.
    #[instrument(skip(self, input, observer), fields(username = %input.username, email = %input.email))]
    pub async fn register<O>(
        &self,
        input: RegistrationInput,
        observer: &O,
    ) -> Result<RegistrationOutcome, RegistrationError>
    where
        O: RegistrationObserver + ?Sized,
    {
        if let Err(err) = self.validate(&input) {
            observer.notify(Notification::error(err.user_message()));
            return Err(err);
        }

        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &input.email) else {
            let err = RegistrationError::AlreadyInProgress;
            observer.notify(Notification::error(err.user_message()));
            return Err(err);
        };

        let mut attempt = Attempt::new(observer);
        let loading = LoadingGuard::start(observer);
        let result = self.run(input, &mut attempt).await;
        drop(loading);

        debug_assert!(attempt.state.is_terminal());
        match &result {
            Ok(outcome) => {
                info!(uid = %outcome.user.uid, "registration completed");
                observer.notify(Notification::success(SUCCESS_MESSAGE));
                observer.navigate(&outcome.redirect);
            }
            Err(err) => {
                debug_assert!(attempt.state.is_failed());
                warn!(state = ?attempt.state, "registration failed: {}", err);
                observer.notify(Notification::error(err.user_message()));
            }
        }

        result
    }

    fn validate(&self, input: &RegistrationInput) -> Result<(), RegistrationError> {
        if input.username.trim().is_empty() {
            return Err(RegistrationError::InvalidInput(
                "username must not be empty".to_string(),
            ));
        }

        match &input.image {
            None if self.settings.require_profile_image => Err(RegistrationError::InvalidInput(
                "a profile image is required".to_string(),
            )),
            Some(image) if image.bytes.is_empty() => Err(RegistrationError::InvalidInput(
                "profile image is empty".to_string(),
            )),
            Some(image) if !image.is_image() => Err(RegistrationError::InvalidInput(
                "profile image must be an image file".to_string(),
            )),
            _ => Ok(()),
        }
    }

    async fn run<O>(
        &self,
        input: RegistrationInput,
        attempt: &mut Attempt<'_, O>,
    ) -> Result<RegistrationOutcome, RegistrationError>
    where
        O: RegistrationObserver + ?Sized,
    {
        let RegistrationInput {
            username,
            email,
            password,
            image,
        } = input;
        let username = username.trim().to_string();

        attempt.transition(RegistrationState::Submitting);
        let user = match with_timeout(
            self.settings.auth_timeout(),
            RegistrationStep::CreateAccount,
            self.auth.create_account(&email, &password),
        )
        .await
        {
            Ok(Ok(user)) => user,
            Ok(Err(err)) => {
                return attempt.fail(
                    RegistrationState::AuthFailed,
                    RegistrationError::AuthCreation(err),
                );
            }
            Err(err) => return attempt.fail(RegistrationState::AuthFailed, err),
        };
        attempt.transition(RegistrationState::AuthSucceeded);

        let result = self.provision(&user, username, image, attempt).await;
        if result.is_err() {
            warn!(uid = %user.uid, "account created without a complete profile");
        }
        result
    }

    async fn provision<O>(
        &self,
        user: &AuthenticatedUser,
        username: String,
        image: Option<ProfileImage>,
        attempt: &mut Attempt<'_, O>,
    ) -> Result<RegistrationOutcome, RegistrationError>
    where
        O: RegistrationObserver + ?Sized,
    {
        let photo_url = match image {
            Some(image) => {
                attempt.transition(RegistrationState::Uploading);
                let key = storage_key(&user.uid, &username, &image);
                let task = self
                    .uploads
                    .spawn_upload(key, Asset::new(image.bytes, image.content_type));
                debug!(key = task.key(), "upload started");
                trace_progress(task.progress());

                match with_timeout(
                    self.settings.upload_timeout(),
                    RegistrationStep::Upload,
                    task.wait(),
                )
                .await
                {
                    Ok(Ok(url)) => {
                        attempt.transition(RegistrationState::UploadSucceeded);
                        Some(url)
                    }
                    Ok(Err(err)) => {
                        return attempt
                            .fail(RegistrationState::UploadFailed, RegistrationError::Upload(err));
                    }
                    Err(err) => return attempt.fail(RegistrationState::UploadFailed, err),
                }
            }
            None => {
                debug!("no profile image given, skipping upload");
                None
            }
        };

        attempt.transition(RegistrationState::Provisioning);

        let update = ProfileUpdate {
            display_name: Some(username.clone()),
            photo_url: photo_url.clone(),
        };
        let user = match with_timeout(
            self.settings.provision_timeout(),
            RegistrationStep::UpdateProfile,
            self.auth.update_profile(&user.uid, update),
        )
        .await
        {
            Ok(Ok(user)) => user,
            Ok(Err(err)) => {
                return attempt.fail(
                    RegistrationState::ProvisionFailed,
                    RegistrationError::ProfileUpdate(err),
                );
            }
            Err(err) => return attempt.fail(RegistrationState::ProvisionFailed, err),
        };

        let record = ProfileRecord {
            uid: user.uid.clone(),
            display_name: username,
            email: user.email.clone(),
            photo_url,
            created_at: Utc::now(),
        };
        match with_timeout(
            self.settings.provision_timeout(),
            RegistrationStep::WriteRecord,
            self.profile_db.put_profile(record.clone()),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return attempt.fail(
                    RegistrationState::ProvisionFailed,
                    RegistrationError::RecordWrite(err),
                );
            }
            Err(err) => return attempt.fail(RegistrationState::ProvisionFailed, err),
        }

        attempt.transition(RegistrationState::Provisioned);

        Ok(RegistrationOutcome {
            user,
            profile: record,
            redirect: self.settings.login_path.clone(),
        })
    }
}

async fn with_timeout<F: Future>(
    duration: Duration,
    step: RegistrationStep,
    future: F,
) -> Result<F::Output, RegistrationError> {
    timeout(duration, future)
        .await
        .map_err(|_| RegistrationError::Timeout(step))
}

fn trace_progress(mut progress: watch::Receiver<UploadProgress>) {
    tokio::spawn(async move {
        // Ends once the upload task finished or was aborted
        while progress.changed().await.is_ok() {
            trace!(progress = ?*progress.borrow(), "upload progress");
        }
    });
}

/// Storage key of a profile picture: `images/{uid}/{unix_millis}-{username}.{ext}`
fn storage_key(uid: &str, username: &str, image: &ProfileImage) -> String {
    let slug: String = username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "user" } else { slug };

    format!(
        "images/{}/{}-{}.{}",
        uid,
        Utc::now().timestamp_millis(),
        slug,
        image.extension()
    )
}

/// State of one registration attempt, mirrored to the observer
struct Attempt<'a, O: RegistrationObserver + ?Sized> {
    state: RegistrationState,
    observer: &'a O,
}

impl<'a, O: RegistrationObserver + ?Sized> Attempt<'a, O> {
    fn new(observer: &'a O) -> Self {
        Self {
            state: RegistrationState::Idle,
            observer,
        }
    }

    fn transition(&mut self, next: RegistrationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid registration transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "registration state changed");
        self.state = next;
        self.observer.state_changed(next);
    }

    fn fail<T>(
        &mut self,
        terminal: RegistrationState,
        err: RegistrationError,
    ) -> Result<T, RegistrationError> {
        self.transition(terminal);
        Err(err)
    }
}

/// Keeps the observer's loading flag raised until dropped, also when the
/// registration future is dropped mid-way
struct LoadingGuard<'a, O: RegistrationObserver + ?Sized> {
    observer: &'a O,
}

impl<'a, O: RegistrationObserver + ?Sized> LoadingGuard<'a, O> {
    fn start(observer: &'a O) -> Self {
        observer.set_loading(true);
        Self { observer }
    }
}

impl<O: RegistrationObserver + ?Sized> Drop for LoadingGuard<'_, O> {
    fn drop(&mut self) {
        self.observer.set_loading(false);
    }
}

/// Marks an email as being registered until dropped
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    key: String,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, email: &str) -> Option<Self> {
        let key = email.trim().to_lowercase();
        if !in_flight.lock().insert(key.clone()) {
            return None;
        }
        Some(Self { in_flight, key })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        account::{
            database::AccountDatabase, error::AccountError, provider::LocalAuthProvider,
            provider::MockAuthProvider,
        },
        assets::{error::AssetError, storage::MockAssetStorage},
        database::inmemory::InMemoryDatabase,
        profiles::{database::MockProfileDatabase, error::ProfileError},
        registration::{
            entities::NotificationLevel,
            observer::{MockRegistrationObserver, RecordingObserver},
        },
    };
    use async_trait::async_trait;
    use mockall::{
        Sequence,
        predicate::{always, eq, function},
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    type InMemoryRegistrationService = RegistrationService<
        LocalAuthProvider<InMemoryDatabase>,
        InMemoryDatabase,
        InMemoryDatabase,
    >;

    fn in_memory_service(
        settings: RegistrationSettings,
    ) -> (InMemoryRegistrationService, Arc<InMemoryDatabase>) {
        let db = Arc::new(InMemoryDatabase::with_assets_base_url(
            "https://cdn.example.com",
        ));
        let auth = Arc::new(LocalAuthProvider::new(db.clone()));
        let service = RegistrationService::new(auth, db.clone(), db.clone(), settings);
        (service, db)
    }

    fn alice(with_image: bool) -> RegistrationInput {
        RegistrationInput {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "Secret123!".to_string(),
            image: with_image.then(|| {
                ProfileImage::new(PNG.to_vec(), Some("image/png".into()), None)
            }),
        }
    }

    fn user(uid: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            uid: uid.to_string(),
            email: "alice@example.com".to_string(),
            display_name: None,
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_successful_registration_provisions_profile() {
        let (service, db) = in_memory_service(RegistrationSettings::default());
        let observer = RecordingObserver::new();

        let outcome = service.register(alice(true), &observer).await.unwrap();

        let uid = outcome.user.uid.clone();
        assert_eq!(outcome.profile.uid, uid);
        assert_eq!(outcome.profile.display_name, "alice");
        assert_eq!(outcome.profile.email, "alice@example.com");
        assert_eq!(outcome.redirect, "/login");

        let photo_url = outcome.profile.photo_url.clone().unwrap();
        assert!(photo_url.starts_with(&format!("https://cdn.example.com/images/{uid}/")));
        assert!(photo_url.ends_with("-alice.png"));

        // Exactly one blob, stored under the key behind the photo URL
        let key = photo_url.trim_start_matches("https://cdn.example.com/");
        assert_eq!(db.assets.lock().unwrap().len(), 1);
        assert!(db.fetch_asset(key).await.unwrap().is_some());

        let stored_profile = db.get_profile(&uid).await.unwrap().unwrap();
        assert_eq!(stored_profile, outcome.profile);

        let account = db.fetch_account(&uid).await.unwrap().unwrap();
        assert_eq!(account.display_name.as_deref(), Some("alice"));
        assert_eq!(account.photo_url, Some(photo_url));
        assert_eq!(outcome.user.photo_url, account.photo_url);

        assert!(!observer.is_loading());
        assert_eq!(observer.navigations(), vec!["/login".to_string()]);
        assert_eq!(
            observer.notifications(),
            vec![Notification::success("Account created")]
        );
        assert_eq!(
            observer.states(),
            vec![
                RegistrationState::Submitting,
                RegistrationState::AuthSucceeded,
                RegistrationState::Uploading,
                RegistrationState::UploadSucceeded,
                RegistrationState::Provisioning,
                RegistrationState::Provisioned,
            ]
        );
    }

    #[tokio::test]
    async fn test_auth_failure_has_no_further_side_effects() {
        let mut auth = MockAuthProvider::new();
        auth.expect_create_account()
            .once()
            .with(eq("alice@example.com"), eq("123"))
            .returning(|_, _| Err(AccountError::WeakPassword(6)));
        auth.expect_update_profile().never();

        let storage = MockAssetStorage::new();
        let mut profile_db = MockProfileDatabase::new();
        profile_db.expect_put_profile().never();

        let mut observer = MockRegistrationObserver::new();
        let mut seq = Sequence::new();
        observer
            .expect_set_loading()
            .with(eq(true))
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_state_changed()
            .with(eq(RegistrationState::Submitting))
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_state_changed()
            .with(eq(RegistrationState::AuthFailed))
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_set_loading()
            .with(eq(false))
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_notify()
            .with(function(|n: &Notification| n.level == NotificationLevel::Error))
            .once()
            .in_sequence(&mut seq)
            .return_const(());
        observer.expect_navigate().never();

        let service = RegistrationService::new(
            Arc::new(auth),
            Arc::new(storage),
            Arc::new(profile_db),
            RegistrationSettings::default(),
        );
        let mut input = alice(true);
        input.password = "123".to_string();

        let result = service.register(input, &observer).await;

        assert!(matches!(
            result,
            Err(RegistrationError::AuthCreation(AccountError::WeakPassword(6)))
        ));
    }

    #[tokio::test]
    async fn test_upload_failure_writes_no_record() {
        let mut auth = MockAuthProvider::new();
        auth.expect_create_account()
            .once()
            .returning(|_, _| Ok(user("u1")));
        auth.expect_update_profile().never();

        let mut storage = MockAssetStorage::new();
        storage
            .expect_put_asset()
            .once()
            .with(function(|key: &str| key.starts_with("images/u1/")), always(), always())
            .returning(|_, _, _| Err(AssetError::Transfer("bucket unreachable".to_string())));
        storage.expect_public_url().never();

        let mut profile_db = MockProfileDatabase::new();
        profile_db.expect_put_profile().never();

        let service = RegistrationService::new(
            Arc::new(auth),
            Arc::new(storage),
            Arc::new(profile_db),
            RegistrationSettings::default(),
        );
        let observer = RecordingObserver::new();

        let result = service.register(alice(true), &observer).await;

        assert!(matches!(result, Err(RegistrationError::Upload(_))));
        assert_eq!(observer.states().last(), Some(&RegistrationState::UploadFailed));
        assert!(observer.navigations().is_empty());
        assert!(!observer.is_loading());
        assert!(
            observer
                .notifications()
                .iter()
                .all(|n| n.level == NotificationLevel::Error)
        );
    }

    #[tokio::test]
    async fn test_record_write_failure_is_reported() {
        let mut auth = MockAuthProvider::new();
        auth.expect_create_account()
            .once()
            .returning(|_, _| Ok(user("u1")));
        auth.expect_update_profile()
            .once()
            .with(
                eq("u1"),
                eq(ProfileUpdate {
                    display_name: Some("alice".to_string()),
                    photo_url: None,
                }),
            )
            .returning(|uid, update| {
                Ok(AuthenticatedUser {
                    display_name: update.display_name,
                    ..user(uid)
                })
            });

        let mut profile_db = MockProfileDatabase::new();
        profile_db
            .expect_put_profile()
            .once()
            .with(function(|record: &ProfileRecord| {
                record.uid == "u1" && record.photo_url.is_none()
            }))
            .returning(|_| Err(ProfileError::Database("disk full".to_string())));

        let service = RegistrationService::new(
            Arc::new(auth),
            Arc::new(MockAssetStorage::new()),
            Arc::new(profile_db),
            RegistrationSettings::default(),
        );
        let observer = RecordingObserver::new();

        let result = service.register(alice(false), &observer).await;

        assert!(matches!(result, Err(RegistrationError::RecordWrite(_))));
        assert_eq!(
            observer.states().last(),
            Some(&RegistrationState::ProvisionFailed)
        );
        assert!(observer.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_profile_update_failure_skips_record_write() {
        let mut auth = MockAuthProvider::new();
        auth.expect_create_account()
            .once()
            .returning(|_, _| Ok(user("u1")));
        auth.expect_update_profile()
            .once()
            .returning(|uid, _| Err(AccountError::NotFound(uid.to_string())));

        let mut profile_db = MockProfileDatabase::new();
        profile_db.expect_put_profile().never();

        let service = RegistrationService::new(
            Arc::new(auth),
            Arc::new(MockAssetStorage::new()),
            Arc::new(profile_db),
            RegistrationSettings::default(),
        );
        let observer = RecordingObserver::new();

        let result = service.register(alice(false), &observer).await;

        assert!(matches!(result, Err(RegistrationError::ProfileUpdate(_))));
        assert!(observer.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_registration_without_image_skips_upload() {
        let (service, db) = in_memory_service(RegistrationSettings::default());
        let observer = RecordingObserver::new();

        let outcome = service.register(alice(false), &observer).await.unwrap();

        assert!(outcome.profile.photo_url.is_none());
        assert!(db.assets.lock().unwrap().is_empty());
        assert!(!observer.states().contains(&RegistrationState::Uploading));
        assert_eq!(observer.navigations(), vec!["/login".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_image_rejected_when_required() {
        let settings = RegistrationSettings {
            require_profile_image: true,
            ..RegistrationSettings::default()
        };
        let (service, db) = in_memory_service(settings);
        let observer = RecordingObserver::new();

        let result = service.register(alice(false), &observer).await;

        assert!(matches!(result, Err(RegistrationError::InvalidInput(_))));
        assert!(db.accounts.lock().unwrap().is_empty());
        assert!(observer.states().is_empty());
        assert_eq!(observer.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_username_rejected_before_account_creation() {
        let (service, db) = in_memory_service(RegistrationSettings::default());
        let mut input = alice(true);
        input.username = "   ".to_string();

        let result = service.register(input, &RecordingObserver::new()).await;

        assert!(matches!(result, Err(RegistrationError::InvalidInput(_))));
        assert!(db.accounts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_identical_submission_fails_with_email_in_use() {
        let (service, db) = in_memory_service(RegistrationSettings::default());

        let first = service
            .register(alice(true), &RecordingObserver::new())
            .await
            .unwrap();
        let observer = RecordingObserver::new();
        let second = service.register(alice(true), &observer).await;

        assert!(matches!(
            second,
            Err(RegistrationError::AuthCreation(AccountError::EmailAlreadyInUse))
        ));
        assert_eq!(db.profiles.lock().unwrap().len(), 1);
        assert!(db.get_profile(&first.user.uid).await.unwrap().is_some());
        assert!(observer.navigations().is_empty());
    }

    #[tokio::test]
    async fn test_submission_rejected_while_same_email_in_flight() {
        let (service, db) = in_memory_service(RegistrationSettings::default());

        let guard = InFlightGuard::acquire(&service.in_flight, "Alice@Example.com").unwrap();
        let result = service.register(alice(true), &RecordingObserver::new()).await;
        assert!(matches!(result, Err(RegistrationError::AlreadyInProgress)));
        assert!(db.accounts.lock().unwrap().is_empty());

        drop(guard);
        assert!(
            service
                .register(alice(true), &RecordingObserver::new())
                .await
                .is_ok()
        );
        assert!(service.in_flight.lock().is_empty());
    }

    /// Storage whose transfers never finish
    struct StalledStorage;

    #[async_trait]
    impl AssetStorage for StalledStorage {
        async fn put_asset(
            &self,
            _key: &str,
            _asset: Asset,
            _progress: &watch::Sender<UploadProgress>,
        ) -> Result<(), AssetError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn fetch_asset(&self, _key: &str) -> Result<Option<Asset>, AssetError> {
            Ok(None)
        }

        fn public_url(&self, key: &str) -> Result<String, AssetError> {
            Ok(format!("https://cdn.example.com/{key}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_upload_times_out() {
        let db = Arc::new(InMemoryDatabase::new());
        let settings = RegistrationSettings {
            upload_timeout_secs: 5,
            ..RegistrationSettings::default()
        };
        let service = RegistrationService::new(
            Arc::new(LocalAuthProvider::new(db.clone())),
            Arc::new(StalledStorage),
            db.clone(),
            settings,
        );
        let observer = RecordingObserver::new();

        let result = service.register(alice(true), &observer).await;

        assert!(matches!(
            result,
            Err(RegistrationError::Timeout(RegistrationStep::Upload))
        ));
        assert_eq!(observer.states().last(), Some(&RegistrationState::UploadFailed));
        assert!(db.profiles.lock().unwrap().is_empty());
        // The account stays behind without a profile
        assert_eq!(db.accounts.lock().unwrap().len(), 1);
    }

    /// Storage that takes a while and records finished transfers
    struct SlowStorage {
        completed: AtomicBool,
    }

    #[async_trait]
    impl AssetStorage for SlowStorage {
        async fn put_asset(
            &self,
            _key: &str,
            _asset: Asset,
            _progress: &watch::Sender<UploadProgress>,
        ) -> Result<(), AssetError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            self.completed.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn fetch_asset(&self, _key: &str) -> Result<Option<Asset>, AssetError> {
            Ok(None)
        }

        fn public_url(&self, key: &str) -> Result<String, AssetError> {
            Ok(format!("https://cdn.example.com/{key}"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registration_aborts_upload_and_clears_loading() {
        let db = Arc::new(InMemoryDatabase::new());
        let storage = Arc::new(SlowStorage {
            completed: AtomicBool::new(false),
        });
        let service = RegistrationService::new(
            Arc::new(LocalAuthProvider::new(db.clone())),
            storage.clone(),
            db.clone(),
            RegistrationSettings::default(),
        );
        let observer = RecordingObserver::new();

        // The client goes away while the picture is still being transferred
        let dropped = tokio::time::timeout(
            Duration::from_millis(150),
            service.register(alice(true), &observer),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(observer.states().last(), Some(&RegistrationState::Uploading));

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(!storage.completed.load(Ordering::SeqCst));
        assert!(service.in_flight.lock().is_empty());
        assert!(!observer.is_loading());
        assert!(db.profiles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_svg_image_rejected_before_account_creation() {
        let (service, db) = in_memory_service(RegistrationSettings::default());
        let observer = RecordingObserver::new();
        let input = RegistrationInput {
            image: Some(ProfileImage::new(
                b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>"
                    .to_vec(),
                Some("image/svg+xml".into()),
                Some("avatar.svg".into()),
            )),
            ..alice(false)
        };

        let result = service.register(input, &observer).await;

        assert!(matches!(result, Err(RegistrationError::InvalidInput(_))));
        assert!(db.accounts.lock().unwrap().is_empty());
        assert!(db.assets.lock().unwrap().is_empty());
        assert!(observer.states().is_empty());
    }

    #[test]
    fn test_storage_key_contains_uid_and_username() {
        let image = ProfileImage::new(b"\xff\xd8\xff\xe0".to_vec(), Some("image/jpeg".into()), None);

        let key = storage_key("u1", "Alice Smith!", &image);

        assert!(key.starts_with("images/u1/"));
        assert!(key.ends_with("-alice-smith.jpg"));
        assert!(storage_key("u1", "   ", &image).ends_with("-user.jpg"));
    }
}

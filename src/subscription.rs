//! Per-monitor push subscription lifecycle.
//!
//! [`SubscriptionManager`] mediates permission, creates or reuses the
//! installation's push subscription, registers it with the backend for a
//! monitor, and remembers which monitors the user opted into.
//!
//! The persisted id list only records intent. Platform subscriptions are
//! owned by the push service and cannot be rebuilt from an id, so entries
//! restored from storage carry no [`PushSubscription`].
//!
//! Overlapping subscribe/unsubscribe calls for the same monitor are not
//! coordinated beyond the `&mut self` receivers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::sync::watch;

use crate::backend::Backend;
use crate::config::PushConfig;
use crate::encoding::url_base64_to_bytes;
use crate::error::{Result, SubscribeError};
use crate::platform::{
    MonitorId, PermissionState, Platform, PushRegistration, PushSubscription, SubscribeOptions,
};
use crate::storage::KeyValueStore;

/// Local storage key holding the JSON array of subscribed monitor ids.
pub const SUBSCRIPTIONS_KEY: &str = "monitor-subscriptions";

/// One monitor the user is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    /// Monitor receiving alerts.
    pub monitor_id: MonitorId,
    /// Platform subscription, absent for entries restored from storage.
    pub subscription: Option<PushSubscription>,
}

/// Immutable view of the manager state, published on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Push messaging is available on this platform.
    pub supported: bool,
    /// Last known notification permission.
    pub permission: PermissionState,
    /// Subscribed monitors, ascending.
    pub monitor_ids: Vec<MonitorId>,
    /// A subscribe or unsubscribe call is in flight.
    pub loading: bool,
    /// Message from the last failed call.
    pub error: Option<String>,
}

impl SubscriptionSnapshot {
    /// Whether notification permission has been granted.
    #[must_use]
    pub fn has_permission(&self) -> bool {
        self.permission == PermissionState::Granted
    }

    /// Whether `monitor_id` is subscribed in this snapshot.
    #[must_use]
    pub fn is_subscribed(&self, monitor_id: MonitorId) -> bool {
        self.monitor_ids.binary_search(&monitor_id).is_ok()
    }
}

/// Manages push subscriptions for individual monitors.
pub struct SubscriptionManager<P: Platform, B: Backend, S: KeyValueStore> {
    platform: P,
    backend: B,
    storage: S,
    config: PushConfig,
    supported: bool,
    permission: PermissionState,
    subscriptions: BTreeMap<MonitorId, SubscriptionRecord>,
    loading: bool,
    error: Option<String>,
    state_tx: watch::Sender<SubscriptionSnapshot>,
}

impl<P: Platform, B: Backend, S: KeyValueStore> SubscriptionManager<P, B, S> {
    /// Creates a manager. Call [`check_support`](Self::check_support) before use.
    #[must_use]
    pub fn new(platform: P, backend: B, storage: S, config: PushConfig) -> Self {
        let (state_tx, _) = watch::channel(SubscriptionSnapshot::default());
        Self {
            platform,
            backend,
            storage,
            config,
            supported: false,
            permission: PermissionState::Default,
            subscriptions: BTreeMap::new(),
            loading: false,
            error: None,
            state_tx,
        }
    }

    /// Returns the platform handle.
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    /// Returns the backend client.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the storage the id set is persisted to.
    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    /// Whether push is supported (as of the last support check).
    #[must_use]
    pub const fn supported(&self) -> bool {
        self.supported
    }

    /// Last known permission state.
    #[must_use]
    pub const fn permission(&self) -> PermissionState {
        self.permission
    }

    /// Whether permission is granted.
    #[must_use]
    pub fn has_permission(&self) -> bool {
        self.permission == PermissionState::Granted
    }

    /// Whether a subscribe or unsubscribe call is in flight.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    /// Message from the last failed call, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// All subscription records keyed by monitor.
    #[must_use]
    pub const fn subscriptions(&self) -> &BTreeMap<MonitorId, SubscriptionRecord> {
        &self.subscriptions
    }

    /// Subscribed monitor ids, ascending.
    #[must_use]
    pub fn subscribed_monitor_ids(&self) -> Vec<MonitorId> {
        self.subscriptions.keys().copied().collect()
    }

    /// Whether the user is subscribed to `monitor_id`.
    #[must_use]
    pub fn is_subscribed(&self, monitor_id: MonitorId) -> bool {
        self.subscriptions.contains_key(&monitor_id)
    }

    /// Current state as an immutable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            supported: self.supported,
            permission: self.permission,
            monitor_ids: self.subscribed_monitor_ids(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    /// Returns a receiver notified with a fresh snapshot after every change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SubscriptionSnapshot> {
        let rx = self.state_tx.subscribe();
        self.publish();
        rx
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.snapshot());
    }

    /// Checks for worker and push support.
    ///
    /// When supported, also reads the current permission and restores the
    /// persisted subscription intent.
    pub async fn check_support(&mut self) -> bool {
        let supported = self.platform.capabilities().supports_push();
        self.supported = supported;
        if supported {
            self.permission = self.platform.permission();
            self.load_subscriptions().await;
        } else {
            log::info!("Push notifications are not supported on this platform");
        }
        self.publish();
        supported
    }

    /// Asks the user for notification permission.
    ///
    /// Returns [`PermissionState::Denied`] without prompting when the platform
    /// has no notification support.
    pub async fn request_permission(&mut self) -> PermissionState {
        if !self.platform.capabilities().notifications {
            return PermissionState::Denied;
        }
        let permission = self.platform.request_permission().await;
        log::debug!("Notification permission is now {permission}");
        self.permission = permission;
        self.publish();
        permission
    }

    /// Subscribes this installation to alerts for `monitor_id`.
    ///
    /// On failure nothing but the permission state changes, and the error
    /// message is kept for [`error`](Self::error).
    ///
    /// # Errors
    ///
    /// Returns the [`SubscribeError`] of the step that failed.
    pub async fn subscribe_to_monitor(
        &mut self,
        monitor_id: MonitorId,
    ) -> std::result::Result<(), SubscribeError> {
        self.begin();
        let result = self.try_subscribe(monitor_id).await;
        match &result {
            Ok(()) => log::info!("Subscribed to push alerts for monitor {monitor_id}"),
            Err(e) => log::warn!("Subscribing to monitor {monitor_id} failed: {e}"),
        }
        self.finish(result.as_ref().err());
        result
    }

    /// Unsubscribes from alerts for `monitor_id`.
    ///
    /// The backend is notified best-effort; the local record is removed
    /// regardless. When no monitors remain subscribed, the installation's
    /// push subscription is removed as well.
    ///
    /// # Errors
    ///
    /// Returns an error if the id set cannot be persisted or the final
    /// device-level unsubscribe fails.
    pub async fn unsubscribe_from_monitor(
        &mut self,
        monitor_id: MonitorId,
    ) -> std::result::Result<(), SubscribeError> {
        self.begin();
        let result = self.try_unsubscribe(monitor_id).await;
        if let Err(e) = &result {
            log::error!("Failed to unsubscribe from monitor {monitor_id}: {e}");
        }
        self.finish(result.as_ref().err());
        result
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.publish();
    }

    fn finish(&mut self, error: Option<&SubscribeError>) {
        self.loading = false;
        self.error = error.map(ToString::to_string);
        self.publish();
    }

    async fn try_subscribe(&mut self, monitor_id: MonitorId) -> std::result::Result<(), SubscribeError> {
        if !self.platform.capabilities().supports_push() {
            return Err(SubscribeError::Unsupported);
        }
        let registration = self
            .ready_registration()
            .await
            .ok_or(SubscribeError::WorkerNotReady)?;

        self.permission = self.platform.permission();
        if self.permission != PermissionState::Granted
            && self.request_permission().await != PermissionState::Granted
        {
            return Err(SubscribeError::PermissionDenied);
        }

        let subscription = match registration
            .get_subscription()
            .await
            .map_err(SubscribeError::PushService)?
        {
            Some(existing) => {
                log::debug!("Reusing existing push subscription {}", existing.endpoint);
                existing
            }
            None => {
                let key = self
                    .backend
                    .vapid_public_key()
                    .await
                    .map_err(SubscribeError::ServerKey)?;
                let application_server_key =
                    url_base64_to_bytes(&key).map_err(SubscribeError::ServerKey)?;
                registration
                    .subscribe(SubscribeOptions {
                        user_visible_only: true,
                        application_server_key,
                    })
                    .await
                    .map_err(SubscribeError::PushService)?
            }
        };

        self.backend
            .register_subscription(monitor_id, &subscription.to_info())
            .await
            .map_err(SubscribeError::Registration)?;

        let ids: BTreeSet<MonitorId> = self
            .subscriptions
            .keys()
            .copied()
            .chain(std::iter::once(monitor_id))
            .collect();
        self.save_subscriptions(&ids)
            .await
            .map_err(SubscribeError::Storage)?;

        self.subscriptions.insert(
            monitor_id,
            SubscriptionRecord {
                monitor_id,
                subscription: Some(subscription),
            },
        );
        Ok(())
    }

    async fn try_unsubscribe(&mut self, monitor_id: MonitorId) -> std::result::Result<(), SubscribeError> {
        let Some(record) = self.subscriptions.get(&monitor_id).cloned() else {
            log::debug!("Monitor {monitor_id} has no subscription to remove");
            return Ok(());
        };

        // Restored records have no endpoint; ask the platform for the live one.
        let mut registration = None;
        let subscription = match record.subscription {
            Some(subscription) => Some(subscription),
            None => {
                registration = self.ready_registration().await;
                match &registration {
                    Some(reg) => reg.get_subscription().await.unwrap_or_else(|e| {
                        log::warn!("Could not look up push subscription: {e}");
                        None
                    }),
                    None => None,
                }
            }
        };

        match &subscription {
            Some(sub) => {
                if let Err(e) = self
                    .backend
                    .unregister_subscription(monitor_id, &sub.endpoint)
                    .await
                {
                    log::error!("Failed to notify backend of unsubscribe for monitor {monitor_id}: {e}");
                }
            }
            None => log::warn!(
                "No push endpoint known for monitor {monitor_id}, skipping backend unsubscribe"
            ),
        }

        let remaining: BTreeSet<MonitorId> = self
            .subscriptions
            .keys()
            .copied()
            .filter(|id| *id != monitor_id)
            .collect();
        self.save_subscriptions(&remaining)
            .await
            .map_err(SubscribeError::Storage)?;
        self.subscriptions.remove(&monitor_id);

        if self.subscriptions.is_empty() {
            self.unsubscribe_device(registration).await?;
        }
        Ok(())
    }

    /// Removes the installation's push subscription entirely.
    async fn unsubscribe_device(
        &self,
        registration: Option<Arc<dyn PushRegistration>>,
    ) -> std::result::Result<(), SubscribeError> {
        let registration = match registration {
            Some(reg) => reg,
            None => self
                .ready_registration()
                .await
                .ok_or(SubscribeError::WorkerNotReady)?,
        };
        let Some(current) = registration
            .get_subscription()
            .await
            .map_err(SubscribeError::Unsubscribe)?
        else {
            return Ok(());
        };
        registration
            .unsubscribe(&current)
            .await
            .map_err(SubscribeError::Unsubscribe)?;
        log::info!("No monitors left, removed push subscription {}", current.endpoint);
        Ok(())
    }

    async fn ready_registration(&self) -> Option<Arc<dyn PushRegistration>> {
        if let Ok(registration) =
            tokio::time::timeout(self.config.ready_timeout(), self.platform.ready()).await
        {
            registration
        } else {
            log::warn!(
                "No active worker registration after {:?}",
                self.config.ready_timeout()
            );
            None
        }
    }

    async fn save_subscriptions(&self, ids: &BTreeSet<MonitorId>) -> Result<()> {
        let ids: Vec<MonitorId> = ids.iter().copied().collect();
        self.storage
            .set_item(SUBSCRIPTIONS_KEY, &serde_json::to_string(&ids)?)
            .await
    }

    async fn load_subscriptions(&mut self) {
        let ids = match self.storage.get_item(SUBSCRIPTIONS_KEY).await {
            Ok(Some(stored)) => match serde_json::from_str::<Vec<MonitorId>>(&stored) {
                Ok(ids) => ids,
                Err(e) => {
                    log::error!("Failed to load subscriptions: {e}");
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                log::error!("Failed to load subscriptions: {e}");
                return;
            }
        };
        for monitor_id in ids {
            self.subscriptions
                .entry(monitor_id)
                .or_insert(SubscriptionRecord {
                    monitor_id,
                    subscription: None,
                });
        }
        log::debug!("Restored {} subscribed monitors", self.subscriptions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SubscriptionInfo;
    use crate::error::Error;
    use crate::platform::Capabilities;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const VAPID_KEY: &str = "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

    /// A push manager that hands out one subscription at a time.
    #[derive(Default)]
    struct MockRegistration {
        current: Mutex<Option<PushSubscription>>,
        subscribe_calls: AtomicUsize,
        unsubscribe_calls: AtomicUsize,
        last_server_key: Mutex<Option<Vec<u8>>>,
    }

    impl MockRegistration {
        fn with_existing(endpoint: &str) -> Self {
            let reg = Self::default();
            *reg.current.lock().unwrap() = Some(subscription(endpoint));
            reg
        }
    }

    fn subscription(endpoint: &str) -> PushSubscription {
        PushSubscription {
            endpoint: endpoint.to_string(),
            p256dh: Some(vec![4, 1, 2, 3]),
            auth: Some(vec![9, 9]),
        }
    }

    #[async_trait]
    impl PushRegistration for MockRegistration {
        async fn get_subscription(&self) -> Result<Option<PushSubscription>> {
            Ok(self.current.lock().unwrap().clone())
        }

        async fn subscribe(&self, options: SubscribeOptions) -> Result<PushSubscription> {
            assert!(options.user_visible_only);
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_server_key.lock().unwrap() = Some(options.application_server_key);
            let sub = subscription("https://push.example.net/send/new");
            *self.current.lock().unwrap() = Some(sub.clone());
            Ok(sub)
        }

        async fn unsubscribe(&self, _subscription: &PushSubscription) -> Result<bool> {
            self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.current.lock().unwrap().take().is_some())
        }
    }

    struct MockPlatform {
        capabilities: Capabilities,
        permission: Mutex<PermissionState>,
        prompt_answer: PermissionState,
        prompts: AtomicUsize,
        registration: Option<Arc<MockRegistration>>,
        never_ready: bool,
    }

    impl MockPlatform {
        fn granted(registration: MockRegistration) -> Self {
            Self {
                capabilities: Capabilities::all(),
                permission: Mutex::new(PermissionState::Granted),
                prompt_answer: PermissionState::Granted,
                prompts: AtomicUsize::new(0),
                registration: Some(Arc::new(registration)),
                never_ready: false,
            }
        }

        fn registration(&self) -> &MockRegistration {
            self.registration.as_deref().unwrap()
        }
    }

    #[async_trait]
    impl Platform for MockPlatform {
        fn capabilities(&self) -> Capabilities {
            self.capabilities
        }

        fn permission(&self) -> PermissionState {
            *self.permission.lock().unwrap()
        }

        async fn request_permission(&self) -> PermissionState {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            *self.permission.lock().unwrap() = self.prompt_answer;
            self.prompt_answer
        }

        async fn ready(&self) -> Option<Arc<dyn PushRegistration>> {
            if self.never_ready {
                std::future::pending::<()>().await;
            }
            self.registration
                .clone()
                .map(|reg| reg as Arc<dyn PushRegistration>)
        }
    }

    #[derive(Default)]
    struct MockBackend {
        reject_register: bool,
        fail_unregister: bool,
        calls: Mutex<Vec<String>>,
        registered: Mutex<Vec<(MonitorId, SubscriptionInfo)>>,
    }

    impl MockBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for MockBackend {
        async fn vapid_public_key(&self) -> Result<String> {
            self.calls.lock().unwrap().push("vapid".to_string());
            Ok(VAPID_KEY.to_string())
        }

        async fn register_subscription(
            &self,
            monitor_id: MonitorId,
            info: &SubscriptionInfo,
        ) -> Result<()> {
            self.calls.lock().unwrap().push(format!("subscribe {monitor_id}"));
            if self.reject_register {
                return Err(Error::Backend {
                    path: format!("/monitor/{monitor_id}/subscribe"),
                    status: 500,
                    message: "Failed to subscribe".to_string(),
                });
            }
            self.registered.lock().unwrap().push((monitor_id, info.clone()));
            Ok(())
        }

        async fn unregister_subscription(&self, monitor_id: MonitorId, _endpoint: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("unsubscribe {monitor_id}"));
            if self.fail_unregister {
                return Err(Error::Network("connection refused".to_string()));
            }
            Ok(())
        }
    }

    type TestManager = SubscriptionManager<MockPlatform, MockBackend, MemoryStorage>;

    fn manager(platform: MockPlatform, backend: MockBackend) -> TestManager {
        let config = PushConfig::default().with_ready_timeout(Duration::from_millis(50));
        SubscriptionManager::new(platform, backend, MemoryStorage::new(), config)
    }

    async fn persisted_ids(manager: &TestManager) -> Option<Vec<MonitorId>> {
        manager
            .storage()
            .get_item(SUBSCRIPTIONS_KEY)
            .await
            .unwrap()
            .map(|s| serde_json::from_str(&s).unwrap())
    }

    #[tokio::test]
    async fn check_support_requires_worker_and_push() {
        let mut platform = MockPlatform::granted(MockRegistration::default());
        platform.capabilities.push_manager = false;
        let mut mgr = manager(platform, MockBackend::default());
        assert!(!mgr.check_support().await);
        assert!(!mgr.supported());
        assert_eq!(mgr.permission(), PermissionState::Default);
    }

    #[tokio::test]
    async fn check_support_restores_persisted_intent() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        mgr.storage()
            .set_item(SUBSCRIPTIONS_KEY, "[5,3]")
            .await
            .unwrap();

        assert!(mgr.check_support().await);
        assert!(mgr.has_permission());
        assert_eq!(mgr.subscribed_monitor_ids(), vec![3, 5]);
        assert!(mgr.subscriptions()[&3].subscription.is_none());
    }

    #[tokio::test]
    async fn check_support_ignores_corrupt_storage() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        mgr.storage()
            .set_item(SUBSCRIPTIONS_KEY, "not json")
            .await
            .unwrap();
        assert!(mgr.check_support().await);
        assert!(mgr.subscribed_monitor_ids().is_empty());
    }

    #[tokio::test]
    async fn request_permission_without_notifications_is_denied() {
        let mut platform = MockPlatform::granted(MockRegistration::default());
        platform.capabilities.notifications = false;
        let mut mgr = manager(platform, MockBackend::default());
        assert_eq!(mgr.request_permission().await, PermissionState::Denied);
        assert_eq!(mgr.platform().prompts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn subscribe_creates_subscription_and_persists() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        assert!(!mgr.is_subscribed(42));

        mgr.subscribe_to_monitor(42).await.unwrap();

        assert!(mgr.is_subscribed(42));
        assert_eq!(mgr.subscribed_monitor_ids(), vec![42]);
        assert_eq!(persisted_ids(&mgr).await, Some(vec![42]));
        assert_eq!(mgr.backend().calls(), vec!["vapid", "subscribe 42"]);
        assert!(!mgr.loading());
        assert!(mgr.error().is_none());

        let reg = mgr.platform().registration();
        assert_eq!(reg.subscribe_calls.load(Ordering::SeqCst), 1);
        let key = reg.last_server_key.lock().unwrap().clone().unwrap();
        assert_eq!(key.len(), 65);
        assert_eq!(key[0], 0x04);

        let registered = mgr.backend().registered.lock().unwrap();
        assert_eq!(registered[0].1.endpoint, "https://push.example.net/send/new");
        assert_eq!(registered[0].1.keys.auth, "CQk=");
    }

    #[tokio::test]
    async fn subscribe_reuses_existing_platform_subscription() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::with_existing("https://push.example.net/old")),
            MockBackend::default(),
        );
        mgr.subscribe_to_monitor(1).await.unwrap();

        assert_eq!(mgr.platform().registration().subscribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(mgr.backend().calls(), vec!["subscribe 1"]);
        assert_eq!(
            mgr.subscriptions()[&1].subscription.as_ref().unwrap().endpoint,
            "https://push.example.net/old"
        );
    }

    #[tokio::test]
    async fn resubscribe_keeps_single_entry() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        mgr.subscribe_to_monitor(8).await.unwrap();
        mgr.subscribe_to_monitor(3).await.unwrap();
        mgr.subscribe_to_monitor(8).await.unwrap();

        assert_eq!(mgr.subscribed_monitor_ids(), vec![3, 8]);
        assert_eq!(persisted_ids(&mgr).await, Some(vec![3, 8]));
    }

    #[tokio::test]
    async fn subscribe_prompts_when_permission_not_granted() {
        let platform = MockPlatform::granted(MockRegistration::default());
        *platform.permission.lock().unwrap() = PermissionState::Default;
        let mut mgr = manager(platform, MockBackend::default());

        mgr.subscribe_to_monitor(4).await.unwrap();
        assert_eq!(mgr.platform().prompts.load(Ordering::SeqCst), 1);
        assert!(mgr.has_permission());
    }

    #[tokio::test]
    async fn subscribe_fails_when_permission_declined() {
        let mut platform = MockPlatform::granted(MockRegistration::default());
        *platform.permission.lock().unwrap() = PermissionState::Default;
        platform.prompt_answer = PermissionState::Denied;
        let mut mgr = manager(platform, MockBackend::default());

        let err = mgr.subscribe_to_monitor(4).await.unwrap_err();
        assert!(matches!(err, SubscribeError::PermissionDenied));
        assert_eq!(mgr.permission(), PermissionState::Denied);
        assert_eq!(mgr.error(), Some("Notification permission denied"));
        assert!(mgr.backend().calls().is_empty());
        assert!(!mgr.is_subscribed(4));
    }

    #[tokio::test]
    async fn subscribe_without_ready_worker_makes_no_backend_call() {
        let mut platform = MockPlatform::granted(MockRegistration::default());
        platform.never_ready = true;
        let mut mgr = manager(platform, MockBackend::default());

        let err = mgr.subscribe_to_monitor(42).await.unwrap_err();
        assert!(matches!(err, SubscribeError::WorkerNotReady));
        assert!(mgr.error().unwrap().contains("worker not ready"));
        assert!(mgr.backend().calls().is_empty());
        assert!(!mgr.is_subscribed(42));
        assert!(!mgr.loading());
        assert_eq!(persisted_ids(&mgr).await, None);
    }

    #[tokio::test]
    async fn subscribe_on_unsupported_platform_fails_fast() {
        let mut platform = MockPlatform::granted(MockRegistration::default());
        platform.capabilities.service_worker = false;
        let mut mgr = manager(platform, MockBackend::default());

        let err = mgr.subscribe_to_monitor(1).await.unwrap_err();
        assert!(matches!(err, SubscribeError::Unsupported));
        assert!(mgr.backend().calls().is_empty());
        assert_eq!(
            mgr.platform().registration().subscribe_calls.load(Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn subscribe_backend_rejection_leaves_state_unchanged() {
        let backend = MockBackend {
            reject_register: true,
            ..MockBackend::default()
        };
        let mut mgr = manager(MockPlatform::granted(MockRegistration::default()), backend);

        let err = mgr.subscribe_to_monitor(9).await.unwrap_err();
        assert!(matches!(err, SubscribeError::Registration(_)));
        assert!(mgr.error().unwrap().starts_with("Failed to save subscription on server"));
        assert!(!mgr.is_subscribed(9));
        assert_eq!(persisted_ids(&mgr).await, None);
    }

    #[tokio::test]
    async fn unsubscribe_last_monitor_removes_device_subscription() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        mgr.subscribe_to_monitor(1).await.unwrap();
        mgr.subscribe_to_monitor(2).await.unwrap();

        mgr.unsubscribe_from_monitor(1).await.unwrap();
        let reg = mgr.platform().registration();
        assert_eq!(reg.unsubscribe_calls.load(Ordering::SeqCst), 0);
        assert_eq!(persisted_ids(&mgr).await, Some(vec![2]));

        mgr.unsubscribe_from_monitor(2).await.unwrap();
        let reg = mgr.platform().registration();
        assert_eq!(reg.unsubscribe_calls.load(Ordering::SeqCst), 1);
        assert!(reg.current.lock().unwrap().is_none());
        assert_eq!(persisted_ids(&mgr).await, Some(vec![]));
        assert!(mgr.subscribed_monitor_ids().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_backend_failure_still_cleans_up() {
        let backend = MockBackend {
            fail_unregister: true,
            ..MockBackend::default()
        };
        let mut mgr = manager(MockPlatform::granted(MockRegistration::default()), backend);
        mgr.subscribe_to_monitor(5).await.unwrap();
        mgr.subscribe_to_monitor(6).await.unwrap();

        mgr.unsubscribe_from_monitor(5).await.unwrap();
        assert!(!mgr.is_subscribed(5));
        assert!(mgr.error().is_none());
        assert!(mgr.backend().calls().contains(&"unsubscribe 5".to_string()));
    }

    #[tokio::test]
    async fn unsubscribe_restored_record_looks_up_endpoint() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::with_existing("https://push.example.net/live")),
            MockBackend::default(),
        );
        mgr.storage()
            .set_item(SUBSCRIPTIONS_KEY, "[11]")
            .await
            .unwrap();
        mgr.check_support().await;

        mgr.unsubscribe_from_monitor(11).await.unwrap();
        assert_eq!(mgr.backend().calls(), vec!["unsubscribe 11"]);
        assert_eq!(
            mgr.platform().registration().unsubscribe_calls.load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn unsubscribe_unknown_monitor_is_noop() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::with_existing("https://push.example.net/x")),
            MockBackend::default(),
        );
        mgr.unsubscribe_from_monitor(77).await.unwrap();
        assert!(mgr.backend().calls().is_empty());
        assert_eq!(
            mgr.platform().registration().unsubscribe_calls.load(Ordering::SeqCst),
            0
        );
    }

    #[tokio::test]
    async fn watchers_see_published_snapshots() {
        let mut mgr = manager(
            MockPlatform::granted(MockRegistration::default()),
            MockBackend::default(),
        );
        let mut rx = mgr.watch();
        rx.borrow_and_update();

        mgr.subscribe_to_monitor(12).await.unwrap();
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert!(snapshot.is_subscribed(12));
        assert!(!snapshot.loading);
        assert!(snapshot.error.is_none());
        assert_eq!(snapshot, mgr.snapshot());
    }
}

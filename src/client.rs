use std::sync::{Arc, RwLock, Weak};

use tokio::{sync::watch, time, time::Duration};
use tracing::{event, Level};

use crate::{
    error::Error,
    http::FlagHttpClient,
    models::{valid_visitor_code, ClientConfig, FlagData, FlagSnapshot, Readiness, Stage},
};

/// Client for the remote flag/experimentation service.
///
/// Keeps a locally cached flag snapshot that syncs with the service
/// periodically and publishes a monotonic readiness signal for UI binding.
pub struct Client {
    config: ClientConfig,
    http_client: FlagHttpClient,
    readiness: watch::Sender<Readiness>,
    snapshot: RwLock<Option<FlagSnapshot>>,
}

impl Client {
    /// Validates `config` and returns a client handle in the `Initializing`
    /// state. The initial fetch runs on a background task bounded by the
    /// configured initialization timeout, so construction never blocks on
    /// the network.
    ///
    /// Configuration errors are logged at error level and returned to the
    /// caller; no client handle is produced for them. An initialization
    /// timeout is not an error, the client becomes not-ready and can still
    /// serve whatever snapshot it has.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize(config: ClientConfig) -> Result<Arc<Self>, Error> {
        Self::try_initialize(config).map_err(|err| {
            event!(Level::ERROR, "{}", err);
            err
        })
    }

    fn try_initialize(config: ClientConfig) -> Result<Arc<Self>, Error> {
        if config.site_code.trim().is_empty() {
            return Err(Error::EmptySiteCode);
        }
        if let Some(code) = &config.visitor_code {
            if !valid_visitor_code(code) {
                return Err(Error::InvalidVisitorCode(code.clone()));
            }
        }

        let http_client = FlagHttpClient::new(config.base_url.clone()).map_err(Error::Initialization)?;

        let (readiness, _) = watch::channel(Readiness::Initializing);
        let client = Arc::new(Self {
            config,
            http_client,
            readiness,
            snapshot: RwLock::new(None),
        });

        event!(
            Level::INFO,
            "client is initializing for site '{}'",
            client.config.site_code
        );

        // The background tasks hold only weak back-references so a discarded
        // client is not kept alive and never touched after it is gone.
        tokio::spawn(Self::run_initial_fetch(
            Arc::downgrade(&client),
            client.http_client.clone(),
            client.config.clone(),
        ));
        tokio::spawn(Self::poll_for_changes(
            Arc::downgrade(&client),
            client.http_client.clone(),
            client.config.clone(),
        ));

        Ok(client)
    }

    /// Registers a one-shot callback invoked exactly once with the readiness
    /// value: either when the service signals it has fetched its initial
    /// configuration, or when `timeout_millis` elapses, whichever comes
    /// first. A timeout pins the not-ready state, a later signal from the
    /// service does not re-trigger anything.
    ///
    /// If a terminal state was already reached the callback fires
    /// immediately on the calling thread with the stored value. Otherwise it
    /// fires on the runtime; marshaling back to a UI context is the
    /// caller's job. Re-registration is allowed and only invokes the new
    /// callback.
    pub fn on_ready<F>(self: &Arc<Self>, timeout_millis: u64, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let current = *self.readiness.borrow();
        if current.is_terminal() {
            callback(current == Readiness::Ready);
            return;
        }

        let mut rx = self.readiness.subscribe();
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let deadline = time::sleep(Duration::from_millis(timeout_millis));
            tokio::pin!(deadline);

            let initial = *rx.borrow();
            let ready = if initial.is_terminal() {
                initial == Readiness::Ready
            } else {
                loop {
                    tokio::select! {
                        () = &mut deadline => break false,
                        changed = rx.changed() => match changed {
                            Ok(()) => {
                                let state = *rx.borrow();
                                if state.is_terminal() {
                                    break state == Readiness::Ready;
                                }
                            }
                            // Sender gone means the owner was dropped.
                            Err(_) => return,
                        },
                    }
                }
            };

            let Some(client) = weak.upgrade() else { return };
            // On timeout this pins NotReady; if the race was lost the stored
            // terminal value wins. The readiness update happens-before the
            // callback either way.
            client.record_terminal(ready);
            let state = *client.readiness.borrow();
            drop(client);
            callback(state == Readiness::Ready);
        });
    }

    /// Last known readiness value.
    pub fn readiness(&self) -> Readiness {
        *self.readiness.borrow()
    }

    /// Whether the client finished its initial fetch and is safe to query.
    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    /// Whether initialization is still in flight.
    pub fn is_initializing(&self) -> bool {
        self.readiness() == Readiness::Initializing
    }

    /// The value of a flag from the cached snapshot, if any.
    pub fn flag_value(&self, key: &str) -> Option<serde_json::Value> {
        let snapshot = self
            .snapshot
            .read()
            .expect("should always be able to acquire lock");
        snapshot.as_ref().and_then(|s| s.flags.get(key).cloned())
    }

    /// Whether a boolean flag is active. Absent keys and non-boolean values
    /// count as inactive.
    pub fn feature_active(&self, key: &str) -> bool {
        matches!(self.flag_value(key), Some(serde_json::Value::Bool(true)))
    }

    /// The visitor code in effect: the configured one, or the one the
    /// service assigned during the initial fetch.
    pub fn visitor_code(&self) -> Option<String> {
        if let Some(code) = &self.config.visitor_code {
            return Some(code.clone());
        }
        let snapshot = self
            .snapshot
            .read()
            .expect("should always be able to acquire lock");
        snapshot.as_ref().and_then(|s| s.visitor_code.clone())
    }

    /// The cached snapshot, if the initial fetch has completed at least once.
    pub fn snapshot(&self) -> Option<FlagSnapshot> {
        self.snapshot
            .read()
            .expect("should always be able to acquire lock")
            .clone()
    }

    /// Logs an outcome: an info entry with the message on success, an error
    /// entry with the failure description otherwise. Never panics.
    pub fn log(&self, outcome: Result<(Stage, String), anyhow::Error>) {
        match outcome {
            Ok((_, message)) => event!(Level::INFO, "{}", message),
            Err(err) => event!(Level::ERROR, "{:#}", err),
        }
    }
}

// Private methods
impl Client {
    /// Records the terminal readiness value. Only the first caller wins,
    /// later calls are no-ops. The watch update is visible to subscribers
    /// before this returns.
    fn record_terminal(&self, ready: bool) -> bool {
        let changed = self.readiness.send_if_modified(|state| {
            if state.is_terminal() {
                return false;
            }
            *state = if ready {
                Readiness::Ready
            } else {
                Readiness::NotReady
            };
            true
        });
        if changed {
            event!(
                Level::INFO,
                "client is {} to use",
                if ready { "ready" } else { "not ready" }
            );
        }
        changed
    }

    fn store_snapshot(&self, data: FlagData) {
        let snapshot = FlagSnapshot::from_data(data);
        let mut guard = self
            .snapshot
            .write()
            .expect("should always be able to acquire lock");
        *guard = Some(snapshot);
    }

    async fn run_initial_fetch(weak: Weak<Self>, http_client: FlagHttpClient, config: ClientConfig) {
        let fetch = http_client.fetch_flag_data(&config.site_code, config.visitor_code.as_deref());
        match time::timeout(config.init_timeout(), fetch).await {
            Ok(Ok(data)) => {
                let Some(client) = weak.upgrade() else { return };
                client.store_snapshot(data);
                client.record_terminal(true);
            }
            Ok(Err(err)) => {
                event!(Level::ERROR, "initial flag fetch failed: {:#}", err);
                let Some(client) = weak.upgrade() else { return };
                client.record_terminal(false);
            }
            Err(_) => {
                let Some(client) = weak.upgrade() else { return };
                client.record_terminal(false);
            }
        }
    }

    async fn poll_for_changes(weak: Weak<Self>, http_client: FlagHttpClient, config: ClientConfig) {
        let mut interval = time::interval(config.refresh_interval());
        // The first tick fires immediately and the initial fetch covers it.
        interval.tick().await;
        loop {
            interval.tick().await;
            if weak.upgrade().is_none() {
                return;
            }
            event!(Level::DEBUG, "refreshing flag data");
            let data = match http_client
                .fetch_flag_data(&config.site_code, config.visitor_code.as_deref())
                .await
            {
                Ok(data) => data,
                Err(err) => {
                    event!(Level::ERROR, "failed to refresh flag data: {:#}", err);
                    continue;
                }
            };
            let Some(client) = weak.upgrade() else { return };
            client.store_snapshot(data);
        }
    }
}

//! Client-side credential list for one app.
//!
//! The full list is fetched once per [`CredentialList::load`] and kept in
//! memory; filtering, paging and selection are derived locally. Mutations go
//! to the backend one credential at a time.

use crate::admin::api::{AddUserRequest, AdminApi, SetUserRequest};
use crate::admin::config::DEFAULT_PAGE_SIZE;
use crate::admin::keygen::{generate_card_keys, CardKeyParams, TimeGrant};
use crate::admin::request::Notifier;
use crate::admin::types::{
    ConsoleError, Credential, CredentialDetail, CredentialKind, CredentialStatus, NormalizedResult,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ============================================================================
// View state
// ============================================================================

/// 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub current: usize,
    pub size: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            current: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One rendered page of the filtered list
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub items: Vec<Credential>,
    /// Number of credentials matching the keyword across all pages
    pub total: usize,
    pub page: PageWindow,
}

/// Client-only list state. Selected ids are always a subset of the ids in
/// `source_list`.
#[derive(Debug, Clone, Default)]
pub struct ListViewState {
    app_id: Option<u64>,
    source_list: Vec<Credential>,
    search_keyword: String,
    page: PageWindow,
    selected_ids: BTreeSet<u64>,
}

impl ListViewState {
    pub fn with_page_size(size: usize) -> Self {
        Self {
            page: PageWindow {
                current: 1,
                size: size.max(1),
            },
            ..Default::default()
        }
    }

    pub fn app_id(&self) -> Option<u64> {
        self.app_id
    }

    pub fn source_list(&self) -> &[Credential] {
        &self.source_list
    }

    pub fn search_keyword(&self) -> &str {
        &self.search_keyword
    }

    pub fn page(&self) -> PageWindow {
        self.page
    }

    pub fn selected_ids(&self) -> &BTreeSet<u64> {
        &self.selected_ids
    }

    pub fn replace_source(&mut self, app_id: u64, list: Vec<Credential>) {
        self.app_id = Some(app_id);
        self.source_list = list;
        self.selected_ids.clear();
    }

    /// New filter: back to page 1, selection dropped
    pub fn set_keyword(&mut self, keyword: &str) {
        self.search_keyword = keyword.to_string();
        self.page.current = 1;
        self.selected_ids.clear();
    }

    pub fn set_page(&mut self, current: usize, size: usize) {
        self.page = PageWindow {
            current: current.max(1),
            size: size.max(1),
        };
    }

    /// Replace the selection; ids not in the list are ignored
    pub fn select(&mut self, ids: impl IntoIterator<Item = u64>) {
        let known: BTreeSet<u64> = self.source_list.iter().map(|c| c.id).collect();
        self.selected_ids = ids.into_iter().filter(|id| known.contains(id)).collect();
    }

    /// Drop a credential from the list and the selection together
    pub fn remove(&mut self, id: u64) {
        self.source_list.retain(|c| c.id != id);
        self.selected_ids.remove(&id);
    }

    pub fn view(&self) -> PageView {
        let filtered: Vec<&Credential> = self
            .source_list
            .iter()
            .filter(|c| c.matches(&self.search_keyword))
            .collect();

        let start = (self.page.current - 1).saturating_mul(self.page.size);
        let items = filtered
            .iter()
            .skip(start)
            .take(self.page.size)
            .map(|c| (*c).clone())
            .collect();

        PageView {
            items,
            total: filtered.len(),
            page: self.page,
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// What to create in [`CredentialList::generate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateRequest {
    CardKeys(CardKeyParams),
    Serial { key: String, grant: TimeGrant },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationReport {
    pub kind: CredentialKind,
    /// Every key submitted, whether or not its creation call succeeded
    pub keys: Vec<String>,
    pub created: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchDeleteReport {
    pub deleted: Vec<u64>,
    pub failed: Vec<u64>,
}

impl BatchDeleteReport {
    pub fn total(&self) -> usize {
        self.deleted.len() + self.failed.len()
    }

    pub fn summary(&self) -> String {
        format!("{} of {} succeeded", self.deleted.len(), self.total())
    }
}

/// Editable credential fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialUpdate {
    pub status: CredentialStatus,
    pub description: String,
    /// Epoch seconds, 0 = no expiry
    pub end_time: i64,
}

/// In-memory credential list controller
pub struct CredentialList {
    api: AdminApi,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ListViewState>,
    load_seq: AtomicU64,
}

impl CredentialList {
    pub fn new(api: AdminApi, page_size: usize) -> Self {
        let notifier = Arc::clone(api.requester().notifier());
        Self {
            api,
            notifier,
            state: Mutex::new(ListViewState::with_page_size(page_size)),
            load_seq: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, ListViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ListViewState {
        self.state().clone()
    }

    pub fn view(&self) -> PageView {
        self.state().view()
    }

    pub fn set_keyword(&self, keyword: &str) {
        self.state().set_keyword(keyword);
    }

    pub fn set_page(&self, current: usize, size: usize) {
        self.state().set_page(current, size);
    }

    pub fn toggle_select(&self, ids: impl IntoIterator<Item = u64>) {
        self.state().select(ids);
    }

    /// Fetch the full list for `app_id`.
    ///
    /// On failure the previous list is kept. A response that arrives after a
    /// newer load was issued is discarded.
    pub async fn load(&self, app_id: u64) -> bool {
        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.api.list_users(app_id).await;

        let mut state = self.state();
        if self.load_seq.load(Ordering::SeqCst) != seq {
            tracing::debug!(app_id, seq, "discarding superseded credential list");
            return false;
        }
        if !result.success {
            return false;
        }

        let list = result.result.unwrap_or_default();
        tracing::debug!(app_id, count = list.len(), "credential list loaded");
        state.replace_source(app_id, list);
        true
    }

    fn current_app(&self) -> Result<u64, ConsoleError> {
        self.state()
            .app_id()
            .ok_or_else(|| ConsoleError::Validation("No app loaded".to_string()))
    }

    fn reject<T>(&self, error: ConsoleError) -> Result<T, ConsoleError> {
        self.notifier.error(&error.to_string());
        Err(error)
    }

    /// Create card keys in bulk or a single serial for `app_id`, then reload
    /// that app's list. Form errors are reported before any request is sent.
    pub async fn generate(
        &self,
        app_id: u64,
        request: GenerateRequest,
    ) -> Result<GenerationReport, ConsoleError> {
        let (kind, keys, time_interval) = match &request {
            GenerateRequest::CardKeys(params) => {
                let seconds = match params.validate() {
                    Ok(seconds) => seconds,
                    Err(e) => return self.reject(e),
                };
                let keys = match generate_card_keys(params.count, params.length) {
                    Ok(keys) => keys,
                    Err(e) => return self.reject(e),
                };
                (CredentialKind::CardKey, keys, seconds)
            }
            GenerateRequest::Serial { key, grant } => {
                if key.trim().is_empty() {
                    return self.reject(ConsoleError::Validation("Serial is required".to_string()));
                }
                let seconds = match grant.validate() {
                    Ok(seconds) => seconds,
                    Err(e) => return self.reject(e),
                };
                (CredentialKind::Serial, vec![key.clone()], seconds)
            }
        };

        let mut created = 0;
        for key in &keys {
            let request = AddUserRequest {
                appid: app_id,
                usertype: kind.as_wire().to_string(),
                userkey: key.clone(),
                time_interval,
            };
            if self.api.add_user(&request).await.success {
                created += 1;
            }
        }

        tracing::info!(app_id, %kind, requested = keys.len(), created, "credentials submitted");
        if kind == CredentialKind::CardKey {
            self.notifier
                .info(&format!("Created {} of {} card keys", created, keys.len()));
        }

        self.load(app_id).await;

        Ok(GenerationReport { kind, keys, created })
    }

    /// Delete one credential of the loaded app
    pub async fn delete(&self, id: u64) -> bool {
        let app_id = match self.current_app() {
            Ok(app_id) => app_id,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return false;
            }
        };

        let result = self.api.delete_user(app_id, id).await;
        if result.success {
            self.state().remove(id);
        }
        result.success
    }

    /// Delete each id in turn; failures do not stop the rest
    pub async fn batch_delete(&self, ids: &[u64]) -> BatchDeleteReport {
        let mut report = BatchDeleteReport::default();

        let app_id = match self.current_app() {
            Ok(app_id) => app_id,
            Err(e) => {
                self.notifier.error(&e.to_string());
                return report;
            }
        };
        if ids.is_empty() {
            self.notifier.error("No credentials selected");
            return report;
        }

        for &id in ids {
            if self.api.delete_user(app_id, id).await.success {
                self.state().remove(id);
                report.deleted.push(id);
            } else {
                report.failed.push(id);
            }
        }

        let summary = report.summary();
        tracing::info!(
            app_id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "batch delete finished"
        );
        if report.failed.is_empty() {
            self.notifier.success(&summary);
        } else {
            self.notifier.info(&summary);
        }
        report
    }

    pub async fn detail(&self, id: u64) -> NormalizedResult<CredentialDetail> {
        self.api.user_info(id).await
    }

    /// Save edits; the loaded app is reloaded afterwards
    pub async fn update(&self, id: u64, update: &CredentialUpdate) -> bool {
        if update.status == CredentialStatus::Unknown {
            self.notifier
                .error("Credential status is not recognized; set it explicitly");
            return false;
        }

        let request = SetUserRequest {
            id,
            status: update.status.as_wire().to_string(),
            description: update.description.clone(),
            end_time: update.end_time,
        };

        let result = self.api.set_user(&request).await;
        let app_id = self.state().app_id();
        if let (true, Some(app_id)) = (result.success, app_id) {
            self.load(app_id).await;
        }
        result.success
    }
}

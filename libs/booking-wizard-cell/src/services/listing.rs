// libs/booking-wizard-cell/src/services/listing.rs
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Method;
use tracing::debug;

use shared_clinic_api::ClinicApiClient;
use shared_config::AppConfig;
use shared_models::auth::Session;

use crate::models::{DoctorListQuery, DoctorPage, DoctorSummary};

/// Doctors fetched per directory page.
pub const DOCTOR_PAGE_SIZE: u32 = 20;

/// State machine for an append-only paged listing.
///
/// `page` is always the next page to load. A load may only begin when none
/// is running and more data exists, so double-triggering a scroll edge is
/// harmless; a failed load gives the trigger back without advancing.
#[derive(Debug, Clone, PartialEq)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub has_more: bool,
    pub is_loading: bool,
}

impl<T> PagedList<T> {
    pub fn new() -> Self {
        Self::at_page(0)
    }

    /// Empty list positioned to load `page` next.
    pub fn at_page(page: u32) -> Self {
        Self {
            items: Vec::new(),
            page,
            has_more: true,
            is_loading: false,
        }
    }

    /// Claims the load slot. False means nothing should be fetched: a load
    /// is already running or the end of the data was reached.
    pub fn begin_load(&mut self) -> bool {
        if self.is_loading || !self.has_more {
            return false;
        }
        self.is_loading = true;
        true
    }

    /// Appends a fetched page and advances to the next one.
    pub fn apply_page(&mut self, items: Vec<T>, has_more: bool) {
        self.items.extend(items);
        self.page += 1;
        self.has_more = has_more;
        self.is_loading = false;
    }

    /// Releases the load slot after a failed fetch; position is unchanged
    /// so the same page can be retried.
    pub fn fail_load(&mut self) {
        self.is_loading = false;
    }

    /// Starts over for a new filter: back to page 0 with no items, so the
    /// next applied page replaces rather than appends.
    pub fn reset_filter(&mut self) {
        self.items.clear();
        self.page = 0;
        self.has_more = true;
        self.is_loading = false;
    }
}

impl<T> Default for PagedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Doctor directory reads, driven through the [`PagedList`] protocol.
pub struct DoctorListingService {
    api: Arc<ClinicApiClient>,
}

impl DoctorListingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api: Arc::new(ClinicApiClient::new(config)),
        }
    }

    pub fn with_client(api: Arc<ClinicApiClient>) -> Self {
        Self { api }
    }

    /// Loads the list's next page from the directory. Returns false when
    /// the list refused the load (already loading or exhausted).
    pub async fn load_next(
        &self,
        list: &mut PagedList<DoctorSummary>,
        search: Option<&str>,
        auth: &Session,
    ) -> Result<bool> {
        if !list.begin_load() {
            debug!("Doctor directory load skipped (loading or exhausted)");
            return Ok(false);
        }

        let mut path = format!(
            "/api/v1/doctors?limit={}&offset={}",
            DOCTOR_PAGE_SIZE,
            list.page * DOCTOR_PAGE_SIZE
        );
        if let Some(term) = search {
            let term = term.trim();
            if !term.is_empty() {
                // User text is URL-encoded so reserved characters cannot
                // split the query.
                let encoded = urlencoding::encode(term);
                path.push_str(&format!("&search={}", encoded));
            }
        }

        let fetched: Vec<DoctorSummary> = match self
            .api
            .request(Method::GET, &path, Some(auth), None)
            .await
        {
            Ok(fetched) => fetched,
            Err(err) => {
                list.fail_load();
                return Err(err).context("failed to fetch doctor directory page");
            }
        };

        let has_more = fetched.len() as u32 == DOCTOR_PAGE_SIZE;
        debug!(
            "Doctor directory page {} loaded: {} doctors, has_more={}",
            list.page,
            fetched.len(),
            has_more
        );
        list.apply_page(fetched, has_more);
        Ok(true)
    }

    /// One stateless directory page for the HTTP surface: positions a fresh
    /// list at the requested page and loads it.
    pub async fn page(&self, query: &DoctorListQuery, auth: &Session) -> Result<DoctorPage> {
        let requested = query.page.unwrap_or(0);
        let mut list = PagedList::at_page(requested);

        self.load_next(&mut list, query.search.as_deref(), auth)
            .await?;

        Ok(DoctorPage {
            items: list.items,
            page: requested,
            has_more: list.has_more,
        })
    }
}

//! User directory: paged listing over credential records.

use std::sync::Arc;

use eshop_auth::{Credential, UserVm, credential_fields};
use eshop_core::{FilterSpec, PageRequest, PageResult};

use crate::paging::{PagedQueryEngine, QueryError};
use crate::read_model::RecordSource;

pub struct UserDirectory {
    source: Arc<dyn RecordSource<Credential>>,
    engine: PagedQueryEngine,
}

impl UserDirectory {
    pub fn new(source: Arc<dyn RecordSource<Credential>>) -> Self {
        Self {
            source,
            engine: PagedQueryEngine::new(),
        }
    }

    pub fn with_engine(mut self, engine: PagedQueryEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Users whose user name or phone number contains the keyword, in
    /// creation order.
    pub async fn paging(&self, request: &PageRequest) -> Result<PageResult<UserVm>, QueryError> {
        let filter = FilterSpec::new().contains(
            &[credential_fields::USER_NAME, credential_fields::PHONE_NUMBER],
            request.keyword(),
        );
        self.engine
            .page(&*self.source, request, &filter, |c: Credential| UserVm::from(&c))
            .await
    }
}

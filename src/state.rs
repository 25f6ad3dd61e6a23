use std::sync::Arc;

use sqlx::SqlitePool;

use crate::identity::IdentityProvider;
use crate::models::Term;
use crate::services::{CreditService, EnrollmentLocks, EnrollmentService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub identity: Arc<dyn IdentityProvider>,
    pub locks: Arc<EnrollmentLocks>,
    pub current_term: Term,
}

impl AppState {
    pub fn new(db: SqlitePool, identity: Arc<dyn IdentityProvider>, current_term: Term) -> Self {
        Self {
            db,
            identity,
            locks: Arc::new(EnrollmentLocks::new()),
            current_term,
        }
    }

    pub fn enrollments(&self) -> EnrollmentService {
        EnrollmentService::new(self.db.clone(), self.locks.clone())
    }

    pub fn credits(&self) -> CreditService {
        CreditService::new(self.db.clone())
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Idle slots are swept once the map grows past this many keys.
const SWEEP_THRESHOLD: usize = 1024;

/// One async mutex per key, created on demand.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub async fn lock(&self, key: i64) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock();
            if slots.len() > SWEEP_THRESHOLD {
                // only the map holds an idle slot
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Serialises enrollment changes per student and per offering.
/// Always taken student first, then offering.
#[derive(Default)]
pub struct EnrollmentLocks {
    students: KeyedLocks,
    offerings: KeyedLocks,
}

pub struct EnrollmentGuard {
    _student: OwnedMutexGuard<()>,
    _offering: OwnedMutexGuard<()>,
}

impl EnrollmentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, student_id: i64, offering_id: i64) -> EnrollmentGuard {
        let student = self.students.lock(student_id).await;
        let offering = self.offerings.lock(offering_id).await;
        EnrollmentGuard {
            _student: student,
            _offering: offering,
        }
    }
}

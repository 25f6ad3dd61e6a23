pub mod credit;
pub mod enrollment;
pub mod locks;

pub use credit::CreditService;
pub use enrollment::{EnrollPolicy, EnrollmentService};
pub use locks::{EnrollmentLocks, KeyedLocks};

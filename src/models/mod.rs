pub mod course;
pub mod credit;
pub mod enrollment;
pub mod favorite;
pub mod offering;
pub mod schedule;

pub use course::{Course, CourseType, Department};
pub use credit::{CreditBuckets, CreditRow, CreditSummary, CreditTotals, Term, UserInfo};
pub use enrollment::{EnrolledCourse, EnrolledQueryParams, Enrollment, EnrollmentStatus, ListedCourseRow};
pub use favorite::{FavoriteCourse, FavoriteEntry, FavoriteToggled};
pub use offering::{
    ClassTime, CourseOffering, CreateOfferingRequest, FilterOptions, NewClassTime, NewOfferingTeacher,
    OfferingDetail, OfferingFilter, OfferingRow, OfferingStatus, OfferingTeacher, SelectOption, TeacherRole,
};
pub use schedule::{ScheduledSlot, TimeSlot, find_conflict};

pub mod booking;
pub mod payment;
pub mod student;

pub use booking::{AttendanceRequest, Booking, Enrollment, NewBookingRequest, UpdateBookingRequest};
pub use payment::{NewPaymentRequest, Payment};
pub use student::{NewStudentRequest, Student, UpdateStudentRequest};

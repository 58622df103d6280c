pub mod action_token;
pub mod audit;
pub mod request_input;
pub mod shift;
pub mod shift_input;
pub mod shift_request;
pub mod time_slot;
pub mod volunteer;

pub use action_token::{ActionToken, TokenAction};
pub use audit::AuditLogEntry;
pub use request_input::{
    RequestMutationResponse, ResolveRequestInput, ShiftRequestWithDetails, SubmitShiftRequestInput,
};
pub use shift::{Shift, ShiftRole, ShiftStatus, SlotType};
pub use shift_input::{
    AssignShiftInput, OpenShiftSlot, PublishMonthInput, PublishMonthResponse, ReleaseShiftInput,
    ShiftMutationResponse, ShiftWithSlot,
};
pub use shift_request::{RequestStatus, ShiftRequest};
pub use time_slot::{start_datetime, TimeSlot};
pub use volunteer::Volunteer;

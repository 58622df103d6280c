use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::Modify;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Volrota API",
        version = "1.0.0",
        description = "Volunteer shift scheduling: slot assignment, self-service requests, emailed action links, reminder and escalation sweeps",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        // Health
        crate::handlers::health::health_check,

        // Action links
        crate::handlers::action_handler::describe_action,
        crate::handlers::action_handler::execute_action,

        // Requests
        crate::handlers::requests_handler::submit_request,
        crate::handlers::requests_handler::get_requests,
        crate::handlers::requests_handler::resolve_request,

        // References
        crate::handlers::references_handler::get_time_slots,

        // Shifts
        crate::handlers::shifts_handler::get_open_shifts,
        crate::handlers::shifts_handler::get_shifts_for_month,
        crate::handlers::shifts_handler::assign_shift,
        crate::handlers::shifts_handler::release_shift,
        crate::handlers::shifts_handler::publish_month,

        // Audit
        crate::handlers::audit_handler::get_audit,
    ),
    components(
        schemas(
            // Core models
            crate::models::Shift,
            crate::models::ShiftStatus,
            crate::models::ShiftRole,
            crate::models::SlotType,
            crate::models::Volunteer,
            crate::models::TimeSlot,
            crate::models::ShiftRequest,
            crate::models::RequestStatus,
            crate::models::ActionToken,
            crate::models::TokenAction,
            crate::models::AuditLogEntry,

            // Inputs and responses
            crate::models::SubmitShiftRequestInput,
            crate::models::ResolveRequestInput,
            crate::models::RequestMutationResponse,
            crate::models::ShiftRequestWithDetails,
            crate::models::AssignShiftInput,
            crate::models::ReleaseShiftInput,
            crate::models::ShiftMutationResponse,
            crate::models::ShiftWithSlot,
            crate::models::OpenShiftSlot,
            crate::models::PublishMonthInput,
            crate::models::PublishMonthResponse,
            crate::handlers::action_handler::ActionDescription,
            crate::handlers::action_handler::ActionOutcome,
            crate::handlers::audit_handler::AuditEntryWithNames,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "actions", description = "Emailed single-use action links"),
        (name = "references", description = "Reference data"),
        (name = "requests", description = "Self-service shift requests and admin resolution"),
        (name = "shifts", description = "Shift listings, manual assignment, month publication"),
        (name = "audit", description = "Audit trail"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Admin-Key"))),
            )
        }
    }
}

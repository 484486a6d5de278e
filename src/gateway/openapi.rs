//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8000/docs`
//! - OpenAPI JSON: `http://localhost:8000/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::gateway::handlers::{CircuitReport, HealthResponse, StatusResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Order Mesh Gateway API",
        version = "1.0.0",
        description = "Users, orders and deliveries behind per-dependency circuit breakers. \
            When a dependency is unavailable its routes answer 500 with \
            `{\"error\": \"<Service> service temporarily unavailable\"}`.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        crate::gateway::handlers::status,
        crate::gateway::handlers::list_users,
        crate::gateway::handlers::create_user,
        crate::gateway::handlers::get_user,
        crate::gateway::handlers::update_user,
        crate::gateway::handlers::delete_user,
        crate::gateway::handlers::user_details,
        crate::gateway::handlers::list_orders,
        crate::gateway::handlers::create_order,
        crate::gateway::handlers::get_order,
        crate::gateway::handlers::update_order,
        crate::gateway::handlers::delete_order,
        crate::gateway::handlers::list_deliveries,
        crate::gateway::handlers::create_delivery,
        crate::gateway::handlers::track_delivery,
        crate::gateway::handlers::get_delivery,
        crate::gateway::handlers::update_delivery,
        crate::gateway::handlers::delete_delivery,
    ),
    components(schemas(HealthResponse, CircuitReport, StatusResponse)),
    tags(
        (name = "Users", description = "Users service, plus the user details aggregate"),
        (name = "Orders", description = "Orders service"),
        (name = "Deliveries", description = "Deliveries service"),
        (name = "System", description = "Health checks and circuit state")
    )
)]
pub struct ApiDoc;

use actix_web::HttpResponse;

/// Liveness probe; sits outside the API prefix and needs no credentials.
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().finish()
}

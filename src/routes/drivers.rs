use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers::drivers::*, state::AppState};

pub fn driver_routes() -> Router<AppState> {
    Router::new()
        .route("/upcoming", get(upcoming_bookings))
        .route("/confirm", post(confirm_booking))
        .route("/cancel", post(cancel_booking))
        .route("/complete", post(complete_booking))
        .route("/bookings", get(booking_history))
        .route("/cabs", get(my_cabs).post(register_cab))
        .route("/cabs/:id", put(update_cab).delete(delete_cab))
}

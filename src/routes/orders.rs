use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers::orders::*, state::AppState};

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/book", post(book_cab))
        .route("/verify-payment", post(verify_payment))
        .route("/mine", get(my_bookings))
        .route("/pending", get(pending_orders))
        .route("/:id", get(get_order))
}

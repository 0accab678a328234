use axum::{
    routing::{get, post, put},
    Router,
};

use crate::{handlers::admin::*, state::AppState};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/cabs/available", post(available_cabs))
        .route("/cabs/:id/rate", put(set_cab_rate))
        .route("/orders/assigning", get(assigning_orders))
        .route("/orders/:id/assign", post(assign_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/complete", post(complete_order))
        .route("/drivers/:id/verify", put(verify_driver))
        .route("/payouts/pending", get(pending_payouts))
        .route("/payouts/settle", post(settle_payout))
}

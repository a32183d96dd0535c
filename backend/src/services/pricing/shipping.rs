//! `GET /api/pricing/shipping?market=&courier=&total=`.
//!
//! `total` is the cart total in the market currency. The answer uses the same
//! rule the event builder applies to order values, so the amount the customer
//! is shown is the amount reported to the platforms.

use crate::pricing::{amount_to_free_shipping, round_money, shipping_cost};
use crate::services::AppState;
use actix_web::{web, HttpResponse, Responder};
use common::requests::ShippingQuote;
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ShippingQuery {
    pub market: String,
    pub courier: String,
    pub total: Decimal,
}

pub async fn process(query: web::Query<ShippingQuery>, state: web::Data<AppState>) -> impl Responder {
    let Some(market) = state.builder.market(&query.market) else {
        return HttpResponse::NotFound().body(format!("Unknown market: {}", query.market));
    };
    let Some(courier) = market.courier(&query.courier) else {
        return HttpResponse::NotFound().body(format!(
            "Unknown courier {} for market {}",
            query.courier, market.code
        ));
    };
    if query.total < Decimal::ZERO {
        return HttpResponse::BadRequest().body("total must not be negative");
    }

    HttpResponse::Ok().json(ShippingQuote {
        market: market.code.clone(),
        courier: courier.id.clone(),
        currency: market.currency,
        shipping_cost: round_money(shipping_cost(query.total, courier, market), market.currency),
        amount_to_free_shipping: round_money(
            amount_to_free_shipping(query.total, market),
            market.currency,
        ),
    })
}

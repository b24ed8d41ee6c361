use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Catalog, cart, and checkout API with hosted-payment reconciliation"
    ),
    paths(
        handlers::products::list_products,
        handlers::products::search_products,
        handlers::products::get_product,
        handlers::carts::view_cart,
        handlers::carts::add_cart_item,
        handlers::carts::update_cart,
        handlers::carts::clear_cart,
        handlers::checkout::start_checkout,
        handlers::checkout::checkout_success,
        handlers::orders::my_orders,
        handlers::orders::order_detail,
        handlers::webhooks::payment_webhook,
        handlers::admin::set_order_status,
        handlers::auth::login,
        handlers::auth::logout,
    ),
    components(schemas(
        ErrorResponse,
        handlers::carts::AddCartItemRequest,
        handlers::carts::UpdateCartRequest,
        handlers::admin::SetOrderStatusRequest,
        handlers::auth::LoginRequest,
    )),
    tags(
        (name = "storefront", description = "Catalog, cart, checkout, and order endpoints")
    )
)]
pub struct ApiDoc;

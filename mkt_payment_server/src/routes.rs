//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two go into a separate module:
//! the provider webhooks live in [`crate::webhook_routes`] and the buyer-facing checkout in
//! [`crate::checkout_routes`].
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any long, non-cpu-bound operation (database access, calls to the
//! payment providers) must be expressed as futures so that other requests are served in the meantime.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use mkt_payment_engine::{db_types::OrderId, EscalationApi, EscalationStore, OrderFlowApi, PaymentGatewayDatabase};
use tokio::sync::Mutex;

use crate::{
    data_objects::{AutoCompleteResponse, AutoReviewResponse},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Escalation  ----------------------------------------------------
/// Single-flight guards for the escalation sweeps. A trigger that arrives while the same sweep is still running in this
/// process is turned away with `409 Conflict`.
#[derive(Default)]
pub struct SweepLocks {
    pub auto_complete: Mutex<()>,
    pub auto_review: Mutex<()>,
}

route!(auto_complete => Get "/auto-complete" impl EscalationStore);
/// Completes delivered orders whose dispute window has passed.
///
/// Responds with `{ completed, skipped, errors, truncated, results }`. A `truncated` sweep stopped early because of
/// its batch size or time budget. Triggering it again picks up the remaining orders.
pub async fn auto_complete<B: EscalationStore>(
    api: web::Data<EscalationApi<B>>,
    locks: web::Data<SweepLocks>,
) -> Result<HttpResponse, ServerError> {
    let Ok(_guard) = locks.auto_complete.try_lock() else {
        info!("🕰️ Auto-complete was triggered while a previous run is still in progress");
        return Err(ServerError::Conflict("An auto-complete sweep is already running.".to_string()));
    };
    debug!("🕰️ Auto-complete triggered");
    let report = api.auto_complete().await?;
    Ok(HttpResponse::Ok().json(AutoCompleteResponse::from(report)))
}

route!(auto_review => Get "/auto-review" impl EscalationStore);
/// Leaves automatic reviews on completed orders that the buyer never reviewed.
///
/// Responds with `{ created, skipped, errors, truncated, results }`.
pub async fn auto_review<B: EscalationStore>(
    api: web::Data<EscalationApi<B>>,
    locks: web::Data<SweepLocks>,
) -> Result<HttpResponse, ServerError> {
    let Ok(_guard) = locks.auto_review.try_lock() else {
        info!("🕰️ Auto-review was triggered while a previous run is still in progress");
        return Err(ServerError::Conflict("An auto-review sweep is already running.".to_string()));
    };
    debug!("🕰️ Auto-review triggered");
    let report = api.auto_review().await?;
    Ok(HttpResponse::Ok().json(AutoReviewResponse::from(report)))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(order_by_id => Get "/{order_id}" impl PaymentGatewayDatabase);
pub async fn order_by_id<B: PaymentGatewayDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order {order_id}");
    let order = api.fetch_order(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(mark_delivered => Post "/{order_id}/delivered" impl PaymentGatewayDatabase);
pub async fn mark_delivered<B: PaymentGatewayDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST mark order {order_id} as delivered");
    let order = api.mark_delivered(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(raise_dispute => Post "/{order_id}/dispute" impl PaymentGatewayDatabase);
pub async fn raise_dispute<B: PaymentGatewayDatabase>(
    path: web::Path<OrderId>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ POST raise dispute on order {order_id}");
    let order = api.raise_dispute(&order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

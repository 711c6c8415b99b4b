use actix_web::{Responder, get, web::ThinData};
use metrics_exporter_prometheus::PrometheusHandle;

#[get("/metrics")]
pub async fn metrics(handle: ThinData<PrometheusHandle>) -> impl Responder {
    handle.render()
}

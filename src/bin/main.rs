#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate pixbord;

    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use pixbord::core::db::seed_demo_data;
    use pixbord::{Config, MemoryStore};
    use tracing::{error, info};

    type Service = pixbord::App<MemoryStore>;

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request};

        pub fn actix_to_spin_request(req: &HttpRequest, body: actix_web::web::Bytes) -> Request {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                other => Method::Other(other.to_string()),
            };

            let mut builder = Request::builder();
            builder.method(method).uri(req.uri().to_string());
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    builder.header(name.as_str(), val_str);
                }
            }
            builder.body(body.to_vec()).build()
        }

        pub fn spin_to_actix_response(spin_resp: spin_sdk::http::Response) -> actix_web::HttpResponse {
            let status = actix_web::http::StatusCode::from_u16(*spin_resp.status())
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = actix_web::HttpResponse::build(status);
            for (name, value) in spin_resp.headers() {
                if let Some(value) = value.as_str() {
                    response.insert_header((name.to_string(), value.to_string()));
                }
            }
            response.body(spin_resp.body().to_vec())
        }
    }

    pub async fn run() -> std::io::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();

        let config = Config::from_env();
        let store = MemoryStore::new();
        if config.seed {
            if let Err(e) = seed_demo_data(&store) {
                error!("seeding demo data failed: {:#}", e);
            }
        }

        let bind_addr = config.bind_addr.clone();
        let service = web::Data::new(Service::new(store, config));
        info!("Server listening on http://{}", bind_addr);

        HttpServer::new(move || {
            App::new()
                .app_data(web::Data::clone(&service))
                .app_data(web::PayloadConfig::new(16 * 1024 * 1024))
                .default_service(web::route().to(handle_all))
        })
        .bind(bind_addr)?
        .run()
        .await
    }

    async fn handle_all(
        service: web::Data<Service>,
        req: HttpRequest,
        body: web::Bytes,
    ) -> HttpResponse {
        let spin_req = adapter::actix_to_spin_request(&req, body);
        adapter::spin_to_actix_response(service.handle(&spin_req))
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}

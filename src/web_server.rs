use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware, web};

use crate::config::ServerConfig;
use crate::queue::JobQueue;
use crate::routes::{check_code_handler, json_error_handler, run_code_handler};

pub fn build_server(server_config: ServerConfig, job_queue: Arc<JobQueue>) -> std::io::Result<Server> {
    let job_queue = web::Data::from(job_queue);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(job_queue.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .wrap(middleware::Logger::default())
            .service(run_code_handler)
            .service(check_code_handler)
    })
    .bind((
        server_config
            .bind_address
            .unwrap_or("127.0.0.1".to_string()),
        server_config.bind_port.unwrap_or(12345),
    ))?
    .run();

    Ok(server)
}

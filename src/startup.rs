use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::configuration::JwtSettings;
use crate::middleware::JwtMiddleware;
use crate::routes::{
    delete_current_user, get_current_user, health_check, login, logout, refresh, register,
    update_current_user,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config_data = web::Data::new(jwt_config.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            // Protected routes (require an access token)
            .service(
                web::scope("")
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/auth/logout", web::post().to(logout))
                    .route("/users/me", web::get().to(get_current_user))
                    .route("/users/me", web::put().to(update_current_user))
                    .route("/users/me", web::delete().to(delete_current_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

use std::process::ExitCode;

#[rocket::main]
async fn main() -> ExitCode {
    let rocket = match users_api::rocket() {
        Ok(rocket) => rocket,
        Err(err) => {
            users_api::init_logger();
            log::error!("refusing to start: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match rocket.launch().await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("server failed: {}", err);
            ExitCode::FAILURE
        }
    }
}

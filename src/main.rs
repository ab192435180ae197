use core_service::config::Environment;
use core_service::lifecycle::{self, BootstrapError};
use core_service::observability::logging;

#[tokio::main]
async fn main() -> Result<(), BootstrapError> {
    let env = Environment::capture();
    logging::init(&env);

    lifecycle::launch(&env).await
}
